//! 汇总统计：得分卡片、地区柱状图、地区统计与趋势序列

use std::collections::{BTreeMap, BTreeSet};

use crate::format::{ScoreBand, fmt_int, fmt_pct, score_band};
use crate::models::{ReportConfig, SummaryRow, TrendData, TrendRow, TrendSeries};

/// 平均值，非数字按 0 计，空集为 0
pub fn avg(rows: &[&SummaryRow], column: &str) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let sum: f64 = rows.iter().map(|row| row.number(column).unwrap_or(0.0)).sum();
    sum / rows.len() as f64
}

/// 按列分组，保持首次出现的顺序；缺失值归入 `Unknown`
pub fn group_by<'a>(rows: &'a [SummaryRow], column: &str) -> Vec<(String, Vec<&'a SummaryRow>)> {
    let mut groups: Vec<(String, Vec<&SummaryRow>)> = Vec::new();
    for row in rows {
        let key = match row.cell(column).as_text() {
            text if text.is_empty() => "Unknown".to_string(),
            text => text,
        };
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    groups
}

/// 得分卡片
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    pub label: String,
    pub value: String,
    pub sub: String,
    pub band: Option<ScoreBand>,
}

/// 总平均、SKU 总数，以及每个地区一张卡片
pub fn score_cards(rows: &[SummaryRow], config: &ReportConfig) -> Vec<ScoreCard> {
    if rows.is_empty() {
        return Vec::new();
    }

    let all: Vec<&SummaryRow> = rows.iter().collect();
    let overall = avg(&all, "total_score_pct");
    let total_skus: f64 = rows.iter().filter_map(|row| row.sku_count).sum();

    let mut cards = vec![
        ScoreCard {
            label: "Overall Average".to_string(),
            value: fmt_pct(Some(overall), 1),
            sub: "Total score average".to_string(),
            band: Some(score_band(overall)),
        },
        ScoreCard {
            label: "Total SKUs".to_string(),
            value: fmt_int(Some(total_skus)),
            sub: format!("Max {} pts", config.total_max),
            band: None,
        },
    ];

    for (region, members) in group_by(rows, "region") {
        let region_avg = avg(&members, "total_score_pct");
        cards.push(ScoreCard {
            label: region,
            value: fmt_pct(Some(region_avg), 1),
            sub: format!("{} countries", members.len()),
            band: Some(score_band(region_avg)),
        });
    }
    cards
}

/// 柱状图：每个地区各得分列的平均值
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBars {
    pub region: String,
    /// 与 `ReportConfig::score_columns` 一一对应
    pub values: Vec<f64>,
}

pub fn region_bars(rows: &[SummaryRow], config: &ReportConfig) -> Vec<RegionBars> {
    group_by(rows, "region")
        .into_iter()
        .map(|(region, members)| RegionBars {
            values: config
                .score_columns
                .iter()
                .map(|column| avg(&members, column))
                .collect(),
            region,
        })
        .collect()
}

/// 地区统计
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStat {
    pub region: String,
    pub country_count: usize,
    pub avg_total_score: f64,
}

/// 按平均总分降序
pub fn region_stats(rows: &[SummaryRow]) -> Vec<RegionStat> {
    let mut stats: Vec<RegionStat> = group_by(rows, "region")
        .into_iter()
        .map(|(region, members)| RegionStat {
            country_count: members.len(),
            avg_total_score: avg(&members, "total_score_pct"),
            region,
        })
        .collect();
    stats.sort_by(|a, b| b.avg_total_score.total_cmp(&a.avg_total_score));
    stats
}

/// 把趋势接口的行整理为折线图数据：每个地区一条线，取该期内总分平均
pub fn build_trend(rows: &[TrendRow]) -> TrendData {
    let mut labels: BTreeSet<String> = BTreeSet::new();
    let mut buckets: BTreeMap<&str, BTreeMap<String, (f64, usize)>> = BTreeMap::new();

    for row in rows {
        let Some(label) = row.period_label() else {
            continue;
        };
        let Some(score) = row.total_score_pct else {
            continue;
        };
        labels.insert(label.clone());
        let region = if row.region.is_empty() {
            "Unknown"
        } else {
            row.region.as_str()
        };
        let slot = buckets.entry(region).or_default().entry(label).or_default();
        slot.0 += score;
        slot.1 += 1;
    }

    let labels: Vec<String> = labels.into_iter().collect();
    let series = buckets
        .into_iter()
        .map(|(region, by_label)| TrendSeries {
            region: region.to_string(),
            data: labels
                .iter()
                .map(|label| by_label.get(label).map(|(sum, n)| sum / *n as f64))
                .collect(),
        })
        .collect();

    TrendData { labels, series }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::B2B_CONFIG;

    fn row(region: &str, country: &str, skus: f64, total: f64) -> SummaryRow {
        SummaryRow {
            region: region.to_string(),
            country: country.to_string(),
            sku_count: Some(skus),
            total_score_pct: Some(total),
            ..Default::default()
        }
        .with_score("title_tag_score", total / 10.0)
    }

    fn sample() -> Vec<SummaryRow> {
        vec![
            row("Europe", "DE", 1000.0, 90.0),
            row("Asia", "KR", 500.0, 80.0),
            row("Europe", "FR", 250.0, 70.0),
        ]
    }

    #[test]
    fn test_avg_and_empty() {
        let rows = sample();
        let refs: Vec<&SummaryRow> = rows.iter().collect();
        assert_eq!(avg(&refs, "total_score_pct"), 80.0);
        assert_eq!(avg(&[], "total_score_pct"), 0.0);
        // 缺失列按 0 计
        assert_eq!(avg(&refs, "h1_tag_score"), 0.0);
    }

    #[test]
    fn test_group_by_keeps_first_seen_order() {
        let mut rows = sample();
        rows.push(SummaryRow::default());
        let groups = group_by(&rows, "region");
        let names: Vec<&str> = groups.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["Europe", "Asia", "Unknown"]);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn test_score_cards() {
        let cards = score_cards(&sample(), &B2B_CONFIG);
        assert_eq!(cards.len(), 4);
        assert_eq!(cards[0].value, "80.0%");
        assert_eq!(cards[1].value, "1,750");
        assert_eq!(cards[1].sub, "Max 85 pts");
        assert_eq!(cards[2].label, "Europe");
        assert_eq!(cards[2].sub, "2 countries");
        assert_eq!(cards[2].band, Some(ScoreBand::Warn));
        assert!(score_cards(&[], &B2B_CONFIG).is_empty());
    }

    #[test]
    fn test_region_bars() {
        let bars = region_bars(&sample(), &B2B_CONFIG);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].region, "Europe");
        assert_eq!(bars[0].values.len(), B2B_CONFIG.score_columns.len());
        assert_eq!(bars[0].values[0], 8.0);
    }

    #[test]
    fn test_region_stats_sorted_desc() {
        let rows = vec![
            row("Europe", "DE", 1000.0, 90.0),
            row("Asia", "KR", 500.0, 80.0),
            row("Europe", "FR", 250.0, 60.0),
        ];
        let stats = region_stats(&rows);
        assert_eq!(stats[0].region, "Asia");
        assert_eq!(stats[0].avg_total_score, 80.0);
        assert_eq!(stats[1].region, "Europe");
        assert_eq!(stats[1].country_count, 2);
        assert_eq!(stats[1].avg_total_score, 75.0);
    }

    #[test]
    fn test_region_stats_ties_keep_first_seen_order() {
        // Europe 与 Asia 平均都是 80
        let stats = region_stats(&sample());
        let regions: Vec<&str> = stats.iter().map(|s| s.region.as_str()).collect();
        assert_eq!(regions, vec!["Europe", "Asia"]);
        assert_eq!(stats[0].country_count, 2);
    }

    #[test]
    fn test_build_trend() {
        let rows = vec![
            TrendRow {
                region: "Asia".into(),
                year: Some(2026),
                month: Some(2),
                total_score_pct: Some(80.0),
                ..Default::default()
            },
            TrendRow {
                region: "Asia".into(),
                year: Some(2026),
                month: Some(2),
                total_score_pct: Some(90.0),
                ..Default::default()
            },
            TrendRow {
                region: "Europe".into(),
                year: Some(2026),
                month: Some(1),
                total_score_pct: Some(70.0),
                ..Default::default()
            },
            TrendRow {
                region: "Europe".into(),
                year: None,
                month: Some(1),
                total_score_pct: Some(10.0),
                ..Default::default()
            },
        ];

        let trend = build_trend(&rows);
        assert_eq!(trend.labels, vec!["2026-01", "2026-02"]);
        assert_eq!(trend.series.len(), 2);
        assert_eq!(trend.series[0].region, "Asia");
        assert_eq!(trend.series[0].data, vec![None, Some(85.0)]);
        assert_eq!(trend.series[1].data, vec![Some(70.0), None]);
    }
}
