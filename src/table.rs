//! 汇总表的筛选与排序

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Cell, FilterOptions, ScoreFilter, SortDir, SummaryRow};

/// 表格视图参数
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableView {
    pub sort_col: Option<String>,
    pub sort_dir: SortDir,
    pub score_filter: ScoreFilter,
}

/// 按地区/国家筛选，空选择表示全部
pub fn apply_filters(rows: &[SummaryRow], regions: &[String], countries: &[String]) -> Vec<SummaryRow> {
    rows.iter()
        .filter(|row| regions.is_empty() || regions.contains(&row.region))
        .filter(|row| countries.is_empty() || countries.contains(&row.country))
        .cloned()
        .collect()
}

/// 前/后 30% 筛选，至少保留一行
pub fn apply_score_filter(rows: Vec<SummaryRow>, filter: ScoreFilter) -> Vec<SummaryRow> {
    if filter == ScoreFilter::All || rows.is_empty() {
        return rows;
    }

    let mut by_score = rows;
    by_score.sort_by(|a, b| {
        let a = a.total_score_pct.unwrap_or(0.0);
        let b = b.total_score_pct.unwrap_or(0.0);
        b.total_cmp(&a)
    });

    let cut = ((by_score.len() as f64 * 0.3).ceil() as usize).max(1);
    match filter {
        ScoreFilter::Top30 => by_score.truncate(cut),
        ScoreFilter::Bottom30 => {
            let start = by_score.len() - cut;
            by_score.drain(..start);
        }
        ScoreFilter::All => {}
    }
    by_score
}

/// 比较两个单元格：都能解释为数字时按数值，都是文本时按文本；
/// 混合时缺失 < 数字 < 文本，保证全序
pub fn compare_cells(a: &SummaryRow, b: &SummaryRow, column: &str) -> Ordering {
    fn rank(cell: &Cell<'_>) -> u8 {
        match cell {
            Cell::Missing => 0,
            _ if cell.as_number().is_some() => 1,
            _ => 2,
        }
    }

    let (a, b) = (a.cell(column), b.cell(column));
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => rank(&a)
            .cmp(&rank(&b))
            .then_with(|| a.as_text().cmp(&b.as_text())),
    }
}

/// 稳定排序
pub fn sort_rows(rows: &mut [SummaryRow], column: &str, dir: SortDir) {
    rows.sort_by(|a, b| {
        let ord = compare_cells(a, b, column);
        match dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });
}

/// 点击表头后的排序状态：同列升序时切换为降序，否则该列升序
pub fn toggle_sort(current_col: Option<&str>, current_dir: SortDir, column: &str) -> (String, SortDir) {
    let dir = if current_col == Some(column) && current_dir == SortDir::Asc {
        SortDir::Desc
    } else {
        SortDir::Asc
    };
    (column.to_string(), dir)
}

/// 表格最终显示的行
pub fn visible_rows(rows: &[SummaryRow], view: &TableView) -> Vec<SummaryRow> {
    let mut working = apply_score_filter(rows.to_vec(), view.score_filter);
    if let Some(column) = &view.sort_col {
        sort_rows(&mut working, column, view.sort_dir);
    }
    working
}

/// 由原始行推导筛选项：国家只列出已选地区下的国家
pub fn filter_options(rows: &[SummaryRow], selected_regions: &[String]) -> FilterOptions {
    let mut countries_by_region: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for row in rows.iter().filter(|row| !row.region.is_empty()) {
        let countries = countries_by_region.entry(row.region.as_str()).or_default();
        if !row.country.is_empty() {
            countries.insert(row.country.as_str());
        }
    }

    let regions = countries_by_region.keys().map(|r| r.to_string()).collect();
    let countries: BTreeSet<&str> = if selected_regions.is_empty() {
        countries_by_region.values().flatten().copied().collect()
    } else {
        selected_regions
            .iter()
            .filter_map(|region| countries_by_region.get(region.as_str()))
            .flatten()
            .copied()
            .collect()
    };

    FilterOptions {
        regions,
        countries: countries.into_iter().map(str::to_string).collect(),
    }
}

/// 候选项变化后，只保留仍然存在的已选项
pub fn retain_selected(selected: &[String], items: &[String]) -> Vec<String> {
    selected
        .iter()
        .filter(|item| items.contains(item))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(region: &str, country: &str, total: Option<f64>) -> SummaryRow {
        SummaryRow {
            region: region.to_string(),
            country: country.to_string(),
            total_score_pct: total,
            ..Default::default()
        }
    }

    fn sample() -> Vec<SummaryRow> {
        vec![
            row("Europe", "DE", Some(91.0)),
            row("Europe", "FR", Some(72.5)),
            row("Asia", "KR", Some(95.0)),
            row("Asia", "JP", Some(60.0)),
            row("LATAM", "BR", None),
        ]
    }

    fn countries(rows: &[SummaryRow]) -> Vec<&str> {
        rows.iter().map(|r| r.country.as_str()).collect()
    }

    #[test]
    fn test_apply_filters() {
        let rows = sample();
        assert_eq!(apply_filters(&rows, &[], &[]).len(), 5);

        let europe = apply_filters(&rows, &["Europe".into()], &[]);
        assert_eq!(countries(&europe), vec!["DE", "FR"]);

        let picked = apply_filters(&rows, &["Europe".into(), "Asia".into()], &["KR".into()]);
        assert_eq!(countries(&picked), vec!["KR"]);
    }

    #[test]
    fn test_score_filter_top_and_bottom() {
        // 5 行 -> ceil(1.5) = 2
        let top = apply_score_filter(sample(), ScoreFilter::Top30);
        assert_eq!(countries(&top), vec!["KR", "DE"]);

        let bottom = apply_score_filter(sample(), ScoreFilter::Bottom30);
        assert_eq!(countries(&bottom), vec!["JP", "BR"]);

        assert_eq!(apply_score_filter(sample(), ScoreFilter::All).len(), 5);
    }

    #[test]
    fn test_score_filter_keeps_at_least_one_row() {
        let rows = vec![row("Asia", "KR", Some(50.0))];
        assert_eq!(apply_score_filter(rows.clone(), ScoreFilter::Top30).len(), 1);
        assert_eq!(apply_score_filter(rows, ScoreFilter::Bottom30).len(), 1);
        assert!(apply_score_filter(Vec::new(), ScoreFilter::Top30).is_empty());
    }

    #[test]
    fn test_sort_numeric_and_text() {
        let mut rows = sample();
        sort_rows(&mut rows, "country", SortDir::Asc);
        assert_eq!(countries(&rows), vec!["BR", "DE", "FR", "JP", "KR"]);

        let mut rows = sample();
        sort_rows(&mut rows, "total_score_pct", SortDir::Desc);
        // BR 缺失，排在所有数字之前（降序时在最后）
        assert_eq!(rows[0].country, "KR");
        assert_eq!(rows[4].country, "BR");
    }

    #[test]
    fn test_sort_score_columns_by_value() {
        let mut rows = vec![
            row("A", "x", None).with_score("h1_tag_score", 10.0),
            row("A", "y", None).with_score("h1_tag_score", 9.0),
        ];
        sort_rows(&mut rows, "h1_tag_score", SortDir::Asc);
        assert_eq!(countries(&rows), vec!["y", "x"]);
    }

    #[test]
    fn test_toggle_sort() {
        assert_eq!(toggle_sort(None, SortDir::Asc, "country"), ("country".into(), SortDir::Asc));
        assert_eq!(
            toggle_sort(Some("country"), SortDir::Asc, "country"),
            ("country".into(), SortDir::Desc)
        );
        assert_eq!(
            toggle_sort(Some("country"), SortDir::Desc, "country"),
            ("country".into(), SortDir::Asc)
        );
        assert_eq!(
            toggle_sort(Some("country"), SortDir::Desc, "region"),
            ("region".into(), SortDir::Asc)
        );
    }

    #[test]
    fn test_visible_rows_filter_then_sort() {
        let view = TableView {
            sort_col: Some("country".into()),
            sort_dir: SortDir::Asc,
            score_filter: ScoreFilter::Top30,
        };
        assert_eq!(countries(&visible_rows(&sample(), &view)), vec!["DE", "KR"]);
    }

    #[test]
    fn test_filter_options() {
        let rows = sample();
        let all = filter_options(&rows, &[]);
        assert_eq!(all.regions, vec!["Asia", "Europe", "LATAM"]);
        assert_eq!(all.countries, vec!["BR", "DE", "FR", "JP", "KR"]);

        let asia = filter_options(&rows, &["Asia".into()]);
        assert_eq!(asia.countries, vec!["JP", "KR"]);
    }

    #[test]
    fn test_retain_selected() {
        let kept = retain_selected(&["DE".into(), "XX".into()], &["DE".into(), "FR".into()]);
        assert_eq!(kept, vec!["DE".to_string()]);
    }
}
