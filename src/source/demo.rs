use std::collections::BTreeMap;

use serde_json::Value;

use super::{ApiError, DataSource, SummaryQuery, TrendBy};
use crate::models::{
    FilterOptions, Health, RawRecord, RawRows, ReportEntry, ReportType, SummaryRow, TrendRow, User,
};
use crate::table;

const REGIONS: &[(&str, &[&str])] = &[
    ("Asia", &["IN", "JP", "KR", "VN"]),
    ("Europe", &["DE", "ES", "FR", "UK"]),
    ("LATAM", &["BR", "CL", "MX"]),
    ("North America", &["CA", "US"]),
];

const B2C_DIVISIONS: &[&str] = &["HA", "IT", "TV"];

/// B2B 各得分列满分，合计 85
const B2B_MAX: &[(&str, f64)] = &[
    ("title_tag_score", 20.0),
    ("description_tag_score", 20.0),
    ("h1_tag_score", 15.0),
    ("canonical_link_score", 15.0),
    ("feature_alt_score", 15.0),
];

/// 演示期间（年, 月）
const PERIODS: &[(i32, u32)] = &[
    (2025, 10),
    (2025, 11),
    (2025, 12),
    (2026, 1),
    (2026, 2),
    (2026, 3),
];

/// 内置演示数据源，数据由名称确定性生成
#[derive(Debug, Default)]
pub struct DemoSource {
    user: Option<User>,
}

impl DemoSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已登录的演示数据源
    pub fn signed_in(username: &str) -> Self {
        Self {
            user: Some(User {
                username: username.to_string(),
                role: "admin".to_string(),
            }),
        }
    }

    fn require_user(&self) -> Result<&User, ApiError> {
        self.user.as_ref().ok_or(ApiError::Unauthorized)
    }

    fn all_rows(&self, report_type: ReportType, month: &str) -> Vec<SummaryRow> {
        let mut rows = Vec::new();
        for (region, countries) in REGIONS {
            for country in *countries {
                match report_type {
                    ReportType::B2B => rows.push(b2b_row(region, country, month)),
                    ReportType::B2C => {
                        for division in B2C_DIVISIONS {
                            rows.push(b2c_row(region, country, division, month));
                        }
                    }
                }
            }
        }
        rows
    }
}

/// 0..1 之间的确定性伪随机数
fn unit(parts: &[&str]) -> f64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for part in parts {
        for byte in part.bytes().chain(std::iter::once(0)) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
    }
    (hash % 10_000) as f64 / 10_000.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sku_count(parts: &[&str]) -> f64 {
    (20.0 + unit(parts) * 480.0).round()
}

fn b2b_row(region: &str, country: &str, month: &str) -> SummaryRow {
    let mut row = SummaryRow {
        region: region.to_string(),
        country: country.to_string(),
        sku_count: Some(sku_count(&["sku", country, month])),
        ..Default::default()
    };
    let mut sum = 0.0;
    for (column, max) in B2B_MAX {
        // 得分集中在满分的 55%~100%
        let score = round2(max * (0.55 + 0.45 * unit(&[*column, country, month])));
        sum += score;
        row = row.with_score(column, score);
    }
    row.total_score_pct = Some(round2(sum / 85.0 * 100.0));
    row
}

fn b2c_row(region: &str, country: &str, division: &str, month: &str) -> SummaryRow {
    let config = ReportType::B2C.config();
    let mut row = SummaryRow {
        region: region.to_string(),
        country: country.to_string(),
        division: Some(division.to_string()),
        sku_count: Some(sku_count(&["sku", country, division, month])),
        ..Default::default()
    };
    let mut sum = 0.0;
    for column in config.score_columns {
        let score = round2(10.0 * (0.5 + 0.5 * unit(&[*column, country, division, month])));
        sum += score;
        row = row.with_score(column, score);
    }
    row.total_score_pct = Some(round2(sum / config.score_columns.len() as f64 * 10.0));
    row
}

fn latest_month() -> String {
    PERIODS
        .last()
        .map(|(y, m)| format!("{y}-{m:02}"))
        .unwrap_or_else(|| "latest".to_string())
}

impl DataSource for DemoSource {
    fn login(&mut self, username: &str, password: &str) -> Result<User, ApiError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ApiError::Rejected("Invalid credentials".to_string()));
        }
        let user = User {
            username: username.trim().to_string(),
            role: "admin".to_string(),
        };
        self.user = Some(user.clone());
        Ok(user)
    }

    fn logout(&mut self) -> Result<(), ApiError> {
        self.user = None;
        Ok(())
    }

    fn me(&self) -> Result<User, ApiError> {
        self.require_user().cloned()
    }

    fn health(&self) -> Result<Health, ApiError> {
        Ok(Health {
            db_configured: true,
            message: "demo".to_string(),
        })
    }

    fn reports(&self) -> Result<Vec<ReportEntry>, ApiError> {
        self.require_user()?;
        let mut entries = Vec::new();
        for report_type in [ReportType::B2B, ReportType::B2C] {
            entries.push(ReportEntry {
                report_type: report_type.as_str().to_string(),
                month: "latest".to_string(),
                count: Some(self.all_rows(report_type, &latest_month()).len() as u64),
            });
            for (year, month) in PERIODS.iter().rev() {
                entries.push(ReportEntry {
                    report_type: report_type.as_str().to_string(),
                    month: format!("{year}-{month:02}"),
                    count: None,
                });
            }
        }
        Ok(entries)
    }

    fn filters(&self, query: &SummaryQuery) -> Result<FilterOptions, ApiError> {
        let rows = self.summary(&SummaryQuery::new(query.report_type, query.month.clone()))?;
        Ok(table::filter_options(&rows, &query.regions))
    }

    fn summary(&self, query: &SummaryQuery) -> Result<Vec<SummaryRow>, ApiError> {
        self.require_user()?;
        let month = if query.month == "latest" || query.month.is_empty() {
            latest_month()
        } else {
            query.month.clone()
        };
        let rows = self.all_rows(query.report_type, &month);
        Ok(table::apply_filters(&rows, &query.regions, &query.countries))
    }

    fn trend(&self, report_type: ReportType, by: TrendBy) -> Result<Vec<TrendRow>, ApiError> {
        self.require_user()?;
        let mut rows = Vec::new();
        for (year, month) in PERIODS {
            let label = format!("{year}-{month:02}");
            for row in self.all_rows(report_type, &label) {
                let mut trend = TrendRow {
                    region: row.region,
                    country: row.country,
                    year: Some(*year),
                    total_score_pct: row.total_score_pct,
                    ..Default::default()
                };
                match by {
                    TrendBy::Month => trend.month = Some(*month),
                    // 取每月第一周近似
                    TrendBy::Week => trend.week = Some((month - 1) * 4 + 1),
                }
                rows.push(trend);
            }
        }
        Ok(rows)
    }

    fn raw(
        &self,
        report_type: ReportType,
        region: Option<&str>,
        country: Option<&str>,
        limit: usize,
    ) -> Result<RawRows, ApiError> {
        self.require_user()?;
        let mut items: Vec<RawRecord> = Vec::new();
        for row in self.all_rows(report_type, &latest_month()) {
            if region.is_some_and(|r| r != row.region) || country.is_some_and(|c| c != row.country)
            {
                continue;
            }
            // 每个汇总行展开为若干 SKU 明细
            let skus = 3;
            for n in 1..=skus {
                let sku = format!("{}-{}-{:03}", row.country, report_type.as_str(), n);
                let mut record: RawRecord = BTreeMap::new();
                record.insert("region".into(), Value::from(row.region.clone()));
                record.insert("country".into(), Value::from(row.country.clone()));
                if let Some(division) = &row.division {
                    record.insert("division".into(), Value::from(division.clone()));
                }
                record.insert("sku".into(), Value::from(sku.clone()));
                for column in report_type.config().score_columns {
                    let base = row.number(column).unwrap_or(0.0);
                    let jitter = unit(&[*column, sku.as_str()]) - 0.5;
                    record.insert((*column).into(), Value::from(round2((base + jitter).max(0.0))));
                }
                items.push(record);
            }
        }
        items.truncate(limit.max(1));
        let total = items.len();
        Ok(RawRows { items, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Periods;

    #[test]
    fn test_requires_login() {
        let mut source = DemoSource::new();
        let query = SummaryQuery::new(ReportType::B2B, "latest");
        assert!(matches!(source.summary(&query), Err(ApiError::Unauthorized)));
        assert!(matches!(source.login("", "x"), Err(ApiError::Rejected(_))));

        let user = source.login("analyst@example.com", "pw").unwrap();
        assert_eq!(source.me().unwrap(), user);
        assert!(!source.summary(&query).unwrap().is_empty());

        source.logout().unwrap();
        assert!(source.me().is_err());
    }

    #[test]
    fn test_summary_is_deterministic_and_bounded() {
        let source = DemoSource::signed_in("demo");
        let query = SummaryQuery::new(ReportType::B2B, "latest");
        let first = source.summary(&query).unwrap();
        let second = source.summary(&query).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 13);
        for row in &first {
            let total = row.total_score_pct.unwrap();
            assert!((0.0..=100.0).contains(&total), "total {total}");
        }
    }

    #[test]
    fn test_b2c_rows_have_divisions() {
        let source = DemoSource::signed_in("demo");
        let rows = source
            .summary(&SummaryQuery::new(ReportType::B2C, "2026-01"))
            .unwrap();
        assert_eq!(rows.len(), 13 * B2C_DIVISIONS.len());
        assert!(rows.iter().all(|r| r.division.is_some()));
    }

    #[test]
    fn test_summary_server_side_filters() {
        let source = DemoSource::signed_in("demo");
        let mut query = SummaryQuery::new(ReportType::B2B, "latest");
        query.regions = vec!["Europe".into()];
        let rows = source.summary(&query).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.region == "Europe"));
    }

    #[test]
    fn test_reports_yield_periods() {
        let source = DemoSource::signed_in("demo");
        let periods = Periods::from_reports(&source.reports().unwrap(), ReportType::B2B);
        assert_eq!(periods.latest_year(), Some(2026));
        assert_eq!(periods.latest_month(2026), Some(3));
        assert_eq!(periods.months(2025), vec![10, 11, 12]);
    }

    #[test]
    fn test_raw_rows_filtered_and_limited() {
        let source = DemoSource::signed_in("demo");
        let raw = source.raw(ReportType::B2B, Some("Asia"), Some("KR"), 500).unwrap();
        assert_eq!(raw.total, 3);
        assert!(raw.items.iter().all(|r| r.get("country") == Some(&Value::from("KR"))));

        let limited = source.raw(ReportType::B2B, None, None, 2).unwrap();
        assert_eq!(limited.items.len(), 2);
    }

    #[test]
    fn test_trend_covers_all_periods() {
        let source = DemoSource::signed_in("demo");
        let rows = source.trend(ReportType::B2B, TrendBy::Month).unwrap();
        assert_eq!(rows.len(), PERIODS.len() * 13);
        assert!(rows.iter().all(|r| r.period_label().is_some()));
    }
}
