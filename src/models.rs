use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 报表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReportType {
    #[default]
    B2B,
    B2C,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::B2B => "B2B",
            ReportType::B2C => "B2C",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            ReportType::B2B => ReportType::B2C,
            ReportType::B2C => ReportType::B2B,
        }
    }

    pub fn config(&self) -> &'static ReportConfig {
        match self {
            ReportType::B2B => &B2B_CONFIG,
            ReportType::B2C => &B2C_CONFIG,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "B2B" => Some(ReportType::B2B),
            "B2C" => Some(ReportType::B2C),
            _ => None,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 页面分区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Dashboard,
    Summary,
    Detail,
    Checklist,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Dashboard,
        Section::Summary,
        Section::Detail,
        Section::Checklist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Dashboard => "dashboard",
            Section::Summary => "summary",
            Section::Detail => "detail",
            Section::Checklist => "checklist",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Dashboard => "Dashboard",
            Section::Summary => "Summary",
            Section::Detail => "Detail",
            Section::Checklist => "Checklist",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn arrow(&self) -> &'static str {
        match self {
            SortDir::Asc => " ▲",
            SortDir::Desc => " ▼",
        }
    }
}

/// 总分筛选
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScoreFilter {
    #[default]
    All,
    Top30,
    Bottom30,
}

impl ScoreFilter {
    pub fn cycle(&self) -> Self {
        match self {
            ScoreFilter::All => ScoreFilter::Top30,
            ScoreFilter::Top30 => ScoreFilter::Bottom30,
            ScoreFilter::Bottom30 => ScoreFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreFilter::All => "All",
            ScoreFilter::Top30 => "Top 30%",
            ScoreFilter::Bottom30 => "Bottom 30%",
        }
    }
}

/// 当前登录用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// 单元格取值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Missing,
}

impl Cell<'_> {
    /// 按数字解释；文本能解析成数字时也算
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
            Cell::Missing => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Cell::Text(s) => (*s).to_string(),
            Cell::Number(n) => n.to_string(),
            Cell::Missing => String::new(),
        }
    }
}

/// 汇总表中的一行（按地区/国家聚合后的得分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SummaryRow {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
    #[serde(default)]
    pub sku_count: Option<f64>,
    #[serde(default)]
    pub total_score_pct: Option<f64>,
    /// 各项得分列，列名因报表类型而异
    #[serde(flatten)]
    pub scores: BTreeMap<String, Value>,
}

impl SummaryRow {
    pub fn cell(&self, column: &str) -> Cell<'_> {
        match column {
            "region" => Cell::Text(&self.region),
            "country" => Cell::Text(&self.country),
            "division" => self.division.as_deref().map_or(Cell::Missing, Cell::Text),
            "sku_count" => self.sku_count.map_or(Cell::Missing, Cell::Number),
            "total_score_pct" => self.total_score_pct.map_or(Cell::Missing, Cell::Number),
            other => match self.scores.get(other) {
                Some(Value::Number(n)) => n.as_f64().map_or(Cell::Missing, Cell::Number),
                Some(Value::String(s)) => Cell::Text(s),
                _ => Cell::Missing,
            },
        }
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.cell(column).as_number()
    }

    /// 设置得分列（测试与演示数据使用）
    pub fn with_score(mut self, column: &str, value: f64) -> Self {
        self.scores.insert(column.to_string(), Value::from(value));
        self
    }
}

/// 趋势接口返回的原始行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrendRow {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub week: Option<u32>,
    #[serde(default)]
    pub total_score_pct: Option<f64>,
}

impl TrendRow {
    /// 时间轴标签：`YYYY-MM` 或 `YYYY-Www`
    pub fn period_label(&self) -> Option<String> {
        let year = self.year?;
        match (self.month, self.week) {
            (Some(month), _) => Some(format!("{year}-{month:02}")),
            (None, Some(week)) => Some(format!("{year}-W{week:02}")),
            (None, None) => None,
        }
    }
}

/// 趋势序列（一个地区一条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrendSeries {
    pub region: String,
    pub data: Vec<Option<f64>>,
}

/// 折线图数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrendData {
    pub labels: Vec<String>,
    pub series: Vec<TrendSeries>,
}

impl TrendData {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// 筛选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterOptions {
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
}

/// `/api/reports` 的条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub report_type: String,
    pub month: String,
    #[serde(default)]
    pub count: Option<u64>,
}

/// 可选的年份与月份
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Periods {
    months_by_year: BTreeMap<i32, BTreeSet<u32>>,
}

impl Periods {
    /// 从报表列表中提取某类报表的年月，忽略 `latest` 与无法解析的条目
    pub fn from_reports(reports: &[ReportEntry], report_type: ReportType) -> Self {
        let mut months_by_year: BTreeMap<i32, BTreeSet<u32>> = BTreeMap::new();
        for entry in reports {
            if ReportType::parse(&entry.report_type) != Some(report_type) {
                continue;
            }
            let Some((year, month)) = entry.month.split_once('-') else {
                continue;
            };
            let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) else {
                continue;
            };
            if (1..=12).contains(&month) {
                months_by_year.entry(year).or_default().insert(month);
            }
        }
        Self { months_by_year }
    }

    pub fn years(&self) -> Vec<i32> {
        self.months_by_year.keys().copied().collect()
    }

    pub fn months(&self, year: i32) -> Vec<u32> {
        self.months_by_year
            .get(&year)
            .map(|months| months.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.months_by_year.keys().next_back().copied()
    }

    pub fn latest_month(&self, year: i32) -> Option<u32> {
        self.months_by_year
            .get(&year)
            .and_then(|months| months.iter().next_back().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.months_by_year.is_empty()
    }
}

/// 接口查询用的月份参数
pub fn month_param(year: Option<i32>, month: Option<u32>) -> String {
    match (year, month) {
        (Some(year), Some(month)) => format!("{year}-{month:02}"),
        _ => "latest".to_string(),
    }
}

/// 原始明细行，列随报表而变，保持动态
pub type RawRecord = BTreeMap<String, Value>;

/// `/api/raw` 响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RawRows {
    #[serde(default)]
    pub items: Vec<RawRecord>,
    #[serde(default)]
    pub total: usize,
}

/// `/api/health` 响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub db_configured: bool,
    #[serde(default)]
    pub message: String,
}

/// 报表列配置
#[derive(Debug, PartialEq)]
pub struct ReportConfig {
    pub columns: &'static [&'static str],
    pub labels: &'static [&'static str],
    pub score_columns: &'static [&'static str],
    pub score_labels: &'static [&'static str],
    pub total_max: u32,
}

impl ReportConfig {
    pub fn label_for(&self, column: &str) -> &'static str {
        self.columns
            .iter()
            .position(|c| *c == column)
            .and_then(|idx| self.labels.get(idx).copied())
            .unwrap_or("")
    }

    pub fn is_score_column(&self, column: &str) -> bool {
        self.score_columns.contains(&column)
    }
}

pub static B2B_CONFIG: ReportConfig = ReportConfig {
    columns: &[
        "region",
        "country",
        "sku_count",
        "title_tag_score",
        "description_tag_score",
        "h1_tag_score",
        "canonical_link_score",
        "feature_alt_score",
        "total_score_pct",
    ],
    labels: &[
        "Region",
        "Country",
        "SKUs",
        "Title",
        "Description",
        "H1",
        "Canonical",
        "Feature Alt",
        "Total %",
    ],
    score_columns: &[
        "title_tag_score",
        "description_tag_score",
        "h1_tag_score",
        "canonical_link_score",
        "feature_alt_score",
    ],
    score_labels: &["Title", "Description", "H1", "Canonical", "Feature Alt"],
    total_max: 85,
};

pub static B2C_CONFIG: ReportConfig = ReportConfig {
    columns: &[
        "region",
        "country",
        "division",
        "sku_count",
        "ufn_score",
        "basic_assets_score",
        "spec_summary_score",
        "faq_score",
        "title_score",
        "description_score",
        "h1_score",
        "canonical_score",
        "alt_feature_score",
        "alt_front_score",
        "total_score_pct",
    ],
    labels: &[
        "Region",
        "Country",
        "Division",
        "SKUs",
        "UFN",
        "Assets",
        "Spec",
        "FAQ",
        "Title",
        "Desc",
        "H1",
        "Canonical",
        "Alt Feat",
        "Alt Front",
        "Total %",
    ],
    score_columns: &[
        "ufn_score",
        "basic_assets_score",
        "spec_summary_score",
        "faq_score",
        "title_score",
        "description_score",
        "h1_score",
        "canonical_score",
        "alt_feature_score",
        "alt_front_score",
    ],
    score_labels: &[
        "UFN",
        "Assets",
        "Spec",
        "FAQ",
        "Title",
        "Desc",
        "H1",
        "Canonical",
        "Alt Feat",
        "Alt Front",
    ],
    total_max: 100,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_row_decodes_extra_scores() {
        let row: SummaryRow = serde_json::from_value(json!({
            "region": "Europe",
            "country": "DE",
            "sku_count": 120,
            "title_tag_score": 14.5,
            "h1_tag_score": null,
            "total_score_pct": 88.2
        }))
        .unwrap();

        assert_eq!(row.region, "Europe");
        assert_eq!(row.number("sku_count"), Some(120.0));
        assert_eq!(row.number("title_tag_score"), Some(14.5));
        assert_eq!(row.cell("h1_tag_score"), Cell::Missing);
        assert_eq!(row.cell("division"), Cell::Missing);
        assert_eq!(row.number("total_score_pct"), Some(88.2));
    }

    #[test]
    fn test_cell_text_number_parsing() {
        assert_eq!(Cell::Text(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(Cell::Text("DE").as_number(), None);
        assert_eq!(Cell::Missing.as_text(), "");
    }

    #[test]
    fn test_section_cycle() {
        assert_eq!(Section::Dashboard.next(), Section::Summary);
        assert_eq!(Section::Checklist.next(), Section::Dashboard);
        assert_eq!(Section::Dashboard.prev(), Section::Checklist);
    }

    #[test]
    fn test_periods_from_reports() {
        let reports = vec![
            ReportEntry {
                report_type: "B2B".into(),
                month: "latest".into(),
                count: Some(10),
            },
            ReportEntry {
                report_type: "B2B".into(),
                month: "2025-11".into(),
                count: None,
            },
            ReportEntry {
                report_type: "B2B".into(),
                month: "2026-02".into(),
                count: None,
            },
            ReportEntry {
                report_type: "B2B".into(),
                month: "2026-01".into(),
                count: None,
            },
            ReportEntry {
                report_type: "B2C".into(),
                month: "2026-09".into(),
                count: None,
            },
        ];

        let periods = Periods::from_reports(&reports, ReportType::B2B);
        assert_eq!(periods.years(), vec![2025, 2026]);
        assert_eq!(periods.latest_year(), Some(2026));
        assert_eq!(periods.latest_month(2026), Some(2));
        assert_eq!(periods.months(2025), vec![11]);
        assert!(periods.months(2024).is_empty());
    }

    #[test]
    fn test_month_param() {
        assert_eq!(month_param(Some(2026), Some(3)), "2026-03");
        assert_eq!(month_param(Some(2026), None), "latest");
    }

    #[test]
    fn test_trend_period_label() {
        let monthly = TrendRow {
            year: Some(2026),
            month: Some(4),
            ..Default::default()
        };
        let weekly = TrendRow {
            year: Some(2026),
            week: Some(7),
            ..Default::default()
        };
        assert_eq!(monthly.period_label().as_deref(), Some("2026-04"));
        assert_eq!(weekly.period_label().as_deref(), Some("2026-W07"));
        assert_eq!(TrendRow::default().period_label(), None);
    }

    #[test]
    fn test_report_type_parse_and_config() {
        assert_eq!(ReportType::parse("b2c"), Some(ReportType::B2C));
        assert_eq!(ReportType::parse("x"), None);
        assert_eq!(ReportType::B2B.config().total_max, 85);
        assert_eq!(ReportType::B2C.config().label_for("faq_score"), "FAQ");
        assert!(ReportType::B2B.config().is_score_column("h1_tag_score"));
        assert_eq!(
            ReportType::B2B.config().columns.len(),
            ReportType::B2B.config().labels.len()
        );
    }
}
