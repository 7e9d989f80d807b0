//! 数据源
//!
//! `DataSource` 是仪表盘与后端之间的接缝：
//! - `ApiClient`：访问 REST 后端（阻塞式 reqwest，基于 cookie 的会话）
//! - `DemoSource`：内置演示数据，离线运行与测试使用

mod api;
mod demo;

pub use api::ApiClient;
pub use demo::DemoSource;

use thiserror::Error;

use crate::models::{
    FilterOptions, Health, RawRows, ReportEntry, ReportType, SummaryRow, TrendRow, User,
};

/// 数据源错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络或连接错误
    #[error("网络请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 后端地址无效
    #[error("无效的后端地址 {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// 未登录或会话过期
    #[error("未登录或会话已过期")]
    Unauthorized,

    /// 登录被拒绝，保留后端给出的原因
    #[error("{0}")]
    Rejected(String),

    /// 非 2xx 响应
    #[error("后端返回 {status}: {detail}")]
    Status { status: u16, detail: String },

    /// 响应体解码失败
    #[error("解析 {endpoint} 响应失败: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 汇总查询参数
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryQuery {
    pub report_type: ReportType,
    /// `YYYY-MM` 或 `latest`
    pub month: String,
    pub regions: Vec<String>,
    pub countries: Vec<String>,
}

impl SummaryQuery {
    pub fn new(report_type: ReportType, month: impl Into<String>) -> Self {
        Self {
            report_type,
            month: month.into(),
            regions: Vec::new(),
            countries: Vec::new(),
        }
    }

    /// 查询串参数，地区与国家以重复参数传递
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("report_type", self.report_type.as_str().to_string()),
            ("month", self.month.clone()),
        ];
        pairs.extend(self.regions.iter().map(|r| ("region", r.clone())));
        pairs.extend(self.countries.iter().map(|c| ("country", c.clone())));
        pairs
    }
}

/// 趋势粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendBy {
    #[default]
    Month,
    Week,
}

impl TrendBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendBy::Month => "month",
            TrendBy::Week => "week",
        }
    }
}

/// 仪表盘使用的后端操作
pub trait DataSource {
    fn login(&mut self, username: &str, password: &str) -> Result<User, ApiError>;
    fn logout(&mut self) -> Result<(), ApiError>;
    fn me(&self) -> Result<User, ApiError>;
    fn health(&self) -> Result<Health, ApiError>;
    fn reports(&self) -> Result<Vec<ReportEntry>, ApiError>;
    fn filters(&self, query: &SummaryQuery) -> Result<FilterOptions, ApiError>;
    fn summary(&self, query: &SummaryQuery) -> Result<Vec<SummaryRow>, ApiError>;
    fn trend(&self, report_type: ReportType, by: TrendBy) -> Result<Vec<TrendRow>, ApiError>;
    fn raw(
        &self,
        report_type: ReportType,
        region: Option<&str>,
        country: Option<&str>,
        limit: usize,
    ) -> Result<RawRows, ApiError>;
}
