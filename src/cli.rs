//! 命令行参数与非交互子命令
//!
//! - `esdash` / `esdash tui`：启动终端界面
//! - `esdash export`：直接把汇总表导出为 CSV
//! - `esdash config --show|--path`：查看生效配置

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use crate::config::{Config, VERSION};
use crate::export;
use crate::models::{ReportType, ScoreFilter};
use crate::source::{DataSource, SummaryQuery};
use crate::table::{self, TableView};

/// ES 仪表盘终端客户端
#[derive(Debug, Parser)]
#[command(name = "esdash")]
#[command(version = VERSION)]
#[command(about = "Terminal dashboard for B2B/B2C ES score reports", long_about = None)]
pub struct Cli {
    /// 后端地址
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// 使用内置演示数据，不连接后端
    #[arg(long, global = true)]
    pub demo: bool,

    /// 自动刷新间隔（秒），0 关闭
    #[arg(long, global = true)]
    pub refresh_secs: Option<u64>,

    /// 登录用户名
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// 日志级别 (trace/debug/info/warn/error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// 指定配置文件
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 启动时打开的分区 (#dashboard / #summary / #detail / #checklist)
    #[arg(long)]
    pub open: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// 启动终端界面（默认）
    Tui,

    /// 导出汇总表为 CSV
    Export {
        /// 报表类型
        #[arg(long = "type", short = 't', default_value = "B2B", value_parser = parse_report_type)]
        report_type: ReportType,

        /// 月份 (YYYY-MM 或 latest)
        #[arg(long, default_value = "latest")]
        month: String,

        /// 地区，可重复
        #[arg(long = "region")]
        regions: Vec<String>,

        /// 国家，可重复
        #[arg(long = "country")]
        countries: Vec<String>,

        /// 只导出前 30% 或后 30%
        #[arg(long, value_parser = parse_score_filter, default_value = "all")]
        score_filter: ScoreFilter,

        /// 输出目录（默认使用配置中的导出目录）
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// 查看配置
    Config {
        /// 显示生效配置
        #[arg(long)]
        show: bool,

        /// 显示配置文件路径
        #[arg(long)]
        path: bool,
    },
}

fn parse_report_type(value: &str) -> Result<ReportType, String> {
    ReportType::parse(value).ok_or_else(|| format!("未知报表类型: {value}（可选 B2B / B2C）"))
}

fn parse_score_filter(value: &str) -> Result<ScoreFilter, String> {
    match value.to_ascii_lowercase().as_str() {
        "all" => Ok(ScoreFilter::All),
        "top30" => Ok(ScoreFilter::Top30),
        "bottom30" => Ok(ScoreFilter::Bottom30),
        _ => Err(format!("未知得分筛选: {value}（可选 all / top30 / bottom30）")),
    }
}

impl Cli {
    /// 命令行参数覆盖配置
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(secs) = self.refresh_secs {
            config.refresh_secs = secs;
        }
        if let Some(user) = &self.user {
            config.username = Some(user.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.to_ascii_lowercase();
        }
        config.demo |= self.demo;
    }
}

/// `config` 子命令
pub fn handle_config(config: &Config, show: bool, path: bool) {
    if path {
        match Config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("无法确定配置目录"),
        }
    } else if show {
        print!("{}", config.to_toml());
    } else {
        println!("Usage: esdash config [--show|--path]");
        println!();
        println!("Options:");
        println!("  --show    显示生效配置");
        println!("  --path    显示配置文件路径");
    }
}

/// 导出参数
#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub report_type: ReportType,
    pub month: String,
    pub regions: Vec<String>,
    pub countries: Vec<String>,
    pub score_filter: ScoreFilter,
    pub out: PathBuf,
}

/// `export` 子命令：拉取汇总、应用得分筛选后写出 CSV
pub fn run_export(source: &dyn DataSource, args: &ExportArgs) -> Result<PathBuf> {
    let query = SummaryQuery {
        report_type: args.report_type,
        month: args.month.clone(),
        regions: args.regions.clone(),
        countries: args.countries.clone(),
    };
    let rows = source
        .summary(&query)
        .with_context(|| format!("获取 {} 汇总失败", args.report_type))?;

    let view = TableView {
        score_filter: args.score_filter,
        ..TableView::default()
    };
    let rows = table::visible_rows(&rows, &view);
    if rows.is_empty() {
        bail!("筛选后没有数据");
    }

    let path = export::export_to_dir(&args.out, args.report_type, &rows)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DemoSource;

    #[test]
    fn test_parse_export_command() {
        let cli = Cli::try_parse_from([
            "esdash", "--demo", "export", "-t", "b2c", "--region", "Asia", "--region", "Europe",
            "--score-filter", "top30",
        ])
        .unwrap();
        assert!(cli.demo);
        match cli.command {
            Some(Commands::Export {
                report_type,
                regions,
                score_filter,
                month,
                ..
            }) => {
                assert_eq!(report_type, ReportType::B2C);
                assert_eq!(regions, vec!["Asia", "Europe"]);
                assert_eq!(score_filter, ScoreFilter::Top30);
                assert_eq!(month, "latest");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_report_type() {
        assert!(Cli::try_parse_from(["esdash", "export", "-t", "B2X"]).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "esdash",
            "--api-url",
            "http://cli:1",
            "--refresh-secs",
            "0",
            "--log-level",
            "WARN",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.api_url, "http://cli:1");
        assert_eq!(config.refresh_secs, 0);
        assert_eq!(config.log_level, "warn");
        assert!(!config.demo);
    }

    #[test]
    fn test_run_export_with_demo_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = DemoSource::signed_in("demo");
        let args = ExportArgs {
            report_type: ReportType::B2B,
            month: "latest".into(),
            regions: vec!["Asia".into()],
            countries: Vec::new(),
            score_filter: ScoreFilter::Top30,
            out: dir.path().to_path_buf(),
        };

        let path = run_export(&source, &args).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        // 表头 + Asia 4 国中的前 30%（2 行）
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_run_export_requires_login() {
        let dir = tempfile::tempdir().unwrap();
        let source = DemoSource::new();
        let args = ExportArgs {
            report_type: ReportType::B2B,
            month: "latest".into(),
            regions: Vec::new(),
            countries: Vec::new(),
            score_filter: ScoreFilter::All,
            out: dir.path().to_path_buf(),
        };
        assert!(run_export(&source, &args).is_err());
    }
}
