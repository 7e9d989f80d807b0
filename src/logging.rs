//! 日志初始化
//!
//! TUI 占用标准输出，日志写入按天滚动的文件；命令行子命令写到 stderr。
//! `RUST_LOG` 优先于配置中的级别。

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 默认过滤规则：只输出本程序的日志
pub fn default_directive(level: &str) -> String {
    format!("esdash={level}")
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

/// 文件日志，返回的 guard 必须存活到程序结束，否则缓冲的日志会丢失
pub fn init_file(log_dir: &Path, level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("无法创建日志目录 {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(log_dir, "esdash.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()
        .context("日志系统初始化失败")?;

    Ok(guard)
}

/// stderr 日志（非交互子命令）
pub fn init_stderr(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .context("日志系统初始化失败")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("debug"), "esdash=debug");
    }
}
