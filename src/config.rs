//! 配置
//!
//! 优先级从高到低：
//! 1. 命令行参数
//! 2. 环境变量（`ESDASH_*`）
//! 3. 配置文件 (~/.config/esdash/config.toml)
//! 4. 内置默认值

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path} 失败: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置文件 {path} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{key} 的值无效: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// 生效的配置
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// 后端地址
    pub api_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
    /// 自动刷新间隔（秒），0 表示关闭
    pub refresh_secs: u64,
    /// CSV 导出目录
    pub export_dir: PathBuf,
    /// 日志目录
    pub log_dir: PathBuf,
    /// 默认日志级别（RUST_LOG 优先）
    pub log_level: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 使用内置演示数据
    pub demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 15,
            refresh_secs: 60,
            export_dir: dirs::download_dir().unwrap_or_else(|| data_dir.join("exports")),
            log_dir: data_dir.join("logs"),
            log_level: "info".to_string(),
            username: None,
            password: None,
            demo: false,
        }
    }
}

/// 配置文件结构（全部可选）
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub refresh_secs: Option<u64>,
    pub export_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 数据目录 (~/.local/share/esdash/)
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("esdash")
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("esdash").join("config.toml"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_secs > 0).then(|| Duration::from_secs(self.refresh_secs))
    }

    /// 读取配置文件（不存在时为空）
    pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
        if !path.exists() {
            return Ok(FileConfig::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 合并配置文件与环境变量
    pub fn from_sources<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let parse_secs = |key: &'static str, file_value: Option<u64>, default: u64| {
            match env(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
                None => Ok(file_value.unwrap_or(default)),
            }
        };

        let timeout_secs =
            parse_secs("ESDASH_TIMEOUT_SECS", file.timeout_secs, defaults.timeout_secs)?;
        let refresh_secs =
            parse_secs("ESDASH_REFRESH_SECS", file.refresh_secs, defaults.refresh_secs)?;

        let log_level = env("ESDASH_LOG_LEVEL")
            .or(file.log_level)
            .unwrap_or(defaults.log_level);
        if !matches!(
            log_level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::InvalidValue {
                key: "log_level",
                value: log_level,
            });
        }

        Ok(Self {
            api_url: env("ESDASH_API_URL")
                .or(file.api_url)
                .unwrap_or(defaults.api_url),
            timeout_secs,
            refresh_secs,
            export_dir: env("ESDASH_EXPORT_DIR")
                .map(PathBuf::from)
                .or(file.export_dir)
                .unwrap_or(defaults.export_dir),
            log_dir: env("ESDASH_LOG_DIR")
                .map(PathBuf::from)
                .or(file.log_dir)
                .unwrap_or(defaults.log_dir),
            log_level: log_level.to_ascii_lowercase(),
            username: env("ESDASH_USER").or(file.username),
            password: env("ESDASH_PASSWORD").or(file.password),
            demo: false,
        })
    }

    /// 从默认配置文件与进程环境加载
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path.map(Path::to_path_buf).or_else(Self::config_path) {
            Some(path) => Self::load_file(&path)?,
            None => FileConfig::default(),
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// 以配置文件格式输出（密码隐藏）
    pub fn to_toml(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "api_url = {:?}", self.api_url);
        let _ = writeln!(out, "timeout_secs = {}", self.timeout_secs);
        let _ = writeln!(out, "refresh_secs = {}", self.refresh_secs);
        let _ = writeln!(out, "export_dir = {:?}", self.export_dir.display().to_string());
        let _ = writeln!(out, "log_dir = {:?}", self.log_dir.display().to_string());
        let _ = writeln!(out, "log_level = {:?}", self.log_level);
        if let Some(username) = &self.username {
            let _ = writeln!(out, "username = {username:?}");
        }
        if self.password.is_some() {
            let _ = writeln!(out, "# password = \"********\"");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = Config::from_sources(FileConfig::default(), env_from(&[])).unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:8000");
        assert_eq!(config.refresh_secs, 60);
        assert_eq!(config.log_level, "info");
        assert!(config.username.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            api_url: Some("http://file:8000".into()),
            refresh_secs: Some(30),
            username: Some("file-user".into()),
            ..Default::default()
        };
        let env = env_from(&[
            ("ESDASH_API_URL", "http://env:9000"),
            ("ESDASH_LOG_LEVEL", "DEBUG"),
        ]);

        let config = Config::from_sources(file, env).unwrap();
        assert_eq!(config.api_url, "http://env:9000");
        assert_eq!(config.refresh_secs, 30);
        assert_eq!(config.username.as_deref(), Some("file-user"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_env_values() {
        let err = Config::from_sources(
            FileConfig::default(),
            env_from(&[("ESDASH_REFRESH_SECS", "soon")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "ESDASH_REFRESH_SECS", .. }));

        let err = Config::from_sources(
            FileConfig::default(),
            env_from(&[("ESDASH_LOG_LEVEL", "loud")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "log_level", .. }));
    }

    #[test]
    fn test_refresh_interval_zero_disables() {
        let config = Config {
            refresh_secs: 0,
            ..Config::default()
        };
        assert!(config.refresh_interval().is_none());
        assert_eq!(config.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_load_file_and_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(Config::load_file(&path).unwrap().api_url.is_none());

        std::fs::write(&path, "api_url = \"http://dash:8000\"\nrefresh_secs = 5\n").unwrap();
        let file = Config::load_file(&path).unwrap();
        assert_eq!(file.api_url.as_deref(), Some("http://dash:8000"));
        assert_eq!(file.refresh_secs, Some(5));

        std::fs::write(&path, "colour = \"blue\"\n").unwrap();
        assert!(matches!(
            Config::load_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_to_toml_round_trips_through_file_config() {
        let config = Config {
            username: Some("analyst".into()),
            password: Some("secret".into()),
            ..Config::default()
        };
        let text = config.to_toml();
        assert!(!text.contains("secret"));
        let parsed: FileConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.api_url.as_deref(), Some(config.api_url.as_str()));
        assert_eq!(parsed.username.as_deref(), Some("analyst"));
    }
}
