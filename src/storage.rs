//! 偏好设置持久化 (~/.local/share/esdash/prefs.toml)
//!
//! 只保存会话之间需要保留的少量状态：上次的报表类型、分区、地区选择和收藏的国家。

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::keys;
use crate::models::{ReportType, Section};
use crate::store::Store;

/// TOML 文件结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefsData {
    pub meta: PrefsMeta,
    #[serde(default)]
    pub report_type: ReportType,
    #[serde(default)]
    pub section: Section,
    #[serde(default)]
    pub selected_regions: Vec<String>,
    #[serde(default)]
    pub favorites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefsMeta {
    pub version: String,
    pub created_at: DateTime<Local>,
    pub last_modified: DateTime<Local>,
}

impl Default for PrefsData {
    fn default() -> Self {
        let now = Local::now();
        Self {
            meta: PrefsMeta {
                version: "1.0".to_string(),
                created_at: now,
                last_modified: now,
            },
            report_type: ReportType::default(),
            section: Section::default(),
            selected_regions: Vec::new(),
            favorites: Vec::new(),
        }
    }
}

/// 运行时偏好（带脏标记）
#[derive(Debug, Clone, Default)]
pub struct Prefs {
    pub data: PrefsData,
    pub dirty: bool,
}

impl Prefs {
    pub fn from_data(data: PrefsData) -> Self {
        Self { data, dirty: false }
    }

    pub fn is_favorite(&self, country: &str) -> bool {
        self.data.favorites.iter().any(|c| c == country)
    }

    /// 切换收藏，返回切换后是否为收藏
    pub fn toggle_favorite(&mut self, country: &str) -> bool {
        self.dirty = true;
        if self.is_favorite(country) {
            self.data.favorites.retain(|c| c != country);
            false
        } else {
            self.data.favorites.push(country.to_string());
            self.data.favorites.sort();
            true
        }
    }

    /// 把保存的偏好写入状态存储
    pub fn apply_to(&self, store: &Store) {
        store
            .update()
            .with(keys::REPORT_TYPE, &self.data.report_type)
            .with(keys::SECTION, &self.data.section)
            .with(keys::SELECTED_REGIONS, &self.data.selected_regions)
            .apply();
    }

    /// 从状态存储读取当前值，有变化时标记为脏
    pub fn capture_from(&mut self, store: &Store) {
        let report_type = store.get_or_default(keys::REPORT_TYPE);
        let section = store.get_or_default(keys::SECTION);
        let regions = store.get_or_default(keys::SELECTED_REGIONS);

        if report_type != self.data.report_type
            || section != self.data.section
            || regions != self.data.selected_regions
        {
            self.data.report_type = report_type;
            self.data.section = section;
            self.data.selected_regions = regions;
            self.dirty = true;
        }
    }
}

/// 从TOML文件加载偏好
pub fn load_prefs(path: &Path) -> io::Result<Prefs> {
    if !path.exists() {
        return Ok(Prefs::default());
    }

    let content = fs::read_to_string(path)?;
    let data: PrefsData =
        toml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    tracing::debug!(path = %path.display(), favorites = data.favorites.len(), "偏好已加载");
    Ok(Prefs::from_data(data))
}

/// 保存偏好到TOML文件（无改动时跳过）
pub fn save_prefs(prefs: &mut Prefs, path: &Path) -> io::Result<()> {
    if !prefs.dirty {
        return Ok(());
    }

    prefs.data.meta.last_modified = Local::now();
    let content = toml::to_string_pretty(&prefs.data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;

    prefs.dirty = false;
    tracing::debug!(path = %path.display(), "偏好已保存");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = load_prefs(&dir.path().join("prefs.toml")).unwrap();
        assert_eq!(prefs.data.report_type, ReportType::B2B);
        assert!(!prefs.dirty);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.toml");

        let mut prefs = Prefs::default();
        prefs.data.report_type = ReportType::B2C;
        prefs.data.section = Section::Summary;
        assert!(prefs.toggle_favorite("KR"));
        save_prefs(&mut prefs, &path).unwrap();
        assert!(!prefs.dirty);

        let loaded = load_prefs(&path).unwrap();
        assert_eq!(loaded.data.report_type, ReportType::B2C);
        assert_eq!(loaded.data.section, Section::Summary);
        assert!(loaded.is_favorite("KR"));
    }

    #[test]
    fn test_clean_prefs_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        let mut prefs = Prefs::default();
        save_prefs(&mut prefs, &path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_toml_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        fs::write(&path, "meta = 3").unwrap();
        let err = load_prefs(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_toggle_favorite() {
        let mut prefs = Prefs::default();
        assert!(prefs.toggle_favorite("US"));
        assert!(prefs.toggle_favorite("DE"));
        assert_eq!(prefs.data.favorites, vec!["DE", "US"]);
        assert!(!prefs.toggle_favorite("US"));
        assert_eq!(prefs.data.favorites, vec!["DE"]);
    }

    #[test]
    fn test_apply_and_capture_through_store() {
        let store = keys::initial_store();
        let mut prefs = Prefs::default();
        prefs.data.section = Section::Checklist;
        prefs.apply_to(&store);
        assert_eq!(store.get_typed(keys::SECTION), Some(Section::Checklist));

        prefs.capture_from(&store);
        assert!(!prefs.dirty);

        store.set_typed(keys::SELECTED_REGIONS, &vec!["Asia".to_string()]);
        prefs.capture_from(&store);
        assert!(prefs.dirty);
        assert_eq!(prefs.data.selected_regions, vec!["Asia"]);
    }
}
