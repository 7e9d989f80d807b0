//! 仪表盘状态键与初始状态

use crate::models::{ReportType, ScoreFilter, Section, SortDir, SummaryRow, TrendData, User};
use crate::store::{Key, Store};

pub const USER: Key<Option<User>> = Key::new("user");
pub const IS_AUTHENTICATED: Key<bool> = Key::new("is_authenticated");

pub const REPORT_TYPE: Key<ReportType> = Key::new("report_type");
pub const YEAR: Key<Option<i32>> = Key::new("year");
pub const MONTH: Key<Option<u32>> = Key::new("month");
pub const SELECTED_REGIONS: Key<Vec<String>> = Key::new("selected_regions");
pub const SELECTED_COUNTRIES: Key<Vec<String>> = Key::new("selected_countries");

pub const SECTION: Key<Section> = Key::new("section");

pub const SUMMARY_DATA: Key<Vec<SummaryRow>> = Key::new("summary_data");
pub const TREND_DATA: Key<TrendData> = Key::new("trend_data");

pub const SORT_COL: Key<Option<String>> = Key::new("sort_col");
pub const SORT_DIR: Key<SortDir> = Key::new("sort_dir");
pub const SCORE_FILTER: Key<ScoreFilter> = Key::new("score_filter");

pub const LOADING: Key<bool> = Key::new("loading");
pub const ERROR: Key<Option<String>> = Key::new("error");

/// 全部键名
pub const NAMES: [&str; 15] = [
    USER.name(),
    IS_AUTHENTICATED.name(),
    REPORT_TYPE.name(),
    YEAR.name(),
    MONTH.name(),
    SELECTED_REGIONS.name(),
    SELECTED_COUNTRIES.name(),
    SECTION.name(),
    SUMMARY_DATA.name(),
    TREND_DATA.name(),
    SORT_COL.name(),
    SORT_DIR.name(),
    SCORE_FILTER.name(),
    LOADING.name(),
    ERROR.name(),
];

/// 创建带初始状态的存储
pub fn initial_store() -> Store {
    let store = Store::new();
    store
        .update()
        .with(USER, &None)
        .with(IS_AUTHENTICATED, &false)
        .with(REPORT_TYPE, &ReportType::B2B)
        .with(YEAR, &None)
        .with(MONTH, &None)
        .with(SELECTED_REGIONS, &Vec::new())
        .with(SELECTED_COUNTRIES, &Vec::new())
        .with(SECTION, &Section::Dashboard)
        .with(SUMMARY_DATA, &Vec::new())
        .with(TREND_DATA, &TrendData::default())
        .with(SORT_COL, &None)
        .with(SORT_DIR, &SortDir::Asc)
        .with(SCORE_FILTER, &ScoreFilter::All)
        .with(LOADING, &false)
        .with(ERROR, &None)
        .apply();
    store
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let store = initial_store();
        assert_eq!(store.get_typed(REPORT_TYPE), Some(ReportType::B2B));
        assert_eq!(store.get_typed(SECTION), Some(Section::Dashboard));
        assert_eq!(store.get_typed(YEAR), Some(None));
        assert!(store.get_or_default(SUMMARY_DATA).is_empty());
        assert_eq!(store.get_typed(SCORE_FILTER), Some(ScoreFilter::All));
        assert_eq!(store.get_all().len(), NAMES.len());
        for name in NAMES {
            assert!(store.get(name).is_some(), "{name} missing");
        }
    }
}
