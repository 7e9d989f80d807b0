//! Action 枚举定义 (Intent)
//!
//! 用户交互转化为明确的语义化 Action

use crate::models::Section;

/// 用户操作枚举
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    MoveSelectionUp,
    MoveSelectionDown,

    // 分区
    NextSection,
    PrevSection,
    GoTo(Section),

    // 报表与期间
    ToggleReportType,
    NextYear,
    PrevYear,
    NextMonth,
    PrevMonth,

    // 表格
    FocusNextColumn,
    FocusPrevColumn,
    SortFocusedColumn,
    CycleScoreFilter,
    OpenDetail,

    // 筛选
    PickRegions,
    PickCountries,
    ClearFilters,
    ToggleItem,
    ToggleAll,

    Refresh,
    Export,
    ToggleFavorite,
    StartLogout,

    // 表单/通用交互
    Cancel,      // Esc / n
    Submit,      // Enter / y
    Input(char), // 输入字符
    DeleteChar,  // Backspace
}
