//! 键盘事件映射 (Input -> Action)
//!
//! 将按键事件转换为 Action

use crossterm::event::KeyCode;

use super::actions::Action;
use super::state::{App, AppMode};
use crate::models::Section;

/// 根据当前模式和按键获取对应的 Action
pub fn get_action(mode: &AppMode, key: KeyCode) -> Option<Action> {
    match mode {
        AppMode::Normal => match key {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::MoveSelectionDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::MoveSelectionUp),
            KeyCode::Tab => Some(Action::NextSection),
            KeyCode::BackTab => Some(Action::PrevSection),
            KeyCode::Char('1') => Some(Action::GoTo(Section::Dashboard)),
            KeyCode::Char('2') => Some(Action::GoTo(Section::Summary)),
            KeyCode::Char('3') => Some(Action::GoTo(Section::Detail)),
            KeyCode::Char('4') => Some(Action::GoTo(Section::Checklist)),
            KeyCode::Char('t') => Some(Action::ToggleReportType),
            KeyCode::Char(']') => Some(Action::NextMonth),
            KeyCode::Char('[') => Some(Action::PrevMonth),
            KeyCode::Char('}') => Some(Action::NextYear),
            KeyCode::Char('{') => Some(Action::PrevYear),
            KeyCode::Char('l') | KeyCode::Right => Some(Action::FocusNextColumn),
            KeyCode::Char('h') | KeyCode::Left => Some(Action::FocusPrevColumn),
            KeyCode::Char('s') => Some(Action::SortFocusedColumn),
            KeyCode::Char('f') => Some(Action::CycleScoreFilter),
            KeyCode::Enter => Some(Action::OpenDetail),
            KeyCode::Char('g') => Some(Action::PickRegions),
            KeyCode::Char('c') => Some(Action::PickCountries),
            KeyCode::Char('z') => Some(Action::ClearFilters),
            KeyCode::Char('r') => Some(Action::Refresh),
            KeyCode::Char('x') => Some(Action::Export),
            KeyCode::Char('*') => Some(Action::ToggleFavorite),
            KeyCode::Char('L') => Some(Action::StartLogout),
            _ => None,
        },
        AppMode::Login => match key {
            KeyCode::Esc => Some(Action::Cancel),
            KeyCode::Enter => Some(Action::Submit),
            KeyCode::Backspace => Some(Action::DeleteChar),
            KeyCode::Char(c) => Some(Action::Input(c)),
            _ => None,
        },
        AppMode::Picking(_) => match key {
            KeyCode::Esc => Some(Action::Cancel),
            KeyCode::Enter => Some(Action::Submit),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::MoveSelectionDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::MoveSelectionUp),
            KeyCode::Char(' ') => Some(Action::ToggleItem),
            KeyCode::Char('a') => Some(Action::ToggleAll),
            _ => None,
        },
        AppMode::Confirm(_) => match key {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::Submit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(Action::Cancel),
            _ => None,
        },
    }
}

/// 处理按键事件，返回是否退出
pub fn handle_key_event(app: &mut App, key: KeyCode) -> bool {
    let Some(action) = get_action(&app.mode, key) else {
        return false;
    };
    app.mark_redraw();
    app.dispatch(action)
}
