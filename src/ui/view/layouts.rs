//! 布局辅助

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// 屏幕中央的弹窗区域（按百分比）
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// 横向等分为 `count` 块
pub fn even_columns(area: Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let constraints = vec![Constraint::Ratio(1, count as u32); count];
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area)
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_inside_parent() {
        let parent = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(50, 50, parent);
        assert_eq!(popup.width, 50);
        assert_eq!(popup.height, 20);
        assert_eq!(popup.x, 25);
        assert_eq!(popup.y, 10);
    }

    #[test]
    fn test_even_columns() {
        let parts = even_columns(Rect::new(0, 0, 90, 5), 3);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|r| r.width == 30));
        assert!(even_columns(Rect::new(0, 0, 90, 5), 0).is_empty());
    }
}
