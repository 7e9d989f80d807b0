//! 通用 UI 组件
//!
//! 对话框、输入框、得分卡片等通用组件

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::format::ScoreBand;
use crate::summary::ScoreCard;

/// 得分档位对应的颜色
pub fn band_color(band: ScoreBand) -> Color {
    match band {
        ScoreBand::Good => Color::Green,
        ScoreBand::Warn => Color::Yellow,
        ScoreBand::Bad => Color::Red,
    }
}

/// [组件] 弹窗基础框架
pub fn render_dialog_framework(frame: &mut Frame, area: Rect, title: &str) -> Rect {
    frame.render_widget(Clear, area);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    inner
}

/// [组件] 带有标题和样式的输入框，`masked` 时用 `*` 显示
pub fn render_input_widget(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    value: &str,
    is_focused: bool,
    masked: bool,
) {
    let style = if is_focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    let shown = if masked {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let input = Paragraph::new(shown)
        .style(style)
        .wrap(Wrap { trim: false })
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(input, area);
}

/// [组件] 得分卡片
pub fn render_score_card(frame: &mut Frame, area: Rect, card: &ScoreCard) {
    let value_style = card
        .band
        .map(|band| Style::default().fg(band_color(band)))
        .unwrap_or_default()
        .add_modifier(Modifier::BOLD);

    let text = vec![
        Line::from(Span::styled(card.value.clone(), value_style)),
        Line::from(Span::styled(
            card.sub.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let widget = Paragraph::new(text).block(
        Block::default()
            .title(card.label.as_str())
            .borders(Borders::ALL),
    );
    frame.render_widget(widget, area);
}
