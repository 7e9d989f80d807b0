//! 视图层模块
//!
//! 包含主渲染入口和各分区视图。视图只读取状态，不做任何修改。

pub mod components;
pub mod layouts;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell as TableCell, Chart, Clear, Dataset,
        GraphType, List, ListItem, ListState, Paragraph, Row, Table, TableState, Tabs,
    },
};
use serde_json::Value;

use super::state::{App, AppMode, ConfirmAction, DetailView, InputField, Picker};
use crate::format::{PLACEHOLDER, fmt_int, fmt_pct, fmt_score, score_band};
use crate::keys;
use crate::models::{ReportConfig, Section, SummaryRow, month_param};
use crate::summary::{region_bars, region_stats, score_cards};
use components::{
    band_color, render_dialog_framework, render_input_widget, render_score_card,
};
use layouts::{centered_rect, even_columns};

/// 折线与柱子的配色
const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::LightRed,
];

/// 仪表盘最多显示的卡片数
const MAX_CARDS: usize = 6;

/// 渲染 UI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // 分区标签
            Constraint::Length(3), // 筛选条
            Constraint::Min(10),   // 内容
            Constraint::Length(3), // 帮助
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_filter_bar(frame, app, chunks[1]);

    if app.is_authenticated() {
        match app.store.get_or_default(keys::SECTION) {
            Section::Dashboard => render_dashboard(frame, app, chunks[2]),
            Section::Summary => render_summary_table(frame, app, chunks[2]),
            Section::Detail => render_detail(frame, app, chunks[2]),
            Section::Checklist => render_checklist(frame, app, chunks[2]),
        }
    } else {
        let hint = Paragraph::new("请先登录")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(hint, chunks[2]);
    }

    render_help(frame, app, chunks[3]);

    // 渲染弹窗
    match &app.mode {
        AppMode::Login => render_login_dialog(frame, app),
        AppMode::Picking(picker) => render_picker(frame, picker),
        AppMode::Confirm(action) => render_confirm_dialog(frame, action),
        AppMode::Normal => {}
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let section = app.store.get_or_default(keys::SECTION);
    let report_type = app.store.get_or_default(keys::REPORT_TYPE);
    let user = app
        .store
        .get_or_default(keys::USER)
        .map(|u| {
            if u.is_admin() {
                format!("{} (admin)", u.username)
            } else {
                u.username
            }
        })
        .unwrap_or_else(|| "未登录".to_string());

    let titles: Vec<Line> = Section::ALL
        .iter()
        .enumerate()
        .map(|(i, s)| Line::from(format!("{} {}", i + 1, s.title())))
        .collect();

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" 📊 ES Dashboard · {report_type} · {user} ")),
        )
        .select(section.index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn selection_text(selected: &[String]) -> String {
    if selected.is_empty() {
        "All".to_string()
    } else if selected.len() <= 3 {
        selected.join(", ")
    } else {
        format!("{} 项", selected.len())
    }
}

fn render_filter_bar(frame: &mut Frame, app: &App, area: Rect) {
    let store = &app.store;
    let period = month_param(
        store.get_or_default(keys::YEAR),
        store.get_or_default(keys::MONTH),
    );
    let regions = store.get_or_default(keys::SELECTED_REGIONS);
    let countries = store.get_or_default(keys::SELECTED_COUNTRIES);
    let view = app.table_view();

    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);
    let mut spans = vec![
        Span::styled("期间 ", label),
        Span::styled(period, value),
        Span::styled("  地区 ", label),
        Span::styled(selection_text(&regions), value),
        Span::styled("  国家 ", label),
        Span::styled(selection_text(&countries), value),
        Span::styled("  得分 ", label),
        Span::styled(view.score_filter.label(), value),
    ];
    if let Some(column) = &view.sort_col {
        spans.push(Span::styled("  排序 ", label));
        spans.push(Span::styled(
            format!("{}{}", app.config().label_for(column), view.sort_dir.arrow()),
            value,
        ));
    }
    if store.get_or_default(keys::LOADING) {
        spans.push(Span::styled("  加载中…", Style::default().fg(Color::Yellow)));
    }
    if let Some(error) = store.get_or_default(keys::ERROR) {
        spans.push(Span::styled(
            format!("  ⚠ {error}"),
            Style::default().fg(Color::Red),
        ));
    }

    let bar = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(bar, area);
}

// ============ 仪表盘 ============

fn render_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let rows = app.store.get_or_default(keys::SUMMARY_DATA);
    let config = app.config();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Percentage(50),
            Constraint::Min(6),
        ])
        .split(area);

    let cards = score_cards(&rows, config);
    if cards.is_empty() {
        let empty = Paragraph::new("暂无数据").block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, chunks[0]);
    } else {
        let shown = &cards[..cards.len().min(MAX_CARDS)];
        for (card, slot) in shown.iter().zip(even_columns(chunks[0], shown.len())) {
            render_score_card(frame, slot, card);
        }
    }

    render_region_bars(frame, &rows, config, chunks[1]);
    render_trend(frame, app, chunks[2]);
}

fn render_region_bars(frame: &mut Frame, rows: &[SummaryRow], config: &ReportConfig, area: Rect) {
    let mut chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("各项平均得分（按地区）"),
        )
        .bar_width(3)
        .bar_gap(0)
        .group_gap(3);

    for group in region_bars(rows, config) {
        let bars: Vec<Bar> = group
            .values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                Bar::default()
                    .value((value * 10.0).round() as u64)
                    .text_value(fmt_score(Some(*value), 0))
                    .style(Style::default().fg(PALETTE[i % PALETTE.len()]))
            })
            .collect();
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(group.region))
                .bars(&bars),
        );
    }
    frame.render_widget(chart, area);
}

fn render_trend(frame: &mut Frame, app: &App, area: Rect) {
    let trend = app.store.get_or_default(keys::TREND_DATA);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("总分趋势（按月）");
    if trend.is_empty() {
        frame.render_widget(Paragraph::new("暂无趋势数据").block(block), area);
        return;
    }

    let points: Vec<Vec<(f64, f64)>> = trend
        .series
        .iter()
        .map(|series| {
            series
                .data
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
                .collect()
        })
        .collect();

    let values = points.iter().flatten().map(|(_, y)| *y);
    let lo = values.clone().fold(f64::INFINITY, f64::min);
    let hi = values.fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if lo.is_finite() && hi.is_finite() {
        (((lo - 5.0) / 10.0).floor() * 10.0, ((hi + 5.0) / 10.0).ceil() * 10.0)
    } else {
        (0.0, 100.0)
    };

    let datasets: Vec<Dataset> = trend
        .series
        .iter()
        .zip(&points)
        .enumerate()
        .map(|(i, (series, data))| {
            Dataset::default()
                .name(series.region.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(PALETTE[i % PALETTE.len()]))
                .data(data)
        })
        .collect();

    let x_max = trend.labels.len().saturating_sub(1).max(1) as f64;
    let x_labels: Vec<String> = match trend.labels.as_slice() {
        [] => Vec::new(),
        [only] => vec![only.clone()],
        [first, .., last] => vec![first.clone(), last.clone()],
    };

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([lo, hi])
                .labels(vec![format!("{lo:.0}"), format!("{hi:.0}")]),
        );
    frame.render_widget(chart, area);
}

// ============ 汇总表 ============

/// 单元格显示文本
fn display_cell(row: &SummaryRow, column: &str, config: &ReportConfig) -> String {
    match column {
        "sku_count" => fmt_int(row.sku_count),
        "total_score_pct" => fmt_pct(row.total_score_pct, 1),
        column if config.is_score_column(column) => fmt_score(row.number(column), 1),
        column => match row.cell(column).as_text() {
            text if text.is_empty() => PLACEHOLDER.to_string(),
            text => text,
        },
    }
}

fn column_width(column: &str, config: &ReportConfig) -> Constraint {
    match column {
        "region" => Constraint::Length(14),
        "country" => Constraint::Length(9),
        other => Constraint::Length((config.label_for(other).chars().count() as u16 + 3).max(8)),
    }
}

fn render_summary_table(frame: &mut Frame, app: &App, area: Rect) {
    let config = app.config();
    let view = app.table_view();
    let rows = app.visible_rows();

    let header = Row::new(config.columns.iter().enumerate().map(|(i, column)| {
        let mut label = config.label_for(column).to_string();
        if view.sort_col.as_deref() == Some(*column) {
            label.push_str(view.sort_dir.arrow());
        }
        let mut style = Style::default().add_modifier(Modifier::BOLD);
        if i == app.column_cursor {
            style = style.fg(Color::Yellow).add_modifier(Modifier::UNDERLINED);
        }
        TableCell::from(label).style(style)
    }));

    let body: Vec<Row> = rows
        .iter()
        .map(|row| {
            Row::new(config.columns.iter().map(|column| {
                let mut text = display_cell(row, column, config);
                if *column == "country" && app.prefs.is_favorite(&row.country) {
                    text.push_str(" ★");
                }
                let style = match (*column, row.total_score_pct) {
                    ("total_score_pct", Some(pct)) => Style::default().fg(band_color(score_band(pct))),
                    _ => Style::default(),
                };
                TableCell::from(text).style(style)
            }))
        })
        .collect();

    let widths: Vec<Constraint> = config
        .columns
        .iter()
        .map(|column| column_width(column, config))
        .collect();

    let table = Table::new(body, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("汇总 ({} 行)", rows.len())),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▶ ");

    let mut state = TableState::default().with_selected(Some(app.selected_index));
    frame.render_stateful_widget(table, area, &mut state);
}

// ============ 明细 ============

fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => PLACEHOLDER.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|v| fmt_score(Some(v), 2))
            .unwrap_or_else(|| n.to_string()),
        Some(other) => other.to_string(),
    }
}

fn detail_columns(config: &ReportConfig) -> Vec<&'static str> {
    let mut columns = vec!["region", "country"];
    if config.columns.contains(&"division") {
        columns.push("division");
    }
    columns.push("sku");
    columns.extend(config.score_columns.iter().copied());
    columns
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let Some(DetailView {
        region,
        country,
        rows,
    }) = &app.detail
    else {
        let hint = Paragraph::new("在汇总表中按 Enter 查看某个国家的明细")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("明细"));
        frame.render_widget(hint, area);
        return;
    };

    let config = app.config();
    let columns = detail_columns(config);
    let scope = match (region, country) {
        (_, Some(country)) => country.clone(),
        (Some(region), None) => region.clone(),
        (None, None) => "全部".to_string(),
    };

    let header = Row::new(columns.iter().map(|column| {
        let label = match config.label_for(column) {
            "" => "SKU",
            label => label,
        };
        TableCell::from(label).style(Style::default().add_modifier(Modifier::BOLD))
    }));
    let body: Vec<Row> = rows
        .items
        .iter()
        .map(|record| Row::new(columns.iter().map(|column| value_text(record.get(*column)))))
        .collect();
    let widths: Vec<Constraint> = columns
        .iter()
        .map(|column| match *column {
            "sku" => Constraint::Length(16),
            other => column_width(other, config),
        })
        .collect();

    let table = Table::new(body, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(format!(
            "明细 · {scope} ({}/{})",
            rows.items.len(),
            rows.total
        )))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default().with_selected(Some(app.selected_index));
    frame.render_stateful_widget(table, area, &mut state);
}

// ============ 检查项 ============

fn render_checklist(frame: &mut Frame, app: &App, area: Rect) {
    let config = app.config();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mut items: Vec<ListItem> = config
        .score_columns
        .iter()
        .zip(config.score_labels)
        .enumerate()
        .map(|(i, (column, label))| {
            ListItem::new(Line::from(vec![
                Span::styled("■ ", Style::default().fg(PALETTE[i % PALETTE.len()])),
                Span::styled(format!("{label:<12}"), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(*column, Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();
    items.push(ListItem::new(""));
    items.push(ListItem::new(format!("满分 {} pts", config.total_max)));
    for (text, pct) in [("≥ 90%  Good", 90.0), ("≥ 70%  Warn", 70.0), ("< 70%  Needs work", 0.0)] {
        items.push(ListItem::new(Span::styled(
            text,
            Style::default().fg(band_color(score_band(pct))),
        )));
    }

    let legend = List::new(items).block(Block::default().borders(Borders::ALL).title("检查项"));
    frame.render_widget(legend, chunks[0]);

    let rows = app.store.get_or_default(keys::SUMMARY_DATA);
    let stats: Vec<Row> = region_stats(&rows)
        .into_iter()
        .map(|stat| {
            Row::new(vec![
                TableCell::from(stat.region),
                TableCell::from(stat.country_count.to_string()),
                TableCell::from(fmt_pct(Some(stat.avg_total_score), 1))
                    .style(Style::default().fg(band_color(score_band(stat.avg_total_score)))),
            ])
        })
        .collect();
    let table = Table::new(
        stats,
        [
            Constraint::Min(14),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(
        Row::new(["Region", "Countries", "Avg %"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("地区统计"));
    frame.render_widget(table, chunks[1]);
}

// ============ 帮助与弹窗 ============

fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = match &app.mode {
        AppMode::Normal => match app.store.get_or_default(keys::SECTION) {
            Section::Summary => {
                "[h/l] 列  [s] 排序  [f] 前/后30%  [Enter] 明细  [*] 收藏  [x] 导出  [Tab] 分区  [q] 退出"
            }
            _ => {
                "[Tab/1-4] 分区  [t] B2B/B2C  [ [ ] ] 月  [ { } ] 年  [g] 地区  [c] 国家  [z] 清除  [r] 刷新  [L] 注销  [q] 退出"
            }
        },
        AppMode::Login => match app.input_field {
            InputField::Username => "输入用户名后按 [Enter] 继续  [Esc] 退出",
            InputField::Password => "输入密码后按 [Enter] 登录  [Esc] 返回",
        },
        AppMode::Picking(_) => "[j/k] 移动  [Space] 选择  [a] 全选/全不选  [Enter] 确认  [Esc] 取消",
        AppMode::Confirm(_) => "[y] 确认  [n] 取消",
    };

    let message = app.message.as_deref().unwrap_or("");
    let text = if message.is_empty() {
        help_text.to_string()
    } else {
        format!("{}  |  {}", help_text, message)
    };

    let help = Paragraph::new(text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));

    frame.render_widget(help, area);
}

fn render_login_dialog(frame: &mut Frame, app: &App) {
    let area = centered_rect(50, 40, frame.area());
    let inner = render_dialog_framework(frame, area, "登录");

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(inner);

    let on_username = app.input_field == InputField::Username;
    let username = if on_username {
        &app.input_buffer
    } else {
        &app.temp_username
    };
    render_input_widget(frame, chunks[0], "用户名", username, on_username, false);

    let password = if on_username { "" } else { &app.input_buffer };
    render_input_widget(frame, chunks[1], "密码", password, !on_username, true);

    let hint = app.message.as_deref().unwrap_or("Enter 继续，Esc 退出");
    frame.render_widget(
        Paragraph::new(hint).style(Style::default().fg(Color::Gray)),
        chunks[2],
    );
}

fn render_picker(frame: &mut Frame, picker: &Picker) {
    let area = centered_rect(40, 60, frame.area());
    let inner = render_dialog_framework(
        frame,
        area,
        &format!("{} ({}/{})", picker.target.title(), picker.chosen.len(), picker.items.len()),
    );

    let items: Vec<ListItem> = picker
        .items
        .iter()
        .map(|item| {
            let mark = if picker.chosen.contains(item) { "[x]" } else { "[ ]" };
            ListItem::new(format!("{mark} {item}"))
        })
        .collect();

    let list = List::new(items)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        );

    let mut state = ListState::default();
    state.select(Some(picker.cursor));
    frame.render_stateful_widget(list, inner, &mut state);
}

fn render_confirm_dialog(frame: &mut Frame, action: &ConfirmAction) {
    let area = centered_rect(50, 20, frame.area());
    frame.render_widget(Clear, area);

    let message = match action {
        ConfirmAction::Logout => "确认注销当前用户？",
    };

    let dialog = Paragraph::new(format!("{}\n\n[y] 确认  [n] 取消", message))
        .style(Style::default().fg(Color::Red))
        .block(Block::default().title("⚠️ 确认操作").borders(Borders::ALL));

    frame.render_widget(dialog, area);
}
