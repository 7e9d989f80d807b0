//! App 状态定义 (Model)
//!
//! 仪表盘的共享状态都在 `Store` 里；这里只放界面自身的状态（光标、弹窗、输入框）
//! 以及不需要广播的数据（期间、筛选项、明细行）。

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::keys;
use crate::models::{FilterOptions, Periods, RawRows, ReportConfig, SummaryRow};
use crate::source::DataSource;
use crate::storage::Prefs;
use crate::store::{Store, Subscription};
use crate::table::{self, TableView};

/// 应用状态
pub struct App {
    pub store: Store,
    pub source: Box<dyn DataSource>,
    pub prefs: Prefs,
    pub export_dir: PathBuf,
    pub periods: Periods,
    pub options: FilterOptions,
    pub detail: Option<DetailView>,
    pub selected_index: usize,
    /// 汇总表中当前聚焦的列（用于排序）
    pub column_cursor: usize,
    pub mode: AppMode,
    pub input_buffer: String,
    pub input_field: InputField,
    pub temp_username: String,
    pub message: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub last_refresh: Instant,
    redraw: Rc<Cell<bool>>,
    subscriptions: Vec<Subscription>,
}

/// 应用模式
#[derive(Debug, Clone, PartialEq)]
pub enum AppMode {
    Login,
    Normal,
    Picking(Picker),
    Confirm(ConfirmAction),
}

/// 多选弹窗
#[derive(Debug, Clone, PartialEq)]
pub struct Picker {
    pub target: PickTarget,
    pub items: Vec<String>,
    pub cursor: usize,
    pub chosen: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickTarget {
    Region,
    Country,
}

impl PickTarget {
    pub fn title(&self) -> &'static str {
        match self {
            PickTarget::Region => "选择地区",
            PickTarget::Country => "选择国家",
        }
    }
}

/// 确认操作类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmAction {
    Logout,
}

/// 登录表单字段
#[derive(Debug, Clone, PartialEq)]
pub enum InputField {
    Username,
    Password,
}

/// 明细视图：某个地区/国家的原始行
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub region: Option<String>,
    pub country: Option<String>,
    pub rows: RawRows,
}

impl App {
    /// 创建新的应用实例，订阅存储中影响界面的键
    pub fn new(store: Store, source: Box<dyn DataSource>, prefs: Prefs, export_dir: PathBuf) -> Self {
        let redraw = Rc::new(Cell::new(true));
        // 任一键变化都需要重绘
        let mut subscriptions: Vec<Subscription> = keys::NAMES
            .iter()
            .map(|key| {
                let redraw = Rc::clone(&redraw);
                store.subscribe(key, move |_, _| {
                    redraw.set(true);
                    Ok(())
                })
            })
            .collect();
        subscriptions.push(store.subscribe_typed(keys::ERROR, |error, _| {
            if let Some(error) = error {
                tracing::debug!(%error, "错误状态已更新");
            }
            Ok(())
        }));

        Self {
            store,
            source,
            prefs,
            export_dir,
            periods: Periods::default(),
            options: FilterOptions::default(),
            detail: None,
            selected_index: 0,
            column_cursor: 0,
            mode: AppMode::Login,
            input_buffer: String::new(),
            input_field: InputField::Username,
            temp_username: String::new(),
            message: None,
            refresh_interval: None,
            last_refresh: Instant::now(),
            redraw,
            subscriptions,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// 取出并清除重绘标记
    pub fn take_redraw(&self) -> bool {
        self.redraw.replace(false)
    }

    pub fn mark_redraw(&self) {
        self.redraw.set(true);
    }

    /// 退出前取消订阅
    pub fn detach(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }

    pub fn config(&self) -> &'static ReportConfig {
        self.store.get_or_default(keys::REPORT_TYPE).config()
    }

    pub fn table_view(&self) -> TableView {
        TableView {
            sort_col: self.store.get_or_default(keys::SORT_COL),
            sort_dir: self.store.get_or_default(keys::SORT_DIR),
            score_filter: self.store.get_or_default(keys::SCORE_FILTER),
        }
    }

    /// 汇总表当前显示的行（得分筛选、排序后）
    pub fn visible_rows(&self) -> Vec<SummaryRow> {
        let rows = self.store.get_or_default(keys::SUMMARY_DATA);
        table::visible_rows(&rows, &self.table_view())
    }

    pub fn selected_row(&self) -> Option<SummaryRow> {
        self.visible_rows().into_iter().nth(self.selected_index)
    }

    /// 当前聚焦的列名
    pub fn focused_column(&self) -> &'static str {
        let columns = self.config().columns;
        columns
            .get(self.column_cursor.min(columns.len().saturating_sub(1)))
            .copied()
            .unwrap_or("total_score_pct")
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.get_or_default(keys::IS_AUTHENTICATED)
    }
}
