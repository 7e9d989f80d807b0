//! 业务逻辑处理 (Update/Dispatch)
//!
//! 包含核心的 dispatch 逻辑和各种业务处理方法。
//! 共享状态一律写入 `Store`，界面通过订阅得知需要重绘。

use std::time::Instant;

use super::actions::Action;
use super::state::{App, AppMode, ConfirmAction, DetailView, InputField, PickTarget, Picker};
use crate::export;
use crate::keys;
use crate::models::{
    FilterOptions, Periods, ScoreFilter, Section, SortDir, SummaryRow, TrendData, TrendRow, User,
    month_param,
};
use crate::router;
use crate::source::{ApiError, SummaryQuery, TrendBy};
use crate::summary::build_trend;
use crate::table;

/// 明细视图最多拉取的行数
const DETAIL_LIMIT: usize = 200;

impl App {
    /// 核心逻辑分发，返回是否退出
    pub fn dispatch(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return true,
            Action::MoveSelectionUp => self.move_up(),
            Action::MoveSelectionDown => self.move_down(),

            Action::NextSection => {
                let next = self.store.get_or_default(keys::SECTION).next();
                self.go_to(next);
            }
            Action::PrevSection => {
                let prev = self.store.get_or_default(keys::SECTION).prev();
                self.go_to(prev);
            }
            Action::GoTo(section) => self.go_to(section),

            Action::ToggleReportType => self.toggle_report_type(),
            Action::NextYear => self.step_year(1),
            Action::PrevYear => self.step_year(-1),
            Action::NextMonth => self.step_month(1),
            Action::PrevMonth => self.step_month(-1),

            Action::FocusNextColumn => self.step_column(1),
            Action::FocusPrevColumn => self.step_column(-1),
            Action::SortFocusedColumn => self.sort_focused_column(),
            Action::CycleScoreFilter => self.cycle_score_filter(),
            Action::OpenDetail => self.open_detail(),

            Action::PickRegions => self.start_pick(PickTarget::Region),
            Action::PickCountries => self.start_pick(PickTarget::Country),
            Action::ClearFilters => self.clear_filters(),
            Action::ToggleItem => self.toggle_item(),
            Action::ToggleAll => self.toggle_all(),

            Action::Refresh => {
                self.refresh();
                if self.store.get_or_default(keys::ERROR).is_none() {
                    self.message = Some("数据已刷新".to_string());
                }
            }
            Action::Export => self.export_visible(),
            Action::ToggleFavorite => self.toggle_favorite(),
            Action::StartLogout => self.mode = AppMode::Confirm(ConfirmAction::Logout),

            Action::Cancel => return self.cancel(),

            Action::Submit => match &self.mode {
                AppMode::Login => match self.input_field {
                    InputField::Username => {
                        if !self.input_buffer.trim().is_empty() {
                            self.move_to_password_input();
                        }
                    }
                    InputField::Password => self.submit_login(),
                },
                AppMode::Picking(_) => self.confirm_pick(),
                AppMode::Confirm(ConfirmAction::Logout) => self.confirm_logout(),
                AppMode::Normal => {}
            },

            Action::Input(c) => {
                if self.mode == AppMode::Login {
                    self.input_buffer.push(c);
                }
            }

            Action::DeleteChar => {
                if self.mode == AppMode::Login {
                    self.input_buffer.pop();
                }
            }
        }
        false
    }

    // ============ 会话相关 ============

    /// 启动：已有会话时直接进入，否则尝试配置中的凭据，最后回到登录框
    pub fn start(&mut self, credentials: Option<(String, String)>) {
        match self.source.me() {
            Ok(user) => self.on_signed_in(user),
            Err(err) => {
                tracing::debug!(error = %err, "无有效会话");
                match credentials {
                    Some((username, password)) => self.login(&username, &password),
                    None => self.show_login(),
                }
            }
        }
    }

    pub fn login(&mut self, username: &str, password: &str) {
        match self.source.login(username, password) {
            Ok(user) => self.on_signed_in(user),
            Err(err) => {
                tracing::warn!(user = username, error = %err, "登录失败");
                self.show_login();
                self.message = Some(format!("登录失败: {err}"));
            }
        }
    }

    fn on_signed_in(&mut self, user: User) {
        tracing::info!(user = %user.username, role = %user.role, "已登录");
        self.message = Some(format!("欢迎, {}", user.username));
        self.store
            .update()
            .with(keys::USER, &Some(user))
            .with(keys::IS_AUTHENTICATED, &true)
            .with(keys::ERROR, &None)
            .apply();
        self.mode = AppMode::Normal;
        self.input_buffer.clear();
        self.temp_username.clear();

        self.load_periods();
        self.refresh();
    }

    fn show_login(&mut self) {
        self.mode = AppMode::Login;
        self.input_field = InputField::Username;
        self.input_buffer.clear();
        self.temp_username.clear();
    }

    /// 切换到密码输入
    pub fn move_to_password_input(&mut self) {
        self.temp_username = self.input_buffer.trim().to_string();
        self.input_buffer.clear();
        self.input_field = InputField::Password;
    }

    fn submit_login(&mut self) {
        let username = self.temp_username.clone();
        let password = std::mem::take(&mut self.input_buffer);
        self.login(&username, &password);
    }

    /// 清空会话相关状态并回到登录框
    fn sign_out(&mut self) {
        self.store
            .update()
            .with(keys::USER, &None)
            .with(keys::IS_AUTHENTICATED, &false)
            .with(keys::SUMMARY_DATA, &Vec::<SummaryRow>::new())
            .with(keys::TREND_DATA, &TrendData::default())
            .with(keys::LOADING, &false)
            .apply();
        self.periods = Periods::default();
        self.options = FilterOptions::default();
        self.detail = None;
        self.selected_index = 0;
        self.show_login();
    }

    fn confirm_logout(&mut self) {
        if let Err(err) = self.source.logout() {
            tracing::warn!(error = %err, "注销请求失败，仍清除本地会话");
        }
        tracing::info!("已注销");
        self.sign_out();
        self.message = Some("已注销".to_string());
    }

    // ============ 数据加载 ============

    /// 读取可选期间，并选中最新的年份和月份
    pub fn load_periods(&mut self) {
        let report_type = self.store.get_or_default(keys::REPORT_TYPE);
        match self.source.reports() {
            Ok(reports) => {
                self.periods = Periods::from_reports(&reports, report_type);
                if self.periods.is_empty() {
                    tracing::info!(report_type = %report_type, "没有按月的报表，使用最新数据");
                }
                let year = self.periods.latest_year();
                let month = year.and_then(|y| self.periods.latest_month(y));
                self.store
                    .update()
                    .with(keys::YEAR, &year)
                    .with(keys::MONTH, &month)
                    .apply();
            }
            Err(err) => self.report_error("读取报表列表失败", err),
        }
    }

    fn current_query(&self) -> SummaryQuery {
        SummaryQuery {
            report_type: self.store.get_or_default(keys::REPORT_TYPE),
            month: month_param(
                self.store.get_or_default(keys::YEAR),
                self.store.get_or_default(keys::MONTH),
            ),
            regions: self.store.get_or_default(keys::SELECTED_REGIONS),
            countries: self.store.get_or_default(keys::SELECTED_COUNTRIES),
        }
    }

    fn fetch(
        &self,
        query: &SummaryQuery,
    ) -> Result<(Vec<SummaryRow>, FilterOptions, TrendData), ApiError> {
        let rows = self.source.summary(query)?;
        let options = self.source.filters(query)?;
        let trend_rows: Vec<TrendRow> = self
            .source
            .trend(query.report_type, TrendBy::Month)?
            .into_iter()
            .filter(|row| query.regions.is_empty() || query.regions.contains(&row.region))
            .filter(|row| query.countries.is_empty() || query.countries.contains(&row.country))
            .collect();
        Ok((rows, options, build_trend(&trend_rows)))
    }

    /// 按当前筛选重新拉取汇总、筛选项与趋势
    pub fn refresh(&mut self) {
        if !self.is_authenticated() {
            return;
        }

        let query = self.current_query();
        tracing::debug!(
            report_type = %query.report_type,
            month = %query.month,
            regions = query.regions.len(),
            countries = query.countries.len(),
            "刷新数据"
        );
        self.store.set_typed(keys::LOADING, &true);
        let result = self.fetch(&query);
        self.last_refresh = Instant::now();

        match result {
            Ok((rows, options, trend)) => {
                self.options = options;
                self.store
                    .update()
                    .with(keys::SUMMARY_DATA, &rows)
                    .with(keys::TREND_DATA, &trend)
                    .with(keys::ERROR, &None)
                    .with(keys::LOADING, &false)
                    .apply();
                self.clamp_selection();
            }
            Err(err) => {
                self.store.set_typed(keys::LOADING, &false);
                self.report_error("加载数据失败", err);
            }
        }
    }

    /// 定时刷新，到期时执行并返回 true
    pub fn poll_refresh(&mut self, now: Instant) -> bool {
        let Some(interval) = self.refresh_interval else {
            return false;
        };
        if self.mode == AppMode::Login || !self.is_authenticated() {
            return false;
        }
        if now.saturating_duration_since(self.last_refresh) < interval {
            return false;
        }
        tracing::debug!(interval_secs = interval.as_secs(), "定时刷新");
        self.refresh();
        true
    }

    fn load_detail(&mut self, region: Option<String>, country: Option<String>) {
        let report_type = self.store.get_or_default(keys::REPORT_TYPE);
        match self
            .source
            .raw(report_type, region.as_deref(), country.as_deref(), DETAIL_LIMIT)
        {
            Ok(rows) => {
                self.detail = Some(DetailView {
                    region,
                    country,
                    rows,
                });
                self.selected_index = 0;
            }
            Err(err) => self.report_error("读取明细失败", err),
        }
    }

    fn report_error(&mut self, context: &str, err: ApiError) {
        if matches!(err, ApiError::Unauthorized) {
            tracing::warn!(context, "会话已失效");
            self.sign_out();
            self.message = Some("登录已过期，请重新登录".to_string());
            return;
        }
        tracing::warn!(context, error = %err, "请求失败");
        let text = format!("{context}: {err}");
        self.store.set_typed(keys::ERROR, &Some(text.clone()));
        self.message = Some(text);
    }

    // ============ 导航相关 ============

    /// 向上移动选择
    pub fn move_up(&mut self) {
        if let AppMode::Picking(picker) = &mut self.mode {
            picker.cursor = picker.cursor.saturating_sub(1);
        } else if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    /// 向下移动选择
    pub fn move_down(&mut self) {
        if let AppMode::Picking(picker) = &mut self.mode {
            if picker.cursor + 1 < picker.items.len() {
                picker.cursor += 1;
            }
        } else if self.selected_index + 1 < self.list_len() {
            self.selected_index += 1;
        }
    }

    /// 当前分区中可选中的行数
    fn list_len(&self) -> usize {
        match self.store.get_or_default(keys::SECTION) {
            Section::Summary => self.visible_rows().len(),
            Section::Detail => self.detail.as_ref().map_or(0, |d| d.rows.items.len()),
            Section::Dashboard | Section::Checklist => 0,
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.list_len();
        if len == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= len {
            self.selected_index = len - 1;
        }
    }

    fn go_to(&mut self, section: Section) {
        router::navigate(&self.store, section);
        self.selected_index = 0;
        if section == Section::Detail && self.detail.is_none() {
            self.load_detail(None, None);
        }
    }

    /// 汇总表中选中行的明细
    fn open_detail(&mut self) {
        if self.store.get_or_default(keys::SECTION) != Section::Summary {
            return;
        }
        if let Some(row) = self.selected_row() {
            self.load_detail(Some(row.region), Some(row.country));
            router::navigate(&self.store, Section::Detail);
        }
    }

    // ============ 报表与期间 ============

    /// 切换报表类型：筛选、得分筛选与排序一并重置
    fn toggle_report_type(&mut self) {
        let report_type = self.store.get_or_default(keys::REPORT_TYPE).toggle();
        tracing::info!(report_type = %report_type, "切换报表类型");
        self.store
            .update()
            .with(keys::REPORT_TYPE, &report_type)
            .with(keys::SELECTED_REGIONS, &Vec::<String>::new())
            .with(keys::SELECTED_COUNTRIES, &Vec::<String>::new())
            .with(keys::SCORE_FILTER, &ScoreFilter::All)
            .with(keys::SORT_COL, &None)
            .with(keys::SORT_DIR, &SortDir::Asc)
            .apply();
        self.column_cursor = 0;
        self.selected_index = 0;
        self.detail = None;

        self.load_periods();
        self.refresh();
    }

    /// 换年后选中该年最新的月份
    fn step_year(&mut self, delta: isize) {
        let years = self.periods.years();
        let current = self.store.get_or_default(keys::YEAR);
        let Some(year) = step(&years, current, delta) else {
            return;
        };
        if Some(year) == current {
            return;
        }
        let month = self.periods.latest_month(year);
        self.store
            .update()
            .with(keys::YEAR, &Some(year))
            .with(keys::MONTH, &month)
            .apply();
        self.refresh();
    }

    fn step_month(&mut self, delta: isize) {
        let Some(year) = self.store.get_or_default(keys::YEAR) else {
            return;
        };
        let months = self.periods.months(year);
        let current = self.store.get_or_default(keys::MONTH);
        let Some(month) = step(&months, current, delta) else {
            return;
        };
        if Some(month) == current {
            return;
        }
        self.store.set_typed(keys::MONTH, &Some(month));
        self.refresh();
    }

    // ============ 表格 ============

    fn step_column(&mut self, delta: isize) {
        let len = self.config().columns.len();
        if len == 0 {
            return;
        }
        self.column_cursor = (self.column_cursor as isize + delta).rem_euclid(len as isize) as usize;
    }

    fn sort_focused_column(&mut self) {
        let column = self.focused_column();
        let current_col = self.store.get_or_default(keys::SORT_COL);
        let current_dir = self.store.get_or_default(keys::SORT_DIR);
        let (column, dir) = table::toggle_sort(current_col.as_deref(), current_dir, column);

        self.message = Some(format!(
            "按 {}{} 排序",
            self.config().label_for(&column),
            dir.arrow()
        ));
        self.store
            .update()
            .with(keys::SORT_COL, &Some(column))
            .with(keys::SORT_DIR, &dir)
            .apply();
    }

    fn cycle_score_filter(&mut self) {
        let filter = self.store.get_or_default(keys::SCORE_FILTER).cycle();
        self.store.set_typed(keys::SCORE_FILTER, &filter);
        self.selected_index = 0;
        self.message = Some(format!("得分筛选: {}", filter.label()));
    }

    // ============ 地区/国家筛选 ============

    fn start_pick(&mut self, target: PickTarget) {
        let (items, chosen) = match target {
            PickTarget::Region => (
                self.options.regions.clone(),
                self.store.get_or_default(keys::SELECTED_REGIONS),
            ),
            PickTarget::Country => (
                self.options.countries.clone(),
                self.store.get_or_default(keys::SELECTED_COUNTRIES),
            ),
        };
        // 已不在候选项中的旧选择不再显示
        let chosen = table::retain_selected(&chosen, &items);
        if items.is_empty() {
            self.message = Some("没有可选项".to_string());
            return;
        }
        self.mode = AppMode::Picking(Picker {
            target,
            items,
            cursor: 0,
            chosen,
        });
    }

    fn toggle_item(&mut self) {
        if let AppMode::Picking(picker) = &mut self.mode {
            let Some(item) = picker.items.get(picker.cursor).cloned() else {
                return;
            };
            if picker.chosen.contains(&item) {
                picker.chosen.retain(|c| *c != item);
            } else {
                picker.chosen.push(item);
            }
        }
    }

    fn toggle_all(&mut self) {
        if let AppMode::Picking(picker) = &mut self.mode {
            if picker.chosen.len() == picker.items.len() {
                picker.chosen.clear();
            } else {
                picker.chosen = picker.items.clone();
            }
        }
    }

    /// 确认选择：地区变化时清空国家
    fn confirm_pick(&mut self) {
        let AppMode::Picking(picker) = std::mem::replace(&mut self.mode, AppMode::Normal) else {
            return;
        };
        // 按候选项顺序保存
        let chosen: Vec<String> = picker
            .items
            .iter()
            .filter(|item| picker.chosen.contains(item))
            .cloned()
            .collect();

        match picker.target {
            PickTarget::Region => {
                self.store
                    .update()
                    .with(keys::SELECTED_REGIONS, &chosen)
                    .with(keys::SELECTED_COUNTRIES, &Vec::<String>::new())
                    .apply();
            }
            PickTarget::Country => {
                self.store.set_typed(keys::SELECTED_COUNTRIES, &chosen);
            }
        }
        self.selected_index = 0;
        self.refresh();
    }

    fn clear_filters(&mut self) {
        self.store
            .update()
            .with(keys::SELECTED_REGIONS, &Vec::<String>::new())
            .with(keys::SELECTED_COUNTRIES, &Vec::<String>::new())
            .with(keys::SCORE_FILTER, &ScoreFilter::All)
            .apply();
        self.selected_index = 0;
        self.message = Some("筛选已清除".to_string());
        self.refresh();
    }

    // ============ 导出与收藏 ============

    fn export_visible(&mut self) {
        let report_type = self.store.get_or_default(keys::REPORT_TYPE);
        let rows = self.visible_rows();
        match export::export_to_dir(&self.export_dir, report_type, &rows) {
            Ok(path) => {
                self.message = Some(format!("已导出 {} 行到 {}", rows.len(), path.display()));
            }
            Err(err) => {
                tracing::warn!(error = %err, "导出失败");
                self.message = Some(format!("导出失败: {err}"));
            }
        }
    }

    fn toggle_favorite(&mut self) {
        if self.store.get_or_default(keys::SECTION) != Section::Summary {
            return;
        }
        let Some(row) = self.selected_row() else {
            return;
        };
        let starred = self.prefs.toggle_favorite(&row.country);
        self.message = Some(if starred {
            format!("已收藏 {}", row.country)
        } else {
            format!("已取消收藏 {}", row.country)
        });
    }

    // ============ 通用操作 ============

    /// 取消当前操作，登录框中返回 true 表示退出
    pub fn cancel(&mut self) -> bool {
        match self.mode {
            AppMode::Login => {
                if self.input_field == InputField::Password {
                    self.input_buffer = std::mem::take(&mut self.temp_username);
                    self.input_field = InputField::Username;
                    false
                } else {
                    true
                }
            }
            AppMode::Picking(_) | AppMode::Confirm(_) => {
                self.mode = AppMode::Normal;
                false
            }
            AppMode::Normal => {
                self.message = None;
                false
            }
        }
    }
}

/// 在有序列表中按步长移动，越界时停在两端；当前值不在列表中时取最后一项
fn step<T: Copy + PartialEq>(items: &[T], current: Option<T>, delta: isize) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let last = items.len() - 1;
    let index = match current.and_then(|c| items.iter().position(|i| *i == c)) {
        Some(index) => (index as isize + delta).clamp(0, last as isize) as usize,
        None => last,
    };
    items.get(index).copied()
}
