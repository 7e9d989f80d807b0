mod cli;
mod config;
mod export;
mod format;
mod keys;
mod logging;
mod models;
mod router;
mod source;
mod storage;
mod store;
mod summary;
mod table;
mod ui;

use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use crate::cli::{Cli, Commands, ExportArgs};
use crate::config::{Config, VERSION};
use crate::source::{ApiClient, DataSource, DemoSource};
use crate::storage::{load_prefs, save_prefs};
use crate::ui::{App, render};

/// 事件轮询间隔
const TICK: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("加载配置失败")?;
    cli.apply(&mut config);

    match cli.command {
        Some(Commands::Config { show, path }) => {
            cli::handle_config(&config, show, path);
            Ok(())
        }
        Some(Commands::Export {
            report_type,
            month,
            regions,
            countries,
            score_filter,
            out,
        }) => {
            logging::init_stderr(&config.log_level)?;
            let mut source = open_source(&config)?;
            if let Some((username, password)) = credentials(&config) {
                source
                    .login(&username, &password)
                    .with_context(|| format!("以 {username} 登录失败"))?;
            }
            let args = ExportArgs {
                report_type,
                month,
                regions,
                countries,
                score_filter,
                out: out.unwrap_or_else(|| config.export_dir.clone()),
            };
            let path = cli::run_export(source.as_ref(), &args)?;
            println!("已导出到 {}", path.display());
            Ok(())
        }
        Some(Commands::Tui) | None => run_tui(&config, cli.open.as_deref()),
    }
}

/// 演示模式下直接以已登录状态启动
fn open_source(config: &Config) -> Result<Box<dyn DataSource>> {
    if config.demo {
        let username = config.username.as_deref().unwrap_or("demo");
        return Ok(Box::new(DemoSource::signed_in(username)));
    }
    let client = ApiClient::new(&config.api_url, config.timeout())
        .with_context(|| format!("无法连接后端 {}", config.api_url))?;
    Ok(Box::new(client))
}

fn credentials(config: &Config) -> Option<(String, String)> {
    match (&config.username, &config.password) {
        (Some(username), Some(password)) => Some((username.clone(), password.clone())),
        _ => None,
    }
}

fn run_tui(config: &Config, open: Option<&str>) -> Result<()> {
    let _guard = logging::init_file(&config.log_dir, &config.log_level)?;
    tracing::info!(version = VERSION, api_url = %config.api_url, demo = config.demo, "启动");

    // 偏好文件路径 (~/.local/share/esdash/prefs.toml)
    let prefs_path = crate::config::data_dir().join("prefs.toml");
    let prefs = load_prefs(&prefs_path)
        .with_context(|| format!("读取偏好失败: {}", prefs_path.display()))?;

    let store = keys::initial_store();
    prefs.apply_to(&store);
    if let Some(route) = open {
        router::route(&store, route);
    }

    let source = open_source(config)?;
    match source.health() {
        Ok(health) => tracing::info!(db_configured = health.db_configured, message = %health.message, "后端状态"),
        Err(err) => tracing::warn!(error = %err, "后端健康检查失败"),
    }

    // 创建应用状态
    let mut app = App::new(store, source, prefs, config.export_dir.clone())
        .with_refresh_interval(config.refresh_interval());
    app.start(credentials(config));

    // 设置终端
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // 主循环
    let result = run_app(&mut terminal, &mut app);

    // 恢复终端
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // 保存偏好
    app.prefs.capture_from(&app.store);
    app.detach();
    save_session(&mut app, &prefs_path)?;

    tracing::info!("退出");
    result
}

fn save_session(app: &mut App, prefs_path: &Path) -> Result<()> {
    if !app.prefs.dirty {
        return Ok(());
    }
    save_prefs(&mut app.prefs, prefs_path)
        .with_context(|| format!("保存偏好失败: {}", prefs_path.display()))?;
    println!("偏好已保存到 {}", prefs_path.display());
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        if app.take_redraw() {
            terminal.draw(|f| render(f, app))?;
        }

        if event::poll(TICK)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if ui::handle_key_event(app, key.code) {
                        break;
                    }
                }
                Event::Resize(_, _) => app.mark_redraw(),
                _ => {}
            }
        }

        app.poll_refresh(Instant::now());
    }
    Ok(())
}
