//! アプリケーションのエントリポイントとランタイム初期化。

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use tracing_appender::non_blocking::WorkerGuard;

mod api;
mod app;
mod config;
mod events;
mod input;
mod layout;
mod mapping;
mod schema;
mod select;
mod shortcuts;
mod worker;
mod workflow;

/// アプリ全体で使う端末型。
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// ファイルロギングを初期化し、非同期ガードを生存させる。
fn init_logging() -> Result<WorkerGuard> {
    // TUIの標準出力を汚さないよう、ファイルへ直接書き込む。
    let log_file = "upload_tui.log";
    let file_appender = tracing_appender::rolling::never(".", log_file);
    // 非同期書き込み用のラッパーとガードを用意する。
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // フォーマッタと出力先を設定して初期化する。
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    tracing::info!("logging to {}", log_file);
    Ok(guard)
}

/// 代替画面へ切り替え、rawモードを有効化する。
fn init_terminal() -> Result<Tui> {
    // キー入力を即時に受け取れるようrawモードへ切り替える。
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

/// 終了時に端末状態を元に戻す。
fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

#[tokio::main]
/// エントリポイント：ログ初期化→UI開始→端末復元。
async fn main() -> Result<()> {
    // ロガーを初期化し、ガードを保持して書き込みを継続させる。
    let _log_guard = init_logging()?;
    tracing::info!("app starting");
    // TUI用の端末状態へ切り替える。
    let mut terminal = init_terminal()?;
    // メインアプリを実行する。
    let res = app::run_app(&mut terminal).await;
    // 端末の状態を必ず元に戻す。
    restore_terminal()?;
    // エラーがあればログに残す。
    if let Err(ref e) = res {
        tracing::error!("app error: {e}");
    }
    tracing::info!("app exiting");
    res
}
