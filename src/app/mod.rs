//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use anyhow::Result;
use crossterm::event::{self, Event};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc;

use crate::{
    api::StorageLocation,
    config::Config,
    events::{DashboardState, Screen, SummaryView, UiState},
    input::InputBoxState,
    select::SelectBoxState,
    shortcuts::Shortcuts,
    worker::{self, WorkerCmd, WorkerEvent},
    workflow::UploadWorkflow,
};

use handlers::{handle_key, is_ctrl_c};
use render::draw;

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// 永続化された設定ファイルのパス。
    pub cfg_path: PathBuf,
    /// メモリ上の現在設定。
    pub cfg: Config,
    /// 選択位置やステータスなどUI固有の状態。
    pub ui: UiState,
    /// アップロード→確認→確定を駆動する状態機械。
    pub workflow: UploadWorkflow,
    /// アップロード候補として選択中のファイル。
    pub staged_file: Option<PathBuf>,
    /// 次のアップロードで使う保存先。
    pub storage: StorageLocation,
    /// ダッシュボード画面の状態。
    pub dashboard: DashboardState,
    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,

    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,
    /// 選択ボックスの状態（選択中はSome）。
    pub select_box: Option<SelectBoxState>,

    /// ショートカットキー設定。
    pub shortcuts: Shortcuts,
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(terminal: &mut crate::Tui) -> Result<()> {
    // 設定ファイルを読み込む（初回はデフォルトを生成）。
    let cfg_path = PathBuf::from("config.toml");
    let cfg = Config::load_or_default(&cfg_path)?;

    // ショートカット設定を読み込む（無ければデフォルト）。
    let shortcuts_path = PathBuf::from("shortcut.toml");
    let shortcuts = Shortcuts::load_or_default(&shortcuts_path)?;

    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    // 解決済み設定のスナップショットでWorkerを起動する。
    tokio::spawn(worker::run(rx_cmd, tx_ev, cfg.clone()));

    // アプリ状態を初期化する。
    let mut app = App {
        cfg_path,
        storage: cfg.upload.storage_location,
        cfg,
        ui: UiState {
            screen: Screen::Upload,
            selected: 0,
            log: vec![],
            status: "Ready".into(),
            error: None,
        },
        workflow: UploadWorkflow::new(),
        staged_file: None,
        dashboard: DashboardState::default(),
        worker_tx: tx_cmd,
        worker_rx: rx_ev,
        input_box: None,
        select_box: None,
        shortcuts,
    };

    loop {
        // 現在の状態を描画する。
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev)?;
        }

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(k) = event::read()?
        {
            // どのフェーズでもCtrl+Cで終了できるようにする。
            if is_ctrl_c(&k) {
                break;
            }
            if handle_key(&mut app, k).await? {
                break;
            }
        }
    }
    Ok(())
}

/// WorkerイベントをUI状態へ反映する。
///
/// アップロード/確定の応答はワークフロー側のトークン照合を通してから
/// 適用する。破棄済みセッション宛の応答はここで捨てられる。
fn handle_worker_event(app: &mut App, ev: WorkerEvent) -> Result<()> {
    match ev {
        WorkerEvent::UploadFinished { token, response } => {
            if app.workflow.apply_upload_success(token, *response) {
                // マッピング確認画面へ遷移し、選択を先頭に戻す。
                app.ui.screen = Screen::Mapping;
                app.ui.selected = 0;
                app.ui.error = None;
                let total = app
                    .workflow
                    .session()
                    .map(|s| s.mappings.len())
                    .unwrap_or(0);
                app.ui.status = format!("Review {total} suggested mappings");
            }
        }
        WorkerEvent::UploadFailed { token, message } => {
            if app.workflow.apply_upload_failure(token, message.clone()) {
                // Failedフェーズに入る。確認操作でIdleへ戻る。
                app.ui.error = Some(format!("Upload failed: {message}"));
            }
        }
        WorkerEvent::ConfirmFinished { token, response } => {
            if app.workflow.apply_confirm_success(token, *response) {
                // 結果表示へ遷移する。行単位の失敗もここで表示される。
                app.ui.screen = Screen::Results;
                app.ui.status = "Processing finished".into();
            }
        }
        WorkerEvent::ConfirmFailed { token, message } => {
            if app.workflow.apply_confirm_failure(token, message.clone()) {
                // Failedフェーズに入る。確認操作でReviewingMappingへ戻る。
                app.ui.error = Some(format!("Confirm failed: {message}"));
            }
        }
        WorkerEvent::OverviewLoaded(overview) => {
            // 集計を置き換え、選択位置を一覧の範囲内に収める。
            app.dashboard.loading = false;
            app.dashboard.overview = Some(*overview);
            let rows = app.dashboard.filtered_uploads().len();
            app.ui.selected = app.ui.selected.min(rows.saturating_sub(1));
            app.ui.status = format!("Dashboard updated ({rows} uploads)");
        }
        WorkerEvent::OverviewFailed(e) => {
            // 直前の集計は画面に残したままエラーだけ知らせる。
            app.dashboard.loading = false;
            app.ui.status = format!("Error: {e}");
        }
        WorkerEvent::SummaryLoaded { file_id, summary } => {
            // 取得待ちでないファイルのサマリは捨てる。
            if app.dashboard.summary_loading.as_deref() == Some(file_id.as_str()) {
                app.dashboard.summary_loading = None;
                app.dashboard.summary = Some(SummaryView {
                    file_id,
                    tables: summary.tables(),
                    active: 0,
                });
                app.ui.status = "Summary loaded".into();
            }
        }
        WorkerEvent::SummaryFailed { file_id, message } => {
            if app.dashboard.summary_loading.as_deref() == Some(file_id.as_str()) {
                app.dashboard.summary_loading = None;
                app.ui.status = format!("Error: {message}");
            }
        }
        WorkerEvent::Log(s) => {
            // ログを追加する。
            app.ui.log.push(s);
        }
    }
    Ok(())
}

/// ダッシュボード集計の再取得をWorkerへ依頼する。
pub async fn request_overview(app: &mut App) -> Result<()> {
    tracing::info!("overview refresh requested");
    app.worker_tx.send(WorkerCmd::FetchOverview).await?;
    app.dashboard.loading = true;
    app.ui.status = "Loading dashboard...".into();
    Ok(())
}
