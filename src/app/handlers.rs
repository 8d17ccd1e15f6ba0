//! キー入力ハンドラー関数。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;

use crate::{
    events::Screen,
    input::{InputBoxState, InputCallbackId},
    mapping::TargetField,
    select::{SelectBoxState, SelectCallbackId},
    shortcuts,
    worker::WorkerCmd,
    workflow::Phase,
};

use super::{App, request_overview};

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // ポップアップが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        return handle_input_box_key(app, k).await;
    }
    if app.select_box.is_some() {
        return handle_select_box_key(app, k);
    }

    // 失敗表示中は確認操作だけを受け付ける。
    if app.workflow.phase() == Phase::Failed {
        return handle_failed_key(app, k);
    }

    // 画面ごとのハンドラへ委譲する。
    match app.ui.screen {
        Screen::Upload => handle_upload_key(app, k).await,
        Screen::Mapping => handle_mapping_key(app, k).await,
        Screen::Results => handle_results_key(app, k),
        Screen::Dashboard => handle_dashboard_key(app, k).await,
    }
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// 失敗表示中のキー処理。確認で失敗前のフェーズへ戻る。
fn handle_failed_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    if matches!(k.code, KeyCode::Enter | KeyCode::Esc)
        && let Some(resumed) = app.workflow.acknowledge_failure()
    {
        // 戻り先フェーズに対応する画面へ合わせる。
        app.ui.error = None;
        app.ui.screen = match resumed {
            Phase::ReviewingMapping => Screen::Mapping,
            _ => Screen::Upload,
        };
        app.ui.status = "Ready".into();
    }
    Ok(false)
}

/// アップロード画面のキー処理。
async fn handle_upload_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // アップロード画面のショートカットを参照する。
    let sc = &app.shortcuts.upload;

    if shortcuts::matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if shortcuts::matches_shortcut(&k, &sc.choose_file) {
        // ファイルパスの入力ボックスを開く。
        let current = app
            .staged_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        app.input_box = Some(InputBoxState::new(
            "File path:",
            current,
            InputCallbackId::UploadFilePath,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.toggle_storage) {
        // 保存先を切り替える。
        app.storage = app.storage.toggled();
        app.ui.status = format!("Storage: {}", app.storage.label());
    } else if shortcuts::matches_shortcut(&k, &sc.upload) {
        // アップロードを開始する。解決待ち中の二重開始は状態機械が拒否する。
        let Some(path) = app.staged_file.clone() else {
            app.ui.status = "Choose a file first (press f)".into();
            return Ok(false);
        };
        match app.workflow.begin_upload() {
            Ok(token) => {
                app.worker_tx
                    .send(WorkerCmd::Upload {
                        token,
                        path: path.clone(),
                        storage: app.storage,
                    })
                    .await?;
                app.ui.status = format!("Uploading {}...", path.display());
            }
            Err(e) => {
                app.ui.status = e.to_string();
            }
        }
    } else if shortcuts::matches_shortcut(&k, &sc.dashboard) {
        // ダッシュボード画面へ遷移し、未取得なら集計を取りに行く。
        app.ui.screen = Screen::Dashboard;
        app.ui.selected = 0;
        if app.dashboard.overview.is_none() && !app.dashboard.loading {
            request_overview(app).await?;
        }
    }

    Ok(false)
}

/// マッピング確認画面のキー処理。
async fn handle_mapping_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // マッピング画面のショートカットを参照する。
    let sc = &app.shortcuts.mapping;

    if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // セッションを破棄してアップロード画面へ戻る。
        // 確定の解決待ち中でも破棄できる（遅延応答はトークン照合で落ちる）。
        if app.workflow.cancel() {
            app.ui.screen = Screen::Upload;
            app.ui.selected = 0;
            app.ui.status = "Mapping cancelled".into();
        }
        return Ok(false);
    }

    // 解決待ち中はキャンセル以外の操作を受け付けない。
    if app.workflow.is_in_flight() {
        return Ok(false);
    }

    let total = app
        .workflow
        .session()
        .map(|s| s.mappings.len())
        .unwrap_or(0);

    if shortcuts::matches_shortcut(&k, &sc.down) {
        // 次の行へ移動する。
        if app.ui.selected + 1 < total {
            app.ui.selected += 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.up) {
        // 前の行へ移動する。
        if app.ui.selected > 0 {
            app.ui.selected -= 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.table) {
        // 取り込み先テーブルの選択ボックスを開く。
        if let Some(session) = app.workflow.session()
            && let Some(entry) = session.mappings.get(app.ui.selected)
        {
            let choices: Vec<String> = session.schema.table_names().map(String::from).collect();
            app.select_box = Some(SelectBoxState::new(
                "Target table",
                choices,
                &entry.target_table,
                SelectCallbackId::TargetTable,
            ));
        }
    } else if shortcuts::matches_shortcut(&k, &sc.column) {
        // 取り込み先カラムの選択ボックスを開く（テーブル未選択時は案内）。
        if let Some(session) = app.workflow.session()
            && let Some(entry) = session.mappings.get(app.ui.selected)
        {
            if entry.target_table.is_empty() {
                app.ui.status = "Select a target table first (press t)".into();
            } else {
                let choices = session.schema.column_labels(&entry.target_table);
                app.select_box = Some(SelectBoxState::new(
                    "Target column",
                    choices,
                    &entry.target_column,
                    SelectCallbackId::TargetColumn,
                ));
            }
        }
    } else if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 完全性ゲート：未選択エントリが残っている間は確定を受け付けない。
        // begin_confirm側の防御チェックも同じ述語で拒否する。
        if !app.workflow.can_confirm() {
            let unmapped = app
                .workflow
                .session()
                .map(|s| s.mappings.incomplete_count())
                .unwrap_or(0);
            app.ui.status = format!("Cannot confirm: {unmapped} field(s) still unmapped");
            return Ok(false);
        }
        match app.workflow.begin_confirm() {
            Ok((token, payload)) => {
                app.worker_tx
                    .send(WorkerCmd::Confirm { token, payload })
                    .await?;
                app.ui.status = "Confirming mappings...".into();
            }
            Err(e) => {
                app.ui.status = format!("Cannot confirm: {e}");
            }
        }
    }

    Ok(false)
}

/// 結果表示画面のキー処理。
fn handle_results_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 結果画面のショートカットを参照する。
    let sc = &app.shortcuts.results;

    if shortcuts::matches_shortcut(&k, &sc.close) {
        // セッションを片付け、次のアップロードに備える。
        if app.workflow.close_results() {
            app.staged_file = None;
            app.ui.screen = Screen::Upload;
            app.ui.selected = 0;
            app.ui.status = "Ready".into();
        }
    }

    Ok(false)
}

/// ダッシュボード画面のキー処理。
async fn handle_dashboard_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // ダッシュボード画面のショートカットを参照する。
    let sc = &app.shortcuts.dashboard;

    // サマリポップアップ表示中はポップアップの操作を優先する。
    if app.dashboard.summary.is_some() {
        if shortcuts::matches_shortcut(&k, &sc.next_tab) {
            if let Some(summary) = app.dashboard.summary.as_mut() {
                summary.next_tab();
            }
        } else if shortcuts::matches_shortcut(&k, &sc.back) {
            app.dashboard.summary = None;
        }
        return Ok(false);
    }

    if shortcuts::matches_shortcut(&k, &sc.back) {
        // アップロード画面へ戻る。
        app.ui.screen = Screen::Upload;
        app.ui.selected = 0;
    } else if shortcuts::matches_shortcut(&k, &sc.refresh) {
        // 集計の再取得を依頼する。
        if !app.dashboard.loading {
            request_overview(app).await?;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.down) {
        // 次の行へ移動する。
        if app.ui.selected + 1 < app.dashboard.filtered_uploads().len() {
            app.ui.selected += 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.up) {
        // 前の行へ移動する。
        if app.ui.selected > 0 {
            app.ui.selected -= 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.filter) {
        // 絞り込み文字列の入力ボックスを開く。
        app.input_box = Some(InputBoxState::new(
            "Filter (name/status/id/records):",
            app.dashboard.filter.clone(),
            InputCallbackId::DashboardFilter,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.view) {
        // 選択中ファイルの処理サマリを取得する。
        let file_id = app
            .dashboard
            .filtered_uploads()
            .get(app.ui.selected)
            .map(|u| u.file_upload_id.clone());
        if let Some(file_id) = file_id {
            app.dashboard.summary_loading = Some(file_id.clone());
            app.worker_tx.send(WorkerCmd::FetchSummary { file_id }).await?;
            app.ui.status = "Loading summary...".into();
        }
    }

    Ok(false)
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが無ければ何もしない。
    let Some(input_state) = &mut app.input_box else {
        return Ok(false);
    };

    // 入力ボックス用ショートカットを参照する。
    let sc = &app.shortcuts.input_box;

    if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 入力ボックスを閉じる前に値とコールバック種別を保存する。
        let value = input_state.value.clone();
        let callback_id = input_state.callback_id.clone();
        app.input_box = None;

        // コールバック種別に応じて値を反映する。
        apply_input_callback(app, callback_id, value);
    } else if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 入力を破棄して入力ボックスを閉じる。
        app.input_box = None;
    } else if shortcuts::matches_shortcut(&k, &sc.backspace) {
        input_state.backspace();
    } else if shortcuts::matches_shortcut(&k, &sc.delete) {
        input_state.delete();
    } else if shortcuts::matches_shortcut(&k, &sc.left) {
        input_state.move_left();
    } else if shortcuts::matches_shortcut(&k, &sc.right) {
        input_state.move_right();
    } else if shortcuts::matches_shortcut(&k, &sc.home) {
        input_state.move_home();
    } else if shortcuts::matches_shortcut(&k, &sc.end) {
        input_state.move_end();
    } else if shortcuts::matches_shortcut(&k, &sc.clear_line) {
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code {
        // コントロールキーでない通常の文字入力のみ挿入する。
        if !k.modifiers.contains(KeyModifiers::CONTROL) {
            input_state.insert_char(c);
        }
    }

    Ok(false)
}

/// 入力ボックスのコールバックを適用する。
fn apply_input_callback(app: &mut App, callback_id: InputCallbackId, value: String) {
    match callback_id {
        InputCallbackId::UploadFilePath => {
            // 空入力は選択解除として扱う。
            let trimmed = value.trim();
            if trimmed.is_empty() {
                app.staged_file = None;
                app.ui.status = "File selection cleared".into();
                return;
            }
            let path = PathBuf::from(trimmed);
            if path.is_file() {
                // ステージしてファイル名をステータスに出す。
                app.ui.status = format!(
                    "Staged {}",
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string())
                );
                app.staged_file = Some(path);
            } else {
                app.ui.status = format!("File not found: {trimmed}");
            }
        }
        InputCallbackId::DashboardFilter => {
            // 絞り込みを更新し、選択を先頭に戻す。
            app.dashboard.filter = value;
            app.ui.selected = 0;
        }
    }
}

/// 選択ボックスのキー処理。
fn handle_select_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 選択ボックスが無ければ何もしない。
    let Some(select_state) = &mut app.select_box else {
        return Ok(false);
    };

    // 選択ボックス用ショートカットを参照する。
    let sc = &app.shortcuts.select_box;

    if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 選択値を取り出してからボックスを閉じる。
        let value = select_state.current().to_string();
        let callback_id = select_state.callback_id;
        app.select_box = None;

        // 選択値をマッピングへ反映する。テーブル変更はカラムを連動クリアする。
        let field = match callback_id {
            SelectCallbackId::TargetTable => TargetField::Table,
            SelectCallbackId::TargetColumn => TargetField::Column,
        };
        if let Err(e) = app.workflow.edit_target(app.ui.selected, field, value) {
            app.ui.status = format!("Edit rejected: {e}");
        }
    } else if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 選択を破棄してボックスを閉じる。
        app.select_box = None;
    } else if shortcuts::matches_shortcut(&k, &sc.down) {
        select_state.move_down();
    } else if shortcuts::matches_shortcut(&k, &sc.up) {
        select_state.move_up();
    }

    Ok(false)
}
