//! TUI描画関連の関数。

use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
};

use crate::{
    api::dashboard::SummaryTable,
    events::Screen,
    input, layout, select,
    shortcuts::Shortcuts,
    workflow::{Phase, SessionStatus},
};

use super::App;

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    // メインレイアウト（Body + HELP + STATUS）を作る。
    let main_layout = layout::create_main_layout(f.area());

    // 画面ごとのBody描画へ委譲する。
    match app.ui.screen {
        Screen::Upload => draw_upload_body(f, app, main_layout.body),
        Screen::Mapping => draw_mapping_body(f, app, main_layout.body),
        Screen::Results => draw_results_body(f, app, main_layout.body),
        Screen::Dashboard => draw_dashboard_body(f, app, main_layout.body),
    }

    // HELPバー（画面ごとのショートカット）を描画する。
    let help_text = get_help_text(&app.ui.screen, &app.shortcuts);
    let help_bar = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    // STATUSバー（画面名・進行情報・エラー）を描画する。
    let status_bar = build_status_bar(app);
    f.render_widget(status_bar, main_layout.status_bar);

    // サマリポップアップとボックス類は最後に重ねて描画する。
    if let Some(summary) = &app.dashboard.summary {
        draw_summary_popup(f, summary);
    }
    if let Some(select_state) = &app.select_box {
        select::render_select_box(f, select_state);
    }
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state);
    }
}

/// アップロード画面のBodyを描画する。
fn draw_upload_body(f: &mut Frame, app: &App, area: Rect) {
    let body_layout = layout::create_body_layout(area);

    // 左側：ステージ中のファイルとアップロード設定。
    let mut lines = vec![];
    match &app.staged_file {
        Some(path) => {
            lines.push(format!(
                "File: {}",
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            ));
            lines.push(format!("Path: {}", path.display()));
            // サイズはここで読めた場合のみ表示する。
            if let Ok(meta) = std::fs::metadata(path) {
                lines.push(format!("Size: {}", format_size(meta.len())));
            }
        }
        None => {
            lines.push("No file selected.".into());
            lines.push("Press f and enter a file path to stage it.".into());
        }
    }
    lines.push(String::new());
    lines.push(format!("Storage: {}", app.storage.label()));
    lines.push(String::new());
    lines.push("Supported: .xlsx .xls .csv .tsv .pdf .docx".into());
    if app.workflow.phase() == Phase::Uploading {
        lines.push(String::new());
        lines.push("Uploading... please wait.".into());
    }

    let upload_panel = Paragraph::new(lines.join("\n"))
        .block(Block::default().borders(Borders::ALL).title("UPLOAD"))
        .wrap(Wrap { trim: true });
    f.render_widget(upload_panel, body_layout.table);

    // 右側：接続情報とログ。
    let info_text = format!(
        "Backend: {}\nStorage: {}\n\nLog:\n{}",
        app.cfg.backend.base_url,
        app.storage.as_str(),
        log_tail(app, 10),
    );
    let info_panel = Paragraph::new(info_text)
        .block(Block::default().borders(Borders::ALL).title("INFO"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, body_layout.info);
}

/// マッピング確認画面のBodyを描画する。
fn draw_mapping_body(f: &mut Frame, app: &App, area: Rect) {
    let body_layout = layout::create_body_layout(area);

    let Some(session) = app.workflow.session() else {
        // セッションが無い一瞬の遷移中はプレースホルダを出す。
        let empty = Paragraph::new("No active session")
            .block(Block::default().borders(Borders::ALL).title("MAPPINGS"));
        f.render_widget(empty, body_layout.table);
        return;
    };

    // マッピング一覧からテーブル行を組み立てる。
    let rows = session.mappings.entries().iter().enumerate().map(|(i, m)| {
        let mark = if m.is_complete() { "ok" } else { "--" };
        Row::new(vec![
            format!("{}", i + 1),
            m.source_field.clone(),
            display_or_dash(&m.target_table),
            display_or_dash(&m.target_column),
            mark.to_string(),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(14),
            Constraint::Min(14),
            Constraint::Length(4),
        ],
    )
    .block(Block::default().borders(Borders::ALL).title("MAPPINGS"))
    .header(Row::new(vec!["#", "source field", "table", "column", ""]).bold())
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(255, 140, 0)) // オレンジ色の背景
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    );

    // 選択中の行をハイライトする。
    let mut table_state = ratatui::widgets::TableState::default();
    if !session.mappings.is_empty() {
        table_state.select(Some(app.ui.selected));
    }
    f.render_stateful_widget(table, body_layout.table, &mut table_state);

    // 右側：スキーマの参照と進捗。
    let mapped = session.mappings.len() - session.mappings.incomplete_count();
    let mut info = vec![
        format!("Upload ID: {}", session.id),
        format!("Mapped: {}/{}", mapped, session.mappings.len()),
        format!(
            "Schema: {} tables, {} fields",
            session.schema.table_count(),
            session.schema.column_count()
        ),
        String::new(),
    ];
    if session.mappings.is_complete() {
        info.push("All fields mapped. Press Enter to confirm.".into());
    } else {
        info.push(format!(
            "{} field(s) unmapped. Confirmation is locked.",
            session.mappings.incomplete_count()
        ));
    }
    info.push(String::new());
    info.push("Available schema:".into());
    for table in session.schema.table_names() {
        let cols: Vec<String> = session
            .schema
            .columns_of(table)
            .map(|(c, t)| format!("{c} ({t})"))
            .collect();
        info.push(format!("  {}: {}", table, cols.join(", ")));
    }

    let info_panel = Paragraph::new(info.join("\n"))
        .block(Block::default().borders(Borders::ALL).title("INFO"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, body_layout.info);
}

/// 結果表示画面のBodyを描画する。
fn draw_results_body(f: &mut Frame, app: &App, area: Rect) {
    let body_layout = layout::create_body_layout(area);

    let Some(session) = app.workflow.session() else {
        let empty = Paragraph::new("No results")
            .block(Block::default().borders(Borders::ALL).title("RESULTS"));
        f.render_widget(empty, body_layout.table);
        return;
    };

    // 左側：確定後にエコーバックされたマッピング一覧。
    let mappings = session
        .outcome
        .as_ref()
        .map(|o| o.mappings.as_slice())
        .unwrap_or(&[]);
    let rows = mappings.iter().enumerate().map(|(i, m)| {
        Row::new(vec![
            format!("{}", i + 1),
            m.source_field.clone(),
            m.target_table.clone(),
            m.target_column.clone(),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(14),
            Constraint::Min(14),
        ],
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("CONFIRMED MAPPINGS"),
    )
    .header(Row::new(vec!["#", "source field", "table", "column"]).bold());
    f.render_widget(table, body_layout.table);

    // 右側：処理統計とエラー。統計の不整合はそのまま表示する。
    let mut info: Vec<Line> = vec![];
    if let Some(outcome) = &session.outcome {
        info.push(Line::from(vec![
            Span::raw("Status: "),
            Span::styled(
                outcome.status_label.clone(),
                Style::default()
                    .fg(status_color(session.status))
                    .add_modifier(Modifier::BOLD),
            ),
        ]));
        info.push(Line::raw(""));
        info.push(Line::raw(format!(
            "Total records: {}",
            outcome.stats.total_records
        )));
        info.push(Line::raw(format!(
            "Successful:    {}",
            outcome.stats.successful_records
        )));
        info.push(Line::raw(format!(
            "Failed:        {}",
            outcome.stats.failed_records
        )));
        info.push(Line::raw(""));
        if outcome.unmapped_fields.is_empty() {
            info.push(Line::raw("No unmapped columns."));
        } else {
            info.push(Line::raw(format!(
                "Unmapped: {}",
                outcome.unmapped_fields.join(", ")
            )));
        }
        info.push(Line::raw(""));
        if outcome.stats.errors.is_empty() {
            info.push(Line::raw("No errors."));
        } else {
            info.push(Line::raw(format!("Errors ({}):", outcome.stats.errors.len())));
            for e in outcome.stats.errors.iter().take(8) {
                info.push(Line::styled(
                    format!("- {e}"),
                    Style::default().fg(Color::Red),
                ));
            }
            if outcome.stats.errors.len() > 8 {
                info.push(Line::raw(format!(
                    "  ... and {} more",
                    outcome.stats.errors.len() - 8
                )));
            }
        }
    } else {
        info.push(Line::raw("Waiting for results..."));
    }

    let info_panel = Paragraph::new(info)
        .block(Block::default().borders(Borders::ALL).title("RESULTS"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, body_layout.info);
}

/// ダッシュボード画面のBodyを描画する。
fn draw_dashboard_body(f: &mut Frame, app: &App, area: Rect) {
    let dash_layout = layout::create_dashboard_layout(area);

    let Some(overview) = &app.dashboard.overview else {
        // 初回取得前はローディング表示のみ。
        let text = if app.dashboard.loading {
            "Loading dashboard data..."
        } else {
            "No dashboard data. Press r to refresh."
        };
        let loading = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("DASHBOARD"));
        f.render_widget(loading, dash_layout.table);
        return;
    };

    // 集計タイル行を描画する。
    let tiles = [
        ("Total Files", overview.total_files_uploaded, Color::Cyan),
        ("Completed", overview.completed_processing, Color::Green),
        ("Failed", overview.failed_processing, Color::Red),
        ("Partial", overview.partial_files, Color::Yellow),
    ];
    for (rect, (label, value, color)) in layout::split_tiles(dash_layout.tiles, tiles.len())
        .into_iter()
        .zip(tiles)
    {
        let tile = Paragraph::new(format!("{value}"))
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(label));
        f.render_widget(tile, rect);
    }

    // 履歴テーブルを描画する（絞り込み適用後）。
    let uploads = app.dashboard.filtered_uploads();
    let rows = uploads.iter().map(|u| {
        Row::new(vec![
            format!("#{}", u.file_upload_id),
            u.filename.clone(),
            u.status.clone(),
            format_upload_time(&u.upload_time),
            u.records_processed.to_string(),
        ])
    });
    let title = if app.dashboard.filter.trim().is_empty() {
        "UPLOADS".to_string()
    } else {
        format!("UPLOADS (filter: {})", app.dashboard.filter)
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Min(16),
            Constraint::Length(16),
            Constraint::Length(17),
            Constraint::Length(9),
        ],
    )
    .block(Block::default().borders(Borders::ALL).title(title))
    .header(Row::new(vec!["id", "filename", "status", "uploaded", "records"]).bold())
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(255, 140, 0)) // オレンジ色の背景
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    );

    let mut table_state = ratatui::widgets::TableState::default();
    if !uploads.is_empty() {
        table_state.select(Some(app.ui.selected.min(uploads.len() - 1)));
    }
    f.render_stateful_widget(table, dash_layout.table, &mut table_state);
}

/// 処理サマリのポップアップを描画する。
fn draw_summary_popup(f: &mut Frame, summary: &crate::events::SummaryView) {
    let height = f.area().height.saturating_sub(6);
    let popup_area = layout::centered_popup(f.area(), 90, height);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Processing Summary - #{}", summary.file_id));
    f.render_widget(block, popup_area);

    // 内部レイアウト（タブ行 + テーブル）。
    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(popup_area);

    if summary.tables.is_empty() {
        let empty = Paragraph::new("No data available for this file.");
        f.render_widget(empty, inner_layout[1]);
        return;
    }

    // タブ行（種別ラベルと件数、アクティブタブを強調）。
    let mut tabs: Vec<Span> = vec![];
    for (i, t) in summary.tables.iter().enumerate() {
        let label = format!(" {} ({}) ", t.kind.label(), t.rows.len());
        if i == summary.active {
            tabs.push(Span::styled(
                label,
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            tabs.push(Span::raw(label));
        }
        tabs.push(Span::raw(" "));
    }
    f.render_widget(Paragraph::new(Line::from(tabs)), inner_layout[0]);

    // アクティブなテーブルを一般形式で描画する。
    if let Some(active) = summary.active_table() {
        draw_summary_table(f, active, inner_layout[1]);
    }
}

/// 1種別分のサマリテーブルを描画する。
fn draw_summary_table(f: &mut Frame, table: &SummaryTable, area: Rect) {
    // カラム集合は種別ごとに決定的（ソート済みの和集合）。
    let columns = table.columns();
    if columns.is_empty() {
        let empty = Paragraph::new("No rows.");
        f.render_widget(empty, area);
        return;
    }

    let rows = table.rows.iter().map(|row| {
        Row::new(
            columns
                .iter()
                .map(|c| row.get(c).map(cell_text).unwrap_or_default())
                .collect::<Vec<_>>(),
        )
    });
    let widths = vec![Constraint::Ratio(1, columns.len() as u32); columns.len()];
    let header: Vec<String> = columns.iter().map(|c| c.replace('_', " ")).collect();

    let widget = Table::new(rows, widths)
        .block(Block::default().borders(Borders::ALL))
        .header(Row::new(header).bold());
    f.render_widget(widget, area);
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App) -> Paragraph<'static> {
    let screen_name = match app.ui.screen {
        Screen::Upload => "Upload",
        Screen::Mapping => "Mapping",
        Screen::Results => "Results",
        Screen::Dashboard => "Dashboard",
    };

    // 画面ごとの進行情報を組み立てる。
    let progress = match app.ui.screen {
        Screen::Upload => app
            .staged_file
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "-".into()),
        Screen::Mapping => app
            .workflow
            .session()
            .map(|s| {
                format!(
                    "Mapped {}/{}",
                    s.mappings.len() - s.mappings.incomplete_count(),
                    s.mappings.len()
                )
            })
            .unwrap_or_else(|| "-".into()),
        Screen::Results => app
            .workflow
            .session()
            .and_then(|s| s.outcome.as_ref())
            .map(|o| o.status_label.clone())
            .unwrap_or_else(|| "-".into()),
        Screen::Dashboard => format!("{} uploads", app.dashboard.filtered_uploads().len()),
    };

    // エラーの有無でステータス文字列を切り替える。UI側で消されていても
    // Failedフェーズの間はワークフロー側のメッセージを出し続ける。
    let error = app
        .ui
        .error
        .as_deref()
        .or_else(|| app.workflow.failure_message());
    let has_error = error.is_some();
    let status_text = if let Some(err) = error {
        format!("[{screen_name}] {progress} | ERROR: {err} (Enter to dismiss)")
    } else {
        format!("[{screen_name}] {progress} | {}", app.ui.status)
    };

    let mut status_bar = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });

    // エラー時は赤色で強調表示する。
    if has_error {
        status_bar = status_bar.style(Style::default().fg(Color::Red));
    }

    status_bar
}

/// 現在画面に応じたヘルプ文字列を返す。
fn get_help_text(screen: &Screen, shortcuts: &Shortcuts) -> String {
    match screen {
        Screen::Upload => format!(
            "{}: file | {}: storage | {}: upload | {}: dashboard | {}: quit",
            format_keys(&shortcuts.upload.choose_file),
            format_keys(&shortcuts.upload.toggle_storage),
            format_keys(&shortcuts.upload.upload),
            format_keys(&shortcuts.upload.dashboard),
            format_keys(&shortcuts.upload.quit)
        ),
        Screen::Mapping => format!(
            "{}/{}: navigate | {}: table | {}: column | {}: confirm | {}: cancel",
            format_keys(&shortcuts.mapping.up),
            format_keys(&shortcuts.mapping.down),
            format_keys(&shortcuts.mapping.table),
            format_keys(&shortcuts.mapping.column),
            format_keys(&shortcuts.mapping.confirm),
            format_keys(&shortcuts.mapping.cancel)
        ),
        Screen::Results => format!("{}: close", format_keys(&shortcuts.results.close)),
        Screen::Dashboard => format!(
            "{}: refresh | {}: view | {}: filter | {}: tab | {}: back",
            format_keys(&shortcuts.dashboard.refresh),
            format_keys(&shortcuts.dashboard.view),
            format_keys(&shortcuts.dashboard.filter),
            format_keys(&shortcuts.dashboard.next_tab),
            format_keys(&shortcuts.dashboard.back)
        ),
    }
}

/// ショートカットキーの配列を表示用文字列に変換する。
fn format_keys(keys: &[String]) -> String {
    keys.join("/")
}

/// 空値を "-" に置き換えて表示する。
fn display_or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".into()
    } else {
        value.into()
    }
}

/// セッション状態に応じたバッジ色を返す。
fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Completed => Color::Green,
        SessionStatus::PartialSuccess => Color::Yellow,
        SessionStatus::Failed => Color::Red,
        SessionStatus::Uploading | SessionStatus::MappingPending | SessionStatus::Confirming => {
            Color::Cyan
        }
    }
}

/// JSON値をセル表示用の文字列へ変換する。
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// バイト数を読みやすい単位へ変換する。
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// アップロード時刻をローカル時刻表示へ整形する（解釈できなければ原文）。
fn format_upload_time(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

/// ログ末尾のn行を返す。
fn log_tail(app: &App, n: usize) -> String {
    app.ui
        .log
        .iter()
        .rev()
        .take(n)
        .rev()
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        // 単位換算の境界を検証する。
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_format_upload_time_falls_back_to_raw() {
        // 解釈できないタイムスタンプは原文のまま返す。
        assert_eq!(format_upload_time("yesterday"), "yesterday");
    }

    #[test]
    fn test_cell_text() {
        // JSON値の表示変換を検証する。
        assert_eq!(cell_text(&serde_json::json!("abc")), "abc");
        assert_eq!(cell_text(&serde_json::json!(12.5)), "12.5");
        assert_eq!(cell_text(&serde_json::Value::Null), "");
    }
}
