//! レイアウト計算のヘルパー関数

use ratatui::prelude::*;

/// メイン画面の3つの領域（Body + HELP + STATUS）
pub struct MainLayout {
    /// 一覧と情報パネルを置くBody領域
    pub body: Rect,
    /// HELPバーの領域
    pub help_bar: Rect,
    /// STATUSバーの領域
    pub status_bar: Rect,
}

/// ボディ部の2つの領域（一覧テーブル + INFOパネル）
pub struct BodyLayout {
    /// 一覧テーブルの領域
    pub table: Rect,
    /// INFOパネルの領域
    pub info: Rect,
}

/// ダッシュボードBody部の2つの領域（集計タイル + 履歴テーブル）
pub struct DashboardLayout {
    /// 集計タイル行の領域
    pub tiles: Rect,
    /// 履歴テーブルの領域
    pub table: Rect,
}

/// 画面全体を3つの領域に分割（Body + HELP + STATUS）
pub fn create_main_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Body
            Constraint::Length(3), // HELPバー
            Constraint::Length(3), // STATUSバー
        ])
        .split(area);

    MainLayout {
        body: chunks[0],
        help_bar: chunks[1],
        status_bar: chunks[2],
    }
}

/// Body領域を2つに分割（一覧 65% + INFOパネル 35%）
pub fn create_body_layout(area: Rect) -> BodyLayout {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    BodyLayout {
        table: chunks[0],
        info: chunks[1],
    }
}

/// ダッシュボードのBody領域を分割（タイル行 + 履歴テーブル）
pub fn create_dashboard_layout(area: Rect) -> DashboardLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(1)])
        .split(area);

    DashboardLayout {
        tiles: chunks[0],
        table: chunks[1],
    }
}

/// タイル行を等幅のn領域へ分割
pub fn split_tiles(area: Rect, n: usize) -> Vec<Rect> {
    let constraints = vec![Constraint::Ratio(1, n.max(1) as u32); n.max(1)];
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area)
        .to_vec()
}

/// 中央配置のポップアップ領域を計算
pub fn centered_popup(area: Rect, width_percent: u16, height: u16) -> Rect {
    // 縦方向の余白を作り、中央行を取り出す。
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height.saturating_sub(height)) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    // 横方向も中央に寄せてポップアップ領域を返す。
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
