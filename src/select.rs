//! TUI内での選択肢ポップアップコンポーネント（SelectBox）。

use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::layout::centered_popup;

/// SelectBox選択状態
#[derive(Clone, Debug)]
pub struct SelectBoxState {
    /// タイトル（何を選んでいるか）
    pub title: String,
    /// 選択肢の一覧（先頭は「未選択」を表す空値）
    pub items: Vec<String>,
    /// 現在のハイライト位置
    pub selected: usize,
    /// 選択確定時のコールバック識別子
    pub callback_id: SelectCallbackId,
}

/// 選択確定時のコールバック識別子
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectCallbackId {
    /// マッピング画面：取り込み先テーブルの選択。
    TargetTable,
    /// マッピング画面：取り込み先カラムの選択。
    TargetColumn,
}

impl SelectBoxState {
    /// 未選択クリア用の項目を先頭に足した状態を作る。
    ///
    /// current が既存の選択値なら、その位置をハイライトして開く。
    pub fn new(
        title: &str,
        choices: Vec<String>,
        current: &str,
        callback_id: SelectCallbackId,
    ) -> Self {
        let mut items = vec![String::new()];
        items.extend(choices);
        let selected = items.iter().position(|i| i == current).unwrap_or(0);
        Self {
            title: title.into(),
            items,
            selected,
            callback_id,
        }
    }

    /// ハイライトを上へ移動する。
    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// ハイライトを下へ移動する。
    pub fn move_down(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
        }
    }

    /// 現在ハイライト中の値を返す（先頭項目は空文字=未選択）。
    pub fn current(&self) -> &str {
        self.items
            .get(self.selected)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// SelectBoxをポップアップとして描画
pub fn render_select_box(f: &mut Frame, state: &SelectBoxState) {
    // 項目数に応じて高さを決める（ヘルプ行と枠の分を足す）。
    let height = (state.items.len() as u16 + 4).min(f.area().height.saturating_sub(2));
    let popup_area = centered_popup(f.area(), 50, height);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(state.title.clone())
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, popup_area);

    // 内部レイアウト（一覧 + ヘルプ）。
    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(popup_area);

    // 空値の項目は「(none)」と表示する。
    let items: Vec<ListItem> = state
        .items
        .iter()
        .map(|i| {
            if i.is_empty() {
                ListItem::new("(none)").style(Style::default().fg(Color::Gray))
            } else {
                ListItem::new(i.as_str())
            }
        })
        .collect();

    let list = List::new(items).highlight_style(
        Style::default()
            .bg(Color::Rgb(255, 140, 0)) // オレンジ色の背景
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    );

    let mut list_state = ListState::default();
    list_state.select(Some(state.selected));
    f.render_stateful_widget(list, inner_layout[0], &mut list_state);

    let help = Paragraph::new("Enter=確定 | ESC=キャンセル | ↑↓=移動")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help, inner_layout[1]);
}
