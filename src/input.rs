//! TUI内での文字列入力コンポーネント（InputBox）。

use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::layout::centered_popup;

/// InputBox入力状態
#[derive(Clone, Debug)]
pub struct InputBoxState {
    /// プロンプトメッセージ
    pub prompt: String,
    /// 現在の入力値
    pub value: String,
    /// カーソル位置（文字単位）
    pub cursor: usize,
    /// 入力完了時のコールバック識別子
    pub callback_id: InputCallbackId,
}

/// 入力完了時のコールバック識別子
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputCallbackId {
    /// アップロード画面：ファイルパス入力。
    UploadFilePath,
    /// ダッシュボード画面：履歴の絞り込み文字列。
    DashboardFilter,
}

impl InputBoxState {
    /// 初期値の末尾にカーソルを置いた状態を作る。
    pub fn new(prompt: &str, value: String, callback_id: InputCallbackId) -> Self {
        let cursor = value.chars().count();
        Self {
            prompt: prompt.into(),
            value,
            cursor,
            callback_id,
        }
    }

    /// カーソルの文字位置をバイト位置へ変換する。
    fn byte_index(&self, cursor: usize) -> usize {
        self.value
            .char_indices()
            .nth(cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    /// 文字を挿入
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    /// Backspace（カーソル前の文字を削除）
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            let at = self.byte_index(self.cursor - 1);
            self.value.remove(at);
            self.cursor -= 1;
        }
    }

    /// Delete（カーソル位置の文字を削除）
    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_index(self.cursor);
            self.value.remove(at);
        }
    }

    /// カーソルを左に移動
    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// カーソルを右に移動
    pub fn move_right(&mut self) {
        if self.cursor < self.value.chars().count() {
            self.cursor += 1;
        }
    }

    /// カーソルを先頭に移動
    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    /// カーソルを末尾に移動
    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// 行全体をクリア
    pub fn clear_line(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }
}

/// InputBoxをポップアップとして描画
pub fn render_input_box(f: &mut Frame, state: &InputBoxState) {
    // 中央に配置されたポップアップ領域を確保する。
    let popup_area = centered_popup(f.area(), 70, 7);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Input")
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, popup_area);

    // 内部レイアウト（プロンプト + 入力フィールド + ヘルプ）。
    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(popup_area);

    let prompt_widget = Paragraph::new(state.prompt.clone()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(prompt_widget, inner_layout[0]);

    // カーソルが常に見えるよう表示範囲を横へずらす。
    let display_width = inner_layout[1].width as usize;
    let scroll_offset = if state.cursor + 2 > display_width {
        state.cursor + 2 - display_width
    } else {
        0
    };

    let chars: Vec<char> = state.value.chars().collect();
    let cursor_in_visible = state.cursor.saturating_sub(scroll_offset);
    let visible: Vec<char> = chars
        .iter()
        .skip(scroll_offset)
        .take(display_width.saturating_sub(1))
        .copied()
        .collect();

    // カーソル位置の文字を反転表示し、末尾では空白を反転させる。
    let before: String = visible[..cursor_in_visible.min(visible.len())].iter().collect();
    let at: String = visible
        .get(cursor_in_visible)
        .map(|c| c.to_string())
        .unwrap_or_else(|| " ".into());
    let after: String = visible
        .iter()
        .skip(cursor_in_visible + 1)
        .collect();
    let line = Line::from(vec![
        Span::styled(before, Style::default().fg(Color::Green)),
        Span::styled(at, Style::default().fg(Color::Black).bg(Color::Green)),
        Span::styled(after, Style::default().fg(Color::Green)),
    ]);
    f.render_widget(Paragraph::new(line), inner_layout[1]);

    let help = Paragraph::new("Enter=確定 | ESC=キャンセル | Ctrl+U=クリア")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help, inner_layout[3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_delete_multibyte() {
        // 多バイト文字でも文字単位で編集できることを検証する。
        let mut s = InputBoxState::new("p:", "請求書".into(), InputCallbackId::UploadFilePath);
        assert_eq!(s.cursor, 3);
        s.backspace();
        assert_eq!(s.value, "請求");
        s.move_home();
        s.insert_char('新');
        assert_eq!(s.value, "新請求");
        s.delete();
        assert_eq!(s.value, "新求");
    }

    #[test]
    fn test_cursor_bounds() {
        // カーソルが両端を越えないことを検証する。
        let mut s = InputBoxState::new("p:", "ab".into(), InputCallbackId::DashboardFilter);
        s.move_right();
        assert_eq!(s.cursor, 2);
        s.move_home();
        s.move_left();
        assert_eq!(s.cursor, 0);
        s.clear_line();
        assert_eq!(s.value, "");
        assert_eq!(s.cursor, 0);
    }
}
