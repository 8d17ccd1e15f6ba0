//! ショートカット設定の管理。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ショートカット設定の全体。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortcuts {
    pub upload: UploadShortcuts,
    pub mapping: MappingShortcuts,
    pub results: ResultsShortcuts,
    pub dashboard: DashboardShortcuts,
    pub input_box: InputBoxShortcuts,
    pub select_box: SelectBoxShortcuts,
}

/// アップロード画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadShortcuts {
    pub quit: Vec<String>,
    pub choose_file: Vec<String>,
    pub toggle_storage: Vec<String>,
    pub upload: Vec<String>,
    pub dashboard: Vec<String>,
}

/// マッピング確認画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingShortcuts {
    pub cancel: Vec<String>,
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub table: Vec<String>,
    pub column: Vec<String>,
    pub confirm: Vec<String>,
}

/// 結果表示画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsShortcuts {
    pub close: Vec<String>,
}

/// ダッシュボード画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardShortcuts {
    pub back: Vec<String>,
    pub refresh: Vec<String>,
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub view: Vec<String>,
    pub filter: Vec<String>,
    pub next_tab: Vec<String>,
}

/// InputBoxのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBoxShortcuts {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub backspace: Vec<String>,
    pub delete: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub home: Vec<String>,
    pub end: Vec<String>,
    pub clear_line: Vec<String>,
}

/// SelectBoxのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectBoxShortcuts {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl Shortcuts {
    /// TOMLから読み込み、無ければデフォルトを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            // 既存ファイルを読み込んでパースする。
            let content = std::fs::read_to_string(path)?;
            let shortcuts: Shortcuts = toml::from_str(&content)?;
            Ok(shortcuts)
        } else {
            // 未作成の場合は既定値を利用する。
            Ok(Self::default())
        }
    }

    /// TOMLとして保存する。
    #[allow(dead_code)]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            upload: UploadShortcuts {
                quit: vec!["q".into()],
                choose_file: vec!["f".into()],
                toggle_storage: vec!["s".into()],
                upload: vec!["u".into(), "Enter".into()],
                dashboard: vec!["d".into()],
            },
            mapping: MappingShortcuts {
                cancel: vec!["Esc".into()],
                up: vec!["Up".into(), "k".into()],
                down: vec!["Down".into(), "j".into()],
                table: vec!["t".into()],
                column: vec!["c".into()],
                confirm: vec!["Enter".into()],
            },
            results: ResultsShortcuts {
                close: vec!["Enter".into(), "Esc".into(), "q".into()],
            },
            dashboard: DashboardShortcuts {
                back: vec!["Esc".into(), "q".into()],
                refresh: vec!["r".into()],
                up: vec!["Up".into(), "k".into()],
                down: vec!["Down".into(), "j".into()],
                view: vec!["Enter".into()],
                filter: vec!["/".into()],
                next_tab: vec!["Tab".into()],
            },
            input_box: InputBoxShortcuts {
                confirm: vec!["Enter".into()],
                cancel: vec!["Esc".into()],
                backspace: vec!["Backspace".into()],
                delete: vec!["Delete".into()],
                left: vec!["Left".into()],
                right: vec!["Right".into()],
                home: vec!["Home".into()],
                end: vec!["End".into()],
                clear_line: vec!["Ctrl+u".into()],
            },
            select_box: SelectBoxShortcuts {
                confirm: vec!["Enter".into()],
                cancel: vec!["Esc".into()],
                up: vec!["Up".into(), "k".into()],
                down: vec!["Down".into(), "j".into()],
            },
        }
    }
}

/// KeyEventがいずれかのショートカット文字列と一致するか判定する。
pub fn matches_shortcut(key: &KeyEvent, shortcuts: &[String]) -> bool {
    shortcuts.iter().any(|s| matches_single_shortcut(key, s))
}

/// KeyEventが単一のショートカット文字列と一致するか判定する。
fn matches_single_shortcut(key: &KeyEvent, shortcut: &str) -> bool {
    // ショートカット文字列を分解する（例: "Ctrl+u", "a", "Enter"）。
    let parts: Vec<&str> = shortcut.split('+').collect();

    let (modifiers_str, key_str) = if parts.len() > 1 {
        // 修飾キー付きの形式（例: "Ctrl+u"）。
        (&parts[0..parts.len() - 1], parts[parts.len() - 1])
    } else {
        // 修飾キーなしの形式（例: "a", "Enter"）。
        (&[][..], parts[0])
    };

    // 修飾キーを解析して期待値を作る。
    let mut expected_modifiers = KeyModifiers::empty();
    for modifier in modifiers_str {
        match *modifier {
            "Ctrl" | "ctrl" => expected_modifiers |= KeyModifiers::CONTROL,
            "Alt" | "alt" => expected_modifiers |= KeyModifiers::ALT,
            "Shift" | "shift" => expected_modifiers |= KeyModifiers::SHIFT,
            _ => return false,
        }
    }

    // 修飾キーが一致しなければ即座に不一致とする。
    if key.modifiers != expected_modifiers {
        return false;
    }

    // キーコードの種別ごとに一致判定を行う。
    match key_str {
        "Enter" | "enter" => key.code == KeyCode::Enter,
        "Esc" | "esc" => key.code == KeyCode::Esc,
        "Tab" | "tab" => key.code == KeyCode::Tab,
        "Backspace" | "backspace" => key.code == KeyCode::Backspace,
        "Delete" | "delete" => key.code == KeyCode::Delete,
        "Up" | "up" => key.code == KeyCode::Up,
        "Down" | "down" => key.code == KeyCode::Down,
        "Left" | "left" => key.code == KeyCode::Left,
        "Right" | "right" => key.code == KeyCode::Right,
        "Home" | "home" => key.code == KeyCode::Home,
        "End" | "end" => key.code == KeyCode::End,
        // 単一文字は Char として比較する。
        s if s.len() == 1 => {
            if let Some(c) = s.chars().next() {
                key.code == KeyCode::Char(c)
            } else {
                false
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_shortcut_simple_char() {
        // 単一文字の一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("u")]));
        assert!(!matches_shortcut(&key, &[String::from("d")]));
    }

    #[test]
    fn test_matches_shortcut_special_key() {
        // 特殊キーの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("Enter")]));
        assert!(!matches_shortcut(&key, &[String::from("Esc")]));
    }

    #[test]
    fn test_matches_shortcut_with_modifier() {
        // 修飾キー付きの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert!(matches_shortcut(&key, &[String::from("Ctrl+u")]));
        assert!(!matches_shortcut(&key, &[String::from("u")]));
    }

    #[test]
    fn test_matches_shortcut_multiple_keys() {
        // 複数キーバインドの一致判定を検証する。
        let key_enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::empty());
        let key_u = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::empty());
        let shortcuts = vec![String::from("u"), String::from("Enter")];

        assert!(matches_shortcut(&key_enter, &shortcuts));
        assert!(matches_shortcut(&key_u, &shortcuts));

        let key_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::empty());
        assert!(!matches_shortcut(&key_x, &shortcuts));
    }
}
