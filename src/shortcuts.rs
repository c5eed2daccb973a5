//! ショートカット設定の管理。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ショートカット設定の全体。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortcuts {
    pub packet: PacketShortcuts,
    pub capture: CaptureShortcuts,
    pub checklist: ChecklistShortcuts,
    pub dashboard: DashboardShortcuts,
    pub assistant: AssistantShortcuts,
    pub settings: SettingsShortcuts,
    pub input_box: InputBoxShortcuts,
}

/// ジョブパケット画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketShortcuts {
    pub quit: Vec<String>,
    pub next_screen: Vec<String>,
    pub settings: Vec<String>,
    pub cycle_order: Vec<String>,
    pub import: Vec<String>,
    pub checklist: Vec<String>,
    pub scan: Vec<String>,
    pub gps: Vec<String>,
    pub photo: Vec<String>,
    pub submit: Vec<String>,
}

/// キャプチャ中オーバーレイのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureShortcuts {
    pub take_photo: Vec<String>,
    pub cancel: Vec<String>,
}

/// チェックリストモーダルのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistShortcuts {
    pub toggle: Vec<String>,
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

/// ダッシュボード画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardShortcuts {
    pub quit: Vec<String>,
    pub next_screen: Vec<String>,
    pub settings: Vec<String>,
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub approve: Vec<String>,
    pub reject: Vec<String>,
    pub post_gis: Vec<String>,
    pub financials: Vec<String>,
    pub report: Vec<String>,
    pub reset: Vec<String>,
}

/// アシスタント画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantShortcuts {
    pub quit: Vec<String>,
    pub next_screen: Vec<String>,
    pub ask: Vec<String>,
}

/// 設定画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsShortcuts {
    pub cancel: Vec<String>,
    pub save: Vec<String>,
    pub api_key: Vec<String>,
    pub model: Vec<String>,
    pub name: Vec<String>,
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
        // 文字列にシリアライズする。
        let content = toml::to_string_pretty(self)?;
        // ファイルへ書き込む。
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            packet: PacketShortcuts {
                quit: vec!["q".into()],
                next_screen: vec!["Tab".into()],
                settings: vec!["t".into()],
                cycle_order: vec!["w".into()],
                import: vec!["u".into()],
                checklist: vec!["c".into()],
                scan: vec!["s".into()],
                gps: vec!["g".into()],
                photo: vec!["p".into()],
                submit: vec!["Enter".into()],
            },
            capture: CaptureShortcuts {
                take_photo: vec!["Enter".into()],
                cancel: vec!["Esc".into()],
            },
            checklist: ChecklistShortcuts {
                toggle: vec!["Space".into()],
                up: vec!["Up".into(), "k".into()],
                down: vec!["Down".into(), "j".into()],
                confirm: vec!["Enter".into()],
                cancel: vec!["Esc".into()],
            },
            dashboard: DashboardShortcuts {
                quit: vec!["q".into()],
                next_screen: vec!["Tab".into()],
                settings: vec!["t".into()],
                up: vec!["Up".into(), "k".into()],
                down: vec!["Down".into(), "j".into()],
                approve: vec!["a".into()],
                reject: vec!["x".into()],
                post_gis: vec!["o".into()],
                financials: vec!["f".into()],
                report: vec!["r".into()],
                reset: vec!["Ctrl+r".into()],
            },
            assistant: AssistantShortcuts {
                quit: vec!["q".into()],
                next_screen: vec!["Tab".into()],
                ask: vec!["i".into()],
            },
            settings: SettingsShortcuts {
                cancel: vec!["Esc".into()],
                save: vec!["Enter".into()],
                api_key: vec!["k".into()],
                model: vec!["m".into()],
                name: vec!["n".into()],
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
        }
    }
}

/// KeyEventがいずれかのショートカット文字列と一致するか判定する。
pub fn matches_shortcut(key: &KeyEvent, shortcuts: &[String]) -> bool {
    shortcuts.iter().any(|s| matches_single_shortcut(key, s))
}

/// KeyEventが単一のショートカット文字列と一致するか判定する。
fn matches_single_shortcut(key: &KeyEvent, shortcut: &str) -> bool {
    // 末尾の要素をキー名、それ以外を修飾キーとして分解する（例: "Ctrl+r"）。
    let (modifiers_str, key_str) = match shortcut.rsplit_once('+') {
        Some((mods, name)) if !name.is_empty() => (mods, name),
        _ => ("", shortcut),
    };

    // 修飾キーを解析して期待値を作る。
    let mut expected_modifiers = KeyModifiers::empty();
    for modifier in modifiers_str.split('+').filter(|m| !m.is_empty()) {
        match modifier {
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
        "Space" | "space" => key.code == KeyCode::Char(' '),
        "Backspace" | "backspace" => key.code == KeyCode::Backspace,
        "Delete" | "delete" => key.code == KeyCode::Delete,
        "Up" | "up" => key.code == KeyCode::Up,
        "Down" | "down" => key.code == KeyCode::Down,
        "Left" | "left" => key.code == KeyCode::Left,
        "Right" | "right" => key.code == KeyCode::Right,
        "Home" | "home" => key.code == KeyCode::Home,
        "End" | "end" => key.code == KeyCode::End,
        // 単一文字は Char として比較する。
        s if s.chars().count() == 1 => {
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
        let key = KeyEvent::new(KeyCode::Char('g'), KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("g")]));
        assert!(!matches_shortcut(&key, &[String::from("p")]));
    }

    #[test]
    fn test_matches_shortcut_special_key() {
        // 特殊キーの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("Enter")]));
        assert!(!matches_shortcut(&key, &[String::from("Esc")]));
    }

    #[test]
    fn test_matches_shortcut_space() {
        // Spaceキーの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("Space")]));
    }

    #[test]
    fn test_matches_shortcut_with_modifier() {
        // 修飾キー付きの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert!(matches_shortcut(&key, &[String::from("Ctrl+r")]));
        assert!(!matches_shortcut(&key, &[String::from("r")]));
    }

    #[test]
    fn test_matches_shortcut_multiple_keys() {
        // 複数キーバインドの一致判定を検証する。
        let key_up = KeyEvent::new(KeyCode::Up, KeyModifiers::empty());
        let key_k = KeyEvent::new(KeyCode::Char('k'), KeyModifiers::empty());
        let shortcuts = vec![String::from("Up"), String::from("k")];

        assert!(matches_shortcut(&key_up, &shortcuts));
        assert!(matches_shortcut(&key_k, &shortcuts));

        let key_j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::empty());
        assert!(!matches_shortcut(&key_j, &shortcuts));
    }
}
