//! TUI内での文字列入力コンポーネント（InputBox）。

use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

/// InputBox入力状態
#[derive(Clone, Debug)]
pub struct InputBoxState {
    /// プロンプトメッセージ
    pub prompt: String,
    /// 現在の入力値（文字単位で保持）
    chars: Vec<char>,
    /// カーソル位置（文字単位）
    pub cursor: usize,
    /// 入力完了時のコールバック識別子
    pub callback_id: InputCallbackId,
}

/// 入力完了時のコールバック識別子
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputCallbackId {
    /// 作業指示書JSONファイルのパス入力
    WorkOrderPath,
    /// アシスタントへの質問入力
    AssistantQuestion,

    // Settings画面用
    SettingsApiKey,
    SettingsModel,
    SettingsCrewName,
}

impl InputBoxState {
    /// プロンプトと初期値から入力状態を作る
    pub fn new(prompt: &str, initial: &str, callback_id: InputCallbackId) -> Self {
        let chars: Vec<char> = initial.chars().collect();
        let cursor = chars.len();
        Self {
            prompt: prompt.into(),
            chars,
            cursor,
            callback_id,
        }
    }

    /// 現在の入力値を文字列で返す
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// 文字を挿入
    pub fn insert_char(&mut self, c: char) {
        // カーソル位置へ挿入してカーソルを進める。
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    /// Backspace（カーソル前の文字を削除）
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    /// Delete（カーソル位置の文字を削除）
    pub fn delete(&mut self) {
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    /// カーソルを左に移動
    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// カーソルを右に移動
    pub fn move_right(&mut self) {
        if self.cursor < self.chars.len() {
            self.cursor += 1;
        }
    }

    /// カーソルを先頭に移動
    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    /// カーソルを末尾に移動
    pub fn move_end(&mut self) {
        self.cursor = self.chars.len();
    }

    /// 行全体をクリア
    pub fn clear_line(&mut self) {
        self.chars.clear();
        self.cursor = 0;
    }
}

/// InputBoxをポップアップとして描画
pub fn render_input_box(f: &mut Frame, state: &InputBoxState) {
    // 中央に配置されたポップアップ領域を計算する。
    let popup_area = crate::layout::centered_popup(f.area(), 70, 7);

    // 既存の描画を消してポップアップ用の背景にする。
    f.render_widget(Clear, popup_area);

    // ポップアップの外枠とスタイルを描画する。
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Input")
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, popup_area);

    // 内部レイアウト（プロンプト + 入力フィールド + ヘルプ）を定義する。
    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // プロンプト
            Constraint::Length(1), // 入力フィールド
            Constraint::Length(1), // 空行
            Constraint::Length(1), // ヘルプ
        ])
        .split(popup_area);

    // プロンプトメッセージを描画する。
    let prompt_widget = Paragraph::new(state.prompt.clone()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(prompt_widget, inner_layout[0]);

    // 表示幅を超える場合はカーソル付近が見えるようスクロールする。
    let display_width = inner_layout[1].width as usize;
    let scroll_offset = state.cursor.saturating_sub(display_width.saturating_sub(2));

    // 可視範囲を切り出し、カーソル位置に|を挿入して描画する。
    let visible: Vec<char> = state
        .chars
        .iter()
        .skip(scroll_offset)
        .take(display_width)
        .copied()
        .collect();
    let cursor_at = (state.cursor - scroll_offset).min(visible.len());
    let mut shown = String::new();
    shown.extend(&visible[..cursor_at]);
    shown.push('|');
    shown.extend(&visible[cursor_at..]);

    let input_widget = Paragraph::new(shown).style(Style::default().fg(Color::Green));
    f.render_widget(input_widget, inner_layout[1]);

    // ヘルプテキストを描画する。
    let help = Paragraph::new("Enter=確定 | ESC=キャンセル | Ctrl+U=クリア")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help, inner_layout[3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_text() {
        // 挿入と文字列化を検証する。
        let mut state = InputBoxState::new("p:", "", InputCallbackId::WorkOrderPath);
        for c in "wo.json".chars() {
            state.insert_char(c);
        }
        assert_eq!(state.text(), "wo.json");
        assert_eq!(state.cursor, 7);
    }

    #[test]
    fn test_backspace_and_delete() {
        // 削除系の操作を検証する。
        let mut state = InputBoxState::new("p:", "abc", InputCallbackId::AssistantQuestion);
        state.backspace();
        assert_eq!(state.text(), "ab");
        state.move_home();
        state.delete();
        assert_eq!(state.text(), "b");
        // 先頭でのBackspaceは何もしない。
        state.backspace();
        assert_eq!(state.text(), "b");
    }

    #[test]
    fn test_cursor_movement_bounds() {
        // カーソルが範囲外へ出ないことを検証する。
        let mut state = InputBoxState::new("p:", "xy", InputCallbackId::SettingsApiKey);
        state.move_right();
        assert_eq!(state.cursor, 2);
        state.move_end();
        assert_eq!(state.cursor, 2);
        state.move_home();
        state.move_left();
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn test_clear_line() {
        // クリアで値とカーソルが初期化されることを検証する。
        let mut state = InputBoxState::new("p:", "gemini-2.5-flash", InputCallbackId::SettingsModel);
        state.clear_line();
        assert_eq!(state.text(), "");
        assert_eq!(state.cursor, 0);
    }
}
