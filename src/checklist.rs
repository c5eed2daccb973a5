//! 安全チェックリストのモーダルセッション。

use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::workorder::ChecklistItem;

/// チェックリストモーダルの状態。
///
/// 作業指示書のチェックリストを種として開き、全項目が完了するまで
/// 確定できない。確定した項目はセッションへ凍結され、以降の
/// キャプチャ操作の前提条件になる。
#[derive(Clone, Debug)]
pub struct ChecklistSession {
    /// モーダル内で編集中の項目（開いた時点で全て未完了）。
    pub items: Vec<ChecklistItem>,
    /// カーソル位置。
    pub cursor: usize,
}

impl ChecklistSession {
    /// 指示書のチェックリストを種にセッションを開始する。
    pub fn new(seed: &[ChecklistItem]) -> Self {
        // 種の完了フラグは引き継がず、必ず未完了から始める。
        let items = seed
            .iter()
            .map(|item| ChecklistItem {
                id: item.id.clone(),
                prompt: item.prompt.clone(),
                completed: false,
            })
            .collect();
        Self { items, cursor: 0 }
    }

    /// カーソル位置の項目の完了状態を反転する。
    pub fn toggle_current(&mut self) {
        if let Some(item) = self.items.get_mut(self.cursor) {
            item.completed = !item.completed;
        }
    }

    /// カーソルを1つ上へ移動する。
    pub fn move_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    /// カーソルを1つ下へ移動する。
    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.items.len() {
            self.cursor += 1;
        }
    }

    /// 全項目が完了しているか判定する。
    pub fn all_complete(&self) -> bool {
        // 空のチェックリストは完了扱いとする（旧形式の指示書向け）。
        self.items.iter().all(|item| item.completed)
    }

    /// 全項目完了なら確定し、凍結済みリストを返す。
    pub fn confirm(self) -> Option<Vec<ChecklistItem>> {
        if self.all_complete() {
            Some(self.items)
        } else {
            None
        }
    }
}

/// チェックリストモーダルをポップアップとして描画する。
pub fn render_checklist_modal(f: &mut Frame, state: &ChecklistSession) {
    // 項目数に応じた高さの中央ポップアップ領域を計算する。
    let height = (state.items.len() as u16 + 7).min(f.area().height);
    let popup_area = crate::layout::centered_popup(f.area(), 70, height);

    // 既存の描画を消してモーダルを重ねる。
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Pre-Job Safety Checklist")
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, popup_area);

    // 説明 + 項目一覧 + 空行 + ヘルプの縦レイアウト。
    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(popup_area);

    // 注意文を描画する。
    let note = Paragraph::new("All items must be completed before proceeding with the job.")
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(note, inner_layout[0]);

    // 各項目を [x]/[ ] とカーソル印付きで並べる。
    let mut lines: Vec<String> = Vec::with_capacity(state.items.len());
    for (i, item) in state.items.iter().enumerate() {
        let marker = if i == state.cursor { ">" } else { " " };
        let box_mark = if item.completed { "[x]" } else { "[ ]" };
        lines.push(format!("{} {} {}", marker, box_mark, item.prompt));
    }
    let list = Paragraph::new(lines.join("\n")).style(Style::default().fg(Color::White));
    f.render_widget(list, inner_layout[1]);

    // 全完了時のみ確定キーを案内する。
    let help_text = if state.all_complete() {
        "Space=toggle | Enter=confirm | Esc=cancel"
    } else {
        "Space=toggle | Esc=cancel (complete all items to confirm)"
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help, inner_layout[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workorder::mock_work_orders;

    #[test]
    fn test_session_starts_all_incomplete() {
        // 種の完了フラグに関わらず未完了で開始することを検証する。
        let mut seed = mock_work_orders()[0].safety_checklist.clone();
        seed[0].completed = true;
        let session = ChecklistSession::new(&seed);
        assert!(session.items.iter().all(|item| !item.completed));
    }

    #[test]
    fn test_confirm_requires_every_item() {
        // 全項目完了まで確定できないことを検証する。
        let seed = mock_work_orders()[0].safety_checklist.clone();
        let mut session = ChecklistSession::new(&seed);
        assert_eq!(seed.len(), 3);

        // 2件だけ完了させても確定不可。
        session.toggle_current();
        session.move_down();
        session.toggle_current();
        assert!(!session.all_complete());
        assert!(session.clone().confirm().is_none());

        // 3件目を完了させると確定できる。
        session.move_down();
        session.toggle_current();
        assert!(session.all_complete());
        let frozen = session.confirm().unwrap();
        assert!(frozen.iter().all(|item| item.completed));
    }

    #[test]
    fn test_toggle_is_reversible() {
        // 完了の取り消しで再び確定不可になることを検証する。
        let seed = vec![crate::workorder::ChecklistItem {
            id: "c1".into(),
            prompt: "Briefing done?".into(),
            completed: false,
        }];
        let mut session = ChecklistSession::new(&seed);
        session.toggle_current();
        assert!(session.all_complete());
        session.toggle_current();
        assert!(!session.all_complete());
    }

    #[test]
    fn test_empty_checklist_counts_as_complete() {
        // 旧形式の空チェックリストは即確定できることを検証する。
        let session = ChecklistSession::new(&[]);
        assert!(session.all_complete());
        assert_eq!(session.confirm().unwrap().len(), 0);
    }
}
