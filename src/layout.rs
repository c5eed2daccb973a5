//! レイアウト計算のヘルパー関数

use ratatui::prelude::*;

/// メイン画面の3つの領域
pub struct MainLayout {
    /// 本文（画面ごとの内容）の領域
    pub body: Rect,
    /// HELPバーの領域
    pub help_bar: Rect,
    /// STATUSバーの領域
    pub status_bar: Rect,
}

/// 本文を左右に分割した2つの領域
pub struct BodyLayout {
    /// 左側（一覧・パケット項目）の領域
    pub main_panel: Rect,
    /// 右側（詳細・ログ）の領域
    pub info_panel: Rect,
}

/// 画面全体を縦に分割する（Body + HELP + STATUS）
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

/// Body領域を左右に分割する（左60% + 右40%）
pub fn create_body_layout(area: Rect) -> BodyLayout {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(60), // 一覧側
            Constraint::Percentage(40), // 詳細側
        ])
        .split(area);

    BodyLayout {
        main_panel: chunks[0],
        info_panel: chunks[1],
    }
}

/// 中央配置のポップアップ領域を計算する
pub fn centered_popup(area: Rect, width_percent: u16, height: u16) -> Rect {
    // 縦方向の余白を作り、中央行を取り出す。
    let rows = Layout::default()
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
        .split(rows[1])[1]
}
