//! 画面遷移用のUI状態と画面種別。

/// TUIで現在表示中の画面。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    /// 現場クルーのジョブパケット画面。
    Packet,
    /// バックオフィスのダッシュボード画面。
    Dashboard,
    /// ジョブアシスタント（チャット）画面。
    Assistant,
    /// 設定編集画面。
    Settings,
}

impl Screen {
    /// Tabキーで巡回する次の画面を返す（設定画面は巡回に含めない）。
    pub fn next(&self) -> Screen {
        match self {
            Screen::Packet => Screen::Dashboard,
            Screen::Dashboard => Screen::Assistant,
            Screen::Assistant => Screen::Packet,
            Screen::Settings => Screen::Packet,
        }
    }
}

/// 起動中のキャプチャセッションの種別。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    /// バーコードスキャン（検出ループあり）。
    Barcode,
    /// 写真撮影（明示トリガーで1フレーム取得）。
    Photo,
}

/// 描画側と共有するUI状態。
#[derive(Clone, Debug)]
pub struct UiState {
    /// 現在の画面。
    pub screen: Screen,
    /// ダッシュボードのジョブ一覧の選択行。
    pub selected: usize,
    /// 右側パネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// GPS取得中フラグ（ボタン無効化用）。
    pub locating: bool,
    /// エラーメッセージ（強調表示用）。
    pub error: Option<String>,
}
