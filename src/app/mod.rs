//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use anyhow::Result;
use crossterm::event::{self, Event};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc;

use crate::{
    assistant::{ChatMessage, ChatRole},
    checklist::ChecklistSession,
    config::Config,
    events::{CaptureMode, Screen, UiState},
    input::InputBoxState,
    packet::JobPacket,
    shortcuts::Shortcuts,
    store::ReviewStore,
    ui::Tui,
    worker::{self, WorkerCmd, WorkerEvent},
    workorder::{self, WorkOrderPacket},
};

use handlers::{handle_key, is_ctrl_c};
use render::draw;

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// 永続化された設定ファイルのパス。
    pub cfg_path: PathBuf,
    /// メモリ上の現在設定。
    pub cfg: Config,
    /// 選択位置やステータスなどUI固有の状態。
    pub ui: UiState,

    /// 現場クルー側のジョブパケット進行状態。
    pub packet: JobPacket,
    /// 編集中のチェックリストモーダル（表示中はSome）。
    pub checklist: Option<ChecklistSession>,
    /// 起動中のキャプチャセッション（スキャン／撮影）。
    pub capture_mode: Option<CaptureMode>,
    /// 選択可能な作業指示書カタログ。
    pub catalog: Vec<WorkOrderPacket>,
    /// カタログ内の現在位置。
    pub catalog_idx: usize,

    /// バックオフィス側の提出済みジョブストア。
    pub store: ReviewStore,

    /// アシスタントのチャット履歴（表示用）。
    pub chat: Vec<ChatMessage>,
    /// アシスタントの応答待ちフラグ。
    pub chat_busy: bool,

    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,

    /// 設定画面で編集するAPIキー。
    pub api_key_buf: String,
    /// 設定画面で編集するモデル名。
    pub model_buf: String,
    /// 設定画面で編集するクルー名。
    pub crew_name_buf: String,

    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,

    /// ショートカットキー設定。
    pub shortcuts: Shortcuts,
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(terminal: &mut Tui) -> Result<()> {
    // 設定ファイルを読み込む（初回はデフォルトを生成）。
    let cfg_path = PathBuf::from("config.toml");
    let cfg = Config::load_or_default(&cfg_path)?;

    // ショートカット設定を読み込む（無ければデフォルト）。
    let shortcuts_path = PathBuf::from("shortcut.toml");
    let shortcuts = Shortcuts::load_or_default(&shortcuts_path)?;

    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    // 初期設定スナップショットでWorkerを起動する。
    tokio::spawn(worker::run(rx_cmd, tx_ev, cfg.clone()));

    // 組み込みの作業指示書カタログを読み込み、先頭を選択する。
    let catalog = workorder::mock_work_orders();
    let mut packet = JobPacket::new();
    if let Some(first) = catalog.first() {
        packet.select_work_order(first.clone());
    }

    // アプリ状態を初期化する。
    let mut app = App {
        cfg_path,
        cfg: cfg.clone(),
        ui: UiState {
            screen: Screen::Packet,
            selected: 0,
            log: vec![],
            status: "Ready".into(),
            locating: false,
            error: None,
        },
        packet,
        checklist: None,
        capture_mode: None,
        catalog,
        catalog_idx: 0,
        store: ReviewStore::new(),
        chat: vec![],
        chat_busy: false,
        worker_tx: tx_cmd,
        worker_rx: rx_ev,
        api_key_buf: cfg.assistant.api_key.clone(),
        model_buf: cfg.assistant.model.clone(),
        crew_name_buf: cfg.user.crew_name.clone(),
        input_box: None,
        shortcuts,
    };

    loop {
        // 現在の状態を描画する。
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev);
        }

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(k) = event::read()?
        {
            // どのフェーズでもCtrl+Cで終了できるようにする。
            if is_ctrl_c(&k) {
                break;
            }
            if handle_key(&mut app, k).await? {
                break;
            }
        }
    }
    Ok(())
}

/// WorkerイベントをUI状態へ反映する。
fn handle_worker_event(app: &mut App, ev: WorkerEvent) {
    match ev {
        WorkerEvent::MaterialScanned(value) => {
            // スキャン結果をパケットへ記録し、照合結果を表示する。
            app.capture_mode = None;
            app.packet.record_material(value.clone());
            if app.packet.material_verified {
                app.ui.status = format!("Material {value} verified against BOM");
            } else {
                app.ui.status = format!("Material {value} is NOT on the bill of materials");
            }
            app.ui.log.push(format!("scanned: {value}"));
        }
        WorkerEvent::CameraReady => {
            // 撮影トリガー待ちであることを知らせる。
            app.ui.status = "Camera ready - press Enter to capture".into();
        }
        WorkerEvent::PhotoCaptured(data) => {
            // 撮影結果をパケットへ記録する。
            app.capture_mode = None;
            app.packet.record_photo(data);
            app.ui.status = "Photo attached to the packet".into();
            app.ui.log.push("photo captured".into());
        }
        WorkerEvent::GpsCaptured(coords) => {
            // 位置情報をパケットへ記録する。
            app.ui.locating = false;
            app.ui.status = format!("Location tagged: {coords}");
            app.ui.log.push(format!("gps: {coords}"));
            app.packet.record_gps(coords);
        }
        WorkerEvent::CaptureFailed(msg) => {
            // キャプチャ状態を解除してエラーを表示する。
            app.capture_mode = None;
            app.ui.locating = false;
            app.ui.status = msg.clone();
            app.ui.error = Some(msg);
        }
        WorkerEvent::CaptureCancelled => {
            // キャプチャ状態を解除する。
            app.capture_mode = None;
            app.ui.status = "Capture cancelled".into();
        }
        WorkerEvent::AssistantChunk(text) => {
            // ストリーミング中の応答は末尾のモデル発言へ追記する。
            match app.chat.last_mut() {
                Some(last) if last.role == ChatRole::Model && app.chat_busy => {
                    last.text.push_str(&text);
                }
                _ => app.chat.push(ChatMessage {
                    role: ChatRole::Model,
                    text,
                }),
            }
        }
        WorkerEvent::AssistantDone => {
            app.chat_busy = false;
        }
        WorkerEvent::AssistantDisabled(msg) => {
            // キー未設定の案内をチャット欄に表示する。
            app.chat_busy = false;
            app.chat.push(ChatMessage {
                role: ChatRole::Model,
                text: msg,
            });
        }
        WorkerEvent::AssistantFailed(msg) => {
            // 失敗メッセージをチャット欄に表示する。
            app.chat_busy = false;
            app.chat.push(ChatMessage {
                role: ChatRole::Model,
                text: msg,
            });
        }
        WorkerEvent::Log(s) => {
            // ログを追加する。
            app.ui.log.push(s);
        }
        WorkerEvent::Error(s) => {
            // ステータスにエラーを表示する。
            app.ui.status = format!("Error: {s}");
            app.ui.error = Some(s);
        }
    }
}
