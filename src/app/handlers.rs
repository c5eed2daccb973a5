//! キー入力ハンドラー関数。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::{
    assistant::{ChatMessage, ChatRole},
    checklist::ChecklistSession,
    events::{CaptureMode, Screen},
    input::{InputBoxState, InputCallbackId},
    report, shortcuts,
    store::StatusUpdate,
    submission::{FinancialStatus, GisStatus, InspectionStatus},
    worker::WorkerCmd,
};

use super::App;

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        return handle_input_box_key(app, k).await;
    }

    // チェックリストモーダルが開いていれば次に処理する。
    if app.checklist.is_some() {
        return handle_checklist_key(app, k);
    }

    // キャプチャセッション中はオーバーレイのキーのみ受け付ける。
    if app.capture_mode.is_some() {
        return handle_capture_key(app, k).await;
    }

    // 画面ごとのハンドラへ委譲する。
    match app.ui.screen {
        Screen::Packet => handle_packet_key(app, k).await,
        Screen::Dashboard => handle_dashboard_key(app, k).await,
        Screen::Assistant => handle_assistant_key(app, k).await,
        Screen::Settings => handle_settings_key(app, k).await,
    }
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// Tab巡回で次の画面へ遷移する。
async fn goto_next_screen(app: &mut App) -> Result<()> {
    let next = app.ui.screen.next();
    // アシスタント画面を初めて開くときはジョブデータを文脈として送る。
    if next == Screen::Assistant && app.chat.is_empty() && !app.chat_busy {
        let jobs_json = serde_json::to_string(app.store.jobs())?;
        app.chat_busy = true;
        app.worker_tx
            .send(WorkerCmd::AssistantContext(jobs_json))
            .await?;
    }
    app.ui.screen = next;
    app.ui.error = None;
    Ok(())
}

/// ジョブパケット画面のキー処理。
async fn handle_packet_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // パケット画面のショートカットを参照する。
    let sc = &app.shortcuts.packet;

    if shortcuts::matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if shortcuts::matches_shortcut(&k, &sc.next_screen) {
        goto_next_screen(app).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.settings) {
        // 設定画面へ遷移し、編集バッファを更新する。
        reload_settings_buffers(app);
        app.ui.screen = Screen::Settings;
        app.ui.status = "Settings".into();
    } else if shortcuts::matches_shortcut(&k, &sc.cycle_order) {
        // カタログの次の作業指示書へ切り替える（途中状態は破棄される）。
        if !app.catalog.is_empty() {
            app.catalog_idx = (app.catalog_idx + 1) % app.catalog.len();
            let wo = app.catalog[app.catalog_idx].clone();
            app.ui.status = format!("Selected work order {}", wo.work_order_number);
            app.packet.select_work_order(wo);
        }
    } else if shortcuts::matches_shortcut(&k, &sc.import) {
        // 作業指示書JSONのパス入力を促す。
        app.input_box = Some(InputBoxState::new(
            "Work order JSON path:",
            "",
            InputCallbackId::WorkOrderPath,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.checklist) {
        // 指示書が選択済みならチェックリストモーダルを開く。
        if let Some(wo) = &app.packet.work_order {
            app.checklist = Some(ChecklistSession::new(&wo.safety_checklist));
        } else {
            app.ui.status = "Select a work order first".into();
        }
    } else if shortcuts::matches_shortcut(&k, &sc.scan) {
        // チェックリスト確定後のみスキャンを開始する。
        if app.packet.capture_allowed() {
            app.capture_mode = Some(CaptureMode::Barcode);
            app.ui.status = "Scanning for barcode...".into();
            app.worker_tx.send(WorkerCmd::StartScan).await?;
        } else {
            app.ui.status = "Complete the safety checklist first".into();
        }
    } else if shortcuts::matches_shortcut(&k, &sc.gps) {
        // GPS取得を依頼する（取得中の再要求は無視）。
        if !app.packet.capture_allowed() {
            app.ui.status = "Complete the safety checklist first".into();
        } else if !app.ui.locating {
            app.ui.locating = true;
            app.ui.status = "Acquiring GPS fix...".into();
            app.worker_tx.send(WorkerCmd::CaptureGps).await?;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.photo) {
        // 撮影セッションを開始する。
        if app.packet.capture_allowed() {
            app.capture_mode = Some(CaptureMode::Photo);
            app.ui.status = "Opening camera...".into();
            app.worker_tx.send(WorkerCmd::StartPhoto).await?;
        } else {
            app.ui.status = "Complete the safety checklist first".into();
        }
    } else if shortcuts::matches_shortcut(&k, &sc.submit) {
        // 全フィールドが揃ったパケットを提出する。
        if let Some(submission) = app.packet.submit() {
            let wo_number = submission.work_order.work_order_number.clone();
            app.store.record_submission(submission);
            app.ui.status = format!("Job {wo_number} submitted for review");
            app.ui.log.push(format!("submitted: {wo_number}"));

            // 同じ指示書を選び直して次のキャプチャへ備える。
            if let Some(wo) = app.catalog.get(app.catalog_idx) {
                app.packet.select_work_order(wo.clone());
            }

            // ジョブデータが変わったのでアシスタント会話を仕切り直す。
            app.chat.clear();
            app.chat_busy = false;
        } else {
            app.ui.status = "Packet is incomplete (checklist, scan, GPS, photo)".into();
        }
    }

    Ok(false)
}

/// キャプチャ中オーバーレイのキー処理。
async fn handle_capture_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // キャプチャ用のショートカットを参照する。
    let sc = &app.shortcuts.capture;

    if shortcuts::matches_shortcut(&k, &sc.take_photo) {
        // 撮影セッション中のみ撮影トリガーを送る。
        if app.capture_mode == Some(CaptureMode::Photo) {
            app.ui.status = "Capturing photo...".into();
            app.worker_tx.send(WorkerCmd::TakePhoto).await?;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // セッションの解放はWorker側で行い、完了イベントで画面を戻す。
        app.ui.status = "Cancelling capture...".into();
        app.worker_tx.send(WorkerCmd::CancelCapture).await?;
    }

    Ok(false)
}

/// チェックリストモーダルのキー処理。
fn handle_checklist_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // チェックリスト用のショートカットを参照する。
    let sc = &app.shortcuts.checklist;

    if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 編集を破棄してモーダルを閉じる。
        app.checklist = None;
    } else if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 全項目完了のときのみ確定してパケットへ凍結する。
        if let Some(session) = app.checklist.take() {
            if session.all_complete() {
                if let Some(items) = session.confirm() {
                    app.packet.freeze_checklist(items);
                    app.ui.status = "Safety checklist confirmed".into();
                }
            } else {
                // 未完了なら開いたまま編集を続けさせる。
                app.ui.status = "All checklist items must be completed".into();
                app.checklist = Some(session);
            }
        }
    } else if let Some(session) = &mut app.checklist {
        if shortcuts::matches_shortcut(&k, &sc.toggle) {
            session.toggle_current();
        } else if shortcuts::matches_shortcut(&k, &sc.up) {
            session.move_up();
        } else if shortcuts::matches_shortcut(&k, &sc.down) {
            session.move_down();
        }
    }

    Ok(false)
}

/// ダッシュボード画面のキー処理。
async fn handle_dashboard_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // ダッシュボード画面のショートカットを参照する。
    let sc = &app.shortcuts.dashboard;

    if shortcuts::matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if shortcuts::matches_shortcut(&k, &sc.next_screen) {
        goto_next_screen(app).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.settings) {
        reload_settings_buffers(app);
        app.ui.screen = Screen::Settings;
        app.ui.status = "Settings".into();
    } else if shortcuts::matches_shortcut(&k, &sc.down) {
        // 次の行へ移動する。
        if app.ui.selected + 1 < app.store.len() {
            app.ui.selected += 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.up) {
        // 前の行へ移動する。
        if app.ui.selected > 0 {
            app.ui.selected -= 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.approve) {
        apply_status_update(
            app,
            StatusUpdate::Inspection(InspectionStatus::Approved),
            "Inspection approved",
        );
    } else if shortcuts::matches_shortcut(&k, &sc.reject) {
        apply_status_update(
            app,
            StatusUpdate::Inspection(InspectionStatus::Rejected),
            "Inspection rejected",
        );
    } else if shortcuts::matches_shortcut(&k, &sc.post_gis) {
        apply_status_update(
            app,
            StatusUpdate::Gis(GisStatus::Posted),
            "Posted to GIS",
        );
    } else if shortcuts::matches_shortcut(&k, &sc.financials) {
        apply_status_update(
            app,
            StatusUpdate::Financial(FinancialStatus::Generated),
            "Financial report generated",
        );
    } else if shortcuts::matches_shortcut(&k, &sc.report) {
        write_report(app)?;
    } else if shortcuts::matches_shortcut(&k, &sc.reset) {
        // デモ用の全データリセット。
        app.store.reset();
        app.ui.selected = 0;
        app.chat.clear();
        app.chat_busy = false;
        app.ui.status = "All submitted jobs cleared".into();
    }

    Ok(false)
}

/// 選択中ジョブへステータス更新を適用し、結果を表示する。
fn apply_status_update(app: &mut App, update: StatusUpdate, done_msg: &str) {
    let Some(job) = app.store.jobs().get(app.ui.selected) else {
        app.ui.status = "No job selected".into();
        return;
    };
    let id = job.instance_id;
    if app.store.update_status(id, update) {
        app.ui.status = done_msg.into();
    } else {
        // 不正な遷移は何も変更せず理由だけ知らせる。
        app.ui.status = match update {
            StatusUpdate::Inspection(_) => "Inspection is already decided".into(),
            StatusUpdate::Gis(_) => "GIS posting requires an approved, unposted job".into(),
            StatusUpdate::Financial(_) => {
                "Financials require an approved job without a report".into()
            }
        };
    }
}

/// 全提出ジョブのHTMLレポートをファイルへ書き出す。
fn write_report(app: &mut App) -> Result<()> {
    if app.store.is_empty() {
        app.ui.status = "No completed jobs to report".into();
        return Ok(());
    }

    let jobs = app.store.jobs();
    let html = report::render_report(jobs);
    let filename = report::report_filename(jobs);
    let fragments = report::fragments_for(jobs);

    // reports/ 配下へ書き出す。
    std::fs::create_dir_all("reports")?;
    let path = std::path::Path::new("reports").join(&filename);
    std::fs::write(&path, html)?;
    tracing::info!("report written: {}", path.display());

    // 各ジョブへ自身のレポート断片を添付する。
    app.store.attach_reports(fragments);
    app.ui.status = format!("Report saved to reports/{filename}");
    app.ui.log.push(format!("report: {filename}"));
    Ok(())
}

/// アシスタント画面のキー処理。
async fn handle_assistant_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // アシスタント画面のショートカットを参照する。
    let sc = &app.shortcuts.assistant;

    if shortcuts::matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if shortcuts::matches_shortcut(&k, &sc.next_screen) {
        goto_next_screen(app).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.ask) {
        // 応答待ちの間は新しい質問を受け付けない。
        if app.chat_busy {
            app.ui.status = "Assistant is still replying...".into();
        } else {
            app.input_box = Some(InputBoxState::new(
                "Ask about the completed jobs:",
                "",
                InputCallbackId::AssistantQuestion,
            ));
        }
    }

    Ok(false)
}

/// 設定画面のキー処理。
async fn handle_settings_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 設定画面のショートカットを参照する。
    let sc = &app.shortcuts.settings;

    if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 変更を破棄してパケット画面へ戻る。
        reload_settings_buffers(app);
        app.ui.screen = Screen::Packet;
    } else if shortcuts::matches_shortcut(&k, &sc.save) {
        // 編集バッファを設定へ反映する。
        app.cfg.assistant.api_key = app.api_key_buf.clone();
        app.cfg.assistant.model = app.model_buf.clone();
        app.cfg.user.crew_name = app.crew_name_buf.clone();
        // 設定ファイルを保存する。
        app.cfg.save(&app.cfg_path)?;

        // Workerにも設定更新を通知する。
        app.worker_tx
            .send(WorkerCmd::SaveSettings(app.cfg.clone()))
            .await?;
        // 資格情報が変わったのでアシスタント会話を仕切り直す。
        app.chat.clear();
        app.chat_busy = false;
        // 画面状態を更新してパケットへ戻る。
        app.ui.screen = Screen::Packet;
        app.ui.status = "Saved settings".into();
    } else if shortcuts::matches_shortcut(&k, &sc.api_key) {
        // APIキーの入力ボックスを開く。
        app.input_box = Some(InputBoxState::new(
            "Gemini API key:",
            &app.api_key_buf,
            InputCallbackId::SettingsApiKey,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.model) {
        // モデル名の入力ボックスを開く。
        app.input_box = Some(InputBoxState::new(
            "Model name:",
            &app.model_buf,
            InputCallbackId::SettingsModel,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.name) {
        // クルー名の入力ボックスを開く。
        app.input_box = Some(InputBoxState::new(
            "Crew name:",
            &app.crew_name_buf,
            InputCallbackId::SettingsCrewName,
        ));
    }

    Ok(false)
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが無ければ何もしない。
    let Some(input_state) = &mut app.input_box else {
        return Ok(false);
    };

    // 入力ボックス用ショートカットを参照する。
    let sc = &app.shortcuts.input_box;

    if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 入力ボックスを閉じる前に値とコールバック種別を保存する。
        let value = input_state.text();
        let callback_id = input_state.callback_id.clone();
        app.input_box = None;

        // コールバック種別に応じて値を反映する。
        apply_input_callback(app, callback_id, value).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 入力を破棄して入力ボックスを閉じる。
        app.input_box = None;
    } else if shortcuts::matches_shortcut(&k, &sc.backspace) {
        // バックスペースを処理する。
        input_state.backspace();
    } else if shortcuts::matches_shortcut(&k, &sc.delete) {
        // デリートを処理する。
        input_state.delete();
    } else if shortcuts::matches_shortcut(&k, &sc.left) {
        // 左移動を処理する。
        input_state.move_left();
    } else if shortcuts::matches_shortcut(&k, &sc.right) {
        // 右移動を処理する。
        input_state.move_right();
    } else if shortcuts::matches_shortcut(&k, &sc.home) {
        // 行頭移動を処理する。
        input_state.move_home();
    } else if shortcuts::matches_shortcut(&k, &sc.end) {
        // 行末移動を処理する。
        input_state.move_end();
    } else if shortcuts::matches_shortcut(&k, &sc.clear_line) {
        // 行をクリアする。
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code {
        // 通常の文字入力を処理する。
        if !k.modifiers.contains(KeyModifiers::CONTROL) {
            // コントロールキーでない場合のみ挿入する。
            input_state.insert_char(c);
        }
    }

    Ok(false)
}

/// 入力ボックスのコールバックを適用する。
async fn apply_input_callback(
    app: &mut App,
    callback_id: InputCallbackId,
    value: String,
) -> Result<()> {
    match callback_id {
        InputCallbackId::WorkOrderPath => {
            // ファイルを読み込み、検証が通れば指示書を差し替える。
            match std::fs::read_to_string(value.trim()) {
                Ok(text) => match app.packet.import_work_order(&text) {
                    Ok(()) => {
                        let number = app
                            .packet
                            .work_order
                            .as_ref()
                            .map(|wo| wo.work_order_number.clone())
                            .unwrap_or_default();
                        app.ui.status = format!("Imported work order {number}");
                        app.ui.error = None;
                    }
                    Err(e) => {
                        tracing::warn!("work order import rejected: {e}");
                        app.ui.error = Some(format!("Invalid work order file: {e}"));
                    }
                },
                Err(e) => {
                    app.ui.error = Some(format!("Could not read {}: {e}", value.trim()));
                }
            }
        }
        InputCallbackId::AssistantQuestion => {
            // 空の質問は送らない。
            let question = value.trim().to_string();
            if !question.is_empty() {
                app.chat.push(ChatMessage {
                    role: ChatRole::User,
                    text: question.clone(),
                });
                app.chat_busy = true;
                app.worker_tx.send(WorkerCmd::AssistantAsk(question)).await?;
            }
        }
        InputCallbackId::SettingsApiKey => app.api_key_buf = value,
        InputCallbackId::SettingsModel => app.model_buf = value,
        InputCallbackId::SettingsCrewName => app.crew_name_buf = value,
    }
    Ok(())
}

/// 設定画面用の編集バッファを設定値から再読み込みする。
fn reload_settings_buffers(app: &mut App) {
    // 設定の現在値を編集用バッファへ反映する。
    app.api_key_buf = app.cfg.assistant.api_key.clone();
    app.model_buf = app.cfg.assistant.model.clone();
    app.crew_name_buf = app.cfg.user.crew_name.clone();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ctrl_c() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(is_ctrl_c(&ctrl_c));
        let plain_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::empty());
        assert!(!is_ctrl_c(&plain_c));
    }
}
