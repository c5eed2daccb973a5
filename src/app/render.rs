//! TUI描画関連の関数。

use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
};

use crate::{
    assistant::ChatRole,
    checklist,
    events::{CaptureMode, Screen},
    input, layout,
    shortcuts::Shortcuts,
    submission::SubmittedJobData,
};

use super::App;

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    // メインレイアウト（Body + HELP + STATUS）を作る。
    let main_layout = layout::create_main_layout(f.area());

    // 画面ごとの本文を描画する。
    match app.ui.screen {
        Screen::Packet => draw_packet_body(f, app, main_layout.body),
        Screen::Dashboard => draw_dashboard_body(f, app, main_layout.body),
        Screen::Assistant => draw_assistant_body(f, app, main_layout.body),
        Screen::Settings => draw_settings_body(f, app, main_layout.body),
    }

    // HELPバー（画面ごとのショートカット）を描画する。
    let help_text = get_help_text(&app.ui.screen, &app.shortcuts);
    let help_bar = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    // STATUSバー（画面名・ジョブ情報・エラー）を描画する。
    let status_bar = build_status_bar(app);
    f.render_widget(status_bar, main_layout.status_bar);

    // キャプチャセッション中はオーバーレイを重ねる。
    if let Some(mode) = app.capture_mode {
        draw_capture_overlay(f, mode);
    }

    // チェックリストモーダルが開いていれば重ねて描画する。
    if let Some(session) = &app.checklist {
        checklist::render_checklist_modal(f, session);
    }

    // 入力ボックスが開いていれば最前面に描画する。
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state);
    }
}

/// ジョブパケット画面の本文を描画する。
fn draw_packet_body(f: &mut Frame, app: &App, area: Rect) {
    let body_layout = layout::create_body_layout(area);

    // 左パネル：選択中の指示書とキャプチャ進行状況。
    let mut lines: Vec<String> = vec![];
    match &app.packet.work_order {
        Some(wo) => {
            lines.push(format!("Work Order: {}", wo.work_order_number));
            lines.push(format!("Task: {}", wo.task));
            lines.push(format!("Location: {}", wo.location));
            lines.push(String::new());
            lines.push("Packet progress:".into());

            // 各ステップの完了状況を [x]/[ ] で示す。
            lines.push(step_line(app.packet.checklist_done(), "Safety checklist confirmed"));
            let material = match &app.packet.material_id {
                Some(id) if app.packet.material_verified => {
                    format!("Material scanned: {id} (verified)")
                }
                Some(id) => format!("Material scanned: {id} (NOT on BOM)"),
                None => "Material scanned".into(),
            };
            lines.push(step_line(app.packet.material_id.is_some(), &material));
            let gps = match &app.packet.gps_coords {
                Some(coords) => format!("Location tagged: {coords}"),
                None if app.ui.locating => "Location tagged (acquiring...)".into(),
                None => "Location tagged".into(),
            };
            lines.push(step_line(app.packet.gps_coords.is_some(), &gps));
            lines.push(step_line(app.packet.photo_data.is_some(), "Photo attached"));
            lines.push(String::new());
            if app.packet.ready_to_submit() {
                lines.push("Ready to submit (press Enter)".into());
            } else {
                lines.push("Complete all steps to submit".into());
            }
        }
        None => {
            lines.push("No work order selected.".into());
            lines.push(String::new());
            lines.push("Press w to cycle the catalog or u to import a JSON file.".into());
        }
    }
    let packet_panel = Paragraph::new(lines.join("\n"))
        .block(Block::default().borders(Borders::ALL).title("JOB PACKET"))
        .wrap(Wrap { trim: true });
    f.render_widget(packet_panel, body_layout.main_panel);

    // 右パネル：BOMとログ。
    let info_panel = Paragraph::new(build_packet_info_text(app))
        .block(Block::default().borders(Borders::ALL).title("INFO"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, body_layout.info_panel);
}

/// ステップ1行分の [x]/[ ] 付きテキストを作る。
fn step_line(done: bool, text: &str) -> String {
    let mark = if done { "[x]" } else { "[ ]" };
    format!("{mark} {text}")
}

/// パケット画面の右パネル用テキストを構築する。
fn build_packet_info_text(app: &App) -> String {
    let mut lines = vec![format!("Crew: {}", app.cfg.user.crew_name)];

    // 選択中の指示書のBOMを一覧する。
    if let Some(wo) = &app.packet.work_order {
        lines.push(String::new());
        lines.push("Bill of materials:".into());
        for item in &wo.bill_of_materials {
            lines.push(format!(
                "  {} x{} - {}",
                item.item_id, item.quantity, item.description
            ));
        }
    }

    // 直近のログを表示する。
    lines.push(String::new());
    lines.push("Log:".into());
    for entry in app.ui.log.iter().rev().take(8).rev() {
        lines.push(entry.clone());
    }
    lines.join("\n")
}

/// ダッシュボード画面の本文を描画する。
fn draw_dashboard_body(f: &mut Frame, app: &App, area: Rect) {
    let body_layout = layout::create_body_layout(area);

    // 提出済みジョブからテーブル行を組み立てる。
    let rows = app.store.jobs().iter().enumerate().map(|(i, job)| {
        Row::new(vec![
            format!("{}", i + 1),
            job.work_order.work_order_number.clone(),
            job.work_order.task.clone(),
            job.inspection_status.label().to_string(),
            job.gis_status.label().to_string(),
            job.financial_status.label().to_string(),
        ])
    });

    // ジョブテーブルのウィジェットを構築する。
    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(18),
            Constraint::Min(10),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(10),
        ],
    )
    .block(Block::default().borders(Borders::ALL).title("SUBMITTED JOBS"))
    .header(Row::new(vec!["#", "work order", "task", "inspect", "gis", "finance"]).bold())
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(255, 140, 0)) // オレンジ色の背景
            .fg(Color::Black) // 黒文字
            .add_modifier(Modifier::BOLD),
    );

    // 選択中の行をハイライトする。
    let mut table_state = ratatui::widgets::TableState::default();
    if !app.store.is_empty() {
        table_state.select(Some(app.ui.selected));
    }
    // テーブルを描画する。
    f.render_stateful_widget(table, body_layout.main_panel, &mut table_state);

    // 右パネル：選択中ジョブの詳細。
    let detail = match app.store.jobs().get(app.ui.selected) {
        Some(job) => build_job_detail_text(job),
        None => "No submitted jobs yet.\n\nSubmit a packet from the field screen.".into(),
    };
    let info_panel = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title("DETAIL"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, body_layout.info_panel);
}

/// 選択中ジョブの詳細テキストを構築する。
fn build_job_detail_text(job: &SubmittedJobData) -> String {
    let mut lines = vec![
        format!("Work Order: {}", job.work_order.work_order_number),
        format!("Task: {}", job.work_order.task),
        format!("Submitted: {}", job.submission_date),
        String::new(),
        format!(
            "Material: {} ({})",
            job.material_id,
            if job.material_verified {
                "verified"
            } else {
                "NOT verified"
            }
        ),
        format!("GPS: {}", job.gps_coords),
        format!("Photo: {} chars attached", job.photo_data.len()),
        String::new(),
        format!("Inspection: {}", job.inspection_status.label()),
        format!("GIS: {}", job.gis_status.label()),
        format!("Financial: {}", job.financial_status.label()),
    ];

    // 生成済みの財務データがあれば内訳を表示する。
    if let Some(fin) = &job.financials {
        lines.push(String::new());
        lines.push(format!("Report ID: {}", fin.report_id));
        lines.push(format!("Labor:    ${:.2}", fin.labor_cost));
        lines.push(format!("Material: ${:.2}", fin.material_cost));
        lines.push(format!("Total:    ${:.2}", fin.total_cost));
    }
    if job.report_html.is_some() {
        lines.push(String::new());
        lines.push("HTML report fragment attached".into());
    }
    lines.join("\n")
}

/// アシスタント画面の本文を描画する。
fn draw_assistant_body(f: &mut Frame, app: &App, area: Rect) {
    let body_layout = layout::create_body_layout(area);

    // 左パネル：チャットの書き起こし。
    let mut lines: Vec<String> = vec![];
    for msg in &app.chat {
        let speaker = match msg.role {
            ChatRole::User => "You",
            ChatRole::Model => "Assistant",
        };
        lines.push(format!("{speaker}: {}", msg.text));
        lines.push(String::new());
    }
    if app.chat_busy {
        lines.push("Assistant is typing...".into());
    } else if app.chat.is_empty() {
        lines.push("Press i to ask about the submitted jobs.".into());
    }
    let chat_panel = Paragraph::new(lines.join("\n"))
        .block(Block::default().borders(Borders::ALL).title("JOB ASSISTANT"))
        .wrap(Wrap { trim: true });
    f.render_widget(chat_panel, body_layout.main_panel);

    // 右パネル：ジョブの概況。
    let summary = format!(
        "Model: {}\n\nSubmitted jobs: {}\n\nThe assistant answers with the current job data as context.",
        app.cfg.assistant.model,
        app.store.len(),
    );
    let info_panel = Paragraph::new(summary)
        .block(Block::default().borders(Borders::ALL).title("CONTEXT"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, body_layout.info_panel);
}

/// 設定画面の本文を描画する。
fn draw_settings_body(f: &mut Frame, app: &App, area: Rect) {
    // APIキーは伏せ字で表示する。
    let masked_key = if app.api_key_buf.is_empty() {
        "(not set)".to_string()
    } else {
        "*".repeat(app.api_key_buf.chars().count().min(24))
    };

    let text = format!(
        "Settings\n\n[k] Gemini API key: {}\n[m] Model: {}\n[n] Crew name: {}\n\nEnter to save, Esc to discard.",
        masked_key, app.model_buf, app.crew_name_buf,
    );
    let panel = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("SETTINGS"))
        .wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

/// キャプチャセッション中のオーバーレイを描画する。
fn draw_capture_overlay(f: &mut Frame, mode: CaptureMode) {
    let popup_area = layout::centered_popup(f.area(), 60, 7);
    f.render_widget(Clear, popup_area);

    let (title, text) = match mode {
        CaptureMode::Barcode => (
            "SCANNING",
            "Scanning for a barcode...\n\nEsc to cancel.",
        ),
        CaptureMode::Photo => (
            "CAMERA",
            "Camera session active.\n\nEnter to capture, Esc to cancel.",
        ),
    };
    let overlay = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().bg(Color::DarkGray))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(overlay, popup_area);
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App) -> Paragraph<'static> {
    let screen_name = match app.ui.screen {
        Screen::Packet => "Field Packet",
        Screen::Dashboard => "Dashboard",
        Screen::Assistant => "Assistant",
        Screen::Settings => "Settings",
    };

    // 提出件数と承認済み件数を集計する。
    let job_info = format!(
        "Jobs: {} submitted, {} approved",
        app.store.len(),
        app.store
            .jobs()
            .iter()
            .filter(|j| j.inspection_status == crate::submission::InspectionStatus::Approved)
            .count()
    );

    // エラーの有無でステータス文字列を切り替える。
    let status_text = if let Some(err) = &app.ui.error {
        format!("[{}] {} | ERROR: {}", screen_name, job_info, err)
    } else {
        format!("[{}] {} | {}", screen_name, job_info, app.ui.status)
    };

    // ステータスバーのウィジェットを生成する。
    let mut status_bar = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });

    // エラー時は赤色で強調表示する。
    if app.ui.error.is_some() {
        status_bar = status_bar.style(Style::default().fg(Color::Red));
    }

    status_bar
}

/// 現在画面に応じたヘルプ文字列を返す。
fn get_help_text(screen: &Screen, shortcuts: &Shortcuts) -> String {
    match screen {
        Screen::Packet => format!(
            "{}: quit | Tab: screens | {}: order | {}: import | {}: checklist | {}: scan | {}: gps | {}: photo | {}: submit | {}: settings",
            format_keys(&shortcuts.packet.quit),
            format_keys(&shortcuts.packet.cycle_order),
            format_keys(&shortcuts.packet.import),
            format_keys(&shortcuts.packet.checklist),
            format_keys(&shortcuts.packet.scan),
            format_keys(&shortcuts.packet.gps),
            format_keys(&shortcuts.packet.photo),
            format_keys(&shortcuts.packet.submit),
            format_keys(&shortcuts.packet.settings)
        ),
        Screen::Dashboard => format!(
            "{}: quit | Tab: screens | {}/{}: navigate | {}: approve | {}: reject | {}: gis | {}: financials | {}: report | {}: reset",
            format_keys(&shortcuts.dashboard.quit),
            format_keys(&shortcuts.dashboard.up),
            format_keys(&shortcuts.dashboard.down),
            format_keys(&shortcuts.dashboard.approve),
            format_keys(&shortcuts.dashboard.reject),
            format_keys(&shortcuts.dashboard.post_gis),
            format_keys(&shortcuts.dashboard.financials),
            format_keys(&shortcuts.dashboard.report),
            format_keys(&shortcuts.dashboard.reset)
        ),
        Screen::Assistant => format!(
            "{}: quit | Tab: screens | {}: ask a question",
            format_keys(&shortcuts.assistant.quit),
            format_keys(&shortcuts.assistant.ask)
        ),
        Screen::Settings => format!(
            "{}: api key | {}: model | {}: name | {}: save | {}: cancel",
            format_keys(&shortcuts.settings.api_key),
            format_keys(&shortcuts.settings.model),
            format_keys(&shortcuts.settings.name),
            format_keys(&shortcuts.settings.save),
            format_keys(&shortcuts.settings.cancel)
        ),
    }
}

/// ショートカットキーの配列を表示用文字列に変換する。
fn format_keys(keys: &[String]) -> String {
    keys.join("/")
}
