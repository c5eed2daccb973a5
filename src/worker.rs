//! Background worker handling device capture and assistant jobs.

use crate::{
    assistant::AssistantSession,
    capture::{self, CancelToken},
    config::Config,
    device::{CameraStream, FieldDevice, SimulatedDevice},
};
use anyhow::Result;
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Open the camera and start the barcode scan loop.
    StartScan,
    /// Open the camera for a photo session.
    StartPhoto,
    /// Grab the current frame of the active photo session.
    TakePhoto,
    /// Tear down whatever capture session is active.
    CancelCapture,
    /// Request a single geolocation fix.
    CaptureGps,
    /// Persist and apply updated settings.
    SaveSettings(Config),
    /// Start a fresh assistant session seeded with the job list JSON.
    AssistantContext(String),
    /// Ask the assistant a follow-up question.
    AssistantAsk(String),
}

/// Events emitted by the worker for UI updates.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    /// First non-empty barcode detection result.
    MaterialScanned(String),
    /// Photo session is live; an explicit trigger will capture.
    CameraReady,
    /// Encoded photo from the active session.
    PhotoCaptured(String),
    /// Formatted coordinates from a successful fix.
    GpsCaptured(String),
    /// A capture operation failed; capture mode should be exited.
    CaptureFailed(String),
    /// A capture session ended without a value.
    CaptureCancelled,
    /// Streamed assistant text chunk.
    AssistantChunk(String),
    /// The assistant finished its current reply.
    AssistantDone,
    /// No credential configured; chat stays off.
    AssistantDisabled(String),
    /// The assistant call failed.
    AssistantFailed(String),
    /// Informational log message.
    Log(String),
    /// User-visible error message.
    Error(String),
}

/// Main worker loop: build the device and assistant, then handle commands
/// sequentially. Only the scan loop runs as a concurrent task, so it can be
/// cancelled while the worker keeps serving commands.
pub async fn run(
    mut rx: mpsc::Receiver<WorkerCmd>,
    tx: mpsc::Sender<WorkerEvent>,
    mut cfg: Config,
) {
    // Shared HTTP client for all assistant calls.
    let http = Client::new();
    tracing::info!("worker started");

    let mut device: Arc<dyn FieldDevice> = Arc::new(SimulatedDevice::new(cfg.capture.clone()));
    let mut assistant =
        AssistantSession::new(cfg.assistant.api_key.clone(), cfg.assistant.model.clone());

    // At most one capture session is active at a time.
    let mut scan_cancel: Option<CancelToken> = None;
    let mut photo_stream: Option<Box<dyn CameraStream>> = None;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::SaveSettings(new_cfg) => {
                tracing::info!("settings updated");
                teardown_capture(&mut scan_cancel, &mut photo_stream);
                cfg = new_cfg;
                device = Arc::new(SimulatedDevice::new(cfg.capture.clone()));
                assistant =
                    AssistantSession::new(cfg.assistant.api_key.clone(), cfg.assistant.model.clone());
                let _ = tx.send(WorkerEvent::Log("settings updated".into())).await;
            }

            WorkerCmd::StartScan => {
                tracing::info!("scan session start");
                teardown_capture(&mut scan_cancel, &mut photo_stream);
                if !device.barcode_supported() {
                    let _ = tx
                        .send(WorkerEvent::CaptureFailed(
                            "Barcode scanner is not supported on this device.".into(),
                        ))
                        .await;
                    continue;
                }
                match open_camera_with_retry(device.as_ref()).await {
                    Ok(stream) => {
                        let (token, handle) = capture::cancel_pair();
                        scan_cancel = Some(token);
                        let interval = Duration::from_millis(cfg.capture.scan_interval_ms);
                        let dev = Arc::clone(&device);
                        let tx_scan = tx.clone();
                        // The loop owns the stream and releases it on every
                        // exit path.
                        tokio::spawn(async move {
                            let ev =
                                match capture::run_scan_loop(dev, stream, interval, handle).await {
                                    Ok(Some(value)) => WorkerEvent::MaterialScanned(value),
                                    Ok(None) => WorkerEvent::CaptureCancelled,
                                    Err(e) => {
                                        tracing::error!("scan loop failed: {e}");
                                        WorkerEvent::CaptureFailed(format!(
                                            "Barcode scan failed: {e}"
                                        ))
                                    }
                                };
                            let _ = tx_scan.send(ev).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!("camera open failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::CaptureFailed(format!(
                                "Could not access camera: {e}"
                            )))
                            .await;
                    }
                }
            }

            WorkerCmd::StartPhoto => {
                tracing::info!("photo session start");
                teardown_capture(&mut scan_cancel, &mut photo_stream);
                match open_camera_with_retry(device.as_ref()).await {
                    Ok(stream) => {
                        photo_stream = Some(stream);
                        let _ = tx.send(WorkerEvent::CameraReady).await;
                    }
                    Err(e) => {
                        tracing::error!("camera open failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::CaptureFailed(format!(
                                "Could not access camera: {e}"
                            )))
                            .await;
                    }
                }
            }

            WorkerCmd::TakePhoto => {
                let Some(mut stream) = photo_stream.take() else {
                    let _ = tx
                        .send(WorkerEvent::CaptureFailed("No active camera session.".into()))
                        .await;
                    continue;
                };
                // The stream always stops here, photo or not.
                let result = capture::take_photo(stream.as_mut()).await;
                stream.stop();
                match result {
                    Ok(data) => {
                        tracing::info!("photo captured ({} bytes encoded)", data.len());
                        let _ = tx.send(WorkerEvent::PhotoCaptured(data)).await;
                    }
                    Err(e) => {
                        tracing::error!("photo capture failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::CaptureFailed(format!(
                                "Could not capture photo: {e}"
                            )))
                            .await;
                    }
                }
            }

            WorkerCmd::CancelCapture => {
                tracing::info!("capture cancelled");
                // A cancelled scan loop reports back by itself; a photo
                // session has no task, so report here.
                let had_photo = photo_stream.is_some();
                teardown_capture(&mut scan_cancel, &mut photo_stream);
                if had_photo {
                    let _ = tx.send(WorkerEvent::CaptureCancelled).await;
                }
            }

            WorkerCmd::CaptureGps => {
                tracing::info!("gps fix requested");
                let limit = Duration::from_secs(cfg.capture.gps_timeout_secs);
                match capture::acquire_fix(device.as_ref(), limit).await {
                    Ok(coords) => {
                        tracing::info!("gps fix acquired: {coords}");
                        let _ = tx.send(WorkerEvent::GpsCaptured(coords)).await;
                    }
                    Err(e) => {
                        tracing::error!("gps fix failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::CaptureFailed(format!(
                                "Could not get GPS location: {e}"
                            )))
                            .await;
                    }
                }
            }

            WorkerCmd::AssistantContext(jobs_json) => {
                tracing::info!("assistant context push ({} bytes)", jobs_json.len());
                assistant.reset();
                if !assistant.is_configured() {
                    let _ = tx
                        .send(WorkerEvent::AssistantDisabled(
                            "API key not found. Chat assistant is disabled.".into(),
                        ))
                        .await;
                    continue;
                }
                assistant.push_user(&AssistantSession::context_prompt(&jobs_json));
                match stream_reply(&http, &mut assistant, &tx).await {
                    Ok(_) => {
                        let _ = tx.send(WorkerEvent::AssistantDone).await;
                    }
                    Err(e) => {
                        tracing::error!("assistant init failed: {e}");
                        assistant.rollback_last_user();
                        let _ = tx
                            .send(WorkerEvent::AssistantFailed(
                                "Could not start the AI assistant.".into(),
                            ))
                            .await;
                    }
                }
            }

            WorkerCmd::AssistantAsk(question) => {
                tracing::info!("assistant question");
                if !assistant.is_configured() {
                    let _ = tx
                        .send(WorkerEvent::AssistantDisabled(
                            "API key not found. Chat assistant is disabled.".into(),
                        ))
                        .await;
                    continue;
                }
                assistant.push_user(&question);
                match stream_reply(&http, &mut assistant, &tx).await {
                    Ok(_) => {
                        let _ = tx.send(WorkerEvent::AssistantDone).await;
                    }
                    Err(e) => {
                        tracing::error!("assistant reply failed: {e}");
                        assistant.rollback_last_user();
                        let _ = tx
                            .send(WorkerEvent::AssistantFailed(
                                "Sorry, something went wrong. Please try again.".into(),
                            ))
                            .await;
                    }
                }
            }
        }
    }
}

/// Cancel the scan task and/or release the photo stream.
fn teardown_capture(
    scan_cancel: &mut Option<CancelToken>,
    photo_stream: &mut Option<Box<dyn CameraStream>>,
) {
    if let Some(token) = scan_cancel.take() {
        token.cancel();
    }
    if let Some(mut stream) = photo_stream.take() {
        stream.stop();
    }
}

/// Open the camera, allowing a just-cancelled session a moment to release it.
async fn open_camera_with_retry(device: &dyn FieldDevice) -> Result<Box<dyn CameraStream>> {
    let mut last_err = None;
    for _ in 0..10 {
        match device.open_camera().await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("camera unavailable")))
}

/// Stream one assistant reply, forwarding each chunk to the UI.
async fn stream_reply(
    http: &Client,
    session: &mut AssistantSession,
    tx: &mpsc::Sender<WorkerEvent>,
) -> Result<()> {
    let mut stream = session.begin_stream(http).await?;
    let mut full_reply = String::new();
    while let Some(text) = stream.next_text().await? {
        full_reply.push_str(&text);
        let _ = tx.send(WorkerEvent::AssistantChunk(text)).await;
    }
    session.push_model(&full_reply);
    Ok(())
}
