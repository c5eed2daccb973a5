//! Capture session machinery: scan loop, GPS fix, photo encoding.
//!
//! The barcode scan loop is a cancellable repeating task bound to one capture
//! session. The camera stream is released on every exit path: detection,
//! cancellation, and errors alike.

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

use crate::device::{CameraStream, FieldDevice, Frame};

/// Sender half of a capture session's cancellation token.
pub struct CancelToken {
    tx: watch::Sender<bool>,
}

/// Receiver half handed to the running scan task.
#[derive(Clone)]
pub struct CancelHandle {
    rx: watch::Receiver<bool>,
}

/// Build a fresh cancellation token pair for one capture session.
pub fn cancel_pair() -> (CancelToken, CancelHandle) {
    let (tx, rx) = watch::channel(false);
    (CancelToken { tx }, CancelHandle { rx })
}

impl CancelToken {
    /// Request cancellation. Idempotent; the task may already have finished.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelHandle {
    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&mut self) {
        // wait_for only errors when the sender is gone, which also ends the
        // session.
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Sample frames from the stream at `interval` and run barcode detection on
/// each until a value is found or the session is cancelled.
///
/// Returns `Ok(Some(value))` on first detection, `Ok(None)` on cancellation.
/// The stream is stopped before returning, including on errors.
pub async fn run_scan_loop(
    device: Arc<dyn FieldDevice>,
    mut stream: Box<dyn CameraStream>,
    interval: Duration,
    mut cancel: CancelHandle,
) -> Result<Option<String>> {
    let outcome = scan_frames(device.as_ref(), stream.as_mut(), interval, &mut cancel).await;
    stream.stop();
    outcome
}

/// Inner loop so the caller can stop the stream on every return path.
async fn scan_frames(
    device: &dyn FieldDevice,
    stream: &mut dyn CameraStream,
    interval: Duration,
    cancel: &mut CancelHandle,
) -> Result<Option<String>> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            _ = sleep(interval) => {
                let frame = stream.grab_frame().await?;
                if let Some(value) = device.detect_barcode(&frame).await? {
                    tracing::info!("barcode detected: {value}");
                    return Ok(Some(value));
                }
            }
        }
    }
}

/// Request one geolocation fix with a bounded timeout and format it.
pub async fn acquire_fix(device: &dyn FieldDevice, limit: Duration) -> Result<String> {
    let fix = timeout(limit, device.get_fix())
        .await
        .map_err(|_| anyhow!("GPS fix timed out after {}s", limit.as_secs()))?
        .context("GPS fix failed")?;
    Ok(fix.formatted())
}

/// Grab one frame from the active stream and encode it as a photo data URL.
/// The stream stays open; the caller decides when the session ends.
pub async fn take_photo(stream: &mut dyn CameraStream) -> Result<String> {
    let frame = stream.grab_frame().await?;
    Ok(encode_photo(&frame))
}

/// Encode an RGB frame as a base64 `data:image/bmp` URL.
pub fn encode_photo(frame: &Frame) -> String {
    let bmp = encode_bmp(frame);
    format!("data:image/bmp;base64,{}", STANDARD.encode(bmp))
}

/// Pack RGB pixels into a 24-bit uncompressed BMP (rows bottom-up, BGR,
/// 4-byte row padding).
fn encode_bmp(frame: &Frame) -> Vec<u8> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let row_bytes = (width * 3).div_ceil(4) * 4;
    let pixel_bytes = row_bytes * height;
    let file_size = 54 + pixel_bytes;

    let mut out = Vec::with_capacity(file_size);
    // BITMAPFILEHEADER
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&54u32.to_le_bytes());
    // BITMAPINFOHEADER
    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&(frame.width as i32).to_le_bytes());
    out.extend_from_slice(&(frame.height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(pixel_bytes as u32).to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&[0; 8]);
    // Pixel rows, bottom-up.
    for y in (0..height).rev() {
        let row_start = y * width * 3;
        for x in 0..width {
            let px = row_start + x * 3;
            let (r, g, b) = (frame.data[px], frame.data[px + 1], frame.data[px + 2]);
            out.extend_from_slice(&[b, g, r]);
        }
        out.resize(out.len() + row_bytes - width * 3, 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Scripted fake standing in for a real device during tests.
    struct FakeDevice {
        detect_after: u32,
        frames_seen: AtomicU32,
        fail_detect: bool,
        hang_gps: bool,
    }

    impl FakeDevice {
        fn detect_on(n: u32) -> Self {
            Self {
                detect_after: n,
                frames_seen: AtomicU32::new(0),
                fail_detect: false,
                hang_gps: false,
            }
        }
    }

    struct FakeStream {
        released: Arc<AtomicBool>,
    }

    #[async_trait]
    impl CameraStream for FakeStream {
        async fn grab_frame(&mut self) -> Result<Frame> {
            Ok(Frame {
                width: 2,
                height: 2,
                data: vec![0; 12],
            })
        }

        fn stop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl FieldDevice for FakeDevice {
        fn barcode_supported(&self) -> bool {
            true
        }

        async fn open_camera(&self) -> Result<Box<dyn CameraStream>> {
            Ok(Box::new(FakeStream {
                released: Arc::new(AtomicBool::new(false)),
            }))
        }

        async fn detect_barcode(&self, _frame: &Frame) -> Result<Option<String>> {
            if self.fail_detect {
                return Err(anyhow!("detector broke"));
            }
            let seen = self.frames_seen.fetch_add(1, Ordering::SeqCst) + 1;
            if seen >= self.detect_after {
                Ok(Some("GASPIPE-HDPE-4IN".into()))
            } else {
                Ok(None)
            }
        }

        async fn get_fix(&self) -> Result<crate::device::GeoFix> {
            if self.hang_gps {
                // Models a platform request that never completes.
                futures_never().await;
            }
            Ok(crate::device::GeoFix {
                latitude: 40.7128,
                longitude: 74.0060,
            })
        }
    }

    /// A future that never resolves.
    async fn futures_never() {
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    fn fake_stream() -> (Box<dyn CameraStream>, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        (
            Box::new(FakeStream {
                released: Arc::clone(&released),
            }),
            released,
        )
    }

    #[tokio::test]
    async fn test_scan_returns_first_detection_and_releases_stream() {
        let device: Arc<dyn FieldDevice> = Arc::new(FakeDevice::detect_on(3));
        let (stream, released) = fake_stream();
        let (_token, handle) = cancel_pair();
        let value = run_scan_loop(device, stream, Duration::from_millis(1), handle)
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("GASPIPE-HDPE-4IN"));
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_stops_scan_without_value() {
        let device: Arc<dyn FieldDevice> = Arc::new(FakeDevice::detect_on(u32::MAX));
        let (stream, released) = fake_stream();
        let (token, handle) = cancel_pair();

        let task = tokio::spawn(run_scan_loop(
            device,
            stream,
            Duration::from_millis(1),
            handle,
        ));
        sleep(Duration::from_millis(20)).await;
        token.cancel();

        let value = task.await.unwrap().unwrap();
        assert!(value.is_none());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_detector_error_still_releases_stream() {
        let mut device = FakeDevice::detect_on(1);
        device.fail_detect = true;
        let device: Arc<dyn FieldDevice> = Arc::new(device);
        let (stream, released) = fake_stream();
        let (_token, handle) = cancel_pair();

        let result = run_scan_loop(device, stream, Duration::from_millis(1), handle).await;
        assert!(result.is_err());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_gps_fix_is_bounded_by_timeout() {
        let mut device = FakeDevice::detect_on(1);
        device.hang_gps = true;
        let err = acquire_fix(&device, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_gps_fix_formats_coordinates() {
        let device = FakeDevice::detect_on(1);
        let coords = acquire_fix(&device, Duration::from_secs(1)).await.unwrap();
        assert_eq!(coords, "40.712800° N, 74.006000° W");
    }

    #[test]
    fn test_encode_photo_is_a_bmp_data_url() {
        let frame = Frame {
            width: 3,
            height: 2,
            data: vec![255; 18],
        };
        let url = encode_photo(&frame);
        let encoded = url.strip_prefix("data:image/bmp;base64,").unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[0..2], b"BM");
        // 3px rows pad to 12 bytes; 54-byte header + 2 rows.
        assert_eq!(bytes.len(), 54 + 12 * 2);
    }
}
