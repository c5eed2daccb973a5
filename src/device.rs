//! Device capability layer: camera stream, barcode detection, geolocation.
//!
//! The capture workflow only talks to the `FieldDevice` trait, so the whole
//! workflow runs against the built-in simulator in the demo and against fakes
//! in tests. The simulator is driven by the `[capture]` config section and can
//! also exercise the denied/unsupported error paths.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rand::Rng;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::CaptureCfg;

/// One sampled camera frame (RGB, row-major).
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// A single geolocation fix.
#[derive(Clone, Copy, Debug)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoFix {
    /// Display form recorded into the job packet.
    pub fn formatted(&self) -> String {
        format!("{:.6}° N, {:.6}° W", self.latitude, self.longitude)
    }
}

/// An exclusively-owned live camera stream. `stop` must release the device
/// on every exit path; dropping the stream releases it as well.
#[async_trait]
pub trait CameraStream: Send {
    /// Sample the current frame.
    async fn grab_frame(&mut self) -> Result<Frame>;
    /// Release the camera. Safe to call more than once.
    fn stop(&mut self);
}

/// Injected capability interface for camera, barcode detection, and GPS.
#[async_trait]
pub trait FieldDevice: Send + Sync {
    /// Whether a barcode detector is available on this device.
    fn barcode_supported(&self) -> bool;
    /// Open the camera. Fails when access is denied or the stream is busy.
    async fn open_camera(&self) -> Result<Box<dyn CameraStream>>;
    /// Run barcode detection over one frame. `None` means nothing was found
    /// in this frame; the caller keeps sampling.
    async fn detect_barcode(&self, frame: &Frame) -> Result<Option<String>>;
    /// Request one high-accuracy geolocation fix.
    async fn get_fix(&self) -> Result<GeoFix>;
}

/// Config-driven device simulator used by the demo binary.
pub struct SimulatedDevice {
    cfg: CaptureCfg,
    /// Exclusive-ownership flag shared with the active stream.
    camera_busy: Arc<AtomicBool>,
    /// Frames run through the detector since the camera was opened.
    frames_sampled: AtomicU32,
}

impl SimulatedDevice {
    pub fn new(cfg: CaptureCfg) -> Self {
        Self {
            cfg,
            camera_busy: Arc::new(AtomicBool::new(false)),
            frames_sampled: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl FieldDevice for SimulatedDevice {
    fn barcode_supported(&self) -> bool {
        self.cfg.sim_barcode_supported
    }

    async fn open_camera(&self) -> Result<Box<dyn CameraStream>> {
        if !self.cfg.sim_camera_available {
            return Err(anyhow!("camera access denied"));
        }
        // The stream is exclusively owned; a second session must wait for the
        // first one to be torn down.
        if self.camera_busy.swap(true, Ordering::SeqCst) {
            return Err(anyhow!("camera is already in use"));
        }
        self.frames_sampled.store(0, Ordering::SeqCst);
        Ok(Box::new(SimCameraStream {
            busy: Arc::clone(&self.camera_busy),
            frame_no: 0,
            open: true,
        }))
    }

    async fn detect_barcode(&self, _frame: &Frame) -> Result<Option<String>> {
        if !self.cfg.sim_barcode_supported {
            return Err(anyhow!("barcode detector is not supported"));
        }
        // The simulated barcode comes into focus after a fixed number of
        // sampled frames.
        let seen = self.frames_sampled.fetch_add(1, Ordering::SeqCst) + 1;
        if seen >= self.cfg.sim_frames_until_detect {
            Ok(Some(self.cfg.sim_barcode_value.clone()))
        } else {
            Ok(None)
        }
    }

    async fn get_fix(&self) -> Result<GeoFix> {
        if !self.cfg.sim_gps_available {
            return Err(anyhow!("location services are disabled"));
        }
        // Emulate acquisition latency, then jitter around the site center.
        sleep(Duration::from_millis(300)).await;
        let mut rng = rand::rng();
        Ok(GeoFix {
            latitude: self.cfg.site_latitude + rng.random_range(-0.0005..0.0005),
            longitude: self.cfg.site_longitude + rng.random_range(-0.0005..0.0005),
        })
    }
}

/// Simulated camera stream producing synthetic gradient frames.
struct SimCameraStream {
    busy: Arc<AtomicBool>,
    frame_no: u32,
    open: bool,
}

#[async_trait]
impl CameraStream for SimCameraStream {
    async fn grab_frame(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(anyhow!("camera stream is closed"));
        }
        self.frame_no += 1;
        Ok(synthetic_frame(96, 72, self.frame_no))
    }

    fn stop(&mut self) {
        if self.open {
            self.open = false;
            self.busy.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for SimCameraStream {
    fn drop(&mut self) {
        // Release on teardown even if nobody called stop.
        self.stop();
    }
}

/// Build a small RGB gradient frame that changes with the frame number.
fn synthetic_frame(width: u32, height: u32, frame_no: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width) as u8);
            data.push((y * 255 / height) as u8);
            data.push((frame_no % 256) as u8);
        }
    }
    Frame { width, height, data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn sim(cfg_mut: impl FnOnce(&mut CaptureCfg)) -> SimulatedDevice {
        let mut cfg = Config::default().capture;
        cfg_mut(&mut cfg);
        SimulatedDevice::new(cfg)
    }

    #[tokio::test]
    async fn test_camera_stream_is_exclusive() {
        let device = sim(|_| {});
        let mut stream = device.open_camera().await.unwrap();
        assert!(device.open_camera().await.is_err());
        stream.stop();
        // Released streams free the device for the next session.
        assert!(device.open_camera().await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_releases_camera() {
        let device = sim(|_| {});
        {
            let _stream = device.open_camera().await.unwrap();
        }
        assert!(device.open_camera().await.is_ok());
    }

    #[tokio::test]
    async fn test_denied_camera_fails_to_open() {
        let device = sim(|c| c.sim_camera_available = false);
        assert!(device.open_camera().await.is_err());
    }

    #[tokio::test]
    async fn test_detection_after_configured_frames() {
        let device = sim(|c| {
            c.sim_frames_until_detect = 3;
            c.sim_barcode_value = "VALVE-GAS-4IN-PE".into();
        });
        let mut stream = device.open_camera().await.unwrap();
        for _ in 0..2 {
            let frame = stream.grab_frame().await.unwrap();
            assert!(device.detect_barcode(&frame).await.unwrap().is_none());
        }
        let frame = stream.grab_frame().await.unwrap();
        assert_eq!(
            device.detect_barcode(&frame).await.unwrap().as_deref(),
            Some("VALVE-GAS-4IN-PE")
        );
    }

    #[tokio::test]
    async fn test_unsupported_detector_errors() {
        let device = sim(|c| c.sim_barcode_supported = false);
        assert!(!device.barcode_supported());
        let frame = synthetic_frame(4, 4, 1);
        assert!(device.detect_barcode(&frame).await.is_err());
    }

    #[tokio::test]
    async fn test_fix_jitters_around_site() {
        let device = sim(|_| {});
        let fix = device.get_fix().await.unwrap();
        assert!((fix.latitude - 40.7128).abs() < 0.001);
        assert!((fix.longitude - 74.0060).abs() < 0.001);
        assert!(fix.formatted().contains("° N,"));
    }

    #[tokio::test]
    async fn test_disabled_gps_errors() {
        let device = sim(|c| c.sim_gps_available = false);
        assert!(device.get_fix().await.is_err());
    }
}
