//! Camera capture module
//!
//! Provides cross-platform camera capture using the nokhwa crate.
//! Captures frames on a background thread and keeps the latest frame
//! available to the main loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use parking_lot::Mutex;

/// Camera frame data
#[derive(Clone)]
pub struct CameraFrame {
    /// RGB pixels
    pub image: RgbImage,
    /// Frame number, starting at 1
    pub frame_number: u64,
}

/// Information about an available camera
#[derive(Clone, Debug)]
pub struct CameraInfo {
    /// Camera index
    pub index: u32,
    /// Camera name
    pub name: String,
}

/// Camera capture interface
pub struct CameraCapture {
    /// Latest captured frame
    latest: Arc<Mutex<Option<CameraFrame>>>,
    /// Whether capture is running
    running: Arc<AtomicBool>,
    /// Capture thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl CameraCapture {
    /// List available cameras
    pub fn list_cameras() -> Vec<CameraInfo> {
        match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
            Ok(camera_list) => camera_list
                .iter()
                .enumerate()
                .map(|(idx, info)| CameraInfo {
                    index: idx as u32,
                    name: info.human_name().to_string(),
                })
                .collect(),
            Err(e) => {
                log::warn!("Failed to enumerate cameras: {:?}", e);
                Vec::new()
            }
        }
    }

    /// Start capturing from `camera_index`, asking for the closest format to `width`x`height`
    pub fn new(camera_index: u32, width: u32, height: u32) -> Result<Self, String> {
        let latest = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));

        let latest_clone = latest.clone();
        let running_clone = running.clone();

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(
                    camera_index,
                    Resolution::new(width, height),
                    latest_clone,
                    running_clone,
                );
            })
            .map_err(|e| format!("Failed to spawn capture thread: {}", e))?;

        Ok(Self {
            latest,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    fn open_camera(camera_index: u32, resolution: Resolution) -> Option<Camera> {
        let index = CameraIndex::Index(camera_index);
        let attempts = [
            RequestedFormatType::Closest(nokhwa::utils::CameraFormat::new(
                resolution,
                nokhwa::utils::FrameFormat::MJPEG,
                30,
            )),
            RequestedFormatType::HighestResolution(resolution),
            RequestedFormatType::None,
        ];

        for requested in attempts {
            let label = format!("{:?}", requested);
            match Camera::new(index.clone(), RequestedFormat::new::<RgbFormat>(requested)) {
                Ok(camera) => return Some(camera),
                Err(e) => log::warn!("Failed to open camera with {}: {:?}", label, e),
            }
        }
        None
    }

    /// Camera capture thread
    fn capture_thread(
        camera_index: u32,
        resolution: Resolution,
        latest: Arc<Mutex<Option<CameraFrame>>>,
        running: Arc<AtomicBool>,
    ) {
        log::info!("Starting camera capture thread (camera {})", camera_index);

        let Some(mut camera) = Self::open_camera(camera_index, resolution) else {
            log::error!("Failed to open camera {} with all format attempts", camera_index);
            running.store(false, Ordering::Release);
            return;
        };

        if let Err(e) = camera.open_stream() {
            log::error!("Failed to open camera stream: {:?}", e);
            running.store(false, Ordering::Release);
            return;
        }

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        let mut frame_number = 0u64;
        while running.load(Ordering::Acquire) {
            let frame = match camera.frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    continue;
                }
            };

            let decoded = match frame.decode_image::<RgbFormat>() {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("Failed to decode frame: {:?}", e);
                    continue;
                }
            };

            let (width, height) = (decoded.width(), decoded.height());
            let Some(image) = RgbImage::from_raw(width, height, decoded.into_raw()) else {
                log::warn!("Decoded frame has unexpected size {}x{}", width, height);
                continue;
            };

            frame_number += 1;
            *latest.lock() = Some(CameraFrame {
                image,
                frame_number,
            });
        }

        if let Err(e) = camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {:?}", e);
        }
        log::info!("Camera capture thread stopped");
    }

    /// Take the latest frame if it is newer than `after`
    pub fn frame_after(&self, after: u64) -> Option<CameraFrame> {
        let guard = self.latest.lock();
        match guard.as_ref() {
            Some(frame) if frame.frame_number > after => Some(frame.clone()),
            _ => None,
        }
    }

    /// Check if capture is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop capturing
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
