//! Hand landmark tracking
//!
//! The core only needs something that turns a frame into hand landmark sets;
//! that contract is [`HandTracker`]. [`OnnxHandTracker`] implements it with a
//! MediaPipe-compatible hand landmark model run through ONNX Runtime.

use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::Array4;

use crate::config::AppConfig;
use crate::gesture::{HandLandmarks, Point, LANDMARK_COUNT, WRIST};

/// Landmark model input size (square)
const MODEL_INPUT_SIZE: u32 = 224;
/// Crop side relative to the previous hand's bounding box
const TRACKING_CROP_SCALE: f32 = 2.0;
/// Smallest crop used for tracking, in frame pixels
const MIN_CROP_SIZE: f32 = 48.0;
/// Default model file name looked up in `models/`
const DEFAULT_MODEL_FILE: &str = "hand_landmark.onnx";
/// Output names used for the 21x3 screen landmark tensor by common exports
const LANDMARK_OUTPUT_NAMES: &[&str] = &["Identity", "xyz_x21", "landmarks", "screen_landmarks"];
/// Output names used for the hand presence score by common exports
const PRESENCE_OUTPUT_NAMES: &[&str] = &["Identity_1", "hand_score", "handflag", "presence"];

/// Produces hand landmark sets for a frame
pub trait HandTracker {
    /// Hands found in `frame`, coordinates in frame pixels
    fn detect(&mut self, frame: &RgbImage) -> Vec<HandLandmarks>;
}

/// Tracker that never finds hands; used when no model is available
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHands;

impl HandTracker for NoHands {
    fn detect(&mut self, _frame: &RgbImage) -> Vec<HandLandmarks> {
        Vec::new()
    }
}

/// Fixed landmark sets, returned for every frame
impl HandTracker for Vec<HandLandmarks> {
    fn detect(&mut self, _frame: &RgbImage) -> Vec<HandLandmarks> {
        self.clone()
    }
}

/// Tracker thresholds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerSettings {
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub max_hands: usize,
}

impl From<&AppConfig> for TrackerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_detection_confidence: config.min_detection_confidence,
            min_tracking_confidence: config.min_tracking_confidence,
            max_hands: config.max_hands,
        }
    }
}

/// Square region of the frame fed to the landmark model.
///
/// May extend past the frame edges; those samples are black.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl CropRect {
    /// Crop centred on (cx, cy)
    pub fn centered(cx: f32, cy: f32, size: f32) -> Self {
        Self {
            x: cx - size / 2.0,
            y: cy - size / 2.0,
            size,
        }
    }

    /// Crop around a hand found in an earlier frame
    pub fn around_hand(hand: &HandLandmarks) -> Self {
        let (min, max) = hand.bounds();
        let (min_x, min_y, max_x, max_y) = (min.x as f32, min.y as f32, max.x as f32, max.y as f32);
        let size = ((max_x - min_x).max(max_y - min_y) * TRACKING_CROP_SCALE).max(MIN_CROP_SIZE);
        Self::centered((min_x + max_x) / 2.0, (min_y + max_y) / 2.0, size)
    }

    /// Crops covering the left and right halves of a frame
    pub fn frame_halves(width: u32, height: u32) -> [Self; 2] {
        let (w, h) = (width as f32, height as f32);
        let size = (w / 2.0).max(h);
        [
            Self::centered(w * 0.25, h * 0.5, size),
            Self::centered(w * 0.75, h * 0.5, size),
        ]
    }

    /// Map a point in model input space back to frame pixels
    pub fn to_frame(&self, mx: f32, my: f32) -> Point {
        let scale = self.size / MODEL_INPUT_SIZE as f32;
        Point::new(
            (self.x + mx * scale).round() as i32,
            (self.y + my * scale).round() as i32,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        let (px, py) = (p.x as f32, p.y as f32);
        px >= self.x && px < self.x + self.size && py >= self.y && py < self.y + self.size
    }
}

/// Nearest-neighbour resample of a crop into NHWC floats in [0, 1]
pub fn preprocess_crop(frame: &RgbImage, crop: &CropRect) -> Vec<f32> {
    let n = MODEL_INPUT_SIZE;
    let mut output = vec![0.0f32; (n * n * 3) as usize];
    let ratio = crop.size / n as f32;
    let (fw, fh) = (frame.width() as i64, frame.height() as i64);

    for y in 0..n {
        for x in 0..n {
            let src_x = (crop.x + (x as f32 + 0.5) * ratio).floor() as i64;
            let src_y = (crop.y + (y as f32 + 0.5) * ratio).floor() as i64;
            if src_x < 0 || src_y < 0 || src_x >= fw || src_y >= fh {
                continue;
            }
            let p = frame.get_pixel(src_x as u32, src_y as u32);
            let out_idx = ((y * n + x) * 3) as usize;
            output[out_idx] = p[0] as f32 / 255.0;
            output[out_idx + 1] = p[1] as f32 / 255.0;
            output[out_idx + 2] = p[2] as f32 / 255.0;
        }
    }

    output
}

/// Convert raw model outputs into landmarks and a presence score.
///
/// `landmarks` holds x, y, z triples in model input pixels. Scores outside
/// [0, 1] are treated as logits.
pub fn decode_landmarks(crop: &CropRect, landmarks: &[f32], presence: f32) -> Option<(HandLandmarks, f32)> {
    if landmarks.len() < LANDMARK_COUNT * 3 {
        return None;
    }
    let score = if (0.0..=1.0).contains(&presence) {
        presence
    } else {
        1.0 / (1.0 + (-presence).exp())
    };

    let mut hand = HandLandmarks::default();
    for (i, point) in hand.points.iter_mut().enumerate() {
        *point = crop.to_frame(landmarks[i * 3], landmarks[i * 3 + 1]);
    }
    Some((hand, score))
}

/// Which model outputs carry the landmarks and the presence score
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    pub landmarks: String,
    pub presence: String,
}

impl OutputLayout {
    /// Pick the landmark and presence outputs from a model's output names.
    ///
    /// Both must be present; other outputs (handedness, world landmarks) are ignored.
    pub fn resolve<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, TrackerError> {
        let names: Vec<&str> = names.into_iter().collect();
        let find = |wanted: &[&str], what: &str| {
            wanted
                .iter()
                .find(|w| names.contains(w))
                .map(|w| w.to_string())
                .ok_or_else(|| {
                    TrackerError::Runtime(format!("Model has no {} output (outputs: {:?})", what, names))
                })
        };
        Ok(Self {
            landmarks: find(LANDMARK_OUTPUT_NAMES, "landmark")?,
            presence: find(PRESENCE_OUTPUT_NAMES, "presence score")?,
        })
    }
}

/// Tracker errors
#[derive(Debug)]
pub enum TrackerError {
    ModelNotFound(PathBuf),
    Runtime(String),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::ModelNotFound(path) => write!(f, "Hand landmark model not found: {:?}", path),
            TrackerError::Runtime(msg) => write!(f, "ONNX Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {}

/// Hand tracker backed by an ONNX landmark model.
///
/// Hands seen in the previous frame are re-run on a crop around their last
/// position; the two frame halves are then scanned for new hands.
pub struct OnnxHandTracker {
    session: ort::session::Session,
    outputs: OutputLayout,
    settings: TrackerSettings,
    /// Hands returned for the previous frame
    previous: Vec<HandLandmarks>,
}

impl OnnxHandTracker {
    /// Load the model and create a session
    pub fn new(model_path: &Path, settings: TrackerSettings) -> Result<Self, TrackerError> {
        if !model_path.exists() {
            return Err(TrackerError::ModelNotFound(model_path.to_path_buf()));
        }

        ort::init()
            .with_name("GestureFrame")
            .commit()
            .map_err(|e| TrackerError::Runtime(format!("Failed to initialize ORT: {}", e)))?;

        let session = ort::session::Session::builder()
            .map_err(|e| TrackerError::Runtime(format!("Failed to create session builder: {}", e)))?
            .with_intra_threads(2)
            .map_err(|e| TrackerError::Runtime(format!("Failed to set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| TrackerError::Runtime(format!("Failed to load landmark model: {}", e)))?;

        let outputs = OutputLayout::resolve(session.outputs.iter().map(|o| o.name.as_str()))?;
        log::info!(
            "Loaded hand landmark model from {:?} (landmarks: {}, presence: {})",
            model_path,
            outputs.landmarks,
            outputs.presence
        );

        Ok(Self {
            session,
            outputs,
            settings,
            previous: Vec::new(),
        })
    }

    /// Resolve the model path from configuration or the usual `models/` locations
    pub fn find_model(config: &AppConfig) -> Result<PathBuf, TrackerError> {
        if let Some(path) = &config.model_path {
            return if path.exists() {
                Ok(path.clone())
            } else {
                Err(TrackerError::ModelNotFound(path.clone()))
            };
        }

        let mut candidates = Vec::new();
        if let Ok(exe_path) = std::env::current_exe() {
            // next to the executable, then up from target/{debug,release}
            for dir in exe_path.ancestors().skip(1).take(3) {
                candidates.push(dir.join("models").join(DEFAULT_MODEL_FILE));
            }
        }
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join("models").join(DEFAULT_MODEL_FILE));
        }

        candidates
            .iter()
            .find(|p| p.exists())
            .cloned()
            .ok_or_else(|| TrackerError::ModelNotFound(PathBuf::from("models").join(DEFAULT_MODEL_FILE)))
    }

    /// Run the model on one crop
    fn run_crop(&mut self, frame: &RgbImage, crop: &CropRect) -> Result<Option<(HandLandmarks, f32)>, TrackerError> {
        let n = MODEL_INPUT_SIZE as usize;
        let input = preprocess_crop(frame, crop);

        let input_array = Array4::from_shape_vec((1, n, n, 3), input)
            .map_err(|e| TrackerError::Runtime(format!("Failed to create input array: {}", e)))?;

        let input_tensor = ort::value::Tensor::from_array(input_array)
            .map_err(|e| TrackerError::Runtime(format!("Failed to create tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| TrackerError::Runtime(format!("Inference failed: {}", e)))?;

        let mut landmarks: Option<Vec<f32>> = None;
        let mut presence: Option<f32> = None;
        for (name, value) in outputs.iter() {
            let name: &str = name;
            let wanted_landmarks = name == self.outputs.landmarks;
            if !wanted_landmarks && name != self.outputs.presence {
                continue;
            }
            let (_shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| TrackerError::Runtime(format!("Failed to extract {}: {}", name, e)))?;
            if wanted_landmarks {
                landmarks = Some(data.to_vec());
            } else {
                presence = data.first().copied();
            }
        }

        let landmarks = landmarks
            .ok_or_else(|| TrackerError::Runtime(format!("Output {} missing", self.outputs.landmarks)))?;
        let presence = presence
            .ok_or_else(|| TrackerError::Runtime(format!("Output {} missing", self.outputs.presence)))?;
        Ok(decode_landmarks(crop, &landmarks, presence))
    }

    /// Run a crop and keep the hand if it clears `threshold`
    fn try_crop(&mut self, frame: &RgbImage, crop: &CropRect, threshold: f32) -> Option<HandLandmarks> {
        match self.run_crop(frame, crop) {
            Ok(Some((hand, score))) if score >= threshold => Some(hand),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Hand tracking error: {}", e);
                None
            }
        }
    }
}

/// Whether `hand` is already represented in `hands`
fn is_duplicate(hands: &[HandLandmarks], hand: &HandLandmarks) -> bool {
    let wrist = hand.points[WRIST];
    hands.iter().any(|h| {
        let (min, max) = h.bounds();
        wrist.x >= min.x && wrist.x <= max.x && wrist.y >= min.y && wrist.y <= max.y
    })
}

impl HandTracker for OnnxHandTracker {
    fn detect(&mut self, frame: &RgbImage) -> Vec<HandLandmarks> {
        let mut hands: Vec<HandLandmarks> = Vec::with_capacity(self.settings.max_hands);

        let previous = std::mem::take(&mut self.previous);
        for prev in &previous {
            if hands.len() >= self.settings.max_hands {
                break;
            }
            let crop = CropRect::around_hand(prev);
            if let Some(hand) = self.try_crop(frame, &crop, self.settings.min_tracking_confidence) {
                if !is_duplicate(&hands, &hand) {
                    hands.push(hand);
                }
            }
        }

        for crop in CropRect::frame_halves(frame.width(), frame.height()) {
            if hands.len() >= self.settings.max_hands {
                break;
            }
            // a tracked hand already occupies this half
            if hands.iter().any(|h| crop.contains(h.points[WRIST])) {
                continue;
            }
            if let Some(hand) = self.try_crop(frame, &crop, self.settings.min_detection_confidence) {
                if !is_duplicate(&hands, &hand) {
                    hands.push(hand);
                }
            }
        }

        self.previous = hands.clone();
        hands
    }
}
