//! Gesture Frame - filter the region framed by two hands
//!
//! Captures camera input, tracks hand landmarks, and when the thumbs and index
//! fingers of both hands form a frame, renders the enclosed region through the
//! active visual filter. Filters cycle automatically on a timer and can be
//! switched from the keyboard.

pub mod app;
pub mod camera;
pub mod compositor;
pub mod config;
pub mod filters;
pub mod gesture;
pub mod ml;
pub mod overlay;
pub mod selector;
pub mod session;

pub use app::App;
pub use config::AppConfig;
pub use session::Session;
