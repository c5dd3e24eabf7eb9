//! Per-tick pipeline
//!
//! A [`Session`] owns the filter catalog, gesture detector, filter selector
//! and compositor, all built from one [`AppConfig`]. Each tick runs gesture
//! detection, the selector's timer check and compositing, strictly in that
//! order. Commands are handled before the tick that follows them, so a manual
//! change shows up in the very next frame.

use image::RgbImage;

use crate::compositor::RegionCompositor;
use crate::config::{AppConfig, ConfigError, FilterParams};
use crate::filters::{FilterCatalog, FilterKind};
use crate::gesture::{GestureRegionDetector, HandLandmarks, Point};
use crate::selector::{Command, FilterSelector};

/// What the caller should do after handling a command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionControl {
    Continue,
    Exit,
}

/// Output of one tick
#[derive(Clone, Debug)]
pub struct TickOutput {
    /// Frame to display
    pub frame: RgbImage,
    /// Region the filter was applied to
    pub region: Option<[Point; 4]>,
    /// Filter active for this frame
    pub filter: FilterKind,
    /// Whether the timer advanced the filter during this tick
    pub auto_advanced: bool,
}

/// Core gesture-filter pipeline
pub struct Session {
    catalog: FilterCatalog,
    detector: GestureRegionDetector,
    selector: FilterSelector,
    compositor: RegionCompositor,
    filter_params: FilterParams,
    /// Whether the previous tick had a region
    had_region: bool,
}

impl Session {
    /// Build a session from configuration; `start` is the current time in seconds
    pub fn new(config: &AppConfig, start: f64) -> Result<Self, ConfigError> {
        config.validate()?;
        let catalog = FilterCatalog::new(config.filter_kinds()?)?;
        let selector = FilterSelector::new(catalog.len(), config.auto_advance_interval, start);

        log::info!(
            "Available filters: {}",
            catalog.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            detector: GestureRegionDetector::new(config.gesture_distance_threshold),
            compositor: RegionCompositor::new(config.overlay_color, config.overlay_thickness),
            filter_params: config.filter_params.clone(),
            catalog,
            selector,
            had_region: false,
        })
    }

    pub fn catalog(&self) -> &FilterCatalog {
        &self.catalog
    }

    /// Filter currently selected
    pub fn current_filter(&self) -> FilterKind {
        self.catalog.get(self.selector.current())
    }

    /// Seconds until the next automatic change
    pub fn remaining(&self, now: f64) -> f64 {
        self.selector.remaining(now)
    }

    /// Apply one input command
    pub fn handle(&mut self, command: Command, now: f64) -> SessionControl {
        if !self.selector.apply(command, now) {
            log::info!("Exiting application...");
            return SessionControl::Exit;
        }
        log::info!("Manual change to: {}", self.current_filter());
        SessionControl::Continue
    }

    /// Run the auto-advance timer without a frame. Returns true when it advanced.
    pub fn advance_clock(&mut self, now: f64) -> bool {
        let advanced = self.selector.tick(now);
        if advanced {
            log::info!("Auto-changed to: {}", self.current_filter());
        }
        advanced
    }

    /// Process one frame
    pub fn tick(&mut self, frame: RgbImage, hands: &[HandLandmarks], now: f64) -> TickOutput {
        let region = self.detector.detect(hands);
        if region.is_some() != self.had_region {
            log::debug!("Gesture region {}", if region.is_some() { "formed" } else { "lost" });
            self.had_region = region.is_some();
        }

        let auto_advanced = self.advance_clock(now);
        let filter = self.current_filter();

        let composite = self.compositor.composite_region(
            frame,
            region.as_ref(),
            &filter.with_params(&self.filter_params),
        );

        TickOutput {
            frame: composite.frame,
            region: composite.region,
            filter,
            auto_advanced,
        }
    }
}
