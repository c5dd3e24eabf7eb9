//! Frame filters
//!
//! Every filter maps a full RGB frame to a full RGB frame of the same size.
//! Filters that work on a single-channel intermediate expand the result back
//! to three channels before returning.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::config::{ConfigError, FilterParams};

/// Anything that can filter a whole frame
pub trait FrameFilter {
    fn apply(&self, frame: &RgbImage) -> RgbImage;
}

impl<F> FrameFilter for F
where
    F: Fn(&RgbImage) -> RgbImage,
{
    fn apply(&self, frame: &RgbImage) -> RgbImage {
        self(frame)
    }
}

/// Built-in filter types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Grayscale,
    Inverted,
    Blur,
    EdgeDetection,
}

impl FilterKind {
    /// Every built-in filter, in default catalog order
    pub const ALL: [FilterKind; 4] = [
        FilterKind::Grayscale,
        FilterKind::Inverted,
        FilterKind::Blur,
        FilterKind::EdgeDetection,
    ];

    /// Display name, also used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Grayscale => "Grayscale",
            FilterKind::Inverted => "Inverted",
            FilterKind::Blur => "Blur",
            FilterKind::EdgeDetection => "Edge Detection",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Run this filter over `frame`
    pub fn apply(&self, frame: &RgbImage, params: &FilterParams) -> RgbImage {
        match self {
            FilterKind::Grayscale => grayscale(frame),
            FilterKind::Inverted => inverted(frame),
            FilterKind::Blur => blur(frame, params.blur_sigma()),
            FilterKind::EdgeDetection => edge_detection(frame, params.canny_low, params.canny_high),
        }
    }

    /// Bind parameters so the filter can be passed around as a [`FrameFilter`]
    pub fn with_params(self, params: &FilterParams) -> BoundFilter<'_> {
        BoundFilter { kind: self, params }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A filter kind together with its parameters
#[derive(Clone, Copy, Debug)]
pub struct BoundFilter<'a> {
    pub kind: FilterKind,
    pub params: &'a FilterParams,
}

impl FrameFilter for BoundFilter<'_> {
    fn apply(&self, frame: &RgbImage) -> RgbImage {
        self.kind.apply(frame, self.params)
    }
}

/// Ordered, fixed set of filters available for cycling
#[derive(Clone, Debug)]
pub struct FilterCatalog {
    entries: Vec<FilterKind>,
}

impl FilterCatalog {
    /// Build a catalog; it must hold at least one filter
    pub fn new(entries: Vec<FilterKind>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true for a catalog built through `new`
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filter at `index`, wrapped into range
    pub fn get(&self, index: usize) -> FilterKind {
        self.entries[index % self.entries.len()]
    }

    /// Filter with the given name, or the first entry when it is not listed
    pub fn lookup(&self, name: &str) -> FilterKind {
        self.entries
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .unwrap_or(self.entries[0])
    }

    pub fn iter(&self) -> impl Iterator<Item = FilterKind> + '_ {
        self.entries.iter().copied()
    }
}

impl Default for FilterCatalog {
    fn default() -> Self {
        Self {
            entries: FilterKind::ALL.to_vec(),
        }
    }
}

// ============================================================================
// FILTER IMPLEMENTATIONS
// ============================================================================

fn gray_to_rgb(gray: GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(gray).into_rgb8()
}

fn grayscale(frame: &RgbImage) -> RgbImage {
    gray_to_rgb(image::imageops::grayscale(frame))
}

fn inverted(frame: &RgbImage) -> RgbImage {
    let mut out = frame.clone();
    image::imageops::invert(&mut out);
    out
}

fn blur(frame: &RgbImage, sigma: f32) -> RgbImage {
    image::imageops::blur(frame, sigma)
}

fn edge_detection(frame: &RgbImage, low: f32, high: f32) -> RgbImage {
    let gray = image::imageops::grayscale(frame);
    let edges = imageproc::edges::canny(&gray, low, high);
    gray_to_rgb(edges)
}
