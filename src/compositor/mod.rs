//! Region compositing
//!
//! Applies a filter to the whole frame and keeps the filtered pixels only
//! inside the gesture quadrilateral. Pixels outside are the untouched input;
//! there is no blending between the two.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::filters::FrameFilter;
use crate::gesture::{GestureRegion, Point};
use crate::overlay;

/// Mask value for pixels inside the region
pub const MASK_INSIDE: u8 = 255;
/// Mask value for pixels outside the region
pub const MASK_OUTSIDE: u8 = 0;

/// Result of compositing one frame
#[derive(Clone, Debug)]
pub struct Composite {
    /// Output frame
    pub frame: RgbImage,
    /// Vertices the filter was applied to, if any
    pub region: Option<[Point; 4]>,
}

/// Composites a filtered region into a frame and outlines it
#[derive(Clone, Debug)]
pub struct RegionCompositor {
    outline_color: Rgb<u8>,
    outline_thickness: u32,
}

impl RegionCompositor {
    pub fn new(outline_color: [u8; 3], outline_thickness: u32) -> Self {
        Self {
            outline_color: Rgb(outline_color),
            outline_thickness,
        }
    }

    /// Composite using a detected region
    pub fn composite_region<F: FrameFilter + ?Sized>(
        &self,
        frame: RgbImage,
        region: Option<&GestureRegion>,
        filter: &F,
    ) -> Composite {
        self.composite(frame, region.map(|r| r.vertices()), filter)
    }

    /// Composite `filter` into the quadrilateral given by `vertices`.
    ///
    /// Anything other than exactly four vertices counts as no region: the
    /// frame is returned as-is and the filter is not run.
    pub fn composite<F: FrameFilter + ?Sized>(
        &self,
        mut frame: RgbImage,
        vertices: Option<&[Point]>,
        filter: &F,
    ) -> Composite {
        let quad: [Point; 4] = match vertices.map(<[Point; 4]>::try_from) {
            Some(Ok(quad)) => quad,
            Some(Err(_)) => {
                log::debug!("Ignoring region with {} vertices", vertices.map_or(0, |v| v.len()));
                return Composite { frame, region: None };
            }
            None => return Composite { frame, region: None },
        };

        let (width, height) = frame.dimensions();
        let mask = polygon_mask(width, height, &quad);
        let filtered = filter.apply(&frame);

        if filtered.dimensions() != frame.dimensions() {
            log::warn!(
                "Filter returned {:?} for a {:?} frame, leaving region unfiltered",
                filtered.dimensions(),
                frame.dimensions()
            );
        } else {
            for (x, y, m) in mask.enumerate_pixels() {
                if m[0] == MASK_INSIDE {
                    frame.put_pixel(x, y, *filtered.get_pixel(x, y));
                }
            }
        }

        overlay::draw_polygon_outline(&mut frame, &quad, self.outline_thickness, self.outline_color);

        Composite {
            frame,
            region: Some(quad),
        }
    }
}

/// X coordinate where the edge `a`-`b` crosses the horizontal line at `y`, if it does
fn edge_crossing(a: Point, b: Point, y: f64) -> Option<f64> {
    let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
    if (ay > y) != (by > y) {
        Some((bx - ax) * (y - ay) / (by - ay) + ax)
    } else {
        None
    }
}

/// Rasterise a polygon into a binary mask.
///
/// Even-odd rule sampled at pixel centres: a pixel is inside when its centre
/// lies in a span `[x0, x1)` between consecutive edge crossings.
///
/// The boundary is half-open: pixels on the left and top edges are filled,
/// pixels on the right and bottom edges are not. The square (10,10)-(40,40)
/// covers columns and rows 10..40, and the outline drawn afterwards covers
/// the excluded edge.
pub fn polygon_mask(width: u32, height: u32, points: &[Point]) -> GrayImage {
    let mut mask = GrayImage::from_pixel(width, height, Luma([MASK_OUTSIDE]));
    if points.len() < 3 {
        return mask;
    }

    let mut crossings: Vec<f64> = Vec::with_capacity(points.len());
    for y in 0..height {
        let cy = y as f64 + 0.5;

        crossings.clear();
        let mut j = points.len() - 1;
        for i in 0..points.len() {
            if let Some(x) = edge_crossing(points[i], points[j], cy) {
                crossings.push(x);
            }
            j = i;
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for span in crossings.chunks_exact(2) {
            let (x0, x1) = (span[0], span[1]);
            let start = (x0.floor() as i64 - 1).max(0);
            let end = (x1.ceil() as i64 + 1).min(width as i64);
            for x in start..end {
                let cx = x as f64 + 0.5;
                if cx >= x0 && cx < x1 {
                    mask.put_pixel(x as u32, y, Luma([MASK_INSIDE]));
                }
            }
        }
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterParams;
    use crate::filters::FilterKind;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::cell::Cell;

    fn noise_frame(width: u32, height: u32, seed: u64) -> RgbImage {
        let mut rng = StdRng::seed_from_u64(seed);
        RgbImage::from_fn(width, height, |_, _| Rgb([rng.random(), rng.random(), rng.random()]))
    }

    /// Even-odd ray cast at the pixel centre
    fn centre_inside(points: &[Point], x: u32, y: u32) -> bool {
        let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
        let mut inside = false;
        let mut j = points.len() - 1;
        for i in 0..points.len() {
            let (pi, pj) = (points[i], points[j]);
            let (ix, iy, jx, jy) = (pi.x as f64, pi.y as f64, pj.x as f64, pj.y as f64);
            if ((iy > py) != (jy > py)) && (px < (jx - ix) * (py - iy) / (jy - iy) + ix) {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    fn square() -> [Point; 4] {
        [
            Point::new(10, 10),
            Point::new(40, 10),
            Point::new(40, 40),
            Point::new(10, 40),
        ]
    }

    #[test]
    fn test_absent_region_is_identity_and_skips_filter() {
        let compositor = RegionCompositor::new([0, 255, 0], 3);
        let frame = noise_frame(32, 24, 1);
        let calls = Cell::new(0);
        let filter = |f: &RgbImage| {
            calls.set(calls.get() + 1);
            f.clone()
        };

        let out = compositor.composite(frame.clone(), None, &filter);
        assert_eq!(out.frame, frame);
        assert_eq!(out.region, None);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_short_region_treated_as_absent() {
        let compositor = RegionCompositor::new([0, 255, 0], 3);
        let frame = noise_frame(32, 24, 2);
        let calls = Cell::new(0);
        let filter = |f: &RgbImage| {
            calls.set(calls.get() + 1);
            f.clone()
        };

        let three = [Point::new(1, 1), Point::new(20, 1), Point::new(20, 20)];
        let out = compositor.composite(frame.clone(), Some(&three[..]), &filter);
        assert_eq!(out.frame, frame);
        assert_eq!(out.region, None);

        let out = compositor.composite(frame.clone(), Some(&[][..]), &filter);
        assert_eq!(out.frame, frame);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_inside_filtered_outside_untouched() {
        let compositor = RegionCompositor::new([0, 255, 0], 0);
        let frame = noise_frame(50, 50, 3);
        let params = FilterParams::default();
        let filter = FilterKind::Inverted.with_params(&params);
        let filtered = FilterKind::Inverted.apply(&frame, &params);
        let quad = square();

        let out = compositor.composite(frame.clone(), Some(&quad[..]), &filter);
        assert_eq!(out.region, Some(quad));

        for (x, y, p) in out.frame.enumerate_pixels() {
            let strictly_inside = x > 10 && x < 39 && y > 10 && y < 39;
            let strictly_outside = x < 10 || x > 40 || y < 10 || y > 40;
            if strictly_inside {
                assert_eq!(p, filtered.get_pixel(x, y), "inside ({}, {})", x, y);
            } else if strictly_outside {
                assert_eq!(p, frame.get_pixel(x, y), "outside ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_selection_is_exact_not_blended() {
        let compositor = RegionCompositor::new([0, 255, 0], 0);
        let frame = noise_frame(60, 40, 4);
        let black = |f: &RgbImage| RgbImage::new(f.width(), f.height());
        let quad = [
            Point::new(5, 3),
            Point::new(50, 8),
            Point::new(44, 35),
            Point::new(9, 30),
        ];

        let out = compositor.composite(frame.clone(), Some(&quad[..]), &black);
        let mask = polygon_mask(60, 40, &quad);
        for (x, y, p) in out.frame.enumerate_pixels() {
            if mask.get_pixel(x, y)[0] == MASK_INSIDE {
                assert_eq!(*p, Rgb([0, 0, 0]));
            } else {
                assert_eq!(p, frame.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn test_outline_drawn_on_output() {
        let compositor = RegionCompositor::new([0, 255, 0], 3);
        let frame = RgbImage::from_pixel(50, 50, Rgb([10, 10, 10]));
        let identity = |f: &RgbImage| f.clone();
        let quad = square();

        let out = compositor.composite(frame, Some(&quad[..]), &identity);
        assert_eq!(*out.frame.get_pixel(25, 10), Rgb([0, 255, 0]));
        assert_eq!(*out.frame.get_pixel(40, 25), Rgb([0, 255, 0]));
        assert_eq!(*out.frame.get_pixel(25, 25), Rgb([10, 10, 10]));
        assert_eq!(*out.frame.get_pixel(2, 2), Rgb([10, 10, 10]));
    }

    #[test]
    fn test_composite_region_uses_detected_order() {
        let compositor = RegionCompositor::new([0, 255, 0], 1);
        let frame = noise_frame(20, 20, 5);
        let identity = |f: &RgbImage| f.clone();

        let out = compositor.composite_region(frame.clone(), None, &identity);
        assert_eq!(out.frame, frame);
        assert!(out.region.is_none());
    }

    #[test]
    fn test_mask_square_spans() {
        let mask = polygon_mask(50, 50, &square());
        assert_eq!(mask.get_pixel(10, 10)[0], MASK_INSIDE);
        assert_eq!(mask.get_pixel(39, 39)[0], MASK_INSIDE);
        // right and bottom edges are excluded
        assert_eq!(mask.get_pixel(40, 40)[0], MASK_OUTSIDE);
        assert_eq!(mask.get_pixel(40, 20)[0], MASK_OUTSIDE);
        assert_eq!(mask.get_pixel(20, 40)[0], MASK_OUTSIDE);
        assert_eq!(mask.get_pixel(9, 20)[0], MASK_OUTSIDE);
        let inside = mask.pixels().filter(|p| p[0] == MASK_INSIDE).count();
        assert_eq!(inside, 30 * 30);
    }

    #[test]
    fn test_mask_matches_point_in_polygon() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let quad: Vec<Point> = (0..4)
                .map(|_| Point::new(rng.random_range(-20..80), rng.random_range(-20..60)))
                .collect();
            let mask = polygon_mask(64, 48, &quad);
            for (x, y, m) in mask.enumerate_pixels() {
                assert_eq!(
                    m[0] == MASK_INSIDE,
                    centre_inside(&quad, x, y),
                    "quad {:?} pixel ({}, {})",
                    quad,
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_mask_clipped_to_frame() {
        let quad = [
            Point::new(-100, -100),
            Point::new(200, -100),
            Point::new(200, 200),
            Point::new(-100, 200),
        ];
        let mask = polygon_mask(16, 12, &quad);
        assert!(mask.pixels().all(|p| p[0] == MASK_INSIDE));
    }

    #[test]
    fn test_degenerate_quad_masks_nothing() {
        let line = [
            Point::new(5, 5),
            Point::new(20, 5),
            Point::new(20, 5),
            Point::new(5, 5),
        ];
        let mask = polygon_mask(30, 30, &line);
        assert!(mask.pixels().all(|p| p[0] == MASK_OUTSIDE));
    }
}
