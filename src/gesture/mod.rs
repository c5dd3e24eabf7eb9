//! Two-hand frame gesture
//!
//! Hand landmarks arrive in pixel coordinates, one set of 21 points per hand.
//! A gesture region is formed when two hands are present and their thumb tips
//! are far enough apart: the quadrilateral through both index tips and both
//! thumb tips is the area the active filter is applied to.

use serde::{Deserialize, Serialize};

// ============================================================================
// HAND LANDMARK INDICES
// ============================================================================

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Number of landmarks per hand
pub const LANDMARK_COUNT: usize = 21;

/// Hand skeleton connections for drawing
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (WRIST, THUMB_CMC), (THUMB_CMC, THUMB_MCP), (THUMB_MCP, THUMB_IP), (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP), (INDEX_MCP, INDEX_PIP), (INDEX_PIP, INDEX_DIP), (INDEX_DIP, INDEX_TIP),
    (INDEX_MCP, MIDDLE_MCP), (MIDDLE_MCP, MIDDLE_PIP), (MIDDLE_PIP, MIDDLE_DIP), (MIDDLE_DIP, MIDDLE_TIP),
    (MIDDLE_MCP, RING_MCP), (RING_MCP, RING_PIP), (RING_PIP, RING_DIP), (RING_DIP, RING_TIP),
    (RING_MCP, PINKY_MCP), (PINKY_MCP, PINKY_PIP), (PINKY_PIP, PINKY_DIP), (PINKY_DIP, PINKY_TIP),
    (WRIST, PINKY_MCP),
];

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Integer pixel coordinate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x as f32 - other.x as f32;
        let dy = self.y as f32 - other.y as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// The 21 landmarks of one detected hand, in frame pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandLandmarks {
    pub points: [Point; LANDMARK_COUNT],
}

impl Default for HandLandmarks {
    fn default() -> Self {
        Self {
            points: [Point::default(); LANDMARK_COUNT],
        }
    }
}

impl HandLandmarks {
    pub fn thumb_tip(&self) -> Point {
        self.points[THUMB_TIP]
    }

    pub fn index_tip(&self) -> Point {
        self.points[INDEX_TIP]
    }

    /// Axis-aligned bounds as (min, max)
    pub fn bounds(&self) -> (Point, Point) {
        let mut min = self.points[0];
        let mut max = self.points[0];
        for p in &self.points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }
}

/// Quadrilateral framed by two hands.
///
/// Vertex order is `[index tip (hand 1), index tip (hand 2), thumb tip (hand 2),
/// thumb tip (hand 1)]`; the mask fill walks the boundary in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GestureRegion {
    vertices: [Point; 4],
}

impl GestureRegion {
    pub fn from_hands(first: &HandLandmarks, second: &HandLandmarks) -> Self {
        Self {
            vertices: [
                first.index_tip(),
                second.index_tip(),
                second.thumb_tip(),
                first.thumb_tip(),
            ],
        }
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }
}

/// Decides per frame whether a two-hand frame gesture is present.
///
/// Stateless: every call looks only at the hands it is given, so a noisy
/// tracker can make the region flicker between frames.
#[derive(Clone, Debug)]
pub struct GestureRegionDetector {
    distance_threshold: f32,
}

impl GestureRegionDetector {
    pub fn new(distance_threshold: f32) -> Self {
        Self { distance_threshold }
    }

    /// Region framed by the first two hands, if any.
    ///
    /// Hands are taken positionally; the tracker gives no guarantee that the
    /// same physical hand stays at index 0.
    pub fn detect(&self, hands: &[HandLandmarks]) -> Option<GestureRegion> {
        let [first, second, ..] = hands else {
            return None;
        };

        let distance = first.thumb_tip().distance(&second.thumb_tip());
        if distance > self.distance_threshold {
            Some(GestureRegion::from_hands(first, second))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(thumb: Point, index: Point) -> HandLandmarks {
        let mut hand = HandLandmarks::default();
        hand.points[THUMB_TIP] = thumb;
        hand.points[INDEX_TIP] = index;
        hand
    }

    #[test]
    fn test_no_region_with_fewer_than_two_hands() {
        let detector = GestureRegionDetector::new(50.0);
        assert_eq!(detector.detect(&[]), None);
        assert_eq!(
            detector.detect(&[hand(Point::new(0, 0), Point::new(500, 500))]),
            None
        );
    }

    #[test]
    fn test_threshold_boundary() {
        let detector = GestureRegionDetector::new(50.0);

        let at_threshold = [
            hand(Point::new(100, 200), Point::new(100, 100)),
            hand(Point::new(150, 200), Point::new(150, 100)),
        ];
        assert_eq!(detector.detect(&at_threshold), None);

        let index1 = Point::new(100, 100);
        let index2 = Point::new(151, 100);
        let thumb1 = Point::new(100, 200);
        let thumb2 = Point::new(151, 200);
        let past_threshold = [hand(thumb1, index1), hand(thumb2, index2)];

        let region = detector.detect(&past_threshold).unwrap();
        assert_eq!(region.vertices(), &[index1, index2, thumb2, thumb1]);
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let detector = GestureRegionDetector::new(50.0);
        let hands = [
            hand(Point::new(i32::MAX, 0), Point::new(i32::MAX, -10)),
            hand(Point::new(-1, 0), Point::new(-1, -10)),
        ];
        assert!(detector.detect(&hands).is_some());

        let far = Point::new(i32::MIN, i32::MIN).distance(&Point::new(i32::MAX, i32::MAX));
        assert!(far.is_finite() && far > 6.0e9);
    }

    #[test]
    fn test_only_first_two_hands_used() {
        let detector = GestureRegionDetector::new(50.0);
        let a = hand(Point::new(0, 300), Point::new(0, 0));
        let b = hand(Point::new(400, 300), Point::new(400, 0));
        let c = hand(Point::new(900, 900), Point::new(800, 800));

        let region = detector.detect(&[a, b, c]).unwrap();
        assert_eq!(region, GestureRegion::from_hands(&a, &b));
    }

    #[test]
    fn test_order_follows_hand_position() {
        let detector = GestureRegionDetector::new(50.0);
        let a = hand(Point::new(0, 300), Point::new(0, 0));
        let b = hand(Point::new(400, 300), Point::new(400, 0));

        let forward = detector.detect(&[a, b]).unwrap();
        let swapped = detector.detect(&[b, a]).unwrap();
        assert_ne!(forward, swapped);
        assert_eq!(swapped.vertices()[0], b.index_tip());
    }

    #[test]
    fn test_custom_threshold() {
        let detector = GestureRegionDetector::new(200.0);
        let hands = [
            hand(Point::new(0, 0), Point::new(0, -50)),
            hand(Point::new(150, 0), Point::new(150, -50)),
        ];
        assert_eq!(detector.detect(&hands), None);
        assert!(GestureRegionDetector::new(100.0).detect(&hands).is_some());
    }

    #[test]
    fn test_hand_bounds() {
        let mut h = HandLandmarks::default();
        h.points[WRIST] = Point::new(10, 40);
        h.points[THUMB_TIP] = Point::new(-5, 20);
        h.points[PINKY_TIP] = Point::new(30, 90);
        // remaining landmarks sit at the origin
        let (min, max) = h.bounds();
        assert_eq!(min, Point::new(-5, 0));
        assert_eq!(max, Point::new(30, 90));
    }
}
