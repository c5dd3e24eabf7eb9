//! CPU overlay drawing on RGB frames

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, BresenhamLineIter};

use crate::gesture::{HandLandmarks, Point, HAND_CONNECTIONS};

/// Joint colour used for the hand skeleton
const JOINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Joint dot radius in pixels
const JOINT_RADIUS: i32 = 3;

/// Stamp a square brush of `thickness` pixels centred on (x, y), clipped to the frame
fn stamp(frame: &mut RgbImage, x: i32, y: i32, thickness: u32, color: Rgb<u8>) {
    let lo = -((thickness as i32 - 1) / 2);
    let hi = thickness as i32 / 2;
    let (w, h) = (frame.width() as i32, frame.height() as i32);
    for dy in lo..=hi {
        for dx in lo..=hi {
            let (px, py) = (x + dx, y + dy);
            if px >= 0 && py >= 0 && px < w && py < h {
                frame.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

/// Draw a line segment with the given stroke thickness
pub fn draw_thick_line(frame: &mut RgbImage, from: Point, to: Point, thickness: u32, color: Rgb<u8>) {
    if thickness == 0 {
        return;
    }
    let line = BresenhamLineIter::new((from.x as f32, from.y as f32), (to.x as f32, to.y as f32));
    for (x, y) in line {
        stamp(frame, x, y, thickness, color);
    }
    // Bresenham iteration may stop one short of the end point
    stamp(frame, to.x, to.y, thickness, color);
}

/// Draw a closed polyline through `points`
pub fn draw_polygon_outline(frame: &mut RgbImage, points: &[Point], thickness: u32, color: Rgb<u8>) {
    if points.len() < 2 {
        return;
    }
    for (i, &from) in points.iter().enumerate() {
        let to = points[(i + 1) % points.len()];
        draw_thick_line(frame, from, to, thickness, color);
    }
}

/// Draw the hand connection graph and joint dots
pub fn draw_hand_skeleton(frame: &mut RgbImage, hand: &HandLandmarks, color: Rgb<u8>) {
    for &(a, b) in HAND_CONNECTIONS.iter() {
        draw_thick_line(frame, hand.points[a], hand.points[b], 2, color);
    }
    for p in &hand.points {
        draw_filled_circle_mut(frame, (p.x, p.y), JOINT_RADIUS, JOINT_COLOR);
    }
}
