use std::cell::Cell;
use std::rc::Rc;

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::geometry::convex_hull;
use imageproc::morphology::{close, open};
use imageproc::point::Point;
use log::trace;

use crate::frame::VideoFrame;
use crate::traits::GestureDetector;

/// Skin tone band in HSV: hue in degrees, saturation and value on 0..=255
const SKIN_HUE_MAX_DEG: f32 = 40.0;
const SKIN_SATURATION_MIN: u8 = 48;
const SKIN_VALUE_MIN: u8 = 80;

/// Every n-th pixel in each direction is classified
const SAMPLE_STRIDE: u32 = 2;

/// Half-width of the square opening/closing kernel (7x7)
const MORPH_RADIUS: u8 = 3;

/// Cloneable "the key was pressed" flag, written by the window event handler
#[derive(Debug, Clone, Default)]
pub struct KeyTriggerHandle(Rc<Cell<bool>>);

impl KeyTriggerHandle {
    pub fn press(&self) {
        self.0.set(true);
    }
}

/// Fires once per key press. The press is latched until the next
/// `detect` call reads it.
#[derive(Debug, Default)]
pub struct KeyTrigger {
    pressed: KeyTriggerHandle,
}

impl KeyTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> KeyTriggerHandle {
        self.pressed.clone()
    }
}

impl GestureDetector for KeyTrigger {
    fn detect(&mut self, _frame: &VideoFrame) -> bool {
        self.pressed.0.replace(false)
    }
}

/// Fires while the share of skin-coloured pixels lies within
/// `[min_fraction, max_fraction]`. Cheaper than [`FistGestureDetector`] but
/// blind to hand shape.
#[derive(Debug, Clone)]
pub struct SkinAreaGestureDetector {
    min_fraction: f32,
    max_fraction: f32,
}

impl SkinAreaGestureDetector {
    pub fn new(min_fraction: f32, max_fraction: f32) -> Self {
        Self {
            min_fraction,
            max_fraction,
        }
    }

    /// Fraction of sampled pixels in the skin band
    pub fn skin_fraction(&self, frame: &VideoFrame) -> f32 {
        let mut total = 0u32;
        let mut skin = 0u32;
        for y in (0..frame.height()).step_by(SAMPLE_STRIDE as usize) {
            for x in (0..frame.width()).step_by(SAMPLE_STRIDE as usize) {
                if let Some([r, g, b, _]) = frame.pixel(x, y) {
                    total += 1;
                    if is_skin(r, g, b) {
                        skin += 1;
                    }
                }
            }
        }
        if total == 0 {
            0.0
        } else {
            skin as f32 / total as f32
        }
    }
}

impl GestureDetector for SkinAreaGestureDetector {
    fn detect(&mut self, frame: &VideoFrame) -> bool {
        let fraction = self.skin_fraction(frame);
        trace!("skin fraction {:.3}", fraction);
        fraction >= self.min_fraction && fraction <= self.max_fraction
    }
}

/// Shape of the largest skin region in a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandShape {
    /// Area enclosed by the outer contour, in pixels
    pub area: f64,
    pub hull_points: usize,
    /// Concavities between hull vertices deeper than the detector's threshold
    pub deep_defects: usize,
}

/// Closed-fist detector.
///
/// The skin mask is cleaned with a morphological open then close. The largest
/// outer contour must enclose more than `min_area` pixels to count as a hand.
/// An open hand leaves a deep concavity between each pair of fingers; a fist
/// has at most `max_deep_defects` of them.
#[derive(Debug, Clone)]
pub struct FistGestureDetector {
    min_area: f64,
    defect_depth: f64,
    max_deep_defects: usize,
}

impl FistGestureDetector {
    pub fn new(min_area: f64, defect_depth: f64, max_deep_defects: usize) -> Self {
        Self {
            min_area,
            defect_depth,
            max_deep_defects,
        }
    }

    /// Largest skin region, or `None` when there is no skin at all
    pub fn analyse(&self, frame: &VideoFrame) -> Option<HandShape> {
        let mask = close(&open(&skin_mask(frame), Norm::LInf, MORPH_RADIUS), Norm::LInf, MORPH_RADIUS);

        let (area, points) = find_contours::<i32>(&mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .map(|c| (contour_area(&c.points), c.points))
            .max_by(|a, b| a.0.total_cmp(&b.0))?;

        let hull = hull_indices(&points);
        let deep_defects = defect_depths(&points, &hull)
            .into_iter()
            .filter(|depth| *depth > self.defect_depth)
            .count();

        Some(HandShape {
            area,
            hull_points: hull.len(),
            deep_defects,
        })
    }
}

impl Default for FistGestureDetector {
    fn default() -> Self {
        Self::new(8000.0, 20.0, 1)
    }
}

impl GestureDetector for FistGestureDetector {
    fn detect(&mut self, frame: &VideoFrame) -> bool {
        let Some(shape) = self.analyse(frame) else {
            return false;
        };
        trace!(
            "hand area {:.0}, {} hull points, {} deep defects",
            shape.area,
            shape.hull_points,
            shape.deep_defects
        );
        shape.area > self.min_area
            && shape.hull_points > 3
            && shape.deep_defects <= self.max_deep_defects
    }
}

/// 255 where the pixel is skin-coloured
fn skin_mask(frame: &VideoFrame) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| match frame.pixel(x, y) {
        Some([r, g, b, _]) if is_skin(r, g, b) => Luma([255]),
        _ => Luma([0]),
    })
}

/// Shoelace area of a closed polygon
fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

/// Positions of the convex hull vertices along the contour, ascending
fn hull_indices(points: &[Point<i32>]) -> Vec<usize> {
    let mut indices: Vec<usize> = convex_hull(points)
        .iter()
        .filter_map(|h| points.iter().position(|p| p == h))
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Deepest distance from each hull edge to the contour stretch it spans
fn defect_depths(points: &[Point<i32>], hull: &[usize]) -> Vec<f64> {
    if hull.len() < 2 {
        return Vec::new();
    }
    let n = points.len();
    hull.iter()
        .zip(hull.iter().cycle().skip(1))
        .map(|(&start, &end)| {
            let span = (end + n - start) % n;
            (1..span)
                .map(|offset| distance_to_line(points[(start + offset) % n], points[start], points[end]))
                .fold(0.0, f64::max)
        })
        .collect()
}

fn distance_to_line(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let length = dx.hypot(dy);
    let (px, py) = ((p.x - a.x) as f64, (p.y - a.y) as f64);
    if length == 0.0 {
        return px.hypot(py);
    }
    (dx * py - dy * px).abs() / length
}

/// HSV with hue in degrees `[0, 360)`, saturation and value on `0..=255`
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let value = max;
    let saturation = if max == 0 {
        0
    } else {
        (255.0 * delta / max as f32).round() as u8
    };

    if delta == 0.0 {
        return (0.0, saturation, value);
    }

    let (r, g, b) = (r as f32, g as f32, b as f32);
    let hue = if max as f32 == r {
        60.0 * ((g - b) / delta)
    } else if max as f32 == g {
        60.0 * ((b - r) / delta) + 120.0
    } else {
        60.0 * ((r - g) / delta) + 240.0
    };

    (hue.rem_euclid(360.0), saturation, value)
}

fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let (hue, saturation, value) = rgb_to_hsv(r, g, b);
    hue <= SKIN_HUE_MAX_DEG && saturation >= SKIN_SATURATION_MIN && value >= SKIN_VALUE_MIN
}
