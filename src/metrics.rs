//! Disease-area metrics derived from a [`BinaryMask`].
//!
//! Defected area is estimated from the convex hulls of the outer contours of
//! every connected foreground region. Hulls are taken over the corners of the
//! boundary pixels, so each pixel contributes a unit square: a solid `k x k`
//! block measures exactly `k²` and a fully set mask measures the whole frame.
//! Holes inside a region are not subtracted.

use image::{imageops, GrayImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;
use tracing::debug;

use crate::config::AreaMethod;
use crate::errors::{CropSegError, Result};
use crate::postprocess::BinaryMask;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub defected_area: f64,
    pub total_area: f64,
    /// `defected / total * 100`, in `[0, 100]`.
    ///
    /// Hulls of separate regions may overlap, so their sum is clamped to the
    /// frame. A sparse mask whose hulls cover the frame therefore reports 100
    /// and an infinite ratio even though some cells are undefected.
    pub disease_percentage: f64,
    /// `defected / undefected`. `0` for an empty frame and `+inf` when the
    /// mask covers the whole frame.
    pub defection_ratio: f64,
}

impl Metrics {
    fn from_areas(defected_area: f64, total_area: f64) -> Self {
        if total_area <= 0.0 {
            return Self {
                defected_area: 0.0,
                total_area: 0.0,
                disease_percentage: 0.0,
                defection_ratio: 0.0,
            };
        }

        // also folds -0.0 and NaN into +0.0
        let defected_area = if defected_area > 0.0 {
            defected_area.min(total_area)
        } else {
            0.0
        };
        let undefected_area = total_area - defected_area;
        let defection_ratio = if undefected_area > 0.0 {
            defected_area / undefected_area
        } else {
            f64::INFINITY
        };

        Self {
            defected_area,
            total_area,
            disease_percentage: defected_area / total_area * 100.0,
            defection_ratio,
        }
    }

    pub fn undefected_area(&self) -> f64 {
        self.total_area - self.defected_area
    }

    /// The whole frame is defected, so the defection ratio has no finite value.
    pub fn is_degenerate(&self) -> bool {
        self.total_area > 0.0 && self.undefected_area() <= 0.0
    }

    /// The defection ratio, or [`CropSegError::DegenerateMask`] when it is unbounded.
    pub fn finite_defection_ratio(&self) -> Result<f64> {
        if self.is_degenerate() {
            Err(CropSegError::DegenerateMask {
                defected_area: self.defected_area,
                total_area: self.total_area,
            })
        } else {
            Ok(self.defection_ratio)
        }
    }
}

/// Metrics using the convex-hull area convention.
pub fn compute_metrics(mask: &BinaryMask) -> Metrics {
    compute_metrics_with(mask, AreaMethod::Hull)
}

pub fn compute_metrics_with(mask: &BinaryMask, method: AreaMethod) -> Metrics {
    let (width, height) = mask.dimensions();
    let total_area = f64::from(width) * f64::from(height);

    let defected_area = match method {
        AreaMethod::Hull => hull_area(mask),
        AreaMethod::PixelCount => mask.foreground_count() as f64,
    };

    let metrics = Metrics::from_areas(defected_area, total_area);
    debug!(
        ?method,
        defected_area = metrics.defected_area,
        disease_percentage = metrics.disease_percentage,
        defection_ratio = metrics.defection_ratio,
        "computed disease metrics"
    );
    metrics
}

/// Sum of the hull areas of all top-level outer contours.
pub fn hull_area(mask: &BinaryMask) -> f64 {
    external_contours(mask)
        .iter()
        .map(|contour| polygon_area(&pixel_hull(&contour.points)))
        .fold(0.0, |acc, area| acc + area)
}

/// Outer borders that are not nested inside a hole of another region.
///
/// The mask is traced inside a one-pixel background frame so that regions
/// touching the image border are still seen as outer borders. Points are in
/// mask coordinates.
pub fn external_contours(mask: &BinaryMask) -> Vec<Contour<i32>> {
    let (width, height) = mask.dimensions();
    let mut framed = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut framed, mask.as_image(), 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|mut contour| {
            for point in &mut contour.points {
                point.x -= 1;
                point.y -= 1;
            }
            contour
        })
        .collect()
}

/// Convex hull of the unit squares of the given boundary pixels.
pub fn pixel_hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let corners: Vec<Point<i32>> = points
        .iter()
        .flat_map(|p| {
            [
                Point::new(p.x, p.y),
                Point::new(p.x + 1, p.y),
                Point::new(p.x, p.y + 1),
                Point::new(p.x + 1, p.y + 1),
            ]
        })
        .collect();

    convex_hull(corners)
}

/// Andrew's monotone chain. Collinear and duplicate points are dropped.
pub fn convex_hull(mut points: Vec<Point<i32>>) -> Vec<Point<i32>> {
    points.sort_unstable_by_key(|p| (p.x, p.y));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let mut lower: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0 {
            upper.pop();
        }
        upper.push(p);
    }

    // endpoints are shared between the two chains
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn cross(o: Point<i32>, a: Point<i32>, b: Point<i32>) -> i64 {
    let (ox, oy) = (i64::from(o.x), i64::from(o.y));
    (i64::from(a.x) - ox) * (i64::from(b.y) - oy) - (i64::from(a.y) - oy) * (i64::from(b.x) - ox)
}

/// Shoelace area of a simple polygon. Fewer than three vertices have no area.
pub fn polygon_area(polygon: &[Point<i32>]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }

    let twice_area: i64 = polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();

    twice_area.abs() as f64 / 2.0
}
