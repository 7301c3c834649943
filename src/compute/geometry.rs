//! Point and segment primitives used by the track, vehicle and sensors.
//!
//! All functions are pure. Coordinates are screen-style: x grows to the
//! right, y grows downwards, so a heading of `π/2` points "down" the maze.

use std::f64::consts::TAU;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Relative tolerance for treating two segments as parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

/// A 2D point in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    #[inline]
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Euclidean length of the segment.
    pub fn length(&self) -> f64 {
        distance(self.start, self.end)
    }

    /// Point halfway between the endpoints.
    pub fn midpoint(&self) -> Point {
        Point::new(
            (self.start.x + self.end.x) * 0.5,
            (self.start.y + self.end.y) * 0.5,
        )
    }
}

/// Intersect two segments.
///
/// Returns `None` when the segments are parallel (or degenerate) and when
/// either parameter falls outside the open interval `(0, 1)`. Touching at
/// an endpoint is therefore not an intersection.
pub fn intersect(a: &Segment, b: &Segment) -> Option<Point> {
    let r = a.end - a.start;
    let s = b.end - b.start;

    let denom = r.x * s.y - r.y * s.x;
    let scale = (r.x.abs() + r.y.abs()) * (s.x.abs() + s.y.abs());
    if scale == 0.0 || denom.abs() <= PARALLEL_EPSILON * scale {
        return None;
    }

    let qp = b.start - a.start;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    let u = (qp.x * r.y - qp.y * r.x) / denom;

    if t > 0.0 && t < 1.0 && u > 0.0 && u < 1.0 {
        Some(Point::new(a.start.x + t * r.x, a.start.y + t * r.y))
    } else {
        None
    }
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(p1: Point, p2: Point) -> f64 {
    (p2.x - p1.x).hypot(p2.y - p1.y)
}

/// Point on the circumference of a circle: `origin + radius * (cos θ, sin θ)`.
#[inline]
pub fn point_on_circle(origin: Point, radius: f64, theta: f64) -> Point {
    let (sin, cos) = theta.sin_cos();
    Point::new(origin.x + radius * cos, origin.y + radius * sin)
}

/// Borders of an axis-aligned rectangle, ordered Top, Right, Bottom, Left.
pub fn rect_borders(top_left: Point, width: f64, height: f64) -> [Segment; 4] {
    let tl = top_left;
    let tr = Point::new(tl.x + width, tl.y);
    let br = Point::new(tl.x + width, tl.y + height);
    let bl = Point::new(tl.x, tl.y + height);
    [
        Segment::new(tl, tr),
        Segment::new(tr, br),
        Segment::new(bl, br),
        Segment::new(tl, bl),
    ]
}

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_angle(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    #[test]
    fn test_crossing_segments() {
        let a = seg(0.0, 0.0, 10.0, 10.0);
        let b = seg(0.0, 10.0, 10.0, 0.0);
        let p = intersect(&a, &b).unwrap();
        assert!((p.x - 5.0).abs() < 1e-12);
        assert!((p.y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_off_center_crossing() {
        let a = seg(0.0, 2.0, 8.0, 2.0);
        let b = seg(3.0, -1.0, 3.0, 5.0);
        let p = intersect(&a, &b).unwrap();
        assert_eq!(p, Point::new(3.0, 2.0));
    }

    #[test]
    fn test_parallel_segments() {
        let a = seg(0.0, 0.0, 10.0, 0.0);
        let b = seg(0.0, 1.0, 10.0, 1.0);
        assert!(intersect(&a, &b).is_none());

        // Collinear overlap is also reported as parallel
        let c = seg(5.0, 0.0, 15.0, 0.0);
        assert!(intersect(&a, &c).is_none());
    }

    #[test]
    fn test_shared_endpoint_is_not_intersection() {
        let a = seg(0.0, 0.0, 10.0, 0.0);
        let b = seg(10.0, 0.0, 10.0, 10.0);
        assert!(intersect(&a, &b).is_none());

        // T-junction: b starts on a's interior
        let c = seg(5.0, 0.0, 5.0, 10.0);
        assert!(intersect(&a, &c).is_none());
    }

    #[test]
    fn test_disjoint_segments() {
        let a = seg(0.0, 0.0, 1.0, 1.0);
        let b = seg(5.0, 0.0, 6.0, -3.0);
        assert!(intersect(&a, &b).is_none());
    }

    #[test]
    fn test_degenerate_segment() {
        let a = seg(1.0, 1.0, 1.0, 1.0);
        let b = seg(0.0, 0.0, 2.0, 2.0);
        assert!(intersect(&a, &b).is_none());
    }

    #[test]
    fn test_point_on_circle() {
        let p = point_on_circle(Point::new(1.0, 1.0), 2.0, FRAC_PI_2);
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!((p.y - 3.0).abs() < 1e-12);

        let q = point_on_circle(Point::new(0.0, 0.0), 1.0, PI);
        assert!((q.x + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rect_borders_order() {
        let [top, right, bottom, left] = rect_borders(Point::new(0.0, 0.0), 4.0, 2.0);
        assert_eq!(top, seg(0.0, 0.0, 4.0, 0.0));
        assert_eq!(right, seg(4.0, 0.0, 4.0, 2.0));
        assert_eq!(bottom, seg(0.0, 2.0, 4.0, 2.0));
        assert_eq!(left, seg(0.0, 0.0, 0.0, 2.0));
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert!((normalize_angle(-FRAC_PI_2) - 3.0 * FRAC_PI_2).abs() < 1e-12);
        assert!((normalize_angle(5.0 * PI) - PI).abs() < 1e-9);
        assert_eq!(normalize_angle(TAU), 0.0);
        assert!(normalize_angle(-1e-18) < TAU);
    }

    proptest! {
        #[test]
        fn prop_intersection_lies_on_both_segments(
            x1 in -100.0f64..100.0, y1 in -100.0f64..100.0,
            x2 in -100.0f64..100.0, y2 in -100.0f64..100.0,
            x3 in -100.0f64..100.0, y3 in -100.0f64..100.0,
            x4 in -100.0f64..100.0, y4 in -100.0f64..100.0,
        ) {
            let a = seg(x1, y1, x2, y2);
            let b = seg(x3, y3, x4, y4);
            if let Some(p) = intersect(&a, &b) {
                let on_a = (distance(a.start, p) + distance(p, a.end) - a.length()).abs();
                let on_b = (distance(b.start, p) + distance(p, b.end) - b.length()).abs();
                prop_assert!(on_a < 1e-6);
                prop_assert!(on_b < 1e-4);
            }
        }

        #[test]
        fn prop_intersection_is_symmetric(
            x1 in -50.0f64..50.0, y1 in -50.0f64..50.0,
            x2 in -50.0f64..50.0, y2 in -50.0f64..50.0,
            x3 in -50.0f64..50.0, y3 in -50.0f64..50.0,
            x4 in -50.0f64..50.0, y4 in -50.0f64..50.0,
        ) {
            let a = seg(x1, y1, x2, y2);
            let b = seg(x3, y3, x4, y4);
            if let (Some(p), Some(q)) = (intersect(&a, &b), intersect(&b, &a)) {
                prop_assert!(distance(p, q) < 1e-6);
            }
        }

        #[test]
        fn prop_normalized_angle_in_range(theta in -1.0e6f64..1.0e6) {
            let n = normalize_angle(theta);
            prop_assert!((0.0..TAU).contains(&n));
        }
    }
}
