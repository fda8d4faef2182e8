//! Loop quality utilities.
//!
//! The agglomerator uses these to rank candidate merges and to find slivers
//! and fans. Polygons are given as ordered vertex lists; corners are measured
//! between the two incident sides.

use crate::geometry::metrics::{angle_between_deg, distance, sub};

/// Basic quality metrics for a single polygon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopQuality {
    /// Ratio of the longest side to the shortest side.
    pub aspect_ratio: f64,
    /// Minimum corner angle (degrees).
    pub min_angle_deg: f64,
    /// Maximum corner angle (degrees).
    pub max_angle_deg: f64,
}

/// Compute quality metrics for a polygon.
///
/// Degenerate sides yield an infinite aspect ratio and a zero minimum angle,
/// so degenerate loops always rank as the worst candidates.
pub fn loop_quality(vertices: &[[f64; 3]]) -> LoopQuality {
    let n = vertices.len();
    let mut min_len = f64::INFINITY;
    let mut max_len = 0.0f64;
    for i in 0..n {
        let len = distance(vertices[i], vertices[(i + 1) % n]);
        min_len = min_len.min(len);
        max_len = max_len.max(len);
    }
    let aspect_ratio = if min_len > 0.0 {
        max_len / min_len
    } else {
        f64::INFINITY
    };

    let mut min_angle_deg = f64::INFINITY;
    let mut max_angle_deg = 0.0f64;
    for i in 0..n {
        let a = corner_angle_deg(vertices, i).unwrap_or(0.0);
        min_angle_deg = min_angle_deg.min(a);
        max_angle_deg = max_angle_deg.max(a);
    }
    if n == 0 {
        min_angle_deg = 0.0;
    }

    LoopQuality {
        aspect_ratio,
        min_angle_deg,
        max_angle_deg,
    }
}

/// Interior corner angle at vertex `i` of a polygon (degrees).
pub fn corner_angle_deg(vertices: &[[f64; 3]], i: usize) -> Option<f64> {
    let n = vertices.len();
    if n < 3 {
        return None;
    }
    let prev = vertices[(i + n - 1) % n];
    let curr = vertices[i];
    let next = vertices[(i + 1) % n];
    angle_between_deg(sub(prev, curr), sub(next, curr))
}

/// `true` if every turning angle of the quad `[a, b, c, d]` is at most
/// `max_turn_deg`, i.e. the quad is convex enough to replace two triangles.
pub fn quad_is_acceptable(quad: [[f64; 3]; 4], max_turn_deg: f64) -> bool {
    for i in 0..4 {
        let side = sub(quad[(i + 1) % 4], quad[i]);
        let next = sub(quad[(i + 2) % 4], quad[(i + 1) % 4]);
        match angle_between_deg(side, next) {
            Some(turn) if turn <= max_turn_deg => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_quality() {
        let q = loop_quality(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]);
        assert!((q.aspect_ratio - 1.0).abs() < 1e-12);
        assert!((q.min_angle_deg - 90.0).abs() < 1e-9);
        assert!((q.max_angle_deg - 90.0).abs() < 1e-9);
    }

    #[test]
    fn sliver_triangle_has_high_aspect() {
        let q = loop_quality(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [10.0, 0.1, 0.0]]);
        assert!(q.aspect_ratio > 50.0);
        assert!(q.min_angle_deg < 1.0);
    }

    #[test]
    fn quad_acceptance() {
        let square = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        assert!(quad_is_acceptable(square, 130.0));
        // A dart-shaped quad turns sharply at its reflex corner.
        let dart = [
            [0.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.5, 1.0, 0.0],
        ];
        assert!(!quad_is_acceptable(dart, 130.0));
    }
}
