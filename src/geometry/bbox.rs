//! Axis-aligned bounding boxes.

/// Axis-aligned bounding box in model space.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: [f64; 3],
    /// Maximum corner.
    pub max: [f64; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Create an empty (inverted) bounding box.
    pub fn empty() -> Self {
        Self {
            min: [f64::MAX; 3],
            max: [f64::MIN; 3],
        }
    }

    /// Bounding box of a set of points.
    pub fn from_points(points: &[[f64; 3]]) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.expand_point(*p);
        }
        b
    }

    /// Expand this bounding box to include a point.
    pub fn expand_point(&mut self, p: [f64; 3]) {
        for k in 0..3 {
            self.min[k] = self.min[k].min(p[k]);
            self.max[k] = self.max[k].max(p[k]);
        }
    }

    /// Expand this bounding box to include another.
    pub fn expand(&mut self, other: &Self) {
        for k in 0..3 {
            self.min[k] = self.min[k].min(other.min[k]);
            self.max[k] = self.max[k].max(other.max[k]);
        }
    }

    /// Union of two boxes.
    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        out.expand(other);
        out
    }

    /// `true` if min ≤ max on every axis.
    pub fn is_valid(&self) -> bool {
        (0..3).all(|k| self.min[k] <= self.max[k])
    }

    /// Check if this bounding box intersects another, with tolerance.
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        (0..3).all(|k| {
            self.max[k] + tolerance >= other.min[k] && other.max[k] + tolerance >= self.min[k]
        })
    }

    /// Check if a point lies inside the box, with tolerance.
    pub fn contains(&self, p: [f64; 3], tolerance: f64) -> bool {
        (0..3).all(|k| p[k] >= self.min[k] - tolerance && p[k] <= self.max[k] + tolerance)
    }

    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// Get the index of the longest axis (0=X, 1=Y, 2=Z).
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e[0] >= e[1] && e[0] >= e[2] {
            0
        } else if e[1] >= e[2] {
            1
        } else {
            2
        }
    }

    pub fn extent(&self) -> [f64; 3] {
        if !self.is_valid() {
            return [0.0; 3];
        }
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Length of the box diagonal (0 for an empty box).
    pub fn diagonal(&self) -> f64 {
        let e = self.extent();
        (e[0] * e[0] + e[1] * e[1] + e[2] * e[2]).sqrt()
    }

    /// Pad this bounding box by a given amount in all directions.
    pub fn padded(&self, padding: f64) -> Self {
        Self {
            min: [
                self.min[0] - padding,
                self.min[1] - padding,
                self.min[2] - padding,
            ],
            max: [
                self.max[0] + padding,
                self.max[1] + padding,
                self.max[2] + padding,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_diagonal() {
        let a = BoundingBox::from_points(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let b = BoundingBox::from_points(&[[0.0, 2.0, 2.0]]);
        let u = a.union(&b);
        assert_eq!(u.min, [0.0, 0.0, 0.0]);
        assert_eq!(u.max, [1.0, 2.0, 2.0]);
        assert!((u.diagonal() - 3.0).abs() < 1e-12);
        assert_eq!(u.longest_axis(), 1);
    }

    #[test]
    fn empty_box_is_invalid() {
        let e = BoundingBox::empty();
        assert!(!e.is_valid());
        assert_eq!(e.diagonal(), 0.0);
        assert!(!e.contains([0.0; 3], 0.0));
    }

    #[test]
    fn intersects_with_tolerance() {
        let a = BoundingBox::from_points(&[[0.0; 3], [1.0, 1.0, 1.0]]);
        let b = BoundingBox::from_points(&[[1.05, 0.0, 0.0], [2.0, 1.0, 1.0]]);
        assert!(!a.intersects(&b, 0.0));
        assert!(a.intersects(&b, 0.1));
    }
}
