//! One trailing vortex: the wake line shed from a single kutta node.

use serde::{Deserialize, Serialize};

use crate::geometry::metrics::{add, distance, scale, sub};
use crate::topology::ids::NodeId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrailingVortex {
    pub kutta_node: NodeId,
    /// Anchor position on the trailing edge.
    pub te_xyz: [f64; 3],
    /// Normalized position along the sheet, 0 at the first vortex.
    pub span_fraction: f64,
    pub is_wing_tip: bool,
    pub concave: bool,
    /// Average length of the trailing edges next to the anchor.
    pub core_width: f64,
    /// Wake nodes in the merged mesh, anchor first (empty until merged).
    pub wake_nodes: Vec<NodeId>,
    /// Downstream polyline, anchor first.
    pub wake_points: Vec<[f64; 3]>,
}

impl TrailingVortex {
    pub fn new(kutta_node: NodeId, te_xyz: [f64; 3]) -> Self {
        Self {
            kutta_node,
            te_xyz,
            span_fraction: 0.0,
            is_wing_tip: false,
            concave: false,
            core_width: 0.0,
            wake_nodes: Vec::new(),
            wake_points: Vec::new(),
        }
    }

    /// Polyline from the anchor: the first segment along `first_dir`, the
    /// rest along `freestream`, `count` points spaced `step` apart.
    pub fn shed(&mut self, first_dir: [f64; 3], freestream: [f64; 3], step: f64, count: usize) {
        self.wake_points.clear();
        let mut p = self.te_xyz;
        self.wake_points.push(p);
        for s in 1..count {
            let dir = if s == 1 { first_dir } else { freestream };
            p = add(p, scale(dir, step));
            self.wake_points.push(p);
        }
    }

    /// Move the anchor to `xyz`, translating the whole polyline with it.
    /// Returns the translation.
    pub fn follow_anchor(&mut self, xyz: [f64; 3]) -> [f64; 3] {
        let delta = sub(xyz, self.te_xyz);
        self.te_xyz = xyz;
        for p in &mut self.wake_points {
            *p = add(*p, delta);
        }
        delta
    }

    /// Wake length from anchor to last point.
    pub fn length(&self) -> f64 {
        self.wake_points
            .windows(2)
            .map(|w| distance(w[0], w[1]))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shed_and_follow() {
        let mut v = TrailingVortex::new(NodeId::new(3), [1.0, 0.0, 0.0]);
        v.shed([1.0, 0.0, 0.0], [1.0, 0.0, 0.0], 0.5, 5);
        assert_eq!(v.wake_points.len(), 5);
        assert_eq!(v.wake_points[4], [3.0, 0.0, 0.0]);
        assert!((v.length() - 2.0).abs() < 1e-12);
        let d = v.follow_anchor([1.0, 0.0, 0.5]);
        assert_eq!(d, [0.0, 0.0, 0.5]);
        assert_eq!(v.wake_points[4], [3.0, 0.0, 0.5]);
    }
}
