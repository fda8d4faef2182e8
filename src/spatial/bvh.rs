//! Bounding volume hierarchy over indexed boxes.
//!
//! Items are arbitrary indexed axis-aligned boxes (a point is a zero-size
//! box). The tree is built top-down by sorting items along the longest axis of
//! the current bounds and splitting at the median, which gives O(n log n)
//! construction and O(log n + k) box queries.

use std::cmp::Ordering;

use crate::geometry::bbox::BoundingBox;
use crate::geometry::metrics::distance;

/// BVH node containing either leaf items or child nodes.
#[derive(Debug, Clone)]
pub enum BvhNode {
    Leaf {
        bbox: BoundingBox,
        items: Vec<u32>,
    },
    Internal {
        bbox: BoundingBox,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    pub fn bbox(&self) -> &BoundingBox {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Bounding volume hierarchy.
#[derive(Debug, Clone)]
pub struct Bvh {
    root: Option<BvhNode>,
    boxes: Vec<BoundingBox>,
}

impl Bvh {
    /// Build over `boxes`; item `i` is `boxes[i]`.
    pub fn build(boxes: Vec<BoundingBox>, max_leaf_size: usize) -> Self {
        if boxes.is_empty() {
            return Self { root: None, boxes };
        }
        let indices: Vec<usize> = (0..boxes.len()).collect();
        let root = Self::build_recursive(&boxes, indices, max_leaf_size.max(1));
        Self {
            root: Some(root),
            boxes,
        }
    }

    /// Build over points.
    pub fn from_points(points: &[[f64; 3]], max_leaf_size: usize) -> Self {
        let boxes = points.iter().map(|p| BoundingBox { min: *p, max: *p }).collect();
        Self::build(boxes, max_leaf_size)
    }

    fn build_recursive(boxes: &[BoundingBox], indices: Vec<usize>, max_leaf_size: usize) -> BvhNode {
        let mut bbox = BoundingBox::empty();
        for &i in &indices {
            bbox.expand(&boxes[i]);
        }

        if indices.len() <= max_leaf_size {
            return BvhNode::Leaf {
                bbox,
                items: indices.iter().map(|&i| i as u32).collect(),
            };
        }

        let axis = bbox.longest_axis();
        let mut sorted = indices;
        sorted.sort_by(|&a, &b| {
            let ca = boxes[a].center()[axis];
            let cb = boxes[b].center()[axis];
            ca.partial_cmp(&cb).unwrap_or(Ordering::Equal).then(a.cmp(&b))
        });
        let right = sorted.split_off(sorted.len() / 2);

        BvhNode::Internal {
            bbox,
            left: Box::new(Self::build_recursive(boxes, sorted, max_leaf_size)),
            right: Box::new(Self::build_recursive(boxes, right, max_leaf_size)),
        }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Items whose box overlaps `query` (grown by `tolerance`), ascending.
    pub fn query(&self, query: &BoundingBox, tolerance: f64) -> Vec<u32> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                if !node.bbox().intersects(query, tolerance) {
                    continue;
                }
                match node {
                    BvhNode::Leaf { items, .. } => out.extend(
                        items
                            .iter()
                            .filter(|&&i| self.boxes[i as usize].intersects(query, tolerance)),
                    ),
                    BvhNode::Internal { left, right, .. } => {
                        stack.push(right);
                        stack.push(left);
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Item whose box center is closest to `p`, searching within `radius`.
    ///
    /// Ties go to the lower index.
    pub fn nearest(&self, p: [f64; 3], radius: f64) -> Option<(u32, f64)> {
        let probe = BoundingBox { min: p, max: p };
        self.query(&probe, radius)
            .into_iter()
            .map(|i| (i, distance(self.boxes[i as usize].center(), p)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<[f64; 3]> {
        let mut pts = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                pts.push([i as f64, j as f64, 0.0]);
            }
        }
        pts
    }

    #[test]
    fn query_matches_brute_force() {
        let pts = grid();
        let bvh = Bvh::from_points(&pts, 4);
        let q = BoundingBox {
            min: [2.5, 3.5, -1.0],
            max: [5.0, 6.0, 1.0],
        };
        let hits = bvh.query(&q, 0.0);
        let brute: Vec<u32> = (0..pts.len() as u32)
            .filter(|&i| q.contains(pts[i as usize], 0.0))
            .collect();
        assert_eq!(hits, brute);
        assert_eq!(hits.len(), 3 * 3);
    }

    #[test]
    fn nearest_within_radius() {
        let pts = grid();
        let bvh = Bvh::from_points(&pts, 4);
        let (i, d) = bvh.nearest([4.1, 7.05, 0.0], 0.5).unwrap();
        assert_eq!(pts[i as usize], [4.0, 7.0, 0.0]);
        assert!(d < 0.2);
        assert!(bvh.nearest([40.0, 0.0, 0.0], 1.0).is_none());
    }

    #[test]
    fn empty_tree() {
        let bvh = Bvh::build(Vec::new(), 8);
        assert!(bvh.is_empty());
        assert!(bvh.query(&BoundingBox::from_points(&[[0.0; 3]]), 1.0).is_empty());
    }
}
