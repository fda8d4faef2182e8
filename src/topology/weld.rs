//! Duplicate-node removal on raw input.
//!
//! Surface meshes stitched together from separately meshed patches repeat
//! nodes along the seams. [`weld_duplicate_nodes`] finds nodes closer than a
//! tolerance with the spatial index, collapses each cluster onto its lowest
//! index, and rewrites loop connectivity. Loops that lose all but two distinct
//! nodes are degenerate and dropped.

use std::collections::BTreeMap;

use crate::geometry::bbox::BoundingBox;
use crate::geometry::metrics::distance;
use crate::mesh_error::MeshAgglomError;
use crate::spatial::Bvh;
use crate::topology::input::{LoopInput, SurfaceMeshInput};

/// Union-find over node indices.
#[derive(Debug, Default, Clone)]
pub struct NodeEquivalence {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl NodeEquivalence {
    /// `n` singleton classes.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Representative with path compression.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Union two classes and return the new representative.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        if self.rank[ra] < self.rank[rb] {
            self.parent[ra] = rb;
            rb
        } else {
            if self.rank[ra] == self.rank[rb] {
                self.rank[ra] += 1;
            }
            self.parent[rb] = ra;
            ra
        }
    }

    /// Partition all indices into classes keyed by their lowest member.
    pub fn classes(&mut self) -> BTreeMap<usize, Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..self.parent.len() {
            let r = self.find(i);
            by_root.entry(r).or_default().push(i);
        }
        by_root.into_values().map(|members| (members[0], members)).collect()
    }
}

/// What welding changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeldReport {
    /// Old node index → new node index.
    pub node_map: Vec<usize>,
    /// Number of input nodes merged into another node.
    pub merged_nodes: usize,
    /// Input loops dropped because they collapsed.
    pub dropped_loops: Vec<usize>,
    /// New loop index → old loop index.
    pub loop_origin: Vec<usize>,
}

/// Merge nodes closer than `tolerance` and rewrite connectivity.
pub fn weld_duplicate_nodes(
    input: &SurfaceMeshInput,
    tolerance: f64,
) -> Result<(SurfaceMeshInput, WeldReport), MeshAgglomError> {
    input.validate()?;
    let n = input.nodes.len();
    let mut eq = NodeEquivalence::new(n);
    if tolerance > 0.0 {
        let bvh = Bvh::from_points(&input.nodes, 8);
        for (i, p) in input.nodes.iter().enumerate() {
            let probe = BoundingBox { min: *p, max: *p };
            for j in bvh.query(&probe, tolerance) {
                let j = j as usize;
                if j < i && distance(input.nodes[j], *p) <= tolerance {
                    eq.union(i, j);
                }
            }
        }
    }

    let classes = eq.classes();
    let mut node_map = vec![0usize; n];
    let mut nodes = Vec::with_capacity(classes.len());
    let mut uv = input.node_uv.as_ref().map(|_| Vec::with_capacity(classes.len()));
    for (new, (first, members)) in classes.iter().enumerate() {
        for &m in members {
            node_map[m] = new;
        }
        nodes.push(input.nodes[*first]);
        if let (Some(out), Some(src)) = (uv.as_mut(), input.node_uv.as_ref()) {
            out.push(src[*first]);
        }
    }
    // Class keys are the lowest members, so `node_map` is monotone.

    let remap = |chain: &[usize]| -> Vec<usize> {
        let mut out: Vec<usize> = Vec::with_capacity(chain.len());
        for &c in chain {
            let m = node_map[c];
            if out.last() != Some(&m) {
                out.push(m);
            }
        }
        out
    };

    let mut loops = Vec::with_capacity(input.loops.len());
    let mut dropped_loops = Vec::new();
    let mut loop_origin = Vec::with_capacity(input.loops.len());
    for (li, lp) in input.loops.iter().enumerate() {
        let mut ring = remap(&lp.nodes);
        while ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        let mut distinct = ring.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 3 {
            dropped_loops.push(li);
            continue;
        }
        loops.push(LoopInput::new(ring, lp.tags));
        loop_origin.push(li);
    }

    let welded = SurfaceMeshInput {
        nodes,
        node_uv: uv,
        loops,
        trailing_edge_chains: input.trailing_edge_chains.iter().map(|c| remap(c)).collect(),
        leading_edge_chains: input.leading_edge_chains.iter().map(|c| remap(c)).collect(),
        attachments: input.attachments.clone(),
    };
    let report = WeldReport {
        merged_nodes: n - welded.nodes.len(),
        node_map,
        dropped_loops,
        loop_origin,
    };
    Ok((welded, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::face_loop::LoopTags;

    #[test]
    fn union_find_classes() {
        let mut eq = NodeEquivalence::new(5);
        eq.union(3, 1);
        eq.union(4, 3);
        let classes = eq.classes();
        assert_eq!(classes[&1], vec![1, 3, 4]);
        assert_eq!(classes[&0], vec![0]);
        assert_eq!(classes.len(), 3);
    }

    #[test]
    fn seam_nodes_are_welded() {
        // Two triangles meshed separately, sharing a seam with duplicated nodes.
        let input = SurfaceMeshInput {
            nodes: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 0.0, 1e-12],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            loops: vec![
                LoopInput::new(vec![0, 1, 2], LoopTags::default()),
                LoopInput::new(vec![3, 4, 5], LoopTags::default()),
            ],
            trailing_edge_chains: vec![vec![0, 1, 3]],
            ..Default::default()
        };
        let (welded, report) = weld_duplicate_nodes(&input, 1e-9).unwrap();
        assert_eq!(welded.nodes.len(), 4);
        assert_eq!(report.merged_nodes, 2);
        assert_eq!(report.node_map, vec![0, 1, 2, 1, 3, 2]);
        assert_eq!(welded.loops[1].nodes, vec![1, 3, 2]);
        assert_eq!(welded.trailing_edge_chains[0], vec![0, 1]);
    }

    #[test]
    fn collapsed_loops_are_dropped() {
        let input = SurfaceMeshInput {
            nodes: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            loops: vec![
                LoopInput::new(vec![0, 1, 2], LoopTags::default()),
                LoopInput::new(vec![0, 2, 3], LoopTags::default()),
            ],
            ..Default::default()
        };
        let (welded, report) = weld_duplicate_nodes(&input, 1e-9).unwrap();
        assert_eq!(report.dropped_loops, vec![0]);
        assert_eq!(report.loop_origin, vec![1]);
        assert_eq!(welded.loops.len(), 1);
        assert_eq!(welded.loops[0].nodes, vec![0, 1, 2]);
    }
}
