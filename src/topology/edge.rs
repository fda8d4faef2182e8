//! Mesh edges.
//!
//! An edge joins two nodes and separates (at most) two loops. An open edge,
//! used by a single loop, stores that loop in both slots; every other edge
//! stores two distinct loops.

use serde::{Deserialize, Serialize};

use crate::topology::ids::{EdgeId, LoopId, NodeId};

/// Classification flags carried by an edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeFlags {
    pub trailing_edge: bool,
    pub leading_edge: bool,
    pub boundary: bool,
    /// Separates loops of different components.
    pub intersection: bool,
    /// Separates loops with different control-surface tags.
    pub frozen: bool,
    /// Lies in the symmetry plane.
    pub symmetry: bool,
    pub concave_trailing_edge: bool,
}

impl EdgeFlags {
    /// `true` if agglomeration must keep this edge on a coarse loop perimeter.
    #[inline]
    pub fn is_protected(&self) -> bool {
        self.trailing_edge || self.leading_edge || self.boundary || self.frozen || self.symmetry
    }

    /// The subset of flags that must round-trip through every coarsening step.
    #[inline]
    pub fn classification(&self) -> (bool, bool, bool) {
        (self.trailing_edge, self.leading_edge, self.boundary)
    }

    /// Flag-wise union.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            trailing_edge: self.trailing_edge || other.trailing_edge,
            leading_edge: self.leading_edge || other.leading_edge,
            boundary: self.boundary || other.boundary,
            intersection: self.intersection || other.intersection,
            frozen: self.frozen || other.frozen,
            symmetry: self.symmetry || other.symmetry,
            concave_trailing_edge: self.concave_trailing_edge || other.concave_trailing_edge,
        }
    }
}

/// One mesh edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// End nodes, oriented as in the first loop that introduced the edge.
    pub nodes: [NodeId; 2],
    /// Adjacent loops; both slots hold the same loop for an open edge.
    pub loops: [LoopId; 2],
    pub flags: EdgeFlags,
    pub component_id: u32,
    pub length: f64,
    /// Representative edge on the adjacent finer level.
    pub fine_edge: Option<EdgeId>,
    /// Edge on the adjacent coarser level, if this edge survived.
    pub coarse_edge: Option<EdgeId>,
    /// All finer-level edges folded into this one, sorted.
    pub merged_fine_edges: Vec<EdgeId>,
}

impl Edge {
    /// `true` if the edge borders a single loop.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.loops[0] == self.loops[1]
    }

    #[inline]
    pub fn has_node(&self, node: NodeId) -> bool {
        self.nodes[0] == node || self.nodes[1] == node
    }

    /// The endpoint that is not `node`.
    #[inline]
    pub fn other_node(&self, node: NodeId) -> NodeId {
        if self.nodes[0] == node {
            self.nodes[1]
        } else {
            self.nodes[0]
        }
    }

    /// The loop across this edge from `lp`; `lp` itself for an open edge.
    #[inline]
    pub fn other_loop(&self, lp: LoopId) -> LoopId {
        if self.loops[0] == lp {
            self.loops[1]
        } else {
            self.loops[0]
        }
    }
}
