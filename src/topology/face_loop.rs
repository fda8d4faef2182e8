//! Loops: polygonal mesh faces with their tags and provenance.

use serde::{Deserialize, Serialize};

use crate::geometry::metrics::LoopGeometry;
use crate::topology::ids::{EdgeId, LoopId, NodeId};

/// What kind of surface a loop belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SurfaceKind {
    /// Thin lifting surface.
    Wing,
    /// Thick body (fuselage, nacelle, pod).
    #[default]
    Body,
    /// Wake mesh shed by a vortex sheet.
    Wake,
}

/// Grouping tags that partition loops into regions that never merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoopTags {
    pub surface_id: u32,
    pub component_id: u32,
    pub span_station: u32,
    pub kind: SurfaceKind,
    pub control_surface: Option<u32>,
}

impl LoopTags {
    /// `true` if loops carrying `self` and `other` may end up in one coarse loop.
    #[inline]
    pub fn mergeable_with(&self, other: &Self) -> bool {
        self == other
    }
}

/// One loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    /// Nodes in winding order.
    pub nodes: Vec<NodeId>,
    /// `edges[i]` joins `nodes[i]` and `nodes[i + 1]` (cyclically).
    pub edges: Vec<EdgeId>,
    pub geometry: LoopGeometry,
    pub tags: LoopTags,
    /// Finer-level loops this loop subsumes, sorted (empty on level 0).
    pub fine_loops: Vec<LoopId>,
    /// Coarse loop that subsumes this loop.
    pub coarse_loop: Option<LoopId>,
}

impl Loop {
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position of `node` in the winding, if present.
    pub fn position_of(&self, node: NodeId) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }

    /// `true` if the winding traverses `a → b` directly.
    pub fn traverses(&self, a: NodeId, b: NodeId) -> bool {
        let n = self.nodes.len();
        (0..n).any(|i| self.nodes[i] == a && self.nodes[(i + 1) % n] == b)
    }
}
