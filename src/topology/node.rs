//! Mesh nodes and their classification flags.

use serde::{Deserialize, Serialize};

use crate::topology::ids::NodeId;

/// Classification flags carried by a node.
///
/// Flags are set on level 0 by the kutta classifier and copied verbatim to the
/// coarse node that represents the same physical point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeFlags {
    pub trailing_edge: bool,
    pub leading_edge: bool,
    pub boundary_edge: bool,
    pub boundary_corner: bool,
    pub symmetry_plane: bool,
    pub intersection: bool,
    /// The surface is not locally convex here.
    pub concave: bool,
    pub wing_tip: bool,
}

/// One mesh node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub xyz: [f64; 3],
    /// Surface parameter coordinates, zero when the input carries none.
    pub uv: [f64; 2],
    /// Component of the first loop that references this node.
    pub component_id: u32,
    pub flags: NodeFlags,
    /// Node on the adjacent finer level (`None` on level 0).
    pub fine_node: Option<NodeId>,
    /// Node on the adjacent coarser level, if it survived coarsening.
    pub coarse_node: Option<NodeId>,
}

impl Node {
    pub fn new(xyz: [f64; 3]) -> Self {
        Self {
            xyz,
            uv: [0.0; 2],
            component_id: 0,
            flags: NodeFlags::default(),
            fine_node: None,
            coarse_node: None,
        }
    }
}
