//! Raw surface description handed over by the geometry/parsing layer.

use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshAgglomError;
use crate::topology::attachment::Attachment;
use crate::topology::face_loop::LoopTags;

/// One input loop: node indices in winding order plus its grouping tags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopInput {
    pub nodes: Vec<usize>,
    pub tags: LoopTags,
}

impl LoopInput {
    pub fn new(nodes: Vec<usize>, tags: LoopTags) -> Self {
        Self { nodes, tags }
    }
}

/// Complete input surface mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMeshInput {
    pub nodes: Vec<[f64; 3]>,
    /// Optional per-node surface parameters.
    #[serde(default)]
    pub node_uv: Option<Vec<[f64; 2]>>,
    pub loops: Vec<LoopInput>,
    /// Explicit trailing-edge node chains; authoritative when present.
    #[serde(default)]
    pub trailing_edge_chains: Vec<Vec<usize>>,
    #[serde(default)]
    pub leading_edge_chains: Vec<Vec<usize>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl SurfaceMeshInput {
    /// Check index bounds and loop sizes.
    ///
    /// A loop with fewer than three distinct nodes, or any node index outside
    /// the node array, is fatal and reported with the offending loop index.
    pub fn validate(&self) -> Result<(), MeshAgglomError> {
        let len = self.nodes.len();
        if let Some(uv) = &self.node_uv {
            if uv.len() != len {
                return Err(MeshAgglomError::InvalidGeometry(format!(
                    "{} uv coordinates for {} nodes",
                    uv.len(),
                    len
                )));
            }
        }
        for (i, p) in self.nodes.iter().enumerate() {
            if p.iter().any(|c| !c.is_finite()) {
                return Err(MeshAgglomError::InvalidGeometry(format!(
                    "node {i} has a non-finite coordinate"
                )));
            }
        }
        for (loop_index, lp) in self.loops.iter().enumerate() {
            if let Some(&node) = lp.nodes.iter().find(|&&n| n >= len) {
                return Err(MeshAgglomError::NodeOutOfBounds {
                    loop_index,
                    node,
                    len,
                });
            }
            let mut distinct = lp.nodes.clone();
            distinct.sort_unstable();
            distinct.dedup();
            if distinct.len() < 3 {
                return Err(MeshAgglomError::LoopTooSmall {
                    loop_index,
                    nodes: distinct.len(),
                });
            }
        }
        for chain in self.trailing_edge_chains.iter().chain(&self.leading_edge_chains) {
            if let Some(&node) = chain.iter().find(|&&n| n >= len) {
                return Err(MeshAgglomError::InvalidGeometry(format!(
                    "edge chain references node {node} but only {len} nodes exist"
                )));
            }
        }
        Ok(())
    }

    /// Largest surface id used by any loop.
    pub fn max_surface_id(&self) -> u32 {
        self.loops.iter().map(|l| l.tags.surface_id).max().unwrap_or(0)
    }
}
