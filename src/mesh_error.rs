//! MeshAgglomError: Unified error type for mesh-agglom public APIs
//!
//! Every fallible operation in the crate returns this error. Variants carry the
//! offending index so a caller can point at the exact loop, node, or edge that
//! broke the input contract.

use thiserror::Error;

/// Unified error type for mesh-agglom operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshAgglomError {
    /// A loop was given fewer than three distinct nodes.
    #[error("Input error: loop {loop_index} has {nodes} nodes (need at least 3)")]
    LoopTooSmall { loop_index: usize, nodes: usize },
    /// A loop references a node index outside the node array.
    #[error("Input error: loop {loop_index} references node {node} but only {len} nodes exist")]
    NodeOutOfBounds {
        loop_index: usize,
        node: usize,
        len: usize,
    },
    /// A loop index outside the loop array.
    #[error("Input error: loop {loop_index} referenced but only {len} loops exist")]
    LoopOutOfBounds { loop_index: usize, len: usize },
    /// An edge or loop refers to an entity that does not exist on its level.
    #[error("Topology error: edge {edge} references missing loop {loop_index}")]
    DanglingEdge { edge: usize, loop_index: usize },
    /// More than two loops share one edge.
    #[error("Topology error: edge {nodes:?} is shared by {loops} loops (expected at most 2)")]
    NonManifoldEdge { nodes: [usize; 2], loops: usize },
    /// Coarsening left a loop with fewer than three edges.
    #[error(
        "Agglomeration error: level {level} coarse loop {coarse_loop} has {edges} edges (need at least 3)"
    )]
    UnderConstrained {
        level: usize,
        coarse_loop: usize,
        edges: usize,
    },
    /// A merge assignment does not match the level it was produced for.
    #[error("Invalid merge assignment: {0}")]
    InvalidAssignment(String),
    /// Geometry that cannot be evaluated (non-finite coordinates etc).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// A component ID was referenced that the component table does not know.
    #[error("Unknown component id {0}")]
    UnknownComponent(u32),
    /// A structural invariant failed its check.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}
