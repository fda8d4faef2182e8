#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-agglom
//!
//! mesh-agglom is the geometric preprocessing stage of a vortex-lattice
//! solver. It takes a polygonal surface mesh (nodes plus loops with grouping
//! tags), finds the trailing edges that shed wakes, builds the wake meshes, and
//! coarsens the result into a multigrid hierarchy of progressively larger
//! loops.
//!
//! ## Features
//! - Level-0 mesh construction with edge/loop adjacency and per-loop geometry
//! - Sharp-edge classification and kutta-chain walking with recoverable
//!   diagnostics
//! - Vortex sheets and straight wake meshes shed along the free stream
//! - Loop agglomeration (front propagation, star merges, cleanup passes,
//!   optional mirror symmetry and triangle pairing)
//! - Coarse mesh construction with fine/coarse correspondence, incremental
//!   geometry updates and per-loop field transfer
//!
//! ## Determinism
//!
//! Every pass visits loops, nodes and edges in index order and breaks ties by
//! the lowest index, so the same input always produces the same hierarchy.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-agglom = "0.1"
//! # Optional features:
//! # features = ["rayon", "check-invariants"]
//! ```
//!
//! ```
//! use mesh_agglom::prelude::*;
//!
//! let input = mesh_agglom::mesh_generation::flat_wing(4);
//! let model = preprocess(&input, &ComponentTable::new(), &PreprocessConfig::default())?;
//! assert_eq!(model.sheets.len(), 1);
//! assert!(model.hierarchy.num_levels() > 1);
//! # Ok::<(), MeshAgglomError>(())
//! ```

pub mod agglom;
pub mod config;
pub mod debug_invariants;
pub mod diagnostics;
pub mod geometry;
pub mod kutta;
pub mod mesh_error;
pub mod mesh_generation;
pub mod pipeline;
pub mod spatial;
pub mod topology;
pub mod wake;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::agglom::Agglomerator;
    pub use crate::config::{
        AgglomerationConfig, HierarchyConfig, KuttaConfig, PreprocessConfig, SymmetryPlane,
        WakeConfig,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::diagnostics::{Diagnostic, Diagnostics};
    pub use crate::kutta::{KuttaChain, KuttaTopology, SharpEdgeClassifier};
    pub use crate::mesh_error::MeshAgglomError;
    pub use crate::pipeline::{PreprocessedModel, preprocess};
    pub use crate::topology::attachment::Attachment;
    pub use crate::topology::components::{ComponentRecord, ComponentTable};
    pub use crate::topology::face_loop::{LoopTags, SurfaceKind};
    pub use crate::topology::input::{LoopInput, SurfaceMeshInput};
    pub use crate::topology::{
        CoarseMeshBuilder, EdgeId, GeometryVersion, LoopId, MergeAssignment, MeshHierarchy,
        MeshLevel, NodeId,
    };
    pub use crate::wake::{TrailingVortex, VortexSheet};
}
