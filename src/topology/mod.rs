//! Mesh topology: levels, entities and the multigrid hierarchy.
//!
//! This module provides the index-based arena representation of a surface
//! mesh and everything that builds or links it:
//! - [`ids`]: typed node, edge and loop indices
//! - [`node`], [`edge`], [`face_loop`]: entities and their flags
//! - [`mesh_level`]: one resolution with O(1) neighbourhood queries
//! - [`coarsen`]: coarse level construction from a merge assignment
//! - [`hierarchy`]: the full stack of levels, deformation and field transfer
//! - [`input`], [`weld`], [`components`], [`attachment`]: raw input handling
//!
//! Most users go through [`crate::pipeline::preprocess`] and then query
//! [`MeshHierarchy`] and [`MeshLevel`].

pub mod adjacency;
pub mod attachment;
pub mod coarsen;
pub mod components;
pub mod edge;
pub mod face_loop;
pub mod hierarchy;
pub mod ids;
pub mod input;
pub mod mesh_level;
pub mod node;
pub mod weld;

pub use coarsen::{CoarseMeshBuilder, MergeAssignment};
pub use hierarchy::{GeometryVersion, MeshHierarchy};
pub use ids::{EdgeId, LoopId, NodeId};
pub use mesh_level::MeshLevel;
