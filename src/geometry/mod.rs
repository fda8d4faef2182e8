//! Geometry utilities for mesh-agglom.
//!
//! This module provides bounding boxes, polygon metrics (area, normal,
//! centroid) and the loop quality measures the agglomerator ranks merges by.

pub mod bbox;
pub mod metrics;
pub mod quality;

pub use bbox::BoundingBox;
pub use metrics::LoopGeometry;
