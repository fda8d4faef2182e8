//! Tunable parameters.
//!
//! All thresholds of the agglomeration heuristics, the kutta classifier and the
//! wake builder live here as plain structs with public fields. Their defaults
//! are the values the solver has been tuned with. Every struct deserializes
//! with `#[serde(default)]`, so a JSON document only needs to name the values
//! it overrides.

use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshAgglomError;

/// Front-propagation and cleanup thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgglomerationConfig {
    /// Try a star merge before falling back to a nearest-neighbour merge.
    pub star_first: bool,
    /// Maximum relative deviation of a star loop's inverse centroid distance
    /// from the average over the star.
    pub star_weight_tolerance: f64,
    pub star_min_loops: usize,
    pub star_max_loops: usize,
    /// Agglomerates stop accepting nearest-neighbour merges at this size.
    pub max_agglomerate_loops: usize,
    /// Area ratios for small-loop absorption, tried in order.
    pub small_area_ratios: Vec<f64>,
    /// Two agglomerates are coplanar when their normals differ by at most this.
    pub coplanar_angle_deg: f64,
    /// Corner-angle sum below which an agglomerate counts as a fan blade.
    pub fan_min_angle_deg: f64,
    /// Neighbour-to-blade area ratio that triggers fan cleanup.
    pub fan_area_ratio: f64,
    /// A fan blade is only merged into a neighbour whose angle at the node is
    /// at most this.
    pub fan_max_merge_angle_deg: f64,
    /// Total angle that fan cleanup may merge away around one node.
    pub fan_angle_budget_deg: f64,
    /// Longest-to-shortest perimeter ratio above which an agglomerate is a sliver.
    pub sliver_aspect_ratio: f64,
    /// Area ratio for absorbing an agglomerate with a single neighbour.
    pub lone_area_ratio: f64,
    /// Colinear-edge simplification tolerance; `None` disables it.
    pub colinear_angle_deg: Option<f64>,
    /// Maximum turning angle of a quad formed by pairing two triangles.
    pub pair_max_turn_deg: f64,
}

impl Default for AgglomerationConfig {
    fn default() -> Self {
        Self {
            star_first: true,
            star_weight_tolerance: 0.25,
            star_min_loops: 3,
            star_max_loops: 8,
            max_agglomerate_loops: 4,
            small_area_ratios: vec![100.0, 50.0, 25.0, 10.0, 5.0],
            coplanar_angle_deg: 10.0,
            fan_min_angle_deg: 15.0,
            fan_area_ratio: 5.0,
            fan_max_merge_angle_deg: 90.0,
            fan_angle_budget_deg: 60.0,
            sliver_aspect_ratio: 10.0,
            lone_area_ratio: 5.0,
            colinear_angle_deg: Some(5.0),
            pair_max_turn_deg: 130.0,
        }
    }
}

/// Sharp-edge and kutta-chain detection thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KuttaConfig {
    /// Minimum dihedral angle of a trailing edge.
    pub sharp_angle_deg: f64,
    /// Edges more aligned with the free stream than this are never trailing.
    pub streamwise_dot_limit: f64,
    /// Tip test: some incident loop normal within this angle of the
    /// trailing-edge direction (or its reverse).
    pub wing_tip_angle_deg: f64,
    pub detect_leading_edges: bool,
    /// Mark interior edges with at least this dihedral as boundary.
    pub sharp_boundary_angle_deg: Option<f64>,
}

impl Default for KuttaConfig {
    fn default() -> Self {
        Self {
            sharp_angle_deg: 65.0,
            streamwise_dot_limit: 0.98,
            wing_tip_angle_deg: 45.0,
            detect_leading_edges: true,
            sharp_boundary_angle_deg: None,
        }
    }
}

/// Wake mesh construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Streamwise nodes per trailing vortex, including the anchor.
    pub nodes_per_vortex: usize,
    /// Wake length as a multiple of the model bounding-box diagonal.
    pub wake_length_factor: f64,
    /// Blend of the first wake segment toward the trailing-edge bisector at
    /// convex anchors (0 = free stream only).
    pub bisector_blend: f64,
    /// Append the wake mesh to level 0 before coarsening.
    pub merge_into_mesh: bool,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            nodes_per_vortex: 8,
            wake_length_factor: 2.0,
            bisector_blend: 0.0,
            merge_into_mesh: true,
        }
    }
}

/// How deep to coarsen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Maximum number of levels including level 0.
    pub max_levels: usize,
    /// Stop when a step keeps more than this fraction of the loops.
    pub min_reduction: f64,
    /// Stop once a level has at most this many loops.
    pub min_loops: usize,
    /// Build level 1 by pairing triangles into quads.
    pub pair_triangles_first: bool,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_levels: 8,
            min_reduction: 0.95,
            min_loops: 1,
            pair_triangles_first: false,
        }
    }
}

/// Mirror plane `x[axis] == offset`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymmetryPlane {
    pub axis: usize,
    pub offset: f64,
    pub tolerance: f64,
}

impl Default for SymmetryPlane {
    fn default() -> Self {
        Self {
            axis: 1,
            offset: 0.0,
            tolerance: 1e-6,
        }
    }
}

impl SymmetryPlane {
    /// Reflect a point through the plane.
    pub fn mirror(&self, p: [f64; 3]) -> [f64; 3] {
        let mut q = p;
        q[self.axis] = 2.0 * self.offset - p[self.axis];
        q
    }

    /// Signed distance of `p` from the plane.
    pub fn signed_distance(&self, p: [f64; 3]) -> f64 {
        p[self.axis] - self.offset
    }

    pub fn contains(&self, p: [f64; 3]) -> bool {
        self.signed_distance(p).abs() <= self.tolerance
    }
}

/// Everything [`preprocess`](crate::pipeline::preprocess) needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Free-stream direction (need not be normalized).
    pub freestream: [f64; 3],
    /// Coarsen symmetrically about this plane.
    pub symmetry: Option<SymmetryPlane>,
    /// Weld nodes closer than this fraction of the bounding-box diagonal.
    pub weld_relative_tolerance: Option<f64>,
    pub agglomeration: AgglomerationConfig,
    pub kutta: KuttaConfig,
    pub wake: WakeConfig,
    pub hierarchy: HierarchyConfig,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            freestream: [1.0, 0.0, 0.0],
            symmetry: None,
            weld_relative_tolerance: Some(1e-9),
            agglomeration: AgglomerationConfig::default(),
            kutta: KuttaConfig::default(),
            wake: WakeConfig::default(),
            hierarchy: HierarchyConfig::default(),
        }
    }
}

fn check(ok: bool, what: &str) -> Result<(), MeshAgglomError> {
    if ok {
        Ok(())
    } else {
        Err(MeshAgglomError::InvalidConfig(what.to_string()))
    }
}

fn finite_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn angle(v: f64) -> bool {
    v.is_finite() && (0.0..=180.0).contains(&v)
}

impl PreprocessConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, MeshAgglomError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MeshAgglomError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject non-finite or out-of-range values.
    pub fn validate(&self) -> Result<(), MeshAgglomError> {
        let fs = self.freestream;
        check(
            fs.iter().all(|c| c.is_finite()) && fs.iter().any(|c| *c != 0.0),
            "freestream must be a finite non-zero vector",
        )?;
        if let Some(sym) = &self.symmetry {
            check(sym.axis < 3, "symmetry.axis must be 0, 1 or 2")?;
            check(sym.offset.is_finite(), "symmetry.offset must be finite")?;
            check(finite_positive(sym.tolerance), "symmetry.tolerance must be > 0")?;
        }
        if let Some(tol) = self.weld_relative_tolerance {
            check(tol.is_finite() && tol >= 0.0, "weld_relative_tolerance must be >= 0")?;
        }

        let a = &self.agglomeration;
        check(
            a.star_weight_tolerance.is_finite() && a.star_weight_tolerance >= 0.0,
            "agglomeration.star_weight_tolerance must be >= 0",
        )?;
        check(a.star_min_loops >= 2, "agglomeration.star_min_loops must be >= 2")?;
        check(
            a.star_max_loops >= a.star_min_loops,
            "agglomeration.star_max_loops must be >= star_min_loops",
        )?;
        check(
            a.max_agglomerate_loops >= 2,
            "agglomeration.max_agglomerate_loops must be >= 2",
        )?;
        check(
            a.small_area_ratios.iter().all(|r| finite_positive(*r) && *r >= 1.0),
            "agglomeration.small_area_ratios must be finite and >= 1",
        )?;
        check(
            angle(a.coplanar_angle_deg)
                && angle(a.fan_min_angle_deg)
                && angle(a.fan_max_merge_angle_deg)
                && angle(a.pair_max_turn_deg),
            "agglomeration angles must lie in [0, 180]",
        )?;
        check(
            a.fan_angle_budget_deg.is_finite() && a.fan_angle_budget_deg >= 0.0,
            "agglomeration.fan_angle_budget_deg must be >= 0",
        )?;
        check(
            finite_positive(a.fan_area_ratio)
                && finite_positive(a.sliver_aspect_ratio)
                && finite_positive(a.lone_area_ratio),
            "agglomeration ratios must be finite and > 0",
        )?;
        if let Some(c) = a.colinear_angle_deg {
            check(angle(c), "agglomeration.colinear_angle_deg must lie in [0, 180]")?;
        }

        let k = &self.kutta;
        check(
            angle(k.sharp_angle_deg) && angle(k.wing_tip_angle_deg),
            "kutta angles must lie in [0, 180]",
        )?;
        check(
            k.streamwise_dot_limit.is_finite() && (0.0..=1.0).contains(&k.streamwise_dot_limit),
            "kutta.streamwise_dot_limit must lie in [0, 1]",
        )?;
        if let Some(b) = k.sharp_boundary_angle_deg {
            check(angle(b), "kutta.sharp_boundary_angle_deg must lie in [0, 180]")?;
        }

        let w = &self.wake;
        check(w.nodes_per_vortex >= 2, "wake.nodes_per_vortex must be >= 2")?;
        check(
            finite_positive(w.wake_length_factor),
            "wake.wake_length_factor must be > 0",
        )?;
        check(
            w.bisector_blend.is_finite() && (0.0..=1.0).contains(&w.bisector_blend),
            "wake.bisector_blend must lie in [0, 1]",
        )?;

        let h = &self.hierarchy;
        check(h.max_levels >= 1, "hierarchy.max_levels must be >= 1")?;
        check(
            h.min_reduction.is_finite() && h.min_reduction > 0.0 && h.min_reduction <= 1.0,
            "hierarchy.min_reduction must lie in (0, 1]",
        )?;
        Ok(())
    }
}
