//! Sharp-edge and kutta classification on the finest level.
//!
//! The classifier marks trailing, leading, boundary and symmetry edges (and
//! the matching node flags), then walks the trailing edges into
//! [`KuttaChain`]s. Explicit trailing-edge chains are authoritative for the
//! components they touch; every other lifting component is searched for
//! sharp, aft-facing, convex edges that are not aligned with the free stream.
//!
//! Ambiguities never fail the run. They become [`Diagnostic`]s and the
//! affected component is treated as non-lifting (no vortex sheet).

pub mod chains;
pub mod convexity;

pub use chains::{KuttaChain, walk_chains};

use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{KuttaConfig, SymmetryPlane};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::geometry::metrics::{angle_between_deg, dot, normalized, sub};
use crate::mesh_error::MeshAgglomError;
use crate::topology::components::ComponentTable;
use crate::topology::ids::{EdgeId, NodeId};
use crate::topology::mesh_level::MeshLevel;

use convexity::{dihedral_deg, folds_inward, is_convex_at, merged_normal};

/// What the classifier found.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KuttaTopology {
    /// Complete chains of components that shed a wake.
    pub chains: Vec<KuttaChain>,
    /// Components dropped to non-lifting because of a diagnostic.
    pub failed_components: BTreeSet<u32>,
    pub diagnostics: Diagnostics,
}

impl KuttaTopology {
    /// All kutta nodes, ascending and without repeats.
    pub fn kutta_nodes(&self) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .chains
            .iter()
            .flat_map(|c| c.distinct_nodes().iter().copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Classifies the edges of a level-0 mesh.
#[derive(Clone, Debug)]
pub struct SharpEdgeClassifier<'a> {
    components: &'a ComponentTable,
    config: &'a KuttaConfig,
    freestream: [f64; 3],
    symmetry: Option<SymmetryPlane>,
}

impl<'a> SharpEdgeClassifier<'a> {
    pub fn new(
        components: &'a ComponentTable,
        config: &'a KuttaConfig,
        freestream: [f64; 3],
    ) -> Result<Self, MeshAgglomError> {
        let freestream = normalized(freestream).ok_or_else(|| {
            MeshAgglomError::InvalidConfig("freestream must be non-zero".into())
        })?;
        Ok(Self {
            components,
            config,
            freestream,
            symmetry: None,
        })
    }

    pub fn with_symmetry(mut self, plane: Option<SymmetryPlane>) -> Self {
        self.symmetry = plane;
        self
    }

    /// Classify `level` in place and return its kutta chains.
    ///
    /// `trailing` and `leading` are explicit node chains (node indices of
    /// `level`).
    pub fn classify(
        &self,
        level: &mut MeshLevel,
        trailing: &[Vec<usize>],
        leading: &[Vec<usize>],
    ) -> Result<KuttaTopology, MeshAgglomError> {
        let mut diagnostics = Diagnostics::new();
        let explicit_te = mark_explicit(level, trailing, &mut diagnostics, |f| {
            f.trailing_edge = true
        })?;
        mark_explicit(level, leading, &mut diagnostics, |f| f.leading_edge = true)?;

        let detected = self.detect_trailing_edges(level, &explicit_te);
        for &e in &detected {
            level.edges_mut()[e.idx()].flags.trailing_edge = true;
        }
        if self.config.detect_leading_edges {
            for e in self.detect_leading_edges(level) {
                level.edges_mut()[e.idx()].flags.leading_edge = true;
            }
        }
        if let Some(angle) = self.config.sharp_boundary_angle_deg {
            mark_sharp_boundaries(level, angle);
        }
        if let Some(plane) = &self.symmetry {
            mark_symmetry(level, plane);
        }
        mark_node_flags(level);

        let (chains, mut failed) = walk_chains(level, self.components, &mut diagnostics);
        for chain in &chains {
            self.mark_chain_nodes(level, chain);
        }

        let with_te: BTreeSet<u32> = level
            .edges()
            .iter()
            .filter(|e| e.flags.trailing_edge)
            .map(|e| e.component_id)
            .collect();
        let mut lifting: BTreeSet<u32> = BTreeSet::new();
        for lp in level.loops() {
            if self.components.is_lifting(lp.tags.component_id, lp.tags.kind) {
                lifting.insert(lp.tags.component_id);
            }
        }
        for &c in lifting.difference(&with_te) {
            diagnostics.push(Diagnostic::NoTrailingEdge { component_id: c });
            failed.insert(c);
        }

        let chains: Vec<KuttaChain> = chains
            .into_iter()
            .filter(|c| !c.edges.iter().any(|e| failed.contains(&level.edge(*e).component_id)))
            .collect();
        info!(
            "classified {} trailing edges ({} detected) into {} kutta chains",
            level.edges().iter().filter(|e| e.flags.trailing_edge).count(),
            detected.len(),
            chains.len()
        );
        Ok(KuttaTopology {
            chains,
            failed_components: failed,
            diagnostics,
        })
    }

    /// Whether `e` borders two loops of one lifting component.
    fn lifting_interior(&self, level: &MeshLevel, e: EdgeId) -> bool {
        let edge = level.edge(e);
        if edge.is_open() || edge.flags.intersection {
            return false;
        }
        edge.loops.iter().all(|l| {
            let tags = level.get_loop(*l).tags;
            self.components.is_lifting(tags.component_id, tags.kind)
        })
    }

    fn sharp_convex_edge(&self, level: &MeshLevel, e: EdgeId) -> bool {
        let edge = level.edge(e);
        let dir = sub(level.node(edge.nodes[1]).xyz, level.node(edge.nodes[0]).xyz);
        let Some(dir) = normalized(dir) else {
            return false;
        };
        dot(dir, self.freestream).abs() <= self.config.streamwise_dot_limit
            && dihedral_deg(level, e).is_some_and(|d| d > self.config.sharp_angle_deg)
            && folds_inward(level, e)
    }

    fn detect_trailing_edges(&self, level: &MeshLevel, explicit: &BTreeSet<u32>) -> Vec<EdgeId> {
        let candidates: Vec<EdgeId> = (0..level.num_edges())
            .map(EdgeId::new)
            .filter(|&e| {
                !explicit.contains(&level.edge(e).component_id)
                    && self.lifting_interior(level, e)
                    && self.sharp_convex_edge(level, e)
                    && dot(merged_normal(level, e), self.freestream) > 0.0
            })
            .collect();
        let mut per_node = vec![0usize; level.num_nodes()];
        for &e in &candidates {
            for n in level.edge(e).nodes {
                per_node[n.idx()] += 1;
            }
        }
        let kutta = |n: NodeId| per_node[n.idx()] >= 2 || is_convex_at(level, n);
        let kept: Vec<EdgeId> = candidates
            .into_iter()
            .filter(|&e| level.edge(e).nodes.iter().any(|&n| kutta(n)))
            .collect();
        debug!("detected {} trailing edges", kept.len());
        kept
    }

    fn detect_leading_edges(&self, level: &MeshLevel) -> Vec<EdgeId> {
        (0..level.num_edges())
            .map(EdgeId::new)
            .filter(|&e| {
                let flags = level.edge(e).flags;
                !flags.trailing_edge
                    && !flags.leading_edge
                    && self.lifting_interior(level, e)
                    && self.sharp_convex_edge(level, e)
                    && dot(merged_normal(level, e), self.freestream) < 0.0
            })
            .collect()
    }

    /// Concave and wing-tip flags along a chain.
    fn mark_chain_nodes(&self, level: &mut MeshLevel, chain: &KuttaChain) {
        let tip_angle = self.config.wing_tip_angle_deg;
        for &n in chain.distinct_nodes() {
            let convex = is_convex_at(level, n);
            let te: Vec<EdgeId> = level
                .edges_of_node(n)
                .iter()
                .copied()
                .filter(|&e| level.edge(e).flags.trailing_edge)
                .collect();
            let tip = match te[..] {
                [e] if convex && !level.node(n).flags.symmetry_plane => {
                    let edge = level.edge(e);
                    let dir = sub(level.node(edge.nodes[1]).xyz, level.node(edge.nodes[0]).xyz);
                    level.loops_of_node(n).iter().any(|l| {
                        angle_between_deg(level.get_loop(*l).geometry.normal, dir)
                            .is_some_and(|a| a <= tip_angle || a >= 180.0 - tip_angle)
                    })
                }
                _ => false,
            };
            let flags = &mut level.nodes_mut()[n.idx()].flags;
            flags.concave = !convex;
            flags.wing_tip = tip;
            if !convex {
                for &e in &te {
                    level.edges_mut()[e.idx()].flags.concave_trailing_edge = true;
                }
            }
        }
    }
}

/// Mark the edges along explicit node chains; returns the components they
/// belong to.
fn mark_explicit(
    level: &mut MeshLevel,
    chains: &[Vec<usize>],
    diagnostics: &mut Diagnostics,
    mark: impl Fn(&mut crate::topology::edge::EdgeFlags),
) -> Result<BTreeSet<u32>, MeshAgglomError> {
    let mut components = BTreeSet::new();
    for chain in chains {
        if let Some(&bad) = chain.iter().find(|&&n| n >= level.num_nodes()) {
            return Err(MeshAgglomError::InvalidGeometry(format!(
                "explicit chain node {bad} out of range"
            )));
        }
        for pair in chain.windows(2) {
            let (a, b) = (NodeId::new(pair[0]), NodeId::new(pair[1]));
            if a == b {
                continue;
            }
            match level.edge_between(a, b) {
                Some(e) => {
                    components.insert(level.edge(e).component_id);
                    mark(&mut level.edges_mut()[e.idx()].flags);
                }
                None => diagnostics.push(Diagnostic::BrokenExplicitChain {
                    a: pair[0],
                    b: pair[1],
                }),
            }
        }
    }
    Ok(components)
}

fn mark_sharp_boundaries(level: &mut MeshLevel, angle_deg: f64) {
    let sharp: Vec<EdgeId> = (0..level.num_edges())
        .map(EdgeId::new)
        .filter(|&e| {
            !level.edge(e).flags.trailing_edge
                && dihedral_deg(level, e).is_some_and(|d| d >= angle_deg)
        })
        .collect();
    for e in sharp {
        level.edges_mut()[e.idx()].flags.boundary = true;
    }
}

/// Flag nodes on `plane` and the open edges lying in it.
///
/// Only a half model (one side of the plane, cut open along it) has such
/// edges; a fully mirrored model has nodes on the plane but no open edges
/// there, so only its node flags change.
fn mark_symmetry(level: &mut MeshLevel, plane: &SymmetryPlane) {
    let on_plane: Vec<bool> = level.nodes().iter().map(|n| plane.contains(n.xyz)).collect();
    for (node, &on) in level.nodes_mut().iter_mut().zip(&on_plane) {
        node.flags.symmetry_plane |= on;
    }
    for edge in level.edges_mut() {
        if edge.is_open() && edge.nodes.iter().all(|n| on_plane[n.idx()]) {
            edge.flags.symmetry = true;
        }
    }
}

/// Node flags derived from the edge flags, plus boundary corners.
fn mark_node_flags(level: &mut MeshLevel) {
    let n = level.num_nodes();
    let mut boundary = vec![0usize; n];
    let mut trailing = vec![0usize; n];
    let mut leading = vec![false; n];
    for edge in level.edges() {
        for node in edge.nodes {
            let i = node.idx();
            if edge.flags.trailing_edge {
                trailing[i] += 1;
            } else if edge.flags.boundary {
                boundary[i] += 1;
            }
            leading[i] |= edge.flags.leading_edge;
        }
    }
    for (i, node) in level.nodes_mut().iter_mut().enumerate() {
        let flags = &mut node.flags;
        flags.trailing_edge = trailing[i] > 0;
        flags.leading_edge = leading[i];
        flags.boundary_edge |= boundary[i] > 0;
        flags.boundary_corner =
            (boundary[i] > 0 && trailing[i] > 0) || (boundary[i] != 0 && boundary[i] != 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_generation::{body_of_revolution, flat_wing, symmetric_wing, wedge_wing};
    use crate::topology::input::SurfaceMeshInput;

    fn classify(input: &SurfaceMeshInput) -> (MeshLevel, KuttaTopology) {
        let mut level = MeshLevel::from_input(input).unwrap();
        let components = ComponentTable::new();
        let config = KuttaConfig::default();
        let topo = SharpEdgeClassifier::new(&components, &config, [1.0, 0.0, 0.0])
            .unwrap()
            .classify(
                &mut level,
                &input.trailing_edge_chains,
                &input.leading_edge_chains,
            )
            .unwrap();
        (level, topo)
    }

    #[test]
    fn explicit_chain_is_authoritative() {
        let (level, topo) = classify(&flat_wing(5));
        assert_eq!(topo.chains.len(), 1);
        assert_eq!(topo.chains[0].nodes.len(), 6);
        assert!(topo.diagnostics.is_empty());
        let te = level.edges().iter().filter(|e| e.flags.trailing_edge).count();
        assert_eq!(te, 5);
        assert_eq!(topo.kutta_nodes().len(), 6);
    }

    #[test]
    fn sharp_wedge_trailing_edge_is_detected() {
        let mut input = wedge_wing(4);
        input.trailing_edge_chains.clear();
        let (level, topo) = classify(&input);
        assert_eq!(topo.chains.len(), 1, "{:?}", topo.diagnostics);
        let chain = &topo.chains[0];
        assert_eq!(chain.edges.len(), 4);
        for &e in &chain.edges {
            let edge = level.edge(e);
            let x = level.node(edge.nodes[0]).xyz[0];
            assert!((x - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn body_without_lifting_components_has_no_kutta_nodes() {
        let (_, topo) = classify(&body_of_revolution(12, 8));
        assert!(topo.chains.is_empty());
        assert!(topo.diagnostics.is_empty());
    }

    #[test]
    fn missing_trailing_edge_is_a_diagnostic() {
        let mut input = flat_wing(3);
        input.trailing_edge_chains.clear();
        let (_, topo) = classify(&input);
        assert!(topo.chains.is_empty());
        assert!(
            topo.diagnostics
                .iter()
                .any(|d| matches!(d, Diagnostic::NoTrailingEdge { .. }))
        );
        assert!(topo.failed_components.contains(&0));
    }

    #[test]
    fn broken_explicit_chain_is_reported() {
        let mut input = flat_wing(3);
        input.trailing_edge_chains.push(vec![0, 5]);
        let (_, topo) = classify(&input);
        assert!(
            topo.diagnostics
                .iter()
                .any(|d| matches!(d, Diagnostic::BrokenExplicitChain { a: 0, b: 5 }))
        );
    }

    #[test]
    fn half_model_root_is_marked_symmetric() {
        let input = flat_wing(3);
        let mut level = MeshLevel::from_input(&input).unwrap();
        let components = ComponentTable::new();
        let config = KuttaConfig::default();
        let topo = SharpEdgeClassifier::new(&components, &config, [1.0, 0.0, 0.0])
            .unwrap()
            .with_symmetry(Some(SymmetryPlane::default()))
            .classify(&mut level, &input.trailing_edge_chains, &[])
            .unwrap();
        assert_eq!(topo.chains.len(), 1);

        let on_root = |e: &crate::topology::edge::Edge| {
            e.nodes.iter().all(|n| level.node(*n).xyz[1] == 0.0)
        };
        let flagged: Vec<bool> = level.edges().iter().map(|e| e.flags.symmetry).collect();
        assert_eq!(flagged.iter().filter(|&&f| f).count(), 2);
        for (e, edge) in level.edges().iter().enumerate() {
            assert_eq!(flagged[e], edge.is_open() && on_root(edge), "edge {e}");
        }
        for node in level.nodes() {
            assert_eq!(node.flags.symmetry_plane, node.xyz[1] == 0.0);
        }
        assert!(level.edges().iter().filter(|e| e.flags.symmetry).all(|e| e.flags.is_protected()));
    }

    #[test]
    fn mirrored_model_has_no_symmetry_edges() {
        let input = symmetric_wing(2);
        let mut level = MeshLevel::from_input(&input).unwrap();
        let components = ComponentTable::new();
        let config = KuttaConfig::default();
        SharpEdgeClassifier::new(&components, &config, [1.0, 0.0, 0.0])
            .unwrap()
            .with_symmetry(Some(SymmetryPlane::default()))
            .classify(&mut level, &input.trailing_edge_chains, &[])
            .unwrap();
        assert!(level.edges().iter().all(|e| !e.flags.symmetry));
        assert_eq!(level.nodes().iter().filter(|n| n.flags.symmetry_plane).count(), 3);
    }
}
