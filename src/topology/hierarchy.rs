//! The multigrid hierarchy.
//!
//! [`MeshHierarchy::build`] coarsens level 0 repeatedly: agglomerate, build,
//! link. It stops at the configured depth, when a step no longer reduces the
//! loop count enough, or when the coarse mesh builder rejects an assignment
//! (the hierarchy is then truncated at the last good level).
//!
//! After construction the hierarchy only changes through
//! [`update_node_positions`](MeshHierarchy::update_node_positions), which
//! pushes a level-0 deformation through every coarser level.

use log::{debug, info, warn};

use crate::agglom::{Agglomerator, pair_triangles};
use crate::config::{AgglomerationConfig, HierarchyConfig, SymmetryPlane};
use crate::debug_invariants::{DebugInvariants, ensure};
use crate::mesh_error::MeshAgglomError;
use crate::topology::coarsen::{CoarseMeshBuilder, link_levels};
use crate::topology::ids::{EdgeId, NodeId};
use crate::topology::mesh_level::MeshLevel;

/// Monotone counter identifying a geometry state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeometryVersion(pub u64);

impl GeometryVersion {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Levels `0..L`, finest first, linked by correspondence fields.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshHierarchy {
    levels: Vec<MeshLevel>,
    synced: GeometryVersion,
}

impl MeshHierarchy {
    /// Coarsen `finest` until a stopping criterion is met.
    pub fn build(
        finest: MeshLevel,
        hierarchy: &HierarchyConfig,
        agglomeration: &AgglomerationConfig,
        symmetry: Option<SymmetryPlane>,
    ) -> Result<Self, MeshAgglomError> {
        let mut levels = vec![finest];
        while levels.len() < hierarchy.max_levels.max(1) {
            let k = levels.len() - 1;
            let fine = &levels[k];
            if fine.num_loops() <= hierarchy.min_loops {
                debug!("level {k} has {} loops; stopping", fine.num_loops());
                break;
            }

            let assignment = if k == 0 && hierarchy.pair_triangles_first && symmetry.is_none() {
                pair_triangles(fine, agglomeration)
            } else {
                Agglomerator::new(fine, agglomeration)
                    .with_symmetry(symmetry)
                    .run()?
            };
            let kept = assignment.num_coarse() as f64 / fine.num_loops() as f64;
            if kept > hierarchy.min_reduction {
                debug!(
                    "level {k}: coarsening keeps {:.0}% of loops; stopping",
                    kept * 100.0
                );
                break;
            }

            let built = CoarseMeshBuilder::new(fine)
                .colinear_tolerance(agglomeration.colinear_angle_deg)
                .build(&assignment);
            let coarse = match built {
                Ok(coarse) => coarse,
                Err(
                    e @ (MeshAgglomError::UnderConstrained { .. }
                    | MeshAgglomError::InvalidAssignment(_)),
                ) => {
                    warn!("hierarchy truncated after level {k}: {e}");
                    break;
                }
                Err(e) => return Err(e),
            };
            debug!(
                "level {}: {} nodes, {} edges, {} loops, {} kutta nodes",
                k + 1,
                coarse.level.num_nodes(),
                coarse.level.num_edges(),
                coarse.level.num_loops(),
                coarse.level.kutta_nodes().len()
            );
            link_levels(&mut levels[k], &coarse.correspondence);
            levels.push(coarse.level);
        }

        let hierarchy = Self {
            levels,
            synced: GeometryVersion::default(),
        };
        info!(
            "built {} levels ({} -> {} loops)",
            hierarchy.num_levels(),
            hierarchy.finest().num_loops(),
            hierarchy.coarsest().num_loops()
        );
        crate::debug_invariants!(hierarchy.validate_invariants(), "MeshHierarchy::build");
        Ok(hierarchy)
    }

    /// A hierarchy holding only `finest`.
    pub fn single(finest: MeshLevel) -> Self {
        Self {
            levels: vec![finest],
            synced: GeometryVersion::default(),
        }
    }

    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn levels(&self) -> &[MeshLevel] {
        &self.levels
    }

    pub fn level(&self, k: usize) -> Option<&MeshLevel> {
        self.levels.get(k)
    }

    #[inline]
    pub fn finest(&self) -> &MeshLevel {
        &self.levels[0]
    }

    #[inline]
    pub fn coarsest(&self) -> &MeshLevel {
        &self.levels[self.levels.len() - 1]
    }

    /// Version of the last geometry pushed through the hierarchy.
    #[inline]
    pub fn synced_version(&self) -> GeometryVersion {
        self.synced
    }

    /// Move level-0 nodes and refresh every level.
    ///
    /// Returns `Ok(false)` without touching anything if `version` is not
    /// newer than the last synchronized version.
    pub fn update_node_positions(
        &mut self,
        moves: &[(NodeId, [f64; 3])],
        version: GeometryVersion,
    ) -> Result<bool, MeshAgglomError> {
        if version <= self.synced {
            debug!("geometry version {} already synchronized", version.0);
            return Ok(false);
        }
        let mut delta = self.levels[0].update_node_positions(moves)?;
        for k in 1..self.levels.len() {
            if delta.is_empty() {
                break;
            }
            let (finer, coarser) = self.levels.split_at_mut(k);
            delta = coarser[0].refresh_from_finer(&finer[k - 1], &delta)?;
        }
        self.synced = version;
        Ok(true)
    }

    /// Area-weighted average of a per-loop field from level `k` onto `k + 1`.
    pub fn restrict_loop_field(&self, k: usize, values: &[f64]) -> Result<Vec<f64>, MeshAgglomError> {
        let (fine, coarse) = self.pair(k)?;
        check_len(fine, values)?;
        let mut out = vec![0.0; coarse.num_loops()];
        for (c, lp) in coarse.loops().iter().enumerate() {
            let mut sum = 0.0;
            let mut weight = 0.0;
            for &f in &lp.fine_loops {
                let a = fine.get_loop(f).geometry.area;
                sum += a * values[f.idx()];
                weight += a;
            }
            out[c] = if weight > 0.0 {
                sum / weight
            } else {
                let k = lp.fine_loops.len().max(1) as f64;
                lp.fine_loops.iter().map(|f| values[f.idx()]).sum::<f64>() / k
            };
        }
        Ok(out)
    }

    /// Inject a per-loop field from level `k + 1` back onto level `k`.
    pub fn prolong_loop_field(&self, k: usize, values: &[f64]) -> Result<Vec<f64>, MeshAgglomError> {
        let (fine, coarse) = self.pair(k)?;
        check_len(coarse, values)?;
        fine.loops()
            .iter()
            .enumerate()
            .map(|(f, lp)| {
                lp.coarse_loop.map(|c| values[c.idx()]).ok_or_else(|| {
                    MeshAgglomError::InvariantViolation(format!(
                        "loop {f} on level {k} has no coarse loop"
                    ))
                })
            })
            .collect()
    }

    fn pair(&self, k: usize) -> Result<(&MeshLevel, &MeshLevel), MeshAgglomError> {
        match (self.levels.get(k), self.levels.get(k + 1)) {
            (Some(f), Some(c)) => Ok((f, c)),
            _ => Err(MeshAgglomError::InvalidAssignment(format!(
                "no level pair ({k}, {}) in a hierarchy of {} levels",
                k + 1,
                self.levels.len()
            ))),
        }
    }

    pub(crate) fn finest_mut(&mut self) -> &mut MeshLevel {
        &mut self.levels[0]
    }
}

fn check_len(level: &MeshLevel, values: &[f64]) -> Result<(), MeshAgglomError> {
    if values.len() != level.num_loops() {
        return Err(MeshAgglomError::InvalidAssignment(format!(
            "field has {} values but level {} has {} loops",
            values.len(),
            level.level(),
            level.num_loops()
        )));
    }
    Ok(())
}

impl DebugInvariants for MeshHierarchy {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "MeshHierarchy");
    }

    fn validate_invariants(&self) -> Result<(), MeshAgglomError> {
        for level in &self.levels {
            level.validate_invariants()?;
        }
        for pair in self.levels.windows(2) {
            let (fine, coarse) = (&pair[0], &pair[1]);
            for (c, lp) in coarse.loops().iter().enumerate() {
                let sum: f64 = lp.fine_loops.iter().map(|f| fine.get_loop(*f).geometry.area).sum();
                let tol = 1e-9 * sum.abs().max(1.0);
                ensure((sum - lp.geometry.area).abs() <= tol, coarse.level(), || {
                    format!(
                        "loop {c} area {} differs from its fine loops' {sum}",
                        lp.geometry.area
                    )
                })?;
            }
            for (e, edge) in fine.edges().iter().enumerate() {
                let class = edge.flags.classification();
                if class == (false, false, false) {
                    continue;
                }
                let survived = edge
                    .coarse_edge
                    .map(|c| coarse.edge(c).flags.classification() == class);
                ensure(survived == Some(true), fine.level(), || {
                    format!("classified edge {} lost its classification", EdgeId::new(e))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_generation::{body_of_revolution, flat_wing};
    use crate::topology::ids::LoopId;

    fn build(level: MeshLevel) -> MeshHierarchy {
        MeshHierarchy::build(
            level,
            &HierarchyConfig::default(),
            &AgglomerationConfig::default(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn levels_shrink_and_conserve_area() {
        let h = build(MeshLevel::from_input(&body_of_revolution(12, 8)).unwrap());
        assert!(h.num_levels() > 1);
        let area = h.finest().total_area();
        for pair in h.levels().windows(2) {
            assert!(pair[1].num_loops() < pair[0].num_loops());
            assert!((pair[1].total_area() - area).abs() < 1e-9 * area);
        }
        h.validate_invariants().unwrap();
    }

    #[test]
    fn max_levels_bounds_depth() {
        let config = HierarchyConfig {
            max_levels: 2,
            ..Default::default()
        };
        let level = MeshLevel::from_input(&body_of_revolution(12, 8)).unwrap();
        let h = MeshHierarchy::build(level, &config, &AgglomerationConfig::default(), None).unwrap();
        assert_eq!(h.num_levels(), 2);
    }

    #[test]
    fn field_transfer_preserves_constants_and_integrals() {
        let h = build(MeshLevel::from_input(&flat_wing(6)).unwrap());
        let fine = h.finest();
        let ones = vec![1.0; fine.num_loops()];
        let restricted = h.restrict_loop_field(0, &ones).unwrap();
        assert!(restricted.iter().all(|v| (v - 1.0).abs() < 1e-12));

        let ramp: Vec<f64> = (0..fine.num_loops()).map(|i| i as f64).collect();
        let coarse_vals = h.restrict_loop_field(0, &ramp).unwrap();
        let coarse = h.level(1).unwrap();
        let fine_integral: f64 = fine
            .loops()
            .iter()
            .zip(&ramp)
            .map(|(l, v)| l.geometry.area * v)
            .sum();
        let coarse_integral: f64 = coarse
            .loops()
            .iter()
            .zip(&coarse_vals)
            .map(|(l, v)| l.geometry.area * v)
            .sum();
        assert!((fine_integral - coarse_integral).abs() < 1e-9);

        let back = h.prolong_loop_field(0, &coarse_vals).unwrap();
        let c = fine.get_loop(LoopId::new(0)).coarse_loop.unwrap();
        assert_eq!(back[0], coarse_vals[c.idx()]);
        assert!(h.restrict_loop_field(0, &[1.0]).is_err());
        assert!(h.restrict_loop_field(h.num_levels(), &ones).is_err());
    }

    #[test]
    fn deformation_reaches_every_level_once_per_version() {
        let mut h = build(MeshLevel::from_input(&flat_wing(4)).unwrap());
        let n = NodeId::new(0);
        let mut p = h.finest().node(n).xyz;
        p[2] += 0.25;
        let v1 = GeometryVersion::default().next();
        assert!(h.update_node_positions(&[(n, p)], v1).unwrap());
        assert!(!h.update_node_positions(&[(n, [9.0; 3])], v1).unwrap());
        assert_eq!(h.finest().node(n).xyz, p);
        assert_eq!(h.synced_version(), v1);

        let mut fine_node = n;
        for level in &h.levels()[1..] {
            let prev = &h.levels()[level.level() - 1];
            if let Some(c) = prev.node(fine_node).coarse_node {
                assert_eq!(level.node(c).xyz, p);
                fine_node = c;
            } else {
                break;
            }
        }
        for pair in h.levels().windows(2) {
            assert!((pair[1].total_area() - pair[0].total_area()).abs() < 1e-9);
        }
    }
}
