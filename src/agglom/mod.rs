//! Multigrid loop agglomeration.
//!
//! The [`Agglomerator`] decides which loops of one level merge into each
//! coarse loop of the next. It runs in three phases over a shared group
//! state:
//!
//! 1. front propagation from the protected edges (star, nearest-neighbour
//!    and singleton merges),
//! 2. cleanup passes (small, fan, sliver and lone groups),
//! 3. labelling, mirrored across the symmetry plane if one is set.
//!
//! The result is a [`MergeAssignment`] for the
//! [`CoarseMeshBuilder`](crate::topology::coarsen::CoarseMeshBuilder).
//! The same level and configuration always give the same assignment.

mod cleanup;
mod front;
mod pairing;
mod state;
mod symmetry;

pub use pairing::pair_triangles;

use log::debug;

use crate::config::{AgglomerationConfig, SymmetryPlane};
use crate::mesh_error::MeshAgglomError;
use crate::topology::coarsen::MergeAssignment;
use crate::topology::mesh_level::MeshLevel;

use front::Front;
use state::Groups;

/// Computes the merge assignment for one level.
#[derive(Clone, Debug)]
pub struct Agglomerator<'a> {
    level: &'a MeshLevel,
    config: &'a AgglomerationConfig,
    symmetry: Option<SymmetryPlane>,
}

impl<'a> Agglomerator<'a> {
    pub fn new(level: &'a MeshLevel, config: &'a AgglomerationConfig) -> Self {
        Self {
            level,
            config,
            symmetry: None,
        }
    }

    /// Agglomerate one half and mirror the result onto the other.
    pub fn with_symmetry(mut self, plane: Option<SymmetryPlane>) -> Self {
        self.symmetry = plane;
        self
    }

    /// Run all phases.
    pub fn run(&self) -> Result<MergeAssignment, MeshAgglomError> {
        let level = self.level;
        let (region, mirror) = match &self.symmetry {
            Some(plane) => {
                let (region, mirror) = symmetry::mirror_regions(level, plane)?;
                (region, Some(mirror))
            }
            None => (vec![0; level.num_loops()], None),
        };

        let mut groups = Groups::new(level, region);
        Front::new(&mut groups, self.config).run();
        let after_front = groups.live().len();
        let merges = cleanup::run_all(&mut groups, self.config);

        let assignment = match &mirror {
            Some(mirror) => symmetry::mirrored_labels(&groups, mirror)?,
            None => groups.labels(|_| None)?,
        };
        debug!(
            "level {}: {} loops -> {} groups after front, {} cleanup merges, {} coarse loops",
            level.level(),
            level.num_loops(),
            after_front,
            merges,
            assignment.num_coarse()
        );
        Ok(assignment)
    }

    /// Triangle pairing on this level.
    pub fn pair_triangles(&self) -> MergeAssignment {
        pair_triangles(self.level, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_generation::{flat_wing, square_patch};
    use crate::topology::coarsen::CoarseMeshBuilder;

    #[test]
    fn assignment_is_deterministic() {
        let level = MeshLevel::from_input(&flat_wing(8)).unwrap();
        let config = AgglomerationConfig::default();
        let a = Agglomerator::new(&level, &config).run().unwrap();
        let b = Agglomerator::new(&level, &config).run().unwrap();
        assert_eq!(a, b);
        assert!(a.num_coarse() < level.num_loops());
    }

    #[test]
    fn assignment_builds_a_coarse_level() {
        let level = MeshLevel::from_input(&flat_wing(8)).unwrap();
        let config = AgglomerationConfig::default();
        let assignment = Agglomerator::new(&level, &config).run().unwrap();
        let coarse = CoarseMeshBuilder::new(&level).build(&assignment).unwrap();
        assert_eq!(coarse.level.num_loops(), assignment.num_coarse());
        assert!((coarse.level.total_area() - level.total_area()).abs() < 1e-9);
    }

    #[test]
    fn star_patch_collapses_to_one_loop() {
        let level = MeshLevel::from_input(&square_patch()).unwrap();
        let config = AgglomerationConfig::default();
        let assignment = Agglomerator::new(&level, &config).run().unwrap();
        assert_eq!(assignment.num_coarse(), 1);
    }
}
