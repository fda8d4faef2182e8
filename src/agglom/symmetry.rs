//! Mirror-symmetric agglomeration.
//!
//! Loops are split into three regions by the plane: loops on the primary side
//! (positive signed distance) are agglomerated normally, loops straddling the
//! plane (their own mirror image) are agglomerated among themselves, and loops
//! on the secondary side are excluded and copy the grouping of their mirror
//! image afterwards.

use log::debug;

use crate::agglom::state::{EXCLUDED, Groups};
use crate::config::SymmetryPlane;
use crate::mesh_error::MeshAgglomError;
use crate::spatial::mirror_map;
use crate::topology::coarsen::MergeAssignment;
use crate::topology::ids::LoopId;
use crate::topology::mesh_level::MeshLevel;

const PRIMARY: u8 = 0;
const ON_PLANE: u8 = 1;

/// Loop regions and the loop mirror map.
pub(crate) fn mirror_regions(
    level: &MeshLevel,
    plane: &SymmetryPlane,
) -> Result<(Vec<u8>, Vec<usize>), MeshAgglomError> {
    let centroids: Vec<[f64; 3]> = level.loops().iter().map(|l| l.geometry.centroid).collect();
    let mirror = mirror_map(&centroids, plane, plane.tolerance)?;
    let mut region = Vec::with_capacity(centroids.len());
    for (l, c) in centroids.iter().enumerate() {
        let r = if mirror[l] == l {
            ON_PLANE
        } else if plane.signed_distance(*c) > 0.0 {
            PRIMARY
        } else {
            EXCLUDED
        };
        region.push(r);
    }
    for (l, &m) in mirror.iter().enumerate() {
        let (a, b) = (LoopId::new(l), LoopId::new(m));
        if level.get_loop(a).tags.kind != level.get_loop(b).tags.kind {
            return Err(MeshAgglomError::InvalidGeometry(format!(
                "mirror loops {a} and {b} have different surface kinds"
            )));
        }
    }
    debug!(
        "symmetric agglomeration: {} primary, {} on-plane loops",
        region.iter().filter(|&&r| r == PRIMARY).count(),
        region.iter().filter(|&&r| r == ON_PLANE).count()
    );
    Ok((region, mirror))
}

/// Labels with every excluded loop copying its mirror's group.
pub(crate) fn mirrored_labels(
    groups: &Groups<'_>,
    mirror: &[usize],
) -> Result<MergeAssignment, MeshAgglomError> {
    let offset = groups.num_groups();
    let assignment = groups.labels(|l| {
        groups
            .owner(LoopId::new(mirror[l.idx()]))
            .map(|g| g + offset)
    })?;
    check_mirrored_tags(groups.level, &assignment, mirror)?;
    Ok(assignment)
}

/// Mirrored groups must still be tag-uniform.
fn check_mirrored_tags(
    level: &MeshLevel,
    assignment: &MergeAssignment,
    mirror: &[usize],
) -> Result<(), MeshAgglomError> {
    for members in assignment.members() {
        let Some((&first, rest)) = members.split_first() else {
            continue;
        };
        let tags = level.get_loop(first).tags;
        if let Some(bad) = rest.iter().find(|l| level.get_loop(**l).tags != tags) {
            return Err(MeshAgglomError::InvalidAssignment(format!(
                "loops {first} and {bad} (mirror of {}) would merge across different tags",
                mirror[bad.idx()]
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agglom::front::Front;
    use crate::config::AgglomerationConfig;
    use crate::mesh_generation::symmetric_wing;

    #[test]
    fn secondary_side_mirrors_primary() {
        let level = MeshLevel::from_input(&symmetric_wing(4)).unwrap();
        let plane = SymmetryPlane::default();
        let (region, mirror) = mirror_regions(&level, &plane).unwrap();
        let mut groups = Groups::new(&level, region);
        Front::new(&mut groups, &AgglomerationConfig::default()).run();
        let assignment = mirrored_labels(&groups, &mirror).unwrap();
        for (l, &m) in mirror.iter().enumerate() {
            let a = assignment.coarse_of(LoopId::new(l));
            let b = assignment.coarse_of(LoopId::new(m));
            // Mirror partners land in distinct coarse loops unless on the plane.
            if l != m {
                assert_ne!(a, b);
            }
        }
        let sizes = |side: f64| {
            let mut s: Vec<usize> = assignment
                .members()
                .iter()
                .filter(|m| level.get_loop(m[0]).geometry.centroid[1] * side > 0.0)
                .map(|m| m.len())
                .collect();
            s.sort_unstable();
            s
        };
        assert_eq!(sizes(1.0), sizes(-1.0));
    }
}
