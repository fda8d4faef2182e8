//! Local shape tests used by the sharp-edge classifier.

use crate::geometry::metrics::{EPS, add, angle_between_deg, dot, norm, normalized, sub};
use crate::topology::ids::{EdgeId, NodeId};
use crate::topology::mesh_level::MeshLevel;

/// Angle between the normals of the two loops of `e`, `None` for open
/// edges or degenerate normals.
pub fn dihedral_deg(level: &MeshLevel, e: EdgeId) -> Option<f64> {
    let edge = level.edge(e);
    if edge.is_open() {
        return None;
    }
    let n1 = level.get_loop(edge.loops[0]).geometry.normal;
    let n2 = level.get_loop(edge.loops[1]).geometry.normal;
    angle_between_deg(n1, n2)
}

/// Sum of the two loop normals of `e`.
pub fn merged_normal(level: &MeshLevel, e: EdgeId) -> [f64; 3] {
    let edge = level.edge(e);
    add(
        level.get_loop(edge.loops[0]).geometry.normal,
        level.get_loop(edge.loops[1]).geometry.normal,
    )
}

/// `true` if the surface folds away from the first loop's normal at `e`,
/// i.e. a node of the second loop lies behind the first loop's plane.
pub fn folds_inward(level: &MeshLevel, e: EdgeId) -> bool {
    let edge = level.edge(e);
    let n1 = level.get_loop(edge.loops[0]).geometry.normal;
    let base = level.node(edge.nodes[0]).xyz;
    level
        .get_loop(edge.loops[1])
        .nodes
        .iter()
        .find(|n| !edge.has_node(**n))
        .is_some_and(|&p| dot(sub(level.node(p).xyz, base), n1) < 0.0)
}

/// `true` if the surface is locally convex at `n`.
///
/// Incident loop centroids must all lie strictly below the plane through `n`
/// with the averaged loop normal; a node with two incident loops always
/// counts as convex.
pub fn is_convex_at(level: &MeshLevel, n: NodeId) -> bool {
    let loops = level.loops_of_node(n);
    if loops.len() <= 2 {
        return true;
    }
    let sum = loops
        .iter()
        .fold([0.0; 3], |acc, l| add(acc, level.get_loop(*l).geometry.normal));
    let Some(avg) = normalized(sum) else {
        return true;
    };
    let p = level.node(n).xyz;
    loops.iter().all(|l| {
        let to_centroid = sub(level.get_loop(*l).geometry.centroid, p);
        let len = norm(to_centroid);
        len <= EPS || dot(to_centroid, avg) <= 1e-9 * len
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_generation::{body_of_revolution, square_patch};

    #[test]
    fn flat_patch_is_convex_everywhere() {
        let level = MeshLevel::from_input(&square_patch()).unwrap();
        for i in 0..level.num_nodes() {
            assert!(is_convex_at(&level, NodeId::new(i)));
        }
        for e in 0..level.num_edges() {
            let d = dihedral_deg(&level, EdgeId::new(e));
            assert!(d.is_none_or(|d| d < 1e-6));
        }
    }

    #[test]
    fn closed_body_is_convex() {
        let level = MeshLevel::from_input(&body_of_revolution(12, 8)).unwrap();
        for i in 0..level.num_nodes() {
            assert!(is_convex_at(&level, NodeId::new(i)), "node {i}");
        }
        for e in (0..level.num_edges()).map(EdgeId::new) {
            if dihedral_deg(&level, e).is_some_and(|d| d > 1e-3) {
                assert!(folds_inward(&level, e));
            }
        }
    }
}
