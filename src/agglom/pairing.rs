//! Triangle pairing.
//!
//! Triangulated surfaces coarsen better when the first level turns triangle
//! pairs into quads. Each free triangle, in ascending order, pairs with the
//! neighbouring free triangle that forms the best-shaped convex quad across an
//! unprotected edge. Triangles without an acceptable partner stay single.

use log::debug;

use crate::config::AgglomerationConfig;
use crate::geometry::quality::{loop_quality, quad_is_acceptable};
use crate::topology::coarsen::MergeAssignment;
use crate::topology::ids::{LoopId, NodeId};
use crate::topology::mesh_level::MeshLevel;

/// Pair adjacent triangles of `level` into quads.
pub fn pair_triangles(level: &MeshLevel, config: &AgglomerationConfig) -> MergeAssignment {
    let n = level.num_loops();
    let mut label: Vec<Option<usize>> = vec![None; n];
    let is_triangle = |l: LoopId| level.get_loop(l).len() == 3;
    let mut pairs = 0;

    for i in 0..n {
        let t = LoopId::new(i);
        if label[i].is_some() || !is_triangle(t) {
            continue;
        }
        let mut best: Option<(f64, LoopId)> = None;
        for (e, m) in level.loop_neighbors(t) {
            let edge = level.edge(e);
            if m == t
                || label[m.idx()].is_some()
                || !is_triangle(m)
                || edge.flags.is_protected()
                || level.get_loop(t).tags != level.get_loop(m).tags
            {
                continue;
            }
            let Some(quad) = quad_across(level, t, m, edge.nodes) else {
                continue;
            };
            let verts = quad.map(|v| level.node(v).xyz);
            if !quad_is_acceptable(verts, config.pair_max_turn_deg) {
                continue;
            }
            let score = loop_quality(&verts).max_angle_deg;
            let better = match best {
                None => true,
                Some((s, bm)) => score < s || (score == s && m < bm),
            };
            if better {
                best = Some((score, m));
            }
        }
        label[i] = Some(i);
        if let Some((_, m)) = best {
            label[m.idx()] = Some(i);
            pairs += 1;
        }
    }
    debug!("paired {pairs} triangle pairs on level {}", level.level());

    let labels: Vec<usize> = label
        .iter()
        .enumerate()
        .map(|(i, l)| l.unwrap_or(i))
        .collect();
    MergeAssignment::from_labels(&labels)
}

/// The quad `[p, x, q, y]` formed by triangles `t = (p, x, y)` and `m`
/// across the shared edge `{x, y}`, in `t`'s winding.
fn quad_across(level: &MeshLevel, t: LoopId, m: LoopId, shared: [NodeId; 2]) -> Option<[NodeId; 4]> {
    let tn = &level.get_loop(t).nodes;
    let mn = &level.get_loop(m).nodes;
    let pi = tn.iter().position(|v| !shared.contains(v))?;
    let p = tn[pi];
    let x = tn[(pi + 1) % 3];
    let y = tn[(pi + 2) % 3];
    let q = *mn.iter().find(|v| !shared.contains(v))?;
    // `m` must run y -> x for a consistently oriented quad.
    if !level.get_loop(m).traverses(y, x) {
        return None;
    }
    Some([p, x, q, y])
}
