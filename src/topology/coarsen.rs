//! Coarse mesh construction from a merge assignment.
//!
//! A [`MergeAssignment`] maps every fine loop to the coarse loop that will
//! subsume it. [`CoarseMeshBuilder`] turns it into a complete coarse
//! [`MeshLevel`] together with the fine → coarse [`Correspondence`]:
//!
//! * a fine edge survives if it is open, or if its two loops land in different
//!   coarse loops; a protected edge that would end up inside one coarse loop is
//!   an invalid assignment;
//! * optionally, runs of surviving interior edges through nearly straight
//!   degree-2 nodes are fused into one coarse edge (colinear simplification);
//! * surviving nodes are the end points of coarse edges;
//! * coarse loop perimeters are chained from the directed coarse edges, and a
//!   coarse loop with fewer than three sides is
//!   [`UnderConstrained`](MeshAgglomError::UnderConstrained);
//! * coarse loop geometry is the area-weighted aggregate of its fine loops.
//!
//! The builder never mutates the fine level, so building twice from the same
//! assignment gives identical levels. [`link_levels`] writes the back
//! references into the fine level afterwards.

use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::geometry::bbox::BoundingBox;
use crate::geometry::metrics::{
    EPS, LoopGeometry, add, angle_between_deg, distance, normalized, scale, sub,
};
use crate::mesh_error::MeshAgglomError;
use crate::topology::edge::{Edge, EdgeFlags};
use crate::topology::face_loop::Loop;
use crate::topology::ids::{EdgeId, LoopId, NodeId};
use crate::topology::mesh_level::{KuttaNode, MeshLevel};
use crate::topology::node::Node;

/// Fine loop → coarse loop map with canonical coarse numbering.
///
/// Coarse loops are numbered in order of their lowest fine loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeAssignment {
    coarse_of: Vec<LoopId>,
    num_coarse: usize,
}

impl MergeAssignment {
    /// Canonicalize arbitrary group labels (one per fine loop).
    pub fn from_labels(labels: &[usize]) -> Self {
        let mut renumber: HashMap<usize, usize> = HashMap::new();
        let mut coarse_of = Vec::with_capacity(labels.len());
        for &label in labels {
            let next = renumber.len();
            let c = *renumber.entry(label).or_insert(next);
            coarse_of.push(LoopId::new(c));
        }
        Self {
            coarse_of,
            num_coarse: renumber.len(),
        }
    }

    /// Every fine loop becomes its own coarse loop.
    pub fn identity(num_fine: usize) -> Self {
        Self {
            coarse_of: (0..num_fine).map(LoopId::new).collect(),
            num_coarse: num_fine,
        }
    }

    #[inline]
    pub fn coarse_of(&self, fine: LoopId) -> LoopId {
        self.coarse_of[fine.idx()]
    }

    #[inline]
    pub fn num_fine(&self) -> usize {
        self.coarse_of.len()
    }

    #[inline]
    pub fn num_coarse(&self) -> usize {
        self.num_coarse
    }

    /// Fine loops of each coarse loop, ascending.
    pub fn members(&self) -> Vec<Vec<LoopId>> {
        let mut out = vec![Vec::new(); self.num_coarse];
        for (f, c) in self.coarse_of.iter().enumerate() {
            out[c.idx()].push(LoopId::new(f));
        }
        out
    }

    pub fn as_slice(&self) -> &[LoopId] {
        &self.coarse_of
    }
}

/// Fine → coarse maps produced alongside a coarse level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Correspondence {
    pub nodes: Vec<Option<NodeId>>,
    pub edges: Vec<Option<EdgeId>>,
    pub loops: Vec<LoopId>,
}

/// A freshly built coarse level and its correspondence to the fine level.
#[derive(Clone, Debug, PartialEq)]
pub struct CoarseLevel {
    pub level: MeshLevel,
    pub correspondence: Correspondence,
}

/// Builds one coarse level from a fine level and a merge assignment.
#[derive(Clone, Copy, Debug)]
pub struct CoarseMeshBuilder<'a> {
    fine: &'a MeshLevel,
    colinear_angle_deg: Option<f64>,
}

/// A run of surviving fine edges that becomes one coarse edge.
struct Chain {
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
}

impl<'a> CoarseMeshBuilder<'a> {
    pub fn new(fine: &'a MeshLevel) -> Self {
        Self {
            fine,
            colinear_angle_deg: None,
        }
    }

    /// Fuse interior edges meeting at degree-2 nodes whose turn is at most
    /// `angle_deg`; `None` disables the simplification.
    pub fn colinear_tolerance(mut self, angle_deg: Option<f64>) -> Self {
        self.colinear_angle_deg = angle_deg;
        self
    }

    pub fn build(&self, assignment: &MergeAssignment) -> Result<CoarseLevel, MeshAgglomError> {
        let fine = self.fine;
        if assignment.num_fine() != fine.num_loops() {
            return Err(MeshAgglomError::InvalidAssignment(format!(
                "assignment covers {} loops but level {} has {}",
                assignment.num_fine(),
                fine.level(),
                fine.num_loops()
            )));
        }
        let level_no = fine.level() + 1;
        let nc = assignment.num_coarse();
        let owner = |l: LoopId| assignment.coarse_of(l);

        let survives = self.surviving_edges(assignment)?;
        let mut degree = vec![0usize; fine.num_nodes()];
        for (e, edge) in fine.edges().iter().enumerate() {
            if survives[e] {
                degree[edge.nodes[0].idx()] += 1;
                degree[edge.nodes[1].idx()] += 1;
            }
        }
        let dropped = self.colinear_nodes(assignment, &survives, &degree);

        // Coarse nodes.
        let mut node_map: Vec<Option<NodeId>> = vec![None; fine.num_nodes()];
        let mut nodes = Vec::new();
        for (n, fine_node) in fine.nodes().iter().enumerate() {
            if degree[n] > 0 && !dropped[n] {
                node_map[n] = Some(NodeId::new(nodes.len()));
                nodes.push(Node {
                    xyz: fine_node.xyz,
                    uv: fine_node.uv,
                    component_id: fine_node.component_id,
                    flags: fine_node.flags,
                    fine_node: Some(NodeId::new(n)),
                    coarse_node: None,
                });
            }
        }

        // Coarse edges, numbered by their lowest fine edge.
        let mut edge_map: Vec<Option<EdgeId>> = vec![None; fine.num_edges()];
        let mut chains: Vec<Chain> = Vec::new();
        for e in 0..fine.num_edges() {
            if !survives[e] || edge_map[e].is_some() {
                continue;
            }
            let chain = self.walk_chain(EdgeId::new(e), &survives, &dropped);
            let id = EdgeId::new(chains.len());
            for fe in &chain.edges {
                edge_map[fe.idx()] = Some(id);
            }
            chains.push(chain);
        }

        let mut edges = Vec::with_capacity(chains.len());
        let mut perimeter: Vec<Vec<(NodeId, NodeId, EdgeId)>> = vec![Vec::new(); nc];
        for (ci, chain) in chains.iter().enumerate() {
            let rep = fine.edge(chain.edges[0]);
            let (Some(first), Some(last)) = (
                chain.nodes.first().and_then(|n| node_map[n.idx()]),
                chain.nodes.last().and_then(|n| node_map[n.idx()]),
            ) else {
                return Err(MeshAgglomError::InvariantViolation(format!(
                    "level {level_no}: edge chain starting at fine edge {} has no end node",
                    chain.edges[0]
                )));
            };
            let loops = [owner(rep.loops[0]), owner(rep.loops[1])];
            let flags = chain
                .edges
                .iter()
                .fold(EdgeFlags::default(), |acc, e| acc.union(&fine.edge(*e).flags));
            let mut merged = chain.edges.clone();
            merged.sort_unstable();
            let id = EdgeId::new(ci);
            edges.push(Edge {
                nodes: [first, last],
                loops,
                flags,
                component_id: rep.component_id,
                length: distance(nodes[first.idx()].xyz, nodes[last.idx()].xyz),
                fine_edge: Some(chain.edges[0]),
                coarse_edge: None,
                merged_fine_edges: merged,
            });

            let sides: &[usize] = if loops[0] == loops[1] { &[0] } else { &[0, 1] };
            for &k in sides {
                let fine_loop = fine.get_loop(rep.loops[k]);
                let forward = fine_loop.traverses(rep.nodes[0], rep.nodes[1]);
                let step = if forward { (first, last, id) } else { (last, first, id) };
                perimeter[loops[k].idx()].push(step);
            }
        }

        // Coarse loops.
        let members = assignment.members();
        let mut loops = Vec::with_capacity(nc);
        for (c, fine_loops) in members.into_iter().enumerate() {
            let (ring, ring_edges) = order_perimeter(level_no, c, &perimeter[c])?;
            let geometry = aggregate_geometry(fine, &fine_loops)?;
            let tags = fine.get_loop(fine_loops[0]).tags;
            loops.push(Loop {
                nodes: ring,
                edges: ring_edges,
                geometry,
                tags,
                fine_loops,
                coarse_loop: None,
            });
        }

        let kutta_nodes = self.surviving_kutta_nodes(assignment, &node_map);
        let level = MeshLevel::from_parts(level_no, nodes, edges, loops, kutta_nodes);
        crate::debug_invariants!(
            crate::debug_invariants::DebugInvariants::validate_invariants(&level),
            "CoarseMeshBuilder::build"
        );
        Ok(CoarseLevel {
            level,
            correspondence: Correspondence {
                nodes: node_map,
                edges: edge_map,
                loops: assignment.as_slice().to_vec(),
            },
        })
    }

    fn surviving_edges(&self, assignment: &MergeAssignment) -> Result<Vec<bool>, MeshAgglomError> {
        let mut survives = vec![false; self.fine.num_edges()];
        for (i, e) in self.fine.edges().iter().enumerate() {
            let a = assignment.coarse_of(e.loops[0]);
            let b = assignment.coarse_of(e.loops[1]);
            if e.is_open() || a != b {
                survives[i] = true;
            } else if e.flags.is_protected() {
                return Err(MeshAgglomError::InvalidAssignment(format!(
                    "protected edge {i} would fall inside coarse loop {a}"
                )));
            }
        }
        Ok(survives)
    }

    /// Degree-2 nodes that can be fused away without bending a run of
    /// interior edges by more than the colinear tolerance.
    ///
    /// Each maximal run of candidate nodes between two kept nodes is walked
    /// from its first kept node. A candidate is dropped only while every node
    /// of the fused span stays within the tolerance of the span's chord, and
    /// only while both neighbouring coarse loops keep more than three sides.
    fn colinear_nodes(
        &self,
        assignment: &MergeAssignment,
        survives: &[bool],
        degree: &[usize],
    ) -> Vec<bool> {
        let fine = self.fine;
        let mut dropped = vec![false; fine.num_nodes()];
        let Some(tol) = self.colinear_angle_deg else {
            return dropped;
        };
        let mut sides = vec![0usize; assignment.num_coarse()];
        for (i, e) in fine.edges().iter().enumerate() {
            if survives[i] {
                sides[assignment.coarse_of(e.loops[0]).idx()] += 1;
                if !e.is_open() {
                    sides[assignment.coarse_of(e.loops[1]).idx()] += 1;
                }
            }
        }
        let pair = |e: &Edge| {
            let a = assignment.coarse_of(e.loops[0]);
            let b = assignment.coarse_of(e.loops[1]);
            if a <= b { (a, b) } else { (b, a) }
        };

        let mut candidate: Vec<Option<(LoopId, LoopId)>> = vec![None; fine.num_nodes()];
        for n in 0..fine.num_nodes() {
            if degree[n] != 2 {
                continue;
            }
            let node = NodeId::new(n);
            let Some([e1, e2]) = self.surviving_pair(node, survives) else {
                continue;
            };
            let (e1, e2) = (fine.edge(e1), fine.edge(e2));
            if e1.is_open() || e2.is_open() || e1.flags.is_protected() || e2.flags.is_protected() {
                continue;
            }
            if pair(e1) != pair(e2) {
                continue;
            }
            let p = fine.node(node).xyz;
            let d1 = sub(fine.node(e1.other_node(node)).xyz, p);
            let d2 = sub(fine.node(e2.other_node(node)).xyz, p);
            if angle_between_deg(d1, d2).is_none_or(|a| a >= 180.0 - tol) {
                candidate[n] = Some(pair(e1));
            }
        }

        let mut visited = vec![false; fine.num_nodes()];
        for n in 0..fine.num_nodes() {
            if candidate[n].is_none() || visited[n] {
                continue;
            }
            let run = self.candidate_run(NodeId::new(n), &candidate, survives);
            for v in &run {
                visited[v.idx()] = true;
            }
            let points: Vec<[f64; 3]> = run.iter().map(|v| fine.node(*v).xyz).collect();
            let mut anchor = 0;
            for i in 1..run.len().saturating_sub(1) {
                let Some((ca, cb)) = candidate[run[i].idx()] else {
                    anchor = i;
                    continue;
                };
                let fits = sides[ca.idx()] > 3
                    && sides[cb.idx()] > 3
                    && within_chord(&points[anchor..=i + 1], tol);
                if fits {
                    dropped[run[i].idx()] = true;
                    sides[ca.idx()] -= 1;
                    sides[cb.idx()] -= 1;
                } else {
                    anchor = i;
                }
            }
        }
        dropped
    }

    /// The two surviving edges at a degree-2 node.
    fn surviving_pair(&self, node: NodeId, survives: &[bool]) -> Option<[EdgeId; 2]> {
        let mut it = self
            .fine
            .edges_of_node(node)
            .iter()
            .copied()
            .filter(|e| survives[e.idx()]);
        match (it.next(), it.next(), it.next()) {
            (Some(a), Some(b), None) => Some([a, b]),
            _ => None,
        }
    }

    /// Nodes of the maximal candidate run through `start`, bracketed by the
    /// kept nodes at both ends. A closed ring of candidates starts and ends
    /// at `start`, which then stays.
    fn candidate_run(
        &self,
        start: NodeId,
        candidate: &[Option<(LoopId, LoopId)>],
        survives: &[bool],
    ) -> Vec<NodeId> {
        let fine = self.fine;
        let Some([first, second]) = self.surviving_pair(start, survives) else {
            return vec![start];
        };
        let walk = |from_edge: EdgeId| {
            let mut out = Vec::new();
            let (mut cur, mut via) = (start, from_edge);
            loop {
                let next = fine.edge(via).other_node(cur);
                out.push(next);
                if next == start || candidate[next.idx()].is_none() {
                    break;
                }
                let Some([a, b]) = self.surviving_pair(next, survives) else {
                    break;
                };
                via = if a == via { b } else { a };
                cur = next;
            }
            out
        };
        let mut back = walk(first);
        if back.last() == Some(&start) {
            back.insert(0, start);
            // The ring closes on `start`; keep it as the anchor.
            return back;
        }
        back.reverse();
        back.push(start);
        back.extend(walk(second));
        back
    }

    /// Extend `seed` through dropped nodes in both directions.
    fn walk_chain(&self, seed: EdgeId, survives: &[bool], dropped: &[bool]) -> Chain {
        let fine = self.fine;
        let edge = fine.edge(seed);
        let mut nodes: VecDeque<NodeId> = VecDeque::from([edge.nodes[0], edge.nodes[1]]);
        let mut edges: VecDeque<EdgeId> = VecDeque::from([seed]);
        let next_edge = |n: NodeId, current: EdgeId| {
            fine.edges_of_node(n)
                .iter()
                .copied()
                .find(|&x| x != current && survives[x.idx()])
        };

        let (mut tail, mut current) = (edge.nodes[1], seed);
        while dropped[tail.idx()] && tail != edge.nodes[0] {
            let Some(next) = next_edge(tail, current) else { break };
            tail = fine.edge(next).other_node(tail);
            current = next;
            nodes.push_back(tail);
            edges.push_back(next);
        }
        let (mut head, mut current) = (edge.nodes[0], seed);
        while dropped[head.idx()] && head != tail {
            let Some(next) = next_edge(head, current) else { break };
            head = fine.edge(next).other_node(head);
            current = next;
            nodes.push_front(head);
            edges.push_front(next);
        }
        // The seed stays first so the chain is represented by its lowest edge.
        let seed_pos = edges.iter().position(|&e| e == seed).unwrap_or(0);
        let mut edges: Vec<EdgeId> = edges.into();
        edges.rotate_left(seed_pos);
        Chain {
            nodes: nodes.into(),
            edges,
        }
    }

    fn surviving_kutta_nodes(
        &self,
        assignment: &MergeAssignment,
        node_map: &[Option<NodeId>],
    ) -> Vec<KuttaNode> {
        let fine = self.fine;
        let mut out = Vec::new();
        for k in fine.kutta_nodes() {
            let Some(coarse) = node_map[k.node.idx()] else {
                continue;
            };
            let te: Vec<&Edge> = fine
                .edges_of_node(k.node)
                .iter()
                .map(|&e| fine.edge(e))
                .filter(|e| e.flags.trailing_edge)
                .collect();
            if let [e1, e2] = te[..] {
                let side = |e: &Edge| {
                    let mut s = [assignment.coarse_of(e.loops[0]), assignment.coarse_of(e.loops[1])];
                    s.sort_unstable();
                    s
                };
                if side(e1) == side(e2) {
                    continue;
                }
            }
            out.push(KuttaNode {
                node: coarse,
                ..k.clone()
            });
        }
        out
    }
}

/// Whether every interior point of `span` lies within `tol_deg` of the chord
/// from its first to its last point, seen from both chord ends.
fn within_chord(span: &[[f64; 3]], tol_deg: f64) -> bool {
    let (Some(&a), Some(&b)) = (span.first(), span.last()) else {
        return false;
    };
    let (ab, ba) = (sub(b, a), sub(a, b));
    if angle_between_deg(ab, ba).is_none() {
        return false;
    }
    span[1..span.len() - 1].iter().all(|&p| {
        angle_between_deg(sub(p, a), ab).is_none_or(|t| t <= tol_deg)
            && angle_between_deg(sub(p, b), ba).is_none_or(|t| t <= tol_deg)
    })
}

/// Chain directed perimeter steps of coarse loop `c` into one cycle.
fn order_perimeter(
    level: usize,
    c: usize,
    steps: &[(NodeId, NodeId, EdgeId)],
) -> Result<(Vec<NodeId>, Vec<EdgeId>), MeshAgglomError> {
    if steps.len() < 3 {
        return Err(MeshAgglomError::UnderConstrained {
            level,
            coarse_loop: c,
            edges: steps.len(),
        });
    }
    let mut from: HashMap<NodeId, usize> = HashMap::with_capacity(steps.len());
    for (i, &(a, _, _)) in steps.iter().enumerate() {
        if from.insert(a, i).is_some() {
            return Err(MeshAgglomError::InvalidAssignment(format!(
                "coarse loop {c} on level {level} is pinched at node {a}"
            )));
        }
    }
    let start = (0..steps.len())
        .min_by_key(|&i| steps[i].2)
        .unwrap_or(0);
    let mut nodes = Vec::with_capacity(steps.len());
    let mut edges = Vec::with_capacity(steps.len());
    let mut i = start;
    loop {
        let (a, b, e) = steps[i];
        nodes.push(a);
        edges.push(e);
        match from.get(&b) {
            Some(&next) if next == start => break,
            Some(&next) if nodes.len() < steps.len() => i = next,
            _ => {
                return Err(MeshAgglomError::InvalidAssignment(format!(
                    "perimeter of coarse loop {c} on level {level} is not a single cycle"
                )));
            }
        }
    }
    if nodes.len() != steps.len() {
        return Err(MeshAgglomError::InvalidAssignment(format!(
            "perimeter of coarse loop {c} on level {level} is not a single cycle"
        )));
    }
    Ok((nodes, edges))
}

/// Area-weighted geometry of a set of fine loops.
///
/// Area is the exact sum. Normal, centroid, UV centroid and reference length
/// are area-weighted; the normal is re-normalized. Bounding boxes are united.
pub fn aggregate_geometry(
    fine: &MeshLevel,
    members: &[LoopId],
) -> Result<LoopGeometry, MeshAgglomError> {
    if members.is_empty() {
        return Err(MeshAgglomError::InvalidAssignment(
            "coarse loop without fine loops".into(),
        ));
    }
    let mut area = 0.0;
    let mut normal = [0.0; 3];
    let mut centroid = [0.0; 3];
    let mut uv = [0.0; 2];
    let mut ref_length = 0.0;
    let mut bbox = BoundingBox::empty();
    for &m in members {
        let g = &fine.get_loop(m).geometry;
        area += g.area;
        normal = add(normal, scale(g.normal, g.area));
        centroid = add(centroid, scale(g.centroid, g.area));
        uv[0] += g.uv_centroid[0] * g.area;
        uv[1] += g.uv_centroid[1] * g.area;
        ref_length += g.ref_length * g.area;
        bbox.expand(&g.bbox);
    }
    if area > EPS {
        centroid = scale(centroid, 1.0 / area);
        uv = [uv[0] / area, uv[1] / area];
        ref_length /= area;
    } else {
        // All members degenerate: plain averages.
        let k = members.len() as f64;
        centroid = [0.0; 3];
        uv = [0.0; 2];
        ref_length = 0.0;
        normal = [0.0; 3];
        for &m in members {
            let g = &fine.get_loop(m).geometry;
            centroid = add(centroid, scale(g.centroid, 1.0 / k));
            uv[0] += g.uv_centroid[0] / k;
            uv[1] += g.uv_centroid[1] / k;
            ref_length += g.ref_length / k;
            normal = add(normal, g.normal);
        }
    }
    Ok(LoopGeometry {
        normal: normalized(normal).unwrap_or([0.0; 3]),
        area,
        centroid,
        uv_centroid: uv,
        ref_length,
        bbox,
    })
}

/// Write coarse back-references into the fine level.
pub fn link_levels(fine: &mut MeshLevel, correspondence: &Correspondence) {
    for (node, c) in fine.nodes_mut().iter_mut().zip(&correspondence.nodes) {
        node.coarse_node = *c;
    }
    for (edge, c) in fine.edges_mut().iter_mut().zip(&correspondence.edges) {
        edge.coarse_edge = *c;
    }
    for (lp, c) in fine.loops_mut().iter_mut().zip(&correspondence.loops) {
        lp.coarse_loop = Some(*c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;
    use crate::topology::face_loop::LoopTags;
    use crate::topology::input::{LoopInput, SurfaceMeshInput};

    /// 3 x 1 strip of unit quads.
    fn strip() -> MeshLevel {
        let mut nodes = Vec::new();
        for j in 0..2 {
            for i in 0..4 {
                nodes.push([i as f64, j as f64, 0.0]);
            }
        }
        let loops = (0..3)
            .map(|i| LoopInput::new(vec![i, i + 1, i + 5, i + 4], LoopTags::default()))
            .collect();
        MeshLevel::from_input(&SurfaceMeshInput {
            nodes,
            loops,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn labels_are_canonicalized() {
        let a = MergeAssignment::from_labels(&[7, 7, 3, 9, 3]);
        assert_eq!(a.num_coarse(), 3);
        assert_eq!(
            a.as_slice(),
            &[0, 0, 1, 2, 1].map(LoopId::new)
        );
        assert_eq!(a.members()[1], vec![LoopId::new(2), LoopId::new(4)]);
    }

    #[test]
    fn merging_a_strip_conserves_area() {
        let fine = strip();
        let assignment = MergeAssignment::from_labels(&[0, 0, 1]);
        let coarse = CoarseMeshBuilder::new(&fine).build(&assignment).unwrap();
        let level = &coarse.level;
        assert_eq!(level.level(), 1);
        assert_eq!(level.num_loops(), 2);
        assert!((level.get_loop(LoopId::new(0)).geometry.area - 2.0).abs() < 1e-12);
        assert!((level.total_area() - fine.total_area()).abs() < 1e-12);
        // Interior edge 1-5 disappears, nodes 1 and 5 keep degree 2.
        assert_eq!(level.num_edges(), fine.num_edges() - 1);
        assert_eq!(level.get_loop(LoopId::new(0)).len(), 6);
        level.validate_invariants().unwrap();
    }

    #[test]
    fn colinear_boundary_nodes_stay_but_interior_runs_fuse() {
        // Boundary nodes are on protected edges and are never dropped.
        let fine = strip();
        let assignment = MergeAssignment::from_labels(&[0, 0, 1]);
        let coarse = CoarseMeshBuilder::new(&fine)
            .colinear_tolerance(Some(5.0))
            .build(&assignment)
            .unwrap();
        assert_eq!(coarse.level.get_loop(LoopId::new(0)).len(), 6);
    }

    /// Two loops sharing the polyline `path`. Loop 0 closes through `inner`,
    /// loop 1 runs `outer` and then walks the path backwards.
    fn shared_path(path: &[[f64; 3]], inner: &[[f64; 3]], outer: &[[f64; 3]]) -> MeshLevel {
        let k = path.len();
        let mut nodes = path.to_vec();
        nodes.extend_from_slice(outer);
        nodes.extend_from_slice(inner);
        let mut first: Vec<usize> = (0..k).collect();
        first.extend(k + outer.len()..nodes.len());
        let mut second = vec![0];
        second.extend(k..k + outer.len());
        second.extend((1..k).rev());
        MeshLevel::from_input(&SurfaceMeshInput {
            nodes,
            loops: vec![
                LoopInput::new(first, LoopTags::default()),
                LoopInput::new(second, LoopTags::default()),
            ],
            ..Default::default()
        })
        .unwrap()
    }

    /// Largest angle, seen from either end of a coarse edge, between its
    /// chord and any fine node it absorbed.
    fn max_chord_deviation(fine: &MeshLevel, coarse: &MeshLevel) -> f64 {
        let mut worst: f64 = 0.0;
        for edge in coarse.edges() {
            let a = coarse.node(edge.nodes[0]).xyz;
            let b = coarse.node(edge.nodes[1]).xyz;
            for fe in &edge.merged_fine_edges {
                for n in fine.edge(*fe).nodes {
                    let p = fine.node(n).xyz;
                    if p == a || p == b {
                        continue;
                    }
                    let at_a = angle_between_deg(sub(p, a), sub(b, a)).unwrap();
                    let at_b = angle_between_deg(sub(p, b), sub(a, b)).unwrap();
                    worst = worst.max(at_a).max(at_b);
                }
            }
        }
        worst
    }

    fn quarter_arc(segments: usize) -> Vec<[f64; 3]> {
        (0..=segments)
            .map(|i| {
                let t = std::f64::consts::FRAC_PI_2 * i as f64 / segments as f64;
                [t.cos(), t.sin(), 0.0]
            })
            .collect()
    }

    #[test]
    fn straight_interior_run_fuses_into_one_edge() {
        let path: Vec<[f64; 3]> = (0..=10).map(|i| [1.0, i as f64 / 10.0, 0.0]).collect();
        let fine = shared_path(
            &path,
            &[[0.0, 1.0, 0.0], [0.0, 0.0, 0.0]],
            &[[2.0, 0.0, 0.0], [2.0, 1.0, 0.0]],
        );
        let coarse = CoarseMeshBuilder::new(&fine)
            .colinear_tolerance(Some(5.0))
            .build(&MergeAssignment::identity(2))
            .unwrap();
        let level = &coarse.level;
        assert_eq!(level.get_loop(LoopId::new(0)).len(), 4);
        assert_eq!(level.get_loop(LoopId::new(1)).len(), 4);
        let shared = level.edges().iter().find(|e| !e.is_open()).unwrap();
        assert_eq!(shared.merged_fine_edges.len(), 10);
        assert!(max_chord_deviation(&fine, level) < 1e-5);
        assert!((level.total_area() - fine.total_area()).abs() < 1e-12);
        level.validate_invariants().unwrap();
    }

    #[test]
    fn curved_shared_boundary_is_not_collapsed_to_a_chord() {
        let fine = shared_path(&quarter_arc(20), &[[0.0, 0.0, 0.0]], &[[1.0, 1.0, 0.0]]);
        let coarse = CoarseMeshBuilder::new(&fine)
            .colinear_tolerance(Some(5.0))
            .build(&MergeAssignment::identity(2))
            .unwrap();
        let level = &coarse.level;
        // Each node turns 4.5 degrees, so at most three arc segments fit in
        // one coarse edge: 7 arc edges plus the two radii.
        assert_eq!(level.get_loop(LoopId::new(0)).len(), 9);
        assert!(level.get_loop(LoopId::new(1)).len() > 3);
        assert!(max_chord_deviation(&fine, level) <= 5.0 + 1e-9);
        level.validate_invariants().unwrap();
    }

    #[test]
    fn curved_run_above_tolerance_is_kept() {
        let fine = shared_path(&quarter_arc(20), &[[0.0, 0.0, 0.0]], &[[1.0, 1.0, 0.0]]);
        let coarse = CoarseMeshBuilder::new(&fine)
            .colinear_tolerance(Some(1.0))
            .build(&MergeAssignment::identity(2))
            .unwrap();
        let level = &coarse.level;
        assert_eq!(level.num_edges(), fine.num_edges());
        assert_eq!(level.get_loop(LoopId::new(0)).len(), 22);
        assert_eq!(max_chord_deviation(&fine, level), 0.0);
    }

    #[test]
    fn rebuilding_is_identical() {
        let fine = strip();
        let assignment = MergeAssignment::from_labels(&[0, 1, 1]);
        let a = CoarseMeshBuilder::new(&fine).build(&assignment).unwrap();
        let b = CoarseMeshBuilder::new(&fine).build(&assignment).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn protected_edge_inside_coarse_loop_is_rejected() {
        let mut fine = strip();
        let e = fine.edge_between(NodeId::new(1), NodeId::new(5)).unwrap();
        fine.edges_mut()[e.idx()].flags.trailing_edge = true;
        let err = CoarseMeshBuilder::new(&fine)
            .build(&MergeAssignment::from_labels(&[0, 0, 1]))
            .unwrap_err();
        assert!(matches!(err, MeshAgglomError::InvalidAssignment(_)));
    }

    #[test]
    fn correspondence_links_back() {
        let mut fine = strip();
        let coarse = CoarseMeshBuilder::new(&fine)
            .build(&MergeAssignment::from_labels(&[0, 0, 1]))
            .unwrap();
        link_levels(&mut fine, &coarse.correspondence);
        let interior = fine.edge_between(NodeId::new(1), NodeId::new(5)).unwrap();
        assert_eq!(fine.edge(interior).coarse_edge, None);
        assert_eq!(fine.get_loop(LoopId::new(1)).coarse_loop, Some(LoopId::new(0)));
        for (i, n) in coarse.level.nodes().iter().enumerate() {
            let f = n.fine_node.unwrap();
            assert_eq!(fine.node(f).coarse_node, Some(NodeId::new(i)));
        }
    }
}
