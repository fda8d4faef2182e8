//! One resolution of the mesh hierarchy.
//!
//! A [`MeshLevel`] owns flat arrays of nodes, edges and loops plus two CSR
//! tables (node → loops, node → edges) for constant-time neighbourhood
//! lookups. Level 0 is built from a [`SurfaceMeshInput`]; coarser levels are
//! produced by the coarse mesh builder in [`crate::topology::coarsen`].
//!
//! Derived geometry is computed once on construction. After nodes move, only
//! the loops and edges touching the moved nodes are recomputed.

use std::collections::BTreeSet;
use std::ops::Range;

use hashbrown::HashMap;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::debug_invariants::{DebugInvariants, ensure};
use crate::geometry::bbox::BoundingBox;
use crate::geometry::metrics::{LoopGeometry, distance, polygon_geometry};
use crate::mesh_error::MeshAgglomError;
use crate::topology::adjacency::Csr;
use crate::topology::coarsen::aggregate_geometry;
use crate::topology::edge::{Edge, EdgeFlags};
use crate::topology::face_loop::Loop;
use crate::topology::ids::{EdgeId, LoopId, NodeId};
use crate::topology::input::{LoopInput, SurfaceMeshInput};
use crate::topology::node::Node;

/// A node that anchors a trailing vortex on this level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KuttaNode {
    pub node: NodeId,
    /// Index of the vortex sheet the node belongs to.
    pub sheet: usize,
    /// Position of the trailing vortex within its sheet.
    pub vortex: usize,
    pub span_fraction: f64,
    pub is_wing_tip: bool,
    pub concave: bool,
    pub component_id: u32,
}

/// Entities touched by a node-position update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryDelta {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub loops: Vec<LoopId>,
}

impl GeometryDelta {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.loops.is_empty()
    }
}

/// Nodes, edges and loops of one resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshLevel {
    pub(crate) level: usize,
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) loops: Vec<Loop>,
    pub(crate) kutta_nodes: Vec<KuttaNode>,
    node_loops: Csr<LoopId>,
    node_edges: Csr<EdgeId>,
}

/// Edge discovery keyed by unordered node pair.
#[derive(Default)]
struct EdgeTable {
    by_nodes: HashMap<(NodeId, NodeId), EdgeId>,
    uses: Vec<u8>,
}

impl EdgeTable {
    fn from_edges(edges: &[Edge]) -> Self {
        let mut table = Self::default();
        for (i, e) in edges.iter().enumerate() {
            table.by_nodes.insert(key(e.nodes[0], e.nodes[1]), EdgeId::new(i));
            table.uses.push(if e.is_open() { 1 } else { 2 });
        }
        table
    }

    /// Register loop side `a → b`, creating the edge on first use.
    fn side(
        &mut self,
        edges: &mut Vec<Edge>,
        a: NodeId,
        b: NodeId,
        lp: LoopId,
        component_id: u32,
    ) -> Result<EdgeId, MeshAgglomError> {
        if let Some(&id) = self.by_nodes.get(&key(a, b)) {
            let uses = &mut self.uses[id.idx()];
            if *uses >= 2 {
                return Err(MeshAgglomError::NonManifoldEdge {
                    nodes: [a.idx(), b.idx()],
                    loops: *uses as usize + 1,
                });
            }
            *uses += 1;
            edges[id.idx()].loops[1] = lp;
            return Ok(id);
        }
        let id = EdgeId::new(edges.len());
        edges.push(Edge {
            nodes: [a, b],
            loops: [lp, lp],
            flags: EdgeFlags::default(),
            component_id,
            length: 0.0,
            fine_edge: None,
            coarse_edge: None,
            merged_fine_edges: Vec::new(),
        });
        self.by_nodes.insert(key(a, b), id);
        self.uses.push(1);
        Ok(id)
    }
}

fn key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Drop cyclically repeated consecutive nodes (zero-length sides).
fn clean_ring(nodes: &[usize]) -> Vec<NodeId> {
    let mut ring: Vec<NodeId> = Vec::with_capacity(nodes.len());
    for &n in nodes {
        if ring.last().map(|l| l.idx()) != Some(n) {
            ring.push(NodeId::new(n));
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

impl MeshLevel {
    /// Build level 0 from raw input.
    ///
    /// Edges are discovered from loop connectivity. Open edges are marked
    /// boundary, edges between components are marked intersection, and edges
    /// between different control-surface tags are frozen.
    pub fn from_input(input: &SurfaceMeshInput) -> Result<Self, MeshAgglomError> {
        input.validate()?;
        let mut nodes: Vec<Node> = input.nodes.iter().map(|p| Node::new(*p)).collect();
        if let Some(uv) = &input.node_uv {
            for (n, uv) in nodes.iter_mut().zip(uv) {
                n.uv = *uv;
            }
        }

        let mut seen = vec![false; nodes.len()];
        let mut edges = Vec::new();
        let mut loops = Vec::with_capacity(input.loops.len());
        let mut table = EdgeTable::default();
        for (li, lin) in input.loops.iter().enumerate() {
            let lp = LoopId::new(li);
            let ring = clean_ring(&lin.nodes);
            if ring.len() < 3 {
                return Err(MeshAgglomError::LoopTooSmall {
                    loop_index: li,
                    nodes: ring.len(),
                });
            }
            for &n in &ring {
                if !seen[n.idx()] {
                    seen[n.idx()] = true;
                    nodes[n.idx()].component_id = lin.tags.component_id;
                }
            }
            let k = ring.len();
            let mut loop_edges = Vec::with_capacity(k);
            for i in 0..k {
                loop_edges.push(table.side(
                    &mut edges,
                    ring[i],
                    ring[(i + 1) % k],
                    lp,
                    lin.tags.component_id,
                )?);
            }
            loops.push(Loop {
                nodes: ring,
                edges: loop_edges,
                geometry: LoopGeometry::default(),
                tags: lin.tags,
                fine_loops: Vec::new(),
                coarse_loop: None,
            });
        }

        let mut level = Self::from_parts(0, nodes, edges, loops, Vec::new());
        let all_edges: Vec<EdgeId> = (0..level.edges.len()).map(EdgeId::new).collect();
        level.classify_edge_topology(&all_edges);
        let all_loops: Vec<LoopId> = (0..level.loops.len()).map(LoopId::new).collect();
        level.recompute_loops(&all_loops)?;
        level.recompute_edge_lengths(&all_edges);
        crate::debug_invariants!(level.validate_invariants(), "MeshLevel::from_input");
        Ok(level)
    }

    /// Assemble a level from finished entity arrays and build its adjacency.
    pub(crate) fn from_parts(
        level: usize,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        loops: Vec<Loop>,
        kutta_nodes: Vec<KuttaNode>,
    ) -> Self {
        let (node_loops, node_edges) = build_adjacency(nodes.len(), &edges, &loops);
        Self {
            level,
            nodes,
            edges,
            loops,
            kutta_nodes,
            node_loops,
            node_edges,
        }
    }

    /// Append nodes and loops (e.g. a wake mesh) to this level.
    ///
    /// New loops index nodes globally, so they may reuse existing nodes. An
    /// existing open edge picked up by a new loop becomes interior. Returns
    /// the ranges of new node and loop indices.
    pub fn append_loops(
        &mut self,
        new_nodes: Vec<Node>,
        new_loops: &[LoopInput],
    ) -> Result<(Range<usize>, Range<usize>), MeshAgglomError> {
        let node_start = self.nodes.len();
        let loop_start = self.loops.len();
        let edge_start = self.edges.len();
        self.nodes.extend(new_nodes);
        let len = self.nodes.len();

        let mut table = EdgeTable::from_edges(&self.edges);
        let mut reopened = Vec::new();
        for (offset, lin) in new_loops.iter().enumerate() {
            let loop_index = loop_start + offset;
            if let Some(&node) = lin.nodes.iter().find(|&&n| n >= len) {
                return Err(MeshAgglomError::NodeOutOfBounds {
                    loop_index,
                    node,
                    len,
                });
            }
            let ring = clean_ring(&lin.nodes);
            if ring.len() < 3 {
                return Err(MeshAgglomError::LoopTooSmall {
                    loop_index,
                    nodes: ring.len(),
                });
            }
            let lp = LoopId::new(loop_index);
            let k = ring.len();
            let mut loop_edges = Vec::with_capacity(k);
            for i in 0..k {
                let e = table.side(
                    &mut self.edges,
                    ring[i],
                    ring[(i + 1) % k],
                    lp,
                    lin.tags.component_id,
                )?;
                if e.idx() < edge_start {
                    reopened.push(e);
                }
                loop_edges.push(e);
            }
            for &n in &ring {
                if n.idx() >= node_start {
                    self.nodes[n.idx()].component_id = lin.tags.component_id;
                }
            }
            self.loops.push(Loop {
                nodes: ring,
                edges: loop_edges,
                geometry: LoopGeometry::default(),
                tags: lin.tags,
                fine_loops: Vec::new(),
                coarse_loop: None,
            });
        }
        for e in &reopened {
            self.edges[e.idx()].flags.boundary = false;
        }

        let (node_loops, node_edges) = build_adjacency(self.nodes.len(), &self.edges, &self.loops);
        self.node_loops = node_loops;
        self.node_edges = node_edges;

        let mut touched: Vec<EdgeId> = (edge_start..self.edges.len()).map(EdgeId::new).collect();
        touched.extend(reopened);
        self.classify_edge_topology(&touched);
        let new_loops: Vec<LoopId> = (loop_start..self.loops.len()).map(LoopId::new).collect();
        self.recompute_loops(&new_loops)?;
        self.recompute_edge_lengths(&touched);
        crate::debug_invariants!(self.validate_invariants(), "MeshLevel::append_loops");
        Ok((node_start..self.nodes.len(), loop_start..self.loops.len()))
    }

    /// Set boundary / intersection / frozen flags from loop adjacency.
    fn classify_edge_topology(&mut self, edges: &[EdgeId]) {
        for &e in edges {
            let edge = &self.edges[e.idx()];
            let open = edge.is_open();
            let [a, b] = edge.loops;
            let ta = self.loops[a.idx()].tags;
            let tb = self.loops[b.idx()].tags;
            let nodes = edge.nodes;
            let flags = &mut self.edges[e.idx()].flags;
            if open {
                flags.boundary = true;
            }
            flags.intersection = ta.component_id != tb.component_id;
            flags.frozen = ta.control_surface != tb.control_surface;
            let (boundary, intersection) = (flags.boundary, flags.intersection);
            for n in nodes {
                let nf = &mut self.nodes[n.idx()].flags;
                nf.boundary_edge |= boundary;
                nf.intersection |= intersection;
            }
        }
    }

    /// Recompute polygon geometry of the listed loops from node positions.
    pub(crate) fn recompute_loops(&mut self, loops: &[LoopId]) -> Result<(), MeshAgglomError> {
        #[cfg(feature = "rayon")]
        let geometry: Result<Vec<LoopGeometry>, MeshAgglomError> =
            loops.par_iter().map(|&l| self.polygon_of(l)).collect();
        #[cfg(not(feature = "rayon"))]
        let geometry: Result<Vec<LoopGeometry>, MeshAgglomError> =
            loops.iter().map(|&l| self.polygon_of(l)).collect();
        for (&l, g) in loops.iter().zip(geometry?) {
            self.loops[l.idx()].geometry = g;
        }
        Ok(())
    }

    fn polygon_of(&self, l: LoopId) -> Result<LoopGeometry, MeshAgglomError> {
        let lp = &self.loops[l.idx()];
        let vertices: Vec<[f64; 3]> = lp.nodes.iter().map(|n| self.nodes[n.idx()].xyz).collect();
        let uv: Vec<[f64; 2]> = lp.nodes.iter().map(|n| self.nodes[n.idx()].uv).collect();
        polygon_geometry(&vertices, Some(&uv)).map_err(|e| match e {
            MeshAgglomError::InvalidGeometry(msg) => {
                MeshAgglomError::InvalidGeometry(format!("loop {l}: {msg}"))
            }
            other => other,
        })
    }

    pub(crate) fn recompute_edge_lengths(&mut self, edges: &[EdgeId]) {
        for &e in edges {
            let [a, b] = self.edges[e.idx()].nodes;
            self.edges[e.idx()].length = distance(self.nodes[a.idx()].xyz, self.nodes[b.idx()].xyz);
        }
    }

    /// Move nodes and recompute only the loops and edges that touch them.
    ///
    /// Intended for the finest level; coarser levels follow through
    /// [`refresh_from_finer`](Self::refresh_from_finer).
    pub fn update_node_positions(
        &mut self,
        moves: &[(NodeId, [f64; 3])],
    ) -> Result<GeometryDelta, MeshAgglomError> {
        let mut nodes = BTreeSet::new();
        for &(n, xyz) in moves {
            if n.idx() >= self.nodes.len() {
                return Err(MeshAgglomError::InvalidGeometry(format!(
                    "node {n} out of range on level {}",
                    self.level
                )));
            }
            if xyz.iter().any(|c| !c.is_finite()) {
                return Err(MeshAgglomError::InvalidGeometry(format!(
                    "non-finite position for node {n}"
                )));
            }
            self.nodes[n.idx()].xyz = xyz;
            nodes.insert(n);
        }
        let (edges, loops) = self.touched_by(&nodes);
        self.recompute_loops(&loops)?;
        self.recompute_edge_lengths(&edges);
        Ok(GeometryDelta {
            nodes: nodes.into_iter().collect(),
            edges,
            loops,
        })
    }

    /// Follow a position update of the next finer level.
    ///
    /// Coarse nodes copy the position of their fine node; coarse loops
    /// containing an affected fine loop are re-aggregated from all of their
    /// fine loops.
    pub fn refresh_from_finer(
        &mut self,
        fine: &MeshLevel,
        delta: &GeometryDelta,
    ) -> Result<GeometryDelta, MeshAgglomError> {
        let mut nodes = BTreeSet::new();
        for &n in &delta.nodes {
            if let Some(c) = fine.nodes[n.idx()].coarse_node {
                self.nodes[c.idx()].xyz = fine.nodes[n.idx()].xyz;
                nodes.insert(c);
            }
        }
        let loops: BTreeSet<LoopId> = delta
            .loops
            .iter()
            .filter_map(|l| fine.loops[l.idx()].coarse_loop)
            .collect();
        for &c in &loops {
            let geometry = aggregate_geometry(fine, &self.loops[c.idx()].fine_loops)?;
            self.loops[c.idx()].geometry = geometry;
        }
        let (edges, _) = self.touched_by(&nodes);
        self.recompute_edge_lengths(&edges);
        Ok(GeometryDelta {
            nodes: nodes.into_iter().collect(),
            edges,
            loops: loops.into_iter().collect(),
        })
    }

    fn touched_by(&self, nodes: &BTreeSet<NodeId>) -> (Vec<EdgeId>, Vec<LoopId>) {
        let mut edges = BTreeSet::new();
        let mut loops = BTreeSet::new();
        for &n in nodes {
            edges.extend(self.edges_of_node(n).iter().copied());
            loops.extend(self.loops_of_node(n).iter().copied());
        }
        (edges.into_iter().collect(), loops.into_iter().collect())
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Depth in the hierarchy (0 = finest).
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    #[inline]
    pub fn kutta_nodes(&self) -> &[KuttaNode] {
        &self.kutta_nodes
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.idx()]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.idx()]
    }

    #[inline]
    pub fn get_loop(&self, id: LoopId) -> &Loop {
        &self.loops[id.idx()]
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn num_loops(&self) -> usize {
        self.loops.len()
    }

    /// Loops that reference node `n`.
    #[inline]
    pub fn loops_of_node(&self, n: NodeId) -> &[LoopId] {
        self.node_loops.neighbors(n.idx())
    }

    /// Edges incident to node `n`.
    #[inline]
    pub fn edges_of_node(&self, n: NodeId) -> &[EdgeId] {
        self.node_edges.neighbors(n.idx())
    }

    /// The edge joining `a` and `b`, if any.
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.edges_of_node(a)
            .iter()
            .copied()
            .find(|&e| self.edges[e.idx()].other_node(a) == b && self.edges[e.idx()].has_node(b))
    }

    /// `(edge, neighbour)` pairs across the non-open edges of loop `l`.
    pub fn loop_neighbors(&self, l: LoopId) -> impl Iterator<Item = (EdgeId, LoopId)> + '_ {
        self.loops[l.idx()].edges.iter().filter_map(move |&e| {
            let edge = &self.edges[e.idx()];
            (!edge.is_open()).then(|| (e, edge.other_loop(l)))
        })
    }

    /// Node positions of loop `l` in winding order.
    pub fn loop_vertices(&self, l: LoopId) -> Vec<[f64; 3]> {
        self.loops[l.idx()]
            .nodes
            .iter()
            .map(|n| self.nodes[n.idx()].xyz)
            .collect()
    }

    /// `true` if any edge at `n` is protected.
    pub fn node_on_protected_edge(&self, n: NodeId) -> bool {
        self.edges_of_node(n)
            .iter()
            .any(|e| self.edges[e.idx()].flags.is_protected())
    }

    pub fn total_area(&self) -> f64 {
        self.loops.iter().map(|l| l.geometry.area).sum()
    }

    /// Bounds of all node positions.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut b = BoundingBox::empty();
        for n in &self.nodes {
            b.expand_point(n.xyz);
        }
        b
    }

    /// Replace the kutta-node list (set by the vortex-sheet builder).
    pub fn set_kutta_nodes(&mut self, kutta_nodes: Vec<KuttaNode>) {
        self.kutta_nodes = kutta_nodes;
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub(crate) fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    pub(crate) fn loops_mut(&mut self) -> &mut [Loop] {
        &mut self.loops
    }
}

fn build_adjacency(
    num_nodes: usize,
    edges: &[Edge],
    loops: &[Loop],
) -> (Csr<LoopId>, Csr<EdgeId>) {
    let node_loops = Csr::from_pairs(
        num_nodes,
        loops.iter().enumerate().flat_map(|(li, l)| {
            let mut ring = l.nodes.clone();
            ring.sort_unstable();
            ring.dedup();
            ring.into_iter().map(move |n| (n.idx(), LoopId::new(li)))
        }),
    );
    let node_edges = Csr::from_pairs(
        num_nodes,
        edges.iter().enumerate().flat_map(|(ei, e)| {
            e.nodes.into_iter().map(move |n| (n.idx(), EdgeId::new(ei)))
        }),
    );
    (node_loops, node_edges)
}

impl DebugInvariants for MeshLevel {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "MeshLevel");
    }

    fn validate_invariants(&self) -> Result<(), MeshAgglomError> {
        let (nn, ne, nl) = (self.nodes.len(), self.edges.len(), self.loops.len());
        for (ei, e) in self.edges.iter().enumerate() {
            for l in e.loops {
                if l.idx() >= nl {
                    return Err(MeshAgglomError::DanglingEdge {
                        edge: ei,
                        loop_index: l.idx(),
                    });
                }
                ensure(
                    self.loops[l.idx()].edges.contains(&EdgeId::new(ei)),
                    self.level,
                    || format!("edge {ei} names loop {l} which does not list it"),
                )?;
            }
            ensure(e.nodes.iter().all(|n| n.idx() < nn), self.level, || {
                format!("edge {ei} has an out-of-range node")
            })?;
        }
        for (li, l) in self.loops.iter().enumerate() {
            if l.nodes.len() < 3 {
                return Err(MeshAgglomError::LoopTooSmall {
                    loop_index: li,
                    nodes: l.nodes.len(),
                });
            }
            ensure(l.edges.len() == l.nodes.len(), self.level, || {
                format!("loop {li} has {} nodes but {} edges", l.nodes.len(), l.edges.len())
            })?;
            let k = l.nodes.len();
            for i in 0..k {
                let e = l.edges[i];
                ensure(e.idx() < ne, self.level, || {
                    format!("loop {li} references missing edge {e}")
                })?;
                let edge = &self.edges[e.idx()];
                ensure(
                    edge.has_node(l.nodes[i]) && edge.has_node(l.nodes[(i + 1) % k]),
                    self.level,
                    || format!("loop {li} side {i} does not match edge {e}"),
                )?;
            }
        }
        for k in &self.kutta_nodes {
            ensure(k.node.idx() < nn, self.level, || {
                format!("kutta node {} out of range", k.node)
            })?;
        }
        Ok(())
    }
}
