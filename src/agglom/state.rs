//! Agglomerate bookkeeping shared by the front and the cleanup passes.
//!
//! An agglomerate ("group") is a set of fine loops that will become one coarse
//! loop. Every structural rule lives here so that no pass can bypass it:
//!
//! * loops only join groups with identical [`LoopTags`] and region;
//! * two groups never merge if any edge between them is protected;
//! * the union of a merge must be a topological disk (one simple perimeter
//!   cycle), so every group maps to a well-formed coarse polygon.

use hashbrown::{HashMap, HashSet};

use crate::geometry::metrics::{EPS, add, angle_between_deg, normalized, scale};
use crate::mesh_error::MeshAgglomError;
use crate::topology::coarsen::MergeAssignment;
use crate::topology::face_loop::LoopTags;
use crate::topology::ids::{EdgeId, LoopId, NodeId};
use crate::topology::mesh_level::MeshLevel;

/// Loops in this region are never touched.
pub(crate) const EXCLUDED: u8 = u8::MAX;

#[derive(Clone, Debug)]
pub(crate) struct Group {
    pub loops: Vec<LoopId>,
    pub area: f64,
    /// No longer accepts nearest-neighbour growth.
    pub closed: bool,
    pub alive: bool,
}

pub(crate) struct Groups<'a> {
    pub level: &'a MeshLevel,
    owner: Vec<Option<usize>>,
    region: Vec<u8>,
    groups: Vec<Group>,
}

impl<'a> Groups<'a> {
    pub fn new(level: &'a MeshLevel, region: Vec<u8>) -> Self {
        Self {
            level,
            owner: vec![None; level.num_loops()],
            region,
            groups: Vec::new(),
        }
    }

    #[inline]
    pub fn owner(&self, l: LoopId) -> Option<usize> {
        self.owner[l.idx()]
    }

    #[inline]
    pub fn is_excluded(&self, l: LoopId) -> bool {
        self.region[l.idx()] == EXCLUDED
    }

    /// Unassigned and eligible.
    #[inline]
    pub fn is_free(&self, l: LoopId) -> bool {
        self.owner[l.idx()].is_none() && !self.is_excluded(l)
    }

    #[inline]
    pub fn group(&self, g: usize) -> &Group {
        &self.groups[g]
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Indices of groups that still exist.
    pub fn live(&self) -> Vec<usize> {
        (0..self.groups.len()).filter(|&g| self.groups[g].alive).collect()
    }

    /// Tags of loop `l` plus its region form its merge class.
    pub fn compatible(&self, a: LoopId, b: LoopId) -> bool {
        self.region[a.idx()] == self.region[b.idx()]
            && self.region[a.idx()] != EXCLUDED
            && self.tags(a).mergeable_with(&self.tags(b))
    }

    #[inline]
    pub fn tags(&self, l: LoopId) -> LoopTags {
        self.level.get_loop(l).tags
    }

    pub fn create(&mut self, loops: Vec<LoopId>, closed: bool) -> usize {
        let g = self.groups.len();
        let area = loops
            .iter()
            .map(|l| self.level.get_loop(*l).geometry.area)
            .sum();
        for l in &loops {
            self.owner[l.idx()] = Some(g);
        }
        self.groups.push(Group {
            loops,
            area,
            closed,
            alive: true,
        });
        g
    }

    pub fn add(&mut self, g: usize, l: LoopId) {
        self.owner[l.idx()] = Some(g);
        self.groups[g].area += self.level.get_loop(l).geometry.area;
        self.groups[g].loops.push(l);
    }

    pub fn set_closed(&mut self, g: usize, closed: bool) {
        self.groups[g].closed = closed;
    }

    /// Move every loop of `from` into `into`.
    pub fn merge(&mut self, into: usize, from: usize) {
        let loops = std::mem::take(&mut self.groups[from].loops);
        for l in &loops {
            self.owner[l.idx()] = Some(into);
        }
        self.groups[into].area += self.groups[from].area;
        self.groups[into].loops.extend(loops);
        self.groups[from].area = 0.0;
        self.groups[from].alive = false;
    }

    /// Area-weighted unit normal (falls back to the plain sum for
    /// degenerate groups).
    pub fn normal(&self, g: usize) -> [f64; 3] {
        let mut weighted = [0.0; 3];
        let mut plain = [0.0; 3];
        for l in &self.groups[g].loops {
            let geo = &self.level.get_loop(*l).geometry;
            weighted = add(weighted, scale(geo.normal, geo.area));
            plain = add(plain, geo.normal);
        }
        normalized(weighted)
            .or_else(|| normalized(plain))
            .unwrap_or([0.0; 3])
    }

    /// Normals within `max_angle_deg`; degenerate normals count as coplanar.
    pub fn coplanar(&self, g: usize, h: usize, max_angle_deg: f64) -> bool {
        angle_between_deg(self.normal(g), self.normal(h)).is_none_or(|a| a <= max_angle_deg)
    }

    /// Perimeter edges of group `g` (open edges included).
    pub fn perimeter(&self, g: usize) -> Vec<EdgeId> {
        let mut out = Vec::new();
        for &l in &self.groups[g].loops {
            for &e in &self.level.get_loop(l).edges {
                let edge = self.level.edge(e);
                if edge.is_open() || self.owner[edge.other_loop(l).idx()] != Some(g) {
                    out.push(e);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Groups adjacent to `g` across perimeter edges, ascending.
    pub fn neighbours(&self, g: usize) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        for &l in &self.groups[g].loops {
            for (_, m) in self.level.loop_neighbors(l) {
                if let Some(h) = self.owner[m.idx()] {
                    if h != g {
                        out.push(h);
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// `true` if `g` and `h` may become one group.
    pub fn can_merge(&self, g: usize, h: usize) -> bool {
        if g == h || !self.groups[g].alive || !self.groups[h].alive {
            return false;
        }
        let (Some(&a), Some(&b)) = (self.groups[g].loops.first(), self.groups[h].loops.first())
        else {
            return false;
        };
        if !self.compatible(a, b) {
            return false;
        }
        let mut union = self.groups[g].loops.clone();
        union.extend_from_slice(&self.groups[h].loops);
        self.union_is_valid(&union)
    }

    /// `true` if free loop `l` may join `g`.
    pub fn can_absorb(&self, g: usize, l: LoopId) -> bool {
        let Some(&a) = self.groups[g].loops.first() else {
            return false;
        };
        if !self.groups[g].alive || !self.is_free(l) || !self.compatible(a, l) {
            return false;
        }
        let mut union = self.groups[g].loops.clone();
        union.push(l);
        self.union_is_valid(&union)
    }

    /// No protected edge between members, and a single perimeter cycle.
    pub fn union_is_valid(&self, loops: &[LoopId]) -> bool {
        let inside: HashSet<LoopId> = loops.iter().copied().collect();
        let mut perimeter = Vec::new();
        for &l in loops {
            for &e in &self.level.get_loop(l).edges {
                let edge = self.level.edge(e);
                if edge.is_open() {
                    perimeter.push(e);
                    continue;
                }
                if inside.contains(&edge.other_loop(l)) {
                    if edge.flags.is_protected() {
                        return false;
                    }
                } else {
                    perimeter.push(e);
                }
            }
        }
        perimeter.sort_unstable();
        perimeter.dedup();
        single_cycle(self.level, &perimeter)
    }

    /// Fine loop → group labels. Every eligible loop must be assigned;
    /// excluded loops take `mirror_label`.
    pub fn labels(
        &self,
        mirror_label: impl Fn(LoopId) -> Option<usize>,
    ) -> Result<MergeAssignment, MeshAgglomError> {
        let mut labels = Vec::with_capacity(self.owner.len());
        for (i, owner) in self.owner.iter().enumerate() {
            let l = LoopId::new(i);
            let label = match owner {
                Some(g) => *g,
                None => mirror_label(l).ok_or_else(|| {
                    MeshAgglomError::InvalidAssignment(format!("loop {l} was never assigned"))
                })?,
            };
            labels.push(label);
        }
        Ok(MergeAssignment::from_labels(&labels))
    }
}

/// `true` if `edges` form exactly one simple closed cycle.
pub(crate) fn single_cycle(level: &MeshLevel, edges: &[EdgeId]) -> bool {
    if edges.len() < 2 {
        return false;
    }
    let mut at: HashMap<NodeId, Vec<EdgeId>> = HashMap::with_capacity(edges.len());
    for &e in edges {
        for n in level.edge(e).nodes {
            at.entry(n).or_default().push(e);
        }
    }
    if at.values().any(|v| v.len() != 2) {
        return false;
    }
    let first = level.edge(edges[0]);
    let start = first.nodes[0];
    let (mut node, mut edge) = (first.nodes[1], edges[0]);
    let mut visited = 1;
    while node != start {
        let Some(next) = at.get(&node).and_then(|v| v.iter().copied().find(|&x| x != edge)) else {
            return false;
        };
        edge = next;
        node = level.edge(next).other_node(node);
        visited += 1;
        if visited > edges.len() {
            return false;
        }
    }
    visited == edges.len()
}

/// Group area ratio `big / small`, infinite when `small` is degenerate.
pub(crate) fn area_ratio(big: f64, small: f64) -> f64 {
    if small > EPS { big / small } else { f64::INFINITY }
}
