//! Front propagation.
//!
//! The front is a FIFO queue of edges. It is seeded with every trailing,
//! leading and other protected edge (in that order), plus one edge of each
//! tag group that has none. Popping an edge assigns each free loop beside it:
//! first by a star merge around a hub node, otherwise by a nearest-neighbour
//! merge, otherwise as a singleton. The perimeter of the resulting group is
//! pushed back onto the queue. Loops the front never reaches (islands cut off
//! by protected edges) restart it.

use std::collections::{BTreeMap, VecDeque};

use log::trace;

use crate::agglom::state::Groups;
use crate::config::AgglomerationConfig;
use crate::geometry::metrics::{EPS, distance};
use crate::topology::edge::EdgeFlags;
use crate::topology::face_loop::LoopTags;
use crate::topology::ids::{EdgeId, LoopId, NodeId};

pub(crate) struct Front<'g, 'a> {
    groups: &'g mut Groups<'a>,
    config: &'g AgglomerationConfig,
    queue: VecDeque<EdgeId>,
    queued: Vec<bool>,
    consumed: Vec<bool>,
}

impl<'g, 'a> Front<'g, 'a> {
    pub fn new(groups: &'g mut Groups<'a>, config: &'g AgglomerationConfig) -> Self {
        let n = groups.level.num_edges();
        Self {
            groups,
            config,
            queue: VecDeque::new(),
            queued: vec![false; n],
            consumed: vec![false; n],
        }
    }

    /// Run the front until every eligible loop belongs to a group.
    pub fn run(mut self) {
        self.seed();
        loop {
            while let Some(e) = self.queue.pop_front() {
                self.process(e);
            }
            let level = self.groups.level;
            let restart = (0..level.num_loops())
                .map(LoopId::new)
                .find(|&l| self.groups.is_free(l));
            match restart {
                Some(l) => {
                    trace!("front restarts at loop {l}");
                    self.assign(l);
                }
                None => break,
            }
        }
    }

    fn push(&mut self, e: EdgeId) {
        if !self.queued[e.idx()] && !self.consumed[e.idx()] {
            self.queued[e.idx()] = true;
            self.queue.push_back(e);
        }
    }

    fn touches_eligible(&self, e: EdgeId) -> bool {
        let edge = self.groups.level.edge(e);
        edge.loops.iter().any(|&l| !self.groups.is_excluded(l))
    }

    fn seed(&mut self) {
        let level = self.groups.level;
        let edges: Vec<EdgeId> = (0..level.num_edges()).map(EdgeId::new).collect();
        let passes: [fn(&EdgeFlags) -> bool; 3] = [
            |f| f.trailing_edge,
            |f| f.leading_edge,
            |f| f.is_protected(),
        ];
        for pass in passes {
            for &e in &edges {
                if pass(&level.edge(e).flags) && self.touches_eligible(e) {
                    self.push(e);
                }
            }
        }

        let mut patches: BTreeMap<LoopTags, (bool, LoopId)> = BTreeMap::new();
        for i in 0..level.num_loops() {
            let l = LoopId::new(i);
            if self.groups.is_excluded(l) {
                continue;
            }
            let seeded = level.get_loop(l).edges.iter().any(|e| self.queued[e.idx()]);
            let entry = patches.entry(level.get_loop(l).tags).or_insert((false, l));
            entry.0 |= seeded;
        }
        for (_, (seeded, first)) in patches {
            if !seeded {
                if let Some(&e) = level.get_loop(first).edges.first() {
                    self.push(e);
                }
            }
        }
    }

    fn process(&mut self, e: EdgeId) {
        self.consumed[e.idx()] = true;
        let [a, b] = self.groups.level.edge(e).loops;
        for l in [a, b] {
            if self.groups.is_free(l) {
                self.assign(l);
            }
        }
    }

    fn assign(&mut self, l: LoopId) {
        let g = if self.config.star_first {
            self.try_star(l).or_else(|| self.try_nearest(l))
        } else {
            self.try_nearest(l).or_else(|| self.try_star(l))
        };
        let g = g.unwrap_or_else(|| {
            trace!("loop {l} starts a singleton group");
            self.groups.create(vec![l], false)
        });
        self.absorb_pinched(g);
        for e in self.groups.perimeter(g) {
            self.push(e);
        }
    }

    /// Merge the whole fan around a hub node of `l`.
    fn try_star(&mut self, l: LoopId) -> Option<usize> {
        let level = self.groups.level;
        let cfg = self.config;
        let mut best: Option<(usize, NodeId, Vec<LoopId>)> = None;
        for &n in &level.get_loop(l).nodes {
            if level.node_on_protected_edge(n)
                || level.edges_of_node(n).iter().any(|&e| level.edge(e).is_open())
            {
                continue;
            }
            let fan = level.loops_of_node(n);
            if fan.len() < cfg.star_min_loops || fan.len() > cfg.star_max_loops {
                continue;
            }
            if !fan
                .iter()
                .all(|&f| self.groups.is_free(f) && self.groups.compatible(l, f))
            {
                continue;
            }
            let hub = level.node(n).xyz;
            let dists: Vec<f64> = fan
                .iter()
                .map(|&f| distance(level.get_loop(f).geometry.centroid, hub))
                .collect();
            if dists.iter().any(|&d| d <= EPS) {
                continue;
            }
            let weights: Vec<f64> = dists.iter().map(|d| 1.0 / d).collect();
            let avg = weights.iter().sum::<f64>() / weights.len() as f64;
            if weights
                .iter()
                .any(|w| (w - avg).abs() > cfg.star_weight_tolerance * avg)
            {
                continue;
            }
            if !self.groups.union_is_valid(fan) {
                continue;
            }
            let better = match &best {
                None => true,
                Some((size, node, _)) => fan.len() > *size || (fan.len() == *size && n < *node),
            };
            if better {
                best = Some((fan.len(), n, fan.to_vec()));
            }
        }
        let (_, hub, fan) = best?;
        trace!("star merge of {} loops around node {hub}", fan.len());
        Some(self.groups.create(fan, true))
    }

    /// Join the neighbour with the nearest centroid across an unprotected edge.
    fn try_nearest(&mut self, l: LoopId) -> Option<usize> {
        let level = self.groups.level;
        let max = self.config.max_agglomerate_loops;
        let c = level.get_loop(l).geometry.centroid;

        enum Target {
            Pair,
            Group(usize),
        }
        let mut best: Option<(f64, LoopId, Target)> = None;
        for (e, m) in level.loop_neighbors(l) {
            if m == l || level.edge(e).flags.is_protected() || !self.groups.compatible(l, m) {
                continue;
            }
            let target = if self.groups.is_free(m) {
                if !self.groups.union_is_valid(&[l, m]) {
                    continue;
                }
                Target::Pair
            } else if let Some(g) = self.groups.owner(m) {
                let group = self.groups.group(g);
                if group.closed || group.loops.len() >= max || !self.groups.can_absorb(g, l) {
                    continue;
                }
                Target::Group(g)
            } else {
                continue;
            };
            let d = distance(c, level.get_loop(m).geometry.centroid);
            let better = match &best {
                None => true,
                Some((bd, bm, _)) => d < *bd || (d == *bd && m < *bm),
            };
            if better {
                best = Some((d, m, target));
            }
        }

        let (_, m, target) = best?;
        let g = match target {
            Target::Pair => {
                trace!("pair merge of loops {l} and {m}");
                self.groups.create(vec![l, m], max <= 2)
            }
            Target::Group(g) => {
                trace!("loop {l} joins group {g} through loop {m}");
                self.groups.add(g, l);
                g
            }
        };
        if self.groups.group(g).loops.len() >= max {
            self.groups.set_closed(g, true);
        }
        Some(g)
    }

    /// Absorb free loops that share two or more edges with group `g`.
    fn absorb_pinched(&mut self, g: usize) {
        let level = self.groups.level;
        loop {
            let mut shared: BTreeMap<LoopId, usize> = BTreeMap::new();
            for e in self.groups.perimeter(g) {
                let edge = level.edge(e);
                if edge.is_open() {
                    continue;
                }
                for m in edge.loops {
                    if self.groups.is_free(m) {
                        *shared.entry(m).or_default() += 1;
                    }
                }
            }
            let pinched = shared
                .into_iter()
                .find(|&(m, count)| count >= 2 && self.groups.can_absorb(g, m));
            match pinched {
                Some((m, _)) => {
                    trace!("group {g} absorbs pinched loop {m}");
                    self.groups.add(g, m);
                }
                None => break,
            }
        }
    }
}
