//! Cleanup passes over the groups left by the front.
//!
//! Each pass only merges whole groups through [`Groups::can_merge`], so tags,
//! protected edges and the disk shape are preserved. Every pass loops until
//! it stops changing anything; running a pass twice is a no-op the second time.

use std::collections::BTreeMap;

use log::trace;

use crate::agglom::state::{Groups, area_ratio};
use crate::config::AgglomerationConfig;
use crate::geometry::metrics::EPS;
use crate::geometry::quality::corner_angle_deg;
use crate::topology::ids::NodeId;

/// Run all passes in order: small groups, fans, slivers, lone groups.
pub(crate) fn run_all(groups: &mut Groups<'_>, config: &AgglomerationConfig) -> usize {
    let mut merges = absorb_small(groups, config);
    merges += resolve_fans(groups, config);
    merges += merge_slivers(groups, config);
    merges += absorb_lone(groups, config);
    merges
}

/// Absorb groups far smaller than a coplanar neighbour, relaxing the ratio.
pub(crate) fn absorb_small(groups: &mut Groups<'_>, config: &AgglomerationConfig) -> usize {
    let mut merges = 0;
    for &ratio in &config.small_area_ratios {
        loop {
            let mut changed = false;
            for g in groups.live() {
                if !groups.group(g).alive {
                    continue;
                }
                let area = groups.group(g).area;
                let target = groups
                    .neighbours(g)
                    .into_iter()
                    .filter(|&h| {
                        area_ratio(groups.group(h).area, area) > ratio
                            && groups.coplanar(g, h, config.coplanar_angle_deg)
                            && groups.can_merge(h, g)
                    })
                    .max_by(|&a, &b| {
                        groups
                            .group(a)
                            .area
                            .total_cmp(&groups.group(b).area)
                            .then(b.cmp(&a))
                    });
                if let Some(h) = target {
                    trace!("small group {g} absorbed by {h} at ratio {ratio}");
                    groups.merge(h, g);
                    merges += 1;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }
    merges
}

/// Merge thin fan blades at a node into a wider coplanar neighbour, within
/// a per-node angle budget.
pub(crate) fn resolve_fans(groups: &mut Groups<'_>, config: &AgglomerationConfig) -> usize {
    let level = groups.level;
    let mut merges = 0;
    for i in 0..level.num_nodes() {
        let n = NodeId::new(i);
        let mut sums = fan_angles(groups, n);
        if sums.len() < 2 {
            continue;
        }
        let mut blades: Vec<(usize, f64)> = sums
            .iter()
            .filter(|&(_, &s)| s < config.fan_min_angle_deg)
            .map(|(&g, &s)| (g, s))
            .collect();
        blades.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let mut budget = config.fan_angle_budget_deg;
        for (b, angle) in blades {
            if angle > budget {
                break;
            }
            if !groups.group(b).alive || !sums.contains_key(&b) {
                continue;
            }
            let area = groups.group(b).area;
            let target = sums
                .iter()
                .filter(|&(&h, &s)| {
                    h != b
                        && s <= config.fan_max_merge_angle_deg
                        && area_ratio(groups.group(h).area, area) >= config.fan_area_ratio
                        && groups.coplanar(b, h, config.coplanar_angle_deg)
                        && groups.can_merge(h, b)
                })
                .max_by(|a, b| {
                    groups
                        .group(*a.0)
                        .area
                        .total_cmp(&groups.group(*b.0).area)
                        .then(b.0.cmp(a.0))
                })
                .map(|(&h, _)| h);
            if let Some(h) = target {
                trace!("fan blade {b} at node {n} merged into {h}");
                groups.merge(h, b);
                if let Some(s) = sums.remove(&b) {
                    *sums.entry(h).or_default() += s;
                }
                budget -= angle;
                merges += 1;
            }
        }
    }
    merges
}

/// Corner-angle sum at `n` per group.
fn fan_angles(groups: &Groups<'_>, n: NodeId) -> BTreeMap<usize, f64> {
    let level = groups.level;
    let mut sums = BTreeMap::new();
    for &l in level.loops_of_node(n) {
        let Some(g) = groups.owner(l) else { continue };
        let lp = level.get_loop(l);
        let Some(pos) = lp.position_of(n) else { continue };
        let angle = corner_angle_deg(&level.loop_vertices(l), pos).unwrap_or(0.0);
        *sums.entry(g).or_insert(0.0) += angle;
    }
    sums
}

/// Merge three- and four-sided groups with extreme side ratios across their
/// shortest mergeable side.
pub(crate) fn merge_slivers(groups: &mut Groups<'_>, config: &AgglomerationConfig) -> usize {
    let level = groups.level;
    let mut merges = 0;
    loop {
        let mut changed = false;
        for g in groups.live() {
            if !groups.group(g).alive {
                continue;
            }
            let perimeter = groups.perimeter(g);
            if !(3..=4).contains(&perimeter.len()) {
                continue;
            }
            let mut sides: Vec<(f64, _)> = perimeter
                .iter()
                .map(|&e| (level.edge(e).length, e))
                .collect();
            sides.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let shortest = sides[0].0;
            let longest = sides[sides.len() - 1].0;
            let aspect = if shortest > EPS {
                longest / shortest
            } else {
                f64::INFINITY
            };
            if aspect <= config.sliver_aspect_ratio {
                continue;
            }
            for &(_, e) in &sides {
                let edge = level.edge(e);
                if edge.is_open() || edge.flags.is_protected() {
                    continue;
                }
                let inside = groups.owner(edge.loops[0]) == Some(g);
                let other = if inside { edge.loops[1] } else { edge.loops[0] };
                let Some(h) = groups.owner(other) else { continue };
                if groups.coplanar(g, h, config.coplanar_angle_deg) && groups.can_merge(h, g) {
                    trace!("sliver group {g} (aspect {aspect:.1}) merged into {h}");
                    groups.merge(h, g);
                    merges += 1;
                    changed = true;
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }
    merges
}

/// Absorb a group enclosed by a single, much larger neighbour.
pub(crate) fn absorb_lone(groups: &mut Groups<'_>, config: &AgglomerationConfig) -> usize {
    let level = groups.level;
    let mut merges = 0;
    for g in groups.live() {
        if !groups.group(g).alive {
            continue;
        }
        let perimeter = groups.perimeter(g);
        if perimeter.iter().any(|&e| {
            let edge = level.edge(e);
            edge.is_open() || edge.flags.is_protected()
        }) {
            continue;
        }
        let [h] = groups.neighbours(g)[..] else { continue };
        if area_ratio(groups.group(h).area, groups.group(g).area) >= config.lone_area_ratio
            && groups.can_merge(h, g)
        {
            trace!("lone group {g} absorbed by {h}");
            groups.merge(h, g);
            merges += 1;
        }
    }
    merges
}
