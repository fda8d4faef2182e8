//! Vortex sheets: the ordered trailing vortices of one kutta chain.

use std::ops::Range;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::geometry::metrics::{EPS, distance};
use crate::kutta::KuttaChain;
use crate::topology::ids::{EdgeId, NodeId};
use crate::topology::mesh_level::{KuttaNode, MeshLevel};
use crate::wake::trailing_vortex::TrailingVortex;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VortexSheet {
    pub id: usize,
    pub component_id: u32,
    /// The chain closes on itself; the wake gets a closing strip.
    pub periodic: bool,
    pub vortices: Vec<TrailingVortex>,
    /// Trailing edges between consecutive vortices.
    pub chain_edges: Vec<EdgeId>,
    /// Surface id carried by this sheet's wake loops.
    pub surface_id: u32,
    /// Loop indices of the wake in the merged level-0 mesh.
    pub wake_loops: Range<usize>,
}

impl VortexSheet {
    /// Build the sheet for `chain`; `None` for chains with fewer than two
    /// distinct nodes.
    pub fn from_chain(id: usize, chain: &KuttaChain, level: &MeshLevel) -> Option<Self> {
        let nodes = chain.distinct_nodes();
        if nodes.len() < 2 {
            return None;
        }
        let mut vortices: Vec<TrailingVortex> = nodes
            .iter()
            .map(|&n| {
                let node = level.node(n);
                let mut v = TrailingVortex::new(n, node.xyz);
                v.is_wing_tip = node.flags.wing_tip;
                v.concave = node.flags.concave;
                v
            })
            .collect();
        let fractions = span_fractions(level, nodes, chain.periodic);
        for (v, f) in vortices.iter_mut().zip(fractions) {
            v.span_fraction = f;
        }
        let mut sheet = Self {
            id,
            component_id: chain.component_id,
            periodic: chain.periodic,
            vortices,
            chain_edges: chain.edges.clone(),
            surface_id: 0,
            wake_loops: 0..0,
        };
        sheet.update_core_widths(level);
        Some(sheet)
    }

    /// Core width of each vortex: mean length of its adjacent trailing edges.
    pub fn update_core_widths(&mut self, level: &MeshLevel) {
        let m = self.vortices.len();
        let lengths: Vec<f64> = self
            .chain_edges
            .iter()
            .map(|&e| {
                let [a, b] = level.edge(e).nodes;
                distance(level.node(a).xyz, level.node(b).xyz)
            })
            .collect();
        for i in 0..m {
            let mut adjacent = Vec::with_capacity(2);
            if i > 0 {
                adjacent.push(lengths[i - 1]);
            } else if self.periodic {
                adjacent.push(lengths[lengths.len() - 1]);
            }
            if i < lengths.len() {
                adjacent.push(lengths[i]);
            }
            self.vortices[i].core_width = if adjacent.is_empty() {
                0.0
            } else {
                adjacent.iter().sum::<f64>() / adjacent.len() as f64
            };
        }
    }

    /// Number of wake strips (spanwise intervals).
    pub fn num_strips(&self) -> usize {
        if self.periodic {
            self.vortices.len()
        } else {
            self.vortices.len() - 1
        }
    }

    /// Kutta-node records for level 0.
    pub fn kutta_nodes(&self) -> Vec<KuttaNode> {
        self.vortices
            .iter()
            .enumerate()
            .map(|(i, v)| KuttaNode {
                node: v.kutta_node,
                sheet: self.id,
                vortex: i,
                span_fraction: v.span_fraction,
                is_wing_tip: v.is_wing_tip,
                concave: v.concave,
                component_id: self.component_id,
            })
            .collect()
    }
}

/// Span fractions from the surface `u` parameter when it varies along the
/// chain, otherwise from arc length.
fn span_fractions(level: &MeshLevel, nodes: &[NodeId], periodic: bool) -> Vec<f64> {
    let u: Vec<f64> = nodes.iter().map(|n| level.node(*n).uv[0]).collect();
    let (first, last) = (u[0], u[u.len() - 1]);
    let monotone = u.iter().tuple_windows().all(|(a, b)| b >= a)
        || u.iter().tuple_windows().all(|(a, b)| b <= a);
    if !periodic && (last - first).abs() > EPS && monotone {
        return u.iter().map(|v| (v - first) / (last - first)).collect();
    }

    let mut s = vec![0.0; nodes.len()];
    for (i, (a, b)) in nodes.iter().tuple_windows().enumerate() {
        s[i + 1] = s[i] + distance(level.node(*a).xyz, level.node(*b).xyz);
    }
    let total = if periodic {
        s[nodes.len() - 1] + distance(level.node(nodes[nodes.len() - 1]).xyz, level.node(nodes[0]).xyz)
    } else {
        s[nodes.len() - 1]
    };
    if total <= EPS {
        return vec![0.0; nodes.len()];
    }
    s.iter().map(|v| v / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_generation::flat_wing;

    fn chain(level: &MeshLevel, nodes: &[usize]) -> KuttaChain {
        let nodes: Vec<NodeId> = nodes.iter().map(|&n| NodeId::new(n)).collect();
        let edges = nodes
            .windows(2)
            .map(|w| level.edge_between(w[0], w[1]).unwrap())
            .collect();
        KuttaChain {
            component_id: 0,
            chain_key: 0,
            periodic: nodes.first() == nodes.last(),
            nodes,
            edges,
        }
    }

    #[test]
    fn arc_length_span_fractions() {
        let level = MeshLevel::from_input(&flat_wing(4)).unwrap();
        let sheet = VortexSheet::from_chain(0, &chain(&level, &[2, 5, 8, 11, 14]), &level).unwrap();
        let f: Vec<f64> = sheet.vortices.iter().map(|v| v.span_fraction).collect();
        assert_eq!(f, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(sheet.num_strips(), 4);
        assert!(sheet.vortices.iter().all(|v| (v.core_width - 1.0).abs() < 1e-12));
    }

    #[test]
    fn uv_parameter_wins_when_present() {
        let mut input = flat_wing(2);
        input.node_uv = Some(
            input
                .nodes
                .iter()
                .map(|p| [p[1] * p[1], 0.0])
                .collect(),
        );
        let level = MeshLevel::from_input(&input).unwrap();
        let sheet = VortexSheet::from_chain(0, &chain(&level, &[2, 5, 8]), &level).unwrap();
        assert!((sheet.vortices[1].span_fraction - 0.25).abs() < 1e-12);
    }

    #[test]
    fn single_node_chain_has_no_sheet() {
        let level = MeshLevel::from_input(&flat_wing(1)).unwrap();
        let c = KuttaChain {
            component_id: 0,
            chain_key: 0,
            nodes: vec![NodeId::new(2)],
            edges: vec![],
            periodic: false,
        };
        assert!(VortexSheet::from_chain(0, &c, &level).is_none());
    }
}
