//! Ordering trailing edges into kutta chains.
//!
//! Trailing edges are walked per chain key (component group, or the
//! component itself). Walks start at tips (one trailing edge of the key at
//! the node), then at junctions, then anywhere for closed chains. Each step
//! takes the lowest unused trailing edge of the same key, so every trailing
//! edge is visited exactly once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::topology::components::ComponentTable;
use crate::topology::ids::{EdgeId, NodeId};
use crate::topology::mesh_level::MeshLevel;

/// An ordered run of trailing-edge nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KuttaChain {
    pub component_id: u32,
    pub chain_key: u32,
    /// For a periodic chain the first node is repeated at the end.
    pub nodes: Vec<NodeId>,
    /// `edges[i]` joins `nodes[i]` and `nodes[i + 1]`.
    pub edges: Vec<EdgeId>,
    pub periodic: bool,
}

impl KuttaChain {
    /// Distinct nodes (the closing repeat of a periodic chain excluded).
    pub fn distinct_nodes(&self) -> &[NodeId] {
        if self.periodic {
            &self.nodes[..self.nodes.len() - 1]
        } else {
            &self.nodes
        }
    }
}

/// Walk every trailing edge of `level` into chains.
///
/// Returns the chains and the components whose chains could not be
/// finished; findings are appended to `diagnostics`.
pub fn walk_chains(
    level: &MeshLevel,
    components: &ComponentTable,
    diagnostics: &mut Diagnostics,
) -> (Vec<KuttaChain>, BTreeSet<u32>) {
    let key_of = |e: EdgeId| components.chain_key(level.edge(e).component_id);
    let mut count: BTreeMap<(NodeId, u32), usize> = BTreeMap::new();
    for (i, edge) in level.edges().iter().enumerate() {
        if edge.flags.trailing_edge {
            let key = key_of(EdgeId::new(i));
            for n in edge.nodes {
                *count.entry((n, key)).or_default() += 1;
            }
        }
    }
    for (&(n, _), &c) in &count {
        if c > 2 {
            diagnostics.push(Diagnostic::JunctionNode {
                node: n.idx(),
                trailing_edges: c,
            });
        }
    }

    let mut used = vec![false; level.num_edges()];
    let mut chains = Vec::new();
    let mut failed = BTreeSet::new();
    let passes: [fn(usize) -> bool; 3] = [|c| c == 1, |c| c > 2, |_| true];
    for pass in passes {
        for (&(start, key), &c) in &count {
            if !pass(c) {
                continue;
            }
            while let Some(chain) = walk(level, start, key, &key_of, &mut used) {
                let first = chain.nodes[0];
                let last = chain.nodes[chain.nodes.len() - 1];
                let complete = chain.periodic
                    || (count.get(&(first, key)) == Some(&1) && count.get(&(last, key)) == Some(&1));
                if !complete {
                    diagnostics.push(Diagnostic::IncompleteChain {
                        component_id: chain.component_id,
                        start: first.idx(),
                        end: last.idx(),
                    });
                    for &e in &chain.edges {
                        failed.insert(level.edge(e).component_id);
                    }
                }
                chains.push(chain);
            }
        }
    }
    (chains, failed)
}

fn walk(
    level: &MeshLevel,
    start: NodeId,
    key: u32,
    key_of: &impl Fn(EdgeId) -> u32,
    used: &mut [bool],
) -> Option<KuttaChain> {
    let next_from = |n: NodeId, used: &[bool]| {
        level
            .edges_of_node(n)
            .iter()
            .copied()
            .filter(|&e| level.edge(e).flags.trailing_edge && !used[e.idx()] && key_of(e) == key)
            .min()
    };
    let first = next_from(start, used)?;
    let mut nodes = vec![start];
    let mut edges = Vec::new();
    let mut current = start;
    let mut next = Some(first);
    while let Some(e) = next {
        used[e.idx()] = true;
        edges.push(e);
        current = level.edge(e).other_node(current);
        nodes.push(current);
        if current == start {
            break;
        }
        next = next_from(current, used);
    }
    Some(KuttaChain {
        component_id: level.edge(first).component_id,
        chain_key: key,
        periodic: current == start,
        nodes,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::face_loop::LoopTags;
    use crate::topology::input::{LoopInput, SurfaceMeshInput};

    /// A strip of `n` unit quads with chosen bottom edges marked trailing.
    fn strip(n: usize, te: &[usize]) -> MeshLevel {
        let mut nodes = Vec::new();
        for j in 0..2 {
            for i in 0..=n {
                nodes.push([i as f64, j as f64, 0.0]);
            }
        }
        let loops = (0..n)
            .map(|i| LoopInput::new(vec![i, i + 1, i + n + 2, i + n + 1], LoopTags::default()))
            .collect();
        let mut level = MeshLevel::from_input(&SurfaceMeshInput {
            nodes,
            loops,
            ..Default::default()
        })
        .unwrap();
        for &i in te {
            let e = level.edge_between(NodeId::new(i), NodeId::new(i + 1)).unwrap();
            level.edges_mut()[e.idx()].flags.trailing_edge = true;
        }
        level
    }

    #[test]
    fn open_chain_runs_tip_to_tip() {
        let level = strip(4, &[0, 1, 2, 3]);
        let mut diags = Diagnostics::new();
        let (chains, failed) = walk_chains(&level, &ComponentTable::new(), &mut diags);
        assert_eq!(chains.len(), 1);
        assert!(failed.is_empty() && diags.is_empty());
        let c = &chains[0];
        assert!(!c.periodic);
        assert_eq!(c.nodes, (0..5).map(NodeId::new).collect::<Vec<_>>());
        assert_eq!(c.edges.len(), 4);
    }

    #[test]
    fn separate_runs_form_separate_chains() {
        let level = strip(4, &[0, 2, 3]);
        let mut diags = Diagnostics::new();
        let (chains, _) = walk_chains(&level, &ComponentTable::new(), &mut diags);
        assert_eq!(chains.len(), 2);
        let total: usize = chains.iter().map(|c| c.edges.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn closed_ring_is_periodic() {
        let mut level = strip(1, &[]);
        for e in 0..level.num_edges() {
            level.edges_mut()[e].flags.trailing_edge = true;
        }
        let mut diags = Diagnostics::new();
        let (chains, _) = walk_chains(&level, &ComponentTable::new(), &mut diags);
        assert_eq!(chains.len(), 1);
        let c = &chains[0];
        assert!(c.periodic);
        assert_eq!(c.nodes.first(), c.nodes.last());
        assert_eq!(c.distinct_nodes().len(), 4);
    }

    #[test]
    fn junction_node_splits_chains_and_fails_the_component() {
        // Bottom edges 0-1, 1-2 and the rung 1-4 meet at node 1.
        let mut level = strip(2, &[0, 1]);
        let rung = level.edge_between(NodeId::new(1), NodeId::new(4)).unwrap();
        level.edges_mut()[rung.idx()].flags.trailing_edge = true;
        let component = level.edge(rung).component_id;

        let mut diags = Diagnostics::new();
        let (chains, failed) = walk_chains(&level, &ComponentTable::new(), &mut diags);

        assert!(diags.iter().any(|d| *d
            == Diagnostic::JunctionNode {
                node: 1,
                trailing_edges: 3
            }));
        let incomplete: Vec<&Diagnostic> = diags
            .iter()
            .filter(|d| matches!(d, Diagnostic::IncompleteChain { .. }))
            .collect();
        assert_eq!(incomplete.len(), 1);
        assert!(matches!(
            incomplete[0],
            Diagnostic::IncompleteChain { start, end: 1, .. } if *start == 2 || *start == 4
        ));

        let mut seen: Vec<EdgeId> = chains.iter().flat_map(|c| c.edges.clone()).collect();
        seen.sort_unstable();
        let mut trailing: Vec<EdgeId> = (0..level.num_edges())
            .map(EdgeId::new)
            .filter(|&e| level.edge(e).flags.trailing_edge)
            .collect();
        trailing.sort_unstable();
        assert_eq!(seen, trailing);
        assert_eq!(chains.len(), 2);
        assert!(chains.iter().all(|c| !c.periodic));
        assert_eq!(failed, BTreeSet::from([component]));
    }
}
