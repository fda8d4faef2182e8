//! Recoverable topology findings.
//!
//! These are not errors: preprocessing continues and the affected surface is
//! treated conservatively (e.g. as non-lifting). Every diagnostic is logged at
//! `warn` when it is recorded.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

/// One finding about the input topology.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// A lifting component has no trailing edge; it sheds no wake.
    NoTrailingEdge { component_id: u32 },
    /// A trailing-edge chain ends at a node that is neither a tip nor its
    /// own start.
    IncompleteChain { component_id: u32, start: usize, end: usize },
    /// More than two trailing edges meet at a node.
    JunctionNode { node: usize, trailing_edges: usize },
    /// Consecutive nodes of an explicit chain share no edge.
    BrokenExplicitChain { a: usize, b: usize },
    /// An input loop collapsed during welding and was removed.
    DroppedLoop { loop_index: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTrailingEdge { component_id } => {
                write!(f, "lifting component {component_id} has no trailing edge")
            }
            Self::IncompleteChain {
                component_id,
                start,
                end,
            } => write!(
                f,
                "trailing-edge chain {start}..{end} of component {component_id} cannot be finished"
            ),
            Self::JunctionNode {
                node,
                trailing_edges,
            } => write!(f, "{trailing_edges} trailing edges meet at node {node}"),
            Self::BrokenExplicitChain { a, b } => {
                write!(f, "explicit chain nodes {a} and {b} share no edge")
            }
            Self::DroppedLoop { loop_index } => {
                write!(f, "input loop {loop_index} collapsed and was dropped")
            }
        }
    }
}

/// Ordered collection of diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a diagnostic.
    pub fn push(&mut self, d: Diagnostic) {
        warn!("{d}");
        self.0.push(d);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }
}
