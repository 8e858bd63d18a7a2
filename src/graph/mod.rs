// Reachability graph - symbols discovered during closure and the edge that found each one

mod edge;
mod symbol;

pub use edge::EdgeKind;
pub use symbol::{BehaviorId, MemberId, Symbol};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::HashMap;

/// Node and edge counts per symbol kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SymbolCounts {
    pub units: usize,
    pub behaviors: usize,
    pub members: usize,
}

/// The reachable set, stored as a graph.
///
/// Symbols are only ever added. Every node except the roots has exactly one
/// incoming edge: the reference through which it was first discovered.
#[derive(Debug)]
pub struct SymbolGraph {
    inner: DiGraph<Symbol, EdgeKind>,
    node_map: HashMap<Symbol, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl SymbolGraph {
    pub fn new() -> Self {
        Self {
            inner: DiGraph::new(),
            node_map: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Add `symbol`, discovered from `from` (or as a root); returns its node
    /// and whether it was new. Known symbols are left untouched.
    pub fn insert(&mut self, symbol: Symbol, from: Option<NodeIndex>, kind: EdgeKind) -> (NodeIndex, bool) {
        if let Some(&idx) = self.node_map.get(&symbol) {
            return (idx, false);
        }
        let idx = self.inner.add_node(symbol.clone());
        self.node_map.insert(symbol, idx);
        match from {
            Some(parent) => {
                self.inner.add_edge(parent, idx, kind);
            }
            None => self.roots.push(idx),
        }
        (idx, true)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.node_map.contains_key(symbol)
    }

    pub fn contains_unit(&self, name: &str) -> bool {
        self.contains(&Symbol::unit(name))
    }

    pub fn node_index(&self, symbol: &Symbol) -> Option<NodeIndex> {
        self.node_map.get(symbol).copied()
    }

    pub fn symbol(&self, idx: NodeIndex) -> Option<&Symbol> {
        self.inner.node_weight(idx)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.inner.node_weights()
    }

    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.symbols().filter_map(|s| match s {
            Symbol::Unit { name } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn behaviors(&self) -> impl Iterator<Item = &BehaviorId> {
        self.symbols().filter_map(|s| match s {
            Symbol::Behavior(id) => Some(id),
            _ => None,
        })
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberId> {
        self.symbols().filter_map(|s| match s {
            Symbol::Member(id) => Some(id),
            _ => None,
        })
    }

    pub fn counts(&self) -> SymbolCounts {
        let mut counts = SymbolCounts::default();
        for symbol in self.symbols() {
            match symbol {
                Symbol::Unit { .. } => counts.units += 1,
                Symbol::Behavior(_) => counts.behaviors += 1,
                Symbol::Member(_) => counts.members += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    pub fn roots(&self) -> impl Iterator<Item = &Symbol> {
        self.roots.iter().filter_map(|idx| self.inner.node_weight(*idx))
    }

    /// Discovery chain from a root to `symbol`, root first.
    /// Each step carries the edge that led to it (`None` for the root).
    pub fn explain(&self, symbol: &Symbol) -> Option<Vec<(Option<EdgeKind>, &Symbol)>> {
        let mut idx = self.node_index(symbol)?;
        let mut chain = Vec::new();
        loop {
            let incoming = self
                .inner
                .edges_directed(idx, petgraph::Direction::Incoming)
                .next();
            let node = self.inner.node_weight(idx)?;
            match incoming {
                Some(edge) => {
                    chain.push((Some(*edge.weight()), node));
                    idx = edge.source();
                }
                None => {
                    chain.push((None, node));
                    break;
                }
            }
        }
        chain.reverse();
        Some(chain)
    }

    /// Get the underlying petgraph for advanced operations
    pub fn inner(&self) -> &DiGraph<Symbol, EdgeKind> {
        &self.inner
    }
}

impl Default for SymbolGraph {
    fn default() -> Self {
        Self::new()
    }
}
