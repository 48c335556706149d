// One context in the probabilistic suffix tree.
//
// `children` maps a symbol to the node reached by prepending that symbol to
// this node's context (i.e. a longer, more specific context one token
// further back in history — see spec.md §3 PST Node). `total_count` is
// always the sum of `counts`; this invariant is checked directly in tests
// rather than re-derived on every read, since recomputing a sum per lookup
// would defeat the point of caching it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::symbol::SymbolId;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PstNode {
    pub counts: HashMap<SymbolId, u64>,
    pub total_count: u64,
    pub children: HashMap<SymbolId, PstNode>,
}

impl PstNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more observation of `target` in this context.
    pub fn observe(&mut self, target: SymbolId) {
        *self.counts.entry(target).or_insert(0) += 1;
        self.total_count += 1;
    }

    /// Number of distinct successor symbols observed at this node — the
    /// `u_i` term in the Kneser-Ney recursion (spec.md §4.2 step 4).
    pub fn distinct_successors(&self) -> u64 {
        self.counts.len() as u64
    }

    pub fn count_of(&self, symbol: SymbolId) -> u64 {
        self.counts.get(&symbol).copied().unwrap_or(0)
    }

    /// Drop any child whose total_count is below `min_count`, recursing on
    /// survivors. A node's own counts are untouched — pruning only removes
    /// deeper context, never the context's own observations.
    pub fn prune(&mut self, min_count: u64) {
        self.children.retain(|_, child| child.total_count >= min_count);
        for child in self.children.values_mut() {
            child.prune(min_count);
        }
    }

    /// Check the `total_count == sum(counts)` and `children deeper than
    /// self` invariants recursively. Used by tests and anywhere
    /// constructing a tree from untrusted data (deserialization).
    pub fn check_invariants(&self, depth: usize, max_order: usize) -> bool {
        if depth > max_order {
            return false;
        }
        let sum: u64 = self.counts.values().sum();
        if sum != self.total_count {
            return false;
        }
        self.children
            .values()
            .all(|c| c.check_invariants(depth + 1, max_order))
    }
}
