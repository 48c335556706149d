// Variable-order probabilistic suffix tree sequence predictor (spec.md §4.2).
//
// `Predictor` owns one symbol table and one PST root per protocol; the
// cognitive director keeps one instance per protocol rather than sharing a
// table, so an SSH command never pollutes HTTP path predictions and vice
// versa (spec.md §8, "per-protocol predictor isolation").

mod node;
mod sanitize;

pub use node::PstNode;

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::symbol::{SymbolId, SymbolTable};

/// Result of a single prediction: the argmax token plus enough of the
/// distribution for the router and telemetry to reason about confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictResult {
    pub predicted_token: String,
    pub confidence: f64,
    pub order_used: usize,
    /// Top-10 candidates by probability, descending, ties broken by
    /// ascending symbol id (first-seen wins — spec.md §4.2 edge cases).
    pub distribution: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Predictor {
    pub max_order: usize,
    pub discount: f64,
    #[serde(rename = "symbol_table")]
    pub symbols: SymbolTable,
    pub root: PstNode,
}

impl Predictor {
    pub fn new(max_order: usize, discount: f64) -> Self {
        Self {
            max_order,
            discount,
            symbols: SymbolTable::new(),
            root: PstNode::new(),
        }
    }

    /// Train on one sequence. For each position `i` and each context length
    /// `k` in `0..=max_order`, the node reached by walking the `k` symbols
    /// immediately preceding `i` (most recent first) observes the symbol at
    /// `i` as a target. `k = 0` is the root, i.e. the unconditional
    /// distribution (spec.md §4.2 "Algorithm (learning)").
    pub fn learn(&mut self, sequence: &[String]) {
        let clean = sanitize::sanitize_sequence(sequence);
        if clean.is_empty() {
            return;
        }
        let symbols: Vec<SymbolId> = clean.iter().map(|t| self.symbols.intern(t)).collect();

        for i in 0..symbols.len() {
            for k in 0..=self.max_order {
                if k > i {
                    break;
                }
                let mut node = &mut self.root;
                for back in 1..=k {
                    let ctx = symbols[i - back];
                    node = node.children.entry(ctx).or_default();
                }
                node.observe(symbols[i]);
            }
        }
    }

    /// Predict the most likely next token given `history`, optionally
    /// restricted to `whitelist` (the L1 hallucination guard — spec.md §8
    /// scenario 5). Returns `None` per the edge cases in spec.md §4.2:
    /// empty history, or history that contains no token ever seen before.
    pub fn predict(&self, history: &[String], whitelist: Option<&HashSet<String>>) -> Option<PredictResult> {
        let clean = sanitize::sanitize_sequence(history);
        if clean.is_empty() {
            return None;
        }
        let has_known = clean.iter().any(|t| self.symbols.lookup_str(t).is_some());
        if !has_known {
            return None;
        }

        // Walk from root consuming history in reverse (most recent first),
        // stopping at the first unknown token or missing/empty child —
        // both are treated as a context break (spec.md §4.2 step 1, 5).
        let mut path: Vec<&PstNode> = vec![&self.root];
        for step in 0..self.max_order {
            if step >= clean.len() {
                break;
            }
            let token = &clean[clean.len() - 1 - step];
            let Some(id) = self.symbols.lookup_str(token) else {
                break;
            };
            let current = *path.last().unwrap();
            match current.children.get(&id) {
                Some(child) if child.total_count > 0 => path.push(child),
                _ => break,
            }
        }
        let order_used = path.len() - 1;

        // Candidate set: union of successors across every node on the path,
        // intersected with the whitelist if one was supplied.
        let mut candidates: HashSet<SymbolId> = HashSet::new();
        for node in &path {
            candidates.extend(node.counts.keys().copied());
        }
        if let Some(wl) = whitelist {
            let allowed: HashSet<SymbolId> = wl
                .iter()
                .filter_map(|t| self.symbols.lookup_str(t))
                .collect();
            candidates.retain(|c| allowed.contains(c));
        }
        if candidates.is_empty() {
            return None;
        }

        let mut scored: Vec<(SymbolId, f64)> = candidates
            .into_iter()
            .map(|c| (c, self.kneser_ney(&path, c)))
            .collect();
        // Descending probability; ties broken by ascending id (first-seen).
        scored.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal) {
            Ordering::Equal => a.0 .0.cmp(&b.0 .0),
            other => other,
        });

        let (top_id, top_prob) = scored[0];
        let predicted_token = self.symbols.lookup(top_id)?.to_string();
        let distribution = scored
            .into_iter()
            .take(10)
            .filter_map(|(id, p)| self.symbols.lookup(id).map(|s| (s.to_string(), p)))
            .collect();

        Some(PredictResult {
            predicted_token,
            confidence: top_prob,
            order_used,
            distribution,
        })
    }

    /// Bottom-up Kneser-Ney interpolation along `path` (root first) for
    /// candidate `c` (spec.md §4.2 step 4):
    ///   P_0(c) = count_0(c) / total_0
    ///   P_i(c) = max(count_i(c) - d, 0) / total_i
    ///            + d * distinct_i / total_i * P_{i-1}(c)
    fn kneser_ney(&self, path: &[&PstNode], c: SymbolId) -> f64 {
        let mut p = 0.0;
        for node in path {
            if node.total_count == 0 {
                continue;
            }
            let total = node.total_count as f64;
            let count = node.count_of(c) as f64;
            let distinct = node.distinct_successors() as f64;
            let discounted = (count - self.discount).max(0.0) / total;
            let backoff_weight = self.discount * distinct / total;
            p = discounted + backoff_weight * p;
        }
        p
    }

    /// Drop deep, sparsely-observed contexts. Delegates straight to the root
    /// node; the root itself is never pruned away.
    pub fn prune(&mut self, min_count: u64) {
        self.root.prune(min_count);
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::CorruptModel(e.to_string()))
    }

    /// Restore a predictor from a persisted blob. Malformed JSON or an
    /// on-disk tree that fails `PstNode::check_invariants` is reported as
    /// `CorruptModel` so the director can fall back to a fresh model rather
    /// than propagate a parse error to the caller.
    pub fn from_json(data: &str) -> Result<Self, CoreError> {
        let predictor: Predictor =
            serde_json::from_str(data).map_err(|e| CoreError::CorruptModel(e.to_string()))?;
        if !predictor.root.check_invariants(0, predictor.max_order) {
            return Err(CoreError::CorruptModel(
                "persisted PST violates total_count/depth invariants".to_string(),
            ));
        }
        Ok(predictor)
    }
}
