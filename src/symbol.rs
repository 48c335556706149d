// Bi-directional string<->integer interning for the PST predictor.
//
// Ids are assigned densely from 0 in first-seen order. The table is the
// unit of (de)serialization round-trip exactness the predictor depends on:
// `to_dict`/`from_dict` on the predictor must reproduce id assignments
// exactly, which falls straight out of preserving `next_id` and the two
// maps here.

use std::collections::HashMap;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    str_to_int: HashMap<String, SymbolId>,
    int_to_str: HashMap<SymbolId, String>,
    next_id: u32,
}

// The persisted shape is `{ str_to_int, next_id }` (see SPEC_FULL.md §6 /
// spec.md §6 Persisted state layout) — `int_to_str` is a derived index kept
// only in memory for O(1) reverse lookup, and is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct SymbolTableWire {
    str_to_int: HashMap<String, u32>,
    next_id: u32,
}

impl Serialize for SymbolTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = SymbolTableWire {
            str_to_int: self
                .str_to_int
                .iter()
                .map(|(k, v)| (k.clone(), v.0))
                .collect(),
            next_id: self.next_id,
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SymbolTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SymbolTableWire::deserialize(deserializer)?;
        let mut str_to_int = HashMap::with_capacity(wire.str_to_int.len());
        let mut int_to_str = HashMap::with_capacity(wire.str_to_int.len());
        for (text, id) in wire.str_to_int {
            let id = SymbolId(id);
            if id.0 >= wire.next_id {
                return Err(DeError::custom(format!(
                    "symbol id {} is not less than next_id {}",
                    id.0, wire.next_id
                )));
            }
            str_to_int.insert(text.clone(), id);
            int_to_str.insert(id, text);
        }
        Ok(SymbolTable {
            str_to_int,
            int_to_str,
            next_id: wire.next_id,
        })
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, assigning the next dense id on first sight. Returns
    /// the existing id on a repeat.
    pub fn intern(&mut self, text: &str) -> SymbolId {
        if let Some(&id) = self.str_to_int.get(text) {
            return id;
        }
        let id = SymbolId(self.next_id);
        self.next_id += 1;
        self.str_to_int.insert(text.to_string(), id);
        self.int_to_str.insert(id, text.to_string());
        id
    }

    /// Look up an id without interning — used when the caller wants to know
    /// whether a token has ever been observed (e.g. history walking, where
    /// an unknown token is a context break rather than a fresh symbol).
    pub fn lookup_str(&self, text: &str) -> Option<SymbolId> {
        self.str_to_int.get(text).copied()
    }

    pub fn lookup(&self, id: SymbolId) -> Option<&str> {
        self.int_to_str.get(&id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.str_to_int.len()
    }

    pub fn is_empty(&self) -> bool {
        self.str_to_int.is_empty()
    }
}

impl PartialEq for SymbolTable {
    fn eq(&self, other: &Self) -> bool {
        self.next_id == other.next_id && self.str_to_int == other.str_to_int
    }
}
