// Bounded, concurrent, LRU-evicting session store (spec.md §4.7 / C7).
//
// Keyed by attacker-IP (matching the Attacker Context's own keying). Per-IP
// mutation is serialised by the per-context `tokio::sync::Mutex`; cross-IP
// operations (insert, evict, prune) take the store-level
// `tokio::sync::RwLock` exclusively. `learn` never rejects — it evicts to
// make room instead, mirroring the teacher's bounded-resource discipline of
// trading correctness-under-load for availability rather than erroring out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::context::AttackerContext;

/// Rough per-command memory cost used for the store-wide memory estimate.
/// Not meant to be exact — just a conservative constant that scales with
/// the thing most likely to grow unbounded (command history length).
const BYTES_PER_COMMAND: u64 = 128;
const BASE_CONTEXT_BYTES: u64 = 256;

struct Entry {
    context: Arc<Mutex<AttackerContext>>,
    last_touched: DateTime<Utc>,
}

pub struct SessionStore {
    entries: RwLock<HashMap<String, Entry>>,
    max_sessions: usize,
    max_memory_bytes: u64,
    decay_rate: f64,
}

impl SessionStore {
    pub fn new(max_sessions: usize, max_memory_mb: u64, decay_rate: f64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_sessions,
            max_memory_bytes: max_memory_mb * 1024 * 1024,
            decay_rate,
        }
    }

    /// Fetch the context for `ip`, creating it (and evicting to make room,
    /// if needed) if this is the first time this IP has been seen.
    pub async fn get_or_create(&self, ip: &str, session_id: &str, now: DateTime<Utc>) -> Arc<Mutex<AttackerContext>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(ip) {
                return entry.context.clone();
            }
        }

        self.evict_for_capacity().await;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(ip.to_string()).or_insert_with(|| Entry {
            context: Arc::new(Mutex::new(AttackerContext::new(
                ip.to_string(),
                session_id.to_string(),
                self.decay_rate,
                now,
            ))),
            last_touched: now,
        });
        entry.last_touched = now;
        entry.context.clone()
    }

    pub async fn touch(&self, ip: &str, now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(ip) {
            entry.last_touched = now;
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn estimated_bytes(&self, entries: &HashMap<String, Entry>) -> u64 {
        let mut total = 0u64;
        for entry in entries.values() {
            let ctx = entry.context.lock().await;
            total += BASE_CONTEXT_BYTES + ctx.ssh_command_history.len() as u64 * BYTES_PER_COMMAND;
        }
        total
    }

    /// Evict until both the session-count cap and the memory-estimate cap
    /// are satisfied. Count eviction drops the single oldest entry;
    /// memory pressure drops the oldest 20% at once, since a single
    /// eviction is unlikely to bring a memory overshoot back under cap.
    async fn evict_for_capacity(&self) {
        loop {
            let mut entries = self.entries.write().await;
            if entries.len() < self.max_sessions {
                let estimate = self.estimated_bytes_sync(&entries).await;
                if estimate <= self.max_memory_bytes {
                    break;
                }
                let n_to_evict = ((entries.len() as f64) * 0.2).ceil() as usize;
                evict_oldest(&mut entries, n_to_evict.max(1));
                continue;
            }
            evict_oldest(&mut entries, 1);
            break;
        }
    }

    async fn estimated_bytes_sync(&self, entries: &HashMap<String, Entry>) -> u64 {
        self.estimated_bytes(entries).await
    }
}

fn evict_oldest(entries: &mut HashMap<String, Entry>, n: usize) {
    let mut keys: Vec<(String, DateTime<Utc>)> = entries
        .iter()
        .map(|(k, v)| (k.clone(), v.last_touched))
        .collect();
    keys.sort_by_key(|(_, t)| *t);
    for (key, _) in keys.into_iter().take(n) {
        entries.remove(&key);
    }
}
