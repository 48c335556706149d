// Persistence trait — backend-agnostic interface for predictor and
// classifier blobs (spec.md §6 "Persisted state layout", §4.8 lifecycle).
//
// `FileModelStore` is the only implementation this crate ships, mirroring
// the spec's `<storage_path>/ssh_markov.json` / `http_markov.json` layout.
// The trait exists so a deployment embedding this core inside a larger
// service can swap in an object-store or database-backed implementation
// without touching the Director.

use async_trait::async_trait;

#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Load raw JSON for `key` (e.g. "ssh_markov", "http_markov",
    /// "classifier"), or `None` if nothing is persisted yet.
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Persist raw JSON for `key`, overwriting any prior blob.
    async fn save(&self, key: &str, json: &str) -> anyhow::Result<()>;
}
