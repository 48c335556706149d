// External input types (spec.md §7 REDESIGN FLAGS "Dynamic typing removal").
//
// The payload is a tagged variant over exactly the two protocol shapes the
// core understands — no dynamically-typed dict ever crosses into the
// pipeline.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub enum Payload {
    SshCommand { command: String },
    HttpLogin { username: String, password: String },
}

#[derive(Debug, Clone)]
pub struct Interaction {
    pub attacker_ip: String,
    pub session_id: String,
    pub payload: Payload,
    pub received_at: DateTime<Utc>,
}
