// Per-attacker aggregated state (spec.md §4.4 / C4).
//
// Keyed by attacker-IP alone, not IP+session — the deliberate cross-protocol
// fusion choice (spec.md §7 REDESIGN FLAGS (c)). A new session-id for a
// known IP reuses the same context, which is exactly the mechanism that lets
// an HTTP brute-force inflate the weight of a later SSH reconnaissance
// attempt against the same source.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::accumulator::{RiskLevel, ThreatAccumulator};

const RECONNAISSANCE_TOKENS: &[&str] = &["ls", "ps", "netstat", "ifconfig", "whoami", "id", "uname"];
const LATERAL_MOVEMENT_TOKENS: &[&str] = &["ssh", "scp", "rsync", "ping"];
const PERSISTENCE_TOKENS: &[&str] = &["crontab", "systemctl", "service", "chkconfig"];
const DATA_EXFILTRATION_TOKENS: &[&str] = &["wget", "curl", "nc", "socat", "tar", "zip"];
const ADMIN_USERNAMES: &[&str] = &["admin", "administrator", "root"];

/// First whitespace-separated token of a shell command, the unit behavior
/// tags and the router's L1 predicate key off.
pub fn cmd_base(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or("")
}

fn tags_for_command(base: &str) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if RECONNAISSANCE_TOKENS.contains(&base) {
        tags.push("reconnaissance");
    }
    if LATERAL_MOVEMENT_TOKENS.contains(&base) {
        tags.push("lateral_movement");
    }
    if PERSISTENCE_TOKENS.contains(&base) {
        tags.push("persistence");
    }
    if DATA_EXFILTRATION_TOKENS.contains(&base) {
        tags.push("data_exfiltration");
    }
    tags
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackerContext {
    pub ip: String,
    pub session_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub ssh_command_history: Vec<String>,
    pub login_attempts: Vec<(String, String)>,
    pub tags: HashSet<String>,
    pub risk_multiplier: f64,
    pub accumulator: ThreatAccumulator,
    pub tool_fingerprints: HashSet<String>,
    /// Set once discovery first fires (spec.md §6 MTTD), so the Director
    /// reports mean-time-to-discovery exactly once per session.
    pub discovered: bool,
}

impl AttackerContext {
    pub fn new(ip: String, session_id: String, decay_rate: f64, now: DateTime<Utc>) -> Self {
        Self {
            ip,
            session_id,
            first_seen: now,
            last_seen: now,
            ssh_command_history: Vec::new(),
            login_attempts: Vec::new(),
            tags: HashSet::new(),
            risk_multiplier: 1.0,
            accumulator: ThreatAccumulator::new(decay_rate, now),
            tool_fingerprints: HashSet::new(),
            discovered: false,
        }
    }

    pub fn touch(&mut self, session_id: &str, now: DateTime<Utc>) {
        self.session_id = session_id.to_string();
        self.last_seen = now;
    }

    /// Add `tag` and apply its accumulator update, but only on first sight —
    /// the dedup invariant holds per-context for the whole of its lifetime.
    fn add_tag(&mut self, tag: &str, now: DateTime<Utc>) {
        if self.tags.insert(tag.to_string()) {
            self.accumulator.update(tag, self.risk_multiplier, now);
        }
    }

    pub fn record_ssh_command(&mut self, command: &str, now: DateTime<Utc>) {
        self.ssh_command_history.push(command.to_string());
        self.last_seen = now;
        for tag in tags_for_command(cmd_base(command)) {
            self.add_tag(tag, now);
        }
    }

    /// `privilege_escalation` and `weak_password_attack` only fire when the
    /// username is in the admin set — a non-admin weak password does not
    /// flag here (spec.md §7 REDESIGN FLAGS (b), preserved deliberately).
    pub fn record_login_attempt(&mut self, username: &str, password: &str, now: DateTime<Utc>) {
        self.login_attempts
            .push((username.to_string(), password.to_string()));
        self.last_seen = now;
        if ADMIN_USERNAMES.contains(&username) {
            self.add_tag("privilege_escalation", now);
            self.add_tag("weak_password_attack", now);
            self.risk_multiplier += 0.5;
        }
    }

    pub fn risk_level(&self, now: DateTime<Utc>) -> RiskLevel {
        self.accumulator.risk_level(now)
    }

    pub fn score(&self, now: DateTime<Utc>) -> f64 {
        self.accumulator.score(now)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> ContextSummary {
        ContextSummary {
            duration_seconds: (now - self.first_seen).num_milliseconds().max(0) as f64 / 1000.0,
            command_count: self.ssh_command_history.len(),
            tags: self.tags.clone(),
            threat_level: self.risk_level(now),
        }
    }
}

/// Explicit, non-dynamic view of a context used by the Feature Extractor
/// and response generators, instead of passing an ad-hoc dictionary
/// (spec.md §9 "Dynamic typing removal").
#[derive(Debug, Clone)]
pub struct ContextSummary {
    pub duration_seconds: f64,
    pub command_count: usize,
    pub tags: HashSet<String>,
    pub threat_level: RiskLevel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn tags_are_deduplicated() {
        let t0 = now();
        let mut ctx = AttackerContext::new("1.2.3.4".into(), "s1".into(), 0.5, t0);
        ctx.record_ssh_command("ls -la", t0);
        ctx.record_ssh_command("ls -la", t0);
        assert_eq!(ctx.tags.iter().filter(|t| *t == "reconnaissance").count(), 1);
    }

    #[test]
    fn admin_login_bumps_risk_multiplier_and_both_tags() {
        let t0 = now();
        let mut ctx = AttackerContext::new("1.2.3.4".into(), "s1".into(), 0.5, t0);
        ctx.record_login_attempt("admin", "password123", t0);
        assert!(ctx.tags.contains("privilege_escalation"));
        assert!(ctx.tags.contains("weak_password_attack"));
        assert!((ctx.risk_multiplier - 1.5).abs() < 1e-9);
    }

    #[test]
    fn non_admin_weak_password_does_not_flag() {
        let t0 = now();
        let mut ctx = AttackerContext::new("1.2.3.4".into(), "s1".into(), 0.5, t0);
        ctx.record_login_attempt("guest", "password123", t0);
        assert!(ctx.tags.is_empty());
        assert!((ctx.risk_multiplier - 1.0).abs() < 1e-9);
    }

    #[test]
    fn risk_multiplier_never_decreases() {
        let t0 = now();
        let mut ctx = AttackerContext::new("1.2.3.4".into(), "s1".into(), 0.5, t0);
        ctx.record_login_attempt("root", "toor", t0);
        let after_first = ctx.risk_multiplier;
        ctx.record_login_attempt("root", "toor", t0 + Duration::seconds(1));
        assert!(ctx.risk_multiplier >= after_first);
    }

    #[test]
    fn cross_protocol_correlation_scenario() {
        let t0 = now();
        let mut ctx = AttackerContext::new("192.168.1.100".into(), "s1".into(), 0.5, t0);
        ctx.record_login_attempt("admin", "password123", t0);
        assert!((ctx.risk_multiplier - 1.5).abs() < 1e-9);
        assert!(ctx.score(t0) >= 10.0);

        ctx.touch("s2", t0);
        ctx.record_ssh_command("whoami", t0);
        assert!(ctx.score(t0) >= 17.0);

        ctx.record_ssh_command("ssh user@10.0.0.2", t0);
        assert!(ctx.score(t0) >= 40.0);
    }
}
