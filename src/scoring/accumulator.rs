// Weighted, time-decaying threat score (spec.md §4.3 / C3).
//
// Decay is applied lazily: every read and every update first rolls the
// score forward to "now" before doing anything else, so a session that's
// been idle for an hour doesn't need a background sweep to reflect that —
// the next touch pays for all of the elapsed decay at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point value per named event kind. Unknown kinds fall back to 2.0 — enough
/// to move the needle without letting an attacker invent cheap categories
/// that accumulate nothing.
fn event_weight(kind: &str) -> f64 {
    match kind {
        "reconnaissance" => 5.0,
        "weak_password_attack" => 10.0,
        "lateral_movement" => 15.0,
        "persistence" => 20.0,
        "data_exfiltration" => 25.0,
        "privilege_escalation" => 30.0,
        _ => 2.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Elevated,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score <= 20.0 {
            RiskLevel::Low
        } else if score <= 50.0 {
            RiskLevel::Elevated
        } else if score <= 80.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAccumulator {
    score: f64,
    decay_rate: f64,
    last_touched: DateTime<Utc>,
}

impl ThreatAccumulator {
    pub fn new(decay_rate: f64, now: DateTime<Utc>) -> Self {
        Self {
            score: 0.0,
            decay_rate,
            last_touched: now,
        }
    }

    fn decay_to(&mut self, now: DateTime<Utc>) {
        let elapsed_minutes = (now - self.last_touched).num_milliseconds() as f64 / 60_000.0;
        if elapsed_minutes > 0.0 {
            self.score = (self.score - self.decay_rate * elapsed_minutes).max(0.0);
        }
        self.last_touched = now;
    }

    /// Record one event of `kind`, decaying first so the added weight lands
    /// on a current baseline rather than a stale one. `multiplier` is the
    /// context's current `risk_multiplier` — events from a context already
    /// flagged as escalated count for more.
    pub fn update(&mut self, kind: &str, multiplier: f64, now: DateTime<Utc>) {
        self.decay_to(now);
        self.score += event_weight(kind) * multiplier;
    }

    /// Current score after rolling decay forward to `now`. Does not mutate
    /// `last_touched` relative to an actual event — callers that only peek
    /// should not reset the decay clock.
    pub fn score(&self, now: DateTime<Utc>) -> f64 {
        let elapsed_minutes = (now - self.last_touched).num_milliseconds() as f64 / 60_000.0;
        if elapsed_minutes <= 0.0 {
            self.score
        } else {
            (self.score - self.decay_rate * elapsed_minutes).max(0.0)
        }
    }

    pub fn risk_level(&self, now: DateTime<Utc>) -> RiskLevel {
        RiskLevel::from_score(self.score(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn weights_match_table() {
        assert_eq!(event_weight("reconnaissance"), 5.0);
        assert_eq!(event_weight("weak_password_attack"), 10.0);
        assert_eq!(event_weight("lateral_movement"), 15.0);
        assert_eq!(event_weight("persistence"), 20.0);
        assert_eq!(event_weight("data_exfiltration"), 25.0);
        assert_eq!(event_weight("privilege_escalation"), 30.0);
        assert_eq!(event_weight("made_up_kind"), 2.0);
    }

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20.1), RiskLevel::Elevated);
        assert_eq!(RiskLevel::from_score(50.0), RiskLevel::Elevated);
        assert_eq!(RiskLevel::from_score(50.1), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80.1), RiskLevel::Critical);
    }

    #[test]
    fn score_decays_linearly_over_time() {
        let t0 = Utc::now();
        let mut acc = ThreatAccumulator::new(0.5, t0);
        acc.update("persistence", 1.0, t0); // +20.0
        let later = t0 + Duration::minutes(10);
        // 20.0 - 0.5*10 = 15.0
        assert!((acc.score(later) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn decay_never_goes_negative() {
        let t0 = Utc::now();
        let mut acc = ThreatAccumulator::new(1.0, t0);
        acc.update("reconnaissance", 1.0, t0); // +5.0
        let much_later = t0 + Duration::minutes(1000);
        assert_eq!(acc.score(much_later), 0.0);
    }

    #[test]
    fn update_applies_decay_before_adding() {
        let t0 = Utc::now();
        let mut acc = ThreatAccumulator::new(1.0, t0);
        acc.update("privilege_escalation", 1.0, t0); // 30.0
        let t1 = t0 + Duration::minutes(5);
        acc.update("reconnaissance", 1.0, t1); // decays to 25.0, then +5.0 = 30.0
        assert!((acc.score(t1) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn multiplier_scales_the_weight() {
        let t0 = Utc::now();
        let mut acc = ThreatAccumulator::new(0.0, t0);
        acc.update("reconnaissance", 2.0, t0); // 5.0 * 2.0
        assert!((acc.score(t0) - 10.0).abs() < 1e-9);
    }
}
