// Degradation-only health state machine (spec.md §4.7 / C7).
//
// Level transitions are monotone non-increasing in capability between
// manual resets. This module only computes *what level the observed
// CPU/memory figures imply* and enforces the downward-only discipline;
// sampling CPU/memory is the caller's job (an external collaborator per
// spec.md §6), kept out of this crate's non-goals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DegradationLevel {
    Offline = 0,
    ObserverOnly = 1,
    SafeMode = 2,
    Normal = 3,
}

impl DegradationLevel {
    fn from_load(cpu_pct: f64, mem_pct: f64, fatal: bool) -> Self {
        if fatal {
            DegradationLevel::Offline
        } else if cpu_pct > 75.0 || mem_pct > 80.0 {
            DegradationLevel::ObserverOnly
        } else if cpu_pct > 60.0 || mem_pct > 70.0 {
            DegradationLevel::SafeMode
        } else {
            DegradationLevel::Normal
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthState {
    level: DegradationLevel,
    last_change: DateTime<Utc>,
}

impl HealthState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            level: DegradationLevel::Normal,
            last_change: now,
        }
    }

    pub fn level(&self) -> DegradationLevel {
        self.level
    }

    /// Fold a new CPU/memory observation in. The implied level can only
    /// move the state *down* (less capable) — recovery never happens here,
    /// only via `reset`.
    pub fn observe(&mut self, cpu_pct: f64, mem_pct: f64, fatal: bool, now: DateTime<Utc>) {
        let implied = DegradationLevel::from_load(cpu_pct, mem_pct, fatal);
        if implied < self.level {
            self.level = implied;
            self.last_change = now;
        }
    }

    /// Explicit manual recovery — the only way `level` can increase.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.level = DegradationLevel::Normal;
        self.last_change = now;
    }
}

/// Tracks per-request success to trip the passthrough failsafe: when the
/// rolling error rate exceeds 5% over at least 10 requests, the Director
/// should return empty responses and let the outer service pass traffic
/// through unchanged (spec.md §4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassthroughFailsafe {
    total: u64,
    errors: u64,
}

impl PassthroughFailsafe {
    pub fn record(&mut self, ok: bool) {
        self.total += 1;
        if !ok {
            self.errors += 1;
        }
    }

    pub fn should_failover(&self) -> bool {
        self.total >= 10 && (self.errors as f64 / self.total as f64) > 0.05
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_only_moves_downward() {
        let t0 = Utc::now();
        let mut h = HealthState::new(t0);
        h.observe(90.0, 10.0, false, t0); // cpu>75 -> ObserverOnly
        assert_eq!(h.level(), DegradationLevel::ObserverOnly);
        h.observe(10.0, 10.0, false, t0); // implies Normal, but must not recover
        assert_eq!(h.level(), DegradationLevel::ObserverOnly);
    }

    #[test]
    fn fatal_observation_goes_offline() {
        let t0 = Utc::now();
        let mut h = HealthState::new(t0);
        h.observe(0.0, 0.0, true, t0);
        assert_eq!(h.level(), DegradationLevel::Offline);
    }

    #[test]
    fn reset_restores_normal() {
        let t0 = Utc::now();
        let mut h = HealthState::new(t0);
        h.observe(90.0, 10.0, false, t0);
        h.reset(t0);
        assert_eq!(h.level(), DegradationLevel::Normal);
    }

    #[test]
    fn failsafe_trips_past_five_percent_over_ten_requests() {
        let mut f = PassthroughFailsafe::default();
        for _ in 0..9 {
            f.record(true);
        }
        f.record(false); // 1/10 = 10% > 5%, and total >= 10
        assert!(f.should_failover());
    }

    #[test]
    fn failsafe_does_not_trip_under_ten_requests() {
        let mut f = PassthroughFailsafe::default();
        f.record(false);
        assert!(!f.should_failover());
    }
}
