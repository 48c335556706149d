// Central configuration for the cognitive pipeline.
//
// Mirrors the `Config` record in SPEC_FULL.md §6. Defaults match the spec
// exactly; `from_env` follows the teacher's pattern of env-var-first
// configuration with typed fallbacks, for the CLI binary to use. Library
// callers embedding the pipeline in a larger service can just construct
// `CoreConfig::default()` and override fields directly.

use std::env;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Deployment mode. Observation: L1–L4 never influence the response
/// (predictors still learn). Engagement: L4 may be invoked on novel
/// interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Observation,
    Engagement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub max_order_ssh: usize,
    pub max_order_http: usize,
    pub discount: f64,
    pub l1_confidence: f64,
    pub l2_confidence: f64,
    pub l3_novelty: f64,
    pub l3_engagement: f64,
    /// Points lost per minute of inattention, applied by the threat accumulator.
    pub decay_rate: f64,
    pub max_sessions: usize,
    pub max_ai_memory_mb: u64,
    pub timeout_s: u64,
    pub mode: Mode,
    /// When false, the Router's L1 static-route predicate is disabled even
    /// outside the health-driven observation window forced by §4.8 step 4.
    pub l1_influence: bool,
    /// Directory for persisted predictor/classifier blobs.
    pub storage_path: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_order_ssh: 3,
            max_order_http: 2,
            discount: 0.5,
            l1_confidence: 0.6,
            l2_confidence: 0.8,
            l3_novelty: 0.7,
            l3_engagement: 0.3,
            decay_rate: 0.5,
            max_sessions: 10_000,
            max_ai_memory_mb: 256,
            timeout_s: 5,
            mode: Mode::default(),
            l1_influence: true,
            storage_path: "./storage".to_string(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables, falling back to the
    /// spec defaults for anything unset. Call `dotenvy::dotenv()` first if
    /// you want a `.env` file to populate the environment.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_order_ssh: env_usize("CORTEX_MAX_ORDER_SSH", d.max_order_ssh),
            max_order_http: env_usize("CORTEX_MAX_ORDER_HTTP", d.max_order_http),
            discount: env_f64("CORTEX_DISCOUNT", d.discount),
            l1_confidence: env_f64("CORTEX_L1_CONFIDENCE", d.l1_confidence),
            l2_confidence: env_f64("CORTEX_L2_CONFIDENCE", d.l2_confidence),
            l3_novelty: env_f64("CORTEX_L3_NOVELTY", d.l3_novelty),
            l3_engagement: env_f64("CORTEX_L3_ENGAGEMENT", d.l3_engagement),
            decay_rate: env_f64("CORTEX_DECAY_RATE", d.decay_rate),
            max_sessions: env_usize("CORTEX_MAX_SESSIONS", d.max_sessions),
            max_ai_memory_mb: env_u64("CORTEX_MAX_AI_MEMORY_MB", d.max_ai_memory_mb),
            timeout_s: env_u64("CORTEX_TIMEOUT_S", d.timeout_s),
            mode: match env::var("CORTEX_MODE").as_deref() {
                Ok("engagement") => Mode::Engagement,
                _ => Mode::Observation,
            },
            l1_influence: env::var("CORTEX_L1_INFLUENCE")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(d.l1_influence),
            storage_path: env::var("CORTEX_STORAGE_PATH").unwrap_or(d.storage_path),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }

    /// Validate range invariants. Called once at startup; an invalid config
    /// is a construction-time error, not something the pipeline should try
    /// to fail open around.
    pub fn validate(&self) -> Result<()> {
        if self.max_order_ssh == 0 || self.max_order_http == 0 {
            bail!("max_order must be >= 1");
        }
        if !(0.0..1.0).contains(&self.discount) {
            bail!("discount must be in (0, 1), got {}", self.discount);
        }
        for (name, v) in [
            ("l1_confidence", self.l1_confidence),
            ("l2_confidence", self.l2_confidence),
            ("l3_novelty", self.l3_novelty),
            ("l3_engagement", self.l3_engagement),
        ] {
            if !(0.0..=1.0).contains(&v) {
                bail!("{name} must be in [0, 1], got {v}");
            }
        }
        if self.decay_rate < 0.0 {
            bail!("decay_rate must be >= 0");
        }
        if self.max_sessions == 0 {
            bail!("max_sessions must be >= 1");
        }
        Ok(())
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = CoreConfig::default();
        assert_eq!(c.max_order_ssh, 3);
        assert_eq!(c.max_order_http, 2);
        assert!((c.discount - 0.5).abs() < 1e-9);
        assert!((c.l1_confidence - 0.6).abs() < 1e-9);
        assert!((c.l2_confidence - 0.8).abs() < 1e-9);
        assert!((c.l3_novelty - 0.7).abs() < 1e-9);
        assert!((c.l3_engagement - 0.3).abs() < 1e-9);
        assert_eq!(c.mode, Mode::Observation);
    }

    #[test]
    fn validate_rejects_bad_discount() {
        let mut c = CoreConfig::default();
        c.discount = 1.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(CoreConfig::default().validate().is_ok());
    }
}
