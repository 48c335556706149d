// 7-dimensional feature vector extraction (spec.md §3, §4.5 / C5 Extractor).
//
// Pure function of a context summary; no I/O, no mutation. Order is fixed
// and must never change without also retraining the classifier.

use crate::context::ContextSummary;

pub const FEATURE_DIM: usize = 7;

const CLIP_MAX: f64 = 1.0e6;

/// `{log1p(duration_seconds), commands_per_minute, reconnaissance_flag,
/// lateral_flag, priv_esc_flag, exfil_flag, pattern_count}`.
pub type FeatureVector = [f64; FEATURE_DIM];

fn clip(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, CLIP_MAX)
    }
}

fn flag(tags: &std::collections::HashSet<String>, tag: &str) -> f64 {
    if tags.contains(tag) {
        1.0
    } else {
        0.0
    }
}

pub fn extract(summary: &ContextSummary) -> FeatureVector {
    let duration_seconds = summary.duration_seconds.max(0.0);
    let minutes = (duration_seconds / 60.0).max(0.01);
    let commands_per_minute = summary.command_count as f64 / minutes;

    [
        clip(duration_seconds.ln_1p()),
        clip(commands_per_minute),
        flag(&summary.tags, "reconnaissance"),
        flag(&summary.tags, "lateral_movement"),
        flag(&summary.tags, "privilege_escalation"),
        flag(&summary.tags, "data_exfiltration"),
        clip(summary.tags.len() as f64),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AttackerContext;
    use chrono::{Duration, Utc};

    #[test]
    fn fresh_context_has_zero_rate_and_flags() {
        let t0 = Utc::now();
        let ctx = AttackerContext::new("1.2.3.4".into(), "s".into(), 0.5, t0);
        let v = extract(&ctx.summary(t0));
        assert_eq!(v[0], 0.0_f64.ln_1p());
        assert!(v.iter().all(|x| !x.is_nan() && x.is_finite()));
    }

    #[test]
    fn reconnaissance_tag_sets_its_flag() {
        let t0 = Utc::now();
        let mut ctx = AttackerContext::new("1.2.3.4".into(), "s".into(), 0.5, t0);
        ctx.record_ssh_command("whoami", t0);
        let v = extract(&ctx.summary(t0 + Duration::seconds(5)));
        assert_eq!(v[2], 1.0);
        assert_eq!(v[3], 0.0);
        assert_eq!(v[6], 1.0);
    }

    #[test]
    fn never_nan_or_infinite_even_with_zero_duration() {
        let t0 = Utc::now();
        let ctx = AttackerContext::new("1.2.3.4".into(), "s".into(), 0.5, t0);
        let v = extract(&ctx.summary(t0));
        assert!(v.iter().all(|x| x.is_finite()));
    }
}
