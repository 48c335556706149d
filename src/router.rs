// Complexity Router (spec.md §4.6 / C6): four exit predicates, each either a
// verdict (short-circuit to the static emulator) or "proceed" to the next
// layer. L0 is the Reflex Filter's own verdict type; L1–L3 share the
// simpler `RouteVerdict` since neither ever blocks or fakes a response —
// the worst they do is fall back to the static path.

use chrono::{DateTime, Utc};

use crate::config::CoreConfig;
use crate::context::{cmd_base, AttackerContext};
use crate::predictor::PredictResult;
use crate::scoring::classifier::BehavioralClassifier;
use crate::scoring::features::extract;

const RECON_SET: &[&str] = &["ls", "whoami", "pwd", "id", "echo", "cat", "ps", "uname"];
const COMPLEX_SET: &[&str] = &["find", "grep", "awk", "sed", "python", "perl", "wget", "curl", "nc"];
const KNOWN_SEQUENCES: &[[&str; 3]] = &[
    ["whoami", "id", "pwd"],
    ["ls", "cat", "pwd"],
    ["uname", "ps", "netstat"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteVerdict {
    Static,
    Proceed,
}

/// L1 (Intuition). `ctx.ssh_command_history` must already include the
/// current command — the Director appends it before running any layer
/// (spec.md §4.8 step 2).
///
/// The "recent" window is deliberately 2 commands, not 3, matching the
/// literal predicate preserved from REDESIGN FLAGS (a): `seq[:-1]` has
/// length 2, so the benign-sequence match can only fire on a 2-command
/// prefix plus the completing command.
pub fn check_l1_exit(
    ctx: &AttackerContext,
    prediction: Option<&PredictResult>,
    config: &CoreConfig,
) -> RouteVerdict {
    let hist = &ctx.ssh_command_history;
    let Some(current) = hist.last() else {
        return RouteVerdict::Proceed;
    };
    let base = cmd_base(current);

    if RECON_SET.contains(&base) {
        let short_history = hist.len() <= 3;
        let completes_known_sequence = hist.len() >= 3 && {
            let recent = [cmd_base(&hist[hist.len() - 3]), cmd_base(&hist[hist.len() - 2])];
            KNOWN_SEQUENCES
                .iter()
                .any(|seq| seq[0] == recent[0] && seq[1] == recent[1] && seq[2] == base)
        };
        if short_history || completes_known_sequence {
            return RouteVerdict::Static;
        }
    }

    if let Some(p) = prediction {
        if p.predicted_token == base && p.confidence >= config.l1_confidence {
            return RouteVerdict::Static;
        }
    }

    RouteVerdict::Proceed
}

/// L2 (Reasoning). Evidence-gated, advisory-only: always returns
/// `Proceed`, but on a high-confidence label bumps `risk_multiplier` by 0.5
/// exactly once per call.
pub fn check_l2_exit(
    ctx: &mut AttackerContext,
    classifier: &BehavioralClassifier,
    config: &CoreConfig,
    now: DateTime<Utc>,
) -> RouteVerdict {
    if ctx.ssh_command_history.len() < 5 || !classifier.is_trained() {
        return RouteVerdict::Proceed;
    }
    let features = extract(&ctx.summary(now));
    let probs = classifier.predict(&features);
    let top_confidence = probs.values().cloned().fold(0.0_f64, f64::max);
    if top_confidence >= config.l2_confidence {
        ctx.risk_multiplier += 0.5;
    }
    RouteVerdict::Proceed
}

/// Novelty score for `cmd`'s base token in `ctx` (spec.md §4.6).
/// `ctx.ssh_command_history` must already include the current command; only
/// prior occurrences (excluding the last entry) count as "seen before".
pub fn novelty_score(ctx: &AttackerContext, cmd: &str) -> f64 {
    let base = cmd_base(cmd);
    let seen_before = ctx
        .ssh_command_history
        .iter()
        .rev()
        .skip(1)
        .any(|c| cmd_base(c) == base);

    let mut score = if seen_before { 0.2 } else { 0.6 };
    if COMPLEX_SET.contains(&base) {
        score += 0.3;
    }
    let arg_count = cmd.split_whitespace().count().saturating_sub(1);
    if arg_count > 3 {
        score += 0.2;
    }
    score.clamp(0.0, 1.0)
}

/// Engagement quality for `ctx` as of `now` (spec.md §4.6).
pub fn engagement_quality(ctx: &AttackerContext, now: DateTime<Utc>) -> f64 {
    if ctx.ssh_command_history.is_empty() {
        return 0.5;
    }
    let session_minutes = ((now - ctx.first_seen).num_milliseconds() as f64 / 60_000.0).max(1.0);
    let rate = ctx.ssh_command_history.len() as f64 / session_minutes;
    let mut score = if (1.0..=5.0).contains(&rate) {
        0.7
    } else if rate > 5.0 {
        0.4
    } else {
        0.3
    };
    score += 0.1 * ctx.tags.len() as f64;
    score.clamp(0.0, 1.0)
}

/// L3 (Strategy): proceed to L4 only when the interaction is either novel
/// enough or engaging enough to be worth the external call; otherwise fall
/// back to the static emulator.
pub fn check_l3_exit(novelty: f64, engagement: f64, config: &CoreConfig) -> RouteVerdict {
    if novelty > config.l3_novelty || engagement < config.l3_engagement {
        RouteVerdict::Proceed
    } else {
        RouteVerdict::Static
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_history(commands: &[&str], now: DateTime<Utc>) -> AttackerContext {
        let mut ctx = AttackerContext::new("1.2.3.4".into(), "s".into(), 0.5, now);
        for c in commands {
            ctx.record_ssh_command(c, now);
        }
        ctx
    }

    #[test]
    fn l1_short_history_recon_routes_static() {
        let now = Utc::now();
        let ctx = ctx_with_history(&["ls"], now);
        let config = CoreConfig::default();
        assert_eq!(check_l1_exit(&ctx, None, &config), RouteVerdict::Static);
    }

    #[test]
    fn l1_known_sequence_completion_routes_static() {
        let now = Utc::now();
        // 4+ entries so "short history" (<=3) no longer fires on its own;
        // the known-sequence completion predicate must do the work.
        let ctx = ctx_with_history(&["pwd", "ls", "cat", "pwd"], now);
        let config = CoreConfig::default();
        assert_eq!(check_l1_exit(&ctx, None, &config), RouteVerdict::Static);
    }

    #[test]
    fn l1_three_command_window_not_four() {
        // recent is the 2 commands before current, not 3 — a sequence whose
        // first element would only match a 3-wide window must not fire.
        let now = Utc::now();
        let ctx = ctx_with_history(&["echo", "whoami", "id", "pwd"], now);
        let config = CoreConfig::default();
        // recent = [whoami, id], cmd = pwd -> matches [whoami,id,pwd] regardless
        assert_eq!(check_l1_exit(&ctx, None, &config), RouteVerdict::Static);
    }

    #[test]
    fn l1_predictor_confidence_routes_static() {
        let now = Utc::now();
        let ctx = ctx_with_history(&["find", "find", "find", "find", "mysterious_tool"], now);
        let config = CoreConfig::default();
        let prediction = PredictResult {
            predicted_token: "mysterious_tool".to_string(),
            confidence: 0.9,
            order_used: 1,
            distribution: vec![],
        };
        assert_eq!(check_l1_exit(&ctx, Some(&prediction), &config), RouteVerdict::Static);
    }

    #[test]
    fn l2_evidence_gate_blocks_under_five_commands() {
        let now = Utc::now();
        let mut ctx = ctx_with_history(&["a", "b"], now);
        let classifier = BehavioralClassifier::cold_start();
        let config = CoreConfig::default();
        let before = ctx.risk_multiplier;
        let v = check_l2_exit(&mut ctx, &classifier, &config, now);
        assert_eq!(v, RouteVerdict::Proceed);
        assert_eq!(ctx.risk_multiplier, before);
    }

    #[test]
    fn l2_bumps_risk_multiplier_once_with_enough_evidence() {
        let now = Utc::now();
        let mut ctx = ctx_with_history(&["ls", "whoami", "id", "ps", "uname"], now);
        let classifier = BehavioralClassifier::cold_start();
        let mut config = CoreConfig::default();
        config.l2_confidence = 0.0; // force high-confidence branch deterministically
        let before = ctx.risk_multiplier;
        let v = check_l2_exit(&mut ctx, &classifier, &config, now);
        assert_eq!(v, RouteVerdict::Proceed);
        assert!((ctx.risk_multiplier - (before + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn l3_high_novelty_proceeds() {
        let config = CoreConfig::default();
        assert_eq!(check_l3_exit(0.9, 0.5, &config), RouteVerdict::Proceed);
    }

    #[test]
    fn l3_low_everything_routes_static() {
        let config = CoreConfig::default();
        assert_eq!(check_l3_exit(0.2, 0.5, &config), RouteVerdict::Static);
    }

    #[test]
    fn novelty_never_seen_starts_high() {
        let now = Utc::now();
        let ctx = ctx_with_history(&["python exploit.py a b c d"], now);
        // base "python" is complex (+0.3), never seen (0.6), 5 args (+0.2) -> clipped to 1.0
        assert_eq!(novelty_score(&ctx, "python exploit.py a b c d"), 1.0);
    }
}
