// Telemetry and alerting interfaces (spec.md §6 Outputs, §4.10).
//
// Per-layer exit counts, MTTD, and latency are internal bookkeeping the
// Director feeds on every interaction; `AlertSink` is reserved for the two
// cases spec.md calls out explicitly — honeytoken hits and HTTP severity in
// {High, Critical} — everything else is just logged, never alerted.

use tracing::{info, warn};

use crate::health::DegradationLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitLayer {
    L0,
    L1,
    L2,
    L3,
    L4,
    Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    High,
    Critical,
}

/// Sink for per-interaction telemetry. The default `TracingTelemetry`
/// writes structured log lines; a production deployment can swap in a
/// metrics-backend implementation without touching the Director.
pub trait TelemetrySink: Send + Sync {
    fn record_exit(&self, layer: ExitLayer, attacker_ip: &str);
    fn record_mttd(&self, attacker_ip: &str, seconds: f64);
    fn record_latency(&self, layer: ExitLayer, millis: f64);
    fn record_health_transition(&self, level: DegradationLevel);
}

/// Sink for the narrow set of events worth paging someone over: honeytoken
/// hits and HTTP severity >= High.
pub trait AlertSink: Send + Sync {
    fn alert(&self, attacker_ip: &str, severity: AlertSeverity, message: &str);
}

pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record_exit(&self, layer: ExitLayer, attacker_ip: &str) {
        info!(?layer, attacker_ip, "layer exit");
    }

    fn record_mttd(&self, attacker_ip: &str, seconds: f64) {
        info!(attacker_ip, mttd_seconds = seconds, "session discovered");
    }

    fn record_latency(&self, layer: ExitLayer, millis: f64) {
        info!(?layer, latency_ms = millis, "layer latency");
    }

    fn record_health_transition(&self, level: DegradationLevel) {
        warn!(?level, "health degradation level changed");
    }
}

pub struct TracingAlerts;

impl AlertSink for TracingAlerts {
    fn alert(&self, attacker_ip: &str, severity: AlertSeverity, message: &str) {
        warn!(attacker_ip, ?severity, message, "ALERT");
    }
}
