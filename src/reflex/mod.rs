// Reflex Filter (spec.md §4.9 / C9, L0 of the cascade).
//
// Deterministic and (per-request) stateless in its verdict logic — state
// that does persist (verdict cache, rate windows, circuit breaker) is
// bookkeeping about *recent* requests, not about this one. Reflex never
// blocks or alerts on noise signatures alone; only a Critical-severity
// attack-technique match produces `Blocked`.

pub mod signatures;

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use signatures::{Severity, SignatureLibrary};

const CACHE_TTL_MS: i64 = 1000;
const NOISE_SIGNATURES: &[&str] = &[
    "masscan",
    "nmap",
    "zgrab",
    "shodan",
    "censys",
    "metasploit",
    "msfconsole",
    "exploit/",
    "payload/",
    "admin:admin",
    "root:root",
    "admin:password",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ssh,
    Http,
    Ftp,
    Smtp,
    Unknown,
}

pub fn classify_protocol(payload: &str) -> Protocol {
    const HTTP_VERBS: &[&str] = &["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"];
    const FTP_COMMANDS: &[&str] = &["USER", "PASS", "QUIT", "RETR"];
    const SMTP_COMMANDS: &[&str] = &["HELO", "EHLO", "MAIL"];

    if payload.starts_with("SSH-") {
        Protocol::Ssh
    } else if HTTP_VERBS.iter().any(|v| payload.starts_with(v)) {
        Protocol::Http
    } else if FTP_COMMANDS.iter().any(|c| payload.starts_with(c)) {
        Protocol::Ftp
    } else if SMTP_COMMANDS.iter().any(|c| payload.starts_with(c)) {
        Protocol::Smtp
    } else {
        Protocol::Unknown
    }
}

pub fn boring_failure_response(protocol: Protocol) -> String {
    match protocol {
        Protocol::Ssh | Protocol::Unknown => String::new(),
        Protocol::Http => "400".to_string(),
        Protocol::Ftp | Protocol::Smtp => "500".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReflexVerdict {
    Blocked(String),
    NoiseFake(String),
    CacheHit(String),
    Proceed,
}

fn hash_payload(payload: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

struct CacheEntry {
    tag: String,
    expires_at: DateTime<Utc>,
}

/// A tiny hand-rolled bloom filter over known-benign scanner probe strings.
/// False positives route to the static path, which is safe; there is no
/// false-negative cost worth a real crate dependency for a handful of
/// fixed strings.
struct BenignProbeFilter {
    bits: Vec<bool>,
}

const BLOOM_SIZE: usize = 2048;
const BLOOM_HASHES: usize = 3;

impl BenignProbeFilter {
    fn new(seed_probes: &[&str]) -> Self {
        let mut filter = Self {
            bits: vec![false; BLOOM_SIZE],
        };
        for probe in seed_probes {
            filter.insert(probe);
        }
        filter
    }

    fn indices(value: &str) -> [usize; BLOOM_HASHES] {
        let mut out = [0usize; BLOOM_HASHES];
        for (i, slot) in out.iter_mut().enumerate() {
            let mut hasher = DefaultHasher::new();
            (value, i).hash(&mut hasher);
            *slot = (hasher.finish() as usize) % BLOOM_SIZE;
        }
        out
    }

    fn insert(&mut self, value: &str) {
        for idx in Self::indices(value) {
            self.bits[idx] = true;
        }
    }

    fn might_contain(&self, value: &str) -> bool {
        Self::indices(value).iter().all(|&idx| self.bits[idx])
    }
}

const KNOWN_BENIGN_PROBES: &[&str] = &["GET /favicon.ico", "GET /robots.txt", "GET / HTTP/1.1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitLevel {
    AllLayers,
    L3Only,
    L2Only,
    L1Only,
    StaticOnly,
}

/// Adaptive, latency-driven circuit breaker (spec.md §4.9). Downward-only
/// during a fault event; `recover` is a separate, explicit step.
pub struct CircuitBreaker {
    samples: Mutex<VecDeque<f64>>,
    level: Mutex<CircuitLevel>,
}

const LATENCY_WINDOW: usize = 100;

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW)),
            level: Mutex::new(CircuitLevel::AllLayers),
        }
    }

    fn p95(samples: &VecDeque<f64>) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = ((sorted.len() as f64) * 0.95) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    pub fn record_latency(&self, millis: f64) {
        let mut samples = self.samples.lock().unwrap();
        if samples.len() == LATENCY_WINDOW {
            samples.pop_front();
        }
        samples.push_back(millis);
        let p95 = Self::p95(&samples);
        if p95 > 4.0 {
            let mut level = self.level.lock().unwrap();
            *level = step_down(*level);
        }
    }

    pub fn recover(&self) {
        let samples = self.samples.lock().unwrap();
        let p95 = Self::p95(&samples);
        if p95 < 3.0 {
            let mut level = self.level.lock().unwrap();
            *level = step_up(*level);
        }
    }

    pub fn level(&self) -> CircuitLevel {
        *self.level.lock().unwrap()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

fn step_down(level: CircuitLevel) -> CircuitLevel {
    match level {
        CircuitLevel::AllLayers => CircuitLevel::L3Only,
        CircuitLevel::L3Only => CircuitLevel::L2Only,
        CircuitLevel::L2Only => CircuitLevel::L1Only,
        CircuitLevel::L1Only | CircuitLevel::StaticOnly => CircuitLevel::StaticOnly,
    }
}

fn step_up(level: CircuitLevel) -> CircuitLevel {
    match level {
        CircuitLevel::StaticOnly => CircuitLevel::L1Only,
        CircuitLevel::L1Only => CircuitLevel::L2Only,
        CircuitLevel::L2Only => CircuitLevel::L3Only,
        CircuitLevel::L3Only | CircuitLevel::AllLayers => CircuitLevel::AllLayers,
    }
}

/// Per-IP request timestamps for rate/burstiness stats (spec.md §4.9).
#[derive(Default)]
struct RateWindow {
    timestamps: VecDeque<DateTime<Utc>>,
}

const RATE_WINDOW_MAX: usize = 64;

impl RateWindow {
    fn record(&mut self, now: DateTime<Utc>) {
        if self.timestamps.len() == RATE_WINDOW_MAX {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(now);
    }

    fn requests_per_second(&self) -> f64 {
        if self.timestamps.len() < 2 {
            return 0.0;
        }
        let span = (*self.timestamps.back().unwrap() - *self.timestamps.front().unwrap())
            .num_milliseconds() as f64
            / 1000.0;
        if span <= 0.0 {
            return 0.0;
        }
        (self.timestamps.len() as f64 - 1.0) / span
    }

    /// Coefficient of variation of inter-arrival gaps, clipped to [0,1].
    fn burstiness(&self) -> f64 {
        if self.timestamps.len() < 3 {
            return 0.0;
        }
        let gaps: Vec<f64> = self
            .timestamps
            .iter()
            .zip(self.timestamps.iter().skip(1))
            .map(|(a, b)| (*b - *a).num_milliseconds() as f64)
            .collect();
        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        if mean <= 0.0 {
            return 0.0;
        }
        let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
        (variance.sqrt() / mean).clamp(0.0, 1.0)
    }

    fn is_automated(&self) -> bool {
        self.requests_per_second() > 5.0 && self.burstiness() < 0.3
    }
}

pub struct ReflexFilter {
    cache: Mutex<HashMap<(String, u64), CacheEntry>>,
    rate_windows: Mutex<HashMap<String, RateWindow>>,
    bloom: BenignProbeFilter,
    signatures: SignatureLibrary,
}

impl ReflexFilter {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            rate_windows: Mutex::new(HashMap::new()),
            bloom: BenignProbeFilter::new(KNOWN_BENIGN_PROBES),
            signatures: SignatureLibrary::new(),
        }
    }

    /// Evaluate L0 for one interaction. Never suspends by itself — the
    /// suspension point §5 describes is the Director's surrounding call
    /// into the real (external) reflex collaborator, which this module
    /// stands in for in tests and the demo CLI.
    pub fn check(&self, attacker_ip: &str, payload: &str, now: DateTime<Utc>) -> ReflexVerdict {
        let key = (attacker_ip.to_string(), hash_payload(payload));
        if let Some(entry) = self.cache.lock().unwrap().get(&key) {
            if entry.expires_at > now {
                return ReflexVerdict::CacheHit(entry.tag.clone());
            }
        }

        {
            let mut windows = self.rate_windows.lock().unwrap();
            windows.entry(attacker_ip.to_string()).or_default().record(now);
        }

        let verdict = self.compute_verdict(payload);
        let tag = match &verdict {
            ReflexVerdict::Blocked(_) => "blocked".to_string(),
            ReflexVerdict::NoiseFake(_) => "noise".to_string(),
            ReflexVerdict::CacheHit(_) => "static".to_string(),
            ReflexVerdict::Proceed => "proceed".to_string(),
        };
        self.cache.lock().unwrap().insert(
            key,
            CacheEntry {
                tag,
                expires_at: now + chrono::Duration::milliseconds(CACHE_TTL_MS),
            },
        );
        verdict
    }

    fn compute_verdict(&self, payload: &str) -> ReflexVerdict {
        let lower = payload.to_lowercase();
        if let Some(noise) = NOISE_SIGNATURES.iter().find(|s| lower.contains(*s)) {
            return ReflexVerdict::NoiseFake(noise_response(noise));
        }

        if let Some(sig) = self.signatures.match_command(payload) {
            if sig.severity == Severity::Critical {
                return ReflexVerdict::Blocked(format!("signature:{}", sig.id));
            }
        }

        if self.bloom.might_contain(payload) {
            return ReflexVerdict::CacheHit("static".to_string());
        }

        ReflexVerdict::Proceed
    }

    /// Whether `ip` currently looks automated (rate > 5 rps, low
    /// burstiness). Informational only — used for response shaping, never
    /// to gate a verdict.
    pub fn is_automated(&self, ip: &str) -> bool {
        self.rate_windows
            .lock()
            .unwrap()
            .get(ip)
            .map(|w| w.is_automated())
            .unwrap_or(false)
    }
}

impl Default for ReflexFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn noise_response(matched_signature: &str) -> String {
    let bucket = hash_payload(matched_signature) % 3;
    match bucket {
        0 => "timeout".to_string(),
        1 => "segfault".to_string(),
        _ => "auth-failed".to_string(),
    }
}
