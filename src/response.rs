// Response generation surface (spec.md §6 Outputs, §9 "Polymorphism").
//
// The core never renders SSH/HTTP output bytes itself — that's the command
// and login emulators' job, external collaborators per spec.md §1. What the
// core owns is the response *shape*: which tag prefixes a caller-visible
// string, and the `(summary, attacker_context) -> string` contract every
// generator implementation shares, dispatched by `ResponseKind`.

use async_trait::async_trait;

use crate::context::{AttackerContext, ContextSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    SshCommand,
    HttpLogin,
    SystemError,
    SocialEngineering,
    ThreatAssessment,
}

pub fn blocked(reason: &str) -> String {
    format!("[BLOCKED] {reason}")
}

pub fn ai_stub(body: &str) -> String {
    format!("[AI-Stub] {body}")
}

pub fn ai_adaptive(body: &str) -> String {
    format!("[AI-Adaptive] {body}")
}

pub fn llm_ready(provider: &str, body: &str) -> String {
    format!("[LLM-Ready] {provider} {body}")
}

/// The static emulator the Director falls back to at every layer except
/// L4. Synchronous — it is never one of the three suspension points
/// (spec.md §5).
pub trait StaticEmulator: Send + Sync {
    fn generate(&self, kind: ResponseKind, summary: &ContextSummary, ctx: &AttackerContext) -> String;
}

/// A generative escalation provider invoked only at L4, in engagement mode
/// (spec.md §4.8 step 8). The one async suspension point besides L0 and
/// shutdown persistence.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, summary: &ContextSummary, ctx: &AttackerContext) -> anyhow::Result<String>;
}

/// Minimal canned-response emulator, adequate for tests and the demo CLI.
/// A production deployment supplies its own `StaticEmulator` wired to the
/// real SSH/HTTP command and login emulators (external collaborators, non-goal
/// of this core).
pub struct StubEmulator;

impl StaticEmulator for StubEmulator {
    fn generate(&self, kind: ResponseKind, summary: &ContextSummary, _ctx: &AttackerContext) -> String {
        let body = match kind {
            ResponseKind::SshCommand => "command accepted".to_string(),
            ResponseKind::HttpLogin => "login failed".to_string(),
            ResponseKind::SystemError => "internal error".to_string(),
            ResponseKind::SocialEngineering => "please hold while we verify your identity".to_string(),
            ResponseKind::ThreatAssessment => format!("threat_level={:?}", summary.threat_level),
        };
        if summary.command_count > 5 {
            ai_adaptive(&body)
        } else {
            ai_stub(&body)
        }
    }
}
