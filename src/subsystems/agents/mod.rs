//! Agents subsystem: the specialist registry.
//!
//! A specialist is an opaque content generator for one task kind:
//! `generate(topic, context) -> text`. Specialists never touch storage; the
//! orchestrator reads context from the artifact store and hands it in.
//!
//! ```text
//! SpecialistRegistry::invoke(kind, topic, ctx)
//!   ├── unknown kind      → AppError::UnknownSpecialist
//!   ├── timeout / error   → AppError::SpecialistFailure { kind, reason }
//!   └── blank output      → AppError::SpecialistFailure { kind, "empty output" }
//! ```

pub mod llm_specialist;
pub mod prompts;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::llm::{LlmProvider, ProviderError};
use crate::subsystems::storage::Topic;

pub use llm_specialist::LlmSpecialist;

// ── SpecialistKind ───────────────────────────────────────────────────────────

/// Task kinds the hub can delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpecialistKind {
    Research,
    Plan,
    Teach,
    Exemplify,
    Quiz,
    Track,
    Notify,
}

impl SpecialistKind {
    pub const ALL: [SpecialistKind; 7] = [
        SpecialistKind::Research,
        SpecialistKind::Plan,
        SpecialistKind::Teach,
        SpecialistKind::Exemplify,
        SpecialistKind::Quiz,
        SpecialistKind::Track,
        SpecialistKind::Notify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SpecialistKind::Research => "research",
            SpecialistKind::Plan => "plan",
            SpecialistKind::Teach => "teach",
            SpecialistKind::Exemplify => "exemplify",
            SpecialistKind::Quiz => "quiz",
            SpecialistKind::Track => "track",
            SpecialistKind::Notify => "notify",
        }
    }
}

impl fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecialistKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpecialistKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::UnknownSpecialist(s.to_string()))
    }
}

// ── Specialist trait ─────────────────────────────────────────────────────────

/// Named inputs handed to a specialist, e.g. `research`, `roadmap`, `module`.
pub type SpecialistContext = BTreeMap<String, String>;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct SpecialistError(pub String);

impl From<ProviderError> for SpecialistError {
    fn from(e: ProviderError) -> Self {
        SpecialistError(e.to_string())
    }
}

pub type SpecialistFuture =
    Pin<Box<dyn Future<Output = Result<String, SpecialistError>> + Send + 'static>>;

/// A stateless content generator. Implementations must be cheap to call
/// concurrently; the returned future owns everything it needs.
pub trait Specialist: Send + Sync {
    fn generate(&self, topic: &Topic, context: &SpecialistContext) -> SpecialistFuture;
}

// ── SpecialistRegistry ───────────────────────────────────────────────────────

/// Fixed mapping from task kind to specialist.
#[derive(Clone, Default)]
pub struct SpecialistRegistry {
    specialists: HashMap<SpecialistKind, Arc<dyn Specialist>>,
    timeout: Option<Duration>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every invocation by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register (or replace) the specialist for `kind`.
    pub fn register(&mut self, kind: SpecialistKind, specialist: Arc<dyn Specialist>) {
        self.specialists.insert(kind, specialist);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, kind: SpecialistKind, specialist: impl Specialist + 'static) -> Self {
        self.register(kind, Arc::new(specialist));
        self
    }

    pub fn contains(&self, kind: SpecialistKind) -> bool {
        self.specialists.contains_key(&kind)
    }

    /// Registered kinds in declaration order.
    pub fn kinds(&self) -> Vec<SpecialistKind> {
        let mut kinds: Vec<_> = self.specialists.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// One LLM-backed specialist per kind in `kinds`, all sharing `provider`.
    pub fn from_provider(provider: LlmProvider, kinds: &[SpecialistKind]) -> Self {
        let mut registry = Self::new();
        for &kind in kinds {
            registry.register(kind, Arc::new(LlmSpecialist::new(kind, provider.clone())));
        }
        registry
    }

    pub async fn invoke(
        &self,
        kind: SpecialistKind,
        topic: &Topic,
        context: &SpecialistContext,
    ) -> Result<String, AppError> {
        let specialist = self
            .specialists
            .get(&kind)
            .ok_or_else(|| AppError::UnknownSpecialist(kind.to_string()))?;

        let started = Instant::now();
        let fut = specialist.generate(topic, context);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(r) => r,
                Err(_) => Err(SpecialistError(format!("timed out after {}s", limit.as_secs()))),
            },
            None => fut.await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(text) if text.trim().is_empty() => {
                warn!(%kind, %topic, elapsed_ms, "specialist returned empty output");
                Err(AppError::SpecialistFailure { kind, reason: "empty output".into() })
            }
            Ok(text) => {
                debug!(%kind, %topic, elapsed_ms, bytes = text.len(), "specialist finished");
                Ok(text)
            }
            Err(e) => {
                warn!(%kind, %topic, elapsed_ms, error = %e, "specialist failed");
                Err(AppError::SpecialistFailure { kind, reason: e.0 })
            }
        }
    }
}
