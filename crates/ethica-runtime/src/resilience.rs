//! Per-call deadlines and call accounting.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use ethica_core::CallUsage;

use crate::agents::AgentError;
use crate::providers::ProviderError;

/// Capability a call is made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Generation,
    Retrieval,
    Persistence,
}

impl CallKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CallKind::Generation => "generation",
            CallKind::Retrieval => "retrieval",
            CallKind::Persistence => "persistence",
        }
    }
}

/// Thread-safe counters for one assessment.
#[derive(Debug, Default)]
pub struct UsageTracker {
    generation_calls: AtomicU32,
    retrieval_calls: AtomicU32,
    persistence_calls: AtomicU32,
    timeouts: AtomicU32,
    malformed: AtomicU32,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self, kind: CallKind) {
        let counter = match kind {
            CallKind::Generation => &self.generation_calls,
            CallKind::Retrieval => &self.retrieval_calls,
            CallKind::Persistence => &self.persistence_calls,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters.
    pub fn get_usage(&self) -> CallUsage {
        CallUsage {
            generation_calls: self.generation_calls.load(Ordering::Relaxed),
            retrieval_calls: self.retrieval_calls.load(Ordering::Relaxed),
            persistence_calls: self.persistence_calls.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }

    /// Reset for a new assessment.
    pub fn reset(&self) {
        for counter in [
            &self.generation_calls,
            &self.retrieval_calls,
            &self.persistence_calls,
            &self.timeouts,
            &self.malformed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Run one capability call under a deadline, counting it.
///
/// A call that outlives `limit` is dropped and reported as
/// [`AgentError::Timeout`].
pub async fn with_timeout<T, F>(
    usage: &UsageTracker,
    kind: CallKind,
    limit: Duration,
    call: F,
) -> Result<T, AgentError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    usage.record_call(kind);
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(AgentError::from),
        Err(_) => {
            usage.record_timeout();
            Err(AgentError::Timeout {
                kind: kind.as_str(),
                limit,
            })
        }
    }
}
