//! Non-fatal synthesis problems
//!
//! A misconfigured template never blocks the rest of the installation.
//! Whatever cannot be honored is skipped and reported through a
//! [`WarningSink`] instead.

use std::sync::Mutex;

#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::warn;

/// Something in the descriptor was skipped or replaced by a default
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisWarning {
    /// A name refers to a template or container that does not exist
    #[error("unknown {kind} '{name}' referenced by {context}")]
    UnresolvedReference {
        /// What was looked up (pod template, volume claim template, container)
        kind: String,
        /// The name that did not resolve
        name: String,
        /// Where the reference was made (usually the StatefulSet name)
        context: String,
    },

    /// An addition would duplicate something already present
    #[error("{kind} '{name}' already in use in {context}")]
    Conflict {
        /// What collided (volume claim template, mount path, cluster, shard or host name)
        kind: String,
        /// The colliding value
        name: String,
        /// Where the collision happened
        context: String,
    },
}

impl SynthesisWarning {
    /// Create an unresolved-reference warning
    pub fn unresolved(
        kind: impl Into<String>,
        name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::UnresolvedReference {
            kind: kind.into(),
            name: name.into(),
            context: context.into(),
        }
    }

    /// Create a conflict warning
    pub fn conflict(
        kind: impl Into<String>,
        name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
            context: context.into(),
        }
    }
}

/// Receives every warning raised during synthesis.
///
/// Implementations must be shareable across threads that synthesize
/// different hosts of the same installation.
#[cfg_attr(test, automock)]
pub trait WarningSink: Send + Sync {
    /// Report one warning
    fn warn(&self, warning: SynthesisWarning);
}

/// Logs warnings through `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingWarningSink;

impl WarningSink for TracingWarningSink {
    fn warn(&self, warning: SynthesisWarning) {
        match &warning {
            SynthesisWarning::UnresolvedReference {
                kind,
                name,
                context,
            } => warn!(kind = %kind, name = %name, context = %context, "Unresolved reference, skipping"),
            SynthesisWarning::Conflict {
                kind,
                name,
                context,
            } => warn!(kind = %kind, name = %name, context = %context, "Conflict, skipping"),
        }
    }
}

/// Keeps warnings in memory so the caller can surface them in status
#[derive(Debug, Default)]
pub struct RecordingWarningSink {
    warnings: Mutex<Vec<SynthesisWarning>>,
}

impl RecordingWarningSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded warnings
    pub fn take(&self) -> Vec<SynthesisWarning> {
        match self.warnings.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl WarningSink for RecordingWarningSink {
    fn warn(&self, warning: SynthesisWarning) {
        match self.warnings.lock() {
            Ok(mut guard) => guard.push(warning),
            Err(poisoned) => poisoned.into_inner().push(warning),
        }
    }
}
