//! Application-wide error types.
//!
//! Lower layers (artifact store, progress ledger, specialist registry,
//! assembler) raise these typed variants; only the orchestrator decides
//! whether a failure aborts a state transition or becomes a user message.

use thiserror::Error;

use crate::subsystems::agents::SpecialistKind;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: no '{name}' artifact for topic '{topic}'")]
    NotFound { topic: String, name: String },

    #[error("prerequisite missing for topic '{topic}': no {missing} artifact yet")]
    PrerequisiteMissing { topic: String, missing: String },

    #[error("unknown specialist: {0}")]
    UnknownSpecialist(String),

    #[error("ambiguous topic: {0}")]
    AmbiguousTopic(String),

    #[error("specialist '{kind}' failed: {reason}")]
    SpecialistFailure { kind: SpecialistKind, reason: String },

    #[error("incomplete module: missing section(s) {}", .missing.join(", "))]
    IncompleteModule { missing: Vec<String> },

    #[error("comms error: {0}")]
    Comms(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// `true` when the user can fix the situation and retry in the same session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::NotFound { .. }
                | AppError::PrerequisiteMissing { .. }
                | AppError::AmbiguousTopic(_)
                | AppError::SpecialistFailure { .. }
        )
    }

    /// Short next step shown to the user next to a recoverable error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AppError::NotFound { .. } | AppError::PrerequisiteMissing { .. } => {
                Some("Run 'learn <topic>' first so research and a roadmap exist.")
            }
            AppError::AmbiguousTopic(_) => {
                Some("Name the topic, e.g. 'start module 1 of FastAPI', or run 'learn <topic>'.")
            }
            AppError::SpecialistFailure { .. } => {
                Some("Nothing was saved for this step. Try the same command again.")
            }
            _ => None,
        }
    }
}
