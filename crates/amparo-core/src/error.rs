use amparo_types::models::{Role, Status};
use thiserror::Error;

use crate::policy::Capability;

/// Error taxonomy for store, engine and facade operations.
///
/// Authorization failures are distinct from "not logged in" — an
/// unauthenticated caller never reaches these paths; the HTTP layer rejects
/// it first with 401.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input; the operation was never attempted against storage.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The actor's role does not grant the required capability.
    #[error("role {role} lacks capability {capability:?}")]
    Unauthorized { role: Role, capability: Capability },

    /// The actor tried to act outside its home city partition.
    #[error("role {role} may only act on its home city {home}, not {requested}")]
    WrongCity {
        role: Role,
        home: String,
        requested: String,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The requested status change is not an edge of the state machine.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    /// A persistence call failed. Not retried automatically; the caller is
    /// expected to offer a manual retry affordance.
    #[error("persistence failure: {0}")]
    Transient(anyhow::Error),

    /// A reorder batch stopped partway through. Already-applied rank
    /// assignments are NOT rolled back; callers re-fetch and retry the rest.
    #[error("reorder partially applied: {applied} of {total} records")]
    PartialBatch {
        applied: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether a caller-side retry can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::PartialBatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
