//! Error types for the request lifecycle.

use thiserror::Error;

use crate::domain::actor::{ActingRole, ActorId};
use crate::domain::request::{RequestId, RequestStatus};

/// Result type alias using the clubdesk error type.
pub type Result<T> = std::result::Result<T, ClubdeskError>;

/// Main error type for the lifecycle engine.
///
/// Every variant is terminal for the call that produced it. Only
/// [`ClubdeskError::ConflictRetry`] invites the caller to try again.
#[derive(Error, Debug)]
pub enum ClubdeskError {
    /// Request not found
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    /// The desired status is not reachable from the current one for this role
    #[error(
        "Illegal transition: {role} cannot move a request from '{current}' to '{desired}'"
    )]
    IllegalTransition {
        current: RequestStatus,
        desired: RequestStatus,
        role: ActingRole,
    },

    /// Another commit landed between our read and our write
    #[error("Request {0} was modified concurrently, re-read and retry")]
    ConflictRetry(RequestId),

    /// The actor's resolved role or scope does not own the request
    #[error("Actor {actor} may not act on request {request_id}: {reason}")]
    ScopeMismatch {
        request_id: RequestId,
        actor: ActorId,
        reason: String,
    },

    /// The identity resolver does not know the actor
    #[error("Unknown actor: {0}")]
    UnknownActor(ActorId),

    /// Configuration that would make status normalization ambiguous
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClubdeskError {
    /// Whether re-reading the request and submitting again can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClubdeskError::ConflictRetry(_))
    }

    /// Short, low-cardinality name of the error kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ClubdeskError::RequestNotFound(_) => "not_found",
            ClubdeskError::IllegalTransition { .. } => "illegal_transition",
            ClubdeskError::ConflictRetry(_) => "conflict",
            ClubdeskError::ScopeMismatch { .. } => "scope_mismatch",
            ClubdeskError::UnknownActor(_) => "unknown_actor",
            ClubdeskError::InvalidConfig(_) => "invalid_config",
            ClubdeskError::Serialization(_) => "serialization",
            ClubdeskError::Other(_) => "other",
        }
    }
}
