//! Request aggregate - domain model, status vocabulary and transition policy.
//!
//! This module contains the core domain logic for requests:
//! - Canonical statuses and the legacy normalizer
//! - The role-gated transition table
//! - Presentation lookups (label, severity, progress)
//! - Request records (stored and normalized)

pub mod presentation;
pub mod state;
pub mod status;
pub mod transitions;

// Re-export commonly used types
pub use presentation::{Progress, Severity, StatusView, label, progress, severity};
pub use state::*;
pub use status::{RawStatus, RequestStatus, StatusNormalizer, normalize};
pub use transitions::{allowed_next_states, awaiting_role, can_transition, is_terminal};
