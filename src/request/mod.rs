//! Request aggregate - domain model and state transitions.
//!
//! This module re-exports types from `domain::request` and `domain::actor`.
//! See those modules for the actual implementations.

pub use crate::domain::actor::{ActingRole, ActorId, ActorScope, ClubId, DepartmentId};
pub use crate::domain::request::*;
