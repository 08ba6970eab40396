//! Core domain types for the request lifecycle.
//!
//! This module contains pure domain types with no persistence dependencies:
//! - Actors, roles and scopes
//! - Request records, statuses and the transition policy

pub mod actor;
pub mod request;
