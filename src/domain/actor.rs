//! Actors that move requests through their lifecycle.
//!
//! The lifecycle knows two roles. Which department or club an actor speaks for is decided by
//! an external identity service; this module only models its answer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentId(pub Uuid);

impl From<Uuid> for DepartmentId {
    fn from(uuid: Uuid) -> Self {
        DepartmentId(uuid)
    }
}

impl std::fmt::Display for DepartmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a club.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClubId(pub Uuid);

impl From<Uuid> for ClubId {
    fn from(uuid: Uuid) -> Self {
        ClubId(uuid)
    }
}

impl std::fmt::Display for ClubId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Identity of whoever submits a transition (an opaque user id from the identity service).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        ActorId(id.to_string())
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        ActorId(id)
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role an actor acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActingRole {
    /// Reviews requests at the department stage.
    Department,
    /// Reviews requests at the club stage and manages fulfillment.
    Club,
}

impl ActingRole {
    pub const ALL: [ActingRole; 2] = [ActingRole::Department, ActingRole::Club];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActingRole::Department => "department",
            ActingRole::Club => "club",
        }
    }
}

impl std::fmt::Display for ActingRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the identity service says an actor speaks for.
///
/// The scope implies the role: a department scope acts as [`ActingRole::Department`], a club
/// scope as [`ActingRole::Club`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum ActorScope {
    Department(DepartmentId),
    Club(ClubId),
}

impl ActorScope {
    pub fn role(&self) -> ActingRole {
        match self {
            ActorScope::Department(_) => ActingRole::Department,
            ActorScope::Club(_) => ActingRole::Club,
        }
    }
}
