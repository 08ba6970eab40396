//! Request records as stored and as the lifecycle sees them.
//!
//! A [`StoredRequest`] is what a store hands back: its status is a [`RawStatus`] because
//! legacy rows may still hold free text. A [`Request`] is the normalized view every decision
//! is made on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::presentation::StatusView;
use super::status::{RawStatus, RequestStatus, StatusNormalizer};
use crate::domain::actor::{ActingRole, ActorId, ClubId, DepartmentId};

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        RequestId(uuid)
    }
}

impl std::ops::Deref for RequestId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Data supplied when the request was submitted. The lifecycle never changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    pub id: RequestId,

    /// Who asked for the funds or resources (free text from the submission form)
    pub requesting_party: String,

    /// Parent department of the owning club; decides who may act at the department stage
    pub department_id: DepartmentId,

    /// Owning club; decides who may act at the club stage
    pub club_id: ClubId,

    pub description: String,

    pub created_at: DateTime<Utc>,
}

/// Audit fields written with every committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionAudit {
    pub at: DateTime<Utc>,
    pub by: ActorId,
    pub role: ActingRole,
}

/// A request record exactly as a store returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRequest {
    pub data: RequestData,
    pub status: RawStatus,
    pub last_transition: Option<TransitionAudit>,
}

impl StoredRequest {
    /// Normalized view of this record.
    pub fn normalize(&self, normalizer: &StatusNormalizer) -> Request {
        Request {
            data: self.data.clone(),
            status: normalizer.normalize(&self.status),
            last_transition: self.last_transition.clone(),
        }
    }
}

/// A request with a canonical status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    pub data: RequestData,
    pub status: RequestStatus,
    pub last_transition: Option<TransitionAudit>,
}

impl Request {
    pub fn id(&self) -> RequestId {
        self.data.id
    }

    pub fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        self.last_transition.as_ref().map(|audit| audit.at)
    }

    pub fn last_transition_by(&self) -> Option<&ActorId> {
        self.last_transition.as_ref().map(|audit| &audit.by)
    }

    /// Label, severity and progress for display.
    pub fn view(&self) -> StatusView {
        StatusView::from(self.status)
    }
}

/// Everything a store needs to commit one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCommit {
    /// Normalized status the decision was made from
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub audit: TransitionAudit,
    /// Append a [`TransitionRecord`] in the same atomic write
    pub record_history: bool,
}

impl StatusCommit {
    pub fn history_record(&self, request_id: RequestId) -> TransitionRecord {
        TransitionRecord {
            request_id,
            from: self.from,
            to: self.to,
            role: self.audit.role,
            by: self.audit.by.clone(),
            at: self.audit.at,
        }
    }
}

/// One committed transition in a request's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub request_id: RequestId,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub role: ActingRole,
    pub by: ActorId,
    pub at: DateTime<Utc>,
}
