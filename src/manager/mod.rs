//! Boundary traits for the lifecycle engine.
//!
//! This module defines the `RequestStore` and `RoleResolver` traits: the durable record store
//! the controller reads and commits through, and the identity service that tells it who an
//! actor speaks for. Implementations live in the submodules.

use crate::domain::actor::{ActorId, ActorScope, ClubId, DepartmentId};
use crate::domain::request::{
    RawStatus, RequestId, RequestStatus, StatusCommit, StatusNormalizer, StoredRequest,
    TransitionRecord,
};
use crate::error::Result;
use async_trait::async_trait;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{InMemoryRequestStore, StaticRoleResolver};

/// Durable request store.
///
/// The store never validates transitions; the controller does that before calling
/// [`RequestStore::compare_and_swap_status`]. What the store must guarantee is that the swap
/// is atomic: the status check, the status write, the audit fields and (when asked) the
/// history entry either all land or none do.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Get a request by ID.
    ///
    /// # Errors
    /// [`ClubdeskError::RequestNotFound`](crate::ClubdeskError::RequestNotFound) if no such
    /// request exists.
    async fn get(&self, id: RequestId) -> Result<StoredRequest>;

    /// Set the status to `commit.to` if the stored status still equals `expected`.
    ///
    /// `expected` is the raw value read earlier, compared exactly (a legacy `"approved"` row
    /// only matches `"approved"`). Returns `Ok(false)` when the stored status has changed in
    /// between, and an error if the request does not exist.
    async fn compare_and_swap_status(
        &self,
        id: RequestId,
        expected: &RawStatus,
        commit: &StatusCommit,
    ) -> Result<bool>;

    /// List requests matching the filter's relationship keys, newest first.
    ///
    /// Status filtering needs normalization and is done by [`RequestFilter::matches`]
    /// after loading, so stores narrow by department and club only, and cap the result at
    /// [`RequestFilter::store_limit`].
    async fn list(&self, filter: &RequestFilter) -> Result<Vec<StoredRequest>>;

    /// Committed transitions for a request, oldest first.
    async fn history(&self, id: RequestId) -> Result<Vec<TransitionRecord>>;
}

/// Identity service answering which department or club an actor speaks for.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    /// `Ok(None)` when the actor is unknown.
    async fn resolve(&self, actor: &ActorId) -> Result<Option<ActorScope>>;
}

/// Filter for listing requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub department_id: Option<DepartmentId>,
    pub club_id: Option<ClubId>,
    /// Canonical status; legacy rows match on their normalized value
    pub status: Option<RequestStatus>,
    pub limit: Option<usize>,
}

impl RequestFilter {
    pub fn for_department(department_id: DepartmentId) -> Self {
        Self {
            department_id: Some(department_id),
            ..Default::default()
        }
    }

    pub fn for_club(club_id: ClubId) -> Self {
        Self {
            club_id: Some(club_id),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Row cap a store may apply itself.
    ///
    /// Only set when there is no status filter: with one, rows dropped after normalization
    /// would leave the page short.
    pub fn store_limit(&self) -> Option<usize> {
        match self.status {
            Some(_) => None,
            None => self.limit,
        }
    }

    /// Whether the relationship keys match, ignoring status.
    pub fn matches_keys(&self, request: &StoredRequest) -> bool {
        self.department_id
            .is_none_or(|id| id == request.data.department_id)
            && self.club_id.is_none_or(|id| id == request.data.club_id)
    }

    /// Full match, normalizing the stored status.
    pub fn matches(&self, request: &StoredRequest, normalizer: &StatusNormalizer) -> bool {
        self.matches_keys(request)
            && self
                .status
                .is_none_or(|status| normalizer.normalize(&request.status) == status)
    }
}
