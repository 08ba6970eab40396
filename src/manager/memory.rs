//! In-memory implementations of the store and resolver boundaries.
//!
//! Used by tests and by embedders that keep requests elsewhere and only need the lifecycle
//! rules. The store keeps one map entry per request; a compare-and-swap holds that entry's
//! shard write lock for the check and the write, and releases it before returning.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::{RequestFilter, RequestStore, RoleResolver};
use crate::domain::actor::{ActorId, ActorScope};
use crate::domain::request::{
    RawStatus, RequestData, RequestId, StatusCommit, StoredRequest, TransitionRecord,
};
use crate::error::{ClubdeskError, Result};

#[derive(Debug, Clone)]
struct Entry {
    request: StoredRequest,
    history: Vec<TransitionRecord>,
}

/// Request store backed by a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRequestStore {
    entries: Arc<DashMap<RequestId, Entry>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a record with an arbitrary raw status.
    ///
    /// This stands in for the submission flow and for legacy imports, which is why the status
    /// is not normalized here.
    pub fn insert(&self, data: RequestData, status: impl Into<RawStatus>) -> StoredRequest {
        let request = StoredRequest {
            data,
            status: status.into(),
            last_transition: None,
        };
        self.entries.insert(
            request.data.id,
            Entry {
                request: request.clone(),
                history: Vec::new(),
            },
        );
        request
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn get(&self, id: RequestId) -> Result<StoredRequest> {
        self.entries
            .get(&id)
            .map(|entry| entry.request.clone())
            .ok_or(ClubdeskError::RequestNotFound(id))
    }

    async fn compare_and_swap_status(
        &self,
        id: RequestId,
        expected: &RawStatus,
        commit: &StatusCommit,
    ) -> Result<bool> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or(ClubdeskError::RequestNotFound(id))?;

        if entry.request.status != *expected {
            tracing::debug!(
                request_id = %id,
                expected = ?expected,
                actual = ?entry.request.status,
                "Compare-and-swap lost: stored status changed"
            );
            return Ok(false);
        }

        entry.request.status = RawStatus::from(commit.to);
        entry.request.last_transition = Some(commit.audit.clone());
        if commit.record_history {
            entry.history.push(commit.history_record(id));
        }

        tracing::trace!(request_id = %id, to = %commit.to, "Status swapped");
        Ok(true)
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<StoredRequest>> {
        let mut requests: Vec<StoredRequest> = self
            .entries
            .iter()
            .filter(|entry| filter.matches_keys(&entry.request))
            .map(|entry| entry.request.clone())
            .collect();
        requests.sort_by(|a, b| b.data.created_at.cmp(&a.data.created_at));
        if let Some(limit) = filter.store_limit() {
            requests.truncate(limit);
        }
        Ok(requests)
    }

    async fn history(&self, id: RequestId) -> Result<Vec<TransitionRecord>> {
        self.entries
            .get(&id)
            .map(|entry| entry.history.clone())
            .ok_or(ClubdeskError::RequestNotFound(id))
    }
}

/// Role resolver backed by a fixed actor table.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleResolver {
    scopes: Arc<RwLock<HashMap<ActorId, ActorScope>>>,
}

impl StaticRoleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with_actor(self, actor: impl Into<ActorId>, scope: ActorScope) -> Self {
        self.register(actor, scope);
        self
    }

    pub fn register(&self, actor: impl Into<ActorId>, scope: ActorScope) {
        self.scopes.write().insert(actor.into(), scope);
    }

    pub fn remove(&self, actor: &ActorId) -> Option<ActorScope> {
        self.scopes.write().remove(actor)
    }
}

#[async_trait]
impl RoleResolver for StaticRoleResolver {
    async fn resolve(&self, actor: &ActorId) -> Result<Option<ActorScope>> {
        Ok(self.scopes.read().get(actor).copied())
    }
}
