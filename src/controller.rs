//! Request lifecycle controller.
//!
//! The controller is the only writer of request statuses. One call to
//! [`LifecycleController::attempt_transition`] does a single read, a policy decision and a
//! single compare-and-swap write:
//!
//! ```text
//! store.get ──> resolve actor ──> scope check ──> normalize ──> policy ──> compare-and-swap
//!     │               │               │                           │              │
//!  NotFound     UnknownActor     ScopeMismatch           IllegalTransition  ConflictRetry
//! ```
//!
//! Nothing is retried internally. A lost race surfaces as `ConflictRetry` so a double
//! submission is never quietly turned into a second decision.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;

use crate::config::ControllerConfig;
use crate::domain::actor::{ActingRole, ActorId, ActorScope};
use crate::domain::request::{
    Request, RequestId, RequestStatus, StatusCommit, StatusNormalizer, StoredRequest,
    TransitionAudit, TransitionRecord, allowed_next_states, can_transition,
};
use crate::error::{ClubdeskError, Result};
use crate::manager::{RequestFilter, RequestStore, RoleResolver};
#[cfg(feature = "metrics")]
use crate::metrics::LifecycleMetrics;

/// Validates and commits status transitions.
///
/// Holds injected handles to the store and the role resolver; it keeps no per-request state,
/// so one controller can serve any number of concurrent calls.
///
/// # Example
/// ```ignore
/// let controller = LifecycleController::new(Arc::new(store), Arc::new(resolver))
///     .with_config(config);
///
/// let request = controller
///     .attempt_transition(id, RequestStatus::ClubApproved, ActingRole::Club, &actor)
///     .await?;
/// ```
pub struct LifecycleController<S, R>
where
    S: RequestStore,
    R: RoleResolver,
{
    store: Arc<S>,
    resolver: Arc<R>,
    config: ControllerConfig,
    normalizer: StatusNormalizer,
    #[cfg(feature = "metrics")]
    metrics: Option<LifecycleMetrics>,
}

impl<S, R> LifecycleController<S, R>
where
    S: RequestStore,
    R: RoleResolver,
{
    /// Create a controller with the default configuration.
    pub fn new(store: Arc<S>, resolver: Arc<R>) -> Self {
        let config = ControllerConfig::default();
        Self {
            store,
            resolver,
            normalizer: config.normalizer(),
            config,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set a custom configuration.
    ///
    /// This is a builder method that can be chained after `new()`.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.normalizer = config.normalizer();
        self.config = config;
        self
    }

    /// Attach Prometheus metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: LifecycleMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &StatusNormalizer {
        &self.normalizer
    }

    /// Move a request to `desired` on behalf of `acting_identity` acting as `acting_role`.
    ///
    /// Returns the request as committed.
    ///
    /// # Errors
    /// - `RequestNotFound`: no such request
    /// - `UnknownActor`: the resolver does not know `acting_identity`
    /// - `ScopeMismatch`: the actor resolves to another role, or to a department/club that
    ///   does not own the request
    /// - `IllegalTransition`: `desired` is not reachable from the current status for the role
    /// - `ConflictRetry`: another transition was committed after our read
    #[tracing::instrument(
        skip_all,
        fields(request_id = %request_id, desired = %desired, role = %acting_role, actor = %acting_identity)
    )]
    pub async fn attempt_transition(
        &self,
        request_id: RequestId,
        desired: RequestStatus,
        acting_role: ActingRole,
        acting_identity: &ActorId,
    ) -> Result<Request> {
        let result = self
            .transition(request_id, desired, acting_role, acting_identity)
            .await;
        self.record_outcome(acting_role, desired, &result);
        result
    }

    async fn transition(
        &self,
        request_id: RequestId,
        desired: RequestStatus,
        acting_role: ActingRole,
        acting_identity: &ActorId,
    ) -> Result<Request> {
        let stored = self.store.get(request_id).await?;

        let scope = self.authorize(&stored, acting_identity).await?;
        if scope.role() != acting_role {
            return Err(ClubdeskError::ScopeMismatch {
                request_id,
                actor: acting_identity.clone(),
                reason: format!(
                    "acting as {} but resolved to the {} role",
                    acting_role,
                    scope.role()
                ),
            });
        }

        let current = self.normalize_stored(&stored);
        if !can_transition(current, desired, acting_role) {
            tracing::debug!(
                current = %current,
                allowed = ?allowed_next_states(current, acting_role),
                "Transition not allowed by policy"
            );
            return Err(ClubdeskError::IllegalTransition {
                current,
                desired,
                role: acting_role,
            });
        }

        let commit = StatusCommit {
            from: current,
            to: desired,
            audit: TransitionAudit {
                at: Utc::now(),
                by: acting_identity.clone(),
                role: acting_role,
            },
            record_history: self.config.record_history,
        };

        let swapped = self
            .store
            .compare_and_swap_status(request_id, &stored.status, &commit)
            .await?;
        if !swapped {
            tracing::warn!(
                current = %current,
                "Request changed since it was read, transition not applied"
            );
            return Err(ClubdeskError::ConflictRetry(request_id));
        }

        tracing::info!(from = %current, to = %desired, "Request transitioned");

        Ok(Request {
            data: stored.data,
            status: desired,
            last_transition: Some(commit.audit),
        })
    }

    /// Statuses `acting_identity` may move the request to right now.
    ///
    /// An actor outside the request's department/club gets `ScopeMismatch`, not an empty
    /// list, so a UI can tell "nothing to do yet" apart from "not yours".
    #[tracing::instrument(skip_all, fields(request_id = %request_id, actor = %acting_identity))]
    pub async fn allowed_transitions(
        &self,
        request_id: RequestId,
        acting_identity: &ActorId,
    ) -> Result<Vec<RequestStatus>> {
        let stored = self.store.get(request_id).await?;
        let scope = self.authorize(&stored, acting_identity).await?;
        let current = self.normalize_stored(&stored);
        Ok(allowed_next_states(current, scope.role()).to_vec())
    }

    /// Normalized view of one request.
    pub async fn get_request(&self, request_id: RequestId) -> Result<Request> {
        let stored = self.store.get(request_id).await?;
        Ok(stored.normalize(&self.normalizer))
    }

    /// Normalized listing for dashboards.
    pub async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>> {
        let stored = self.store.list(filter).await?;
        let requests = stored
            .iter()
            .filter(|request| filter.matches(request, &self.normalizer))
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|request| request.normalize(&self.normalizer))
            .collect();
        Ok(requests)
    }

    /// Committed transitions of a request, oldest first.
    pub async fn history(&self, request_id: RequestId) -> Result<Vec<TransitionRecord>> {
        self.store.history(request_id).await
    }

    /// Resolve the actor and check that its scope owns the request.
    async fn authorize(&self, stored: &StoredRequest, actor: &ActorId) -> Result<ActorScope> {
        let scope = self
            .resolver
            .resolve(actor)
            .await?
            .ok_or_else(|| ClubdeskError::UnknownActor(actor.clone()))?;

        let owns = match scope {
            ActorScope::Department(department_id) => department_id == stored.data.department_id,
            ActorScope::Club(club_id) => club_id == stored.data.club_id,
        };
        if !owns {
            let reason = match scope {
                ActorScope::Department(department_id) => format!(
                    "department {} does not own the request (department {})",
                    department_id, stored.data.department_id
                ),
                ActorScope::Club(club_id) => format!(
                    "club {} does not own the request (club {})",
                    club_id, stored.data.club_id
                ),
            };
            return Err(ClubdeskError::ScopeMismatch {
                request_id: stored.data.id,
                actor: actor.clone(),
                reason,
            });
        }

        Ok(scope)
    }

    fn normalize_stored(&self, stored: &StoredRequest) -> RequestStatus {
        match self.normalizer.resolve(&stored.status) {
            Some(status) => status,
            None => {
                tracing::warn!(
                    request_id = %stored.data.id,
                    raw_status = ?stored.status,
                    "Unrecognized stored status, treating request as processing"
                );
                RequestStatus::Processing
            }
        }
    }

    fn record_outcome(&self, role: ActingRole, desired: RequestStatus, result: &Result<Request>) {
        let outcome = match result {
            Ok(_) => "committed",
            Err(e) => e.kind(),
        };
        counter!(
            "clubdesk_transition_attempts_total",
            "role" => role.as_str(),
            "to" => desired.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            match result {
                Ok(_) => metrics.record_transition(role.as_str(), desired.as_str()),
                Err(e) => metrics.record_rejection(role.as_str(), e.kind()),
            }
        }
    }
}
