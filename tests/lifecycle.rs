use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use clubdesk::manager::{InMemoryRequestStore, RequestFilter, RequestStore, StaticRoleResolver};
use clubdesk::request::{
    ActingRole, ActorId, ActorScope, ClubId, DepartmentId, RawStatus, RequestData, RequestId,
    RequestStatus, Severity, StatusCommit, StoredRequest, TransitionRecord,
};
use clubdesk::{ClubdeskError, ControllerConfig, LifecycleController};
use tokio::sync::Barrier;
use uuid::Uuid;

const DEPT_REVIEWER: &str = "dept-reviewer";
const CLUB_OFFICER: &str = "club-officer";
const OTHER_OFFICER: &str = "other-club-officer";
const OTHER_REVIEWER: &str = "other-dept-reviewer";

struct Fixture {
    store: InMemoryRequestStore,
    controller: LifecycleController<InMemoryRequestStore, StaticRoleResolver>,
    department: DepartmentId,
    club: ClubId,
}

fn resolver(department: DepartmentId, club: ClubId) -> StaticRoleResolver {
    StaticRoleResolver::new()
        .with_actor(DEPT_REVIEWER, ActorScope::Department(department))
        .with_actor(CLUB_OFFICER, ActorScope::Club(club))
        .with_actor(OTHER_OFFICER, ActorScope::Club(ClubId(Uuid::new_v4())))
        .with_actor(
            OTHER_REVIEWER,
            ActorScope::Department(DepartmentId(Uuid::new_v4())),
        )
}

fn fixture() -> Fixture {
    fixture_with_config(ControllerConfig::default())
}

fn fixture_with_config(config: ControllerConfig) -> Fixture {
    let department = DepartmentId(Uuid::new_v4());
    let club = ClubId(Uuid::new_v4());
    let store = InMemoryRequestStore::new();
    let controller = LifecycleController::new(
        Arc::new(store.clone()),
        Arc::new(resolver(department, club)),
    )
    .with_config(config);
    Fixture {
        store,
        controller,
        department,
        club,
    }
}

impl Fixture {
    fn request_data(&self) -> RequestData {
        RequestData {
            id: RequestId(Uuid::new_v4()),
            requesting_party: "Astronomy Club".to_string(),
            department_id: self.department,
            club_id: self.club,
            description: "Telescope loan for the spring star party".to_string(),
            created_at: Utc::now(),
        }
    }

    fn seed(&self, status: impl Into<RawStatus>) -> RequestId {
        self.store.insert(self.request_data(), status).data.id
    }

    async fn attempt(
        &self,
        id: RequestId,
        desired: RequestStatus,
        role: ActingRole,
        actor: &str,
    ) -> clubdesk::Result<clubdesk::Request> {
        self.controller
            .attempt_transition(id, desired, role, &ActorId::from(actor))
            .await
    }
}

#[test_log::test(tokio::test)]
async fn test_department_approves_pending_request() {
    let f = fixture();
    let id = f.seed(RequestStatus::DepartmentPending);

    let request = f
        .attempt(
            id,
            RequestStatus::DepartmentApproved,
            ActingRole::Department,
            DEPT_REVIEWER,
        )
        .await
        .expect("department should approve a pending request");

    assert_eq!(request.status, RequestStatus::DepartmentApproved);
    assert_eq!(request.last_transition_by(), Some(&ActorId::from(DEPT_REVIEWER)));
    assert!(request.last_transition_at().is_some());

    let stored = f.store.get(id).await.unwrap();
    assert_eq!(stored.status, RawStatus::Code(3));
}

#[test_log::test(tokio::test)]
async fn test_club_cannot_act_while_department_pending() {
    let f = fixture();
    let id = f.seed(RequestStatus::DepartmentPending);

    let err = f
        .attempt(id, RequestStatus::ClubApproved, ActingRole::Club, CLUB_OFFICER)
        .await
        .unwrap_err();

    match err {
        ClubdeskError::IllegalTransition {
            current,
            desired,
            role,
        } => {
            assert_eq!(current, RequestStatus::DepartmentPending);
            assert_eq!(desired, RequestStatus::ClubApproved);
            assert_eq!(role, ActingRole::Club);
        }
        other => panic!("Expected IllegalTransition, got {:?}", other),
    }

    // Nothing was written
    let stored = f.store.get(id).await.unwrap();
    assert_eq!(stored.status, RawStatus::from(RequestStatus::DepartmentPending));
    assert!(stored.last_transition.is_none());
}

#[tokio::test]
async fn test_collect_then_no_way_back_to_department() {
    let f = fixture();
    let id = f.seed(RequestStatus::ClubApproved);

    let collected = f
        .attempt(id, RequestStatus::Collected, ActingRole::Club, CLUB_OFFICER)
        .await
        .unwrap();
    assert_eq!(collected.status, RequestStatus::Collected);

    let err = f
        .attempt(
            id,
            RequestStatus::DepartmentApproved,
            ActingRole::Club,
            CLUB_OFFICER,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClubdeskError::IllegalTransition {
            current: RequestStatus::Collected,
            desired: RequestStatus::DepartmentApproved,
            ..
        }
    ));
}

/// Store wrapper that holds every `get` until two callers have read, so both attempts
/// decide on the same status before either commits.
#[derive(Clone)]
struct RacingStore {
    inner: InMemoryRequestStore,
    barrier: Arc<Barrier>,
}

#[async_trait]
impl RequestStore for RacingStore {
    async fn get(&self, id: RequestId) -> clubdesk::Result<StoredRequest> {
        let stored = self.inner.get(id).await?;
        self.barrier.wait().await;
        Ok(stored)
    }

    async fn compare_and_swap_status(
        &self,
        id: RequestId,
        expected: &RawStatus,
        commit: &StatusCommit,
    ) -> clubdesk::Result<bool> {
        self.inner.compare_and_swap_status(id, expected, commit).await
    }

    async fn list(&self, filter: &RequestFilter) -> clubdesk::Result<Vec<StoredRequest>> {
        self.inner.list(filter).await
    }

    async fn history(&self, id: RequestId) -> clubdesk::Result<Vec<TransitionRecord>> {
        self.inner.history(id).await
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_concurrent_transitions_exactly_one_wins() {
    let department = DepartmentId(Uuid::new_v4());
    let club = ClubId(Uuid::new_v4());
    let inner = InMemoryRequestStore::new();
    let id = inner
        .insert(
            RequestData {
                id: RequestId(Uuid::new_v4()),
                requesting_party: "Drama Club".to_string(),
                department_id: department,
                club_id: club,
                description: "Stage lights".to_string(),
                created_at: Utc::now(),
            },
            RequestStatus::ClubApproved,
        )
        .data
        .id;

    let store = RacingStore {
        inner: inner.clone(),
        barrier: Arc::new(Barrier::new(2)),
    };
    let controller = Arc::new(LifecycleController::new(
        Arc::new(store),
        Arc::new(resolver(department, club)),
    ));

    let collect = {
        let controller = controller.clone();
        tokio::spawn(async move {
            controller
                .attempt_transition(
                    id,
                    RequestStatus::Collected,
                    ActingRole::Club,
                    &ActorId::from(CLUB_OFFICER),
                )
                .await
        })
    };
    let returned = {
        let controller = controller.clone();
        tokio::spawn(async move {
            controller
                .attempt_transition(
                    id,
                    RequestStatus::Returned,
                    ActingRole::Club,
                    &ActorId::from(CLUB_OFFICER),
                )
                .await
        })
    };

    let results = [collect.await.unwrap(), returned.await.unwrap()];
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let losers: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(winners.len(), 1, "exactly one attempt should commit");
    assert_eq!(losers.len(), 1);
    assert!(
        matches!(losers[0], ClubdeskError::ConflictRetry(conflicted) if *conflicted == id),
        "loser should get ConflictRetry, got {:?}",
        losers[0]
    );
    assert!(losers[0].is_retryable());

    // The store holds the winner's decision and exactly one history entry
    let stored = inner.get(id).await.unwrap();
    assert_eq!(stored.status, RawStatus::from(winners[0].status));
    let history = inner.history(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from, RequestStatus::ClubApproved);
    assert_eq!(history[0].to, winners[0].status);
}

#[tokio::test]
async fn test_legacy_under_consideration_is_department_pending() {
    let f = fixture();
    for legacy in ["Under Consideration", "UNDER CONSIDERATION", "under consideration"] {
        let id = f.seed(legacy);
        let request = f.controller.get_request(id).await.unwrap();
        assert_eq!(request.status, RequestStatus::DepartmentPending, "{legacy}");
    }
}

#[tokio::test]
async fn test_legacy_status_is_rewritten_canonically_on_commit() {
    let f = fixture();
    let id = f.seed("Under Consideration");

    let request = f
        .attempt(
            id,
            RequestStatus::DepartmentRejected,
            ActingRole::Department,
            DEPT_REVIEWER,
        )
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::DepartmentRejected);

    let stored = f.store.get(id).await.unwrap();
    assert_eq!(stored.status, RawStatus::Code(2));

    let history = f.controller.history(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from, RequestStatus::DepartmentPending);
    assert_eq!(history[0].role, ActingRole::Department);
}

#[tokio::test]
async fn test_unrecognized_stored_status_is_treated_as_processing() {
    let f = fixture();
    let id = f.seed("lost in the mail");

    let request = f.controller.get_request(id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Processing);

    // Club may act on it as it would on any processing request
    let approved = f
        .attempt(id, RequestStatus::ClubApproved, ActingRole::Club, CLUB_OFFICER)
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::ClubApproved);

    let missing = f.seed(RawStatus::Missing);
    assert_eq!(
        f.controller.get_request(missing).await.unwrap().status,
        RequestStatus::Processing
    );
}

#[tokio::test]
async fn test_terminal_states_reject_every_move() {
    let f = fixture();
    for terminal in [
        RequestStatus::DepartmentRejected,
        RequestStatus::ClubRejected,
        RequestStatus::Returned,
    ] {
        let id = f.seed(terminal);
        for desired in RequestStatus::ALL {
            let as_club = f
                .attempt(id, desired, ActingRole::Club, CLUB_OFFICER)
                .await;
            assert!(
                matches!(as_club, Err(ClubdeskError::IllegalTransition { .. })),
                "club moved {terminal} to {desired}"
            );
            let as_department = f
                .attempt(id, desired, ActingRole::Department, DEPT_REVIEWER)
                .await;
            assert!(
                matches!(as_department, Err(ClubdeskError::IllegalTransition { .. })),
                "department moved {terminal} to {desired}"
            );
        }
        assert!(f.controller.history(id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_full_fulfillment_path() {
    let f = fixture();
    let id = f.seed(RequestStatus::DepartmentPending);

    let steps = [
        (RequestStatus::DepartmentApproved, ActingRole::Department, DEPT_REVIEWER),
        (RequestStatus::ClubApproved, ActingRole::Club, CLUB_OFFICER),
        (RequestStatus::Collected, ActingRole::Club, CLUB_OFFICER),
        (RequestStatus::Overdue, ActingRole::Club, CLUB_OFFICER),
        (RequestStatus::Returned, ActingRole::Club, CLUB_OFFICER),
    ];
    for (desired, role, actor) in steps {
        let request = f.attempt(id, desired, role, actor).await.unwrap();
        assert_eq!(request.status, desired);
    }

    let history = f.controller.history(id).await.unwrap();
    let path: Vec<_> = history.iter().map(|h| (h.from, h.to)).collect();
    assert_eq!(
        path,
        vec![
            (RequestStatus::DepartmentPending, RequestStatus::DepartmentApproved),
            (RequestStatus::DepartmentApproved, RequestStatus::ClubApproved),
            (RequestStatus::ClubApproved, RequestStatus::Collected),
            (RequestStatus::Collected, RequestStatus::Overdue),
            (RequestStatus::Overdue, RequestStatus::Returned),
        ]
    );

    let request = f.controller.get_request(id).await.unwrap();
    assert_eq!(request.view().severity, Severity::Success);
    assert_eq!(request.view().progress.step, 5);
}

#[tokio::test]
async fn test_scope_mismatch_for_other_club() {
    let f = fixture();
    let id = f.seed(RequestStatus::ClubApproved);

    let err = f
        .attempt(id, RequestStatus::Collected, ActingRole::Club, OTHER_OFFICER)
        .await
        .unwrap_err();
    assert!(matches!(err, ClubdeskError::ScopeMismatch { .. }), "{err:?}");
    assert!(!err.is_retryable());

    let stored = f.store.get(id).await.unwrap();
    assert_eq!(stored.status, RawStatus::from(RequestStatus::ClubApproved));
}

#[tokio::test]
async fn test_scope_mismatch_for_other_department() {
    let f = fixture();
    let id = f.seed(RequestStatus::DepartmentPending);

    let err = f
        .attempt(
            id,
            RequestStatus::DepartmentApproved,
            ActingRole::Department,
            OTHER_REVIEWER,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClubdeskError::ScopeMismatch { .. }), "{err:?}");
}

#[tokio::test]
async fn test_scope_mismatch_when_role_disagrees_with_resolver() {
    let f = fixture();
    let id = f.seed(RequestStatus::DepartmentPending);

    // A club officer claiming the department role is refused even though the
    // department role could act at this stage.
    let err = f
        .attempt(
            id,
            RequestStatus::DepartmentApproved,
            ActingRole::Department,
            CLUB_OFFICER,
        )
        .await
        .unwrap_err();
    match err {
        ClubdeskError::ScopeMismatch { actor, reason, .. } => {
            assert_eq!(actor, ActorId::from(CLUB_OFFICER));
            assert!(reason.contains("club"), "{reason}");
        }
        other => panic!("Expected ScopeMismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_actor_and_missing_request() {
    let f = fixture();
    let id = f.seed(RequestStatus::Processing);

    let err = f
        .attempt(id, RequestStatus::ClubApproved, ActingRole::Club, "nobody")
        .await
        .unwrap_err();
    assert!(matches!(err, ClubdeskError::UnknownActor(ref actor) if actor.0 == "nobody"));

    let missing = RequestId(Uuid::new_v4());
    let err = f
        .attempt(missing, RequestStatus::ClubApproved, ActingRole::Club, CLUB_OFFICER)
        .await
        .unwrap_err();
    assert!(matches!(err, ClubdeskError::RequestNotFound(m) if m == missing));
}

#[tokio::test]
async fn test_allowed_transitions_per_actor() {
    let f = fixture();
    let id = f.seed(RequestStatus::DepartmentPending);

    let dept = f
        .controller
        .allowed_transitions(id, &ActorId::from(DEPT_REVIEWER))
        .await
        .unwrap();
    assert_eq!(
        dept,
        vec![RequestStatus::DepartmentApproved, RequestStatus::DepartmentRejected]
    );

    // In scope but not their turn
    let club = f
        .controller
        .allowed_transitions(id, &ActorId::from(CLUB_OFFICER))
        .await
        .unwrap();
    assert!(club.is_empty());

    // Out of scope is an error, not an empty list
    let err = f
        .controller
        .allowed_transitions(id, &ActorId::from(OTHER_OFFICER))
        .await
        .unwrap_err();
    assert!(matches!(err, ClubdeskError::ScopeMismatch { .. }));
}

#[tokio::test]
async fn test_list_requests_normalizes_and_filters() {
    let f = fixture();
    let legacy = f.seed("approved");
    let canonical = f.seed(RequestStatus::ClubApproved);
    f.seed(RequestStatus::DepartmentPending);
    f.seed("Under Consideration");

    let approved = f
        .controller
        .list_requests(&RequestFilter::for_club(f.club).with_status(RequestStatus::ClubApproved))
        .await
        .unwrap();
    let mut ids: Vec<_> = approved.iter().map(|r| r.id()).collect();
    ids.sort_by_key(|id| id.0);
    let mut expected = vec![legacy, canonical];
    expected.sort_by_key(|id| id.0);
    assert_eq!(ids, expected);
    assert!(approved.iter().all(|r| r.status == RequestStatus::ClubApproved));

    let pending = f
        .controller
        .list_requests(
            &RequestFilter::for_department(f.department)
                .with_status(RequestStatus::DepartmentPending)
                .with_limit(1),
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    let other_club = f
        .controller
        .list_requests(&RequestFilter::for_club(ClubId(Uuid::new_v4())))
        .await
        .unwrap();
    assert!(other_club.is_empty());
}

#[tokio::test]
async fn test_extra_aliases_and_history_toggle() {
    let config = ControllerConfig::from_json(
        r#"{"extra_status_aliases": {"Ready For Pickup": "club_approved"}, "record_history": false}"#,
    )
    .unwrap();
    let f = fixture_with_config(config);
    let id = f.seed("ready for pickup");

    let request = f
        .attempt(id, RequestStatus::Collected, ActingRole::Club, CLUB_OFFICER)
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Collected);
    assert!(f.controller.history(id).await.unwrap().is_empty());

    // Without the alias the same text is unrecognized, hence processing
    let plain = fixture();
    let other = plain.seed("ready for pickup");
    assert_eq!(
        plain.controller.get_request(other).await.unwrap().status,
        RequestStatus::Processing
    );
}

#[tokio::test]
async fn test_sequential_retry_after_conflict_sees_new_state() {
    let f = fixture();
    let id = f.seed(RequestStatus::ClubApproved);

    f.attempt(id, RequestStatus::Returned, ActingRole::Club, CLUB_OFFICER)
        .await
        .unwrap();

    // A caller retrying a stale "mark collected" after re-reading gets a policy answer
    let err = f
        .attempt(id, RequestStatus::Collected, ActingRole::Club, CLUB_OFFICER)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClubdeskError::IllegalTransition {
            current: RequestStatus::Returned,
            ..
        }
    ));
}
