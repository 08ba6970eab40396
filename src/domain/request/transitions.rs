//! Role-gated transition policy for requests.
//!
//! The policy is a single table keyed by `(current status, acting role)`:
//!
//! ```text
//! DepartmentPending ──department──> DepartmentApproved ──club──> ClubApproved | ClubRejected
//!                   ──department──> DepartmentRejected
//!
//! Processing ──club──> ClubApproved | ClubRejected
//!
//! ClubApproved ──club──> Collected | Overdue | Returned
//! Collected    ──club──> Returned | Overdue
//! Overdue      ──club──> Returned
//! ```
//!
//! Nothing here compares numeric codes. The table is matched exhaustively, so adding a status
//! or a role fails to compile until the table says what it may do.

use super::status::RequestStatus;
use crate::domain::actor::ActingRole;

const NONE: &[RequestStatus] = &[];

/// States reachable next from `current` when acting as `role`.
///
/// Total over every pair; any pair not listed returns an empty slice.
pub fn allowed_next_states(current: RequestStatus, role: ActingRole) -> &'static [RequestStatus] {
    use RequestStatus::*;

    match (role, current) {
        (ActingRole::Department, DepartmentPending) => &[DepartmentApproved, DepartmentRejected],
        (ActingRole::Department, _) => NONE,

        (ActingRole::Club, Processing | DepartmentApproved) => &[ClubApproved, ClubRejected],
        (ActingRole::Club, ClubApproved) => &[Collected, Overdue, Returned],
        (ActingRole::Club, Collected) => &[Returned, Overdue],
        (ActingRole::Club, Overdue) => &[Returned],
        (
            ActingRole::Club,
            DepartmentPending | DepartmentRejected | ClubRejected | Returned,
        ) => NONE,
    }
}

/// Whether `role` may move a request from `current` to `desired`.
pub fn can_transition(current: RequestStatus, desired: RequestStatus, role: ActingRole) -> bool {
    allowed_next_states(current, role).contains(&desired)
}

/// A status is terminal when no role has a way out of it.
pub fn is_terminal(status: RequestStatus) -> bool {
    ActingRole::ALL
        .iter()
        .all(|role| allowed_next_states(status, *role).is_empty())
}

/// The role whose move it is, or `None` for terminal states.
pub fn awaiting_role(status: RequestStatus) -> Option<ActingRole> {
    ActingRole::ALL
        .into_iter()
        .find(|role| !allowed_next_states(status, *role).is_empty())
}
