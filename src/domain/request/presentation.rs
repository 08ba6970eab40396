//! Read-only presentation of statuses for dashboards and lists.
//!
//! Nothing in here feeds back into transition legality.

use serde::Serialize;

use super::status::RequestStatus;

/// Visual urgency of a status, named after the badge variants the dashboards render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Destructive,
    Warning,
    Secondary,
    Default,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Destructive => "destructive",
            Severity::Warning => "warning",
            Severity::Secondary => "secondary",
            Severity::Default => "default",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable label.
pub fn label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Processing => "Processing",
        RequestStatus::DepartmentPending => "Department Approval Pending",
        RequestStatus::DepartmentRejected => "Rejected by Department",
        RequestStatus::DepartmentApproved => "Approved by Department",
        RequestStatus::ClubRejected => "Rejected by Club",
        RequestStatus::ClubApproved => "Approved by Club",
        RequestStatus::Collected => "Collected",
        RequestStatus::Overdue => "Overdue",
        RequestStatus::Returned => "Returned",
    }
}

pub fn severity(status: RequestStatus) -> Severity {
    match status {
        RequestStatus::DepartmentApproved | RequestStatus::ClubApproved | RequestStatus::Returned => {
            Severity::Success
        }
        RequestStatus::DepartmentRejected | RequestStatus::ClubRejected | RequestStatus::Overdue => {
            Severity::Destructive
        }
        RequestStatus::DepartmentPending => Severity::Warning,
        RequestStatus::Processing => Severity::Secondary,
        RequestStatus::Collected => Severity::Default,
    }
}

/// Position of a status on a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// 1-based step reached.
    pub step: u8,
    /// Number of steps on the bar.
    pub total: u8,
    /// The request stopped here and will not reach later steps.
    pub halted: bool,
}

/// Steps: department review, club review, club decision, fulfillment, closed.
pub const PROGRESS_STEPS: u8 = 5;

/// Display-only ordering of statuses.
///
/// Independent of the transition table and of the numeric codes.
pub fn progress(status: RequestStatus) -> Progress {
    let (step, halted) = match status {
        RequestStatus::DepartmentPending => (1, false),
        RequestStatus::DepartmentRejected => (1, true),
        RequestStatus::Processing | RequestStatus::DepartmentApproved => (2, false),
        RequestStatus::ClubRejected => (3, true),
        RequestStatus::ClubApproved => (3, false),
        RequestStatus::Collected | RequestStatus::Overdue => (4, false),
        RequestStatus::Returned => (5, false),
    };
    Progress {
        step,
        total: PROGRESS_STEPS,
        halted,
    }
}

/// Everything a list row needs to render a status badge.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub status: RequestStatus,
    pub code: u8,
    pub label: &'static str,
    pub severity: Severity,
    pub progress: Progress,
}

impl From<RequestStatus> for StatusView {
    fn from(status: RequestStatus) -> Self {
        StatusView {
            status,
            code: status.code(),
            label: label(status),
            severity: severity(status),
            progress: progress(status),
        }
    }
}
