use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::form::FormTypeId;
use crate::domain::org::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Human-readable request number, e.g. `LEAVE-202608-000001`. Issued once
/// at first submission and permanent afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestNo(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Draft,
    ApprovalInProgress,
    ApprovalRejected,
    ReceiveInProgress,
    ReceiveRejected,
    Completed,
    Withdrawn,
}

impl RequestStatus {
    /// Draft upsert and re-submission are allowed only from these states.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::ApprovalRejected | Self::ReceiveRejected)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Withdrawn)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestMaster {
    pub id: RequestId,
    pub request_no: Option<RequestNo>,
    pub form_type_id: FormTypeId,
    pub requester_id: UserId,
    pub title: String,
    pub content: serde_json::Value,
    pub status: RequestStatus,
    pub current_step_order: Option<i64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestMaster {
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::{
            ApprovalInProgress, ApprovalRejected, Completed, Draft, ReceiveInProgress,
            ReceiveRejected, Withdrawn,
        };

        matches!(
            (self.status, next),
            (Draft, ApprovalInProgress | ReceiveInProgress | Completed)
                | (ApprovalRejected, Draft | ApprovalInProgress | ReceiveInProgress | Completed)
                | (ReceiveRejected, Draft | ApprovalInProgress | ReceiveInProgress | Completed)
                | (ApprovalInProgress, ApprovalRejected | ReceiveInProgress | Completed | Withdrawn)
                | (ReceiveInProgress, ReceiveRejected | Completed)
        )
    }

    pub fn transition_to(&mut self, next: RequestStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidRequestTransition { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::form::FormTypeId;
    use crate::domain::org::UserId;

    use super::{RequestId, RequestMaster, RequestStatus};

    fn request(status: RequestStatus) -> RequestMaster {
        let now = Utc::now();
        RequestMaster {
            id: RequestId("req-1".to_string()),
            request_no: None,
            form_type_id: FormTypeId("ft-leave".to_string()),
            requester_id: UserId("u-requester".to_string()),
            title: "Annual leave".to_string(),
            content: serde_json::json!({"days": 3}),
            status,
            current_step_order: None,
            submitted_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn allows_submission_from_draft() {
        let mut request = request(RequestStatus::Draft);
        request.transition_to(RequestStatus::ApprovalInProgress).expect("draft -> in progress");
        assert_eq!(request.status, RequestStatus::ApprovalInProgress);
    }

    #[test]
    fn rejected_requests_can_be_resubmitted_or_saved_back_to_draft() {
        let mut request = request(RequestStatus::ApprovalRejected);
        request.transition_to(RequestStatus::Draft).expect("rejected -> draft");
        request.transition_to(RequestStatus::ApprovalInProgress).expect("draft -> in progress");
        assert_eq!(request.status, RequestStatus::ApprovalInProgress);
    }

    #[test]
    fn blocks_withdraw_outside_approval_phase() {
        let mut request = request(RequestStatus::ReceiveInProgress);
        let error = request
            .transition_to(RequestStatus::Withdrawn)
            .expect_err("receive phase cannot withdraw");
        assert!(matches!(
            error,
            crate::errors::DomainError::InvalidRequestTransition { .. }
        ));
    }

    #[test]
    fn terminal_states_accept_no_transitions() {
        for status in [RequestStatus::Completed, RequestStatus::Withdrawn] {
            let request = request(status);
            for next in [
                RequestStatus::Draft,
                RequestStatus::ApprovalInProgress,
                RequestStatus::Completed,
                RequestStatus::Withdrawn,
            ] {
                assert!(!request.can_transition_to(next), "{status:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn editable_statuses_match_draft_upsert_guard() {
        assert!(RequestStatus::Draft.is_editable());
        assert!(RequestStatus::ApprovalRejected.is_editable());
        assert!(RequestStatus::ReceiveRejected.is_editable());
        assert!(!RequestStatus::ApprovalInProgress.is_editable());
        assert!(!RequestStatus::Completed.is_editable());
    }
}
