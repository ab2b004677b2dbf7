//! Transition history events. The history table is the only append-only
//! audit trail the engine keeps; step snapshots are replaced wholesale on
//! re-submission and must never be treated as one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::org::UserId;
use crate::domain::request::{RequestId, RequestStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEventType {
    Create,
    DraftSave,
    Submit,
    Withdraw,
    Approve,
    Reject,
    ReceiveComplete,
    ReceiveReject,
}

impl HistoryEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::DraftSave => "DRAFT_SAVE",
            Self::Submit => "SUBMIT",
            Self::Withdraw => "WITHDRAW",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::ReceiveComplete => "RECEIVE_COMPLETE",
            Self::ReceiveReject => "RECEIVE_REJECT",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CREATE" => Some(Self::Create),
            "DRAFT_SAVE" => Some(Self::DraftSave),
            "SUBMIT" => Some(Self::Submit),
            "WITHDRAW" => Some(Self::Withdraw),
            "APPROVE" => Some(Self::Approve),
            "REJECT" => Some(Self::Reject),
            "RECEIVE_COMPLETE" => Some(Self::ReceiveComplete),
            "RECEIVE_REJECT" => Some(Self::ReceiveReject),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: String,
    pub request_id: RequestId,
    pub event_type: HistoryEventType,
    pub from_status: Option<RequestStatus>,
    pub to_status: RequestStatus,
    pub actor_id: UserId,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl HistoryEvent {
    pub fn new(
        request_id: RequestId,
        event_type: HistoryEventType,
        from_status: Option<RequestStatus>,
        to_status: RequestStatus,
        actor_id: UserId,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            request_id,
            event_type,
            from_status,
            to_status,
            actor_id,
            payload: serde_json::Value::Null,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::org::UserId;
    use crate::domain::request::{RequestId, RequestStatus};

    use super::{HistoryEvent, HistoryEventType};

    #[test]
    fn event_type_round_trips_through_storage_form() {
        for event_type in [
            HistoryEventType::Create,
            HistoryEventType::DraftSave,
            HistoryEventType::Submit,
            HistoryEventType::Withdraw,
            HistoryEventType::Approve,
            HistoryEventType::Reject,
            HistoryEventType::ReceiveComplete,
            HistoryEventType::ReceiveReject,
        ] {
            assert_eq!(HistoryEventType::parse(event_type.as_str()), Some(event_type));
        }
        assert_eq!(HistoryEventType::parse("DELEGATE"), None);
    }

    #[test]
    fn events_carry_distinct_ids_and_payload() {
        let first = HistoryEvent::new(
            RequestId("req-1".to_string()),
            HistoryEventType::Submit,
            Some(RequestStatus::Draft),
            RequestStatus::ApprovalInProgress,
            UserId("u-001".to_string()),
        )
        .with_payload(serde_json::json!({"request_no": "LEAVE-202608-000001"}));

        let second = HistoryEvent::new(
            RequestId("req-1".to_string()),
            HistoryEventType::Approve,
            Some(RequestStatus::ApprovalInProgress),
            RequestStatus::Completed,
            UserId("u-002".to_string()),
        );

        assert_ne!(first.event_id, second.event_id);
        assert_eq!(first.payload["request_no"], "LEAVE-202608-000001");
        assert!(second.payload.is_null());
    }
}
