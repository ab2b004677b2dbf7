use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hrflow_core::domain::form::FormTypeId;
use hrflow_core::domain::org::{OrgUnitId, UserId};
use hrflow_core::domain::request::{RequestId, RequestMaster, RequestNo, RequestStatus};
use hrflow_core::domain::step::{StepActionStatus, StepSnapshot, StepType};
use hrflow_core::history::{HistoryEvent, HistoryEventType};
use hrflow_db::repositories::snapshots::PendingTaskRow;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub request_id: RequestId,
    pub request_no: Option<RequestNo>,
    pub form_type_id: FormTypeId,
    pub title: String,
    pub status: RequestStatus,
    pub current_step_order: Option<i64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&RequestMaster> for RequestSummary {
    fn from(master: &RequestMaster) -> Self {
        Self {
            request_id: master.id.clone(),
            request_no: master.request_no.clone(),
            form_type_id: master.form_type_id.clone(),
            title: master.title.clone(),
            status: master.status,
            current_step_order: master.current_step_order,
            submitted_at: master.submitted_at,
            created_at: master.created_at,
            updated_at: master.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub current_step_order: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub request_id: RequestId,
    pub status: RequestStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepView {
    pub step_order: i64,
    pub step_type: StepType,
    pub actor_user_id: UserId,
    pub actor_display_name: String,
    pub actor_org_unit_id: Option<OrgUnitId>,
    pub status: StepActionStatus,
    pub acted_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

impl From<&StepSnapshot> for StepView {
    fn from(snapshot: &StepSnapshot) -> Self {
        Self {
            step_order: snapshot.step_order,
            step_type: snapshot.step_type,
            actor_user_id: snapshot.actor_user_id.clone(),
            actor_display_name: snapshot.actor_display_name.clone(),
            actor_org_unit_id: snapshot.actor_org_unit_id.clone(),
            status: snapshot.status,
            acted_at: snapshot.acted_at,
            comment: snapshot.comment.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryView {
    pub event_type: HistoryEventType,
    pub from_status: Option<RequestStatus>,
    pub to_status: RequestStatus,
    pub actor_id: UserId,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl From<&HistoryEvent> for HistoryView {
    fn from(event: &HistoryEvent) -> Self {
        Self {
            event_type: event.event_type,
            from_status: event.from_status,
            to_status: event.to_status,
            actor_id: event.actor_id.clone(),
            payload: event.payload.clone(),
            occurred_at: event.occurred_at,
        }
    }
}

/// Full read model: master fields plus the step timeline and the durable
/// transition history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestDetail {
    pub summary: RequestSummary,
    pub requester_id: UserId,
    pub content: serde_json::Value,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepView>,
    pub history: Vec<HistoryView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub request_id: RequestId,
    pub request_no: Option<RequestNo>,
    pub title: String,
    pub requester_id: UserId,
    pub step_order: i64,
    pub step_type: StepType,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<PendingTaskRow> for TaskItem {
    fn from(row: PendingTaskRow) -> Self {
        Self {
            request_id: row.request_id,
            request_no: row.request_no,
            title: row.title,
            requester_id: row.requester_id,
            step_order: row.step_order,
            step_type: row.step_type,
            submitted_at: row.submitted_at,
        }
    }
}
