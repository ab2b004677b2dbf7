use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::org::{OrgUnitId, UserId};
use crate::domain::request::RequestId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Approval,
    Receive,
    Reference,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepActionStatus {
    Waiting,
    Approved,
    Rejected,
    Received,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorMode {
    RoleBased,
    UserFixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequiredAction {
    Approve,
    Receive,
}

/// Frozen per-request copy of one template step. Actor identity, display
/// name, and org unit are captured at submission time and never re-read
/// from the directory afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub request_id: RequestId,
    pub step_order: i64,
    pub step_type: StepType,
    pub actor_user_id: UserId,
    pub actor_display_name: String,
    pub actor_org_unit_id: Option<OrgUnitId>,
    pub status: StepActionStatus,
    pub acted_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

impl StepSnapshot {
    pub fn is_waiting(&self) -> bool {
        self.status == StepActionStatus::Waiting
    }
}
