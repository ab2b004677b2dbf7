use thiserror::Error;

use hrflow_core::domain::org::EmploymentStatus;
use hrflow_core::domain::request::RequestStatus;
use hrflow_core::domain::step::{ActorMode, RequiredAction, StepActionStatus, StepType};
use hrflow_core::domain::template::TemplateScope;
use hrflow_core::resolution::{FallbackPolicy, ResolutionMethod};

pub mod catalog;
pub mod counter;
pub mod directory;
pub mod history;
pub mod requests;
pub mod snapshots;

pub use directory::SqlDirectory;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

// Storage forms for the closed enums. Unknown stored values are decode
// errors, never silent defaults: a misread status could route a request
// to the wrong actor.

pub fn request_status_as_str(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Draft => "DRAFT",
        RequestStatus::ApprovalInProgress => "APPROVAL_IN_PROGRESS",
        RequestStatus::ApprovalRejected => "APPROVAL_REJECTED",
        RequestStatus::ReceiveInProgress => "RECEIVE_IN_PROGRESS",
        RequestStatus::ReceiveRejected => "RECEIVE_REJECTED",
        RequestStatus::Completed => "COMPLETED",
        RequestStatus::Withdrawn => "WITHDRAWN",
    }
}

pub fn parse_request_status(raw: &str) -> Result<RequestStatus, RepositoryError> {
    match raw {
        "DRAFT" => Ok(RequestStatus::Draft),
        "APPROVAL_IN_PROGRESS" => Ok(RequestStatus::ApprovalInProgress),
        "APPROVAL_REJECTED" => Ok(RequestStatus::ApprovalRejected),
        "RECEIVE_IN_PROGRESS" => Ok(RequestStatus::ReceiveInProgress),
        "RECEIVE_REJECTED" => Ok(RequestStatus::ReceiveRejected),
        "COMPLETED" => Ok(RequestStatus::Completed),
        "WITHDRAWN" => Ok(RequestStatus::Withdrawn),
        other => Err(RepositoryError::decode(format!("unknown request status `{other}`"))),
    }
}

pub fn step_type_as_str(step_type: StepType) -> &'static str {
    match step_type {
        StepType::Approval => "APPROVAL",
        StepType::Receive => "RECEIVE",
        StepType::Reference => "REFERENCE",
    }
}

pub fn parse_step_type(raw: &str) -> Result<StepType, RepositoryError> {
    match raw {
        "APPROVAL" => Ok(StepType::Approval),
        "RECEIVE" => Ok(StepType::Receive),
        "REFERENCE" => Ok(StepType::Reference),
        other => Err(RepositoryError::decode(format!("unknown step type `{other}`"))),
    }
}

pub fn step_action_status_as_str(status: StepActionStatus) -> &'static str {
    match status {
        StepActionStatus::Waiting => "WAITING",
        StepActionStatus::Approved => "APPROVED",
        StepActionStatus::Rejected => "REJECTED",
        StepActionStatus::Received => "RECEIVED",
    }
}

pub fn parse_step_action_status(raw: &str) -> Result<StepActionStatus, RepositoryError> {
    match raw {
        "WAITING" => Ok(StepActionStatus::Waiting),
        "APPROVED" => Ok(StepActionStatus::Approved),
        "REJECTED" => Ok(StepActionStatus::Rejected),
        "RECEIVED" => Ok(StepActionStatus::Received),
        other => Err(RepositoryError::decode(format!("unknown step action status `{other}`"))),
    }
}

pub fn actor_mode_as_str(mode: ActorMode) -> &'static str {
    match mode {
        ActorMode::RoleBased => "ROLE_BASED",
        ActorMode::UserFixed => "USER_FIXED",
    }
}

pub fn parse_actor_mode(raw: &str) -> Result<ActorMode, RepositoryError> {
    match raw {
        "ROLE_BASED" => Ok(ActorMode::RoleBased),
        "USER_FIXED" => Ok(ActorMode::UserFixed),
        other => Err(RepositoryError::decode(format!("unknown actor mode `{other}`"))),
    }
}

pub fn required_action_as_str(action: RequiredAction) -> &'static str {
    match action {
        RequiredAction::Approve => "APPROVE",
        RequiredAction::Receive => "RECEIVE",
    }
}

pub fn parse_required_action(raw: &str) -> Result<RequiredAction, RepositoryError> {
    match raw {
        "APPROVE" => Ok(RequiredAction::Approve),
        "RECEIVE" => Ok(RequiredAction::Receive),
        other => Err(RepositoryError::decode(format!("unknown required action `{other}`"))),
    }
}

pub fn template_scope_as_str(scope: TemplateScope) -> &'static str {
    match scope {
        TemplateScope::Global => "global",
        TemplateScope::Company => "company",
        TemplateScope::Department => "department",
        TemplateScope::Team => "team",
        TemplateScope::User => "user",
    }
}

pub fn parse_template_scope(raw: &str) -> Result<TemplateScope, RepositoryError> {
    match raw {
        "global" => Ok(TemplateScope::Global),
        "company" => Ok(TemplateScope::Company),
        "department" => Ok(TemplateScope::Department),
        "team" => Ok(TemplateScope::Team),
        "user" => Ok(TemplateScope::User),
        other => Err(RepositoryError::decode(format!("unknown template scope `{other}`"))),
    }
}

pub fn resolution_method_as_str(method: ResolutionMethod) -> &'static str {
    match method {
        ResolutionMethod::OrgChain => "ORG_CHAIN",
        ResolutionMethod::JobPosition => "JOB_POSITION",
        ResolutionMethod::FixedUser => "FIXED_USER",
    }
}

pub fn parse_resolution_method(raw: &str) -> Result<ResolutionMethod, RepositoryError> {
    match raw {
        "ORG_CHAIN" => Ok(ResolutionMethod::OrgChain),
        "JOB_POSITION" => Ok(ResolutionMethod::JobPosition),
        "FIXED_USER" => Ok(ResolutionMethod::FixedUser),
        other => Err(RepositoryError::decode(format!("unknown resolution method `{other}`"))),
    }
}

pub fn fallback_policy_as_str(policy: FallbackPolicy) -> &'static str {
    match policy {
        FallbackPolicy::Escalate => "ESCALATE",
        FallbackPolicy::HrAdmin => "HR_ADMIN",
        FallbackPolicy::Skip => "SKIP",
    }
}

pub fn parse_fallback_policy(raw: &str) -> Result<FallbackPolicy, RepositoryError> {
    match raw {
        "ESCALATE" => Ok(FallbackPolicy::Escalate),
        "HR_ADMIN" => Ok(FallbackPolicy::HrAdmin),
        "SKIP" => Ok(FallbackPolicy::Skip),
        other => Err(RepositoryError::decode(format!("unknown fallback policy `{other}`"))),
    }
}

pub fn employment_status_as_str(status: EmploymentStatus) -> &'static str {
    match status {
        EmploymentStatus::Active => "active",
        EmploymentStatus::OnLeave => "on_leave",
        EmploymentStatus::Terminated => "terminated",
    }
}

pub fn parse_employment_status(raw: &str) -> Result<EmploymentStatus, RepositoryError> {
    match raw {
        "active" => Ok(EmploymentStatus::Active),
        "on_leave" => Ok(EmploymentStatus::OnLeave),
        "terminated" => Ok(EmploymentStatus::Terminated),
        other => Err(RepositoryError::decode(format!("unknown employment status `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use hrflow_core::domain::request::RequestStatus;

    use super::{parse_request_status, request_status_as_str};

    #[test]
    fn request_status_round_trips_and_rejects_unknown() {
        for status in [
            RequestStatus::Draft,
            RequestStatus::ApprovalInProgress,
            RequestStatus::ApprovalRejected,
            RequestStatus::ReceiveInProgress,
            RequestStatus::ReceiveRejected,
            RequestStatus::Completed,
            RequestStatus::Withdrawn,
        ] {
            let parsed = parse_request_status(request_status_as_str(status)).expect("round trip");
            assert_eq!(parsed, status);
        }

        assert!(parse_request_status("PENDING").is_err());
    }
}
