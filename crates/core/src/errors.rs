use thiserror::Error;

use crate::domain::request::RequestStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid request transition from {from:?} to {to:?}")]
    InvalidRequestTransition { from: RequestStatus, to: RequestStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure taxonomy of the workflow engine. Every variant aborts the whole
/// transition; nothing is retried here and failed attempts leave no history.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("action not permitted while request status is {status:?}")]
    Conflict { status: RequestStatus },
    #[error("acting user is not authorized for this step")]
    Forbidden,
    #[error("configuration incomplete: {0}")]
    Configuration(String),
    #[error("no actor matched role `{role_code}` with keywords {keywords:?}")]
    Resolution { role_code: String, keywords: Vec<String> },
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden")]
    Forbidden { correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Forbidden { .. } => "You are not allowed to act on this request.",
            Self::Conflict { .. } => {
                "The request has moved on since you loaded it. Refresh and retry."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl EngineError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<EngineError> for InterfaceError {
    fn from(value: EngineError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            EngineError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned }
            }
            EngineError::NotFound { entity, id } => Self::NotFound {
                message: format!("{entity} `{id}`"),
                correlation_id: unassigned,
            },
            // Deliberately silent about who the correct actor is.
            EngineError::Forbidden => Self::Forbidden { correlation_id: unassigned },
            EngineError::Conflict { status } => Self::Conflict {
                message: format!("current status is {status:?}"),
                correlation_id: unassigned,
            },
            EngineError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
            error @ EngineError::Resolution { .. } => {
                Self::Internal { message: error.to_string(), correlation_id: unassigned }
            }
            EngineError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned }
            }
        }
    }
}
