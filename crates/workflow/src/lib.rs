pub mod service;
pub mod submission;
pub mod views;

pub use service::WorkflowService;
pub use views::{
    ActionOutcome, HistoryView, RequestDetail, RequestSummary, StepView, SubmitOutcome, TaskItem,
};
