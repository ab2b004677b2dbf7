pub mod calendar;
pub mod config;
pub mod domain;
pub mod errors;
pub mod history;
pub mod lifecycle;
pub mod resolution;
pub mod selection;

pub use calendar::{BusinessCalendar, FixedBusinessCalendar, SystemBusinessCalendar};
pub use domain::form::{FormType, FormTypeId};
pub use domain::org::{EmployeeProfile, EmploymentStatus, OrgUnitId, UserAccount, UserId};
pub use domain::request::{RequestId, RequestMaster, RequestNo, RequestStatus};
pub use domain::step::{ActorMode, RequiredAction, StepActionStatus, StepSnapshot, StepType};
pub use domain::template::{
    ApprovalLineTemplate, FormTypeApprovalMap, TemplateId, TemplateScope, TemplateStep,
};
pub use errors::{DomainError, EngineError, InterfaceError};
pub use history::{HistoryEvent, HistoryEventType};
pub use lifecycle::{
    current_waiting_step, initial_progression, progression_after_approval,
    progression_after_receive, Progression,
};
pub use resolution::{
    parse_keyword_list, title_matches, ActorResolutionRule, ActorResolver, Directory,
    FallbackPolicy, InMemoryDirectory, ResolutionError, ResolutionMethod, ResolvedActor,
    ADMIN_ROLE_CODE, DEFAULT_STEP_ROLE,
};
pub use selection::{select_template, SelectionError, TemplateTieBreak};
