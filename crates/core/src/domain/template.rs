use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::form::FormTypeId;
use crate::domain::org::UserId;
use crate::domain::step::{ActorMode, RequiredAction, StepType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateScope {
    Global,
    Company,
    Department,
    Team,
    User,
}

/// A reusable approval-line blueprint. Never tied to a single request;
/// requests copy its steps into snapshots at submission time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLineTemplate {
    pub id: TemplateId,
    pub name: String,
    pub scope: TemplateScope,
    pub active: bool,
    pub is_default: bool,
    pub priority: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStep {
    pub template_id: TemplateId,
    pub step_order: i64,
    pub step_type: StepType,
    pub actor_mode: ActorMode,
    pub role_code: Option<String>,
    pub fixed_user_id: Option<UserId>,
    pub allow_delegation: bool,
    pub required_action: RequiredAction,
}

/// Binds a form type to a template for a date range. Overlapping mappings
/// are legal; selection breaks ties by `(priority, id)` descending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTypeApprovalMap {
    pub id: i64,
    pub form_type_id: FormTypeId,
    pub template_id: TemplateId,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub active: bool,
}

impl FormTypeApprovalMap {
    pub fn covers(&self, date: NaiveDate) -> bool {
        if date < self.effective_from {
            return false;
        }
        match self.effective_to {
            Some(until) => date <= until,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::FormTypeApprovalMap;
    use crate::domain::form::FormTypeId;
    use crate::domain::template::TemplateId;

    fn mapping(from: &str, to: Option<&str>) -> FormTypeApprovalMap {
        FormTypeApprovalMap {
            id: 1,
            form_type_id: FormTypeId("ft-leave".to_string()),
            template_id: TemplateId(10),
            effective_from: from.parse::<NaiveDate>().expect("from"),
            effective_to: to.map(|raw| raw.parse::<NaiveDate>().expect("to")),
            active: true,
        }
    }

    #[test]
    fn closed_window_includes_both_bounds() {
        let mapping = mapping("2026-01-01", Some("2026-03-31"));
        assert!(mapping.covers("2026-01-01".parse().expect("date")));
        assert!(mapping.covers("2026-03-31".parse().expect("date")));
        assert!(!mapping.covers("2025-12-31".parse().expect("date")));
        assert!(!mapping.covers("2026-04-01".parse().expect("date")));
    }

    #[test]
    fn open_ended_window_has_no_upper_bound() {
        let mapping = mapping("2026-01-01", None);
        assert!(mapping.covers("2030-01-01".parse().expect("date")));
        assert!(!mapping.covers("2025-06-15".parse().expect("date")));
    }
}
