//! Template selection policy. Pure over preloaded candidates; the db layer
//! supplies active mappings and default templates for the form type.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::form::FormTypeId;
use crate::domain::template::{ApprovalLineTemplate, FormTypeApprovalMap};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no approval line template is configured for form type `{form_type}` as of {as_of}")]
    NoTemplate { form_type: String, as_of: NaiveDate },
}

/// Tie-break applied when several candidates share the highest priority.
/// `PriorityThenNewest` keeps the source system's behavior: the template
/// with the larger id (created later) wins. A documented policy, not a
/// row-ordering accident.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemplateTieBreak {
    #[default]
    PriorityThenNewest,
}

impl TemplateTieBreak {
    fn pick(self, candidates: Vec<ApprovalLineTemplate>) -> Option<ApprovalLineTemplate> {
        match self {
            Self::PriorityThenNewest => candidates
                .into_iter()
                .max_by(|left, right| left.priority.cmp(&right.priority).then(left.id.cmp(&right.id))),
        }
    }
}

/// Resolves the single template governing a new submission:
/// date-effective form-type mappings first, then the default pool,
/// then a hard configuration error. Never proceeds without a template.
pub fn select_template(
    form_type: &FormTypeId,
    as_of: NaiveDate,
    mapped: Vec<(FormTypeApprovalMap, ApprovalLineTemplate)>,
    defaults: Vec<ApprovalLineTemplate>,
    tie_break: TemplateTieBreak,
) -> Result<ApprovalLineTemplate, SelectionError> {
    let mapped_candidates: Vec<ApprovalLineTemplate> = mapped
        .into_iter()
        .filter(|(mapping, template)| {
            mapping.active && mapping.covers(as_of) && template.active
        })
        .map(|(_, template)| template)
        .collect();

    if let Some(template) = tie_break.pick(mapped_candidates) {
        return Ok(template);
    }

    let default_candidates: Vec<ApprovalLineTemplate> = defaults
        .into_iter()
        .filter(|template| template.active && template.is_default)
        .collect();

    tie_break.pick(default_candidates).ok_or_else(|| SelectionError::NoTemplate {
        form_type: form_type.0.clone(),
        as_of,
    })
}
