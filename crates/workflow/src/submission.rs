//! Submission planning: template selection, actor resolution, and snapshot
//! construction. All reads happen here, before the caller opens its write
//! transaction; the plan itself is a pure value the transaction persists.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use hrflow_core::domain::form::FormType;
use hrflow_core::domain::request::RequestMaster;
use hrflow_core::domain::step::{ActorMode, StepActionStatus, StepSnapshot, StepType};
use hrflow_core::domain::template::{ApprovalLineTemplate, TemplateStep};
use hrflow_core::errors::EngineError;
use hrflow_core::lifecycle::{initial_progression, Progression};
use hrflow_core::resolution::{
    ActorResolutionRule, ActorResolver, ResolutionError, ResolvedActor, DEFAULT_STEP_ROLE,
};
use hrflow_core::selection::{select_template, TemplateTieBreak};
use hrflow_db::repositories::{catalog, SqlDirectory};
use hrflow_db::DbPool;

pub(crate) const REFERENCE_AUTO_COMMENT: &str = "Auto-received reference step";

pub(crate) struct SubmissionPlan {
    pub form: FormType,
    pub template: ApprovalLineTemplate,
    pub snapshots: Vec<StepSnapshot>,
    pub progression: Progression,
}

fn store_error(error: hrflow_db::repositories::RepositoryError) -> EngineError {
    EngineError::Persistence(error.to_string())
}

fn resolution_error(error: ResolutionError) -> EngineError {
    match error {
        ResolutionError::NoMatch { role_code, keywords } => {
            EngineError::Resolution { role_code, keywords }
        }
        error @ ResolutionError::EmptyAdminPool => EngineError::Configuration(error.to_string()),
        ResolutionError::Directory(message) => EngineError::Persistence(message),
    }
}

/// Loads the catalog slice a submission needs in one connection checkout,
/// so actor resolution afterwards can use the pool freely.
struct CatalogSlice {
    form: FormType,
    template: ApprovalLineTemplate,
    steps: Vec<TemplateStep>,
    rules: HashMap<String, ActorResolutionRule>,
}

async fn load_catalog_slice(
    pool: &DbPool,
    master: &RequestMaster,
    as_of: NaiveDate,
) -> Result<CatalogSlice, EngineError> {
    let mut conn = pool.acquire().await.map_err(|e| EngineError::Persistence(e.to_string()))?;

    let form = catalog::find_form_type(&mut conn, &master.form_type_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| EngineError::not_found("form type", master.form_type_id.0.clone()))?;

    let mapped = catalog::mappings_with_templates(&mut conn, &master.form_type_id)
        .await
        .map_err(store_error)?;
    let defaults = catalog::default_templates(&mut conn).await.map_err(store_error)?;

    let template =
        select_template(&master.form_type_id, as_of, mapped, defaults, TemplateTieBreak::default())
            .map_err(|error| EngineError::Configuration(error.to_string()))?;

    let steps =
        catalog::steps_for_template(&mut conn, template.id).await.map_err(store_error)?;
    if steps.is_empty() {
        return Err(EngineError::Configuration(format!(
            "approval line template `{}` ({}) has no steps",
            template.id.0, template.name
        )));
    }

    let mut rules = HashMap::new();
    for step in &steps {
        if step.actor_mode != ActorMode::RoleBased {
            continue;
        }
        let role_code = step.role_code.as_deref().unwrap_or(DEFAULT_STEP_ROLE);
        if rules.contains_key(role_code) {
            continue;
        }
        let rule = catalog::find_active_rule(&mut conn, role_code)
            .await
            .map_err(store_error)?
            .ok_or_else(|| {
                EngineError::Configuration(format!(
                    "no active resolution rule for role `{role_code}`"
                ))
            })?;
        rules.insert(role_code.to_string(), rule);
    }

    Ok(CatalogSlice { form, template, steps, rules })
}

async fn resolve_step_actor(
    resolver: &ActorResolver<'_, SqlDirectory>,
    master: &RequestMaster,
    step: &TemplateStep,
    rules: &HashMap<String, ActorResolutionRule>,
) -> Result<ResolvedActor, EngineError> {
    match step.actor_mode {
        ActorMode::UserFixed => match &step.fixed_user_id {
            Some(fixed) => resolver.materialize(fixed).await.map_err(resolution_error),
            // Neither a role nor a fixed user configured: the admin pool
            // is the designated catch-all actor.
            None => resolver.admin_pool_actor().await.map_err(resolution_error),
        },
        ActorMode::RoleBased => {
            let role_code = step.role_code.as_deref().unwrap_or(DEFAULT_STEP_ROLE);
            let rule = rules.get(role_code).ok_or_else(|| {
                EngineError::Configuration(format!(
                    "no active resolution rule for role `{role_code}`"
                ))
            })?;
            resolver.resolve(&master.requester_id, rule).await.map_err(resolution_error)
        }
    }
}

pub(crate) async fn build_submission_plan(
    pool: &DbPool,
    directory: &SqlDirectory,
    master: &RequestMaster,
    as_of: NaiveDate,
    now: DateTime<Utc>,
) -> Result<SubmissionPlan, EngineError> {
    let slice = load_catalog_slice(pool, master, as_of).await?;
    let resolver = ActorResolver::new(directory);

    let mut snapshots = Vec::with_capacity(slice.steps.len());
    for step in &slice.steps {
        let actor = resolve_step_actor(&resolver, master, step, &slice.rules).await?;

        let (status, acted_at, comment) = if step.step_type == StepType::Reference {
            (StepActionStatus::Received, Some(now), Some(REFERENCE_AUTO_COMMENT.to_string()))
        } else {
            (StepActionStatus::Waiting, None, None)
        };

        snapshots.push(StepSnapshot {
            request_id: master.id.clone(),
            step_order: step.step_order,
            step_type: step.step_type,
            actor_user_id: actor.user_id,
            actor_display_name: actor.display_name,
            actor_org_unit_id: actor.org_unit_id,
            status,
            acted_at,
            comment,
        });
    }

    let progression = initial_progression(&snapshots);

    Ok(SubmissionPlan { form: slice.form, template: slice.template, snapshots, progression })
}
