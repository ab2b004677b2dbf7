//! Read-only lookups over the administrative tables: form types, approval
//! line templates and steps, form-type mappings, and resolution rules. The
//! engine never writes these; they are owned by the admin module and safe to
//! read without locking.

use chrono::NaiveDate;
use sqlx::{Row, SqliteConnection};

use hrflow_core::domain::form::{FormType, FormTypeId};
use hrflow_core::domain::org::UserId;
use hrflow_core::domain::template::{
    ApprovalLineTemplate, FormTypeApprovalMap, TemplateId, TemplateStep,
};
use hrflow_core::resolution::{parse_keyword_list, ActorResolutionRule};

use super::{
    parse_actor_mode, parse_fallback_policy, parse_required_action, parse_resolution_method,
    parse_step_type, parse_template_scope, RepositoryError,
};

pub async fn find_form_type(
    conn: &mut SqliteConnection,
    id: &FormTypeId,
) -> Result<Option<FormType>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, code, name, module, allow_draft_edit, allow_withdraw, requires_receive,
                default_priority
         FROM form_type WHERE id = ?",
    )
    .bind(&id.0)
    .fetch_optional(conn)
    .await?;

    let Some(row) = row else { return Ok(None) };

    Ok(Some(FormType {
        id: FormTypeId(row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?),
        code: row.try_get("code").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        name: row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        module: row.try_get("module").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        allow_draft_edit: row
            .try_get::<i64, _>("allow_draft_edit")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
            != 0,
        allow_withdraw: row
            .try_get::<i64, _>("allow_withdraw")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
            != 0,
        requires_receive: row
            .try_get::<i64, _>("requires_receive")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
            != 0,
        default_priority: row
            .try_get::<i64, _>("default_priority")
            .map_err(|e| RepositoryError::Decode(e.to_string()))? as i32,
    }))
}

fn row_to_template(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalLineTemplate, RepositoryError> {
    Ok(ApprovalLineTemplate {
        id: TemplateId(row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?),
        name: row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        scope: parse_template_scope(
            &row.try_get::<String, _>("scope")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        )?,
        active: row
            .try_get::<i64, _>("active")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
            != 0,
        is_default: row
            .try_get::<i64, _>("is_default")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
            != 0,
        priority: row
            .try_get::<i64, _>("priority")
            .map_err(|e| RepositoryError::Decode(e.to_string()))? as i32,
    })
}

/// Every mapping row for the form type, joined with its template. Window and
/// active filtering is the selection policy's job, not the query's.
pub async fn mappings_with_templates(
    conn: &mut SqliteConnection,
    form_type: &FormTypeId,
) -> Result<Vec<(FormTypeApprovalMap, ApprovalLineTemplate)>, RepositoryError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
        "SELECT map.id AS map_id, map.form_type_id, map.template_id, map.effective_from,
                map.effective_to, map.active AS map_active,
                t.id, t.name, t.scope, t.active, t.is_default, t.priority
         FROM form_type_approval_map map
         JOIN approval_line_template t ON t.id = map.template_id
         WHERE map.form_type_id = ?",
    )
    .bind(&form_type.0)
    .fetch_all(conn)
    .await?;

    rows.iter()
        .map(|row| {
            let effective_from: String = row
                .try_get("effective_from")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let effective_to: Option<String> =
                row.try_get("effective_to").map_err(|e| RepositoryError::Decode(e.to_string()))?;

            let mapping = FormTypeApprovalMap {
                id: row.try_get("map_id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
                form_type_id: FormTypeId(
                    row.try_get("form_type_id")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                ),
                template_id: TemplateId(
                    row.try_get("template_id")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                ),
                effective_from: effective_from.parse::<NaiveDate>().map_err(|error| {
                    RepositoryError::decode(format!("bad effective_from: {error}"))
                })?,
                effective_to: effective_to
                    .as_deref()
                    .map(|raw| {
                        raw.parse::<NaiveDate>().map_err(|error| {
                            RepositoryError::decode(format!("bad effective_to: {error}"))
                        })
                    })
                    .transpose()?,
                active: row
                    .try_get::<i64, _>("map_active")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?
                    != 0,
            };

            Ok((mapping, row_to_template(row)?))
        })
        .collect::<Result<Vec<_>, RepositoryError>>()
}

pub async fn default_templates(
    conn: &mut SqliteConnection,
) -> Result<Vec<ApprovalLineTemplate>, RepositoryError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
        "SELECT id, name, scope, active, is_default, priority
         FROM approval_line_template WHERE is_default = 1",
    )
    .fetch_all(conn)
    .await?;

    rows.iter().map(row_to_template).collect::<Result<Vec<_>, _>>()
}

pub async fn steps_for_template(
    conn: &mut SqliteConnection,
    template_id: TemplateId,
) -> Result<Vec<TemplateStep>, RepositoryError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
        "SELECT template_id, step_order, step_type, actor_mode, role_code, fixed_user_id,
                allow_delegation, required_action
         FROM approval_line_step WHERE template_id = ? ORDER BY step_order ASC",
    )
    .bind(template_id.0)
    .fetch_all(conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(TemplateStep {
                template_id: TemplateId(
                    row.try_get("template_id")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                ),
                step_order: row
                    .try_get("step_order")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                step_type: parse_step_type(
                    &row.try_get::<String, _>("step_type")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                )?,
                actor_mode: parse_actor_mode(
                    &row.try_get::<String, _>("actor_mode")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                )?,
                role_code: row
                    .try_get("role_code")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                fixed_user_id: row
                    .try_get::<Option<String>, _>("fixed_user_id")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?
                    .map(UserId),
                allow_delegation: row
                    .try_get::<i64, _>("allow_delegation")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?
                    != 0,
                required_action: parse_required_action(
                    &row.try_get::<String, _>("required_action")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                )?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()
}

/// The single active resolution rule for a role code. `None` is surfaced by
/// the caller as a configuration error; this layer only reports what is
/// stored.
pub async fn find_active_rule(
    conn: &mut SqliteConnection,
    role_code: &str,
) -> Result<Option<ActorResolutionRule>, RepositoryError> {
    let row = sqlx::query(
        "SELECT role_code, method, keywords, fallback_policy, active
         FROM actor_resolution_rule WHERE role_code = ? AND active = 1",
    )
    .bind(role_code)
    .fetch_optional(conn)
    .await?;

    let Some(row) = row else { return Ok(None) };

    Ok(Some(ActorResolutionRule {
        role_code: row.try_get("role_code").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        method: parse_resolution_method(
            &row.try_get::<String, _>("method")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        )?,
        keywords: parse_keyword_list(
            &row.try_get::<String, _>("keywords")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        ),
        fallback: parse_fallback_policy(
            &row.try_get::<String, _>("fallback_policy")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        )?,
        active: true,
    }))
}

#[cfg(test)]
mod tests {
    use hrflow_core::domain::form::FormTypeId;
    use hrflow_core::domain::step::{ActorMode, StepType};
    use hrflow_core::domain::template::TemplateId;
    use hrflow_core::resolution::{FallbackPolicy, ResolutionMethod};

    use super::{
        default_templates, find_active_rule, find_form_type, mappings_with_templates,
        steps_for_template,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query(
            "INSERT INTO form_type (id, code, name, requires_receive) VALUES
             ('ft-leave', 'LEAVE', 'Leave request', 1)",
        )
        .execute(&pool)
        .await
        .expect("form type");

        sqlx::query(
            "INSERT INTO approval_line_template (id, name, active, is_default, priority) VALUES
             (1, 'Standard leave line', 1, 0, 10),
             (2, 'Org default line', 1, 1, 0)",
        )
        .execute(&pool)
        .await
        .expect("templates");

        sqlx::query(
            "INSERT INTO approval_line_step
                 (template_id, step_order, step_type, actor_mode, role_code, required_action)
             VALUES
                 (1, 1, 'APPROVAL', 'ROLE_BASED', 'TEAM_LEADER', 'APPROVE'),
                 (1, 2, 'RECEIVE', 'ROLE_BASED', 'HR_ADMIN', 'RECEIVE')",
        )
        .execute(&pool)
        .await
        .expect("steps");

        sqlx::query(
            "INSERT INTO form_type_approval_map
                 (form_type_id, template_id, effective_from, effective_to, active)
             VALUES ('ft-leave', 1, '2026-01-01', '2026-12-31', 1)",
        )
        .execute(&pool)
        .await
        .expect("mapping");

        sqlx::query(
            "INSERT INTO actor_resolution_rule (role_code, method, keywords, fallback_policy)
             VALUES ('TEAM_LEADER', 'ORG_CHAIN', 'team leader, lead', 'HR_ADMIN')",
        )
        .execute(&pool)
        .await
        .expect("rule");

        pool
    }

    #[tokio::test]
    async fn form_type_flags_decode() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.expect("acquire");

        let form = find_form_type(&mut conn, &FormTypeId("ft-leave".to_string()))
            .await
            .expect("query")
            .expect("exists");
        assert_eq!(form.code, "LEAVE");
        assert!(form.requires_receive);
        assert!(form.allow_withdraw);
    }

    #[tokio::test]
    async fn mappings_join_their_templates() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.expect("acquire");

        let mapped = mappings_with_templates(&mut conn, &FormTypeId("ft-leave".to_string()))
            .await
            .expect("query");
        assert_eq!(mapped.len(), 1);
        let (mapping, template) = &mapped[0];
        assert_eq!(mapping.template_id, TemplateId(1));
        assert_eq!(template.name, "Standard leave line");
        assert!(mapping.covers("2026-06-15".parse().expect("date")));
    }

    #[tokio::test]
    async fn default_templates_and_steps_load_ordered() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.expect("acquire");

        let defaults = default_templates(&mut conn).await.expect("defaults");
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, TemplateId(2));

        let steps = steps_for_template(&mut conn, TemplateId(1)).await.expect("steps");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_order, 1);
        assert_eq!(steps[0].step_type, StepType::Approval);
        assert_eq!(steps[0].actor_mode, ActorMode::RoleBased);
        assert_eq!(steps[1].step_type, StepType::Receive);
    }

    #[tokio::test]
    async fn active_rule_parses_keywords_and_fallback() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.expect("acquire");

        let rule = find_active_rule(&mut conn, "TEAM_LEADER").await.expect("query").expect("rule");
        assert_eq!(rule.method, ResolutionMethod::OrgChain);
        assert_eq!(rule.keywords, vec!["team leader".to_string(), "lead".to_string()]);
        assert_eq!(rule.fallback, FallbackPolicy::HrAdmin);

        let missing = find_active_rule(&mut conn, "CFO").await.expect("query");
        assert!(missing.is_none());
    }
}
