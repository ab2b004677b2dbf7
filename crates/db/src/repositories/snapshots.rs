use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use hrflow_core::domain::org::{OrgUnitId, UserId};
use hrflow_core::domain::request::{RequestId, RequestNo};
use hrflow_core::domain::step::{StepActionStatus, StepSnapshot, StepType};

use super::{
    parse_request_status, parse_step_action_status, parse_step_type, step_action_status_as_str,
    step_type_as_str, RepositoryError,
};
use crate::DbPool;

fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> Result<StepSnapshot, RepositoryError> {
    let request_id: String =
        row.try_get("request_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let step_order: i64 =
        row.try_get("step_order").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let step_type: String =
        row.try_get("step_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor_user_id: String =
        row.try_get("actor_user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor_display_name: String =
        row.try_get("actor_display_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor_org_unit_id: Option<String> =
        row.try_get("actor_org_unit_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let acted_at: Option<String> =
        row.try_get("acted_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let comment: Option<String> =
        row.try_get("comment").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(StepSnapshot {
        request_id: RequestId(request_id),
        step_order,
        step_type: parse_step_type(&step_type)?,
        actor_user_id: UserId(actor_user_id),
        actor_display_name,
        actor_org_unit_id: actor_org_unit_id.map(OrgUnitId),
        status: parse_step_action_status(&status)?,
        acted_at: acted_at
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|error| RepositoryError::decode(format!("bad acted_at: {error}")))
            })
            .transpose()?,
        comment,
    })
}

/// Replaces the whole snapshot set for a request: delete-then-insert under
/// the caller's transaction. Snapshots are a value object, not history.
pub async fn replace_for_request(
    conn: &mut SqliteConnection,
    request_id: &RequestId,
    snapshots: &[StepSnapshot],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM request_step_snapshot WHERE request_id = ?")
        .bind(&request_id.0)
        .execute(&mut *conn)
        .await?;

    for snapshot in snapshots {
        sqlx::query(
            "INSERT INTO request_step_snapshot (request_id, step_order, step_type, actor_user_id,
                                                actor_display_name, actor_org_unit_id, status,
                                                acted_at, comment)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&snapshot.request_id.0)
        .bind(snapshot.step_order)
        .bind(step_type_as_str(snapshot.step_type))
        .bind(&snapshot.actor_user_id.0)
        .bind(&snapshot.actor_display_name)
        .bind(snapshot.actor_org_unit_id.as_ref().map(|unit| unit.0.clone()))
        .bind(step_action_status_as_str(snapshot.status))
        .bind(snapshot.acted_at.map(|dt| dt.to_rfc3339()))
        .bind(snapshot.comment.as_deref())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn list_for_request(
    conn: &mut SqliteConnection,
    request_id: &RequestId,
) -> Result<Vec<StepSnapshot>, RepositoryError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
        "SELECT request_id, step_order, step_type, actor_user_id, actor_display_name,
                actor_org_unit_id, status, acted_at, comment
         FROM request_step_snapshot WHERE request_id = ? ORDER BY step_order ASC",
    )
    .bind(&request_id.0)
    .fetch_all(conn)
    .await?;

    rows.iter().map(row_to_snapshot).collect::<Result<Vec<_>, _>>()
}

/// Records one actor action on a WAITING snapshot. The status guard makes
/// double-acting on the same step a no-op reported back to the caller.
pub async fn mark_acted(
    conn: &mut SqliteConnection,
    request_id: &RequestId,
    step_order: i64,
    status: StepActionStatus,
    comment: Option<&str>,
    acted_at: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE request_step_snapshot
         SET status = ?, comment = ?, acted_at = ?
         WHERE request_id = ? AND step_order = ? AND status = 'WAITING'",
    )
    .bind(step_action_status_as_str(status))
    .bind(comment)
    .bind(acted_at.to_rfc3339())
    .bind(&request_id.0)
    .bind(step_order)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Withdraw support: every still-WAITING snapshot flips to REJECTED with a
/// system comment.
pub async fn reject_all_waiting(
    conn: &mut SqliteConnection,
    request_id: &RequestId,
    comment: &str,
    acted_at: DateTime<Utc>,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "UPDATE request_step_snapshot
         SET status = 'REJECTED', comment = ?, acted_at = ?
         WHERE request_id = ? AND status = 'WAITING'",
    )
    .bind(comment)
    .bind(acted_at.to_rfc3339())
    .bind(&request_id.0)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// One pending work item for an actor's task list, joined with its request.
#[derive(Clone, Debug)]
pub struct PendingTaskRow {
    pub request_id: RequestId,
    pub request_no: Option<RequestNo>,
    pub title: String,
    pub requester_id: UserId,
    pub status: hrflow_core::domain::request::RequestStatus,
    pub step_order: i64,
    pub step_type: StepType,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// WAITING steps bound to the given actor where the step is the request's
/// current step, i.e. actionable right now rather than queued behind others.
pub async fn list_pending_for_actor(
    pool: &DbPool,
    actor: &UserId,
    step_type: StepType,
) -> Result<Vec<PendingTaskRow>, RepositoryError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
        "SELECT s.request_id, m.request_no, m.title, m.requester_id, m.status,
                s.step_order, s.step_type, m.submitted_at
         FROM request_step_snapshot s
         JOIN request_master m ON m.id = s.request_id
         WHERE s.actor_user_id = ?
           AND s.status = 'WAITING'
           AND s.step_type = ?
           AND m.current_step_order = s.step_order
         ORDER BY m.submitted_at ASC, s.request_id ASC",
    )
    .bind(&actor.0)
    .bind(step_type_as_str(step_type))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let request_id: String =
                row.try_get("request_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let request_no: Option<String> =
                row.try_get("request_no").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let title: String =
                row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let requester_id: String =
                row.try_get("requester_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let status: String =
                row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let step_order: i64 =
                row.try_get("step_order").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let step_type_raw: String =
                row.try_get("step_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let submitted_at: Option<String> =
                row.try_get("submitted_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

            Ok(PendingTaskRow {
                request_id: RequestId(request_id),
                request_no: request_no.map(RequestNo),
                title,
                requester_id: UserId(requester_id),
                status: parse_request_status(&status)?,
                step_order,
                step_type: parse_step_type(&step_type_raw)?,
                submitted_at: submitted_at
                    .as_deref()
                    .map(|raw| {
                        DateTime::parse_from_rfc3339(raw)
                            .map(|dt| dt.with_timezone(&Utc))
                            .map_err(|error| {
                                RepositoryError::decode(format!("bad submitted_at: {error}"))
                            })
                    })
                    .transpose()?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use hrflow_core::domain::form::FormTypeId;
    use hrflow_core::domain::org::UserId;
    use hrflow_core::domain::request::{RequestId, RequestMaster, RequestStatus};
    use hrflow_core::domain::step::{StepActionStatus, StepSnapshot, StepType};

    use super::{list_for_request, mark_acted, reject_all_waiting, replace_for_request};
    use crate::repositories::requests;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        sqlx::query("INSERT INTO form_type (id, code, name) VALUES ('ft-leave', 'LEAVE', 'Leave')")
            .execute(&pool)
            .await
            .expect("seed form type");
        pool
    }

    async fn insert_master(pool: &sqlx::SqlitePool, id: &str) {
        let now = Utc::now();
        let mut conn = pool.acquire().await.expect("acquire");
        requests::insert(
            &mut conn,
            &RequestMaster {
                id: RequestId(id.to_string()),
                request_no: None,
                form_type_id: FormTypeId("ft-leave".to_string()),
                requester_id: UserId("u-001".to_string()),
                title: "Leave".to_string(),
                content: serde_json::json!({}),
                status: RequestStatus::Draft,
                current_step_order: None,
                submitted_at: None,
                completed_at: None,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .expect("insert master");
    }

    fn snapshot(request: &str, order: i64, step_type: StepType) -> StepSnapshot {
        StepSnapshot {
            request_id: RequestId(request.to_string()),
            step_order: order,
            step_type,
            actor_user_id: UserId(format!("u-{order:03}")),
            actor_display_name: format!("Actor {order}"),
            actor_org_unit_id: None,
            status: StepActionStatus::Waiting,
            acted_at: None,
            comment: None,
        }
    }

    #[tokio::test]
    async fn replace_discards_previous_snapshot_set() {
        let pool = setup().await;
        insert_master(&pool, "req-1").await;
        let mut conn = pool.acquire().await.expect("acquire");

        replace_for_request(
            &mut conn,
            &RequestId("req-1".to_string()),
            &[snapshot("req-1", 1, StepType::Approval), snapshot("req-1", 2, StepType::Receive)],
        )
        .await
        .expect("first set");

        replace_for_request(
            &mut conn,
            &RequestId("req-1".to_string()),
            &[snapshot("req-1", 1, StepType::Approval)],
        )
        .await
        .expect("second set");

        let listed =
            list_for_request(&mut conn, &RequestId("req-1".to_string())).await.expect("list");
        assert_eq!(listed.len(), 1, "old rows are gone, not appended to");
        assert_eq!(listed[0].step_order, 1);
    }

    #[tokio::test]
    async fn mark_acted_guards_against_double_action() {
        let pool = setup().await;
        insert_master(&pool, "req-1").await;
        let mut conn = pool.acquire().await.expect("acquire");

        replace_for_request(
            &mut conn,
            &RequestId("req-1".to_string()),
            &[snapshot("req-1", 1, StepType::Approval)],
        )
        .await
        .expect("snapshots");

        let first = mark_acted(
            &mut conn,
            &RequestId("req-1".to_string()),
            1,
            StepActionStatus::Approved,
            Some("ok"),
            Utc::now(),
        )
        .await
        .expect("first act");
        assert!(first);

        let second = mark_acted(
            &mut conn,
            &RequestId("req-1".to_string()),
            1,
            StepActionStatus::Approved,
            None,
            Utc::now(),
        )
        .await
        .expect("second act");
        assert!(!second, "a non-WAITING snapshot cannot be acted on again");
    }

    #[tokio::test]
    async fn reject_all_waiting_touches_only_waiting_rows() {
        let pool = setup().await;
        insert_master(&pool, "req-1").await;
        let mut conn = pool.acquire().await.expect("acquire");

        let mut approved = snapshot("req-1", 1, StepType::Approval);
        approved.status = StepActionStatus::Approved;
        replace_for_request(
            &mut conn,
            &RequestId("req-1".to_string()),
            &[
                approved,
                snapshot("req-1", 2, StepType::Approval),
                snapshot("req-1", 3, StepType::Receive),
            ],
        )
        .await
        .expect("snapshots");

        let rejected = reject_all_waiting(
            &mut conn,
            &RequestId("req-1".to_string()),
            "withdrawn by requester",
            Utc::now(),
        )
        .await
        .expect("reject waiting");
        assert_eq!(rejected, 2);

        let listed =
            list_for_request(&mut conn, &RequestId("req-1".to_string())).await.expect("list");
        assert_eq!(listed[0].status, StepActionStatus::Approved, "acted rows keep their outcome");
        assert_eq!(listed[1].status, StepActionStatus::Rejected);
        assert_eq!(listed[1].comment.as_deref(), Some("withdrawn by requester"));
    }
}
