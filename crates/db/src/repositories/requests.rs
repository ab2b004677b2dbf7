use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use hrflow_core::domain::form::FormTypeId;
use hrflow_core::domain::org::UserId;
use hrflow_core::domain::request::{RequestId, RequestMaster, RequestNo, RequestStatus};

use super::{parse_request_status, request_status_as_str, RepositoryError};
use crate::DbPool;

const MASTER_COLUMNS: &str = "id, request_no, form_type_id, requester_id, title, content, status,
             current_step_order, submitted_at, completed_at, created_at, updated_at";

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::decode(format!("bad timestamp in {column}: {error}")))
}

fn row_to_master(row: &sqlx::sqlite::SqliteRow) -> Result<RequestMaster, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let request_no: Option<String> =
        row.try_get("request_no").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let form_type_id: String =
        row.try_get("form_type_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requester_id: String =
        row.try_get("requester_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let content_raw: String =
        row.try_get("content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_raw: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let current_step_order: Option<i64> =
        row.try_get("current_step_order").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let submitted_at: Option<String> =
        row.try_get("submitted_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let completed_at: Option<String> =
        row.try_get("completed_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(RequestMaster {
        id: RequestId(id),
        request_no: request_no.map(RequestNo),
        form_type_id: FormTypeId(form_type_id),
        requester_id: UserId(requester_id),
        title,
        content: serde_json::from_str(&content_raw)
            .map_err(|error| RepositoryError::decode(format!("bad content payload: {error}")))?,
        status: parse_request_status(&status_raw)?,
        current_step_order,
        submitted_at: submitted_at.as_deref().map(|raw| parse_timestamp(raw, "submitted_at")).transpose()?,
        completed_at: completed_at.as_deref().map(|raw| parse_timestamp(raw, "completed_at")).transpose()?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

pub async fn insert(
    conn: &mut SqliteConnection,
    master: &RequestMaster,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO request_master (id, request_no, form_type_id, requester_id, title, content,
                                     status, current_step_order, submitted_at, completed_at,
                                     created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&master.id.0)
    .bind(master.request_no.as_ref().map(|no| no.0.clone()))
    .bind(&master.form_type_id.0)
    .bind(&master.requester_id.0)
    .bind(&master.title)
    .bind(master.content.to_string())
    .bind(request_status_as_str(master.status))
    .bind(master.current_step_order)
    .bind(master.submitted_at.map(|dt| dt.to_rfc3339()))
    .bind(master.completed_at.map(|dt| dt.to_rfc3339()))
    .bind(master.created_at.to_rfc3339())
    .bind(master.updated_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: &RequestId,
) -> Result<Option<RequestMaster>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {MASTER_COLUMNS} FROM request_master WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(conn)
        .await?;

    match row {
        Some(ref row) => Ok(Some(row_to_master(row)?)),
        None => Ok(None),
    }
}

/// Draft content update, guarded by the editable statuses. Forces the row
/// back to DRAFT and clears the step pointer. Returns false when the guard
/// did not match (someone moved the request meanwhile).
pub async fn update_draft(
    conn: &mut SqliteConnection,
    id: &RequestId,
    title: &str,
    content: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE request_master
         SET title = ?, content = ?, status = 'DRAFT', current_step_order = NULL, updated_at = ?
         WHERE id = ? AND status IN ('DRAFT', 'APPROVAL_REJECTED', 'RECEIVE_REJECTED')",
    )
    .bind(title)
    .bind(content.to_string())
    .bind(now.to_rfc3339())
    .bind(&id.0)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// One committed state transition. Optional fields keep their stored value
/// when passed as None, so a re-submission refreshes `submitted_at` without
/// clobbering the originally issued request number.
#[derive(Clone, Debug)]
pub struct TransitionUpdate {
    pub to: RequestStatus,
    pub current_step_order: Option<i64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub request_no: Option<RequestNo>,
    pub updated_at: DateTime<Utc>,
}

/// Status-guarded UPDATE: the per-request linearization point. Concurrent
/// transitions race on the WHERE clause and exactly one wins; the loser sees
/// zero affected rows and must surface a conflict.
pub async fn apply_transition(
    conn: &mut SqliteConnection,
    id: &RequestId,
    expected: RequestStatus,
    update: &TransitionUpdate,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE request_master
         SET status = ?,
             current_step_order = ?,
             submitted_at = COALESCE(?, submitted_at),
             completed_at = COALESCE(?, completed_at),
             request_no = COALESCE(?, request_no),
             updated_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(request_status_as_str(update.to))
    .bind(update.current_step_order)
    .bind(update.submitted_at.map(|dt| dt.to_rfc3339()))
    .bind(update.completed_at.map(|dt| dt.to_rfc3339()))
    .bind(update.request_no.as_ref().map(|no| no.0.clone()))
    .bind(update.updated_at.to_rfc3339())
    .bind(&id.0)
    .bind(request_status_as_str(expected))
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_by_requester(
    pool: &DbPool,
    requester: &UserId,
) -> Result<Vec<RequestMaster>, RepositoryError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
        "SELECT {MASTER_COLUMNS} FROM request_master
         WHERE requester_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(&requester.0)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_master).collect::<Result<Vec<_>, _>>()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use hrflow_core::domain::form::FormTypeId;
    use hrflow_core::domain::org::UserId;
    use hrflow_core::domain::request::{RequestId, RequestMaster, RequestStatus};

    use super::{apply_transition, find_by_id, insert, list_by_requester, update_draft, TransitionUpdate};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        seed_form_type(&pool).await;
        pool
    }

    async fn seed_form_type(pool: &sqlx::SqlitePool) {
        sqlx::query("INSERT INTO form_type (id, code, name) VALUES ('ft-leave', 'LEAVE', 'Leave request')")
            .execute(pool)
            .await
            .expect("seed form type");
    }

    fn master(id: &str, status: RequestStatus) -> RequestMaster {
        let now = Utc::now();
        RequestMaster {
            id: RequestId(id.to_string()),
            request_no: None,
            form_type_id: FormTypeId("ft-leave".to_string()),
            requester_id: UserId("u-001".to_string()),
            title: "Annual leave".to_string(),
            content: serde_json::json!({"days": 2}),
            status,
            current_step_order: None,
            submitted_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.expect("acquire");

        insert(&mut conn, &master("req-1", RequestStatus::Draft)).await.expect("insert");
        let found = find_by_id(&mut conn, &RequestId("req-1".to_string()))
            .await
            .expect("find")
            .expect("exists");

        assert_eq!(found.title, "Annual leave");
        assert_eq!(found.status, RequestStatus::Draft);
        assert_eq!(found.content["days"], 2);
        assert!(found.request_no.is_none());
    }

    #[tokio::test]
    async fn guarded_transition_fails_on_stale_status() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.expect("acquire");
        insert(&mut conn, &master("req-1", RequestStatus::Draft)).await.expect("insert");

        let update = TransitionUpdate {
            to: RequestStatus::ApprovalInProgress,
            current_step_order: Some(1),
            submitted_at: Some(Utc::now()),
            completed_at: None,
            request_no: Some(hrflow_core::domain::request::RequestNo(
                "LEAVE-202608-000001".to_string(),
            )),
            updated_at: Utc::now(),
        };

        let first = apply_transition(&mut conn, &RequestId("req-1".to_string()), RequestStatus::Draft, &update)
            .await
            .expect("first transition");
        assert!(first);

        let second = apply_transition(&mut conn, &RequestId("req-1".to_string()), RequestStatus::Draft, &update)
            .await
            .expect("second transition");
        assert!(!second, "stale expected status must not match");

        let found = find_by_id(&mut conn, &RequestId("req-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.status, RequestStatus::ApprovalInProgress);
        assert_eq!(found.request_no.as_ref().map(|no| no.0.as_str()), Some("LEAVE-202608-000001"));
    }

    #[tokio::test]
    async fn draft_update_respects_editable_guard() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.expect("acquire");
        insert(&mut conn, &master("req-1", RequestStatus::ApprovalRejected)).await.expect("insert");

        let updated = update_draft(
            &mut conn,
            &RequestId("req-1".to_string()),
            "Annual leave (revised)",
            &serde_json::json!({"days": 3}),
            Utc::now(),
        )
        .await
        .expect("update");
        assert!(updated);

        let found = find_by_id(&mut conn, &RequestId("req-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.status, RequestStatus::Draft, "edit forces the row back to DRAFT");

        insert(&mut conn, &master("req-2", RequestStatus::Completed)).await.expect("insert");
        let blocked = update_draft(
            &mut conn,
            &RequestId("req-2".to_string()),
            "too late",
            &serde_json::json!({}),
            Utc::now(),
        )
        .await
        .expect("update");
        assert!(!blocked, "completed requests are not editable");
    }

    #[tokio::test]
    async fn list_by_requester_orders_newest_first() {
        let pool = setup().await;
        {
            let mut conn = pool.acquire().await.expect("acquire");
            let mut first = master("req-1", RequestStatus::Draft);
            first.created_at = "2026-08-01T09:00:00Z".parse().expect("ts");
            let mut second = master("req-2", RequestStatus::Draft);
            second.created_at = "2026-08-02T09:00:00Z".parse().expect("ts");
            insert(&mut conn, &first).await.expect("insert");
            insert(&mut conn, &second).await.expect("insert");
        }

        let listed = list_by_requester(&pool, &UserId("u-001".to_string())).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id.0, "req-2");
    }
}
