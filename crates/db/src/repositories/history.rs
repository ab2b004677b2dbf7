use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use hrflow_core::domain::org::UserId;
use hrflow_core::domain::request::RequestId;
use hrflow_core::history::{HistoryEvent, HistoryEventType};

use super::{parse_request_status, request_status_as_str, RepositoryError};
use crate::DbPool;

/// Append-only by construction: this module exposes no update or delete.
pub async fn append(
    conn: &mut SqliteConnection,
    event: &HistoryEvent,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO request_history (id, request_id, event_type, from_status, to_status,
                                      actor_id, payload, occurred_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.event_id)
    .bind(&event.request_id.0)
    .bind(event.event_type.as_str())
    .bind(event.from_status.map(request_status_as_str))
    .bind(request_status_as_str(event.to_status))
    .bind(&event.actor_id.0)
    .bind(event.payload.to_string())
    .bind(event.occurred_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn list_for_request(
    pool: &DbPool,
    request_id: &RequestId,
) -> Result<Vec<HistoryEvent>, RepositoryError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
        "SELECT id, request_id, event_type, from_status, to_status, actor_id, payload, occurred_at
         FROM request_history WHERE request_id = ? ORDER BY occurred_at ASC, id ASC",
    )
    .bind(&request_id.0)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_event).collect::<Result<Vec<_>, _>>()
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<HistoryEvent, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let request_id: String =
        row.try_get("request_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let event_type: String =
        row.try_get("event_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let from_status: Option<String> =
        row.try_get("from_status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let to_status: String =
        row.try_get("to_status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor_id: String =
        row.try_get("actor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let payload: String =
        row.try_get("payload").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at: String =
        row.try_get("occurred_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(HistoryEvent {
        event_id: id,
        request_id: RequestId(request_id),
        event_type: HistoryEventType::parse(&event_type)
            .ok_or_else(|| RepositoryError::decode(format!("unknown event type `{event_type}`")))?,
        from_status: from_status.as_deref().map(parse_request_status).transpose()?,
        to_status: parse_request_status(&to_status)?,
        actor_id: UserId(actor_id),
        payload: serde_json::from_str(&payload)
            .map_err(|error| RepositoryError::decode(format!("bad history payload: {error}")))?,
        occurred_at: DateTime::parse_from_rfc3339(&occurred_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|error| RepositoryError::decode(format!("bad occurred_at: {error}")))?,
    })
}
