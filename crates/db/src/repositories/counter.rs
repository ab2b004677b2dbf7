use sqlx::{Row, SqliteConnection};

use super::RepositoryError;

/// Counter scope: one sequence per form code per calendar month.
pub fn scope_key(form_code: &str, year_month: &str) -> String {
    format!("{form_code}-{year_month}")
}

/// `CODE-YYYYMM-NNNNNN`. The sequence resets implicitly when the scope key
/// changes at a month boundary.
pub fn format_request_no(form_code: &str, year_month: &str, seq: i64) -> String {
    format!("{form_code}-{year_month}-{seq:06}")
}

/// Atomic per-scope increment. The single-statement upsert is the whole
/// race-avoidance story: concurrent submissions in the same scope serialize
/// on the row and each sees a distinct sequence value.
pub async fn next_seq(
    conn: &mut SqliteConnection,
    scope_key: &str,
) -> Result<i64, RepositoryError> {
    let row = sqlx::query(
        "INSERT INTO request_counter (scope_key, last_seq) VALUES (?, 1)
         ON CONFLICT(scope_key) DO UPDATE SET last_seq = last_seq + 1
         RETURNING last_seq",
    )
    .bind(scope_key)
    .fetch_one(conn)
    .await?;

    row.try_get::<i64, _>("last_seq").map_err(|e| RepositoryError::Decode(e.to_string()))
}
