use async_trait::async_trait;
use sqlx::Row;

use hrflow_core::domain::org::{EmployeeProfile, OrgUnitId, UserAccount, UserId};
use hrflow_core::resolution::Directory;

use super::parse_employment_status;
use crate::DbPool;

/// SQL-backed implementation of the core `Directory` seam. The engine only
/// reads these tables; errors are stringified per the trait contract so the
/// resolver can wrap them uniformly.
#[derive(Clone)]
pub struct SqlDirectory {
    pool: DbPool,
}

impl SqlDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<EmployeeProfile, String> {
    let user_id: String = row.try_get("user_id").map_err(|e| e.to_string())?;
    let org_unit_id: Option<String> = row.try_get("org_unit_id").map_err(|e| e.to_string())?;
    let position_title: String = row.try_get("position_title").map_err(|e| e.to_string())?;
    let status: String = row.try_get("status").map_err(|e| e.to_string())?;

    Ok(EmployeeProfile {
        user_id: UserId(user_id),
        org_unit_id: org_unit_id.map(OrgUnitId),
        position_title,
        status: parse_employment_status(&status).map_err(|e| e.to_string())?,
    })
}

#[async_trait]
impl Directory for SqlDirectory {
    async fn user_account(&self, user_id: &UserId) -> Result<Option<UserAccount>, String> {
        let row = sqlx::query("SELECT id, display_name, active FROM user_account WHERE id = ?")
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.to_string())?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(UserAccount {
            id: UserId(row.try_get("id").map_err(|e| e.to_string())?),
            display_name: row.try_get("display_name").map_err(|e| e.to_string())?,
            active: row.try_get::<i64, _>("active").map_err(|e| e.to_string())? != 0,
        }))
    }

    async fn employee_profile(&self, user_id: &UserId) -> Result<Option<EmployeeProfile>, String> {
        let row = sqlx::query(
            "SELECT user_id, org_unit_id, position_title, status
             FROM employee_profile WHERE user_id = ?",
        )
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.to_string())?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn active_members_of_unit(
        &self,
        unit: &OrgUnitId,
    ) -> Result<Vec<EmployeeProfile>, String> {
        let rows = sqlx::query(
            "SELECT user_id, org_unit_id, position_title, status
             FROM employee_profile
             WHERE org_unit_id = ? AND status = 'active'
             ORDER BY user_id ASC",
        )
        .bind(&unit.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.to_string())?;

        rows.iter().map(row_to_profile).collect()
    }

    async fn active_employees(&self) -> Result<Vec<EmployeeProfile>, String> {
        let rows = sqlx::query(
            "SELECT user_id, org_unit_id, position_title, status
             FROM employee_profile WHERE status = 'active' ORDER BY user_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.to_string())?;

        rows.iter().map(row_to_profile).collect()
    }

    async fn users_with_role(&self, role_code: &str) -> Result<Vec<UserId>, String> {
        let rows = sqlx::query(
            "SELECT user_id FROM user_role WHERE role_code = ? ORDER BY user_id ASC",
        )
        .bind(role_code)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.to_string())?;

        rows.iter()
            .map(|row| row.try_get("user_id").map(UserId).map_err(|e| e.to_string()))
            .collect()
    }
}
