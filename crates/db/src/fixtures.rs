use sqlx::{Executor, Row};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Contract for one seeded approval line: template, step shape, and the
/// form type it is mapped to. Verification checks the database against it.
struct SeedLineContract {
    template_id: i64,
    template_name: &'static str,
    form_type_id: &'static str,
    step_count: i64,
    first_step_type: &'static str,
}

const SEED_LINES: &[SeedLineContract] = &[
    SeedLineContract {
        template_id: 1,
        template_name: "Leave approval line",
        form_type_id: "ft-leave",
        step_count: 2,
        first_step_type: "APPROVAL",
    },
    SeedLineContract {
        template_id: 3,
        template_name: "Certificate notice line",
        form_type_id: "ft-cert",
        step_count: 2,
        first_step_type: "REFERENCE",
    },
];

const SEED_ADMIN_POOL: &[&str] = &["u-9001", "u-9002"];

const SEED_RULE_ROLES: &[&str] = &["TEAM_LEADER", "HR_ADMIN", "DEPT_HEAD"];

/// Deterministic directory, catalog, and rule fixtures shared by the CLI
/// `seed` command, the smoke scenario, and the integration suites.
pub struct SeedDataset;

#[derive(Debug)]
pub struct SeedResult {
    pub lines_seeded: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub checks: Vec<(String, bool)>,
}

impl VerificationResult {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|(_, passed)| *passed)
    }
}

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/hr_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            lines_seeded: SEED_LINES.iter().map(|line| line.template_name).collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for line in SEED_LINES {
            let mapped: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM form_type_approval_map
                 WHERE form_type_id = ?1 AND template_id = ?2 AND active = 1)",
            )
            .bind(line.form_type_id)
            .bind(line.template_id)
            .fetch_one(pool)
            .await?;
            checks.push((format!("{}::mapping", line.template_name), mapped == 1));

            let step_count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM approval_line_step WHERE template_id = ?1")
                    .bind(line.template_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("{}::steps", line.template_name), step_count == line.step_count));

            let first_type: Option<String> = sqlx::query(
                "SELECT step_type FROM approval_line_step
                 WHERE template_id = ?1 ORDER BY step_order ASC LIMIT 1",
            )
            .bind(line.template_id)
            .fetch_optional(pool)
            .await?
            .map(|row| row.get("step_type"));
            checks.push((
                format!("{}::first-step", line.template_name),
                first_type.as_deref() == Some(line.first_step_type),
            ));
        }

        let admin_pool: Vec<String> = sqlx::query(
            "SELECT user_id FROM user_role WHERE role_code = 'admin' ORDER BY user_id ASC",
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("user_id"))
        .collect();
        checks.push(("admin-pool".to_string(), admin_pool == SEED_ADMIN_POOL));

        for role in SEED_RULE_ROLES {
            let rule_exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM actor_resolution_rule
                 WHERE role_code = ?1 AND active = 1)",
            )
            .bind(role)
            .fetch_one(pool)
            .await?;
            checks.push((format!("rule::{role}"), rule_exists == 1));
        }

        let default_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM approval_line_template WHERE is_default = 1 AND active = 1",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("default-template".to_string(), default_count == 1));

        Ok(VerificationResult { checks })
    }
}
