use std::time::Instant;

use serde::Serialize;

use crate::commands::CommandResult;
use hrflow_core::config::{AppConfig, LoadOptions};
use hrflow_core::domain::form::FormTypeId;
use hrflow_core::domain::org::UserId;
use hrflow_core::domain::request::RequestStatus;
use hrflow_db::{connect_with_settings, migrations, SeedDataset};
use hrflow_workflow::WorkflowService;

#[derive(Debug, Serialize)]
struct SmokeCheck {
    check: &'static str,
    passed: bool,
    duration_ms: u128,
    detail: String,
}

#[derive(Debug, Serialize)]
struct SmokeSummary {
    command: &'static str,
    status: &'static str,
    checks: usize,
    failed: usize,
}

fn check_line(check: &SmokeCheck) -> String {
    serde_json::to_string(check).unwrap_or_else(|_| format!("{{\"check\":\"{}\"}}", check.check))
}

/// Drives the seeded leave scenario end to end on a fresh in-memory
/// database: draft, submit, team-leader approval, HR receive, completion.
/// Nothing here touches the configured production database beyond the
/// configuration check itself.
pub fn run() -> CommandResult {
    let mut lines: Vec<String> = Vec::new();
    let mut failed = 0usize;
    let mut total = 0usize;

    let mut record = |check: SmokeCheck, lines: &mut Vec<String>| {
        if !check.passed {
            failed += 1;
        }
        total += 1;
        lines.push(check_line(&check));
        check.passed
    };

    let started = Instant::now();
    let config_check = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => SmokeCheck {
            check: "config_load",
            passed: true,
            duration_ms: started.elapsed().as_millis(),
            detail: format!("log level `{}`", config.logging.level),
        },
        Err(error) => SmokeCheck {
            check: "config_load",
            passed: false,
            duration_ms: started.elapsed().as_millis(),
            detail: error.to_string(),
        },
    };
    let config_ok = record(config_check, &mut lines);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "smoke",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    if config_ok {
        runtime.block_on(async {
            let started = Instant::now();
            let pool = match connect_with_settings("sqlite::memory:", 1, 30).await {
                Ok(pool) => {
                    record(
                        SmokeCheck {
                            check: "db_connect",
                            passed: true,
                            duration_ms: started.elapsed().as_millis(),
                            detail: "in-memory pool ready".to_string(),
                        },
                        &mut lines,
                    );
                    pool
                }
                Err(error) => {
                    record(
                        SmokeCheck {
                            check: "db_connect",
                            passed: false,
                            duration_ms: started.elapsed().as_millis(),
                            detail: error.to_string(),
                        },
                        &mut lines,
                    );
                    return;
                }
            };

            let started = Instant::now();
            if let Err(error) = migrations::run_pending(&pool).await {
                record(
                    SmokeCheck {
                        check: "migrate",
                        passed: false,
                        duration_ms: started.elapsed().as_millis(),
                        detail: error.to_string(),
                    },
                    &mut lines,
                );
                return;
            }
            record(
                SmokeCheck {
                    check: "migrate",
                    passed: true,
                    duration_ms: started.elapsed().as_millis(),
                    detail: "schema applied".to_string(),
                },
                &mut lines,
            );

            let started = Instant::now();
            let seed_ok = match SeedDataset::load(&pool).await {
                Ok(_) => match SeedDataset::verify(&pool).await {
                    Ok(verification) => verification.all_passed(),
                    Err(_) => false,
                },
                Err(_) => false,
            };
            record(
                SmokeCheck {
                    check: "seed",
                    passed: seed_ok,
                    duration_ms: started.elapsed().as_millis(),
                    detail: if seed_ok {
                        "fixtures loaded and verified".to_string()
                    } else {
                        "fixture contract violated".to_string()
                    },
                },
                &mut lines,
            );
            if !seed_ok {
                return;
            }

            let service = WorkflowService::new(pool);
            let requester = UserId("u-1001".to_string());
            let team_leader = UserId("u-1002".to_string());
            let hr_admin = UserId("u-9001".to_string());

            let started = Instant::now();
            let request_id = match service
                .upsert_draft(
                    &requester,
                    None,
                    &FormTypeId("ft-leave".to_string()),
                    "Smoke leave request",
                    serde_json::json!({"days": 1}),
                )
                .await
            {
                Ok(summary) => {
                    record(
                        SmokeCheck {
                            check: "scenario_draft",
                            passed: true,
                            duration_ms: started.elapsed().as_millis(),
                            detail: summary.request_id.0.clone(),
                        },
                        &mut lines,
                    );
                    summary.request_id
                }
                Err(error) => {
                    record(
                        SmokeCheck {
                            check: "scenario_draft",
                            passed: false,
                            duration_ms: started.elapsed().as_millis(),
                            detail: error.to_string(),
                        },
                        &mut lines,
                    );
                    return;
                }
            };

            let started = Instant::now();
            let submit_passed = matches!(
                service.submit(&requester, &request_id).await,
                Ok(outcome)
                    if outcome.status == RequestStatus::ApprovalInProgress
                        && outcome.current_step_order == Some(1)
            );
            record(
                SmokeCheck {
                    check: "scenario_submit",
                    passed: submit_passed,
                    duration_ms: started.elapsed().as_millis(),
                    detail: "draft -> approval phase".to_string(),
                },
                &mut lines,
            );
            if !submit_passed {
                return;
            }

            let started = Instant::now();
            let approve_passed = matches!(
                service.approve(&team_leader, &request_id, Some("smoke approval")).await,
                Ok(outcome) if outcome.status == RequestStatus::ReceiveInProgress
            );
            record(
                SmokeCheck {
                    check: "scenario_approve",
                    passed: approve_passed,
                    duration_ms: started.elapsed().as_millis(),
                    detail: "approval phase -> receive phase".to_string(),
                },
                &mut lines,
            );
            if !approve_passed {
                return;
            }

            let started = Instant::now();
            let receive_passed = matches!(
                service.receive_complete(&hr_admin, &request_id, None).await,
                Ok(outcome) if outcome.status == RequestStatus::Completed
            );
            record(
                SmokeCheck {
                    check: "scenario_receive",
                    passed: receive_passed,
                    duration_ms: started.elapsed().as_millis(),
                    detail: "receive phase -> completed".to_string(),
                },
                &mut lines,
            );

            let started = Instant::now();
            let history_passed = matches!(
                service.get_detail(&requester, &request_id).await,
                Ok(detail) if detail.history.len() == 4 && detail.completed_at.is_some()
            );
            record(
                SmokeCheck {
                    check: "scenario_history",
                    passed: history_passed,
                    duration_ms: started.elapsed().as_millis(),
                    detail: "four transition events recorded".to_string(),
                },
                &mut lines,
            );
        });
    }

    let status = if failed == 0 && config_ok { "pass" } else { "fail" };
    let summary = SmokeSummary { command: "smoke", status, checks: total, failed };
    lines.push(
        serde_json::to_string(&summary)
            .unwrap_or_else(|_| "{\"command\":\"smoke\",\"status\":\"fail\"}".to_string()),
    );

    CommandResult { exit_code: if status == "pass" { 0 } else { 6 }, output: lines.join("\n") }
}
