use serde::Serialize;

use hrflow_core::config::{AppConfig, LoadOptions};
use hrflow_db::{connect_with_settings, migrations, SeedDataset};

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    passed: bool,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    command: &'static str,
    status: &'static str,
    checks: Vec<DoctorCheck>,
}

pub fn run(json: bool) -> String {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config",
                passed: true,
                detail: format!("database url `{}`", config.database.url),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck { name: "config", passed: false, detail: error.to_string() });
            None
        }
    };

    if let Some(config) = &config {
        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(async {
                match connect_with_settings(
                    &config.database.url,
                    config.database.max_connections,
                    config.database.timeout_secs,
                )
                .await
                {
                    Ok(pool) => {
                        checks.push(DoctorCheck {
                            name: "db_connectivity",
                            passed: true,
                            detail: "connection pool established".to_string(),
                        });

                        match migrations::schema_ready(&pool).await {
                            Ok(true) => {
                                checks.push(DoctorCheck {
                                    name: "schema",
                                    passed: true,
                                    detail: "workflow tables present".to_string(),
                                });

                                match SeedDataset::verify(&pool).await {
                                    Ok(verification) => checks.push(DoctorCheck {
                                        name: "seed_contract",
                                        passed: verification.all_passed(),
                                        detail: if verification.all_passed() {
                                            "seed fixtures satisfy their contract".to_string()
                                        } else {
                                            "seed fixtures missing or incomplete (run `hrflow seed`)"
                                                .to_string()
                                        },
                                    }),
                                    Err(error) => checks.push(DoctorCheck {
                                        name: "seed_contract",
                                        passed: false,
                                        detail: error.to_string(),
                                    }),
                                }
                            }
                            Ok(false) => checks.push(DoctorCheck {
                                name: "schema",
                                passed: false,
                                detail: "workflow tables missing (run `hrflow migrate`)"
                                    .to_string(),
                            }),
                            Err(error) => checks.push(DoctorCheck {
                                name: "schema",
                                passed: false,
                                detail: error.to_string(),
                            }),
                        }

                        pool.close().await;
                    }
                    Err(error) => checks.push(DoctorCheck {
                        name: "db_connectivity",
                        passed: false,
                        detail: error.to_string(),
                    }),
                }
            }),
            Err(error) => checks.push(DoctorCheck {
                name: "runtime",
                passed: false,
                detail: error.to_string(),
            }),
        }
    }

    let status = if checks.iter().all(|check| check.passed) { "healthy" } else { "degraded" };
    let report = DoctorReport { command: "doctor", status, checks };

    if json {
        serde_json::to_string(&report).unwrap_or_else(|error| {
            format!("{{\"command\":\"doctor\",\"status\":\"error\",\"message\":\"{error}\"}}")
        })
    } else {
        let mut lines = vec![format!("doctor: {status}")];
        for check in &report.checks {
            let mark = if check.passed { "ok" } else { "FAIL" };
            lines.push(format!("  [{mark}] {} - {}", check.name, check.detail));
        }
        lines.join("\n")
    }
}
