use crate::commands::CommandResult;
use hrflow_core::config::{AppConfig, LoadOptions};
use hrflow_db::{connect_with_settings, migrations, SeedDataset};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_load", error.to_string(), 5u8))?;

        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verify", error.to_string(), 5u8))?;
        if !verification.all_passed() {
            let failed: Vec<&str> = verification
                .checks
                .iter()
                .filter(|(_, passed)| !passed)
                .map(|(name, _)| name.as_str())
                .collect();
            return Err(("seed_contract", format!("failed checks: {failed:?}"), 5u8));
        }

        pool.close().await;
        Ok::<Vec<&'static str>, (&'static str, String, u8)>(seeded.lines_seeded)
    });

    match result {
        Ok(lines) => {
            let mut message = String::from("loaded deterministic HR seed fixtures\n");
            for line in lines {
                message.push_str(&format!("  - {line}\n"));
            }
            CommandResult::success("seed", message.trim_end().to_string())
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
