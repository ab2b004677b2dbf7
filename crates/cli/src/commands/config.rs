use hrflow_core::config::{AppConfig, LoadOptions, LogFormat};

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let format = match config.logging.format {
                LogFormat::Compact => "compact",
                LogFormat::Pretty => "pretty",
                LogFormat::Json => "json",
            };
            serde_json::json!({
                "command": "config",
                "status": "ok",
                "database": {
                    "url": config.database.url,
                    "max_connections": config.database.max_connections,
                    "timeout_secs": config.database.timeout_secs,
                },
                "logging": {
                    "level": config.logging.level,
                    "format": format,
                },
            })
            .to_string()
        }
        Err(error) => serde_json::json!({
            "command": "config",
            "status": "error",
            "error_class": "config_validation",
            "message": error.to_string(),
        })
        .to_string(),
    }
}
