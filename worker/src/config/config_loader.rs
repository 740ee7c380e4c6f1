use anyhow::{Context, Result, bail};
use backend::config::config_loader::{load_database, load_tbank};

use super::config_model::{DotEnvyConfig, MAX_RENEWAL_INTERVAL_HOURS, Renewal, WorkerServer};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: std::env::var("SERVER_PORT_WORKER")
            .context("SERVER_PORT_WORKER is invalid")?
            .parse()
            .context("SERVER_PORT_WORKER is invalid")?,
        body_limit: env_or("SERVER_BODY_LIMIT", "1")
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: env_or("SERVER_TIMEOUT", "30")
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let renewal = parse_renewal(
        &env_or("RENEWAL_INTERVAL_HOURS", "24"),
        &env_or("RENEWAL_MAX_ATTEMPTS", "3"),
    )?;

    Ok(DotEnvyConfig {
        worker_server,
        database: load_database()?,
        tbank: load_tbank()?,
        renewal,
    })
}

fn parse_renewal(interval_hours: &str, max_attempts: &str) -> Result<Renewal> {
    let interval_hours: u64 = interval_hours
        .trim()
        .parse()
        .context("RENEWAL_INTERVAL_HOURS is invalid")?;
    let max_attempts: i32 = max_attempts
        .trim()
        .parse()
        .context("RENEWAL_MAX_ATTEMPTS is invalid")?;

    if interval_hours == 0 {
        bail!("RENEWAL_INTERVAL_HOURS must be positive");
    }
    if interval_hours > MAX_RENEWAL_INTERVAL_HOURS {
        bail!("RENEWAL_INTERVAL_HOURS must not exceed {MAX_RENEWAL_INTERVAL_HOURS}");
    }
    if max_attempts < 1 {
        bail!("RENEWAL_MAX_ATTEMPTS must be at least 1");
    }

    Ok(Renewal {
        interval_hours,
        max_attempts,
    })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
