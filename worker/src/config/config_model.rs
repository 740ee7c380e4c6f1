use std::time::Duration;

use backend::config::config_model::{Database, TBank};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub tbank: TBank,
    pub renewal: Renewal,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

/// One year.
pub const MAX_RENEWAL_INTERVAL_HOURS: u64 = 366 * 24;

#[derive(Debug, Clone)]
pub struct Renewal {
    pub interval_hours: u64,
    /// Failed charges in a row before a subscription is canceled.
    pub max_attempts: i32,
}

impl Renewal {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(60 * 60))
    }
}
