#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: Auth,
    pub tbank: TBank,
    pub public_urls: PublicUrls,
    pub billing: Billing,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct TBank {
    pub base_url: String,
    pub terminal_key: String,
    pub terminal_password: String,
}

/// Normalized base URLs, without a trailing slash.
#[derive(Debug, Clone)]
pub struct PublicUrls {
    pub service_base_url: String,
    pub frontend_base_url: String,
}

impl PublicUrls {
    pub fn notification_url(&self) -> String {
        format!("{}/api/v1/order/notify/tbank", self.service_base_url)
    }

    pub fn payment_return_url(&self) -> String {
        format!("{}/api/v1/order/paid", self.service_base_url)
    }

    pub fn paid_redirect(&self) -> String {
        format!("{}/app", self.frontend_base_url)
    }

    pub fn failed_redirect(&self) -> String {
        format!("{}/prices?error=1", self.frontend_base_url)
    }
}

#[derive(Debug, Clone)]
pub struct Billing {
    pub baseline_plan_code: String,
}
