use anyhow::{Context, Result, bail};
use crates::payments::tbank_client::DEFAULT_BASE_URL;
use url::Url;

use super::config_model::{
    Auth, BackendServer, Billing, Database, DotEnvyConfig, PublicUrls, TBank,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: optional("SERVER_BODY_LIMIT")
            .unwrap_or_else(|| "1".to_string())
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: optional("SERVER_TIMEOUT")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let auth = Auth {
        jwt_secret: required("JWT_SECRET")?,
    };

    let public_urls = PublicUrls {
        service_base_url: normalize_base_url(&required("SERVICE_PUBLIC_URL")?)
            .context("SERVICE_PUBLIC_URL is invalid")?,
        frontend_base_url: normalize_base_url(&required("FRONTEND_URL")?)
            .context("FRONTEND_URL is invalid")?,
    };

    let billing = Billing {
        baseline_plan_code: optional("BASELINE_PLAN_CODE").unwrap_or_else(|| "START".to_string()),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database: load_database()?,
        auth,
        tbank: load_tbank()?,
        public_urls,
        billing,
    })
}

pub fn load_database() -> Result<Database> {
    dotenvy::dotenv().ok();

    Ok(Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    })
}

/// Terminal credentials are mandatory: signing with an empty secret is never allowed.
pub fn load_tbank() -> Result<TBank> {
    dotenvy::dotenv().ok();

    let base_url = match optional("TBANK_BASE_URL") {
        Some(raw) => normalize_base_url(&raw).context("TBANK_BASE_URL is invalid")?,
        None => DEFAULT_BASE_URL.to_string(),
    };

    Ok(TBank {
        base_url,
        terminal_key: required("TBANK_TERMINAL_KEY")?,
        terminal_password: required("TBANK_TERMINAL_PASSWORD")?,
    })
}

/// Trims trailing slashes and assumes `http://` when no scheme is given.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("base URL is empty");
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let parsed = Url::parse(&candidate).with_context(|| format!("`{raw}` is not a valid URL"))?;
    if parsed.host_str().is_none() {
        bail!("`{raw}` has no host");
    }

    Ok(candidate)
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_scheme_and_strips_trailing_slash() {
        assert_eq!(
            normalize_base_url("api.example.com/").unwrap(),
            "http://api.example.com"
        );
        assert_eq!(
            normalize_base_url(" https://api.example.com:8443// ").unwrap(),
            "https://api.example.com:8443"
        );
    }

    #[test]
    fn rejects_empty_or_malformed_urls() {
        assert!(normalize_base_url("   ").is_err());
        assert!(normalize_base_url("/").is_err());
        assert!(normalize_base_url("http://bad host").is_err());
    }

    #[test]
    fn public_urls_build_gateway_and_frontend_links() {
        let urls = PublicUrls {
            service_base_url: "https://api.example.com".to_string(),
            frontend_base_url: "https://app.example.com".to_string(),
        };

        assert_eq!(
            urls.notification_url(),
            "https://api.example.com/api/v1/order/notify/tbank"
        );
        assert_eq!(
            urls.payment_return_url(),
            "https://api.example.com/api/v1/order/paid"
        );
        assert_eq!(urls.paid_redirect(), "https://app.example.com/app");
        assert_eq!(
            urls.failed_redirect(),
            "https://app.example.com/prices?error=1"
        );
    }
}
