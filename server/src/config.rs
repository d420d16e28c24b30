use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use platform_authn::AuthConfig;
use tracing::warn;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub cors_allowed_origins: Vec<String>,
    /// `false` installs the permissive engine.
    pub authz_enforce: bool,
    pub expose_error_detail: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut auth = AuthConfig::new(auth_secret()?);
        if let Some(minutes) = env_parsed("ACCESS_TOKEN_TTL_MINUTES")? {
            auth.access_ttl_minutes = minutes;
        }
        if let Some(days) = env_parsed("REFRESH_TOKEN_TTL_DAYS")? {
            auth.refresh_ttl_days = days;
        }

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let authz_enforce = env_bool("AUTHZ_ENFORCE", true);
        if !authz_enforce {
            warn!("AUTHZ_ENFORCE is off; every authenticated caller is allowed everything");
        }

        Ok(Self {
            auth,
            cors_allowed_origins,
            authz_enforce,
            expose_error_detail: env_bool("EXPOSE_ERROR_DETAIL", false),
        })
    }

    /// Configuration for in-process use, with the given signing secret and
    /// enforcement on.
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            auth: AuthConfig::new(secret),
            cors_allowed_origins: Vec::new(),
            authz_enforce: true,
            expose_error_detail: false,
        }
    }
}

/// `AUTH_SECRET_BASE64` wins over the raw `AUTH_SECRET`.
fn auth_secret() -> Result<Vec<u8>> {
    if let Ok(encoded) = std::env::var("AUTH_SECRET_BASE64") {
        let bytes = STANDARD
            .decode(encoded.trim())
            .context("invalid AUTH_SECRET_BASE64")?;
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(anyhow!(
                "AUTH_SECRET_BASE64 must decode to at least {MIN_SECRET_BYTES} bytes"
            ));
        }
        return Ok(bytes);
    }
    let raw = env_required("AUTH_SECRET")?;
    if raw.trim().is_empty() {
        return Err(anyhow!("AUTH_SECRET is empty"));
    }
    Ok(raw.into_bytes())
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing env {} (or {}_BASE64)", key, key))
}

fn env_parsed(key: &str) -> Result<Option<i64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} must be an integer")),
        Err(_) => Ok(None),
    }
}

fn env_bool(var: &str, default: bool) -> bool {
    std::env::var(var)
        .ok()
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}
