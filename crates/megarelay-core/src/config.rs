//! Configuration module
//!
//! All settings are read once at startup from the environment (plus `.env`
//! during development) into an owned `Config` that handlers receive through
//! shared state. MEGA credentials are optional here on purpose: without them
//! the upload path answers 503 per request instead of preventing startup.

use std::env;
use std::path::PathBuf;

/// Default MEGA API origin. Overridable so tests and local tooling can point
/// the gateway at a stand-in endpoint.
pub const DEFAULT_MEGA_API_ORIGIN: &str = "https://g.api.mega.co.nz";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// MEGA account credentials for the authenticated upload path.
#[derive(Clone)]
pub struct MegaCredentials {
    pub email: String,
    pub password: String,
}

impl MegaCredentials {
    /// Short prefix of the account email, safe to put in log lines.
    pub fn email_prefix(&self) -> String {
        self.email.chars().take(4).collect()
    }
}

impl std::fmt::Debug for MegaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MegaCredentials")
            .field("email", &format!("{}...", self.email_prefix()))
            .finish_non_exhaustive()
    }
}

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    pub server_port: u16,
    /// Scoped directory for request-lifetime temporary files.
    pub upload_dir: PathBuf,
    pub mega_email: Option<String>,
    pub mega_password: Option<String>,
    pub mega_api_origin: String,
    /// Optional fixed delay before link export, masking provider-side
    /// eventual-consistency lag. 0 disables it.
    pub export_delay_ms: u64,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field("upload_dir", &self.upload_dir)
            .field("mega_email", &self.mega_email.as_deref().map(|_| "<set>"))
            .field(
                "mega_password",
                &self.mega_password.as_deref().map(|_| "<set>"),
            )
            .field("mega_api_origin", &self.mega_api_origin)
            .field("export_delay_ms", &self.export_delay_ms)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Unset variables fall back to defaults; a variable that is set but
    /// unparseable is a hard error so a typo in deployment config is loud.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let server_port = parse_or_default("PORT", DEFAULT_PORT)?;
        let upload_dir = env::var("UPLOAD_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let mega_email = non_empty(env::var("MEGA_EMAIL").ok());
        let mega_password = non_empty(env::var("MEGA_PASSWORD").ok());

        let mega_api_origin = non_empty(env::var("MEGA_API_ORIGIN").ok())
            .unwrap_or_else(|| DEFAULT_MEGA_API_ORIGIN.to_string());

        let export_delay_ms = parse_or_default("EXPORT_DELAY_MS", 0u64)?;
        let max_upload_bytes = parse_or_default("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            server_port,
            upload_dir,
            mega_email,
            mega_password,
            mega_api_origin,
            export_delay_ms,
            max_upload_bytes,
            cors_origins,
        })
    }

    /// Credentials for the authenticated upload path, when both halves are
    /// configured.
    pub fn mega_credentials(&self) -> Option<MegaCredentials> {
        match (&self.mega_email, &self.mega_password) {
            (Some(email), Some(password)) => Some(MegaCredentials {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_storage_configured(&self) -> bool {
        self.mega_credentials().is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            let parsed = raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}"))?;
            Ok(parsed)
        }
        _ => Ok(default),
    }
}
