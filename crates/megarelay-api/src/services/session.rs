//! Credential/session helper for the authenticated upload path.

use megarelay_core::{AppError, Config};
use megarelay_storage::{MegaGateway, MegaSession};

/// Establish an authenticated provider session from the configured
/// credentials.
///
/// Every failure path (credentials absent, provider rejection, transport
/// failure) collapses to `StorageUnavailable` so callers observe a single
/// "unavailable" result; the specific cause is logged server-side only and
/// credentials never reach the logs beyond a short email prefix.
pub async fn storage_session(
    gateway: &dyn MegaGateway,
    config: &Config,
) -> Result<MegaSession, AppError> {
    let Some(credentials) = config.mega_credentials() else {
        tracing::error!("storage login skipped: MEGA credentials are not configured");
        return Err(AppError::StorageUnavailable(
            "storage credentials not configured".to_string(),
        ));
    };

    tracing::info!(
        email_prefix = %credentials.email_prefix(),
        "attempting storage login"
    );

    match gateway.login(&credentials.email, &credentials.password).await {
        Ok(session) => {
            tracing::info!("storage login succeeded");
            Ok(session)
        }
        Err(err) => {
            tracing::error!(error = %err, "storage login failed");
            Err(AppError::StorageUnavailable(
                "could not establish a storage session".to_string(),
            ))
        }
    }
}
