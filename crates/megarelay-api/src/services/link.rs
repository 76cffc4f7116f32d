//! Public-link derivation
//!
//! The provider's store response is not contractually stable, so a public
//! link is derived through an ordered chain of strategies, each attempted
//! once:
//!
//! 1. the provider's direct shareable-link call for the fresh descriptor;
//! 2. handle extraction from the descriptor, feeding
//! 3. the provider's generic export-link call;
//! 4. hand-assembly from the descriptor's combined key field, as a
//!    best-effort last resort (the provider's link scheme does not
//!    guarantee this form).
//!
//! When every strategy is exhausted the upload fails with a link-derivation
//! error even though the remote store succeeded; no link is fabricated.

use megarelay_core::AppError;
use megarelay_storage::{MegaGateway, MegaSession, PublicLink, StoreDescriptor};

pub async fn derive_public_link(
    gateway: &dyn MegaGateway,
    session: &MegaSession,
    descriptor: &StoreDescriptor,
) -> Result<String, AppError> {
    match gateway.shareable_link(session, descriptor).await {
        Ok(url) => return Ok(url),
        Err(err) => {
            tracing::warn!(
                error = %err,
                "direct shareable-link derivation failed, trying export fallback"
            );
        }
    }

    let Some(handle) = descriptor.handle() else {
        tracing::error!("store descriptor carries no extractable handle");
        return Err(AppError::LinkDerivation(
            "no usable handle in store response".to_string(),
        ));
    };

    match gateway.export_link(session, handle).await {
        Ok(url) => return Ok(url),
        Err(err) => {
            tracing::warn!(error = %err, handle, "export-link fallback failed");
        }
    }

    if let Some((_owner, key)) = descriptor.combined_key().and_then(|k| k.split_once(':')) {
        if !key.is_empty() {
            tracing::warn!(
                handle,
                "hand-assembling public link; best-effort, link scheme not guaranteed"
            );
            return Ok(PublicLink::assemble(handle, key));
        }
    }

    Err(AppError::LinkDerivation(
        "all link derivation strategies exhausted".to_string(),
    ))
}
