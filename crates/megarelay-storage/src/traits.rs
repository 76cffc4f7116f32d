//! Storage gateway abstraction
//!
//! This module defines the `MegaGateway` trait the relay handlers depend on,
//! along with the session handle and the error enum all implementations map
//! their failures into. `NotFound` and `BadArgument` stay distinct variants
//! because the download relay answers them with different HTTP statuses.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::descriptor::StoreDescriptor;
use crate::link::PublicLink;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Provider rejected the request: {0}")]
    BadArgument(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider error {code}: {context}")]
    Api { code: i64, context: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A provider session. Authenticated sessions carry the session id and the
/// account master key; anonymous sessions carry neither and are only good
/// for resolving public links.
#[derive(Debug, Clone)]
pub struct MegaSession {
    sid: Option<String>,
    master_key: Option<[u8; 16]>,
}

impl MegaSession {
    /// Session with no account binding, sufficient only to resolve public
    /// links.
    pub fn anonymous() -> Self {
        MegaSession {
            sid: None,
            master_key: None,
        }
    }

    pub(crate) fn authenticated(sid: String, master_key: [u8; 16]) -> Self {
        MegaSession {
            sid: Some(sid),
            master_key: Some(master_key),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.sid.is_some()
    }

    pub(crate) fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    pub(crate) fn master_key(&self) -> Option<&[u8; 16]> {
        self.master_key.as_ref()
    }
}

/// Storage gateway abstraction
///
/// The handlers are written against this trait; the production binding is
/// `MegaApiGateway` and the test suite drives an in-process fake. The
/// operation set mirrors what the relay needs from the provider and nothing
/// more.
#[async_trait]
pub trait MegaGateway: Send + Sync {
    /// Authenticate with account credentials.
    async fn login(&self, email: &str, password: &str) -> StorageResult<MegaSession>;

    /// Establish an anonymous session for public-link resolution.
    async fn login_anonymous(&self) -> StorageResult<MegaSession>;

    /// Store a local file in the account and return the provider's raw
    /// store descriptor. The descriptor shape is not contractually stable;
    /// see `StoreDescriptor`.
    async fn store(
        &self,
        session: &MegaSession,
        local_path: &Path,
    ) -> StorageResult<StoreDescriptor>;

    /// Derive a public link directly from a just-returned store descriptor.
    async fn shareable_link(
        &self,
        session: &MegaSession,
        descriptor: &StoreDescriptor,
    ) -> StorageResult<String>;

    /// Create a public export link for a node handle.
    async fn export_link(&self, session: &MegaSession, handle: &str) -> StorageResult<String>;

    /// Fetch and decrypt a public link into `dest_dir`, returning the local
    /// path of the decrypted object. The on-disk name comes from the
    /// object's stored metadata, not from the caller.
    async fn fetch_public(
        &self,
        session: &MegaSession,
        link: &PublicLink,
        dest_dir: &Path,
    ) -> StorageResult<PathBuf>;
}
