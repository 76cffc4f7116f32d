//! Public link handling
//!
//! A public link is a URI that lets any client, authenticated or not, fetch
//! and decrypt a stored object. Two formats exist: the current
//! `https://mega.nz/file/<handle>#<key>` and the legacy
//! `https://mega.nz/#!<handle>!<key>`. `looks_like_public_link` is the
//! shallow format guard the download relay applies before doing any network
//! work; `PublicLink::parse` is the strict form used by gateway
//! implementations.

use crate::traits::StorageError;

/// Base of every public link the provider issues.
pub const PUBLIC_LINK_BASE: &str = "https://mega.nz/";

/// Parsed public file link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicLink {
    pub handle: String,
    pub key: String,
}

impl PublicLink {
    /// Strictly parse a public file link in either the current or the
    /// legacy format.
    pub fn parse(url: &str) -> Result<PublicLink, StorageError> {
        let url = url.trim();
        let rest = url
            .strip_prefix(PUBLIC_LINK_BASE)
            .ok_or_else(|| bad_link(url, "missing provider prefix"))?;

        if let Some(rest) = rest.strip_prefix("file/") {
            let (handle, key) = rest
                .split_once('#')
                .ok_or_else(|| bad_link(url, "missing key delimiter"))?;
            return Self::from_parts(url, handle, key);
        }

        if let Some(rest) = rest.strip_prefix("#!") {
            let (handle, key) = rest
                .split_once('!')
                .ok_or_else(|| bad_link(url, "missing key delimiter"))?;
            return Self::from_parts(url, handle, key);
        }

        Err(bad_link(url, "not a file link"))
    }

    fn from_parts(url: &str, handle: &str, key: &str) -> Result<PublicLink, StorageError> {
        if handle.is_empty() || key.is_empty() {
            return Err(bad_link(url, "empty handle or key"));
        }
        Ok(PublicLink {
            handle: handle.to_string(),
            key: key.to_string(),
        })
    }

    /// Assemble a link in the current format.
    pub fn assemble(handle: &str, key: &str) -> String {
        format!("{}file/{}#{}", PUBLIC_LINK_BASE, handle, key)
    }

    pub fn as_url(&self) -> String {
        Self::assemble(&self.handle, &self.key)
    }
}

/// Shallow format guard: a fixed URI prefix plus the presence of the key
/// delimiter. Cheap enough to run before any network call; not a security
/// boundary.
pub fn looks_like_public_link(url: &str) -> bool {
    let url = url.trim();
    url.starts_with(PUBLIC_LINK_BASE) && url.contains('#')
}

fn bad_link(url: &str, reason: &str) -> StorageError {
    StorageError::BadArgument(format!("malformed public link {url:?}: {reason}"))
}
