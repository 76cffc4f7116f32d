//! MEGA API gateway
//!
//! Production binding of `MegaGateway` over the provider's JSON-RPC command
//! channel (`POST {origin}/cs?id=<seq>[&sid=<session>]`, one command per
//! request) plus plain HTTP transfers for payload bytes. Payloads are
//! encrypted client-side; see `crypto` for the primitives.
//!
//! The origin is configurable so local tooling can point the gateway at a
//! stand-in endpoint. Everything here maps failures into `StorageError`;
//! nothing provider-specific leaks past the trait.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use serde_json::{json, Value};

use crate::crypto;
use crate::descriptor::StoreDescriptor;
use crate::link::PublicLink;
use crate::traits::{MegaGateway, MegaSession, StorageError, StorageResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// Command-channel error codes this gateway distinguishes.
const API_EARGS: i64 = -2;
const API_ENOENT: i64 = -9;

pub struct MegaApiGateway {
    http: reqwest::Client,
    origin: String,
    seqno: AtomicU64,
}

impl MegaApiGateway {
    pub fn new(origin: impl Into<String>) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(MegaApiGateway {
            http,
            origin: origin.into().trim_end_matches('/').to_string(),
            seqno: AtomicU64::new(rand::rng().next_u64() >> 16),
        })
    }

    /// Issue one command against the command channel and return its result.
    async fn command(&self, session: &MegaSession, cmd: Value) -> StorageResult<Value> {
        let id = self.seqno.fetch_add(1, Ordering::Relaxed);
        let mut url = format!("{}/cs?id={}", self.origin, id);
        if let Some(sid) = session.sid() {
            url.push_str("&sid=");
            url.push_str(sid);
        }

        let response = self.http.post(&url).json(&json!([cmd])).send().await?;
        let payload: Value = response.error_for_status()?.json().await?;
        Self::unwrap_result(payload)
    }

    /// A request-level failure is a bare negative integer; otherwise the
    /// response is an array with one entry per command, each of which may
    /// itself be a negative integer.
    fn unwrap_result(payload: Value) -> StorageResult<Value> {
        let result = match payload {
            Value::Array(mut items) if !items.is_empty() => items.remove(0),
            other => other,
        };
        if let Some(code) = result.as_i64() {
            if code < 0 {
                return Err(Self::api_error(code));
            }
        }
        Ok(result)
    }

    fn api_error(code: i64) -> StorageError {
        match code {
            API_ENOENT => StorageError::NotFound(format!("provider error {code}")),
            API_EARGS => StorageError::BadArgument(format!("provider error {code}")),
            _ => StorageError::Api {
                code,
                context: "command failed".to_string(),
            },
        }
    }

    /// Handle of the account's cloud-drive root folder.
    async fn account_root(&self, session: &MegaSession) -> StorageResult<String> {
        let files = self.command(session, json!({"a": "f", "c": 1})).await?;
        files["f"]
            .as_array()
            .and_then(|arr| arr.iter().find(|n| n["t"].as_i64() == Some(2)))
            .and_then(|n| n["h"].as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                StorageError::MalformedResponse("account listing has no root folder".to_string())
            })
    }

    /// Create (or look up) the public handle for a node.
    async fn public_handle(&self, session: &MegaSession, handle: &str) -> StorageResult<String> {
        let result = self.command(session, json!({"a": "l", "n": handle})).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                StorageError::MalformedResponse("export command returned no handle".to_string())
            })
    }

    /// Decrypt the node-key segment of a combined `owner:key` field with the
    /// session master key.
    fn decrypt_node_key(
        &self,
        session: &MegaSession,
        key_segment: &str,
    ) -> StorageResult<[u8; 32]> {
        let master_key = session.master_key().ok_or_else(|| {
            StorageError::BadArgument("session carries no key material".to_string())
        })?;

        let mut raw = crypto::b64url_decode(key_segment)?;
        if raw.len() != 32 {
            return Err(StorageError::MalformedResponse(format!(
                "node key has length {}, expected 32",
                raw.len()
            )));
        }
        crypto::ecb_decrypt(master_key, &mut raw);

        let mut key = [0u8; 32];
        key.copy_from_slice(&raw);
        Ok(key)
    }

    fn link_for_key(public_handle: &str, node_key: &[u8; 32]) -> String {
        PublicLink::assemble(public_handle, &crypto::b64url_encode(node_key))
    }
}

#[async_trait]
impl MegaGateway for MegaApiGateway {
    async fn login(&self, email: &str, password: &str) -> StorageResult<MegaSession> {
        let email = email.trim().to_lowercase();

        let version = self
            .command(&MegaSession::anonymous(), json!({"a": "us0", "user": email}))
            .await?;

        let (password_key, user_hash) = match version["v"].as_i64().unwrap_or(1) {
            2 => {
                let salt = crypto::b64url_decode(required_str(&version, "s")?)?;
                let (key, auth) = crypto::derive_key_v2(password.as_bytes(), &salt);
                (key, crypto::b64url_encode(&auth))
            }
            _ => {
                let key = crypto::prepare_key_v1(password.as_bytes());
                let hash = crypto::stringhash_v1(email.as_bytes(), &key);
                (key, hash)
            }
        };

        let reply = self
            .command(
                &MegaSession::anonymous(),
                json!({"a": "us", "user": email, "uh": user_hash}),
            )
            .await
            .map_err(|e| match e {
                StorageError::Api { code, .. } => {
                    StorageError::LoginFailed(format!("provider rejected login ({code})"))
                }
                StorageError::NotFound(_) | StorageError::BadArgument(_) => {
                    StorageError::LoginFailed("provider rejected login".to_string())
                }
                other => other,
            })?;

        let mut key = crypto::b64url_decode(required_str(&reply, "k")?)?;
        if key.len() != crypto::AES_BLOCK {
            return Err(StorageError::MalformedResponse(
                "master key has unexpected length".to_string(),
            ));
        }
        crypto::ecb_decrypt(&password_key, &mut key);
        let mut master_key = [0u8; 16];
        master_key.copy_from_slice(&key);

        let sid = decrypt_session_id(&reply, &master_key)?;
        tracing::debug!("provider login succeeded");
        Ok(MegaSession::authenticated(sid, master_key))
    }

    async fn login_anonymous(&self) -> StorageResult<MegaSession> {
        // Public-link resolution needs no account binding; the command
        // channel accepts sessionless `g` requests.
        Ok(MegaSession::anonymous())
    }

    async fn store(
        &self,
        session: &MegaSession,
        local_path: &Path,
    ) -> StorageResult<StoreDescriptor> {
        let master_key = *session.master_key().ok_or_else(|| {
            StorageError::LoginFailed("store requires an authenticated session".to_string())
        })?;

        let data = tokio::fs::read(local_path).await?;
        let size = data.len();
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                StorageError::UploadFailed("local path has no usable file name".to_string())
            })?
            .to_string();

        let upload = self.command(session, json!({"a": "u", "s": size})).await?;
        let upload_url = required_str(&upload, "p")?.to_string();

        // Fresh 24-byte upload key: 16 cipher bytes + 8 nonce bytes.
        let mut ul_key = [0u8; 24];
        rand::rng().fill_bytes(&mut ul_key);
        let mut aes_key = [0u8; 16];
        aes_key.copy_from_slice(&ul_key[..16]);
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&ul_key[16..24]);

        let mac = crypto::file_mac(&aes_key, &nonce, &data);
        let meta_mac = crypto::condense_mac(&mac);

        let mut encrypted = data;
        crypto::ctr_crypt(&aes_key, &nonce, &mut encrypted);

        let completion = self
            .http
            .post(format!("{}/0", upload_url))
            .body(encrypted)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?
            .trim()
            .to_string();

        if completion.is_empty() || completion.starts_with('-') {
            return Err(StorageError::UploadFailed(format!(
                "upload channel returned {completion:?}"
            )));
        }

        let attrs = crypto::encode_attributes(&aes_key, &name);
        let node_key = crypto::build_node_key(&ul_key, &meta_mac);
        let mut enc_key = node_key.to_vec();
        crypto::ecb_encrypt(&master_key, &mut enc_key);

        let root = self.account_root(session).await?;
        let placed = self
            .command(
                session,
                json!({
                    "a": "p",
                    "t": root,
                    "n": [{
                        "h": completion,
                        "t": 0,
                        "a": crypto::b64url_encode(&attrs),
                        "k": crypto::b64url_encode(&enc_key),
                    }],
                }),
            )
            .await?;

        tracing::info!(size_bytes = size, "stored object with provider");
        Ok(StoreDescriptor::from(placed))
    }

    async fn shareable_link(
        &self,
        session: &MegaSession,
        descriptor: &StoreDescriptor,
    ) -> StorageResult<String> {
        let handle = descriptor.handle().ok_or_else(|| {
            StorageError::MalformedResponse("store descriptor carries no node handle".to_string())
        })?;
        let combined = descriptor.combined_key().ok_or_else(|| {
            StorageError::MalformedResponse("store descriptor carries no node key".to_string())
        })?;
        let key_segment = combined.split_once(':').map(|(_, k)| k).ok_or_else(|| {
            StorageError::MalformedResponse("node key field has no owner delimiter".to_string())
        })?;

        let node_key = self.decrypt_node_key(session, key_segment)?;
        let public_handle = self.public_handle(session, handle).await?;
        Ok(Self::link_for_key(&public_handle, &node_key))
    }

    async fn export_link(&self, session: &MegaSession, handle: &str) -> StorageResult<String> {
        let public_handle = self.public_handle(session, handle).await?;

        // The descriptor path did not yield key material, so recover the
        // node key from the account listing.
        let files = self.command(session, json!({"a": "f", "c": 1})).await?;
        let node = files["f"]
            .as_array()
            .and_then(|arr| arr.iter().find(|n| n["h"].as_str() == Some(handle)))
            .ok_or_else(|| {
                StorageError::NotFound(format!("node {handle} not in account listing"))
            })?;
        let combined = node["k"].as_str().ok_or_else(|| {
            StorageError::MalformedResponse("listed node carries no key".to_string())
        })?;
        let key_segment = combined.split_once(':').map(|(_, k)| k).ok_or_else(|| {
            StorageError::MalformedResponse("node key field has no owner delimiter".to_string())
        })?;

        let node_key = self.decrypt_node_key(session, key_segment)?;
        Ok(Self::link_for_key(&public_handle, &node_key))
    }

    async fn fetch_public(
        &self,
        session: &MegaSession,
        link: &PublicLink,
        dest_dir: &Path,
    ) -> StorageResult<PathBuf> {
        let key = crypto::b64url_decode(&link.key)?;
        if key.len() != 32 {
            return Err(StorageError::BadArgument(
                "public link key has unexpected length".to_string(),
            ));
        }
        let mut full = [0u8; 32];
        full.copy_from_slice(&key);
        let (aes_key, nonce, meta_mac) = crypto::split_node_key(&full);

        let info = self
            .command(session, json!({"a": "g", "g": 1, "p": link.handle}))
            .await?;
        let download_url = required_str(&info, "g")?.to_string();
        let attrs = crypto::decode_attributes(&aes_key, crypto::b64url_decode(required_str(&info, "at")?)?)?;
        let name = attrs["n"].as_str().unwrap_or(link.handle.as_str());
        let file_name = sanitize_object_name(name, &link.handle);

        let mut payload = self
            .http
            .get(&download_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec();
        crypto::ctr_crypt(&aes_key, &nonce, &mut payload);

        let mac = crypto::file_mac(&aes_key, &nonce, &payload);
        if crypto::condense_mac(&mac) != meta_mac {
            return Err(StorageError::DownloadFailed(
                "payload failed integrity check".to_string(),
            ));
        }

        let dest = dest_dir.join(file_name);
        tokio::fs::write(&dest, &payload).await?;
        tracing::info!(
            path = %dest.display(),
            size_bytes = payload.len(),
            "fetched public object"
        );
        Ok(dest)
    }
}

fn required_str<'a>(value: &'a Value, field: &str) -> StorageResult<&'a str> {
    value[field].as_str().ok_or_else(|| {
        StorageError::MalformedResponse(format!("missing field {field:?} in provider response"))
    })
}

/// Plain tsid (ephemeral accounts) or RSA-encrypted csid.
fn decrypt_session_id(reply: &Value, master_key: &[u8; 16]) -> StorageResult<String> {
    if let Some(tsid) = reply["tsid"].as_str() {
        return Ok(tsid.to_string());
    }

    let mut privk = crypto::b64url_decode(required_str(reply, "privk")?)?;
    let trimmed = privk.len() - privk.len() % crypto::AES_BLOCK;
    privk.truncate(trimmed);
    crypto::ecb_decrypt(master_key, &mut privk);

    let (p, rest) = crypto::parse_mpi(&privk)?;
    let (q, rest) = crypto::parse_mpi(rest)?;
    let (d, _rest) = crypto::parse_mpi(rest)?;
    let n = &p * &q;

    let csid = crypto::b64url_decode(required_str(reply, "csid")?)?;
    let (c, _) = crypto::parse_mpi(&csid)?;
    let m = c.modpow(&d, &n);
    let bytes = m.to_bytes_be();
    if bytes.len() < 43 {
        return Err(StorageError::MalformedResponse(
            "session id decrypted to unexpected length".to_string(),
        ));
    }
    Ok(crypto::b64url_encode(&bytes[..43]))
}

/// Reduce a provider-supplied object name to a safe path component,
/// falling back to the object handle when the name is unusable.
fn sanitize_object_name(name: &str, fallback: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let cleaned: String = base
        .chars()
        .take(255)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(['_', '.']).is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}
