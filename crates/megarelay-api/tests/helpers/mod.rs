//! Shared test harness: an in-process fake storage gateway plus app setup.
#![allow(dead_code)] // not every test binary exercises every helper

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use megarelay_api::setup::routes::setup_routes;
use megarelay_api::state::AppState;
use megarelay_core::Config;
use megarelay_storage::{
    MegaGateway, MegaSession, PublicLink, StorageError, StorageResult, StoreDescriptor,
};

/// A tiny PNG-ish payload; the relay never inspects image contents.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05,
];

/// Which shape the fake returns from `store`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DescriptorShape {
    #[default]
    Nested,
    Flat,
    Unrecognized,
}

/// Scripted failure for `fetch_public`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchFailure {
    NotFound,
    BadArgument,
    Other,
}

/// In-process stand-in for the storage provider. Stored objects live in a
/// map keyed by handle; links round-trip through the same formats the real
/// gateway emits.
#[derive(Default)]
pub struct FakeGateway {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub counter: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
    pub seen_paths: Mutex<Vec<PathBuf>>,
    pub fail_login: bool,
    pub fail_anonymous: bool,
    pub descriptor_shape: DescriptorShape,
    pub fail_shareable: bool,
    pub fail_export: bool,
    pub fetch_failure: Option<FetchFailure>,
}

impl FakeGateway {
    pub fn new() -> Self {
        FakeGateway::default()
    }

    /// Gateway methods invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Every local path the gateway read from or wrote to.
    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen_paths.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl MegaGateway for FakeGateway {
    async fn login(&self, _email: &str, _password: &str) -> StorageResult<MegaSession> {
        self.record("login");
        if self.fail_login {
            return Err(StorageError::LoginFailed(
                "scripted login failure".to_string(),
            ));
        }
        Ok(MegaSession::anonymous())
    }

    async fn login_anonymous(&self) -> StorageResult<MegaSession> {
        self.record("login_anonymous");
        if self.fail_anonymous {
            return Err(StorageError::Api {
                code: -18,
                context: "scripted outage".to_string(),
            });
        }
        Ok(MegaSession::anonymous())
    }

    async fn store(
        &self,
        _session: &MegaSession,
        local_path: &Path,
    ) -> StorageResult<StoreDescriptor> {
        self.record("store");
        self.seen_paths
            .lock()
            .unwrap()
            .push(local_path.to_path_buf());

        let data = std::fs::read(local_path).map_err(StorageError::IoError)?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let handle = format!("node{n}");
        let key = format!("owner{n}:key{n}");
        self.objects.lock().unwrap().insert(handle.clone(), data);

        let value = match self.descriptor_shape {
            DescriptorShape::Nested => json!({"f": [{"h": handle, "k": key, "s": 1}]}),
            DescriptorShape::Flat => json!({"h": handle, "k": key}),
            DescriptorShape::Unrecognized => json!({"status": "ok"}),
        };
        Ok(StoreDescriptor::from(value))
    }

    async fn shareable_link(
        &self,
        _session: &MegaSession,
        descriptor: &StoreDescriptor,
    ) -> StorageResult<String> {
        self.record("shareable_link");
        if self.fail_shareable {
            return Err(StorageError::Api {
                code: -3,
                context: "scripted failure".to_string(),
            });
        }
        let handle = descriptor.handle().ok_or_else(|| {
            StorageError::MalformedResponse("descriptor has no handle".to_string())
        })?;
        Ok(PublicLink::assemble(handle, &format!("exported-{handle}")))
    }

    async fn export_link(&self, _session: &MegaSession, handle: &str) -> StorageResult<String> {
        self.record("export_link");
        if self.fail_export {
            return Err(StorageError::Api {
                code: -3,
                context: "scripted failure".to_string(),
            });
        }
        Ok(PublicLink::assemble(handle, &format!("exported-{handle}")))
    }

    async fn fetch_public(
        &self,
        _session: &MegaSession,
        link: &PublicLink,
        dest_dir: &Path,
    ) -> StorageResult<PathBuf> {
        self.record("fetch_public");
        match self.fetch_failure {
            Some(FetchFailure::NotFound) => {
                return Err(StorageError::NotFound("provider error -9".to_string()))
            }
            Some(FetchFailure::BadArgument) => {
                return Err(StorageError::BadArgument("provider error -2".to_string()))
            }
            Some(FetchFailure::Other) => {
                return Err(StorageError::Api {
                    code: -17,
                    context: "scripted outage".to_string(),
                })
            }
            None => {}
        }

        let data = {
            let objects = self.objects.lock().unwrap();
            objects
                .get(&link.handle)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(format!("unknown handle {}", link.handle)))?
        };

        let dest = dest_dir.join(format!("{}.png", link.handle));
        std::fs::write(&dest, &data).map_err(StorageError::IoError)?;
        self.seen_paths.lock().unwrap().push(dest.clone());
        Ok(dest)
    }
}

/// Test application wrapping an in-process server and its scratch root.
pub struct TestApp {
    pub server: TestServer,
    pub gateway: Arc<FakeGateway>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Number of entries left under the scratch root.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn test_config(upload_dir: &Path, with_credentials: bool) -> Config {
    Config {
        server_port: 0,
        upload_dir: upload_dir.to_path_buf(),
        mega_email: with_credentials.then(|| "relay-tester@example.com".to_string()),
        mega_password: with_credentials.then(|| "relay-password".to_string()),
        mega_api_origin: megarelay_core::config::DEFAULT_MEGA_API_ORIGIN.to_string(),
        export_delay_ms: 0,
        max_upload_bytes: 25 * 1024 * 1024,
        cors_origins: Vec::new(),
    }
}

/// Setup a test application around the given fake gateway.
pub fn setup_test_app(gateway: Arc<FakeGateway>, with_credentials: bool) -> TestApp {
    let upload_dir = TempDir::new().expect("create upload dir");
    let config = test_config(upload_dir.path(), with_credentials);
    let state = Arc::new(AppState::new(config.clone(), gateway.clone()));
    let router = setup_routes(&config, state);
    let server = TestServer::new(router).expect("start test server");

    TestApp {
        server,
        gateway,
        upload_dir,
    }
}

/// Hand-rolled multipart body so edge cases (missing field, empty
/// filename) are exactly controllable.
pub fn multipart_body(
    field_name: &str,
    filename: Option<&str>,
    data: &[u8],
) -> (String, Vec<u8>) {
    let boundary = "relay-test-boundary";
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    let disposition = match filename {
        Some(name) => format!(
            "Content-Disposition: form-data; name=\"{field_name}\"; filename=\"{name}\"\r\n"
        ),
        None => format!("Content-Disposition: form-data; name=\"{field_name}\"\r\n"),
    };
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    (
        format!("multipart/form-data; boundary={boundary}"),
        body,
    )
}
