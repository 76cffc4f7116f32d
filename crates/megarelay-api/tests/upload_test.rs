mod helpers;

use std::sync::Arc;

use helpers::{multipart_body, setup_test_app, DescriptorShape, FakeGateway, PNG_BYTES};

#[tokio::test]
async fn index_reports_operational() {
    let app = setup_test_app(Arc::new(FakeGateway::new()), true);

    let response = app.client().get("/").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn upload_returns_public_link() {
    let app = setup_test_app(Arc::new(FakeGateway::new()), true);
    let (content_type, body) = multipart_body("file", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 200);
    let json: serde_json::Value = response.json();
    let url = json["url"].as_str().expect("url field");
    assert!(url.starts_with("https://mega.nz/file/"), "got {url}");
    assert!(url.contains('#'));
}

#[tokio::test]
async fn upload_with_flat_descriptor_also_works() {
    let gateway = Arc::new(FakeGateway {
        descriptor_shape: DescriptorShape::Flat,
        ..FakeGateway::default()
    });
    let app = setup_test_app(gateway, true);
    let (content_type, body) = multipart_body("file", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let app = setup_test_app(Arc::new(FakeGateway::new()), true);
    let (content_type, body) = multipart_body("other", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 400);
    // Nothing reached the provider.
    assert!(app.gateway.calls().is_empty());
}

#[tokio::test]
async fn upload_with_empty_filename_is_rejected() {
    let app = setup_test_app(Arc::new(FakeGateway::new()), true);
    let (content_type, body) = multipart_body("file", Some(""), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn upload_without_credentials_is_service_unavailable() {
    let app = setup_test_app(Arc::new(FakeGateway::new()), false);
    let (content_type, body) = multipart_body("file", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 503);
    // Login is never attempted without configured credentials.
    assert!(!app.gateway.calls().contains(&"login".to_string()));
}

#[tokio::test]
async fn upload_with_failed_login_is_service_unavailable() {
    let gateway = Arc::new(FakeGateway {
        fail_login: true,
        ..FakeGateway::default()
    });
    let app = setup_test_app(gateway, true);
    let (content_type, body) = multipart_body("file", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 503);
}

#[tokio::test]
async fn upload_falls_back_to_export_when_direct_link_fails() {
    let gateway = Arc::new(FakeGateway {
        fail_shareable: true,
        ..FakeGateway::default()
    });
    let app = setup_test_app(gateway.clone(), true);
    let (content_type, body) = multipart_body("file", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 200);
    let calls = gateway.calls();
    assert!(calls.contains(&"shareable_link".to_string()));
    assert!(calls.contains(&"export_link".to_string()));
}

#[tokio::test]
async fn upload_hand_assembles_link_as_last_resort() {
    let gateway = Arc::new(FakeGateway {
        fail_shareable: true,
        fail_export: true,
        ..FakeGateway::default()
    });
    let app = setup_test_app(gateway, true);
    let (content_type, body) = multipart_body("file", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 200);
    let json: serde_json::Value = response.json();
    // Assembled from the descriptor's `owner:key` field.
    assert_eq!(json["url"], "https://mega.nz/file/node0#key0");
}

#[tokio::test]
async fn upload_fails_when_no_link_can_be_derived() {
    let gateway = Arc::new(FakeGateway {
        descriptor_shape: DescriptorShape::Unrecognized,
        fail_shareable: true,
        ..FakeGateway::default()
    });
    let app = setup_test_app(gateway, true);
    let (content_type, body) = multipart_body("file", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 500);
    let json: serde_json::Value = response.json();
    assert_eq!(json["code"], "LINK_DERIVATION_FAILED");
    assert!(json.get("url").is_none());
}

#[tokio::test]
async fn upload_cleans_temp_file_on_success() {
    let gateway = Arc::new(FakeGateway::new());
    let app = setup_test_app(gateway.clone(), true);
    let (content_type, body) = multipart_body("file", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 200);
    let seen = gateway.seen_paths();
    assert!(!seen.is_empty());
    for path in &seen {
        assert!(!path.exists(), "temp file {} should be removed", path.display());
    }
    assert_eq!(app.scratch_entries(), 0);
}

#[tokio::test]
async fn upload_cleans_temp_file_on_failure() {
    let gateway = Arc::new(FakeGateway {
        descriptor_shape: DescriptorShape::Unrecognized,
        fail_shareable: true,
        ..FakeGateway::default()
    });
    let app = setup_test_app(gateway.clone(), true);
    let (content_type, body) = multipart_body("file", Some("cat.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 500);
    for path in &gateway.seen_paths() {
        assert!(!path.exists(), "temp file {} should be removed", path.display());
    }
    assert_eq!(app.scratch_entries(), 0);
}

#[tokio::test]
async fn upload_temp_name_combines_token_and_sanitized_name() {
    let gateway = Arc::new(FakeGateway::new());
    let app = setup_test_app(gateway.clone(), true);
    let (content_type, body) = multipart_body("file", Some("my photo.png"), PNG_BYTES);

    let response = app
        .client()
        .post("/upload")
        .add_header("content-type", content_type)
        .bytes(body.into())
        .await;

    assert_eq!(response.status_code(), 200);
    let seen = gateway.seen_paths();
    let staged = seen.first().expect("store saw a path");
    let name = staged.file_name().unwrap().to_string_lossy();
    // <random token>_<sanitized original name>
    assert!(name.ends_with("_my_photo.png"), "got {name}");
    assert!(name.len() > "_my_photo.png".len());
}
