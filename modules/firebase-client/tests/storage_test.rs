//! Multipart uploads against a mock Cloud Storage endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use firebase_client::storage::DOWNLOAD_TOKENS_KEY;
use firebase_client::{Credentials, FirebaseError, Storage, TokenSource};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "almaflores.appspot.com";
const OBJECT: &str = "blog/posts/legacy-content/legacy/2013/post-1-flor.jpg";

fn client(server: &MockServer) -> Storage {
    let tokens = Arc::new(TokenSource::new(
        reqwest::Client::new(),
        Credentials::StaticToken("owner".into()),
    ));
    Storage::new(reqwest::Client::new(), BUCKET, tokens).with_upload_base_url(&server.uri())
}

#[tokio::test]
async fn upload_tags_object_with_download_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/b/{BUCKET}/o")))
        .and(query_param("uploadType", "multipart"))
        .and(header("authorization", "Bearer owner"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": OBJECT,
            "bucket": BUCKET,
            "contentType": "image/jpeg"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut metadata = BTreeMap::new();
    metadata.insert("sourceFile".to_string(), "public/images/flor.jpg".to_string());

    let uploaded = client(&server)
        .upload(OBJECT, b"JPEGDATA".to_vec(), "image/jpeg", &metadata)
        .await
        .unwrap();

    assert_eq!(uploaded.name, OBJECT);
    assert!(uploaded.download_url.starts_with(&format!(
        "https://firebasestorage.googleapis.com/v0/b/{BUCKET}/o/blog%2Fposts%2F"
    )));
    assert!(uploaded
        .download_url
        .ends_with(&format!("?alt=media&token={}", uploaded.download_token)));

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/related; boundary="));

    let body = String::from_utf8_lossy(&requests[0].body).to_string();
    assert!(body.contains(&format!("\"{DOWNLOAD_TOKENS_KEY}\":\"{}\"", uploaded.download_token)));
    assert!(body.contains("\"sourceFile\":\"public/images/flor.jpg\""));
    assert!(body.contains("\"contentType\":\"image/jpeg\""));
    assert!(body.contains("Content-Type: image/jpeg\r\n\r\nJPEGDATA"));
}

#[tokio::test]
async fn each_upload_gets_a_distinct_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": OBJECT,
            "bucket": BUCKET
        })))
        .mount(&server)
        .await;

    let storage = client(&server);
    let a = storage
        .upload(OBJECT, vec![1], "image/jpeg", &BTreeMap::new())
        .await
        .unwrap();
    let b = storage
        .upload(OBJECT, vec![1], "image/jpeg", &BTreeMap::new())
        .await
        .unwrap();
    assert_ne!(a.download_token, b.download_token);
}

#[tokio::test]
async fn rejected_upload_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthenticated"))
        .mount(&server)
        .await;

    let err = client(&server)
        .upload(OBJECT, vec![1], "image/jpeg", &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FirebaseError::Api { status: 401, .. }));
}
