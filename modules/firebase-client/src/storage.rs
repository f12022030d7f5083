use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TokenSource;
use crate::error::{check_status, Result};

const UPLOAD_BASE_URL: &str = "https://storage.googleapis.com/upload/storage/v1";
const DOWNLOAD_BASE_URL: &str = "https://firebasestorage.googleapis.com/v0";

/// Custom metadata key Firebase reads download tokens from.
pub const DOWNLOAD_TOKENS_KEY: &str = "firebaseStorageDownloadTokens";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata<'a> {
    name: &'a str,
    content_type: &'a str,
    metadata: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    bucket: String,
}

#[derive(Debug, Clone)]
pub struct UploadedObject {
    pub name: String,
    pub bucket: String,
    pub download_token: String,
    pub download_url: String,
}

/// Cloud Storage client for a single Firebase bucket.
pub struct Storage {
    http: reqwest::Client,
    bucket: String,
    upload_base_url: String,
    download_base_url: String,
    tokens: Arc<TokenSource>,
}

impl Storage {
    pub fn new(http: reqwest::Client, bucket: &str, tokens: Arc<TokenSource>) -> Self {
        Self {
            http,
            bucket: bucket.to_string(),
            upload_base_url: UPLOAD_BASE_URL.to_string(),
            download_base_url: DOWNLOAD_BASE_URL.to_string(),
            tokens,
        }
    }

    pub fn with_upload_base_url(mut self, base_url: &str) -> Self {
        self.upload_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public URL serving `object_path`, authorized by a download token.
    pub fn download_url(&self, object_path: &str, token: &str) -> String {
        format!(
            "{}/b/{}/o/{}?alt=media&token={}",
            self.download_base_url,
            self.bucket,
            urlencoding::encode(object_path),
            token
        )
    }

    /// Upload `bytes` in one multipart request, tagging the object with a fresh
    /// download token alongside `metadata`.
    pub async fn upload(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<UploadedObject> {
        let download_token = Uuid::new_v4().to_string();
        let mut custom = metadata.clone();
        custom.insert(DOWNLOAD_TOKENS_KEY.to_string(), download_token.clone());

        let meta_json = serde_json::to_vec(&ObjectMetadata {
            name: object_path,
            content_type,
            metadata: &custom,
        })?;

        let boundary = format!("archivo-{}", Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &meta_json, content_type, &bytes);

        let url = format!("{}/b/{}/o", self.upload_base_url, self.bucket);
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(&url)
            .query(&[("uploadType", "multipart")])
            .bearer_auth(&token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let object: ObjectResource = resp.json().await?;

        tracing::debug!(
            object = object.name.as_str(),
            bucket = object.bucket.as_str(),
            size = bytes.len(),
            "Uploaded object"
        );

        let download_url = self.download_url(&object.name, &download_token);
        Ok(UploadedObject {
            name: object.name,
            bucket: object.bucket,
            download_token,
            download_url,
        })
    }
}

fn multipart_related(boundary: &str, metadata: &[u8], content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + data.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;

    fn storage() -> Storage {
        let tokens = Arc::new(TokenSource::new(
            reqwest::Client::new(),
            Credentials::StaticToken("t".into()),
        ));
        Storage::new(reqwest::Client::new(), "almaflores.appspot.com", tokens)
    }

    #[test]
    fn download_url_encodes_the_whole_path() {
        let url = storage().download_url("blog/posts/u1/legacy/2013/p1-foto.jpg", "tok");
        assert_eq!(
            url,
            "https://firebasestorage.googleapis.com/v0/b/almaflores.appspot.com/o/\
             blog%2Fposts%2Fu1%2Flegacy%2F2013%2Fp1-foto.jpg?alt=media&token=tok"
        );
    }

    #[test]
    fn multipart_body_has_both_parts() {
        let body = multipart_related("b", br#"{"name":"x"}"#, "image/png", b"PNG");
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "--b\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"name\":\"x\"}\
             \r\n--b\r\nContent-Type: image/png\r\n\r\nPNG\r\n--b--\r\n"
        );
    }
}
