use std::sync::Arc;

use serde::Serialize;

use crate::auth::TokenSource;
use crate::error::{check_status, Result};
use crate::value::{field_paths, Document, Fields};

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";

#[derive(Serialize)]
struct CommitRequest<'a> {
    writes: Vec<Write<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Write<'a> {
    update: DocumentWrite<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    update_mask: Option<DocumentMask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    update_transforms: Vec<FieldTransform<'a>>,
}

#[derive(Serialize)]
struct DocumentWrite<'a> {
    name: String,
    fields: &'a Fields,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMask {
    field_paths: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldTransform<'a> {
    field_path: &'a str,
    set_to_server_value: &'static str,
}

/// Firestore REST client scoped to one project and database.
pub struct Firestore {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    database: String,
    tokens: Arc<TokenSource>,
}

impl Firestore {
    pub fn new(http: reqwest::Client, project_id: &str, tokens: Arc<TokenSource>) -> Self {
        Self {
            http,
            base_url: FIRESTORE_BASE_URL.to_string(),
            project_id: project_id.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            tokens,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }

    /// Full resource name, as used inside request bodies.
    pub fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_root(), collection, id)
    }

    /// Fetch a document. A 404 is reported as `Ok(None)`.
    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = format!(
            "{}/{}/{}/{}",
            self.base_url,
            self.documents_root(),
            collection,
            urlencoding::encode(id)
        );
        let token = self.tokens.access_token().await?;
        let resp = self.http.get(&url).bearer_auth(&token).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resp = check_status(resp).await?;
        Ok(Some(resp.json().await?))
    }

    /// Write `fields` to `collection/id` in a single commit.
    ///
    /// With `merge`, the update mask lists every leaf path in `fields`, so keys
    /// not present are left untouched; without it the document is replaced.
    /// Each path in `server_timestamps` is set to the commit time by the server.
    pub async fn upsert_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        merge: bool,
        server_timestamps: &[&str],
    ) -> Result<()> {
        let write = Write {
            update: DocumentWrite {
                name: self.document_name(collection, id),
                fields,
            },
            update_mask: merge.then(|| DocumentMask {
                field_paths: field_paths(fields),
            }),
            update_transforms: server_timestamps
                .iter()
                .map(|&path| FieldTransform {
                    field_path: path,
                    set_to_server_value: "REQUEST_TIME",
                })
                .collect(),
        };
        let body = CommitRequest {
            writes: vec![write],
        };

        let url = format!("{}/{}:commit", self.base_url, self.documents_root());
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;

        tracing::debug!(collection, id, merge, "Committed Firestore write");
        Ok(())
    }
}
