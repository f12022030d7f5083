use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use firebase_client::{Credentials, Fields, Firestore, Storage, TokenSource, Value};

use crate::config::MigrateConfig;
use crate::error::MigrateError;
use crate::store::{DocumentStore, ObjectStore, ObjectUpload, PostRecord, POSTS_COLLECTION};

const UPDATED_AT_FIELD: &str = "updatedAt";

/// Posts collection backed by Firestore.
pub struct FirestorePosts {
    firestore: Firestore,
}

impl FirestorePosts {
    pub fn new(firestore: Firestore) -> Self {
        Self { firestore }
    }
}

#[async_trait]
impl DocumentStore for FirestorePosts {
    async fn get(&self, id: &str) -> Result<Option<serde_json::Value>> {
        let doc = self.firestore.get_document(POSTS_COLLECTION, id).await?;
        Ok(doc.map(|d| serde_json::Value::Object(d.fields)))
    }

    async fn upsert(&self, id: &str, record: &PostRecord, merge: bool) -> Result<()> {
        self.firestore
            .upsert_document(
                POSTS_COLLECTION,
                id,
                &record_fields(record),
                merge,
                &[UPDATED_AT_FIELD],
            )
            .await?;
        Ok(())
    }
}

/// Media bucket backed by Firebase Storage.
pub struct StorageObjects {
    storage: Storage,
}

impl StorageObjects {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ObjectStore for StorageObjects {
    async fn put(&self, upload: ObjectUpload) -> Result<String> {
        let metadata = BTreeMap::from([("sourceFile".to_string(), upload.source_file)]);
        let uploaded = self
            .storage
            .upload(&upload.path, upload.bytes, &upload.content_type, &metadata)
            .await?;
        Ok(uploaded.download_url)
    }
}

/// Firestore fields for a post. `updatedAt` is left to a server transform.
pub fn record_fields(record: &PostRecord) -> Fields {
    let legacy = &record.legacy;
    let legacy_fields = Fields::from([
        ("source".to_string(), Value::from(legacy.source.as_str())),
        ("sourceFile".to_string(), Value::from(legacy.source_file.as_str())),
        ("originalPostId".to_string(), Value::from(legacy.original_post_id.as_str())),
        ("originalDateLabel".to_string(), Value::from(legacy.original_date_label.as_str())),
        ("originalImageSrc".to_string(), Value::from(legacy.original_image_src.as_str())),
        ("migratedAtMs".to_string(), Value::from(legacy.migrated_at_ms)),
    ]);

    Fields::from([
        ("title".to_string(), Value::from(record.title.as_str())),
        ("content".to_string(), Value::from(record.content.as_str())),
        ("imageUrl".to_string(), Value::from(record.image_url.as_str())),
        ("authorUid".to_string(), Value::from(record.author_uid.as_str())),
        ("authorEmail".to_string(), Value::from(record.author_email.as_str())),
        ("authorName".to_string(), Value::from(record.author_name.as_str())),
        ("year".to_string(), Value::from(record.year)),
        ("createdAt".to_string(), Value::from(record.created_at)),
        ("createdAtMs".to_string(), Value::from(record.created_at_ms)),
        ("legacy".to_string(), Value::Map(legacy_fields)),
    ])
}

/// Concrete stores for a live run.
pub struct FirebaseBackend {
    pub posts: FirestorePosts,
    pub objects: StorageObjects,
}

/// Load credentials and build the Firestore and Storage clients.
///
/// Credentials come from the explicit service account key, then
/// `GOOGLE_APPLICATION_CREDENTIALS`, then the gcloud default file. The project
/// id falls back to the one recorded in the credentials and then to
/// `GOOGLE_CLOUD_PROJECT`.
pub async fn connect(config: &MigrateConfig) -> crate::error::Result<FirebaseBackend> {
    let credentials = match (&config.service_account_path, &config.application_credentials) {
        (Some(path), _) | (None, Some(path)) => Credentials::from_file(path).await?,
        (None, None) => Credentials::gcloud_default().await?,
    };

    let project_id = config
        .project_id
        .clone()
        .or_else(|| credentials.project_id().map(str::to_string))
        .or_else(|| config.cloud_project.clone())
        .ok_or_else(|| {
            MigrateError::Config(
                "could not resolve Firebase project id: use --project-id or set PUBLIC_FIREBASE_PROJECT_ID"
                    .into(),
            )
        })?;
    let bucket = config.bucket.clone().ok_or_else(|| {
        MigrateError::Config(
            "could not resolve storage bucket: use --bucket or set PUBLIC_FIREBASE_STORAGE_BUCKET"
                .into(),
        )
    })?;

    info!(
        project_id = %project_id,
        bucket = %bucket,
        credentials = credentials.kind(),
        "Connecting to Firebase"
    );

    let http = reqwest::Client::builder()
        .build()
        .map_err(firebase_client::FirebaseError::from)?;
    let tokens = Arc::new(TokenSource::new(http.clone(), credentials));

    Ok(FirebaseBackend {
        posts: FirestorePosts::new(Firestore::new(http.clone(), &project_id, tokens.clone())),
        objects: StorageObjects::new(Storage::new(http, &bucket, tokens)),
    })
}

/// Warn about backend settings that will be inferred rather than taken as given.
pub fn warn_implicit_settings(config: &MigrateConfig) {
    if config.project_id.is_none() {
        warn!("No project id given; falling back to the credentials or GOOGLE_CLOUD_PROJECT");
    }
    if config.bucket.is_none() {
        warn!("No storage bucket given; use --bucket or PUBLIC_FIREBASE_STORAGE_BUCKET");
    }
}
