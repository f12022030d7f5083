// Storage seams for the migration.
//
// DocumentStore is the posts collection, ObjectStore is the media bucket.
// Migrator only talks to these traits, so tests run against in-memory mocks
// and the Firebase implementations live in `backend`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::Author;
use crate::types::LegacyPost;

pub const POSTS_COLLECTION: &str = "posts";
pub const LEGACY_SOURCE_TAG: &str = "astro-archive-migration";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The durable form of a post, keyed by `post_id` in the posts collection.
/// `updatedAt` is not carried here; backends assign it at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub author_uid: String,
    pub author_email: String,
    pub author_name: String,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub created_at_ms: i64,
    pub legacy: LegacyProvenance,
}

/// Where a migrated post came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyProvenance {
    pub source: String,
    pub source_file: String,
    pub original_post_id: String,
    pub original_date_label: String,
    pub original_image_src: String,
    pub migrated_at_ms: i64,
}

impl PostRecord {
    pub fn from_post(post: &LegacyPost, author: &Author, image_url: String, now: DateTime<Utc>) -> Self {
        Self {
            title: post.title.value.clone(),
            content: post.content.clone(),
            image_url,
            author_uid: author.uid.clone(),
            author_email: author.email.clone(),
            author_name: author.name.clone(),
            year: post.year,
            created_at: post.created_at.value,
            created_at_ms: post.created_at_ms(),
            legacy: LegacyProvenance {
                source: LEGACY_SOURCE_TAG.to_string(),
                source_file: post.source_file.clone(),
                original_post_id: post.post_id.clone(),
                original_date_label: post.date_label.clone(),
                original_image_src: post.image_src.clone(),
                migrated_at_ms: now.timestamp_millis(),
            },
        }
    }
}

/// One object to put in the media bucket.
#[derive(Debug, Clone)]
pub struct ObjectUpload {
    pub path: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Site-relative path of the file the bytes came from.
    pub source_file: String,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current fields of the post, or `None` when it does not exist.
    async fn get(&self, id: &str) -> Result<Option<serde_json::Value>>;

    /// Create or update the post. With `merge`, fields not in `record` are kept.
    async fn upsert(&self, id: &str, record: &PostRecord, merge: bool) -> Result<()>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the object and return a durable download URL for it.
    async fn put(&self, upload: ObjectUpload) -> Result<String>;
}
