use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::config::Author;
use crate::error::{MigrateError, Result};
use crate::layout::SiteLayout;
use crate::media::{content_type_for, storage_object_path};
use crate::store::{DocumentStore, ObjectStore, ObjectUpload, PostRecord};
use crate::types::LegacyPost;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStats {
    pub created_or_updated: usize,
    pub skipped_existing: usize,
    pub uploaded_images: usize,
}

impl fmt::Display for MigrationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration complete.")?;
        writeln!(f, "- Created or updated: {}", self.created_or_updated)?;
        writeln!(f, "- Skipped (already present): {}", self.skipped_existing)?;
        write!(f, "- Images uploaded: {}", self.uploaded_images)
    }
}

/// Writes extracted posts into the stores, one at a time.
pub struct Migrator<'a> {
    documents: &'a dyn DocumentStore,
    objects: &'a dyn ObjectStore,
    layout: &'a SiteLayout,
    author: &'a Author,
    overwrite: bool,
    /// Local image path to download URL, for this run only.
    upload_cache: HashMap<PathBuf, String>,
}

impl<'a> Migrator<'a> {
    pub fn new(
        documents: &'a dyn DocumentStore,
        objects: &'a dyn ObjectStore,
        layout: &'a SiteLayout,
        author: &'a Author,
        overwrite: bool,
    ) -> Self {
        Self {
            documents,
            objects,
            layout,
            author,
            overwrite,
            upload_cache: HashMap::new(),
        }
    }

    /// Migrate `posts` in order. The first store failure aborts the run;
    /// writes already made stay in place.
    pub async fn run(&mut self, posts: &[LegacyPost]) -> Result<MigrationStats> {
        let mut stats = MigrationStats::default();

        for post in posts {
            let existing = self.documents.get(&post.post_id).await?;
            if existing.is_some() && !self.overwrite {
                stats.skipped_existing += 1;
                info!(post_id = %post.post_id, "[skip] already exists");
                continue;
            }

            let image_url = match &post.local_image_path {
                Some(path) => {
                    let (url, fresh) = self.upload_image(post, path).await?;
                    if fresh {
                        stats.uploaded_images += 1;
                    }
                    url
                }
                None => String::new(),
            };
            let has_image = !image_url.is_empty();

            let record = PostRecord::from_post(post, self.author, image_url, Utc::now());
            self.documents.upsert(&post.post_id, &record, true).await?;
            stats.created_or_updated += 1;
            info!(post_id = %post.post_id, year = post.year, has_image, "[ok] migrated");
        }

        Ok(stats)
    }

    /// Upload the post's image unless this run already did. Returns the URL and
    /// whether a new upload happened.
    async fn upload_image(&mut self, post: &LegacyPost, path: &Path) -> Result<(String, bool)> {
        if let Some(url) = self.upload_cache.get(path) {
            return Ok((url.clone(), false));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MigrateError::io(path, e))?;
        let upload = ObjectUpload {
            path: storage_object_path(&self.author.uid, post),
            bytes,
            content_type: content_type_for(path).to_string(),
            source_file: self.layout.relative(path),
        };
        let url = self.objects.put(upload).await?;

        self.upload_cache.insert(path.to_path_buf(), url.clone());
        Ok((url, true))
    }
}
