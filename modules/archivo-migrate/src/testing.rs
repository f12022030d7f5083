// Test doubles for the migration.
//
// - MockDocumentStore (DocumentStore): in-memory posts with call counters
// - MockObjectStore (ObjectStore): records uploads, returns fake URLs
// - ArchiveFixture: a temporary site root with archive pages and images

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::{Author, MigrateConfig, DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, DEFAULT_AUTHOR_UID};
use crate::layout::SiteLayout;
use crate::store::{DocumentStore, ObjectStore, ObjectUpload, PostRecord};

// ---------------------------------------------------------------------------
// MockDocumentStore
// ---------------------------------------------------------------------------

/// In-memory posts collection. Ids registered with `with_existing` read back
/// as present; `failing_on` makes reads and writes for one id fail.
#[derive(Default)]
pub struct MockDocumentStore {
    existing: Mutex<HashSet<String>>,
    records: Mutex<HashMap<String, PostRecord>>,
    fail_on: Option<String>,
    gets: AtomicUsize,
    upserts: AtomicUsize,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.existing
            .lock()
            .unwrap()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.fail_on = Some(id.to_string());
        self
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.upsert_calls()
    }

    pub fn record(&self, id: &str) -> Option<PostRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    fn check_failure(&self, id: &str) -> Result<()> {
        if self.fail_on.as_deref() == Some(id) {
            bail!("mock document store failure for {id}");
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn get(&self, id: &str) -> Result<Option<serde_json::Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_failure(id)?;
        let present = self.existing.lock().unwrap().contains(id)
            || self.records.lock().unwrap().contains_key(id);
        Ok(present.then(|| serde_json::json!({ "postId": id })))
    }

    async fn upsert(&self, id: &str, record: &PostRecord, _merge: bool) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check_failure(id)?;
        self.records
            .lock()
            .unwrap()
            .insert(id.to_string(), record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockObjectStore
// ---------------------------------------------------------------------------

/// Records every upload and hands back `https://storage.test/<path>?n=<count>`.
/// `failing_on` rejects uploads whose object path contains the fragment.
#[derive(Default)]
pub struct MockObjectStore {
    uploads: Mutex<Vec<ObjectUpload>>,
    fail_on: Option<String>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, path_fragment: &str) -> Self {
        self.fail_on = Some(path_fragment.to_string());
        self
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn uploads(&self) -> Vec<ObjectUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(&self, upload: ObjectUpload) -> Result<String> {
        if let Some(fragment) = &self.fail_on {
            if upload.path.contains(fragment.as_str()) {
                bail!("mock object store failure for {}", upload.path);
            }
        }
        let mut uploads = self.uploads.lock().unwrap();
        let url = format!("https://storage.test/{}?n={}", upload.path, uploads.len() + 1);
        uploads.push(upload);
        Ok(url)
    }
}

// ---------------------------------------------------------------------------
// ArchiveFixture
// ---------------------------------------------------------------------------

/// A throwaway site root laid out like the real one.
pub struct ArchiveFixture {
    dir: tempfile::TempDir,
}

impl ArchiveFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/pages/archivo")).unwrap();
        std::fs::create_dir_all(dir.path().join("public/images")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> SiteLayout {
        SiteLayout::new(self.dir.path())
    }

    /// A run config rooted at this fixture with default author and no backend settings.
    pub fn config(&self, years: &[i32]) -> MigrateConfig {
        MigrateConfig {
            dry_run: false,
            overwrite: false,
            years: years.to_vec(),
            project_id: None,
            bucket: None,
            service_account_path: None,
            application_credentials: None,
            cloud_project: None,
            author: default_author(),
            layout: self.layout(),
        }
    }

    /// Write `src/pages/archivo/<year>.astro`.
    pub fn year_page(self, year: i32, body: &str) -> Self {
        std::fs::write(self.layout().year_document(year), body).unwrap();
        self
    }

    /// Write a file under `public/`, creating parent directories.
    pub fn public_file(self, rel: &str, bytes: &[u8]) -> Self {
        let path: PathBuf = self.layout().public_dir().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, bytes).unwrap();
        self
    }
}

impl Default for ArchiveFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// The default migration author.
pub fn default_author() -> Author {
    Author {
        uid: DEFAULT_AUTHOR_UID.to_string(),
        name: DEFAULT_AUTHOR_NAME.to_string(),
        email: DEFAULT_AUTHOR_EMAIL.to_string(),
    }
}

/// One `<article>` with a heading, a date line, an optional image and its marker.
pub fn article(post_id: &str, title: &str, date: &str, image_src: Option<&str>) -> String {
    let image = image_src
        .map(|src| format!("\n    <img src=\"{src}\" alt=\"\">"))
        .unwrap_or_default();
    format!(
        r#"  <article class="post">
    <header><h2>{title}</h2><p class="fecha">{date}</p></header>
    <p>Contenido de {post_id}.</p>{image}
    <SocialInteractions postId="{post_id}" postTitle="{title}" />
  </article>
"#
    )
}

/// Wrap articles in a minimal page.
pub fn page(articles: &[String]) -> String {
    format!(
        "---\nimport SocialInteractions from \"../../components/SocialInteractions.astro\";\n---\n<main>\n{}</main>\n",
        articles.concat()
    )
}
