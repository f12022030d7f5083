use std::path::{Path, PathBuf};

const ARCHIVE_DIR: &str = "src/pages/archivo";
const PUBLIC_DIR: &str = "public";

/// Where the site's archive pages and static assets live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    root: PathBuf,
}

impl SiteLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.join(PUBLIC_DIR)
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    /// The archive page for one year, e.g. `src/pages/archivo/2013.astro`.
    pub fn year_document(&self, year: i32) -> PathBuf {
        self.archive_dir().join(format!("{year}.astro"))
    }

    /// `path` relative to the site root with forward slashes, or the full path
    /// when it lies outside the root.
    pub fn relative(&self, path: &Path) -> String {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return path.display().to_string();
        };
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Map an `<img src>` to the file it would be served from. Absolute URLs
    /// have no local file.
    pub fn image_candidate(&self, src: &str) -> Option<PathBuf> {
        let src = src.trim();
        if src.is_empty() || is_absolute_url(src) {
            return None;
        }
        let normalized = src.strip_prefix('/').unwrap_or(src);

        if normalized.starts_with("images/") {
            Some(self.public_dir().join(normalized))
        } else {
            // `public/...` lands under the root just like any other relative path.
            Some(self.root.join(normalized))
        }
    }
}

pub fn is_absolute_url(src: &str) -> bool {
    let lower = src.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
