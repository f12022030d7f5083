use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A value together with the fallback step that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged<T, S> {
    pub value: T,
    pub source: S,
}

impl<T, S> Tagged<T, S> {
    pub fn new(value: T, source: S) -> Self {
        Self { value, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    /// First `<h2>` inside the article.
    Heading,
    /// `postTitle` on the social-interactions marker.
    Marker,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Parsed from a month-name date in the article text.
    Label,
    /// January 1st of the document's year.
    YearFallback,
}

/// One post recovered from a yearly archive page.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyPost {
    pub post_id: String,
    pub title: Tagged<String, TitleSource>,
    pub content: String,
    pub year: i32,
    pub created_at: Tagged<DateTime<Utc>, DateSource>,
    /// Raw matched date text, empty when none was found.
    pub date_label: String,
    /// Archive page the post came from, relative to the site root.
    pub source_file: String,
    /// First local `<img src>` in the article, empty when none.
    pub image_src: String,
    /// On-disk file for `image_src`, only set when it exists.
    pub local_image_path: Option<PathBuf>,
}

impl LegacyPost {
    pub fn created_at_ms(&self) -> i64 {
        self.created_at.value.timestamp_millis()
    }

    /// An image was referenced but no file backs it.
    pub fn has_missing_image(&self) -> bool {
        !self.image_src.is_empty() && self.local_image_path.is_none()
    }
}
