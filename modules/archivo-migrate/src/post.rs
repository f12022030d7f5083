use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::dates::{extract_date_label, parse_date_label};
use crate::error::{MigrateError, Result};
use crate::layout::{is_absolute_url, SiteLayout};
use crate::scan::{extract_blocks, extract_markers, resolve_block, MARKER_RE};
use crate::text::html_to_text;
use crate::types::{LegacyPost, Tagged, TitleSource};

pub const DEFAULT_TITLE: &str = "Entrada sin titulo";

static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2\b[^>]*>(.*?)</h2>").expect("valid regex"));
static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<header\b.*?</header>").expect("valid regex"));
static LEADING_ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<article\b[^>]*>").expect("valid regex"));
static TRAILING_ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</article>\s*$").expect("valid regex"));
static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*\bsrc\s*=\s*["']([^"']+)["'][^>]*>"#).expect("valid regex")
});

/// Title from the first `<h2>`, then the marker's `postTitle`, then a placeholder.
pub fn extract_title(block: &str, marker_title: &str) -> Tagged<String, TitleSource> {
    let heading = H2_RE
        .captures(block)
        .map(|caps| html_to_text(&caps[1]))
        .unwrap_or_default();

    if !heading.is_empty() {
        Tagged::new(heading, TitleSource::Heading)
    } else if !marker_title.is_empty() {
        Tagged::new(marker_title.to_string(), TitleSource::Marker)
    } else {
        Tagged::new(DEFAULT_TITLE.to_string(), TitleSource::Default)
    }
}

/// Body text of an article block with the header and markers removed.
pub fn normalize_content(block: &str) -> String {
    let html = HEADER_RE.replace_all(block, " ");
    let html = MARKER_RE.replace_all(&html, " ");
    let html = LEADING_ARTICLE_RE.replace(&html, " ");
    let html = TRAILING_ARTICLE_RE.replace(&html, " ");
    html_to_text(&html).trim().to_string()
}

/// First `<img src>` that points at a local file rather than a remote URL.
pub fn first_local_image_src(block: &str) -> Option<String> {
    IMG_SRC_RE
        .captures_iter(block)
        .map(|caps| caps[1].trim().to_string())
        .find(|src| !src.is_empty() && !is_absolute_url(src))
}

/// Extract every marker-keyed post from one archive page.
pub fn parse_document(
    source: &str,
    year: i32,
    source_file: &str,
    layout: &SiteLayout,
) -> Vec<LegacyPost> {
    let blocks = extract_blocks(source);
    let markers = extract_markers(source, source_file);

    let mut posts = Vec::with_capacity(markers.len());
    for marker in markers {
        let Some(block) = resolve_block(marker.offset, &blocks) else {
            warn!(
                post_id = %marker.post_id,
                source_file,
                "No <article> found for marker, skipping"
            );
            continue;
        };
        let html = block.slice(source);

        let date_label = extract_date_label(&html_to_text(html));
        let created_at = parse_date_label(&date_label, year);
        let image_src = first_local_image_src(html).unwrap_or_default();
        let local_image_path = layout
            .image_candidate(&image_src)
            .filter(|path| path.is_file());

        posts.push(LegacyPost {
            title: extract_title(html, &marker.post_title),
            content: normalize_content(html),
            post_id: marker.post_id,
            year,
            created_at,
            date_label,
            source_file: source_file.to_string(),
            image_src,
            local_image_path,
        });
    }
    posts
}

/// Read and parse the archive page for `year`.
pub async fn parse_archive_year(layout: &SiteLayout, year: i32) -> Result<Vec<LegacyPost>> {
    let path = layout.year_document(year);
    let source = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| MigrateError::io(&path, e))?;
    let source_file = layout.relative(&path);

    let posts = parse_document(&source, year, &source_file, layout);
    info!(year, source_file = %source_file, posts = posts.len(), "Parsed archive page");
    Ok(posts)
}

/// Parse every requested year in order. Years without an archive page are
/// skipped with a warning.
pub async fn collect_posts(layout: &SiteLayout, years: &[i32]) -> Result<Vec<LegacyPost>> {
    let mut posts = Vec::new();
    for &year in years {
        let path = layout.year_document(year);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            warn!(year, source_file = %layout.relative(&path), "Archive page not found, skipping year");
            continue;
        }
        posts.extend(parse_archive_year(layout, year).await?);
    }
    Ok(posts)
}

/// Fail on the first `post_id` seen twice, naming both source files.
pub fn ensure_unique_post_ids(posts: &[LegacyPost]) -> Result<()> {
    let mut seen: HashMap<&str, &LegacyPost> = HashMap::with_capacity(posts.len());
    for post in posts {
        if let Some(first) = seen.insert(post.post_id.as_str(), post) {
            return Err(MigrateError::DuplicatePostId {
                post_id: post.post_id.clone(),
                first: first.source_file.clone(),
                second: post.source_file.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DateSource;

    const PAGE: &str = r#"---
import SocialInteractions from "../../components/SocialInteractions.astro";
---
<main>
  <article class="post">
    <header><h2>Primavera &amp; flores</h2><span>marzo 14, 2012</span></header>
    <p>El jardin despierta.</p>
    <img src="https://cdn.example.com/remote.jpg">
    <img src="/images/2012/lirio.jpg" alt="lirio">
    <SocialInteractions postId="2012-primavera" postTitle="Primavera" />
  </article>
  <article>
    <p>Sin titulo ni fecha.</p>
  </article>
  <SocialInteractions
    postId='2012-sin-titulo'
  />
</main>
"#;

    #[test]
    fn parses_markers_into_posts() {
        let layout = SiteLayout::new("/nonexistent-site");
        let posts = parse_document(PAGE, 2012, "src/pages/archivo/2012.astro", &layout);
        assert_eq!(posts.len(), 2);

        let first = &posts[0];
        assert_eq!(first.post_id, "2012-primavera");
        assert_eq!(first.title, Tagged::new("Primavera & flores".to_string(), TitleSource::Heading));
        assert_eq!(first.date_label, "marzo 14, 2012");
        assert_eq!(first.created_at.source, DateSource::Label);
        assert_eq!(first.content, "El jardin despierta.");
        assert_eq!(first.image_src, "/images/2012/lirio.jpg");
        assert!(first.local_image_path.is_none());
        assert!(first.has_missing_image());

        let second = &posts[1];
        assert_eq!(second.post_id, "2012-sin-titulo");
        assert_eq!(second.title.source, TitleSource::Default);
        assert_eq!(second.title.value, DEFAULT_TITLE);
        assert_eq!(second.created_at.source, DateSource::YearFallback);
        assert_eq!(second.content, "Sin titulo ni fecha.");
        assert_eq!(second.image_src, "");
    }

    #[test]
    fn title_falls_back_to_marker_title() {
        let title = extract_title("<article><h2> <b></b> </h2></article>", "Desde marcador");
        assert_eq!(title.value, "Desde marcador");
        assert_eq!(title.source, TitleSource::Marker);
    }

    #[test]
    fn content_strips_header_marker_and_wrapper() {
        let block = r#"<article id="a"><header><h2>T</h2></header><p>Uno</p><SocialInteractions postId="x" /></article>"#;
        assert_eq!(normalize_content(block), "Uno");
    }

    #[test]
    fn removed_markup_keeps_words_apart() {
        let block = r#"<article><header><h2>T</h2></header>Hola<SocialInteractions postId="x" />mundo</article>"#;
        assert_eq!(normalize_content(block), "Hola mundo");
        let block = "<article>Antes<header><h2>T</h2></header>despues</article>";
        assert_eq!(normalize_content(block), "Antes despues");
    }

    #[test]
    fn remote_images_are_skipped() {
        assert_eq!(first_local_image_src(r#"<img src="http://a/b.jpg">"#), None);
        assert_eq!(
            first_local_image_src(r#"<img alt="x" src=' fotos/a.png '><img src="/b.png">"#),
            Some("fotos/a.png".to_string())
        );
    }

    #[test]
    fn orphan_marker_is_dropped() {
        let layout = SiteLayout::new("/nonexistent-site");
        let page = r#"<SocialInteractions postId="huerfano" /><article><p>x</p></article>"#;
        assert!(parse_document(page, 2013, "2013.astro", &layout).is_empty());
    }

    #[test]
    fn duplicate_ids_name_both_sources() {
        let layout = SiteLayout::new("/nonexistent-site");
        let page = r#"<article><p>a</p><SocialInteractions postId="dup" /></article>"#;
        let mut posts = parse_document(page, 2012, "2012.astro", &layout);
        posts.extend(parse_document(page, 2013, "2013.astro", &layout));

        let err = ensure_unique_post_ids(&posts).unwrap_err();
        match err {
            MigrateError::DuplicatePostId { post_id, first, second } => {
                assert_eq!(post_id, "dup");
                assert_eq!(first, "2012.astro");
                assert_eq!(second, "2013.astro");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unique_ids_pass() {
        let layout = SiteLayout::new("/nonexistent-site");
        let page = r#"<article><SocialInteractions postId="a" /></article><article><SocialInteractions postId="b" /></article>"#;
        let posts = parse_document(page, 2012, "2012.astro", &layout);
        assert_eq!(posts.len(), 2);
        assert!(ensure_unique_post_ids(&posts).is_ok());
    }
}
