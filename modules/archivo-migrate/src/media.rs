use std::path::Path;

use unicode_normalization::UnicodeNormalization;

use crate::types::LegacyPost;

const FALLBACK_SEGMENT: &str = "archivo";

/// Make a file name safe for an object path.
///
/// Accents are stripped by decomposing to NFD and dropping combining marks,
/// anything outside `[A-Za-z0-9._-]` collapses into a single `-`, and the result is lowercased. An empty result
/// becomes `"archivo"`.
pub fn sanitize_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.nfd().filter(|c| !is_combining_mark(c)) {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            if c == '-' && out.ends_with('-') {
                continue;
            }
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_SEGMENT.to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_combining_mark(c: &char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(c)
}

/// MIME type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// `blog/posts/<uid>/legacy/<year>/<postId>-<safe basename>`.
pub fn storage_object_path(author_uid: &str, post: &LegacyPost) -> String {
    let basename = post
        .local_image_path
        .as_deref()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .or_else(|| {
            post.image_src
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "image".to_string());

    format!(
        "blog/posts/{author_uid}/legacy/{}/{}-{}",
        post.year,
        post.post_id,
        sanitize_segment(&basename)
    )
}
