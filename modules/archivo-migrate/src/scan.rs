// Narrow tag scanner for the archive pages. Only `<article>` nesting and the
// self-closing `<SocialInteractions />` markers are recognized; everything else
// is opaque text. Callers only see spans, so a real HTML parser can replace
// this without touching them.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

static ARTICLE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?article\b[^>]*>").expect("valid regex"));

pub(crate) static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<SocialInteractions\b.*?/>").expect("valid regex"));

/// `name="value"` or `name='value'` pairs inside a tag.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid regex")
});

/// Byte range of one `<article>…</article>` block, open tag to close tag inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub start: usize,
    pub end: usize,
}

impl BlockSpan {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset <= self.end
    }
}

/// A `<SocialInteractions postId=… postTitle=… />` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub offset: usize,
    pub post_id: String,
    pub post_title: String,
}

/// Pair every `</article>` with the most recent unclosed `<article>`.
///
/// Assumes well-formed, non-overlapping nesting. Stray closing tags are
/// ignored and unclosed openings produce no span. Spans come back sorted by
/// start offset.
pub fn extract_blocks(text: &str) -> Vec<BlockSpan> {
    let mut open: Vec<usize> = Vec::new();
    let mut blocks = Vec::new();

    for tag in ARTICLE_TAG_RE.find_iter(text) {
        if tag.as_str().starts_with("</") {
            if let Some(start) = open.pop() {
                blocks.push(BlockSpan {
                    start,
                    end: tag.end(),
                });
            }
        } else {
            open.push(tag.start());
        }
    }

    blocks.sort_by_key(|b| b.start);
    blocks
}

/// Locate every marker that carries a `postId`. Markers without one are
/// skipped with a warning.
pub fn extract_markers(text: &str, source_file: &str) -> Vec<Marker> {
    MARKER_RE
        .find_iter(text)
        .filter_map(|m| {
            let tag = m.as_str();
            let post_id = attr_value(tag, "postId");
            if post_id.is_empty() {
                warn!(source_file, offset = m.start(), "SocialInteractions marker without postId, skipping");
                return None;
            }
            Some(Marker {
                offset: m.start(),
                post_id,
                post_title: attr_value(tag, "postTitle"),
            })
        })
        .collect()
}

/// Attribute value from a tag, trimmed. Double-quoted occurrences win over
/// single-quoted ones; a missing attribute yields an empty string.
pub fn attr_value(tag: &str, name: &str) -> String {
    let mut single_quoted = None;
    for caps in ATTR_RE.captures_iter(tag) {
        if !caps[1].eq_ignore_ascii_case(name) {
            continue;
        }
        if let Some(value) = caps.get(2) {
            return value.as_str().trim().to_string();
        }
        if single_quoted.is_none() {
            single_quoted = caps.get(3).map(|v| v.as_str().trim().to_string());
        }
    }
    single_quoted.unwrap_or_default()
}

/// The block a marker belongs to: the first block containing its offset,
/// otherwise the nearest block that ended before it.
pub fn resolve_block(offset: usize, blocks: &[BlockSpan]) -> Option<&BlockSpan> {
    if let Some(block) = blocks.iter().find(|b| b.contains(offset)) {
        return Some(block);
    }

    let mut preceding = None;
    for block in blocks {
        if block.end > offset {
            break;
        }
        preceding = Some(block);
    }
    preceding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_flat_articles() {
        let text = "<article>a</article> x <article class=\"p\">b</article>";
        let blocks = extract_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].slice(text), "<article>a</article>");
        assert_eq!(blocks[1].slice(text), "<article class=\"p\">b</article>");
    }

    #[test]
    fn pairs_nested_articles_with_their_own_closers() {
        let text = "<article>outer <article>inner</article> tail</article>";
        let blocks = extract_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].slice(text), text);
        assert_eq!(blocks[1].slice(text), "<article>inner</article>");
    }

    #[test]
    fn tag_matching_is_case_insensitive() {
        let text = "<ARTICLE>x</Article>";
        assert_eq!(extract_blocks(text), vec![BlockSpan { start: 0, end: text.len() }]);
    }

    #[test]
    fn stray_and_unclosed_tags_produce_nothing() {
        assert!(extract_blocks("</article><article>never closed").is_empty());
    }

    #[test]
    fn articles_prefix_is_not_an_article() {
        assert!(extract_blocks("<articles>x</articles>").is_empty());
    }

    #[test]
    fn markers_read_double_then_single_quotes() {
        let text = r#"<SocialInteractions postId="p-1" postTitle='Hola' />
<socialinteractions
   postId='p-2'
/>"#;
        let markers = extract_markers(text, "2013.astro");
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].post_id, "p-1");
        assert_eq!(markers[0].post_title, "Hola");
        assert_eq!(markers[1].post_id, "p-2");
        assert_eq!(markers[1].post_title, "");
    }

    #[test]
    fn markers_without_post_id_are_dropped() {
        let text = r#"<SocialInteractions postTitle="sin id" /><SocialInteractions postId="  " />"#;
        assert!(extract_markers(text, "2013.astro").is_empty());
    }

    #[test]
    fn attr_prefers_double_quoted_value() {
        let tag = r#"<SocialInteractions postId='single' postId=" double " />"#;
        assert_eq!(attr_value(tag, "postId"), "double");
        assert_eq!(attr_value(tag, "postTitle"), "");
    }

    #[test]
    fn attr_names_do_not_match_inside_other_values() {
        let tag = r#"<SocialInteractions postTitle="postId='x'" postId="real" />"#;
        assert_eq!(attr_value(tag, "postId"), "real");
    }

    #[test]
    fn marker_inside_block_resolves_to_it() {
        let blocks = [BlockSpan { start: 0, end: 10 }, BlockSpan { start: 20, end: 30 }];
        assert_eq!(resolve_block(25, &blocks), Some(&blocks[1]));
    }

    #[test]
    fn marker_between_blocks_attaches_to_earlier_one() {
        let blocks = [BlockSpan { start: 0, end: 10 }, BlockSpan { start: 20, end: 30 }];
        assert_eq!(resolve_block(15, &blocks), Some(&blocks[0]));
        assert_eq!(resolve_block(99, &blocks), Some(&blocks[1]));
    }

    #[test]
    fn marker_before_every_block_is_unresolved() {
        let blocks = [BlockSpan { start: 5, end: 10 }];
        assert_eq!(resolve_block(2, &blocks), None);
        assert_eq!(resolve_block(2, &[]), None);
    }

    #[test]
    fn marker_in_nested_block_prefers_outer_span() {
        let blocks = [BlockSpan { start: 0, end: 50 }, BlockSpan { start: 10, end: 20 }];
        assert_eq!(resolve_block(15, &blocks), Some(&blocks[0]));
    }
}
