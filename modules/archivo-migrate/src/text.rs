// HTML fragment → plain text for post bodies.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static BR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static LI_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("valid regex"));
static BLOCK_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|div|section|article|blockquote|ul|ol|li|h1|h2|h3|h4|h5|h6)>")
        .expect("valid regex")
});
static EMBED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<iframe\b.*?</iframe>|<script\b.*?</script>|<style\b.*?</style>")
        .expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));

static NAMED_ENTITIES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("&nbsp;", " "),
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
    ]
    .into_iter()
    .map(|(entity, replacement)| {
        let re = Regex::new(&format!("(?i){}", regex::escape(entity))).expect("valid regex");
        (re, replacement)
    })
    .collect()
});
static DECIMAL_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#([0-9]+);").expect("valid regex"));
static HEX_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#x([0-9a-fA-F]+);").expect("valid regex"));

/// Decode the handful of named entities the archive uses plus numeric
/// references. References to invalid code points are left as written.
pub fn decode_entities(value: &str) -> String {
    let mut output = value.to_string();
    for (re, replacement) in NAMED_ENTITIES.iter() {
        output = re.replace_all(&output, *replacement).into_owned();
    }

    output = DECIMAL_REF_RE
        .replace_all(&output, |caps: &Captures| {
            code_point(&caps[1], 10).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();

    HEX_REF_RE
        .replace_all(&output, |caps: &Captures| {
            code_point(&caps[1], 16).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn code_point(digits: &str, radix: u32) -> Option<String> {
    let n = u32::from_str_radix(digits, radix).ok()?;
    char::from_u32(n).map(String::from)
}

/// Convert an HTML fragment to paragraphs of plain text.
///
/// Block-level closers and `<br>` become line breaks, list items get a `- `
/// bullet, embeds and comments disappear, and the surviving non-empty lines
/// are joined with a blank line between them.
pub fn html_to_text(html: &str) -> String {
    let text = COMMENT_RE.replace_all(html, " ");
    let text = BR_RE.replace_all(&text, "\n");
    let text = LI_OPEN_RE.replace_all(&text, "- ");
    let text = BLOCK_CLOSE_RE.replace_all(&text, "\n");
    let text = EMBED_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, " ");

    let decoded = decode_entities(&text);
    decoded
        .lines()
        .map(|line| HSPACE_RE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_and_inline_markup() {
        assert_eq!(
            html_to_text("<p>Hola &amp; <b>mundo</b></p><p>Segunda</p>"),
            "Hola & mundo\n\nSegunda"
        );
    }

    #[test]
    fn list_items_get_bullets() {
        assert_eq!(
            html_to_text("<ul><li>uno</li><li class=\"x\">dos</li></ul>"),
            "- uno\n\n- dos"
        );
    }

    #[test]
    fn br_and_headings_break_lines() {
        assert_eq!(
            html_to_text("<h2>Titulo</h2>linea 1<br>linea 2<BR/>linea 3"),
            "Titulo\n\nlinea 1\n\nlinea 2\n\nlinea 3"
        );
    }

    #[test]
    fn comments_scripts_styles_and_iframes_vanish() {
        let html = r#"<p>antes</p><!-- nota
interna --><script type="text/javascript">var x = "<p>no</p>";</script>
<style>.a { color: red }</style><iframe src="https://youtube.com/embed/x">fallback</iframe><p>despues</p>"#;
        assert_eq!(html_to_text(html), "antes\n\ndespues");
    }

    #[test]
    fn whitespace_is_collapsed_per_line() {
        assert_eq!(
            html_to_text("<div>  muchos \t  espacios  </div>\r\n\r\n<div>fin</div>"),
            "muchos espacios\n\nfin"
        );
    }

    #[test]
    fn named_entities_are_case_insensitive() {
        assert_eq!(decode_entities("a&NBSP;b &LT;c&GT; &Quot;d&quot; &#39;e"), "a b <c> \"d\" 'e");
    }

    #[test]
    fn numeric_references_decode() {
        assert_eq!(decode_entities("caf&#233; &#xF1;and&#xfa;"), "café ñandú");
    }

    #[test]
    fn invalid_code_points_are_kept() {
        assert_eq!(decode_entities("&#55296; &#x110000;"), "&#55296; &#x110000;");
    }

    #[test]
    fn no_markup_survives() {
        let text = html_to_text("<article><header><h2>T</h2></header><p><a href='/x'>enlace</a></p></article>");
        assert!(!text.contains('<'));
        assert!(!text.contains('>'));
        assert_eq!(text, "T\n\nenlace");
    }
}
