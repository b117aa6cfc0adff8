// src/utils/linkify.rs
use regex::Regex;
use std::sync::OnceLock;

static URL_RE: OnceLock<Regex> = OnceLock::new();

fn url_re() -> &'static Regex {
    URL_RE.get_or_init(|| Regex::new(r"https?://[^\s<>]+").expect("valid url regex"))
}

/// Strips every piece of user-supplied markup, leaving escaped plain text.
/// Message bodies are stored post-sanitization so they can never be
/// executed as markup downstream.
pub fn sanitize(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string()
}

/// Wraps bare URLs in anchor tags. Expects already-sanitized text, so the
/// only markup in the result is the anchors produced here.
pub fn linkify(input: &str) -> String {
    url_re()
        .replace_all(input, |caps: &regex::Captures| {
            let matched = &caps[0];
            // keep trailing sentence punctuation out of the link
            let trimmed = matched.trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
            let rest = &matched[trimmed.len()..];
            format!("<a href=\"{trimmed}\" target=\"_blank\" rel=\"noopener noreferrer\">{trimmed}</a>{rest}")
        })
        .to_string()
}

/// The ingest pipeline for message bodies: strip markup, then anchor URLs.
pub fn render_body(input: &str) -> String {
    linkify(&sanitize(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_markup() {
        assert_eq!(sanitize("<script>alert(1)</script>hello"), "hello");
        assert_eq!(sanitize("<b>bold</b> text"), "bold text");
    }

    #[test]
    fn test_sanitize_escapes_angle_brackets() {
        assert_eq!(sanitize("5 < 6 & 7 > 2"), "5 &lt; 6 &amp; 7 &gt; 2");
    }

    #[test]
    fn test_linkify_wraps_bare_urls() {
        let out = linkify("see https://example.com/listing/42 for photos");
        assert_eq!(
            out,
            "see <a href=\"https://example.com/listing/42\" target=\"_blank\" rel=\"noopener noreferrer\">https://example.com/listing/42</a> for photos"
        );
    }

    #[test]
    fn test_linkify_keeps_trailing_punctuation_outside() {
        let out = linkify("check https://example.com.");
        assert!(out.ends_with("</a>."));
    }

    #[test]
    fn test_linkify_leaves_plain_text_alone() {
        assert_eq!(linkify("no links here"), "no links here");
    }

    #[test]
    fn test_render_body_strips_then_links() {
        let out = render_body("<img src=x> visit http://example.com");
        assert_eq!(
            out,
            " visit <a href=\"http://example.com\" target=\"_blank\" rel=\"noopener noreferrer\">http://example.com</a>"
        );
    }
}
