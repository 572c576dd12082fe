#![allow(clippy::expect_used)]

use regex::Regex;
use std::sync::LazyLock;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex")
});

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>")
        .expect("valid script regex")
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#)
        .expect("valid link regex")
});

static META_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid meta regex"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attr regex")
});

static JSON_LD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script\s*>"#)
        .expect("valid json-ld regex")
});

/// Whether a body looks like an HTML document rather than plain text.
pub fn looks_like_html(body: &str, content_type: Option<&str>) -> bool {
    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("html") || ct.contains("xml") {
            return true;
        }
        if ct.starts_with("text/plain") {
            return false;
        }
    }
    let head: String = body.chars().take(1024).collect::<String>().to_lowercase();
    head.contains("<html") || head.contains("<!doctype html") || head.contains("<body")
}

/// The `<title>` text, entity-decoded and trimmed.
pub fn extract_title(html: &str) -> String {
    TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(&decode_entities(m.as_str())))
        .unwrap_or_default()
}

/// Visible text with scripts, styles, comments and tags removed.
pub fn extract_text(html: &str) -> String {
    let without_scripts = SCRIPT_STYLE_RE.replace_all(html, " ");
    let without_comments = COMMENT_RE.replace_all(&without_scripts, " ");
    let without_tags = TAG_RE.replace_all(&without_comments, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

/// Absolute http(s) links in document order, deduplicated.
///
/// Relative hrefs are resolved against `base_url`; fragments, `mailto:` and
/// `javascript:` links are skipped.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let base = reqwest::Url::parse(base_url).ok();
    let mut links: Vec<String> = Vec::new();

    for cap in LINK_RE.captures_iter(html) {
        let Some(href) = cap.get(1).map(|m| decode_entities(m.as_str().trim())) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let lower = href.to_ascii_lowercase();
        if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:") {
            continue;
        }

        let resolved = match &base {
            Some(b) => b.join(&href).ok(),
            None => reqwest::Url::parse(&href).ok(),
        };
        if let Some(mut url) = resolved {
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            url.set_fragment(None);
            let s = url.to_string();
            if !links.contains(&s) {
                links.push(s);
            }
        }
    }

    links
}

/// `<meta name|property="..." content="...">` pairs. Later duplicates are ignored.
pub fn extract_meta(html: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut meta = serde_json::Map::new();

    for tag in META_RE.find_iter(html) {
        let mut key: Option<String> = None;
        let mut content: Option<String> = None;
        for attr in ATTR_RE.captures_iter(tag.as_str()) {
            let name = attr.get(1).map(|m| m.as_str().to_ascii_lowercase());
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .map(|m| decode_entities(m.as_str()));
            match (name.as_deref(), value) {
                (Some("name" | "property"), Some(v)) if key.is_none() => key = Some(v),
                (Some("content"), Some(v)) => content = Some(v),
                _ => {}
            }
        }
        if let (Some(k), Some(c)) = (key, content) {
            let k = k.trim().to_string();
            if !k.is_empty() && !meta.contains_key(&k) {
                meta.insert(k, serde_json::Value::String(c.trim().to_string()));
            }
        }
    }

    meta
}

/// Parsed `application/ld+json` blocks. Blocks that fail to parse are skipped.
pub fn extract_json_ld(html: &str) -> Vec<serde_json::Value> {
    JSON_LD_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .filter_map(|m| serde_json::from_str(m.as_str().trim()).ok())
        .collect()
}

/// Truncates at a char boundary, appending an ellipsis marker.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        // Last, so "&amp;lt;" decodes to "&lt;" and not "<".
        .replace("&amp;", "&")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <title>  Rust &amp; Friends </title>
  <meta name="description" content="A page about Rust.">
  <meta property="og:title" content='Rust OG'>
  <meta charset="utf-8">
  <style>body { color: red; }</style>
  <script type="application/ld+json">{"@type": "Article", "headline": "Rust"}</script>
  <script type="application/ld+json">{ not json }</script>
  <script>var hidden = "do not show";</script>
</head>
<body>
  <!-- a comment -->
  <h1>Hello</h1>
  <p>Ownership is great.&nbsp;Borrowing too.</p>
  <a href="/docs">Docs</a>
  <a href="https://other.org/page#section">Other</a>
  <a href="/docs">Docs again</a>
  <a href="javascript:void(0)">Nope</a>
  <a href="mailto:a@b.c">Mail</a>
  <a href="#top">Top</a>
</body>
</html>"##;

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title(PAGE), "Rust & Friends");
        assert_eq!(extract_title("<p>no title</p>"), "");
    }

    #[test]
    fn test_extract_text_strips_scripts_and_tags() {
        let text = extract_text(PAGE);
        assert!(text.contains("Hello"));
        assert!(text.contains("Ownership is great. Borrowing too."));
        assert!(!text.contains("do not show"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("a comment"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_extract_links_resolves_and_dedupes() {
        let links = extract_links(PAGE, "https://example.com/blog/post");
        assert_eq!(
            links,
            vec![
                "https://example.com/docs".to_string(),
                "https://other.org/page".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_meta() {
        let meta = extract_meta(PAGE);
        assert_eq!(meta["description"], "A page about Rust.");
        assert_eq!(meta["og:title"], "Rust OG");
        assert_eq!(meta.len(), 2);
    }

    #[test]
    fn test_extract_json_ld_skips_invalid() {
        let blocks = extract_json_ld(PAGE);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["@type"], "Article");
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("plain", Some("text/html; charset=utf-8")));
        assert!(!looks_like_html("<html>", Some("text/plain")));
        assert!(looks_like_html("<!DOCTYPE html><html></html>", None));
        assert!(!looks_like_html("just some words", None));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_decode_entities_order() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }
}
