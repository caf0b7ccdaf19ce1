//! Text cleanup and token accounting.

use std::sync::LazyLock;

use htmd::HtmlToMarkdown;
use regex::Regex;
use tiktoken_rs::CoreBPE;

/// Default token ceiling for any text sent to the language model.
pub const MAX_TOKENS: usize = 8000;

/// Footer phrases the help center appends to article bodies.
pub const ARTICLE_BOILERPLATE: &[&str] = &[
    "Was this article helpful?",
    "Have more questions? Submit a request",
    "Return to top",
];

/// Banners repeated on every page of exported PDFs.
pub const PDF_BOILERPLATE: &[&str] = &[
    "Copyright 2022",
    "Copyright 2021",
    "Copyright 2020",
    "Copyright 2019",
    "Copyright 2018",
    "CLO Virtual Fashion Inc.",
    "All Rights Reserved.",
    "C L O V I R T U A L F A S H I O N",
    "STRICTLY CONFIDENTIAL",
    "CLO VIRTUAL FASHION",
];

static HTML_CONVERTER: LazyLock<HtmlToMarkdown> = LazyLock::new(|| {
    HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "head", "iframe"])
        .build()
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static MD_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());

static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());

static MD_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").unwrap());

/// Paired `*`, `**`, `***`, `__` and `___` runs around non-blank text.
static MD_EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(^|[^\\])(?:",
        r"\*\*\*([^*\s](?:[^*]*[^*\s\\])?)\*\*\*",
        r"|\*\*([^*\s](?:[^*]*[^*\s\\])?)\*\*",
        r"|\*([^*\s](?:[^*]*[^*\s\\])?)\*",
        r"|___([^_\s](?:[^_]*[^_\s\\])?)___",
        r"|__([^_\s](?:[^_]*[^_\s\\])?)__",
        r")"
    ))
    .unwrap()
});

static MD_ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([\\`*_{}\[\]()#+\-.!>|])").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static ATTR_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(?:src|href)\s*=\s*["']([^"']+)["']"#).unwrap());

static YOUTUBE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:youtube(?:-nocookie)?\.com/(?:embed/|v/|shorts/|watch\?(?:[^#]*&)?v=)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .unwrap()
});

static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(?:x([0-9A-Fa-f]+)|([0-9]+));").unwrap());

static BPE: LazyLock<Option<CoreBPE>> = LazyLock::new(|| {
    tiktoken_rs::get_bpe_from_model("gpt-3.5-turbo")
        .map_err(|e| tracing::warn!(error = %e, "tokenizer unavailable, estimating tokens"))
        .ok()
});

/// Convert an HTML fragment into plain text.
///
/// Markdown produced by the conversion is flattened again: images are dropped,
/// links keep their text, and whitespace runs collapse to a single space.
pub fn remove_html_tags(html: &str) -> String {
    let markdown = match HTML_CONVERTER.convert(html) {
        Ok(markdown) => markdown,
        Err(e) => {
            tracing::debug!(error = %e, "html conversion failed, stripping tags");
            TAG_RE.replace_all(html, " ").into_owned()
        }
    };

    let text = MD_IMAGE_RE.replace_all(&markdown, "");
    let text = MD_LINK_RE.replace_all(&text, "$1");
    let text = MD_HEADING_RE.replace_all(&text, "");
    let text = MD_EMPHASIS_RE.replace_all(&text, |caps: &regex::Captures| {
        let inner = (2..=6).find_map(|i| caps.get(i)).map_or("", |m| m.as_str());
        format!("{}{inner}", &caps[1])
    });
    let text = MD_ESCAPE_RE.replace_all(&text, "$1");
    collapse_whitespace(&text)
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Remove every occurrence of the given phrases.
pub fn remove_boilerplate(text: &str, phrases: &[&str]) -> String {
    let mut cleaned = text.to_string();
    for phrase in phrases {
        if cleaned.contains(phrase) {
            cleaned = cleaned.replace(phrase, "");
        }
    }
    cleaned
}

/// Every YouTube video referenced from `src`/`href` attributes, as watch URLs.
pub fn extract_youtube_links(html: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for attr in ATTR_URL_RE.captures_iter(html) {
        let Some(id) = YOUTUBE_ID_RE.captures(&attr[1]).map(|c| c[1].to_string()) else {
            continue;
        };
        let link = format!("https://www.youtube.com/watch?v={id}");
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

/// Number of tokens in `text` for the chat/embedding models.
pub fn num_tokens(text: &str) -> usize {
    match BPE.as_ref() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.chars().count().div_ceil(4),
    }
}

/// Longest prefix of `text` that fits in `max_tokens`.
pub fn trim_tokens(text: &str, max_tokens: usize) -> String {
    let Some(bpe) = BPE.as_ref() else {
        return text.chars().take(max_tokens * 4).collect();
    };
    let tokens = bpe.encode_with_special_tokens(text);
    if tokens.len() <= max_tokens {
        return text.to_string();
    }

    // A cut inside a multi-byte character does not decode; back off one token at a time.
    let mut end = max_tokens;
    while end > 0 {
        if let Ok(prefix) = bpe.decode(tokens[..end].to_vec()) {
            if bpe.encode_with_special_tokens(&prefix).len() <= max_tokens {
                return prefix;
            }
        }
        end -= 1;
    }
    String::new()
}

/// Decode the HTML entities that show up in API titles and caption XML.
pub fn unescape_entities(text: &str) -> String {
    let decoded = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    decoded
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_html_tags() {
        let html = "<p>Hello <strong>world</strong></p><script>track()</script>";
        assert_eq!(remove_html_tags(html), "Hello world");
    }

    #[test]
    fn test_remove_html_tags_drops_images_keeps_link_text() {
        let html = r#"<p>See <a href="https://example.com">the guide</a></p><p><img src="a.png" alt="pic"></p>"#;
        let text = remove_html_tags(html);
        assert!(text.contains("See the guide"));
        assert!(!text.contains("a.png"));
        assert!(!text.contains("https://example.com"));
    }

    #[test]
    fn test_remove_html_tags_keeps_literal_asterisks() {
        let html = "<p>Use *.zip or 2 * 3 with <strong>care</strong></p>";
        assert_eq!(remove_html_tags(html), "Use *.zip or 2 * 3 with care");
    }

    #[test]
    fn test_remove_html_tags_unwraps_paired_emphasis() {
        let html = "<p><strong>Bold</strong> then <b>more bold</b> and snake_case_name</p>";
        assert_eq!(remove_html_tags(html), "Bold then more bold and snake_case_name");
    }

    #[test]
    fn test_remove_boilerplate() {
        let text = "Intro STRICTLY CONFIDENTIAL body Copyright 2021 end";
        assert_eq!(
            collapse_whitespace(&remove_boilerplate(text, PDF_BOILERPLATE)),
            "Intro body end"
        );
    }

    #[test]
    fn test_extract_youtube_links() {
        let html = r#"
            <iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0"></iframe>
            <a href="https://youtu.be/dQw4w9WgXcQ">dup</a>
            <a href="https://www.youtube.com/watch?list=x&v=abcdefghijk">second</a>
            <a href="https://example.com/watch?v=abcdefghijk">not youtube</a>
        "#;
        assert_eq!(
            extract_youtube_links(html),
            vec![
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
                "https://www.youtube.com/watch?v=abcdefghijk".to_string(),
            ]
        );
    }

    #[test]
    fn test_trim_tokens_short_text_unchanged() {
        assert_eq!(trim_tokens("short text", 100), "short text");
    }

    #[test]
    fn test_trim_tokens_respects_limit() {
        let text = "garment pattern ".repeat(500);
        let trimmed = trim_tokens(&text, 50);
        assert!(num_tokens(&trimmed) <= 50);
        assert!(num_tokens(&trimmed) >= 40);
        assert!(text.starts_with(&trimmed));
    }

    #[test]
    fn test_trim_tokens_multibyte() {
        let text = "가상 의상 ".repeat(300);
        let trimmed = trim_tokens(&text, 20);
        assert!(num_tokens(&trimmed) <= 20);
        assert!(text.starts_with(&trimmed));
    }

    #[test]
    fn test_trim_tokens_zero_budget() {
        assert_eq!(trim_tokens("garment pattern", 0), "");
    }

    #[test]
    fn test_unescape_entities() {
        assert_eq!(unescape_entities("It&#39;s &quot;new&quot;"), "It's \"new\"");
        assert_eq!(unescape_entities("A &amp;lt; B"), "A &lt; B");
        assert_eq!(unescape_entities("&#x41;&#66;"), "AB");
    }
}
