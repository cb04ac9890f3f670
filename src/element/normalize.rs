/// Maximum number of characters of display text kept per node.
pub const MAX_CONTENT_CHARS: usize = 50;

/// Display form of a node's text: newlines flattened, truncated.
pub fn display_text(raw: Option<&str>) -> Option<String> {
    let text = raw?.replace('\n', " \\ ");
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_CONTENT_CHARS).collect())
}

/// `None` for empty strings, mirroring how drivers report absent values.
pub fn text_or_none(raw: Option<&str>) -> Option<String> {
    raw.filter(|s| !s.is_empty()).map(str::to_string)
}

/// Last `/`-separated segment of a resource identifier.
pub fn short_resource_id(resource: &str) -> &str {
    resource.rsplit('/').next().unwrap_or(resource)
}

/// Escape the characters that would break the tagged document form.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape_markup(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn text_fingerprint(text: &str) -> String {
    use sha1::{Digest, Sha1};

    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
