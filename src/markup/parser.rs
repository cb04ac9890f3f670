use thiserror::Error;

use crate::element::normalize::unescape_markup;

use super::markup_model::{DocIndex, Document};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("markup error at offset {offset}: {message}")]
pub struct MarkupError {
    pub offset: usize,
    pub message: String,
}

fn err(offset: usize, message: impl Into<String>) -> MarkupError {
    MarkupError {
        offset,
        message: message.into(),
    }
}

/// Parse the tagged document form (the output of [`Document::render`],
/// catalog skeleton strings, and fixture views).
///
/// Whitespace-only text is dropped, comments and declarations are
/// skipped, `<tag/>` is accepted as an empty element.
pub fn parse(input: &str) -> Result<Document, MarkupError> {
    let mut doc = Document::new();
    let mut stack: Vec<DocIndex> = vec![Document::DOCUMENT];
    let bytes = input.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            let next = input[pos..].find('<').map_or(bytes.len(), |i| pos + i);
            let text = input[pos..next].trim();
            if !text.is_empty() {
                let top = *stack.last().unwrap_or(&Document::DOCUMENT);
                if doc.is_document(top) {
                    return Err(err(pos, "text outside of any element"));
                }
                doc.push_text(top, &unescape_markup(text));
            }
            pos = next;
            continue;
        }

        let rest = &input[pos..];
        if rest.starts_with("<!--") {
            let end = rest
                .find("-->")
                .ok_or_else(|| err(pos, "unterminated comment"))?;
            pos += end + 3;
            continue;
        }
        if rest.starts_with("<?") || rest.starts_with("<!") {
            let end = rest
                .find('>')
                .ok_or_else(|| err(pos, "unterminated declaration"))?;
            pos += end + 1;
            continue;
        }

        let end = find_tag_end(input, pos).ok_or_else(|| err(pos, "unterminated tag"))?;
        let inner = &input[pos + 1..end];

        if let Some(name) = inner.strip_prefix('/') {
            let name = name.trim();
            if stack.len() == 1 {
                return Err(err(pos, format!("unexpected closing tag </{}>", name)));
            }
            let open = stack.pop().unwrap_or(Document::DOCUMENT);
            if doc.node(open).tag != name {
                return Err(err(
                    pos,
                    format!(
                        "closing tag </{}> does not match <{}>",
                        name,
                        doc.node(open).tag
                    ),
                ));
            }
        } else {
            let self_closing = inner.trim_end().ends_with('/');
            let body = inner.trim_end().trim_end_matches('/');
            let (name, attrs) = parse_open_tag(body, pos)?;
            let parent = *stack.last().unwrap_or(&Document::DOCUMENT);
            let idx = doc.append(parent, &name, attrs, None);
            if !self_closing {
                stack.push(idx);
            }
        }
        pos = end + 1;
    }

    if stack.len() != 1 {
        let open = stack[stack.len() - 1];
        return Err(err(
            bytes.len(),
            format!("unclosed element <{}>", doc.node(open).tag),
        ));
    }
    Ok(doc)
}

/// Position of the `>` closing the tag at `start`, honoring quotes.
fn find_tag_end(input: &str, start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in input.as_bytes().iter().enumerate().skip(start + 1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

fn parse_open_tag(body: &str, offset: usize) -> Result<(String, Vec<(String, String)>), MarkupError> {
    let body = body.trim();
    let name_end = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());
    let name = &body[..name_end];
    if name.is_empty() {
        return Err(err(offset, "element without a tag name"));
    }

    let mut attrs = Vec::new();
    let mut rest = body[name_end..].trim_start();
    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        if key.is_empty() {
            return Err(err(offset, format!("malformed attribute in <{}>", name)));
        }
        rest = rest[key_end..].trim_start();

        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (value, remaining) = match after_eq.chars().next() {
                Some(q @ ('\'' | '"')) => {
                    let close = after_eq[1..]
                        .find(q)
                        .ok_or_else(|| err(offset, format!("unterminated value for '{}'", key)))?;
                    (&after_eq[1..1 + close], &after_eq[close + 2..])
                }
                _ => {
                    let end = after_eq
                        .find(char::is_whitespace)
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            attrs.push((key.to_string(), unescape_markup(value)));
            rest = remaining.trim_start();
        } else {
            attrs.push((key.to_string(), String::new()));
        }
    }
    Ok((name.to_string(), attrs))
}
