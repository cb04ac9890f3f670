use serde_json::Value;

use crate::catalog::Direction;
use crate::error::CompileError;

use super::script_model::{
    Access, MatchQuery, Script, ScriptStep, SourceLocation, StepOp, TargetBase, TargetRef,
};

/// One significant source line.
#[derive(Debug)]
struct Line<'a> {
    number: usize,
    indent: usize,
    text: &'a str,
}

/// Compile script text into structured steps.
///
/// One statement per line; `#` starts a comment; a `for v in L:` header
/// opens a block made of the following, more deeply indented lines.
pub fn compile(name: &str, text: &str) -> Result<Script, CompileError> {
    let lines: Vec<Line> = text
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let code = strip_comment(raw).trim_end();
            if code.trim().is_empty() {
                return None;
            }
            let indent = code.len() - code.trim_start().len();
            Some(Line {
                number: i + 1,
                indent,
                text: code.trim_start(),
            })
        })
        .collect();

    let mut pos = 0;
    let base = lines.first().map_or(0, |l| l.indent);
    let steps = parse_block(&lines, &mut pos, base, &[])?;
    if let Some(line) = lines.get(pos) {
        return Err(error(line.number, "unexpected indentation"));
    }
    Ok(Script {
        name: name.to_string(),
        steps,
    })
}

fn parse_block(
    lines: &[Line],
    pos: &mut usize,
    indent: usize,
    scope: &[String],
) -> Result<Vec<ScriptStep>, CompileError> {
    let mut steps = Vec::new();
    while let Some(line) = lines.get(*pos) {
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(error(line.number, "unexpected indentation"));
        }
        *pos += 1;
        let source = SourceLocation::new(line.number, line.text);

        if let Some(header) = line.text.strip_prefix("for ") {
            let (var, target) = parse_for_header(header, line.number, scope)?;
            let body_indent = match lines.get(*pos) {
                Some(next) if next.indent > indent => next.indent,
                _ => return Err(error(line.number, "expected an indented loop body")),
            };
            let mut inner = scope.to_vec();
            inner.push(var.clone());
            let body = parse_block(lines, pos, body_indent, &inner)?;
            steps.push(ScriptStep {
                op: StepOp::For { var, target, body },
                source,
            });
            continue;
        }

        let op = parse_statement(line.text, line.number, scope)?;
        steps.push(ScriptStep { op, source });
    }
    Ok(steps)
}

fn parse_for_header(
    header: &str,
    line: usize,
    scope: &[String],
) -> Result<(String, TargetRef), CompileError> {
    let Some(header) = header.trim_end().strip_suffix(':') else {
        return Err(error(line, "loop header must end with ':'"));
    };
    let Some((var, list)) = header.split_once(" in ") else {
        return Err(error(line, "expected 'for <var> in <list>:'"));
    };
    let var = var.trim();
    if !is_identifier(var) {
        return Err(error(line, format!("invalid loop variable '{}'", var)));
    }
    let target = parse_scoped_selector(list.trim(), line, scope)?;
    Ok((var.to_string(), target))
}

fn parse_statement(text: &str, line: usize, scope: &[String]) -> Result<StepOp, CompileError> {
    let Some(open) = text.find('(') else {
        return Err(error(line, format!("expected a call, found '{}'", text)));
    };
    if !text.ends_with(')') {
        return Err(error(line, "missing ')'"));
    }
    let name = text[..open].trim();
    let args = split_args(&text[open + 1..text.len() - 1], line)?;

    let arity = |n: usize| {
        if args.len() == n {
            Ok(())
        } else {
            Err(error(
                line,
                format!("{}() takes {} argument(s), got {}", name, n, args.len()),
            ))
        }
    };
    let target = |i: usize| parse_scoped_selector(args[i], line, scope);

    let op = match name {
        "tap" => {
            arity(1)?;
            StepOp::Tap { target: target(0)? }
        }
        "long_tap" => {
            arity(1)?;
            StepOp::LongTap { target: target(0)? }
        }
        "set_text" => {
            arity(2)?;
            StepOp::SetText {
                target: target(0)?,
                text: parse_string(args[1], line)?,
            }
        }
        "scroll" => {
            arity(2)?;
            let raw = parse_string(args[1], line)?;
            let direction = Direction::parse(&raw)
                .ok_or_else(|| error(line, format!("unknown scroll direction '{}'", raw)))?;
            StepOp::Scroll {
                target: target(0)?,
                direction,
            }
        }
        "get_text" => {
            arity(1)?;
            StepOp::GetText { target: target(0)? }
        }
        "get_attributes" => {
            arity(1)?;
            StepOp::GetAttributes { target: target(0)? }
        }
        "back" => {
            arity(0)?;
            StepOp::Back
        }
        "len" => {
            arity(1)?;
            StepOp::Len { target: target(0)? }
        }
        other => return Err(error(line, format!("unknown action '{}'", other))),
    };
    Ok(op)
}

fn parse_scoped_selector(
    text: &str,
    line: usize,
    scope: &[String],
) -> Result<TargetRef, CompileError> {
    let target = parse_selector(text, line)?;
    if let TargetBase::Var(var) = &target.base {
        if !scope.iter().any(|v| v == var) {
            return Err(error(line, format!("unknown variable '{}'", var)));
        }
    }
    Ok(target)
}

/// Parse a selector: `$api`, a loop variable, either optionally
/// followed by `[n]` or `.match("text")` / `.match({...})`.
pub fn parse_selector(text: &str, line: usize) -> Result<TargetRef, CompileError> {
    let text = text.trim();
    let (base, rest) = match text.strip_prefix('$') {
        Some(body) => {
            let end = identifier_end(body);
            if end == 0 {
                return Err(error(line, format!("missing api name in '{}'", text)));
            }
            (TargetBase::Api(body[..end].to_string()), &body[end..])
        }
        None => {
            let end = identifier_end(text);
            if end == 0 {
                return Err(error(line, format!("invalid selector '{}'", text)));
            }
            (TargetBase::Var(text[..end].to_string()), &text[end..])
        }
    };

    let access = if rest.is_empty() {
        None
    } else if let Some(index) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let n = index
            .trim()
            .parse::<usize>()
            .map_err(|_| error(line, format!("invalid index '{}'", index)))?;
        Some(Access::Index(n))
    } else if let Some(arg) = rest
        .strip_prefix(".match(")
        .and_then(|r| r.strip_suffix(')'))
    {
        Some(Access::Match(parse_match_query(arg.trim(), line)?))
    } else {
        return Err(error(line, format!("unexpected '{}' after selector", rest)));
    };

    Ok(TargetRef { base, access })
}

fn parse_match_query(arg: &str, line: usize) -> Result<MatchQuery, CompileError> {
    if arg.starts_with('{') {
        return match serde_json::from_str::<Value>(arg) {
            Ok(Value::Object(map)) => Ok(MatchQuery::Attributes(map)),
            Ok(_) => Err(error(line, "match() expects a string or an object")),
            Err(e) => Err(error(line, format!("invalid match object: {}", e))),
        };
    }
    parse_string(arg, line).map(MatchQuery::Text)
}

/// A single- or double-quoted string literal with backslash escapes.
fn parse_string(raw: &str, line: usize) -> Result<String, CompileError> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    let quote = match chars.next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return Err(error(line, format!("expected a string literal, found '{}'", raw))),
    };

    let mut out = String::new();
    let mut closed = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => break,
            },
            c if c == quote => {
                closed = true;
                break;
            }
            c => out.push(c),
        }
    }
    if !closed {
        return Err(error(line, "unterminated string literal"));
    }
    if chars.next().is_some() {
        return Err(error(line, format!("trailing characters after '{}'", out)));
    }
    Ok(out)
}

/// Split call arguments on top-level commas.
fn split_args(text: &str, line: usize) -> Result<Vec<&str>, CompileError> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                args.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(error(line, "unterminated string literal"));
    }
    if depth != 0 {
        return Err(error(line, "unbalanced brackets"));
    }
    let last = text[start..].trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last);
    }
    Ok(args)
}

/// Text before an unquoted `#`.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return &line[..i],
            None => {}
        }
    }
    line
}

fn identifier_end(text: &str) -> usize {
    text.char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map_or(text.len(), |(i, _)| i)
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && identifier_end(text) == text.len()
        && !text.starts_with(|c: char| c.is_ascii_digit())
}

fn error(line: usize, message: impl Into<String>) -> CompileError {
    CompileError {
        line,
        message: message.into(),
    }
}
