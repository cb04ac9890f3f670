use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::DefinitionError;

/// Separator between a screen name and an api name.
pub const SCOPE_SEPARATOR: &str = "__";

static SCREEN_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+?)__").expect("valid regex"));
static CALL_ARGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\((.*)\)").expect("valid regex"));

/// Scroll direction vocabulary shared by declarations and requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a declared dependency step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DependentKind {
    Tap,
    LongTap,
    SetText { text: String },
    Scroll { direction: Direction },
    GetText,
    GetAttributes,
    Back,
}

/// One parsed step of a dependency path, e.g.
/// `tap(home__settings_button)` or `back()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependentAction {
    pub raw: String,
    /// Owning screen, taken from the first scope prefix
    pub screen: String,
    /// Full `screen__api` name of the referenced element
    pub api_name: Option<String>,
    pub kind: DependentKind,
    pub args: Vec<String>,
}

impl DependentAction {
    pub fn parse(raw: &str) -> Result<Self, DefinitionError> {
        let action = raw.trim();
        let fail = |reason: &str| DefinitionError::DependencyAction {
            action: action.to_string(),
            reason: reason.to_string(),
        };

        let prefix = SCREEN_PREFIX
            .captures(action)
            .ok_or_else(|| fail("missing 'screen__' scope prefix"))?;
        let whole = prefix.get(0).ok_or_else(|| fail("missing scope prefix"))?;
        let screen = prefix[1].to_string();
        let stripped = format!("{}{}", &action[..whole.start()], &action[whole.end()..]);

        let args = extract_arguments(&stripped);
        let api_name = args
            .first()
            .map(|a| format!("{}{}{}", screen, SCOPE_SEPARATOR, a));

        let arity = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(fail(&format!("expected {} argument(s), got {}", n, args.len())))
            }
        };

        let name = stripped
            .split_once('(')
            .map(|(name, _)| name.trim())
            .ok_or_else(|| fail("expected a call"))?;

        let kind = match name {
            "tap" => {
                arity(1)?;
                DependentKind::Tap
            }
            "long_tap" => {
                arity(1)?;
                DependentKind::LongTap
            }
            "set_text" => {
                arity(2)?;
                DependentKind::SetText {
                    text: unquote(&args[1]).to_string(),
                }
            }
            "scroll" => {
                arity(2)?;
                let direction = Direction::parse(unquote(&args[1]))
                    .ok_or_else(|| fail(&format!("unknown scroll direction {}", args[1])))?;
                DependentKind::Scroll { direction }
            }
            "get_text" => {
                arity(1)?;
                DependentKind::GetText
            }
            "get_attributes" => {
                arity(1)?;
                DependentKind::GetAttributes
            }
            "back" => {
                arity(0)?;
                DependentKind::Back
            }
            _ => return Err(fail("unknown action kind")),
        };

        Ok(DependentAction {
            raw: action.to_string(),
            screen,
            api_name,
            kind,
            args,
        })
    }

    pub fn is_back(&self) -> bool {
        self.kind == DependentKind::Back
    }

    /// Reads have no effect on the screen and are skipped during replay.
    pub fn is_read(&self) -> bool {
        matches!(self.kind, DependentKind::GetText | DependentKind::GetAttributes)
    }
}

impl fmt::Display for DependentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Screen part of a `screen__api` name.
pub fn screen_of(api_name: &str) -> &str {
    api_name
        .split_once(SCOPE_SEPARATOR)
        .map_or(api_name, |(screen, _)| screen)
}

fn unquote(arg: &str) -> &str {
    arg.trim().trim_matches(|c| c == '\'' || c == '"')
}

/// Split the argument list of `name(...)` on commas outside quotes.
fn extract_arguments(call: &str) -> Vec<String> {
    let Some(captures) = CALL_ARGS.captures(call) else {
        return Vec::new();
    };
    let inner = &captures[1];

    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in inner.chars() {
        match c {
            '\\' if !escaped => {
                escaped = true;
                current.push(c);
                continue;
            }
            '\'' | '"' if !escaped => {
                match quote {
                    Some(q) if q == c => quote = None,
                    None => quote = Some(c),
                    _ => {}
                }
                current.push(c);
            }
            ',' if quote.is_none() => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
        escaped = false;
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}
