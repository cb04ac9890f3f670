use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::Direction;
use crate::error::CompileError;
use crate::tree::ElementAttributes;

/// Where a step came from. Attached verbatim to log records and errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub code: String,
}

impl SourceLocation {
    pub fn new(line: usize, code: impl Into<String>) -> Self {
        SourceLocation {
            line,
            code: code.into(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.code)
    }
}

/// A compiled script: structured steps only, no raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub steps: Vec<ScriptStep>,
}

impl Script {
    /// Total number of steps including loop bodies.
    pub fn step_count(&self) -> usize {
        fn count(steps: &[ScriptStep]) -> usize {
            steps
                .iter()
                .map(|s| match &s.op {
                    StepOp::For { body, .. } => 1 + count(body),
                    _ => 1,
                })
                .sum()
        }
        count(&self.steps)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub op: StepOp,
    pub source: SourceLocation,
}

/// One requested operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepOp {
    Tap { target: TargetRef },
    LongTap { target: TargetRef },
    SetText { target: TargetRef, text: String },
    Scroll { target: TargetRef, direction: Direction },
    GetText { target: TargetRef },
    GetAttributes { target: TargetRef },
    Back,
    Len { target: TargetRef },
    /// Iterate the children of a group, binding each to `var`
    For {
        var: String,
        target: TargetRef,
        body: Vec<ScriptStep>,
    },
}

impl StepOp {
    pub fn name(&self) -> &'static str {
        match self {
            StepOp::Tap { .. } => "tap",
            StepOp::LongTap { .. } => "long_tap",
            StepOp::SetText { .. } => "set_text",
            StepOp::Scroll { .. } => "scroll",
            StepOp::GetText { .. } => "get_text",
            StepOp::GetAttributes { .. } => "get_attributes",
            StepOp::Back => "back",
            StepOp::Len { .. } => "len",
            StepOp::For { .. } => "for",
        }
    }
}

/// What a selector starts from.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetBase {
    /// `$screen__api`
    Api(String),
    /// A loop variable
    Var(String),
}

/// Element selection applied to the base.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// `[n]`: n-th direct child
    Index(usize),
    /// `.match(...)`
    Match(MatchQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchQuery {
    Text(String),
    /// Every key must equal the element's attribute of the same name
    Attributes(Map<String, Value>),
}

impl MatchQuery {
    pub fn matches(&self, attributes: &ElementAttributes, text_match: bool) -> bool {
        match self {
            MatchQuery::Text(_) => text_match,
            MatchQuery::Attributes(query) => {
                let Ok(Value::Object(actual)) = serde_json::to_value(attributes) else {
                    return false;
                };
                query.iter().all(|(k, v)| actual.get(k) == Some(v))
            }
        }
    }
}

/// A resolved selector reference, serialized in its textual form
/// (`$api`, `$api[2]`, `row.match("Wi-Fi")`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetRef {
    pub base: TargetBase,
    pub access: Option<Access>,
}

impl TargetRef {
    pub fn api(name: &str) -> Self {
        TargetRef {
            base: TargetBase::Api(name.to_string()),
            access: None,
        }
    }

    pub fn var(name: &str) -> Self {
        TargetRef {
            base: TargetBase::Var(name.to_string()),
            access: None,
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            TargetBase::Api(name) => write!(f, "${}", name)?,
            TargetBase::Var(name) => write!(f, "{}", name)?,
        }
        match &self.access {
            None => Ok(()),
            Some(Access::Index(i)) => write!(f, "[{}]", i),
            Some(Access::Match(MatchQuery::Text(t))) => {
                write!(f, ".match({})", Value::String(t.clone()))
            }
            Some(Access::Match(MatchQuery::Attributes(m))) => {
                write!(f, ".match({})", Value::Object(m.clone()))
            }
        }
    }
}

impl TryFrom<String> for TargetRef {
    type Error = CompileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        super::compiler::parse_selector(&value, 0)
    }
}

impl From<TargetRef> for String {
    fn from(value: TargetRef) -> Self {
        value.to_string()
    }
}

/// Value produced by a read step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StepValue {
    Text(Option<String>),
    Attributes(ElementAttributes),
    Count(usize),
    /// Result of a scroll: whether the screen was already at its end
    AtEnd(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutput {
    pub source: SourceLocation,
    pub value: StepValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub kind: String,
    pub message: String,
    pub location: Option<SourceLocation>,
}

/// Outcome of running one script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub script: String,
    pub passed: bool,
    /// Steps started, loop bodies included
    pub steps_run: usize,
    /// Requested primitive actions
    pub actions: usize,
    pub outputs: Vec<StepOutput>,
    pub error: Option<RunFailure>,
    pub duration_ms: u128,
}
