use std::process::ExitStatus;

use thiserror::Error;

use crate::script::script_model::SourceLocation;

/// Runtime failures of a requested action.
///
/// Every variant aborts the current script run only. The `location`
/// fields carry the compiler-supplied source token verbatim.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// A documented locator does not resolve although the element is
    /// expected on the screen currently shown.
    #[error("'{name}' does not exist on the current screen [{locator}]{}", at(.location))]
    Locator {
        name: String,
        locator: String,
        location: Option<SourceLocation>,
    },

    /// The referenced api name is not part of the catalog.
    #[error("unknown api '{name}'{}", at(.location))]
    Doc {
        name: String,
        location: Option<SourceLocation>,
    },

    /// The element was resolved but cannot take the requested action,
    /// or an explicit match/index found nothing.
    #[error("cannot {action} '{target}': {reason}{}", at(.location))]
    Action {
        action: String,
        target: String,
        reason: String,
        location: Option<SourceLocation>,
    },

    /// The element could not be reached after scroll search and
    /// dependency replay.
    #[error("not found: '{name}' [{locator}]{}{}", within(.group), at(.location))]
    NotFound {
        name: String,
        locator: String,
        group: Option<String>,
        location: Option<SourceLocation>,
    },

    /// Only raised when the action budget is enforced.
    #[error("action budget exhausted ({count} >= {cap}){}", at(.location))]
    BudgetExhausted {
        count: usize,
        cap: usize,
        location: Option<SourceLocation>,
    },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    LocatorSyntax(#[from] LocatorSyntaxError),

    #[error(transparent)]
    Env(#[from] EnvError),
}

impl VerifyError {
    /// Short classification used in run results and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Locator { .. } => "locator",
            VerifyError::Doc { .. } => "doc",
            VerifyError::Action { .. } => "action",
            VerifyError::NotFound { .. } => "not_found",
            VerifyError::BudgetExhausted { .. } => "budget",
            VerifyError::Definition(_) => "definition",
            VerifyError::LocatorSyntax(_) => "locator_syntax",
            VerifyError::Env(_) => "environment",
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            VerifyError::Locator { location, .. }
            | VerifyError::Doc { location, .. }
            | VerifyError::Action { location, .. }
            | VerifyError::NotFound { location, .. }
            | VerifyError::BudgetExhausted { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}

fn at(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) => format!(" (at {})", loc),
        None => String::new(),
    }
}

fn within(group: &Option<String>) -> String {
    match group {
        Some(g) => format!(" in group '{}'", g),
        None => String::new(),
    }
}

/// A locator expression that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid locator '{locator}' at offset {offset}: {message}")]
pub struct LocatorSyntaxError {
    pub locator: String,
    pub offset: usize,
    pub message: String,
}

/// Catalog and dependency declaration errors. Raised eagerly at load.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("malformed dependency action '{action}': {reason}")]
    DependencyAction { action: String, reason: String },

    #[error("api '{api}' on screen '{screen}': {reason}")]
    Api {
        screen: String,
        api: String,
        reason: String,
    },

    #[error("api '{api}' has an invalid locator: {source}")]
    Locator {
        api: String,
        source: LocatorSyntaxError,
    },

    #[error("screen '{screen}' has an unreadable skeleton: {reason}")]
    Skeleton { screen: String, reason: String },

    #[error("catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read catalog '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Failures of the environment collaborator.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Driver subprocess failed to spawn
    #[error("failed to spawn driver '{command}': {source}")]
    SubprocessSpawn {
        command: String,
        source: std::io::Error,
    },

    /// Driver subprocess exited with non-zero status
    #[error("driver '{command}' exited with {status}")]
    SubprocessFailed { command: String, status: ExitStatus },

    /// Reading or writing the driver pipes failed
    #[error("driver session I/O: {0}")]
    SessionIO(String),

    /// The driver answered with `ok: false` or an unexpected payload
    #[error("driver command '{command}' failed: {error}")]
    SessionProtocol { command: String, error: String },

    #[error("JSON parse error ({context}): {source}")]
    JsonParse {
        context: String,
        source: serde_json::Error,
    },

    #[error("JSON serialize error ({context}): {source}")]
    JsonSerialize {
        context: String,
        source: serde_json::Error,
    },

    /// Observation could not be turned into a tree
    #[error("malformed observation: {0}")]
    Observation(String),
}

/// Script text that cannot be compiled into structured steps.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct CompileError {
    pub line: usize,
    pub message: String,
}
