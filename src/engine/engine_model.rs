use serde::{Deserialize, Serialize};

use crate::catalog::Direction;
use crate::locator::Locator;
use crate::script::script_model::SourceLocation;
use crate::tree::ElementAttributes;

/// Whether the action cap stops a run or only warns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionBudgetPolicy {
    /// Exceeding the cap is logged and the run continues
    #[default]
    Advisory,
    /// Requests over the cap fail before touching the device
    Enforced,
}

/// Tunables of the resolution engine, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pause after every action that may change the screen
    pub settle_delay_ms: u64,
    /// Scroll attempts per container during a search
    pub max_scroll_count: usize,
    pub scroll_search_direction: Direction,
    pub max_action_count: usize,
    pub action_budget: ActionBudgetPolicy,
    /// Dependency paths tried per round
    pub max_path_count: usize,
    /// Together with `max_path_count`, bounds navigation sub-actions
    pub max_path_length: usize,
    pub max_replay_rounds: usize,
    /// Walk each dependency path back to front
    pub reverse_dependency_paths: bool,
    /// Fraction of the screen height below which `set_text` targets are
    /// scrolled into view first
    pub keyboard_margin: f64,
    /// Reopened when going back leaves the app
    pub app_name: Option<String>,
    pub default_screen: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            settle_delay_ms: 1000,
            max_scroll_count: 5,
            scroll_search_direction: Direction::Down,
            max_action_count: 50,
            action_budget: ActionBudgetPolicy::Advisory,
            max_path_count: 3,
            max_path_length: 8,
            max_replay_rounds: 3,
            reverse_dependency_paths: false,
            keyboard_margin: 0.9,
            app_name: None,
            default_screen: None,
        }
    }
}

impl EngineConfig {
    /// Navigation sub-actions allowed per request during replay.
    pub fn replay_budget(&self) -> usize {
        self.max_path_count * self.max_path_length
    }
}

/// Primitive action vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tap,
    LongTap,
    SetText,
    Scroll,
    GetText,
    GetAttributes,
    Back,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Tap => "tap",
            ActionKind::LongTap => "long_tap",
            ActionKind::SetText => "set_text",
            ActionKind::Scroll => "scroll",
            ActionKind::GetText => "get_text",
            ActionKind::GetAttributes => "get_attributes",
            ActionKind::Back => "back",
        }
    }

    /// Reads observe the element and issue no device action.
    pub fn is_read(&self) -> bool {
        matches!(self, ActionKind::GetText | ActionKind::GetAttributes)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference to the element a request targets.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementRef {
    /// A documented element, looked up in the catalog
    Api(String),
    /// An element discovered at run time with a synthesized locator
    Located { name: String, locator: Locator },
}

impl ElementRef {
    pub fn name(&self) -> &str {
        match self {
            ElementRef::Api(name) => name,
            ElementRef::Located { name, .. } => name,
        }
    }
}

/// A structured request for one primitive action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub target: Option<ElementRef>,
    pub text: Option<String>,
    pub direction: Option<Direction>,
    pub source: Option<SourceLocation>,
}

impl ActionRequest {
    pub fn new(kind: ActionKind, target: ElementRef) -> Self {
        ActionRequest {
            kind,
            target: Some(target),
            text: None,
            direction: None,
            source: None,
        }
    }

    pub fn back() -> Self {
        ActionRequest {
            kind: ActionKind::Back,
            target: None,
            text: None,
            direction: None,
            source: None,
        }
    }

    pub fn tap(api: &str) -> Self {
        Self::new(ActionKind::Tap, ElementRef::Api(api.to_string()))
    }

    pub fn long_tap(api: &str) -> Self {
        Self::new(ActionKind::LongTap, ElementRef::Api(api.to_string()))
    }

    pub fn set_text(api: &str, text: &str) -> Self {
        Self::new(ActionKind::SetText, ElementRef::Api(api.to_string())).with_text(text)
    }

    pub fn scroll(api: &str, direction: Direction) -> Self {
        Self::new(ActionKind::Scroll, ElementRef::Api(api.to_string())).with_direction(direction)
    }

    pub fn get_text(api: &str) -> Self {
        Self::new(ActionKind::GetText, ElementRef::Api(api.to_string()))
    }

    pub fn get_attributes(api: &str) -> Self {
        Self::new(ActionKind::GetAttributes, ElementRef::Api(api.to_string()))
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_source(mut self, source: Option<SourceLocation>) -> Self {
        self.source = source;
        self
    }

    pub fn target_name(&self) -> &str {
        self.target.as_ref().map_or("", ElementRef::name)
    }
}

/// What a completed request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Done,
    Text(Option<String>),
    Attributes(ElementAttributes),
    /// Scroll result: the screen did not change
    AtEnd(bool),
}
