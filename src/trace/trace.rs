use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::element::element_model::NodeId;
use crate::script::script_model::SourceLocation;

/// What a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// The requested primitive action itself
    Action,
    /// A sub-action issued while searching or navigating
    Navigate,
    /// Terminal failure of a request
    Failed,
}

/// Whether an action can change the whole screen or only part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectScope {
    Global,
    Local,
}

/// One line of the execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub timestamp_ms: u128,
    /// Assigned by the logger
    pub step: u64,

    pub kind: RecordKind,
    pub effect: EffectScope,

    /// Serialized tree the action was taken on
    pub state: String,
    pub target_id: Option<NodeId>,
    pub action: Option<String>,
    pub input: Option<String>,
    pub api_name: Option<String>,
    pub locator: Option<String>,
    pub skeleton: Option<String>,
    pub source: Option<SourceLocation>,
}

impl ExecutionRecord {
    pub fn now(kind: RecordKind, state: &str) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            step: 0,
            kind,
            effect: EffectScope::Global,
            state: state.to_string(),
            target_id: None,
            action: None,
            input: None,
            api_name: None,
            locator: None,
            skeleton: None,
            source: None,
        }
    }

    pub fn with_target(mut self, id: Option<NodeId>) -> Self {
        self.target_id = id;
        self
    }

    pub fn with_action(mut self, action: impl ToString) -> Self {
        self.action = Some(action.to_string());
        self
    }

    pub fn with_input(mut self, input: Option<&str>) -> Self {
        self.input = input.map(str::to_string);
        self
    }

    pub fn with_api(mut self, api_name: Option<&str>) -> Self {
        self.api_name = api_name.map(str::to_string);
        self
    }

    pub fn with_locator(mut self, locator: impl ToString) -> Self {
        self.locator = Some(locator.to_string());
        self
    }

    pub fn with_skeleton(mut self, skeleton: impl ToString) -> Self {
        self.skeleton = Some(skeleton.to_string());
        self
    }

    pub fn with_source(mut self, source: Option<&SourceLocation>) -> Self {
        self.source = source.cloned();
        self
    }

    pub fn with_effect(mut self, effect: EffectScope) -> Self {
        self.effect = effect;
        self
    }
}
