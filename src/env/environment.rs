use serde::{Deserialize, Serialize};

use crate::catalog::Direction;
use crate::error::EnvError;
use crate::tree::{ElementTree, Node};

/// One observation of the device.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Encoded screenshot, when the driver provides one
    pub pixels: Option<Vec<u8>>,
    pub tree: ElementTree,
}

/// Low-level action understood by an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum EnvAction {
    Click { x: f64, y: f64 },
    LongPress { x: f64, y: f64 },
    InputText { x: f64, y: f64, text: String },
    /// Scroll the container with the given actionable index (`local_id`)
    Scroll { index: usize, direction: Direction },
    NavigateBack,
    OpenApp { app_name: String },
    Wait,
}

impl EnvAction {
    pub fn name(&self) -> &'static str {
        match self {
            EnvAction::Click { .. } => "click",
            EnvAction::LongPress { .. } => "long_press",
            EnvAction::InputText { .. } => "input_text",
            EnvAction::Scroll { .. } => "scroll",
            EnvAction::NavigateBack => "navigate_back",
            EnvAction::OpenApp { .. } => "open_app",
            EnvAction::Wait => "wait",
        }
    }
}

/// The device (or a stand-in for it).
///
/// Calls are blocking and never overlap: every action's precondition is
/// the state left by the previous one.
pub trait Environment {
    fn reset(&mut self, go_home: bool) -> Result<Snapshot, EnvError>;

    fn get_state(&mut self, wait_to_stabilize: bool) -> Result<Snapshot, EnvError>;

    fn execute_action(&mut self, target: Option<&Node>, action: &EnvAction) -> Result<(), EnvError>;

    /// Physical pixel size `(width, height)`.
    fn device_screen_size(&self) -> (u32, u32);

    /// Size the tree coordinates are expressed in.
    fn logical_screen_size(&self) -> (u32, u32);

    fn close(&mut self) -> Result<(), EnvError>;
}
