use crate::catalog::{DependentKind, Direction};
use crate::env::EnvAction;
use crate::tree::Node;

use super::engine_model::ActionKind;

/// Device action for `kind` on `node`, or the reason it is unsupported.
///
/// Taps and text entry go to the center of the pixel bounding box; text
/// entry additionally needs an editable node. Scrolls address the node
/// by its actionable index and need one.
pub fn convert_action(
    kind: ActionKind,
    node: &Node,
    text: Option<&str>,
    direction: Option<Direction>,
) -> Result<EnvAction, String> {
    let center = || {
        node.element
            .bbox_pixels
            .map(|b| b.center())
            .ok_or_else(|| "element has no bounding box".to_string())
    };

    match kind {
        ActionKind::Tap => {
            let (x, y) = center()?;
            Ok(EnvAction::Click { x, y })
        }
        ActionKind::LongTap => {
            let (x, y) = center()?;
            Ok(EnvAction::LongPress { x, y })
        }
        ActionKind::SetText => {
            if !node.element.is_editable {
                return Err("element is not editable".into());
            }
            let (x, y) = center()?;
            Ok(EnvAction::InputText {
                x,
                y,
                text: text.unwrap_or_default().to_string(),
            })
        }
        ActionKind::Scroll => {
            let index = node
                .local_id
                .ok_or_else(|| "element is not actionable".to_string())?;
            Ok(EnvAction::Scroll {
                index,
                direction: direction.unwrap_or(Direction::Down),
            })
        }
        ActionKind::GetText | ActionKind::GetAttributes | ActionKind::Back => {
            Err(format!("'{}' is not a device action on an element", kind))
        }
    }
}

/// Request kind and payload of a declared dependency step.
pub fn dependent_request(kind: &DependentKind) -> (ActionKind, Option<&str>, Option<Direction>) {
    match kind {
        DependentKind::Tap => (ActionKind::Tap, None, None),
        DependentKind::LongTap => (ActionKind::LongTap, None, None),
        DependentKind::SetText { text } => (ActionKind::SetText, Some(text.as_str()), None),
        DependentKind::Scroll { direction } => (ActionKind::Scroll, None, Some(*direction)),
        DependentKind::GetText => (ActionKind::GetText, None, None),
        DependentKind::GetAttributes => (ActionKind::GetAttributes, None, None),
        DependentKind::Back => (ActionKind::Back, None, None),
    }
}
