use std::collections::BTreeMap;

use tracing::debug;

use super::element_model::{
    BoundingBox, ElementRole, NodeId, NodeSeed, RawNode, RawScreen, UiElement,
};
use super::normalize::{display_text, text_or_none};

/// Convert one raw driver node into an element.
pub fn element_from_raw(node: &RawNode, screen_size: Option<(u32, u32)>) -> UiElement {
    let bbox_pixels = node.bound_box.map(|[[x_min, y_min], [x_max, y_max]]| BoundingBox {
        x_min,
        x_max,
        y_min,
        y_max,
    });
    let bbox = match (bbox_pixels, screen_size) {
        (Some(b), Some(size)) => b.normalized(size),
        _ => None,
    };

    UiElement {
        text: text_or_none(node.text.as_deref()),
        content_description: text_or_none(node.content_description.as_deref()),
        class_name: text_or_none(node.class_name.as_deref()),
        resource_name: text_or_none(node.resource_id.as_deref()),
        hint_text: text_or_none(node.hint_text.as_deref()),
        package_name: text_or_none(node.package_name.as_deref()),
        bbox_pixels,
        bbox,
        is_checked: node.is_checked.unwrap_or(false),
        is_checkable: node.is_checkable.unwrap_or(false),
        is_clickable: node.is_clickable.unwrap_or(false),
        is_editable: node.is_editable.unwrap_or(false),
        is_enabled: node.is_enabled.unwrap_or(true),
        is_focused: node.is_focused.unwrap_or(false),
        is_focusable: node.is_focusable.unwrap_or(false),
        is_long_clickable: node.is_long_clickable.unwrap_or(false),
        is_scrollable: node.is_scrollable.unwrap_or(false),
        is_selected: node.is_selected.unwrap_or(false),
        is_visible: node.is_visible.unwrap_or(true),
    }
}

/// A node is actionable unless it is invisible, or it is a plain
/// wrapper (has children, no content description, not scrollable).
pub fn is_actionable(element: &UiElement, has_children: bool) -> bool {
    if !element.is_visible {
        return false;
    }
    !(has_children && element.content_description.is_none() && !element.is_scrollable)
}

/// Seed for an actionable node: role tag, display text and status.
pub fn actionable_seed(children: Vec<NodeId>, element: UiElement) -> NodeSeed {
    let role = ElementRole::infer(&element);
    let mut status = Vec::new();
    if element.is_checked || element.is_selected {
        status.push("selected".to_string());
    }
    NodeSeed {
        children,
        tag: role.tag().to_string(),
        role: Some(role),
        content: display_text(element.text.as_deref()),
        alt: element.content_description.clone(),
        status,
        element,
    }
}

/// Classify a raw observation into tree seeds and the valid-id list.
///
/// Returns `(seeds, valid_ids, root_id)`; `root_id` is `None` for an
/// empty observation.
pub fn seeds_from_raw(
    screen: &RawScreen,
    screen_size: Option<(u32, u32)>,
) -> (BTreeMap<NodeId, NodeSeed>, Vec<NodeId>, Option<NodeId>) {
    let mut seeds = BTreeMap::new();
    let mut valid = Vec::new();

    for node in &screen.nodes {
        let element = element_from_raw(node, screen_size);
        let has_children = !node.child_ids.is_empty();

        let seed = if is_actionable(&element, has_children) {
            valid.push(node.id);
            actionable_seed(node.child_ids.clone(), element)
        } else {
            NodeSeed::container(node.child_ids.clone(), element)
        };
        seeds.insert(node.id, seed);
    }

    let root = screen.root_id.or_else(|| screen.nodes.first().map(|n| n.id));
    debug!(
        nodes = seeds.len(),
        valid = valid.len(),
        "classified raw observation"
    );
    (seeds, valid, root)
}
