use serde::Serialize;

use crate::element::element_model::NodeId;
use crate::element::normalize::escape_markup;
use crate::locator::{Locator, evaluate};

use super::tree_model::{ElementTree, Node};

/// Attribute view returned by `get_attributes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementAttributes {
    pub id: NodeId,
    pub resource_id: Option<String>,
    pub class_name: Option<String>,
    pub text: Option<String>,
    pub content_description: Option<String>,
    pub bbox: Option<String>,
    pub checked: bool,
    pub scrollable: bool,
    pub editable: bool,
    pub clickable: bool,
    pub long_clickable: bool,
    pub checkable: bool,
}

impl ElementTree {
    /// First node matched by `locator`, or `None`.
    pub fn get_by_locator(&self, locator: &Locator) -> Option<&Node> {
        evaluate(self.document(), locator)
            .into_iter()
            .find_map(|idx| self.node_for_doc(idx))
    }

    /// First match of the first locator that matches anything.
    pub fn get_by_locators(&self, locators: &[Locator]) -> Option<&Node> {
        locators.iter().find_map(|l| self.get_by_locator(l))
    }

    /// Direct children of `id`, in order.
    pub fn children(&self, id: NodeId) -> Vec<&Node> {
        self.node(id)
            .map(|n| n.children.iter().filter_map(|c| self.node(*c)).collect())
            .unwrap_or_default()
    }

    /// Actionable leaves below `id`, ascending.
    pub fn leaves(&self, id: NodeId) -> Vec<&Node> {
        self.node(id)
            .map(|n| n.leaves.iter().filter_map(|l| self.node(*l)).collect())
            .unwrap_or_default()
    }

    /// `id` followed by all of its descendants in pre-order.
    pub fn preorder_from(&self, id: NodeId) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node(current) {
                out.push(node);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// First non-empty text in pre-order, then the first content
    /// description.
    pub fn get_text(&self, id: NodeId) -> Option<String> {
        let nodes = self.preorder_from(id);
        nodes
            .iter()
            .find_map(|n| n.element.text.clone())
            .or_else(|| nodes.iter().find_map(|n| n.element.content_description.clone()))
    }

    pub fn get_attributes(&self, id: NodeId) -> Option<ElementAttributes> {
        let node = self.node(id)?;
        let e = &node.element;
        Some(ElementAttributes {
            id,
            resource_id: node.resource_id().map(str::to_string),
            class_name: e.class_name.clone(),
            text: e.text.clone(),
            content_description: e.content_description.clone(),
            bbox: e.bbox_pixels.map(|b| b.to_string()),
            checked: e.is_checked || e.is_selected,
            scrollable: e.is_scrollable,
            editable: e.is_editable,
            clickable: e.is_clickable,
            long_clickable: e.is_long_clickable,
            checkable: e.is_checkable,
        })
    }

    /// Whether `value` equals the alt text, display text, text,
    /// resource id or class name of the node.
    pub fn is_match(&self, id: NodeId, value: &str) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let e = &node.element;
        [
            node.alt.as_deref(),
            node.content.as_deref(),
            e.text.as_deref(),
            node.resource_id(),
            e.class_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|candidate| candidate == value)
    }

    /// Text-free description of every node, used to tell whether a
    /// scroll revealed anything new.
    pub fn descriptions_without_text(&self) -> Vec<String> {
        self.nodes()
            .map(|n| {
                let e = &n.element;
                format!(
                    "{}|{}|{}|{}",
                    e.resource_name.as_deref().unwrap_or(""),
                    e.class_name.as_deref().unwrap_or(""),
                    e.content_description.as_deref().unwrap_or(""),
                    e.bbox_pixels.map(|b| b.to_string()).unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Node with the same resource id, class, content description and
    /// geometry as `like` (typically from an earlier observation).
    pub fn find_by_properties(&self, like: &Node) -> Option<&Node> {
        let target = &like.element;
        self.nodes().find(|n| {
            let e = &n.element;
            e.resource_name == target.resource_name
                && e.class_name == target.class_name
                && e.content_description == target.content_description
                && e.bbox_pixels == target.bbox_pixels
        })
    }

    /// Readable form without ids; wrappers that are not actionable are
    /// flattened into their children.
    pub fn render_visible(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root_id() {
            self.render_visible_node(root, 0, &mut out);
        }
        out
    }

    fn render_visible_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        if !self.is_valid(id) {
            for &child in &node.children {
                self.render_visible_node(child, depth, out);
            }
            return;
        }

        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&node.tag);
        if let Some(resource) = node.resource_id() {
            out.push_str(&format!(" resource_id='{}'", escape_markup(resource)));
        }
        if let Some(alt) = &node.alt {
            out.push_str(&format!(" alt='{}'", escape_markup(alt)));
        }
        if !node.status.is_empty() {
            out.push_str(&format!(" status='{}'", node.status.join(" ")));
        }
        out.push('>');
        if let Some(content) = &node.content {
            out.push_str(&escape_markup(content));
        }
        if node.children.is_empty() {
            out.push_str(&format!("</{}>\n", node.tag));
            return;
        }
        out.push('\n');
        for &child in &node.children {
            self.render_visible_node(child, depth + 1, out);
        }
        out.push_str(&format!("{}</{}>\n", indent, node.tag));
    }
}
