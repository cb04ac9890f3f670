use serde::{Deserialize, Serialize};

/// Identifier of a node inside one observed tree.
pub type NodeId = usize;

/// Pixel (or normalized) rectangle of a UI node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        ((self.x_min + self.x_max) / 2.0, (self.y_min + self.y_max) / 2.0)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Scale pixel coordinates into `[0, 1]` relative to `(width, height)`.
    pub fn normalized(&self, screen: (u32, u32)) -> Option<BoundingBox> {
        let (w, h) = screen;
        if w == 0 || h == 0 {
            return None;
        }
        let (w, h) = (w as f64, h as f64);
        Some(BoundingBox {
            x_min: self.x_min / w,
            x_max: self.x_max / w,
            y_min: self.y_min / h,
            y_max: self.y_max / h,
        })
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.x_min, self.y_min, self.x_max, self.y_max
        )
    }
}

/// Immutable attributes of one observed UI node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiElement {
    pub text: Option<String>,
    pub content_description: Option<String>,
    pub class_name: Option<String>,
    pub resource_name: Option<String>,
    pub hint_text: Option<String>,
    pub package_name: Option<String>,

    /// Pixel geometry as reported by the device
    pub bbox_pixels: Option<BoundingBox>,
    /// Geometry relative to the screen size, when the size is known
    pub bbox: Option<BoundingBox>,

    pub is_checked: bool,
    pub is_checkable: bool,
    pub is_clickable: bool,
    pub is_editable: bool,
    pub is_enabled: bool,
    pub is_focused: bool,
    pub is_focusable: bool,
    pub is_long_clickable: bool,
    pub is_scrollable: bool,
    pub is_selected: bool,
    pub is_visible: bool,
}

/// Role tag of an actionable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementRole {
    Input,
    Checkbox,
    Button,
    Scrollbar,
    P,
}

impl ElementRole {
    pub fn tag(&self) -> &'static str {
        match self {
            ElementRole::Input => "input",
            ElementRole::Checkbox => "checkbox",
            ElementRole::Button => "button",
            ElementRole::Scrollbar => "scrollbar",
            ElementRole::P => "p",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "input" => Some(ElementRole::Input),
            "checkbox" => Some(ElementRole::Checkbox),
            "button" => Some(ElementRole::Button),
            "scrollbar" => Some(ElementRole::Scrollbar),
            "p" => Some(ElementRole::P),
            _ => None,
        }
    }

    /// Role implied by the capability flags of an element.
    pub fn infer(element: &UiElement) -> Self {
        if element.is_editable {
            ElementRole::Input
        } else if element.is_checkable {
            ElementRole::Checkbox
        } else if element.is_clickable || element.is_long_clickable {
            ElementRole::Button
        } else if element.is_scrollable {
            ElementRole::Scrollbar
        } else {
            ElementRole::P
        }
    }
}

/// Input of tree construction: one raw node before renumbering.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSeed {
    pub children: Vec<NodeId>,
    pub element: UiElement,

    /// Tag used in the serialized document
    pub tag: String,
    pub role: Option<ElementRole>,
    /// Truncated display text
    pub content: Option<String>,
    pub alt: Option<String>,
    pub status: Vec<String>,
}

impl NodeSeed {
    /// A non-actionable container seed; its tag comes from the class name.
    pub fn container(children: Vec<NodeId>, element: UiElement) -> Self {
        let tag = class_tag(element.class_name.as_deref());
        NodeSeed {
            children,
            element,
            tag,
            role: None,
            content: None,
            alt: None,
            status: Vec::new(),
        }
    }
}

/// Last dotted segment of a class name, or `div`.
pub fn class_tag(class_name: Option<&str>) -> String {
    class_name
        .and_then(|c| c.rsplit('.').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("div")
        .to_string()
}

/// Raw JSON node as delivered by a device driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: NodeId,
    #[serde(default)]
    pub child_ids: Vec<NodeId>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content_description: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    /// `[[x_min, y_min], [x_max, y_max]]`
    #[serde(default)]
    pub bound_box: Option<[[f64; 2]; 2]>,
    #[serde(default)]
    pub hint_text: Option<String>,
    #[serde(default)]
    pub is_checked: Option<bool>,
    #[serde(default)]
    pub is_checkable: Option<bool>,
    #[serde(default)]
    pub is_clickable: Option<bool>,
    #[serde(default)]
    pub is_editable: Option<bool>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub is_focused: Option<bool>,
    #[serde(default)]
    pub is_focusable: Option<bool>,
    #[serde(default)]
    pub is_long_clickable: Option<bool>,
    #[serde(default)]
    pub is_scrollable: Option<bool>,
    #[serde(default)]
    pub is_selected: Option<bool>,
    #[serde(default)]
    pub is_visible: Option<bool>,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
}

/// One raw observation of the main window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScreen {
    pub nodes: Vec<RawNode>,
    /// Defaults to the first node
    #[serde(default)]
    pub root_id: Option<NodeId>,
}
