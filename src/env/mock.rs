use tracing::debug;

use crate::element::element_model::{ElementRole, NodeId, RawNode, RawScreen};
use crate::error::EnvError;
use crate::markup::{DocIndex, Document, parse};
use crate::tree::{ElementTree, Node};

use super::environment::{EnvAction, Environment, Snapshot};

pub const MOCK_SCREEN_SIZE: (u32, u32) = (1080, 2400);

/// Height of the default row given to fixture nodes without `bounds`.
const ROW_HEIGHT: f64 = 40.0;

/// Move to `to` when `action` hits `target` while showing `from`.
/// A `None` target matches any target.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: usize,
    pub action: &'static str,
    pub target: Option<NodeId>,
    pub to: usize,
}

impl Transition {
    pub fn new(from: usize, action: &'static str, target: Option<NodeId>, to: usize) -> Self {
        Transition {
            from,
            action,
            target,
            to,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedAction {
    pub state: usize,
    pub target: Option<NodeId>,
    pub action: EnvAction,
}

/// Scripted in-process environment over a fixed list of screens.
///
/// Without transitions every screen-changing action advances to the
/// next screen (staying on the last one).
#[derive(Debug, Clone)]
pub struct MockEnv {
    states: Vec<ElementTree>,
    transitions: Vec<Transition>,
    current: usize,
    history: Vec<ExecutedAction>,
    observations: usize,
    closed: bool,
}

impl MockEnv {
    pub fn new(states: Vec<ElementTree>) -> Self {
        MockEnv {
            states,
            transitions: Vec::new(),
            current: 0,
            history: Vec::new(),
            observations: 0,
            closed: false,
        }
    }

    /// Build screens from fixture views (see [`parse_view`]).
    pub fn from_views(views: &[&str]) -> Result<Self, EnvError> {
        let states = views
            .iter()
            .map(|v| parse_view(v).map(|raw| ElementTree::from_raw(&raw, Some(MOCK_SCREEN_SIZE))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(states))
    }

    pub fn with_transitions(mut self, transitions: Vec<Transition>) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn current_state(&self) -> usize {
        self.current
    }

    pub fn history(&self) -> &[ExecutedAction] {
        &self.history
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn snapshot(&mut self) -> Result<Snapshot, EnvError> {
        let tree = self
            .states
            .get(self.current)
            .cloned()
            .ok_or_else(|| EnvError::Observation("mock environment has no screens".into()))?;
        self.observations += 1;
        Ok(Snapshot { pixels: None, tree })
    }
}

impl Environment for MockEnv {
    fn reset(&mut self, _go_home: bool) -> Result<Snapshot, EnvError> {
        self.current = 0;
        self.snapshot()
    }

    fn get_state(&mut self, _wait_to_stabilize: bool) -> Result<Snapshot, EnvError> {
        self.snapshot()
    }

    fn execute_action(&mut self, target: Option<&Node>, action: &EnvAction) -> Result<(), EnvError> {
        let target_id = target.map(|n| n.id);
        self.history.push(ExecutedAction {
            state: self.current,
            target: target_id,
            action: action.clone(),
        });

        if matches!(action, EnvAction::Wait) {
            return Ok(());
        }

        let next = if self.transitions.is_empty() {
            Some((self.current + 1).min(self.states.len().saturating_sub(1)))
        } else {
            self.transitions
                .iter()
                .find(|t| {
                    t.from == self.current
                        && t.action == action.name()
                        && (t.target.is_none() || t.target == target_id)
                })
                .map(|t| t.to)
        };

        if let Some(next) = next {
            debug!(from = self.current, to = next, action = action.name(), "mock transition");
            self.current = next;
        }
        Ok(())
    }

    fn device_screen_size(&self) -> (u32, u32) {
        MOCK_SCREEN_SIZE
    }

    fn logical_screen_size(&self) -> (u32, u32) {
        MOCK_SCREEN_SIZE
    }

    fn close(&mut self) -> Result<(), EnvError> {
        self.closed = true;
        Ok(())
    }
}

/// Parse a fixture view into a raw observation.
///
/// Every element needs an `id`. Tags imply capability flags (`input`,
/// `checkbox`, `button`, `scrollbar`); other tags are plain. Recognized
/// attributes: `resource_id`, `alt`, `status='selected'`, `hidden`,
/// `bounds='x1,y1,x2,y2'`. Element text becomes the node text.
pub fn parse_view(markup: &str) -> Result<RawScreen, EnvError> {
    let doc = parse(markup).map_err(|e| EnvError::Observation(e.to_string()))?;
    let root = doc
        .root_element()
        .ok_or_else(|| EnvError::Observation("fixture view has no root element".into()))?;

    let mut nodes = Vec::new();
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        nodes.push(raw_node(&doc, idx)?);
        stack.extend(doc.node(idx).children.iter().rev());
    }
    let root_id = nodes.first().map(|n| n.id);
    Ok(RawScreen { nodes, root_id })
}

fn node_id(doc: &Document, idx: DocIndex) -> Result<NodeId, EnvError> {
    let node = doc.node(idx);
    node.attr("id")
        .ok_or_else(|| EnvError::Observation(format!("<{}> has no id", node.tag)))?
        .parse()
        .map_err(|_| EnvError::Observation(format!("<{}> has a non-numeric id", node.tag)))
}

fn raw_node(doc: &Document, idx: DocIndex) -> Result<RawNode, EnvError> {
    let node = doc.node(idx);
    let id = node_id(doc, idx)?;
    let child_ids = node
        .children
        .iter()
        .map(|&c| node_id(doc, c))
        .collect::<Result<Vec<_>, _>>()?;

    let role = ElementRole::from_tag(&node.tag);
    let selected = node
        .attr("status")
        .is_some_and(|s| s.split_whitespace().any(|w| w == "selected"));
    let bound_box = match node.attr("bounds") {
        Some(b) => Some(parse_bounds(b)?),
        None => {
            let top = id as f64 * ROW_HEIGHT;
            Some([[0.0, top], [MOCK_SCREEN_SIZE.0 as f64, top + ROW_HEIGHT]])
        }
    };

    Ok(RawNode {
        id,
        child_ids,
        text: node.text.clone(),
        content_description: node.attr("alt").map(str::to_string),
        class_name: Some(node.tag.clone()),
        bound_box,
        resource_id: node.attr("resource_id").map(str::to_string),
        is_editable: Some(role == Some(ElementRole::Input)),
        is_checkable: Some(role == Some(ElementRole::Checkbox)),
        is_clickable: Some(role == Some(ElementRole::Button)),
        is_long_clickable: Some(role == Some(ElementRole::Button)),
        is_scrollable: Some(role == Some(ElementRole::Scrollbar)),
        is_checked: Some(selected),
        is_selected: Some(selected),
        is_visible: Some(node.attr("hidden").is_none()),
        is_enabled: Some(true),
        ..RawNode::default()
    })
}

fn parse_bounds(raw: &str) -> Result<[[f64; 2]; 2], EnvError> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| EnvError::Observation(format!("bad bounds '{}'", raw)))?;
    match values.as_slice() {
        [x1, y1, x2, y2] => Ok([[*x1, *y1], [*x2, *y2]]),
        _ => Err(EnvError::Observation(format!("bad bounds '{}'", raw))),
    }
}
