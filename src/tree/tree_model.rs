use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use tracing::debug;

use crate::element::classify::seeds_from_raw;
use crate::element::element_model::{ElementRole, NodeId, NodeSeed, RawScreen, UiElement};
use crate::element::normalize::short_resource_id;
use crate::markup::{DocIndex, Document};
use crate::skeleton::Skeleton;

/// One node of a built tree. Owned by its [`ElementTree`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub element: UiElement,

    pub tag: String,
    pub role: Option<ElementRole>,
    pub content: Option<String>,
    pub alt: Option<String>,
    pub status: Vec<String>,

    /// Dense index among the actionable nodes, in pre-order
    pub local_id: Option<usize>,
    /// Actionable leaves reachable from this node
    pub leaves: BTreeSet<NodeId>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Short resource identifier (last `/` segment).
    pub fn resource_id(&self) -> Option<&str> {
        self.element.resource_name.as_deref().map(short_resource_id)
    }

    fn to_seed(&self, children: Vec<NodeId>) -> NodeSeed {
        NodeSeed {
            children,
            element: self.element.clone(),
            tag: self.tag.clone(),
            role: self.role,
            content: self.content.clone(),
            alt: self.alt.clone(),
            status: self.status.clone(),
        }
    }
}

/// Immutable snapshot of one observed UI hierarchy.
///
/// Ids are canonical: the k-th node in pre-order carries the k-th
/// smallest original id among the nodes reachable from the root, so
/// the same raw input always yields the same tree regardless of the
/// order it was delivered in.
#[derive(Debug, Clone)]
pub struct ElementTree {
    nodes: BTreeMap<NodeId, Node>,
    root: Option<NodeId>,
    valid: BTreeSet<NodeId>,
    scrollable: Vec<NodeId>,
    document: Document,
    markup: String,
}

impl PartialEq for ElementTree {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
            && self.nodes == other.nodes
            && self.valid == other.valid
            && self.scrollable == other.scrollable
    }
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl ElementTree {
    pub fn empty() -> Self {
        ElementTree {
            nodes: BTreeMap::new(),
            root: None,
            valid: BTreeSet::new(),
            scrollable: Vec::new(),
            document: Document::new(),
            markup: String::new(),
        }
    }

    /// Build a tree from a raw observation.
    pub fn from_raw(screen: &RawScreen, screen_size: Option<(u32, u32)>) -> Self {
        let (seeds, valid, root) = seeds_from_raw(screen, screen_size);
        match root {
            Some(root) => Self::build(&seeds, &valid, root),
            None => Self::empty(),
        }
    }

    /// Build a canonical tree from `id -> seed`, the actionable ids and
    /// the root.
    ///
    /// Children missing from `seeds` are skipped, as are links back to
    /// already visited nodes. Subtrees that reach no actionable leaf are
    /// pruned; the root is always kept.
    pub fn build(seeds: &BTreeMap<NodeId, NodeSeed>, valid: &[NodeId], root: NodeId) -> Self {
        if !seeds.contains_key(&root) {
            debug!(root, "root id missing from observation");
            return Self::empty();
        }

        // (a) reachability, one parent per node
        let mut shape: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        let mut visited: HashSet<NodeId> = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            let mut kept = Vec::new();
            for &child in &seeds[&id].children {
                if seeds.contains_key(&child) && visited.insert(child) {
                    kept.push(child);
                    queue.push_back(child);
                }
            }
            shape.insert(id, kept);
        }

        // (b) pre-order over the reachable shape
        let mut order = Vec::with_capacity(shape.len());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(shape[&id].iter().rev());
        }

        // (c) canonical remap
        let mut ranked: Vec<NodeId> = order.clone();
        ranked.sort_unstable();
        let remap: BTreeMap<NodeId, NodeId> = order.iter().copied().zip(ranked).collect();

        let valid_set: BTreeSet<NodeId> = valid
            .iter()
            .filter_map(|v| remap.get(v).copied())
            .collect();

        let mut nodes: BTreeMap<NodeId, Node> = BTreeMap::new();
        for (&old, &new) in &remap {
            let seed = &seeds[&old];
            let children: Vec<NodeId> = shape[&old].iter().map(|c| remap[c]).collect();
            nodes.insert(
                new,
                Node {
                    id: new,
                    parent: None,
                    children,
                    element: seed.element.clone(),
                    tag: seed.tag.clone(),
                    role: seed.role,
                    content: seed.content.clone(),
                    alt: seed.alt.clone(),
                    status: seed.status.clone(),
                    local_id: None,
                    leaves: BTreeSet::new(),
                },
            );
        }
        let root = remap[&root];
        let preorder: Vec<NodeId> = order.iter().map(|o| remap[o]).collect();

        // (d) leaf sets bottom-up, dropping children that reach nothing
        for &id in preorder.iter().rev() {
            let children = nodes[&id].children.clone();
            let mut leaves = BTreeSet::new();
            let mut kept = Vec::new();
            for child in children {
                let child_leaves = &nodes[&child].leaves;
                if !child_leaves.is_empty() {
                    leaves.extend(child_leaves.iter().copied());
                    kept.push(child);
                }
            }
            if kept.is_empty() && valid_set.contains(&id) {
                leaves.insert(id);
            }
            if let Some(node) = nodes.get_mut(&id) {
                node.children = kept;
                node.leaves = leaves;
            }
        }

        // drop everything no longer linked from the root
        let mut retained = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            retained.push(id);
            stack.extend(nodes[&id].children.iter().rev());
        }
        let keep: HashSet<NodeId> = retained.iter().copied().collect();
        let before = nodes.len();
        nodes.retain(|id, _| keep.contains(id));

        for &id in &retained {
            for child in nodes[&id].children.clone() {
                if let Some(c) = nodes.get_mut(&child) {
                    c.parent = Some(id);
                }
            }
        }

        let valid: BTreeSet<NodeId> = valid_set.into_iter().filter(|v| keep.contains(v)).collect();

        // (d) scrollable containers among the actionable nodes
        let scrollable: Vec<NodeId> = valid
            .iter()
            .copied()
            .filter(|id| nodes[id].element.is_scrollable)
            .collect();

        let mut local = 0;
        for &id in &retained {
            if valid.contains(&id) {
                if let Some(node) = nodes.get_mut(&id) {
                    node.local_id = Some(local);
                }
                local += 1;
            }
        }

        debug!(
            reachable = before,
            retained = nodes.len(),
            valid = valid.len(),
            "built element tree"
        );

        let document = build_document(&nodes, root);
        let markup = document.render();
        ElementTree {
            nodes,
            root: Some(root),
            valid,
            scrollable,
            document,
            markup,
        }
    }

    /// New tree scoped to `id` and its descendants. Returns an empty tree
    /// for an unknown id.
    pub fn extract_subtree(&self, id: NodeId) -> ElementTree {
        if !self.nodes.contains_key(&id) {
            return Self::empty();
        }
        let mut seeds = BTreeMap::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let node = &self.nodes[&current];
            seeds.insert(current, node.to_seed(node.children.clone()));
            queue.extend(node.children.iter().copied());
        }
        let valid: Vec<NodeId> = self
            .valid
            .iter()
            .copied()
            .filter(|v| seeds.contains_key(v))
            .collect();
        Self::build(&seeds, &valid, id)
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.and_then(|r| self.nodes.get(&r))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// All nodes in ascending id order (which is pre-order).
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn valid_ids(&self) -> &BTreeSet<NodeId> {
        &self.valid
    }

    pub fn is_valid(&self, id: NodeId) -> bool {
        self.valid.contains(&id)
    }

    /// Scrollable actionable containers, ascending.
    pub fn scrollable_ids(&self) -> &[NodeId] {
        &self.scrollable
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Serialized document form, also used for change detection.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn skeleton(&self) -> Skeleton {
        Skeleton::from_document(&self.document)
    }

    /// Tree node behind a document element, via its `id` attribute.
    pub fn node_for_doc(&self, idx: DocIndex) -> Option<&Node> {
        self.document
            .attr(idx, "id")
            .and_then(|id| id.parse::<NodeId>().ok())
            .and_then(|id| self.nodes.get(&id))
    }
}

fn build_document(nodes: &BTreeMap<NodeId, Node>, root: NodeId) -> Document {
    let mut doc = Document::new();
    let mut stack: Vec<(NodeId, DocIndex)> = vec![(root, Document::DOCUMENT)];
    while let Some((id, parent)) = stack.pop() {
        let node = &nodes[&id];
        let mut attrs = vec![("id".to_string(), id.to_string())];
        if let Some(resource) = node.resource_id() {
            attrs.push(("resource_id".to_string(), resource.to_string()));
        }
        if let Some(alt) = &node.alt {
            attrs.push(("alt".to_string(), alt.clone()));
        }
        if !node.status.is_empty() {
            attrs.push(("status".to_string(), node.status.join(" ")));
        }
        let idx = doc.append(parent, &node.tag, attrs, node.content.clone());
        for &child in node.children.iter().rev() {
            stack.push((child, idx));
        }
    }
    doc
}
