use crate::element::normalize::text_fingerprint;
use crate::markup::{DocIndex, Document, MarkupError, parse};

/// Attribute kept in a skeleton; everything else is stripped.
pub const SKELETON_ATTR: &str = "resource_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonNode {
    pub tag: String,
    pub resource_id: Option<String>,
    pub children: Vec<SkeletonNode>,
}

impl SkeletonNode {
    fn count(&self) -> usize {
        1 + self.children.iter().map(SkeletonNode::count).sum::<usize>()
    }

    fn same_kind(&self, other: &SkeletonNode) -> bool {
        self.tag == other.tag && self.resource_id == other.resource_id
    }
}

/// Structural fingerprint of a tree: tags and resource ids only, with
/// runs of consecutive siblings of the same kind collapsed into the
/// first of them. Equality is exact and positional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skeleton {
    root: Option<SkeletonNode>,
}

impl Skeleton {
    pub fn from_document(doc: &Document) -> Self {
        let root = doc.root_element().map(|r| collapse(strip(doc, r)));
        Skeleton { root }
    }

    /// Parse a stored skeleton or any document string.
    pub fn from_markup(markup: &str) -> Result<Self, MarkupError> {
        Ok(Self::from_document(&parse(markup)?))
    }

    pub fn root(&self) -> Option<&SkeletonNode> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of nodes. Only meaningful relative to other counts.
    pub fn count(&self) -> usize {
        self.root.as_ref().map_or(0, SkeletonNode::count)
    }

    /// Structure shared by both skeletons, compared position by position.
    pub fn common(&self, other: &Skeleton) -> Skeleton {
        let root = match (&self.root, &other.root) {
            (Some(a), Some(b)) => common_node(a, b),
            _ => None,
        };
        Skeleton { root }
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if let Some(root) = &self.root {
            append_node(&mut doc, Document::DOCUMENT, root);
        }
        doc
    }

    pub fn render(&self) -> String {
        self.to_document().render()
    }

    /// Hex digest of the rendered form, for exact-match indexing.
    pub fn fingerprint(&self) -> String {
        text_fingerprint(&self.render())
    }
}

fn strip(doc: &Document, idx: DocIndex) -> SkeletonNode {
    let node = doc.node(idx);
    SkeletonNode {
        tag: node.tag.clone(),
        resource_id: node.attr(SKELETON_ATTR).map(str::to_string),
        children: node.children.iter().map(|&c| strip(doc, c)).collect(),
    }
}

fn collapse(mut node: SkeletonNode) -> SkeletonNode {
    let mut kept: Vec<SkeletonNode> = Vec::with_capacity(node.children.len());
    for child in node.children.drain(..) {
        if kept.last().is_some_and(|prev| prev.same_kind(&child)) {
            continue;
        }
        kept.push(child);
    }
    node.children = kept.into_iter().map(collapse).collect();
    node
}

fn common_node(a: &SkeletonNode, b: &SkeletonNode) -> Option<SkeletonNode> {
    if a.tag != b.tag {
        return None;
    }
    let resource_id = if a.resource_id == b.resource_id {
        a.resource_id.clone()
    } else {
        None
    };
    let children = a
        .children
        .iter()
        .zip(&b.children)
        .filter_map(|(x, y)| common_node(x, y))
        .collect();
    Some(SkeletonNode {
        tag: a.tag.clone(),
        resource_id,
        children,
    })
}

fn append_node(doc: &mut Document, parent: DocIndex, node: &SkeletonNode) {
    let attrs = node
        .resource_id
        .iter()
        .map(|r| (SKELETON_ATTR.to_string(), r.clone()))
        .collect();
    let idx = doc.append(parent, &node.tag, attrs, None);
    for child in &node.children {
        append_node(doc, idx, child);
    }
}
