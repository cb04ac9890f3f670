use crate::element::normalize::escape_markup;

/// Index of a node inside a [`Document`].
pub type DocIndex = usize;

/// One tagged element of the document form.
#[derive(Debug, Clone, PartialEq)]
pub struct DocNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<DocIndex>,
    pub parent: Option<DocIndex>,
}

impl DocNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Arena-backed tagged document.
///
/// Index 0 is the document node (it has no tag and is never matched by
/// a name test). Nodes are always appended in pre-order, so index order
/// is document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<DocNode>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub const DOCUMENT: DocIndex = 0;

    pub fn new() -> Self {
        Document {
            nodes: vec![DocNode {
                tag: String::new(),
                attrs: Vec::new(),
                text: None,
                children: Vec::new(),
                parent: None,
            }],
        }
    }

    /// Append a child under `parent`. Callers must append in pre-order.
    pub fn append(
        &mut self,
        parent: DocIndex,
        tag: &str,
        attrs: Vec<(String, String)>,
        text: Option<String>,
    ) -> DocIndex {
        let idx = self.nodes.len();
        self.nodes.push(DocNode {
            tag: tag.to_string(),
            attrs,
            text,
            children: Vec::new(),
            parent: Some(parent),
        });
        self.nodes[parent].children.push(idx);
        idx
    }

    /// Attach text to `idx`, joining separate chunks with a space.
    pub fn push_text(&mut self, idx: DocIndex, text: &str) {
        let node = &mut self.nodes[idx];
        match &mut node.text {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(text);
            }
            None => node.text = Some(text.to_string()),
        }
    }

    pub fn node(&self, idx: DocIndex) -> &DocNode {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn is_document(&self, idx: DocIndex) -> bool {
        idx == Self::DOCUMENT
    }

    /// The single top-level element, if any.
    pub fn root_element(&self) -> Option<DocIndex> {
        self.nodes[Self::DOCUMENT].children.first().copied()
    }

    pub fn attr(&self, idx: DocIndex, name: &str) -> Option<&str> {
        self.nodes[idx].attr(name)
    }

    /// All element indices below `idx` in document order.
    pub fn descendants(&self, idx: DocIndex) -> Vec<DocIndex> {
        let mut out = Vec::new();
        let mut stack: Vec<DocIndex> = self.nodes[idx].children.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.nodes[i].children.iter().rev());
        }
        out
    }

    /// Concatenated text of `idx` and its descendants.
    pub fn string_value(&self, idx: DocIndex) -> String {
        let mut out = String::new();
        if let Some(t) = &self.nodes[idx].text {
            out.push_str(t);
        }
        for d in self.descendants(idx) {
            if let Some(t) = &self.nodes[d].text {
                out.push_str(t);
            }
        }
        out
    }

    /// Indented text form: one element per line, leaves on a single line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for &child in &self.nodes[Self::DOCUMENT].children {
            self.render_node(child, 0, &mut out);
        }
        out
    }

    fn render_node(&self, idx: DocIndex, depth: usize, out: &mut String) {
        let node = &self.nodes[idx];
        let indent = "  ".repeat(depth);
        let tag = escape_markup(&node.tag);

        out.push_str(&indent);
        out.push('<');
        out.push_str(&tag);
        for (k, v) in &node.attrs {
            out.push_str(&format!(" {}='{}'", k, escape_markup(v)));
        }
        out.push('>');
        if let Some(text) = &node.text {
            out.push_str(&escape_markup(text));
        }

        if node.children.is_empty() {
            out.push_str(&format!("</{}>\n", tag));
            return;
        }

        out.push('\n');
        for &child in &node.children {
            self.render_node(child, depth + 1, out);
        }
        out.push_str(&format!("{}</{}>\n", indent, tag));
    }
}
