//! Node arena.
//!
//! Nodes live in a flat arena addressed by [`NodeId`]. Every document starts
//! with the skeleton `#document > html > (head, body)`; application code
//! builds below `head` and `body`.

use reprise_core::{DomException, EngineResult};
use serde::{Deserialize, Serialize};

/// Handle of a node inside one [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document itself
    Document,
    /// An element with a lower-case tag name
    Element {
        /// Tag name
        tag: String,
    },
    /// A text node
    Text {
        /// Character data
        data: String,
    },
}

/// One arena slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node kind
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Form value for input-like elements
    value: Option<String>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            value: None,
        }
    }
}

/// A document tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    html: NodeId,
    head: NodeId,
    body: NodeId,
}

impl Document {
    const ROOT: NodeId = NodeId(0);

    /// Create a document with the `html`/`head`/`body` skeleton
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Node::new(NodeKind::Document)],
            html: Self::ROOT,
            head: Self::ROOT,
            body: Self::ROOT,
        };
        doc.html = doc.attach_new(Self::ROOT, "html");
        doc.head = doc.attach_new(doc.html, "head");
        doc.body = doc.attach_new(doc.html, "body");
        doc
    }

    fn attach_new(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = Node::new(NodeKind::Element {
            tag: tag.to_string(),
        });
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// The document node
    #[must_use]
    pub const fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// The `html` element
    #[must_use]
    pub const fn html(&self) -> NodeId {
        self.html
    }

    /// The `head` element
    #[must_use]
    pub const fn head(&self) -> NodeId {
        self.head
    }

    /// The `body` element
    #[must_use]
    pub const fn body(&self) -> NodeId {
        self.body
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
        }));
        id
    }

    /// Create a detached text node
    pub fn create_text(&mut self, data: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(NodeKind::Text {
            data: data.to_string(),
        }));
        id
    }

    /// Whether `id` belongs to this document
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Look up a node
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_or_err(&self, id: NodeId) -> EngineResult<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| DomException::not_found_error(format!("{} does not exist", id)).into())
    }

    /// Parent of a node
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Children of a node in document order
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Child at `index`
    #[must_use]
    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    /// Position of a node among its parent's children
    #[must_use]
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Tag name of an element
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    /// Form value of an element
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.value.as_deref())
    }

    /// Set the form value of an element
    ///
    /// # Errors
    ///
    /// Returns error if the node does not exist
    pub fn set_value(&mut self, id: NodeId, value: Option<String>) -> EngineResult<()> {
        self.node_or_err(id)?;
        self.nodes[id.0].value = value;
        Ok(())
    }

    /// Whether `ancestor` is `id` or one of its ancestors
    #[must_use]
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Append `child` as the last child of `parent`, detaching it first
    ///
    /// # Errors
    ///
    /// Returns `HierarchyRequestError` if the insertion would create a cycle
    /// or move the document node
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> EngineResult<()> {
        self.node_or_err(parent)?;
        self.node_or_err(child)?;

        if child == Self::ROOT || self.is_inclusive_ancestor(child, parent) {
            return Err(DomException::hierarchy_request_error(format!(
                "cannot insert {} below {}",
                child, parent
            ))
            .into());
        }
        if matches!(self.nodes[parent.0].kind, NodeKind::Text { .. }) {
            return Err(DomException::hierarchy_request_error("text nodes have no children").into());
        }

        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Remove `child` from `parent`
    ///
    /// # Errors
    ///
    /// Returns `NotFoundError` if `child` is not a child of `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> EngineResult<()> {
        if self.parent(child) != Some(parent) {
            return Err(DomException::not_found_error(format!(
                "{} is not a child of {}",
                child, parent
            ))
            .into());
        }
        self.detach(child);
        Ok(())
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton() {
        let doc = Document::new();
        assert_eq!(doc.children(doc.root()), &[doc.html()]);
        assert_eq!(doc.children(doc.html()), &[doc.head(), doc.body()]);
        assert_eq!(doc.tag(doc.body()), Some("body"));
        assert_eq!(doc.parent(doc.root()), None);
    }

    #[test]
    fn test_append_and_move() {
        let mut doc = Document::new();
        let list = doc.create_element("UL");
        let item = doc.create_element("li");
        doc.append_child(doc.body(), list).unwrap();
        doc.append_child(list, item).unwrap();

        assert_eq!(doc.tag(list), Some("ul"));
        assert_eq!(doc.index_in_parent(item), Some(0));

        doc.append_child(doc.head(), item).unwrap();
        assert!(doc.children(list).is_empty());
        assert_eq!(doc.parent(item), Some(doc.head()));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();

        let err = doc.append_child(inner, outer).unwrap_err();
        assert_eq!(
            err.as_exception().map(|e| e.name.as_str()),
            Some("HierarchyRequestError")
        );
        let err = doc.append_child(outer, doc.root()).unwrap_err();
        assert!(err.as_exception().is_some());
    }

    #[test]
    fn test_remove_child() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.append_child(doc.body(), div).unwrap();
        doc.remove_child(doc.body(), div).unwrap();
        assert_eq!(doc.parent(div), None);
        assert!(doc.remove_child(doc.body(), div).is_err());
    }

    #[test]
    fn test_value() {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.set_value(input, Some("hello".to_string())).unwrap();
        assert_eq!(doc.value(input), Some("hello"));
        assert_eq!(doc.value(doc.body()), None);
    }
}
