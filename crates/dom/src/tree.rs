//! Arena-backed document tree
//!
//! Nodes live in a flat arena and refer to each other through `NodeId`.
//! Removed nodes keep their slot as a tombstone, so ids are never reused
//! and stale handles held by the watcher fail lookups instead of aliasing
//! a newer node.

use crate::{DomError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Document shared between the host (writer) and the audit runner (reader)
pub type SharedDocument = Arc<RwLock<Document>>;

/// Handle to a node in a [`Document`]
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The document node itself
    pub const DOCUMENT: NodeId = NodeId(0);

    /// Build a handle from its raw arena index
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw arena index
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Type of node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The document root (`#document`)
    Document,
    /// Element with a lowercase tag name
    Element,
    /// Text content (`#text`)
    Text,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    name: String,
    /// Most elements carry only a handful of attributes
    attrs: SmallVec<[(String, String); 4]>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    removed: bool,
}

impl NodeData {
    fn new(kind: NodeKind, name: String) -> Self {
        Self {
            kind,
            name,
            attrs: SmallVec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            removed: false,
        }
    }
}

/// A document tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with the standard `html` / `head` / `body` skeleton
    pub fn new() -> Self {
        let mut doc = Self::empty();
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.link(NodeId::DOCUMENT, html);
        doc.link(html, head);
        doc.link(html, body);
        doc
    }

    /// Create a document holding only the document node
    pub fn empty() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Document, "#document".to_string())],
        }
    }

    /// Wrap into a [`SharedDocument`]
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Element, tag.to_ascii_lowercase()))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let mut data = NodeData::new(NodeKind::Text, "#text".to_string());
        data.text = text.to_string();
        self.alloc(data)
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(data);
        id
    }

    fn data(&self, node: NodeId) -> Result<&NodeData> {
        match self.nodes.get(node.index()) {
            Some(data) if !data.removed => Ok(data),
            _ => Err(DomError::UnknownNode(node)),
        }
    }

    fn data_mut(&mut self, node: NodeId) -> Result<&mut NodeData> {
        match self.nodes.get_mut(node.index()) {
            Some(data) if !data.removed => Ok(data),
            _ => Err(DomError::UnknownNode(node)),
        }
    }

    /// Unchecked link used while building the skeleton
    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Append `child` as the last child of `parent`, moving it if attached elsewhere
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_kind = self.data(parent)?.kind;
        self.data(child)?;

        let hierarchy = DomError::Hierarchy { parent, child };
        if child == NodeId::DOCUMENT || parent_kind == NodeKind::Text {
            return Err(hierarchy);
        }
        // Inserting a node under itself or one of its descendants
        if parent == child || self.ancestors(parent).any(|a| a == child) {
            return Err(hierarchy);
        }

        self.detach(child)?;
        self.link(parent, child);
        Ok(())
    }

    /// Detach `node` (and its subtree) from its parent
    ///
    /// Detaching an already detached node is a no-op.
    pub fn detach(&mut self, node: NodeId) -> Result<()> {
        let parent = match self.data(node)?.parent {
            Some(parent) => parent,
            None => return Ok(()),
        };
        self.data_mut(parent)?.children.retain(|&c| c != node);
        self.data_mut(node)?.parent = None;
        Ok(())
    }

    /// Detach `node` and tombstone it together with its descendants
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        if node == NodeId::DOCUMENT {
            return Err(DomError::Hierarchy {
                parent: NodeId::DOCUMENT,
                child: node,
            });
        }
        self.detach(node)?;
        let doomed: Vec<NodeId> = self.descendants(node).collect();
        for id in doomed {
            self.nodes[id.index()].removed = true;
        }
        Ok(())
    }

    /// Check whether `node` names a live node
    pub fn contains(&self, node: NodeId) -> bool {
        self.data(node).is_ok()
    }

    /// Parent of `node`, if attached
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).ok().and_then(|d| d.parent)
    }

    /// Children of `node` in document order
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.data(node).map(|d| d.children.as_slice()).unwrap_or(&[])
    }

    /// Kind of `node`
    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.data(node).ok().map(|d| d.kind)
    }

    /// Node name: lowercase tag for elements, `#document` / `#text` otherwise
    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.data(node).ok().map(|d| d.name.as_str())
    }

    /// Text content of a text node
    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.data(node)
            .ok()
            .filter(|d| d.kind == NodeKind::Text)
            .map(|d| d.text.as_str())
    }

    /// Iterate over the parent chain of `node`, nearest first
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |&n| self.parent(n))
    }

    /// Iterate over `node` and its descendants in document order
    pub fn descendants(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = if self.contains(node) { vec![node] } else { Vec::new() };
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.children(next).iter().rev().copied());
            Some(next)
        })
    }

    /// Whether `node` is attached to this document
    pub fn is_connected(&self, node: NodeId) -> bool {
        if !self.contains(node) {
            return false;
        }
        node == NodeId::DOCUMENT || self.ancestors(node).any(|a| a == NodeId::DOCUMENT)
    }

    /// The root element (`html`)
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(NodeId::DOCUMENT)
            .iter()
            .copied()
            .find(|&c| self.kind(c) == Some(NodeKind::Element))
    }

    /// The `body` element
    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.children(html)
            .iter()
            .copied()
            .find(|&c| self.node_name(c) == Some("body"))
    }

    /// Set an attribute, replacing any previous value
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let data = self.data_mut(node)?;
        let name = name.to_ascii_lowercase();
        match data.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => data.attrs.push((name, value.to_string())),
        }
        Ok(())
    }

    /// Read an attribute
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.data(node)
            .ok()?
            .attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Attributes of `node` in insertion order
    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        self.data(node).map(|d| d.attrs.as_slice()).unwrap_or(&[])
    }

    /// First connected element with the given `id` attribute
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(NodeId::DOCUMENT)
            .find(|&n| self.attribute(n, "id") == Some(id))
    }

    /// First connected element matching a compound selector
    ///
    /// Supports `tag`, `#id`, `.class` and combinations such as
    /// `button#save.primary`. Anything richer (combinators, attribute
    /// or pseudo selectors) yields `None`.
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let compound = Compound::parse(selector.trim())?;
        self.descendants(NodeId::DOCUMENT)
            .filter(|&n| self.kind(n) == Some(NodeKind::Element))
            .find(|&n| compound.matches(self, n))
    }

    /// Number of live nodes, including the document node
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|d| !d.removed).count()
    }

    /// Whether the document holds nothing but the document node
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

/// Parsed `tag#id.class` selector
struct Compound<'a> {
    tag: Option<&'a str>,
    id: Option<&'a str>,
    classes: SmallVec<[&'a str; 4]>,
}

impl<'a> Compound<'a> {
    fn parse(selector: &'a str) -> Option<Self> {
        if selector.is_empty()
            || selector
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '>' | '+' | '~' | '[' | ':' | ',' | '*'))
        {
            return None;
        }

        let mut compound = Compound {
            tag: None,
            id: None,
            classes: SmallVec::new(),
        };

        let split = selector.find(['#', '.']).unwrap_or(selector.len());
        let (tag, mut rest) = selector.split_at(split);
        if !tag.is_empty() {
            compound.tag = Some(tag);
        }

        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let part = &body[..end];
            if part.is_empty() {
                return None;
            }
            match marker {
                '#' => compound.id = Some(part),
                _ => compound.classes.push(part),
            }
            rest = &body[end..];
        }

        Some(compound)
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if let Some(tag) = self.tag {
            if !doc.node_name(node).is_some_and(|n| n.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        if let Some(id) = self.id {
            if doc.attribute(node, "id") != Some(id) {
                return false;
            }
        }
        let class_attr = doc.attribute(node, "class").unwrap_or("");
        self.classes
            .iter()
            .all(|c| class_attr.split_whitespace().any(|have| have == *c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let main = doc.create_element("MAIN");
        let button = doc.create_element("button");
        doc.append_child(body, main).unwrap();
        doc.append_child(main, button).unwrap();
        (doc, body, main, button)
    }

    #[test]
    fn test_skeleton() {
        let doc = Document::new();
        let html = doc.document_element().unwrap();
        assert_eq!(doc.node_name(html), Some("html"));
        assert_eq!(doc.parent(html), Some(NodeId::DOCUMENT));
        assert_eq!(doc.node_name(doc.body().unwrap()), Some("body"));
        assert_eq!(doc.len(), 4);
    }

    #[test]
    fn test_tag_names_are_lowercased() {
        let (doc, _, main, _) = sample();
        assert_eq!(doc.node_name(main), Some("main"));
    }

    #[test]
    fn test_connected_and_detached() {
        let (mut doc, _, main, button) = sample();
        assert!(doc.is_connected(button));

        doc.detach(main).unwrap();
        assert!(!doc.is_connected(main));
        // Descendants of a detached subtree are detached too
        assert!(!doc.is_connected(button));
        assert_eq!(doc.parent(button), Some(main));
    }

    #[test]
    fn test_append_moves_node() {
        let (mut doc, body, main, button) = sample();
        doc.append_child(body, button).unwrap();
        assert_eq!(doc.parent(button), Some(body));
        assert!(doc.children(main).is_empty());
        assert_eq!(doc.children(body), &[main, button]);
    }

    #[test]
    fn test_append_rejects_cycles() {
        let (mut doc, _, main, button) = sample();
        assert_eq!(
            doc.append_child(button, main),
            Err(DomError::Hierarchy { parent: button, child: main })
        );
        assert!(doc.append_child(main, main).is_err());
        assert!(doc.append_child(main, NodeId::DOCUMENT).is_err());
    }

    #[test]
    fn test_remove_tombstones_subtree() {
        let (mut doc, _, main, button) = sample();
        doc.remove(main).unwrap();
        assert!(!doc.contains(main));
        assert!(!doc.contains(button));
        assert_eq!(doc.detach(button), Err(DomError::UnknownNode(button)));
        assert!(!doc.is_connected(button));
    }

    #[test]
    fn test_attributes_and_lookup() {
        let (mut doc, _, main, button) = sample();
        doc.set_attribute(main, "id", "app").unwrap();
        doc.set_attribute(button, "class", "btn primary").unwrap();
        doc.set_attribute(button, "ID", "save").unwrap();

        assert_eq!(doc.get_element_by_id("app"), Some(main));
        assert_eq!(doc.query_selector("#save"), Some(button));
        assert_eq!(doc.query_selector("button.primary"), Some(button));
        assert_eq!(doc.query_selector("main#app"), Some(main));
        assert_eq!(doc.query_selector("button#app"), None);
        assert_eq!(doc.query_selector("#app > button"), None);
    }

    #[test]
    fn test_detached_nodes_are_not_found() {
        let (mut doc, _, main, _) = sample();
        doc.set_attribute(main, "id", "app").unwrap();
        doc.detach(main).unwrap();
        assert_eq!(doc.get_element_by_id("app"), None);
    }

    #[test]
    fn test_descendants_document_order() {
        let (mut doc, body, main, button) = sample();
        let aside = doc.create_element("aside");
        doc.append_child(body, aside).unwrap();
        let order: Vec<_> = doc.descendants(body).collect();
        assert_eq!(order, vec![body, main, button, aside]);
    }
}
