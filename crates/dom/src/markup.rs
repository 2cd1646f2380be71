//! Markup specs and HTML snippets
//!
//! `ElementSpec` is the serde shape used by session files and tests to
//! describe a subtree. `outer_html` renders the short snippets shown next
//! to violations.

use crate::{Document, NodeId, NodeKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative description of an element subtree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSpec {
    /// Tag name
    pub tag: String,

    /// `id` attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Other attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,

    /// Leading text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Child elements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    /// Create a spec for a bare element
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Set the `id` attribute
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set the text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add a child element
    pub fn with_child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

impl Document {
    /// Build a document whose `body` holds the given subtrees
    pub fn from_spec(body: &[ElementSpec]) -> Result<Self> {
        let mut doc = Self::new();
        if let Some(body_id) = doc.body() {
            for spec in body {
                doc.instantiate(body_id, spec)?;
            }
        }
        Ok(doc)
    }

    /// Create the subtree described by `spec` and append it under `parent`
    pub fn instantiate(&mut self, parent: NodeId, spec: &ElementSpec) -> Result<NodeId> {
        let node = self.create_element(&spec.tag);
        if let Some(id) = &spec.id {
            self.set_attribute(node, "id", id)?;
        }
        for (name, value) in &spec.attrs {
            self.set_attribute(node, name, value)?;
        }
        if let Some(text) = &spec.text {
            let text_node = self.create_text(text);
            self.append_child(node, text_node)?;
        }
        for child in &spec.children {
            self.instantiate(node, child)?;
        }
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Serialize `node` and its subtree as HTML
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            Some(NodeKind::Element) => {
                let name = self.node_name(node).unwrap_or_default();
                out.push('<');
                out.push_str(name);
                for (key, value) in self.attributes(node) {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    push_escaped(out, value, true);
                    out.push('"');
                }
                out.push('>');
                if is_void(name) {
                    return;
                }
                for &child in self.children(node) {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Some(NodeKind::Text) => push_escaped(out, self.text(node).unwrap_or_default(), false),
            Some(NodeKind::Document) => {
                for &child in self.children(node) {
                    self.write_html(child, out);
                }
            }
            None => {}
        }
    }
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "source" | "track" | "wbr"
    )
}

fn push_escaped(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
