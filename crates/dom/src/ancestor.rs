//! Common ancestor resolution
//!
//! Given the nodes touched since the last audit, find the deepest node
//! that contains all of them, so the audit only walks that subtree.

use crate::{Document, NodeId};
use tracing::trace;

/// What an audit pass should cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanScope {
    /// The whole document
    Document,
    /// The subtree rooted at this node
    Subtree(NodeId),
}

/// Path from the root element down to `node`, inclusive on both ends
///
/// Returns `None` when the parent chain never reaches an `html` element,
/// or reaches one that is not itself attached to a parent.
pub fn path_to(doc: &Document, node: NodeId) -> Option<Vec<NodeId>> {
    let mut path = vec![node];
    let mut current = node;

    while doc.node_name(current)? != "html" {
        current = doc.parent(current)?;
        path.push(current);
    }

    doc.parent(current)?;
    path.reverse();
    Some(path)
}

/// Deepest node that is an ancestor of (or equal to) every node in `nodes`
///
/// A single node resolves to itself. Nodes without a path (detached) are
/// skipped; when none has one, the document node is the fallback.
pub fn common_ancestor(doc: &Document, nodes: &[NodeId]) -> NodeId {
    if let [only] = nodes {
        return *only;
    }

    let mut paths = nodes.iter().rev().filter_map(|&n| path_to(doc, n));
    let Some(mut prefix) = paths.next() else {
        return NodeId::DOCUMENT;
    };

    for path in paths {
        let shared = prefix
            .iter()
            .zip(&path)
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(shared);
    }

    prefix.last().copied().unwrap_or(NodeId::DOCUMENT)
}

/// Resolve the scan scope for a set of pending nodes
///
/// Only nodes still connected to the document take part. Resolving to the
/// root element (or the document itself) widens the scope to the whole
/// document.
pub fn resolve_scope(doc: &Document, nodes: &[NodeId]) -> ScanScope {
    let connected: Vec<NodeId> = nodes
        .iter()
        .copied()
        .filter(|&n| doc.is_connected(n))
        .collect();

    let ancestor = common_ancestor(doc, &connected);
    trace!(
        candidates = nodes.len(),
        connected = connected.len(),
        %ancestor,
        "resolved common ancestor"
    );

    if ancestor == NodeId::DOCUMENT || doc.node_name(ancestor) == Some("html") {
        ScanScope::Document
    } else {
        ScanScope::Subtree(ancestor)
    }
}
