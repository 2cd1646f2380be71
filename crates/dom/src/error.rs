//! Document errors

use crate::NodeId;
use thiserror::Error;

/// Errors raised by document mutations and lookups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// The handle does not name a live node in this document
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The mutation would break the tree shape
    #[error("hierarchy request error: cannot insert {child:?} into {parent:?}")]
    Hierarchy { parent: NodeId, child: NodeId },
}
