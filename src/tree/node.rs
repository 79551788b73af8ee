//! Field node representation
//!
//! Uses NodeId (u32) for compact, stable field references.

use super::status::FieldStatus;
use crate::spatial::SpatialValue;

/// Compact field identifier (index into arena)
pub type NodeId = u32;

/// One field of the document's data tree
#[derive(Debug, Clone)]
pub struct AttributeNode {
    /// Field name, used by path resolution
    pub name: String,
    /// Current value
    pub(crate) value: SpatialValue,
    /// Parent field (None for top-level fields)
    pub(crate) parent: Option<NodeId>,
    /// Children, sorted by order key
    pub(crate) children: Vec<NodeId>,
    /// Opaque sibling ordering key
    pub(crate) order_key: String,
    pub(crate) status: FieldStatus,
    /// Set while this field's change notification is being delivered
    pub(crate) notifying: bool,
}

impl AttributeNode {
    /// Create a new field with no children
    pub fn new(
        name: impl Into<String>,
        order_key: impl Into<String>,
        value: SpatialValue,
        parent: Option<NodeId>,
    ) -> Self {
        AttributeNode {
            name: name.into(),
            value,
            parent,
            children: Vec::new(),
            order_key: order_key.into(),
            status: FieldStatus::default(),
            notifying: false,
        }
    }

    #[inline]
    pub fn value(&self) -> &SpatialValue {
        &self.value
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn order_key(&self) -> &str {
        &self.order_key
    }

    #[inline]
    pub fn status(&self) -> &FieldStatus {
        &self.status
    }
}
