//! Mutation records and observer registrations.

use crate::document::NodeId;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    CharacterData,
    Attributes,
}

/// A single DOM change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    /// Node whose children, data, or attributes changed.
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    /// Attribute name for [`MutationKind::Attributes`].
    pub attribute: Option<String>,
}

/// Observer handle returned by [`Document::observe`](crate::Document::observe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) usize);

/// Which mutations an observer wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub character_data: bool,
    pub attributes: bool,
    /// Also watch every descendant of the target.
    pub subtree: bool,
}

impl ObserveOptions {
    /// Text and structure changes anywhere inside the target.
    pub fn content() -> Self {
        Self {
            child_list: true,
            character_data: true,
            attributes: false,
            subtree: true,
        }
    }

    /// Node insertions and removals anywhere inside the target.
    pub fn insertions() -> Self {
        Self {
            child_list: true,
            character_data: false,
            attributes: false,
            subtree: true,
        }
    }

    pub(crate) fn accepts(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::ChildList => self.child_list,
            MutationKind::CharacterData => self.character_data,
            MutationKind::Attributes => self.attributes,
        }
    }
}

/// Records batched for one observer since the last delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub observer: ObserverId,
    /// The observed node.
    pub target: NodeId,
    pub records: Vec<MutationRecord>,
}

impl Notification {
    /// Nodes added by any record in this batch, in record order.
    pub fn added_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.records.iter().flat_map(|record| record.added.iter().copied())
    }
}
