//! Live document tree.
//!
//! The tree is a `scraper::Html` parsed by html5ever and edited in place
//! through its `ego_tree` arena; this type adds the mutation-observer
//! bookkeeping a page script would see.
//!
//! Nodes are never freed. A removed node is detached from its parent and
//! stays addressable by its [`NodeId`], the way a script can keep a reference
//! to an element after it leaves the page. `ego_tree` has no way to release a
//! slot, so every node a document ever held counts towards
//! [`Document::node_count`] until the document is dropped. Callers that
//! rewrite the same element repeatedly should skip writes that would not
//! change it (see [`Document::normalize_fragment`]).

use ego_tree::NodeRef;
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, QualName, namespace_url, ns};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node};

use crate::mutation::{MutationKind, MutationRecord, Notification, ObserveOptions, ObserverId};
use crate::selector::Selector;
use crate::serialize;

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(ego_tree::NodeId);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// DOM operation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The node is not an element.
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    /// Sibling insertion on a node without a parent.
    #[error("node {0} has no parent")]
    Detached(NodeId),

    /// The insertion would make a node its own ancestor.
    #[error("node {child} cannot be inserted under {parent}")]
    Hierarchy { parent: NodeId, child: NodeId },
}

/// Insertion point relative to an element, as in `insertAdjacentHTML`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    BeforeBegin,
    AfterBegin,
    BeforeEnd,
    AfterEnd,
}

#[derive(Debug, Clone)]
struct Registration {
    target: NodeId,
    options: ObserveOptions,
    active: bool,
}

/// A live document.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
    observers: Vec<Registration>,
    pending: Vec<(ObserverId, MutationRecord)>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document (a lone document node).
    pub fn new() -> Self {
        Self::from_html(Html::new_document())
    }

    /// Parse a full HTML document.
    pub fn parse(html: &str) -> Self {
        Self::from_html(Html::parse_document(html))
    }

    fn from_html(html: Html) -> Self {
        Self {
            html,
            observers: Vec::new(),
            pending: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Tree access
    // -----------------------------------------------------------------------

    fn get(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.html.tree.get(id.0)
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(self.html.tree.root().id())
    }

    /// The root element (`<html>`), if any.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .into_iter()
            .find(|id| self.element(*id).is_some())
    }

    /// Node payload.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.get(id).map(|node| node.value())
    }

    /// Element payload, or `None` for non-element nodes.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node(id).and_then(Node::as_element)
    }

    pub(crate) fn element_ref(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.get(id).and_then(ElementRef::wrap)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent().map(|node| NodeId(node.id()))
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id)
            .map(|node| node.children().map(|child| NodeId(child.id())).collect())
            .unwrap_or_default()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.next_sibling().map(|node| NodeId(node.id()))
    }

    /// Proper ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.get(id)
            .into_iter()
            .flat_map(|node| node.ancestors())
            .map(|node| NodeId(node.id()))
    }

    /// Descendants in document (pre-)order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id)
            .map(|node| node.descendants().skip(1).map(|d| NodeId(d.id())).collect())
            .unwrap_or_default()
    }

    /// Whether `node` is `ancestor` or lies inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether the node is attached to this document's tree.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root(), id)
    }

    /// Nodes allocated over the document's lifetime, detached ones included.
    pub fn node_count(&self) -> usize {
        self.html.tree.nodes().count()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn matching<'a>(
        &'a self,
        scope: NodeId,
        selector: &'a Selector,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.get(scope)
            .into_iter()
            .flat_map(|node| node.descendants().skip(1))
            .filter_map(ElementRef::wrap)
            .filter(|element| selector.matches_element(element))
            .map(|element| NodeId(element.id()))
    }

    /// Elements under `scope` (exclusive) matching `selector`, in document order.
    pub fn select(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.matching(scope, selector).collect()
    }

    /// Elements in the whole document matching `selector`.
    pub fn select_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.select(self.root(), selector)
    }

    /// First element in the document matching `selector`.
    pub fn select_first(&self, selector: &Selector) -> Option<NodeId> {
        self.matching(self.root(), selector).next()
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        selector.matches(self, id)
    }

    /// `id` or its nearest ancestor matching `selector`.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|candidate| selector.matches(self, *candidate))
    }

    /// First connected element whose `id` attribute equals `value`.
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        if value.is_empty() {
            return None;
        }
        self.html
            .tree
            .root()
            .descendants()
            .find(|node| node.value().as_element().and_then(Element::id) == Some(value))
            .map(|node| NodeId(node.id()))
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|element| element.attr(name))
    }

    /// Concatenated text of all descendant text nodes; `<br>` reads as a newline.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        let Some(node) = self.get(id) else {
            return text;
        };
        for node in node.descendants() {
            match node.value() {
                Node::Text(value) => text.push_str(value),
                Node::Element(element) if element.name() == "br" => text.push('\n'),
                _ => {}
            }
        }
        text
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Serialized children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        self.get(id).map(serialize::inner_html).unwrap_or_default()
    }

    /// Serialized node including itself.
    pub fn outer_html(&self, id: NodeId) -> String {
        self.get(id).map(serialize::outer_html).unwrap_or_default()
    }

    /// Serialized document.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    /// `html` as [`Document::inner_html`] would report it after
    /// [`Document::set_inner_html`]. Equal strings mean the write would leave
    /// the element's content unchanged.
    pub fn normalize_fragment(html: &str) -> String {
        serialize::normalize_fragment(html)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    fn orphan(&mut self, node: Node) -> NodeId {
        NodeId(self.html.tree.orphan(node).id())
    }

    /// Create a detached HTML element.
    pub fn create_element<K, V>(&mut self, name: &str, attrs: impl IntoIterator<Item = (K, V)>) -> NodeId
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let attrs = attrs
            .into_iter()
            .map(|(name, value)| html_attribute(name.as_ref(), value.as_ref()))
            .collect();
        let name = QualName::new(None, ns!(html), LocalName::from(name.to_ascii_lowercase().as_str()));
        self.orphan(Node::Element(Element::new(name, attrs)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.orphan(Node::Text(Text {
            text: StrTendril::from_slice(text),
        }))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let name = name.to_ascii_lowercase();
        let Some(element) = self.element(id).cloned() else {
            return Err(DomError::NotAnElement(id));
        };

        let mut attrs: Vec<Attribute> = element
            .attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        match attrs
            .iter_mut()
            .find(|attr| attr.name.ns == ns!() && *attr.name.local == *name)
        {
            Some(attr) => attr.value = StrTendril::from_slice(value),
            None => attrs.push(html_attribute(&name, value)),
        }
        // Rebuilt rather than edited so scraper's cached id and class lists follow.
        let rebuilt = Element::new(element.name.clone(), attrs);
        if let Some(mut node) = self.html.tree.get_mut(id.0) {
            *node.value() = Node::Element(rebuilt);
        }

        self.record(MutationRecord {
            kind: MutationKind::Attributes,
            target: id,
            added: Vec::new(),
            removed: Vec::new(),
            attribute: Some(name),
        });
        Ok(())
    }

    /// Replace the data of a text or comment node.
    pub fn set_data(&mut self, id: NodeId, data: &str) {
        let Some(mut node) = self.html.tree.get_mut(id.0) else {
            return;
        };
        match node.value() {
            Node::Text(text) => text.text = StrTendril::from_slice(data),
            Node::Comment(comment) => comment.comment = StrTendril::from_slice(data),
            _ => return,
        }
        self.record(MutationRecord {
            kind: MutationKind::CharacterData,
            target: id,
            added: Vec::new(),
            removed: Vec::new(),
            attribute: None,
        });
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        let removed = self.detach_children(id);
        let mut added = Vec::new();
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_raw(id, node);
            added.push(node);
        }
        self.record_child_list(id, added, removed);
    }

    /// Insert `child` under `parent` before `reference` (or at the end).
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if self.contains(child, parent) {
            return Err(DomError::Hierarchy { parent, child });
        }
        match reference.filter(|r| *r != child && self.parent(*r) == Some(parent)) {
            Some(reference) => {
                if let Some(mut node) = self.html.tree.get_mut(reference.0) {
                    node.insert_id_before(child.0);
                }
            }
            None => self.append_raw(parent, child),
        }
        self.record_child_list(parent, vec![child], Vec::new());
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `node` as the next sibling of `anchor`.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> Result<(), DomError> {
        let parent = self.parent(anchor).ok_or(DomError::Detached(anchor))?;
        let next = self.next_sibling(anchor);
        self.insert_before(parent, node, next)
    }

    /// Parse `html` as a fragment and insert it relative to `id`.
    ///
    /// Returns the inserted top-level nodes.
    pub fn insert_adjacent_html(
        &mut self,
        id: NodeId,
        position: Position,
        html: &str,
    ) -> Result<Vec<NodeId>, DomError> {
        if self.element(id).is_none() {
            return Err(DomError::NotAnElement(id));
        }
        let (parent, reference) = match position {
            Position::BeforeBegin => (self.parent(id).ok_or(DomError::Detached(id))?, Some(id)),
            Position::AfterBegin => (id, self.children(id).first().copied()),
            Position::BeforeEnd => (id, None),
            Position::AfterEnd => (
                self.parent(id).ok_or(DomError::Detached(id))?,
                self.next_sibling(id),
            ),
        };

        let nodes = self.import_fragment(html);
        for node in &nodes {
            match reference {
                Some(reference) => {
                    if let Some(mut anchor) = self.html.tree.get_mut(reference.0) {
                        anchor.insert_id_before(node.0);
                    }
                }
                None => self.append_raw(parent, *node),
            }
        }
        self.record_child_list(parent, nodes.clone(), Vec::new());
        Ok(nodes)
    }

    /// Replace the children of `id` with the parsed `html`.
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) -> Result<Vec<NodeId>, DomError> {
        if self.element(id).is_none() {
            return Err(DomError::NotAnElement(id));
        }
        let removed = self.detach_children(id);
        let nodes = self.import_fragment(html);
        for node in &nodes {
            self.append_raw(id, *node);
        }
        self.record_child_list(id, nodes.clone(), removed);
        Ok(nodes)
    }

    /// Detach `id` from its parent. A detached node is a no-op.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(mut node) = self.html.tree.get_mut(id.0) {
            node.detach();
        }
        self.record_child_list(parent, Vec::new(), vec![id]);
    }

    /// Parse `html` in body context into this tree; returns the detached
    /// top-level nodes.
    fn import_fragment(&mut self, html: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(html);
        let root = self.html.tree.extend_tree(fragment.tree).id();

        // html5ever wraps fragment content in a synthetic <html> element.
        let Some(wrapper) = self.html.tree.get(root).and_then(|node| node.first_child()) else {
            return Vec::new();
        };
        let nodes: Vec<NodeId> = wrapper.children().map(|node| NodeId(node.id())).collect();
        for node in &nodes {
            if let Some(mut node) = self.html.tree.get_mut(node.0) {
                node.detach();
            }
        }
        nodes
    }

    /// Append without recording a mutation.
    fn append_raw(&mut self, parent: NodeId, child: NodeId) {
        if let Some(mut node) = self.html.tree.get_mut(parent.0) {
            node.append_id(child.0);
        }
    }

    fn detach_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let removed = self.children(id);
        for child in &removed {
            if let Some(mut node) = self.html.tree.get_mut(child.0) {
                node.detach();
            }
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    /// Register interest in mutations at or below `target`.
    pub fn observe(&mut self, target: NodeId, options: ObserveOptions) -> ObserverId {
        self.observers.push(Registration {
            target,
            options,
            active: true,
        });
        ObserverId(self.observers.len() - 1)
    }

    /// Stop delivering records to `observer`; queued records are dropped.
    pub fn disconnect(&mut self, observer: ObserverId) {
        if let Some(registration) = self.observers.get_mut(observer.0) {
            registration.active = false;
        }
        self.pending.retain(|(id, _)| *id != observer);
    }

    /// Whether any observer has records waiting.
    pub fn has_pending_records(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain queued records, grouped into one notification per observer in
    /// registration order.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|(observer, _)| *observer);

        let mut notifications: Vec<Notification> = Vec::new();
        for (observer, record) in pending {
            match notifications.last_mut() {
                Some(last) if last.observer == observer => last.records.push(record),
                _ => notifications.push(Notification {
                    observer,
                    target: self.observers[observer.0].target,
                    records: vec![record],
                }),
            }
        }
        notifications
    }

    fn record_child_list(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        if added.is_empty() && removed.is_empty() {
            return;
        }
        self.record(MutationRecord {
            kind: MutationKind::ChildList,
            target,
            added,
            removed,
            attribute: None,
        });
    }

    /// Queue `record` for every observer interested in it.
    fn record(&mut self, record: MutationRecord) {
        let interested: Vec<ObserverId> = self
            .observers
            .iter()
            .enumerate()
            .filter(|(_, registration)| registration.active)
            .filter(|(_, registration)| registration.options.accepts(record.kind))
            .filter(|(_, registration)| {
                record.target == registration.target
                    || (registration.options.subtree
                        && self.contains(registration.target, record.target))
            })
            .map(|(index, _)| ObserverId(index))
            .collect();

        for observer in interested {
            self.pending.push((observer, record.clone()));
        }
    }
}

fn html_attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, ns!(), LocalName::from(name)),
        value: StrTendril::from_slice(value),
    }
}
