//! Arena-backed [`Document`] used by the terminal host and the tests.
//!
//! Nodes are never freed; detaching a subtree only unlinks it. Rectangles are
//! assigned from outside (by the renderer) once per frame.

use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

use crate::document::{
    Document, DocumentMut, MutationKind, MutationRecord, MutationSubscription, NodeId, Query,
    Rect, Size, SubscriptionId,
};

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: Option<Rect>,
}

impl NodeData {
    fn new(tag: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            tag: tag.to_owned(),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            parent: None,
            children: Vec::new(),
            rect: None,
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    viewport: Size,
    observers: Vec<(SubscriptionId, UnboundedSender<MutationRecord>)>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new(Size::default())
    }
}

impl MemoryDocument {
    pub fn new(viewport: Size) -> Self {
        Self {
            nodes: vec![NodeData::new("body", &[])],
            viewport,
            observers: Vec::new(),
        }
    }

    /// Creates an element and appends it to `parent`.
    pub fn element(&mut self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let node = self.create_element(tag, attributes);
        self.append_child(parent, node);
        node
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(data) = self.nodes.get_mut(node.0) {
            data.rect = Some(rect);
        }
    }

    /// Marks every node as not rendered.
    pub fn clear_rects(&mut self) {
        for node in &mut self.nodes {
            node.rect = None;
        }
    }

    /// Unlinks `node` from its parent. The subtree stays in the arena.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get(node.0).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|&c| c != node);
        self.nodes[node.0].parent = None;
        self.notify(parent, MutationKind::ChildList);
    }

    /// Detaches every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) {
        let Some(data) = self.nodes.get_mut(node.0) else {
            return;
        };
        let children = std::mem::take(&mut data.children);
        if children.is_empty() {
            return;
        }
        for child in children {
            self.nodes[child.0].parent = None;
        }
        self.notify(node, MutationKind::ChildList);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&mut self, target: NodeId, kind: MutationKind) {
        let record = MutationRecord { target, kind };
        self.observers.retain(|(_, tx)| tx.send(record).is_ok());
    }

    fn collect_matches(&self, node: NodeId, query: &Query<'_>, out: &mut Vec<NodeId>) {
        for &child in &self.nodes[node.0].children {
            let data = &self.nodes[child.0];
            if query.matches(&data.tag, |name| data.attribute(name)) {
                out.push(child);
            }
            self.collect_matches(child, query, out);
        }
    }
}

impl Document for MemoryDocument {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn tag(&self, node: NodeId) -> &str {
        self.nodes.get(node.0).map_or("", |n| n.tag.as_str())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(node.0)?.attribute(name)
    }

    fn query_all(&self, scope: NodeId, query: &Query<'_>) -> Vec<NodeId> {
        let mut out = Vec::new();
        if scope.0 < self.nodes.len() {
            self.collect_matches(scope, query, &mut out);
        }
        out
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        self.nodes.get(node.0)?.rect
    }

    fn viewport(&self) -> Size {
        self.viewport
    }
}

impl DocumentMut for MemoryDocument {
    fn create_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        self.nodes.push(NodeData::new(tag, attributes));
        NodeId(self.nodes.len() - 1)
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        if parent.0 >= self.nodes.len() || node.0 >= self.nodes.len() || node == parent {
            return;
        }
        // Inserting a node into its own subtree would create a cycle.
        if self.contains(node, parent) {
            return;
        }
        if let Some(old_parent) = self.nodes[node.0].parent {
            self.nodes[old_parent.0].children.retain(|&c| c != node);
            if old_parent != parent {
                self.notify(old_parent, MutationKind::ChildList);
            }
        }

        let siblings = &mut self.nodes[parent.0].children;
        let position = reference
            .and_then(|r| siblings.iter().position(|&c| c == r))
            .unwrap_or(siblings.len());
        siblings.insert(position, node);
        self.nodes[node.0].parent = Some(parent);
        self.notify(parent, MutationKind::ChildList);
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(data) = self.nodes.get_mut(node.0) else {
            return;
        };
        match data.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_owned(),
            None => data.attributes.push((name.to_owned(), value.to_owned())),
        }
        self.notify(node, MutationKind::Attributes);
    }

    fn observe(&mut self) -> MutationSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId(Uuid::new_v4());
        self.observers.push((id, tx));
        MutationSubscription { id, records: rx }
    }

    fn unobserve(&mut self, id: SubscriptionId) {
        self.observers.retain(|(sub, _)| *sub != id);
    }
}
