//! Capability interface over the externally rendered review document.
//!
//! The matching and mounting algorithms only ever talk to [`Document`] and
//! [`DocumentMut`]; they never assume how the tree is stored or rendered.

use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// Opaque handle to a node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// On-screen rectangle in viewport coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// True when no part of the rectangle lies inside `viewport`.
    pub fn is_outside(&self, viewport: Size) -> bool {
        self.bottom() < 0.0
            || self.top() > viewport.height
            || self.right() < 0.0
            || self.left() > viewport.width
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left()
            && point.x < self.right()
            && point.y >= self.top()
            && point.y < self.bottom()
    }
}

/// Element selector understood by every [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query<'a> {
    Tag(&'a str),
    Id(&'a str),
    /// `id` ending with the given text.
    IdSuffix(&'a str),
    Class(&'a str),
    HasAttr(&'a str),
    AttrEq(&'a str, &'a str),
    AttrPrefix(&'a str, &'a str),
    /// Case-insensitive substring match on an attribute value.
    AttrContains(&'a str, &'a str),
}

impl Query<'_> {
    /// Evaluates the query against a node's tag and attribute lookup.
    pub fn matches<'n>(&self, tag: &str, attr: impl Fn(&str) -> Option<&'n str>) -> bool {
        match *self {
            Query::Tag(t) => tag.eq_ignore_ascii_case(t),
            Query::Id(id) => attr("id") == Some(id),
            Query::IdSuffix(suffix) => attr("id").is_some_and(|id| id.ends_with(suffix)),
            Query::Class(class) => attr("class")
                .is_some_and(|list| list.split_whitespace().any(|c| c == class)),
            Query::HasAttr(name) => attr(name).is_some(),
            Query::AttrEq(name, value) => attr(name) == Some(value),
            Query::AttrPrefix(name, prefix) => attr(name).is_some_and(|v| v.starts_with(prefix)),
            Query::AttrContains(name, needle) => attr(name).is_some_and(|v| {
                v.to_ascii_lowercase()
                    .contains(&needle.to_ascii_lowercase())
            }),
        }
    }
}

/// Read-only capabilities the engine needs from the review document.
pub trait Document {
    fn root(&self) -> NodeId;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    fn tag(&self, node: NodeId) -> &str;
    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Descendants of `scope` (excluding `scope`) matching `query`, in
    /// document order.
    fn query_all(&self, scope: NodeId, query: &Query<'_>) -> Vec<NodeId>;

    /// Current on-screen rectangle; `None` when the node is not rendered.
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    fn viewport(&self) -> Size;

    fn query_first(&self, scope: NodeId, query: &Query<'_>) -> Option<NodeId> {
        self.query_all(scope, query).into_iter().next()
    }

    /// True when `ancestor` is `node` or one of its ancestors.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Nearest ancestor of `node` (starting at its parent) accepted by `accept`.
    fn closest_ancestor(&self, node: NodeId, accept: &dyn Fn(NodeId) -> bool) -> Option<NodeId> {
        let mut current = self.parent(node);
        while let Some(n) = current {
            if accept(n) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// Deepest node containing every node of `nodes`.
    fn common_ancestor(&self, nodes: &[NodeId]) -> Option<NodeId> {
        let (first, rest) = nodes.split_first()?;
        let mut candidate = Some(*first);
        while let Some(c) = candidate {
            if rest.iter().all(|&n| self.contains(c, n)) {
                return Some(c);
            }
            candidate = self.parent(c);
        }
        None
    }
}

/// Identifies one structural-change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

/// Receiving end of a structural-change subscription. Dropping it without
/// calling [`DocumentMut::unobserve`] leaves a dead sender behind that the
/// document prunes on its next notification.
#[derive(Debug)]
pub struct MutationSubscription {
    pub id: SubscriptionId,
    pub records: UnboundedReceiver<MutationRecord>,
}

/// Mutating capabilities used to mount the overlay panel.
pub trait DocumentMut: Document {
    /// Creates a detached element.
    fn create_element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeId;

    /// Inserts (or moves) `node` under `parent`, before `reference` when it is
    /// a child of `parent`, otherwise at the end.
    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>);

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn observe(&mut self) -> MutationSubscription;

    fn unobserve(&mut self, id: SubscriptionId);

    fn append_child(&mut self, parent: NodeId, node: NodeId) {
        self.insert_before(parent, node, None);
    }

    fn prepend_child(&mut self, parent: NodeId, node: NodeId) {
        let first = self.children(parent).into_iter().next();
        if first != Some(node) {
            self.insert_before(parent, node, first);
        }
    }
}
