//! The schema tree built from a template.
//!
//! This module provides:
//! - `TagKind`: the closed set of template tags
//! - `Tree`, `Node`, `NodeId`: the index arena holding every parsed node
//! - `Strategy`: the phase/growth modifier a `<strategy>` tag carries
//! - `TreeBuilder`: the streaming parser that fills the arena and schedules
//!   runnable elements

mod builder;
mod store;
mod strategy;

pub use builder::{BuildContext, TreeBuilder, parse_reader, parse_str};
pub use strategy::{Mode, Strategy};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::backend::{FieldHandle, GroupHandle, Handle};
use crate::source::DataSource;
use crate::types::ElementType;

/// Template tags understood by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Definition,
    Group,
    Field,
    Attribute,
    Link,
    Strategy,
    Dimensions,
    Dim,
    DataSource,
    Doc,
    Symbol,
}

impl TagKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "definition" => Some(TagKind::Definition),
            "group" => Some(TagKind::Group),
            "field" => Some(TagKind::Field),
            "attribute" => Some(TagKind::Attribute),
            "link" => Some(TagKind::Link),
            "strategy" => Some(TagKind::Strategy),
            "dimensions" => Some(TagKind::Dimensions),
            "dim" => Some(TagKind::Dim),
            "datasource" => Some(TagKind::DataSource),
            "doc" => Some(TagKind::Doc),
            "symbol" => Some(TagKind::Symbol),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TagKind::Definition => "definition",
            TagKind::Group => "group",
            TagKind::Field => "field",
            TagKind::Attribute => "attribute",
            TagKind::Link => "link",
            TagKind::Strategy => "strategy",
            TagKind::Dimensions => "dimensions",
            TagKind::Dim => "dim",
            TagKind::DataSource => "datasource",
            TagKind::Doc => "doc",
            TagKind::Symbol => "symbol",
        }
    }

    /// Tags whose whole sub-tree is captured as raw markup.
    pub fn is_raw(&self) -> bool {
        matches!(self, TagKind::DataSource | TagKind::Doc)
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Index of a node in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An `<attribute>` waiting for its owner's handle.
pub(crate) struct PendingAttribute {
    pub name: String,
    pub dtype: ElementType,
    pub content: String,
    pub rank: Option<usize>,
    pub source: Option<Box<dyn DataSource>>,
    pub strategy: Option<Strategy>,
}

/// One parsed template node.
pub struct Node {
    pub kind: TagKind,
    pub parent: Option<NodeId>,
    pub attrs: BTreeMap<String, String>,
    /// Character data collected between the tags
    pub content: String,
    /// Resolved object name (groups default to their type without `NX`)
    pub name: String,
    /// Backend path, once the node has an object
    pub path: Option<String>,
    pub(crate) group: Option<Arc<dyn GroupHandle>>,
    pub(crate) field: Option<Arc<dyn FieldHandle>>,
    pub(crate) source: Option<Box<dyn DataSource>>,
    pub(crate) strategy: Option<Strategy>,
    pub(crate) rank: Option<usize>,
    pub(crate) dims: BTreeMap<usize, usize>,
    pub(crate) doc: Option<String>,
    pub(crate) pending: Vec<PendingAttribute>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("name", &self.name)
            .field("attrs", &self.attrs)
            .field("path", &self.path)
            .field("strategy", &self.strategy)
            .field("rank", &self.rank)
            .field("dims", &self.dims)
            .finish()
    }
}

impl Node {
    pub(crate) fn new(kind: TagKind, parent: Option<NodeId>, attrs: BTreeMap<String, String>) -> Self {
        Self {
            kind,
            parent,
            name: attrs.get("name").cloned().unwrap_or_default(),
            attrs,
            content: String::new(),
            path: None,
            group: None,
            field: None,
            source: None,
            strategy: None,
            rank: None,
            dims: BTreeMap::new(),
            doc: None,
            pending: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Template type of a group or field.
    pub fn type_name(&self) -> Option<&str> {
        self.attr("type")
    }

    pub fn has_handle(&self) -> bool {
        self.group.is_some() || self.field.is_some()
    }

    pub fn strategy(&self) -> Option<&Strategy> {
        self.strategy.as_ref()
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

/// Index arena of template nodes plus the symbol table.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    symbols: BTreeMap<String, String>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.parent == Some(parent))
            .map(|(id, _)| id)
            .collect()
    }

    /// Every node of `kind`, in document order.
    pub fn find_kind(&self, kind: TagKind) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.kind == kind)
            .map(|(id, _)| id)
            .collect()
    }

    /// Nearest ancestor of `id` (itself excluded) owning a group handle.
    pub(crate) fn parent_group(&self, id: NodeId) -> Option<(NodeId, Arc<dyn GroupHandle>)> {
        let mut cur = self.node(id).parent;
        while let Some(p) = cur {
            let node = self.node(p);
            if let Some(g) = &node.group {
                return Some((p, g.clone()));
            }
            cur = node.parent;
        }
        None
    }

    pub fn symbols(&self) -> &BTreeMap<String, String> {
        &self.symbols
    }

    pub fn symbol(&self, name: &str) -> Option<&str> {
        self.symbols.get(name).map(String::as_str)
    }

    pub(crate) fn add_symbol(&mut self, name: String, value: String) {
        self.symbols.insert(name, value);
    }

    fn child_group(&self, parent: Option<NodeId>, matches: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.nodes()
            .find(|(_, n)| n.kind == TagKind::Group && n.parent == parent && matches(n))
            .map(|(id, _)| id)
    }

    /// Turn a typed link target into a plain path.
    ///
    /// Segments may be `name:NXtype`, `name`, or a bare `NXtype`. A bare type
    /// is resolved to the name of the group of that type at that level, or to
    /// the type without its `NX` prefix when no such group exists.
    pub fn resolve_link_target(&self, target: &str) -> String {
        let target = target.trim();
        if !target.starts_with('/') {
            return target.to_string();
        }
        let mut cur = self
            .nodes
            .first()
            .filter(|n| n.kind == TagKind::Definition)
            .map(|_| NodeId(0));
        let mut parts = Vec::new();
        for segment in target.split('/').filter(|s| !s.is_empty()) {
            let (name, nx_type) = match segment.split_once(':') {
                Some((n, t)) => (n.to_string(), Some(t)),
                None if segment.starts_with("NX") => (String::new(), Some(segment)),
                None => (segment.to_string(), None),
            };
            let name = if name.is_empty() {
                let ty = nx_type.unwrap_or_default();
                self.child_group(cur, |n| n.type_name() == Some(ty))
                    .map(|id| self.node(id).name.clone())
                    .unwrap_or_else(|| ty.trim_start_matches("NX").to_string())
            } else {
                name
            };
            cur = self.child_group(cur, |n| n.name == name);
            parts.push(name);
        }
        format!("/{}", parts.join("/"))
    }

    /// Release every handle held by the arena.
    pub fn close(&mut self) {
        for node in &mut self.nodes {
            if let Some(f) = node.field.take() {
                f.close();
            }
            if let Some(g) = node.group.take() {
                g.close();
            }
        }
    }
}
