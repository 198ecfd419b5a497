//! # Scene Arena
//!
//! Arena-based storage for the host's node hierarchy.
//!
//! ## Responsibilities
//! - **Node Storage**: `Vec<Option<SceneNode>>` arena with `NodeId` indices
//!   and free-list recycling.
//! - **Hierarchy**: parent-child relationships with cycle prevention.
//! - **Capabilities**: every node exposes a mutable property bag, a mutable
//!   tag set, and host-owned geometry through its [`Backing`].
//!
//! The engine never creates or destroys nodes on its own; it only reads and
//! writes their property bags and tag sets. Geometry and the natural content
//! extent are written by the host (typically after layout) and read by the
//! reflow pass.

use glam::DVec2;
use scrollkit_data::Selector;
use std::collections::{BTreeMap, BTreeSet};

/// Index into the scene arena.
pub type NodeId = usize;

/// Axis-aligned bounding box in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geometry {
    /// Top-left corner, in the same coordinate space as the scroll axis.
    pub origin: DVec2,
    pub size: DVec2,
}

impl Geometry {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            origin: DVec2::new(left, top),
            size: DVec2::new(width, height),
        }
    }

    pub fn top(&self) -> f64 {
        self.origin.y
    }

    pub fn bottom(&self) -> f64 {
        self.origin.y + self.size.y
    }
}

/// How a node stores its tag set, selected per node kind.
///
/// `Styled` hosts keep a native tag collection; `AttributeTagged` hosts
/// round-trip the tag set through a single whitespace-separated attribute
/// string (the way SVG-like nodes store class lists). All tag access goes
/// through this enum so no caller special-cases node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Backing {
    Styled {
        style: BTreeMap<String, String>,
        tags: BTreeSet<String>,
    },
    AttributeTagged {
        style: BTreeMap<String, String>,
        tag_attr: String,
    },
}

impl Backing {
    pub fn styled() -> Self {
        Backing::Styled {
            style: BTreeMap::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn attribute_tagged() -> Self {
        Backing::AttributeTagged {
            style: BTreeMap::new(),
            tag_attr: String::new(),
        }
    }

    fn style(&self) -> &BTreeMap<String, String> {
        match self {
            Backing::Styled { style, .. } | Backing::AttributeTagged { style, .. } => style,
        }
    }

    fn style_mut(&mut self) -> &mut BTreeMap<String, String> {
        match self {
            Backing::Styled { style, .. } | Backing::AttributeTagged { style, .. } => style,
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.style().get(name).map(String::as_str)
    }

    pub fn set_property(&mut self, name: &str, value: &str) {
        self.style_mut().insert(name.to_string(), value.to_string());
    }

    /// Snapshot of the whole property bag.
    pub fn properties(&self) -> BTreeMap<String, String> {
        self.style().clone()
    }

    /// Replace the whole property bag.
    pub fn set_properties(&mut self, props: BTreeMap<String, String>) {
        *self.style_mut() = props;
    }

    pub fn tag_set(&self) -> BTreeSet<String> {
        match self {
            Backing::Styled { tags, .. } => tags.clone(),
            Backing::AttributeTagged { tag_attr, .. } => tag_attr
                .split_whitespace()
                .map(ToString::to_string)
                .collect(),
        }
    }

    pub fn set_tag_set(&mut self, set: BTreeSet<String>) {
        match self {
            Backing::Styled { tags, .. } => *tags = set,
            Backing::AttributeTagged { tag_attr, .. } => {
                *tag_attr = set.into_iter().collect::<Vec<_>>().join(" ");
            }
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        match self {
            Backing::Styled { tags, .. } => tags.contains(tag),
            Backing::AttributeTagged { tag_attr, .. } => {
                tag_attr.split_whitespace().any(|t| t == tag)
            }
        }
    }

    pub fn add_tag(&mut self, tag: &str) {
        let mut set = self.tag_set();
        if set.insert(tag.to_string()) {
            self.set_tag_set(set);
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        let mut set = self.tag_set();
        if set.remove(tag) {
            self.set_tag_set(set);
        }
    }
}

/// A host node the engine can animate.
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Unique addressable name (matched by `#name` selectors).
    pub name: String,
    pub backing: Backing,
    /// Host-owned bounding box; the engine only reads it.
    pub geometry: Geometry,
    /// Attribute-like declaration strings attached by the author, in
    /// `(name, value)` pairs.
    pub declarations: Vec<(String, String)>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, backing: Backing) -> Self {
        Self {
            name: name.into(),
            backing,
            geometry: Geometry::default(),
            declarations: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    /// Attach a declaration string, replacing an earlier one of the same
    /// name.
    pub fn declare(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.declarations.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.declarations.push((name, value));
        }
    }

    pub fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Id(name) => self.name == *name,
            Selector::Tag(tag) => self.backing.has_tag(tag),
        }
    }
}

/// The scene arena.
#[derive(Debug, Clone)]
pub struct Scene {
    nodes: Vec<Option<SceneNode>>,
    free_indices: Vec<usize>,
    /// Viewport extent; `y` is the scroll-axis extent used by percentage
    /// offsets and anchor math.
    pub viewport: DVec2,
    /// Natural scrollable extent of the content, independent of any
    /// declared keyframes.
    pub content_extent: f64,
}

impl Scene {
    pub fn new(viewport: DVec2) -> Self {
        Self {
            nodes: Vec::new(),
            free_indices: Vec::new(),
            viewport,
            content_extent: 0.0,
        }
    }

    pub fn add_node(&mut self, node: SceneNode) -> NodeId {
        if let Some(id) = self.free_indices.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            let id = self.nodes.len();
            self.nodes.push(Some(node));
            id
        }
    }

    /// Recursively removes a node and its children, freeing their indices
    /// for reuse.
    pub fn destroy_node(&mut self, id: NodeId) {
        if id >= self.nodes.len() || self.nodes[id].is_none() {
            return;
        }
        let (parent_id, children) = {
            let Some(node) = self.nodes[id].as_ref() else {
                return;
            };
            (node.parent, node.children.clone())
        };
        if let Some(pid) = parent_id {
            self.remove_child(pid, id);
        }
        for child in children {
            self.destroy_node(child);
        }
        self.nodes[id] = None;
        self.free_indices.push(id);
    }

    /// Attempts to establish a parent-child relationship.
    ///
    /// Returns `false` when rejected: missing nodes, self-parenting, or a
    /// hierarchy cycle.
    pub fn try_add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child {
            return false;
        }
        if self.get_node(parent).is_none() || self.get_node(child).is_none() {
            return false;
        }

        // Reject if `child` is an ancestor of `parent`.
        let mut current = Some(parent);
        while let Some(id) = current {
            if id == child {
                return false;
            }
            current = self.get_node(id).and_then(|n| n.parent);
        }

        let old_parent = self.get_node(child).and_then(|n| n.parent);
        if let Some(old) = old_parent {
            if old == parent {
                return true;
            }
            self.remove_child(old, child);
        }

        if let Some(p) = self.nodes.get_mut(parent).and_then(|n| n.as_mut()) {
            if !p.children.contains(&child) {
                p.children.push(child);
            }
        } else {
            return false;
        }
        if let Some(c) = self.nodes.get_mut(child).and_then(|n| n.as_mut()) {
            c.parent = Some(parent);
            true
        } else {
            false
        }
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.nodes.get_mut(parent).and_then(|n| n.as_mut()) {
            if let Some(pos) = p.children.iter().position(|&c| c == child) {
                p.children.remove(pos);
            }
        }
        if let Some(c) = self.nodes.get_mut(child).and_then(|n| n.as_mut()) {
            if c.parent == Some(parent) {
                c.parent = None;
            }
        }
    }

    pub fn get_node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id).and_then(|n| n.as_ref())
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id).and_then(|n| n.as_mut())
    }

    /// Ids of all live nodes, in arena order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, n)| n.as_ref().map(|_| id))
            .collect()
    }

    /// First live node matching the selector.
    pub fn query(&self, selector: &Selector) -> Option<NodeId> {
        self.node_ids()
            .into_iter()
            .find(|&id| self.get_node(id).is_some_and(|n| n.matches(selector)))
    }

    /// All descendants of `root` (excluding `root` itself) matching the
    /// selector, in depth-first order.
    pub fn descendants_matching(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .get_node(root)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        stack.reverse();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get_node(id) {
                if node.matches(selector) {
                    out.push(id);
                }
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }
}
