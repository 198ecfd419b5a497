//! Per-node timelines: resolved keyframes, the live Scrollable record, and
//! the property filler that completes every timeline before interpolation.

use crate::scene::NodeId;
use scrollkit_data::{EdgePolicy, FrameSpec, PropertyValue, Selector};
use std::collections::{BTreeMap, BTreeSet};

/// One property on a keyframe, with its per-property easing override.
#[derive(Debug, Clone, PartialEq)]
pub struct PropEntry {
    pub value: PropertyValue,
    pub easing: Option<String>,
}

/// A declared `(frame, property-set, easing)` tuple.
///
/// `frame` is derived from `spec` on every reflow; everything else is
/// immutable after parse.
#[derive(Debug, Clone)]
pub struct Keyframe {
    /// Declaration name verbatim; doubles as the crossing-event name.
    pub name: String,
    pub spec: FrameSpec,
    pub frame: f64,
    pub props: BTreeMap<String, PropEntry>,
}

/// Where the current frame sits relative to a Scrollable's declared range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeState {
    #[default]
    Unset,
    Before,
    Between,
    After,
}

/// Pre-engine state of a node, restored on reset and teardown.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub props: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
}

/// The live per-node record: timeline plus render state.
#[derive(Debug, Clone)]
pub struct Scrollable {
    pub node: NodeId,
    /// Sorted ascending by `frame` after every reflow.
    pub keyframes: Vec<Keyframe>,
    pub edge_state: EdgeState,
    /// Effective frame this Scrollable last rendered at; drives the
    /// crossing-event sweep and segment-change detection.
    pub last_rendered_frame: Option<f64>,
    pub snapshot: Snapshot,
    /// Whether the engine has written to the node since the snapshot was
    /// last restored.
    pub dirty: bool,
    pub smooth_scrolling: Option<bool>,
    pub edge_policy: Option<EdgePolicy>,
    pub emit_events: bool,
    /// Resolved geometry-measurement target, when overridden.
    pub anchor_target: Option<NodeId>,
    pub broadcast: Option<Selector>,
    /// Pre-engine state of broadcast targets, captured the first time each
    /// one is written and restored alongside the owner's snapshot.
    pub target_snapshots: BTreeMap<NodeId, Snapshot>,
}

impl Scrollable {
    pub fn first(&self) -> Option<&Keyframe> {
        self.keyframes.first()
    }

    pub fn last(&self) -> Option<&Keyframe> {
        self.keyframes.last()
    }

    pub fn sort_keyframes(&mut self) {
        self.keyframes.sort_by(|a, b| a.frame.total_cmp(&b.frame));
    }

    /// Every property name appearing anywhere on this timeline.
    pub fn property_names(&self) -> BTreeSet<&str> {
        self.keyframes
            .iter()
            .flat_map(|kf| kf.props.keys().map(String::as_str))
            .collect()
    }
}

/// Two passes, left-to-right then right-to-left, each propagating a running
/// known-properties map into any keyframe missing a property. Afterwards
/// every keyframe carries every property name seen anywhere on the
/// timeline, so the interpolator never special-cases a missing property
/// mid-range.
pub fn fill_properties(keyframes: &mut [Keyframe]) {
    let mut known: BTreeMap<String, PropEntry> = BTreeMap::new();
    for kf in keyframes.iter_mut() {
        propagate(kf, &mut known);
    }
    known.clear();
    for kf in keyframes.iter_mut().rev() {
        propagate(kf, &mut known);
    }
}

fn propagate(kf: &mut Keyframe, known: &mut BTreeMap<String, PropEntry>) {
    for (name, entry) in &kf.props {
        known.insert(name.clone(), entry.clone());
    }
    for (name, entry) in known.iter() {
        kf.props
            .entry(name.clone())
            .or_insert_with(|| entry.clone());
    }
}
