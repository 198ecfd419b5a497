//! # Scrollable State Machine
//!
//! Per-tick driver for one Scrollable: decides the edge state, maintains
//! the mutually exclusive before/between/after tags, applies the configured
//! edge policy outside the declared range, runs the interpolator inside it,
//! and emits direction-tagged crossing events.
//!
//! A `ValueShapeMismatch` from the interpolator skips the Scrollable for
//! the current tick only; state bookkeeping still advances so the fault
//! does not replay events or transitions on the next tick.

use crate::easing::EasingTable;
use crate::error::EngineError;
use crate::interpolate::{blend, bracket, segment_progress};
use crate::scene::{NodeId, Scene};
use crate::timeline::{EdgeState, Keyframe, Scrollable, Snapshot};
use scrollkit_data::{Direction, EdgePolicy};

/// Tag applied while the frame sits before the Scrollable's range.
pub const TAG_BEFORE: &str = "sk-before";
/// Tag applied while the frame sits inside the range.
pub const TAG_BETWEEN: &str = "sk-between";
/// Tag applied while the frame sits after the range.
pub const TAG_AFTER: &str = "sk-after";

/// A keyframe boundary crossed since the last rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossingEvent {
    pub node: NodeId,
    /// The crossed keyframe's declaration name.
    pub name: String,
    pub direction: Direction,
}

/// Render one Scrollable at `frame`.
///
/// `force` re-applies values even without a transition (used after
/// reflow, when resolved frames may have moved under a stationary scroll
/// position).
pub fn render_scrollable(
    scene: &mut Scene,
    scrollable: &mut Scrollable,
    frame: f64,
    force: bool,
    default_policy: EdgePolicy,
    easing: &EasingTable,
    events: &mut Vec<CrossingEvent>,
) -> Result<(), EngineError> {
    if scrollable.keyframes.is_empty() {
        return Ok(());
    }

    if scrollable.emit_events {
        if let Some(prev) = scrollable.last_rendered_frame {
            sweep_crossings(scrollable, prev, frame, events);
        }
    }

    let lo = scrollable.keyframes[0].frame;
    let hi = scrollable.keyframes[scrollable.keyframes.len() - 1].frame;
    let new_state = if frame < lo {
        EdgeState::Before
    } else if frame > hi {
        EdgeState::After
    } else {
        EdgeState::Between
    };
    let policy = scrollable.edge_policy.unwrap_or(default_policy);
    let entered = scrollable.edge_state != new_state;

    let mut fault = None;
    match new_state {
        EdgeState::Between => {
            match interpolated_writes(scrollable, frame, easing) {
                Ok(writes) => apply_writes(scene, scrollable, &writes),
                Err(e) => fault = Some(e),
            }
        }
        EdgeState::Before | EdgeState::After => {
            if entered || force {
                let boundary = if new_state == EdgeState::Before { lo } else { hi };
                match policy {
                    EdgePolicy::Set => {
                        let idx = if new_state == EdgeState::Before {
                            0
                        } else {
                            scrollable.keyframes.len() - 1
                        };
                        let writes = literal_writes(&scrollable.keyframes[idx]);
                        apply_writes(scene, scrollable, &writes);
                    }
                    EdgePolicy::Ease => match interpolated_writes(scrollable, boundary, easing) {
                        Ok(writes) => apply_writes(scene, scrollable, &writes),
                        Err(e) => fault = Some(e),
                    },
                    EdgePolicy::Reset => reset_node(scene, scrollable),
                }
            }
        }
        EdgeState::Unset => unreachable!("frame always maps to a concrete edge state"),
    }

    if entered {
        set_edge_tags(scene, scrollable, new_state);
    }
    scrollable.edge_state = new_state;
    scrollable.last_rendered_frame = Some(frame);

    match fault {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Restore the node's pre-engine snapshot, along with every broadcast
/// target written on its behalf. A second reset without an intervening
/// engine write is a no-op.
pub fn reset_node(scene: &mut Scene, scrollable: &mut Scrollable) {
    if !scrollable.dirty {
        return;
    }
    if let Some(node) = scene.get_node_mut(scrollable.node) {
        node.backing.set_properties(scrollable.snapshot.props.clone());
        node.backing.set_tag_set(scrollable.snapshot.tags.clone());
    }
    for (id, snapshot) in &scrollable.target_snapshots {
        if let Some(node) = scene.get_node_mut(*id) {
            node.backing.set_properties(snapshot.props.clone());
            node.backing.set_tag_set(snapshot.tags.clone());
        }
    }
    scrollable.dirty = false;
}

/// Emit one event per keyframe crossed between `prev` and `frame`.
/// Scrolling down walks crossed keyframes in ascending order, scrolling up
/// in descending order. A keyframe fires when the coordinate leaves it
/// behind: landing exactly on one emits nothing, departing from it in
/// either direction emits it once. The two directions mirror each other
/// (down takes `prev <= kf < frame`, up takes `frame < kf <= prev`).
fn sweep_crossings(
    scrollable: &Scrollable,
    prev: f64,
    frame: f64,
    events: &mut Vec<CrossingEvent>,
) {
    if frame > prev {
        for kf in &scrollable.keyframes {
            if prev <= kf.frame && kf.frame < frame {
                events.push(CrossingEvent {
                    node: scrollable.node,
                    name: kf.name.clone(),
                    direction: Direction::Down,
                });
            }
        }
    } else if frame < prev {
        for kf in scrollable.keyframes.iter().rev() {
            if frame < kf.frame && kf.frame <= prev {
                events.push(CrossingEvent {
                    node: scrollable.node,
                    name: kf.name.clone(),
                    direction: Direction::Up,
                });
            }
        }
    }
}

/// Interpolate every property at `frame`, collecting writes without
/// touching the node, so a shape mismatch leaves no partial application.
fn interpolated_writes(
    scrollable: &Scrollable,
    frame: f64,
    easing: &EasingTable,
) -> Result<Vec<(String, String)>, EngineError> {
    if scrollable.keyframes.len() < 2 {
        return Ok(literal_writes(&scrollable.keyframes[0]));
    }
    let Some((li, ri)) = bracket(&scrollable.keyframes, frame) else {
        return Ok(Vec::new());
    };
    let left = &scrollable.keyframes[li];
    let right = &scrollable.keyframes[ri];
    let degenerate = right.frame == left.frame;
    let raw = segment_progress(left.frame, right.frame, frame);

    let mut writes = Vec::with_capacity(left.props.len());
    for (name, entry) in &left.props {
        let Some(right_entry) = right.props.get(name) else {
            // The filler guarantees completeness; a hole here means the
            // timeline was mutated behind our back. Leave it alone.
            continue;
        };
        let progress = if degenerate {
            1.0
        } else {
            easing.resolve(entry.easing.as_deref())(raw)
        };
        let text = blend(name, &entry.value, &right_entry.value, progress)?;
        writes.push((name.clone(), text));
    }
    Ok(writes)
}

fn literal_writes(kf: &Keyframe) -> Vec<(String, String)> {
    kf.props
        .iter()
        .map(|(name, entry)| (name.clone(), entry.value.render()))
        .collect()
}

/// Write properties to the owning node, or broadcast them to every
/// descendant matching the broadcast selector.
fn apply_writes(scene: &mut Scene, scrollable: &mut Scrollable, writes: &[(String, String)]) {
    if writes.is_empty() {
        return;
    }
    let targets = match &scrollable.broadcast {
        Some(selector) => scene.descendants_matching(scrollable.node, selector),
        None => vec![scrollable.node],
    };
    for target in targets {
        if let Some(node) = scene.get_node_mut(target) {
            // Broadcast targets get their pre-engine state captured on
            // first write so reset and teardown can restore them too.
            if target != scrollable.node {
                scrollable
                    .target_snapshots
                    .entry(target)
                    .or_insert_with(|| Snapshot {
                        props: node.backing.properties(),
                        tags: node.backing.tag_set(),
                    });
            }
            for (name, value) in writes {
                node.backing.set_property(name, value);
            }
        }
    }
    scrollable.dirty = true;
}

fn set_edge_tags(scene: &mut Scene, scrollable: &mut Scrollable, state: EdgeState) {
    let Some(node) = scene.get_node_mut(scrollable.node) else {
        return;
    };
    node.backing.remove_tag(TAG_BEFORE);
    node.backing.remove_tag(TAG_BETWEEN);
    node.backing.remove_tag(TAG_AFTER);
    let tag = match state {
        EdgeState::Before => TAG_BEFORE,
        EdgeState::Between => TAG_BETWEEN,
        EdgeState::After => TAG_AFTER,
        EdgeState::Unset => return,
    };
    node.backing.add_tag(tag);
    scrollable.dirty = true;
}
