//! # Anchor Resolver
//!
//! Recomputes the absolute frame of every keyframe from its declared
//! `FrameSpec`. Runs on init and after any geometry-invalidating change.
//!
//! Relative declarations measure the anchor target's bounding box with the
//! owning node temporarily restored to its pre-engine snapshot, so engine
//! writes never distort their own measurements. `end`-anchored absolute
//! declarations resolve last, against the maximum extent established by
//! every other frame and the natural content extent.

use crate::scene::{NodeId, Scene};
use crate::timeline::Scrollable;
use scrollkit_data::{AbsoluteAnchor, FrameSpec, OffsetUnit};
use std::collections::BTreeMap;

/// Knobs the resolver reads from the engine options.
#[derive(Debug, Clone)]
pub struct ReflowSettings {
    /// Multiplier on absolute-mode pixel offsets.
    pub scale: f64,
    /// Whether declared frames may extend the scrollable extent beyond
    /// the natural content extent.
    pub force_height: bool,
    /// Named constants usable in declarations.
    pub constants: BTreeMap<String, f64>,
}

impl Default for ReflowSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            force_height: true,
            constants: BTreeMap::new(),
        }
    }
}

/// Result of a reflow pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflowOutcome {
    /// Extent `end`-anchored declarations resolved against.
    pub max_extent: f64,
    /// Maximum reachable scroll position.
    pub max_position: f64,
}

/// Resolve every keyframe frame, then re-sort each timeline.
pub fn reflow(
    scene: &mut Scene,
    scrollables: &mut [Scrollable],
    settings: &ReflowSettings,
) -> ReflowOutcome {
    let viewport_y = scene.viewport.y;

    // Everything except end-anchored declarations resolves in one pass.
    for scrollable in scrollables.iter_mut() {
        let owner = scrollable.node;
        let target = scrollable.anchor_target.unwrap_or(owner);
        let needs_measurement = scrollable
            .keyframes
            .iter()
            .any(|kf| kf.spec.is_relative());
        let saved = if needs_measurement {
            swap_in_snapshot(scene, owner, scrollable)
        } else {
            None
        };
        let geometry = scene.get_node(target).map(|n| n.geometry);
        if let Some((props, tags)) = saved {
            if let Some(node) = scene.get_node_mut(owner) {
                node.backing.set_properties(props);
                node.backing.set_tag_set(tags);
            }
        }

        for kf in scrollable.keyframes.iter_mut() {
            let constant = resolve_constant(kf.spec.constant(), &settings.constants);
            match &kf.spec {
                FrameSpec::Absolute {
                    anchor: AbsoluteAnchor::Start,
                    offset,
                    unit,
                    ..
                } => {
                    kf.frame = offset_px(*offset, *unit, settings.scale, viewport_y) + constant;
                }
                FrameSpec::Absolute {
                    anchor: AbsoluteAnchor::End,
                    ..
                } => {
                    // Deferred to the second pass.
                }
                FrameSpec::Relative {
                    viewport_anchor,
                    element_anchor,
                    offset,
                    unit,
                    ..
                } => {
                    let Some(geo) = geometry else { continue };
                    let elem_edge = geo.top() + element_anchor.fraction() * geo.size.y;
                    let viewport_offset = viewport_anchor.fraction() * viewport_y;
                    kf.frame = elem_edge - viewport_offset
                        - offset_px(*offset, *unit, 1.0, viewport_y)
                        + constant;
                }
            }
        }
    }

    // Declared ranges never exceed available scroll room, but larger
    // natural content still counts.
    let mut max_extent = scene.content_extent;
    for scrollable in scrollables.iter() {
        for kf in &scrollable.keyframes {
            if !kf.spec.is_end_anchored() {
                max_extent = max_extent.max(kf.frame);
            }
        }
    }

    let mut max_frame = max_extent;
    for scrollable in scrollables.iter_mut() {
        for kf in scrollable.keyframes.iter_mut() {
            if let FrameSpec::Absolute {
                anchor: AbsoluteAnchor::End,
                offset,
                unit,
                constant,
            } = &kf.spec
            {
                let constant = resolve_constant(constant.as_deref(), &settings.constants);
                kf.frame =
                    max_extent - offset_px(*offset, *unit, settings.scale, viewport_y) + constant;
                max_frame = max_frame.max(kf.frame);
            }
        }
        scrollable.sort_keyframes();
    }

    let max_position = if settings.force_height {
        max_frame.max(scene.content_extent)
    } else {
        scene.content_extent
    };
    ReflowOutcome {
        max_extent,
        max_position,
    }
}

/// Measure `node` against the viewport directly, outside any timeline.
pub fn relative_to_absolute(
    scene: &Scene,
    node: NodeId,
    viewport_anchor: scrollkit_data::Anchor,
    element_anchor: scrollkit_data::Anchor,
) -> Option<f64> {
    let geo = scene.get_node(node)?.geometry;
    let elem_edge = geo.top() + element_anchor.fraction() * geo.size.y;
    Some(elem_edge - viewport_anchor.fraction() * scene.viewport.y)
}

fn offset_px(offset: f64, unit: OffsetUnit, scale: f64, viewport_y: f64) -> f64 {
    match unit {
        OffsetUnit::Pixels => offset * scale,
        OffsetUnit::ViewportPercent => offset / 100.0 * viewport_y,
    }
}

fn resolve_constant(name: Option<&str>, constants: &BTreeMap<String, f64>) -> f64 {
    name.and_then(|n| constants.get(n).copied()).unwrap_or(0.0)
}

/// Restore the node's pre-engine snapshot for measurement and hand back
/// what was displaced.
fn swap_in_snapshot(
    scene: &mut Scene,
    owner: NodeId,
    scrollable: &Scrollable,
) -> Option<(
    BTreeMap<String, String>,
    std::collections::BTreeSet<String>,
)> {
    let node = scene.get_node_mut(owner)?;
    let saved = (node.backing.properties(), node.backing.tag_set());
    node.backing.set_properties(scrollable.snapshot.props.clone());
    node.backing.set_tag_set(scrollable.snapshot.tags.clone());
    Some(saved)
}
