//! # Engine Handle
//!
//! The public entry point. `Engine::init` parses every declaration in the
//! scene into Scrollables and returns an explicit handle; multiple engines
//! over disjoint scenes are independent. The host owns the scene and the
//! clock: it feeds scroll/touch input between ticks and calls
//! [`Engine::tick`] once per frame with the current time in milliseconds.
//!
//! Init-time faults abort with no partial state. Tick-time faults are
//! isolated to the offending Scrollable and logged through `tracing`.

use crate::easing::{EasingFn, EasingTable};
use crate::error::EngineError;
use crate::parser::parse_node;
use crate::reflow::{self, reflow, ReflowSettings};
use crate::scene::{NodeId, Scene};
use crate::scheduler::{DesktopStrategy, ScrollStrategy, TouchStrategy};
use crate::state::{render_scrollable, reset_node, CrossingEvent};
use crate::timeline::{fill_properties, EdgeState, Keyframe, PropEntry, Scrollable, Snapshot};
use scrollkit_data::{Anchor, Direction, EdgePolicy};
use std::collections::{BTreeMap, HashMap};

/// Root tag while an engine manages the scene.
pub const TAG_ENGINE: &str = "sk";
/// Root tag in desktop (smoothing) mode.
pub const TAG_DESKTOP: &str = "sk-desktop";
/// Root tag in touch (momentum) mode.
pub const TAG_MOBILE: &str = "sk-mobile";

/// Snapshot of one tick handed to the render listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderInfo {
    pub current: f64,
    pub previous: f64,
    pub direction: Direction,
    pub max: f64,
}

pub type BeforeRenderListener = Box<dyn FnMut(&RenderInfo) -> bool>;
pub type RenderListener = Box<dyn FnMut(&RenderInfo)>;
pub type EventHandler = Box<dyn FnMut(&CrossingEvent)>;
pub type DoneCallback = Box<dyn FnOnce(bool)>;

/// Parameters for a programmatic scroll animation.
pub struct AnimateToOptions {
    pub duration_ms: f64,
    /// Named curve from the easing table; linear when absent or unknown.
    pub easing: Option<String>,
    /// Invoked on completion with `cancelled = true` when superseded or
    /// stopped.
    pub done: Option<DoneCallback>,
}

impl Default for AnimateToOptions {
    fn default() -> Self {
        Self {
            duration_ms: 1000.0,
            easing: None,
            done: None,
        }
    }
}

/// Engine configuration.
pub struct Options {
    /// Custom easing curves, merged over the built-ins.
    pub easing: HashMap<String, EasingFn>,
    /// Edge policy for nodes without a per-node override.
    pub edge_strategy: EdgePolicy,
    pub beforerender: Option<BeforeRenderListener>,
    pub render: Option<RenderListener>,
    /// Whether declared frames may extend the scrollable extent past the
    /// natural content extent.
    pub force_height: bool,
    /// Multiplier on absolute-mode pixel offsets.
    pub scale: f64,
    /// Momentum deceleration in px per ms squared.
    pub mobile_deceleration: f64,
    pub smooth_scrolling: bool,
    pub smooth_scrolling_duration_ms: f64,
    /// Overrides touch-mode detection; desktop mode when absent.
    pub mobile_check: Option<Box<dyn Fn() -> bool>>,
    /// Named constants usable in declaration names.
    pub constants: BTreeMap<String, f64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            easing: HashMap::new(),
            edge_strategy: EdgePolicy::Set,
            beforerender: None,
            render: None,
            force_height: true,
            scale: 1.0,
            mobile_deceleration: 0.004,
            smooth_scrolling: true,
            smooth_scrolling_duration_ms: 200.0,
            mobile_check: None,
            constants: BTreeMap::new(),
        }
    }
}

struct AnimateState {
    start_pos: f64,
    target: f64,
    duration_ms: f64,
    easing: EasingFn,
    /// Set on the first tick the animation is observed.
    start_time: Option<f64>,
    done: Option<DoneCallback>,
}

/// One engine instance over one scene.
pub struct Engine {
    easing: EasingTable,
    edge_strategy: EdgePolicy,
    beforerender: Option<BeforeRenderListener>,
    render: Option<RenderListener>,
    reflow_settings: ReflowSettings,
    strategy: Box<dyn ScrollStrategy>,
    touch_mode: bool,
    scrollables: Vec<Scrollable>,
    handlers: HashMap<String, EventHandler>,
    /// Parentless nodes tagged at init and untagged at destroy.
    root_nodes: Vec<NodeId>,
    raw_position: f64,
    rendered_position: f64,
    last_rendered: Option<f64>,
    direction: Direction,
    max_position: f64,
    reflow_pending: bool,
    animate: Option<AnimateState>,
}

impl Engine {
    /// Parse every declaration in the scene and build the engine.
    ///
    /// Fatal faults (`InvalidDeclaration`, `InvalidAnchorTarget`) abort
    /// with no nodes modified.
    pub fn init(scene: &mut Scene, options: Options) -> Result<Self, EngineError> {
        let Options {
            easing,
            edge_strategy,
            beforerender,
            render,
            force_height,
            scale,
            mobile_deceleration,
            smooth_scrolling,
            smooth_scrolling_duration_ms,
            mobile_check,
            constants,
        } = options;

        let mut table = EasingTable::builtin();
        table.merge(easing);

        let touch_mode = mobile_check.map(|check| check()).unwrap_or(false);
        let strategy: Box<dyn ScrollStrategy> = if touch_mode {
            Box::new(TouchStrategy::new(mobile_deceleration))
        } else {
            Box::new(DesktopStrategy::new(
                smooth_scrolling,
                smooth_scrolling_duration_ms,
            ))
        };

        let mut scrollables = Vec::new();
        for id in scene.node_ids() {
            if let Some(scrollable) = build_scrollable(scene, id)? {
                scrollables.push(scrollable);
            }
        }

        let mut engine = Self {
            easing: table,
            edge_strategy,
            beforerender,
            render,
            reflow_settings: ReflowSettings {
                scale,
                force_height,
                constants,
            },
            strategy,
            touch_mode,
            scrollables,
            handlers: HashMap::new(),
            root_nodes: Vec::new(),
            raw_position: 0.0,
            rendered_position: 0.0,
            last_rendered: None,
            direction: Direction::Down,
            max_position: 0.0,
            reflow_pending: false,
            animate: None,
        };

        engine.run_reflow(scene);
        for scrollable in engine.scrollables.iter_mut() {
            fill_properties(&mut scrollable.keyframes);
        }
        engine.tag_roots(scene);
        Ok(engine)
    }

    /// One scheduler step at `now_ms`.
    pub fn tick(&mut self, scene: &mut Scene, now_ms: f64) {
        let force = self.reflow_pending;
        if force {
            self.reflow_pending = false;
            self.run_reflow(scene);
        }

        let rendered = match self.step_animate_to(now_ms) {
            Some(pos) => pos,
            None => self.strategy.rendered_position(self.raw_position, now_ms),
        };
        self.rendered_position = rendered;

        let previous = self.last_rendered.unwrap_or(rendered);
        if previous == rendered && !force && self.last_rendered.is_some() {
            return;
        }
        if rendered > previous {
            self.direction = Direction::Down;
        } else if rendered < previous {
            self.direction = Direction::Up;
        }

        let info = RenderInfo {
            current: rendered,
            previous,
            direction: self.direction,
            max: self.max_position,
        };
        if let Some(listener) = self.beforerender.as_mut() {
            if !listener(&info) {
                // Vetoed: bookkeeping still advances, nothing is applied.
                self.last_rendered = Some(rendered);
                return;
            }
        }

        let mut events = Vec::new();
        for scrollable in self.scrollables.iter_mut() {
            // Per-node smoothing opt-out reads the raw coordinate.
            let frame = if scrollable.smooth_scrolling == Some(false) && !self.touch_mode {
                self.raw_position
            } else {
                rendered
            };
            if let Err(err) = render_scrollable(
                scene,
                scrollable,
                frame,
                force,
                self.edge_strategy,
                &self.easing,
                &mut events,
            ) {
                tracing::warn!(node = scrollable.node, error = %err, "scrollable skipped this tick");
            }
        }
        for event in &events {
            if let Some(handler) = self.handlers.get_mut(&event.name) {
                handler(event);
            }
        }
        if let Some(listener) = self.render.as_mut() {
            listener(&info);
        }
        self.last_rendered = Some(rendered);
    }

    /// Re-parse declarations for the given nodes (all managed and
    /// declaration-bearing nodes when `None`), resetting their state.
    pub fn refresh(
        &mut self,
        scene: &mut Scene,
        nodes: Option<&[NodeId]>,
    ) -> Result<(), EngineError> {
        let targets: Vec<NodeId> = match nodes {
            Some(ids) => ids.to_vec(),
            None => scene.node_ids(),
        };
        for id in targets {
            let existing = self.scrollables.iter().position(|s| s.node == id);
            match build_scrollable(scene, id)? {
                Some(mut rebuilt) => match existing {
                    Some(i) => {
                        // The pre-engine snapshot survives a refresh.
                        rebuilt.snapshot = self.scrollables[i].snapshot.clone();
                        rebuilt.dirty = self.scrollables[i].dirty;
                        self.scrollables[i] = rebuilt;
                    }
                    None => self.scrollables.push(rebuilt),
                },
                None => {
                    if let Some(i) = existing {
                        let mut removed = self.scrollables.remove(i);
                        reset_node(scene, &mut removed);
                    }
                }
            }
        }
        // Timelines whose nodes were destroyed by the host drop out here.
        self.scrollables
            .retain(|s| scene.get_node(s.node).is_some());
        self.run_reflow(scene);
        for scrollable in self.scrollables.iter_mut() {
            fill_properties(&mut scrollable.keyframes);
        }
        // The next tick re-renders even if the coordinate is unchanged.
        self.reflow_pending = true;
        Ok(())
    }

    /// Frame at which `element_anchor` of `node` meets `viewport_anchor`.
    pub fn relative_to_absolute(
        &self,
        scene: &Scene,
        node: NodeId,
        viewport_anchor: Anchor,
        element_anchor: Anchor,
    ) -> Option<f64> {
        reflow::relative_to_absolute(scene, node, viewport_anchor, element_anchor)
    }

    /// Start a programmatic scroll animation toward `target`. Supersedes
    /// and completes (cancelled) any active one.
    pub fn animate_to(&mut self, target: f64, options: AnimateToOptions) {
        self.complete_animation(true);
        let start_pos = self.rendered_position;
        self.animate = Some(AnimateState {
            start_pos,
            target: target.clamp(0.0, self.max_position),
            duration_ms: options.duration_ms.max(0.0),
            easing: self.easing.resolve(options.easing.as_deref()),
            start_time: None,
            done: options.done,
        });
    }

    /// Stop the active animation in place, completing it as cancelled.
    pub fn stop_animate_to(&mut self) {
        if self.animate.is_some() {
            let here = self.rendered_position;
            self.complete_animation(true);
            self.raw_position = here;
            self.strategy.jump_to(here);
        }
    }

    pub fn is_animating_to(&self) -> bool {
        self.animate.is_some()
    }

    /// Feed the raw scroll coordinate (desktop mode input).
    pub fn set_scroll_position(&mut self, pos: f64) {
        let pos = pos.clamp(0.0, self.max_position);
        self.raw_position = pos;
        if self.touch_mode {
            self.strategy.jump_to(pos);
        }
    }

    /// The coordinate rendering last happened at.
    pub fn get_position(&self) -> f64 {
        self.rendered_position
    }

    pub fn get_max_position(&self) -> f64 {
        self.max_position
    }

    pub fn touch_start(&mut self, coord: f64, now_ms: f64) {
        self.complete_animation(true);
        self.strategy.touch_start(coord, now_ms);
    }

    pub fn touch_move(&mut self, coord: f64, now_ms: f64) {
        self.strategy.touch_move(coord, now_ms);
    }

    pub fn touch_end(&mut self, now_ms: f64) {
        self.strategy.touch_end(now_ms);
    }

    /// Note a geometry-invalidating change. Requests coalesce; the next
    /// tick reflows once and forces a render.
    pub fn request_reflow(&mut self) {
        self.reflow_pending = true;
    }

    /// Register a crossing-event handler for a declaration name.
    pub fn on(&mut self, event: impl Into<String>, handler: EventHandler) {
        self.handlers.insert(event.into(), handler);
    }

    pub fn off(&mut self, event: &str) {
        self.handlers.remove(event);
    }

    /// Tear down: restore every managed node's pre-engine snapshot and
    /// remove the root tags.
    pub fn destroy(mut self, scene: &mut Scene) {
        self.complete_animation(true);
        for scrollable in self.scrollables.iter_mut() {
            // Owner and broadcast targets both go back to their
            // pre-engine state.
            scrollable.dirty = true;
            reset_node(scene, scrollable);
        }
        let mode_tag = if self.touch_mode { TAG_MOBILE } else { TAG_DESKTOP };
        for id in &self.root_nodes {
            if let Some(node) = scene.get_node_mut(*id) {
                node.backing.remove_tag(TAG_ENGINE);
                node.backing.remove_tag(mode_tag);
            }
        }
    }

    fn run_reflow(&mut self, scene: &mut Scene) {
        let outcome = reflow(scene, &mut self.scrollables, &self.reflow_settings);
        self.max_position = outcome.max_position;
        self.strategy.set_max_position(self.max_position);
        self.raw_position = self.raw_position.clamp(0.0, self.max_position);
    }

    /// Advance the programmatic animation, if any; returns the coordinate
    /// it dictates for this tick.
    fn step_animate_to(&mut self, now_ms: f64) -> Option<f64> {
        let anim = self.animate.as_mut()?;
        let t0 = *anim.start_time.get_or_insert(now_ms);
        let progress = if anim.duration_ms <= 0.0 {
            1.0
        } else {
            ((now_ms - t0) / anim.duration_ms).clamp(0.0, 1.0)
        };
        let eased = (anim.easing)(progress);
        let pos = anim.start_pos + (anim.target - anim.start_pos) * eased;
        if progress >= 1.0 {
            let target = anim.target;
            self.complete_animation(false);
            self.raw_position = target;
            self.strategy.jump_to(target);
            return Some(target);
        }
        Some(pos)
    }

    fn complete_animation(&mut self, cancelled: bool) {
        if let Some(anim) = self.animate.take() {
            if let Some(done) = anim.done {
                done(cancelled);
            }
        }
    }

    fn tag_roots(&mut self, scene: &mut Scene) {
        let mode_tag = if self.touch_mode { TAG_MOBILE } else { TAG_DESKTOP };
        for id in scene.node_ids() {
            let Some(node) = scene.get_node_mut(id) else { continue };
            if node.parent.is_none() {
                node.backing.add_tag(TAG_ENGINE);
                node.backing.add_tag(mode_tag);
                self.root_nodes.push(id);
            }
        }
    }
}

/// Parse one node's declarations into a Scrollable, snapshotting its
/// pre-engine state. Nodes without keyframe declarations yield `None`.
fn build_scrollable(scene: &Scene, id: NodeId) -> Result<Option<Scrollable>, EngineError> {
    let Some(node) = scene.get_node(id) else {
        return Ok(None);
    };
    let parsed = parse_node(node)?;
    if parsed.keyframes.is_empty() {
        return Ok(None);
    }

    let anchor_target = match &parsed.controls.anchor_target {
        Some(selector) => Some(scene.query(selector).ok_or_else(|| {
            EngineError::InvalidAnchorTarget {
                selector: selector.to_string(),
                node: node.name.clone(),
            }
        })?),
        None => None,
    };

    let keyframes = parsed
        .keyframes
        .into_iter()
        .map(|raw| Keyframe {
            name: raw.name,
            spec: raw.spec,
            frame: 0.0,
            props: raw
                .props
                .into_iter()
                .map(|p| {
                    (
                        p.name,
                        PropEntry {
                            value: p.value,
                            easing: p.easing,
                        },
                    )
                })
                .collect(),
        })
        .collect();

    Ok(Some(Scrollable {
        node: id,
        keyframes,
        edge_state: EdgeState::Unset,
        last_rendered_frame: None,
        snapshot: Snapshot {
            props: node.backing.properties(),
            tags: node.backing.tag_set(),
        },
        dirty: false,
        smooth_scrolling: parsed.controls.smooth_scrolling,
        edge_policy: parsed.controls.edge_policy,
        emit_events: parsed.controls.emit_events,
        anchor_target,
        broadcast: parsed.controls.broadcast,
        target_snapshots: BTreeMap::new(),
    }))
}
