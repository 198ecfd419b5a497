//! Scroll-position-driven declarative keyframe animation engine.
//!
//! Hosts attach `data-*` keyframe declarations to scene nodes; the engine
//! parses them, resolves anchors against node geometry, and interpolates
//! arbitrary property values as the scroll coordinate moves. Rendering is
//! tick-driven: the host feeds scroll or touch input and calls
//! [`Engine::tick`] once per frame.
//!
//! ```no_run
//! use glam::DVec2;
//! use scrollkit_core::{Backing, Engine, Options, Scene, SceneNode};
//!
//! let mut scene = Scene::new(DVec2::new(1280.0, 800.0));
//! let hero = scene.add_node(SceneNode::new("hero", Backing::styled()));
//! let node = scene.get_node_mut(hero).unwrap();
//! node.declare("data-0", "opacity:0");
//! node.declare("data-500", "opacity:1");
//!
//! let mut engine = Engine::init(&mut scene, Options::default()).unwrap();
//! engine.set_scroll_position(250.0);
//! engine.tick(&mut scene, 16.0);
//! ```

pub mod easing;
pub mod engine;
pub mod error;
pub mod interpolate;
pub mod parser;
pub mod reflow;
pub mod scene;
pub mod scheduler;
pub mod state;
pub mod timeline;
pub mod value;

pub use easing::{EasingFn, EasingTable};
pub use engine::{AnimateToOptions, Engine, Options, RenderInfo};
pub use error::EngineError;
pub use reflow::{ReflowOutcome, ReflowSettings};
pub use scene::{Backing, Geometry, NodeId, Scene, SceneNode};
pub use scheduler::{DesktopStrategy, ScrollStrategy, TouchStrategy};
pub use state::CrossingEvent;
pub use timeline::{Keyframe, Scrollable};
