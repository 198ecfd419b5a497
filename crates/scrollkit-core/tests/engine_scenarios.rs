//! End-to-end engine scenarios.
//!
//! Scenes are described as JSON fixtures and driven through the public
//! `Engine` API tick by tick. Run with:
//! cargo test -p scrollkit-core --test engine_scenarios

use anyhow::Result;
use glam::DVec2;
use scrollkit_core::{Backing, Engine, Geometry, NodeId, Options, Scene, SceneNode};
use scrollkit_data::{Anchor, Direction, Selector};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Build a scene from a JSON array of `{name, top, height, decls}` nodes.
fn build_scene(nodes: serde_json::Value) -> Scene {
    let mut scene = Scene::new(DVec2::new(1280.0, 800.0));
    for item in nodes.as_array().expect("array of node specs") {
        let name = item["name"].as_str().expect("node name");
        let id = scene.add_node(SceneNode::new(name, Backing::styled()));
        let node = scene.get_node_mut(id).expect("fresh node");
        node.geometry = Geometry::new(
            0.0,
            item["top"].as_f64().unwrap_or(0.0),
            100.0,
            item["height"].as_f64().unwrap_or(0.0),
        );
        if let Some(decls) = item["decls"].as_object() {
            for (decl, body) in decls {
                node.declare(decl.as_str(), body.as_str().unwrap_or(""));
            }
        }
    }
    scene
}

fn find(scene: &Scene, name: &str) -> NodeId {
    scene
        .query(&Selector::Id(name.to_string()))
        .unwrap_or_else(|| panic!("no node named {name}"))
}

fn prop(scene: &Scene, name: &str, property: &str) -> Option<String> {
    scene
        .get_node(find(scene, name))?
        .backing
        .property(property)
        .map(ToString::to_string)
}

/// Smoothing off so rendered == raw on every tick.
fn instant() -> Options {
    Options {
        smooth_scrolling: false,
        ..Default::default()
    }
}

mod interpolation {
    use super::*;

    #[test]
    fn opacity_fades_linearly_across_its_range() -> Result<()> {
        init_tracing();
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;

        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0.5"));
        Ok(())
    }

    #[test]
    fn boundary_frames_render_exact_keyframe_values() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-100": "opacity:0", "data-200": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;

        engine.set_scroll_position(100.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0"));
        engine.set_scroll_position(200.0);
        engine.tick(&mut scene, 16.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("1"));
        Ok(())
    }

    #[test]
    fn default_edge_policy_clamps_outside_the_range() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-100": "opacity:0", "data-200": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;

        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0"));
        engine.set_scroll_position(400.0);
        engine.tick(&mut scene, 16.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("1"));
        Ok(())
    }

    #[test]
    fn multi_slot_values_blend_slot_wise() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {
                "data-0": "transform:translate(0px, 0px)",
                "data-100": "transform:translate(100px, 50px)"
            }}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;

        engine.set_scroll_position(25.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(
            prop(&scene, "hero", "transform").as_deref(),
            Some("translate(25px, 12.5px)")
        );
        Ok(())
    }

    #[test]
    fn mismatched_shapes_skip_only_the_offending_node() -> Result<()> {
        init_tracing();
        let mut scene = build_scene(json!([
            {"name": "broken", "decls": {
                "data-0": "transform:translate(0px, 0px)",
                "data-100": "transform:translate(50px)"
            }},
            {"name": "fine", "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;

        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "broken", "transform"), None);
        assert_eq!(prop(&scene, "fine", "opacity").as_deref(), Some("0.5"));
        Ok(())
    }

    #[test]
    fn filler_carries_properties_across_sparse_keyframes() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {
                "data-0": "opacity:0",
                "data-100": "left:10px",
                "data-200": "opacity:1"
            }}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;

        // `left` was never declared at frame 0; the backward pass supplies
        // it, so it holds steady through the first segment.
        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "hero", "left").as_deref(), Some("10px"));
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0.25"));
        Ok(())
    }
}

mod events {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(engine: &mut Engine, hits: &Rc<RefCell<Vec<(String, Direction)>>>, names: &[&str]) {
        for name in names {
            let sink = hits.clone();
            engine.on(
                *name,
                Box::new(move |e| sink.borrow_mut().push((e.name.clone(), e.direction))),
            );
        }
    }

    #[test]
    fn down_scroll_fires_crossed_keyframes_ascending() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {
                "data-emit-events": "",
                "data-100": "opacity:0",
                "data-200": "opacity:0.5",
                "data-300": "opacity:1"
            }}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;
        let hits = Rc::new(RefCell::new(Vec::new()));
        record(&mut engine, &hits, &["data-100", "data-200", "data-300"]);

        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        engine.set_scroll_position(250.0);
        engine.tick(&mut scene, 16.0);

        let seen = hits.borrow();
        assert_eq!(
            *seen,
            vec![
                ("data-100".to_string(), Direction::Down),
                ("data-200".to_string(), Direction::Down)
            ]
        );
        Ok(())
    }

    #[test]
    fn up_scroll_fires_crossed_keyframes_descending() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {
                "data-emit-events": "",
                "data-100": "opacity:0",
                "data-200": "opacity:0.5",
                "data-300": "opacity:1"
            }}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;
        let hits = Rc::new(RefCell::new(Vec::new()));
        record(&mut engine, &hits, &["data-100", "data-200", "data-300"]);

        engine.set_scroll_position(350.0);
        engine.tick(&mut scene, 0.0);
        engine.set_scroll_position(150.0);
        engine.tick(&mut scene, 16.0);

        let seen = hits.borrow();
        assert_eq!(
            *seen,
            vec![
                ("data-300".to_string(), Direction::Up),
                ("data-200".to_string(), Direction::Up)
            ]
        );
        Ok(())
    }

    #[test]
    fn no_events_without_the_opt_in() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-100": "opacity:0", "data-200": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;
        let hits = Rc::new(RefCell::new(Vec::new()));
        record(&mut engine, &hits, &["data-100", "data-200"]);

        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        engine.set_scroll_position(250.0);
        engine.tick(&mut scene, 16.0);
        assert!(hits.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn off_unregisters_a_handler() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {
                "data-emit-events": "",
                "data-100": "opacity:0",
                "data-200": "opacity:1"
            }}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;
        let hits = Rc::new(RefCell::new(Vec::new()));
        record(&mut engine, &hits, &["data-100"]);
        engine.off("data-100");

        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        engine.set_scroll_position(150.0);
        engine.tick(&mut scene, 16.0);
        assert!(hits.borrow().is_empty());
        Ok(())
    }
}

mod reflow {
    use super::*;

    #[test]
    fn relative_declaration_resolves_from_element_geometry() -> Result<()> {
        // Element bottom sits at 400; a 50px offset pulls the frame to 350.
        let mut scene = build_scene(json!([
            {"name": "hero", "top": 300.0, "height": 100.0, "decls": {
                "data-50-top-bottom": "opacity:0",
                "data-500": "opacity:1"
            }}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;

        engine.set_scroll_position(350.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0"));
        engine.set_scroll_position(425.0);
        engine.tick(&mut scene, 16.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0.5"));
        Ok(())
    }

    #[test]
    fn end_anchor_tracks_the_largest_declared_frame() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "long", "decls": {"data-0": "opacity:0", "data-900": "opacity:1"}},
            {"name": "outro", "decls": {
                "data-100-end": "top:0px",
                "data-end": "top:50px"
            }}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;

        assert_eq!(engine.get_max_position(), 900.0);
        engine.set_scroll_position(850.0);
        engine.tick(&mut scene, 0.0);
        // Between 800 and 900, halfway.
        assert_eq!(prop(&scene, "outro", "top").as_deref(), Some("25px"));
        Ok(())
    }

    #[test]
    fn anchor_target_measures_another_node() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "stage", "top": 600.0, "height": 200.0},
            {"name": "hero", "top": 0.0, "height": 10.0, "decls": {
                "data-anchor-target": "#stage",
                "data-top": "opacity:0",
                "data-bottom-bottom": "opacity:1"
            }}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;

        // Frames come from stage's geometry: top at 600, bottom-bottom at 0.
        engine.set_scroll_position(300.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0.5"));
        Ok(())
    }

    #[test]
    fn resize_reflows_once_and_rerenders_in_place() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "top": 1000.0, "height": 100.0, "decls": {
                "data-top": "opacity:0",
                "data-100-top": "opacity:1"
            }}
        ]));
        scene.content_extent = 2000.0;
        let mut engine = Engine::init(&mut scene, instant())?;

        engine.set_scroll_position(950.0);
        engine.tick(&mut scene, 0.0);
        let before = prop(&scene, "hero", "opacity").expect("rendered");

        let id = find(&scene, "hero");
        scene.get_node_mut(id).expect("hero").geometry = Geometry::new(0.0, 1050.0, 100.0, 100.0);
        engine.request_reflow();
        engine.request_reflow();
        engine.tick(&mut scene, 16.0);
        let after = prop(&scene, "hero", "opacity").expect("rendered");
        assert_ne!(before, after);
        Ok(())
    }

    #[test]
    fn relative_to_absolute_reads_current_geometry() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "top": 1000.0, "height": 200.0,
             "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}}
        ]));
        let engine = Engine::init(&mut scene, instant())?;
        let id = find(&scene, "hero");
        let frame = engine
            .relative_to_absolute(&scene, id, Anchor::Bottom, Anchor::Top)
            .expect("node exists");
        assert_eq!(frame, 200.0);
        Ok(())
    }

    #[test]
    fn refresh_picks_up_changed_declarations() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;
        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0.5"));

        let id = find(&scene, "hero");
        scene.get_node_mut(id).expect("hero").declare("data-100", "opacity:0.6");
        engine.refresh(&mut scene, Some(&[id]))?;
        engine.tick(&mut scene, 16.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0.3"));
        Ok(())
    }

    #[test]
    fn refresh_drops_timelines_of_destroyed_nodes() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "gone", "decls": {"data-0": "opacity:0", "data-900": "opacity:1"}},
            {"name": "stays", "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;
        assert_eq!(engine.get_max_position(), 900.0);

        scene.destroy_node(find(&scene, "gone"));
        engine.refresh(&mut scene, None)?;
        // The destroyed node's frames no longer stretch the extent.
        assert_eq!(engine.get_max_position(), 100.0);
        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "stays", "opacity").as_deref(), Some("0.5"));
        Ok(())
    }

    #[test]
    fn refresh_resets_nodes_that_lost_their_declarations() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;
        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);

        let id = find(&scene, "hero");
        scene.get_node_mut(id).expect("hero").declarations.clear();
        engine.refresh(&mut scene, Some(&[id]))?;
        assert_eq!(prop(&scene, "hero", "opacity"), None);
        Ok(())
    }
}

mod scheduling {
    use super::*;
    use scrollkit_core::AnimateToOptions;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn smoothing_window_converges_on_the_raw_coordinate() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, Options::default())?;
        engine.tick(&mut scene, 0.0);
        engine.set_scroll_position(100.0);
        engine.tick(&mut scene, 10.0);
        engine.tick(&mut scene, 60.0);
        let partway: f64 = prop(&scene, "hero", "opacity")
            .expect("rendered")
            .parse()?;
        assert!(partway > 0.0 && partway < 1.0, "got {partway}");
        engine.tick(&mut scene, 210.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("1"));
        Ok(())
    }

    #[test]
    fn per_node_opt_out_bypasses_smoothing() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "smooth", "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}},
            {"name": "direct", "decls": {
                "data-smooth-scrolling": "off",
                "data-0": "opacity:0",
                "data-100": "opacity:1"
            }}
        ]));
        let mut engine = Engine::init(&mut scene, Options::default())?;
        engine.tick(&mut scene, 0.0);
        engine.set_scroll_position(100.0);
        engine.tick(&mut scene, 10.0);
        engine.tick(&mut scene, 60.0);

        assert_eq!(prop(&scene, "direct", "opacity").as_deref(), Some("1"));
        let smoothed: f64 = prop(&scene, "smooth", "opacity")
            .expect("rendered")
            .parse()?;
        assert!(smoothed < 1.0);
        Ok(())
    }

    #[test]
    fn animate_to_lands_exactly_and_reports_completion() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-0": "opacity:0", "data-500": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;
        engine.tick(&mut scene, 0.0);

        let finished = Rc::new(Cell::new(None));
        let seen = finished.clone();
        engine.animate_to(
            400.0,
            AnimateToOptions {
                duration_ms: 100.0,
                easing: Some("linear".into()),
                done: Some(Box::new(move |cancelled| seen.set(Some(cancelled)))),
            },
        );
        engine.tick(&mut scene, 10.0);
        engine.tick(&mut scene, 60.0);
        assert_eq!(engine.get_position(), 200.0);
        engine.tick(&mut scene, 110.0);
        assert_eq!(engine.get_position(), 400.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("0.8"));
        assert_eq!(finished.get(), Some(false));
        assert!(!engine.is_animating_to());
        Ok(())
    }

    #[test]
    fn stop_animate_to_cancels_in_place() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-0": "opacity:0", "data-500": "opacity:1"}}
        ]));
        let mut engine = Engine::init(&mut scene, instant())?;
        engine.tick(&mut scene, 0.0);

        let finished = Rc::new(Cell::new(None));
        let seen = finished.clone();
        engine.animate_to(
            400.0,
            AnimateToOptions {
                duration_ms: 100.0,
                easing: Some("linear".into()),
                done: Some(Box::new(move |cancelled| seen.set(Some(cancelled)))),
            },
        );
        engine.tick(&mut scene, 10.0);
        engine.tick(&mut scene, 60.0);
        engine.stop_animate_to();
        assert_eq!(finished.get(), Some(true));
        assert!(!engine.is_animating_to());
        // Position stays where the animation was interrupted.
        engine.tick(&mut scene, 200.0);
        assert_eq!(engine.get_position(), 200.0);
        Ok(())
    }

    #[test]
    fn touch_momentum_lands_on_its_clamped_target() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}}
        ]));
        let mut engine = Engine::init(
            &mut scene,
            Options {
                mobile_check: Some(Box::new(|| true)),
                ..Default::default()
            },
        )?;
        engine.tick(&mut scene, 0.0);

        // Drag 30px, release at 2 px/ms; the projected 500px glide is cut
        // down to the 70px of room left.
        engine.touch_start(500.0, 0.0);
        engine.touch_move(490.0, 10.0);
        engine.touch_move(470.0, 20.0);
        engine.touch_end(20.0);
        engine.tick(&mut scene, 2000.0);
        assert_eq!(engine.get_position(), 100.0);
        assert_eq!(prop(&scene, "hero", "opacity").as_deref(), Some("1"));
        Ok(())
    }
}

mod teardown {
    use super::*;

    #[test]
    fn destroy_restores_every_managed_node() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "a", "decls": {"data-0": "opacity:0", "data-100": "opacity:1"}},
            {"name": "b", "decls": {"data-0": "top:0px", "data-100": "top:50px"}}
        ]));
        let a = find(&scene, "a");
        scene
            .get_node_mut(a)
            .expect("a")
            .backing
            .set_property("opacity", "0.7");

        let mut engine = Engine::init(&mut scene, instant())?;
        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "a", "opacity").as_deref(), Some("0.5"));
        assert_eq!(prop(&scene, "b", "top").as_deref(), Some("25px"));

        engine.destroy(&mut scene);
        assert_eq!(prop(&scene, "a", "opacity").as_deref(), Some("0.7"));
        assert_eq!(prop(&scene, "b", "top"), None);
        assert!(!scene.get_node(a).expect("a").backing.has_tag("sk-between"));
        assert!(!scene.get_node(a).expect("a").backing.has_tag("sk"));
        Ok(())
    }

    #[test]
    fn destroy_restores_broadcast_targets() -> Result<()> {
        let mut scene = build_scene(json!([
            {"name": "hero", "decls": {
                "data-broadcast": ".glyph",
                "data-0": "opacity:0",
                "data-100": "opacity:1"
            }}
        ]));
        let hero = find(&scene, "hero");
        let glyph = scene.add_node(SceneNode::new("glyph", Backing::styled()));
        scene.try_add_child(hero, glyph);
        let backing = &mut scene.get_node_mut(glyph).expect("glyph").backing;
        backing.add_tag("glyph");
        backing.set_property("opacity", "0.9");

        let mut engine = Engine::init(&mut scene, instant())?;
        engine.set_scroll_position(50.0);
        engine.tick(&mut scene, 0.0);
        assert_eq!(prop(&scene, "glyph", "opacity").as_deref(), Some("0.5"));

        engine.destroy(&mut scene);
        assert_eq!(prop(&scene, "glyph", "opacity").as_deref(), Some("0.9"));
        assert!(scene.get_node(glyph).expect("glyph").backing.has_tag("glyph"));
        Ok(())
    }
}
