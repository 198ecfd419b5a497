//! # Scroll Strategies
//!
//! Pluggable sources for the rendered scroll coordinate. The engine tick
//! asks the active strategy where rendering should happen; the strategy
//! decides how the raw input coordinate maps to it.
//!
//! [`DesktopStrategy`] follows the host's real scroll coordinate through a
//! short fixed-duration eased window, decoupling raw input jitter from
//! what the interpolator sees. [`TouchStrategy`] ignores the raw
//! coordinate entirely: it tracks drags 1:1 and, on release, runs a
//! closed-form decelerate-to-stop trajectory from the last observed
//! velocity.

/// Where rendering should happen this tick.
pub trait ScrollStrategy {
    /// Map the raw input coordinate to the rendered one at `now_ms`.
    fn rendered_position(&mut self, raw: f64, now_ms: f64) -> f64;

    /// Upper clamp bound, refreshed after every reflow.
    fn set_max_position(&mut self, _max: f64) {}

    /// Move the rendered coordinate immediately, discarding any in-flight
    /// smoothing or momentum.
    fn jump_to(&mut self, _pos: f64) {}

    fn touch_start(&mut self, _coord: f64, _now_ms: f64) {}
    fn touch_move(&mut self, _coord: f64, _now_ms: f64) {}
    fn touch_end(&mut self, _now_ms: f64) {}
}

/// Eases raw scroll input over a fixed window.
#[derive(Debug)]
pub struct DesktopStrategy {
    duration_ms: f64,
    enabled: bool,
    start: f64,
    target: f64,
    start_time: Option<f64>,
    rendered: f64,
}

impl DesktopStrategy {
    pub fn new(enabled: bool, duration_ms: f64) -> Self {
        Self {
            duration_ms,
            enabled,
            start: 0.0,
            target: 0.0,
            start_time: None,
            rendered: 0.0,
        }
    }
}

impl ScrollStrategy for DesktopStrategy {
    fn rendered_position(&mut self, raw: f64, now_ms: f64) -> f64 {
        if !self.enabled || self.duration_ms <= 0.0 {
            self.rendered = raw;
            self.target = raw;
            return raw;
        }
        if raw != self.target {
            // New input restarts the window from wherever rendering got to.
            self.start = self.rendered;
            self.target = raw;
            self.start_time = Some(now_ms);
        }
        let Some(t0) = self.start_time else {
            self.rendered = raw;
            return raw;
        };
        let progress = ((now_ms - t0) / self.duration_ms).clamp(0.0, 1.0);
        self.rendered = self.start + (self.target - self.start) * progress.sqrt();
        if progress >= 1.0 {
            self.start_time = None;
            self.rendered = self.target;
        }
        self.rendered
    }

    fn jump_to(&mut self, pos: f64) {
        self.start = pos;
        self.target = pos;
        self.rendered = pos;
        self.start_time = None;
    }
}

#[derive(Debug, Clone, Copy)]
struct Fling {
    start_pos: f64,
    dist: f64,
    start_time: f64,
    duration: f64,
}

/// Drag-follows-finger with momentum on release.
#[derive(Debug)]
pub struct TouchStrategy {
    /// Constant deceleration, px per ms squared.
    deceleration: f64,
    max_position: f64,
    position: f64,
    dragging: bool,
    last_touch: Option<(f64, f64)>,
    prev_touch: Option<(f64, f64)>,
    fling: Option<Fling>,
}

impl TouchStrategy {
    pub fn new(deceleration: f64) -> Self {
        Self {
            deceleration,
            max_position: 0.0,
            position: 0.0,
            dragging: false,
            last_touch: None,
            prev_touch: None,
            fling: None,
        }
    }

    fn clamp(&self, pos: f64) -> f64 {
        pos.clamp(0.0, self.max_position)
    }
}

impl ScrollStrategy for TouchStrategy {
    fn rendered_position(&mut self, _raw: f64, now_ms: f64) -> f64 {
        if let Some(fling) = self.fling {
            let progress = ((now_ms - fling.start_time) / fling.duration).clamp(0.0, 1.0);
            // Constant deceleration in closed form.
            self.position = fling.start_pos + fling.dist * progress * (2.0 - progress);
            if progress >= 1.0 {
                self.fling = None;
            }
        }
        self.position
    }

    fn set_max_position(&mut self, max: f64) {
        self.max_position = max;
        self.position = self.clamp(self.position);
    }

    fn jump_to(&mut self, pos: f64) {
        self.position = self.clamp(pos);
        self.fling = None;
        self.dragging = false;
        self.last_touch = None;
        self.prev_touch = None;
    }

    fn touch_start(&mut self, coord: f64, now_ms: f64) {
        self.dragging = true;
        self.fling = None;
        self.last_touch = Some((coord, now_ms));
        self.prev_touch = None;
    }

    fn touch_move(&mut self, coord: f64, now_ms: f64) {
        if !self.dragging {
            return;
        }
        if let Some((last_coord, _)) = self.last_touch {
            // Finger moving up scrolls down.
            self.position = self.clamp(self.position + (last_coord - coord));
        }
        self.prev_touch = self.last_touch;
        self.last_touch = Some((coord, now_ms));
    }

    fn touch_end(&mut self, now_ms: f64) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        let (Some((last_coord, last_time)), Some((prev_coord, prev_time))) =
            (self.last_touch, self.prev_touch)
        else {
            return;
        };
        let dt = last_time - prev_time;
        if dt <= 0.0 {
            return;
        }
        let velocity = (prev_coord - last_coord) / dt;
        if velocity == 0.0 {
            return;
        }
        let mut duration = velocity.abs() / self.deceleration;
        let mut dist = velocity * duration / 2.0;

        // Shorten the trajectory proportionally when it would overshoot.
        let landing = self.position + dist;
        let clamped = self.clamp(landing);
        if clamped != landing {
            let available = clamped - self.position;
            duration *= available / dist;
            dist = available;
        }
        // A release pinned at a clamp boundary has no room to glide; a
        // zero-duration fling would divide by itself in the trajectory.
        if duration <= 0.0 || dist == 0.0 {
            return;
        }

        self.fling = Some(Fling {
            start_pos: self.position,
            dist,
            start_time: now_ms,
            duration,
        });
    }
}
