//! Named easing functions.
//!
//! The classic curves come from the `keyframe` crate; the scroll-specific
//! ones (`sqrt`, `swing`, `outCubic`, `bounce`) are closed-form closures.
//! Custom curves supplied at init merge over the built-ins and may shadow
//! them by name.

use keyframe::functions::{EaseIn, EaseInOut, EaseOut, Linear};
use keyframe::EasingFunction;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

/// A normalized easing curve: maps progress in `[0, 1]` to `[0, 1]`-ish
/// output (overshooting curves may leave the band).
pub type EasingFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// The per-engine easing table.
pub struct EasingTable {
    map: HashMap<String, EasingFn>,
}

impl EasingTable {
    /// Table containing only the built-in curves.
    pub fn builtin() -> Self {
        let mut map: HashMap<String, EasingFn> = HashMap::new();
        map.insert("linear".into(), Arc::new(|p| Linear.y(p)));
        map.insert("easeIn".into(), Arc::new(|p| EaseIn.y(p)));
        map.insert("easeOut".into(), Arc::new(|p| EaseOut.y(p)));
        map.insert("easeInOut".into(), Arc::new(|p| EaseInOut.y(p)));
        map.insert("quadratic".into(), Arc::new(|p| p * p));
        map.insert("cubic".into(), Arc::new(|p| p * p * p));
        map.insert("swing".into(), Arc::new(|p| 0.5 - (p * PI).cos() / 2.0));
        map.insert("sqrt".into(), Arc::new(f64::sqrt));
        map.insert(
            "outCubic".into(),
            Arc::new(|p| {
                let m = p - 1.0;
                m * m * m + 1.0
            }),
        );
        map.insert("bounce".into(), Arc::new(bounce));
        Self { map }
    }

    /// Merge custom curves over the built-ins.
    pub fn merge(&mut self, custom: HashMap<String, EasingFn>) {
        self.map.extend(custom);
    }

    pub fn get(&self, name: &str) -> Option<EasingFn> {
        self.map.get(name).cloned()
    }

    /// Resolve an optional easing name, falling back to linear. Unknown
    /// names also fall back to linear; declarations are not rejected for a
    /// typo in an easing override.
    pub fn resolve(&self, name: Option<&str>) -> EasingFn {
        name.and_then(|n| self.get(n))
            .unwrap_or_else(|| self.get("linear").unwrap_or(Arc::new(|p| p)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

impl Default for EasingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn bounce(p: f64) -> f64 {
    let a = if p <= 0.5083 {
        3.0
    } else if p <= 0.8489 {
        9.0
    } else if p <= 0.96208 {
        27.0
    } else if p <= 0.99981 {
        91.0
    } else {
        return 1.0;
    };
    1.0 - (3.0 * (p * a * 1.028).cos() / a).abs()
}
