use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker substituted for each numeric literal when a value is tokenized.
pub const SLOT: &str = "{?}";

/// A reference point on the element being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Center,
    Bottom,
}

impl Anchor {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "top" => Some(Anchor::Top),
            "center" => Some(Anchor::Center),
            "bottom" => Some(Anchor::Bottom),
            _ => None,
        }
    }

    /// Fraction of an extent this anchor sits at (top = 0, bottom = 1).
    pub fn fraction(self) -> f64 {
        match self {
            Anchor::Top => 0.0,
            Anchor::Center => 0.5,
            Anchor::Bottom => 1.0,
        }
    }
}

/// Absolute-mode anchor: measured from the start or the end of the
/// scrollable extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsoluteAnchor {
    Start,
    End,
}

/// Unit of a declaration offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetUnit {
    /// Plain pixels, multiplied by the configured absolute-mode scale.
    Pixels,
    /// Percentage of the current viewport extent (the `p` suffix).
    ViewportPercent,
}

/// Where on the scroll axis a keyframe sits, before resolution.
///
/// The derived absolute frame is recomputed on every reflow and stored on
/// the owning keyframe, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FrameSpec {
    Absolute {
        anchor: AbsoluteAnchor,
        offset: f64,
        unit: OffsetUnit,
        /// Named constant reference (`_name`), resolved from the options map.
        constant: Option<String>,
    },
    Relative {
        viewport_anchor: Anchor,
        element_anchor: Anchor,
        offset: f64,
        unit: OffsetUnit,
        constant: Option<String>,
    },
}

impl FrameSpec {
    pub fn constant(&self) -> Option<&str> {
        match self {
            FrameSpec::Absolute { constant, .. } | FrameSpec::Relative { constant, .. } => {
                constant.as_deref()
            }
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, FrameSpec::Relative { .. })
    }

    pub fn is_end_anchored(&self) -> bool {
        matches!(
            self,
            FrameSpec::Absolute {
                anchor: AbsoluteAnchor::End,
                ..
            }
        )
    }
}

/// Behavior applied while the current frame sits outside a Scrollable's
/// declared range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePolicy {
    /// Apply the literal boundary keyframe values, no easing.
    #[default]
    Set,
    /// Clamp the frame to the boundary and interpolate as if in range.
    Ease,
    /// Restore the node's pre-engine snapshot.
    Reset,
}

impl EdgePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "set" => Some(EdgePolicy::Set),
            "ease" => Some(EdgePolicy::Ease),
            "reset" => Some(EdgePolicy::Reset),
            _ => None,
        }
    }
}

/// Scroll direction since the last rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    Up,
}

/// A property value with its numeric payload lifted out of the text.
///
/// Two `Tokenized` values interpolated for the same property must share the
/// template and the slot count; anything else is a shape mismatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PropertyValue {
    Tokenized { template: String, numbers: Vec<f64> },
    /// Stored verbatim (the `!` marker); never numerically blended.
    Verbatim { text: String },
}

impl PropertyValue {
    pub fn slot_count(&self) -> usize {
        match self {
            PropertyValue::Tokenized { numbers, .. } => numbers.len(),
            PropertyValue::Verbatim { .. } => 0,
        }
    }

    /// Reassemble the value text, substituting `numbers` into the template
    /// in slot order.
    pub fn render_with(&self, numbers: &[f64]) -> String {
        match self {
            PropertyValue::Tokenized { template, .. } => {
                let mut out = String::with_capacity(template.len());
                let mut rest = template.as_str();
                let mut idx = 0usize;
                while let Some(pos) = rest.find(SLOT) {
                    out.push_str(&rest[..pos]);
                    if let Some(n) = numbers.get(idx) {
                        out.push_str(&format_number(*n));
                    }
                    idx += 1;
                    rest = &rest[pos + SLOT.len()..];
                }
                out.push_str(rest);
                out
            }
            PropertyValue::Verbatim { text } => text.clone(),
        }
    }

    /// The value text with its own numbers substituted back in.
    pub fn render(&self) -> String {
        match self {
            PropertyValue::Tokenized { numbers, .. } => self.render_with(numbers),
            PropertyValue::Verbatim { text } => text.clone(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// One `name[easing]:value` entry from a declaration body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    /// Per-property easing override naming an entry in the easing table.
    pub easing: Option<String>,
    pub value: PropertyValue,
}

/// Minimal node selector used by anchor-target overrides and broadcast
/// declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "lowercase")]
pub enum Selector {
    /// A `#name` selector, matching a node by its unique name.
    Id(String),
    /// A `.tag` selector, matching nodes carrying the tag.
    Tag(String),
}

impl Selector {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix('#') {
            (!rest.is_empty()).then(|| Selector::Id(rest.to_string()))
        } else if let Some(rest) = s.strip_prefix('.') {
            (!rest.is_empty()).then(|| Selector::Tag(rest.to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(name) => write!(f, "#{name}"),
            Selector::Tag(tag) => write!(f, ".{tag}"),
        }
    }
}

/// Shortest-roundtrip formatting, so `25.0` renders as `25` and `12.5`
/// stays `12.5`.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    format!("{n}")
}
