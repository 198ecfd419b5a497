//! # Declaration Parser
//!
//! Reads per-node attribute-like declarations into raw keyframe specs and
//! control flags. Declaration names follow
//! `data[-_constant][-offset[p]][-anchor[-anchor]]` with anchors in
//! `{start, end, top, center, bottom}`; bodies are parsed by the value
//! model. The grammar is an explicit hand-written tokenizer, unit-testable
//! per production.
//!
//! Names that are neither keyframe declarations nor known controls are
//! ignored, so hosts can attach unrelated `data-*` attributes freely.
//! Malformed names that do start like a keyframe declaration are fatal.

use crate::error::EngineError;
use crate::scene::SceneNode;
use crate::value;
use scrollkit_data::{
    AbsoluteAnchor, Anchor, EdgePolicy, FrameSpec, OffsetUnit, PropertySpec, Selector,
};

pub const CTRL_ANCHOR_TARGET: &str = "data-anchor-target";
pub const CTRL_SMOOTH_SCROLLING: &str = "data-smooth-scrolling";
pub const CTRL_EDGE_STRATEGY: &str = "data-edge-strategy";
pub const CTRL_EMIT_EVENTS: &str = "data-emit-events";
pub const CTRL_BROADCAST: &str = "data-broadcast";

/// Sibling control declarations found on one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeControls {
    /// Selector naming the node whose geometry is measured instead of the
    /// owning node's.
    pub anchor_target: Option<Selector>,
    /// Per-node smoothing opt-out (`Some(false)` disables it).
    pub smooth_scrolling: Option<bool>,
    pub edge_policy: Option<EdgePolicy>,
    pub emit_events: bool,
    /// Descendant selector receiving the interpolated values instead of the
    /// owning node.
    pub broadcast: Option<Selector>,
}

/// One keyframe declaration before frame resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawKeyframe {
    /// The declaration name verbatim; doubles as the crossing-event name.
    pub name: String,
    pub spec: FrameSpec,
    pub props: Vec<PropertySpec>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedNode {
    pub keyframes: Vec<RawKeyframe>,
    pub controls: NodeControls,
}

/// Parse every declaration attached to a node.
pub fn parse_node(node: &SceneNode) -> Result<ParsedNode, EngineError> {
    let mut parsed = ParsedNode::default();
    for (name, body) in &node.declarations {
        if parse_control(&mut parsed.controls, name, body)
            .map_err(|reason| invalid(node, name, reason))?
        {
            continue;
        }
        match parse_keyframe_name(name).map_err(|reason| invalid(node, name, reason))? {
            Some(spec) => {
                let props = value::parse_body(body).map_err(|reason| invalid(node, name, reason))?;
                parsed.keyframes.push(RawKeyframe {
                    name: name.clone(),
                    spec,
                    props,
                });
            }
            None => continue,
        }
    }
    Ok(parsed)
}

fn invalid(node: &SceneNode, name: &str, reason: String) -> EngineError {
    EngineError::InvalidDeclaration {
        name: name.to_string(),
        node: node.name.clone(),
        reason,
    }
}

/// Recognize a control declaration; returns whether it was consumed.
fn parse_control(controls: &mut NodeControls, name: &str, body: &str) -> Result<bool, String> {
    match name {
        CTRL_ANCHOR_TARGET => {
            let selector = Selector::parse(body)
                .ok_or_else(|| format!("`{body}` is not a `#name` or `.tag` selector"))?;
            controls.anchor_target = Some(selector);
        }
        CTRL_SMOOTH_SCROLLING => {
            controls.smooth_scrolling = Some(match body.trim() {
                "off" => false,
                "on" | "" => true,
                other => return Err(format!("`{other}` is not `on` or `off`")),
            });
        }
        CTRL_EDGE_STRATEGY => {
            let policy = EdgePolicy::parse(body.trim())
                .ok_or_else(|| format!("`{body}` is not `set`, `ease` or `reset`"))?;
            controls.edge_policy = Some(policy);
        }
        CTRL_EMIT_EVENTS => {
            controls.emit_events = !matches!(body.trim(), "off" | "false");
        }
        CTRL_BROADCAST => {
            let selector = Selector::parse(body)
                .ok_or_else(|| format!("`{body}` is not a `#name` or `.tag` selector"))?;
            controls.broadcast = Some(selector);
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Parse a declaration name against the keyframe grammar.
///
/// Returns `Ok(None)` when the name does not belong to the grammar at all
/// and `Err` when it starts like a keyframe declaration but is malformed.
pub fn parse_keyframe_name(name: &str) -> Result<Option<FrameSpec>, String> {
    let Some(mut rest) = name.strip_prefix("data") else {
        return Ok(None);
    };

    let mut constant: Option<String> = None;
    let mut offset: Option<f64> = None;
    let mut unit = OffsetUnit::Pixels;
    let mut anchors: Vec<&str> = Vec::new();

    while !rest.is_empty() {
        let Some(r) = rest.strip_prefix('-') else {
            // `dataFoo` etc. is some other attribute.
            return Ok(None);
        };
        rest = r;

        if rest.starts_with('_') {
            if constant.is_some() || offset.is_some() || !anchors.is_empty() {
                return Err("named constant must come first".to_string());
            }
            let end = rest.find('-').unwrap_or(rest.len());
            let ident = &rest[1..end];
            if ident.is_empty() {
                return Err("empty constant name".to_string());
            }
            constant = Some(ident.to_string());
            rest = &rest[end..];
        } else if let Some((value, mut len)) = lex_offset(rest) {
            if offset.is_some() {
                return Err("more than one offset".to_string());
            }
            if !anchors.is_empty() {
                return Err("offset must precede anchors".to_string());
            }
            if rest[len..].starts_with('p')
                && matches!(rest[len + 1..].chars().next(), None | Some('-'))
            {
                unit = OffsetUnit::ViewportPercent;
                len += 1;
            }
            offset = Some(value);
            rest = &rest[len..];
        } else {
            let end = rest.find('-').unwrap_or(rest.len());
            let word = &rest[..end];
            match word {
                "start" | "end" | "top" | "center" | "bottom" => anchors.push(word),
                _ => return Ok(None),
            }
            if anchors.len() > 2 {
                return Err("more than two anchors".to_string());
            }
            rest = &rest[end..];
        }
    }

    let offset = offset.unwrap_or(0.0);
    let spec = match anchors.as_slice() {
        [] => FrameSpec::Absolute {
            anchor: AbsoluteAnchor::Start,
            offset,
            unit,
            constant,
        },
        ["start"] => FrameSpec::Absolute {
            anchor: AbsoluteAnchor::Start,
            offset,
            unit,
            constant,
        },
        ["end"] => FrameSpec::Absolute {
            anchor: AbsoluteAnchor::End,
            offset,
            unit,
            constant,
        },
        [single] => {
            // A lone element anchor means "when this edge meets the same
            // viewport edge".
            let anchor = Anchor::parse(single)
                .ok_or_else(|| format!("`{single}` is not a valid anchor"))?;
            FrameSpec::Relative {
                viewport_anchor: anchor,
                element_anchor: anchor,
                offset,
                unit,
                constant,
            }
        }
        [first, second] => {
            let viewport_anchor = Anchor::parse(first).ok_or_else(|| {
                format!("`{first}` cannot open a relative anchor pair")
            })?;
            let element_anchor = Anchor::parse(second).ok_or_else(|| {
                format!("`{second}` cannot close a relative anchor pair")
            })?;
            FrameSpec::Relative {
                viewport_anchor,
                element_anchor,
                offset,
                unit,
                constant,
            }
        }
        _ => return Err("more than two anchors".to_string()),
    };
    Ok(Some(spec))
}

/// Lex `[+-]?\d*\.?\d+` at the start of a name segment.
fn lex_offset(s: &str) -> Option<(f64, usize)> {
    let b = s.as_bytes();
    let mut i = 0;
    if matches!(b.first(), Some(b'-') | Some(b'+')) {
        i = 1;
    }
    let start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    if b.get(i) == Some(&b'.') {
        let mut k = i + 1;
        while k < b.len() && b[k].is_ascii_digit() {
            k += 1;
        }
        if k > i + 1 {
            i = k;
        }
    }
    if i == start {
        return None;
    }
    s[..i].parse::<f64>().ok().map(|v| (v, i))
}
