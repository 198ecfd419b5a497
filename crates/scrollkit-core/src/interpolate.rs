//! # Interpolator
//!
//! Pure frame evaluation: bracket lookup, eased slot-wise lerp, and
//! reassembly into the shared template. Identical `(frame, timeline)` input
//! always yields identical output; application to nodes happens in the
//! state machine, not here.

use crate::error::EngineError;
use crate::timeline::Keyframe;
use scrollkit_data::PropertyValue;

/// Locate the bracketing pair `(left, right)` with
/// `left.frame <= frame <= right.frame`. Ascending scan; first match wins
/// on coincident frames. `None` when the frame is outside the timeline or
/// the timeline has fewer than two keyframes.
pub fn bracket(keyframes: &[Keyframe], frame: f64) -> Option<(usize, usize)> {
    for i in 0..keyframes.len().saturating_sub(1) {
        if keyframes[i].frame <= frame && frame <= keyframes[i + 1].frame {
            return Some((i, i + 1));
        }
    }
    None
}

/// Raw progress within a segment. A degenerate interval (coincident
/// frames) must not propagate a non-number; it deterministically resolves
/// to `1.0`.
pub fn segment_progress(left: f64, right: f64, frame: f64) -> f64 {
    if right == left {
        1.0
    } else {
        (frame - left) / (right - left)
    }
}

/// Blend one property across a keyframe pair at eased `progress`,
/// reassembling the result in the shared template.
///
/// Verbatim values are never numerically blended: the left value holds
/// until progress reaches 1, which keeps boundary continuity intact.
pub fn blend(
    property: &str,
    left: &PropertyValue,
    right: &PropertyValue,
    progress: f64,
) -> Result<String, EngineError> {
    match (left, right) {
        (
            PropertyValue::Tokenized {
                template: lt,
                numbers: ln,
            },
            PropertyValue::Tokenized {
                template: rt,
                numbers: rn,
            },
        ) => {
            if ln.len() != rn.len() {
                return Err(EngineError::ValueShapeMismatch {
                    property: property.to_string(),
                    detail: format!("{} numeric slots vs {}", ln.len(), rn.len()),
                });
            }
            if lt != rt {
                return Err(EngineError::ValueShapeMismatch {
                    property: property.to_string(),
                    detail: format!("templates differ (`{lt}` vs `{rt}`)"),
                });
            }
            let blended: Vec<f64> = ln
                .iter()
                .zip(rn.iter())
                .map(|(a, b)| a + (b - a) * progress)
                .collect();
            Ok(left.render_with(&blended))
        }
        (PropertyValue::Verbatim { text: lt }, PropertyValue::Verbatim { text: rt }) => {
            Ok(if progress < 1.0 { lt.clone() } else { rt.clone() })
        }
        _ => Err(EngineError::ValueShapeMismatch {
            property: property.to_string(),
            detail: "verbatim value paired with a tokenized one".to_string(),
        }),
    }
}
