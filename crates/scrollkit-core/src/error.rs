use thiserror::Error;

/// Engine error taxonomy.
///
/// Init-time structural errors abort initialization with no partial state.
/// `ValueShapeMismatch` is raised per tick and isolated to the offending
/// Scrollable; it reaches callers only through the diagnostics channel.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An anchor-target override selector resolved to no node. Fatal.
    #[error("anchor target `{selector}` on node `{node}` does not resolve to any node")]
    InvalidAnchorTarget { selector: String, node: String },

    /// A declaration could not be parsed into a keyframe or control. Fatal.
    #[error("invalid declaration `{name}` on node `{node}`: {reason}")]
    InvalidDeclaration {
        name: String,
        node: String,
        reason: String,
    },

    /// Two adjacent keyframe values for one property cannot be blended.
    #[error("keyframe values for `{property}` cannot be blended: {detail}")]
    ValueShapeMismatch { property: String, detail: String },
}
