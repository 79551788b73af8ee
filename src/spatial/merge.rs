//! Spatial Merge Rules
//!
//! Downstream code tells "field has real spatial backing" apart from "field
//! is plain text" by looking at zones, so every concatenation goes through
//! [`append`] with an explicit mode.

use super::value::SpatialValue;

/// How a query branch contributes provenance to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialMode {
    /// Keep provenance from either side
    #[default]
    Normal,
    /// Like `Normal`, and carried across relational query boundaries
    Force,
    /// Keep the right side's zones but the left side's text
    Only,
    /// Drop all provenance
    None,
}

impl SpatialMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Some(SpatialMode::Normal),
            "force" => Some(SpatialMode::Force),
            "only" => Some(SpatialMode::Only),
            "none" => Some(SpatialMode::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpatialMode::Normal => "normal",
            SpatialMode::Force => "force",
            SpatialMode::Only => "only",
            SpatialMode::None => "none",
        }
    }
}

/// Concatenate `b` onto `a` under `mode`.
///
/// `Only` is lossy and not associative: the text of `b` is discarded.
pub fn append(mut a: SpatialValue, b: &SpatialValue, mode: SpatialMode) -> SpatialValue {
    match mode {
        SpatialMode::Normal | SpatialMode::Force => {
            a.push_text(b.text());
            a.extend_zones(b.zones());
            a
        }
        SpatialMode::Only => {
            a.replace_zones(b.zones().to_vec());
            a
        }
        SpatialMode::None => {
            a.push_text(b.text());
            a.into_plain()
        }
    }
}
