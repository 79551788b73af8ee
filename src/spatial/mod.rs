//! Spatial Values
//!
//! Field text with optional page-coordinate provenance, plus the rules for
//! concatenating such values without losing track of which text is backed
//! by real document positions.

pub mod merge;
pub mod value;

pub use merge::{append, SpatialMode};
pub use value::{SpatialValue, Zone};
