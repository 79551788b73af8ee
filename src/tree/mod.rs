//! Tree Module - Arena-based field forest
//!
//! Implements the document's field hierarchy using:
//! - Arena allocation for fields
//! - NodeId (u32) indices for parents, children and scan paths
//! - Siblings kept sorted by order key
//! - Explicit status transitions and validator capabilities

pub mod forest;
pub mod node;
pub mod path;
pub mod status;
pub mod validator;

pub use forest::Forest;
pub use node::{AttributeNode, NodeId};
pub use status::{FieldStatus, HintType, TabStopMode};
pub use validator::{ListValidator, Validator};
