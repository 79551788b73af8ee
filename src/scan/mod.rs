//! Field Tree Scanning
//!
//! One ordered traversal shared by navigation (next unviewed, next invalid,
//! next tab stop) and by recursive status marking.
//!
//! Forward order is pre-order: a field, then its children by order key.
//! Backward order is the exact reverse. A scan may start after a given
//! field and optionally wrap around to end on it.

pub mod finders;
pub mod scanner;

pub use finders::{
    find_next_invalid, find_next_tab_stop, find_next_unviewed, mark_subtree,
};
pub use scanner::{scan, Direction, FailurePath};
