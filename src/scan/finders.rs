//! Navigation and marking scans
//!
//! Each finder is a scan whose predicate rejects the field being looked
//! for, so the failure path of the scan is the answer.

use super::scanner::{scan, Direction, FailurePath};
use crate::tree::{Forest, NodeId};

/// Next viewable field the user has not looked at yet
pub fn find_next_unviewed(
    forest: &mut Forest,
    start_path: Option<&[NodeId]>,
    direction: Direction,
    wrap: bool,
) -> Result<(), FailurePath> {
    let roots = forest.roots().to_vec();
    scan(forest, &roots, start_path, direction, wrap, |f, id| {
        !f.get(id).is_some_and(|n| n.status().is_unviewed())
    })
}

/// Next viewable field that fails validation
pub fn find_next_invalid(
    forest: &mut Forest,
    start_path: Option<&[NodeId]>,
    direction: Direction,
    wrap: bool,
) -> Result<(), FailurePath> {
    let roots = forest.roots().to_vec();
    scan(forest, &roots, start_path, direction, wrap, |f, id| {
        !f.get(id).is_some_and(|n| n.status().is_invalid())
    })
}

/// Next field that should receive focus during sequential navigation
pub fn find_next_tab_stop(
    forest: &mut Forest,
    start_path: Option<&[NodeId]>,
    direction: Direction,
    wrap: bool,
) -> Result<(), FailurePath> {
    let roots = forest.roots().to_vec();
    scan(forest, &roots, start_path, direction, wrap, |f, id| {
        !f.get(id)
            .is_some_and(|n| n.status().is_tab_stop(n.value().is_empty()))
    })
}

/// Apply `mark` to a field, and to its whole subtree when `recursive`
pub fn mark_subtree<M>(forest: &mut Forest, node: NodeId, recursive: bool, mut mark: M)
where
    M: FnMut(&mut Forest, NodeId),
{
    if !recursive {
        mark(forest, node);
        return;
    }
    // The marking predicate never rejects, so the scan cannot fail
    let _ = scan(forest, &[node], None, Direction::Forward, false, |f, id| {
        mark(f, id);
        true
    });
}
