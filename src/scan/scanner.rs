//! Generic ordered forest traversal
//!
//! With a start path the scan runs in up to two passes:
//! 1. everything strictly after the start field, to the end of the forest
//! 2. (when wrapping) the beginning of the forest up to and including the
//!    start field
//!
//! Each generation gets a cutoff: the order key of the start path's field at
//! that level. Siblings before the cutoff (in scan direction) belong to one
//! pass, siblings after it to the other, and the path field itself is split
//! between the passes according to whether it precedes or follows the
//! start field in scan order.

use std::cmp::Ordering;

use crate::tree::{Forest, NodeId};

/// Scan direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "forward" => Some(Direction::Forward),
            "backward" => Some(Direction::Backward),
            _ => None,
        }
    }
}

/// Root-to-field path of the first field a scan predicate rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePath(Vec<NodeId>);

impl FailurePath {
    /// The rejected field
    pub fn node(&self) -> Option<NodeId> {
        self.0.last().copied()
    }

    /// Ancestors of the rejected field, then the field itself
    pub fn genealogy(&self) -> &[NodeId] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<NodeId> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// No start path: the whole forest
    All,
    /// Strictly after the start field
    After,
    /// From the beginning through the start field
    UpTo,
}

/// Position of a sibling relative to the level's cutoff, in scan order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Before,
    On,
    After,
}

/// Scan `roots` (and their descendants) calling `predicate` on every field
/// in scan order.
///
/// The scan stops at the first field for which `predicate` returns false
/// and returns that field's full ancestor path. An empty forest succeeds.
pub fn scan<F>(
    forest: &mut Forest,
    roots: &[NodeId],
    start_path: Option<&[NodeId]>,
    direction: Direction,
    wrap: bool,
    mut predicate: F,
) -> Result<(), FailurePath>
where
    F: FnMut(&mut Forest, NodeId) -> bool,
{
    let outcome = match start_path.filter(|p| !p.is_empty()) {
        None => scan_level(forest, roots, None, Pass::All, direction, &mut predicate),
        Some(path) => {
            let first = scan_level(forest, roots, Some(path), Pass::After, direction, &mut predicate);
            if first.is_ok() && wrap {
                scan_level(forest, roots, Some(path), Pass::UpTo, direction, &mut predicate)
            } else {
                first
            }
        }
    };

    outcome.map_err(|failed| FailurePath(forest.genealogy(failed)))
}

fn scan_level<F>(
    forest: &mut Forest,
    level: &[NodeId],
    cutoff_path: Option<&[NodeId]>,
    pass: Pass,
    direction: Direction,
    predicate: &mut F,
) -> Result<(), NodeId>
where
    F: FnMut(&mut Forest, NodeId) -> bool,
{
    let cutoff = match (pass, cutoff_path) {
        (Pass::All, _) | (_, None) => None,
        (_, Some(path)) => path.split_first().map(|(&head, rest)| {
            let key = forest.order_key_of(head).to_string();
            let index = level.iter().position(|&s| s == head);
            (head, key, index, rest)
        }),
    };

    let order: Box<dyn Iterator<Item = (usize, &NodeId)>> = match direction {
        Direction::Forward => Box::new(level.iter().enumerate()),
        Direction::Backward => Box::new(level.iter().enumerate().rev()),
    };

    for (index, &sibling) in order {
        let Some((head, key, head_index, rest)) = &cutoff else {
            scan_full(forest, sibling, direction, predicate)?;
            continue;
        };

        let side = if sibling == *head {
            Side::On
        } else {
            let mut ord = forest.order_key_of(sibling).cmp(key.as_str());
            if ord == Ordering::Equal {
                ord = match head_index {
                    Some(hi) => index.cmp(hi),
                    None => Ordering::Greater,
                };
            }
            if direction == Direction::Backward {
                ord = ord.reverse();
            }
            match ord {
                Ordering::Less => Side::Before,
                _ => Side::After,
            }
        };

        match (pass, side) {
            (Pass::After, Side::After) | (Pass::UpTo, Side::Before) => {
                scan_full(forest, sibling, direction, predicate)?;
            }
            (Pass::After, Side::On) => {
                scan_path_after(forest, sibling, rest, direction, predicate)?;
            }
            (Pass::UpTo, Side::On) => {
                scan_path_up_to(forest, sibling, rest, direction, predicate)?;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Scan a field and its whole subtree
fn scan_full<F>(
    forest: &mut Forest,
    node: NodeId,
    direction: Direction,
    predicate: &mut F,
) -> Result<(), NodeId>
where
    F: FnMut(&mut Forest, NodeId) -> bool,
{
    let children = forest.children(node).to_vec();
    match direction {
        Direction::Forward => {
            visit(forest, node, predicate)?;
            scan_level(forest, &children, None, Pass::All, direction, predicate)
        }
        Direction::Backward => {
            scan_level(forest, &children, None, Pass::All, direction, predicate)?;
            visit(forest, node, predicate)
        }
    }
}

/// The part of a start-path field's subtree that comes after the start field
fn scan_path_after<F>(
    forest: &mut Forest,
    node: NodeId,
    rest: &[NodeId],
    direction: Direction,
    predicate: &mut F,
) -> Result<(), NodeId>
where
    F: FnMut(&mut Forest, NodeId) -> bool,
{
    let children = forest.children(node).to_vec();
    match (direction, rest.is_empty()) {
        // The start field's descendants follow it
        (Direction::Forward, true) => {
            scan_level(forest, &children, None, Pass::All, direction, predicate)
        }
        (Direction::Forward, false) => {
            scan_level(forest, &children, Some(rest), Pass::After, direction, predicate)
        }
        // Backward, the start field's descendants precede it
        (Direction::Backward, true) => Ok(()),
        (Direction::Backward, false) => {
            scan_level(forest, &children, Some(rest), Pass::After, direction, predicate)?;
            visit(forest, node, predicate)
        }
    }
}

/// The part of a start-path field's subtree that comes up to the start field
fn scan_path_up_to<F>(
    forest: &mut Forest,
    node: NodeId,
    rest: &[NodeId],
    direction: Direction,
    predicate: &mut F,
) -> Result<(), NodeId>
where
    F: FnMut(&mut Forest, NodeId) -> bool,
{
    let children = forest.children(node).to_vec();
    match (direction, rest.is_empty()) {
        (Direction::Forward, true) => visit(forest, node, predicate),
        (Direction::Forward, false) => {
            visit(forest, node, predicate)?;
            scan_level(forest, &children, Some(rest), Pass::UpTo, direction, predicate)
        }
        (Direction::Backward, true) => {
            scan_level(forest, &children, None, Pass::All, direction, predicate)?;
            visit(forest, node, predicate)
        }
        (Direction::Backward, false) => {
            scan_level(forest, &children, Some(rest), Pass::UpTo, direction, predicate)
        }
    }
}

#[inline]
fn visit<F>(forest: &mut Forest, node: NodeId, predicate: &mut F) -> Result<(), NodeId>
where
    F: FnMut(&mut Forest, NodeId) -> bool,
{
    if !forest.contains(node) || predicate(forest, node) {
        Ok(())
    } else {
        Err(node)
    }
}
