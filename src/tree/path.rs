//! Field Path Resolution
//!
//! Paths locate fields relative to a base field:
//! - `name` - children with that name
//! - `.` - the current field
//! - `..` - the parent (a top-level field's parent is the document level)
//! - `/` separates segments; a leading `/` starts at the document level
//!
//! Resolution may yield zero, one, or many fields. Callers that need
//! exactly one use [`resolve_one`].

use super::forest::Forest;
use super::node::NodeId;
use crate::error::{FormError, Result};

/// One step of a parsed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Current,
    Parent,
    Child(&'a str),
}

/// A parsed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath<'a> {
    pub absolute: bool,
    pub segments: Vec<Segment<'a>>,
}

impl<'a> FieldPath<'a> {
    pub fn parse(path: &'a str) -> Result<Self> {
        let trimmed = path.trim();
        let (absolute, body) = match trimmed.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut segments = Vec::new();
        if !body.is_empty() {
            for part in body.split('/') {
                let part = part.trim();
                let segment = match part {
                    "" => return Err(FormError::InvalidPath(path.to_string())),
                    "." => Segment::Current,
                    ".." => Segment::Parent,
                    name => Segment::Child(name),
                };
                segments.push(segment);
            }
        }

        Ok(FieldPath { absolute, segments })
    }

    /// Name of the last named segment, if any
    pub fn leaf_name(&self) -> Option<&'a str> {
        self.segments.iter().rev().find_map(|s| match s {
            Segment::Child(name) => Some(*name),
            _ => None,
        })
    }
}

/// All fields matching `path` from `base`, in document order per step
pub fn resolve(forest: &Forest, base: NodeId, path: &str) -> Result<Vec<NodeId>> {
    let parsed = FieldPath::parse(path)?;

    // `None` stands for the document level above the top-level fields
    let mut current: Vec<Option<NodeId>> = if parsed.absolute {
        vec![None]
    } else {
        forest.node(base)?;
        vec![Some(base)]
    };

    for segment in &parsed.segments {
        let mut next: Vec<Option<NodeId>> = Vec::with_capacity(current.len());
        for &level in &current {
            match segment {
                Segment::Current => push_unique(&mut next, level),
                Segment::Parent => match level {
                    Some(id) => push_unique(&mut next, forest.parent_of(id)),
                    None => return Err(FormError::InvalidPath(path.to_string())),
                },
                Segment::Child(name) => {
                    for child in forest.children_named(level, name) {
                        push_unique(&mut next, Some(child));
                    }
                }
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }

    Ok(current.into_iter().flatten().collect())
}

/// Resolve a path that must match at most one field
pub fn resolve_one(forest: &Forest, base: NodeId, path: &str) -> Result<Option<NodeId>> {
    let matches = resolve(forest, base, path)?;
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0])),
        count => Err(FormError::MultipleMatch {
            path: path.to_string(),
            count,
        }),
    }
}

fn push_unique(set: &mut Vec<Option<NodeId>>, item: Option<NodeId>) {
    if !set.contains(&item) {
        set.push(item);
    }
}
