//! Parsed expression cache
//!
//! Forms declare the same expressions for many fields (every row of a
//! table), so parsed trees are kept in an LRU keyed by expression text.
//! Cached trees are unbound templates; callers get their own copy.

use std::num::NonZeroUsize;

use lru::LruCache;

use super::node::Composite;
use super::parser;
use crate::error::Result;

pub const DEFAULT_CAPACITY: usize = 256;

pub struct ExpressionCache {
    cache: LruCache<String, Composite>,
}

impl ExpressionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        ExpressionCache {
            cache: LruCache::new(capacity),
        }
    }

    /// Parsed copy of `expression`, parsing it on a miss
    pub fn get_or_parse(&mut self, expression: &str) -> Result<Composite> {
        if let Some(template) = self.cache.get(expression) {
            return Ok(template.clone());
        }
        let parsed = parser::parse(expression)?;
        self.cache.put(expression.to_string(), parsed.clone());
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
