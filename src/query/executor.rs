//! Relational Query Executors
//!
//! The relational source is an external collaborator. Calls are synchronous
//! and have no timeout; a failure comes back as a message that the engine
//! turns into a contained `ExternalQuery` error.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;

use lru::LruCache;

/// Named query parameters (`@p0`, `@p1`, ...)
pub type QueryParameters = BTreeMap<String, String>;

/// Runs relational queries for `{SQL}` expression blocks.
///
/// Multi-row results are returned newline-joined.
pub trait QueryExecutor: Any + Send {
    fn execute(&mut self, query: &str, parameters: &QueryParameters) -> Result<String, String>;
}

/// Executor for documents without a relational source
#[derive(Debug, Default)]
pub struct NoSource;

impl QueryExecutor for NoSource {
    fn execute(&mut self, query: &str, _parameters: &QueryParameters) -> Result<String, String> {
        Err(format!("no relational source is configured for `{query}`"))
    }
}

/// Executor answering from results registered ahead of time.
///
/// Used when the host runs the actual queries itself and hands the results
/// over, e.g. across the NIF boundary.
#[derive(Debug, Default)]
pub struct TableExecutor {
    results: HashMap<(String, QueryParameters), String>,
}

impl TableExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        query: impl Into<String>,
        parameters: QueryParameters,
        result: impl Into<String>,
    ) {
        let query = query.into().trim().to_string();
        self.results.insert((query, parameters), result.into());
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl QueryExecutor for TableExecutor {
    fn execute(&mut self, query: &str, parameters: &QueryParameters) -> Result<String, String> {
        self.results
            .get(&(query.trim().to_string(), parameters.clone()))
            .cloned()
            .ok_or_else(|| format!("no result registered for `{query}`"))
    }
}

/// Remembers the most recent results of an inner executor.
///
/// Failures are not cached, so a transient error is retried next time.
pub struct CachingExecutor<E> {
    inner: E,
    cache: LruCache<(String, QueryParameters), String>,
}

impl<E: QueryExecutor> CachingExecutor<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        CachingExecutor {
            inner,
            cache: LruCache::new(capacity),
        }
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.inner
    }

    /// Forget cached results (e.g. after the source data changed)
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl<E: QueryExecutor> QueryExecutor for CachingExecutor<E> {
    fn execute(&mut self, query: &str, parameters: &QueryParameters) -> Result<String, String> {
        let key = (query.to_string(), parameters.clone());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }
        let result = self.inner.execute(query, parameters)?;
        self.cache.put(key, result.clone());
        Ok(result)
    }
}
