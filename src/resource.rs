//! ResourceArc Wrappers
//!
//! Persistent document state held across NIF calls.

use std::sync::Mutex;

use rustler::ResourceArc;

use crate::context::{ContextConfig, DocumentContext};
use crate::query::TableExecutor;

/// Wrapper for a DocumentContext that can be stored in a ResourceArc.
///
/// Relational queries are answered from results the host registers with
/// `put_query_result`.
pub struct DocumentResource {
    /// `None` once the document is closed
    pub ctx: Mutex<Option<DocumentContext>>,
}

impl DocumentResource {
    pub fn new(config: ContextConfig) -> Self {
        DocumentResource {
            ctx: Mutex::new(Some(DocumentContext::new(config, TableExecutor::new()))),
        }
    }

    /// Run `f` against the open document.
    ///
    /// # Errors
    ///
    /// Returns `"mutex_poisoned"` if the document mutex is poisoned,
    /// or `"no_document"` if the document was closed.
    pub fn with_context<F, R>(&self, f: F) -> Result<R, &'static str>
    where
        F: FnOnce(&mut DocumentContext) -> R,
    {
        let mut guard = self.ctx.lock().map_err(|_| "mutex_poisoned")?;
        let ctx = guard.as_mut().ok_or("no_document")?;
        Ok(f(ctx))
    }

    /// Tear the document down. Returns false if it was already closed.
    pub fn close(&self) -> Result<bool, &'static str> {
        let mut guard = self.ctx.lock().map_err(|_| "mutex_poisoned")?;
        Ok(guard.take().is_some())
    }
}

#[rustler::resource_impl]
impl rustler::Resource for DocumentResource {}

impl Default for DocumentResource {
    fn default() -> Self {
        DocumentResource {
            ctx: Mutex::new(None),
        }
    }
}

/// Type alias for document ResourceArc
pub type DocumentRef = ResourceArc<DocumentResource>;
