//! Query Module - Field expressions and their dependency tracking
//!
//! Pipeline: expression text → tokens → QueryNode tree → RootQuery bound to
//! the forest → DependencyGraph re-evaluating it as referenced fields change.

pub mod cache;
pub mod executor;
pub mod graph;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod root;

pub use cache::ExpressionCache;
pub use executor::{CachingExecutor, NoSource, QueryExecutor, QueryParameters, TableExecutor};
pub use graph::{DependencyGraph, FieldQueries};
pub use node::{Composite, EvalEnv, FieldRef, QueryNode};
pub use parser::parse;
pub use root::{QueryId, QueryKind, Resolution, RootQuery};
