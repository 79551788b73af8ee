//! Query Expression Tree
//!
//! A field's update or validation expression, parsed into nodes that are
//! evaluated against the forest and the relational executor.

use super::executor::{QueryExecutor, QueryParameters};
use crate::error::{FormError, Result};
use crate::spatial::{append, SpatialMode, SpatialValue, Zone};
use crate::tree::{Forest, NodeId};

/// Everything an expression needs while it is being evaluated
pub struct EvalEnv<'a> {
    pub forest: &'a Forest,
    pub source_doc_name: &'a str,
    pub executor: &'a mut dyn QueryExecutor,
}

/// Reference to another field's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Path relative to the query's target field
    pub path: String,
    /// Must be bound before the query may be evaluated
    pub required: bool,
    /// Passed as a query parameter inside a relational query
    pub parameterize: bool,
    pub spatial_mode: SpatialMode,
    /// Field this reference is bound to (a trigger of the owning query)
    pub bound: Option<NodeId>,
}

impl FieldRef {
    pub fn new(path: impl Into<String>) -> Self {
        FieldRef {
            path: path.into(),
            required: true,
            parameterize: true,
            spatial_mode: SpatialMode::Normal,
            bound: None,
        }
    }
}

/// Ordered children combined by a sequence or a relational query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composite {
    pub children: Vec<QueryNode>,
    pub spatial_mode: SpatialMode,
    pub parameterize: bool,
}

impl Composite {
    pub fn new(spatial_mode: SpatialMode) -> Self {
        Composite {
            children: Vec::new(),
            spatial_mode,
            parameterize: true,
        }
    }

    /// Concatenate child results, each merged under its own spatial mode
    pub fn evaluate_sequence(&self, env: &mut EvalEnv<'_>) -> Result<SpatialValue> {
        let mut result = SpatialValue::default();
        for child in &self.children {
            let value = child.evaluate(env)?;
            result = append(result, &value, child.spatial_mode());
        }
        Ok(result)
    }

    /// Build query text and parameters from the children, then run it.
    ///
    /// Literal children are query text. Other children are either bound as
    /// `@pN` parameters or interpolated, per their `parameterize` flag.
    /// Zones of `Force` children are re-attached to the textual result.
    pub fn evaluate_relational(&self, env: &mut EvalEnv<'_>) -> Result<SpatialValue> {
        let mut query = String::new();
        let mut parameters = QueryParameters::new();
        let mut forced: Vec<Zone> = Vec::new();

        for child in &self.children {
            if let QueryNode::Literal(text) = child {
                query.push_str(text);
                continue;
            }

            let value = child.evaluate(env)?;
            if child.spatial_mode() == SpatialMode::Force {
                forced.extend_from_slice(value.zones());
            }

            if child.parameterize() {
                let name = format!("@p{}", parameters.len());
                query.push_str(&name);
                parameters.insert(name, value.text().to_string());
            } else {
                query.push_str(value.text());
            }
        }

        let query = query.trim();
        tracing::debug!(query, parameters = parameters.len(), "executing relational query");
        let text = env
            .executor
            .execute(query, &parameters)
            .map_err(FormError::ExternalQuery)?;

        Ok(if forced.is_empty() {
            SpatialValue::plain(text)
        } else {
            SpatialValue::spatial(text, forced)
        })
    }
}

impl Default for Composite {
    fn default() -> Self {
        Composite::new(SpatialMode::Normal)
    }
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    /// Literal text
    Literal(String),
    /// Name of the source document
    SourceName { parameterize: bool },
    /// Another field's value
    FieldRef(FieldRef),
    /// Query against the external relational source
    Relational(Composite),
    /// Concatenation of children
    Sequence(Composite),
}

impl QueryNode {
    pub fn spatial_mode(&self) -> SpatialMode {
        match self {
            QueryNode::Literal(_) | QueryNode::SourceName { .. } => SpatialMode::Normal,
            QueryNode::FieldRef(r) => r.spatial_mode,
            QueryNode::Relational(c) | QueryNode::Sequence(c) => c.spatial_mode,
        }
    }

    pub fn parameterize(&self) -> bool {
        match self {
            QueryNode::Literal(_) => false,
            QueryNode::SourceName { parameterize } => *parameterize,
            QueryNode::FieldRef(r) => r.parameterize,
            QueryNode::Relational(c) | QueryNode::Sequence(c) => c.parameterize,
        }
    }

    pub fn evaluate(&self, env: &mut EvalEnv<'_>) -> Result<SpatialValue> {
        match self {
            QueryNode::Literal(text) => Ok(SpatialValue::plain(text.as_str())),
            QueryNode::SourceName { .. } => Ok(SpatialValue::plain(env.source_doc_name)),
            QueryNode::FieldRef(r) => Ok(r
                .bound
                .and_then(|id| env.forest.value_of(id))
                .cloned()
                .unwrap_or_default()),
            QueryNode::Relational(c) => c.evaluate_relational(env),
            QueryNode::Sequence(c) => c.evaluate_sequence(env),
        }
    }

    /// Visit every field reference in this subtree
    pub fn for_each_ref<F: FnMut(&FieldRef)>(&self, f: &mut F) {
        match self {
            QueryNode::FieldRef(r) => f(r),
            QueryNode::Relational(c) | QueryNode::Sequence(c) => {
                c.children.iter().for_each(|child| child.for_each_ref(f))
            }
            _ => {}
        }
    }

    pub fn for_each_ref_mut<F: FnMut(&mut FieldRef)>(&mut self, f: &mut F) {
        match self {
            QueryNode::FieldRef(r) => f(r),
            QueryNode::Relational(c) | QueryNode::Sequence(c) => c
                .children
                .iter_mut()
                .for_each(|child| child.for_each_ref_mut(f)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::executor::TableExecutor;

    fn spatial(text: &str, page: u32) -> SpatialValue {
        SpatialValue::spatial(text, vec![Zone::new(page, 0, 0, 10, 10)])
    }

    fn bound_ref(id: NodeId, mode: SpatialMode, parameterize: bool) -> QueryNode {
        QueryNode::FieldRef(FieldRef {
            spatial_mode: mode,
            parameterize,
            bound: Some(id),
            ..FieldRef::new("x")
        })
    }

    #[test]
    fn test_sequence_concatenates_with_child_modes() {
        let mut forest = Forest::new();
        let first = forest.insert(None, "First", "1", spatial("John", 1)).unwrap();
        let last = forest.insert(None, "Last", "2", spatial("Smith", 1)).unwrap();

        let seq = Composite {
            children: vec![
                bound_ref(first, SpatialMode::Normal, true),
                QueryNode::Literal(" ".into()),
                bound_ref(last, SpatialMode::None, true),
            ],
            ..Composite::default()
        };

        let mut executor = TableExecutor::new();
        let mut env = EvalEnv {
            forest: &forest,
            source_doc_name: "doc.tif",
            executor: &mut executor,
        };
        let value = seq.evaluate_sequence(&mut env).unwrap();
        assert_eq!(value.text(), "John Smith");
        // The `None` branch strips provenance from the result
        assert!(!value.has_spatial_info());
    }

    #[test]
    fn test_relational_parameterizes_and_forces_zones() {
        let mut forest = Forest::new();
        let code = forest.insert(None, "Code", "1", spatial("NY", 2)).unwrap();
        let table = forest.insert(None, "Table", "2", "States".into()).unwrap();

        let sql = Composite {
            children: vec![
                QueryNode::Literal("SELECT Name FROM ".into()),
                bound_ref(table, SpatialMode::Normal, false),
                QueryNode::Literal(" WHERE Code = ".into()),
                bound_ref(code, SpatialMode::Force, true),
            ],
            ..Composite::default()
        };

        let mut executor = TableExecutor::new();
        let mut params = QueryParameters::new();
        params.insert("@p0".into(), "NY".into());
        executor.insert("SELECT Name FROM States WHERE Code = @p0", params, "New York");

        let mut env = EvalEnv {
            forest: &forest,
            source_doc_name: "",
            executor: &mut executor,
        };
        let value = sql.evaluate_relational(&mut env).unwrap();
        assert_eq!(value.text(), "New York");
        assert_eq!(value.zones(), forest.value_of(code).unwrap().zones());
    }

    #[test]
    fn test_relational_without_force_is_plain() {
        let mut forest = Forest::new();
        let code = forest.insert(None, "Code", "1", spatial("NY", 2)).unwrap();
        let sql = Composite {
            children: vec![
                QueryNode::Literal("SELECT 1 WHERE x = ".into()),
                bound_ref(code, SpatialMode::Normal, true),
            ],
            ..Composite::default()
        };

        let mut executor = TableExecutor::new();
        let mut params = QueryParameters::new();
        params.insert("@p0".into(), "NY".into());
        executor.insert("SELECT 1 WHERE x = @p0", params, "1");

        let mut env = EvalEnv {
            forest: &forest,
            source_doc_name: "",
            executor: &mut executor,
        };
        assert!(!sql.evaluate_relational(&mut env).unwrap().has_spatial_info());
    }

    #[test]
    fn test_executor_failure_is_external_error() {
        let forest = Forest::new();
        let sql = Composite {
            children: vec![QueryNode::Literal("SELECT nothing".into())],
            ..Composite::default()
        };
        let mut executor = TableExecutor::new();
        let mut env = EvalEnv {
            forest: &forest,
            source_doc_name: "",
            executor: &mut executor,
        };
        assert!(matches!(
            sql.evaluate_relational(&mut env),
            Err(FormError::ExternalQuery(_))
        ));
    }

    #[test]
    fn test_unbound_reference_is_empty() {
        let forest = Forest::new();
        let mut executor = TableExecutor::new();
        let mut env = EvalEnv {
            forest: &forest,
            source_doc_name: "scan.pdf",
            executor: &mut executor,
        };
        let node = QueryNode::FieldRef(FieldRef::new("../Missing"));
        assert_eq!(node.evaluate(&mut env).unwrap(), SpatialValue::default());

        let source = QueryNode::SourceName { parameterize: true };
        assert_eq!(source.evaluate(&mut env).unwrap().text(), "scan.pdf");
    }
}
