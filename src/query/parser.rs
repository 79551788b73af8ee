//! Expression Parser
//!
//! Builds a query tree from expression text:
//! - plain text - literal
//! - `{Attribute opts}path{/Attribute}` - field reference
//! - `{SQL opts}...{/SQL}` - relational query
//! - `{Composite opts}...{/Composite}` - nested sequence
//! - `{SourceDocName opts}` - source document name (no closing tag)
//!
//! Options are `Required`, `Parameterize` and `SpatialMode`.

use super::lexer::{Lexer, Token};
use super::node::{Composite, FieldRef, QueryNode};
use crate::error::{FormError, Result};
use crate::spatial::SpatialMode;
use crate::tree::path::FieldPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Attribute,
    Sql,
    Composite,
    SourceDocName,
}

impl Tag {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "attribute" => Some(Tag::Attribute),
            "sql" => Some(Tag::Sql),
            "composite" => Some(Tag::Composite),
            "sourcedocname" => Some(Tag::SourceDocName),
            _ => None,
        }
    }

    fn allows(&self, option: &str) -> bool {
        match self {
            Tag::Attribute => matches!(option, "required" | "parameterize" | "spatialmode"),
            Tag::Sql | Tag::Composite => matches!(option, "parameterize" | "spatialmode"),
            Tag::SourceDocName => option == "parameterize",
        }
    }
}

#[derive(Debug, Default)]
struct Options {
    required: Option<bool>,
    parameterize: Option<bool>,
    spatial_mode: Option<SpatialMode>,
}

/// An open tag waiting for its closing tag
struct Frame {
    tag: Tag,
    offset: usize,
    options: Options,
    children: Vec<QueryNode>,
    /// Path text collected inside `{Attribute}`
    path: String,
}

/// Expression parser
pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input),
        }
    }

    /// Parse the whole expression into the root sequence
    pub fn parse(mut self) -> Result<Composite> {
        let mut root = Composite::new(SpatialMode::Normal);
        let mut stack: Vec<Frame> = Vec::new();

        loop {
            match self.lexer.next_token()? {
                Token::Eof => break,
                Token::Text(text) => match stack.last_mut() {
                    Some(frame) if frame.tag == Tag::Attribute => frame.path.push_str(&text),
                    Some(frame) => frame.children.push(QueryNode::Literal(text)),
                    None => root.children.push(QueryNode::Literal(text)),
                },
                Token::Open {
                    tag,
                    options,
                    offset,
                } => {
                    let kind = Tag::from_str(tag)
                        .ok_or_else(|| FormError::structural(offset, format!("unknown tag `{tag}`")))?;
                    if stack.last().is_some_and(|f| f.tag == Tag::Attribute) {
                        return Err(FormError::structural(offset, "tags are not allowed inside {Attribute}"));
                    }
                    let options = parse_options(kind, &options, offset)?;

                    if kind == Tag::SourceDocName {
                        let node = QueryNode::SourceName {
                            parameterize: options.parameterize.unwrap_or(true),
                        };
                        push_child(&mut stack, &mut root, node);
                    } else {
                        stack.push(Frame {
                            tag: kind,
                            offset,
                            options,
                            children: Vec::new(),
                            path: String::new(),
                        });
                    }
                }
                Token::Close { tag, offset } => {
                    let kind = Tag::from_str(tag)
                        .ok_or_else(|| FormError::structural(offset, format!("unknown tag `{tag}`")))?;
                    let frame = match stack.pop() {
                        Some(frame) if frame.tag == kind => frame,
                        _ => {
                            return Err(FormError::structural(
                                offset,
                                format!("unexpected closing tag `{tag}`"),
                            ))
                        }
                    };
                    let node = finish(frame)?;
                    push_child(&mut stack, &mut root, node);
                }
            }
        }

        if let Some(frame) = stack.last() {
            return Err(FormError::structural(frame.offset, "tag is never closed"));
        }

        Ok(root)
    }
}

fn push_child(stack: &mut [Frame], root: &mut Composite, node: QueryNode) {
    match stack.last_mut() {
        Some(frame) => frame.children.push(node),
        None => root.children.push(node),
    }
}

fn finish(frame: Frame) -> Result<QueryNode> {
    let spatial_mode = frame.options.spatial_mode.unwrap_or_default();
    let parameterize = frame.options.parameterize.unwrap_or(true);

    Ok(match frame.tag {
        Tag::Attribute => {
            let path = frame.path.trim();
            if path.is_empty() {
                return Err(FormError::structural(frame.offset, "empty attribute path"));
            }
            FieldPath::parse(path)
                .map_err(|e| FormError::structural(frame.offset, e.to_string()))?;
            QueryNode::FieldRef(FieldRef {
                path: path.to_string(),
                required: frame.options.required.unwrap_or(true),
                parameterize,
                spatial_mode,
                bound: None,
            })
        }
        Tag::Sql => QueryNode::Relational(Composite {
            children: frame.children,
            spatial_mode,
            parameterize,
        }),
        Tag::Composite => QueryNode::Sequence(Composite {
            children: frame.children,
            spatial_mode,
            parameterize,
        }),
        Tag::SourceDocName => QueryNode::SourceName { parameterize },
    })
}

fn parse_options(tag: Tag, raw: &[(&str, &str)], offset: usize) -> Result<Options> {
    let mut options = Options::default();
    for &(key, value) in raw {
        let key_lower = key.to_ascii_lowercase();
        if !tag.allows(&key_lower) {
            return Err(FormError::structural(offset, format!("option `{key}` is not valid here")));
        }
        let bad_value = || FormError::structural(offset, format!("bad value `{value}` for `{key}`"));
        match key_lower.as_str() {
            "required" => options.required = Some(parse_bool(value).ok_or_else(bad_value)?),
            "parameterize" => options.parameterize = Some(parse_bool(value).ok_or_else(bad_value)?),
            _ => options.spatial_mode = Some(SpatialMode::from_str(value).ok_or_else(bad_value)?),
        }
    }
    Ok(options)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse expression text into its root sequence
pub fn parse(input: &str) -> Result<Composite> {
    Parser::new(input).parse()
}
