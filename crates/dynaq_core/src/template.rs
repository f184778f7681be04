//! Dynamic query templates.
//!
//! # Responsibility
//! - Parse dynamic query sources into renderable templates.
//! - Render templates against an evaluation context into positional SQL plus
//!   ordered bind values.
//!
//! Template syntax:
//! - `:name` — named bind parameter, replaced by `?` with the context value;
//! - `#{name}` — text splice (entity/table), expanded before binding;
//! - `[[ ... ]]` — optional segment, included only when every bind it
//!   references is present and non-null in the context.
//!
//! # Invariants
//! - Optional segments cannot nest and must reference at least one bind.
//! - Splice values must be identifier-shaped; arbitrary SQL never enters
//!   through a splice.
//! - Text inside single-quoted literals is never interpreted.

use crate::eval::EvaluationContext;
use crate::projection::ScalarValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static SPLICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("splice regex"));
static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// Parsed dynamic query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    source: String,
    nodes: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateNode {
    Text(String),
    Bind(String),
    Splice(String),
    Optional(Vec<TemplateNode>),
}

/// Rendered query: positional SQL plus ordered bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub binds: Vec<ScalarValue>,
}

impl QueryTemplate {
    /// Parses a template source.
    pub fn parse(source: &str) -> Result<Self, TemplateParseError> {
        if source.trim().is_empty() {
            return Err(TemplateParseError::EmptySource);
        }

        let mut nodes = Vec::new();
        let mut cursor = 0;
        loop {
            match source[cursor..].find("[[") {
                None => {
                    let tail = &source[cursor..];
                    if tail.contains("]]") {
                        return Err(TemplateParseError::UnexpectedSegmentClose);
                    }
                    parse_plain(tail, &mut nodes);
                    break;
                }
                Some(open_rel) => {
                    let open = cursor + open_rel;
                    let head = &source[cursor..open];
                    if head.contains("]]") {
                        return Err(TemplateParseError::UnexpectedSegmentClose);
                    }
                    parse_plain(head, &mut nodes);

                    let body_start = open + 2;
                    let close_rel = source[body_start..]
                        .find("]]")
                        .ok_or(TemplateParseError::UnterminatedSegment)?;
                    let body = &source[body_start..body_start + close_rel];
                    if body.contains("[[") {
                        return Err(TemplateParseError::NestedSegment);
                    }

                    let mut inner = Vec::new();
                    parse_plain(body, &mut inner);
                    if !inner
                        .iter()
                        .any(|node| matches!(node, TemplateNode::Bind(_)))
                    {
                        return Err(TemplateParseError::SegmentWithoutParameter(
                            body.trim().to_string(),
                        ));
                    }
                    nodes.push(TemplateNode::Optional(inner));
                    cursor = body_start + close_rel + 2;
                }
            }
        }

        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// Original template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// All bind parameter names, deduplicated in first-occurrence order.
    pub fn bind_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_bind_names(&self.nodes, &mut names);
        names
    }

    /// Renders the template against `context`.
    pub fn render(&self, context: &EvaluationContext) -> Result<RenderedQuery, TemplateRenderError> {
        let mut sql = String::with_capacity(self.source.len());
        let mut binds = Vec::new();
        for node in &self.nodes {
            render_node(node, context, &mut sql, &mut binds)?;
        }
        Ok(RenderedQuery { sql, binds })
    }
}

fn collect_bind_names(nodes: &[TemplateNode], names: &mut Vec<String>) {
    for node in nodes {
        match node {
            TemplateNode::Bind(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            TemplateNode::Optional(inner) => collect_bind_names(inner, names),
            TemplateNode::Text(_) | TemplateNode::Splice(_) => {}
        }
    }
}

fn render_node(
    node: &TemplateNode,
    context: &EvaluationContext,
    sql: &mut String,
    binds: &mut Vec<ScalarValue>,
) -> Result<(), TemplateRenderError> {
    match node {
        TemplateNode::Text(text) => sql.push_str(text),
        TemplateNode::Bind(name) => {
            let value = context
                .bind_value(name)
                .ok_or_else(|| TemplateRenderError::UnboundParameter(name.clone()))?;
            sql.push('?');
            binds.push(value.clone());
        }
        TemplateNode::Splice(name) => sql.push_str(resolve_splice(name, context)?),
        TemplateNode::Optional(inner) => {
            let mut referenced = Vec::new();
            collect_bind_names(inner, &mut referenced);
            if referenced
                .iter()
                .all(|name| context.is_bound_non_null(name))
            {
                for child in inner {
                    render_node(child, context, sql, binds)?;
                }
            }
        }
    }
    Ok(())
}

fn resolve_splice<'ctx>(
    name: &str,
    context: &'ctx EvaluationContext,
) -> Result<&'ctx str, TemplateRenderError> {
    let text = context
        .splice_text(name)
        .ok_or_else(|| TemplateRenderError::UnknownSpliceVariable(name.to_string()))?;
    if !IDENT_RE.is_match(text) {
        return Err(TemplateRenderError::InvalidSpliceValue {
            variable: name.to_string(),
            value: text.to_string(),
        });
    }
    Ok(text)
}

/// Expands `#{name}` splices in declared SQL, leaving `:name` binds intact.
///
/// Used by the declared-query path, where binds are positionalized later by
/// the query extractor.
pub fn expand_splices(
    sql: &str,
    context: &EvaluationContext,
) -> Result<String, TemplateRenderError> {
    // Match against the masked copy so `#{...}` inside single-quoted literals
    // stays literal text; spans index into the original unchanged.
    let masked = crate::extractor::mask_literals(sql);
    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for capture in SPLICE_RE.captures_iter(&masked) {
        let whole = capture.get(0).expect("match span");
        out.push_str(&sql[cursor..whole.start()]);
        out.push_str(resolve_splice(&capture[1], context)?);
        cursor = whole.end();
    }
    out.push_str(&sql[cursor..]);
    Ok(out)
}

/// Segment-level scanner for text outside `[[ ]]` markers.
///
/// Recognizes `:name` binds, `#{name}` splices and single-quoted literals;
/// everything else accumulates as text.
fn parse_plain(region: &str, nodes: &mut Vec<TemplateNode>) {
    let mut text = String::new();
    let mut chars = region.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\'' => {
                text.push('\'');
                while let Some((_, lit)) = chars.next() {
                    text.push(lit);
                    if lit == '\'' {
                        if chars.peek().map(|(_, next)| *next) == Some('\'') {
                            let (_, escaped) = chars.next().expect("peeked quote");
                            text.push(escaped);
                            continue;
                        }
                        break;
                    }
                }
            }
            ':' => {
                let name = take_identifier(&region[idx + 1..]);
                if name.is_empty() {
                    text.push(':');
                } else {
                    flush_text(&mut text, nodes);
                    nodes.push(TemplateNode::Bind(name.to_string()));
                    advance_by(&mut chars, name.len());
                }
            }
            '#' if chars.peek().map(|(_, next)| *next) == Some('{') => {
                let after_brace = idx + 2;
                match region[after_brace..].find('}') {
                    Some(close) if IDENT_RE.is_match(&region[after_brace..after_brace + close]) => {
                        flush_text(&mut text, nodes);
                        nodes.push(TemplateNode::Splice(
                            region[after_brace..after_brace + close].to_string(),
                        ));
                        advance_by(&mut chars, close + 2);
                    }
                    _ => text.push('#'),
                }
            }
            other => text.push(other),
        }
    }

    flush_text(&mut text, nodes);
}

fn flush_text(text: &mut String, nodes: &mut Vec<TemplateNode>) {
    if !text.is_empty() {
        nodes.push(TemplateNode::Text(std::mem::take(text)));
    }
}

fn take_identifier(rest: &str) -> &str {
    let end = rest
        .char_indices()
        .find(|(idx, ch)| {
            let valid = ch.is_ascii_alphanumeric() || *ch == '_';
            let valid_start = ch.is_ascii_alphabetic() || *ch == '_';
            if *idx == 0 { !valid_start } else { !valid }
        })
        .map_or(rest.len(), |(idx, _)| idx);
    &rest[..end]
}

fn advance_by(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, count: usize) {
    for _ in 0..count {
        chars.next();
    }
}

/// Template parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateParseError {
    EmptySource,
    UnterminatedSegment,
    UnexpectedSegmentClose,
    NestedSegment,
    SegmentWithoutParameter(String),
}

impl Display for TemplateParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySource => write!(f, "dynamic query source must not be empty"),
            Self::UnterminatedSegment => write!(f, "optional segment `[[` is never closed"),
            Self::UnexpectedSegmentClose => {
                write!(f, "`]]` appears outside an optional segment")
            }
            Self::NestedSegment => write!(f, "optional segments cannot nest"),
            Self::SegmentWithoutParameter(body) => write!(
                f,
                "optional segment references no bind parameter and can never toggle: `{body}`"
            ),
        }
    }
}

impl Error for TemplateParseError {}

/// Template render errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRenderError {
    UnboundParameter(String),
    UnknownSpliceVariable(String),
    InvalidSpliceValue { variable: String, value: String },
}

impl Display for TemplateRenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnboundParameter(name) => {
                write!(f, "bind parameter `:{name}` has no value in the evaluation context")
            }
            Self::UnknownSpliceVariable(name) => {
                write!(f, "splice variable `#{{{name}}}` is not provided by the context")
            }
            Self::InvalidSpliceValue { variable, value } => write!(
                f,
                "splice variable `#{{{variable}}}` resolved to non-identifier text `{value}`"
            ),
        }
    }
}

impl Error for TemplateRenderError {}
