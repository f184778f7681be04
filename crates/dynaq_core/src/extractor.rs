//! Query metadata extraction.
//!
//! # Responsibility
//! - Report the shape of declared SQL: named bind parameters and whether the
//!   statement produces a single scalar (count/exists style).
//! - Rewrite `:name` parameters into positional `?` placeholders while
//!   recording the per-placeholder parameter names.
//!
//! # Invariants
//! - Text inside single-quoted string literals is never treated as a
//!   parameter.
//! - `extract` reports each parameter once, in first-occurrence order;
//!   `positional` records every occurrence.

use once_cell::sync::Lazy;
use regex::Regex;

static PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("parameter regex"));
static SCALAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*select\s+(count\s*\(|exists\s*\()").expect("scalar-shape regex")
});

/// Shape report for one declared query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    /// Named parameters in first-occurrence order, deduplicated.
    pub parameters: Vec<String>,
    /// Whether the statement yields a single scalar column.
    pub scalar: bool,
}

/// Positional rewrite of one declared query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalQuery {
    /// SQL with every named parameter replaced by `?`.
    pub sql: String,
    /// Parameter name behind each `?`, in placeholder order.
    pub bindings: Vec<String>,
}

/// Inspects declared SQL to inform query construction.
pub trait QueryExtractor: Send + Sync {
    /// Reports named parameters and scalar-ness of `sql`.
    fn extract(&self, sql: &str) -> QueryShape;

    /// Rewrites `sql` to positional placeholders.
    fn positional(&self, sql: &str) -> PositionalQuery;
}

/// Regex-based extractor for the SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteQueryExtractor;

impl SqliteQueryExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl QueryExtractor for SqliteQueryExtractor {
    fn extract(&self, sql: &str) -> QueryShape {
        let masked = mask_literals(sql);
        let mut parameters = Vec::new();
        for capture in PARAM_RE.captures_iter(&masked) {
            let name = capture[1].to_string();
            if !parameters.contains(&name) {
                parameters.push(name);
            }
        }
        QueryShape {
            parameters,
            scalar: SCALAR_RE.is_match(&masked),
        }
    }

    fn positional(&self, sql: &str) -> PositionalQuery {
        let masked = mask_literals(sql);
        let mut out = String::with_capacity(sql.len());
        let mut bindings = Vec::new();
        let mut cursor = 0;
        for capture in PARAM_RE.captures_iter(&masked) {
            let whole = capture.get(0).expect("match span");
            out.push_str(&sql[cursor..whole.start()]);
            out.push('?');
            bindings.push(capture[1].to_string());
            cursor = whole.end();
        }
        out.push_str(&sql[cursor..]);
        PositionalQuery { sql: out, bindings }
    }
}

/// Blanks single-quoted literal contents, preserving byte offsets.
///
/// `''` inside a literal is the SQLite escape for a single quote.
pub(crate) fn mask_literals(sql: &str) -> String {
    let mut masked = String::with_capacity(sql.len());
    let mut in_literal = false;
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_literal {
            if ch == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    masked.push_str("  ");
                    continue;
                }
                in_literal = false;
                masked.push('\'');
            } else {
                for _ in 0..ch.len_utf8() {
                    masked.push(' ');
                }
            }
        } else if ch == '\'' {
            in_literal = true;
            masked.push('\'');
        } else {
            masked.push(ch);
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::{mask_literals, QueryExtractor, SqliteQueryExtractor};

    #[test]
    fn extracts_parameters_in_first_occurrence_order() {
        let extractor = SqliteQueryExtractor::new();
        let shape = extractor.extract(
            "SELECT * FROM users WHERE age >= :min_age AND city = :city AND age <= :min_age + 40",
        );
        assert_eq!(shape.parameters, vec!["min_age", "city"]);
        assert!(!shape.scalar);
    }

    #[test]
    fn detects_scalar_statements() {
        let extractor = SqliteQueryExtractor::new();
        assert!(extractor.extract("SELECT COUNT(*) FROM users").scalar);
        assert!(
            extractor
                .extract("  select exists(SELECT 1 FROM users WHERE id = :id)")
                .scalar
        );
        assert!(!extractor.extract("SELECT id FROM users").scalar);
    }

    #[test]
    fn ignores_parameters_inside_string_literals() {
        let extractor = SqliteQueryExtractor::new();
        let shape =
            extractor.extract("SELECT * FROM users WHERE note = ':looks_like' AND id = :id");
        assert_eq!(shape.parameters, vec!["id"]);
    }

    #[test]
    fn positional_rewrite_keeps_duplicate_occurrences() {
        let extractor = SqliteQueryExtractor::new();
        let positional = extractor
            .positional("SELECT * FROM spans WHERE :at >= start_ms AND :at < end_ms");
        assert_eq!(
            positional.sql,
            "SELECT * FROM spans WHERE ? >= start_ms AND ? < end_ms"
        );
        assert_eq!(positional.bindings, vec!["at", "at"]);
    }

    #[test]
    fn mask_preserves_length_and_quote_escapes() {
        let sql = "SELECT 'it''s :x' AS t, :y";
        let masked = mask_literals(sql);
        assert_eq!(masked.len(), sql.len());
        assert!(!masked.contains(":x"));
        assert!(masked.contains(":y"));
    }
}
