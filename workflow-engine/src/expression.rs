//! Reference expressions: `${scope.path}` parsed into a small tagged
//! variant rather than re-parsed as a string at every resolution.
//!
//! Kept as a compiled form alongside the ability to reconstruct the
//! original text, so resolution failures can report a useful diagnostic
//! (see `Ref::raw`).

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionParseError {
    #[error("empty reference '${{}}'")]
    EmptyReference,
    #[error("unknown reference scope '{0}', expected one of user, system, steps")]
    UnknownScope(String),
    #[error("malformed steps reference '{0}', expected 'steps.<id>.outputs.<field>'")]
    MalformedStepsReference(String),
}

/// A single `${scope.path}` reference, already split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    User { key: String },
    System { key: String },
    Steps { step_id: String, field: String },
}

impl Ref {
    fn parse(inner: &str) -> Result<Self, ExpressionParseError> {
        if inner.trim().is_empty() {
            return Err(ExpressionParseError::EmptyReference);
        }
        let mut parts = inner.splitn(2, '.');
        let scope = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default();

        match scope {
            "user" => Ok(Ref::User { key: rest.to_string() }),
            "system" => Ok(Ref::System { key: rest.to_string() }),
            "steps" => {
                // rest is "<step_id>.outputs.<field>"
                let mut step_parts = rest.splitn(3, '.');
                let step_id = step_parts.next().unwrap_or_default();
                let marker = step_parts.next().unwrap_or_default();
                let field = step_parts.next().unwrap_or_default();
                if step_id.is_empty() || marker != "outputs" || field.is_empty() {
                    return Err(ExpressionParseError::MalformedStepsReference(inner.to_string()));
                }
                Ok(Ref::Steps {
                    step_id: step_id.to_string(),
                    field: field.to_string(),
                })
            }
            other => Err(ExpressionParseError::UnknownScope(other.to_string())),
        }
    }
}

/// A literal text segment or an embedded reference within a template
/// string, e.g. `"Report created: ${steps.x.outputs.url}"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Ref(Ref),
}

/// A parsed parameter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Ref(Ref),
    Array(Vec<Expression>),
    Object(BTreeMap<String, Expression>),
    /// A string containing one or more embedded `${...}` references,
    /// interleaved with literal text.
    Template(Vec<TemplatePart>),
}

impl Expression {
    /// Parse a raw JSON value (as deserialized from the workflow document)
    /// into a compiled `Expression` tree.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionParseError` if an embedded `${...}` reference is
    /// malformed (unknown scope, empty reference, or a `steps` reference
    /// missing its `.outputs.` segment).
    pub fn parse(value: &Value) -> Result<Self, ExpressionParseError> {
        match value {
            Value::String(s) => Self::parse_string(s),
            Value::Array(items) => {
                let parsed = items.iter().map(Self::parse).collect::<Result<_, _>>()?;
                Ok(Expression::Array(parsed))
            }
            Value::Object(map) => {
                let parsed = map
                    .iter()
                    .map(|(k, v)| Self::parse(v).map(|e| (k.clone(), e)))
                    .collect::<Result<_, _>>()?;
                Ok(Expression::Object(parsed))
            }
            other => Ok(Expression::Literal(other.clone())),
        }
    }

    fn parse_string(s: &str) -> Result<Self, ExpressionParseError> {
        if let Some(inner) = whole_reference(s) {
            return Ok(Expression::Ref(Ref::parse(inner)?));
        }

        let occurrences = find_references(s);
        if occurrences.is_empty() {
            return Ok(Expression::Literal(Value::String(s.to_string())));
        }

        let mut parts = Vec::new();
        let mut cursor = 0;
        for (start, end, inner) in occurrences {
            if start > cursor {
                parts.push(TemplatePart::Literal(s[cursor..start].to_string()));
            }
            parts.push(TemplatePart::Ref(Ref::parse(inner)?));
            cursor = end;
        }
        if cursor < s.len() {
            parts.push(TemplatePart::Literal(s[cursor..].to_string()));
        }
        Ok(Expression::Template(parts))
    }
}

impl Expression {
    /// Every `${steps.<id>.outputs.<field>}` reference reachable within
    /// this expression, including ones nested inside an array, object,
    /// or embedded in a template string.
    #[must_use]
    pub fn steps_refs(&self) -> Vec<&Ref> {
        let mut out = Vec::new();
        self.collect_steps_refs(&mut out);
        out
    }

    fn collect_steps_refs<'a>(&'a self, out: &mut Vec<&'a Ref>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Ref(r) => {
                if matches!(r, Ref::Steps { .. }) {
                    out.push(r);
                }
            }
            Expression::Array(items) => items.iter().for_each(|e| e.collect_steps_refs(out)),
            Expression::Object(fields) => fields.values().for_each(|e| e.collect_steps_refs(out)),
            Expression::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Ref(r) = part {
                        if matches!(r, Ref::Steps { .. }) {
                            out.push(r);
                        }
                    }
                }
            }
        }
    }
}

/// If `s` is exactly one `${...}` reference with no surrounding text,
/// return the inner slice.
fn whole_reference(s: &str) -> Option<&str> {
    let trimmed = s.strip_prefix("${")?.strip_suffix('}')?;
    if trimmed.contains("${") {
        return None;
    }
    Some(trimmed)
}

/// Find every `${...}` occurrence in `s`, returning `(start, end, inner)`
/// byte-offset triples.
fn find_references(s: &str) -> Vec<(usize, usize, &str)> {
    let mut found = Vec::new();
    let mut search_from = 0;
    while let Some(rel_start) = s[search_from..].find("${") {
        let start = search_from + rel_start;
        if let Some(rel_end) = s[start..].find('}') {
            let end = start + rel_end + 1;
            found.push((start, end, &s[start + 2..end - 1]));
            search_from = end;
        } else {
            break;
        }
    }
    found
}
