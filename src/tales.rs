//! TALES, the expression sublanguage used inside TAL attributes.
//!
//! Expressions are parsed once at compile time into structured forms and
//! evaluated at render time against the variable scopes. Evaluation cannot
//! fail: an unresolvable path yields "not found", modeled here as
//! `Option::None`, which stringifies to the empty string and is falsy. This
//! is distinct from the [`Value::None`] sentinel, which is an explicit
//! absence with its own command semantics.

use std::fmt;

use crate::attrs::AttrList;
use crate::error::{CompileError, CompileErrorKind};
use crate::render::scope::Scopes;
use crate::types::span::Span;
use crate::Value;

/// A slash-separated traversal path, e.g. `a/b/alpha/C/one`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Path {
    pub segments: Vec<String>,
}

impl Path {
    pub fn parse(word: &str) -> Self {
        Self {
            segments: word.split('/').map(String::from).collect(),
        }
    }

    /// The path that always evaluates to the `Default` sentinel.
    pub fn default_sentinel() -> Self {
        Self {
            segments: vec![String::from("default")],
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// A parsed `tal:content` / `tal:replace` expression.
#[derive(Debug, Clone)]
pub(crate) struct ContentExpr {
    pub path: Path,
    /// `structure` keyword: emit the value without escaping.
    pub structure: bool,
}

/// One clause of a `tal:define` expression.
#[derive(Debug, Clone)]
pub(crate) struct Define {
    pub name: String,
    pub global: bool,
    pub path: Path,
}

/// A parsed `tal:repeat` expression.
#[derive(Debug, Clone)]
pub(crate) struct Repeat {
    pub name: String,
    pub path: Path,
}

/// Splits a multi-clause TAL argument on `;`, coalescing the escape `;;`
/// into a literal `;`. Empty clauses are dropped.
pub(crate) fn split_arguments(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ';' {
            if chars.peek() == Some(&';') {
                chars.next();
                cur.push(';');
            } else if !cur.is_empty() {
                parts.push(std::mem::take(&mut cur));
            }
        } else {
            cur.push(c);
        }
    }
    if !cur.is_empty() {
        parts.push(cur);
    }
    parts
}

fn missing(cmd: &str, source: &str, span: Span) -> CompileError {
    CompileError::with_span(
        CompileErrorKind::ExpressionMissing,
        format!("{cmd} requires an expression"),
        source,
        span,
    )
}

fn malformed(cmd: &str, source: &str, span: Span) -> CompileError {
    CompileError::with_span(
        CompileErrorKind::ExpressionMalformed,
        format!("malformed {cmd} expression"),
        source,
        span,
    )
}

pub(crate) fn parse_content(
    cmd: &str,
    expr: &str,
    source: &str,
    span: Span,
) -> Result<ContentExpr, CompileError> {
    let words: Vec<&str> = expr.split_whitespace().collect();
    let (structure, rest) = match words.split_first() {
        Some((&"text", rest)) => (false, rest),
        Some((&"structure", rest)) => (true, rest),
        _ => (false, &words[..]),
    };
    match rest {
        [] => Err(missing(cmd, source, span)),
        [word] => Ok(ContentExpr {
            path: Path::parse(word),
            structure,
        }),
        _ => Err(malformed(cmd, source, span)),
    }
}

pub(crate) fn parse_defines(
    expr: &str,
    source: &str,
    span: Span,
) -> Result<Vec<Define>, CompileError> {
    let parts = split_arguments(expr);
    if parts.is_empty() {
        return Err(missing("tal:define", source, span));
    }
    let mut defines = Vec::with_capacity(parts.len());
    for part in &parts {
        let words: Vec<&str> = part.split_whitespace().collect();
        let (global, rest) = match words.split_first() {
            Some((&"local", rest)) => (false, rest),
            Some((&"global", rest)) => (true, rest),
            _ => (false, &words[..]),
        };
        match rest {
            [] | [_] => return Err(missing("tal:define", source, span)),
            [name, word] => defines.push(Define {
                name: name.to_string(),
                global,
                path: Path::parse(word),
            }),
            _ => return Err(malformed("tal:define", source, span)),
        }
    }
    Ok(defines)
}

pub(crate) fn parse_attributes(
    expr: &str,
    source: &str,
    span: Span,
) -> Result<Vec<(String, Path)>, CompileError> {
    let parts = split_arguments(expr);
    if parts.is_empty() {
        return Err(missing("tal:attributes", source, span));
    }
    let mut pairs = Vec::with_capacity(parts.len());
    for part in &parts {
        let words: Vec<&str> = part.split_whitespace().collect();
        match words[..] {
            [] | [_] => return Err(missing("tal:attributes", source, span)),
            [name, word] => pairs.push((name.to_string(), Path::parse(word))),
            _ => return Err(malformed("tal:attributes", source, span)),
        }
    }
    Ok(pairs)
}

pub(crate) fn parse_repeat(expr: &str, source: &str, span: Span) -> Result<Repeat, CompileError> {
    let words: Vec<&str> = expr.split_whitespace().collect();
    match words[..] {
        [] | [_] => Err(missing("tal:repeat", source, span)),
        [name, word] => Ok(Repeat {
            name: name.to_string(),
            path: Path::parse(word),
        }),
        _ => Err(malformed("tal:repeat", source, span)),
    }
}

pub(crate) fn parse_condition(expr: &str, source: &str, span: Span) -> Result<Path, CompileError> {
    let words: Vec<&str> = expr.split_whitespace().collect();
    match words[..] {
        [] => Err(missing("tal:condition", source, span)),
        [word] => Ok(Path::parse(word)),
        _ => Err(malformed("tal:condition", source, span)),
    }
}

/// An empty `tal:omit-tag` omits unconditionally, so it compiles to the
/// `default` path.
pub(crate) fn parse_omit_tag(expr: &str, source: &str, span: Span) -> Result<Path, CompileError> {
    let words: Vec<&str> = expr.split_whitespace().collect();
    match words[..] {
        [] => Ok(Path::default_sentinel()),
        [word] => Ok(Path::parse(word)),
        _ => Err(malformed("tal:omit-tag", source, span)),
    }
}

/// Resolves a path against the scopes of the current render.
///
/// Returns `None` when the path cannot be resolved (TALES "not found").
/// The leftmost segment resolves the keywords `nothing`, `default` and
/// `repeat`, then the local scopes innermost-first, the globals, the render
/// context, and finally the same-named attribute of the current element.
pub(crate) fn evaluate(path: &Path, scopes: &Scopes<'_>, attrs: &AttrList) -> Option<Value> {
    let mut segs = path.segments.iter();
    let first = segs.next()?;

    let mut current = match first.as_str() {
        "nothing" => Value::None,
        "default" => Value::Default,
        "repeat" => return scopes.resolve_repeat(segs.as_slice()),
        name => match scopes.lookup(name) {
            Some(value) => value,
            None => Value::String(attrs.get(name)?.to_string()),
        },
    };

    for seg in segs {
        current = match current {
            // Explicit absence and the default sentinel short-circuit the
            // rest of the path.
            Value::None => return Some(Value::None),
            Value::Default => return Some(Value::Default),
            Value::Map(ref map) => lookup_key(map, seg)?.clone(),
            _ => return None,
        };
    }
    Some(current)
}

/// Exact key lookup, retried with the first letter upper-cased so that
/// template paths written lower-case resolve capitalized record fields.
pub(crate) fn lookup_key<'a>(
    map: &'a crate::Map<String, Value>,
    seg: &str,
) -> Option<&'a Value> {
    map.get(seg)
        .or_else(|| map.get(capitalize_first(seg).as_str()))
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
