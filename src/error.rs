use std::cmp::max;
use std::fmt;
use std::io;

use unicode_width::UnicodeWidthStr;

use crate::types::span::Span;

/// An error produced while compiling a template.
///
/// Carries a [`kind`][CompileError::kind] identifying the failure class and,
/// where the offending markup is known, renders a caret-underlined excerpt of
/// the template source in its `Display` and `Debug` output.
pub struct CompileError {
    kind: CompileErrorKind,
    msg: String,
    excerpt: Option<(String, Span)>,
}

/// The class of a [`CompileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompileErrorKind {
    /// A close tag did not match the innermost open element.
    UnexpectedCloseTag,
    /// A `tal:` or `metal:` attribute outside the command set.
    UnknownTalCommand,
    /// A command expression with too many words or an unusable shape.
    ExpressionMalformed,
    /// A command that requires an expression received none or too few words.
    ExpressionMissing,
    /// `metal:fill-slot` outside of a `metal:use-macro` element.
    SlotOutsideMacro,
}

impl CompileError {
    pub(crate) fn with_span(
        kind: CompileErrorKind,
        msg: impl Into<String>,
        source: &str,
        span: impl Into<Span>,
    ) -> Self {
        Self {
            kind,
            msg: msg.into(),
            excerpt: Some((source.to_string(), span.into())),
        }
    }

    /// Returns the failure class of this error.
    pub fn kind(&self) -> CompileErrorKind {
        self.kind
    }
}

impl std::error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.excerpt {
            Some((source, span)) => fmt_pretty(&self.msg, source, *span, f),
            None => write!(f, "{}", self.msg),
        }
    }
}

impl fmt::Debug for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.excerpt {
            Some((source, span)) => fmt_pretty(&self.msg, source, *span, f),
            None => f
                .debug_struct("CompileError")
                .field("kind", &self.kind)
                .field("msg", &self.msg)
                .finish(),
        }
    }
}

/// An error produced while rendering a template.
///
/// The renderer itself cannot fail on a compiled program; the only failures
/// are those of the output sink.
pub struct RenderError {
    kind: RenderErrorKind,
}

enum RenderErrorKind {
    Io(io::Error),
    Fmt,
    #[cfg(feature = "serde")]
    Serialize(String),
}

#[cfg(feature = "serde")]
impl serde::ser::Error for RenderError {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self {
            kind: RenderErrorKind::Serialize(msg.to_string()),
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        Self {
            kind: RenderErrorKind::Io(err),
        }
    }
}

impl From<fmt::Error> for RenderError {
    fn from(_: fmt::Error) -> Self {
        Self {
            kind: RenderErrorKind::Fmt,
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            RenderErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RenderErrorKind::Io(err) => write!(f, "failed to write to output: {err}"),
            RenderErrorKind::Fmt => write!(f, "failed to write to output"),
            #[cfg(feature = "serde")]
            RenderErrorKind::Serialize(msg) => write!(f, "failed to serialize context: {msg}"),
        }
    }
}

impl fmt::Debug for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RenderErrorKind::Io(err) => f.debug_tuple("RenderError").field(err).finish(),
            RenderErrorKind::Fmt => f.debug_tuple("RenderError").field(&"fmt").finish(),
            #[cfg(feature = "serde")]
            RenderErrorKind::Serialize(msg) => f.debug_tuple("RenderError").field(msg).finish(),
        }
    }
}

fn fmt_pretty(msg: &str, source: &str, span: Span, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let lines: Vec<_> = source.split_terminator('\n').collect();
    let (line, col) = to_line_col(&lines, span.start);
    let width = max(1, source[span].width());
    let code = lines
        .get(line)
        .or_else(|| lines.last())
        .copied()
        .unwrap_or("");

    let num = (line + 1).to_string();
    let pad = num.width();
    let pipe = "|";
    let underline = "^".repeat(width);

    write!(
        f,
        "\n \
        {0:pad$} {pipe}\n \
        {num:>} {pipe} {code}\n \
        {0:pad$} {pipe} {underline:>width$} {msg}\n",
        "",
        pad = pad,
        pipe = pipe,
        num = num,
        code = code,
        underline = underline,
        width = col + width,
        msg = msg
    )
}

fn to_line_col(lines: &[&str], offset: usize) -> (usize, usize) {
    let mut n = 0;
    for (i, line) in lines.iter().enumerate() {
        let len = line.len() + 1;
        if n + len > offset {
            return (i, line[..offset - n].width());
        }
        n += len;
    }
    (
        lines.len().saturating_sub(1),
        lines.last().map(|l| l.width()).unwrap_or(0),
    )
}
