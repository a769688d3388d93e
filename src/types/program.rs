//! Defines a compiled [`Program`] which is a flat sequence of [`Instr`]
//! executed by the renderer.
//!
//! Control flow never uses pointers: every jump is an index into the
//! instruction vector, patched in by the compiler when the owning element
//! closes. Index fields hold exact continuation targets:
//!
//! - `StartTag::end_idx` is the index of the matching `EndTag` (for a void
//!   element, one past the `StartTag` itself).
//! - `Condition::end_idx` is the first index after the matching `EndTag`,
//!   so the element's `RepeatEnd`/`RemoveLocal` bookkeeping still runs when
//!   the condition is false.
//! - `RepeatStart::end_idx` is the first index after the matching
//!   `RepeatEnd`.
//! - `RepeatEnd::start_idx` is the index of the matching `RepeatStart`,
//!   which re-executes on loop-back and recognizes the continuation.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::attrs::AttrList;
use crate::tales::{ContentExpr, Define, Path};

/// Placeholder for an index that is patched when the element closes.
pub(crate) const FIXME: usize = !0;

#[derive(Debug)]
pub(crate) struct Program {
    pub instrs: Vec<Instr>,
    pub macros: BTreeMap<String, MacroDef>,
}

/// A `metal:define-macro` registration: the instruction span of the macro
/// body and the spans of the slots defined inside it.
#[derive(Debug, Clone)]
pub(crate) struct MacroDef {
    pub body: Range<usize>,
    pub slots: BTreeMap<String, Range<usize>>,
}

#[derive(Debug, Clone)]
pub(crate) enum Instr {
    /// Literal output passthrough. Adjacent data is merged at compile time.
    RenderData(String),

    /// Open an element carrying TAL commands.
    StartTag(StartTag),

    /// Close an element carrying TAL commands.
    EndTag {
        name: String,
        /// Consult the omit-tag flag stack before emitting.
        check_omit_tag: bool,
    },

    /// Bind a local or global variable.
    DefineVar {
        define: Define,
        original_attrs: Arc<AttrList>,
    },

    /// Pop one local-scope frame.
    RemoveLocal,

    /// Skip the element when the expression is falsy.
    Condition {
        expr: Path,
        end_idx: usize,
        original_attrs: Arc<AttrList>,
    },

    /// Begin (or continue) a `tal:repeat` loop.
    RepeatStart {
        name: String,
        expr: Path,
        repeat_id: usize,
        end_idx: usize,
        original_attrs: Arc<AttrList>,
    },

    /// Advance a `tal:repeat` loop, jumping back while items remain.
    RepeatEnd {
        name: String,
        repeat_id: usize,
        start_idx: usize,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct StartTag {
    pub name: String,
    pub original_attrs: Arc<AttrList>,
    pub content: Option<ContentExpr>,
    pub attr_exprs: Vec<(String, Path)>,
    /// `tal:replace`: omit the tag and substitute the content in its place.
    pub replace: bool,
    pub omit_tag: Option<Path>,
    pub end_idx: usize,
    pub void: bool,
}

impl Instr {
    /// Visit every instruction-index field, for rebase by the macro linker.
    pub fn for_each_index_mut(&mut self, mut f: impl FnMut(&mut usize)) {
        match self {
            Instr::StartTag(tag) => f(&mut tag.end_idx),
            Instr::Condition { end_idx, .. } => f(end_idx),
            Instr::RepeatStart { end_idx, .. } => f(end_idx),
            Instr::RepeatEnd { start_idx, .. } => f(start_idx),
            Instr::RenderData(_) | Instr::EndTag { .. } | Instr::DefineVar { .. } | Instr::RemoveLocal => {}
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::RenderData(data) => {
                let mut end = 60.min(data.len());
                while !data.is_char_boundary(end) {
                    end -= 1;
                }
                write!(f, "{:?}", &data[..end])
            }
            Instr::StartTag(tag) => {
                write!(
                    f,
                    "<{}> start tag - end index {} - void {}",
                    tag.name, tag.end_idx, tag.void
                )?;
                if let Some(content) = &tag.content {
                    write!(f, " - content {}", content.path)?;
                    if content.structure {
                        write!(f, " (structure)")?;
                    }
                    if tag.replace {
                        write!(f, " (replace)")?;
                    }
                }
                for (name, path) in &tag.attr_exprs {
                    write!(f, " - attribute {name} {path}")?;
                }
                if let Some(path) = &tag.omit_tag {
                    write!(f, " - omit tag {path}")?;
                }
                Ok(())
            }
            Instr::EndTag {
                name,
                check_omit_tag,
            } => write!(f, "</{name}> omit flag test: {check_omit_tag}"),
            Instr::DefineVar { define, .. } => {
                let scope = if define.global { "global" } else { "local" };
                write!(f, "set variable {scope} {} to {}", define.name, define.path)
            }
            Instr::RemoveLocal => write!(f, "remove local variable"),
            Instr::Condition { expr, end_idx, .. } => {
                write!(f, "condition {expr} to index {end_idx}")
            }
            Instr::RepeatStart {
                name,
                expr,
                end_idx,
                ..
            } => write!(f, "repeat {name} over {expr} to index {end_idx}"),
            Instr::RepeatEnd {
                name,
                repeat_id,
                start_idx,
            } => write!(f, "end repeat {name} (id {repeat_id}) start index {start_idx}"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, instr) in self.instrs.iter().enumerate() {
            writeln!(f, "{index}: {instr}")?;
        }
        for (name, def) in &self.macros {
            writeln!(
                f,
                "macro {name}: instructions {:?}, slots {:?}",
                def.body,
                def.slots.keys().collect::<Vec<_>>()
            )?;
        }
        Ok(())
    }
}
