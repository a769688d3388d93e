//! Compile an HTML template into a program that can be executed by the
//! renderer.
//!
//! This process has three stages:
//! - The lexer chunks the source into tags and raw passthrough tokens.
//! - The tag state machine lowers tokens into instructions, emitting the
//!   TAL commands of each element in their fixed precedence order (`define`
//!   → `condition` → `repeat` → `content`/`replace` → `attributes` →
//!   `omit-tag`) and back-patching jump indices when elements close.
//! - The macro linker expands `metal:use-macro` sites.
//!
//! Elements without TAL or METAL attributes never become instructions:
//! their markup is serialized straight into the pending data buffer, so
//! adjacent literal output merges into a single `RenderData` by
//! construction. Every element still participates in balance verification
//! through the open-tag frame stack.

pub(crate) mod lex;
mod link;

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use crate::attrs::AttrList;
use crate::compile::lex::{Lexer, StartTagToken, Token};
use crate::error::{CompileError, CompileErrorKind};
use crate::fmt::escape;
use crate::tales;
use crate::types::program::{Instr, MacroDef, Program, StartTag, FIXME};
use crate::types::span::Span;

/// Compile a template source into a program.
pub(crate) fn template(source: &str) -> Result<Program, CompileError> {
    Compiler::new(source).compile()
}

/// HTML elements that never have a close tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

struct Compiler<'source> {
    source: &'source str,
    instrs: Vec<Instr>,
    /// Pending literal output, flushed to a `RenderData` before any other
    /// instruction is emitted.
    data: String,
    frames: Vec<Frame>,
    next_repeat_id: usize,
    macros: BTreeMap<String, MacroDef>,
    uses: Vec<link::UseSite>,
}

/// An open element.
struct Frame {
    name: String,
    span: Span,
    /// Index of the element's first instruction; `None` for elements
    /// compiled as literal output.
    first_idx: Option<usize>,
    start_idx: Option<usize>,
    cond_idx: Option<usize>,
    /// `(instruction index, variable name, repeat id)` of a `tal:repeat`.
    repeat: Option<(usize, String, usize)>,
    /// Number of local defines to pop when the element closes.
    locals: usize,
    had_omit: bool,
    /// Index of the first instruction after the `StartTag`.
    body_start: usize,
    define_macro: Option<String>,
    define_slot: Option<String>,
    use_macro: Option<String>,
    fill_slot: Option<String>,
    /// Slot spans registered by `define-slot` descendants.
    slots: BTreeMap<String, Range<usize>>,
    /// Fill spans registered by `fill-slot` descendants.
    fills: BTreeMap<String, Range<usize>>,
}

/// The TAL and METAL attributes of one start tag, split out from the
/// ordinary attributes.
#[derive(Default)]
struct Commands {
    define: Option<String>,
    condition: Option<String>,
    repeat: Option<String>,
    content: Option<String>,
    replace: Option<String>,
    attributes: Option<String>,
    omit_tag: Option<String>,
    define_macro: Option<String>,
    use_macro: Option<String>,
    define_slot: Option<String>,
    fill_slot: Option<String>,
}

impl Commands {
    fn is_empty(&self) -> bool {
        self.define.is_none()
            && self.condition.is_none()
            && self.repeat.is_none()
            && self.content.is_none()
            && self.replace.is_none()
            && self.attributes.is_none()
            && self.omit_tag.is_none()
            && self.define_macro.is_none()
            && self.use_macro.is_none()
            && self.define_slot.is_none()
            && self.fill_slot.is_none()
    }
}

impl<'source> Compiler<'source> {
    fn new(source: &'source str) -> Self {
        Self {
            source,
            instrs: Vec::new(),
            data: String::new(),
            frames: Vec::new(),
            next_repeat_id: 0,
            macros: BTreeMap::new(),
            uses: Vec::new(),
        }
    }

    fn compile(mut self) -> Result<Program, CompileError> {
        let mut lexer = Lexer::new(self.source);
        while let Some(token) = lexer.next() {
            match token {
                Token::Raw(raw) => self.data.push_str(raw),
                Token::StartTag(tag) => self.start_tag(tag)?,
                Token::EndTag { name, span } => self.end_tag(&name, span)?,
            }
        }

        // Close anything left open at the end of the source. No close-tag
        // bytes are invented, but the bookkeeping instructions and index
        // patches are required for a well-formed program.
        while let Some(frame) = self.frames.pop() {
            if frame.first_idx.is_some() {
                self.flush_data();
                self.close_element(frame, false);
            }
        }
        self.flush_data();

        let (instrs, macros) = link::expand(self.instrs, self.macros, self.uses, self.source)?;
        Ok(Program { instrs, macros })
    }

    fn flush_data(&mut self) {
        if !self.data.is_empty() {
            let data = std::mem::take(&mut self.data);
            self.instrs.push(Instr::RenderData(data));
        }
    }

    fn push(&mut self, instr: Instr) -> usize {
        let i = self.instrs.len();
        self.instrs.push(instr);
        i
    }

    fn start_tag(&mut self, tag: StartTagToken) -> Result<(), CompileError> {
        let StartTagToken {
            name,
            attrs,
            self_closing,
            span,
        } = tag;
        let void = self_closing || is_void_element(&name);

        let mut commands = Commands::default();
        let mut plain = Vec::new();
        for (attr_name, value) in attrs {
            if let Some(cmd) = attr_name.strip_prefix("tal:") {
                let slot = match cmd {
                    "define" => &mut commands.define,
                    "condition" => &mut commands.condition,
                    "repeat" => &mut commands.repeat,
                    "content" => &mut commands.content,
                    "replace" => &mut commands.replace,
                    "attributes" => &mut commands.attributes,
                    "omit-tag" => &mut commands.omit_tag,
                    _ => {
                        return Err(CompileError::with_span(
                            CompileErrorKind::UnknownTalCommand,
                            format!("unknown TAL command tal:{cmd}"),
                            self.source,
                            span,
                        ));
                    }
                };
                *slot = Some(value);
            } else if let Some(cmd) = attr_name.strip_prefix("metal:") {
                let slot = match cmd {
                    "define-macro" => &mut commands.define_macro,
                    "use-macro" => &mut commands.use_macro,
                    "define-slot" => &mut commands.define_slot,
                    "fill-slot" => &mut commands.fill_slot,
                    _ => {
                        return Err(CompileError::with_span(
                            CompileErrorKind::UnknownTalCommand,
                            format!("unknown METAL command metal:{cmd}"),
                            self.source,
                            span,
                        ));
                    }
                };
                *slot = Some(value);
            } else {
                plain.push((attr_name, value));
            }
        }

        if commands.is_empty() {
            // Literal element: serialize into the pending data buffer.
            serialize_start_tag(&mut self.data, &name, &plain);
            if !void {
                self.frames.push(Frame::literal(name, span));
            }
            return Ok(());
        }

        if commands.content.is_some() && commands.replace.is_some() {
            return Err(CompileError::with_span(
                CompileErrorKind::ExpressionMalformed,
                "tal:content and tal:replace cannot be used on the same element",
                self.source,
                span,
            ));
        }
        if commands.fill_slot.is_some()
            && !self.frames.iter().any(|f| f.use_macro.is_some())
        {
            return Err(CompileError::with_span(
                CompileErrorKind::SlotOutsideMacro,
                "metal:fill-slot outside of a metal:use-macro element",
                self.source,
                span,
            ));
        }

        let defines = match &commands.define {
            Some(expr) => tales::parse_defines(expr, self.source, span)?,
            None => Vec::new(),
        };
        let condition = match &commands.condition {
            Some(expr) => Some(tales::parse_condition(expr, self.source, span)?),
            None => None,
        };
        let repeat = match &commands.repeat {
            Some(expr) => Some(tales::parse_repeat(expr, self.source, span)?),
            None => None,
        };
        let replace = commands.replace.is_some();
        let content = match commands.content.as_ref().or(commands.replace.as_ref()) {
            Some(expr) => {
                let cmd = if replace { "tal:replace" } else { "tal:content" };
                Some(tales::parse_content(cmd, expr, self.source, span)?)
            }
            None => None,
        };
        let attr_exprs = match &commands.attributes {
            Some(expr) => tales::parse_attributes(expr, self.source, span)?,
            None => Vec::new(),
        };
        let omit_tag = match &commands.omit_tag {
            Some(expr) => Some(tales::parse_omit_tag(expr, self.source, span)?),
            None => None,
        };
        let use_macro = match &commands.use_macro {
            Some(expr) => Some(self.parse_macro_path(expr, span)?),
            None => None,
        };
        for (cmd, name) in [
            ("metal:define-macro", &commands.define_macro),
            ("metal:define-slot", &commands.define_slot),
            ("metal:fill-slot", &commands.fill_slot),
        ] {
            if matches!(name, Some(n) if n.is_empty()) {
                return Err(CompileError::with_span(
                    CompileErrorKind::ExpressionMissing,
                    format!("{cmd} requires a name"),
                    self.source,
                    span,
                ));
            }
        }

        self.flush_data();
        let first_idx = self.instrs.len();
        let original_attrs = Arc::new(AttrList::new(plain));

        let locals = defines.iter().filter(|d| !d.global).count();
        for define in defines {
            self.push(Instr::DefineVar {
                define,
                original_attrs: Arc::clone(&original_attrs),
            });
        }
        let cond_idx = condition.map(|expr| {
            self.push(Instr::Condition {
                expr,
                end_idx: FIXME,
                original_attrs: Arc::clone(&original_attrs),
            })
        });
        let repeat = repeat.map(|r| {
            let repeat_id = self.next_repeat_id;
            self.next_repeat_id += 1;
            let idx = self.push(Instr::RepeatStart {
                name: r.name.clone(),
                expr: r.path,
                repeat_id,
                end_idx: FIXME,
                original_attrs: Arc::clone(&original_attrs),
            });
            (idx, r.name, repeat_id)
        });
        let start_idx = self.push(Instr::StartTag(StartTag {
            name: name.clone(),
            original_attrs,
            content,
            attr_exprs,
            replace,
            omit_tag: omit_tag.clone(),
            end_idx: FIXME,
            void,
        }));

        let frame = Frame {
            name,
            span,
            first_idx: Some(first_idx),
            start_idx: Some(start_idx),
            cond_idx,
            repeat,
            locals,
            had_omit: omit_tag.is_some() && !void,
            body_start: self.instrs.len(),
            define_macro: commands.define_macro,
            define_slot: commands.define_slot,
            use_macro,
            fill_slot: commands.fill_slot,
            slots: BTreeMap::new(),
            fills: BTreeMap::new(),
        };

        if void {
            self.close_element(frame, false);
        } else {
            self.frames.push(frame);
        }
        Ok(())
    }

    fn end_tag(&mut self, name: &str, span: Span) -> Result<(), CompileError> {
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => {
                return Err(CompileError::with_span(
                    CompileErrorKind::UnexpectedCloseTag,
                    format!("close tag </{name}> without an open element"),
                    self.source,
                    span,
                ));
            }
        };
        if frame.name != name {
            return Err(CompileError::with_span(
                CompileErrorKind::UnexpectedCloseTag,
                format!("close tag </{}> expected, found </{name}>", frame.name),
                self.source,
                span,
            ));
        }

        if frame.first_idx.is_none() {
            self.data.push_str("</");
            self.data.push_str(name);
            self.data.push('>');
            return Ok(());
        }

        self.flush_data();
        self.close_element(frame, true);
        Ok(())
    }

    /// Emits the close bookkeeping for an element and back-patches its jump
    /// indices. `emit_end_tag` is false for void and self-closing elements
    /// and for elements still open at the end of the source.
    fn close_element(&mut self, frame: Frame, emit_end_tag: bool) {
        // Index whose successor is the first post-element instruction.
        let anchor = self.instrs.len();
        if emit_end_tag {
            self.push(Instr::EndTag {
                name: frame.name.clone(),
                check_omit_tag: frame.had_omit,
            });
        }

        if let Some((repeat_idx, repeat_name, repeat_id)) = &frame.repeat {
            let end = self.push(Instr::RepeatEnd {
                name: repeat_name.clone(),
                repeat_id: *repeat_id,
                start_idx: *repeat_idx,
            });
            if let Instr::RepeatStart { end_idx, .. } = &mut self.instrs[*repeat_idx] {
                *end_idx = end + 1;
            }
        }
        for _ in 0..frame.locals {
            self.push(Instr::RemoveLocal);
        }

        if let Some(start_idx) = frame.start_idx {
            if let Instr::StartTag(tag) = &mut self.instrs[start_idx] {
                tag.end_idx = anchor;
            }
        }
        if let Some(cond_idx) = frame.cond_idx {
            let target = if emit_end_tag { anchor + 1 } else { anchor };
            if let Instr::Condition { end_idx, .. } = &mut self.instrs[cond_idx] {
                *end_idx = target;
            }
        }

        self.register_metal(frame, anchor);
    }

    /// Records the METAL bookkeeping of a closed element: macro and use-site
    /// spans on the compiler, slot and fill spans on the nearest interested
    /// ancestor frame.
    fn register_metal(&mut self, frame: Frame, body_end: usize) {
        let whole = frame.first_idx.unwrap_or(body_end)..self.instrs.len();

        if let Some(name) = frame.define_macro {
            self.macros.insert(
                name,
                MacroDef {
                    body: frame.body_start..body_end,
                    slots: frame.slots,
                },
            );
        } else {
            // Slots of a nested define-macro belong to it alone.
            if let Some(owner) = self
                .frames
                .iter_mut()
                .rev()
                .find(|f| f.define_macro.is_some())
            {
                if let Some(name) = frame.define_slot {
                    owner.slots.insert(name, whole.clone());
                }
                owner.slots.extend(frame.slots);
            }
        }

        if let Some(name) = frame.use_macro {
            self.uses.push(link::UseSite {
                name,
                span: frame.span,
                body: frame.body_start..body_end,
                fills: frame.fills,
            });
        } else if let Some(owner) = self.frames.iter_mut().rev().find(|f| f.use_macro.is_some()) {
            if let Some(name) = frame.fill_slot {
                owner.fills.insert(name, whole);
            }
            owner.fills.extend(frame.fills);
        }
    }

    /// Only the literal `macros/<name>` use-macro form is supported.
    fn parse_macro_path(&self, expr: &str, span: Span) -> Result<String, CompileError> {
        match expr.trim().strip_prefix("macros/") {
            Some(name) if !name.is_empty() && !name.contains('/') => Ok(name.to_string()),
            _ => Err(CompileError::with_span(
                CompileErrorKind::ExpressionMalformed,
                "metal:use-macro expects a macros/<name> path",
                self.source,
                span,
            )),
        }
    }
}

impl Frame {
    fn literal(name: String, span: Span) -> Self {
        Self {
            name,
            span,
            first_idx: None,
            start_idx: None,
            cond_idx: None,
            repeat: None,
            locals: 0,
            had_omit: false,
            body_start: 0,
            define_macro: None,
            define_slot: None,
            use_macro: None,
            fill_slot: None,
            slots: BTreeMap::new(),
            fills: BTreeMap::new(),
        }
    }
}

/// Serializes a start tag from its parts. Attribute values are always
/// double-quoted and entity-escaped.
fn serialize_start_tag<W: std::fmt::Write>(out: &mut W, name: &str, attrs: &[(String, String)]) {
    // Writing to a String cannot fail.
    let _ = write_start_tag(out, name, attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
}

pub(crate) fn write_start_tag<'a, W: std::fmt::Write>(
    out: &mut W,
    name: &str,
    attrs: impl Iterator<Item = (&'a str, &'a str)>,
) -> std::fmt::Result {
    out.write_char('<')?;
    out.write_str(name)?;
    for (attr_name, value) in attrs {
        out.write_char(' ')?;
        out.write_str(attr_name)?;
        out.write_str("=\"")?;
        escape(out, value)?;
        out.write_char('"')?;
    }
    out.write_char('>')
}
