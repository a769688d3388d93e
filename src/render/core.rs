use std::fmt::Write;

use crate::attrs::AttrList;
use crate::compile::write_start_tag;
use crate::error::RenderError;
use crate::fmt::{escape, Formatter};
use crate::render::repeat::RepeatState;
use crate::render::scope::Scopes;
use crate::render::DebugFn;
use crate::tales::{self, Path};
use crate::types::program::{Instr, Program, StartTag};
use crate::Value;

/// Attributes that take their own name as value when set from a truthy
/// expression and are removed when set from a falsy one.
const BOOLEAN_ATTRS: &[&str] = &[
    "checked", "disabled", "readonly", "selected", "multiple", "ismap", "defer", "declare",
    "noresize", "noshade", "nowrap", "compact",
];

/// The virtual machine interpreting a compiled [`Program`].
///
/// A fetch/execute loop over the flat instruction vector. Every step
/// returns the index of the next instruction to execute; instructions
/// implement their control flow by returning one of the pre-patched index
/// fields instead of `pc + 1`.
pub(crate) struct RendererImpl<'render> {
    pub program: &'render Program,
    pub scopes: Scopes<'render>,
    /// Pushed by `StartTag` for elements carrying `tal:omit-tag`, consulted
    /// and popped by the matching `EndTag`.
    pub omit_flags: Vec<bool>,
    pub debug: Option<&'render DebugFn<'render>>,
}

impl<'render> RendererImpl<'render> {
    pub fn render(mut self, f: &mut Formatter<'_>) -> Result<(), RenderError> {
        // Copy the program reference out so instruction borrows do not tie
        // up `self`.
        let program = self.program;
        let mut pc = 0;
        while let Some(instr) = program.instrs.get(pc) {
            self.trace(format_args!("executing instruction {pc}: {instr}"));
            pc = self.step(f, instr, pc)?;
        }
        Ok(())
    }

    fn step(
        &mut self,
        f: &mut Formatter<'_>,
        instr: &'render Instr,
        pc: usize,
    ) -> Result<usize, RenderError> {
        match instr {
            Instr::RenderData(data) => {
                f.write_str(data)?;
                Ok(pc + 1)
            }

            Instr::StartTag(tag) => self.start_tag(f, tag, pc),

            Instr::EndTag {
                name,
                check_omit_tag,
            } => {
                let mut render = true;
                if *check_omit_tag {
                    render = !self.pop_omit_flag();
                }
                if render {
                    f.write_str("</")?;
                    f.write_str(name)?;
                    f.write_char('>')?;
                } else {
                    self.trace(format_args!("end tag </{name}> omitted"));
                }
                Ok(pc + 1)
            }

            Instr::DefineVar {
                define,
                original_attrs,
            } => {
                // An unresolvable path binds the empty string, keeping later
                // lookups falsy without turning them into explicit absence.
                let value = self
                    .eval(&define.path, original_attrs)
                    .unwrap_or_else(|| Value::String(String::new()));
                if define.global {
                    self.scopes.set_global(define.name.clone(), value);
                } else {
                    self.scopes.add_local(define.name.clone(), value);
                }
                Ok(pc + 1)
            }

            Instr::RemoveLocal => {
                self.scopes.remove_local();
                Ok(pc + 1)
            }

            Instr::Condition {
                expr,
                end_idx,
                original_attrs,
            } => {
                let value = self.eval(expr, original_attrs);
                if value.map_or(false, |v| v.is_truthy()) {
                    Ok(pc + 1)
                } else {
                    Ok(*end_idx)
                }
            }

            Instr::RepeatStart {
                name,
                expr,
                repeat_id,
                end_idx,
                original_attrs,
            } => {
                if let Some(state) = self.scopes.repeat(name) {
                    if state.repeat_id == *repeat_id {
                        // Jumped back from the matching RepeatEnd: the loop
                        // variable is already rebound, carry on.
                        return Ok(pc + 1);
                    }
                }
                match self.eval(expr, original_attrs) {
                    // Keep the contents intact without any repeat state.
                    Some(Value::Default) => Ok(pc + 1),
                    Some(value) if value.is_sequence() => {
                        let Value::List(items) = value else {
                            return Ok(*end_idx);
                        };
                        let state = RepeatState::new(*repeat_id, items);
                        let first = state.current().clone();
                        self.scopes.push_repeat(name.clone(), state);
                        self.scopes.add_local(name.clone(), first);
                        Ok(pc + 1)
                    }
                    // Not a sequence: remove the element from the flow.
                    _ => Ok(*end_idx),
                }
            }

            Instr::RepeatEnd {
                name,
                repeat_id,
                start_idx,
            } => {
                let next = match self.scopes.repeat_mut(name) {
                    Some(state) if state.repeat_id == *repeat_id => {
                        if state.advance() {
                            Some(Some(state.current().clone()))
                        } else {
                            Some(None)
                        }
                    }
                    // Not repeating here, just continue.
                    _ => None,
                };
                match next {
                    None => Ok(pc + 1),
                    Some(Some(item)) => {
                        self.scopes.set_local(name, item);
                        Ok(*start_idx)
                    }
                    Some(None) => {
                        self.scopes.pop_repeat();
                        self.scopes.remove_local();
                        Ok(pc + 1)
                    }
                }
            }
        }
    }

    fn start_tag(
        &mut self,
        f: &mut Formatter<'_>,
        tag: &'render StartTag,
        pc: usize,
    ) -> Result<usize, RenderError> {
        let mut omit_flag = false;
        if let Some(path) = &tag.omit_tag {
            let value = self.eval(path, &tag.original_attrs);
            omit_flag = value.map_or(false, |v| v.is_truthy());
            self.trace(format_args!(
                "omit tag flag {omit_flag} - void {}",
                tag.void
            ));
            if !tag.void {
                self.omit_flags.push(omit_flag);
            }
        }

        let content = tag
            .content
            .as_ref()
            .map(|c| self.eval(&c.path, &tag.original_attrs));
        let content_is_default = matches!(content, Some(Some(Value::Default)));

        if content_is_default || (!tag.replace && !omit_flag) {
            self.emit_open_tag(f, tag)?;
        }

        match content {
            // No content command, or `Default`: fall through to the body.
            None | Some(Some(Value::Default)) => Ok(pc + 1),
            Some(value) => {
                if !matches!(value, Some(Value::None)) {
                    let text = value.map(|v| v.to_string()).unwrap_or_default();
                    let structure = tag.content.as_ref().map_or(false, |c| c.structure);
                    if structure {
                        f.write_str(&text)?;
                    } else {
                        escape(f, &text)?;
                    }
                }
                if tag.void {
                    // No body and no end tag to skip.
                    Ok(pc + 1)
                } else if tag.replace {
                    Ok(tag.end_idx + 1)
                } else {
                    Ok(tag.end_idx)
                }
            }
        }
    }

    /// Serializes the open tag, materializing `tal:attributes`.
    fn emit_open_tag(
        &mut self,
        f: &mut Formatter<'_>,
        tag: &StartTag,
    ) -> Result<(), RenderError> {
        if tag.attr_exprs.is_empty() {
            write_start_tag(f, &tag.name, tag.original_attrs.iter())?;
            return Ok(());
        }

        let mut attrs: AttrList = (*tag.original_attrs).clone();
        for (name, path) in &tag.attr_exprs {
            match self.eval(path, &tag.original_attrs) {
                Some(Value::None) => {
                    attrs.remove(name);
                }
                Some(Value::Default) => {}
                value => {
                    let boolean = BOOLEAN_ATTRS.contains(&name.as_str())
                        || matches!(value, Some(Value::Bool(_)));
                    if boolean {
                        if value.as_ref().map_or(false, Value::is_truthy) {
                            attrs.set(name, name.clone());
                        } else {
                            attrs.remove(name);
                        }
                    } else {
                        attrs.set(name, value.map(|v| v.to_string()).unwrap_or_default());
                    }
                }
            }
        }
        write_start_tag(f, &tag.name, attrs.iter())?;
        Ok(())
    }

    fn eval(&self, path: &Path, attrs: &AttrList) -> Option<Value> {
        tales::evaluate(path, &self.scopes, attrs)
    }

    /// The omit-tag stack is a defensive invariant: popping it empty is a
    /// compiler bug, logged and recovered as false.
    fn pop_omit_flag(&mut self) -> bool {
        match self.omit_flags.pop() {
            Some(flag) => flag,
            None => {
                self.trace(format_args!(
                    "unexpected render state: omit tag flag requested with none available"
                ));
                false
            }
        }
    }

    fn trace(&self, args: std::fmt::Arguments<'_>) {
        if let Some(debug) = self.debug {
            debug(args);
        }
    }
}
