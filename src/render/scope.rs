//! The variable environment for one render: a local stack, a global map,
//! and the repeat-variable stack.

use crate::render::repeat::RepeatState;
use crate::tales;
use crate::{Map, Value};

pub(crate) struct Scopes<'render> {
    /// The context value supplied to the render call.
    context: &'render Value,

    /// Local variables, innermost last. Lookup scans from the top.
    locals: Vec<(String, Value)>,

    /// Global variables, reset per render.
    globals: Map<String, Value>,

    /// Active `tal:repeat` loops, innermost last.
    repeats: Vec<(String, RepeatState)>,
}

impl<'render> Scopes<'render> {
    pub fn new(context: &'render Value) -> Self {
        Self {
            context,
            locals: Vec::new(),
            globals: Map::new(),
            repeats: Vec::new(),
        }
    }

    /// Resolves a name: local scopes innermost-first, then globals, then the
    /// context value.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        for (n, v) in self.locals.iter().rev() {
            if n == name {
                return Some(v.clone());
            }
        }
        if let Some(v) = self.globals.get(name) {
            return Some(v.clone());
        }
        match self.context {
            Value::Map(map) => tales::lookup_key(map, name).cloned(),
            _ => None,
        }
    }

    pub fn add_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.push((name.into(), value));
    }

    /// Mutates the innermost local with the given name. Used by repeat
    /// loops to rebind the loop variable each iteration.
    pub fn set_local(&mut self, name: &str, value: Value) {
        for (n, v) in self.locals.iter_mut().rev() {
            if n == name {
                *v = value;
                return;
            }
        }
    }

    /// Pops one local frame. Popping an empty stack is a compiler bug but
    /// must not bring the render down.
    pub fn remove_local(&mut self) {
        self.locals.pop();
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn push_repeat(&mut self, name: impl Into<String>, state: RepeatState) {
        self.repeats.push((name.into(), state));
    }

    pub fn pop_repeat(&mut self) {
        self.repeats.pop();
    }

    /// The innermost repeat variable with the given name.
    pub fn repeat(&self, name: &str) -> Option<&RepeatState> {
        self.repeats
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, state)| state)
    }

    pub fn repeat_mut(&mut self, name: &str) -> Option<&mut RepeatState> {
        self.repeats
            .iter_mut()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, state)| state)
    }

    /// Resolves the remainder of a `repeat/<name>/<flag>` path.
    pub fn resolve_repeat(&self, rest: &[String]) -> Option<Value> {
        match rest {
            [name, flag] => self.repeat(name)?.flag(flag),
            _ => None,
        }
    }
}
