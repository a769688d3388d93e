mod core;
pub(crate) mod repeat;
pub(crate) mod scope;

use std::fmt;
use std::io;

use crate::error::RenderError;
use crate::fmt::{Formatter, Writer};
use crate::render::core::RendererImpl;
use crate::render::scope::Scopes;
use crate::types::program::Instr;
use crate::{Template, Value};

/// A printf-style debug callback.
pub(crate) type DebugFn<'render> = dyn Fn(fmt::Arguments<'_>) + 'render;

/// A configured render of a [`Template`].
///
/// Created by [`Template::render_from`] (or [`Template::render`] with the
/// `serde` feature) and finished with [`to_string`][Renderer::to_string] or
/// [`to_writer`][Renderer::to_writer].
#[must_use = "must call `.to_string()` or `.to_writer(..)` on the renderer"]
pub struct Renderer<'render> {
    template: &'render Template,
    globals: Globals<'render>,
    debug: Option<Box<DebugFn<'render>>>,
}

enum Globals<'render> {
    Borrowed(&'render Value),
    #[cfg(feature = "serde")]
    Owned(Result<Value, RenderError>),
}

impl<'render> Renderer<'render> {
    pub(crate) fn with_value(template: &'render Template, context: &'render Value) -> Self {
        Self {
            template,
            globals: Globals::Borrowed(context),
            debug: None,
        }
    }

    #[cfg(feature = "serde")]
    pub(crate) fn with_serde<S>(template: &'render Template, context: S) -> Self
    where
        S: serde::Serialize,
    {
        Self {
            template,
            globals: Globals::Owned(crate::to_value(context)),
            debug: None,
        }
    }

    /// Installs a printf-style logger used for render tracing.
    ///
    /// ```
    /// # let template = tal::compile("<p>x</p>").unwrap();
    /// # let ctx = tal::Value::None;
    /// let out = template
    ///     .render_from(&ctx)
    ///     .debug_logging(|args| eprintln!("tal: {args}"))
    ///     .to_string();
    /// ```
    pub fn debug_logging<F>(mut self, f: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + 'render,
    {
        self.debug = Some(Box::new(f));
        self
    }

    /// Render the template to a string.
    pub fn to_string(self) -> Result<String, RenderError> {
        let capacity = self
            .template
            .program
            .instrs
            .iter()
            .map(|instr| match instr {
                Instr::RenderData(data) => data.len(),
                _ => 0,
            })
            .sum();
        let mut s = String::with_capacity(capacity);
        let mut f = Formatter::with_string(&mut s);
        self.render_impl(&mut f)?;
        Ok(s)
    }

    /// Render the template to the given writer.
    ///
    /// A sink error aborts the render immediately and is returned as the
    /// underlying [`io::Error`].
    pub fn to_writer<W>(self, w: W) -> Result<(), RenderError>
    where
        W: io::Write,
    {
        let mut w = Writer::new(w);
        let mut f = Formatter::with_writer(&mut w);
        match self.render_impl(&mut f) {
            Ok(()) => Ok(()),
            Err(err) => Err(w.take_err().map(RenderError::from).unwrap_or(err)),
        }
    }

    fn render_impl(self, f: &mut Formatter<'_>) -> Result<(), RenderError> {
        let Self {
            template,
            globals,
            debug,
        } = self;
        match globals {
            Globals::Borrowed(context) => run(template, context, debug.as_deref(), f),
            #[cfg(feature = "serde")]
            Globals::Owned(result) => {
                let context = result?;
                run(template, &context, debug.as_deref(), f)
            }
        }
    }
}

fn run<'a>(
    template: &'a Template,
    context: &'a Value,
    debug: Option<&'a DebugFn<'a>>,
    f: &mut Formatter<'_>,
) -> Result<(), RenderError> {
    RendererImpl {
        program: &template.program,
        scopes: Scopes::new(context),
        omit_flags: Vec::new(),
        debug,
    }
    .render(f)
}
