//! An HTML template engine implementing the Template Attribute Language.
//!
//! TAL templates are plain HTML documents: the commands live in attributes
//! in the `tal:` namespace, so a template remains viewable and editable as
//! the page it produces.
//!
//! - Substitution: `<p tal:content="user/name">sample</p>`
//! - Conditions: `<div tal:condition="user/enabled">...</div>`
//! - Loops: `<li tal:repeat="item items">...</li>`
//! - Attributes: `<a tal:attributes="href item/url">...</a>`
//! - Variables: `<div tal:define="name user/name">...</div>`
//! - Tag elision: `<span tal:omit-tag="">kept contents</span>`
//! - Macros and slots in the `metal:` namespace.
//!
//! Expressions are TALES paths: slash-separated traversals of the render
//! context (`user/address/city`), resolved against local and global
//! variables, the context value, and the `repeat/<name>/<flag>` loop
//! namespace. The sentinels `nothing` (explicit absence) and `default`
//! (keep the template's literal markup) have their usual TAL meaning.
//!
//! # Introduction
//!
//! Compiling a template lowers the HTML into a flat program of render
//! instructions. The compiled [`Template`] is immutable and can be rendered
//! any number of times, concurrently if shared.
//!
//! ```
//! let template = tal::compile(r#"<p tal:content="greeting">sample</p>"#)?;
//! # Ok::<(), tal::CompileError>(())
//! ```
//!
//! Rendering executes the program against a context [`Value`], writing to a
//! `String` or any [`std::io::Write`] sink.
//!
//! ```
//! # let template = tal::compile(r#"<p tal:content="greeting">sample</p>"#).unwrap();
//! let ctx = tal::value! { greeting: "Hello, world!" };
//! let out = template.render_from(&ctx).to_string()?;
//! assert_eq!(out, "<p>Hello, world!</p>");
//! # Ok::<(), tal::RenderError>(())
//! ```
//!
//! With the default `serde` feature any serializable data can be used as
//! the context directly.
//!
//! ```
//! #[derive(serde::Serialize)]
//! struct Context {
//!     greeting: String,
//! }
//!
//! # let template = tal::compile(r#"<p tal:content="greeting">sample</p>"#).unwrap();
//! let ctx = Context { greeting: "Hello!".into() };
//! assert_eq!(template.render(&ctx).to_string()?, "<p>Hello!</p>");
//! # Ok::<(), tal::RenderError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod attrs;
mod compile;
mod error;
mod fmt;
mod macros;
mod render;
mod tales;
mod types;
pub mod value;

use std::fmt as std_fmt;

pub use crate::error::{CompileError, CompileErrorKind, RenderError};
pub use crate::render::Renderer;
#[cfg(feature = "serde")]
pub use crate::value::to_value;
pub use crate::value::{List, Map, Value};

use crate::types::program::Program;

/// Compile a template.
///
/// This is a convenience for [`Template::compile`].
pub fn compile(source: &str) -> Result<Template, CompileError> {
    Template::compile(source)
}

/// A compiled template.
///
/// Immutable once compiled: renders never mutate the template, so a
/// `Template` can be shared and rendered from multiple threads, each render
/// owning its own state.
pub struct Template {
    pub(crate) program: Program,
}

impl Template {
    /// Compile a template from HTML source.
    pub fn compile(source: &str) -> Result<Template, CompileError> {
        let program = compile::template(source)?;
        Ok(Template { program })
    }

    /// Render the template using the given context value.
    pub fn render_from<'render>(&'render self, context: &'render Value) -> Renderer<'render> {
        Renderer::with_value(self, context)
    }

    /// Render the template using any serializable context.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    pub fn render<'render, S>(&'render self, context: S) -> Renderer<'render>
    where
        S: serde::Serialize,
    {
        Renderer::with_serde(self, context)
    }
}

/// A human readable dump of the compiled instructions, for debugging.
impl std_fmt::Display for Template {
    fn fmt(&self, f: &mut std_fmt::Formatter<'_>) -> std_fmt::Result {
        std_fmt::Display::fmt(&self.program, f)
    }
}

impl std_fmt::Debug for Template {
    fn fmt(&self, f: &mut std_fmt::Formatter<'_>) -> std_fmt::Result {
        f.debug_struct("Template").finish_non_exhaustive()
    }
}
