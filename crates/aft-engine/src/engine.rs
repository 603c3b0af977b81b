//! Template engine based on MiniJinja
//!
//! Package templates carry a `.hbs` suffix. The value context is
//! exposed at the top level, so `{{ service }}` or `{{ volumes.etc }}` refer
//! directly to keys built by the value cascade.

use aft_core::Values;
use minijinja::Environment;
use std::path::Path;

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;

/// Suffixes marking a file as a template
pub const TEMPLATE_SUFFIXES: &[&str] = &[".hbs"];

/// Output name of a template file, or `None` when the name has no template suffix
pub fn template_target(file_name: &str) -> Option<&str> {
    TEMPLATE_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
}

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// Fail on undefined variables instead of rendering them empty
    ///
    /// Off by default: missing keys, nested ones included, render as nothing.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn build(self) -> Engine {
        Engine::new(self.strict_mode)
    }
}

/// The template engine
#[derive(Debug, Clone, Default)]
pub struct Engine {
    strict_mode: bool,
}

impl Engine {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Chainable);
        }
        // Rendered files are written verbatim, final newline included
        env.set_keep_trailing_newline(true);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("envquote", filters::envquote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);
        env.add_filter("empty", filters::empty);
        env.add_filter("sha256", filters::sha256sum);
        env.add_filter("trimprefix", filters::trimprefix);
        env.add_filter("trimsuffix", filters::trimsuffix);
        env.add_filter("ipv4", filters::ipv4);

        env
    }

    /// Render a template string against the value context
    pub fn render_string(
        &self,
        template: &str,
        context: &Values,
        template_name: &str,
    ) -> Result<String> {
        let mut env = self.create_environment();
        let to_error = |e: minijinja::Error| {
            EngineError::Template(TemplateError::from_minijinja(
                e,
                template_name,
                template,
                Some(context.inner()),
            ))
        };

        env.add_template_owned(template_name.to_string(), template.to_string())
            .map_err(to_error)?;

        let tmpl = env.get_template(template_name).map_err(to_error)?;
        tmpl.render(context.inner()).map_err(to_error)
    }

    /// Read and render a template file
    pub fn render_file(&self, path: &Path, context: &Values) -> Result<String> {
        let template = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        self.render_string(&template, context, &path.display().to_string())
    }
}
