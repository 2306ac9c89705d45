//! Resolving plugin and syntax names into instances.
//!
//! The pipeline only depends on [`PluginResolver`]; [`Registry`] is the
//! in-process implementation, mapping names to factories.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, instrument};

use stylesmith_shared::{
    PluginOptions, PluginSpec, Result, StylesmithError, Syntax, SyntaxSpec, Transformer,
};

use crate::plugins::{Banner, StripComments, TrimWhitespace};
use crate::processor::Processor;
use crate::syntax::{CssSyntax, ScssSyntax};

/// Builds a transformer from its options.
pub type PluginFactory =
    Arc<dyn Fn(&PluginOptions) -> Result<Arc<dyn Transformer>> + Send + Sync>;

/// Loads plugins and syntaxes by name.
#[async_trait]
pub trait PluginResolver: Send + Sync {
    /// Instantiate the named plugin with `options`.
    async fn plugin(&self, name: &str, options: &PluginOptions) -> Result<Arc<dyn Transformer>>;

    /// Look up the named syntax.
    async fn syntax(&self, name: &str) -> Result<Arc<dyn Syntax>>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name → factory table.
#[derive(Clone, Default)]
pub struct Registry {
    plugins: HashMap<String, PluginFactory>,
    syntaxes: HashMap<String, Arc<dyn Syntax>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in plugins and syntaxes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register_plugin("banner", |opts| Ok(Arc::new(Banner::from_options(opts)?)))
            .register_plugin("strip-comments", |opts| {
                Ok(Arc::new(StripComments::from_options(opts)?))
            })
            .register_plugin("trim-whitespace", |_| Ok(Arc::new(TrimWhitespace)))
            .register_syntax("css", Arc::new(CssSyntax))
            .register_syntax("scss", Arc::new(ScssSyntax));
        registry
    }

    /// Register (or replace) a plugin factory.
    pub fn register_plugin<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&PluginOptions) -> Result<Arc<dyn Transformer>> + Send + Sync + 'static,
    {
        self.plugins.insert(name.into(), Arc::new(factory));
        self
    }

    /// Register (or replace) a syntax.
    pub fn register_syntax(&mut self, name: impl Into<String>, syntax: Arc<dyn Syntax>) -> &mut Self {
        self.syntaxes.insert(name.into(), syntax);
        self
    }

    /// Registered plugin names, sorted.
    pub fn plugin_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered syntax names, sorted.
    pub fn syntax_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.syntaxes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl PluginResolver for Registry {
    async fn plugin(&self, name: &str, options: &PluginOptions) -> Result<Arc<dyn Transformer>> {
        let factory = self
            .plugins
            .get(name)
            .ok_or_else(|| StylesmithError::module_not_found(name))?;
        factory(options)
    }

    async fn syntax(&self, name: &str) -> Result<Arc<dyn Syntax>> {
        self.syntaxes
            .get(name)
            .cloned()
            .ok_or_else(|| StylesmithError::module_not_found(name))
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Load every plugin (and the syntax, if named) and assemble a [`Processor`].
///
/// Plugins load concurrently; the chain keeps declaration order. Any failure
/// fails the whole resolution.
#[instrument(skip_all, fields(plugins = specs.len()))]
pub async fn resolve_processor(
    resolver: &dyn PluginResolver,
    specs: &[PluginSpec],
    syntax: Option<&SyntaxSpec>,
) -> Result<Processor> {
    let plugins = try_join_all(specs.iter().map(|spec| async move {
        match spec {
            PluginSpec::Named { name, options } => resolver.plugin(name, options).await,
            PluginSpec::Instance(transformer) => Ok(Arc::clone(transformer)),
        }
    }))
    .await?;

    let syntax = match syntax {
        None => None,
        Some(SyntaxSpec::Name(name)) => Some(resolver.syntax(name).await?),
        Some(SyntaxSpec::Module(module)) => Some(Arc::clone(module)),
    };

    let processor = Processor::new(plugins, syntax);
    debug!(
        plugins = ?processor.plugin_names(),
        syntax = processor.syntax_name(),
        "resolved processor"
    );
    Ok(processor)
}
