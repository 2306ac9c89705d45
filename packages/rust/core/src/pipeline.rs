//! The `stylesmith` build plugin: resolve the configured processor once, then
//! transform matching stylesheets on every run.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use stylesmith_engine::{PluginResolver, Processor, Registry, resolve_processor};
use stylesmith_shared::{Files, NormalizedOptions, Options, Result};

use crate::host::{BuildContext, Plugin};
use crate::map_policy::{self, effective_map};
use crate::transform::transform_files;

/// Name the pipeline registers under: the leading segment of the package name.
pub fn plugin_name() -> &'static str {
    let pkg = env!("CARGO_PKG_NAME");
    pkg.split('-').next().unwrap_or(pkg)
}

/// Stylesheet transform pipeline.
pub struct Stylesmith {
    options: NormalizedOptions,
    resolver: Arc<dyn PluginResolver>,
    processor: OnceCell<Result<Arc<Processor>>>,
}

impl Stylesmith {
    /// Pipeline resolving plugins from the built-in [`Registry`].
    pub fn new(options: Options) -> Self {
        Self::with_resolver(options, Arc::new(Registry::with_builtins()))
    }

    pub fn with_resolver(options: Options, resolver: Arc<dyn PluginResolver>) -> Self {
        let options = options.normalize();
        debug!(
            patterns = ?options.patterns,
            plugins = options.plugins.len(),
            "registered pipeline"
        );
        Self {
            options,
            resolver,
            processor: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &NormalizedOptions {
        &self.options
    }

    /// The resolved processor.
    ///
    /// Resolution happens on first call; later and concurrent calls share its
    /// outcome, failures included.
    pub async fn resolve(&self) -> Result<Arc<Processor>> {
        self.processor
            .get_or_init(|| async {
                resolve_processor(
                    self.resolver.as_ref(),
                    &self.options.plugins,
                    self.options.syntax.as_ref(),
                )
                .await
                .map(Arc::new)
            })
            .await
            .clone()
    }

    /// Transform every matching file in `files`.
    #[instrument(name = "stylesmith", skip_all, fields(files = files.len()))]
    pub async fn run(&self, files: &mut Files, ctx: &dyn BuildContext) -> Result<()> {
        let processor = self.resolve().await?;

        let development = map_policy::is_development(ctx);
        let map = effective_map(self.options.map, development);
        debug!(
            patterns = ?self.options.patterns,
            map = ?map,
            development,
            plugins = ?processor.plugin_names(),
            "running"
        );

        transform_files(files, ctx, processor, &self.options.patterns, map.as_ref()).await
    }
}

#[async_trait]
impl Plugin for Stylesmith {
    fn name(&self) -> &str {
        plugin_name()
    }

    async fn run(&self, files: &mut Files, ctx: &dyn BuildContext) -> Result<()> {
        Stylesmith::run(self, files, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use stylesmith_shared::{
        FileEntry, PluginOptions, StylesmithError, Syntax, TransformContext, Transformed,
        Transformer,
    };

    use crate::host::match_patterns;

    struct Ctx {
        source: PathBuf,
        development: bool,
    }

    impl Ctx {
        fn new(development: bool) -> Self {
            Self {
                source: PathBuf::from("/site/src"),
                development,
            }
        }
    }

    impl BuildContext for Ctx {
        fn match_files(&self, patterns: &[String], keys: &[&str]) -> Vec<String> {
            match_patterns(patterns, keys)
        }

        fn source(&self) -> &Path {
            &self.source
        }

        fn env(&self, name: &str) -> Option<&str> {
            (name == map_policy::ENV_KEY && self.development).then_some(map_policy::DEVELOPMENT)
        }
    }

    /// Resolver counting how often plugins are loaded.
    #[derive(Default)]
    struct Counting {
        loads: AtomicUsize,
    }

    struct Identity;

    #[async_trait]
    impl Transformer for Identity {
        fn name(&self) -> &str {
            "identity"
        }

        async fn apply(&self, css: String, _ctx: &TransformContext) -> Result<Transformed> {
            Ok(Transformed::unmapped(css))
        }
    }

    #[async_trait]
    impl PluginResolver for Counting {
        async fn plugin(&self, name: &str, _options: &PluginOptions) -> Result<Arc<dyn Transformer>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            match name {
                "identity" => Ok(Arc::new(Identity)),
                other => Err(StylesmithError::module_not_found(other)),
            }
        }

        async fn syntax(&self, name: &str) -> Result<Arc<dyn Syntax>> {
            Err(StylesmithError::module_not_found(name))
        }
    }

    fn files() -> Files {
        let mut files = Files::new();
        files.insert("main.css".into(), FileEntry::new("a { color: red; }\n"));
        files
    }

    #[test]
    fn registers_as_stylesmith() {
        let pipeline = Stylesmith::new(Options::default());
        assert_eq!(Plugin::name(&pipeline), "stylesmith");
    }

    #[tokio::test]
    async fn resolution_is_shared_across_runs() {
        let resolver = Arc::new(Counting::default());
        let pipeline = Stylesmith::with_resolver(
            Options::default().plugin("identity"),
            resolver.clone(),
        );

        let ctx = Ctx::new(false);
        let (mut a, mut b) = (files(), files());
        let (ra, rb) = tokio::join!(pipeline.run(&mut a, &ctx), pipeline.run(&mut b, &ctx));
        ra.unwrap();
        rb.unwrap();
        pipeline.run(&mut files(), &ctx).await.unwrap();

        assert_eq!(resolver.loads.load(Ordering::SeqCst), 1);
        assert_eq!(a, files());
    }

    #[tokio::test]
    async fn resolution_failure_repeats_without_touching_files() {
        let resolver = Arc::new(Counting::default());
        let pipeline = Stylesmith::with_resolver(
            Options::default().plugin("nonexistent-plugin"),
            resolver.clone(),
        );

        let ctx = Ctx::new(false);
        for _ in 0..2 {
            let mut set = files();
            let err = pipeline.run(&mut set, &ctx).await.unwrap_err();
            assert_eq!(err.code(), Some("ERR_MODULE_NOT_FOUND"));
            assert_eq!(set, files());
        }
        assert_eq!(resolver.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn development_defaults_to_inline_maps() {
        let pipeline = Stylesmith::new(Options::default());

        let mut set = files();
        pipeline.run(&mut set, &Ctx::new(true)).await.unwrap();
        assert!(set["main.css"]
            .text()
            .contains("/*# sourceMappingURL=data:application/json;base64,"));
        assert!(!set.contains_key("main.css.map"));

        let mut set = files();
        pipeline.run(&mut set, &Ctx::new(false)).await.unwrap();
        assert_eq!(set, files());
    }
}
