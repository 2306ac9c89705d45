//! The processing engine: parse, run the transformer chain, emit a source map.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, trace};

use stylesmith_shared::{
    Mappings, Result, SourceMap, Syntax, TransformContext, Transformer, line_count,
};

use crate::sourcemap;
use crate::syntax::CssSyntax;

// ---------------------------------------------------------------------------
// Options & results
// ---------------------------------------------------------------------------

/// Effective source map settings for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    /// Embed the map in the output instead of returning it.
    pub inline: bool,
    /// Include the original text in `sourcesContent`.
    pub sources_content: bool,
    /// A map produced by an earlier build step for this input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

/// Per-file processing options.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Absolute input path.
    pub from: Option<PathBuf>,
    /// Absolute output path.
    pub to: Option<PathBuf>,
    /// `None` disables source maps.
    pub map: Option<MapOptions>,
}

/// Output of [`Processor::process`].
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// The processed stylesheet, including any map annotation.
    pub css: String,
    /// The map, when maps are enabled and not inlined.
    pub map: Option<SourceMap>,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// An ordered transformer chain plus an optional syntax. Immutable once built.
pub struct Processor {
    plugins: Vec<Arc<dyn Transformer>>,
    syntax: Option<Arc<dyn Syntax>>,
}

impl Processor {
    pub fn new(plugins: Vec<Arc<dyn Transformer>>, syntax: Option<Arc<dyn Syntax>>) -> Self {
        Self { plugins, syntax }
    }

    /// Plugin names in processing order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Name of the configured syntax, if any.
    pub fn syntax_name(&self) -> Option<&str> {
        self.syntax.as_deref().map(Syntax::name)
    }

    /// Run `css` through the syntax and every plugin in order.
    #[instrument(skip_all, fields(from = ?opts.from))]
    pub async fn process(&self, css: &str, opts: &ProcessOptions) -> Result<ProcessResult> {
        let Some(map_opts) = &opts.map else {
            let css = self.parse(css, opts)?;
            let css = self.run_chain(css, opts, None).await?.0;
            return Ok(ProcessResult { css, map: None });
        };

        // The previous stage's map comes from the caller or from an inline annotation.
        let (body, annotation) = sourcemap::strip_annotation(css);
        let prev = match &map_opts.prev {
            Some(json) => Some(SourceMap::from_json(json)?),
            None => match annotation {
                Some(url) => sourcemap::decode_inline(url)?,
                None => None,
            },
        };

        let input = self.parse(body, opts)?;
        let start = match &prev {
            Some(prev) => {
                let mut mappings = Mappings::decode(&prev.mappings)?;
                mappings.lines.resize_with(line_count(&input), Vec::new);
                mappings
            }
            None => Mappings::identity(&input),
        };

        let (output, mappings) = self.run_chain(input.clone(), opts, Some(start)).await?;
        let mappings = mappings.unwrap_or_default();

        let map = match prev {
            Some(prev) => SourceMap {
                version: 3,
                file: Some(sourcemap::file_name(opts.to.as_deref())),
                source_root: prev.source_root,
                sources: prev.sources,
                sources_content: if map_opts.sources_content {
                    prev.sources_content
                } else {
                    None
                },
                names: Vec::new(),
                mappings: mappings.encode(),
            },
            None => SourceMap {
                version: 3,
                file: Some(sourcemap::file_name(opts.to.as_deref())),
                source_root: None,
                sources: vec![sourcemap::relative_source(
                    opts.from.as_deref(),
                    opts.to.as_deref(),
                )],
                sources_content: map_opts.sources_content.then(|| vec![Some(input)]),
                names: Vec::new(),
                mappings: mappings.encode(),
            },
        };

        debug!(
            lines = mappings.lines.len(),
            inline = map_opts.inline,
            "generated source map"
        );

        if map_opts.inline {
            let css = format!("{output}\n{}", sourcemap::inline_annotation(&map));
            Ok(ProcessResult { css, map: None })
        } else {
            let css = format!(
                "{output}\n{}",
                sourcemap::external_annotation(opts.to.as_deref())
            );
            Ok(ProcessResult {
                css,
                map: Some(map),
            })
        }
    }

    fn parse(&self, css: &str, opts: &ProcessOptions) -> Result<String> {
        let syntax: &dyn Syntax = self.syntax.as_deref().unwrap_or(&CssSyntax);
        let sheet = syntax.parse(css).map_err(|e| match &opts.from {
            Some(from) => e.with_file(from.display().to_string()),
            None => e,
        })?;
        trace!(syntax = syntax.name(), nodes = sheet.nodes.len(), "parsed input");
        Ok(syntax.stringify(&sheet))
    }

    async fn run_chain(
        &self,
        mut css: String,
        opts: &ProcessOptions,
        mut mappings: Option<Mappings>,
    ) -> Result<(String, Option<Mappings>)> {
        let ctx = TransformContext {
            from: opts.from.clone(),
            to: opts.to.clone(),
        };

        for plugin in &self.plugins {
            let step = plugin.apply(css, &ctx).await?;
            trace!(plugin = plugin.name(), len = step.css.len(), "applied plugin");

            mappings = mappings.map(|current| match &step.map {
                Some(step_map) => sourcemap::compose(step_map, &current),
                None => sourcemap::realign(current, &step.css),
            });
            css = step.css;
        }

        Ok((css, mappings))
    }
}
