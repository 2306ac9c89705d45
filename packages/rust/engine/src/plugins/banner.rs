//! `banner`: prepend a `/*! ... */` comment to every file.

use async_trait::async_trait;
use serde::Deserialize;

use stylesmith_shared::{
    Mappings, PluginOptions, Result, TransformContext, Transformed, Transformer, line_count,
};

#[derive(Debug, Deserialize)]
struct BannerOptions {
    text: String,
}

/// Prepends a preserved comment. Shifts every input line down, so it reports a map.
pub struct Banner {
    comment: String,
}

impl Banner {
    pub fn new(text: &str) -> Self {
        Self {
            comment: format!("/*! {} */", text.replace("*/", "* /")),
        }
    }

    pub fn from_options(options: &PluginOptions) -> Result<Self> {
        let opts: BannerOptions = options.parse("banner")?;
        Ok(Self::new(&opts.text))
    }
}

#[async_trait]
impl Transformer for Banner {
    fn name(&self) -> &str {
        "banner"
    }

    async fn apply(&self, css: String, _ctx: &TransformContext) -> Result<Transformed> {
        let mut lines = vec![Vec::new(); line_count(&self.comment)];
        lines.extend(Mappings::identity(&css).lines);

        Ok(Transformed {
            css: format!("{}\n{css}", self.comment),
            map: Some(Mappings { lines }),
        })
    }
}
