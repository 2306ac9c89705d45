//! `strip-comments`: remove `/* ... */` comments.

use async_trait::async_trait;
use serde::Deserialize;

use stylesmith_shared::{PluginOptions, Result, TransformContext, Transformed, Transformer};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StripCommentsOptions {
    preserve_important: bool,
}

/// Removes block comments outside strings. A removed comment leaves its line
/// breaks behind so every remaining line keeps its line number.
#[derive(Debug, Default)]
pub struct StripComments {
    /// Keep `/*! ... */` comments.
    pub preserve_important: bool,
}

impl StripComments {
    pub fn from_options(options: &PluginOptions) -> Result<Self> {
        let opts: StripCommentsOptions = options.parse("strip-comments")?;
        Ok(Self {
            preserve_important: opts.preserve_important,
        })
    }

    fn strip(&self, css: &str) -> String {
        let mut out = String::with_capacity(css.len());
        let mut chars = css.char_indices().peekable();
        let mut quote: Option<char> = None;

        while let Some((i, c)) = chars.next() {
            if let Some(q) = quote {
                out.push(c);
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
                continue;
            }

            if c == '"' || c == '\'' {
                quote = Some(c);
                out.push(c);
                continue;
            }

            if c == '/' && css[i..].starts_with("/*") {
                let end = css[i + 2..]
                    .find("*/")
                    .map_or(css.len(), |offset| i + 2 + offset + 2);
                let comment = &css[i..end];

                if self.preserve_important && comment.starts_with("/*!") {
                    out.push_str(comment);
                } else {
                    out.extend(comment.chars().filter(|&ch| ch == '\n'));
                }
                while chars.peek().is_some_and(|&(j, _)| j < end) {
                    chars.next();
                }
                continue;
            }

            out.push(c);
        }

        out
    }
}

#[async_trait]
impl Transformer for StripComments {
    fn name(&self) -> &str {
        "strip-comments"
    }

    async fn apply(&self, css: String, _ctx: &TransformContext) -> Result<Transformed> {
        Ok(Transformed::unmapped(self.strip(&css)))
    }
}
