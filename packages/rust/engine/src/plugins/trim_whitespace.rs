//! `trim-whitespace`: drop trailing spaces and end the file with one newline.

use async_trait::async_trait;

use stylesmith_shared::{Result, TransformContext, Transformed, Transformer};

pub struct TrimWhitespace;

#[async_trait]
impl Transformer for TrimWhitespace {
    fn name(&self) -> &str {
        "trim-whitespace"
    }

    async fn apply(&self, css: String, _ctx: &TransformContext) -> Result<Transformed> {
        let mut out: String = css
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n");
        let kept = out.trim_end_matches('\n').len();
        out.truncate(kept);
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(Transformed::unmapped(out))
    }
}
