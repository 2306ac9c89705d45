//! Source map composition and `sourceMappingURL` annotations.

use std::path::Path;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use stylesmith_shared::{Mappings, Result, Segment, SourceMap, StylesmithError, line_count};

const INLINE_PREFIX: &str = "data:application/json;base64,";

/// Trailing `/*# sourceMappingURL=... */` comment, with the line break before it.
static ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n?/\*# sourceMappingURL=([^*\s]+) \*/\s*$").expect("valid regex")
});

/// Chain `outer` (step output → step input) onto `inner` (step input → original).
pub fn compose(outer: &Mappings, inner: &Mappings) -> Mappings {
    let lines = outer
        .lines
        .iter()
        .map(|segments| {
            segments
                .iter()
                .filter_map(|seg| {
                    let found = inner.lookup(seg.original_line, seg.original_column)?;
                    let drift = seg.original_column.saturating_sub(found.generated_column);
                    Some(Segment {
                        generated_column: seg.generated_column,
                        source: found.source,
                        original_line: found.original_line,
                        original_column: found.original_column + drift,
                    })
                })
                .collect()
        })
        .collect();

    Mappings { lines }
}

/// Fit `current` to a step output that kept lines in place but may have
/// added or dropped lines at the end.
pub fn realign(mut current: Mappings, css: &str) -> Mappings {
    current.lines.resize_with(line_count(css), Vec::new);
    current
}

/// Split a trailing annotation off `css`, returning the text without it and
/// the annotation URL.
pub fn strip_annotation(css: &str) -> (&str, Option<&str>) {
    match ANNOTATION_RE.captures(css) {
        Some(caps) => {
            let whole = caps.get(0).map_or(css.len(), |m| m.start());
            (&css[..whole], caps.get(1).map(|m| m.as_str()))
        }
        None => (css, None),
    }
}

/// Decode the map carried by an inline `data:` annotation URL.
pub fn decode_inline(url: &str) -> Result<Option<SourceMap>> {
    let Some(payload) = url.strip_prefix(INLINE_PREFIX) else {
        return Ok(None);
    };
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| StylesmithError::source_map(format!("invalid inline map: {e}")))?;
    let json = String::from_utf8(bytes)
        .map_err(|e| StylesmithError::source_map(format!("inline map is not UTF-8: {e}")))?;
    SourceMap::from_json(&json).map(Some)
}

/// Annotation embedding `map` in the stylesheet.
pub fn inline_annotation(map: &SourceMap) -> String {
    format!(
        "/*# sourceMappingURL={INLINE_PREFIX}{} */",
        STANDARD.encode(map.to_json())
    )
}

/// Annotation pointing at the companion `.map` file next to `to`.
pub fn external_annotation(to: Option<&Path>) -> String {
    format!("/*# sourceMappingURL={}.map */", file_name(to))
}

/// Base name of `path`, as written into map `file`/`sources` fields.
pub fn file_name(path: Option<&Path>) -> String {
    path.and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<input css>".to_string())
}

/// Path of `from` relative to the directory of `to`, `/`-separated.
pub fn relative_source(from: Option<&Path>, to: Option<&Path>) -> String {
    let (Some(from), Some(to)) = (from, to) else {
        return file_name(from);
    };
    let base = to.parent().unwrap_or(Path::new(""));

    let from_parts: Vec<_> = from.components().collect();
    let base_parts: Vec<_> = base.components().collect();
    let common = from_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); base_parts.len() - common];
    parts.extend(
        from_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}
