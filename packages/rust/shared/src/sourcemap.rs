//! Source map (revision 3) data model and the base64 VLQ mappings codec.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StylesmithError};

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const VLQ_SHIFT: u32 = 5;
const VLQ_CONTINUATION: i64 = 1 << VLQ_SHIFT;
const VLQ_MASK: i64 = VLQ_CONTINUATION - 1;

// ---------------------------------------------------------------------------
// SourceMap
// ---------------------------------------------------------------------------

/// A revision 3 source map as serialized to `.map` files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    /// Parse a serialized map.
    pub fn from_json(json: &str) -> Result<Self> {
        let map: Self = serde_json::from_str(json)
            .map_err(|e| StylesmithError::source_map(format!("invalid source map JSON: {e}")))?;
        if map.version != 3 {
            return Err(StylesmithError::source_map(format!(
                "unsupported source map version {}",
                map.version
            )));
        }
        Ok(map)
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> String {
        // A struct of strings and integers always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// One mapped position on a generated line. All values are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub source: u32,
    pub original_line: u32,
    pub original_column: u32,
}

/// Decoded mappings: one sorted segment list per generated line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mappings {
    pub lines: Vec<Vec<Segment>>,
}

impl Mappings {
    /// Line-for-line mapping of `text` onto itself in source `0`.
    pub fn identity(text: &str) -> Self {
        let lines = (0..line_count(text))
            .map(|line| {
                vec![Segment {
                    generated_column: 0,
                    source: 0,
                    original_line: line as u32,
                    original_column: 0,
                }]
            })
            .collect();
        Self { lines }
    }

    /// The segment covering `column` on generated `line`, if any.
    pub fn lookup(&self, line: u32, column: u32) -> Option<&Segment> {
        let segments = self.lines.get(line as usize)?;
        segments
            .iter()
            .rev()
            .find(|s| s.generated_column <= column)
            .or_else(|| segments.first())
    }

    /// Decode a `mappings` string. Single-field (unmapped) segments are dropped
    /// and name indices are ignored.
    pub fn decode(mappings: &str) -> Result<Self> {
        let mut lines = Vec::new();
        let mut source = 0i64;
        let mut original_line = 0i64;
        let mut original_column = 0i64;

        for line in mappings.split(';') {
            let mut segments = Vec::new();
            let mut generated_column = 0i64;

            for raw in line.split(',').filter(|s| !s.is_empty()) {
                let fields = decode_vlq(raw)?;
                advance(&mut generated_column, fields[0])?;
                if fields.len() < 4 {
                    continue;
                }
                advance(&mut source, fields[1])?;
                advance(&mut original_line, fields[2])?;
                advance(&mut original_column, fields[3])?;

                if generated_column < 0 || source < 0 || original_line < 0 || original_column < 0 {
                    return Err(StylesmithError::source_map(format!(
                        "negative position in segment {raw:?}"
                    )));
                }
                segments.push(Segment {
                    generated_column: generated_column as u32,
                    source: source as u32,
                    original_line: original_line as u32,
                    original_column: original_column as u32,
                });
            }
            segments.sort_by_key(|s| s.generated_column);
            lines.push(segments);
        }

        Ok(Self { lines })
    }

    /// Encode to a `mappings` string.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let mut prev_source = 0i64;
        let mut prev_line = 0i64;
        let mut prev_column = 0i64;

        for (i, segments) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            let mut prev_generated = 0i64;
            for (j, seg) in segments.iter().enumerate() {
                if j > 0 {
                    out.push(',');
                }
                encode_vlq(&mut out, seg.generated_column as i64 - prev_generated);
                encode_vlq(&mut out, seg.source as i64 - prev_source);
                encode_vlq(&mut out, seg.original_line as i64 - prev_line);
                encode_vlq(&mut out, seg.original_column as i64 - prev_column);
                prev_generated = seg.generated_column as i64;
                prev_source = seg.source as i64;
                prev_line = seg.original_line as i64;
                prev_column = seg.original_column as i64;
            }
        }

        out
    }
}

/// Number of lines in `text`, counting a trailing partial line.
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = vlq & VLQ_MASK;
        vlq >>= VLQ_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION;
        }
        out.push(BASE64_ALPHABET[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Apply a relative field to its running position.
fn advance(position: &mut i64, delta: i64) -> Result<()> {
    *position = position
        .checked_add(delta)
        .ok_or_else(|| StylesmithError::source_map("VLQ value overflow"))?;
    Ok(())
}

fn decode_vlq(segment: &str) -> Result<Vec<i64>> {
    let mut values = Vec::new();
    let mut value = 0i64;
    let mut shift = 0u32;

    for ch in segment.bytes() {
        let digit = BASE64_ALPHABET
            .iter()
            .position(|&b| b == ch)
            .ok_or_else(|| {
                StylesmithError::source_map(format!("invalid base64 character {:?}", ch as char))
            })? as i64;

        value += (digit & VLQ_MASK) << shift;
        if digit & VLQ_CONTINUATION != 0 {
            shift += VLQ_SHIFT;
            if shift > 60 {
                return Err(StylesmithError::source_map("VLQ value overflow"));
            }
            continue;
        }

        let negative = value & 1 == 1;
        value >>= 1;
        values.push(if negative { -value } else { value });
        value = 0;
        shift = 0;
    }

    if shift != 0 {
        return Err(StylesmithError::source_map(format!(
            "truncated VLQ segment {segment:?}"
        )));
    }
    if values.is_empty() {
        return Err(StylesmithError::source_map("empty mapping segment"));
    }
    Ok(values)
}
