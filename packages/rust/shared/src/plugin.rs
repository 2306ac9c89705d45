//! Capability traits implemented by processing plugins and syntaxes.
//!
//! The engine only talks to plugins through these traits, so a plugin can be
//! a built-in, a test double, or anything a resolver knows how to construct.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{CssSyntaxError, Result};
use crate::sourcemap::Mappings;

// ---------------------------------------------------------------------------
// Transformer
// ---------------------------------------------------------------------------

/// Paths of the file a transformer is working on.
#[derive(Debug, Clone, Default)]
pub struct TransformContext {
    /// Absolute path of the input file.
    pub from: Option<PathBuf>,
    /// Absolute path the output will be written to.
    pub to: Option<PathBuf>,
}

/// Output of a single transformer step.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// The transformed stylesheet text.
    pub css: String,
    /// Mappings from positions in `css` back to positions in the step's input.
    ///
    /// `None` means the step kept every line where it was.
    pub map: Option<Mappings>,
}

impl Transformed {
    /// A step result that preserved the line structure of its input.
    pub fn unmapped(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            map: None,
        }
    }
}

/// One text-to-text step in a processing chain.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Plugin name for tracing and error reports.
    fn name(&self) -> &str;

    /// Transform `css`, optionally reporting how output positions map to input positions.
    async fn apply(&self, css: String, ctx: &TransformContext) -> Result<Transformed>;
}

// ---------------------------------------------------------------------------
// Syntax
// ---------------------------------------------------------------------------

/// What a top-level statement in a stylesheet is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `selector { ... }`
    Rule,
    /// `@name params;` or `@name params { ... }`
    AtRule,
    /// `name: value;` outside any block, for syntaxes that allow it.
    Declaration,
    /// `/* ... */` or, for syntaxes that allow it, `// ...`
    Comment,
    /// Whitespace between statements.
    Space,
}

/// A top-level statement, kept verbatim so printing is lossless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// The exact source text of the statement.
    pub raw: String,
    /// 1-based line where the statement starts.
    pub line: usize,
    /// 1-based column where the statement starts.
    pub column: usize,
}

/// A parsed stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
}

/// A parser/printer pair deciding how input text is read and written back.
pub trait Syntax: Send + Sync {
    /// Syntax name for tracing.
    fn name(&self) -> &str;

    /// Parse `css` into top-level statements.
    fn parse(&self, css: &str) -> std::result::Result<Stylesheet, CssSyntaxError>;

    /// Print a stylesheet back to text.
    fn stringify(&self, sheet: &Stylesheet) -> String {
        sheet.nodes.iter().map(|n| n.raw.as_str()).collect()
    }
}
