//! Built-in stylesheet syntaxes.
//!
//! Both syntaxes split a stylesheet into top-level statements without
//! interpreting declarations. They catch the errors that make a file
//! unprocessable (stray words, unclosed blocks/strings/comments) and print
//! the statements back verbatim.

use stylesmith_shared::{CssSyntaxError, Node, NodeKind, Stylesheet, Syntax};

/// Plain CSS.
pub struct CssSyntax;

impl Syntax for CssSyntax {
    fn name(&self) -> &str {
        "css"
    }

    fn parse(&self, css: &str) -> Result<Stylesheet, CssSyntaxError> {
        scan(css, false)
    }
}

/// SCSS-flavoured CSS: additionally accepts `//` line comments and
/// top-level `name: value;` statements such as variables.
pub struct ScssSyntax;

impl Syntax for ScssSyntax {
    fn name(&self) -> &str {
        "scss"
    }

    fn parse(&self, css: &str) -> Result<Stylesheet, CssSyntaxError> {
        scan(css, true)
    }
}

fn scan(css: &str, scss: bool) -> Result<Stylesheet, CssSyntaxError> {
    let mut s = Scanner {
        src: css,
        pos: 0,
        line: 1,
        column: 1,
        scss,
    };
    let mut nodes = Vec::new();

    while let Some(c) = s.peek() {
        let (start, line, column) = (s.pos, s.line, s.column);

        let kind = if c.is_whitespace() {
            while s.peek().is_some_and(char::is_whitespace) {
                s.bump();
            }
            NodeKind::Space
        } else if s.starts_with("/*") {
            s.block_comment()?;
            NodeKind::Comment
        } else if s.scss && s.starts_with("//") {
            s.line_comment();
            NodeKind::Comment
        } else if c == '}' {
            return Err(CssSyntaxError::new("Unexpected }", line, column));
        } else {
            s.statement(c == '@')?
        };

        nodes.push(Node {
            kind,
            raw: css[start..s.pos].to_string(),
            line,
            column,
        });
    }

    Ok(Stylesheet { nodes })
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    scss: bool,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.src[self.pos..].starts_with(pat)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// A rule prelude or at-rule, through its block or terminating `;`.
    fn statement(&mut self, at_rule: bool) -> Result<NodeKind, CssSyntaxError> {
        let kind = if at_rule { NodeKind::AtRule } else { NodeKind::Rule };
        let (line, column) = (self.line, self.column);
        let mut parens = 0usize;

        loop {
            match self.peek() {
                // `@import "x"` may end the file without a semicolon.
                None if at_rule => return Ok(kind),
                None => return Err(CssSyntaxError::new("Unknown word", line, column)),
                Some('"' | '\'') => self.string()?,
                Some('/') if self.starts_with("/*") => self.block_comment()?,
                Some('(') => {
                    parens += 1;
                    self.bump();
                }
                Some(')') => {
                    parens = parens.saturating_sub(1);
                    self.bump();
                }
                Some(';') if parens == 0 => {
                    self.bump();
                    return match (at_rule, self.scss) {
                        (true, _) => Ok(kind),
                        (false, true) => Ok(NodeKind::Declaration),
                        (false, false) => Err(CssSyntaxError::new("Unknown word", line, column)),
                    };
                }
                Some('{') if parens == 0 => return self.block().map(|()| kind),
                Some('}') if parens == 0 => {
                    return Err(CssSyntaxError::new("Unexpected }", self.line, self.column));
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// A `{ ... }` block with nested blocks, starting at the `{`.
    fn block(&mut self) -> Result<(), CssSyntaxError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        let mut depth = 1usize;
        let mut parens = 0usize;

        loop {
            match self.peek() {
                None => return Err(CssSyntaxError::new("Unclosed block", line, column)),
                Some('"' | '\'') => self.string()?,
                Some('/') if self.starts_with("/*") => self.block_comment()?,
                Some('/') if self.scss && parens == 0 && self.starts_with("//") => {
                    self.line_comment()
                }
                Some('(') => {
                    parens += 1;
                    self.bump();
                }
                Some(')') => {
                    parens = parens.saturating_sub(1);
                    self.bump();
                }
                Some('{') => {
                    depth += 1;
                    self.bump();
                }
                Some('}') => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn string(&mut self) -> Result<(), CssSyntaxError> {
        let (line, column) = (self.line, self.column);
        let quote = self.bump();

        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(CssSyntaxError::new("Unclosed string", line, column));
                }
                Some('\\') => {
                    self.bump();
                }
                c if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn block_comment(&mut self) -> Result<(), CssSyntaxError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        self.bump();

        while !self.starts_with("*/") {
            if self.bump().is_none() {
                return Err(CssSyntaxError::new("Unclosed comment", line, column));
            }
        }
        self.bump();
        self.bump();
        Ok(())
    }

    fn line_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
    }
}
