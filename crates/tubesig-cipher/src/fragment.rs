//! Structural extraction of function and object definitions from a script blob.
//!
//! A regex finds where a definition opens; [`BraceScanner`] then walks the
//! bytes to the matching close brace. Non-greedy regex capture stops at the
//! first `}` inside a string literal or nested block, the scanner does not.

use std::ops::Range;

use regex::Regex;
use tubesig_core::{Error, Result};

/// Bytes after which a `/` opens a regex literal instead of dividing.
const REGEX_PREFIX: &[u8] = b"(,=:[!&|?{};+-*%<>~^";

/// Literal the scanner is inside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Literal {
    /// String opened by the given quote byte.
    Quote(u8),
    /// `/.../` regex; `class` is set inside `[...]`.
    Regex { class: bool },
}

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Outside any literal.
    Code,
    Literal(Literal),
    /// After a backslash; holds the literal to return to, if any.
    Escaped(Option<Literal>),
}

/// Finite-state brace matcher over script bytes.
///
/// Braces only count in [`ScanState::Code`]. A backslash makes the next byte
/// literal in every state.
///
/// A `/` opens a regex literal when the previous non-blank byte is an operator
/// or opening punctuation, or when nothing precedes it. After an identifier,
/// a number or a closing bracket it is division. This includes keywords, so
/// `return /x/` is read as division. A regex literal also ends at a newline.
#[derive(Debug, Clone)]
pub struct BraceScanner {
    depth: usize,
    state: ScanState,
    /// Last non-blank byte seen in code.
    prev: Option<u8>,
}

impl BraceScanner {
    pub const fn new() -> Self {
        Self {
            depth: 0,
            state: ScanState::Code,
            prev: None,
        }
    }

    /// Feed one byte. Returns `true` when it closes the outermost brace.
    pub fn feed(&mut self, byte: u8) -> bool {
        match self.state {
            ScanState::Escaped(resume) => {
                self.state = resume.map_or(ScanState::Code, ScanState::Literal);
                false
            }
            ScanState::Literal(Literal::Quote(quote)) => {
                if byte == b'\\' {
                    self.state = ScanState::Escaped(Some(Literal::Quote(quote)));
                } else if byte == quote {
                    self.state = ScanState::Code;
                }
                false
            }
            ScanState::Literal(Literal::Regex { class }) => {
                self.state = match byte {
                    b'\\' => ScanState::Escaped(Some(Literal::Regex { class })),
                    b'\n' => ScanState::Code,
                    b'[' => ScanState::Literal(Literal::Regex { class: true }),
                    b']' if class => ScanState::Literal(Literal::Regex { class: false }),
                    b'/' if !class => ScanState::Code,
                    _ => self.state,
                };
                false
            }
            ScanState::Code => self.feed_code(byte),
        }
    }

    fn feed_code(&mut self, byte: u8) -> bool {
        let prev = self.prev;
        if !byte.is_ascii_whitespace() {
            self.prev = Some(byte);
        }

        match byte {
            b'\\' => {
                self.state = ScanState::Escaped(None);
                false
            }
            b'"' | b'\'' | b'`' => {
                self.state = ScanState::Literal(Literal::Quote(byte));
                false
            }
            b'/' if opens_regex(prev) => {
                self.state = ScanState::Literal(Literal::Regex { class: false });
                false
            }
            b'{' => {
                self.depth += 1;
                false
            }
            b'}' if self.depth > 0 => {
                self.depth -= 1;
                self.depth == 0
            }
            _ => false,
        }
    }

    /// Current brace depth.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the scanner is inside a string literal.
    pub const fn in_string(&self) -> bool {
        matches!(
            self.state,
            ScanState::Literal(Literal::Quote(_)) | ScanState::Escaped(Some(Literal::Quote(_)))
        )
    }

    /// Whether the scanner is inside a regex literal.
    pub const fn in_regex(&self) -> bool {
        matches!(
            self.state,
            ScanState::Literal(Literal::Regex { .. })
                | ScanState::Escaped(Some(Literal::Regex { .. }))
        )
    }
}

fn opens_regex(prev: Option<u8>) -> bool {
    match prev {
        None => true,
        Some(byte) => REGEX_PREFIX.contains(&byte),
    }
}

impl Default for BraceScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the end (exclusive) of the block opened at `open`.
///
/// Returns `None` if `open` is not a `{` or the input ends before the block
/// balances.
pub fn balanced_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut scanner = BraceScanner::new();
    bytes[open..]
        .iter()
        .position(|&b| scanner.feed(b))
        .map(|offset| open + offset + 1)
}

/// What kind of definition to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Definition {
    /// `name=function(a){...}` or `function name(a){...}`.
    Function,
    /// `name={...}`.
    Object,
}

/// Location of a definition inside a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Located {
    /// Whole definition, from the declaration keyword or name to the close brace.
    span: Range<usize>,
    /// Right-hand side, starting at `function` or `{`.
    value: Range<usize>,
    /// `function name(...)` rather than an assignment.
    declaration: bool,
}

fn anchor(name: &str, kind: Definition) -> Result<Regex> {
    let name = regex::escape(name);
    let pattern = match kind {
        Definition::Function => format!(
            r"(?:^|[^\w$.])(?P<def>(?:(?:var|let|const)\s+)?{name}\s*=\s*(?P<value>function\s*\([^)]*\)\s*\{{)|(?P<decl>function\s+{name}\s*\([^)]*\)\s*\{{))"
        ),
        Definition::Object => format!(
            r"(?:^|[^\w$.])(?P<def>(?:(?:var|let|const)\s+)?{name}\s*=\s*(?P<value>\{{))"
        ),
    };
    Regex::new(&pattern).map_err(|e| Error::Internal(format!("bad anchor for `{name}`: {e}")))
}

fn failed(name: &str, reason: &str) -> Error {
    Error::FragmentExtractionFailed {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn locate(blob: &str, name: &str, kind: Definition) -> Result<Located> {
    let caps = anchor(name, kind)?
        .captures(blob)
        .ok_or_else(|| failed(name, "definition not found"))?;

    let (def, value, declaration) = match (caps.name("def"), caps.name("value"), caps.name("decl")) {
        (Some(def), Some(value), _) => (def, value, false),
        (_, _, Some(decl)) => (decl, decl, true),
        _ => return Err(failed(name, "definition not found")),
    };

    // Every anchor ends on the opening brace.
    let open = def.end() - 1;
    let end = balanced_end(blob, open).ok_or_else(|| failed(name, "unbalanced braces"))?;

    Ok(Located {
        span: def.start()..end,
        value: value.start()..end,
        declaration,
    })
}

/// Byte range of `name`'s definition, exactly as written in the blob.
pub fn definition_span(blob: &str, name: &str, kind: Definition) -> Result<Range<usize>> {
    locate(blob, name, kind).map(|l| l.span)
}

/// Extract a function as a standalone statement.
///
/// Assignments are normalized to `var name=function(...){...};`; declarations
/// are returned as written.
pub fn extract_function(blob: &str, name: &str) -> Result<String> {
    let located = locate(blob, name, Definition::Function)?;
    let source = if located.declaration {
        blob[located.span].to_string()
    } else {
        format!("var {name}={};", &blob[located.value])
    };
    Ok(source)
}

/// Extract an object literal as `var name={...};`.
pub fn extract_object(blob: &str, name: &str) -> Result<String> {
    let located = locate(blob, name, Definition::Object)?;
    let mut source = format!("var {name}={}", &blob[located.value]);
    if !source.ends_with(';') {
        source.push(';');
    }
    Ok(source)
}
