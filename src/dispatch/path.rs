//! Path parsing
//!
//! Splits a request path into the operation name and its positional
//! arguments. Only one leading and one trailing slash are stripped, so
//! interior empty segments survive as empty-string arguments.

/// Operation name plus ordered argument tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub operation: String,
    pub args: Vec<String>,
}

impl ParsedPath {
    /// True when no operation name was supplied (`/`, `""`, `//x`)
    pub fn is_missing_operation(&self) -> bool {
        self.operation.is_empty()
    }
}

/// Parse an already-decoded path component
///
/// `/test/jdoe/1967/` gives `test` with `["jdoe", "1967"]`;
/// `/test//1967` gives `test` with `["", "1967"]`.
pub fn parse(path: &str) -> ParsedPath {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

    let mut segments = trimmed.split('/').map(str::to_string);
    // split always yields at least one segment
    let operation = segments.next().unwrap_or_default();
    ParsedPath {
        operation,
        args: segments.collect(),
    }
}

/// Parse a full request target, dropping the query string first
pub fn parse_url(url: &str) -> ParsedPath {
    parse(url.split('?').next().unwrap_or_default())
}

/// Number of positional arguments carried by a path
pub fn arg_count(path: &str) -> usize {
    parse(path).args.len()
}
