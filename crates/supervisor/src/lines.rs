//! Line routing helpers for child output

/// Where a captured stdout line goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRoute {
    /// Into the sink pipeline
    Pipeline(String),
    /// Straight to the operator's stdout, bypassing sinks
    Operator(String),
}

/// Apply the optional prefix filter to one stdout line
///
/// Lines carrying the prefix lose it and surrounding whitespace; everything
/// else is handed back untouched for the operator.
pub fn route_line(line: String, prefix: Option<&str>) -> LineRoute {
    match prefix {
        None => LineRoute::Pipeline(line),
        Some(prefix) => match line.strip_prefix(prefix) {
            Some(rest) => LineRoute::Pipeline(rest.trim().to_string()),
            None => LineRoute::Operator(line),
        },
    }
}

/// Decode one raw line from a child, dropping the terminator
pub(crate) fn decode_line(mut raw: Vec<u8>) -> String {
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    match String::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
