//! JSON-path queries over response bodies.
//!
//! Evaluation is done by `serde_json_path` (RFC 9535 syntax). This module only
//! decides the result shape: a definite path yields its single value, an
//! indefinite one yields an array of every match.
//!
//! ```text
//! $.store.book[*].author     every author
//! $..price                   every price anywhere in the document
//! $.store.book[0]            first book (definite)
//! $.store.book[-1:]          last book, as a one-element array
//! $.store.book[?@.price<10]  books cheaper than 10
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json_path::JsonPath;
use tracing::{debug, info};

use crate::error::CallError;

/// Evaluate `path` against `json` and deserialize the result into `T`.
///
/// With `debug` set the query and its match count are logged at `info`
/// instead of `debug`.
pub fn parse_json_path<T: DeserializeOwned>(
    json: &str,
    path: &str,
    debug: bool,
) -> Result<T, CallError> {
    let document: Value = serde_json::from_str(json)?;
    let query = JsonPath::parse(path)?;
    let nodes = query.query(&document);

    if debug {
        info!(path, matches = nodes.len(), "evaluated json path");
    } else {
        debug!(path, matches = nodes.len(), "evaluated json path");
    }

    let selected = if is_definite(path) {
        nodes
            .exactly_one()
            .map_err(|_| CallError::NoMatch {
                path: path.to_string(),
            })?
            .clone()
    } else {
        Value::Array(nodes.all().into_iter().cloned().collect())
    };

    Ok(serde_json::from_value(selected)?)
}

/// A path is definite when it can select at most one node: no deep scan,
/// wildcard, filter, union or slice.
pub fn is_definite(path: &str) -> bool {
    if path.contains("..") {
        return false;
    }

    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for c in path.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '*' => return false,
            '?' | ',' | ':' if depth > 0 => return false,
            _ => {}
        }
    }
    true
}
