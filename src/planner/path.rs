//! Path expressions for nested settings documents.
//!
//! Node services take their settings as a nested document, while guarded
//! values are keyed by flat strings. A key such as `server.ports[0]` or
//! `db["host.name"]` is parsed into field and index segments and written
//! into the document, creating intermediate objects and arrays on the way.

use serde_json::{Map, Value};
use std::fmt;

/// Largest array index a path may address.
///
/// Arrays are padded with nulls up to the index, so the bound keeps a single
/// key from allocating an arbitrarily large document.
pub const MAX_ARRAY_INDEX: usize = 10_000;

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object field.
    Field(String),
    /// Array index.
    Index(usize),
}

/// A path that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    /// The offending path.
    pub path: String,
    /// What is wrong with it.
    pub reason: &'static str,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason)
    }
}

impl std::error::Error for PathError {}

/// Parses a path expression.
///
/// Supported forms are dotted fields (`a.b`), numeric indices (`a[0]`) and
/// quoted fields (`a["b.c"]` or `a['b.c']`).
///
/// # Errors
///
/// Returns an error for empty paths, empty fields, unterminated brackets,
/// malformed bracket contents or indices above [`MAX_ARRAY_INDEX`].
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathError> {
    let error = |reason| PathError {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(error("empty path"));
    }

    let chars: Vec<char> = path.chars().collect();
    let mut segments = Vec::new();
    let mut field = String::new();
    let mut i = 0;
    // True right after a closing bracket, where a field may not follow without a dot.
    let mut after_bracket = false;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                if field.is_empty() && !after_bracket {
                    return Err(error("empty field name"));
                }
                if !field.is_empty() {
                    segments.push(PathSegment::Field(std::mem::take(&mut field)));
                }
                after_bracket = false;
                i += 1;
                if i == chars.len() {
                    return Err(error("empty field name"));
                }
            }
            '[' => {
                if !field.is_empty() {
                    segments.push(PathSegment::Field(std::mem::take(&mut field)));
                }
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| error("unterminated bracket"))?;
                segments.push(parse_bracket(&chars[i + 1..close]).map_err(error)?);
                after_bracket = true;
                i = close + 1;
            }
            c => {
                if after_bracket {
                    return Err(error("missing '.' after bracket"));
                }
                field.push(c);
                i += 1;
            }
        }
    }

    if !field.is_empty() {
        segments.push(PathSegment::Field(field));
    }
    Ok(segments)
}

fn parse_bracket(inner: &[char]) -> Result<PathSegment, &'static str> {
    let text: String = inner.iter().collect();
    let text = text.trim();
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return match text.parse::<usize>() {
            Ok(index) if index <= MAX_ARRAY_INDEX => Ok(PathSegment::Index(index)),
            _ => Err("index too large"),
        };
    }

    let double_quoted = text.starts_with('"') && text.ends_with('"');
    let single_quoted = text.starts_with('\'') && text.ends_with('\'');
    if text.len() >= 2 && (double_quoted || single_quoted) {
        return Ok(PathSegment::Field(text[1..text.len() - 1].to_string()));
    }
    Err("invalid bracket contents")
}

/// Writes `value` at `path` inside `target`.
///
/// Missing intermediates are created as arrays when the next segment is an
/// index and as objects otherwise. Intermediates of the wrong kind are
/// replaced. Arrays are padded with nulls. Segments indexing past
/// [`MAX_ARRAY_INDEX`] leave `target` untouched.
pub fn set_at_path(target: &mut Value, path: &[PathSegment], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *target = value;
        return;
    };

    let slot = match first {
        PathSegment::Field(name) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            let Value::Object(map) = target else {
                return;
            };
            map.entry(name.clone()).or_insert(Value::Null)
        }
        PathSegment::Index(index) => {
            if *index > MAX_ARRAY_INDEX {
                return;
            }
            if !target.is_array() {
                *target = Value::Array(Vec::new());
            }
            let Value::Array(items) = target else {
                return;
            };
            if items.len() <= *index {
                items.resize(*index + 1, Value::Null);
            }
            &mut items[*index]
        }
    };

    if rest.is_empty() {
        *slot = value;
        return;
    }

    let needs_array = matches!(rest.first(), Some(PathSegment::Index(_)));
    let fits = if needs_array { slot.is_array() } else { slot.is_object() };
    if !fits {
        *slot = if needs_array {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }
    set_at_path(slot, rest, value);
}

/// Expands a flat map of path keys into a nested document.
///
/// Keys are applied in map order. Keys that are not valid paths are skipped
/// and returned alongside the document.
#[must_use]
pub fn expand_paths(flat: Map<String, Value>) -> (Map<String, Value>, Vec<PathError>) {
    let mut document = Value::Object(Map::new());
    let mut rejected = Vec::new();
    for (key, value) in flat {
        match parse_path(&key) {
            Ok(path) => set_at_path(&mut document, &path, value),
            Err(e) => rejected.push(e),
        }
    }
    match document {
        Value::Object(map) => (map, rejected),
        _ => (Map::new(), rejected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str) -> PathSegment {
        PathSegment::Field(name.to_string())
    }

    #[test]
    fn test_parse_path_forms() {
        assert_eq!(parse_path("a").unwrap(), vec![field("a")]);
        assert_eq!(
            parse_path("a.b.c").unwrap(),
            vec![field("a"), field("b"), field("c")]
        );
        assert_eq!(
            parse_path("a[2].b").unwrap(),
            vec![field("a"), PathSegment::Index(2), field("b")]
        );
        assert_eq!(
            parse_path("a[0][1]").unwrap(),
            vec![field("a"), PathSegment::Index(0), PathSegment::Index(1)]
        );
        assert_eq!(parse_path(r#"a["b.c"]"#).unwrap(), vec![field("a"), field("b.c")]);
        assert_eq!(parse_path("['x']").unwrap(), vec![field("x")]);
    }

    #[test]
    fn test_parse_path_errors() {
        assert_eq!(parse_path("").unwrap_err().reason, "empty path");
        assert_eq!(parse_path("a..b").unwrap_err().reason, "empty field name");
        assert_eq!(parse_path("a.").unwrap_err().reason, "empty field name");
        assert_eq!(parse_path("a[0").unwrap_err().reason, "unterminated bracket");
        assert_eq!(parse_path("a[x]").unwrap_err().reason, "invalid bracket contents");
        assert_eq!(parse_path("a[0]b").unwrap_err().reason, "missing '.' after bracket");
    }

    #[test]
    fn test_parse_path_index_bound() {
        assert_eq!(
            parse_path("a[10000]").unwrap(),
            vec![field("a"), PathSegment::Index(MAX_ARRAY_INDEX)]
        );
        assert_eq!(parse_path("a[10001]").unwrap_err().reason, "index too large");
        assert_eq!(parse_path("a[4000000000]").unwrap_err().reason, "index too large");
        assert_eq!(
            parse_path("ports[18446744073709551615]").unwrap_err().reason,
            "index too large"
        );
        assert_eq!(
            parse_path("ports[99999999999999999999999]").unwrap_err().reason,
            "index too large"
        );
    }

    #[test]
    fn test_set_ignores_out_of_bound_index() {
        let mut doc = json!({"a": [1]});
        set_at_path(
            &mut doc,
            &[field("a"), PathSegment::Index(usize::MAX)],
            json!(2),
        );
        assert_eq!(doc, json!({"a": [1]}));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut doc = json!({});
        set_at_path(&mut doc, &parse_path("server.ports[1]").unwrap(), json!(8080));
        set_at_path(&mut doc, &parse_path("server.host").unwrap(), json!("localhost"));
        assert_eq!(doc, json!({"server": {"ports": [null, 8080], "host": "localhost"}}));
    }

    #[test]
    fn test_set_replaces_wrong_intermediate() {
        let mut doc = json!({"a": 1});
        set_at_path(&mut doc, &parse_path("a.b").unwrap(), json!(true));
        assert_eq!(doc, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_expand_paths() {
        let mut flat = Map::new();
        flat.insert(String::from("log.level"), json!("debug"));
        flat.insert(String::from("log.targets[0]"), json!("stdout"));
        flat.insert(String::from("port"), json!(3000));

        flat.insert(String::from("bad..key"), json!(1));
        flat.insert(String::from("ports[18446744073709551615]"), json!(1));

        let (expanded, rejected) = expand_paths(flat);
        let mut paths: Vec<&str> = rejected.iter().map(|e| e.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["bad..key", "ports[18446744073709551615]"]);
        assert_eq!(
            Value::Object(expanded),
            json!({"log": {"level": "debug", "targets": ["stdout"]}, "port": 3000})
        );
    }
}
