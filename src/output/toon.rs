//! Token-Oriented Object Notation (TOON) encoder.
//!
//! Tab-delimited: objects become `key: value` lines, nested objects are indented
//! two spaces, arrays of primitives are inlined as `key[N\t]: a\tb`, arrays of
//! uniform flat objects become tables (`key[N\t]{a\tb}:` followed by one row per
//! item), and everything else is written as a `- ` list.

use serde_json::{Map, Value};

const DELIMITER: &str = "\t";
const INDENT: &str = "  ";

/// Encode a JSON value as TOON.
pub fn encode(value: &Value) -> String {
    let mut lines = Lines::default();
    match value {
        Value::Object(map) => encode_object(map, 0, &mut lines),
        Value::Array(items) => encode_array(None, items, 0, &mut lines),
        primitive => lines.push(0, encode_primitive(primitive)),
    }
    lines.render()
}

#[derive(Default)]
struct Lines(Vec<(usize, String)>);

impl Lines {
    fn push(&mut self, depth: usize, text: String) {
        self.0.push((depth, text));
    }

    fn render(&self) -> String {
        self.0
            .iter()
            .map(|(depth, text)| format!("{}{text}", INDENT.repeat(*depth)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn encode_object(map: &Map<String, Value>, depth: usize, lines: &mut Lines) {
    for (key, value) in map {
        let key = encode_key(key);
        match value {
            Value::Object(inner) => {
                lines.push(depth, format!("{key}:"));
                encode_object(inner, depth + 1, lines);
            }
            Value::Array(items) => encode_array(Some(&key), items, depth, lines),
            primitive => lines.push(depth, format!("{key}: {}", encode_primitive(primitive))),
        }
    }
}

fn array_header(key: Option<&str>, len: usize) -> String {
    format!("{}[{len}{DELIMITER}]", key.unwrap_or(""))
}

fn encode_array(key: Option<&str>, items: &[Value], depth: usize, lines: &mut Lines) {
    let header = array_header(key, items.len());

    if items.iter().all(is_primitive) {
        if items.is_empty() {
            lines.push(depth, format!("{header}:"));
        } else {
            let row = join_primitives(items.iter());
            lines.push(depth, format!("{header}: {row}"));
        }
        return;
    }

    if let Some(fields) = tabular_fields(items) {
        let columns: Vec<String> = fields.iter().map(|f| encode_key(f)).collect();
        lines.push(depth, format!("{header}{{{}}}:", columns.join(DELIMITER)));
        for item in items {
            if let Value::Object(map) = item {
                let row = join_primitives(fields.iter().filter_map(|f| map.get(*f)));
                lines.push(depth + 1, row);
            }
        }
        return;
    }

    lines.push(depth, format!("{header}:"));
    for item in items {
        encode_list_item(item, depth + 1, lines);
    }
}

/// Write one `- ` entry. Multi-line items keep their continuation lines one level
/// deeper than the dash so fields line up under the first one.
fn encode_list_item(item: &Value, depth: usize, lines: &mut Lines) {
    let mut nested = Lines::default();
    match item {
        Value::Object(map) if map.is_empty() => {
            lines.push(depth, "-".to_string());
            return;
        }
        Value::Object(map) => encode_object(map, depth + 1, &mut nested),
        Value::Array(items) => encode_array(None, items, depth + 1, &mut nested),
        primitive => {
            lines.push(depth, format!("- {}", encode_primitive(primitive)));
            return;
        }
    }

    let mut nested = nested.0.into_iter();
    if let Some((_, first)) = nested.next() {
        lines.push(depth, format!("- {first}"));
    }
    for (d, text) in nested {
        lines.push(d, text);
    }
}

/// Column names when every item is an object with the same keys and only
/// primitive values.
fn tabular_fields(items: &[Value]) -> Option<Vec<&str>> {
    let Some(Value::Object(first)) = items.first() else {
        return None;
    };
    if first.is_empty() {
        return None;
    }
    let fields: Vec<&str> = first.keys().map(String::as_str).collect();

    let uniform = items.iter().all(|item| match item {
        Value::Object(map) => {
            map.len() == fields.len()
                && fields.iter().all(|f| map.get(*f).is_some_and(is_primitive))
        }
        _ => false,
    });

    uniform.then_some(fields)
}

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn join_primitives<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    values.map(encode_primitive).collect::<Vec<_>>().join(DELIMITER)
}

fn encode_primitive(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => encode_string(s),
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn encode_key(key: &str) -> String {
    let mut chars = key.chars();
    let bare = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if bare { key.to_string() } else { quote(key) }
}

fn encode_string(s: &str) -> String {
    if needs_quotes(s) { quote(s) } else { s.to_string() }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || matches!(s, "true" | "false" | "null")
        || looks_numeric(s)
        || s.starts_with('-')
        || s.contains(DELIMITER)
        || s.chars().any(|c| c.is_control() || matches!(c, ':' | '"' | '\\' | '[' | ']' | '{' | '}'))
}

fn looks_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let leading_zero = digits.len() > 1
        && digits.starts_with('0')
        && digits.chars().all(|c| c.is_ascii_digit());
    leading_zero || (s.parse::<f64>().is_ok() && s.chars().any(|c| c.is_ascii_digit()))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
