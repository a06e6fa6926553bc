//! Human-readable `key: value` rendering.

use colored::Colorize;
use serde_json::{Map, Value};

pub fn encode(value: &Value, colors: bool) -> String {
    match value {
        Value::Object(map) => object_lines(map, 0, colors).join("\n"),
        Value::Array(items) => {
            items.iter().map(|item| encode(item, colors)).collect::<Vec<_>>().join("\n")
        }
        primitive => scalar(primitive, colors),
    }
}

fn object_lines(map: &Map<String, Value>, depth: usize, colors: bool) -> Vec<String> {
    let indent = "  ".repeat(depth);
    let mut lines = Vec::new();

    for (key, value) in map {
        let label = if colors { key.bold().to_string() } else { key.clone() };
        match value {
            Value::Object(inner) => {
                lines.push(format!("{indent}{label}:"));
                lines.extend(object_lines(inner, depth + 1, colors));
            }
            Value::Array(items) => {
                lines.push(format!("{indent}{label}:"));
                for item in items {
                    match item {
                        Value::Object(inner) => {
                            let mut item_lines = object_lines(inner, depth + 2, colors);
                            if let Some(first) = item_lines.first_mut() {
                                *first = format!("{indent}  - {}", first.trim_start());
                            }
                            lines.extend(item_lines);
                        }
                        other => lines.push(format!("{indent}  {}", encode(other, colors))),
                    }
                }
            }
            primitive => lines.push(format!("{indent}{label}: {}", scalar(primitive, colors))),
        }
    }

    lines
}

fn scalar(value: &Value, colors: bool) -> String {
    match value {
        Value::Bool(true) if colors => "true".green().to_string(),
        Value::Bool(false) if colors => "false".yellow().to_string(),
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_with_nested_values() {
        let value = json!({
            "task": {
                "gid": "1",
                "completed": false,
                "assignee": {"name": "Sam"}
            }
        });

        assert_eq!(
            encode(&value, false),
            "task:\n  gid: 1\n  completed: false\n  assignee:\n    name: Sam"
        );
    }

    #[test]
    fn test_arrays_list_items_indented() {
        let value = json!({
            "sections": [{"gid": "1", "name": "Backlog"}, {"gid": "2", "name": "Done"}],
            "tags": ["a", "b"]
        });

        assert_eq!(
            encode(&value, false),
            "sections:\n  - gid: 1\n    name: Backlog\n  - gid: 2\n    name: Done\ntags:\n  a\n  b"
        );
    }

    #[test]
    fn test_colored_booleans() {
        colored::control::set_override(true);
        let out = encode(&json!({"done": true}), true);
        colored::control::unset_override();

        assert!(out.contains("\u{1b}["));
        assert!(out.contains("true"));
    }
}
