//! `key=value` line formats: .properties, .ini, .cfg, .conf, .config.
//!
//! Section headers and comment lines are skipped; values keep everything
//! after the first `=`.

use serde_json::{Map, Value};

/// Parses properties-style text into a flat JSON object.
pub fn parse_properties(text: &str) -> Value {
    let mut out = Map::new();
    for line in text.lines() {
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') || s.starts_with(';') || s.starts_with('[') {
            continue;
        }
        if let Some((k, v)) = s.split_once('=') {
            out.insert(
                k.trim().to_string(),
                Value::String(v.trim().to_string()),
            );
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_everything_after_first_equals() {
        let v = parse_properties("conn=jdbc:mysql://host?a=b\n");
        assert_eq!(v["conn"], json!("jdbc:mysql://host?a=b"));
    }

    #[test]
    fn skips_sections_and_comments() {
        let v = parse_properties("[database]\n# a comment\n; another\nhost=db1\n");
        assert_eq!(v.as_object().unwrap().len(), 1);
        assert_eq!(v["host"], json!("db1"));
    }
}
