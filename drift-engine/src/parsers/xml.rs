//! XML → flat map: element paths joined with dots, attributes as
//! `path[@attr]` entries. Namespaces are stripped to local names.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Value};
use tracing::warn;

/// Parses XML text into a flat JSON object.
///
/// Repeated sibling elements overwrite earlier entries - the map keeps the
/// last occurrence, which is sufficient for config-style documents.
/// Malformed XML yields an empty object.
pub fn parse_xml(text: &str) -> Value {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut out = Map::new();
    let mut stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                stack.push(name);
                let path = stack.join(".");
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
                    let val = String::from_utf8_lossy(&attr.value).to_string();
                    out.insert(format!("{path}[@{key}]"), Value::String(val));
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let path = if stack.is_empty() {
                    name
                } else {
                    format!("{}.{name}", stack.join("."))
                };
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
                    let val = String::from_utf8_lossy(&attr.value).to_string();
                    out.insert(format!("{path}[@{key}]"), Value::String(val));
                }
            }
            Ok(Event::Text(t)) => {
                if stack.is_empty() {
                    continue;
                }
                let txt = t.unescape().unwrap_or_default().trim().to_string();
                if !txt.is_empty() {
                    out.insert(stack.join("."), Value::String(txt));
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "unparseable xml, treating as empty");
                return Value::Object(Map::new());
            }
        }
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn element_paths_and_attributes() {
        let v = parse_xml(
            r#"<config env="prod"><db><host>db1</host><port>5432</port></db></config>"#,
        );
        assert_eq!(v["config[@env]"], json!("prod"));
        assert_eq!(v["config.db.host"], json!("db1"));
        assert_eq!(v["config.db.port"], json!("5432"));
    }

    #[test]
    fn namespaces_are_stripped() {
        let v = parse_xml(r#"<ns:root xmlns:ns="urn:x"><ns:leaf>v</ns:leaf></ns:root>"#);
        assert_eq!(v["root.leaf"], json!("v"));
    }

    #[test]
    fn malformed_xml_is_empty() {
        let v = parse_xml("<a><b></a>");
        assert_eq!(v, json!({}));
    }
}
