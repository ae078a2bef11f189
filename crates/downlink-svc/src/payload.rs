//! Normalizes a downlink response body into JSON, driven by content-type.

use std::collections::HashMap;

use iot_domain::capability::HttpResponse;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{json, Value};

pub fn decode(method: &str, url: &str, resp: &HttpResponse) -> Value {
    let content_type = resp
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.as_str())
        .unwrap_or("");

    if !(200..300).contains(&resp.status) {
        return error_envelope(method, url, resp);
    }

    if content_type.contains("json") {
        return serde_json::from_slice(&resp.body)
            .unwrap_or_else(|_| error_envelope(method, url, resp));
    }
    if content_type.contains("xml") {
        return xml_to_json(&resp.body).unwrap_or_else(|_| error_envelope(method, url, resp));
    }
    error_envelope(method, url, resp)
}

fn error_envelope(method: &str, url: &str, resp: &HttpResponse) -> Value {
    json!({
        "error": true,
        "http_status": resp.status,
        "status_code": resp.status,
        "response_headers": resp.headers,
        "request_method": method,
        "request_url": url,
    })
}

/// Build a generic JSON tree from an XML document. Text-only nodes become
/// their trimmed text value; elements with children become objects whose
/// repeated child tags collapse into arrays. The conventional `_` text key
/// some XML-to-JSON mappers use is never emitted.
pub fn xml_to_json(bytes: &[u8]) -> Result<Value, quick_xml::Error> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                let node = parse_element(&mut reader, &name)?;
                return Ok(node);
            }
            Event::Eof => return Ok(Value::Null),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_element(reader: &mut Reader<&[u8]>, _tag: &[u8]) -> Result<Value, quick_xml::Error> {
    let mut children: HashMap<String, Vec<Value>> = HashMap::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                let child = parse_element(reader, &name)?;
                children
                    .entry(String::from_utf8_lossy(&name).to_string())
                    .or_default()
                    .push(child);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                children.entry(name).or_default().push(Value::Null);
            }
            Event::Text(e) => {
                if let Ok(decoded) = e.decode() {
                    match quick_xml::escape::unescape(&decoded) {
                        Ok(unescaped) => text.push_str(&unescaped),
                        Err(_) => text.push_str(&decoded),
                    }
                }
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::End(_) => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if children.is_empty() {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        return Ok(Value::String(trimmed.to_string()));
    }

    let mut obj = serde_json::Map::new();
    for (key, mut values) in children {
        if values.len() == 1 {
            obj.insert(key, values.pop().unwrap());
        } else {
            obj.insert(key, Value::Array(values));
        }
    }
    Ok(Value::Object(obj))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_passthrough() {
        let resp = HttpResponse {
            status: 200,
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: br#"{"a":1}"#.to_vec(),
        };
        let v = decode("GET", "https://x", &resp);
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn xml_to_nested_json() {
        let xml = b"<root><a>1</a><a>2</a><b>hi</b></root>";
        let v = xml_to_json(xml).unwrap();
        assert_eq!(v["a"], json!(["1", "2"]));
        assert_eq!(v["b"], json!("hi"));
    }

    #[test]
    fn non_2xx_wraps_error() {
        let resp = HttpResponse {
            status: 500,
            headers: HashMap::new(),
            body: b"boom".to_vec(),
        };
        let v = decode("GET", "https://x", &resp);
        assert_eq!(v["http_status"], 500);
    }
}
