// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Document Format decoding.
//!
//! Both encodings decode to the same [`BatchRecord`] sequence:
//!
//! ```text
//! <batch>                                      [
//!   <add id="1" version="1" lang="en">           {"type": "add", "id": 1, "version": 1,
//!     <field name="name">Hongo</field>            "lang": "en", "fields": {"name": "Hongo"}},
//!   </add>                                       {"type": "delete", "id": 2, "version": 2}
//!   <delete id="2" version="2"/>               ]
//! </batch>
//! ```

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use thiserror::Error;

use super::record::BatchRecord;

#[derive(Error, Debug)]
pub enum SdfError {
    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed batch: {0}")]
    Malformed(String),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdfFormat {
    Json,
    Xml,
}

impl SdfFormat {
    /// Format for a `Content-Type` header value, ignoring parameters.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        match mime.to_ascii_lowercase().as_str() {
            "application/json" => Some(SdfFormat::Json),
            "application/xml" | "text/xml" => Some(SdfFormat::Xml),
            _ => None,
        }
    }
}

/// Decode a batch body in the format named by `content_type`.
pub fn decode(content_type: &str, body: &str) -> Result<Vec<BatchRecord>, SdfError> {
    match SdfFormat::from_content_type(content_type) {
        Some(SdfFormat::Json) => decode_json(body),
        Some(SdfFormat::Xml) => decode_xml(body),
        None => Err(SdfError::UnsupportedContentType(content_type.to_string())),
    }
}

/// JSON batches are already canonical. A lone object is a one-record batch.
pub fn decode_json(body: &str) -> Result<Vec<BatchRecord>, SdfError> {
    let value: Value = serde_json::from_str(body)?;
    let value = match value {
        Value::Object(_) => Value::Array(vec![value]),
        other => other,
    };
    Ok(serde_json::from_value(value)?)
}

/// Purely numeric text becomes an integer.
fn scalar(text: String) -> Value {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = text.parse::<u64>() {
            return Value::from(n);
        }
    }
    Value::String(text)
}

fn xml_error(err: impl std::fmt::Display) -> SdfError {
    SdfError::Xml(err.to_string())
}

fn attributes(start: &BytesStart<'_>) -> Result<BTreeMap<String, String>, SdfError> {
    let mut attrs = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Canonical JSON for an `<add>` or `<delete>` element's attributes.
fn record_head(kind: &str, mut attrs: BTreeMap<String, String>) -> Result<Map<String, Value>, SdfError> {
    let id = attrs
        .remove("id")
        .ok_or_else(|| SdfError::Malformed(format!("<{}> without id", kind)))?;
    let mut record = Map::new();
    record.insert("type".to_string(), Value::from(kind));
    record.insert("id".to_string(), scalar(id));
    if let Some(version) = attrs.remove("version") {
        record.insert("version".to_string(), scalar(version));
    }
    if kind == "add" {
        if let Some(lang) = attrs.remove("lang") {
            record.insert("lang".to_string(), Value::String(lang));
        }
        record.insert("fields".to_string(), Value::Object(Map::new()));
    }
    Ok(record)
}

/// Repeated field names accumulate into an array in document order.
fn push_field(record: &mut Map<String, Value>, name: String, value: Value) {
    let Some(Value::Object(fields)) = record.get_mut("fields") else {
        return;
    };
    match fields.get_mut(&name) {
        None => {
            fields.insert(name, value);
        }
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

#[derive(Debug)]
enum State {
    Start,
    Batch,
    Record(Map<String, Value>),
    Field {
        record: Map<String, Value>,
        name: String,
        text: String,
    },
    Done,
}

pub fn decode_xml(body: &str) -> Result<Vec<BatchRecord>, SdfError> {
    let mut reader = Reader::from_str(body);

    let mut records: Vec<Value> = Vec::new();
    let mut state = State::Start;

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        state = match (state, event) {
            (state, Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_)) => state,
            // Field text is kept verbatim; indentation between elements is not.
            (state @ (State::Start | State::Batch | State::Record(_) | State::Done), Event::Text(e))
                if e.iter().all(u8::is_ascii_whitespace) =>
            {
                state
            }
            (State::Start, Event::Start(e)) if e.local_name().as_ref() == b"batch" => State::Batch,
            (State::Start, Event::Empty(e)) if e.local_name().as_ref() == b"batch" => State::Done,

            (State::Batch, Event::Start(e)) => match e.local_name().as_ref() {
                b"add" => State::Record(record_head("add", attributes(&e)?)?),
                b"delete" => State::Record(record_head("delete", attributes(&e)?)?),
                other => {
                    return Err(SdfError::Malformed(format!(
                        "unexpected <{}> in batch",
                        String::from_utf8_lossy(other)
                    )))
                }
            },
            (State::Batch, Event::Empty(e)) => {
                let head = match e.local_name().as_ref() {
                    b"add" => record_head("add", attributes(&e)?)?,
                    b"delete" => record_head("delete", attributes(&e)?)?,
                    other => {
                        return Err(SdfError::Malformed(format!(
                            "unexpected <{}> in batch",
                            String::from_utf8_lossy(other)
                        )))
                    }
                };
                records.push(Value::Object(head));
                State::Batch
            }
            (State::Batch, Event::End(_)) => State::Done,

            (State::Record(record), Event::Start(e)) if e.local_name().as_ref() == b"field" => {
                let name = attributes(&e)?
                    .remove("name")
                    .ok_or_else(|| SdfError::Malformed("<field> without name".to_string()))?;
                State::Field {
                    record,
                    name,
                    text: String::new(),
                }
            }
            (State::Record(mut record), Event::Empty(e)) if e.local_name().as_ref() == b"field" => {
                let name = attributes(&e)?
                    .remove("name")
                    .ok_or_else(|| SdfError::Malformed("<field> without name".to_string()))?;
                push_field(&mut record, name, Value::String(String::new()));
                State::Record(record)
            }
            (State::Record(record), Event::End(_)) => {
                records.push(Value::Object(record));
                State::Batch
            }

            (State::Field { record, name, mut text }, Event::Text(e)) => {
                text.push_str(&e.unescape().map_err(xml_error)?);
                State::Field { record, name, text }
            }
            (State::Field { record, name, mut text }, Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                State::Field { record, name, text }
            }
            (State::Field { mut record, name, text }, Event::End(_)) => {
                push_field(&mut record, name, scalar(text));
                State::Record(record)
            }

            (State::Done, Event::Eof) => break,
            (_, Event::Eof) => return Err(SdfError::Malformed("unexpected end of document".to_string())),
            (State::Done, _) => return Err(SdfError::Malformed("content after </batch>".to_string())),
            (state, event) => {
                return Err(SdfError::Malformed(format!(
                    "unexpected {:?} while in {}",
                    event,
                    match state {
                        State::Start => "document",
                        State::Batch => "batch",
                        State::Record(_) => "record",
                        State::Field { .. } => "field",
                        State::Done => "trailer",
                    }
                )))
            }
        };
    }

    Ok(serde_json::from_value(Value::Array(records))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::record::DocumentId;
    use serde_json::json;

    #[test]
    fn test_xml_add_and_delete() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<batch>
  <add id="1" version="1" lang="en">
    <field name="name">Hongo Tokyo</field>
    <field name="age">32</field>
    <field name="tag">a</field>
    <field name="tag">b</field>
  </add>
  <delete id="doc-2" version="2"/>
</batch>"#;
        let records = decode_xml(xml).unwrap();
        assert_eq!(records.len(), 2);
        match &records[0] {
            BatchRecord::Add { id, version, fields, .. } => {
                assert_eq!(id, &DocumentId::Number(1));
                assert_eq!(*version, Some(1));
                assert_eq!(fields["name"], json!("Hongo Tokyo"));
                assert_eq!(fields["age"], json!(32));
                assert_eq!(fields["tag"], json!(["a", "b"]));
            }
            other => panic!("expected add, got {:?}", other),
        }
        assert_eq!(records[1], BatchRecord::Delete {
            id: DocumentId::Text("doc-2".into()),
            version: Some(2),
        });
    }

    #[test]
    fn test_lone_json_object_is_one_record() {
        let records = decode_json(r#"{"type": "delete", "id": "7"}"#).unwrap();
        assert_eq!(records, vec![BatchRecord::delete(7u64)]);
    }

    #[test]
    fn test_escaped_xml_text() {
        let xml = r#"<batch><add id="1"><field name="name">A &amp; B</field></add></batch>"#;
        let records = decode_xml(xml).unwrap();
        match &records[0] {
            BatchRecord::Add { fields, .. } => assert_eq!(fields["name"], json!("A & B")),
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn test_field_text_whitespace_is_preserved() {
        let xml = "<batch>\n  <add id=\"1\">\n    <field name=\"name\">  Hongo Tokyo \n</field>\n    <field name=\"blank\">   </field>\n  </add>\n</batch>\n";
        let json = r#"[{"type": "add", "id": "1", "fields": {"name": "  Hongo Tokyo \n", "blank": "   "}}]"#;
        let records = decode_xml(xml).unwrap();
        assert_eq!(records, decode_json(json).unwrap());
        match &records[0] {
            BatchRecord::Add { fields, .. } => assert_eq!(fields["name"], json!("  Hongo Tokyo \n")),
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn test_stray_text_between_elements() {
        assert!(matches!(
            decode_xml("<batch><add id=\"1\">loose<field name=\"a\">x</field></add></batch>"),
            Err(SdfError::Malformed(_))
        ));
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(decode_xml("<batch><add version=\"1\"/></batch>"), Err(SdfError::Malformed(_))));
        assert!(decode_xml("<batch><add id=\"1\">").is_err());
        assert!(matches!(decode_xml("<records/>"), Err(SdfError::Malformed(_))));
    }

    #[test]
    fn test_content_type_dispatch() {
        assert_eq!(SdfFormat::from_content_type("application/json; charset=utf-8"), Some(SdfFormat::Json));
        assert_eq!(SdfFormat::from_content_type("application/xml"), Some(SdfFormat::Xml));
        assert!(matches!(
            decode("text/plain", "[]"),
            Err(SdfError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn test_empty_batch() {
        assert!(decode_xml("<batch/>").unwrap().is_empty());
        assert!(decode_json("[]").unwrap().is_empty());
    }
}
