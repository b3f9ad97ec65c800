// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Response body decoding.
//!
//! Every format is decoded into a `serde_json::Value` so the rest of the
//! pipeline only deals with one tree shape:
//!
//! | Format | Result |
//! |--------|--------|
//! | `json` | the parsed document, `{}` for an empty body |
//! | `xml`  | `{ <root>: <element> }`, `{}` for an empty body |
//! | `ical` | `{ "items": [<event>, ...] }` |

use area_dsl::PayloadFormat;
use serde_json::{Map, Value};

use crate::calendar::ics;
use crate::error::PayloadError;

/// Decode a response body according to the provider's payload format.
pub fn parse_payload(body: &[u8], format: PayloadFormat) -> Result<Value, PayloadError> {
    match format {
        PayloadFormat::Json => {
            if body.is_empty() {
                return Ok(Value::Object(Map::new()));
            }
            Ok(serde_json::from_slice(body)?)
        }
        PayloadFormat::Xml => parse_xml(body),
        PayloadFormat::Ical => {
            let text = std::str::from_utf8(body)?;
            let items = ics::parse_events(text);
            let mut out = Map::new();
            out.insert("items".to_string(), Value::Array(items));
            Ok(Value::Object(out))
        }
    }
}

/// Convert an XML document into nested objects.
///
/// Leaf elements without attributes become their trimmed text. Other
/// elements become objects with `@name` attribute keys, a `_text` key for
/// non-empty text and one key per child local name; repeated children
/// collapse into an array.
pub fn parse_xml(body: &[u8]) -> Result<Value, PayloadError> {
    let text = std::str::from_utf8(body)?;
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let document = roxmltree::Document::parse(text)?;
    let root = document.root_element();

    let mut out = Map::new();
    out.insert(root.tag_name().name().to_string(), element_to_value(root));
    Ok(Value::Object(out))
}

fn element_to_value(node: roxmltree::Node<'_, '_>) -> Value {
    let text: String = node
        .children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect();
    let text = text.trim();

    let mut children = node.children().filter(|child| child.is_element()).peekable();
    let has_attributes = node.attributes().next().is_some();
    if children.peek().is_none() && !has_attributes {
        return Value::String(text.to_string());
    }

    let mut out = Map::new();
    for attribute in node.attributes() {
        out.insert(
            format!("@{}", attribute.name()),
            Value::String(attribute.value().to_string()),
        );
    }
    if !text.is_empty() {
        out.insert("_text".to_string(), Value::String(text.to_string()));
    }

    for child in children {
        let name = child.tag_name().name().to_string();
        let value = element_to_value(child);
        match out.get_mut(&name) {
            Some(Value::Array(existing)) => existing.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(name, value);
            }
        }
    }
    Value::Object(out)
}
