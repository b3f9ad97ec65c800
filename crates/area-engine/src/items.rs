// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Item list extraction from a parsed response.

use std::collections::BTreeMap;

use area_dsl::path;
use area_dsl::{TemplateContext, TemplateError};
use serde_json::Value;

/// Pull the candidate item list out of `payload`.
///
/// An empty path uses the payload itself. Arrays are returned as-is, `null`
/// or an unresolvable path yields no items, and any other value becomes a
/// single-element list.
pub fn extract_items(payload: &Value, items_path: &str) -> Vec<Value> {
    let value = if items_path.trim().is_empty() {
        Some(payload)
    } else {
        path::extract(payload, items_path)
    };

    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

/// Copy payload-level values into every object item.
///
/// Each `key -> path` entry is rendered as a template and resolved against
/// the whole payload. Items that already carry `key` keep their own value.
pub fn inject_context(
    items: &mut [Value],
    payload: &Value,
    context: &BTreeMap<String, String>,
    ctx: &TemplateContext,
) -> Result<(), TemplateError> {
    if items.is_empty() || context.is_empty() {
        return Ok(());
    }

    let mut resolved = Vec::with_capacity(context.len());
    for (key, raw_path) in context {
        if key.trim().is_empty() || raw_path.trim().is_empty() {
            continue;
        }
        let rendered = ctx.render_path(raw_path)?;
        if rendered.is_empty() {
            continue;
        }
        if let Some(value) = path::extract(payload, &rendered) {
            resolved.push((key, value));
        }
    }

    for item in items.iter_mut() {
        let Some(object) = item.as_object_mut() else {
            continue;
        };
        for (key, value) in &resolved {
            if !object.contains_key(key.as_str()) {
                object.insert(key.to_string(), (*value).clone());
            }
        }
    }
    Ok(())
}
