// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! `{{placeholder}}` rendering against a per-poll [`TemplateContext`].
//!
//! A string that is exactly one placeholder resolves to the native value it
//! references (numbers stay numbers, objects stay objects). Placeholders
//! embedded in literal text are substituted by their string form and must
//! resolve to scalars.
//!
//! | Key | Resolves to |
//! |-----|-------------|
//! | `provider` | provider name (missing when empty) |
//! | `user_id` | subscription owner id |
//! | `config`, `config.<path>` | subscription configuration |
//! | `env.<NAME>` | process environment snapshot |
//! | `item`, `item.<path>`, `index` | current element while repeating a list |

use std::collections::HashMap;
use std::ops::Range;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::coercion::{is_scalar, to_text};
use crate::path;

/// Locate `{{ key }}` placeholders: the key is everything up to the first
/// `}`, which must open the closing `}}`.
fn placeholders(input: &str) -> Vec<(Range<usize>, &str)> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(offset) = input[from..].find("{{") {
        let start = from + offset;
        let body = &input[start + 2..];
        match body.find('}') {
            Some(end) if end > 0 && body[end..].starts_with("}}") => {
                let stop = start + 2 + end + 2;
                found.push((start..stop, body[..end].trim()));
                from = stop;
            }
            _ => from = start + 1,
        }
    }
    found
}

/// Template rendering failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The placeholder key has no value in the context.
    #[error("missing template value for {key}")]
    MissingValue { key: String },

    /// An object or array was referenced inside surrounding text.
    #[error("cannot embed non-scalar value for {key}")]
    NonScalar { key: String },
}

impl TemplateError {
    /// Whether this is a missing-value condition (callers may skip instead of fail).
    pub fn is_missing(&self) -> bool {
        matches!(self, TemplateError::MissingValue { .. })
    }
}

/// Values available to placeholders during one poll.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub provider: String,
    pub user_id: i64,
    pub config: Value,
    pub env: HashMap<String, String>,
    pub item: Option<Value>,
    pub index: Option<usize>,
}

impl TemplateContext {
    pub fn new(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Snapshot the current process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env(std::env::vars().collect())
    }

    /// Bind the current element of a repeated list.
    pub fn with_item(mut self, item: Value, index: usize) -> Self {
        self.item = Some(item);
        self.index = Some(index);
        self
    }

    /// Render a JSON value, recursing into objects and arrays.
    pub fn render(&self, value: &Value) -> Result<Value, TemplateError> {
        match value {
            Value::String(s) => self.render_str(s),
            Value::Array(items) => items
                .iter()
                .map(|item| self.render(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.render(item)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Render a template string.
    pub fn render_str(&self, input: &str) -> Result<Value, TemplateError> {
        let trimmed = input.trim();
        if let [(range, key)] = placeholders(trimmed).as_slice()
            && *range == (0..trimmed.len())
        {
            return self
                .resolve(key)
                .ok_or_else(|| TemplateError::MissingValue { key: key.to_string() });
        }

        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for (whole, key) in placeholders(input) {
            let value = self
                .resolve(key)
                .ok_or_else(|| TemplateError::MissingValue { key: key.to_string() })?;
            if !is_scalar(&value) {
                return Err(TemplateError::NonScalar { key: key.to_string() });
            }
            out.push_str(&input[last..whole.start]);
            out.push_str(&to_text(&value));
            last = whole.end;
        }
        out.push_str(&input[last..]);
        Ok(Value::String(out))
    }

    /// Render a string, then render once more if the result still holds a
    /// placeholder (configuration values that themselves contain templates).
    pub fn render_nested(&self, input: &str) -> Result<Value, TemplateError> {
        let rendered = self.render_str(input)?;
        match &rendered {
            Value::String(s) if s.contains("{{") && s.contains("}}") => self.render_str(s),
            _ => Ok(rendered),
        }
    }

    /// Render a path template into a trimmed path expression.
    pub fn render_path(&self, input: &str) -> Result<String, TemplateError> {
        if input.trim().is_empty() {
            return Ok(String::new());
        }
        let rendered = self.render_str(input)?;
        Ok(to_text(&rendered).trim().to_string())
    }

    fn resolve(&self, key: &str) -> Option<Value> {
        match key {
            "provider" => {
                return (!self.provider.is_empty()).then(|| Value::String(self.provider.clone()));
            }
            "user_id" => return Some(Value::from(self.user_id)),
            "config" => return (!self.config.is_null()).then(|| self.config.clone()),
            "item" => return self.item.clone(),
            "index" => return self.index.map(Value::from),
            _ => {}
        }

        if let Some(rest) = key.strip_prefix("config.") {
            return path::extract(&self.config, rest).cloned();
        }
        if let Some(rest) = key.strip_prefix("item.") {
            return self.item.as_ref().and_then(|item| path::extract(item, rest).cloned());
        }
        if let Some(name) = key.strip_prefix("env.") {
            return self.env.get(name).map(|v| Value::String(v.clone()));
        }
        None
    }
}
