// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Projection of new items into named output fields.

use area_dsl::coercion::to_text;
use area_dsl::path;
use area_dsl::{MappingConfig, MappingType, TemplateContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MappingError;

/// One named value handed to the trigger sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    pub value: String,
}

impl OutputField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Apply `mappings` to one item, keeping mapping order.
///
/// An absent optional value is left out; an absent required value or a
/// value of the wrong type fails the whole item.
pub fn map_item(
    item: &Value,
    mappings: &[MappingConfig],
    ctx: &TemplateContext,
) -> Result<Vec<OutputField>, MappingError> {
    let mut fields = Vec::with_capacity(mappings.len());
    for mapping in mappings {
        let json_path = ctx.render_path(&mapping.json_path)?;
        let Some(value) = path::extract(item, &json_path) else {
            if mapping.optional {
                continue;
            }
            return Err(MappingError::MissingPath(json_path));
        };

        let type_matches = match mapping.value_type {
            MappingType::String => value.is_string(),
            MappingType::Number => value.is_number(),
            MappingType::Boolean => value.is_boolean(),
            MappingType::Json => true,
        };
        if !type_matches {
            return Err(MappingError::TypeMismatch {
                field: mapping.field_key.clone(),
                expected: mapping.value_type,
            });
        }

        fields.push(OutputField::new(mapping.field_key.clone(), to_text(value)));
    }
    Ok(fields)
}
