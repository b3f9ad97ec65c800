// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! New-item detection for identity and threshold sources.

use area_dsl::coercion::{to_number, to_text};
use area_dsl::path;
use area_dsl::{ChangeDetectionConfig, TemplateContext};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::EngineError;

/// Items to report and the cursor to store afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection<C> {
    /// New items, newest first
    pub items: Vec<Value>,
    pub cursor: C,
}

/// Identifier of an item.
///
/// With an id path this is the trimmed string form of the value found there
/// (`None` when absent or blank). Without one it is the SHA-256 of the
/// item's JSON serialization.
pub fn item_id(item: &Value, id_path: &str) -> Option<String> {
    if id_path.trim().is_empty() {
        let serialized = serde_json::to_string(item).ok()?;
        return Some(format!("{:x}", Sha256::digest(serialized.as_bytes())));
    }
    let value = path::extract(item, id_path)?;
    let id = to_text(value).trim().to_string();
    (!id.is_empty()).then_some(id)
}

/// Walk a newest-first list until the item matching `cursor`.
///
/// Items without a resolvable id are skipped. The new cursor is the id of
/// the first new item; otherwise the old cursor is kept, and an empty cursor
/// is seeded from the first item.
pub fn detect_identity(items: &[Value], cursor: &str, id_path: &str) -> Detection<String> {
    let mut fresh = Vec::new();
    let mut newest: Option<String> = None;

    for item in items {
        let Some(id) = item_id(item, id_path) else {
            continue;
        };
        if !cursor.is_empty() && id == cursor {
            break;
        }
        if newest.is_none() {
            newest = Some(id);
        }
        fresh.push(item.clone());
    }

    let mut next = newest.unwrap_or_else(|| cursor.to_string());
    if next.is_empty()
        && let Some(first) = items.first()
        && let Some(id) = item_id(first, id_path)
    {
        next = id;
    }

    Detection {
        items: fresh,
        cursor: next,
    }
}

/// Compare the first item's numeric value against the previous one.
///
/// Without a previous value the item is always reported. Otherwise it is
/// reported when the change reaches `min_percent` (checked first) or
/// `min_delta`, or on any change when neither is positive.
pub fn detect_threshold(
    items: &[Value],
    previous: Option<f64>,
    id_path: &str,
    config: &ChangeDetectionConfig,
    ctx: &TemplateContext,
) -> Result<Detection<Option<f64>>, EngineError> {
    let Some(item) = items.first() else {
        return Ok(Detection {
            items: Vec::new(),
            cursor: previous,
        });
    };

    let value_path = if config.value_json_path.trim().is_empty() {
        id_path
    } else {
        config.value_json_path.as_str()
    };
    let value_path = ctx.render_path(value_path)?;
    if value_path.is_empty() {
        return Err(EngineError::EmptyValuePath);
    }

    let value = path::extract(item, &value_path)
        .ok_or_else(|| EngineError::ValueNotFound(value_path.clone()))?;
    let current = to_number(value).ok_or(EngineError::NonNumericValue)?;

    let Some(previous_value) = previous else {
        return Ok(Detection {
            items: vec![item.clone()],
            cursor: Some(current),
        });
    };

    let min_percent = resolve_threshold(config.min_percent.as_ref(), ctx)?;
    let min_delta = resolve_threshold(config.min_delta.as_ref(), ctx)?;

    let diff = (current - previous_value).abs();
    let triggered = match (min_percent, min_delta) {
        (Some(percent), _) if percent > 0.0 => {
            if previous_value == 0.0 {
                current != 0.0
            } else {
                diff / previous_value.abs() * 100.0 >= percent
            }
        }
        (_, Some(delta)) if delta > 0.0 => diff >= delta,
        _ => diff > 0.0,
    };

    tracing::debug!(previous = previous_value, current, triggered, "Threshold evaluated");

    if triggered {
        Ok(Detection {
            items: vec![item.clone()],
            cursor: Some(current),
        })
    } else {
        Ok(Detection {
            items: Vec::new(),
            cursor: previous,
        })
    }
}

/// Render a threshold and read it as a number. `None` when unset or when it
/// renders to null.
fn resolve_threshold(raw: Option<&Value>, ctx: &TemplateContext) -> Result<Option<f64>, EngineError> {
    let Some(raw) = raw.filter(|value| !value.is_null()) else {
        return Ok(None);
    };
    let rendered = ctx.render(raw)?;
    if rendered.is_null() {
        return Ok(None);
    }
    to_number(&rendered)
        .map(Some)
        .ok_or(EngineError::NonNumericThreshold)
}
