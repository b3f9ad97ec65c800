// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Evaluation of one item source against a parsed response.

use area_dsl::{ChangeMode, ItemSourceConfig, TemplateContext};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::calendar::{CalendarCursor, diff_events};
use crate::change::{detect_identity, detect_threshold};
use crate::cursor::{Cursor, parse_numeric};
use crate::error::EngineError;
use crate::filter::filter_items;
use crate::items::{extract_items, inject_context};

/// Result of evaluating one item source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    /// Items to report, newest first
    pub new_items: Vec<Value>,
    /// Cursor to store for the source
    pub cursor: Cursor,
}

/// Run extraction, filtering and change detection for `source`.
///
/// `previous` is the stored cursor text of the source. Any error leaves the
/// caller's stored cursor untouched.
pub fn evaluate_source(
    payload: &Value,
    source: &ItemSourceConfig,
    previous: &str,
    ctx: &TemplateContext,
    now: DateTime<Utc>,
) -> Result<SourceOutcome, EngineError> {
    let items_path = ctx.render_path(&source.items_path)?;
    let id_path = ctx.render_path(&source.item_id_path)?;

    let mut items = extract_items(payload, &items_path);
    inject_context(&mut items, payload, &source.context, ctx)?;
    let extracted = items.len();
    let filtered = filter_items(items, source.filters.as_ref());

    tracing::debug!(
        source = %source.name,
        extracted,
        filtered = filtered.len(),
        "Items extracted"
    );

    let outcome = match source.mode() {
        ChangeMode::Identity => {
            let detection = detect_identity(&filtered, previous.trim(), &id_path);
            SourceOutcome {
                new_items: detection.items,
                cursor: Cursor::Identity(detection.cursor),
            }
        }
        ChangeMode::Threshold(config) => {
            let previous = parse_numeric(previous)?;
            let detection = detect_threshold(&filtered, previous, &id_path, config, ctx)?;
            SourceOutcome {
                new_items: detection.items,
                cursor: Cursor::Numeric(detection.cursor),
            }
        }
        ChangeMode::Calendar(config) => {
            let diff = diff_events(
                &filtered,
                CalendarCursor::parse(previous),
                config.missing_threshold,
                now,
            );
            SourceOutcome {
                new_items: diff.changes,
                cursor: Cursor::Calendar(CalendarCursor::State(diff.state)),
            }
        }
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::parse_payload;
    use area_dsl::PayloadFormat;
    use serde_json::json;

    fn source(value: Value) -> ItemSourceConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_identity_source_with_filters() {
        let payload = json!({"data": {"issues": [
            {"id": 9, "state": "open"},
            {"id": 8, "state": "closed"},
            {"id": 7, "state": "open"},
            {"id": 6, "state": "open"}
        ]}});
        let source = source(json!({
            "name": "issues",
            "items_path": "data.{{config.kind}}",
            "item_id_path": "id",
            "filters": {"rules": [{"json_path": "state", "value": "open"}]}
        }));
        let ctx = TemplateContext::new(json!({"kind": "issues"}));

        let outcome = evaluate_source(&payload, &source, "7", &ctx, Utc::now()).unwrap();
        assert_eq!(outcome.new_items, vec![json!({"id": 9, "state": "open"})]);
        assert_eq!(outcome.cursor.encode().unwrap(), "9");
    }

    #[test]
    fn test_threshold_source() {
        let payload = json!({"quote": {"price": 110}});
        let source = source(json!({
            "items_path": "quote",
            "change_detection": {"value_json_path": "price", "min_percent": 5}
        }));
        let ctx = TemplateContext::default();

        let outcome = evaluate_source(&payload, &source, "100", &ctx, Utc::now()).unwrap();
        assert_eq!(outcome.new_items.len(), 1);
        assert_eq!(outcome.cursor, Cursor::Numeric(Some(110.0)));

        let err = evaluate_source(&payload, &source, "abc", &ctx, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::NonNumericCursor(_)));
    }

    #[test]
    fn test_items_path_template_failure() {
        let source = source(json!({"items_path": "{{config.missing}}"}));
        let err = evaluate_source(&json!({}), &source, "", &TemplateContext::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::Template(_)));
    }

    #[test]
    fn test_calendar_source() {
        let body = b"BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:e1\r\nSUMMARY:Review\r\nDTSTART:20250310T090000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let payload = parse_payload(body, PayloadFormat::Ical).unwrap();
        let source = source(json!({"items_path": "items", "calendar": {}}));
        let ctx = TemplateContext::default();

        let first = evaluate_source(&payload, &source, "", &ctx, Utc::now()).unwrap();
        assert_eq!(first.new_items.len(), 1);
        assert_eq!(first.new_items[0]["update_type"], "Created");
        let stored = first.cursor.encode().unwrap();
        assert!(stored.starts_with('{'));

        let second = evaluate_source(&payload, &source, &stored, &ctx, Utc::now()).unwrap();
        assert!(second.new_items.is_empty());
    }
}
