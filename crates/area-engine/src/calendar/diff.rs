// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Calendar state tracking between polls.
//!
//! The cursor of a calendar source is a versioned JSON document holding one
//! entry per event occurrence. Comparing the current feed against it yields
//! typed updates, and events that stay absent long enough are reported as
//! deleted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display};

/// Version written into every state document.
pub const STATE_VERSION: u32 = 1;

/// Field added to every emitted calendar item.
pub const UPDATE_TYPE_FIELD: &str = "update_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum UpdateType {
    Created,
    Updated,
    Moved,
    Cancelled,
    #[strum(serialize = "deleted")]
    Deleted,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Snapshot of one event occurrence as last seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recurrence_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start_raw: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end_raw: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timezone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organizer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub sequence: i64,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub missing: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_seen: String,
}

impl StateEntry {
    /// Build an entry from an event object produced by the iCalendar parser.
    pub fn from_item(item: &Map<String, Value>, now: DateTime<Utc>) -> Self {
        let mut entry = Self {
            id: text_field(item, "id"),
            uid: text_field(item, "uid"),
            recurrence_id: text_field(item, "recurrence_id"),
            summary: text_field(item, "summary"),
            location: text_field(item, "location"),
            description: text_field(item, "description"),
            start: text_field(item, "start"),
            end: text_field(item, "end"),
            start_raw: text_field(item, "start_raw"),
            end_raw: text_field(item, "end_raw"),
            all_day: bool_field(item, "all_day"),
            timezone: text_field(item, "timezone"),
            status: text_field(item, "status").to_uppercase(),
            url: text_field(item, "url"),
            organizer: text_field(item, "organizer"),
            updated_at: text_field(item, "updated_at"),
            sequence: int_field(item, "sequence"),
            fingerprint: String::new(),
            missing: 0,
            last_seen: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        entry.fingerprint = entry.compute_fingerprint();
        entry
    }

    /// Content hash used to detect any change of the event.
    pub fn compute_fingerprint(&self) -> String {
        let all_day = self.all_day.to_string();
        let sequence = self.sequence.to_string();
        let parts: [&str; 15] = [
            &self.uid,
            &self.recurrence_id,
            &self.summary,
            &self.location,
            &self.description,
            &self.status,
            &self.url,
            &self.organizer,
            &self.start_raw,
            &self.end_raw,
            &self.start,
            &self.end,
            &self.timezone,
            &all_day,
            &sequence,
        ];
        format!("{:x}", Sha256::digest(parts.join("\x1f").as_bytes()))
    }

    fn is_moved_from(&self, previous: &StateEntry) -> bool {
        previous.start_raw != self.start_raw
            || previous.end_raw != self.end_raw
            || previous.start != self.start
            || previous.end != self.end
            || previous.timezone != self.timezone
            || previous.all_day != self.all_day
    }

    /// Rebuild an event object for a deletion notice.
    fn to_item(&self) -> Map<String, Value> {
        let mut item = Map::new();
        for (key, value) in [
            ("id", &self.id),
            ("uid", &self.uid),
            ("recurrence_id", &self.recurrence_id),
            ("summary", &self.summary),
            ("location", &self.location),
            ("description", &self.description),
            ("start", &self.start),
            ("end", &self.end),
            ("start_raw", &self.start_raw),
            ("end_raw", &self.end_raw),
            ("timezone", &self.timezone),
            ("status", &self.status),
            ("url", &self.url),
            ("organizer", &self.organizer),
            ("updated_at", &self.updated_at),
        ] {
            item.insert(key.to_string(), Value::String(value.clone()));
        }
        item.insert("all_day".to_string(), Value::Bool(self.all_day));
        item.insert("sequence".to_string(), Value::from(self.sequence));
        item
    }
}

/// Versioned calendar state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarState {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub items: BTreeMap<String, StateEntry>,
}

/// Stored cursor of a calendar source.
#[derive(Debug, Clone, PartialEq)]
pub enum CalendarCursor {
    /// Nothing stored yet
    Fresh,
    /// A value written before state documents existed
    Legacy(String),
    State(CalendarState),
}

impl CalendarCursor {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return CalendarCursor::Fresh;
        }
        if raw.starts_with('{')
            && let Ok(state) = serde_json::from_str::<CalendarState>(raw)
            && state.version > 0
        {
            return CalendarCursor::State(state);
        }
        CalendarCursor::Legacy(raw.to_string())
    }

    /// Text stored for this cursor. An empty state encodes as `""`.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            CalendarCursor::Fresh => Ok(String::new()),
            CalendarCursor::Legacy(raw) => Ok(raw.clone()),
            CalendarCursor::State(state) if state.items.is_empty() => Ok(String::new()),
            CalendarCursor::State(state) => serde_json::to_string(state),
        }
    }
}

/// Outcome of diffing one poll against the stored state.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDiff {
    /// Changed events, each with an `update_type` field
    pub changes: Vec<Value>,
    pub state: CalendarState,
}

/// Diff the current events against the previous cursor.
///
/// A legacy cursor is replaced by a state document without reporting
/// anything, so existing subscriptions do not replay their whole calendar.
pub fn diff_events(
    items: &[Value],
    previous: CalendarCursor,
    missing_threshold: u32,
    now: DateTime<Utc>,
) -> CalendarDiff {
    let (mut state, legacy) = match previous {
        CalendarCursor::State(state) => (state, false),
        CalendarCursor::Fresh => (CalendarState::default(), false),
        CalendarCursor::Legacy(_) => (CalendarState::default(), true),
    };
    let threshold = missing_threshold.max(1);

    let mut changes = Vec::new();
    let mut seen = BTreeSet::new();

    for raw in items {
        let Some(item) = raw.as_object() else {
            continue;
        };
        let current = StateEntry::from_item(item, now);
        if current.uid.is_empty() {
            continue;
        }
        let key = state_key(&current.uid, &current.recurrence_id);
        seen.insert(key.clone());

        let update = match state.items.get(&key) {
            None if is_cancelled(&current.status) => Some(UpdateType::Cancelled),
            None => Some(UpdateType::Created),
            Some(previous) if !is_cancelled(&previous.status) && is_cancelled(&current.status) => {
                Some(UpdateType::Cancelled)
            }
            Some(previous) if current.is_moved_from(previous) => Some(UpdateType::Moved),
            Some(previous) if previous.fingerprint != current.fingerprint => Some(UpdateType::Updated),
            Some(_) => None,
        };

        if let Some(update) = update
            && !legacy
        {
            tracing::debug!(uid = %current.uid, update = %update, "Calendar event changed");
            let mut emitted = item.clone();
            emitted.insert(UPDATE_TYPE_FIELD.to_string(), Value::String(update.to_string()));
            changes.push(Value::Object(emitted));
        }

        state.items.insert(key, current);
    }

    if !legacy {
        let mut removed = Vec::new();
        for (key, entry) in state.items.iter_mut() {
            if seen.contains(key) {
                continue;
            }
            entry.missing += 1;
            if entry.missing >= threshold {
                removed.push(key.clone());
            }
        }
        for key in removed {
            if let Some(entry) = state.items.remove(&key) {
                tracing::debug!(uid = %entry.uid, "Calendar event deleted");
                let mut item = entry.to_item();
                item.insert(
                    UPDATE_TYPE_FIELD.to_string(),
                    Value::String(UpdateType::Deleted.to_string()),
                );
                changes.push(Value::Object(item));
            }
        }
    }

    state.version = STATE_VERSION;
    CalendarDiff { changes, state }
}

fn state_key(uid: &str, recurrence_id: &str) -> String {
    if recurrence_id.is_empty() {
        uid.to_string()
    } else {
        format!("{}|{}", uid, recurrence_id)
    }
}

fn is_cancelled(status: &str) -> bool {
    let status = status.trim();
    status.eq_ignore_ascii_case("CANCELLED") || status.eq_ignore_ascii_case("CANCELED")
}

fn text_field(item: &Map<String, Value>, key: &str) -> String {
    match item.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(value) => area_dsl::coercion::to_text(value).trim().to_string(),
    }
}

fn bool_field(item: &Map<String, Value>, key: &str) -> bool {
    match item.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim(), "1" | "t" | "T" | "true" | "TRUE" | "True"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

fn int_field(item: &Map<String, Value>, key: &str) -> i64 {
    match item.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn event(uid: &str, start: &str) -> Value {
        json!({
            "id": format!("id-{}", uid),
            "uid": uid,
            "recurrence_id": "",
            "summary": "Standup",
            "start": start,
            "end": "",
            "start_raw": start,
            "end_raw": "",
            "all_day": false,
            "timezone": "UTC",
            "status": "CONFIRMED",
            "sequence": 0
        })
    }

    fn update_types(diff: &CalendarDiff) -> Vec<String> {
        diff.changes
            .iter()
            .map(|c| c[UPDATE_TYPE_FIELD].as_str().unwrap().to_string())
            .collect()
    }

    fn roundtrip(state: CalendarState) -> CalendarCursor {
        CalendarCursor::parse(&CalendarCursor::State(state).encode().unwrap())
    }

    #[test]
    fn test_cursor_parsing() {
        assert_eq!(CalendarCursor::parse(" "), CalendarCursor::Fresh);
        assert_eq!(
            CalendarCursor::parse("abc123"),
            CalendarCursor::Legacy("abc123".to_string())
        );
        assert!(matches!(
            CalendarCursor::parse(r#"{"version": 0, "items": {}}"#),
            CalendarCursor::Legacy(_)
        ));
        assert!(matches!(
            CalendarCursor::parse(r#"{"version": 1, "items": {}}"#),
            CalendarCursor::State(_)
        ));
        assert_eq!(CalendarCursor::State(CalendarState::default()).encode().unwrap(), "");
    }

    #[test]
    fn test_event_lifecycle() {
        let first = diff_events(&[event("a", "20250310T090000Z")], CalendarCursor::Fresh, 2, now());
        assert_eq!(update_types(&first), vec!["Created"]);

        let second = diff_events(&[event("a", "20250310T090000Z")], roundtrip(first.state), 2, now());
        assert!(second.changes.is_empty());

        let third = diff_events(&[event("a", "20250311T090000Z")], roundtrip(second.state), 2, now());
        assert_eq!(update_types(&third), vec!["Moved"]);

        let fourth = diff_events(&[], roundtrip(third.state), 2, now());
        assert!(fourth.changes.is_empty());
        assert_eq!(fourth.state.items["a"].missing, 1);

        let fifth = diff_events(&[], roundtrip(fourth.state), 2, now());
        assert_eq!(update_types(&fifth), vec!["deleted"]);
        assert_eq!(fifth.changes[0]["uid"], "a");
        assert_eq!(fifth.changes[0]["start_raw"], "20250311T090000Z");
        assert!(fifth.state.items.is_empty());
        assert_eq!(CalendarCursor::State(fifth.state).encode().unwrap(), "");
    }

    #[test]
    fn test_updated_and_cancelled() {
        let first = diff_events(&[event("a", "s")], CalendarCursor::Fresh, 2, now());

        let mut renamed = event("a", "s");
        renamed["summary"] = json!("Retro");
        let second = diff_events(&[renamed.clone()], roundtrip(first.state), 2, now());
        assert_eq!(update_types(&second), vec!["Updated"]);

        renamed["status"] = json!("cancelled");
        let third = diff_events(&[renamed], roundtrip(second.state), 2, now());
        assert_eq!(update_types(&third), vec!["Cancelled"]);
        assert_eq!(third.state.items["a"].status, "CANCELLED");

        let mut new_cancelled = event("b", "s");
        new_cancelled["status"] = json!("CANCELED");
        let fourth = diff_events(&[new_cancelled], CalendarCursor::Fresh, 2, now());
        assert_eq!(update_types(&fourth), vec!["Cancelled"]);
    }

    #[test]
    fn test_reappearing_event_resets_missing() {
        let first = diff_events(&[event("a", "s")], CalendarCursor::Fresh, 3, now());
        let second = diff_events(&[], roundtrip(first.state), 3, now());
        assert_eq!(second.state.items["a"].missing, 1);
        let third = diff_events(&[event("a", "s")], roundtrip(second.state), 3, now());
        assert!(third.changes.is_empty());
        assert_eq!(third.state.items["a"].missing, 0);
    }

    #[test]
    fn test_legacy_cursor_migrates_silently() {
        let diff = diff_events(
            &[event("a", "s"), event("b", "s")],
            CalendarCursor::Legacy("deadbeef".to_string()),
            2,
            now(),
        );
        assert!(diff.changes.is_empty());
        assert_eq!(diff.state.version, STATE_VERSION);
        assert_eq!(diff.state.items.len(), 2);
    }

    #[test]
    fn test_recurrence_overrides_are_separate_entries() {
        let mut occurrence = event("series", "s");
        occurrence["recurrence_id"] = json!("2025-03-10T09:00:00Z");
        let diff = diff_events(&[event("series", "s"), occurrence], CalendarCursor::Fresh, 2, now());
        assert_eq!(diff.changes.len(), 2);
        assert!(diff.state.items.contains_key("series"));
        assert!(diff.state.items.contains_key("series|2025-03-10T09:00:00Z"));
    }

    #[test]
    fn test_state_roundtrip_preserves_fingerprints() {
        let diff = diff_events(&[event("a", "s"), event("b", "t")], CalendarCursor::Fresh, 2, now());
        let encoded = CalendarCursor::State(diff.state.clone()).encode().unwrap();
        assert!(!encoded.contains("\"missing\""));
        assert!(!encoded.contains("\"all_day\""));
        let CalendarCursor::State(parsed) = CalendarCursor::parse(&encoded) else {
            panic!("expected state cursor");
        };
        for (key, entry) in &diff.state.items {
            assert_eq!(parsed.items[key].fingerprint, entry.fingerprint);
            assert_eq!(parsed.items[key].compute_fingerprint(), entry.fingerprint);
        }
    }

    #[test]
    fn test_non_object_and_uidless_items_are_ignored() {
        let diff = diff_events(&[json!("x"), json!({"summary": "no uid"})], CalendarCursor::Fresh, 2, now());
        assert!(diff.changes.is_empty());
        assert!(diff.state.items.is_empty());
    }
}
