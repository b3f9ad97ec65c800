// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed cursors and their text encoding.
//!
//! A subscription stores a single nullable text column. Without item sources
//! the column is the cursor of the `default` source. With item sources it is
//! a JSON object `{source_name: cursor}`. Each cursor is decoded according to
//! the change mode of its source:
//!
//! | Mode | Stored text | Decoded |
//! |------|-------------|---------|
//! | identity | newest seen item id | [`Cursor::Identity`] |
//! | threshold | last value, e.g. `101.5` | [`Cursor::Numeric`] |
//! | calendar | `{"version":1,"items":{...}}` | [`Cursor::Calendar`] |

use std::collections::BTreeMap;

use area_dsl::ChangeMode;
use area_dsl::coercion::format_number;
use area_dsl::provider::DEFAULT_SOURCE_NAME;

use crate::calendar::CalendarCursor;
use crate::error::EngineError;

/// Progress marker of one item source.
#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    /// Id of the newest item already reported; empty before the first poll
    Identity(String),
    /// Last reported value
    Numeric(Option<f64>),
    Calendar(CalendarCursor),
}

impl Cursor {
    /// Decode stored cursor text for a source in `mode`.
    pub fn decode(mode: ChangeMode<'_>, raw: &str) -> Result<Self, EngineError> {
        let raw = raw.trim();
        match mode {
            ChangeMode::Identity => Ok(Cursor::Identity(raw.to_string())),
            ChangeMode::Threshold(_) => parse_numeric(raw).map(Cursor::Numeric),
            ChangeMode::Calendar(_) => Ok(Cursor::Calendar(CalendarCursor::parse(raw))),
        }
    }

    /// Text form persisted for this cursor.
    pub fn encode(&self) -> Result<String, EngineError> {
        match self {
            Cursor::Identity(id) => Ok(id.clone()),
            Cursor::Numeric(None) => Ok(String::new()),
            Cursor::Numeric(Some(value)) => Ok(format_number(*value)),
            Cursor::Calendar(calendar) => Ok(calendar.encode()?),
        }
    }
}

/// Read a threshold cursor. Blank text means no previous value.
pub fn parse_numeric(raw: &str) -> Result<Option<f64>, EngineError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(Some)
        .ok_or_else(|| EngineError::NonNumericCursor(raw.to_string()))
}

/// Cursor texts of every item source of a subscription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorSet {
    keyed: bool,
    entries: BTreeMap<String, String>,
}

impl CursorSet {
    /// Decode the stored column.
    ///
    /// `keyed` is set when the provider declares item sources. A keyed value
    /// that is not a JSON object (a cursor written before sources were added)
    /// is assigned to `first_source`.
    pub fn decode(raw: Option<&str>, first_source: &str, keyed: bool) -> Self {
        let raw = raw.unwrap_or("").trim();
        let mut entries = BTreeMap::new();

        if !keyed {
            entries.insert(DEFAULT_SOURCE_NAME.to_string(), raw.to_string());
            return Self { keyed, entries };
        }
        if raw.is_empty() {
            return Self { keyed, entries };
        }

        match serde_json::from_str::<BTreeMap<String, String>>(raw) {
            Ok(decoded) => {
                for (key, value) in decoded {
                    let key = key.trim();
                    if key.is_empty() || value.trim().is_empty() {
                        continue;
                    }
                    entries.insert(key.to_string(), value);
                }
            }
            Err(_) => {
                if !first_source.is_empty() {
                    entries.insert(first_source.to_string(), raw.to_string());
                }
            }
        }
        Self { keyed, entries }
    }

    /// Stored cursor of `source`, empty when none.
    pub fn get(&self, source: &str) -> &str {
        self.entries.get(source).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, source: &str, value: String) {
        self.entries.insert(source.to_string(), value);
    }

    /// True when no source has a cursor yet.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|value| value.trim().is_empty())
    }

    /// Text for the storage column. Empty cursors are dropped; nothing left
    /// encodes as `""`.
    pub fn encode(&self) -> Result<String, EngineError> {
        if !self.keyed {
            return Ok(self.get(DEFAULT_SOURCE_NAME).to_string());
        }
        let compact: BTreeMap<&str, &str> = self
            .entries
            .iter()
            .filter(|(key, value)| !key.trim().is_empty() && !value.trim().is_empty())
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        if compact.is_empty() {
            return Ok(String::new());
        }
        Ok(serde_json::to_string(&compact)?)
    }
}
