// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Polling Engine - Response Interpretation
//!
//! Everything between a raw provider response and the list of items that
//! should fire a trigger:
//!
//! - [`payload`]: JSON, XML and iCalendar bodies decoded into `serde_json::Value`
//! - [`items`]: item list extraction and payload context injection
//! - [`filter`]: declarative filter rules
//! - [`change`]: identity and threshold change detection
//! - [`calendar`]: iCalendar events and the calendar state diff
//! - [`cursor`]: typed cursors and their storage encoding
//! - [`mapping`]: projection of new items into output fields
//! - [`pipeline`]: the per-source evaluation combining the above
//!
//! The crate performs no I/O; the polling service feeds it response bodies
//! and persists the cursors it returns.

pub mod calendar;
pub mod change;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod items;
pub mod mapping;
pub mod payload;
pub mod pipeline;

pub use cursor::{Cursor, CursorSet};
pub use error::{EngineError, MappingError, PayloadError};
pub use mapping::{OutputField, map_item};
pub use payload::parse_payload;
pub use pipeline::{SourceOutcome, evaluate_source};
