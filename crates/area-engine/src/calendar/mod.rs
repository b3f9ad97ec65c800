// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Calendar feeds: iCalendar parsing and event diffing.

pub mod diff;
pub mod ics;

pub use diff::{
    CalendarCursor, CalendarDiff, CalendarState, STATE_VERSION, StateEntry, UPDATE_TYPE_FIELD,
    UpdateType, diff_events,
};
pub use ics::parse_events;
