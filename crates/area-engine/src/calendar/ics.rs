// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! iCalendar (RFC 5545) event extraction.
//!
//! Only `VEVENT` blocks inside a `VCALENDAR` are read. Each event becomes a
//! flat JSON object that the path extractor, filters and mappings can work
//! with. Recurrence rules are not expanded; overrides arrive as separate
//! events carrying a `RECURRENCE-ID`.

use std::collections::HashMap;

use chrono::{
    DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

/// One content line split into name, parameters and raw value.
#[derive(Debug, Clone, Default, PartialEq)]
struct Property {
    name: String,
    params: HashMap<String, Vec<String>>,
    value: String,
}

impl Property {
    fn param(&self, key: &str) -> &str {
        self.params
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Default)]
struct RawEvent {
    props: HashMap<String, Vec<Property>>,
}

impl RawEvent {
    fn add(&mut self, prop: Property) {
        self.props.entry(prop.name.clone()).or_default().push(prop);
    }

    fn first(&self, name: &str) -> Option<&Property> {
        self.props.get(name).and_then(|props| props.first())
    }

    fn value(&self, name: &str) -> &str {
        self.first(name).map(|p| p.value.as_str()).unwrap_or("")
    }
}

/// Calendar-level properties that influence every event.
#[derive(Debug, Default)]
struct CalendarDefaults {
    method: String,
    timezone: String,
}

/// Parse an iCalendar document into event objects, newest update first.
pub fn parse_events(text: &str) -> Vec<Value> {
    let lines = unfold_lines(text);

    let mut stack: Vec<String> = Vec::new();
    let mut events = Vec::new();
    let mut current: Option<RawEvent> = None;
    let mut defaults = CalendarDefaults::default();
    let mut inside_calendar = false;

    for line in &lines {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("BEGIN:") {
            let component = rest.trim().to_uppercase();
            match component.as_str() {
                "VCALENDAR" => inside_calendar = true,
                "VEVENT" => current = Some(RawEvent::default()),
                _ => {}
            }
            stack.push(component);
            continue;
        }
        if let Some(rest) = line.strip_prefix("END:") {
            let component = rest.trim().to_uppercase();
            stack.pop();
            match component.as_str() {
                "VEVENT" => events.extend(current.take()),
                "VCALENDAR" => inside_calendar = false,
                _ => {}
            }
            continue;
        }
        if !inside_calendar {
            continue;
        }
        let Some(prop) = parse_property(line) else {
            continue;
        };

        match stack.last().map(String::as_str) {
            Some("VCALENDAR") => match prop.name.as_str() {
                "METHOD" => defaults.method = prop.value.trim().to_uppercase(),
                "X-WR-TIMEZONE" => defaults.timezone = prop.value.trim().to_string(),
                _ => {}
            },
            Some("VEVENT") => {
                if let Some(event) = current.as_mut() {
                    event.add(prop);
                }
            }
            _ => {}
        }
    }

    let mut built: Vec<BuiltEvent> = events
        .iter()
        .filter_map(|event| build_event(event, &defaults))
        .collect();
    built.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.uid.cmp(&a.uid))
    });
    built.into_iter().map(|event| event.fields).collect()
}

/// Join folded continuation lines and strip trailing carriage returns.
fn unfold_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');
        if line.starts_with([' ', '\t']) {
            let continuation = line.trim_start_matches([' ', '\t']);
            match lines.last_mut() {
                Some(previous) => previous.push_str(continuation),
                None => lines.push(continuation.to_string()),
            }
            continue;
        }
        lines.push(line.to_string());
    }
    lines
}

fn parse_property(line: &str) -> Option<Property> {
    let (head, value) = line.split_once(':')?;
    let mut parts = split_unquoted(head, ';').into_iter();

    let mut name = parts.next()?.trim().to_uppercase();
    if name.is_empty() {
        return None;
    }
    if let Some(idx) = name.rfind('.')
        && idx < name.len() - 1
    {
        name = name[idx + 1..].to_string();
    }

    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    for param in parts {
        let Some((key, raw_value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_uppercase();
        if key.is_empty() {
            continue;
        }
        for value in split_unquoted(raw_value.trim(), ',') {
            let value = value.trim_matches('"');
            if !value.is_empty() {
                params.entry(key.clone()).or_default().push(value.to_string());
            }
        }
    }

    Some(Property {
        name,
        params,
        value: value.to_string(),
    })
}

/// Split on `separator` outside double quotes. Quotes are kept.
fn split_unquoted(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in input.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if ch == separator && !in_quotes {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    parts
}

// ============================================================================
// Time zones and date-times
// ============================================================================

/// Zone used to interpret floating local times.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Zone {
    Utc,
    Named(Tz),
    Fixed(FixedOffset),
}

impl Zone {
    /// Attach the zone to a wall-clock time. Times inside a DST gap move
    /// forward by one hour.
    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Zone::Utc => Some(naive.and_utc().fixed_offset()),
            Zone::Fixed(offset) => offset.from_local_datetime(&naive).earliest(),
            Zone::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| {
                    let shifted = naive.checked_add_signed(TimeDelta::hours(1))?;
                    tz.from_local_datetime(&shifted).earliest()
                })
                .map(|dt| dt.fixed_offset()),
        }
    }
}

/// Resolve a `TZID` (or the calendar default) into a zone and display name.
fn resolve_zone(tzid: &str, default_tz: &str) -> (Zone, String) {
    let mut name = tzid.trim();
    if name.is_empty() {
        name = default_tz.trim();
    }
    if name.is_empty() || name.eq_ignore_ascii_case("UTC") || name.eq_ignore_ascii_case("GMT") {
        return (Zone::Utc, "UTC".to_string());
    }
    if let Ok(tz) = name.parse::<Tz>() {
        return (Zone::Named(tz), name.to_string());
    }
    if let Some(offset) = parse_fixed_offset(name) {
        return (Zone::Fixed(offset), name.to_string());
    }
    (Zone::Utc, name.to_string())
}

/// Parse `+0200`, `-05:30`, `UTC+0200` or `GMT-03:00`.
fn parse_fixed_offset(value: &str) -> Option<FixedOffset> {
    let trimmed = value.trim();
    let clean = trimmed
        .strip_prefix("UTC")
        .or_else(|| trimmed.strip_prefix("GMT"))
        .unwrap_or(trimmed)
        .trim();
    let clean = if clean.len() == 6 && clean.as_bytes()[3] == b':' {
        format!("{}{}", &clean[..3], &clean[4..])
    } else {
        clean.to_string()
    };
    if clean.len() != 5 || !clean.is_ascii() {
        return None;
    }
    let sign = match clean.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = clean[1..3].parse().ok()?;
    let minutes: i32 = clean[3..5].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Result of reading one date-time property.
#[derive(Debug, Clone, Default)]
struct ParsedTime {
    value: Option<DateTime<FixedOffset>>,
    all_day: bool,
    tz_name: String,
    raw: String,
}

fn parse_property_time(prop: &Property, default_tz: &str) -> ParsedTime {
    let raw = prop.value.trim();
    if raw.is_empty() {
        return ParsedTime::default();
    }
    let (parsed, tz_name) = parse_datetime(raw, prop, default_tz);
    match parsed {
        Some((value, all_day)) => ParsedTime {
            value: Some(value),
            all_day,
            tz_name,
            raw: raw.to_string(),
        },
        None => ParsedTime {
            tz_name,
            raw: raw.to_string(),
            ..Default::default()
        },
    }
}

fn parse_timestamp(event: &RawEvent, name: &str, default_tz: &str) -> Option<DateTime<FixedOffset>> {
    let prop = event.first(name)?;
    let raw = prop.value.trim();
    if raw.is_empty() {
        return None;
    }
    parse_datetime(raw, prop, default_tz).0.map(|(value, _)| value)
}

/// Interpret a DATE or DATE-TIME value. Returns the instant with its all-day
/// flag (when parseable) and the resolved zone name.
fn parse_datetime(
    raw: &str,
    prop: &Property,
    default_tz: &str,
) -> (Option<(DateTime<FixedOffset>, bool)>, String) {
    let value_type = prop.param("VALUE").to_uppercase();
    let (zone, tz_name) = resolve_zone(prop.param("TZID"), default_tz);

    if value_type == "DATE" || (raw.len() == 8 && !raw.contains('T')) {
        let parsed = NaiveDate::parse_from_str(raw, "%Y%m%d")
            .ok()
            .and_then(|date| zone.localize(date.and_time(NaiveTime::MIN)))
            .map(|value| (value, true));
        return (parsed, tz_name);
    }

    let parsed = parse_datetime_value(raw, zone).map(|value| (value, false));
    (parsed, tz_name)
}

fn parse_datetime_value(raw: &str, zone: Zone) -> Option<DateTime<FixedOffset>> {
    if raw.ends_with('Z') {
        for layout in ["%Y%m%dT%H%M%SZ", "%Y%m%dT%H%MZ"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
                return Some(naive.and_utc().fixed_offset());
            }
        }
    }

    if has_offset(raw) {
        let split = raw
            .len()
            .checked_sub(6)
            .and_then(|at| Some((raw.get(..at)?, raw.get(at..)?)));
        let normalized = match split {
            Some((head, tail)) if tail.contains(':') => format!("{}{}", head, tail.replacen(':', "", 1)),
            _ => raw.to_string(),
        };
        for layout in ["%Y%m%dT%H%M%S%z", "%Y%m%dT%H%M%z"] {
            if let Ok(parsed) = DateTime::parse_from_str(&normalized, layout) {
                return Some(parsed);
            }
        }
    }

    for layout in ["%Y%m%dT%H%M%S", "%Y%m%dT%H%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return zone.localize(naive);
        }
    }
    None
}

/// Whether the value ends with a numeric UTC offset after the time part.
fn has_offset(raw: &str) -> bool {
    const BASE: usize = "20060102T1504".len();
    if raw.len() < BASE + 5 {
        return false;
    }
    raw.rfind(['+', '-']).is_some_and(|idx| idx > BASE)
}

/// Parse an RFC 5545 duration such as `PT1H30M` or `-P1W`. Month units are
/// not accepted.
fn parse_duration(value: &str) -> Option<TimeDelta> {
    let raw = value.trim();
    let (negative, raw) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let raw = raw.strip_prefix('P')?;

    let mut number = String::new();
    let mut in_time = false;
    let mut total: i64 = 0;
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        if ch == 'T' {
            in_time = true;
            continue;
        }
        if number.is_empty() {
            return None;
        }
        let amount: i64 = number.parse().ok()?;
        number.clear();
        let unit = match ch {
            'W' => 7 * 24 * 3600,
            'D' => 24 * 3600,
            'H' => 3600,
            'M' if in_time => 60,
            'S' => 1,
            _ => return None,
        };
        total = total.checked_add(amount.checked_mul(unit)?)?;
    }
    if !number.is_empty() {
        return None;
    }
    let total = if negative { -total } else { total };
    TimeDelta::try_seconds(total)
}

// ============================================================================
// Event assembly
// ============================================================================

struct BuiltEvent {
    fields: Value,
    updated_at: Option<DateTime<Utc>>,
    uid: String,
}

fn build_event(event: &RawEvent, defaults: &CalendarDefaults) -> Option<BuiltEvent> {
    let uid = event.value("UID").trim().to_string();
    if uid.is_empty() {
        return None;
    }
    let default_tz = defaults.timezone.as_str();

    let summary = unescape_text(event.value("SUMMARY"));
    let location = unescape_text(event.value("LOCATION"));
    let description = unescape_text(event.value("DESCRIPTION"));
    let url = event.value("URL").trim().to_string();
    let organizer = organizer(event);

    let mut status = event.value("STATUS").trim().to_uppercase();
    if status.is_empty() && defaults.method.eq_ignore_ascii_case("CANCEL") {
        status = "CANCELLED".to_string();
    }
    let sequence: i64 = event.value("SEQUENCE").trim().parse().unwrap_or(0);

    let start = event
        .first("DTSTART")
        .map(|prop| parse_property_time(prop, default_tz))
        .unwrap_or_default();
    let end = event
        .first("DTEND")
        .map(|prop| parse_property_time(prop, default_tz))
        .unwrap_or_default();

    let mut end_value = end.value;
    if end_value.is_none()
        && let Some(start_value) = start.value
    {
        let duration = event.value("DURATION").trim();
        if !duration.is_empty() {
            end_value = parse_duration(duration).and_then(|d| start_value.checked_add_signed(d));
        }
        if end_value.is_none() && start.all_day {
            let (zone, _) = resolve_zone(&start.tz_name, default_tz);
            end_value = start_value
                .date_naive()
                .checked_add_days(Days::new(1))
                .and_then(|next| zone.localize(next.and_time(NaiveTime::MIN)));
        }
    }

    let recurrence = event
        .first("RECURRENCE-ID")
        .map(|prop| parse_property_time(prop, default_tz))
        .unwrap_or_default();
    let recurrence_id = match recurrence.value {
        Some(value) => format_time(&value),
        None => recurrence.raw,
    };

    let updated_at = ["LAST-MODIFIED", "DTSTAMP", "CREATED"]
        .into_iter()
        .filter_map(|name| parse_timestamp(event, name, default_tz))
        .map(|value| value.with_timezone(&Utc))
        .max();
    let updated_at_str = updated_at
        .map(|value| value.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default();

    let start_str = start.value.as_ref().map(format_time).unwrap_or_default();
    let end_str = end_value.as_ref().map(format_time).unwrap_or_default();

    let mut timezone = start.tz_name.clone();
    if timezone.is_empty() {
        timezone = default_tz.trim().to_string();
    }
    if timezone.is_empty() {
        timezone = "UTC".to_string();
    }

    let id = event_id(&[
        &uid,
        &recurrence_id,
        &sequence.to_string(),
        &updated_at_str,
        &summary,
        &start.raw,
        &end.raw,
        &status,
        &location,
        &description,
    ]);

    let fields = json!({
        "id": id,
        "uid": uid,
        "recurrence_id": recurrence_id,
        "summary": summary,
        "location": location,
        "description": description,
        "start": start_str,
        "end": end_str,
        "start_raw": start.raw,
        "end_raw": end.raw,
        "all_day": start.all_day,
        "timezone": timezone,
        "status": status,
        "url": url,
        "organizer": organizer,
        "updated_at": updated_at_str,
        "sequence": sequence,
    });

    Some(BuiltEvent {
        fields,
        updated_at,
        uid,
    })
}

fn format_time(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn organizer(event: &RawEvent) -> String {
    let Some(prop) = event.first("ORGANIZER") else {
        return String::new();
    };
    let cn = prop.param("CN");
    if !cn.is_empty() {
        return unescape_text(cn);
    }
    let value = prop.value.trim();
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => value[7..].to_string(),
        _ => value.to_string(),
    }
}

fn event_id(parts: &[&str]) -> String {
    format!("{:x}", Sha256::digest(parts.join("|").as_bytes()))
}

/// Undo RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n' | 'N') => out.push('\n'),
            Some(';') => out.push(';'),
            Some(',') => out.push(','),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
