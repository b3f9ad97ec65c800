// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Declarative item filters.
//!
//! Rules compare the value found at `json_path` in each item against the
//! rule's `value`/`values`. String comparisons use the natural string form of
//! both sides, lower-cased when the rule is case-insensitive. Numeric
//! operators fail closed when either side is not numeric.

use area_dsl::coercion::{to_number, to_text};
use area_dsl::path;
use area_dsl::{FilterConfig, FilterMode, FilterOperator, FilterRule};
use regex::Regex;
use serde_json::Value;

/// A rule with its regex compiled once per filter pass.
struct RuleMatcher<'a> {
    rule: &'a FilterRule,
    regex: Option<Regex>,
}

impl<'a> RuleMatcher<'a> {
    fn new(rule: &'a FilterRule) -> Self {
        let regex = match rule.operator {
            FilterOperator::Regex => compile_pattern(rule),
            _ => None,
        };
        Self { rule, regex }
    }

    fn matches(&self, item: &Value) -> bool {
        let rule = self.rule;
        let json_path = rule.json_path.trim();
        if json_path.is_empty() {
            return false;
        }
        let found = path::extract(item, json_path);
        if rule.operator == FilterOperator::Exists {
            return found.is_some();
        }
        let Some(value) = found else {
            return false;
        };
        let expected = rule.value.as_ref().unwrap_or(&Value::Null);

        match rule.operator {
            FilterOperator::Equals => compare_text(value, expected, rule.case_insensitive),
            FilterOperator::Contains => {
                let left = normalize(value, rule.case_insensitive);
                let right = normalize(expected, rule.case_insensitive);
                !left.is_empty() && left.contains(&right)
            }
            FilterOperator::In => {
                if rule.values.is_empty() {
                    rule.value
                        .as_ref()
                        .is_some_and(|candidate| compare_text(value, candidate, rule.case_insensitive))
                } else {
                    rule.values
                        .iter()
                        .any(|candidate| compare_text(value, candidate, rule.case_insensitive))
                }
            }
            FilterOperator::Regex => self
                .regex
                .as_ref()
                .is_some_and(|re| re.is_match(&to_text(value))),
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
                let (Some(left), Some(right)) = (to_number(value), to_number(expected)) else {
                    return false;
                };
                match rule.operator {
                    FilterOperator::Gt => left > right,
                    FilterOperator::Gte => left >= right,
                    FilterOperator::Lt => left < right,
                    _ => left <= right,
                }
            }
            FilterOperator::Exists => true,
        }
    }
}

fn compile_pattern(rule: &FilterRule) -> Option<Regex> {
    let pattern = rule.value.as_ref().map(to_text).unwrap_or_default();
    if pattern.is_empty() {
        return None;
    }
    let pattern = if rule.case_insensitive {
        format!("(?i){}", pattern)
    } else {
        pattern
    };
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::debug!(pattern = %pattern, error = %e, "Ignoring filter rule with invalid regex");
            None
        }
    }
}

fn normalize(value: &Value, case_insensitive: bool) -> String {
    let text = to_text(value);
    if case_insensitive {
        text.to_lowercase()
    } else {
        text
    }
}

fn compare_text(left: &Value, right: &Value, case_insensitive: bool) -> bool {
    normalize(left, case_insensitive) == normalize(right, case_insensitive)
}

/// Keep the items matching `filters`. No filter or an empty rule set keeps
/// every item.
pub fn filter_items(items: Vec<Value>, filters: Option<&FilterConfig>) -> Vec<Value> {
    let Some(filters) = filters.filter(|f| !f.rules.is_empty()) else {
        return items;
    };
    let matchers: Vec<RuleMatcher<'_>> = filters.rules.iter().map(RuleMatcher::new).collect();

    items
        .into_iter()
        .filter(|item| match filters.mode {
            FilterMode::All => matchers.iter().all(|m| m.matches(item)),
            FilterMode::Any => matchers.iter().any(|m| m.matches(item)),
        })
        .collect()
}

/// Evaluate a single rule against an item.
pub fn matches_rule(item: &Value, rule: &FilterRule) -> bool {
    RuleMatcher::new(rule).matches(item)
}
