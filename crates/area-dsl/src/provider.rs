// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider configuration types.
//!
//! A provider configuration describes how to call one external API and how to
//! interpret its response. Every dispatch point (HTTP method, payload format,
//! body encoding, auth scheme, filter operator, mapping type) is a closed enum,
//! so an unsupported value fails at deserialization instead of being ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Missing-poll count after which a calendar event is reported as deleted.
pub const DEFAULT_MISSING_THRESHOLD: u32 = 2;

/// Name given to the implicit item source built from top-level fields.
pub const DEFAULT_SOURCE_NAME: &str = "default";

// ============================================================================
// Root Types
// ============================================================================

/// Declarative description of one polling provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name
    pub name: String,

    /// How the response body is parsed
    #[serde(default)]
    pub payload_format: PayloadFormat,

    /// Polling interval in seconds
    #[serde(default)]
    pub interval_seconds: i64,

    /// Request issued on every poll
    pub request: RequestConfig,

    /// Path to the item list (default source)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub items_path: String,

    /// Path to each item's identifier (default source)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub item_id_path: String,

    /// Numeric threshold detection (default source)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_detection: Option<ChangeDetectionConfig>,

    /// Calendar diff detection (default source)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar: Option<CalendarConfig>,

    /// Item filters (default source)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterConfig>,

    /// Output field mappings (default source)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<MappingConfig>,

    /// Payload values copied into every item (default source)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,

    /// Independent item lists read from the same response. When present,
    /// the top-level item fields are ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_sources: Vec<ItemSourceConfig>,

    /// Seed the cursor on the first poll without triggering
    #[serde(default)]
    pub skip_first: bool,

    /// Steps applied to a subscription config when it is created or updated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prepare: Vec<PrepareStep>,
}

/// HTTP request definition with templated parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    pub method: HttpMethod,

    pub url_template: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    /// JSON-shaped body template; rendered before encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<Value>,

    #[serde(default)]
    pub body_encoding: BodyEncoding,
}

/// HTTP methods accepted in request definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    #[serde(alias = "get", alias = "Get")]
    Get,
    #[serde(alias = "post", alias = "Post")]
    Post,
    #[serde(alias = "put", alias = "Put")]
    Put,
    #[serde(alias = "patch", alias = "Patch")]
    Patch,
    #[serde(alias = "delete", alias = "Delete")]
    Delete,
    #[serde(alias = "head", alias = "Head")]
    Head,
    #[serde(alias = "options", alias = "Options")]
    Options,
}

/// Bearer-style authentication descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,

    /// Header receiving the token; `Authorization` when empty
    #[serde(default)]
    pub header: String,

    /// Prepended to the token, e.g. `Bearer `
    #[serde(default)]
    pub prefix: String,

    /// Token scope override; the subscription's provider when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
}

impl AuthConfig {
    pub fn header_name(&self) -> &str {
        let header = self.header.trim();
        if header.is_empty() { "Authorization" } else { header }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuthType {
    /// Token fetched from the token provider for (user, provider)
    #[serde(alias = "bearer")]
    Oauth2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BodyEncoding {
    #[default]
    #[serde(alias = "", alias = "JSON")]
    Json,
    #[serde(alias = "x-www-form-urlencoded")]
    Form,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    #[serde(alias = "", alias = "JSON")]
    Json,
    #[serde(alias = "XML")]
    Xml,
    #[serde(alias = "ICAL", alias = "ics")]
    Ical,
}

// ============================================================================
// Item Sources
// ============================================================================

/// One list of items read from the provider response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSourceConfig {
    /// Cursor key; `source_<n>` when empty
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub items_path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub item_id_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_detection: Option<ChangeDetectionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar: Option<CalendarConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<MappingConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

/// How new items are detected for a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeMode<'a> {
    /// Newest-first list walked until the stored item id
    Identity,
    /// First item's numeric value compared against the stored value
    Threshold(&'a ChangeDetectionConfig),
    /// Calendar events diffed against a stored state document
    Calendar(&'a CalendarConfig),
}

impl ItemSourceConfig {
    pub fn mode(&self) -> ChangeMode<'_> {
        match (&self.calendar, &self.change_detection) {
            (Some(calendar), _) => ChangeMode::Calendar(calendar),
            (None, Some(change)) => ChangeMode::Threshold(change),
            (None, None) => ChangeMode::Identity,
        }
    }
}

/// Threshold descriptor. Thresholds may be numbers, numeric strings or
/// templates resolving to either.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetectionConfig {
    /// Value compared between polls; falls back to the item id path
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value_json_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_delta: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_percent: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Consecutive absent polls before an event is reported deleted
    #[serde(default = "default_missing_threshold")]
    pub missing_threshold: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            missing_threshold: DEFAULT_MISSING_THRESHOLD,
        }
    }
}

fn default_missing_threshold() -> u32 {
    DEFAULT_MISSING_THRESHOLD
}

// ============================================================================
// Filters and Mappings
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub mode: FilterMode,

    #[serde(default)]
    pub rules: Vec<FilterRule>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FilterMode {
    /// Every rule must match
    #[default]
    #[serde(alias = "")]
    All,
    /// At least one rule must match
    Any,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub json_path: String,

    #[serde(default)]
    pub operator: FilterOperator,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Candidates for `in`; `value` is used when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,

    #[serde(default)]
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FilterOperator {
    #[default]
    #[serde(alias = "")]
    Equals,
    Contains,
    In,
    Regex,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
}

/// Projection of one item value into a named output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    pub field_key: String,

    pub json_path: String,

    #[serde(rename = "type")]
    pub value_type: MappingType,

    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MappingType {
    String,
    Number,
    Boolean,
    Json,
}

// ============================================================================
// Prepare Steps
// ============================================================================

/// One preparation step run against a subscription config. Exactly one of
/// the action fields is expected; the first present one wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepareStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<PrepareCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch: Option<FetchStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_list: Option<TemplateListStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate: Option<GenerateStep>,
}

/// Borrowed view of the action a prepare step performs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrepareAction<'a> {
    Fetch(&'a FetchStep),
    TemplateList(&'a TemplateListStep),
    Extract(&'a ExtractStep),
    Generate(&'a GenerateStep),
}

impl PrepareStep {
    pub fn action(&self) -> Option<PrepareAction<'_>> {
        if let Some(fetch) = &self.fetch {
            Some(PrepareAction::Fetch(fetch))
        } else if let Some(list) = &self.template_list {
            Some(PrepareAction::TemplateList(list))
        } else if let Some(extract) = &self.extract {
            Some(PrepareAction::Extract(extract))
        } else {
            self.generate.as_ref().map(PrepareAction::Generate)
        }
    }
}

/// Guard evaluated against the subscription config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepareCondition {
    pub json_path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub equals: String,

    #[serde(default, rename = "in", skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchStep {
    #[serde(flatten)]
    pub request: RequestConfig,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_json_path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub item_json_path: String,

    #[serde(default)]
    pub store_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Query parameter carrying the next page token
    pub request_param: String,

    /// Where the next page token is read from the response
    pub response_json_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateListStep {
    pub repeat_for: String,
    pub template: String,
    pub store_path: String,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractStep {
    pub source_json_path: String,
    pub regex: String,
    /// Capture group; 1 when zero
    #[serde(default)]
    pub group: usize,
    pub store_path: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateStep {
    pub store_path: String,
    /// Random bytes before encoding; 16 when zero
    #[serde(default)]
    pub length: usize,
    #[serde(default)]
    pub encoding: TokenEncoding,
    #[serde(default)]
    pub only_if_missing: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenEncoding {
    #[default]
    #[serde(alias = "")]
    Hex,
    #[serde(alias = "base64")]
    Base64Url,
}

// ============================================================================
// Validation
// ============================================================================

/// Longest accepted polling interval (one year).
pub const MAX_INTERVAL_SECONDS: i64 = 366 * 24 * 60 * 60;

/// Provider configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration JSON does not match the expected shape.
    #[error("invalid provider config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid provider config: interval_seconds must be between 1 and {max}, got {0}", max = MAX_INTERVAL_SECONDS)]
    InvalidInterval(i64),

    #[error("invalid provider config: request url_template is empty")]
    EmptyUrlTemplate,

    #[error("invalid provider config: source {0} declares both change_detection and calendar")]
    ConflictingDetection(String),

    #[error("invalid provider config: source {0} uses calendar detection without the ical payload format")]
    CalendarRequiresIcal(String),
}

/// Parse and validate a provider configuration.
pub fn parse_provider_config(json: &Value) -> Result<ProviderConfig, ConfigError> {
    let config: ProviderConfig = serde_json::from_value(json.clone())?;
    config.validate()?;
    Ok(config)
}

impl ProviderConfig {
    /// Check the invariants that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_INTERVAL_SECONDS).contains(&self.interval_seconds) {
            return Err(ConfigError::InvalidInterval(self.interval_seconds));
        }
        if self.request.url_template.trim().is_empty() {
            return Err(ConfigError::EmptyUrlTemplate);
        }
        for source in self.sources() {
            if source.change_detection.is_some() && source.calendar.is_some() {
                return Err(ConfigError::ConflictingDetection(source.name));
            }
            if source.calendar.is_some() && self.payload_format != PayloadFormat::Ical {
                return Err(ConfigError::CalendarRequiresIcal(source.name));
            }
        }
        Ok(())
    }

    /// Whether cursors are stored per named source.
    pub fn uses_item_sources(&self) -> bool {
        !self.item_sources.is_empty()
    }

    /// Item sources with normalized names. Without explicit sources a single
    /// `default` source is built from the top-level fields.
    pub fn sources(&self) -> Vec<ItemSourceConfig> {
        if self.item_sources.is_empty() {
            return vec![ItemSourceConfig {
                name: DEFAULT_SOURCE_NAME.to_string(),
                items_path: self.items_path.clone(),
                item_id_path: self.item_id_path.clone(),
                change_detection: self.change_detection.clone(),
                calendar: self.calendar.clone(),
                filters: self.filters.clone(),
                mappings: self.mappings.clone(),
                context: self.context.clone(),
            }];
        }

        self.item_sources
            .iter()
            .enumerate()
            .map(|(idx, source)| ItemSourceConfig {
                name: source_name(&source.name, idx),
                ..source.clone()
            })
            .collect()
    }
}

/// Trimmed source name, or `source_<n>` (1-based) when blank.
pub fn source_name(name: &str, idx: usize) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        format!("source_{}", idx + 1)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "name": "github",
            "interval_seconds": 300,
            "request": {"method": "GET", "url_template": "https://api.github.com/notifications"}
        })
    }

    #[test]
    fn test_parse_minimal_config_defaults() {
        let config = parse_provider_config(&minimal()).unwrap();
        assert_eq!(config.payload_format, PayloadFormat::Json);
        assert_eq!(config.request.method, HttpMethod::Get);
        assert_eq!(config.request.body_encoding, BodyEncoding::Json);
        assert!(!config.skip_first);
        let sources = config.sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "default");
        assert_eq!(sources[0].mode(), ChangeMode::Identity);
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_provider_config(&json!({
            "name": "stocks",
            "payload_format": "json",
            "interval_seconds": 60,
            "request": {
                "method": "post",
                "url_template": "https://quotes/{{config.symbol}}",
                "query_params": {"apikey": "{{env.QUOTES_KEY}}"},
                "headers": {"Accept": "application/json"},
                "auth": {"type": "oauth2", "header": "Authorization", "prefix": "Bearer "},
                "body_template": {"symbol": "{{config.symbol}}"},
                "body_encoding": "x-www-form-urlencoded"
            },
            "items_path": "data",
            "item_id_path": "id",
            "change_detection": {"value_json_path": "price", "min_percent": "{{config.percent}}"},
            "filters": {"mode": "any", "rules": [
                {"json_path": "status", "value": "open"},
                {"json_path": "price", "operator": "gte", "value": 10}
            ]},
            "mappings": [{"field_key": "price", "json_path": "price", "type": "number"}]
        }))
        .unwrap();

        assert_eq!(config.request.method, HttpMethod::Post);
        assert_eq!(config.request.body_encoding, BodyEncoding::Form);
        assert_eq!(config.request.auth.as_ref().unwrap().auth_type, AuthType::Oauth2);
        let filters = config.filters.as_ref().unwrap();
        assert_eq!(filters.mode, FilterMode::Any);
        assert_eq!(filters.rules[0].operator, FilterOperator::Equals);
        assert_eq!(filters.rules[1].operator, FilterOperator::Gte);
        assert!(matches!(config.sources()[0].mode(), ChangeMode::Threshold(_)));
    }

    #[test]
    fn test_unsupported_enum_values_are_rejected() {
        let mut config = minimal();
        config["filters"] = json!({"rules": [{"json_path": "x", "operator": "startswith"}]});
        assert!(matches!(parse_provider_config(&config), Err(ConfigError::Parse(_))));

        let mut config = minimal();
        config["request"]["body_encoding"] = json!("multipart");
        assert!(parse_provider_config(&config).is_err());

        let mut config = minimal();
        config["request"]["auth"] = json!({"type": "basic"});
        assert!(parse_provider_config(&config).is_err());

        let mut config = minimal();
        config["payload_format"] = json!("csv");
        assert!(parse_provider_config(&config).is_err());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = minimal();
        config["interval_seconds"] = json!(0);
        assert!(matches!(
            parse_provider_config(&config),
            Err(ConfigError::InvalidInterval(0))
        ));

        let mut config = minimal();
        config["interval_seconds"] = json!(10_000_000_000_000_000_i64);
        assert!(matches!(
            parse_provider_config(&config),
            Err(ConfigError::InvalidInterval(10_000_000_000_000_000))
        ));

        let mut config = minimal();
        config["interval_seconds"] = json!(MAX_INTERVAL_SECONDS);
        assert!(parse_provider_config(&config).is_ok());

        let mut config = minimal();
        config["request"]["url_template"] = json!("  ");
        assert!(matches!(
            parse_provider_config(&config),
            Err(ConfigError::EmptyUrlTemplate)
        ));

        let mut config = minimal();
        config["calendar"] = json!({});
        assert!(matches!(
            parse_provider_config(&config),
            Err(ConfigError::CalendarRequiresIcal(name)) if name == "default"
        ));

        let mut config = minimal();
        config["payload_format"] = json!("ical");
        config["calendar"] = json!({});
        config["change_detection"] = json!({"value_json_path": "x"});
        assert!(matches!(
            parse_provider_config(&config),
            Err(ConfigError::ConflictingDetection(_))
        ));
    }

    #[test]
    fn test_calendar_mode_is_explicit() {
        let mut config = minimal();
        config["payload_format"] = json!("ical");
        let parsed = parse_provider_config(&config).unwrap();
        assert_eq!(parsed.sources()[0].mode(), ChangeMode::Identity);

        config["calendar"] = json!({});
        let parsed = parse_provider_config(&config).unwrap();
        match parsed.sources()[0].mode() {
            ChangeMode::Calendar(calendar) => assert_eq!(calendar.missing_threshold, 2),
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn test_item_source_names_are_normalized() {
        let mut config = minimal();
        config["item_sources"] = json!([
            {"name": " issues ", "items_path": "issues"},
            {"items_path": "pulls"}
        ]);
        let parsed = parse_provider_config(&config).unwrap();
        assert!(parsed.uses_item_sources());
        let names: Vec<String> = parsed.sources().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["issues", "source_2"]);
    }

    #[test]
    fn test_prepare_step_action() {
        let step: PrepareStep = serde_json::from_value(json!({
            "when": {"json_path": "config.mode", "equals": "all"},
            "fetch": {
                "method": "GET",
                "url_template": "https://api/calendars",
                "item_json_path": "id",
                "store_path": "calendar_ids",
                "pagination": {"request_param": "pageToken", "response_json_path": "nextPageToken"}
            }
        }))
        .unwrap();
        match step.action() {
            Some(PrepareAction::Fetch(fetch)) => {
                assert_eq!(fetch.request.url_template, "https://api/calendars");
                assert_eq!(fetch.store_path, "calendar_ids");
            }
            other => panic!("unexpected action {:?}", other),
        }
        assert_eq!(PrepareStep::default().action(), None);
    }

    #[test]
    fn test_auth_header_default() {
        let auth: AuthConfig = serde_json::from_value(json!({"type": "bearer"})).unwrap();
        assert_eq!(auth.header_name(), "Authorization");
        assert_eq!(auth.auth_type, AuthType::Oauth2);
    }
}
