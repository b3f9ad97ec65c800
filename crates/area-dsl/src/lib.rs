// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider DSL - Declarative Polling Definitions
//!
//! This crate defines the provider configuration language used by the polling
//! engine:
//! - Serde types for provider configurations (request, items, filters,
//!   change detection, mappings, prepare steps)
//! - `{{placeholder}}` template rendering against a per-poll context
//! - A minimal JSON path reader shared by every component
//! - String and number coercions for loosely typed provider data

pub mod coercion;
pub mod path;
pub mod provider;
pub mod template;

pub use provider::{
    AuthConfig, AuthType, BodyEncoding, CalendarConfig, ChangeDetectionConfig, ChangeMode,
    ConfigError, ExtractStep, FetchStep, FilterConfig, FilterMode, FilterOperator, FilterRule,
    GenerateStep, HttpMethod, ItemSourceConfig, MappingConfig, MappingType, PaginationConfig,
    PayloadFormat, PrepareAction, PrepareCondition, PrepareStep, ProviderConfig, RequestConfig,
    MAX_INTERVAL_SECONDS, TemplateListStep, TokenEncoding, parse_provider_config,
};
pub use template::{TemplateContext, TemplateError};
