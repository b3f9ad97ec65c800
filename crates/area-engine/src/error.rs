// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for area-engine.

use area_dsl::{MappingType, TemplateError};
use thiserror::Error;

/// Failures that abort evaluation of an item source.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A path or threshold template could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Response body could not be parsed in the declared format.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("change detection value path is empty")]
    EmptyValuePath,

    #[error("change detection path not found: {0}")]
    ValueNotFound(String),

    #[error("change detection value is not numeric")]
    NonNumericValue,

    #[error("change detection previous value is not numeric: {0}")]
    NonNumericCursor(String),

    #[error("threshold is not numeric")]
    NonNumericThreshold,

    #[error("failed to encode cursor: {0}")]
    CursorEncoding(#[from] serde_json::Error),
}

/// Response body parsing failures.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid xml payload: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("payload is not valid utf-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Failures projecting one item into output fields.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("missing json path {0}")]
    MissingPath(String),

    #[error("field {field}: expected {expected}")]
    TypeMismatch {
        field: String,
        expected: MappingType,
    },
}
