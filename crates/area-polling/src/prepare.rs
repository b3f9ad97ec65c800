// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subscription config preparation.
//!
//! Providers may declare `prepare` steps that enrich a subscription config
//! before it is stored: look up values through the provider API (`fetch`),
//! expand lists (`template_list`), pull parts out of strings (`extract`) or
//! mint secrets (`generate`). Steps run in declaration order and each sees
//! the config as left by the previous one.

use std::collections::{BTreeMap, HashSet};

use area_dsl::coercion::to_text;
use area_dsl::path;
use area_dsl::{
    ExtractStep, FetchStep, GenerateStep, PrepareAction, PrepareCondition, ProviderConfig,
    TemplateContext, TemplateError, TemplateListStep, TokenEncoding,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::request::{RequestError, RequestExecutor};

const DEFAULT_TOKEN_BYTES: usize = 16;

/// Prepare step failures. Each one rejects the subscription config.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// A required step field is blank.
    #[error("prepare {0} is missing a required field")]
    MissingField(&'static str),

    /// A `when` condition has no path.
    #[error("prepare condition missing json_path")]
    EmptyCondition,

    /// A referenced config or response path does not exist.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The fetch request failed.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The fetch response is not JSON.
    #[error("invalid prepare response: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    /// `item_json_path` was set but the response is not an array.
    #[error("expected array response")]
    ExpectedArray,

    /// No element of the response carried `item_json_path`.
    #[error("no items extracted")]
    NoItems,

    /// A template could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// `template_list` rendered nothing.
    #[error("template_list produced no values")]
    EmptyList,

    /// The extract pattern does not compile.
    #[error("invalid extract regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// The extract pattern did not match a non-optional source.
    #[error("extract regex did not match")]
    NoMatch,

    /// The extract capture group does not exist in the pattern.
    #[error("extract group {0} out of range")]
    GroupOutOfRange(usize),

    /// The store path is blank or malformed.
    #[error("invalid store_path {0:?}")]
    InvalidStorePath(String),
}

/// Run the provider's prepare steps against `config` in place.
///
/// `provider_name` scopes OAuth2 tokens for `fetch` requests. On error
/// `config` may hold the results of the steps that already ran.
pub async fn apply_prepare_steps(
    executor: &RequestExecutor,
    provider: &ProviderConfig,
    provider_name: &str,
    user_id: i64,
    config: &mut Value,
) -> Result<(), PrepareError> {
    for (index, step) in provider.prepare.iter().enumerate() {
        if let Some(condition) = &step.when
            && !matches_condition(condition, config)?
        {
            debug!(provider = %provider_name, step = index, "Prepare step skipped");
            continue;
        }

        match step.action() {
            Some(PrepareAction::Fetch(fetch)) => {
                apply_fetch(executor, fetch, provider_name, user_id, config).await?
            }
            Some(PrepareAction::TemplateList(list)) => apply_template_list(list, config)?,
            Some(PrepareAction::Extract(extract)) => apply_extract(extract, config)?,
            Some(PrepareAction::Generate(generate)) => apply_generate(generate, config)?,
            None => {}
        }
    }
    Ok(())
}

fn config_path(path: &str) -> &str {
    let trimmed = path.trim();
    trimmed.strip_prefix("config.").unwrap_or(trimmed)
}

fn matches_condition(condition: &PrepareCondition, config: &Value) -> Result<bool, PrepareError> {
    let path = config_path(&condition.json_path);
    if path.is_empty() {
        return Err(PrepareError::EmptyCondition);
    }
    let value = path::extract(config, path);

    if let Some(exists) = condition.exists
        && value.is_some() != exists
    {
        return Ok(false);
    }

    if !condition.equals.is_empty() {
        match value {
            Some(v) if to_text(v).eq_ignore_ascii_case(&condition.equals) => {}
            _ => return Ok(false),
        }
    }

    if !condition.one_of.is_empty() {
        let Some(v) = value else {
            return Ok(false);
        };
        let current = to_text(v);
        if !condition
            .one_of
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(&current))
        {
            return Ok(false);
        }
    }

    Ok(true)
}

async fn apply_fetch(
    executor: &RequestExecutor,
    fetch: &FetchStep,
    provider_name: &str,
    user_id: i64,
    config: &mut Value,
) -> Result<(), PrepareError> {
    if fetch.store_path.trim().is_empty() {
        return Err(PrepareError::MissingField("fetch store_path"));
    }

    let ctx = TemplateContext::new(config.clone())
        .with_provider(provider_name)
        .with_user_id(user_id)
        .with_process_env();

    let mut items = Vec::new();
    let mut page_token = String::new();
    let mut seen_tokens = HashSet::new();

    loop {
        let mut overrides = BTreeMap::new();
        if let Some(pagination) = &fetch.pagination
            && !page_token.is_empty()
        {
            overrides.insert(pagination.request_param.clone(), page_token.clone());
        }

        let body = executor
            .execute(&fetch.request, provider_name, user_id, &ctx, &overrides)
            .await?;
        let payload: Value =
            serde_json::from_slice(&body).map_err(PrepareError::InvalidResponse)?;

        let value = if fetch.response_json_path.trim().is_empty() {
            &payload
        } else {
            path::extract(&payload, fetch.response_json_path.trim())
                .ok_or_else(|| PrepareError::PathNotFound(fetch.response_json_path.clone()))?
        };
        items.extend(collect_items(value, fetch.item_json_path.trim())?);

        let Some(pagination) = &fetch.pagination else {
            break;
        };
        let next = path::extract(&payload, pagination.response_json_path.trim())
            .map(|token| to_text(token).trim().to_string())
            .unwrap_or_default();
        if next.is_empty() {
            break;
        }
        if !seen_tokens.insert(next.clone()) {
            debug!(provider = %provider_name, token = %next, "Pagination token repeated");
            break;
        }
        page_token = next;
    }

    debug!(provider = %provider_name, items = items.len(), store_path = %fetch.store_path, "Prepare fetch stored");
    store(config, &fetch.store_path, Value::Array(items))
}

fn collect_items(value: &Value, item_path: &str) -> Result<Vec<Value>, PrepareError> {
    if item_path.is_empty() {
        return Ok(match value {
            Value::Array(list) => list.clone(),
            other => vec![other.clone()],
        });
    }

    let Value::Array(list) = value else {
        return Err(PrepareError::ExpectedArray);
    };
    let out: Vec<Value> = list
        .iter()
        .filter_map(|item| path::extract(item, item_path).cloned())
        .collect();
    if out.is_empty() {
        return Err(PrepareError::NoItems);
    }
    Ok(out)
}

fn apply_template_list(step: &TemplateListStep, config: &mut Value) -> Result<(), PrepareError> {
    if step.repeat_for.trim().is_empty()
        || step.template.is_empty()
        || step.store_path.trim().is_empty()
    {
        return Err(PrepareError::MissingField("template_list"));
    }

    let repeat_path = config_path(&step.repeat_for);
    if repeat_path.is_empty() {
        return Err(PrepareError::PathNotFound(step.repeat_for.clone()));
    }
    let items = match path::extract(config, repeat_path) {
        Some(Value::Array(list)) => list.clone(),
        Some(other) => vec![other.clone()],
        None => return Err(PrepareError::PathNotFound(step.repeat_for.clone())),
    };

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let ctx = TemplateContext::new(config.clone()).with_item(item, index);
        let rendered = to_text(&ctx.render_str(&step.template)?);
        let value = rendered.trim();
        if value.is_empty() {
            continue;
        }
        if step.unique && !seen.insert(value.to_string()) {
            continue;
        }
        results.push(Value::String(value.to_string()));
    }

    if results.is_empty() {
        return Err(PrepareError::EmptyList);
    }
    store(config, &step.store_path, Value::Array(results))
}

fn apply_extract(step: &ExtractStep, config: &mut Value) -> Result<(), PrepareError> {
    if step.source_json_path.trim().is_empty()
        || step.regex.trim().is_empty()
        || step.store_path.trim().is_empty()
    {
        return Err(PrepareError::MissingField("extract"));
    }

    let input = match path::extract(config, config_path(&step.source_json_path)) {
        Some(value) => to_text(value),
        None => return Ok(()),
    };
    if input.trim().is_empty() {
        return Ok(());
    }

    let re = Regex::new(&step.regex)?;
    let Some(captures) = re.captures(&input) else {
        if step.optional {
            return Ok(());
        }
        return Err(PrepareError::NoMatch);
    };

    let group = if step.group == 0 { 1 } else { step.group };
    if group >= captures.len() {
        return Err(PrepareError::GroupOutOfRange(group));
    }
    let value = captures.get(group).map(|m| m.as_str()).unwrap_or("");
    store(config, &step.store_path, Value::String(value.to_string()))
}

fn apply_generate(step: &GenerateStep, config: &mut Value) -> Result<(), PrepareError> {
    let store_path = config_path(&step.store_path);
    if store_path.is_empty() {
        return Err(PrepareError::MissingField("generate store_path"));
    }

    if step.only_if_missing
        && let Some(existing) = path::extract(config, store_path)
        && !to_text(existing).trim().is_empty()
    {
        return Ok(());
    }

    let length = if step.length == 0 {
        DEFAULT_TOKEN_BYTES
    } else {
        step.length
    };
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);

    let token = match step.encoding {
        TokenEncoding::Hex => hex::encode(&bytes),
        TokenEncoding::Base64Url => URL_SAFE_NO_PAD.encode(&bytes),
    };
    store(config, &step.store_path, Value::String(token))
}

fn store(config: &mut Value, store_path: &str, value: Value) -> Result<(), PrepareError> {
    if path::set(config, config_path(store_path), value) {
        Ok(())
    } else {
        Err(PrepareError::InvalidStorePath(store_path.to_string()))
    }
}
