// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider request execution.
//!
//! Turns a declarative [`RequestConfig`] into an outbound HTTP call:
//!
//! 1. The URL template is rendered; `webcal://` and `webcals://` become `https://`
//! 2. Query parameters are merged: URL parameters, rendered `query_params`,
//!    then literal overrides (pagination tokens), encoded sorted by key
//! 3. `body_template` is rendered and encoded as JSON or a form
//! 4. Headers are rendered; the body content type applies only when no
//!    header set one
//! 5. `oauth2`/`bearer` auth fetches a token for the user
//!
//! Non-2xx responses fail with [`RequestError::Status`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use area_dsl::coercion::to_text;
use area_dsl::{AuthType, BodyEncoding, HttpMethod, RequestConfig, TemplateContext, TemplateError};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clients::{ClientError, TokenProvider};

/// Provider request failures.
#[derive(Debug, Error)]
pub enum RequestError {
    /// A template in the request could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The rendered URL is not valid.
    #[error("invalid request url {url:?}: {message}")]
    InvalidUrl {
        /// Rendered URL
        url: String,
        /// Parser message
        message: String,
    },

    /// The body could not be encoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// A rendered header name or value is not valid.
    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    /// The access token could not be obtained.
    #[error(transparent)]
    Token(#[from] ClientError),

    /// The request could not be sent or the response not read.
    #[error("provider request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("provider request failed: status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, lossily decoded
        body: String,
    },
}

/// Executes provider requests with a shared HTTP client.
pub struct RequestExecutor {
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    log_requests: bool,
}

impl RequestExecutor {
    /// Create an executor. The client's timeout applies to every request.
    pub fn new(client: reqwest::Client, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            tokens,
            log_requests: false,
        }
    }

    /// Log method, URL, status and duration of every request.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    /// Execute `request` on behalf of `user_id` and return the response body.
    pub async fn execute(
        &self,
        request: &RequestConfig,
        provider: &str,
        user_id: i64,
        ctx: &TemplateContext,
        query_overrides: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, RequestError> {
        let url = build_url(request, ctx, query_overrides)?;
        let body = build_body(request, ctx)?;
        let mut headers = build_headers(request, ctx)?;

        if let Some((content_type, _)) = &body
            && !headers.contains_key(CONTENT_TYPE)
        {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(*content_type));
        }

        if let Some(auth) = &request.auth {
            match auth.auth_type {
                AuthType::Oauth2 => {
                    let scope = if auth.provider.trim().is_empty() {
                        provider
                    } else {
                        auth.provider.trim()
                    };
                    let token = self.tokens.get_token(user_id, scope).await?;
                    let name = auth.header_name();
                    let value = format!("{}{}", auth.prefix, token);
                    headers.insert(
                        header_name(name)?,
                        HeaderValue::from_str(&value)
                            .map_err(|_| RequestError::InvalidHeader(name.to_string()))?,
                    );
                }
            }
        }

        let method = http_method(request.method);
        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers);
        if let Some((_, bytes)) = body {
            builder = builder.body(bytes);
        }

        let start = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                if self.log_requests {
                    warn!(provider = %provider, method = %method, url = %url, error = %e, "Provider request failed");
                }
                return Err(RequestError::Network(e));
            }
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(RequestError::Network)?;
        if self.log_requests {
            info!(
                provider = %provider,
                method = %method,
                url = %url,
                status = status.as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Provider request"
            );
        } else {
            debug!(provider = %provider, status = status.as_u16(), "Provider request");
        }

        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }
}

fn http_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

/// Calendar subscription links use the `webcal` scheme for plain HTTPS.
fn rewrite_webcal(url: &str) -> String {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    for scheme in ["webcals://", "webcal://"] {
        if lower.starts_with(scheme) {
            return format!("https://{}", &trimmed[scheme.len()..]);
        }
    }
    trimmed.to_string()
}

fn build_url(
    request: &RequestConfig,
    ctx: &TemplateContext,
    query_overrides: &BTreeMap<String, String>,
) -> Result<Url, RequestError> {
    let rendered = to_text(&ctx.render_str(&request.url_template)?);
    let raw = rewrite_webcal(&rendered);
    let mut url = Url::parse(&raw).map_err(|e| RequestError::InvalidUrl {
        url: raw.clone(),
        message: e.to_string(),
    })?;

    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        query
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    for (key, template) in &request.query_params {
        if key.trim().is_empty() {
            continue;
        }
        match ctx.render_nested(template) {
            Ok(value) => {
                query.insert(key.clone(), vec![to_text(&value)]);
            }
            Err(e) if e.is_missing() => {
                debug!(param = %key, error = %e, "Query parameter dropped");
            }
            Err(e) => return Err(e.into()),
        }
    }

    for (key, value) in query_overrides {
        if key.trim().is_empty() {
            continue;
        }
        query.insert(key.clone(), vec![value.clone()]);
    }

    if query.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, values) in &query {
            for value in values {
                pairs.append_pair(key, value);
            }
        }
    }
    Ok(url)
}

/// Rendered body and its content type.
fn build_body(
    request: &RequestConfig,
    ctx: &TemplateContext,
) -> Result<Option<(&'static str, Vec<u8>)>, RequestError> {
    let Some(template) = &request.body_template else {
        return Ok(None);
    };
    let rendered = ctx.render(template)?;

    match request.body_encoding {
        BodyEncoding::Json => {
            let bytes = serde_json::to_vec(&rendered)
                .map_err(|e| RequestError::InvalidBody(e.to_string()))?;
            Ok(Some(("application/json", bytes)))
        }
        BodyEncoding::Form => {
            let form = encode_form(&rendered)?;
            Ok(Some(("application/x-www-form-urlencoded", form.into_bytes())))
        }
    }
}

/// Form-encode an object. Arrays repeat their key; null and blank values
/// are skipped. Keys are emitted in sorted order.
fn encode_form(rendered: &Value) -> Result<String, RequestError> {
    let Value::Object(map) = rendered else {
        return Err(RequestError::InvalidBody(
            "form body must be an object".to_string(),
        ));
    };

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    let mut pairs = Vec::new();
    for key in keys {
        let values: Vec<&Value> = match &map[key] {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for value in values {
            let text = to_text(value);
            let text = text.trim();
            if value.is_null() || text.is_empty() {
                continue;
            }
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(text)
            ));
        }
    }
    Ok(pairs.join("&"))
}

fn header_name(name: &str) -> Result<HeaderName, RequestError> {
    HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| RequestError::InvalidHeader(name.to_string()))
}

fn build_headers(request: &RequestConfig, ctx: &TemplateContext) -> Result<HeaderMap, RequestError> {
    let mut headers = HeaderMap::new();
    for (name, template) in &request.headers {
        let value = to_text(&ctx.render_nested(template)?);
        headers.insert(
            header_name(name)?,
            HeaderValue::from_str(&value).map_err(|_| RequestError::InvalidHeader(name.clone()))?,
        );
    }
    Ok(headers)
}
