use anyhow::{Context, Result, bail};
use log::debug;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    http::{ApiClient, Method, RequestOptions, generate_request_id},
    logger::Logger,
    response::StandardResponse,
    retry::{DEFAULT_MAX_DELAY, RetryOptions, RetryPolicy},
};

/// Parameters of a single `request` invocation.
#[derive(Debug, Clone)]
pub struct RequestParams {
    pub method: String,
    pub path: String,
    pub base_url: String,
    /// JSON request body.
    pub data: Option<String>,
    /// `NAME:VALUE` pairs.
    pub headers: Vec<String>,
    pub timeout: Option<Duration>,
    pub retries: u32,
    pub initial_delay: Duration,
}

/// Splits a `NAME:VALUE` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => bail!("Invalid header '{}', expected NAME:VALUE", raw),
    }
}

/// Success message for an envelope produced by `method`.
pub fn success_message(method: &Method) -> &'static str {
    if *method == Method::POST {
        "Resource created successfully"
    } else if *method == Method::PUT {
        "Resource updated successfully"
    } else if *method == Method::DELETE {
        "Resource deleted successfully"
    } else {
        "Request successful"
    }
}

/// Issue one request under the retry policy and return its envelope.
///
/// Only invalid arguments fail; transport outcomes end up in the envelope.
#[tracing::instrument(
    skip(params, logger),
    fields(method = %params.method, path = %params.path)
)]
pub async fn request(params: &RequestParams, logger: Arc<dyn Logger>) -> Result<StandardResponse> {
    let method = Method::from_bytes(params.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", params.method))?;

    let body = params
        .data
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("Request data must be valid JSON")?;

    // One id for every attempt of this request.
    let mut options = RequestOptions::default().request_id(generate_request_id());
    if let Some(timeout) = params.timeout {
        options = options.timeout(timeout);
    }
    for raw in &params.headers {
        let (name, value) = parse_header(raw)?;
        options = options.header(name, value);
    }

    let client = ApiClient::builder()
        .base_url(params.base_url.as_str())
        .logger(Arc::clone(&logger))
        .build()?;

    let policy = RetryPolicy::new(
        RetryOptions::default()
            .max_retries(params.retries)
            .initial_delay(params.initial_delay)
            .max_delay(DEFAULT_MAX_DELAY.max(params.initial_delay))
            .logger(logger),
    )?;

    debug!(
        "{} {} (up to {} retries)",
        method, params.path, params.retries
    );

    let result = policy
        .execute(|| {
            client.send::<Value, Value>(method.clone(), &params.path, body.as_ref(), &options)
        })
        .await;

    Ok(client.envelope(result, success_message(&method)))
}
