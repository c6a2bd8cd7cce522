//! HTTP client wrapper producing standard envelopes.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::{
    Client, Method, Url,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use super::error::TransportError;
use crate::logger::{self, Logger};
use crate::mode::{self, Mode};
use crate::response::{ApiResponseBuilder, ErrorDetail, Payload, StandardResponse};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const USER_AGENT: &str = concat!("idsentra/", env!("IDSENTRA_VERSION"));

/// Generates a request id of the form `req_<millis>_<9 base36 chars>`.
pub fn generate_request_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = (0..9).map(|_| fastrand::digit(36)).collect();
    format!("req_{}_{}", millis, suffix)
}

/// Misconfiguration detected while building an [`ApiClient`].
#[derive(Debug)]
pub enum ClientBuildError {
    MissingBaseUrl,
    MissingLogger,
    InvalidBaseUrl { url: String, reason: String },
    InvalidHeader { name: String, reason: String },
    Transport(reqwest::Error),
}

impl std::fmt::Display for ClientBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientBuildError::MissingBaseUrl => write!(f, "A base URL is required"),
            ClientBuildError::MissingLogger => write!(f, "A logger is required"),
            ClientBuildError::InvalidBaseUrl { url, reason } => {
                write!(f, "Invalid base URL '{}': {}", url, reason)
            }
            ClientBuildError::InvalidHeader { name, reason } => {
                write!(f, "Invalid header '{}': {}", name, reason)
            }
            ClientBuildError::Transport(e) => write!(f, "Failed to build HTTP client: {}", e),
        }
    }
}

impl std::error::Error for ClientBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientBuildError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-request settings.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Sent as `X-Request-Id`; generated when absent.
    pub request_id: Option<String>,
}

impl RequestOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    headers: Vec<(String, String)>,
    logger: Option<Arc<dyn Logger>>,
    mode: Option<Mode>,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
            logger: None,
            mode: None,
        }
    }
}

impl ApiClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Overrides the process-wide mode for stack inclusion.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn build(self) -> Result<ApiClient, ClientBuildError> {
        let logger = self.logger.ok_or(ClientBuildError::MissingLogger)?;
        let base_url = self.base_url.ok_or(ClientBuildError::MissingBaseUrl)?;
        Url::parse(&base_url).map_err(|e| ClientBuildError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &self.headers {
            let invalid = |reason: String| ClientBuildError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .map_err(ClientBuildError::Transport)?;

        debug!("API client ready for {}", base_url);

        Ok(ApiClient {
            client,
            base_url,
            logger,
            mode: self.mode.unwrap_or_else(|| mode::current().clone()),
        })
    }
}

/// JSON API client whose `get`/`post`/`put`/`delete` never fail: every
/// outcome is folded into a [`StandardResponse`].
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    logger: Arc<dyn Logger>,
    mode: Mode,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub async fn get<T>(&self, path: &str, options: &RequestOptions) -> StandardResponse<T>
    where
        T: DeserializeOwned + Payload,
    {
        let result = self.send(Method::GET, path, None::<&Value>, options).await;
        self.envelope(result, "Request successful")
    }

    pub async fn post<T, B>(
        &self,
        path: &str,
        data: &B,
        options: &RequestOptions,
    ) -> StandardResponse<T>
    where
        T: DeserializeOwned + Payload,
        B: Serialize + ?Sized,
    {
        let result = self.send(Method::POST, path, Some(data), options).await;
        self.envelope(result, "Resource created successfully")
    }

    pub async fn put<T, B>(
        &self,
        path: &str,
        data: &B,
        options: &RequestOptions,
    ) -> StandardResponse<T>
    where
        T: DeserializeOwned + Payload,
        B: Serialize + ?Sized,
    {
        let result = self.send(Method::PUT, path, Some(data), options).await;
        self.envelope(result, "Resource updated successfully")
    }

    pub async fn delete<T>(&self, path: &str, options: &RequestOptions) -> StandardResponse<T>
    where
        T: DeserializeOwned + Payload,
    {
        let result = self.send(Method::DELETE, path, None::<&Value>, options).await;
        self.envelope(result, "Resource deleted successfully")
    }

    /// Sends one request and decodes a successful body as `T`.
    ///
    /// Unlike the envelope methods this surfaces failures, so it can be
    /// wrapped in a [`crate::retry::RetryPolicy`].
    #[tracing::instrument(skip(self, body, options))]
    pub async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(generate_request_id);
        let logger = self
            .logger
            .child(logger::context(json!({ "requestId": request_id })));

        let result = self
            .dispatch(logger.as_ref(), &method, path, body, options, &request_id)
            .await;

        match result {
            Err(error @ TransportError::Http { .. }) => Err(error),
            Err(error) => {
                logger.error(
                    &format!("API Request Failed: {}", error),
                    Some(json!({ "method": method.as_str(), "path": path })),
                );
                Err(error)
            }
            Ok(value) => Ok(value),
        }
    }

    async fn dispatch<T, B>(
        &self,
        logger: &dyn Logger,
        method: &Method,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
        request_id: &str,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path)?;

        let mut builder = self
            .client
            .request(method.clone(), url)
            .header(REQUEST_ID_HEADER, request_id);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            let value =
                serde_json::to_value(body).map_err(|e| TransportError::Setup(e.to_string()))?;
            builder = builder.json(&value);
        }
        let request = builder
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        let request_url = request.url().to_string();
        logger.debug(
            &format!("API Request: {} {}", method, request_url),
            Some(json!({
                "method": method.as_str(),
                "url": request_url,
                "headers": header_json(request.headers()),
            })),
        );

        let response = self.client.execute(request).await.map_err(|e| {
            if e.is_builder() {
                TransportError::Setup(e.to_string())
            } else {
                TransportError::Network(e)
            }
        })?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let bytes = response.bytes().await.map_err(TransportError::Network)?;
        let data = parse_body(&bytes);

        if !status.is_success() {
            logger.error(
                &format!(
                    "API Error: {} {} - {} {}",
                    method,
                    request_url,
                    status.as_u16(),
                    status_text
                ),
                Some(json!({
                    "url": request_url,
                    "method": method.as_str(),
                    "status": status.as_u16(),
                    "data": data,
                })),
            );
            return Err(TransportError::Http {
                status: status.as_u16(),
                status_text,
                body: data,
            });
        }

        logger.debug(
            &format!("API Response: {} {}", status.as_u16(), request_url),
            Some(json!({
                "status": status.as_u16(),
                "statusText": status_text,
                "data": data,
            })),
        );

        serde_json::from_value(data).map_err(TransportError::Decode)
    }

    /// Folds a [`ApiClient::send`] result into an envelope.
    pub fn envelope<T: Payload + DeserializeOwned>(
        &self,
        result: Result<T, TransportError>,
        success_message: &str,
    ) -> StandardResponse<T> {
        match result {
            Ok(data) => ApiResponseBuilder::success(success_message, data),
            Err(error) => self.error_envelope(error),
        }
    }

    fn error_envelope<T: Payload + DeserializeOwned>(
        &self,
        error: TransportError,
    ) -> StandardResponse<T> {
        let stack = (self.mode.is_development() || self.mode.is_test())
            .then(|| format!("{:?}", error));
        let code = Some(error.code());

        match &error {
            TransportError::Http { body, .. } => {
                let body_message = error.body_message().map(str::to_string);
                let data = serde_json::from_value(body.clone())
                    .map(Payload::or_empty)
                    .unwrap_or_else(|_| T::empty());
                StandardResponse::failure(
                    body_message
                        .clone()
                        .unwrap_or_else(|| "API request failed".to_string()),
                    data,
                    ErrorDetail {
                        code,
                        details: Some(body_message.unwrap_or_else(|| error.to_string())),
                        stack,
                    },
                )
            }
            TransportError::Network(_) => StandardResponse::failure(
                "No response received from server",
                T::empty(),
                ErrorDetail {
                    code,
                    details: Some("The request was made but no response was received".to_string()),
                    stack,
                },
            ),
            TransportError::Setup(cause) => StandardResponse::failure(
                "Error setting up request",
                T::empty(),
                ErrorDetail {
                    code,
                    details: Some(cause.clone()),
                    stack,
                },
            ),
            TransportError::Decode(e) => StandardResponse::failure(
                "Invalid response received from server",
                T::empty(),
                ErrorDetail {
                    code,
                    details: Some(e.to_string()),
                    stack,
                },
            ),
        }
    }

    /// Resolves `path` against the base URL; absolute URLs are used as is.
    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let joined = join_url(&self.base_url, path);
        Url::parse(&joined).map_err(|e| TransportError::Setup(format!("{}: {}", joined, e)))
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// JSON bodies are parsed; anything else is kept as a string.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn header_json(headers: &HeaderMap) -> Value {
    let map = headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>").to_string();
            (name.as_str().to_string(), Value::String(value))
        })
        .collect();
    Value::Object(map)
}
