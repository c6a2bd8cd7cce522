//! Retry with exponential backoff, jitter and error classification.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use serde_json::json;

use crate::http::TransportError;
use crate::logger::{ConsoleLogger, Logger, PlainFormat};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Jitter adds up to this fraction of the base delay.
const JITTER_RATIO: f64 = 0.2;

/// Where an operation failed, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No response was received.
    Network,
    /// A response with this status was received.
    Http(u16),
    /// Anything without a recognizable HTTP response.
    Other,
}

/// Errors the default retry predicate can reason about.
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;
}

impl Classify for reqwest::Error {
    fn failure_kind(&self) -> FailureKind {
        match self.status() {
            Some(status) => FailureKind::Http(status.as_u16()),
            None if self.is_builder() => FailureKind::Other,
            None => FailureKind::Network,
        }
    }
}

impl Classify for anyhow::Error {
    fn failure_kind(&self) -> FailureKind {
        if let Some(e) = self.downcast_ref::<TransportError>() {
            return e.failure_kind();
        }
        if let Some(e) = self.downcast_ref::<reqwest::Error>() {
            return e.failure_kind();
        }
        FailureKind::Other
    }
}

/// Retries server errors, rate limiting, and anything that never got a response.
pub fn is_transient(kind: FailureKind) -> bool {
    match kind {
        FailureKind::Http(status) => {
            status >= 500 || status == StatusCode::TOO_MANY_REQUESTS.as_u16()
        }
        FailureKind::Network | FailureKind::Other => true,
    }
}

/// Invalid retry bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryConfigError {
    ZeroInitialDelay,
    MaxDelayBelowInitial { initial: Duration, max: Duration },
    InvalidBackoffFactor(f64),
}

impl std::fmt::Display for RetryConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryConfigError::ZeroInitialDelay => {
                write!(f, "Initial retry delay must be positive")
            }
            RetryConfigError::MaxDelayBelowInitial { initial, max } => {
                write!(
                    f,
                    "Maximum retry delay ({}ms) must not be below the initial delay ({}ms)",
                    max.as_millis(),
                    initial.as_millis()
                )
            }
            RetryConfigError::InvalidBackoffFactor(factor) => {
                write!(f, "Backoff factor must be greater than 1, got {}", factor)
            }
        }
    }
}

impl std::error::Error for RetryConfigError {}

/// Options for [`RetryPolicy::new`]. Unset fields use the defaults.
#[derive(Clone)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub logger: Option<Arc<dyn Logger>>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            logger: None,
        }
    }
}

impl RetryOptions {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

/// Validated, immutable retry bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
}

impl RetryConfig {
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
    ) -> Result<Self, RetryConfigError> {
        if initial_delay.is_zero() {
            return Err(RetryConfigError::ZeroInitialDelay);
        }
        if max_delay < initial_delay {
            return Err(RetryConfigError::MaxDelayBelowInitial {
                initial: initial_delay,
                max: max_delay,
            });
        }
        if !(backoff_factor.is_finite() && backoff_factor > 1.0) {
            return Err(RetryConfigError::InvalidBackoffFactor(backoff_factor));
        }

        Ok(Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_factor,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Delay before the retry following failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_with_jitter(attempt, fastrand::f64())
    }

    /// [`RetryConfig::backoff`] with an explicit jitter sample in `[0, 1)`.
    pub fn backoff_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let max = self.max_delay.as_millis() as f64;
        let base = self.base_delay_ms(attempt);
        let delay = (base + jitter * base * JITTER_RATIO).floor().min(max);
        Duration::from_millis(delay as u64)
    }

    /// `min(initial * factor^(attempt - 1), max)` in milliseconds.
    pub fn base_delay_ms(&self, attempt: u32) -> f64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let initial = self.initial_delay.as_millis() as f64;
        (initial * self.backoff_factor.powi(exponent)).min(self.max_delay.as_millis() as f64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

/// Runs async operations, retrying transient failures.
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    logger: Arc<dyn Logger>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            config: RetryConfig::default(),
            logger: Arc::new(ConsoleLogger::<PlainFormat>::default()),
        }
    }
}

impl RetryPolicy {
    pub fn new(options: RetryOptions) -> Result<Self, RetryConfigError> {
        let config = RetryConfig::new(
            options.max_retries,
            options.initial_delay,
            options.max_delay,
            options.backoff_factor,
        )?;
        let logger = options
            .logger
            .unwrap_or_else(|| Arc::new(ConsoleLogger::<PlainFormat>::default()));

        Ok(Self { config, logger })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Executes `operation`, retrying failures the default classification
    /// considers transient.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display + Debug,
    {
        self.execute_with(operation, |error: &E, _attempt| {
            is_transient(error.failure_kind())
        })
        .await
    }

    /// Executes `operation`, asking `should_retry(error, attempt)` before each
    /// retry. `attempt` counts failures so far, starting at 1.
    ///
    /// Returns the first success, or the last failure once retries are
    /// exhausted or `should_retry` declines. At most `max_retries + 1`
    /// attempts are made.
    pub async fn execute_with<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        mut should_retry: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E, u32) -> bool,
        E: Display + Debug,
    {
        let mut attempt: u32 = 0;

        loop {
            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            attempt = attempt.saturating_add(1);

            if attempt > self.config.max_retries || !should_retry(&error, attempt) {
                debug!("Giving up after {} attempt(s): {}", attempt, error);
                return Err(error);
            }

            let delay = self.config.backoff(attempt);
            let message = error.to_string();
            self.logger.error(
                &format!("Attempt {} failed: {}", attempt, message),
                Some(json!({
                    "error": message,
                    "stack": format!("{:?}", error),
                })),
            );

            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MockLogger;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[derive(Debug, PartialEq)]
    struct Failure {
        attempt: u32,
        kind: FailureKind,
    }

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "failure #{}", self.attempt)
        }
    }

    impl Classify for Failure {
        fn failure_kind(&self) -> FailureKind {
            self.kind
        }
    }

    fn fast_policy(max_retries: u32, logger: MockLogger) -> RetryPolicy {
        RetryPolicy::new(
            RetryOptions::default()
                .max_retries(max_retries)
                .initial_delay(Duration::from_millis(1))
                .max_delay(Duration::from_millis(5))
                .logger(Arc::new(logger)),
        )
        .unwrap()
    }

    fn expect_errors(times: usize) -> MockLogger {
        let mut logger = MockLogger::new();
        logger.expect_error().times(times).return_const(());
        logger
    }

    #[tokio::test]
    async fn test_first_success_skips_logging_and_delay() {
        // A MockLogger without expectations panics on any call.
        let policy = RetryPolicy::new(
            RetryOptions::default().logger(Arc::new(MockLogger::new())),
        )
        .unwrap();

        let start = Instant::now();
        let result: Result<u32, Failure> = policy.execute(|| async { Ok(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_recovers_after_k_failures() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(3, expect_errors(2));

        let result = policy
            .execute(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt <= 2 {
                        Err(Failure {
                            attempt,
                            kind: FailureKind::Network,
                        })
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_waits_backoff_between_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(
            RetryOptions::default()
                .max_retries(3)
                .initial_delay(Duration::from_millis(50))
                .max_delay(Duration::from_millis(1000))
                .logger(Arc::new(expect_errors(2))),
        )
        .unwrap();
        let config = policy.config().clone();

        let start = Instant::now();
        let result = policy
            .execute(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt <= 2 {
                        Err(Failure {
                            attempt,
                            kind: FailureKind::Network,
                        })
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        let elapsed = start.elapsed();

        assert_eq!(result.unwrap(), 3);
        // 50ms after the first failure, 100ms after the second.
        let min_wait = config.base_delay_ms(1) + config.base_delay_ms(2);
        assert!(
            elapsed.as_millis() as f64 >= min_wait,
            "waited {:?}, expected at least {}ms",
            elapsed,
            min_wait
        );
    }

    #[tokio::test]
    async fn test_exhausts_after_max_retries_plus_one() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(3, expect_errors(3));

        let result: Result<(), Failure> = policy
            .execute(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Err(Failure {
                        attempt,
                        kind: FailureKind::Http(503),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            result.unwrap_err(),
            Failure {
                attempt: 4,
                kind: FailureKind::Http(503)
            }
        );
    }

    #[tokio::test]
    async fn test_zero_retries_makes_single_attempt() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(0, expect_errors(0));

        let result: Result<(), Failure> = policy
            .execute(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Err(Failure {
                        attempt,
                        kind: FailureKind::Network,
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(3, expect_errors(0));

        let result: Result<(), Failure> = policy
            .execute(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Err(Failure {
                        attempt,
                        kind: FailureKind::Http(404),
                    })
                }
            })
            .await;

        assert_eq!(result.unwrap_err().attempt, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_predicate_sees_one_based_attempts() {
        let seen = std::sync::Mutex::new(Vec::new());
        let policy = fast_policy(3, expect_errors(3));

        let result: Result<(), Failure> = policy
            .execute_with(
                || async {
                    Err(Failure {
                        attempt: 0,
                        kind: FailureKind::Http(400),
                    })
                },
                |_error, attempt| {
                    seen.lock().unwrap().push(attempt);
                    true
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_custom_predicate_can_stop_early() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(5, expect_errors(1));

        let result: Result<(), Failure> = policy
            .execute_with(
                || {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        Err(Failure {
                            attempt,
                            kind: FailureKind::Network,
                        })
                    }
                },
                |_error, attempt| attempt < 2,
            )
            .await;

        assert_eq!(result.unwrap_err().attempt, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_logs_attempt_and_message() {
        let mut logger = MockLogger::new();
        logger
            .expect_error()
            .withf(|message: &str, meta: &Option<serde_json::Value>| {
                message == "Attempt 1 failed: failure #1"
                    && meta
                        .as_ref()
                        .and_then(|m| m.get("error"))
                        .and_then(|e| e.as_str())
                        == Some("failure #1")
            })
            .times(1)
            .return_const(());
        let policy = fast_policy(1, logger);

        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = policy
            .execute(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Err(Failure {
                        attempt,
                        kind: FailureKind::Other,
                    })
                }
            })
            .await;

        assert_eq!(result.unwrap_err().attempt, 2);
    }

    #[test]
    fn test_default_predicate() {
        assert!(is_transient(FailureKind::Network));
        assert!(is_transient(FailureKind::Other));
        assert!(is_transient(FailureKind::Http(503)));
        assert!(is_transient(FailureKind::Http(500)));
        assert!(is_transient(FailureKind::Http(429)));
        assert!(!is_transient(FailureKind::Http(404)));
        assert!(!is_transient(FailureKind::Http(400)));
    }

    #[test]
    fn test_backoff_within_jitter_bounds() {
        let config = RetryConfig::default();

        for attempt in 1..=8 {
            let base = config.base_delay_ms(attempt);
            for jitter in [0.0, 0.25, 0.5, 0.999_999] {
                let delay = config.backoff_with_jitter(attempt, jitter).as_millis() as f64;
                assert!(delay >= base, "attempt {}: {} < {}", attempt, delay, base);
                assert!(delay <= base * 1.2, "attempt {}: {} > 1.2 * {}", attempt, delay, base);
            }
            let sampled = config.backoff(attempt).as_millis() as f64;
            assert!(sampled >= base && sampled <= base * 1.2);
        }
    }

    #[test]
    fn test_backoff_grows_exponentially_then_caps() {
        let config = RetryConfig::default();

        assert_eq!(config.backoff_with_jitter(1, 0.0), Duration::from_millis(1000));
        assert_eq!(config.backoff_with_jitter(2, 0.0), Duration::from_millis(2000));
        assert_eq!(config.backoff_with_jitter(3, 0.0), Duration::from_millis(4000));
        assert_eq!(config.backoff_with_jitter(20, 0.0), Duration::from_millis(30_000));
        // Jitter never pushes past the cap.
        assert_eq!(config.backoff_with_jitter(20, 0.99), Duration::from_millis(30_000));
        assert_eq!(config.backoff_with_jitter(1, 0.5), Duration::from_millis(1100));
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(
            RetryConfig::new(3, Duration::ZERO, Duration::from_secs(1), 2.0),
            Err(RetryConfigError::ZeroInitialDelay)
        );
        assert!(matches!(
            RetryConfig::new(3, Duration::from_secs(2), Duration::from_secs(1), 2.0),
            Err(RetryConfigError::MaxDelayBelowInitial { .. })
        ));
        assert_eq!(
            RetryConfig::new(3, Duration::from_secs(1), Duration::from_secs(1), 1.0),
            Err(RetryConfigError::InvalidBackoffFactor(1.0))
        );
        let one_second = Duration::from_secs(1);
        assert!(RetryConfig::new(3, one_second, one_second, f64::NAN).is_err());
        let one_ms = Duration::from_millis(1);
        assert!(RetryConfig::new(0, one_ms, one_ms, 1.5).is_ok());
    }

    #[test]
    fn test_default_options() {
        let policy = RetryPolicy::new(RetryOptions::default()).unwrap();
        assert_eq!(policy.config(), &RetryConfig::default());
        assert_eq!(policy.config().max_retries(), 3);
        assert_eq!(policy.config().initial_delay(), Duration::from_millis(1000));
        assert_eq!(policy.config().max_delay(), Duration::from_millis(30_000));
        assert_eq!(policy.config().backoff_factor(), 2.0);
    }

    #[test]
    fn test_anyhow_classification() {
        let err = anyhow::Error::from(TransportError::Http {
            status: 502,
            status_text: "Bad Gateway".into(),
            body: serde_json::Value::Null,
        });
        assert_eq!(err.failure_kind(), FailureKind::Http(502));

        let err = anyhow::anyhow!("something else");
        assert_eq!(err.failure_kind(), FailureKind::Other);
    }

    #[tokio::test]
    async fn test_reqwest_status_error_classification() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(429)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let response = client.get(server.url()).send().await.unwrap();
        let err = response.error_for_status().unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::Http(429));
        assert!(is_transient(err.failure_kind()));
    }

    #[tokio::test]
    async fn test_reqwest_connection_error_classification() {
        // Nothing listens on port 9 of the loopback interface.
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::Network);
    }
}
