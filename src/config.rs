//! Client configuration.
//!
//! All behaviour is controlled through [`ClientConfig`], built via
//! [`ClientConfigBuilder`]. The only value that may change after
//! construction is the API key: it lives in an [`ApiKey`] handle shared by
//! every clone of the config, so a key rotation is seen by all in-flight
//! and future requests without any global state.

use crate::error::ConvertError;
use crate::progress::JobObserver;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Production endpoint of the remote job API.
pub const DEFAULT_BASE_URL: &str = "https://api.cloudconvert.com/v2";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "CLOUDCONVERT_API_KEY";

/// Environment variable overriding the base URL (e.g. the sandbox).
pub const BASE_URL_ENV: &str = "CLOUDCONVERT_BASE_URL";

/// Shared, replaceable bearer token.
///
/// Reads and writes take the lock for the whole value, so a reader sees
/// either the old key or the new one, never a mix.
#[derive(Clone)]
pub struct ApiKey(Arc<RwLock<String>>);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(key.into())))
    }

    /// Current key value.
    pub fn get(&self) -> String {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the key for every holder of this handle.
    pub fn set(&self, key: impl Into<String>) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = key.into();
    }

    fn redacted(&self) -> String {
        let key = self.get();
        let prefix: String = key.chars().take(4).collect();
        format!("{prefix}…({} chars)", key.chars().count())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Configuration for a [`crate::ConvertClient`].
///
/// # Example
/// ```rust
/// use cloudconvert_jobs::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .api_key("my-key")
///     .job_timeout(Duration::from_secs(120))
///     .build()
///     .unwrap();
/// assert_eq!(config.poll_interval, Duration::from_secs(2));
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer token for `/jobs`, `/tasks` and `/import` calls.
    pub api_key: ApiKey,

    /// API root without trailing slash. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Fixed delay between job status polls. Default: 2 s.
    pub poll_interval: Duration,

    /// Wall-clock bound on polling, measured from the first poll. Default: 300 s.
    pub job_timeout: Duration,

    /// Hard cap on status polls regardless of elapsed time.
    /// If None, derived from `job_timeout / poll_interval`.
    pub max_poll_attempts: Option<u32>,

    /// Per-HTTP-call timeout. Default: 30 s.
    pub request_timeout: Duration,

    /// Uploads run at most this many at a time. Default: 4.
    pub upload_concurrency: usize,

    /// OCR language code passed to `pdf/ocr`. Default: `eng`.
    pub ocr_language: String,

    /// Page-load condition for website capture. Default: `networkidle0`.
    pub capture_wait_until: String,

    /// Receives lifecycle events while a job runs.
    pub observer: Option<Arc<dyn JobObserver>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::new(""),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(2),
            job_timeout: Duration::from_secs(300),
            max_poll_attempts: None,
            request_timeout: Duration::from_secs(30),
            upload_concurrency: 4,
            ocr_language: "eng".to_string(),
            capture_wait_until: "networkidle0".to_string(),
            observer: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key)
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("job_timeout", &self.job_timeout)
            .field("max_poll_attempts", &self.effective_max_polls())
            .field("request_timeout", &self.request_timeout)
            .field("upload_concurrency", &self.upload_concurrency)
            .field("ocr_language", &self.ocr_language)
            .field("capture_wait_until", &self.capture_wait_until)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn JobObserver>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build from `CLOUDCONVERT_API_KEY` and optional `CLOUDCONVERT_BASE_URL`.
    pub fn from_env() -> Result<Self, ConvertError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConvertError> {
        let key = lookup(API_KEY_ENV)
            .ok_or_else(|| ConvertError::InvalidConfig(format!("{API_KEY_ENV} is not set")))?;
        let mut builder = Self::builder().api_key(key);
        if let Some(url) = lookup(BASE_URL_ENV) {
            builder = builder.base_url(url);
        }
        builder.build()
    }

    /// Poll cap actually enforced: the explicit value, or one more than the
    /// number of intervals that fit in the timeout.
    pub fn effective_max_polls(&self) -> u32 {
        self.max_poll_attempts.unwrap_or_else(|| {
            let interval = self.poll_interval.as_millis().max(1);
            let fits = self.job_timeout.as_millis().div_ceil(interval);
            u32::try_from(fits).unwrap_or(u32::MAX).saturating_add(1)
        })
    }

    /// Absolute URL for an API path such as `/jobs`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientConfigBuilder").field(&self.config).finish()
    }
}

impl ClientConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = ApiKey::new(key);
        self
    }

    /// Share an existing key handle, so rotating it affects this config too.
    pub fn api_key_handle(mut self, key: ApiKey) -> Self {
        self.config.api_key = key;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.config.job_timeout = timeout;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = Some(n.max(1));
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn upload_concurrency(mut self, n: usize) -> Self {
        self.config.upload_concurrency = n.max(1);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn capture_wait_until(mut self, condition: impl Into<String>) -> Self {
        self.config.capture_wait_until = condition.into();
        self
    }

    pub fn observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ConvertError> {
        let c = &self.config;
        if c.api_key.get().trim().is_empty() {
            return Err(ConvertError::InvalidConfig("API key must not be empty".into()));
        }
        match reqwest::Url::parse(&c.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConvertError::InvalidUrl {
                    url: c.base_url.clone(),
                })
            }
        }
        if c.poll_interval.is_zero() {
            return Err(ConvertError::InvalidConfig("poll interval must be > 0".into()));
        }
        if c.job_timeout.is_zero() {
            return Err(ConvertError::InvalidConfig("job timeout must be > 0".into()));
        }
        if c.request_timeout.is_zero() {
            return Err(ConvertError::InvalidConfig("request timeout must be > 0".into()));
        }
        if c.upload_concurrency == 0 {
            return Err(ConvertError::InvalidConfig("upload concurrency must be >= 1".into()));
        }
        Ok(self.config)
    }
}
