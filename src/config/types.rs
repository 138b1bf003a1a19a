use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Fetch, gate and backoff behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Catalog listing URL; pages are requested as `{base-url}?page={n}`
    pub base_url: String,

    /// Maximum number of simultaneous in-flight page fetches
    pub max_concurrent_requests: u32,

    /// Cooldown applied to the whole fleet after a blocking response (milliseconds)
    pub cooldown_ms: u64,

    /// Longest cooldown a server's `Retry-After` may request (milliseconds)
    pub max_cooldown_ms: u64,

    /// Lower bound of the randomized pre-request delay (milliseconds)
    pub jitter_min_ms: u64,

    /// Upper bound of the randomized pre-request delay (milliseconds)
    pub jitter_max_ms: u64,

    /// First retry delay after a transient failure (milliseconds)
    pub transport_retry_delay_ms: u64,

    /// Ceiling for the exponential transient retry delay (milliseconds)
    pub transport_retry_max_ms: u64,

    /// Consecutive transient failures on one page before a full cooldown
    pub escalate_after: u32,

    /// Whole-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Ceiling on the page count read from page 1
    pub max_pages: u32,

    /// Datasets per catalog page, used only for the progress estimate
    pub nominal_page_size: u32,

    /// Emit a progress line every N completed pages
    pub progress_every: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://catalog.data.gov/dataset".to_string(),
            max_concurrent_requests: 10,
            cooldown_ms: 80_000,
            max_cooldown_ms: 600_000,
            jitter_min_ms: 200,
            jitter_max_ms: 800,
            transport_retry_delay_ms: 1_000,
            transport_retry_max_ms: 30_000,
            escalate_after: 3,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_pages: 100_000,
            nominal_page_size: 20,
            progress_every: 10,
        }
    }
}

impl CrawlerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn max_cooldown(&self) -> Duration {
        Duration::from_millis(self.max_cooldown_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// How outbound client identities are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityStrategy {
    /// A freshly generated browser-like identity on every rotation
    Browser,
    /// Always the configured user agent
    Fixed,
}

/// Client identity configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IdentityConfig {
    pub strategy: IdentityStrategy,

    /// User agent sent by the `fixed` strategy
    pub user_agent: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            strategy: IdentityStrategy::Browser,
            user_agent: "catalog-harvest/1.0".to_string(),
        }
    }
}

/// Snapshot file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Json,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// Path of the JSON file or SQLite database
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            path: "datasets.json".to_string(),
        }
    }
}
