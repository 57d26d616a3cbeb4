use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for a crawl run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seed URL the traversal starts from
    pub url: String,

    /// Initial depth ceiling (the seed is depth 0)
    pub max_depth: u64,

    /// Number of successful pages after which the run stops
    pub max_results: u64,

    /// Number of failed fetches after which the run stops
    pub max_errors: u64,

    /// Run deadline in seconds
    pub timeout: u64,

    /// Amount added to the depth ceiling on every depth-increase trigger
    #[serde(default = "default_delta")]
    pub delta: u64,

    /// Output destination; stdout when absent or empty
    #[serde(default)]
    pub output: Option<String>,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Number of traversal workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the shared work queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds; falls back to `timeout`
    #[serde(default)]
    pub request_timeout: Option<u64>,
}

impl Config {
    /// Creates a configuration with the required fields and defaults for the rest
    pub fn new(
        url: impl Into<String>,
        max_depth: u64,
        max_results: u64,
        max_errors: u64,
        timeout: u64,
    ) -> Self {
        Self {
            url: url.into(),
            max_depth,
            max_results,
            max_errors,
            timeout,
            delta: default_delta(),
            output: None,
            format: OutputFormat::default(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            user_agent: default_user_agent(),
            request_timeout: None,
        }
    }

    /// The overall run deadline
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// The timeout applied to each HTTP request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.unwrap_or(self.timeout))
    }

    /// The output path, if one is configured
    pub fn output_path(&self) -> Option<&str> {
        self.output.as_deref().filter(|path| !path.is_empty())
    }
}

/// Format of the result records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `URL,Title` rows
    #[default]
    Csv,

    /// Rows in a SQLite database
    Sqlite,
}

fn default_delta() -> u64 {
    1
}

fn default_workers() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_user_agent() -> String {
    format!("sounding/{}", env!("CARGO_PKG_VERSION"))
}
