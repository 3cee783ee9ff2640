//! Startup error types. Anything here aborts the run before a VU is spawned.

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Invalid header {name}: {message}")]
    Header { name: String, message: String },

    #[error("Invalid threshold for {metric}: {source}")]
    Threshold {
        metric: String,
        #[source]
        source: ThresholdParseError,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdParseError {
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("malformed expression '{0}', expected e.g. 'p(95) < 100'")]
    Malformed(String),

    #[error("percentile {0} is outside 0..=100")]
    PercentileOutOfRange(f64),

    #[error("'{stat}' is not available on {metric}")]
    UnsupportedStat { metric: String, stat: String },
}
