//! Error handling for the application

use std::backtrace::Backtrace;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Price-source transport errors. All of them are retried by the fetcher.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Price string normalization errors. Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Empty price string")]
    Empty,

    #[error("Invalid price format: '{0}'")]
    InvalidFormat(String),

    #[error("Negative price: '{0}'")]
    Negative(String),
}

/// Webhook delivery errors. Logged and dropped by the notifier.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook responded with status {0}")]
    Status(u16),
}

/// Change log errors
#[derive(Error, Debug)]
pub enum ChangeLogError {
    #[error("Log directory {} exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Log file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No items configured")]
    NoItems,

    #[error("Duplicate item name: {0}")]
    DuplicateItem(String),

    #[error("Item '{0}' has an empty url")]
    EmptyUrl(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Stack captured at the point where a monitor failure happened
pub struct Trace(Backtrace);

impl Trace {
    pub fn capture() -> Self {
        Self(Backtrace::force_capture())
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Trace")
    }
}

/// Errors escaping a monitoring run
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Change log error: {source}")]
    ChangeLog {
        #[source]
        source: ChangeLogError,
        trace: Trace,
    },

    #[error("Monitor task panicked: {message}")]
    Panic { message: String, trace: Option<String> },

    #[error("Monitor task aborted")]
    Aborted,
}

impl From<ChangeLogError> for MonitorError {
    fn from(source: ChangeLogError) -> Self {
        MonitorError::ChangeLog {
            source,
            trace: Trace::capture(),
        }
    }
}

impl MonitorError {
    /// Fatal errors cannot be fixed by restarting the monitor. They are
    /// reported under their own headline, restarts still happen.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::ChangeLog {
                source: ChangeLogError::NotADirectory(_),
                ..
            }
        )
    }

    /// Short name of the failure, used as the headline of crash reports.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::ChangeLog {
                source: ChangeLogError::NotADirectory(_),
                ..
            } => "ConfigurationError",
            MonitorError::ChangeLog {
                source: ChangeLogError::Io { .. },
                ..
            } => "IoError",
            MonitorError::Panic { .. } => "Panic",
            MonitorError::Aborted => "Aborted",
        }
    }

    /// Where the failure happened, if known
    pub fn trace(&self) -> Option<String> {
        match self {
            MonitorError::ChangeLog { trace, .. } => Some(trace.to_string()),
            MonitorError::Panic { trace, .. } => trace.clone(),
            MonitorError::Aborted => None,
        }
    }
}
