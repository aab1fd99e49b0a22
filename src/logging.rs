/// Structured logging for the RVI forecasting service
///
/// Provides context-rich logging with a data-source tag and optional area
/// name on every event. Events go through `tracing`; `init_logger` installs a
/// console subscriber and, optionally, an append-mode log file.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    EarthEngine,
    Model,
    Chart,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::EarthEngine => write!(f, "EE"),
            DataSource::Model => write!(f, "MODEL"),
            DataSource::Chart => write!(f, "CHART"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - quota exhaustion or an AOI with no coverage
    Expected,
    /// Unexpected failure - bad credentials, service errors, or API changes
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber Setup
// ---------------------------------------------------------------------------

/// Installs the global subscriber. `RUST_LOG`, when set, takes precedence
/// over `min_level`. Calling this more than once is harmless; later calls
/// are ignored.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_filter()));

    let file = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path, e);
                None
            }
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(file.is_none());

    let result = match (file, console_timestamps) {
        (Some(file), true) => builder
            .with_writer(std::io::stderr.and(Mutex::new(file)))
            .try_init(),
        (Some(file), false) => builder
            .without_time()
            .with_writer(std::io::stderr.and(Mutex::new(file)))
            .try_init(),
        (None, true) => builder.with_writer(std::io::stderr).try_init(),
        (None, false) => builder.without_time().with_writer(std::io::stderr).try_init(),
    };
    // A subscriber may already be installed (tests, embedding).
    let _ = result;
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: DataSource, area: Option<&str>, message: &str) {
    tracing::info!(source = %source, area = area.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(source: DataSource, area: Option<&str>, message: &str) {
    tracing::warn!(source = %source, area = area.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(source: DataSource, area: Option<&str>, message: &str) {
    tracing::error!(source = %source, area = area.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(source: DataSource, area: Option<&str>, message: &str) {
    tracing::debug!(source = %source, area = area.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an Earth Engine failure from its error text.
pub fn classify_ee_failure(error_message: &str) -> FailureType {
    // Quota and rate limits clear on their own
    if error_message.contains("HTTP error: 429") || error_message.contains("RESOURCE_EXHAUSTED") {
        FailureType::Expected
    }
    // Credentials or project problems need operator attention
    else if error_message.contains("HTTP error: 401")
        || error_message.contains("HTTP error: 403")
        || error_message.contains("Missing credentials")
    {
        FailureType::Unexpected
    }
    // Server errors and unparseable payloads
    else if error_message.contains("HTTP error: 5") || error_message.contains("Parse error") {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log an Earth Engine failure with automatic classification
pub fn log_ee_failure(area: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_ee_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => warn(DataSource::EarthEngine, Some(area), &message),
        FailureType::Unexpected => error(DataSource::EarthEngine, Some(area), &message),
        FailureType::Unknown => warn(DataSource::EarthEngine, Some(area), &message),
    }
}

// ---------------------------------------------------------------------------
// Fetch Summary Logging
// ---------------------------------------------------------------------------

/// Log how many fetched scenes carried a usable RVI value
pub fn log_fetch_summary(area: &str, total: usize, usable: usize) {
    let missing = total - usable.min(total);
    let message = format!(
        "Fetch complete: {}/{} scenes usable, {} without a value",
        usable, total, missing
    );

    if total == 0 {
        warn(DataSource::EarthEngine, Some(area), "Fetch complete: no scenes matched the query");
    } else if usable < 2 {
        error(DataSource::EarthEngine, Some(area), &message);
    } else if missing > 0 {
        warn(DataSource::EarthEngine, Some(area), &message);
    } else {
        info(DataSource::EarthEngine, Some(area), &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            classify_ee_failure("HTTP error: 429: Too many concurrent aggregations (RESOURCE_EXHAUSTED)"),
            FailureType::Expected
        );
        assert_eq!(
            classify_ee_failure("HTTP error: 403: Permission denied (PERMISSION_DENIED)"),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_ee_failure("Missing credentials: EE_ACCESS_TOKEN is not set"),
            FailureType::Unexpected
        );
        assert_eq!(classify_ee_failure("HTTP error: 503: unavailable"), FailureType::Unexpected);
        assert_eq!(
            classify_ee_failure("Request failed: operation timed out"),
            FailureType::Unknown
        );
    }

    #[test]
    fn test_init_logger_twice_does_not_panic() {
        init_logger(LogLevel::Debug, None, false);
        init_logger(LogLevel::Info, None, true);
        info(DataSource::System, None, "logger initialised");
        log_fetch_summary("paddy", 10, 8);
    }
}
