/// Structured logging for the hazard monitoring service
///
/// Provides context-rich logging with data-source and station identifiers,
/// timestamps, and severity levels. The `Logger` here is installed as the
/// backend of the `log` facade, so `log::info!` and friends from anywhere in
/// the crate (or its dependencies) end up in the same console/file sinks.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

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

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warning,
            log::Level::Info => LogLevel::Info,
            log::Level::Debug | log::Level::Trace => LogLevel::Debug,
        }
    }
}

impl LogLevel {
    fn as_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Frost,
    Pipeline,
    Cache,
    Export,
    System,
}

impl DataSource {
    /// `log` target used for records from this source.
    pub fn target(self) -> &'static str {
        match self {
            DataSource::Frost => "hazmon::frost",
            DataSource::Pipeline => "hazmon::pipeline",
            DataSource::Cache => "hazmon::cache",
            DataSource::Export => "hazmon::export",
            DataSource::System => "hazmon::system",
        }
    }

    pub fn from_target(target: &str) -> Option<DataSource> {
        [
            DataSource::Frost,
            DataSource::Pipeline,
            DataSource::Cache,
            DataSource::Export,
            DataSource::System,
        ]
        .into_iter()
        .find(|s| s.target() == target)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Frost => write!(f, "FROST"),
            DataSource::Pipeline => write!(f, "PIPE"),
            DataSource::Cache => write!(f, "CACHE"),
            DataSource::Export => write!(f, "EXPORT"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. the requested range is invalid
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
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
// Logger
// ---------------------------------------------------------------------------

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
    /// Serializes appends to the log file
    file_lock: Mutex<()>,
}

impl Logger {
    pub fn new(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) -> Self {
        Logger {
            min_level,
            log_file,
            console_timestamps,
            file_lock: Mutex::new(()),
        }
    }

    /// Format a file/console line: `<timestamp> <LEVEL> <SOURCE> <message>`.
    pub fn format_entry(timestamp: &str, level: LogLevel, target: &str, message: &str) -> String {
        let source = DataSource::from_target(target)
            .map(|s| s.to_string())
            .unwrap_or_else(|| target.to_string());
        format!("{} {} {} {}", timestamp, level, source, message)
    }

    fn write_console(&self, level: LogLevel, log_entry: &str, message: &str) {
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}", message),
                LogLevel::Warning => eprintln!("   ⚠ {}", message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        LogLevel::from(metadata.level()) >= self.min_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = LogLevel::from(record.level());
        let message = record.args().to_string();
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let log_entry = Logger::format_entry(&timestamp, level, record.target(), &message);

        self.write_console(level, &log_entry, &message);

        if let Some(ref path) = self.log_file {
            let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn flush(&self) {}
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Install the global logger. Only the first call takes effect.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let logger = Logger::new(min_level, log_file.map(String::from), console_timestamps);
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(min_level.as_filter());
    }
}

fn with_station(station_id: Option<&str>, message: &str) -> String {
    match station_id {
        Some(id) => format!("[{}] {}", id, message),
        None => message.to_string(),
    }
}

/// Log a general informational message
pub fn info(source: DataSource, station_id: Option<&str>, message: &str) {
    log::info!(target: source.target(), "{}", with_station(station_id, message));
}

/// Log a warning message
pub fn warn(source: DataSource, station_id: Option<&str>, message: &str) {
    log::warn!(target: source.target(), "{}", with_station(station_id, message));
}

/// Log an error message
pub fn error(source: DataSource, station_id: Option<&str>, message: &str) {
    log::error!(target: source.target(), "{}", with_station(station_id, message));
}

/// Log a debug message
pub fn debug(source: DataSource, station_id: Option<&str>, message: &str) {
    log::debug!(target: source.target(), "{}", with_station(station_id, message));
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a Frost fetch failure from its error message
pub fn classify_frost_failure(error_message: &str) -> FailureType {
    if error_message.starts_with("Invalid time range") {
        // caller asked for something impossible; the service is fine
        FailureType::Expected
    } else if error_message.contains("HTTP error")
        || error_message.contains("Network error")
        || error_message.contains("Parse error")
    {
        FailureType::Unexpected
    } else {
        // "No data available" - station offline or element not reported
        FailureType::Unknown
    }
}

/// Log a Frost failure with automatic classification
pub fn log_frost_failure(station_id: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_frost_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(DataSource::Frost, Some(station_id), &message),
        FailureType::Unexpected => error(DataSource::Frost, Some(station_id), &message),
        FailureType::Unknown => warn(DataSource::Frost, Some(station_id), &message),
    }
}

// ---------------------------------------------------------------------------
// Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a multi-station operation
pub fn log_fetch_summary(source: DataSource, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Fetch complete: {}/{} successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(source, None, &message);
    } else if successful == 0 {
        error(source, None, &message);
    } else {
        warn(source, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WeatherError;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_crate_levels_map_onto_service_levels() {
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Debug);
        assert_eq!(LogLevel::from(log::Level::Warn), LogLevel::Warning);
    }

    #[test]
    fn test_failure_classification() {
        let range = WeatherError::InvalidTimeRange {
            start: "2024-01-02".into(),
            end: "2024-01-01".into(),
        };
        assert_eq!(classify_frost_failure(&range.to_string()), FailureType::Expected);
        assert_eq!(
            classify_frost_failure(&WeatherError::HttpError(500).to_string()),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_frost_failure(&WeatherError::NoDataAvailable("SN46220".into()).to_string()),
            FailureType::Unknown
        );
    }

    #[test]
    fn test_entry_format_names_the_source() {
        let entry = Logger::format_entry(
            "2024-01-01 00:00:00 UTC",
            LogLevel::Warning,
            DataSource::Frost.target(),
            "[SN46220] retrying",
        );
        assert_eq!(entry, "2024-01-01 00:00:00 UTC WARN FROST [SN46220] retrying");
    }

    #[test]
    fn test_foreign_targets_are_printed_verbatim() {
        let entry = Logger::format_entry("t", LogLevel::Info, "reqwest::connect", "dialing");
        assert_eq!(entry, "t INFO reqwest::connect dialing");
    }

    #[test]
    fn test_station_prefix() {
        assert_eq!(with_station(Some("SN46220"), "ok"), "[SN46220] ok");
        assert_eq!(with_station(None, "ok"), "ok");
    }

    #[test]
    fn test_installed_logger_appends_to_file() {
        let path = std::env::temp_dir().join(format!("hazmon_log_{}.log", std::process::id()));
        let path_str = path.to_string_lossy().to_string();

        // the only test in this binary that installs the global logger
        init_logger(LogLevel::Debug, Some(&path_str), false);
        info(DataSource::Cache, Some("SN46220"), "report served from cache");

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(
            written.contains("INFO CACHE [SN46220] report served from cache"),
            "unexpected log file contents: {}",
            written
        );
        std::fs::remove_file(&path).ok();
    }
}
