/// Structured logging for the flood wave detector
///
/// Provides context-rich logging with pipeline stage and gauge identifiers,
/// timestamps, and severity levels. Supports both console output
/// and file-based logging for long detection runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

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
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Vertices,
    Edges,
    Graph,
    Analysis,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Vertices => write!(f, "VERTICES"),
            Stage::Edges => write!(f, "EDGES"),
            Stage::Graph => write!(f, "GRAPH"),
            Stage::Analysis => write!(f, "ANALYSIS"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, stage: &Stage, gauge: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let gauge_part = gauge.map(|g| format!(" [{}]", g)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, stage, gauge_part, message)
    }

    /// Log a message with the global logger
    fn log(&self, level: LogLevel, stage: &Stage, gauge: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, stage, gauge, message);
        let gauge_part = gauge.map(|g| format!(" [{}]", g)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, gauge_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, gauge_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", stage, gauge_part, message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

fn with_logger(level: LogLevel, stage: Stage, gauge: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, &stage, gauge, message);
        }
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

/// Log a general informational message
pub fn info(stage: Stage, gauge: Option<&str>, message: &str) {
    with_logger(LogLevel::Info, stage, gauge, message);
}

/// Log a warning message
pub fn warn(stage: Stage, gauge: Option<&str>, message: &str) {
    with_logger(LogLevel::Warning, stage, gauge, message);
}

/// Log an error message
pub fn error(stage: Stage, gauge: Option<&str>, message: &str) {
    with_logger(LogLevel::Error, stage, gauge, message);
}

/// Log a debug message
pub fn debug(stage: Stage, gauge: Option<&str>, message: &str) {
    with_logger(LogLevel::Debug, stage, gauge, message);
}

// ---------------------------------------------------------------------------
// Timing and Summaries
// ---------------------------------------------------------------------------

/// Log how long a pipeline operation took.
pub fn log_timing(stage: Stage, operation: &str, elapsed: Duration) {
    let message = format!("{} finished in {:.3}s", operation, elapsed.as_secs_f64());
    debug(stage, None, &message);
}

/// Run `f` and log its wall-clock duration.
pub fn timed<T>(stage: Stage, operation: &str, f: impl FnOnce() -> T) -> T {
    let started = std::time::Instant::now();
    let result = f();
    log_timing(stage, operation, started.elapsed());
    result
}

/// Log a summary of a per-gauge or per-pair pass
pub fn log_run_summary(stage: Stage, total: usize, successful: usize, empty: usize) {
    let message = format!(
        "Pass complete: {}/{} produced data, {} empty",
        successful, total, empty
    );

    if empty == 0 {
        info(stage, None, &message);
    } else if successful == 0 {
        error(stage, None, &message);
    } else {
        warn(stage, None, &message);
    }
}
