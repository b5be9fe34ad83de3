use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "genai_tools=debug,info";

static LOGGERS: OnceLock<Mutex<HashMap<String, Arc<Logger>>>> = OnceLock::new();

/// A named logger. Events go through `tracing` with target `genai_tools`
/// and a `logger` field carrying the name.
#[derive(Debug)]
pub struct Logger {
    name: String,
    level: AtomicU8,
}

impl Logger {
    fn new(name: &str, level: Level) -> Self {
        Self {
            name: name.to_string(),
            level: AtomicU8::new(level_to_u8(level)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Level {
        level_from_u8(self.level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: Level) {
        self.level.store(level_to_u8(level), Ordering::Relaxed);
    }

    /// `tracing` orders levels by verbosity, so TRACE compares greatest.
    pub fn is_enabled_for(&self, level: Level) -> bool {
        level <= self.level()
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        if self.is_enabled_for(Level::TRACE) {
            tracing::trace!(target: "genai_tools", logger = %self.name, "{}", message.as_ref());
        }
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        if self.is_enabled_for(Level::DEBUG) {
            tracing::debug!(target: "genai_tools", logger = %self.name, "{}", message.as_ref());
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        if self.is_enabled_for(Level::INFO) {
            tracing::info!(target: "genai_tools", logger = %self.name, "{}", message.as_ref());
        }
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        if self.is_enabled_for(Level::WARN) {
            tracing::warn!(target: "genai_tools", logger = %self.name, "{}", message.as_ref());
        }
    }

    pub fn error(&self, message: impl AsRef<str>) {
        if self.is_enabled_for(Level::ERROR) {
            tracing::error!(target: "genai_tools", logger = %self.name, "{}", message.as_ref());
        }
    }
}

/// Returns the process-wide logger called `name` with its level set to DEBUG.
/// Installs a default subscriber unless one is already set.
pub fn get_logger(name: &str) -> Arc<Logger> {
    get_logger_with_level(name, Level::DEBUG)
}

/// Returns the shared logger called `name` and sets its level, which every
/// holder of that logger observes.
pub fn get_logger_with_level(name: &str, level: Level) -> Arc<Logger> {
    install_default_subscriber();

    let registry = LOGGERS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut loggers = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let logger = loggers
        .entry(name.to_string())
        .or_insert_with(|| Arc::new(Logger::new(name, level)))
        .clone();
    logger.set_level(level);
    logger
}

/// Accepts `tracing` level names plus `warning` and `critical`.
pub fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(Level::WARN),
        "critical" | "fatal" => Some(Level::ERROR),
        other => Level::from_str(other).ok(),
    }
}

fn install_default_subscriber() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // Another subscriber may already be installed by the host binary.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .try_init();
    });
}

/// `RUST_LOG` wins when set; otherwise only this crate's events at `level` and above.
fn cli_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(level)))
}

fn filter_directive(level: Level) -> String {
    format!("genai_tools={}", level.as_str().to_ascii_lowercase())
}

pub fn init_cli_logger(level: Level) {
    let _ = tracing_subscriber::registry()
        .with(cli_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

pub fn init_json_logger(level: Level) {
    let _ = tracing_subscriber::registry()
        .with(cli_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .try_init();
}

fn level_to_u8(level: Level) -> u8 {
    match level {
        Level::ERROR => 1,
        Level::WARN => 2,
        Level::INFO => 3,
        Level::DEBUG => 4,
        Level::TRACE => 5,
    }
}

fn level_from_u8(value: u8) -> Level {
    match value {
        1 => Level::ERROR,
        2 => Level::WARN,
        3 => Level::INFO,
        4 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_returns_same_logger() {
        let a = get_logger("logger-test-identity");
        let b = get_logger("logger-test-identity");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "logger-test-identity");
        assert_eq!(a.level(), Level::DEBUG);
    }

    #[test]
    fn test_set_level_is_shared() {
        let a = get_logger("logger-test-level");
        let b = get_logger_with_level("logger-test-level", Level::WARN);
        assert_eq!(a.level(), Level::WARN);
        assert!(b.is_enabled_for(Level::ERROR));
        assert!(!a.is_enabled_for(Level::INFO));
        a.info("dropped");
        b.warning("kept");
    }

    #[test]
    fn test_get_logger_resets_level_to_debug() {
        let quiet = get_logger_with_level("logger-test-reset", Level::ERROR);
        assert_eq!(quiet.level(), Level::ERROR);

        let again = get_logger("logger-test-reset");
        assert!(Arc::ptr_eq(&quiet, &again));
        assert_eq!(quiet.level(), Level::DEBUG);
    }

    #[test]
    fn test_filter_directive_follows_level() {
        assert_eq!(filter_directive(Level::WARN), "genai_tools=warn");
        assert_eq!(filter_directive(Level::TRACE), "genai_tools=trace");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level("warning"), Some(Level::WARN));
        assert_eq!(parse_level("Critical"), Some(Level::ERROR));
        assert_eq!(parse_level("loud"), None);
    }
}
