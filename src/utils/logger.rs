use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::sync::Once;
use std::sync::OnceLock;

// Process-wide log file, shared by every partition worker
static LOGGER: OnceLock<Mutex<Option<File>>> = OnceLock::new();
static INIT: Once = Once::new();
static DEBUG: AtomicBool = AtomicBool::new(false);

const LOG_FILE_NAME: &str = "dxtrace.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

pub struct Logger;

impl Logger {
    /// Open `<output_dir>/dxtrace.log`. Only the first call has an effect; if the
    /// file cannot be opened, logging continues on the console only.
    pub fn init(output_dir: &Path) {
        INIT.call_once(|| {
            if !output_dir.exists() {
                if let Err(e) = fs::create_dir_all(output_dir) {
                    eprintln!("Cannot create log directory {}: {e}", output_dir.display());
                    LOGGER.get_or_init(|| Mutex::new(None));
                    return;
                }
            }

            let log_path = output_dir.join(LOG_FILE_NAME);
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&log_path);

            match file {
                Ok(file) => {
                    println!("Writing log to '{}'", log_path.display());
                    LOGGER.get_or_init(|| Mutex::new(Some(file)));
                }
                Err(e) => {
                    eprintln!("Cannot open log file: {e}");
                    LOGGER.get_or_init(|| Mutex::new(None));
                }
            }
        });
    }

    pub fn set_debug(enabled: bool) {
        DEBUG.store(enabled, Ordering::Relaxed);
    }

    pub fn is_debug() -> bool {
        DEBUG.load(Ordering::Relaxed)
    }

    pub fn log_at(level: Level, message: &str) {
        if level == Level::Debug && !Self::is_debug() {
            return;
        }

        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        match level {
            Level::Error | Level::Warning => eprintln!("{stamp} {} - {message}", level.as_str()),
            _ => println!("{stamp} {} - {message}", level.as_str()),
        }

        if let Some(logger) = LOGGER.get() {
            if let Ok(mut file_guard) = logger.lock() {
                if let Some(file) = file_guard.as_mut() {
                    if let Err(e) = writeln!(file, "{stamp} {} - {message}", level.as_str()) {
                        eprintln!("Failed to write log file: {e}");
                    }
                }
            }
        }
    }

    pub fn log(message: &str) {
        Self::log_at(Level::Info, message);
    }

    pub fn log_warning(message: &str) {
        Self::log_at(Level::Warning, message);
    }

    pub fn log_error(message: &str) {
        Self::log_at(Level::Error, message);
    }

    pub fn log_debug(message: &str) {
        Self::log_at(Level::Debug, message);
    }

    pub fn flush() -> std::io::Result<()> {
        if let Some(logger) = LOGGER.get() {
            if let Ok(mut file_guard) = logger.lock() {
                if let Some(file) = file_guard.as_mut() {
                    file.flush()?;
                }
            }
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::utils::Logger::log(&message);
    }};
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::utils::Logger::log_warning(&message);
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::utils::Logger::log_error(&message);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        if $crate::utils::Logger::is_debug() {
            let message = format!($($arg)*);
            $crate::utils::Logger::log_debug(&message);
        }
    }};
}
