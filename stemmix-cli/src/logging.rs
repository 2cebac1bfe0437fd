//! In-memory logger feeding the TUI log panel.

use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

const LOG_CAPACITY: usize = 500;

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

struct SharedLogger {
    level: LevelFilter,
    buffer: LogBuffer,
    echo_stderr: bool,
}

impl Log for SharedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!("[{}] {}", record.level(), record.args());
        if self.echo_stderr {
            eprintln!("{}", line);
        }

        push_line(&self.buffer, line);
    }

    fn flush(&self) {}
}

static LOG_BUFFER: OnceLock<LogBuffer> = OnceLock::new();
static LOGGER: OnceLock<SharedLogger> = OnceLock::new();

fn push_line(buffer: &LogBuffer, line: String) {
    let mut buffer = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if buffer.len() >= LOG_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(line);
}

fn level_from_env(value: Option<&str>) -> LevelFilter {
    match value.map(|level| level.to_lowercase()) {
        Some(level) => match level.as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Info,
        },
        None => LevelFilter::Info,
    }
}

/// Install the ring-buffer logger and return its buffer.
///
/// `RUST_LOG` picks the level (info by default). `STEMMIX_LOG_STDERR=1`
/// also echoes every line to stderr.
pub fn init() -> LogBuffer {
    let buffer = LOG_BUFFER
        .get_or_init(|| Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CAPACITY))))
        .clone();

    let level = level_from_env(std::env::var("RUST_LOG").ok().as_deref());

    let echo_stderr = std::env::var("STEMMIX_LOG_STDERR")
        .map(|value| value != "0")
        .unwrap_or(false);

    let logger_ref = LOGGER.get_or_init(|| SharedLogger {
        level,
        buffer: buffer.clone(),
        echo_stderr,
    });
    if log::set_logger(logger_ref).is_ok() {
        log::set_max_level(level);
    }

    buffer
}

pub fn snapshot(buffer: &LogBuffer) -> Vec<String> {
    buffer
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .iter()
        .cloned()
        .collect()
}
