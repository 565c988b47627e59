use std::io::{IsTerminal, Write};
use std::time::Instant;

use anstyle::{Reset, Style};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use parking_lot::Mutex;

use crate::theme;

struct PyfabLogger {
    file: Option<Mutex<std::fs::File>>,
    filter: LevelFilter,
    color: bool,
    start: Instant,
}

impl Log for PyfabLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let tag = format!("{:<5}", record.level());
        if self.color {
            let style = level_style(record.level());
            eprintln!("{style}{tag}{Reset} {}", record.args());
        } else {
            eprintln!("{tag} {}", record.args());
        }

        if let Some(ref file) = self.file {
            let elapsed = self.start.elapsed().as_secs_f64();
            let _ = writeln!(
                file.lock(),
                "[{elapsed:.3}s] [{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Pick the level filter: `debug` wins, then `RUST_LOG`, then `Info`.
#[must_use]
pub fn level_filter(debug: bool) -> LevelFilter {
    if debug {
        return LevelFilter::Debug;
    }
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Initialize the global logger.
///
/// # Errors
///
/// Returns `SetLoggerError` if a logger was already installed.
pub fn init(debug: bool, log_file: Option<std::fs::File>) -> Result<(), SetLoggerError> {
    let filter = level_filter(debug);
    let logger = PyfabLogger {
        file: log_file.map(Mutex::new),
        filter,
        color: std::io::stderr().is_terminal(),
        start: Instant::now(),
    };

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(filter);
    Ok(())
}

/// Map a log level to its terminal style.
#[must_use]
pub fn level_style(level: Level) -> Style {
    match level {
        Level::Error => theme::ERROR,
        Level::Warn => theme::WARN,
        Level::Info => theme::INFO,
        Level::Debug | Level::Trace => theme::DEBUG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_overrides_env() {
        assert_eq!(level_filter(true), LevelFilter::Debug);
    }
}
