//! Stderr logger for machine diagnostics.
//!
//! The runtime reports faults through the `log` facade; this is the sink
//! the command-line host installs. Warnings are yellow, errors red, and
//! each line is tagged with its level.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut stderr = StandardStream::stderr(ColorChoice::Auto);
        let _ = stderr.set_color(&level_color(record.level()));
        let _ = write!(stderr, "[{:5}] ", record.level());
        let _ = stderr.reset();
        let _ = writeln!(stderr, "{}", record.args());
    }

    fn flush(&self) {}
}

fn level_color(level: Level) -> ColorSpec {
    let mut spec = ColorSpec::new();
    match level {
        Level::Error => {
            spec.set_fg(Some(Color::Red)).set_bold(true);
        }
        Level::Warn => {
            spec.set_fg(Some(Color::Yellow)).set_bold(true);
        }
        Level::Info => {
            spec.set_fg(Some(Color::Green));
        }
        Level::Debug | Level::Trace => {
            spec.set_dimmed(true);
        }
    }
    spec
}

/// Pick the level filter for the `--verbose` / `--quiet` flags.
pub fn level_for(verbose: bool, quiet: bool) -> LevelFilter {
    match (verbose, quiet) {
        (_, true) => LevelFilter::Error,
        (true, false) => LevelFilter::Trace,
        (false, false) => LevelFilter::Warn,
    }
}

/// Install the stderr logger. Fails if a logger is already set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
