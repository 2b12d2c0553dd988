//! Stderr logger for tests and host binaries.
//!
//! Library code only emits through the `log` facade; installing a logger is
//! the host's choice. This one prefixes every line with the time elapsed
//! since installation and the record target, enough to spot slow pipeline
//! stages.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

struct ElapsedLogger {
    filter: LevelFilter,
    started: Instant,
}

impl Log for ElapsedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            std::io::stderr(),
            "{elapsed:7.3}s {level:5} {target}: {args}",
            elapsed = self.started.elapsed().as_secs_f64(),
            level = record.level(),
            target = record.target(),
            args = record.args(),
        );
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<ElapsedLogger> = OnceLock::new();
static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Install the elapsed-time stderr logger at `level`.
///
/// Safe to call from concurrent tests: the first call installs, later calls
/// are no-ops. Returns whether this logger drives the `log` facade (false
/// when some other logger was installed first).
pub fn init_with_level(level: LevelFilter) -> bool {
    let logger = LOGGER.get_or_init(|| ElapsedLogger {
        filter: level,
        started: Instant::now(),
    });
    *INSTALLED.get_or_init(|| {
        let ok = log::set_logger(logger).is_ok();
        if ok {
            log::set_max_level(logger.filter);
        }
        ok
    })
}
