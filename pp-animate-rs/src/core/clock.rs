//! Elapsed-time logging.

use std::fmt::Display;
use std::time::{Duration, Instant};

use log::info;

/// Logger that prefixes messages with the seconds since it was started.
///
/// Construct one per run and pass it to whatever needs to report progress.
#[derive(Debug, Clone, Copy)]
pub struct ElapsedLog {
    start: Instant,
}

impl ElapsedLog {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Format `msg` as `"{secs:7.1} -- {msg}"`.
    pub fn format<M: Display>(&self, msg: M) -> String {
        format!("{:7.1} -- {}", self.elapsed().as_secs_f64(), msg)
    }

    pub fn log<M: Display>(&self, msg: M) {
        info!("{}", self.format(msg));
    }
}

impl Default for ElapsedLog {
    fn default() -> Self {
        Self::start()
    }
}
