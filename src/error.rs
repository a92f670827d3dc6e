//! Error taxonomy for the simulator session.
//!
//! Dispatcher and parser errors reject only the issuing caller; process exit
//! rejects every outstanding command uniformly. Nothing here retries.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the session service and its parsers.
#[derive(Debug, Error)]
pub enum SimError {
    /// No simulator process is active.
    #[error("simulator is not running")]
    NotRunning,

    /// The simulator never printed its first prompt.
    #[error("no prompt from simulator within {0:?}")]
    StartupTimeout(Duration),

    /// A graceful quit did not terminate the process within the grace period.
    /// The process has been force-killed by the time this is returned.
    #[error("simulator did not exit within {0:?}; killed")]
    QuitTimeout(Duration),

    /// The simulator process terminated; used to reject all outstanding work.
    #[error("simulator process exited")]
    ProcessExited,

    /// A response line had key/value shape but could not be used.
    #[error("malformed response line: {0}")]
    Parse(String),

    /// The simulator answered with its own error text instead of data
    /// (e.g. "Simulation stopped" banners, "no such register").
    #[error("{0}")]
    Emulator(String),

    /// An escape is already awaiting its response window.
    #[error("an escape is already pending")]
    EscapePending,

    /// The simulator executable could not be started.
    #[error("failed to spawn simulator: {0}")]
    Spawn(String),

    /// Writing to or reading from the pseudo-terminal failed.
    #[error("simulator i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
