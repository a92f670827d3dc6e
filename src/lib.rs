//! simbridge: drives a terminal-based computer simulator through a
//! pseudo-terminal and exposes its console, registers, and breakpoints to
//! HTTP consumers.
//!
//! The interesting part is the session protocol in [`session`]: one ordered
//! character stream is turned into a request/response channel with prompt
//! framing, a single-writer command queue, and an out-of-band interrupt path.
//! [`console`] fans the same raw stream out to any number of live subscribers.

pub mod config;
pub mod console;
pub mod error;
pub mod framer;
pub mod logging;
pub mod parse;
pub mod server;
pub mod session;
pub mod shutdown;
