//! Shared test utilities: an in-memory pty writer and a session harness.

#![allow(dead_code, unused_imports)]

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use simbridge::error::SimError;
use simbridge::session::{CommandOptions, CommandReply, SessionCore, SessionFlags};

pub const PROMPT: &str = "sim> ";

/// Captures everything the dispatcher writes to the "process".
#[derive(Clone, Default)]
pub struct MemWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemWriter {
    /// Everything written so far.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Drain and return everything written since the last call.
    pub fn take(&self) -> String {
        let mut buffer = self.buffer.lock();
        let drained = String::from_utf8_lossy(&buffer).into_owned();
        buffer.clear();
        drained
    }
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Harness {
    pub writer: MemWriter,
    pub core: SessionCore<MemWriter>,
    pub flags: Arc<SessionFlags>,
    pub ready: oneshot::Receiver<()>,
}

/// Session in its `Starting` state, no prompt seen yet.
pub fn starting_session() -> Harness {
    let writer = MemWriter::default();
    let flags = Arc::new(SessionFlags::new());
    let (ready_tx, ready_rx) = oneshot::channel();
    let core = SessionCore::new(writer.clone(), PROMPT, Arc::clone(&flags), ready_tx);
    Harness {
        writer,
        core,
        flags,
        ready: ready_rx,
    }
}

/// Session past its readiness handshake, idle at a prompt, with the banner
/// already drained from the writer's point of view.
pub fn ready_session() -> Harness {
    let mut harness = starting_session();
    harness.core.on_output("Historic Computer Simulator V4.0\r\nsim> ");
    harness
}

/// Enqueue a command, returning its reply receiver.
pub fn submit(
    core: &mut SessionCore<MemWriter>,
    text: &str,
    opts: CommandOptions,
) -> oneshot::Receiver<Result<String, SimError>> {
    let (tx, rx) = oneshot::channel();
    core.submit(text.to_string(), opts, tx);
    rx
}

/// Send an escape, returning its reply receiver.
pub fn send_escape(
    core: &mut SessionCore<MemWriter>,
) -> oneshot::Receiver<Result<String, SimError>> {
    let (tx, rx) = oneshot::channel();
    core.escape(tx);
    rx
}

/// Read a resolved reply; panics when the reply is still pending.
pub fn resolved(
    rx: &mut oneshot::Receiver<Result<String, SimError>>,
) -> Result<String, SimError> {
    rx.try_recv().expect("reply should be resolved")
}

/// True when the reply has not resolved yet.
pub fn pending(rx: &mut oneshot::Receiver<Result<String, SimError>>) -> bool {
    rx.try_recv().is_err()
}
