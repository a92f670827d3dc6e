//! Simulator process spawn over a pseudo-terminal.
//!
//! The simulator talks through a real pty so it behaves as it would under a
//! human operator (prompting, echo). Two OS threads bridge the blocking pty
//! side into the actor's event channel: a reader forwarding raw chunks and a
//! waiter forwarding the exit code.

use std::io::{Read, Write};
use std::thread;

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::SimError;
use crate::session::SessionMsg;

/// Handles to a live simulator process. The master half must be kept alive
/// for the session's lifetime or the pty closes under the child.
pub struct SimulatorProcess {
    pub writer: Box<dyn Write + Send>,
    pub killer: Box<dyn ChildKiller + Send + Sync>,
    pub master: Box<dyn MasterPty + Send>,
}

/// Spawn the simulator and wire its output and exit into `events`.
pub fn spawn_simulator(
    command: &str,
    args: &[String],
    events: UnboundedSender<SessionMsg>,
) -> Result<SimulatorProcess, SimError> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| SimError::Spawn(e.to_string()))?;

    let mut cmd = CommandBuilder::new(command);
    cmd.args(args);
    cmd.env("TERM", "dumb");

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| SimError::Spawn(e.to_string()))?;
    drop(pair.slave);

    let killer = child.clone_killer();
    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| SimError::Spawn(e.to_string()))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| SimError::Spawn(e.to_string()))?;

    tracing::info!(%command, "simulator spawned");

    let reader_events = events.clone();
    thread::spawn(move || {
        let mut reader = reader;
        let mut buffer = [0u8; 8192];
        loop {
            let count = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => count,
                Err(_) => break,
            };
            let chunk = String::from_utf8_lossy(&buffer[..count]).into_owned();
            if reader_events.send(SessionMsg::Output(chunk)).is_err() {
                break;
            }
        }
    });

    thread::spawn(move || {
        let code = child
            .wait()
            .map(|status| status.exit_code() as i32)
            .unwrap_or(-1);
        tracing::info!(code, "simulator exited");
        let _ = events.send(SessionMsg::Exited(code));
    });

    Ok(SimulatorProcess {
        writer,
        killer,
        master: pair.master,
    })
}
