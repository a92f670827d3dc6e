//! Command queue, dispatch, and escape handling for a live session.
//!
//! `SessionCore` is the single owner of all protocol state. It is a plain
//! synchronous state machine: the actor task in [`crate::session`] feeds it
//! caller submissions and PTY output in arrival order, so no locking is
//! needed around any of this. At most one command is ever in flight, and the
//! command and escape response windows use separate accumulators so they can
//! never cross-contaminate.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::SimError;
use crate::framer;

/// Out-of-band interrupt byte (ctrl-E) understood by the simulator.
pub const ESCAPE_BYTE: u8 = 0x05;

/// Carriage return terminator appended to dispatched command text.
pub const COMMAND_TERMINATOR: &str = "\r";

/// Per-command dispatch options.
#[derive(Debug, Clone, Copy)]
pub struct CommandOptions {
    /// Append the carriage-return terminator after the command text.
    pub append_terminator: bool,
    /// Wait for a prompt-delimited response window; when false the command
    /// resolves with an empty payload as soon as it is written.
    pub expect_response: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            append_terminator: true,
            expect_response: false,
        }
    }
}

impl CommandOptions {
    /// Options for a command whose response payload the caller wants.
    pub fn with_response() -> Self {
        Self {
            expect_response: true,
            ..Self::default()
        }
    }
}

/// Reply channel carried by every queued command.
pub type CommandReply = oneshot::Sender<Result<String, SimError>>;

struct QueuedCommand {
    text: String,
    opts: CommandOptions,
    reply: CommandReply,
}

/// Session lifecycle. `Starting` ends at the first observed prompt (the
/// readiness handshake); `Stopped` is terminal.
enum Lifecycle {
    Starting,
    Ready,
    Stopped,
}

/// Response-capture context. Command capture and escape capture are separate
/// variants with separate accumulators, so an interrupt's response window
/// cannot be misattributed to a queued command.
enum Capture {
    Idle,
    AwaitingCommand(QueuedCommand),
    AwaitingEscape { reply: CommandReply },
}

/// Cheap cross-thread mirror of the session's observable state, so callers
/// can poll `is_running` / `is_at_prompt` without a round-trip to the actor.
#[derive(Default)]
pub struct SessionFlags {
    running: AtomicBool,
    at_prompt: AtomicBool,
}

impl SessionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_at_prompt(&self) -> bool {
        self.at_prompt.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.at_prompt.store(false, Ordering::SeqCst);
    }
}

/// The session protocol state machine.
pub struct SessionCore<W: Write> {
    writer: W,
    prompt: String,
    lifecycle: Lifecycle,
    capture: Capture,
    at_prompt: bool,
    buffer: String,
    escape_buffer: String,
    queue: VecDeque<QueuedCommand>,
    flags: Arc<SessionFlags>,
    ready: Option<oneshot::Sender<()>>,
}

impl<W: Write> SessionCore<W> {
    /// Build a core for a freshly spawned process. `ready` resolves on the
    /// first observed prompt; it is dropped unresolved if the process exits
    /// first.
    pub fn new(
        writer: W,
        prompt: impl Into<String>,
        flags: Arc<SessionFlags>,
        ready: oneshot::Sender<()>,
    ) -> Self {
        flags.reset();
        Self {
            writer,
            prompt: prompt.into(),
            lifecycle: Lifecycle::Starting,
            capture: Capture::Idle,
            at_prompt: false,
            buffer: String::new(),
            escape_buffer: String::new(),
            queue: VecDeque::new(),
            flags,
            ready: Some(ready),
        }
    }

    /// Enqueue a command. Dispatch happens immediately when the session is
    /// idle at a prompt, otherwise when the current window closes.
    pub fn submit(&mut self, text: String, opts: CommandOptions, reply: CommandReply) {
        if matches!(self.lifecycle, Lifecycle::Stopped) {
            let _ = reply.send(Err(SimError::NotRunning));
            return;
        }

        // Leftover text at an idle prompt belongs to no resolver (an escape
        // banner, asynchronous device chatter). Discard it so the next
        // command's response window starts clean.
        if self.at_prompt && matches!(self.capture, Capture::Idle) && !self.buffer.is_empty() {
            tracing::debug!(bytes = self.buffer.len(), "discarding stale output");
            self.buffer.clear();
        }

        self.queue.push_back(QueuedCommand { text, opts, reply });
        self.pump();
    }

    /// Send the out-of-band interrupt. A command in flight is pushed back to
    /// the head of the queue with its reply channel intact and will be
    /// re-dispatched after the interrupt's own response window completes.
    pub fn escape(&mut self, reply: CommandReply) {
        if matches!(self.lifecycle, Lifecycle::Stopped) {
            let _ = reply.send(Err(SimError::NotRunning));
            return;
        }
        if matches!(self.capture, Capture::AwaitingEscape { .. }) {
            let _ = reply.send(Err(SimError::EscapePending));
            return;
        }

        if let Capture::AwaitingCommand(cmd) =
            std::mem::replace(&mut self.capture, Capture::Idle)
        {
            tracing::debug!(command = %cmd.text, "escape preempts in-flight command");
            self.queue.push_front(cmd);
            self.buffer.clear();
        } else if self.at_prompt {
            // Already idle at a prompt: nothing to interrupt.
            let _ = reply.send(Ok(String::new()));
            return;
        }

        self.set_at_prompt(false);
        self.escape_buffer.clear();
        match self.write_bytes(&[ESCAPE_BYTE]) {
            Ok(()) => self.capture = Capture::AwaitingEscape { reply },
            Err(err) => {
                let _ = reply.send(Err(err.into()));
            }
        }
    }

    /// Feed a raw output chunk into the active capture context.
    pub fn on_output(&mut self, chunk: &str) {
        if matches!(self.lifecycle, Lifecycle::Stopped) {
            return;
        }

        if matches!(self.capture, Capture::AwaitingEscape { .. }) {
            self.escape_buffer.push_str(chunk);
            if !framer::ends_at_prompt(&self.escape_buffer, &self.prompt) {
                return;
            }
            if let Capture::AwaitingEscape { reply } =
                std::mem::replace(&mut self.capture, Capture::Idle)
            {
                let payload = framer::strip_prompt(&self.escape_buffer, &self.prompt);
                self.escape_buffer.clear();
                let _ = reply.send(Ok(payload));
            }
            if matches!(self.lifecycle, Lifecycle::Starting) {
                self.lifecycle = Lifecycle::Ready;
                if let Some(ready) = self.ready.take() {
                    let _ = ready.send(());
                }
            }
            self.set_at_prompt(true);
            self.pump();
            return;
        }

        self.buffer.push_str(chunk);
        if !framer::ends_at_prompt(&self.buffer, &self.prompt) {
            return;
        }

        if matches!(self.lifecycle, Lifecycle::Starting) {
            // Readiness handshake, not a command response. The banner stays
            // buffered and is discarded as stale by the first submit.
            tracing::info!("simulator ready");
            self.lifecycle = Lifecycle::Ready;
            if let Some(ready) = self.ready.take() {
                let _ = ready.send(());
            }
            self.set_at_prompt(true);
            self.pump();
            return;
        }

        // The escape branch returned above, so the capture here is either a
        // command in flight or a prompt with no pending resolver (e.g. one
        // emitted after an interrupt); the latter is a dispatch opportunity.
        if let Capture::AwaitingCommand(cmd) = std::mem::replace(&mut self.capture, Capture::Idle)
        {
            let payload = framer::strip_response(&self.buffer, &cmd.text, &self.prompt);
            self.buffer.clear();
            let _ = cmd.reply.send(Ok(payload));
        }
        self.set_at_prompt(true);
        self.pump();
    }

    /// The process is gone: reject the in-flight command and every queued
    /// command, and make the terminal state observable.
    pub fn on_exit(&mut self) {
        self.lifecycle = Lifecycle::Stopped;
        self.set_at_prompt(false);
        self.flags.running.store(false, Ordering::SeqCst);
        self.ready = None;

        match std::mem::replace(&mut self.capture, Capture::Idle) {
            Capture::AwaitingCommand(cmd) => {
                let _ = cmd.reply.send(Err(SimError::ProcessExited));
            }
            Capture::AwaitingEscape { reply } => {
                let _ = reply.send(Err(SimError::ProcessExited));
            }
            Capture::Idle => {}
        }
        for cmd in self.queue.drain(..) {
            let _ = cmd.reply.send(Err(SimError::ProcessExited));
        }
    }

    /// Dispatch queued commands while the session is idle at a prompt.
    /// Fire-and-forget commands resolve on write and keep the loop going, so
    /// they never hold the prompt busy past their own dispatch.
    fn pump(&mut self) {
        while self.at_prompt && matches!(self.capture, Capture::Idle) {
            let Some(cmd) = self.queue.pop_front() else {
                break;
            };
            if cmd.opts.expect_response {
                self.buffer.clear();
                self.set_at_prompt(false);
                match self.write_command(&cmd.text, cmd.opts.append_terminator) {
                    Ok(()) => self.capture = Capture::AwaitingCommand(cmd),
                    Err(err) => {
                        let _ = cmd.reply.send(Err(err.into()));
                        self.set_at_prompt(true);
                    }
                }
            } else {
                let outcome = self
                    .write_command(&cmd.text, cmd.opts.append_terminator)
                    .map(|()| String::new())
                    .map_err(SimError::from);
                let _ = cmd.reply.send(outcome);
            }
        }
    }

    fn write_command(&mut self, text: &str, terminator: bool) -> io::Result<()> {
        tracing::debug!(command = %text, "dispatch");
        self.writer.write_all(text.as_bytes())?;
        if terminator {
            self.writer.write_all(COMMAND_TERMINATOR.as_bytes())?;
        }
        self.writer.flush()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    fn set_at_prompt(&mut self, value: bool) {
        self.at_prompt = value;
        self.flags.at_prompt.store(value, Ordering::SeqCst);
    }
}
