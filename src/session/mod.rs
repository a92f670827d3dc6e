//! Simulator session service: spawn, dispatch, interrupt, teardown.
//!
//! All protocol state lives in a [`SessionCore`] owned by one actor task;
//! callers talk to it through a single mpsc channel, so state transitions
//! happen strictly in event-arrival order. The single-writer discipline
//! falls out of that ownership, not out of locks.

pub mod dispatch;
pub mod spawn;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use portable_pty::{ChildKiller, MasterPty};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::config::SimulatorConfig;
use crate::console::{ConsoleBus, ConsoleSubscription, ExitSubscription};
use crate::error::SimError;
use crate::parse;

pub use dispatch::{CommandOptions, CommandReply, SessionCore, SessionFlags};

/// Events processed by the session actor, callers and pty alike.
pub enum SessionMsg {
    Command {
        text: String,
        opts: CommandOptions,
        reply: CommandReply,
    },
    Escape {
        reply: CommandReply,
    },
    Output(String),
    Exited(i32),
}

struct ActiveSession {
    tx: UnboundedSender<SessionMsg>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    // Keeps the pty open for the lifetime of the session.
    _master: Box<dyn MasterPty + Send>,
}

struct ServiceInner {
    config: SimulatorConfig,
    bus: Arc<ConsoleBus>,
    flags: Arc<SessionFlags>,
    active: Mutex<Option<ActiveSession>>,
}

/// Owned service object for one logical simulator instance. Constructed once
/// at process start and injected into consumers; cloning shares the same
/// session.
#[derive(Clone)]
pub struct SimService {
    inner: Arc<ServiceInner>,
}

impl SimService {
    pub fn new(config: SimulatorConfig, bus: Arc<ConsoleBus>) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                config,
                bus,
                flags: Arc::new(SessionFlags::new()),
                active: Mutex::new(None),
            }),
        }
    }

    /// Spawn the simulator and wait for its readiness handshake (the first
    /// prompt). A no-op when a session is already live.
    pub async fn start(&self) -> Result<(), SimError> {
        if self.is_running() {
            return Ok(());
        }

        let config = &self.inner.config;
        let (tx, rx) = mpsc::unbounded_channel();
        let process = spawn::spawn_simulator(&config.command, &config.args, tx.clone())?;

        let (ready_tx, ready_rx) = oneshot::channel();
        self.inner.bus.attach();
        let core = SessionCore::new(
            process.writer,
            config.prompt.clone(),
            Arc::clone(&self.inner.flags),
            ready_tx,
        );
        tokio::spawn(run_session(core, rx, Arc::clone(&self.inner.bus)));

        *self.inner.active.lock() = Some(ActiveSession {
            tx,
            killer: process.killer,
            _master: process.master,
        });

        let deadline = config.startup_timeout();
        match tokio::time::timeout(deadline, ready_rx).await {
            Ok(Ok(())) => Ok(()),
            // The ready channel is dropped unresolved when the process dies
            // before ever printing a prompt.
            Ok(Err(_)) => Err(SimError::ProcessExited),
            Err(_) => {
                self.stop();
                Err(SimError::StartupTimeout(deadline))
            }
        }
    }

    /// Queue a command and wait for its outcome: the stripped response
    /// payload when `expect_response`, an empty string otherwise.
    pub async fn send_command(
        &self,
        text: impl Into<String>,
        opts: CommandOptions,
    ) -> Result<String, SimError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.dispatch(SessionMsg::Command {
            text: text.into(),
            opts,
            reply: reply_tx,
        })?;
        reply_rx.await.map_err(|_| SimError::ProcessExited)?
    }

    /// Send the out-of-band interrupt and wait for its response window.
    pub async fn send_escape(&self) -> Result<String, SimError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.dispatch(SessionMsg::Escape { reply: reply_tx })?;
        reply_rx.await.map_err(|_| SimError::ProcessExited)?
    }

    /// `EXAMINE <refs>` parsed into a register snapshot.
    pub async fn examine_state(
        &self,
        references: &str,
    ) -> Result<HashMap<String, String>, SimError> {
        let output = self
            .send_command(
                format!("EXAMINE {references}"),
                CommandOptions::with_response(),
            )
            .await?;
        parse::parse_registers(&output)
    }

    /// `DEPOSIT <ref> <value>`, fire-and-forget.
    pub async fn deposit_state(&self, reference: &str, value: &str) -> Result<(), SimError> {
        self.send_command(
            format!("DEPOSIT {reference} {value}"),
            CommandOptions::default(),
        )
        .await
        .map(|_| ())
    }

    /// `SHOW BREAK` parsed into an address → status table, built fresh per
    /// query.
    pub async fn breakpoints(&self) -> Result<HashMap<String, String>, SimError> {
        let output = self
            .send_command("SHOW BREAK", CommandOptions::with_response())
            .await?;
        Ok(parse::parse_breakpoints(&output))
    }

    /// Send the graceful quit command and race it against `grace`. When the
    /// timer wins the process is force-killed and `QuitTimeout` is returned.
    /// Tolerates a concurrent `stop`: the resulting exit still counts.
    pub async fn quit(&self, grace: Duration) -> Result<(), SimError> {
        if !self.is_running() {
            return Err(SimError::NotRunning);
        }
        let mut exit = self.inner.bus.subscribe_exit();
        // Enqueue without awaiting the write: the quit command may sit behind
        // a stuck in-flight command, and the grace timer must cover that too.
        let (reply_tx, _reply_rx) = oneshot::channel();
        self.dispatch(SessionMsg::Command {
            text: self.inner.config.quit_command.clone(),
            opts: CommandOptions::default(),
            reply: reply_tx,
        })?;

        match tokio::time::timeout(grace, exit.recv()).await {
            Ok(_) => Ok(()),
            Err(_) => {
                self.stop();
                Err(SimError::QuitTimeout(grace))
            }
        }
    }

    /// Hard kill, synchronous. Outstanding work is rejected when the exit
    /// event reaches the actor.
    pub fn stop(&self) {
        let mut active = self.inner.active.lock();
        if let Some(session) = active.as_mut() {
            if let Err(err) = session.killer.kill() {
                tracing::warn!(%err, "failed to kill simulator");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.flags.is_running() && self.inner.active.lock().is_some()
    }

    pub fn is_at_prompt(&self) -> bool {
        self.inner.flags.is_at_prompt()
    }

    /// Live console-line feed with backlog replay.
    pub fn subscribe_console(&self) -> ConsoleSubscription {
        self.inner.bus.subscribe()
    }

    /// Process-exit events, one per observed exit.
    pub fn subscribe_exit(&self) -> ExitSubscription {
        self.inner.bus.subscribe_exit()
    }

    fn dispatch(&self, msg: SessionMsg) -> Result<(), SimError> {
        let active = self.inner.active.lock();
        match active.as_ref() {
            Some(session) if self.inner.flags.is_running() => session
                .tx
                .send(msg)
                .map_err(|_| SimError::NotRunning),
            _ => Err(SimError::NotRunning),
        }
    }
}

/// The actor: sole owner of the session state machine. Raw output is pushed
/// to the broadcast bus before the dispatcher sees it, decoupled from
/// command resolution.
async fn run_session(
    mut core: SessionCore<Box<dyn Write + Send>>,
    mut rx: UnboundedReceiver<SessionMsg>,
    bus: Arc<ConsoleBus>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            SessionMsg::Command { text, opts, reply } => core.submit(text, opts, reply),
            SessionMsg::Escape { reply } => core.escape(reply),
            SessionMsg::Output(chunk) => {
                bus.append(&chunk);
                core.on_output(&chunk);
            }
            SessionMsg::Exited(code) => {
                core.on_exit();
                bus.notify_exit(code);
                break;
            }
        }
    }
}
