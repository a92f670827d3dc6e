//! Process-wide broadcast of raw console output.
//!
//! The bus decouples "what the process printed" from "which command got
//! which response": every raw chunk lands here regardless of dispatch state,
//! so console viewers see asynchronous device output too. Each subscriber
//! owns an unbounded channel, so a slow consumer can never stall the
//! emitting path. The bus outlives any single session; a restart does not
//! lose subscribers.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::framer;

/// Completed lines retained for replay to late subscribers.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 1000;

/// Shared console bus. Construct once at startup and inject.
pub struct ConsoleBus {
    inner: Mutex<BusInner>,
}

struct BusInner {
    capacity: usize,
    partial: String,
    backlog: VecDeque<String>,
    next_id: u64,
    lines: HashMap<u64, UnboundedSender<String>>,
    exits: HashMap<u64, UnboundedSender<i32>>,
}

impl ConsoleBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BusInner {
                capacity,
                partial: String::new(),
                backlog: VecDeque::with_capacity(capacity.min(64)),
                next_id: 0,
                lines: HashMap::new(),
                exits: HashMap::new(),
            }),
        }
    }

    /// Called when a session wires itself up. Clears stale partial-line
    /// state from a previous process; the backlog is kept.
    pub fn attach(&self) {
        self.inner.lock().partial.clear();
    }

    /// Append a raw chunk. Complete lines (trailing newline included) go to
    /// the backlog and to every live subscriber; the unterminated remainder
    /// becomes the new partial line.
    pub fn append(&self, chunk: &str) {
        let mut inner = self.inner.lock();
        let mut combined = std::mem::take(&mut inner.partial);
        combined.push_str(&framer::normalize_newlines(chunk));

        let mut rest = combined.as_str();
        while let Some(pos) = rest.find('\n') {
            let line = rest[..=pos].to_string();
            rest = &rest[pos + 1..];
            if inner.backlog.len() == inner.capacity {
                inner.backlog.pop_front();
            }
            inner.backlog.push_back(line.clone());
            inner.lines.retain(|_, tx| tx.send(line.clone()).is_ok());
        }
        inner.partial = rest.to_string();
    }

    /// Number of retained backlog lines.
    pub fn backlog_len(&self) -> usize {
        self.inner.lock().backlog.len()
    }

    /// Subscribe to console lines. The current backlog is replayed into the
    /// subscription, in order, before any live line is delivered.
    pub fn subscribe(self: &Arc<Self>) -> ConsoleSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        for line in &inner.backlog {
            let _ = tx.send(line.clone());
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.lines.insert(id, tx);
        tracing::debug!(id, "console subscriber added");
        ConsoleSubscription {
            bus: Arc::downgrade(self),
            id,
            rx,
        }
    }

    /// Subscribe to process-exit events. Not replayed retroactively; fired
    /// once per observed exit with the exit code.
    pub fn subscribe_exit(self: &Arc<Self>) -> ExitSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.exits.insert(id, tx);
        ExitSubscription {
            bus: Arc::downgrade(self),
            id,
            rx,
        }
    }

    /// Deliver an exit event to every exit subscriber.
    pub fn notify_exit(&self, code: i32) {
        let mut inner = self.inner.lock();
        inner.exits.retain(|_, tx| tx.send(code).is_ok());
        tracing::info!(code, "simulator exit broadcast");
    }

    fn unsubscribe_line(&self, id: u64) {
        self.inner.lock().lines.remove(&id);
    }

    fn unsubscribe_exit(&self, id: u64) {
        self.inner.lock().exits.remove(&id);
    }
}

/// A live console-line subscription. Dropping it unsubscribes; calling
/// [`ConsoleSubscription::unsubscribe`] repeatedly is harmless.
pub struct ConsoleSubscription {
    bus: Weak<ConsoleBus>,
    id: u64,
    rx: UnboundedReceiver<String>,
}

impl ConsoleSubscription {
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.rx.poll_recv(cx)
    }

    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe_line(self.id);
        }
    }
}

impl Drop for ConsoleSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// A process-exit subscription.
pub struct ExitSubscription {
    bus: Weak<ConsoleBus>,
    id: u64,
    rx: UnboundedReceiver<i32>,
}

impl ExitSubscription {
    pub async fn recv(&mut self) -> Option<i32> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<i32> {
        self.rx.try_recv().ok()
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<i32>> {
        self.rx.poll_recv(cx)
    }

    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe_exit(self.id);
        }
    }
}

impl Drop for ExitSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
