//! SSE adapter over console subscriptions.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::sse::Event;
use futures_core::Stream;

use crate::console::{ConsoleSubscription, ExitSubscription};

/// Streams console lines as `line` events and ends with a single `exit`
/// event. Backlog replay is already queued in the line subscription when
/// this is constructed.
pub struct ConsoleStream {
    lines: ConsoleSubscription,
    exit: ExitSubscription,
    done: bool,
}

impl ConsoleStream {
    pub fn new(lines: ConsoleSubscription, exit: ExitSubscription) -> Self {
        Self {
            lines,
            exit,
            done: false,
        }
    }
}

impl Stream for ConsoleStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        // Lines drain ahead of the exit event: the actor pushes every chunk
        // to the bus before it broadcasts the exit, and both channels are
        // FIFO, so any line preceding the exit is already ready here.
        match this.lines.poll_recv(cx) {
            Poll::Ready(Some(line)) => {
                let event = Event::default()
                    .event("line")
                    .data(line.trim_end_matches('\n'));
                return Poll::Ready(Some(Ok(event)));
            }
            Poll::Ready(None) => {
                this.done = true;
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        match this.exit.poll_recv(cx) {
            Poll::Ready(Some(code)) => {
                this.done = true;
                Poll::Ready(Some(Ok(Event::default().event("exit").data(code.to_string()))))
            }
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        }
    }
}
