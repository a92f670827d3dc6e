//! Tests for the out-of-band interrupt channel.

mod common;

use common::*;
use simbridge::error::SimError;
use simbridge::session::CommandOptions;

#[test]
fn escape_at_idle_prompt_is_a_noop() {
    let mut h = ready_session();
    h.writer.take();

    let mut reply = send_escape(&mut h.core);
    assert_eq!(resolved(&mut reply).unwrap(), "");
    // Nothing was written and the prompt is still free.
    assert_eq!(h.writer.take(), "");
    assert!(h.flags.is_at_prompt());
}

#[test]
fn escape_writes_the_interrupt_byte_without_terminator() {
    let mut h = ready_session();
    h.writer.take();

    // Occupy the prompt so the escape actually has something to interrupt.
    let _cmd = submit(&mut h.core, "GO", CommandOptions::with_response());
    h.writer.take();

    let _esc = send_escape(&mut h.core);
    assert_eq!(h.writer.take(), "\u{5}");
}

#[test]
fn escape_requeues_in_flight_command_with_its_reply() {
    let mut h = ready_session();
    h.writer.take();

    let mut cmd = submit(&mut h.core, "GO", CommandOptions::with_response());
    assert_eq!(h.writer.take(), "GO\r");

    let mut esc = send_escape(&mut h.core);
    assert!(pending(&mut cmd));

    // The interrupt's own response window resolves the escape...
    h.core.on_output("\r\nSimulation stopped, IC: 0042\r\nsim> ");
    assert_eq!(
        resolved(&mut esc).unwrap(),
        "Simulation stopped, IC: 0042"
    );

    // ...and the preempted command was re-dispatched from the queue head,
    // still wired to the original caller.
    assert_eq!(h.writer.take(), "GO\r");
    h.core.on_output("GO\r\nHALT instruction, PC: 0100\r\nsim> ");
    assert_eq!(resolved(&mut cmd).unwrap(), "HALT instruction, PC: 0100");
}

#[test]
fn interrupt_output_never_contaminates_command_payload() {
    let mut h = ready_session();
    h.writer.take();

    let mut cmd = submit(&mut h.core, "EXAMINE PC", CommandOptions::with_response());
    h.writer.take();
    let mut esc = send_escape(&mut h.core);

    // The escape window carries banner text that must not leak into the
    // re-dispatched command's payload.
    h.core.on_output("\r\nInterrupt banner\r\nsim> ");
    assert_eq!(resolved(&mut esc).unwrap(), "Interrupt banner");

    assert_eq!(h.writer.take(), "EXAMINE PC\r");
    h.core.on_output("EXAMINE PC\r\nPC: 0042\r\nsim> ");
    assert_eq!(resolved(&mut cmd).unwrap(), "PC: 0042");
}

#[test]
fn concurrent_escape_is_rejected() {
    let mut h = ready_session();
    h.writer.take();

    let _cmd = submit(&mut h.core, "GO", CommandOptions::with_response());
    let mut first = send_escape(&mut h.core);
    let mut second = send_escape(&mut h.core);

    assert!(matches!(
        resolved(&mut second),
        Err(SimError::EscapePending)
    ));
    assert!(pending(&mut first));

    // The first escape still completes normally.
    h.core.on_output("\r\nsim> ");
    assert_eq!(resolved(&mut first).unwrap(), "");
}

#[test]
fn escape_after_exit_fails_not_running() {
    let mut h = ready_session();
    h.core.on_exit();

    let mut reply = send_escape(&mut h.core);
    assert!(matches!(resolved(&mut reply), Err(SimError::NotRunning)));
}

#[test]
fn commands_queued_during_escape_wait_for_it() {
    let mut h = ready_session();
    h.writer.take();

    let _cmd = submit(&mut h.core, "GO", CommandOptions::with_response());
    h.writer.take();
    let mut esc = send_escape(&mut h.core);

    let mut queued = submit(&mut h.core, "EXAMINE PC", CommandOptions::with_response());
    assert_eq!(h.writer.take(), "");

    h.core.on_output("\r\nsim> ");
    assert_eq!(resolved(&mut esc).unwrap(), "");

    // The preempted GO goes first, then the newly queued command.
    assert_eq!(h.writer.take(), "GO\r");
    h.core.on_output("GO\r\nstopped\r\nsim> ");
    assert_eq!(h.writer.take(), "EXAMINE PC\r");
    assert!(pending(&mut queued));
}
