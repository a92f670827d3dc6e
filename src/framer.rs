//! Prompt-boundary framing for the simulator's character stream.
//!
//! A response is complete when the accumulated output, with line endings
//! normalized, ends with the prompt marker. This is a suffix test: a marker
//! that appears mid-stream does not terminate anything, only a trailing one
//! does. Echo stripping handles both local-echo and prompt-prefixed-echo
//! terminal behaviors.

/// Collapse `\r\n` and bare `\r` to `\n`.
pub fn normalize_newlines(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// True when the buffer ends with the prompt marker after normalization.
pub fn ends_at_prompt(buffer: &str, prompt: &str) -> bool {
    normalize_newlines(buffer).ends_with(prompt)
}

/// Extract a command's payload from the raw response window.
///
/// Drops the trailing prompt line, then scans top-down for the command's own
/// echo, either the bare command text or `<prompt><command>`, compared
/// case-insensitively after trimming. The payload is everything strictly
/// after the echo line, or the whole remainder when no echo is present.
/// Blank lines are filtered out.
pub fn strip_response(raw: &str, command: &str, prompt: &str) -> String {
    let normalized = normalize_newlines(raw);
    let mut lines: Vec<&str> = normalized.lines().collect();
    if lines
        .last()
        .is_some_and(|last| last.trim_end() == prompt.trim_end())
    {
        lines.pop();
    }

    let echo = command.trim().to_ascii_lowercase();
    let prefixed = format!("{}{}", prompt, command.trim()).to_ascii_lowercase();
    let mut payload_start = 0;
    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim().to_ascii_lowercase();
        if trimmed == echo || trimmed == prefixed.trim() {
            payload_start = index + 1;
            break;
        }
    }

    lines[payload_start..]
        .iter()
        .filter(|line| !line.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract an escape response: drop the trailing prompt line and blanks.
/// No echo scan, since the interrupt byte is never echoed as a line.
pub fn strip_prompt(raw: &str, prompt: &str) -> String {
    let normalized = normalize_newlines(raw);
    let mut lines: Vec<&str> = normalized.lines().collect();
    if lines
        .last()
        .is_some_and(|last| last.trim_end() == prompt.trim_end())
    {
        lines.pop();
    }
    lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}
