//! Structured views over raw simulator responses.

use std::collections::HashMap;

use crate::error::SimError;

/// Parse an `EXAMINE` response into a register snapshot.
///
/// Each non-blank line must be `KEY<: or /> VALUE` with a single-token key.
/// The first line that is not shaped like that fails the whole parse with
/// that line's text verbatim, which is how "Simulation stopped" banners and
/// "no such register" messages surface to the caller. Keys are folded to
/// uppercase.
pub fn parse_registers(text: &str) -> Result<HashMap<String, String>, SimError> {
    let mut snapshot = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = split_register_line(line)?;
        snapshot.insert(key.to_ascii_uppercase(), normalize_value(value));
    }
    Ok(snapshot)
}

fn split_register_line(line: &str) -> Result<(&str, &str), SimError> {
    let Some(index) = line.find([':', '/']) else {
        return Err(SimError::Emulator(line.to_string()));
    };
    let key = line[..index].trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(SimError::Emulator(line.to_string()));
    }
    let value = line[index + 1..].trim();
    if value.is_empty() {
        return Err(SimError::Parse(line.to_string()));
    }
    Ok((key, value))
}

/// The machine keeps a 16-bit counter behind its 4-decimal-digit registers;
/// a fifth digit is internal overflow and is dropped.
fn normalize_value(value: &str) -> String {
    if value.len() == 5 && value.bytes().all(|b| b.is_ascii_digit()) {
        value[1..].to_string()
    } else {
        value.to_string()
    }
}

/// Parse a `SHOW BREAK` response into an address → status table.
///
/// Lines are `ADDRESS: STATE`, both sides trimmed. Lines without a separator
/// carry no breakpoint and are skipped.
pub fn parse_breakpoints(text: &str) -> HashMap<String, String> {
    let mut table = HashMap::new();
    for line in text.lines() {
        let Some((address, state)) = line.split_once(':') else {
            continue;
        };
        let address = address.trim();
        if address.is_empty() {
            continue;
        }
        table.insert(address.to_string(), state.trim().to_string());
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_separated_registers() {
        let snapshot = parse_registers("PC: 0042\nAC: 0001\n").unwrap();
        assert_eq!(snapshot["PC"], "0042");
        assert_eq!(snapshot["AC"], "0001");
    }

    #[test]
    fn parses_slash_separated_registers() {
        let snapshot = parse_registers("0100/ 1234\n").unwrap();
        assert_eq!(snapshot["0100"], "1234");
    }

    #[test]
    fn folds_keys_to_uppercase() {
        let snapshot = parse_registers("acclo: 0007\n").unwrap();
        assert_eq!(snapshot["ACCLO"], "0007");
    }

    #[test]
    fn five_digit_value_keeps_lowest_four() {
        let snapshot = parse_registers("AR: 01234\n").unwrap();
        assert_eq!(snapshot["AR"], "1234");
    }

    #[test]
    fn truncation_applies_only_to_exactly_five_digits() {
        let snapshot = parse_registers("A: 1234\nB: 123456\nC: 0123X\n").unwrap();
        assert_eq!(snapshot["A"], "1234");
        assert_eq!(snapshot["B"], "123456");
        assert_eq!(snapshot["C"], "0123X");
    }

    #[test]
    fn first_unmatched_line_fails_the_parse() {
        let err = parse_registers("Simulation stopped, IC: 00042\nACCLO: 00000\n").unwrap_err();
        match err {
            SimError::Emulator(line) => assert!(line.contains("Simulation stopped")),
            other => panic!("expected emulator error, got {other:?}"),
        }
    }

    #[test]
    fn no_such_register_text_is_an_error() {
        let err = parse_registers("No such register\n").unwrap_err();
        assert!(matches!(err, SimError::Emulator(_)));
    }

    #[test]
    fn empty_value_is_a_parse_error() {
        let err = parse_registers("PC:\n").unwrap_err();
        assert!(matches!(err, SimError::Parse(_)));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let snapshot = parse_registers("\nPC: 0042\n\n").unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn parses_breakpoint_table() {
        let table = parse_breakpoints("0100: B\n0200:  E\n");
        assert_eq!(table["0100"], "B");
        assert_eq!(table["0200"], "E");
    }

    #[test]
    fn breakpoint_lines_without_separator_are_skipped() {
        let table = parse_breakpoints("no breakpoints set\n0100: B\n");
        assert_eq!(table.len(), 1);
        assert_eq!(table["0100"], "B");
    }
}
