//! Interactive console protocol.
//!
//! Two surfaces: a numbered device-selection prompt (numeric choice, `r` to
//! rescan, `q` to quit) and the short single-key window in which an operator
//! can override an automatic selection before the open attempt proceeds.

use std::collections::HashMap;
use std::io::{BufRead, IsTerminal, Write};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::warn;

use crate::locator::SerialDeviceInfo;

/// Result of the numbered selection prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Index into the prompted device list.
    Selected(usize),
    Rescan,
    Quit,
}

/// Result of the auto-connect override window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideAction {
    /// Window elapsed without input; the automatic choice stands.
    Proceed,
    /// Operator pressed `c`: show the selection prompt instead.
    Change,
    /// Operator pressed `q`.
    Quit,
}

/// Whether a human can answer prompts on this process's stdin.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Show the numbered device list and read a selection. Unrecognized input
/// re-prompts without side effects; EOF on stdin counts as quit.
pub fn prompt_select(
    devices: &[SerialDeviceInfo],
    busy: &HashMap<String, bool>,
) -> PromptOutcome {
    let stdin = std::io::stdin();
    loop {
        println!("Select serial port:");
        for (i, device) in devices.iter().enumerate() {
            let busy_tag = if busy.get(&device.port_name).copied().unwrap_or(false) {
                " [in-use?]"
            } else {
                ""
            };
            println!("  [{i}] {}{busy_tag}", device.label);
        }
        print!("Enter number (or 'r' to rescan, 'q' to quit): ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return PromptOutcome::Quit,
            Ok(_) => {}
        }

        match parse_selection(&line, devices.len()) {
            Some(outcome) => return outcome,
            None => println!("Invalid input."),
        }
    }
}

/// Poll for a `c`/`q` keypress until `window` elapses. Terminal raw-mode
/// failures degrade to proceeding with the automatic choice.
pub fn override_window(window: Duration) -> OverrideAction {
    if window.is_zero() {
        return OverrideAction::Proceed;
    }
    if let Err(e) = enable_raw_mode() {
        warn!("cannot poll for override key: {e}");
        return OverrideAction::Proceed;
    }
    let action = poll_override_key(window);
    let _ = disable_raw_mode();
    action
}

fn poll_override_key(window: Duration) -> OverrideAction {
    let deadline = Instant::now() + window;
    loop {
        let remaining = match deadline.checked_duration_since(Instant::now()) {
            Some(d) if !d.is_zero() => d,
            _ => return OverrideAction::Proceed,
        };
        match event::poll(remaining.min(Duration::from_millis(50))) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(_) => return OverrideAction::Proceed,
        }
        let Ok(Event::Key(key)) = event::read() else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('C')
                if key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                // Ctrl+C arrives as a key event in raw mode.
                return OverrideAction::Quit;
            }
            KeyCode::Char('c') | KeyCode::Char('C') => return OverrideAction::Change,
            KeyCode::Char('q') | KeyCode::Char('Q') => return OverrideAction::Quit,
            _ => {}
        }
    }
}

fn parse_selection(input: &str, count: usize) -> Option<PromptOutcome> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Some(PromptOutcome::Quit);
    }
    if input.eq_ignore_ascii_case("r") {
        return Some(PromptOutcome::Rescan);
    }
    match input.parse::<usize>() {
        Ok(index) if index < count => Some(PromptOutcome::Selected(index)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_selection_is_bounds_checked() {
        assert_eq!(parse_selection("0", 3), Some(PromptOutcome::Selected(0)));
        assert_eq!(parse_selection(" 2 \n", 3), Some(PromptOutcome::Selected(2)));
        assert_eq!(parse_selection("3", 3), None);
        assert_eq!(parse_selection("-1", 3), None);
    }

    #[test]
    fn rescan_and_quit_are_case_insensitive() {
        assert_eq!(parse_selection("r\n", 1), Some(PromptOutcome::Rescan));
        assert_eq!(parse_selection("R", 1), Some(PromptOutcome::Rescan));
        assert_eq!(parse_selection("q", 1), Some(PromptOutcome::Quit));
        assert_eq!(parse_selection("Q\n", 1), Some(PromptOutcome::Quit));
    }

    #[test]
    fn garbage_re_prompts() {
        assert_eq!(parse_selection("", 3), None);
        assert_eq!(parse_selection("x", 3), None);
        assert_eq!(parse_selection("1.5", 3), None);
    }

    #[test]
    fn zero_window_proceeds_immediately() {
        assert_eq!(override_window(Duration::ZERO), OverrideAction::Proceed);
    }
}
