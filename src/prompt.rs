//! Reading a password from the terminal without echoing it.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Result, bail};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::event_source::{
    Event, EventSource, KeyCode, KeyEventKind, KeyModifiers, KeyboardEventSource,
};

/// Collect one line from key events. Nothing is printed. `None` when the
/// user backs out with Esc or Ctrl-c.
pub fn read_hidden_line(source: &mut dyn EventSource) -> Result<Option<String>> {
    let mut line = String::new();
    loop {
        let Event::Key(key) = source.read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(Some(line)),
            KeyCode::Esc => return Ok(None),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(None);
            }
            KeyCode::Backspace => {
                line.pop();
            }
            KeyCode::Char(c) => line.push(c),
            _ => {}
        }
    }
}

/// Ask for a password on the terminal with echo off. Piped stdin is read as a
/// plain line so scripted logins keep working.
pub fn prompt_password(label: &str) -> Result<String> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    print!("{label}");
    io::stdout().flush()?;
    enable_raw_mode()?;
    let result = read_hidden_line(&mut KeyboardEventSource);
    disable_raw_mode()?;
    println!();

    match result? {
        Some(password) => Ok(password),
        None => bail!("Cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_source::SimulatedEventSource;
    use crossterm::event::{KeyEvent, KeyEventState};

    fn typed(text: &str) -> Vec<Event> {
        text.chars().map(SimulatedEventSource::char_key).collect()
    }

    #[test]
    fn enter_finishes_the_line() {
        let mut events = typed("s3c");
        events.push(SimulatedEventSource::plain_key(KeyCode::Backspace));
        events.extend(typed("ret pass"));
        events.push(SimulatedEventSource::plain_key(KeyCode::Enter));
        let mut source = SimulatedEventSource::new(events);

        assert_eq!(
            read_hidden_line(&mut source).unwrap().as_deref(),
            Some("s3ret pass")
        );
    }

    #[test]
    fn escape_and_ctrl_c_cancel() {
        let mut events = typed("abc");
        events.push(SimulatedEventSource::plain_key(KeyCode::Esc));
        let mut source = SimulatedEventSource::new(events);
        assert_eq!(read_hidden_line(&mut source).unwrap(), None);

        let mut source = SimulatedEventSource::new(vec![SimulatedEventSource::key_event(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )]);
        assert_eq!(read_hidden_line(&mut source).unwrap(), None);
    }

    #[test]
    fn key_releases_are_ignored() {
        let release = Event::Key(KeyEvent {
            code: KeyCode::Char('x'),
            modifiers: KeyModifiers::empty(),
            kind: KeyEventKind::Release,
            state: KeyEventState::empty(),
        });
        let mut source = SimulatedEventSource::new(vec![
            SimulatedEventSource::char_key('p'),
            release,
            Event::FocusGained,
            SimulatedEventSource::plain_key(KeyCode::Enter),
        ]);

        assert_eq!(read_hidden_line(&mut source).unwrap().as_deref(), Some("p"));
    }
}
