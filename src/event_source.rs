use anyhow::Result;
pub use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// Where the reader loop gets its input from.
pub trait EventSource {
    /// Wait up to `timeout` for an event to become available.
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    fn read(&mut self) -> Result<Event>;
}

/// Terminal keyboard input through crossterm
pub struct KeyboardEventSource;

impl EventSource for KeyboardEventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        Ok(crossterm::event::poll(timeout)?)
    }

    fn read(&mut self) -> Result<Event> {
        Ok(crossterm::event::read()?)
    }
}

/// Scripted input for tests. Input is always available: once the script
/// runs out every read yields `q`, so a reader loop driven by it terminates.
pub struct SimulatedEventSource {
    pub(crate) events: Vec<Event>,
    current_index: usize,
}

impl SimulatedEventSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            current_index: 0,
        }
    }

    pub fn key_event(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::empty(),
        })
    }

    pub fn plain_key(code: KeyCode) -> Event {
        Self::key_event(code, KeyModifiers::empty())
    }

    pub fn char_key(c: char) -> Event {
        Self::plain_key(KeyCode::Char(c))
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.current_index
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }

    fn read(&mut self) -> Result<Event> {
        match self.events.get(self.current_index) {
            Some(event) => {
                self.current_index += 1;
                Ok(event.clone())
            }
            None => Ok(Self::char_key('q')),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_event_source() {
        let mut source = SimulatedEventSource::new(vec![
            SimulatedEventSource::char_key(' '),
            SimulatedEventSource::plain_key(KeyCode::Right),
        ]);

        assert!(source.poll(Duration::ZERO).unwrap());
        assert_eq!(source.remaining(), 2);

        let Event::Key(key) = source.read().unwrap() else {
            panic!("expected key event");
        };
        assert_eq!(key.code, KeyCode::Char(' '));

        let Event::Key(key) = source.read().unwrap() else {
            panic!("expected key event");
        };
        assert_eq!(key.code, KeyCode::Right);
        assert!(key.modifiers.is_empty());

        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn exhausted_source_asks_to_quit() {
        let mut source = SimulatedEventSource::new(Vec::new());
        assert!(source.poll(Duration::ZERO).unwrap());
        let Event::Key(key) = source.read().unwrap() else {
            panic!("expected key event");
        };
        assert_eq!(key.code, KeyCode::Char('q'));
    }
}
