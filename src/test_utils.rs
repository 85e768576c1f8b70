pub mod test_helpers {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use chrono::{TimeZone, Utc};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::auth::{Role, Session, UserProfile};
    use crate::event_source::{Event, KeyCode, SimulatedEventSource};
    use crate::reader::{EngineEvent, PlaybackEngine, SpeechError, UtteranceId};

    /// Everything a [`RecordingEngine`] was asked to do.
    #[derive(Debug, Default)]
    pub struct EngineLog {
        pub spoken: Vec<(UtteranceId, String)>,
        pub pauses: usize,
        pub resumes: usize,
        pub cancels: usize,
        /// Events handed back on the next `poll_event` calls.
        pub pending: VecDeque<EngineEvent>,
    }

    /// Speech engine double that records calls into a shared log.
    pub struct RecordingEngine {
        log: Rc<RefCell<EngineLog>>,
        pub supported: bool,
        pub fail_speak: bool,
    }

    impl RecordingEngine {
        pub fn new() -> (Self, Rc<RefCell<EngineLog>>) {
            let log = Rc::new(RefCell::new(EngineLog::default()));
            let engine = Self {
                log: Rc::clone(&log),
                supported: true,
                fail_speak: false,
            };
            (engine, log)
        }
    }

    impl PlaybackEngine for RecordingEngine {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn speak(&mut self, id: UtteranceId, text: &str) -> Result<(), SpeechError> {
            if self.fail_speak {
                return Err(SpeechError::Spawn(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no synthesizer",
                )));
            }
            self.log.borrow_mut().spoken.push((id, text.to_string()));
            Ok(())
        }

        fn pause(&mut self) {
            self.log.borrow_mut().pauses += 1;
        }

        fn resume(&mut self) {
            self.log.borrow_mut().resumes += 1;
        }

        fn cancel(&mut self) {
            self.log.borrow_mut().cancels += 1;
        }

        fn poll_event(&mut self) -> Option<EngineEvent> {
            self.log.borrow_mut().pending.pop_front()
        }
    }

    /// A signed-in session that never expires.
    pub fn test_session(role: Role) -> Session {
        Session {
            access_token: "test-token".to_string(),
            refresh_token: Some("test-refresh".to_string()),
            expires_at: Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).single(),
            user: UserProfile {
                id: "user-1".to_string(),
                email: Some("reader@example.com".to_string()),
                username: Some("reader".to_string()),
            },
            role,
        }
    }

    /// Builder for a scripted sequence of reader key presses
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        pub fn press_key(mut self, code: KeyCode) -> Self {
            self.events.push(SimulatedEventSource::plain_key(code));
            self
        }

        /// Next page (`l`), `times` times
        pub fn next_page(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('l'));
            }
            self
        }

        /// Previous page (`h`), `times` times
        pub fn previous_page(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('h'));
            }
            self
        }

        pub fn toggle_playback(self) -> Self {
            self.press_char(' ')
        }

        pub fn stop_playback(self) -> Self {
            self.press_char('s')
        }

        pub fn save_bookmark(self) -> Self {
            self.press_char('b')
        }

        /// Type a page number and confirm with Enter
        pub fn go_to_page(mut self, page: usize) -> Self {
            self.events.push(SimulatedEventSource::char_key('g'));
            for digit in page.to_string().chars() {
                self.events.push(SimulatedEventSource::char_key(digit));
            }
            self.events.push(SimulatedEventSource::plain_key(KeyCode::Enter));
            self
        }

        pub fn quit(self) -> Self {
            self.press_char('q')
        }

        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// Render the terminal buffer as text, trailing blanks trimmed
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            lines.push(line.trim_end().to_string());
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use crate::reader::{EngineEvent, PlaybackEngine, UtteranceId};

    #[test]
    fn test_scenario_builder() {
        let scenario = TestScenarioBuilder::new()
            .next_page(2)
            .save_bookmark()
            .go_to_page(12)
            .quit()
            .build();

        // l l b g 1 2 Enter q
        assert_eq!(scenario.events.len(), 8);
    }

    #[test]
    fn recording_engine_replays_pending_events() {
        let (mut engine, log) = RecordingEngine::new();
        engine.speak(UtteranceId(3), "hello").unwrap();
        log.borrow_mut()
            .pending
            .push_back(EngineEvent::Finished(UtteranceId(3)));

        assert_eq!(engine.poll_event(), Some(EngineEvent::Finished(UtteranceId(3))));
        assert_eq!(engine.poll_event(), None);
        assert_eq!(log.borrow().spoken, vec![(UtteranceId(3), "hello".to_string())]);
    }
}
