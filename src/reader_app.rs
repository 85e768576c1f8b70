//! Terminal reader: key handling and the draw/tick loop around a
//! [`ReaderSession`].

use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, error, info};
use ratatui::{Frame, Terminal};

use crate::event_source::{Event, EventSource};
use crate::reader::ReaderSession;
use crate::theme::current_theme;
use crate::widget::ReaderView;

const TICK_RATE: Duration = Duration::from_millis(100);

/// Persists a bookmark for the open book.
pub type BookmarkSink = Box<dyn FnMut(usize) -> anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

pub struct ReaderApp {
    session: ReaderSession,
    view: ReaderView,
    page_input: Option<String>,
    save_bookmark: BookmarkSink,
}

impl ReaderApp {
    pub fn new(session: ReaderSession, save_bookmark: BookmarkSink) -> Self {
        Self {
            session,
            view: ReaderView::new(),
            page_input: None,
            save_bookmark,
        }
    }

    pub fn session(&self) -> &ReaderSession {
        &self.session
    }

    pub fn page_input(&self) -> Option<&str> {
        self.page_input.as_deref()
    }

    /// Run the render step for the current page if it has not happened yet.
    pub fn render_pending_page(&mut self) {
        if !self.session.needs_render() {
            return;
        }
        if let Err(e) = self.session.render_current_page() {
            error!("Failed to extract page {}: {e}", self.session.current_page());
            let page = self.session.current_page();
            self.session.on_page_rendered(page, String::new());
            self.session.show_error(e.to_string());
        }
    }

    pub fn tick(&mut self) {
        self.session.tick();
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        self.view.render(
            f,
            area,
            &self.session,
            self.page_input.as_deref(),
            current_theme(),
        );
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(AppAction::Quit);
        }
        if self.page_input.is_some() {
            self.handle_page_input(key.code);
            return None;
        }

        match key.code {
            KeyCode::Char('q') => return Some(AppAction::Quit),
            KeyCode::Char(' ') | KeyCode::Char('p') => self.session.toggle_playback(),
            KeyCode::Char('s') | KeyCode::Esc => self.session.stop_playback(),
            KeyCode::Char('l') | KeyCode::Right | KeyCode::PageDown => {
                let changed = self.session.next_page();
                self.after_navigation(changed);
            }
            KeyCode::Char('h') | KeyCode::Left | KeyCode::PageUp => {
                let changed = self.session.previous_page();
                self.after_navigation(changed);
            }
            KeyCode::Char('j') | KeyCode::Down => self.view.scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => self.view.scroll_up(1),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.view.scroll_down(self.view.page_height() / 2)
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.view.scroll_up(self.view.page_height() / 2)
            }
            KeyCode::Char('g') => self.page_input = Some(String::new()),
            KeyCode::Char('b') => self.save_bookmark(),
            _ => {}
        }
        None
    }

    fn handle_page_input(&mut self, code: KeyCode) {
        let Some(input) = self.page_input.as_mut() else {
            return;
        };
        match code {
            KeyCode::Char(c) if c.is_ascii_digit() && input.len() < 9 => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Enter => {
                let target = input.parse::<i64>().ok();
                self.page_input = None;
                if let Some(target) = target {
                    let changed = self.session.go_to_page(target);
                    self.after_navigation(changed);
                }
            }
            KeyCode::Esc => self.page_input = None,
            _ => {}
        }
    }

    fn after_navigation(&mut self, changed: bool) {
        if changed {
            self.view.reset_scroll();
            debug!("Now on page {}", self.session.current_page());
        }
    }

    fn save_bookmark(&mut self) {
        let persist = &mut self.save_bookmark;
        // Failure already surfaced through the session's message queue.
        let _ = self.session.save_bookmark(|page| persist(page));
    }

    pub fn into_session(self) -> ReaderSession {
        self.session
    }
}

pub fn run_reader_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut ReaderApp,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let mut last_tick = Instant::now();
    info!(
        "Reader started on page {} of {}",
        app.session.current_page(),
        app.session.page_count()
    );

    loop {
        app.render_pending_page();
        terminal.draw(|f| app.draw(f))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event_source.poll(timeout)? {
            if let Event::Key(key) = event_source.read()? {
                if app.handle_key(key) == Some(AppAction::Quit) {
                    break;
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.tick();
            last_tick = Instant::now();
        }
    }

    app.session.stop_playback();
    info!("Reader closed on page {}", app.session.current_page());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_source::SimulatedEventSource;
    use crate::reader::{DocumentError, NarrationState, PagedDocument, TextDocument};
    use crate::test_utils::test_helpers::RecordingEngine;

    fn app(pages: usize) -> ReaderApp {
        let doc: Box<dyn PagedDocument> =
            Box::new(TextDocument::from_pages((1..=pages).map(|i| format!("page {i}"))).unwrap());
        let (engine, _) = RecordingEngine::new();
        let session = ReaderSession::open(doc, Box::new(engine), None, None).unwrap();
        ReaderApp::new(session, Box::new(|_| Ok(())))
    }

    fn press(app: &mut ReaderApp, code: KeyCode) -> Option<AppAction> {
        let Event::Key(key) = SimulatedEventSource::plain_key(code) else {
            unreachable!()
        };
        app.handle_key(key)
    }

    #[test]
    fn page_input_navigates_on_enter() {
        let mut app = app(30);
        press(&mut app, KeyCode::Char('g'));
        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Char('5'));
        assert_eq!(app.page_input(), Some("25"));

        // 'q' is swallowed while typing a page number
        assert_eq!(press(&mut app, KeyCode::Char('q')), None);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.page_input(), None);
        assert_eq!(app.session().current_page(), 25);
    }

    #[test]
    fn escape_cancels_page_input() {
        let mut app = app(5);
        press(&mut app, KeyCode::Char('g'));
        press(&mut app, KeyCode::Char('4'));
        press(&mut app, KeyCode::Esc);

        assert_eq!(app.page_input(), None);
        assert_eq!(app.session().current_page(), 1);
    }

    #[test]
    fn space_toggles_after_render() {
        let mut app = app(2);
        app.render_pending_page();
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.session().narration_state(), NarrationState::Speaking);
        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.session().narration_state(), NarrationState::Idle);
        assert!(app.session().needs_render());
    }

    struct UnreadableDocument;

    impl PagedDocument for UnreadableDocument {
        fn page_count(&self) -> usize {
            3
        }

        fn page_text(&self, _page: usize) -> Result<String, DocumentError> {
            Err(DocumentError::UnsupportedFormat)
        }
    }

    #[test]
    fn unreadable_page_shows_error_and_stays_open() {
        let (engine, _) = RecordingEngine::new();
        let session =
            ReaderSession::open(Box::new(UnreadableDocument), Box::new(engine), None, None).unwrap();
        let mut app = ReaderApp::new(session, Box::new(|_| Ok(())));

        app.render_pending_page();

        assert!(!app.session().needs_render());
        assert_eq!(app.session().page_text(), "");
        let message = app.session().current_message().unwrap();
        assert!(message.text.contains("unsupported document format"));
        assert_eq!(press(&mut app, KeyCode::Char('l')), None);
        assert_eq!(app.session().current_page(), 2);
    }

    #[test]
    fn failing_sink_reports_error() {
        let doc: Box<dyn PagedDocument> = Box::new(TextDocument::from_pages(["only"]).unwrap());
        let (engine, _) = RecordingEngine::new();
        let session = ReaderSession::open(doc, Box::new(engine), None, None).unwrap();
        let mut app = ReaderApp::new(session, Box::new(|_| Err(anyhow::anyhow!("offline"))));

        press(&mut app, KeyCode::Char('b'));

        assert_eq!(app.session().bookmark_notice(), "");
        assert!(app.session().current_message().is_some());
    }
}
