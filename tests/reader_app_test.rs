use std::cell::RefCell;
use std::rc::Rc;

use librovault::reader::{NarrationState, PagedDocument, ReaderSession, TextDocument};
use librovault::test_utils::test_helpers::{
    EngineLog, RecordingEngine, TestScenarioBuilder, capture_terminal_state,
    create_test_terminal,
};
use librovault::{ReaderApp, run_reader_with_event_source};

fn reader(pages: usize, saved: Rc<RefCell<Vec<usize>>>) -> (ReaderApp, Rc<RefCell<EngineLog>>) {
    let doc: Box<dyn PagedDocument> = Box::new(
        TextDocument::from_pages((1..=pages).map(|i| format!("Chapter text on page {i}"))).unwrap(),
    );
    let (engine, log) = RecordingEngine::new();
    let session = ReaderSession::open(doc, Box::new(engine), None, Some(2)).unwrap();
    let app = ReaderApp::new(
        session,
        Box::new(move |page| {
            saved.borrow_mut().push(page);
            Ok(())
        }),
    );
    (app, log)
}

#[test]
fn reads_narrates_and_bookmarks() {
    let saved = Rc::new(RefCell::new(Vec::new()));
    let (mut app, log) = reader(5, Rc::clone(&saved));
    let mut terminal = create_test_terminal(100, 12);
    let mut events = TestScenarioBuilder::new()
        .toggle_playback()
        .next_page(1)
        .save_bookmark()
        .quit()
        .build();

    run_reader_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    // Started on the bookmark, narrated page 2, moved on to page 3.
    assert_eq!(app.session().current_page(), 3);
    assert_eq!(app.session().narration_state(), NarrationState::Idle);
    assert_eq!(log.borrow().spoken[0].1, "Chapter text on page 2");
    assert_eq!(*saved.borrow(), vec![3]);

    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("Page 3 of 5"));
    assert!(screen.contains("Bookmark saved!"));
}

#[test]
fn go_to_page_prompt_is_clamped() {
    let saved = Rc::new(RefCell::new(Vec::new()));
    let (mut app, _) = reader(5, saved);
    let mut terminal = create_test_terminal(100, 12);
    let mut events = TestScenarioBuilder::new().go_to_page(40).quit().build();

    run_reader_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert_eq!(app.session().current_page(), 5);
    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("Chapter text on page 5"));
}

#[test]
fn exhausted_script_quits_and_stops_speech() {
    let saved = Rc::new(RefCell::new(Vec::new()));
    let (mut app, log) = reader(3, saved);
    let mut terminal = create_test_terminal(80, 10);
    let mut events = TestScenarioBuilder::new().toggle_playback().build();

    run_reader_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert_eq!(app.session().narration_state(), NarrationState::Idle);
    assert_eq!(log.borrow().spoken.len(), 1);
    assert!(log.borrow().cancels >= 2);
}
