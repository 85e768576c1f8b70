//! Reader session: page position, rendered page text and narration
//!
//! One session exists per open reader view. Page numbers are 1-based.
//! Changing pages always cancels narration before the next page's text is
//! adopted, so speech never runs across a page transition.

use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use super::document::{DocumentError, PagedDocument};
use super::narration::{NarrationState, Narrator, PlaybackEngine, ToggleOutcome};
use crate::notification::{BOOKMARK_NOTICE_DURATION, MessageLog, Notice, Severity};

pub const BOOKMARK_SAVED: &str = "Bookmark saved!";
pub const SPEECH_UNSUPPORTED: &str = "Sorry, text-to-speech is not supported on this system.";

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The document could not be fetched or opened; the view should close.
    #[error("failed to load book: {0}")]
    Load(#[source] anyhow::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("failed to save bookmark: {0}")]
    BookmarkSave(#[source] anyhow::Error),
}

/// Where the session starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    Target(usize),
    Bookmark(usize),
    FirstPage,
}

impl StartPosition {
    pub fn page(&self) -> usize {
        match self {
            StartPosition::Target(page) | StartPosition::Bookmark(page) => *page,
            StartPosition::FirstPage => 1,
        }
    }
}

/// Pick the starting page: a valid explicit target wins, then the saved
/// bookmark (clamped into the document), then page 1.
pub fn resolve_start_page(
    initial_target: Option<i64>,
    bookmark: Option<i64>,
    page_count: usize,
) -> StartPosition {
    if let Some(target) = initial_target {
        if target >= 1 && (target as u64) <= page_count as u64 {
            return StartPosition::Target(target as usize);
        }
        warn!("Ignoring start page {target}, document has {page_count} pages");
    }
    match bookmark {
        Some(page) if page >= 1 => StartPosition::Bookmark(clamp_page(page, page_count)),
        _ => StartPosition::FirstPage,
    }
}

fn clamp_page(target: i64, page_count: usize) -> usize {
    let max = page_count.max(1) as i64;
    target.clamp(1, max) as usize
}

pub struct ReaderSession {
    document: Box<dyn PagedDocument>,
    book_title: Option<String>,
    page_count: usize,
    current_page: usize,
    page_text: String,
    rendered_page: Option<usize>,
    narrator: Narrator,
    bookmark_notice: Option<Notice>,
    notice_duration: Duration,
    messages: MessageLog,
}

impl ReaderSession {
    /// Load the document and the saved bookmark concurrently and resolve the
    /// starting page.
    ///
    /// A failed bookmark fetch is logged and treated as "no bookmark"; a
    /// failed document load is returned as [`ReaderError::Load`].
    pub fn initialize<L, B>(
        engine: Box<dyn PlaybackEngine>,
        initial_target: Option<i64>,
        load_document: L,
        fetch_bookmark: B,
    ) -> Result<Self, ReaderError>
    where
        L: FnOnce() -> anyhow::Result<Box<dyn PagedDocument>>,
        B: FnOnce() -> anyhow::Result<Option<i64>> + Send,
    {
        let (document, bookmark) = thread::scope(|scope| {
            let bookmark_handle = scope.spawn(fetch_bookmark);
            let document = load_document();
            let bookmark = match bookmark_handle.join() {
                Ok(Ok(page)) => page,
                Ok(Err(e)) => {
                    warn!("Could not fetch bookmark, starting without it: {e:#}");
                    None
                }
                Err(_) => {
                    error!("Bookmark fetch panicked, starting without it");
                    None
                }
            };
            (document, bookmark)
        });

        let document = document.map_err(ReaderError::Load)?;
        Self::open(document, engine, initial_target, bookmark)
    }

    /// Build a session around an already loaded document.
    pub fn open(
        document: Box<dyn PagedDocument>,
        engine: Box<dyn PlaybackEngine>,
        initial_target: Option<i64>,
        bookmark: Option<i64>,
    ) -> Result<Self, ReaderError> {
        let page_count = document.page_count();
        if page_count == 0 {
            return Err(DocumentError::Empty.into());
        }
        let start = resolve_start_page(initial_target, bookmark, page_count);
        info!("Opening reader at page {} of {page_count} ({start:?})", start.page());

        Ok(Self {
            document,
            book_title: None,
            page_count,
            current_page: start.page(),
            page_text: String::new(),
            rendered_page: None,
            narrator: Narrator::new(engine),
            bookmark_notice: None,
            notice_duration: BOOKMARK_NOTICE_DURATION,
            messages: MessageLog::default(),
        })
    }

    pub fn with_notice_duration(mut self, duration: Duration) -> Self {
        self.notice_duration = duration;
        self
    }

    /// Catalog title of the book, shown in preference to document metadata.
    pub fn with_book_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.book_title = (!title.trim().is_empty()).then_some(title);
        self
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_text(&self) -> &str {
        &self.page_text
    }

    pub fn title(&self) -> Option<&str> {
        self.book_title.as_deref().or_else(|| self.document.title())
    }

    pub fn narration_state(&self) -> NarrationState {
        self.narrator.state()
    }

    pub fn narration_disabled(&self) -> bool {
        self.narrator.is_disabled()
    }

    /// True when the current page still has to go through the render step.
    pub fn needs_render(&self) -> bool {
        self.rendered_page != Some(self.current_page)
    }

    /// Text currently shown as bookmark confirmation, empty once it expired.
    pub fn bookmark_notice(&self) -> &str {
        match &self.bookmark_notice {
            Some(notice) if !notice.is_expired() => &notice.text,
            _ => "",
        }
    }

    pub fn current_message(&self) -> Option<&Notice> {
        self.messages.latest()
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.messages.push(Severity::Error, message);
    }

    /// Adopt freshly extracted text for a rendered page.
    ///
    /// Narration is cancelled first. Rendering the same page twice just
    /// replaces its text; a render for a page we already left is dropped.
    pub fn on_page_rendered(&mut self, page_index: usize, extracted_text: String) {
        self.narrator.stop();
        if page_index != self.current_page {
            debug!(
                "Dropping stale render of page {page_index}, now on {}",
                self.current_page
            );
            return;
        }
        self.page_text = extracted_text;
        self.rendered_page = Some(page_index);
    }

    /// Extract the current page's text and hand it to [`Self::on_page_rendered`].
    pub fn render_current_page(&mut self) -> Result<(), ReaderError> {
        let page = self.current_page;
        let text = self.document.page_text(page)?;
        self.on_page_rendered(page, text);
        Ok(())
    }

    /// Move to `target`, clamped into the document. Returns whether the page
    /// changed; an unchanged page leaves narration alone.
    pub fn go_to_page(&mut self, target: i64) -> bool {
        let clamped = clamp_page(target, self.page_count);
        if clamped == self.current_page {
            return false;
        }
        self.narrator.stop();
        self.current_page = clamped;
        self.page_text.clear();
        self.rendered_page = None;
        debug!("Moved to page {clamped}");
        true
    }

    pub fn previous_page(&mut self) -> bool {
        self.go_to_page(self.current_page as i64 - 1)
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.current_page as i64 + 1)
    }

    /// Persist the current page through `persist`.
    ///
    /// Success shows a short-lived confirmation. Failure clears any
    /// confirmation, queues an error message and returns the error.
    pub fn save_bookmark<P>(&mut self, persist: P) -> Result<(), ReaderError>
    where
        P: FnOnce(usize) -> anyhow::Result<()>,
    {
        let page = self.current_page;
        match persist(page) {
            Ok(()) => {
                info!("Bookmark saved at page {page}");
                self.bookmark_notice = Some(Notice::new(
                    BOOKMARK_SAVED,
                    Severity::Info,
                    self.notice_duration,
                ));
                Ok(())
            }
            Err(e) => {
                error!("Failed to save bookmark at page {page}: {e:#}");
                self.bookmark_notice = None;
                self.messages.push(Severity::Error, format!("{e:#}"));
                Err(ReaderError::BookmarkSave(e))
            }
        }
    }

    pub fn toggle_playback(&mut self) {
        match self.narrator.toggle(&self.page_text) {
            ToggleOutcome::Changed(state) => debug!("Narration now {}", state.label()),
            ToggleOutcome::Unsupported { first_report: true } => {
                self.messages.push(Severity::Warning, SPEECH_UNSUPPORTED);
            }
            ToggleOutcome::Unsupported { first_report: false } => {}
            ToggleOutcome::StartFailed => {}
        }
    }

    pub fn stop_playback(&mut self) {
        self.narrator.stop();
    }

    /// Periodic housekeeping: expire notices and apply engine events.
    pub fn tick(&mut self) {
        if self
            .bookmark_notice
            .as_ref()
            .is_some_and(Notice::is_expired)
        {
            self.bookmark_notice = None;
        }
        self.messages.prune();
        self.narrator.poll();
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.narrator.stop();
    }
}

impl std::fmt::Debug for ReaderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSession")
            .field("page_count", &self.page_count)
            .field("current_page", &self.current_page)
            .field("page_text_len", &self.page_text.len())
            .field("narrator", &self.narrator)
            .finish_non_exhaustive()
    }
}
