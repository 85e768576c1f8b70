//! Paged document reading with bookmarks and narration

pub mod document;
pub mod narration;
pub mod session;
pub mod speech;

pub use document::{DocumentError, PagedDocument, TextDocument, open_document};
pub use narration::{EngineEvent, NarrationState, Narrator, PlaybackEngine, SpeechError, UtteranceId};
pub use session::{ReaderError, ReaderSession, StartPosition, resolve_start_page};
pub use speech::{DEFAULT_SPEECH_COMMAND, SpeechCommandEngine};
