//! Narration playback state machine
//!
//! The [`Narrator`] owns the `Idle -> Speaking <-> Paused` state and talks to
//! the audio side only through the [`PlaybackEngine`] trait. Engine callbacks
//! (utterance finished, utterance failed) arrive as [`EngineEvent`]s that are
//! polled by the owner and turned into state transitions here.

use log::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NarrationState {
    #[default]
    Idle,
    Speaking,
    Paused,
}

impl NarrationState {
    pub fn label(&self) -> &'static str {
        match self {
            NarrationState::Idle => "Idle",
            NarrationState::Speaking => "Speaking",
            NarrationState::Paused => "Paused",
        }
    }
}

/// Identifies one utterance handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Finished(UtteranceId),
    Failed { id: UtteranceId, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("text-to-speech is not supported on this system")]
    Unsupported,

    #[error("speech engine failed to start: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Narrow interface over a speech synthesizer.
///
/// At most one utterance is active; `speak` replaces whatever was playing.
pub trait PlaybackEngine {
    fn is_supported(&self) -> bool;

    fn speak(&mut self, id: UtteranceId, text: &str) -> Result<(), SpeechError>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Halt output immediately. Must be safe to call when nothing is playing.
    fn cancel(&mut self);

    fn poll_event(&mut self) -> Option<EngineEvent>;
}

/// Result of a toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Changed(NarrationState),
    /// Speech is unavailable; `first_report` is true only the first time.
    Unsupported { first_report: bool },
    /// The engine refused to start the utterance; state stays `Idle`.
    StartFailed,
}

pub struct Narrator {
    engine: Box<dyn PlaybackEngine>,
    state: NarrationState,
    current: Option<UtteranceId>,
    next_id: u64,
    disabled: bool,
}

impl Narrator {
    pub fn new(engine: Box<dyn PlaybackEngine>) -> Self {
        Self {
            engine,
            state: NarrationState::Idle,
            current: None,
            next_id: 1,
            disabled: false,
        }
    }

    pub fn state(&self) -> NarrationState {
        self.state
    }

    /// True once speech was found unsupported for this session.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn toggle(&mut self, text: &str) -> ToggleOutcome {
        if self.disabled {
            return ToggleOutcome::Unsupported {
                first_report: false,
            };
        }
        if !self.engine.is_supported() {
            self.disabled = true;
            warn!("Text-to-speech unavailable, narration disabled for this session");
            return ToggleOutcome::Unsupported { first_report: true };
        }

        match self.state {
            NarrationState::Idle => self.start(text),
            NarrationState::Speaking => {
                self.engine.pause();
                self.state = NarrationState::Paused;
                ToggleOutcome::Changed(self.state)
            }
            NarrationState::Paused => {
                self.engine.resume();
                self.state = NarrationState::Speaking;
                ToggleOutcome::Changed(self.state)
            }
        }
    }

    fn start(&mut self, text: &str) -> ToggleOutcome {
        self.engine.cancel();
        let id = UtteranceId(self.next_id);
        self.next_id += 1;

        match self.engine.speak(id, text) {
            Ok(()) => {
                debug!("Narration started ({} chars, utterance {})", text.len(), id.0);
                self.current = Some(id);
                self.state = NarrationState::Speaking;
                ToggleOutcome::Changed(self.state)
            }
            Err(SpeechError::Unsupported) => {
                self.disabled = true;
                self.reset();
                ToggleOutcome::Unsupported { first_report: true }
            }
            Err(e) => {
                error!("Failed to start narration: {e}");
                self.reset();
                ToggleOutcome::StartFailed
            }
        }
    }

    /// Force `Idle`, halting audio. Idempotent.
    pub fn stop(&mut self) {
        if self.state != NarrationState::Idle || self.current.is_some() {
            self.engine.cancel();
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = NarrationState::Idle;
        self.current = None;
    }

    /// Drain engine events and apply completion or error transitions.
    /// Events for utterances that were already cancelled are dropped.
    pub fn poll(&mut self) {
        while let Some(event) = self.engine.poll_event() {
            match event {
                EngineEvent::Finished(id) if Some(id) == self.current => {
                    debug!("Narration finished (utterance {})", id.0);
                    self.reset();
                }
                EngineEvent::Failed { id, reason } if Some(id) == self.current => {
                    error!("An error occurred during speech synthesis: {reason}");
                    self.reset();
                }
                stale => debug!("Ignoring stale narration event {stale:?}"),
            }
        }
    }
}

impl std::fmt::Debug for Narrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Narrator")
            .field("state", &self.state)
            .field("current", &self.current)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}
