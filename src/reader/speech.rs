//! Narration through a system speech program (`espeak-ng`, `say`, ...)
//!
//! Each utterance is one child process with the text as its last argument,
//! after a `--` so text starting with a dash is never read as an option.
//! Pause and resume stop and continue the process with job-control signals,
//! so playback picks up exactly where it was suspended.

use std::env;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use log::{debug, warn};

use super::narration::{EngineEvent, PlaybackEngine, SpeechError, UtteranceId};

#[cfg(target_os = "macos")]
pub const DEFAULT_SPEECH_COMMAND: &str = "say";
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_SPEECH_COMMAND: &str = "espeak-ng";

struct Utterance {
    id: UtteranceId,
    child: Child,
}

pub struct SpeechCommandEngine {
    program: String,
    args: Vec<String>,
    active: Option<Utterance>,
    supported: bool,
}

impl SpeechCommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let supported = cfg!(unix) && program_available(&program);
        if !supported {
            debug!("Speech program {program:?} not found on PATH");
        }
        Self {
            program,
            args,
            active: None,
            supported,
        }
    }

    fn signal(&self, signal: i32) {
        #[cfg(unix)]
        if let Some(utterance) = &self.active {
            let pid = utterance.child.id() as libc::pid_t;
            // SAFETY: pid belongs to a child we spawned and have not reaped yet.
            let rc = unsafe { libc::kill(pid, signal) };
            if rc != 0 {
                warn!(
                    "Failed to signal speech process {pid}: {}",
                    std::io::Error::last_os_error()
                );
            }
        }
        #[cfg(not(unix))]
        let _ = signal;
    }
}

impl PlaybackEngine for SpeechCommandEngine {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn speak(&mut self, id: UtteranceId, text: &str) -> Result<(), SpeechError> {
        if !self.supported {
            return Err(SpeechError::Unsupported);
        }
        self.cancel();

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!("Spawned speech process {} for utterance {}", child.id(), id.0);
        self.active = Some(Utterance { id, child });
        Ok(())
    }

    fn pause(&mut self) {
        #[cfg(unix)]
        self.signal(libc::SIGSTOP);
    }

    fn resume(&mut self) {
        #[cfg(unix)]
        self.signal(libc::SIGCONT);
    }

    fn cancel(&mut self) {
        if let Some(mut utterance) = self.active.take() {
            // SIGKILL also terminates a stopped process.
            if let Err(e) = utterance.child.kill() {
                debug!("Speech process already gone: {e}");
            }
            let _ = utterance.child.wait();
        }
    }

    fn poll_event(&mut self) -> Option<EngineEvent> {
        let utterance = self.active.as_mut()?;
        let event = match utterance.child.try_wait() {
            Ok(None) => return None,
            Ok(Some(status)) if status.success() => EngineEvent::Finished(utterance.id),
            Ok(Some(status)) => EngineEvent::Failed {
                id: utterance.id,
                reason: format!("{} exited with {status}", self.program),
            },
            Err(e) => EngineEvent::Failed {
                id: utterance.id,
                reason: e.to_string(),
            },
        };
        self.active = None;
        Some(event)
    }
}

impl Drop for SpeechCommandEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn program_available(program: &str) -> bool {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

#[cfg(all(test, unix))]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    fn wait_for_event(engine: &mut SpeechCommandEngine) -> Option<EngineEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(event) = engine.poll_event() {
                return Some(event);
            }
            thread::sleep(Duration::from_millis(10));
        }
        None
    }

    #[test]
    fn missing_program_is_unsupported() {
        let mut engine = SpeechCommandEngine::new("definitely-not-a-speech-program", vec![]);
        assert!(!engine.is_supported());
        assert!(matches!(
            engine.speak(UtteranceId(1), "hello"),
            Err(SpeechError::Unsupported)
        ));
    }

    #[test]
    fn successful_exit_reports_finished() {
        // `true` ignores its arguments and exits 0
        let mut engine = SpeechCommandEngine::new("true", vec![]);
        assert!(engine.is_supported());
        engine.speak(UtteranceId(7), "hello").unwrap();

        assert_eq!(
            wait_for_event(&mut engine),
            Some(EngineEvent::Finished(UtteranceId(7)))
        );
        assert!(engine.poll_event().is_none());
    }

    #[test]
    fn dash_leading_text_is_not_an_option() {
        // `basename` prints its operand and fails on unknown options
        let mut engine = SpeechCommandEngine::new("basename", vec![]);
        engine.speak(UtteranceId(4), "- Item one").unwrap();

        assert_eq!(
            wait_for_event(&mut engine),
            Some(EngineEvent::Finished(UtteranceId(4)))
        );
    }

    #[test]
    fn failing_exit_reports_failure() {
        let mut engine = SpeechCommandEngine::new("false", vec![]);
        engine.speak(UtteranceId(3), "hello").unwrap();

        match wait_for_event(&mut engine) {
            Some(EngineEvent::Failed { id, .. }) => assert_eq!(id, UtteranceId(3)),
            other => panic!("expected failure event, got {other:?}"),
        }
    }

    #[test]
    fn cancel_kills_running_utterance() {
        let mut engine = SpeechCommandEngine::new("sleep", vec![]);
        engine.speak(UtteranceId(1), "30").unwrap();
        engine.pause();
        engine.resume();
        engine.cancel();

        assert!(engine.poll_event().is_none());
        engine.cancel();
    }
}
