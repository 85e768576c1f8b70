use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, error, info, warn};

use super::provider::{AuthError, IdentityProvider};
use super::session::Session;

const SESSION_FILENAME: &str = "session.json";
#[cfg(unix)]
const SESSION_FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

/// Holds the signed-in session and mirrors it to disk so the next process
/// invocation starts signed in.
#[derive(Debug)]
pub struct SessionStore {
    file_path: Option<PathBuf>,
    current: Option<Session>,
    subscribers: Vec<flume::Sender<AuthEvent>>,
}

impl SessionStore {
    pub fn ephemeral() -> Self {
        Self {
            file_path: None,
            current: None,
            subscribers: Vec::new(),
        }
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dir = dirs::data_dir()
            .context("Could not determine data directory")?
            .join(crate::settings::APP_NAME);
        Ok(dir.join(SESSION_FILENAME))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let current = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read session file {path:?}"))?;
            Some(serde_json::from_str(&content)?)
        } else {
            None
        };
        Ok(Self {
            file_path: Some(path.to_path_buf()),
            current,
            subscribers: Vec::new(),
        })
    }

    /// A corrupt session file means "signed out", not a hard failure.
    pub fn load_or_ephemeral(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                error!("Failed to load session from {path:?}: {e}");
                Self {
                    file_path: Some(path.to_path_buf()),
                    ..Self::ephemeral()
                }
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn subscribe(&mut self) -> flume::Receiver<AuthEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn set_session(&mut self, session: Session) -> Result<(), AuthError> {
        let refreshed = self
            .current
            .as_ref()
            .is_some_and(|old| old.user.id == session.user.id);
        self.current = Some(session.clone());
        self.save()?;
        self.broadcast(if refreshed {
            AuthEvent::TokenRefreshed(session)
        } else {
            AuthEvent::SignedIn(session)
        });
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), AuthError> {
        if self.current.take().is_none() {
            return Ok(());
        }
        if let Some(path) = &self.file_path {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        self.broadcast(AuthEvent::SignedOut);
        Ok(())
    }

    /// Current session, refreshed through `provider` when its token expired.
    /// A failed refresh signs the user out.
    pub fn active_session(
        &mut self,
        provider: &dyn IdentityProvider,
    ) -> Result<Session, AuthError> {
        let session = self.current.clone().ok_or(AuthError::NoSession)?;
        if !session.is_expired() {
            return Ok(session);
        }

        info!("Access token expired, refreshing");
        match provider.refresh(&session) {
            Ok(fresh) => {
                self.set_session(fresh.clone())?;
                Ok(fresh)
            }
            Err(e) => {
                warn!("Token refresh failed: {e}");
                self.clear()?;
                Err(AuthError::NoSession)
            }
        }
    }

    fn save(&self) -> Result<(), AuthError> {
        let (Some(path), Some(session)) = (&self.file_path, &self.current) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        let mut file = open_private(path)?;
        file.write_all(content.as_bytes())?;
        debug!("Saved session to {path:?}");
        Ok(())
    }

    fn broadcast(&mut self, event: AuthEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

/// Tokens are credentials: the file is readable by its owner only, including
/// a file left behind by an older build with wider permissions.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(SESSION_FILE_MODE)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(SESSION_FILE_MODE))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::test_utils::test_helpers::test_session;
    use tempfile::TempDir;

    #[test]
    fn session_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(SESSION_FILENAME);

        let mut store = SessionStore::load_from_file(&path).unwrap();
        assert!(store.current().is_none());
        store.set_session(test_session(Role::Admin)).unwrap();

        let reloaded = SessionStore::load_from_file(&path).unwrap();
        assert_eq!(reloaded.current(), Some(&test_session(Role::Admin)));
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SESSION_FILENAME);
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut store = SessionStore::load_or_ephemeral(Some(&path));
        store.set_session(test_session(Role::Reader)).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        let reloaded = SessionStore::load_from_file(&path).unwrap();
        assert_eq!(reloaded.current(), Some(&test_session(Role::Reader)));
    }

    #[test]
    fn clear_removes_file_and_notifies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SESSION_FILENAME);
        let mut store = SessionStore::load_from_file(&path).unwrap();
        let events = store.subscribe();

        store.set_session(test_session(Role::Reader)).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();

        assert!(!path.exists());
        assert!(matches!(events.try_recv(), Ok(AuthEvent::SignedIn(_))));
        assert_eq!(events.try_recv(), Ok(AuthEvent::SignedOut));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn same_user_is_token_refresh() {
        let mut store = SessionStore::ephemeral();
        let events = store.subscribe();

        store.set_session(test_session(Role::Reader)).unwrap();
        let mut renewed = test_session(Role::Reader);
        renewed.access_token = "renewed".to_string();
        store.set_session(renewed.clone()).unwrap();

        assert!(matches!(events.try_recv(), Ok(AuthEvent::SignedIn(_))));
        assert_eq!(events.try_recv(), Ok(AuthEvent::TokenRefreshed(renewed)));
    }

    #[test]
    fn corrupt_file_loads_signed_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SESSION_FILENAME);
        fs::write(&path, "{not json").unwrap();

        let store = SessionStore::load_or_ephemeral(Some(&path));
        assert!(store.current().is_none());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut store = SessionStore::ephemeral();
        drop(store.subscribe());
        store.set_session(test_session(Role::Reader)).unwrap();
        assert!(store.subscribers.is_empty());
    }
}
