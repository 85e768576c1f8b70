use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

pub const CURRENT_VERSION: u32 = 1;
pub const APP_NAME: &str = "librovault";
const SETTINGS_FILENAME: &str = "config.yaml";

pub const ENV_API_URL: &str = "LIBROVAULT_API_URL";
pub const ENV_AUTH_URL: &str = "LIBROVAULT_AUTH_URL";
pub const ENV_AUTH_ANON_KEY: &str = "LIBROVAULT_AUTH_ANON_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Backend REST API root (without the `/api` suffix).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Identity provider root (without the `/auth/v1` suffix).
    #[serde(default)]
    pub auth_url: String,

    #[serde(default)]
    pub auth_anon_key: String,

    #[serde(default = "default_page_size")]
    pub catalog_page_size: u32,

    #[serde(default = "default_notice_duration_ms")]
    pub notice_duration_ms: u64,

    /// Speech synthesizer; empty means the platform default.
    #[serde(default)]
    pub speech_command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub speech_args: Vec<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_page_size() -> u32 {
    crate::api::DEFAULT_PAGE_SIZE
}

fn default_notice_duration_ms() -> u64 {
    crate::notification::BOOKMARK_NOTICE_DURATION.as_millis() as u64
}

fn default_request_timeout_secs() -> u64 {
    crate::api::DEFAULT_TIMEOUT.as_secs()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            api_url: default_api_url(),
            auth_url: String::new(),
            auth_anon_key: String::new(),
            catalog_page_size: default_page_size(),
            notice_duration_ms: default_notice_duration_ms(),
            speech_command: String::new(),
            speech_args: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Settings {
    /// Environment variables win over the file for the endpoints and key.
    pub fn with_env_overrides(mut self) -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        if let Some(url) = read(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(url) = read(ENV_AUTH_URL) {
            self.auth_url = url;
        }
        if let Some(key) = read(ENV_AUTH_ANON_KEY) {
            self.auth_anon_key = key;
        }
        self
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn speech_program(&self) -> &str {
        if self.speech_command.trim().is_empty() {
            crate::reader::DEFAULT_SPEECH_COMMAND
        } else {
            &self.speech_command
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# librovault configuration
#
# api_url / auth_url / auth_anon_key can be overridden with
# LIBROVAULT_API_URL, LIBROVAULT_AUTH_URL and LIBROVAULT_AUTH_ANON_KEY.
# speech_command: leave empty for the platform synthesizer (say / espeak-ng).

"#;

/// Effective settings: the loaded file with environment overrides applied.
pub fn current() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_default()
        .with_env_overrides()
}

pub fn get_catalog_page_size() -> u32 {
    SETTINGS
        .read()
        .map(|s| s.catalog_page_size)
        .unwrap_or_else(|_| default_page_size())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        unsafe {
            std::env::remove_var(ENV_API_URL);
            std::env::remove_var(ENV_AUTH_URL);
            std::env::remove_var(ENV_AUTH_ANON_KEY);
        }
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_yaml::from_str("auth_anon_key: abc\n").unwrap();
        assert_eq!(settings.auth_anon_key, "abc");
        assert_eq!(settings.api_url, "http://localhost:5000");
        assert_eq!(settings.catalog_page_size, 12);
        assert_eq!(settings.notice_duration(), Duration::from_secs(2));
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn empty_speech_command_uses_platform_default() {
        let mut settings = Settings::default();
        assert_eq!(settings.speech_program(), crate::reader::DEFAULT_SPEECH_COMMAND);
        settings.speech_command = "festival".into();
        assert_eq!(settings.speech_program(), "festival");
    }

    #[test]
    #[serial]
    fn env_overrides_file_values() {
        clear_env();
        unsafe {
            std::env::set_var(ENV_API_URL, "https://books.example.com");
            std::env::set_var(ENV_AUTH_ANON_KEY, "  ");
        }

        let settings = Settings {
            auth_anon_key: "from-file".into(),
            ..Settings::default()
        }
        .with_env_overrides();

        assert_eq!(settings.api_url, "https://books.example.com");
        assert_eq!(settings.auth_anon_key, "from-file");
        clear_env();
    }

    #[test]
    #[serial]
    fn old_version_is_migrated_and_rewritten() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "version: 0\ncatalog_page_size: 24\n").unwrap();

        load_settings_from_path(&path);

        assert_eq!(get_catalog_page_size(), 24);
        assert_eq!(current().version, CURRENT_VERSION);
        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.starts_with("# librovault configuration"));
        assert!(rewritten.contains("version: 1"));

        if let Ok(mut global) = SETTINGS.write() {
            *global = Settings::default();
        }
    }

    #[test]
    #[serial]
    fn unparsable_file_keeps_previous_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "catalog_page_size: [oops").unwrap();

        load_settings_from_path(&path);
        assert_eq!(get_catalog_page_size(), 12);
    }
}
