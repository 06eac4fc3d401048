use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::engine::DEFAULT_WORKERS;
use crate::infra::esi::DEFAULT_BASE_URL;

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "HaulScanner";
const APP_NAME: &str = "HaulScanner";
const SETTINGS_FILE: &str = "settings.json";

/// Process-wide settings, stored as JSON in the platform config directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    pub esi_base_url: String,
    /// Overrides the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Reference entries never expire when unset.
    pub cache_ttl_hours: Option<u64>,
    pub lookup_workers: usize,
    pub request_timeout_secs: u64,
    /// Mail address or character name sent to ESI in the user agent.
    pub contact: Option<String>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            esi_base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: None,
            cache_ttl_hours: None,
            lookup_workers: DEFAULT_WORKERS,
            request_timeout_secs: 30,
            contact: None,
        }
    }
}

impl ScannerSettings {
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_hours
            .map(|hours| Duration::from_secs(hours.saturating_mul(60 * 60)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Explicit `cache_dir`, else the platform cache directory.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.cache_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("haul-scanner-data"))
        })
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
}

pub fn settings_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings() -> ScannerSettings {
    settings_file()
        .and_then(|path| load_settings_from(&path))
        .unwrap_or_default()
}

pub fn load_settings_from(path: &std::path::Path) -> Option<ScannerSettings> {
    let data = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(settings) => Some(settings),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring malformed settings file");
            None
        }
    }
}

pub fn save_settings(settings: &ScannerSettings) -> Result<PathBuf, SettingsSaveError> {
    let path = settings_file().ok_or(SettingsSaveError::StorageUnavailable)?;
    save_settings_to(&path, settings)?;
    Ok(path)
}

pub fn save_settings_to(
    path: &std::path::Path,
    settings: &ScannerSettings,
) -> Result<(), SettingsSaveError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsSaveError {
    #[error("storage directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(
            &path,
            r#"{"lookup_workers": 3, "cache_ttl_hours": 24, "contact": "hauler@example.com"}"#,
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.lookup_workers, 3);
        assert_eq!(settings.contact.as_deref(), Some("hauler@example.com"));
        assert_eq!(settings.cache_ttl(), Some(Duration::from_secs(86_400)));
        assert_eq!(settings.esi_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let settings = ScannerSettings {
            cache_dir: Some(dir.path().join("cache")),
            ..ScannerSettings::default()
        };

        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path), Some(settings.clone()));
        assert_eq!(settings.resolved_cache_dir(), dir.path().join("cache"));
    }

    #[test]
    fn malformed_file_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "lookup_workers = 3").unwrap();

        assert!(load_settings_from(&path).is_none());
    }
}
