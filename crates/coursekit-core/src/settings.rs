//! Settings Persistence
//!
//! Provides persistent coursekit settings with:
//! - Atomic file writes (temp file + fsync + rename)
//! - Tolerant loading: out-of-range values are clamped, bad files fall back to defaults
//! - Migration support for schema changes
//!
//! Storage location: {config_dir}/coursekit.json

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::captions::DEFAULT_LOOKAHEAD_MS;
use crate::error::{CoreError, CoreResult};
use crate::search::DEFAULT_PAGE_SIZE;

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "coursekit.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "coursekit.json.lock";

// =============================================================================
// Settings Schema
// =============================================================================

/// coursekit settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoursekitSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Course search endpoint settings
    #[serde(default)]
    pub search: SearchSettings,

    /// Caption playback settings
    #[serde(default)]
    pub captions: CaptionSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for CoursekitSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            search: SearchSettings::default(),
            captions: CaptionSettings::default(),
        }
    }
}

impl CoursekitSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Bad values are corrected rather than rejected, so an edited or stale
    /// file never prevents startup.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.search.page_size = self.search.page_size.clamp(1, 100);
        self.search.timeout_secs = self.search.timeout_secs.clamp(1, 300);
        self.search.search_path = normalize_path(&self.search.search_path);
        if let Some(course_id) = &self.search.course_id {
            if course_id.trim().is_empty() {
                self.search.course_id = None;
            }
        }

        self.captions.lookahead_ms = clamp_f64(self.captions.lookahead_ms, 0.0, 5000.0);
        self.captions.default_speed = clamp_f64(self.captions.default_speed, 0.25, 4.0);
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// Course search endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchSettings {
    /// Scheme and host of the LMS, e.g. "https://courses.example.com"
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_search_path")]
    pub search_path: String,

    /// Restricts searches to one course
    #[serde(default)]
    pub course_id: Option<String>,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_path: default_search_path(),
            course_id: None,
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_search_path() -> String {
    "/search/".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    30
}

/// Caption playback settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSettings {
    /// How far ahead of the player the highlighted caption runs
    #[serde(default = "default_lookahead_ms")]
    pub lookahead_ms: f64,

    #[serde(default = "default_speed")]
    pub default_speed: f64,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            lookahead_ms: default_lookahead_ms(),
            default_speed: default_speed(),
        }
    }
}

fn default_lookahead_ms() -> f64 {
    DEFAULT_LOOKAHEAD_MS
}

fn default_speed() -> f64 {
    1.0
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Settings manager for loading, saving, and resetting settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager rooted at `config_dir`
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            settings_path: config_dir.join(SETTINGS_FILE),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CoreError::SettingsError(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| {
                CoreError::SettingsError(format!("Failed to open settings lock file: {}", e))
            })?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file).map_err(|e| {
                CoreError::SettingsError(format!("Failed to lock settings file (exclusive): {}", e))
            })?;
        } else {
            fs2::FileExt::lock_shared(&lock_file).map_err(|e| {
                CoreError::SettingsError(format!("Failed to lock settings file (shared): {}", e))
            })?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> CoursekitSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(CoursekitSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)?;
            let mut settings = serde_json::from_str::<CoursekitSettings>(&content)?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
                settings = migrate(settings);
            }

            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                CoursekitSettings::default()
            }
        }
    }

    /// Save settings to disk; returns what was actually persisted
    pub fn save(&self, settings: &CoursekitSettings) -> CoreResult<CoursekitSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            let bytes = serde_json::to_vec_pretty(&normalized)?;
            atomic_write_bytes(&self.settings_path, &bytes)?;

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<CoursekitSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path)?;
                info!("Settings file deleted");
            }
            Ok(CoursekitSettings::default())
        })
    }
}

fn migrate(mut settings: CoursekitSettings) -> CoursekitSettings {
    settings.version = SETTINGS_VERSION;
    settings
}

/// Writes `bytes` to a sibling temp file, syncs it, then renames it over `path`
fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let tmp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    if cfg!(windows) && path.exists() {
        // Windows: rename does not overwrite.
        let backup_path = path.with_extension("json.bak");
        if backup_path.exists() {
            let _ = fs::remove_file(&backup_path);
        }
        fs::rename(path, &backup_path)?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::rename(&backup_path, path);
            let _ = fs::remove_file(&tmp_path);
            return Err(CoreError::Io(e));
        }
        let _ = fs::remove_file(&backup_path);
        return Ok(());
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // -------------------------------------------------------------------------
    // Schema Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_defaults() {
        let settings = CoursekitSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.search.search_path, "/search/");
        assert_eq!(settings.search.page_size, 20);
        assert_eq!(settings.search.timeout_secs, 30);
        assert!(settings.search.course_id.is_none());
        assert!((settings.captions.lookahead_ms - 100.0).abs() < f64::EPSILON);
        assert!((settings.captions.default_speed - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_clamps_out_of_range() {
        let mut settings = CoursekitSettings::default();
        settings.version = 0;
        settings.search.page_size = 0;
        settings.search.timeout_secs = 10_000;
        settings.search.search_path = "api/search".to_string();
        settings.search.course_id = Some("  ".to_string());
        settings.captions.lookahead_ms = -5.0;
        settings.captions.default_speed = f64::NAN;

        settings.normalize();

        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.search.page_size, 1);
        assert_eq!(settings.search.timeout_secs, 300);
        assert_eq!(settings.search.search_path, "/api/search/");
        assert!(settings.search.course_id.is_none());
        assert_eq!(settings.captions.lookahead_ms, 0.0);
        assert_eq!(settings.captions.default_speed, 0.25);
    }

    #[test]
    fn test_normalize_keeps_valid_values() {
        let mut settings = CoursekitSettings::default();
        settings.search.page_size = 50;
        settings.captions.default_speed = 1.5;
        let before = settings.clone();

        settings.normalize();
        assert_eq!(settings, before);
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let settings: CoursekitSettings =
            serde_json::from_str(r#"{"search": {"courseId": "edx101"}}"#).unwrap();
        assert_eq!(settings.search.course_id.as_deref(), Some("edx101"));
        assert_eq!(settings.search.search_path, "/search/");
        assert_eq!(settings.captions, CaptionSettings::default());
    }

    // -------------------------------------------------------------------------
    // Manager Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        assert_eq!(manager.load(), CoursekitSettings::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());

        let mut settings = CoursekitSettings::default();
        settings.search.base_url = "https://lms.example.com".to_string();
        settings.search.page_size = 500;

        let saved = manager.save(&settings).unwrap();
        assert_eq!(saved.search.page_size, 100);
        assert!(manager.settings_path().exists());
        assert!(!dir.path().join("coursekit.json.tmp").exists());

        let loaded = manager.load();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.search.base_url, "https://lms.example.com");
    }

    #[test]
    fn test_save_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());

        let mut settings = CoursekitSettings::default();
        settings.search.page_size = 10;
        manager.save(&settings).unwrap();
        settings.search.page_size = 30;
        manager.save(&settings).unwrap();

        assert_eq!(manager.load().search.page_size, 30);
    }

    #[test]
    fn test_load_corrupt_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        std::fs::write(manager.settings_path(), "{ not json").unwrap();

        assert_eq!(manager.load(), CoursekitSettings::default());
    }

    #[test]
    fn test_load_migrates_old_version() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        std::fs::write(
            manager.settings_path(),
            r#"{"version": 0, "search": {"pageSize": 0}}"#,
        )
        .unwrap();

        let loaded = manager.load();
        assert_eq!(loaded.version, SETTINGS_VERSION);
        assert_eq!(loaded.search.page_size, 1);
    }

    #[test]
    fn test_reset_deletes_file() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        manager.save(&CoursekitSettings::default()).unwrap();

        let reset = manager.reset().unwrap();
        assert_eq!(reset, CoursekitSettings::default());
        assert!(!manager.settings_path().exists());

        // Resetting twice is fine.
        assert!(manager.reset().is_ok());
    }

    #[test]
    fn test_manager_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let manager = SettingsManager::new(nested.clone());

        manager.save(&CoursekitSettings::default()).unwrap();
        assert!(nested.join(SETTINGS_FILE).exists());
    }
}
