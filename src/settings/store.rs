use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::settings::error::Result;
use crate::settings::types::OverlayConfig;

pub const SETTINGS_FILE_NAME: &str = "overlay.json";

const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Persistent overlay configuration with debounced saving.
pub struct SettingsStore {
    path: PathBuf,
    data: Mutex<OverlayConfig>,
    save_notify: Notify,
    is_dirty: AtomicBool,
}

impl SettingsStore {
    /// Create a new store, loading from disk if the file exists.
    ///
    /// An unreadable or invalid file is logged and replaced by defaults
    /// rather than keeping the overlay from starting.
    pub fn new(path: PathBuf) -> Self {
        let data = match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring settings at {}: {e}", path.display());
                OverlayConfig::default()
            }
        };
        Self {
            path,
            data: Mutex::new(data),
            save_notify: Notify::new(),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Load settings from a JSON file, returning default on missing file.
    pub fn load(path: &Path) -> Result<OverlayConfig> {
        if !path.exists() {
            return Ok(OverlayConfig::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: OverlayConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save current settings to disk atomically (write .tmp then rename).
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().clone();
        let json = serde_json::to_string_pretty(&data)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Save now if a change is still waiting on the debounce timer.
    pub fn flush(&self) -> Result<()> {
        if self.is_dirty.swap(false, Ordering::AcqRel) {
            self.save()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> OverlayConfig {
        self.data.lock().clone()
    }

    /// Validate and store a new config. Triggers a debounced save.
    pub fn set(&self, config: OverlayConfig) -> Result<()> {
        config.validate()?;
        *self.data.lock() = config;
        self.mark_dirty();
        Ok(())
    }

    /// Restore defaults. Triggers a debounced save.
    pub fn reset(&self) -> OverlayConfig {
        let defaults = OverlayConfig::default();
        *self.data.lock() = defaults.clone();
        self.mark_dirty();
        defaults
    }

    fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
        self.save_notify.notify_one();
    }

    /// Start the debounce task. Waits for a dirty notification, sleeps 500ms, then saves.
    ///
    /// Uses an `AtomicBool` dirty flag to avoid losing notifications that arrive
    /// between `save()` completing and `notified().await` re-registering.
    pub fn start_debounce_task(self: &Arc<Self>) {
        let store = Arc::clone(self);
        tauri::async_runtime::spawn(async move {
            loop {
                store.save_notify.notified().await;
                tokio::time::sleep(SAVE_DEBOUNCE).await;
                if let Err(e) = store.flush() {
                    tracing::warn!("Failed to save settings: {e}");
                }
            }
        });
    }
}
