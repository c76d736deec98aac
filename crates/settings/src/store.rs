//! Reloadable settings holder.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use crate::error::Result;
use crate::settings::Settings;

/// Holds the current [`Settings`] for one settings file.
///
/// Readers take an `Arc` snapshot with [`SettingsStore::current`]. A reload
/// parses the whole file first and only then swaps the pointer, so a snapshot
/// is always one complete document.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Arc<Settings>>,
}

impl SettingsStore {
    /// Load `path` and keep it as the current settings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = Settings::load(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(settings)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the settings currently in effect.
    pub fn current(&self) -> Arc<Settings> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-read the settings file and replace the current settings wholesale.
    ///
    /// If the file can no longer be loaded the previous settings stay in
    /// effect and the error is returned.
    pub fn reload(&self) -> Result<Arc<Settings>> {
        let settings = Arc::new(Settings::load(&self.path)?);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&settings);
        info!("Reloaded settings from {}", self.path.display());
        Ok(settings)
    }
}
