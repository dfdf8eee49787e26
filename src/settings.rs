use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

/// Tunables for one client session. All fields have sensible defaults so a
/// missing or partial settings file never blocks startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Used when the remote document carries no `exposureTime`.
    pub default_exposure_secs: f64,
    /// Recompute cadence while a cycle is running.
    pub tick_interval_ms: u64,
    /// How many recent sensor readings the feed retains locally.
    pub readings_retention: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_exposure_secs: 30.0,
            tick_interval_ms: 1000,
            readings_retention: 50,
        }
    }
}

impl ClientSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// JSON-file-backed settings store. A malformed file falls back to defaults
/// rather than failing startup.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ClientSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            ClientSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn client(&self) -> ClientSettings {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, settings: ClientSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            *guard = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: ClientSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &ClientSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
