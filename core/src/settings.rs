//! Persisted operator preferences: whitelist, RSSI bounds, dwell mode and the
//! paths of the most recent run files.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::prelude::{DeviceKey, SightError, SightResult};

pub const DEFAULT_RSSI_MIN: i32 = -150;
pub const DEFAULT_RSSI_MAX: i32 = 0;

/// Preferences injected into the engine instead of ambient global state.
pub trait Preferences: Send + Sync {
    fn is_whitelisted(&self, key: &DeviceKey) -> bool;
    fn whitelist(&self) -> BTreeSet<String>;
    /// Returns `true` when membership actually changed.
    fn set_whitelisted(&self, key: &DeviceKey, whitelisted: bool) -> SightResult<bool>;
    fn rssi_bounds(&self) -> (i32, i32);
    fn set_rssi_bounds(&self, min: i32, max: i32) -> SightResult<()>;
    fn dwell_mode(&self) -> bool;
    fn set_dwell_mode(&self, enabled: bool) -> SightResult<()>;
    fn last_run(&self) -> RunPaths;
    fn set_last_run(&self, paths: RunPaths) -> SightResult<()>;
}

/// Locations of the files written by the most recent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunPaths {
    pub csv: Option<PathBuf>,
    pub kml: Option<PathBuf>,
    pub dwell_csv: Option<PathBuf>,
    /// Earlier generations left behind when a sink was recreated, oldest first.
    pub superseded_csv: Vec<PathBuf>,
    pub superseded_kml: Vec<PathBuf>,
}

impl RunPaths {
    /// Every CSV of the run in write order, current file last.
    pub fn csv_files(&self) -> Vec<PathBuf> {
        self.superseded_csv.iter().chain(&self.csv).cloned().collect()
    }

    pub fn kml_files(&self) -> Vec<PathBuf> {
        self.superseded_kml.iter().chain(&self.kml).cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct StoredPreferences {
    whitelist: BTreeSet<String>,
    rssi_min: i32,
    rssi_max: i32,
    dwell_mode: bool,
    last_run: RunPaths,
}

impl Default for StoredPreferences {
    fn default() -> Self {
        Self {
            whitelist: BTreeSet::new(),
            rssi_min: DEFAULT_RSSI_MIN,
            rssi_max: DEFAULT_RSSI_MAX,
            dwell_mode: false,
            last_run: RunPaths::default(),
        }
    }
}

/// JSON-file backed preferences. Every mutation is written through.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<StoredPreferences>,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> SightResult<Self> {
        let path = path.into();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "settings at {} unreadable ({}); starting from defaults",
                    path.display(),
                    err
                );
                StoredPreferences::default()
            })
        } else {
            StoredPreferences::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// Preferences that live only in memory; used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(StoredPreferences::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read<T>(&self, view: impl FnOnce(&StoredPreferences) -> T) -> T {
        match self.data.read() {
            Ok(guard) => view(&guard),
            Err(poisoned) => view(&poisoned.into_inner()),
        }
    }

    fn write<T>(&self, change: impl FnOnce(&mut StoredPreferences) -> T) -> SightResult<T> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| SightError::Settings("settings lock poisoned".into()))?;
        let mut staged = guard.clone();
        let result = change(&mut staged);
        self.persist(&staged)?;
        *guard = staged;
        Ok(result)
    }

    fn persist(&self, data: &StoredPreferences) -> SightResult<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let serialized =
            serde_json::to_string_pretty(data).map_err(|err| SightError::Settings(err.to_string()))?;
        fs::write(path, serialized)?;
        Ok(())
    }
}

impl Preferences for SettingsStore {
    fn is_whitelisted(&self, key: &DeviceKey) -> bool {
        let entry = key.to_string();
        self.read(|data| data.whitelist.contains(&entry))
    }

    fn whitelist(&self) -> BTreeSet<String> {
        self.read(|data| data.whitelist.clone())
    }

    fn set_whitelisted(&self, key: &DeviceKey, whitelisted: bool) -> SightResult<bool> {
        let entry = key.to_string();
        self.write(|data| {
            if whitelisted {
                data.whitelist.insert(entry)
            } else {
                data.whitelist.remove(&entry)
            }
        })
    }

    fn rssi_bounds(&self) -> (i32, i32) {
        self.read(|data| (data.rssi_min, data.rssi_max))
    }

    fn set_rssi_bounds(&self, min: i32, max: i32) -> SightResult<()> {
        if min > max {
            return Err(SightError::Settings(format!(
                "rssi minimum {} above maximum {}",
                min, max
            )));
        }
        self.write(|data| {
            data.rssi_min = min;
            data.rssi_max = max;
        })
    }

    fn dwell_mode(&self) -> bool {
        self.read(|data| data.dwell_mode)
    }

    fn set_dwell_mode(&self, enabled: bool) -> SightResult<()> {
        self.write(|data| data.dwell_mode = enabled)
    }

    fn last_run(&self) -> RunPaths {
        self.read(|data| data.last_run.clone())
    }

    fn set_last_run(&self, paths: RunPaths) -> SightResult<()> {
        self.write(|data| data.last_run = paths)
    }
}
