// THEORY:
// Configuration is data handed to the engine, never something the engine fetches.
// Three pieces live here:
//
// 1.  **ThresholdConfig**: one similarity threshold per category. It is parsed
//     tolerantly because it usually comes straight out of a tablet's key-value store:
//     any entry that is missing or unusable falls back to the category default, and
//     the pre-category `similarityThreshold` key still seeds every category it can.
// 2.  **Migration**: a schema version makes the historical flash calibration fix
//     (0.50 -> 0.65) a one-shot upgrade. `migrate_thresholds` is a pure function;
//     parsing never migrates on its own, `ThresholdConfig::load` does both.
// 3.  **SettingsStore / EngineConfig**: a JSON file behind an `RwLock` for the
//     thresholds, and the engine's own tuning knobs.

use crate::core_modules::defect::DefectCategory;
use crate::core_modules::raster::CanonicalSize;
use crate::error::{InspectionError, Result};
use log::{info, warn};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

pub const MIN_THRESHOLD: f64 = 0.30;
pub const MAX_THRESHOLD: f64 = 0.90;
/// Schema written by this crate. Configs without a version are schema 1.
pub const THRESHOLD_SCHEMA_VERSION: u32 = 2;

const VERSION_KEY: &str = "version";
const LEGACY_GLOBAL_KEY: &str = "similarityThreshold";
const LEGACY_FLASH_THRESHOLD: f64 = 0.50;
const CORRECTED_FLASH_THRESHOLD: f64 = 0.65;

fn in_range(value: f64) -> bool {
    value.is_finite() && (MIN_THRESHOLD..=MAX_THRESHOLD).contains(&value)
}

/// Per-category similarity thresholds. Lower is more sensitive.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    version: u32,
    thresholds: BTreeMap<DefectCategory, f64>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            version: THRESHOLD_SCHEMA_VERSION,
            thresholds: DefectCategory::ALL
                .into_iter()
                .map(|c| (c, c.default_threshold()))
                .collect(),
        }
    }
}

impl ThresholdConfig {
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn get(&self, category: DefectCategory) -> f64 {
        self.thresholds
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_threshold())
    }

    /// Returns a copy with `category` set to `value`, rejecting values outside
    /// [0.30, 0.90].
    pub fn with_threshold(mut self, category: DefectCategory, value: f64) -> Result<Self> {
        if !in_range(value) {
            return Err(InspectionError::InvalidThreshold { category, value });
        }
        self.thresholds.insert(category, value);
        Ok(self)
    }

    /// Builds a config from a decoded JSON object. Never fails: unusable entries
    /// fall back to defaults with a warning. No migration is applied.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let version = map
            .get(VERSION_KEY)
            .and_then(Value::as_u64)
            .map_or(1, |v| u32::try_from(v).unwrap_or(u32::MAX));

        let legacy = map.get(LEGACY_GLOBAL_KEY).and_then(|value| {
            match value.as_f64().filter(|v| in_range(*v)) {
                Some(v) => Some(v),
                None => {
                    warn!("ignoring legacy {LEGACY_GLOBAL_KEY} value {value}");
                    None
                }
            }
        });

        let thresholds = DefectCategory::ALL
            .into_iter()
            .map(|category| {
                let entry = map
                    .get(category.key())
                    .or_else(|| map.get(category.operator_label()));
                let value = match entry {
                    Some(raw) => match raw.as_f64().filter(|v| in_range(*v)) {
                        Some(v) => v,
                        None => {
                            warn!(
                                "invalid {} threshold {raw}, using default {}",
                                category.key(),
                                category.default_threshold()
                            );
                            category.default_threshold()
                        }
                    },
                    None => legacy.unwrap_or_else(|| category.default_threshold()),
                };
                (category, value)
            })
            .collect();

        Self { version, thresholds }
    }

    /// Parses a stored config. Only malformed JSON is an error; a JSON value that is
    /// not an object yields the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(match value.as_object() {
            Some(map) => Self::from_map(map),
            None => {
                warn!("threshold config is not an object, using defaults");
                Self::default()
            }
        })
    }

    /// Parse plus the one-shot migration.
    pub fn load(json: &str) -> Result<Self> {
        Ok(migrate_thresholds(Self::from_json(json)?))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for ThresholdConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(DefectCategory::ALL.len() + 1))?;
        map.serialize_entry(VERSION_KEY, &self.version)?;
        for category in DefectCategory::ALL {
            map.serialize_entry(category.key(), &self.get(category))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ThresholdConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Map::deserialize(deserializer)?;
        Ok(Self::from_map(&map))
    }
}

/// Upgrades a schema-1 config: a flash threshold of exactly 0.50 becomes 0.65 and
/// the version is bumped. Schema-2 configs are returned unchanged.
pub fn migrate_thresholds(mut config: ThresholdConfig) -> ThresholdConfig {
    if config.version >= THRESHOLD_SCHEMA_VERSION {
        return config;
    }
    if config.get(DefectCategory::Flash) == LEGACY_FLASH_THRESHOLD {
        info!("migrating flash threshold {LEGACY_FLASH_THRESHOLD} -> {CORRECTED_FLASH_THRESHOLD}");
        config
            .thresholds
            .insert(DefectCategory::Flash, CORRECTED_FLASH_THRESHOLD);
    }
    config.version = THRESHOLD_SCHEMA_VERSION;
    config
}

/// File-backed threshold settings.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ThresholdConfig>,
}

impl SettingsStore {
    /// Opens the store at `path`. A missing or unreadable file starts from the
    /// defaults. If migration changes the stored config, the result is written back.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (loaded, stored) = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let parsed = ThresholdConfig::from_json(&contents).unwrap_or_else(|err| {
                warn!("failed to parse {}: {err}, using defaults", path.display());
                ThresholdConfig::default()
            });
            (parsed, true)
        } else {
            (ThresholdConfig::default(), false)
        };

        let migrated = migrate_thresholds(loaded.clone());
        let store = Self {
            path,
            data: RwLock::new(migrated.clone()),
        };
        if stored && migrated != loaded {
            store.persist(&migrated)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn update_thresholds(&self, config: ThresholdConfig) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    pub fn set_threshold(&self, category: DefectCategory, value: f64) -> Result<()> {
        let updated = self.thresholds().with_threshold(category, value)?;
        self.update_thresholds(updated)
    }

    pub fn reset(&self) -> Result<()> {
        self.update_thresholds(ThresholdConfig::default())
    }

    fn persist(&self, config: &ThresholdConfig) -> Result<()> {
        fs::write(&self.path, config.to_json()?)?;
        Ok(())
    }
}

fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

fn default_scan_interval_ms() -> u64 {
    500
}

/// Tuning knobs of the decision engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub canonical_size: CanonicalSize,
    /// Workers in the comparison pool.
    pub worker_count: usize,
    pub scan_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canonical_size: CanonicalSize::default(),
            worker_count: default_worker_count(),
            scan_interval_ms: default_scan_interval_ms(),
        }
    }
}

impl EngineConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }
}
