// THEORY:
// Reference samples are operator-registered example images of each defect kind. They
// are created once, never edited, and deleted explicitly, so a sample is an immutable
// value behind an `Arc`.
//
// Key architectural principles:
// 1.  **Copy-on-write library**: `ReferenceLibrary` keeps its samples in an
//     `Arc<Vec<Arc<ReferenceSample>>>`. Registration and deletion build a new vector
//     and swap it in; readers only clone the outer `Arc`. A `ReferenceSet` snapshot
//     taken before an analysis pass therefore never observes a concurrent change.
// 2.  **Storage shape**: samples serialise to the layout the inspection tablets
//     already store (`id`, `type`, `name`, `imageDataUrl`, `createdAt` in epoch
//     milliseconds), so an exported sample list can be loaded as-is.
// 3.  **Tolerant loading**: a malformed entry is dropped with a warning, and
//     unreadable storage yields an empty library. An untrained category simply
//     never reports a defect.

use crate::core_modules::defect::DefectCategory;
use crate::core_modules::raster::{decode_data_url, encode_data_url, sniff_mime};
use crate::error::Result;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// One registered example image of a defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSample {
    pub id: String,
    #[serde(rename = "type")]
    pub category: DefectCategory,
    pub name: String,
    /// Encoded image bytes.
    #[serde(rename = "imageDataUrl", with = "data_url")]
    pub payload: Vec<u8>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ReferenceSample {
    /// Creates a sample with a fresh id. An empty `name` becomes
    /// `"<display name> sample <ordinal>"`.
    pub fn register(category: DefectCategory, name: &str, payload: Vec<u8>, ordinal: usize) -> Self {
        let name = match name.trim() {
            "" => format!("{} sample {}", category.display_name(), ordinal),
            given => given.to_string(),
        };
        Self {
            id: Uuid::new_v4().to_string(),
            category,
            name,
            payload,
            created_at: Utc::now(),
        }
    }
}

mod data_url {
    use super::*;
    use serde::{Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(payload: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_data_url(sniff_mime(payload), payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
        let url = String::deserialize(deserializer)?;
        decode_data_url(&url).map_err(D::Error::custom)
    }
}

/// Immutable view of the library taken for one analysis pass.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    samples: Arc<Vec<Arc<ReferenceSample>>>,
}

impl ReferenceSet {
    pub fn new(samples: Vec<ReferenceSample>) -> Self {
        Self {
            samples: Arc::new(samples.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn for_category(&self, category: DefectCategory) -> impl Iterator<Item = &Arc<ReferenceSample>> + '_ {
        self.samples.iter().filter(move |s| s.category == category)
    }

    pub fn count(&self, category: DefectCategory) -> usize {
        self.for_category(category).count()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ReferenceSample>> + '_ {
        self.samples.iter()
    }
}

/// Mutable registry of reference samples.
#[derive(Debug, Default)]
pub struct ReferenceLibrary {
    samples: RwLock<Arc<Vec<Arc<ReferenceSample>>>>,
}

impl ReferenceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Arc<Vec<Arc<ReferenceSample>>> {
        self.samples.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace_with(&self, edit: impl FnOnce(&[Arc<ReferenceSample>]) -> Vec<Arc<ReferenceSample>>) {
        let mut guard = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        let next = edit(&guard);
        *guard = Arc::new(next);
    }

    pub fn register(&self, category: DefectCategory, name: &str, payload: Vec<u8>) -> Arc<ReferenceSample> {
        let mut guard = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        let ordinal = guard.iter().filter(|s| s.category == category).count() + 1;
        let sample = Arc::new(ReferenceSample::register(category, name, payload, ordinal));
        let mut next = guard.to_vec();
        next.push(sample.clone());
        *guard = Arc::new(next);
        sample
    }

    /// Adds an already-built sample, e.g. one imported from another station.
    pub fn insert(&self, sample: ReferenceSample) {
        let sample = Arc::new(sample);
        self.replace_with(|samples| {
            let mut next = samples.to_vec();
            next.push(sample);
            next
        });
    }

    /// Removes the sample with `id`. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> bool {
        let mut removed = false;
        self.replace_with(|samples| {
            let next: Vec<_> = samples.iter().filter(|s| s.id != id).cloned().collect();
            removed = next.len() != samples.len();
            next
        });
        removed
    }

    pub fn delete_all(&self) {
        self.replace_with(|_| Vec::new());
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    pub fn snapshot(&self) -> ReferenceSet {
        ReferenceSet {
            samples: self.current(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let current = self.current();
        let samples: Vec<&ReferenceSample> = current.iter().map(Arc::as_ref).collect();
        Ok(serde_json::to_string_pretty(&samples)?)
    }

    /// Loads a stored sample list. Entries that fail to parse are skipped; storage
    /// that is not a JSON array yields an empty library.
    pub fn from_json(json: &str) -> Self {
        let entries: Vec<serde_json::Value> = match serde_json::from_str(json) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("failed to parse stored samples, starting empty: {err}");
                return Self::new();
            }
        };

        let samples: Vec<Arc<ReferenceSample>> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value::<ReferenceSample>(entry) {
                Ok(sample) => Some(Arc::new(sample)),
                Err(err) => {
                    warn!("skipping stored sample #{index}: {err}");
                    None
                }
            })
            .collect();

        Self {
            samples: RwLock::new(Arc::new(samples)),
        }
    }
}
