//! Asset registry - furniture templates keyed by model id
//!
//! Models load asynchronously and may arrive in any order relative to
//! frames and select signals. Each id therefore carries a typed load state,
//! and anything that is not [`AssetStatus::Ready`] reads as not found.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Asset not found: {id} ({status})")]
    NotFound { id: String, status: AssetStatus },
}

/// Load state of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Never requested or registered
    Unknown,
    /// Load started, not finished
    Loading,
    /// Template available for cloning
    Ready,
    /// Load finished with an error
    Failed,
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssetStatus::Unknown => "unknown",
            AssetStatus::Loading => "loading",
            AssetStatus::Ready => "ready",
            AssetStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
enum Slot<A> {
    Loading,
    Ready(A),
    Failed(String),
}

/// Registry of immutable asset templates
///
/// Templates are never handed out by value; [`clone_asset`] returns an
/// independent copy and leaves the template in place.
///
/// [`clone_asset`]: AssetRegistry::clone_asset
#[derive(Debug, Clone)]
pub struct AssetRegistry<A> {
    slots: HashMap<String, Slot<A>>,
}

impl<A> Default for AssetRegistry<A> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<A> AssetRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that loading of `id` has started
    ///
    /// A template that is already ready stays ready.
    pub fn mark_loading(&mut self, id: impl Into<String>) {
        let id = id.into();
        match self.slots.get(&id) {
            Some(Slot::Ready(_)) => {}
            _ => {
                debug!(asset = %id, "Asset loading");
                self.slots.insert(id, Slot::Loading);
            }
        }
    }

    /// Insert or overwrite a loaded template
    pub fn register(&mut self, id: impl Into<String>, asset: A) {
        let id = id.into();
        info!(asset = %id, "Asset registered");
        self.slots.insert(id, Slot::Ready(asset));
    }

    /// Record a failed load. The id stays unavailable; nothing is retried.
    pub fn mark_failed(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        let id = id.into();
        let reason = reason.into();
        warn!(asset = %id, reason = %reason, "Asset failed to load");
        self.slots.insert(id, Slot::Failed(reason));
    }

    pub fn status(&self, id: &str) -> AssetStatus {
        match self.slots.get(id) {
            None => AssetStatus::Unknown,
            Some(Slot::Loading) => AssetStatus::Loading,
            Some(Slot::Ready(_)) => AssetStatus::Ready,
            Some(Slot::Failed(_)) => AssetStatus::Failed,
        }
    }

    pub fn is_ready(&self, id: &str) -> bool {
        self.status(id) == AssetStatus::Ready
    }

    /// Failure reason of a failed load
    pub fn failure(&self, id: &str) -> Option<&str> {
        match self.slots.get(id) {
            Some(Slot::Failed(reason)) => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Borrow a loaded template
    pub fn get(&self, id: &str) -> Result<&A, AssetError> {
        match self.slots.get(id) {
            Some(Slot::Ready(asset)) => Ok(asset),
            _ => Err(AssetError::NotFound {
                id: id.to_string(),
                status: self.status(id),
            }),
        }
    }

    /// Known ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of templates ready for cloning
    pub fn ready_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }
}

impl<A: Clone> AssetRegistry<A> {
    /// Fresh copy of a loaded template
    pub fn clone_asset(&self, id: &str) -> Result<A, AssetError> {
        self.get(id).cloned()
    }
}
