//! Messages passed from host callbacks into the application state
//!
//! AR frame callbacks, select events, DOM handlers and asset loads all run
//! outside the application's tick. They push [`XrMessage`]s into a shared
//! [`XrInbox`], which the application drains once per tick in arrival order.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Column-major 4x4 matrix as reported by the AR subsystem
pub type RawMatrix = [f32; 16];

/// Everything one AR frame contributes to placement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    /// Hit-test results in subsystem order (nearest first). `None` when a
    /// hit could not be expressed in the local reference space.
    #[serde(default)]
    pub hits: Vec<Option<RawMatrix>>,
    /// Viewer pose in the local reference space, if tracked
    #[serde(default)]
    pub viewer: Option<RawMatrix>,
}

impl FrameSample {
    /// Frame with no hit-test results
    pub fn empty() -> Self {
        Self::default()
    }

    /// Frame whose hits are the given matrices
    pub fn with_hits(hits: impl IntoIterator<Item = RawMatrix>) -> Self {
        Self {
            hits: hits.into_iter().map(Some).collect(),
            viewer: None,
        }
    }
}

/// Input to [`crate::ArHome::handle`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum XrMessage {
    /// Session granted and frame loop running
    SessionStarted,
    /// One animation frame
    Frame(FrameSample),
    /// User tapped while in AR
    Select,
    /// User picked a model from the menu
    SelectAsset(String),
    /// User dismissed the current pick
    ClearSelection,
    /// Session ended (by us or by the user agent)
    SessionEnded,
    /// Session could not be started
    ActivationFailed(String),
    /// Asset load failed. Successful loads carry a template and are
    /// registered directly through [`crate::ArHome::registry_mut`].
    AssetFailed { id: String, reason: String },
}

/// Notifications for the UI collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum UiSignal {
    /// Hide the enter button, show the furniture menu
    SessionStarted,
    /// First surface found this session; reveal the placement hint
    Stabilized,
    /// A model was picked from the menu
    AssetSelected(String),
    /// Show the single activation failure notice
    ActivationFailed(String),
    /// Session is over; restore the enter button
    SessionEnded,
}

/// Shared message queue between host callbacks and the application tick
#[derive(Debug, Clone, Default)]
pub struct XrInbox(Arc<Mutex<Vec<XrMessage>>>);

impl XrInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: XrMessage) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push(message);
        }
    }

    /// Take every queued message in arrival order
    pub fn drain(&self) -> Vec<XrMessage> {
        match self.0.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
