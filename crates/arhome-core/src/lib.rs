//! AR Home Designer Core - Surface tracking and furniture placement
//!
//! This crate provides the collaborator-free heart of AR Home Designer:
//! - Pose decoding for the 4x4 transforms reported by the AR subsystem
//! - The tracking indicator (the ring that snaps to detected surfaces)
//! - The asset registry of furniture templates, populated asynchronously
//! - The placement state machine (per-frame hit tests, commit on select)
//! - The session lifecycle manager, generic over an AR backend
//! - Configuration and the furniture catalog

pub mod app;
pub mod config;
pub mod indicator;
pub mod message;
pub mod placement;
pub mod pose;
pub mod registry;
pub mod session;

pub use app::{ArHome, PlacedInstance};
pub use config::{ArHomeConfig, ConfigError, IndicatorConfig, ModelEntry, SessionConfig, UiConfig};
pub use indicator::TrackingIndicator;
pub use message::{FrameSample, RawMatrix, UiSignal, XrInbox, XrMessage};
pub use placement::{FrameOutcome, Placement, PlacementSkip, PlacementStateMachine, TrackingState};
pub use pose::{Pose, PoseError};
pub use registry::{AssetError, AssetRegistry, AssetStatus};
pub use session::{
    sample_frame, FrameHandles, ReferenceSpaceKind, SessionError, SessionInit, SessionManager,
    SessionMode, XrBackend, XrError, XrSession,
};
