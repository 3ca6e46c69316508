//! AR session lifecycle
//!
//! The AR subsystem is reached through two traits: [`XrBackend`] grants
//! sessions and [`XrSession`] hands out reference spaces, hit-test sources and
//! per-frame results. [`SessionManager`] drives activation and teardown
//! against any backend and reports every transition through the shared
//! [`XrInbox`].
//!
//! All futures are single-threaded; browser handles are not `Send`.

use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::message::{FrameSample, RawMatrix, XrInbox, XrMessage};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XrError {
    #[error("AR is not supported on this device: {0}")]
    Unsupported(String),
    #[error("AR session request was denied: {0}")]
    Denied(String),
    #[error("Required AR capability unavailable: {0}")]
    FeatureUnavailable(String),
    #[error("AR host error: {0}")]
    Host(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("AR session activation failed: {0}")]
    ActivationFailed(#[from] XrError),
    #[error("An AR session is already active")]
    AlreadyActive,
}

/// Session mode passed to the AR subsystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    #[default]
    #[serde(rename = "immersive-ar")]
    ImmersiveAr,
    #[serde(rename = "immersive-vr")]
    ImmersiveVr,
    #[serde(rename = "inline")]
    Inline,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::ImmersiveAr => "immersive-ar",
            SessionMode::ImmersiveVr => "immersive-vr",
            SessionMode::Inline => "inline",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinate frames requested from the AR subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSpaceKind {
    /// Follows the device; origin of hit-test rays
    Viewer,
    /// Fixed near the session origin; poses are reported here
    Local,
    LocalFloor,
}

impl ReferenceSpaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceSpaceKind::Viewer => "viewer",
            ReferenceSpaceKind::Local => "local",
            ReferenceSpaceKind::LocalFloor => "local-floor",
        }
    }
}

/// Features and overlay options for a session request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInit {
    pub required_features: Vec<String>,
    pub optional_features: Vec<String>,
    /// Element id of the DOM overlay root; `None` means the document body
    pub dom_overlay_root: Option<String>,
}

impl From<&SessionConfig> for SessionInit {
    fn from(config: &SessionConfig) -> Self {
        Self {
            required_features: config.required_features.clone(),
            optional_features: config.optional_features.clone(),
            dom_overlay_root: config.dom_overlay_root.clone(),
        }
    }
}

impl SessionInit {
    pub fn wants_feature(&self, feature: &str) -> bool {
        self.required_features.iter().any(|f| f == feature)
            || self.optional_features.iter().any(|f| f == feature)
    }
}

/// Grants AR sessions
pub trait XrBackend {
    type Session: XrSession;

    fn request_session(
        &self,
        mode: SessionMode,
        init: &SessionInit,
    ) -> impl Future<Output = Result<Self::Session, XrError>>;
}

/// A granted AR session
pub trait XrSession: Sized {
    type Space: Clone;
    type HitSource: Clone;
    type Frame;
    type Hit;

    fn request_reference_space(
        &self,
        kind: ReferenceSpaceKind,
    ) -> impl Future<Output = Result<Self::Space, XrError>>;

    /// Hit-test source casting rays from the origin of `space`
    fn request_hit_test_source(
        &self,
        space: &Self::Space,
    ) -> impl Future<Output = Result<Self::HitSource, XrError>>;

    /// Results for one frame, nearest first
    fn hit_test_results(&self, frame: &Self::Frame, source: &Self::HitSource) -> Vec<Self::Hit>;

    /// Column-major pose of a hit in `space`
    fn hit_pose(&self, hit: &Self::Hit, space: &Self::Space) -> Option<RawMatrix>;

    /// Column-major viewer pose in `space`
    fn viewer_pose(&self, frame: &Self::Frame, space: &Self::Space) -> Option<RawMatrix>;

    /// Start delivering frames and select events into `inbox`
    ///
    /// Implementations call [`sample_frame`] once per animation frame and
    /// push [`XrMessage::Frame`], push [`XrMessage::Select`] on each select
    /// event, and push [`XrMessage::SessionEnded`] if the host ends the
    /// session on its own.
    fn start(&self, handles: FrameHandles<Self>, inbox: XrInbox);

    fn cancel_hit_test_source(&self, source: &Self::HitSource);

    /// Request the session to end. Fire and forget.
    fn end(&self);

    /// The host ended the session (user left AR, tab hidden, ...)
    fn has_ended(&self) -> bool;
}

/// Handles needed to sample a frame
pub struct FrameHandles<S: XrSession> {
    pub local_space: S::Space,
    pub hit_source: S::HitSource,
}

impl<S: XrSession> Clone for FrameHandles<S> {
    fn clone(&self) -> Self {
        Self {
            local_space: self.local_space.clone(),
            hit_source: self.hit_source.clone(),
        }
    }
}

/// Convert one AR frame into a [`FrameSample`] in the local reference space
pub fn sample_frame<S: XrSession>(
    session: &S,
    frame: &S::Frame,
    handles: &FrameHandles<S>,
) -> FrameSample {
    let hits = session
        .hit_test_results(frame, &handles.hit_source)
        .iter()
        .map(|hit| session.hit_pose(hit, &handles.local_space))
        .collect();

    FrameSample {
        hits,
        viewer: session.viewer_pose(frame, &handles.local_space),
    }
}

struct ActiveSession<S: XrSession> {
    session: S,
    /// Origin of the hit-test rays, held until the session is released
    viewer_space: S::Space,
    handles: FrameHandles<S>,
}

/// Owns the AR session and the resources acquired for it
pub struct SessionManager<B: XrBackend> {
    backend: B,
    mode: SessionMode,
    init: SessionInit,
    inbox: XrInbox,
    active: Option<ActiveSession<B::Session>>,
}

impl<B: XrBackend> SessionManager<B> {
    pub fn new(backend: B, config: &SessionConfig, inbox: XrInbox) -> Self {
        Self {
            backend,
            mode: config.mode,
            init: SessionInit::from(config),
            inbox,
            active: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn inbox(&self) -> &XrInbox {
        &self.inbox
    }

    /// A session is running and the host has not ended it
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.session.has_ended())
    }

    pub fn session(&self) -> Option<&B::Session> {
        self.active.as_ref().map(|active| &active.session)
    }

    pub fn handles(&self) -> Option<&FrameHandles<B::Session>> {
        self.active.as_ref().map(|active| &active.handles)
    }

    /// Sample a frame of the active session
    pub fn sample(&self, frame: &<B::Session as XrSession>::Frame) -> Option<FrameSample> {
        self.active
            .as_ref()
            .map(|active| sample_frame(&active.session, frame, &active.handles))
    }

    /// Request a session, acquire spaces and the hit-test source, and start
    /// the frame loop
    ///
    /// On failure `ActivationFailed` is pushed to the inbox once and the
    /// manager stays idle. There is no retry.
    pub async fn activate(&mut self) -> Result<(), SessionError> {
        if let Some(active) = &self.active {
            if !active.session.has_ended() {
                return Err(SessionError::AlreadyActive);
            }
            debug!("Releasing session ended by host");
            self.release(false);
        }

        info!(mode = %self.mode, "Requesting AR session");
        match self.open().await {
            Ok(active) => {
                active.session.start(active.handles.clone(), self.inbox.clone());
                self.active = Some(active);
                self.inbox.push(XrMessage::SessionStarted);
                info!("AR session active");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "AR session activation failed");
                self.inbox.push(XrMessage::ActivationFailed(e.to_string()));
                Err(SessionError::ActivationFailed(e))
            }
        }
    }

    /// Release the hit-test source, end the session and return to idle.
    /// Returns false if no session was active.
    pub fn deactivate(&mut self) -> bool {
        self.release(true)
    }

    async fn open(&self) -> Result<ActiveSession<B::Session>, XrError> {
        let session = self.backend.request_session(self.mode, &self.init).await?;

        match acquire(&session).await {
            Ok((viewer_space, handles)) => Ok(ActiveSession {
                session,
                viewer_space,
                handles,
            }),
            Err(e) => {
                debug!(error = %e, "Ending partially activated session");
                session.end();
                Err(e)
            }
        }
    }

    fn release(&mut self, end_session: bool) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        active.session.cancel_hit_test_source(&active.handles.hit_source);
        if end_session && !active.session.has_ended() {
            active.session.end();
        }
        drop(active.viewer_space);
        self.inbox.push(XrMessage::SessionEnded);
        info!("AR session released");
        true
    }
}

async fn acquire<S: XrSession>(session: &S) -> Result<(S::Space, FrameHandles<S>), XrError> {
    let viewer_space = session
        .request_reference_space(ReferenceSpaceKind::Viewer)
        .await?;
    let hit_source = session.request_hit_test_source(&viewer_space).await?;

    let local_space = match session
        .request_reference_space(ReferenceSpaceKind::Local)
        .await
    {
        Ok(space) => space,
        Err(e) => {
            session.cancel_hit_test_source(&hit_source);
            return Err(e);
        }
    };

    Ok((
        viewer_space,
        FrameHandles {
            local_space,
            hit_source,
        },
    ))
}
