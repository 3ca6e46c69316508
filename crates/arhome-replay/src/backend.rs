//! Scripted AR backend
//!
//! Grants or refuses sessions the way the script's device does. Frames and
//! taps are fed in by the replay loop rather than a display clock.

use std::cell::{Cell, RefCell};

use arhome_core::{
    FrameHandles, FrameSample, RawMatrix, ReferenceSpaceKind, SessionInit, SessionMode, XrBackend,
    XrError, XrInbox, XrMessage, XrSession,
};
use tracing::debug;

use crate::script::DeviceScript;

pub struct ScriptedBackend {
    device: DeviceScript,
}

impl ScriptedBackend {
    pub fn new(device: DeviceScript) -> Self {
        Self { device }
    }
}

impl XrBackend for ScriptedBackend {
    type Session = ScriptedSession;

    async fn request_session(
        &self,
        mode: SessionMode,
        init: &SessionInit,
    ) -> Result<ScriptedSession, XrError> {
        if !self.device.supported || mode != SessionMode::ImmersiveAr {
            return Err(XrError::Unsupported(format!("{} sessions", mode)));
        }
        if self.device.deny {
            return Err(XrError::Denied("user declined".to_string()));
        }
        if let Some(missing) = init
            .required_features
            .iter()
            .find(|f| !self.device.features.contains(f))
        {
            return Err(XrError::FeatureUnavailable(missing.clone()));
        }

        let granted = init
            .optional_features
            .iter()
            .chain(&init.required_features)
            .filter(|f| self.device.features.contains(f))
            .cloned()
            .collect();
        Ok(ScriptedSession::new(granted))
    }
}

pub struct ScriptedSession {
    granted: Vec<String>,
    inbox: RefCell<Option<XrInbox>>,
    ended: Cell<bool>,
    next_source: Cell<u32>,
}

impl ScriptedSession {
    fn new(granted: Vec<String>) -> Self {
        Self {
            granted,
            inbox: RefCell::new(None),
            ended: Cell::new(false),
            next_source: Cell::new(1),
        }
    }

    pub fn granted(&self) -> &[String] {
        &self.granted
    }

    /// The user leaves AR through the browser
    pub fn host_end(&self) {
        if self.ended.replace(true) {
            return;
        }
        if let Some(inbox) = self.inbox.borrow().as_ref() {
            inbox.push(XrMessage::SessionEnded);
        }
    }
}

impl XrSession for ScriptedSession {
    type Space = ReferenceSpaceKind;
    type HitSource = u32;
    type Frame = FrameSample;
    type Hit = Option<RawMatrix>;

    async fn request_reference_space(
        &self,
        kind: ReferenceSpaceKind,
    ) -> Result<ReferenceSpaceKind, XrError> {
        Ok(kind)
    }

    async fn request_hit_test_source(&self, space: &ReferenceSpaceKind) -> Result<u32, XrError> {
        if !self.granted.iter().any(|f| f == "hit-test") {
            return Err(XrError::FeatureUnavailable("hit-test".to_string()));
        }
        let id = self.next_source.get();
        self.next_source.set(id + 1);
        debug!(source = id, space = space.as_str(), "Hit-test source created");
        Ok(id)
    }

    fn hit_test_results(&self, frame: &FrameSample, _source: &u32) -> Vec<Option<RawMatrix>> {
        frame.hits.clone()
    }

    fn hit_pose(&self, hit: &Option<RawMatrix>, _space: &ReferenceSpaceKind) -> Option<RawMatrix> {
        *hit
    }

    fn viewer_pose(&self, frame: &FrameSample, _space: &ReferenceSpaceKind) -> Option<RawMatrix> {
        frame.viewer
    }

    fn start(&self, _handles: FrameHandles<Self>, inbox: XrInbox) {
        *self.inbox.borrow_mut() = Some(inbox);
    }

    fn cancel_hit_test_source(&self, source: &u32) {
        debug!(source = *source, "Hit-test source cancelled");
    }

    fn end(&self) {
        self.ended.set(true);
    }

    fn has_ended(&self) -> bool {
        self.ended.get()
    }
}
