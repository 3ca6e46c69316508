//! WebXR backend
//!
//! Implements the core session traits on top of `navigator.xr`. The frame
//! loop samples hit-test results inside the animation frame callback, since
//! an `XRFrame` is only valid there, and forwards them through the inbox.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arhome_core::{
    sample_frame, FrameHandles, RawMatrix, ReferenceSpaceKind, SessionInit, SessionMode,
    XrBackend, XrError, XrInbox, XrMessage, XrSession,
};
use js_sys::{Array, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    HtmlCanvasElement, WebGl2RenderingContext, XrFrame, XrHitTestOptionsInit, XrHitTestResult,
    XrHitTestSource, XrReferenceSpace, XrReferenceSpaceType, XrRenderStateInit, XrRigidTransform,
    XrSessionInit, XrSessionMode, XrWebGlLayer,
};

type FrameCallback = Closure<dyn FnMut(f64, XrFrame)>;

/// Grants sessions from `navigator.xr`
#[derive(Debug, Default, Clone, Copy)]
pub struct WebXrBackend;

impl XrBackend for WebXrBackend {
    type Session = WebXrSession;

    async fn request_session(
        &self,
        mode: SessionMode,
        init: &SessionInit,
    ) -> Result<WebXrSession, XrError> {
        let window = web_sys::window().ok_or_else(|| XrError::Unsupported("no window".into()))?;
        let xr = window.navigator().xr();
        if xr.is_undefined() {
            return Err(XrError::Unsupported("navigator.xr is missing".into()));
        }

        let supported = JsFuture::from(xr.is_session_supported(session_mode(mode)))
            .await
            .map_err(|e| XrError::Host(describe(&e)))?;
        if !supported.as_bool().unwrap_or(false) {
            return Err(XrError::Unsupported(format!("{} sessions", mode)));
        }

        let options = session_init(init)?;
        let session = JsFuture::from(xr.request_session_with_options(session_mode(mode), &options))
            .await
            .map_err(|e| classify(&e))?
            .dyn_into::<web_sys::XrSession>()
            .map_err(|_| XrError::Host("requestSession resolved to a non-session".into()))?;

        let session = WebXrSession::new(session);
        if let Err(e) = session.attach_gl_layer() {
            session.end();
            return Err(e);
        }

        tracing::info!(mode = %mode, "WebXR session granted");
        Ok(session)
    }
}

/// A granted WebXR session
#[derive(Clone)]
pub struct WebXrSession {
    inner: web_sys::XrSession,
    ended: Rc<Cell<bool>>,
}

impl WebXrSession {
    fn new(inner: web_sys::XrSession) -> Self {
        Self {
            inner,
            ended: Rc::new(Cell::new(false)),
        }
    }

    /// The session will not render without a WebGL base layer, even though
    /// the scene itself is drawn by Bevy in the DOM overlay
    fn attach_gl_layer(&self) -> Result<(), XrError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| XrError::Host("no document".into()))?;
        let canvas = document
            .create_element("canvas")
            .map_err(|e| XrError::Host(describe(&e)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| XrError::Host("canvas element has the wrong type".into()))?;

        let attributes = Object::new();
        Reflect::set(&attributes, &"xrCompatible".into(), &JsValue::TRUE)
            .map_err(|e| XrError::Host(describe(&e)))?;
        let gl = canvas
            .get_context_with_context_options("webgl2", &attributes)
            .map_err(|e| XrError::Host(describe(&e)))?
            .ok_or_else(|| XrError::FeatureUnavailable("webgl2".into()))?
            .dyn_into::<WebGl2RenderingContext>()
            .map_err(|_| XrError::Host("webgl2 context has the wrong type".into()))?;

        let layer = XrWebGlLayer::new_with_web_gl2_rendering_context(&self.inner, &gl)
            .map_err(|e| XrError::Host(describe(&e)))?;
        let state = XrRenderStateInit::new();
        state.set_base_layer(Some(&layer));
        let _ = self.inner.update_render_state_with_state(&state);
        Ok(())
    }

    fn watch_end(&self, inbox: XrInbox) {
        let ended = self.ended.clone();
        let onend = Closure::wrap(Box::new(move |_: JsValue| {
            ended.set(true);
            tracing::info!("WebXR session ended by host");
            inbox.push(XrMessage::SessionEnded);
        }) as Box<dyn FnMut(JsValue)>);
        self.inner.set_onend(Some(onend.as_ref().unchecked_ref()));
        onend.forget();
    }

    fn watch_select(&self, inbox: XrInbox) {
        let onselect = Closure::wrap(Box::new(move |_: JsValue| {
            inbox.push(XrMessage::Select);
        }) as Box<dyn FnMut(JsValue)>);
        self.inner.set_onselect(Some(onselect.as_ref().unchecked_ref()));
        onselect.forget();
    }

    fn run_frame_loop(&self, handles: FrameHandles<Self>, inbox: XrInbox) {
        let callback: Rc<RefCell<Option<FrameCallback>>> = Rc::new(RefCell::new(None));
        let next = callback.clone();
        let session = self.clone();

        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move |_time: f64, frame: XrFrame| {
            if session.has_ended() {
                // Breaks the self-reference so the loop can be freed
                next.borrow_mut().take();
                return;
            }
            inbox.push(XrMessage::Frame(sample_frame(&session, &frame, &handles)));
            if let Some(cb) = next.borrow().as_ref() {
                session.inner.request_animation_frame(cb.as_ref().unchecked_ref());
            }
        }) as Box<dyn FnMut(f64, XrFrame)>));

        if let Some(cb) = callback.borrow().as_ref() {
            self.inner.request_animation_frame(cb.as_ref().unchecked_ref());
        }
    }
}

impl XrSession for WebXrSession {
    type Space = XrReferenceSpace;
    type HitSource = XrHitTestSource;
    type Frame = XrFrame;
    type Hit = XrHitTestResult;

    async fn request_reference_space(
        &self,
        kind: ReferenceSpaceKind,
    ) -> Result<XrReferenceSpace, XrError> {
        let space_type = match kind {
            ReferenceSpaceKind::Viewer => XrReferenceSpaceType::Viewer,
            ReferenceSpaceKind::Local => XrReferenceSpaceType::Local,
            ReferenceSpaceKind::LocalFloor => XrReferenceSpaceType::LocalFloor,
        };
        JsFuture::from(self.inner.request_reference_space(space_type))
            .await
            .map_err(|e| {
                XrError::FeatureUnavailable(format!("{} reference space: {}", kind.as_str(), describe(&e)))
            })?
            .dyn_into::<XrReferenceSpace>()
            .map_err(|_| XrError::Host("requestReferenceSpace resolved to a non-space".into()))
    }

    async fn request_hit_test_source(
        &self,
        space: &XrReferenceSpace,
    ) -> Result<XrHitTestSource, XrError> {
        // Older runtimes lack the hit-test module entirely
        let available = Reflect::has(&self.inner, &"requestHitTestSource".into()).unwrap_or(false);
        if !available {
            return Err(XrError::FeatureUnavailable("hit-test".into()));
        }

        let options = XrHitTestOptionsInit::new(space);
        JsFuture::from(self.inner.request_hit_test_source(&options))
            .await
            .map_err(|e| XrError::FeatureUnavailable(format!("hit-test: {}", describe(&e))))?
            .dyn_into::<XrHitTestSource>()
            .map_err(|_| XrError::Host("requestHitTestSource resolved to a non-source".into()))
    }

    fn hit_test_results(&self, frame: &XrFrame, source: &XrHitTestSource) -> Vec<XrHitTestResult> {
        frame
            .get_hit_test_results(source)
            .iter()
            .filter_map(|value| value.dyn_into::<XrHitTestResult>().ok())
            .collect()
    }

    fn hit_pose(&self, hit: &XrHitTestResult, space: &XrReferenceSpace) -> Option<RawMatrix> {
        hit.get_pose(space)
            .and_then(|pose| raw_matrix(&pose.transform()))
    }

    fn viewer_pose(&self, frame: &XrFrame, space: &XrReferenceSpace) -> Option<RawMatrix> {
        frame
            .get_viewer_pose(space)
            .and_then(|pose| raw_matrix(&pose.transform()))
    }

    fn start(&self, handles: FrameHandles<Self>, inbox: XrInbox) {
        self.watch_end(inbox.clone());
        self.watch_select(inbox.clone());
        self.run_frame_loop(handles, inbox);
    }

    fn cancel_hit_test_source(&self, source: &XrHitTestSource) {
        let _ = source.cancel();
    }

    fn end(&self) {
        if self.ended.replace(true) {
            return;
        }
        // The end event still fires and reports SessionEnded
        let _ = self.inner.end();
    }

    fn has_ended(&self) -> bool {
        self.ended.get()
    }
}

fn session_mode(mode: SessionMode) -> XrSessionMode {
    match mode {
        SessionMode::ImmersiveAr => XrSessionMode::ImmersiveAr,
        SessionMode::ImmersiveVr => XrSessionMode::ImmersiveVr,
        SessionMode::Inline => XrSessionMode::Inline,
    }
}

fn session_init(init: &SessionInit) -> Result<XrSessionInit, XrError> {
    let options = XrSessionInit::new();
    options.set_required_features(&feature_list(&init.required_features));
    options.set_optional_features(&feature_list(&init.optional_features));

    if init.wants_feature("dom-overlay") {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| XrError::Host("no document".into()))?;
        let root: Option<web_sys::Element> = match &init.dom_overlay_root {
            Some(id) => document.get_element_by_id(id),
            None => document.body().map(Into::into),
        };
        match root {
            Some(root) => {
                let overlay = Object::new();
                Reflect::set(&overlay, &"root".into(), &root)
                    .and_then(|_| Reflect::set(&options, &"domOverlay".into(), &overlay))
                    .map_err(|e| XrError::Host(describe(&e)))?;
            }
            None => {
                tracing::warn!(root = ?init.dom_overlay_root, "DOM overlay root not found");
            }
        }
    }

    Ok(options)
}

fn feature_list(features: &[String]) -> Array {
    features.iter().map(|f| JsValue::from_str(f)).collect()
}

fn raw_matrix(transform: &XrRigidTransform) -> Option<RawMatrix> {
    RawMatrix::try_from(transform.matrix().as_slice()).ok()
}

/// Map a rejected session request onto the error kinds the UI reports
fn classify(error: &JsValue) -> XrError {
    let name = Reflect::get(error, &"name".into())
        .ok()
        .and_then(|n| n.as_string())
        .unwrap_or_default();
    let message = describe(error);
    match name.as_str() {
        "NotSupportedError" => XrError::Unsupported(message),
        "NotAllowedError" | "SecurityError" => XrError::Denied(message),
        _ => XrError::Host(message),
    }
}

fn describe(error: &JsValue) -> String {
    Reflect::get(error, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .or_else(|| error.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}
