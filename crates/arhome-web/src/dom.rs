//! DOM wiring: enter-AR button, furniture menu, hints and alerts

use std::cell::RefCell;
use std::rc::Rc;

use arhome_core::{ArHomeConfig, SessionError, SessionManager, UiConfig, UiSignal, XrInbox, XrMessage};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element};

use crate::xr::WebXrBackend;

pub type WebSessionManager = SessionManager<WebXrBackend>;

thread_local! {
    /// Inbox for handlers registered from page script
    static INBOX: RefCell<Option<XrInbox>> = const { RefCell::new(None) };
}

/// Select a catalog model by id, for menus built in page script
#[wasm_bindgen(js_name = selectModel)]
pub fn select_model(id: String) {
    INBOX.with(|inbox| match inbox.borrow().as_ref() {
        Some(inbox) => inbox.push(XrMessage::SelectAsset(id)),
        None => tracing::warn!(model = %id, "Model selected before the app started"),
    });
}

fn document() -> Option<Document> {
    web_sys::window().and_then(|w| w.document())
}

/// Attach click handlers to the enter button, every `[data-model]` entry
/// and any `[data-clear-selection]` control
pub fn bind(
    ui: &UiConfig,
    manager: Rc<RefCell<WebSessionManager>>,
    inbox: XrInbox,
) -> Result<(), JsValue> {
    INBOX.with(|slot| *slot.borrow_mut() = Some(inbox.clone()));

    let document = document().ok_or_else(|| JsValue::from_str("no document"))?;

    match document.get_element_by_id(&ui.enter_button) {
        Some(button) => {
            let onclick = Closure::wrap(Box::new(move |_: JsValue| {
                activate(manager.clone());
            }) as Box<dyn FnMut(JsValue)>);
            button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
            onclick.forget();
        }
        None => tracing::error!(id = %ui.enter_button, "Enter AR button not found"),
    }

    let entries = document.query_selector_all("[data-model]")?;
    for i in 0..entries.length() {
        let Some(entry) = entries.item(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
            continue;
        };
        let Some(id) = entry.get_attribute("data-model") else {
            continue;
        };
        let inbox = inbox.clone();
        let onclick = Closure::wrap(Box::new(move |_: JsValue| {
            inbox.push(XrMessage::SelectAsset(id.clone()));
        }) as Box<dyn FnMut(JsValue)>);
        entry.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    let clear_controls = document.query_selector_all("[data-clear-selection]")?;
    for i in 0..clear_controls.length() {
        let Some(control) = clear_controls.item(i) else {
            continue;
        };
        let inbox = inbox.clone();
        let onclick = Closure::wrap(Box::new(move |_: JsValue| {
            inbox.push(XrMessage::ClearSelection);
        }) as Box<dyn FnMut(JsValue)>);
        control.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    Ok(())
}

fn activate(manager: Rc<RefCell<WebSessionManager>>) {
    wasm_bindgen_futures::spawn_local(async move {
        // A second tap while the request is pending is ignored
        let Ok(mut manager) = manager.try_borrow_mut() else {
            tracing::debug!("AR activation already in progress");
            return;
        };
        match manager.activate().await {
            Ok(()) => {}
            Err(SessionError::AlreadyActive) => tracing::debug!("AR session already active"),
            // Reported to the user through the ActivationFailed signal
            Err(e) => tracing::warn!(error = %e, "Could not start AR"),
        }
    });
}

/// Reflect one UI signal in the page
pub fn apply_signal(config: &ArHomeConfig, signal: &UiSignal) {
    let Some(document) = document() else {
        return;
    };
    let ui = &config.ui;

    match signal {
        UiSignal::SessionStarted => {
            set_hidden(&document, ui, &ui.enter_button, true);
            set_hidden(&document, ui, &ui.menu, false);
        }
        UiSignal::Stabilized => {
            set_hidden(&document, ui, &ui.stabilization_hint, false);
        }
        UiSignal::AssetSelected(id) => {
            let name = config.model(id).map(|m| m.display_name()).unwrap_or(id);
            alert(&format!("Selected: {}. Now tap the screen to place it.", name));
        }
        UiSignal::ActivationFailed(reason) => {
            tracing::warn!(reason = %reason, "AR activation failed");
            alert("Could not start AR. Make sure you are using a compatible device.");
        }
        UiSignal::SessionEnded => {
            set_hidden(&document, ui, &ui.enter_button, false);
            set_hidden(&document, ui, &ui.menu, true);
            set_hidden(&document, ui, &ui.stabilization_hint, true);
        }
    }
}

fn set_hidden(document: &Document, ui: &UiConfig, id: &str, hidden: bool) {
    let Some(element) = document.get_element_by_id(id) else {
        tracing::debug!(id = %id, "UI element not found");
        return;
    };
    let classes = element.class_list();
    let result = if hidden {
        classes.add_1(&ui.hidden_class)
    } else {
        classes.remove_1(&ui.hidden_class)
    };
    if let Err(e) = result {
        tracing::error!(id = %id, error = ?e, "Failed to toggle element visibility");
    }
}

fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}

/// Configuration embedded in the page as
/// `<script type="application/toml" id="arhome-config">`, else defaults
pub fn page_config() -> ArHomeConfig {
    let Some(text) = document()
        .and_then(|d| d.get_element_by_id("arhome-config"))
        .and_then(|e| e.text_content())
    else {
        return ArHomeConfig::default();
    };

    match ArHomeConfig::from_toml(&text) {
        Ok(config) => {
            tracing::info!(models = config.models.len(), "Loaded page configuration");
            config
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid page configuration, using defaults");
            ArHomeConfig::default()
        }
    }
}
