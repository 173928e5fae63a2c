mod api;
mod components;
mod config;
mod editor;
mod form;
mod lookup;
mod models;
mod state;
mod tree;
mod util;

use crate::config::{ConfigError, EditorConfig, EditorOptions, PageContext};
use crate::editor::MenuEditor;
use crate::state::{EditorContext, EditorState};
use leptos::mount::mount_to;
use leptos::prelude::*;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// A mounted menu editor.
///
/// Dropping the handle leaves the editor on the page; call `unmount()` to remove it.
#[wasm_bindgen]
pub struct MenuEditorHandle {
    // Type-erased `UnmountHandle`; dropping it tears the view down.
    mount: Option<Box<dyn Any>>,
    state: Rc<RefCell<Option<EditorState>>>,
}

#[wasm_bindgen]
impl MenuEditorHandle {
    pub fn unmount(&mut self) {
        self.state.borrow_mut().take();
        if let Some(mount) = self.mount.take() {
            drop(mount);
            tracing::info!("menu editor unmounted");
        }
    }

    /// Re-fetches the tree from `view/`.
    pub fn reload(&self) {
        let state = self.state.borrow().clone();
        match state {
            Some(state) => state.reload(),
            None => tracing::warn!("reload on an unmounted menu editor"),
        }
    }
}

impl Drop for MenuEditorHandle {
    fn drop(&mut self) {
        if let Some(mount) = self.mount.take() {
            std::mem::forget(mount);
        }
    }
}

/// Mounts an editor into the element named by `options.id`.
#[wasm_bindgen]
pub fn init_menu_editor(options: JsValue) -> Result<MenuEditorHandle, JsValue> {
    let options = EditorOptions::from_js(&options)?;
    let container_id = options
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or(ConfigError::Missing("id"))?;
    let container = util::element_by_id(&container_id)
        .ok_or_else(|| ConfigError::ContainerNotFound(container_id.clone()))?;

    let page = PageContext::from_container(&container)?;
    let config = EditorConfig::resolve(options, page)?;
    let target = container
        .dyn_into::<web_sys::HtmlElement>()
        .map_err(|_| ConfigError::ContainerNotFound(container_id.clone()))?;

    tracing::info!(
        container = %config.container_id,
        mode = %config.mode,
        page = %config.endpoints.view,
        "mounting menu editor"
    );

    let slot: Rc<RefCell<Option<EditorState>>> = Rc::new(RefCell::new(None));
    let slot_for_mount = slot.clone();
    let mount = mount_to(target, move || {
        let state = EditorState::new(config);
        *slot_for_mount.borrow_mut() = Some(state.clone());
        provide_context(EditorContext(state));
        view! { <MenuEditor /> }
    });

    Ok(MenuEditorHandle {
        mount: Some(Box::new(mount)),
        state: slot,
    })
}

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    if tracing_wasm::try_set_as_global_default().is_err() {
        web_sys::console::warn_1(&"menu-editor: a tracing subscriber is already installed".into());
    }
}
