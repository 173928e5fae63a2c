use wasm_bindgen::JsCast;

/// Runs `f` once after `ms` milliseconds. Returns the timer id, if a window exists.
pub(crate) fn set_timeout_once(ms: i32, f: impl FnOnce() + 'static) -> Option<i32> {
    let win = web_sys::window()?;
    let cb = wasm_bindgen::closure::Closure::once_into_js(f);
    win.set_timeout_with_callback_and_timeout_and_arguments_0(cb.as_ref().unchecked_ref(), ms)
        .ok()
}

pub(crate) fn clear_timeout(id: i32) {
    if let Some(win) = web_sys::window() {
        win.clear_timeout_with_handle(id);
    }
}

pub(crate) fn element_by_id(id: &str) -> Option<web_sys::Element> {
    web_sys::window()?.document()?.get_element_by_id(id)
}

pub(crate) fn payload_element_id(container_id: &str) -> String {
    format!("{container_id}-payload")
}
