use crate::form::DEFAULT_FIELD_NAMESPACE;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use wasm_bindgen::{JsCast, JsValue};

const CSRF_FIELD: &str = "csrfmiddlewaretoken";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("editor options must be an object")]
    NotAnObject,
    #[error("missing required option `{0}`")]
    Missing(&'static str),
    #[error("option `{key}` must be a {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },
    #[error("unknown persistence mode {0:?} (expected \"form\" or \"remote\")")]
    BadMode(String),
    #[error("no element with id {0:?}")]
    ContainerNotFound(String),
    #[error("no browser window available")]
    NoWindow,
}

impl From<ConfigError> for JsValue {
    fn from(e: ConfigError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

/// How edits reach the backend.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PersistMode {
    /// Stage everything into hidden fields; the admin form submits once.
    #[default]
    Form,
    /// One backend call per edit.
    Remote,
}

/// Per-menu backend endpoints, all relative to the admin change page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub view: String,
    pub add_item: String,
    pub update_item: String,
    pub delete_item: String,
}

impl Endpoints {
    pub fn for_page(page_url: &str) -> Self {
        let base = if page_url.ends_with('/') {
            page_url.to_string()
        } else {
            format!("{page_url}/")
        };
        Self {
            view: format!("{base}view/"),
            add_item: format!("{base}add_item/"),
            update_item: format!("{base}update_item/"),
            delete_item: format!("{base}delete_item/"),
        }
    }
}

/// Raw options object handed to `init_menu_editor`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct EditorOptions {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub page_url: Option<String>,
    pub lookup_url: Option<String>,
    pub refresh_url: Option<String>,
    pub csrf_token: Option<String>,
    pub sitemap_mode: Option<bool>,
    pub field_prefix: Option<String>,
}

fn get_prop(obj: &JsValue, key: &str) -> Option<JsValue> {
    js_sys::Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

fn get_string(obj: &JsValue, key: &'static str) -> Result<Option<String>, ConfigError> {
    match get_prop(obj, key) {
        None => Ok(None),
        Some(v) => v.as_string().map(Some).ok_or(ConfigError::WrongType {
            key,
            expected: "string",
        }),
    }
}

fn get_bool(obj: &JsValue, key: &'static str) -> Result<Option<bool>, ConfigError> {
    match get_prop(obj, key) {
        None => Ok(None),
        Some(v) => v.as_bool().map(Some).ok_or(ConfigError::WrongType {
            key,
            expected: "boolean",
        }),
    }
}

impl EditorOptions {
    pub fn from_js(options: &JsValue) -> Result<Self, ConfigError> {
        if !options.is_object() {
            return Err(ConfigError::NotAnObject);
        }
        Ok(Self {
            id: get_string(options, "id")?,
            mode: get_string(options, "mode")?,
            page_url: get_string(options, "page_url")?,
            lookup_url: get_string(options, "lookup_url")?,
            refresh_url: get_string(options, "refresh_url")?,
            csrf_token: get_string(options, "csrf_token")?,
            sitemap_mode: get_bool(options, "sitemap_mode")?,
            field_prefix: get_string(options, "field_prefix")?,
        })
    }
}

/// Values the editor falls back to when options leave them out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageContext {
    pub pathname: String,
    /// CSRF token found in the enclosing form.
    pub form_csrf_token: Option<String>,
    /// Value of the enclosing form's sitemap selector.
    pub form_sitemap: Option<String>,
}

impl PageContext {
    pub fn from_container(container: &web_sys::Element) -> Result<Self, ConfigError> {
        let window = web_sys::window().ok_or(ConfigError::NoWindow)?;
        let pathname = window.location().pathname().unwrap_or_else(|_| "/".to_string());

        let form = container.closest("form").ok().flatten();
        let field_value = |selector: &str| -> Option<String> {
            let el = form.as_ref()?.query_selector(selector).ok().flatten()?;
            // Works for <input> and <select> alike.
            js_sys::Reflect::get(el.unchecked_ref(), &JsValue::from_str("value"))
                .ok()?
                .as_string()
        };

        Ok(Self {
            pathname,
            form_csrf_token: field_value(&format!("input[name={CSRF_FIELD}]")),
            form_sitemap: field_value("#id_sitemap"),
        })
    }
}

/// Resolved configuration of one editor instance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EditorConfig {
    pub container_id: String,
    pub mode: PersistMode,
    pub endpoints: Endpoints,
    pub lookup_url: Option<String>,
    pub refresh_url: Option<String>,
    pub csrf_token: Option<String>,
    /// `None` defers to the `sitemap_id` reported by `view/`.
    pub sitemap_mode: Option<bool>,
    pub field_namespace: String,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl EditorConfig {
    pub fn resolve(options: EditorOptions, page: PageContext) -> Result<Self, ConfigError> {
        let container_id = non_blank(options.id).ok_or(ConfigError::Missing("id"))?;

        let mode = match non_blank(options.mode) {
            None => PersistMode::default(),
            Some(m) => m
                .trim()
                .parse::<PersistMode>()
                .map_err(|_| ConfigError::BadMode(m.clone()))?,
        };

        let page_url = non_blank(options.page_url).unwrap_or(page.pathname);
        let sitemap_mode = options
            .sitemap_mode
            .or_else(|| page.form_sitemap.map(|v| !v.trim().is_empty()));

        Ok(Self {
            container_id,
            mode,
            endpoints: Endpoints::for_page(&page_url),
            lookup_url: non_blank(options.lookup_url),
            refresh_url: non_blank(options.refresh_url),
            csrf_token: non_blank(options.csrf_token).or(non_blank(page.form_csrf_token)),
            sitemap_mode,
            field_namespace: non_blank(options.field_prefix)
                .unwrap_or_else(|| DEFAULT_FIELD_NAMESPACE.to_string()),
        })
    }

    pub fn csrf_field_name(&self) -> &'static str {
        CSRF_FIELD
    }
}
