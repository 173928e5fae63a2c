use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

pub(crate) const DEFAULT_TITLE: &str = "New Item";
pub(crate) const DEFAULT_URL: &str = "/";

/// How a menu item decides whether it is shown.
///
/// `Auto` follows the linked sitemap entry (enabled when there is none).
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Auto,
    Enabled,
    Disabled,
}

impl ItemStatus {
    pub fn label(self) -> &'static str {
        match self {
            ItemStatus::Auto => "Auto",
            ItemStatus::Enabled => "Enabled",
            ItemStatus::Disabled => "Disabled",
        }
    }
}

/// A menu item as the backend lists it (`view/`, `add_item/`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MenuItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub status: ItemStatus,

    #[serde(default)]
    pub sitemap_item_id: Option<i64>,
    #[serde(default)]
    pub sitemap_item_title: Option<String>,
    #[serde(default)]
    pub sitemap_item_status: Option<ItemStatus>,
}

impl MenuItem {
    /// The record a bare "Add item" click produces.
    pub fn new_default() -> Self {
        Self {
            id: None,
            parent_id: None,
            title: DEFAULT_TITLE.to_string(),
            url: DEFAULT_URL.to_string(),
            status: ItemStatus::Auto,
            sitemap_item_id: None,
            sitemap_item_title: None,
            sitemap_item_status: None,
        }
    }

    /// Items backed by a sitemap entry take their URL from it.
    pub fn is_catalog_backed(&self) -> bool {
        self.sitemap_item_id.is_some()
    }

    pub fn url_editable(&self) -> bool {
        !self.is_catalog_backed()
    }

    /// Supplemental info shown under catalog-backed items.
    pub fn catalog_info(&self) -> Option<String> {
        self.sitemap_item_id?;
        let title = self.sitemap_item_title.clone().unwrap_or_default();
        Some(match self.sitemap_item_status {
            Some(status) => format!("{title} ({status})"),
            None => title,
        })
    }
}

/// An entry returned by the sitemap catalog lookup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: i64,
    pub title: String,
    // The admin lookup view serializes sitemap entries with `location`.
    #[serde(alias = "location")]
    pub url: String,
    #[serde(default)]
    pub status: Option<ItemStatus>,
}

impl CatalogEntry {
    pub fn label(&self) -> String {
        format!("{} ({})", self.title, self.url)
    }
}

/// `GET view/` response body.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MenuView {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sitemap_id: Option<i64>,
    pub items: Vec<MenuItem>,
}

/// `POST add_item/` response body.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AddItemResponse {
    pub item: MenuItem,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_menu_view_contract_deserialize() {
        // Shape produced by the admin `view/` endpoint.
        let json = r#"{
            "id": 1,
            "name": "Main",
            "sitemap_id": null,
            "items": [
                {"id": 4, "title": "Home", "url": "/", "status": "auto",
                 "parent_id": null, "sitemap_item_id": null,
                 "sitemap_item_title": null, "sitemap_item_status": null},
                {"id": 5, "title": "About", "url": "/about/", "status": "enabled",
                 "parent_id": 4, "sitemap_item_id": 9,
                 "sitemap_item_title": "About us", "sitemap_item_status": "disabled"}
            ]
        }"#;
        let parsed: MenuView = serde_json::from_str(json).expect("view should parse");
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[1].parent_id, Some(4));
        assert_eq!(parsed.items[1].status, ItemStatus::Enabled);
        assert_eq!(
            parsed.items[1].sitemap_item_status,
            Some(ItemStatus::Disabled)
        );
        assert!(parsed.sitemap_id.is_none());
    }

    #[test]
    fn test_menu_view_only_items_required() {
        let parsed: MenuView = serde_json::from_str(r#"{"items": []}"#).expect("should parse");
        assert!(parsed.items.is_empty());
        assert!(parsed.name.is_none());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let json = r#"{"id": 1, "title": "x", "url": "/", "status": "hidden"}"#;
        assert!(serde_json::from_str::<MenuItem>(json).is_err());
    }

    #[test]
    fn test_default_item() {
        let item = MenuItem::new_default();
        assert_eq!(item.title, "New Item");
        assert_eq!(item.url, "/");
        assert_eq!(item.status, ItemStatus::Auto);
        assert!(item.id.is_none());
        assert!(item.sitemap_item_id.is_none());
        assert!(item.sitemap_item_title.is_none());
        assert!(item.sitemap_item_status.is_none());
        assert!(item.url_editable());
    }

    #[test]
    fn test_catalog_info() {
        let mut item = MenuItem::new_default();
        assert!(item.catalog_info().is_none());

        item.sitemap_item_id = Some(3);
        item.sitemap_item_title = Some("Blog".to_string());
        item.sitemap_item_status = Some(ItemStatus::Enabled);
        assert_eq!(item.catalog_info().as_deref(), Some("Blog (enabled)"));
        assert!(!item.url_editable());
    }

    #[test]
    fn test_catalog_entry_accepts_location_alias() {
        let json = r#"{"id": 2, "title": "Blog", "location": "/blog/", "status": "enabled"}"#;
        let entry: CatalogEntry = serde_json::from_str(json).expect("should parse");
        assert_eq!(entry.url, "/blog/");
        assert_eq!(entry.label(), "Blog (/blog/)");
    }

    #[test]
    fn test_status_wire_strings() {
        assert_eq!(ItemStatus::Disabled.to_string(), "disabled");
        assert_eq!(ItemStatus::from_str("enabled").ok(), Some(ItemStatus::Enabled));
        assert!(ItemStatus::from_str("Enabled").is_err());
    }
}
