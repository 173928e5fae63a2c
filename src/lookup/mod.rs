use crate::api::{ApiClient, ApiResult, LookupQuery};
use crate::models::{CatalogEntry, ItemStatus, MenuItem, DEFAULT_TITLE, DEFAULT_URL};

pub(crate) const SUGGEST_DEBOUNCE_MS: i32 = 250;
pub(crate) const MAX_SUGGESTIONS: usize = 10;

/// Whether a typed term is worth a catalog request.
pub(crate) fn should_suggest(term: &str) -> bool {
    !term.trim().is_empty()
}

/// Prefers an exact (case-insensitive) URL match, else the catalog's first hit.
pub fn best_match<'a>(entries: &'a [CatalogEntry], url: &str) -> Option<&'a CatalogEntry> {
    let wanted = url.trim().to_lowercase();
    entries
        .iter()
        .find(|e| e.url.to_lowercase() == wanted)
        .or_else(|| entries.first())
}

/// A new item linked to a catalog entry. Its status stays `auto` so it follows the entry.
pub fn item_from_entry(entry: &CatalogEntry) -> MenuItem {
    MenuItem {
        title: entry.title.clone(),
        url: entry.url.clone(),
        status: ItemStatus::Auto,
        sitemap_item_id: Some(entry.id),
        sitemap_item_title: Some(entry.title.clone()),
        sitemap_item_status: entry.status,
        ..MenuItem::new_default()
    }
}

/// A free-form item for a URL the catalog does not know.
pub fn manual_item(url: &str) -> MenuItem {
    let url = url.trim();
    MenuItem {
        title: DEFAULT_TITLE.to_string(),
        url: if url.is_empty() {
            DEFAULT_URL.to_string()
        } else {
            url.to_string()
        },
        ..MenuItem::new_default()
    }
}

pub fn resolve_from_entries(url: &str, entries: &[CatalogEntry]) -> MenuItem {
    if url.trim().is_empty() {
        return MenuItem::new_default();
    }
    match best_match(entries, url) {
        Some(entry) => item_from_entry(entry),
        None => manual_item(url),
    }
}

/// Builds the record for "Add item": default when no URL was typed, otherwise
/// whatever the catalog knows about it.
pub async fn resolve(api: &ApiClient, url: &str) -> ApiResult<MenuItem> {
    if url.trim().is_empty() || !api.has_lookup() {
        return Ok(resolve_from_entries(url, &[]));
    }
    let entries = api
        .find_catalog(&LookupQuery::Url(url.trim().to_string()))
        .await?;
    tracing::debug!(url, matches = entries.len(), "resolved add-item url");
    Ok(resolve_from_entries(url, &entries))
}

pub async fn suggest(api: &ApiClient, term: &str) -> ApiResult<Vec<CatalogEntry>> {
    if !should_suggest(term) {
        return Ok(vec![]);
    }
    let mut entries = api
        .find_catalog(&LookupQuery::Term(term.trim().to_string()))
        .await?;
    entries.truncate(MAX_SUGGESTIONS);
    Ok(entries)
}
