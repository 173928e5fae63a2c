use crate::config::{EditorConfig, Endpoints};
use crate::models::{AddItemResponse, CatalogEntry, ItemStatus, MenuItem, MenuView};
use serde::{Deserialize, Serialize};

const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Network,
    /// 403: missing/stale CSRF token or insufficient permissions.
    Forbidden,
    Http,
    Parse,
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn forbidden(ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Forbidden,
            message: format!("{ctx}: permission denied (is the CSRF token still valid?)"),
        }
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Fields accepted by `update_item/`. Unset fields are left alone by the backend.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateItemRequest {
    pub id: i64,
    /// Parent id, or empty for top level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    /// Zero-based sibling position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
    /// Links the item to a sitemap entry (set once, when an added item was looked up).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitemap_item_id: Option<i64>,
}

impl UpdateItemRequest {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// The fields that turn `from` into `to`.
    pub fn diff(id: i64, from: &MenuItem, to: &MenuItem) -> Self {
        let mut req = Self::new(id);
        if from.title != to.title {
            req.title = Some(to.title.clone());
        }
        if from.url != to.url {
            req.url = Some(to.url.clone());
        }
        if from.status != to.status {
            req.status = Some(to.status);
        }
        if from.sitemap_item_id != to.sitemap_item_id {
            req.sitemap_item_id = to.sitemap_item_id;
        }
        req
    }

    /// Folds a later update into this one; later values win.
    pub fn merge(&mut self, later: UpdateItemRequest) {
        if later.parent.is_some() {
            self.parent = later.parent;
        }
        if later.title.is_some() {
            self.title = later.title;
        }
        if later.url.is_some() {
            self.url = later.url;
        }
        if later.status.is_some() {
            self.status = later.status;
        }
        if later.order.is_some() {
            self.order = later.order;
        }
        if later.sitemap_item_id.is_some() {
            self.sitemap_item_id = later.sitemap_item_id;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_none()
            && self.title.is_none()
            && self.url.is_none()
            && self.status.is_none()
            && self.order.is_none()
            && self.sitemap_item_id.is_none()
    }

    fn form_pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![("id", self.id.to_string())];
        if let Some(parent) = &self.parent {
            out.push(("parent", parent.clone()));
        }
        if let Some(title) = &self.title {
            out.push(("title", title.clone()));
        }
        if let Some(url) = &self.url {
            out.push(("url", url.clone()));
        }
        if let Some(status) = self.status {
            out.push(("status", status.to_string()));
        }
        if let Some(order) = self.order {
            out.push(("order", order.to_string()));
        }
        if let Some(id) = self.sitemap_item_id {
            out.push(("sitemap_item_id", id.to_string()));
        }
        out
    }
}

/// What the catalog lookup is asked to match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupQuery {
    /// Free text typed into the autocomplete box (title or URL prefix).
    Term(String),
    /// A URL the user wants to link.
    Url(String),
}

impl LookupQuery {
    fn pair(&self) -> (&'static str, &str) {
        match self {
            LookupQuery::Term(t) => ("term", t.as_str()),
            LookupQuery::Url(u) => ("url", u.as_str()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    pub(crate) origin: String,
    pub(crate) endpoints: Endpoints,
    pub(crate) lookup_url: Option<String>,
    pub(crate) csrf_token: Option<String>,
    pub(crate) csrf_field: &'static str,
}

impl ApiClient {
    pub fn new(origin: String, config: &EditorConfig) -> Self {
        Self {
            origin,
            endpoints: config.endpoints.clone(),
            lookup_url: config.lookup_url.clone(),
            csrf_token: config.csrf_token.clone(),
            csrf_field: config.csrf_field_name(),
        }
    }

    /// Client for the current page's origin.
    pub fn for_page(config: &EditorConfig) -> Self {
        let origin = web_sys::window()
            .and_then(|w| w.location().origin().ok())
            .unwrap_or_default();
        Self::new(origin, config)
    }

    pub fn has_lookup(&self) -> bool {
        self.lookup_url.is_some()
    }

    /// Fetch needs absolute URLs; admin endpoints are usually origin-relative.
    pub(crate) fn absolute(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.origin.trim_end_matches('/'), url)
        } else {
            format!("{}/{}", self.origin.trim_end_matches('/'), url)
        }
    }

    fn with_csrf(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.csrf_token {
            req = req.header(CSRF_HEADER, token.as_str());
        }
        req
    }

    fn with_csrf_field(&self, mut pairs: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(token) = &self.csrf_token {
            pairs.push((self.csrf_field, token.clone()));
        }
        pairs
    }

    async fn check(res: reqwest::Response, ctx: &str) -> ApiResult<reqwest::Response> {
        let status = res.status();
        if status.is_success() {
            Ok(res)
        } else if status.as_u16() == 403 {
            Err(ApiError::forbidden(ctx))
        } else {
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, ctx))
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        ctx: &str,
    ) -> ApiResult<T> {
        let client = reqwest::Client::new();
        let res = client
            .get(self.absolute(url))
            .query(&query)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(ApiError::network)?;

        Self::check(res, ctx)
            .await?
            .json()
            .await
            .map_err(ApiError::parse)
    }

    async fn post_form(
        &self,
        url: &str,
        pairs: Vec<(&'static str, String)>,
        ctx: &str,
    ) -> ApiResult<reqwest::Response> {
        let client = reqwest::Client::new();
        let req = client.post(self.absolute(url)).form(&self.with_csrf_field(pairs));
        let res = self
            .with_csrf(req)
            .send()
            .await
            .map_err(ApiError::network)?;
        Self::check(res, ctx).await
    }

    /// `GET view/`: the whole menu as a flat list.
    pub async fn view_items(&self) -> ApiResult<MenuView> {
        self.get_json(&self.endpoints.view, &[], "Loading menu failed")
            .await
    }

    /// `POST add_item/`: creates a default item and returns it with its new id.
    pub async fn add_item(&self) -> ApiResult<MenuItem> {
        let res = self
            .post_form(&self.endpoints.add_item, vec![], "Adding item failed")
            .await?;
        let data: AddItemResponse = res.json().await.map_err(ApiError::parse)?;
        Ok(data.item)
    }

    pub async fn update_item(&self, req: &UpdateItemRequest) -> ApiResult<()> {
        self.post_form(
            &self.endpoints.update_item,
            req.form_pairs(),
            "Saving item failed",
        )
        .await
        .map(|_| ())
    }

    pub async fn delete_item(&self, id: i64) -> ApiResult<()> {
        self.post_form(
            &self.endpoints.delete_item,
            vec![("id", id.to_string())],
            "Deleting item failed",
        )
        .await
        .map(|_| ())
    }

    /// Queries the sitemap catalog. Without a lookup URL there is nothing to match.
    pub async fn find_catalog(&self, query: &LookupQuery) -> ApiResult<Vec<CatalogEntry>> {
        let Some(url) = self.lookup_url.clone() else {
            return Ok(vec![]);
        };
        let (key, value) = query.pair();
        self.get_json(&url, &[(key, value)], "Sitemap lookup failed")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EditorOptions, PageContext};

    fn client() -> ApiClient {
        let cfg = EditorConfig::resolve(
            EditorOptions {
                id: Some("items".to_string()),
                lookup_url: Some("/admin/navigation/menu/find-sitemap-items/".to_string()),
                ..Default::default()
            },
            PageContext {
                pathname: "/admin/navigation/menu/3/".to_string(),
                form_csrf_token: Some("tok".to_string()),
                form_sitemap: None,
            },
        )
        .expect("config");
        ApiClient::new("https://example.com".to_string(), &cfg)
    }

    #[test]
    fn test_absolute_urls() {
        let c = client();
        assert_eq!(
            c.absolute("/admin/navigation/menu/3/view/"),
            "https://example.com/admin/navigation/menu/3/view/"
        );
        assert_eq!(c.absolute("http://other/x"), "http://other/x");
        assert_eq!(c.absolute("x/"), "https://example.com/x/");
    }

    #[test]
    fn test_csrf_token_appended_as_field() {
        let c = client();
        let pairs = c.with_csrf_field(vec![("id", "4".to_string())]);
        assert_eq!(
            pairs,
            vec![("id", "4".to_string()), ("csrfmiddlewaretoken", "tok".to_string())]
        );
    }

    #[test]
    fn test_update_request_form_pairs() {
        let mut req = UpdateItemRequest::new(7);
        assert!(req.is_empty());
        req.parent = Some(String::new());
        req.status = Some(ItemStatus::Disabled);
        req.order = Some(2);
        assert_eq!(
            req.form_pairs(),
            vec![
                ("id", "7".to_string()),
                ("parent", String::new()),
                ("status", "disabled".to_string()),
                ("order", "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_update_request_merge_later_wins() {
        let mut a = UpdateItemRequest::new(1);
        a.title = Some("Old".to_string());
        a.parent = Some("4".to_string());

        let mut b = UpdateItemRequest::new(1);
        b.title = Some("New".to_string());
        b.url = Some("/new/".to_string());

        a.merge(b);
        assert_eq!(a.title.as_deref(), Some("New"));
        assert_eq!(a.url.as_deref(), Some("/new/"));
        assert_eq!(a.parent.as_deref(), Some("4"));
    }

    #[test]
    fn test_diff_only_changed_fields() {
        let server = MenuItem {
            id: Some(3),
            ..MenuItem::new_default()
        };
        assert!(UpdateItemRequest::diff(3, &server, &server).is_empty());

        let mut resolved = MenuItem::new_default();
        resolved.title = "Blog".to_string();
        resolved.url = "/blog/".to_string();
        resolved.sitemap_item_id = Some(8);
        let req = UpdateItemRequest::diff(3, &server, &resolved);
        assert_eq!(req.id, 3);
        assert_eq!(req.title.as_deref(), Some("Blog"));
        assert_eq!(req.url.as_deref(), Some("/blog/"));
        assert_eq!(req.sitemap_item_id, Some(8));
        assert!(req.status.is_none());
    }

    #[test]
    fn test_lookup_query_param_names() {
        assert_eq!(LookupQuery::Term("ab".into()).pair(), ("term", "ab"));
        assert_eq!(LookupQuery::Url("/a/".into()).pair(), ("url", "/a/"));
    }

    #[test]
    fn test_add_item_response_contract() {
        let json = r#"{"item": {"id": 12, "parent_id": null, "title": "New Item",
            "url": "/", "status": "auto", "sitemap_item_id": null,
            "sitemap_item_title": null, "sitemap_item_status": null}}"#;
        let parsed: AddItemResponse = serde_json::from_str(json).expect("should parse");
        assert_eq!(parsed.item.id, Some(12));
        assert_eq!(parsed.item.title, "New Item");
    }
}
