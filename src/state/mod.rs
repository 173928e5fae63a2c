pub(crate) mod item_sync;

use crate::api::{ApiClient, ApiError, UpdateItemRequest};
use crate::config::{EditorConfig, PersistMode};
use crate::form::{stage_fields, write_payload, FormField};
use crate::lookup;
use crate::models::MenuItem;
use crate::tree::{DropPosition, FieldEdit, ItemKey, MenuTree, MoveOutcome, TreeError};
use crate::util::{element_by_id, payload_element_id, set_timeout_once};
use item_sync::{ItemSyncController, Mutation};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::collections::HashSet;

/// Fade-out length; keep in sync with the `duration-200` class on items.
pub(crate) const FADE_MS: i32 = 200;

/// State and mutation dispatch for one mounted editor.
#[derive(Clone)]
pub(crate) struct EditorState {
    pub config: EditorConfig,
    pub api: ApiClient,

    /// Authoritative tree; the DOM is rendered from it.
    pub tree: RwSignal<MenuTree>,

    pub loading: RwSignal<bool>,
    pub loaded: RwSignal<bool>,
    pub error: RwSignal<Option<String>>,

    /// Sitemap-driven menus disallow add, delete and reordering.
    pub sitemap_mode: RwSignal<bool>,

    /// Items fading out before removal.
    pub leaving: RwSignal<HashSet<ItemKey>>,
    /// Most recently added item (fades in).
    pub entering: RwSignal<Option<ItemKey>>,
    pub adding: RwSignal<bool>,

    /// Drag-and-drop.
    pub dragging: RwSignal<Option<ItemKey>>,
    pub drop_hint: RwSignal<Option<(ItemKey, DropPosition)>>,

    /// Ignore stale `view/` responses.
    load_seq: RwSignal<u64>,

    /// Present in remote mode only.
    pub sync: Option<ItemSyncController>,
}

impl EditorState {
    pub fn new(config: EditorConfig) -> Self {
        let api = ApiClient::for_page(&config);
        let error: RwSignal<Option<String>> = RwSignal::new(None);

        let sync = match config.mode {
            PersistMode::Remote => {
                let on_error = Callback::new(move |e: ApiError| {
                    error.set(Some(e.to_string()));
                });
                Some(ItemSyncController::new(api.clone(), on_error))
            }
            PersistMode::Form => None,
        };

        let sitemap_mode = RwSignal::new(config.sitemap_mode.unwrap_or(false));

        Self {
            config,
            api,
            tree: RwSignal::new(MenuTree::new()),
            loading: RwSignal::new(false),
            loaded: RwSignal::new(false),
            error,
            sitemap_mode,
            leaving: RwSignal::new(HashSet::new()),
            entering: RwSignal::new(None),
            adding: RwSignal::new(false),
            dragging: RwSignal::new(None),
            drop_hint: RwSignal::new(None),
            load_seq: RwSignal::new(0),
            sync,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.config.mode == PersistMode::Remote
    }

    fn report(&self, e: impl std::fmt::Display) {
        tracing::error!(error = %e, "menu editor error");
        self.error.set(Some(e.to_string()));
    }

    /// (Re)loads the whole tree from `view/`.
    pub fn reload(&self) {
        let seq = self.load_seq.get_untracked() + 1;
        self.load_seq.set(seq);
        self.loading.set(true);
        self.error.set(None);

        let s2 = self.clone();
        spawn_local(async move {
            let result = s2.api.view_items().await;
            if s2.load_seq.try_get_untracked() != Some(seq) {
                return;
            }
            match result {
                Ok(view) => {
                    tracing::info!(items = view.items.len(), "menu loaded");
                    if s2.config.sitemap_mode.is_none() {
                        s2.sitemap_mode.set(view.sitemap_id.is_some());
                    }
                    s2.leaving.set(HashSet::new());
                    s2.entering.set(None);
                    s2.tree.set(MenuTree::from_items(view.items));
                    s2.loaded.set(true);
                }
                Err(e) => s2.report(e),
            }
            s2.loading.set(false);
        });
    }

    /// "Add item": resolve the typed URL (if any), then insert at the end of the root list.
    ///
    /// `on_added` runs once the item is in the tree; lookup failures leave it uncalled.
    pub fn add_item(&self, url: String, on_added: Callback<()>) {
        if self.sitemap_mode.get_untracked() || self.adding.get_untracked() {
            return;
        }
        self.adding.set(true);

        let s2 = self.clone();
        spawn_local(async move {
            match lookup::resolve(&s2.api, &url).await {
                Ok(resolved) => {
                    if s2.is_remote() {
                        s2.add_remote(resolved).await;
                    } else {
                        s2.insert_local(resolved);
                    }
                    on_added.run(());
                }
                Err(e) => s2.report(e),
            }
            s2.adding.set(false);
        });
    }

    /// Adds a known catalog entry without another lookup round-trip.
    pub fn add_resolved(&self, resolved: MenuItem, on_added: Callback<()>) {
        if self.sitemap_mode.get_untracked() || self.adding.get_untracked() {
            return;
        }
        if !self.is_remote() {
            self.insert_local(resolved);
            on_added.run(());
            return;
        }

        self.adding.set(true);
        let s2 = self.clone();
        spawn_local(async move {
            s2.add_remote(resolved).await;
            on_added.run(());
            s2.adding.set(false);
        });
    }

    fn insert_local(&self, item: MenuItem) -> Option<ItemKey> {
        let inserted = self.tree.try_update(|t| t.insert(item, None))?;
        match inserted {
            Ok(key) => {
                tracing::debug!(item = %key, "item added");
                self.entering.set(Some(key.clone()));
                Some(key)
            }
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    async fn add_remote(&self, resolved: MenuItem) {
        let created = match self.api.add_item().await {
            Ok(item) => item,
            Err(e) => {
                self.report(e);
                return;
            }
        };
        let Some((item, overlay)) = added_item(&created, resolved) else {
            self.report("add_item/ returned an item without id");
            return;
        };
        if self.insert_local(item).is_some() {
            if let Some(sync) = &self.sync {
                sync.submit(overlay.id, Mutation::Update(overlay));
            }
        }
    }

    /// Fades the item out, then drops it (with its subtree) from the tree.
    pub fn delete_item(&self, key: ItemKey) {
        if self.sitemap_mode.get_untracked() {
            return;
        }
        if !self.tree.with_untracked(|t| t.contains(&key)) {
            return;
        }
        if self.leaving.with_untracked(|l| l.contains(&key)) {
            return;
        }
        self.leaving.update(|l| {
            l.insert(key.clone());
        });

        if let Some(sync) = &self.sync {
            let (top, descendants) = self.tree.with_untracked(|t| delete_targets(t, &key));
            // The backend drops descendants with their parent.
            for id in descendants {
                sync.discard(id);
            }
            if let Some(id) = top {
                sync.submit(id, Mutation::Delete);
            }
        }

        let tree = self.tree;
        let leaving = self.leaving;
        let fallback_key = key.clone();
        let finish = move || {
            let _ = tree.try_update(|t| {
                if let Err(e) = t.remove(&key) {
                    tracing::warn!(error = %e, "delete of missing item");
                }
            });
            let _ = leaving.try_update(|l| {
                l.remove(&key);
            });
        };
        if set_timeout_once(FADE_MS, finish).is_none() {
            // No window to animate in; remove right away.
            let _ = self.tree.try_update(|t| t.remove(&fallback_key));
            self.leaving.update(|l| {
                l.remove(&fallback_key);
            });
        }
    }

    /// Drop `dragged` onto the row of `target`.
    pub fn drop_on(&self, dragged: ItemKey, target: ItemKey, position: DropPosition) {
        let result = self
            .tree
            .try_update(|t| t.move_relative(&dragged, &target, position));
        self.after_move(result);
    }

    /// Drop onto the editor's top-level zone: append at root.
    pub fn drop_at_root(&self, dragged: ItemKey) {
        let result = self
            .tree
            .try_update(|t| t.move_item(&dragged, None, usize::MAX));
        self.after_move(result);
    }

    fn after_move(&self, result: Option<Result<Option<MoveOutcome>, TreeError>>) {
        self.dragging.set(None);
        self.drop_hint.set(None);

        let outcome = match result {
            Some(Ok(Some(outcome))) => outcome,
            Some(Ok(None)) | None => return,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "move rejected");
                return;
            }
        };
        tracing::debug!(
            item = %outcome.key,
            parent_changed = outcome.parent_changed(),
            index = outcome.new_index,
            "item moved"
        );

        let Some(sync) = &self.sync else {
            return;
        };
        let requests = self
            .tree
            .try_with_untracked(|t| move_requests(t, &outcome))
            .unwrap_or_default();
        for req in requests {
            sync.submit(req.id, Mutation::Update(req));
        }
    }

    pub fn edit_field(&self, key: &ItemKey, edit: FieldEdit) {
        let changed = self
            .tree
            .try_update(|t| t.edit(key, edit.clone()))
            .unwrap_or(Ok(false));
        let changed = match changed {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(error = %e, "edit of missing item");
                return;
            }
        };
        if !changed {
            return;
        }

        let (Some(sync), Some(id)) = (&self.sync, key.saved_id()) else {
            return;
        };
        let mut req = UpdateItemRequest::new(id);
        match edit {
            FieldEdit::Title(t) => {
                req.title = Some(t);
                sync.submit_debounced(id, req);
            }
            FieldEdit::Url(u) => {
                req.url = Some(u);
                sync.submit_debounced(id, req);
            }
            FieldEdit::Status(s) => {
                req.status = Some(s);
                sync.submit(id, Mutation::Update(req));
            }
        }
    }

    /// Form mode: stage the tree into hidden inputs right before the form submits.
    pub fn finalize_submission(&self) {
        let leaving = self.leaving.try_get_untracked().unwrap_or_default();
        let Some(fields) = self
            .tree
            .try_with_untracked(|t| submission_fields(t, &self.config.field_namespace, &leaving))
        else {
            return;
        };
        let Some(container) = element_by_id(&payload_element_id(&self.config.container_id)) else {
            tracing::warn!("payload container missing; form submitted without menu items");
            return;
        };
        match write_payload(&container, &fields) {
            Ok(()) => tracing::info!(fields = fields.len(), "menu items staged for submit"),
            Err(e) => tracing::error!(error = ?e, "staging menu items failed"),
        }
    }
}

#[derive(Clone)]
pub(crate) struct EditorContext(pub EditorState);

/// Record to insert after `add_item/`, and the update that brings the server copy
/// in line with what the user asked for.
pub(crate) fn added_item(
    created: &MenuItem,
    resolved: MenuItem,
) -> Option<(MenuItem, UpdateItemRequest)> {
    let id = created.id?;
    let overlay = UpdateItemRequest::diff(id, created, &resolved);
    let item = MenuItem {
        id: Some(id),
        parent_id: None,
        ..resolved
    };
    Some((item, overlay))
}

/// Saved ids going away with `key`: the item itself, then its descendants.
pub(crate) fn delete_targets(tree: &MenuTree, key: &ItemKey) -> (Option<i64>, Vec<i64>) {
    let mut keys = tree.subtree(key).into_iter();
    let top = keys.next().and_then(|k| k.saved_id());
    (top, keys.filter_map(|k| k.saved_id()).collect())
}

/// Updates for a finished move.
///
/// The moved item gets its new position (and parent, `""` for root). Every other
/// saved item whose sibling index shifted, in the old or the new group, gets its
/// new index so the backend's per-group order stays contiguous.
pub(crate) fn move_requests(tree: &MenuTree, outcome: &MoveOutcome) -> Vec<UpdateItemRequest> {
    let mut out = vec![];

    let new_group = tree.siblings(outcome.new_parent.as_ref());
    let mut before: Vec<ItemKey> = new_group
        .iter()
        .filter(|k| **k != outcome.key)
        .cloned()
        .collect();
    if !outcome.parent_changed() {
        before.insert(outcome.old_index.min(before.len()), outcome.key.clone());
    }
    push_shifted(&mut out, &before, new_group, outcome);

    if outcome.parent_changed() {
        let old_group = tree.siblings(outcome.old_parent.as_ref());
        let mut before = old_group.to_vec();
        before.insert(outcome.old_index.min(before.len()), outcome.key.clone());
        push_shifted(&mut out, &before, old_group, outcome);
    }
    out
}

fn push_shifted(
    out: &mut Vec<UpdateItemRequest>,
    before: &[ItemKey],
    after: &[ItemKey],
    outcome: &MoveOutcome,
) {
    for (index, key) in after.iter().enumerate() {
        let Some(id) = key.saved_id() else {
            continue;
        };
        let mut req = UpdateItemRequest::new(id);
        if *key == outcome.key {
            if outcome.parent_changed() {
                req.parent = Some(
                    outcome
                        .new_parent
                        .as_ref()
                        .map(|p| p.to_string())
                        .unwrap_or_default(),
                );
            }
        } else if before.iter().position(|k| k == key) == Some(index) {
            continue;
        }
        req.order = Some(index);
        out.push(req);
    }
}

/// Form payload for the tree as the user sees it: items still fading out are left out.
pub(crate) fn submission_fields(
    tree: &MenuTree,
    namespace: &str,
    leaving: &HashSet<ItemKey>,
) -> Vec<FormField> {
    if leaving.is_empty() {
        return stage_fields(tree, namespace);
    }
    let mut visible = tree.clone();
    for key in leaving {
        // Already gone when an ancestor was removed first.
        let _ = visible.remove(key);
    }
    stage_fields(&visible, namespace)
}
