use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, ButtonVariant, Input, Spinner,
};
use crate::lookup::{self, item_from_entry, should_suggest, SUGGEST_DEBOUNCE_MS};
use crate::models::{CatalogEntry, ItemStatus, MenuItem};
use crate::state::{EditorContext, EditorState};
use crate::tree::{DropPosition, FieldEdit, ItemKey};
use crate::util::{clear_timeout, element_by_id, payload_element_id, set_timeout_once};
use icons::{Check, X};
use leptos::prelude::*;
use leptos::task::spawn_local;
use strum::IntoEnumIterator;
use wasm_bindgen::JsCast;

const DRAG_MIME: &str = "text/plain";

/// Whole editor: status line, add bar, tree and (form mode) the payload container.
#[component]
pub fn MenuEditor() -> impl IntoView {
    let state = expect_context::<EditorContext>().0;

    if !state.is_remote() {
        install_submit_hook(&state);
    }
    state.reload();

    let error = state.error;
    let loading = state.loading;
    let loaded = state.loaded;
    let sitemap_mode = state.sitemap_mode;
    let dragging = state.dragging;

    let s_reload = state.clone();
    let reload = Callback::new(move |_: ()| s_reload.reload());

    let sync = state.sync.clone();
    let saving = move || sync.as_ref().map(|s| s.is_saving()).unwrap_or(false);

    let refresh_link = state.config.refresh_url.clone().map(|url| {
        view! {
            <a href=url class="text-sm text-primary underline-offset-4 hover:underline">
                "Refresh from sitemap"
            </a>
        }
    });

    let payload = (!state.is_remote()).then(|| {
        let id = payload_element_id(&state.config.container_id);
        view! { <div id=id class="hidden" data-name="MenuPayload"></div> }
    });

    view! {
        <div class="menu-editor flex flex-col gap-3" data-name="MenuEditor">
            <Show when=move || error.with(|e| e.is_some())>
                <Alert class="border-destructive/30" attr:role="alert">
                    <AlertDescription class="text-destructive">
                        {move || error.get().unwrap_or_default()}
                    </AlertDescription>
                    <Button
                        variant=ButtonVariant::Outline
                        size=ButtonSize::Sm
                        attr:r#type="button"
                        on:click=move |_| reload.run(())
                    >
                        "Reload"
                    </Button>
                    <Button
                        variant=ButtonVariant::Ghost
                        size=ButtonSize::Icon
                        attr:r#type="button"
                        attr:aria-label="Dismiss"
                        on:click=move |_| error.set(None)
                    >
                        <X />
                    </Button>
                </Alert>
            </Show>

            <div class="flex flex-wrap items-center gap-3">
                <Show when=move || !sitemap_mode.get()>
                    <AddItemBar />
                </Show>
                {refresh_link}
                <Show when=saving>
                    <span class="inline-flex items-center gap-1 text-xs text-muted-foreground">
                        <Spinner class="size-3" />
                        "Saving…"
                    </span>
                </Show>
            </div>

            <Show when=move || loading.get() && !loaded.get()>
                <div class="flex items-center gap-2 py-4 text-sm text-muted-foreground">
                    <Spinner />
                    "Loading menu…"
                </div>
            </Show>

            <MenuTreeView />

            <Show when=move || dragging.with(|d| d.is_some()) && !sitemap_mode.get()>
                <RootDropZone />
            </Show>

            {payload}
        </div>
    }
}

/// Stage the tree into the payload container whenever the enclosing form submits.
fn install_submit_hook(state: &EditorState) {
    let Some(form) = element_by_id(&state.config.container_id)
        .and_then(|el| el.closest("form").ok().flatten())
    else {
        tracing::warn!(
            container = %state.config.container_id,
            "no enclosing form; menu items will not be submitted"
        );
        return;
    };

    let s2 = state.clone();
    let cb = wasm_bindgen::closure::Closure::wrap(Box::new(move |_ev: web_sys::Event| {
        s2.finalize_submission();
    }) as Box<dyn FnMut(web_sys::Event)>);

    if let Err(e) = form.add_event_listener_with_callback("submit", cb.as_ref().unchecked_ref()) {
        tracing::error!(error = ?e, "attaching submit listener failed");
    }
    // Outlives the editor; after unmount the handler finds no tree and returns.
    cb.forget();
}

/// Root list of the menu.
#[component]
pub fn MenuTreeView() -> impl IntoView {
    let state = expect_context::<EditorContext>().0;
    let tree = state.tree;
    let loaded = state.loaded;

    let roots = Memo::new(move |_| tree.with(|t| t.roots().to_vec()));

    view! {
        <ul class="menuitem-tree flex flex-col gap-1" data-name="MenuTree">
            <For
                each=move || roots.get()
                key=|k| k.clone()
                children=move |k| view! { <MenuItemNode item_key=k /> }
            />
        </ul>
        <Show when=move || loaded.get() && tree.with(|t| t.is_empty())>
            <p class="py-2 text-sm text-muted-foreground">"No menu items yet."</p>
        </Show>
    }
}

fn drop_position(ev: &web_sys::DragEvent) -> DropPosition {
    ev.current_target()
        .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
        .map(|el| el.get_bounding_client_rect())
        .map(|rect| DropPosition::from_offset(ev.client_y() as f64 - rect.top(), rect.height()))
        .unwrap_or(DropPosition::After)
}

fn dragged_key(ev: &web_sys::DragEvent, state: &EditorState) -> Option<ItemKey> {
    ev.data_transfer()
        .and_then(|dt| dt.get_data(DRAG_MIME).ok())
        .and_then(|raw| raw.parse::<ItemKey>().ok())
        .or_else(|| state.dragging.get_untracked())
}

#[component]
fn MenuItemNode(item_key: ItemKey) -> impl IntoView {
    let state = expect_context::<EditorContext>().0;
    let tree = state.tree;
    let sitemap_mode = state.sitemap_mode;
    let leaving = state.leaving;
    let entering = state.entering;
    let drop_hint = state.drop_hint;
    let dragging = state.dragging;

    let key_sv = StoredValue::new(item_key.clone());
    let dom_key = item_key.to_string();

    let item = Memo::new(move |_| {
        key_sv.with_value(|k| tree.with(|t| t.get(k).map(|n| n.item.clone())))
    });
    let kids = Memo::new(move |_| key_sv.with_value(|k| tree.with(|t| t.children(k).to_vec())));

    // Newly added items render transparent for one tick, then fade in.
    if entering.with_untracked(|e| e.as_ref() == Some(&item_key)) {
        set_timeout_once(16, move || {
            let _ = entering.try_update(|e| {
                if key_sv.try_with_value(|k| e.as_ref() == Some(k)) == Some(true) {
                    *e = None;
                }
            });
        });
    }

    let s_edit = state.clone();
    let edit = Callback::new(move |change: FieldEdit| {
        key_sv.with_value(|k| s_edit.edit_field(k, change));
    });
    let s_delete = state.clone();
    let delete = Callback::new(move |_: ()| s_delete.delete_item(key_sv.get_value()));
    let on_dragover = move |ev: web_sys::DragEvent| {
        let Some(dragged) = dragging.get_untracked() else {
            // Drag started outside this editor.
            return;
        };
        let target = key_sv.get_value();
        if tree.with_untracked(|t| t.is_ancestor_or_self(&dragged, &target)) {
            return;
        }
        ev.prevent_default();
        if let Some(dt) = ev.data_transfer() {
            dt.set_drop_effect("move");
        }
        let hint = (target, drop_position(&ev));
        if drop_hint.with_untracked(|h| h.as_ref() != Some(&hint)) {
            drop_hint.set(Some(hint));
        }
    };
    let s_drop = state.clone();
    let on_drop = move |ev: web_sys::DragEvent| {
        ev.prevent_default();
        ev.stop_propagation();
        if let Some(dragged) = dragged_key(&ev, &s_drop) {
            s_drop.drop_on(dragged, key_sv.get_value(), drop_position(&ev));
        }
    };

    let li_class = move || {
        let fading = key_sv.with_value(|k| {
            leaving.with(|l| l.contains(k)) || entering.with(|e| e.as_ref() == Some(k))
        });
        if fading {
            "menuitem-tree-item transition-opacity duration-200 opacity-0"
        } else {
            "menuitem-tree-item transition-opacity duration-200 opacity-100"
        }
    };

    let row_class = move || {
        let hint = key_sv.with_value(|k| {
            drop_hint.with(|h| match h {
                Some((target, pos)) if target == k => Some(*pos),
                _ => None,
            })
        });
        let base = "menuitem-row flex items-center gap-2 rounded-md border border-transparent px-2 py-1.5";
        match hint {
            Some(DropPosition::Before) => format!("{base} border-t-primary"),
            Some(DropPosition::Inside) => format!("{base} bg-primary/10 ring-1 ring-primary/30"),
            Some(DropPosition::After) => format!("{base} border-b-primary"),
            None => base.to_string(),
        }
    };

    let title = Signal::derive(move || {
        item.with(|i| i.as_ref().map(|i| i.title.clone()))
            .unwrap_or_default()
    });
    let url = Signal::derive(move || {
        item.with(|i| i.as_ref().map(|i| i.url.clone()))
            .unwrap_or_default()
    });
    let url_locked = Signal::derive(move || {
        item.with(|i| i.as_ref().map(|i| !i.url_editable()).unwrap_or(false))
    });
    let catalog_backed = Signal::derive(move || {
        item.with(|i| i.as_ref().map(MenuItem::is_catalog_backed).unwrap_or(false))
    });
    let status =
        Memo::new(move |_| item.with(|i| i.as_ref().map(|i| i.status).unwrap_or_default()));
    let catalog_info = move || item.with(|i| i.as_ref().and_then(MenuItem::catalog_info));

    view! {
        <li class=li_class data-key=dom_key data-name="MenuItem">
            <div
                class=row_class
                on:dragover=on_dragover
                on:drop=on_drop
            >
                <span
                    class="menuitem-handle cursor-grab select-none px-1 text-base leading-none text-muted-foreground"
                    class:invisible=move || sitemap_mode.get()
                    title="Drag to reorder"
                    draggable=move || if sitemap_mode.get() { "false" } else { "true" }
                    on:dragstart=move |ev: web_sys::DragEvent| {
                        if sitemap_mode.get_untracked() {
                            ev.prevent_default();
                            return;
                        }
                        let key = key_sv.get_value();
                        if let Some(dt) = ev.data_transfer() {
                            let _ = dt.set_data(DRAG_MIME, &key.to_string());
                            dt.set_effect_allowed("move");
                        }
                        dragging.set(Some(key));
                    }
                    on:dragend=move |_ev: web_sys::DragEvent| {
                        dragging.set(None);
                        drop_hint.set(None);
                    }
                >
                    "⠿"
                </span>

                <Input
                    class="flex-1"
                    aria_label="Title"
                    value=title
                    on_input=Callback::new(move |v: String| edit.run(FieldEdit::Title(v)))
                    attr:data-field="title"
                />
                <Input
                    class="flex-1"
                    aria_label="URL"
                    value=url
                    readonly=url_locked
                    on_input=Callback::new(move |v: String| edit.run(FieldEdit::Url(v)))
                    attr:data-field="url"
                />
                <select
                    class="border-input h-8 rounded-md border bg-transparent px-2 text-sm"
                    aria-label="Status"
                    data-field="status"
                    on:change=move |ev| {
                        match event_target_value(&ev).parse::<ItemStatus>() {
                            Ok(s) => edit.run(FieldEdit::Status(s)),
                            Err(_) => tracing::warn!("unknown status option"),
                        }
                    }
                >
                    {ItemStatus::iter()
                        .map(|s| {
                            view! {
                                <option value=s.as_ref().to_string() prop:selected=move || status.get() == s>
                                    {s.label()}
                                </option>
                            }
                        })
                        .collect_view()}
                </select>

                <Show when=move || !sitemap_mode.get()>
                    <Button
                        variant=ButtonVariant::Ghost
                        size=ButtonSize::Icon
                        attr:r#type="button"
                        attr:aria-label="Delete item"
                        attr:data-action="delete"
                        on:click=move |_| delete.run(())
                    >
                        <X />
                    </Button>
                </Show>
            </div>

            <Show when=move || catalog_backed.get()>
                <div class="menuitem-sitemap-item-row pl-8 text-xs text-muted-foreground">
                    "Page: "
                    {catalog_info}
                </div>
            </Show>

            <Show when=move || kids.with(|k| !k.is_empty())>
                <ul class="menuitem-children ml-6 mt-1 flex flex-col gap-1">
                    <For
                        each=move || kids.get()
                        key=|k| k.clone()
                        children=move |k| view! { <MenuItemNode item_key=k /> }.into_any()
                    />
                </ul>
            </Show>
        </li>
    }
    .into_any()
}

/// Drop target below the tree; dropping here appends at top level.
#[component]
fn RootDropZone() -> impl IntoView {
    let state = expect_context::<EditorContext>().0;
    let hovered = RwSignal::new(false);

    let s_drop = state.clone();
    let on_drop = move |ev: web_sys::DragEvent| {
        ev.prevent_default();
        hovered.set(false);
        if let Some(dragged) = dragged_key(&ev, &s_drop) {
            s_drop.drop_at_root(dragged);
        }
    };

    view! {
        <div
            class=move || {
                if hovered.get() {
                    "menuitem-root-drop rounded-md border border-dashed border-primary bg-primary/10 py-3 text-center text-xs text-muted-foreground"
                } else {
                    "menuitem-root-drop rounded-md border border-dashed py-3 text-center text-xs text-muted-foreground"
                }
            }
            on:dragover=move |ev: web_sys::DragEvent| {
                ev.prevent_default();
                if let Some(dt) = ev.data_transfer() {
                    dt.set_drop_effect("move");
                }
                if !hovered.get_untracked() {
                    hovered.set(true);
                }
            }
            on:dragleave=move |_ev: web_sys::DragEvent| hovered.set(false)
            on:drop=on_drop
        >
            "Drop here to move to the top level"
        </div>
    }
}

/// URL/term input with catalog suggestions and the "Add item" action.
#[component]
fn AddItemBar() -> impl IntoView {
    let state = expect_context::<EditorContext>().0;
    let has_lookup = state.api.has_lookup();
    let adding = state.adding;

    let text = RwSignal::new(String::new());
    let suggestions: RwSignal<Vec<CatalogEntry>> = RwSignal::new(Vec::new());
    let highlighted: RwSignal<Option<usize>> = RwSignal::new(None);
    // Only the latest suggestion request may update the list.
    let suggest_seq = RwSignal::new(0_u64);
    let debounce_timer: StoredValue<Option<i32>> = StoredValue::new(None);

    let cancel_suggestions = move || {
        if let Some(id) = debounce_timer.get_value() {
            clear_timeout(id);
        }
        debounce_timer.set_value(None);
        suggest_seq.update(|n| *n += 1);
        suggestions.set(Vec::new());
        highlighted.set(None);
    };

    let on_added = Callback::new(move |_: ()| {
        let _ = text.try_set(String::new());
    });

    let s_input = state.clone();
    let on_input = Callback::new(move |value: String| {
        text.set(value.clone());
        if !has_lookup {
            return;
        }
        cancel_suggestions();
        if !should_suggest(&value) {
            return;
        }

        let seq = suggest_seq.get_untracked();
        let s2 = s_input.clone();
        let timer = set_timeout_once(SUGGEST_DEBOUNCE_MS, move || {
            spawn_local(async move {
                let result = lookup::suggest(&s2.api, &value).await;
                if suggest_seq.try_get_untracked() != Some(seq) {
                    return;
                }
                match result {
                    Ok(entries) => {
                        tracing::debug!(term = %value, count = entries.len(), "catalog suggestions");
                        highlighted.set(None);
                        suggestions.set(entries);
                    }
                    Err(e) => tracing::warn!(error = %e, "catalog suggestions failed"),
                }
            });
        });
        debounce_timer.set_value(timer);
    });

    let s_pick = state.clone();
    let pick = Callback::new(move |entry: CatalogEntry| {
        cancel_suggestions();
        s_pick.add_resolved(item_from_entry(&entry), on_added);
    });

    let s_add = state.clone();
    let add = Callback::new(move |_: ()| {
        let chosen = highlighted
            .get_untracked()
            .and_then(|i| suggestions.with_untracked(|xs| xs.get(i).cloned()));
        match chosen {
            Some(entry) => pick.run(entry),
            None => {
                cancel_suggestions();
                s_add.add_item(text.get_untracked(), on_added);
            }
        }
    });

    let on_keydown = Callback::new(move |ev: web_sys::KeyboardEvent| {
        let key = ev.key();
        let count = suggestions.with_untracked(|xs| xs.len());
        match key.as_str() {
            "Enter" => {
                // Keep the admin form from submitting.
                ev.prevent_default();
                add.run(());
            }
            "Escape" => cancel_suggestions(),
            "ArrowDown" if count > 0 => {
                ev.prevent_default();
                highlighted.update(|h| *h = Some(h.map(|i| (i + 1) % count).unwrap_or(0)));
            }
            "ArrowUp" if count > 0 => {
                ev.prevent_default();
                highlighted.update(|h| {
                    *h = Some(h.map(|i| (i + count - 1) % count).unwrap_or(count - 1))
                });
            }
            _ => {}
        }
    });

    let indexed_suggestions = move || {
        suggestions
            .get()
            .into_iter()
            .enumerate()
            .collect::<Vec<_>>()
    };

    let placeholder = if has_lookup {
        "Search pages or type a URL"
    } else {
        "URL (optional)"
    };

    view! {
        <div class="relative flex items-center gap-2" data-name="AddItemBar">
            <Input
                class="w-72"
                placeholder=placeholder
                aria_label="New item URL"
                value=text
                disabled=adding
                on_input=on_input
                on_keydown=on_keydown
            />
            <Button
                size=ButtonSize::Sm
                attr:r#type="button"
                attr:disabled=move || adding.get()
                on:click=move |_| add.run(())
            >
                <Show when=move || adding.get() fallback=|| view! { <Check /> }>
                    <Spinner class="size-3 text-primary-foreground" />
                </Show>
                "Add item"
            </Button>

            <Show when=move || suggestions.with(|xs| !xs.is_empty())>
                <ul
                    class="absolute left-0 top-full z-10 mt-1 max-h-64 w-72 overflow-auto rounded-md border bg-popover p-1 text-sm shadow-md"
                    role="listbox"
                >
                    <For
                        each=indexed_suggestions
                        key=|(i, e)| (*i, e.id)
                        children=move |(i, entry)| {
                            let label = entry.label();
                            view! {
                                <li
                                    role="option"
                                    class=move || {
                                        if highlighted.get() == Some(i) {
                                            "cursor-pointer rounded-sm px-2 py-1 bg-accent text-accent-foreground"
                                        } else {
                                            "cursor-pointer rounded-sm px-2 py-1 hover:bg-accent/50"
                                        }
                                    }
                                    on:mousedown=move |ev: web_sys::MouseEvent| {
                                        // mousedown beats the input's blur.
                                        ev.prevent_default();
                                        pick.run(entry.clone());
                                    }
                                >
                                    {label}
                                </li>
                            }
                        }
                    />
                </ul>
            </Show>
        </div>
    }
}
