//! Bulk form staging.
//!
//! In form mode nothing is sent while editing. When the admin form submits, the
//! whole tree is written out as hidden inputs named `<ns>-<prefix>-<field>`,
//! with parent links and per-sibling order taken from the current tree.

use crate::tree::MenuTree;
use wasm_bindgen::JsCast;

pub(crate) const DEFAULT_FIELD_NAMESPACE: &str = "menuitem";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

impl FormField {
    fn new(name: String, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Serializes the tree into the bulk-submission field set.
pub fn stage_fields(tree: &MenuTree, namespace: &str) -> Vec<FormField> {
    let mut out = Vec::with_capacity(1 + tree.len() * 7);
    out.push(FormField::new(
        format!("{namespace}-max"),
        tree.max_prefix().to_string(),
    ));

    for key in tree.preorder() {
        let Some(node) = tree.get(&key) else {
            continue;
        };
        let order = tree.sibling_index(&key).unwrap_or(0);
        let field = |name: &str| format!("{namespace}-{}-{name}", node.prefix);

        out.push(FormField::new(field("id"), key.to_string()));
        out.push(FormField::new(
            field("parent-id"),
            node.parent.as_ref().map(|p| p.to_string()).unwrap_or_default(),
        ));
        out.push(FormField::new(field("title"), node.item.title.clone()));
        out.push(FormField::new(field("url"), node.item.url.clone()));
        out.push(FormField::new(field("status"), node.item.status.to_string()));
        out.push(FormField::new(
            field("sitemap-item-id"),
            node.item
                .sitemap_item_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        ));
        out.push(FormField::new(field("order"), order.to_string()));
    }

    out
}

/// Replaces the contents of `container` with one hidden input per field.
///
/// Values go through the `value` property, so titles and URLs need no escaping.
pub fn write_payload(container: &web_sys::Element, fields: &[FormField]) -> Result<(), wasm_bindgen::JsValue> {
    let document = container
        .owner_document()
        .ok_or_else(|| wasm_bindgen::JsValue::from_str("payload container has no document"))?;

    container.set_inner_html("");
    for f in fields {
        let input: web_sys::HtmlInputElement = document.create_element("input")?.dyn_into()?;
        input.set_type("hidden");
        input.set_name(&f.name);
        input.set_value(&f.value);
        container.append_child(&input)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MenuItem;
    use crate::tree::tests::item;
    use crate::tree::{DropPosition, ItemKey};
    use std::collections::HashMap;

    fn as_map(fields: &[FormField]) -> HashMap<String, String> {
        fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }

    fn prefix(tree: &MenuTree, id: i64) -> u32 {
        tree.get(&ItemKey::Saved(id)).map(|n| n.prefix).unwrap_or(0)
    }

    fn get<'a>(map: &'a HashMap<String, String>, p: u32, field: &str) -> &'a str {
        map.get(&format!("menuitem-{p}-{field}"))
            .map(|s| s.as_str())
            .unwrap_or("<missing>")
    }

    #[test]
    fn test_stage_fields_shape() {
        let mut backed = item(2, Some(1), "Blog");
        backed.sitemap_item_id = Some(40);
        let tree = MenuTree::from_items(vec![item(1, None, "Home"), backed]);

        let map = as_map(&stage_fields(&tree, "menuitem"));
        assert_eq!(map.get("menuitem-max").map(|s| s.as_str()), Some("2"));
        assert_eq!(map.len(), 1 + 2 * 7);

        let p = prefix(&tree, 2);
        assert_eq!(get(&map, p, "id"), "2");
        assert_eq!(get(&map, p, "parent-id"), "1");
        assert_eq!(get(&map, p, "title"), "Blog");
        assert_eq!(get(&map, p, "url"), "/blog/");
        assert_eq!(get(&map, p, "status"), "auto");
        assert_eq!(get(&map, p, "sitemap-item-id"), "40");
        assert_eq!(get(&map, p, "order"), "0");

        let p = prefix(&tree, 1);
        assert_eq!(get(&map, p, "parent-id"), "");
        assert_eq!(get(&map, p, "sitemap-item-id"), "");
    }

    #[test]
    fn test_unsaved_items_use_placeholder_keys() {
        let mut tree = MenuTree::from_items(vec![item(1, None, "Home")]);
        let parent = tree.insert(MenuItem::new_default(), None).expect("insert");
        let child = tree
            .insert(MenuItem::new_default(), Some(&parent))
            .expect("insert");

        let map = as_map(&stage_fields(&tree, "menuitem"));
        assert_eq!(get(&map, 2, "id"), "new-2");
        assert_eq!(get(&map, 3, "id"), "new-3");
        assert_eq!(get(&map, 3, "parent-id"), parent.to_string());
        assert_eq!(child, ItemKey::New(3));
        assert_eq!(map.get("menuitem-max").map(|s| s.as_str()), Some("3"));
    }

    #[test]
    fn test_reorder_siblings_renumbers_only_that_group() {
        let mut tree = MenuTree::from_items(vec![
            item(1, None, "A"),
            item(2, None, "B"),
            item(3, None, "C"),
            item(10, Some(1), "A1"),
            item(11, Some(1), "A2"),
        ]);
        let before = as_map(&stage_fields(&tree, "menuitem"));

        // C to the front, then A to the end: C, B, A.
        tree.move_relative(&ItemKey::Saved(3), &ItemKey::Saved(1), DropPosition::Before)
            .expect("move");
        tree.move_relative(&ItemKey::Saved(1), &ItemKey::Saved(2), DropPosition::After)
            .expect("move");

        let after = as_map(&stage_fields(&tree, "menuitem"));
        assert_eq!(get(&after, prefix(&tree, 3), "order"), "0");
        assert_eq!(get(&after, prefix(&tree, 2), "order"), "1");
        assert_eq!(get(&after, prefix(&tree, 1), "order"), "2");

        for id in [10, 11] {
            let p = prefix(&tree, id);
            assert_eq!(get(&after, p, "order"), get(&before, p, "order"));
            assert_eq!(get(&after, p, "parent-id"), "1");
        }
    }

    #[test]
    fn test_parent_fields_follow_nested_moves() {
        let mut tree = MenuTree::from_items(vec![
            item(1, None, "A"),
            item(2, None, "B"),
            item(3, None, "C"),
            item(4, Some(3), "C1"),
        ]);

        tree.move_relative(&ItemKey::Saved(2), &ItemKey::Saved(1), DropPosition::Inside)
            .expect("move");
        tree.move_relative(&ItemKey::Saved(3), &ItemKey::Saved(2), DropPosition::Inside)
            .expect("move");
        tree.move_relative(&ItemKey::Saved(4), &ItemKey::Saved(2), DropPosition::Before)
            .expect("move");

        let map = as_map(&stage_fields(&tree, "menuitem"));
        for key in tree.preorder() {
            let p = tree.get(&key).map(|n| n.prefix).unwrap_or(0);
            let expected = tree
                .parent_of(&key)
                .map(|k| k.to_string())
                .unwrap_or_default();
            assert_eq!(get(&map, p, "parent-id"), expected);
        }
        assert_eq!(get(&map, prefix(&tree, 3), "parent-id"), "2");
        assert_eq!(get(&map, prefix(&tree, 2), "parent-id"), "1");
        assert_eq!(get(&map, prefix(&tree, 4), "parent-id"), "1");
        assert_eq!(get(&map, prefix(&tree, 4), "order"), "0");
        assert_eq!(get(&map, prefix(&tree, 2), "order"), "1");
    }

    #[test]
    fn test_deleted_item_excluded_and_siblings_renumbered() {
        let mut tree = MenuTree::from_items(vec![
            item(1, None, "A"),
            item(2, None, "B"),
            item(3, None, "C"),
            item(4, Some(2), "B1"),
        ]);
        tree.remove(&ItemKey::Saved(2)).expect("remove");

        let fields = stage_fields(&tree, "menuitem");
        let map = as_map(&fields);
        assert!(!fields.iter().any(|f| f.value == "B" || f.value == "B1"));
        assert!(!fields
            .iter()
            .any(|f| f.name.ends_with("-id") && (f.value == "2" || f.value == "4")));
        assert_eq!(map.len(), 1 + 2 * 7);
        assert_eq!(get(&map, prefix(&tree, 1), "order"), "0");
        assert_eq!(get(&map, prefix(&tree, 3), "order"), "1");
        // Prefixes are never reused, so max still covers the deleted ones.
        assert_eq!(map.get("menuitem-max").map(|s| s.as_str()), Some("4"));
    }

    #[test]
    fn test_custom_namespace() {
        let tree = MenuTree::from_items(vec![item(1, None, "A")]);
        let fields = stage_fields(&tree, "footer");
        assert!(fields.iter().all(|f| f.name.starts_with("footer-")));
    }
}
