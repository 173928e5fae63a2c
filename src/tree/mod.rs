use crate::models::{ItemStatus, MenuItem};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Client-side identity of a menu item.
///
/// Persisted items use their backend id; unsaved items get a placeholder
/// spelled `new-<prefix>` in form fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKey {
    Saved(i64),
    New(u32),
}

impl ItemKey {
    pub fn saved_id(&self) -> Option<i64> {
        match self {
            ItemKey::Saved(id) => Some(*id),
            ItemKey::New(_) => None,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Saved(id) => write!(f, "{id}"),
            ItemKey::New(n) => write!(f, "new-{n}"),
        }
    }
}

impl FromStr for ItemKey {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("new-") {
            return rest
                .parse::<u32>()
                .map(ItemKey::New)
                .map_err(|_| TreeError::BadKey(s.to_string()));
        }
        s.parse::<i64>()
            .map(ItemKey::Saved)
            .map_err(|_| TreeError::BadKey(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("unknown menu item {0}")]
    UnknownItem(ItemKey),
    #[error("cannot move {0} under its own subtree")]
    Cycle(ItemKey),
    #[error("menu item {0} is already in the tree")]
    DuplicateKey(ItemKey),
    #[error("malformed item key {0:?}")]
    BadKey(String),
}

/// Where a dragged item lands relative to the row it was dropped on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropPosition {
    Before,
    Inside,
    After,
}

impl DropPosition {
    /// Upper quarter of the row drops before, lower quarter after, the rest nests.
    pub fn from_offset(offset_y: f64, height: f64) -> Self {
        if height <= 0.0 {
            return DropPosition::After;
        }
        let ratio = offset_y / height;
        if ratio < 0.25 {
            DropPosition::Before
        } else if ratio > 0.75 {
            DropPosition::After
        } else {
            DropPosition::Inside
        }
    }
}

/// A single field change coming from an item's inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldEdit {
    Title(String),
    Url(String),
    Status(ItemStatus),
}

/// Result of a move that actually changed the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    pub key: ItemKey,
    pub old_parent: Option<ItemKey>,
    pub new_parent: Option<ItemKey>,
    pub old_index: usize,
    pub new_index: usize,
}

impl MoveOutcome {
    pub fn parent_changed(&self) -> bool {
        self.old_parent != self.new_parent
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub key: ItemKey,
    /// Form prefix (`menuitem-<prefix>-*`), unique for the editor's lifetime.
    pub prefix: u32,
    pub item: MenuItem,
    /// Authoritative parent link; `item.parent_id` only reflects the loaded record.
    pub parent: Option<ItemKey>,
    pub children: Vec<ItemKey>,
}

/// The editor's authoritative menu tree: key -> node, with ordered child keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MenuTree {
    nodes: HashMap<ItemKey, TreeNode>,
    roots: Vec<ItemKey>,
    max_prefix: u32,
}

impl MenuTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from the flat list `view/` returns.
    ///
    /// Children may appear before their parents. A record whose parent is
    /// missing (or would close a cycle) is placed at root.
    pub fn from_items(items: Vec<MenuItem>) -> Self {
        let mut tree = Self::new();
        let mut order: Vec<(ItemKey, Option<i64>)> = Vec::with_capacity(items.len());

        for item in items {
            let parent_id = item.parent_id;
            let prefix = tree.next_prefix();
            let key = match item.id {
                Some(id) => ItemKey::Saved(id),
                None => ItemKey::New(prefix),
            };
            if tree.nodes.contains_key(&key) {
                tracing::warn!(item = %key, "duplicate menu item in listing, skipped");
                continue;
            }
            tree.nodes.insert(
                key.clone(),
                TreeNode {
                    key: key.clone(),
                    prefix,
                    item,
                    parent: None,
                    children: vec![],
                },
            );
            order.push((key, parent_id));
        }

        for (key, parent_id) in order {
            let parent = parent_id.map(ItemKey::Saved);
            let attach_to = match parent {
                Some(p) if !tree.nodes.contains_key(&p) => {
                    tracing::warn!(item = %key, parent = %p, "parent not found, placing at root");
                    None
                }
                Some(p) if p == key || tree.is_ancestor_or_self(&key, &p) => {
                    tracing::warn!(item = %key, parent = %p, "parent link forms a cycle, placing at root");
                    None
                }
                other => other,
            };
            tree.attach(&key, attach_to.as_ref(), usize::MAX);
        }

        tree
    }

    fn next_prefix(&mut self) -> u32 {
        self.max_prefix += 1;
        self.max_prefix
    }

    /// Highest form prefix handed out so far.
    pub fn max_prefix(&self) -> u32 {
        self.max_prefix
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn get(&self, key: &ItemKey) -> Option<&TreeNode> {
        self.nodes.get(key)
    }

    pub fn roots(&self) -> &[ItemKey] {
        &self.roots
    }

    pub fn children(&self, key: &ItemKey) -> &[ItemKey] {
        self.nodes
            .get(key)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, key: &ItemKey) -> Option<&ItemKey> {
        self.nodes.get(key).and_then(|n| n.parent.as_ref())
    }

    /// Children of `parent`, or the root list.
    pub fn siblings(&self, parent: Option<&ItemKey>) -> &[ItemKey] {
        match parent {
            Some(p) => self.children(p),
            None => &self.roots,
        }
    }

    fn siblings_mut(&mut self, parent: Option<&ItemKey>) -> Option<&mut Vec<ItemKey>> {
        match parent {
            Some(p) => self.nodes.get_mut(p).map(|n| &mut n.children),
            None => Some(&mut self.roots),
        }
    }

    /// Zero-based position among siblings.
    pub fn sibling_index(&self, key: &ItemKey) -> Option<usize> {
        let node = self.nodes.get(key)?;
        self.siblings(node.parent.as_ref())
            .iter()
            .position(|k| k == key)
    }

    /// True when `ancestor` is `key` itself or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: &ItemKey, key: &ItemKey) -> bool {
        let mut cur = Some(key);
        while let Some(k) = cur {
            if k == ancestor {
                return true;
            }
            cur = self.parent_of(k);
        }
        false
    }

    /// `key` followed by all its descendants, parents first.
    pub fn subtree(&self, key: &ItemKey) -> Vec<ItemKey> {
        if !self.nodes.contains_key(key) {
            return vec![];
        }
        let mut out = vec![];
        let mut stack = vec![key.clone()];
        while let Some(k) = stack.pop() {
            stack.extend(self.children(&k).iter().rev().cloned());
            out.push(k);
        }
        out
    }

    /// All keys in display order (parents before their children).
    pub fn preorder(&self) -> Vec<ItemKey> {
        fn walk(tree: &MenuTree, keys: &[ItemKey], out: &mut Vec<ItemKey>) {
            for k in keys {
                out.push(k.clone());
                walk(tree, tree.children(k), out);
            }
        }

        let mut out = Vec::with_capacity(self.nodes.len());
        walk(self, &self.roots, &mut out);
        out
    }

    fn attach(&mut self, key: &ItemKey, parent: Option<&ItemKey>, index: usize) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.parent = parent.cloned();
        }
        if let Some(list) = self.siblings_mut(parent) {
            let index = index.min(list.len());
            list.insert(index, key.clone());
        }
    }

    fn detach(&mut self, key: &ItemKey) -> Option<usize> {
        let parent = self.nodes.get(key)?.parent.clone();
        let list = self.siblings_mut(parent.as_ref())?;
        let index = list.iter().position(|k| k == key)?;
        list.remove(index);
        Some(index)
    }

    /// Appends `item` as the last child of `parent` (or at root).
    pub fn insert(
        &mut self,
        item: MenuItem,
        parent: Option<&ItemKey>,
    ) -> Result<ItemKey, TreeError> {
        if let Some(p) = parent {
            if !self.nodes.contains_key(p) {
                return Err(TreeError::UnknownItem(p.clone()));
            }
        }

        let prefix = self.max_prefix + 1;
        let key = match item.id {
            Some(id) => ItemKey::Saved(id),
            None => ItemKey::New(prefix),
        };
        if self.nodes.contains_key(&key) {
            return Err(TreeError::DuplicateKey(key));
        }
        self.max_prefix = prefix;

        self.nodes.insert(
            key.clone(),
            TreeNode {
                key: key.clone(),
                prefix,
                item,
                parent: None,
                children: vec![],
            },
        );
        self.attach(&key, parent, usize::MAX);
        Ok(key)
    }

    /// Removes `key` and its whole subtree; returns the removed keys in pre-order.
    pub fn remove(&mut self, key: &ItemKey) -> Result<Vec<ItemKey>, TreeError> {
        if !self.nodes.contains_key(key) {
            return Err(TreeError::UnknownItem(key.clone()));
        }
        self.detach(key);

        let mut removed = vec![];
        let mut stack = vec![key.clone()];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.remove(&k) {
                stack.extend(node.children.into_iter().rev());
                removed.push(k);
            }
        }
        Ok(removed)
    }

    /// Moves `key` under `parent` at `index` (position after the item is taken out).
    ///
    /// Returns `Ok(None)` when the item would end up where it already is.
    pub fn move_item(
        &mut self,
        key: &ItemKey,
        parent: Option<&ItemKey>,
        index: usize,
    ) -> Result<Option<MoveOutcome>, TreeError> {
        let node = self
            .nodes
            .get(key)
            .ok_or_else(|| TreeError::UnknownItem(key.clone()))?;
        if let Some(p) = parent {
            if !self.nodes.contains_key(p) {
                return Err(TreeError::UnknownItem(p.clone()));
            }
            if self.is_ancestor_or_self(key, p) {
                return Err(TreeError::Cycle(key.clone()));
            }
        }

        let old_parent = node.parent.clone();
        let old_index = self.sibling_index(key).unwrap_or(0);

        let remaining = self.siblings(parent).len()
            - usize::from(old_parent.as_ref() == parent);
        let new_index = index.min(remaining);

        if old_parent.as_ref() == parent && old_index == new_index {
            return Ok(None);
        }

        self.detach(key);
        self.attach(key, parent, new_index);

        Ok(Some(MoveOutcome {
            key: key.clone(),
            old_parent,
            new_parent: parent.cloned(),
            old_index,
            new_index,
        }))
    }

    /// Moves `key` next to or into `target`, the row it was dropped on.
    pub fn move_relative(
        &mut self,
        key: &ItemKey,
        target: &ItemKey,
        position: DropPosition,
    ) -> Result<Option<MoveOutcome>, TreeError> {
        if !self.nodes.contains_key(key) {
            return Err(TreeError::UnknownItem(key.clone()));
        }
        if key == target {
            return Ok(None);
        }
        let target_node = self
            .nodes
            .get(target)
            .ok_or_else(|| TreeError::UnknownItem(target.clone()))?;

        match position {
            DropPosition::Inside => {
                let target = target_node.key.clone();
                self.move_item(key, Some(&target), usize::MAX)
            }
            DropPosition::Before | DropPosition::After => {
                let parent = target_node.parent.clone();
                // Index among siblings once `key` has been taken out.
                let idx = self
                    .siblings(parent.as_ref())
                    .iter()
                    .filter(|k| *k != key)
                    .position(|k| k == target)
                    .unwrap_or(0);
                let idx = if position == DropPosition::After {
                    idx + 1
                } else {
                    idx
                };
                self.move_item(key, parent.as_ref(), idx)
            }
        }
    }

    /// Applies an input edit. Returns whether the stored item changed.
    ///
    /// URL edits on sitemap-backed items are ignored.
    pub fn edit(&mut self, key: &ItemKey, edit: FieldEdit) -> Result<bool, TreeError> {
        let node = self
            .nodes
            .get_mut(key)
            .ok_or_else(|| TreeError::UnknownItem(key.clone()))?;
        let item = &mut node.item;

        let changed = match edit {
            FieldEdit::Title(title) => {
                let changed = item.title != title;
                item.title = title;
                changed
            }
            FieldEdit::Url(url) => {
                if !item.url_editable() {
                    return Ok(false);
                }
                let changed = item.url != url;
                item.url = url;
                changed
            }
            FieldEdit::Status(status) => {
                let changed = item.status != status;
                item.status = status;
                changed
            }
        };
        Ok(changed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn item(id: i64, parent: Option<i64>, title: &str) -> MenuItem {
        MenuItem {
            id: Some(id),
            parent_id: parent,
            title: title.to_string(),
            url: format!("/{}/", title.to_lowercase()),
            ..MenuItem::new_default()
        }
    }

    fn k(id: i64) -> ItemKey {
        ItemKey::Saved(id)
    }

    #[test]
    fn test_key_display_and_parse() {
        assert_eq!(k(12).to_string(), "12");
        assert_eq!(ItemKey::New(3).to_string(), "new-3");
        assert_eq!("new-3".parse::<ItemKey>(), Ok(ItemKey::New(3)));
        assert_eq!(" 12 ".parse::<ItemKey>(), Ok(k(12)));
        assert!("new-x".parse::<ItemKey>().is_err());
        assert!("".parse::<ItemKey>().is_err());
    }

    #[test]
    fn test_child_nested_under_parent() {
        let tree = MenuTree::from_items(vec![item(1, None, "Root"), item(2, Some(1), "Child")]);
        assert_eq!(tree.roots(), &[k(1)]);
        assert_eq!(tree.children(&k(1)), &[k(2)]);
        assert_eq!(tree.parent_of(&k(2)), Some(&k(1)));
        assert!(tree.contains(&k(2)));
    }

    #[test]
    fn test_subtree_is_parent_first() {
        let tree = MenuTree::from_items(vec![
            item(1, None, "A"),
            item(2, Some(1), "B"),
            item(3, Some(2), "C"),
            item(4, Some(1), "D"),
            item(5, None, "E"),
        ]);
        assert_eq!(tree.subtree(&k(1)), vec![k(1), k(2), k(3), k(4)]);
        assert_eq!(tree.subtree(&k(5)), vec![k(5)]);
        assert!(tree.subtree(&k(99)).is_empty());
    }

    #[test]
    fn test_child_listed_before_parent_still_attaches() {
        let tree = MenuTree::from_items(vec![item(2, Some(1), "Child"), item(1, None, "Root")]);
        assert_eq!(tree.roots(), &[k(1)]);
        assert_eq!(tree.children(&k(1)), &[k(2)]);
    }

    #[test]
    fn test_missing_parent_goes_to_root() {
        let tree = MenuTree::from_items(vec![item(1, None, "A"), item(2, Some(99), "B")]);
        assert_eq!(tree.roots(), &[k(1), k(2)]);
        assert!(tree.parent_of(&k(2)).is_none());
    }

    #[test]
    fn test_cyclic_listing_is_broken_at_root() {
        let tree = MenuTree::from_items(vec![item(1, Some(2), "A"), item(2, Some(1), "B")]);
        // 1 attaches under 2 first; 2 -> 1 would close the loop.
        assert_eq!(tree.roots(), &[k(2)]);
        assert_eq!(tree.children(&k(2)), &[k(1)]);
        assert_eq!(tree.preorder().len(), 2);
    }

    #[test]
    fn test_duplicate_listing_skipped() {
        let tree = MenuTree::from_items(vec![item(1, None, "A"), item(1, None, "A again")]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&k(1)).map(|n| n.item.title.as_str()), Some("A"));
    }

    #[test]
    fn test_prefixes_are_unique_and_monotonic() {
        let mut tree = MenuTree::from_items(vec![item(1, None, "A"), item(2, None, "B")]);
        assert_eq!(tree.max_prefix(), 2);

        let new_key = tree.insert(MenuItem::new_default(), None).expect("insert");
        assert_eq!(new_key, ItemKey::New(3));
        tree.remove(&new_key).expect("remove");

        let again = tree.insert(MenuItem::new_default(), None).expect("insert");
        assert_eq!(again, ItemKey::New(4));
        assert_eq!(tree.get(&again).map(|n| n.prefix), Some(4));
    }

    #[test]
    fn test_insert_under_unknown_parent_fails() {
        let mut tree = MenuTree::new();
        let err = tree.insert(MenuItem::new_default(), Some(&k(5))).unwrap_err();
        assert_eq!(err, TreeError::UnknownItem(k(5)));
        assert!(tree.is_empty());
        assert_eq!(tree.max_prefix(), 0);
    }

    #[test]
    fn test_insert_duplicate_saved_id_fails() {
        let mut tree = MenuTree::from_items(vec![item(1, None, "A")]);
        let err = tree.insert(item(1, None, "A"), None).unwrap_err();
        assert_eq!(err, TreeError::DuplicateKey(k(1)));
    }

    #[test]
    fn test_remove_takes_subtree_only() {
        let mut tree = MenuTree::from_items(vec![
            item(1, None, "A"),
            item(2, Some(1), "A1"),
            item(3, Some(2), "A1a"),
            item(4, None, "B"),
        ]);
        let removed = tree.remove(&k(1)).expect("remove");
        assert_eq!(removed, vec![k(1), k(2), k(3)]);
        assert_eq!(tree.roots(), &[k(4)]);
        assert_eq!(tree.len(), 1);
        assert!(tree.remove(&k(1)).is_err());
    }

    #[test]
    fn test_move_into_own_subtree_rejected() {
        let mut tree = MenuTree::from_items(vec![
            item(1, None, "A"),
            item(2, Some(1), "A1"),
            item(3, Some(2), "A1a"),
        ]);
        let before = tree.clone();
        assert_eq!(
            tree.move_item(&k(1), Some(&k(3)), 0),
            Err(TreeError::Cycle(k(1)))
        );
        assert_eq!(
            tree.move_relative(&k(1), &k(1), DropPosition::Inside),
            Ok(None)
        );
        assert_eq!(tree, before);
    }

    #[test]
    fn test_move_same_position_is_noop() {
        let mut tree = MenuTree::from_items(vec![item(1, None, "A"), item(2, None, "B")]);
        assert_eq!(tree.move_item(&k(2), None, 1), Ok(None));
        assert_eq!(tree.move_item(&k(2), None, 99), Ok(None));
        assert_eq!(tree.move_relative(&k(2), &k(1), DropPosition::After), Ok(None));
        assert_eq!(tree.move_relative(&k(1), &k(2), DropPosition::Before), Ok(None));
    }

    #[test]
    fn test_move_relative_before_after_inside() {
        let mut tree = MenuTree::from_items(vec![
            item(1, None, "A"),
            item(2, None, "B"),
            item(3, None, "C"),
        ]);

        let out = tree
            .move_relative(&k(3), &k(1), DropPosition::Before)
            .expect("move")
            .expect("changed");
        assert!(!out.parent_changed());
        assert_eq!((out.old_index, out.new_index), (2, 0));
        assert_eq!(tree.roots(), &[k(3), k(1), k(2)]);

        tree.move_relative(&k(3), &k(2), DropPosition::After)
            .expect("move");
        assert_eq!(tree.roots(), &[k(1), k(2), k(3)]);

        let out = tree
            .move_relative(&k(3), &k(1), DropPosition::Inside)
            .expect("move")
            .expect("changed");
        assert!(out.parent_changed());
        assert_eq!(out.new_parent, Some(k(1)));
        assert_eq!(tree.roots(), &[k(1), k(2)]);
        assert_eq!(tree.children(&k(1)), &[k(3)]);
    }

    #[test]
    fn test_move_to_root_end() {
        let mut tree = MenuTree::from_items(vec![
            item(1, None, "A"),
            item(2, Some(1), "A1"),
            item(3, None, "B"),
        ]);
        let out = tree
            .move_item(&k(2), None, usize::MAX)
            .expect("move")
            .expect("changed");
        assert_eq!(out.old_parent, Some(k(1)));
        assert_eq!(out.new_index, 2);
        assert_eq!(tree.roots(), &[k(1), k(3), k(2)]);
        assert!(tree.children(&k(1)).is_empty());
    }

    #[test]
    fn test_edit_respects_catalog_backed_url() {
        let mut backed = item(1, None, "A");
        backed.sitemap_item_id = Some(7);
        let mut tree = MenuTree::from_items(vec![backed, item(2, None, "B")]);

        assert_eq!(tree.edit(&k(1), FieldEdit::Url("/x/".into())), Ok(false));
        assert_eq!(tree.get(&k(1)).map(|n| n.item.url.as_str()), Some("/a/"));

        assert_eq!(tree.edit(&k(1), FieldEdit::Title("Alpha".into())), Ok(true));
        assert_eq!(tree.edit(&k(1), FieldEdit::Title("Alpha".into())), Ok(false));
        assert_eq!(tree.edit(&k(2), FieldEdit::Url("/b2/".into())), Ok(true));
        assert_eq!(
            tree.edit(&k(2), FieldEdit::Status(ItemStatus::Disabled)),
            Ok(true)
        );
        assert!(tree.edit(&k(9), FieldEdit::Title("?".into())).is_err());
    }

    #[test]
    fn test_preorder() {
        let tree = MenuTree::from_items(vec![
            item(1, None, "A"),
            item(4, None, "B"),
            item(2, Some(1), "A1"),
            item(3, Some(2), "A1a"),
        ]);
        assert_eq!(tree.preorder(), vec![k(1), k(2), k(3), k(4)]);
    }

    #[test]
    fn test_drop_position_from_offset() {
        assert_eq!(DropPosition::from_offset(2.0, 40.0), DropPosition::Before);
        assert_eq!(DropPosition::from_offset(20.0, 40.0), DropPosition::Inside);
        assert_eq!(DropPosition::from_offset(38.0, 40.0), DropPosition::After);
        assert_eq!(DropPosition::from_offset(5.0, 0.0), DropPosition::After);
    }
}
