//! Scoped value store: a lazily built tree keyed by the ranks of a
//! [`HierarchicalKey`], one level per key field.
//!
//! A value set with key `k` lives at the node reached by following the ranks
//! of `k`'s fields up to its last concrete field. Unset fields in the middle
//! of a key descend into the wildcard child (rank [`UNSET_RANK`]); the unset
//! suffix is never materialized. Nodes holding neither a value nor children
//! are pruned immediately, so the tree shape is a function of its contents.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use rtpc_types::{HierarchicalKey, UNSET_RANK};

/// Visitor verdict for the `*_ex` traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    /// Delete the visited value; its node is pruned if left empty.
    Remove,
}

/// Result of [`ScopedValueStore::find_exact_with_context`].
#[derive(Debug)]
pub struct ExactMatch<'a, V> {
    /// Value stored exactly at the key's scope
    pub value: Option<&'a V>,
    /// Deepest value stored on a strict ancestor scope
    pub parent_value: Option<&'a V>,
    /// Whether narrower scopes exist below the key
    pub has_children: bool,
}

#[derive(Debug)]
struct ScopeNode<V> {
    value: Option<V>,
    children: BTreeMap<u64, ScopeNode<V>>,
}

impl<V> ScopeNode<V> {
    fn new() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    fn value_count(&self) -> usize {
        self.value.is_some() as usize
            + self.children.values().map(ScopeNode::value_count).sum::<usize>()
    }

    fn node_count(&self) -> usize {
        1 + self.children.values().map(ScopeNode::node_count).sum::<usize>()
    }
}

/// Multi-level value tree for one logical parameter.
#[derive(Debug)]
pub struct ScopedValueStore<K, V> {
    root: ScopeNode<V>,
    len: usize,
    _key: PhantomData<K>,
}

impl<K, V> Default for ScopedValueStore<K, V> {
    fn default() -> Self {
        Self {
            root: ScopeNode::new(),
            len: 0,
            _key: PhantomData,
        }
    }
}

impl<K: HierarchicalKey, V> ScopedValueStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = ScopeNode::new();
        self.len = 0;
    }

    /// Store `value` at `key`'s scope, replacing any previous value.
    pub fn set(&mut self, key: &K, value: V) -> &mut V {
        let mut node = &mut self.root;
        for field in 0..key.concrete_depth() {
            node = node
                .children
                .entry(key.rank(field))
                .or_insert_with(ScopeNode::new);
        }
        if node.value.is_none() {
            self.len += 1;
        }
        node.value.insert(value)
    }

    /// Value at `key`'s exact scope, created with `make` if absent.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: &K, make: F) -> &mut V {
        let mut node = &mut self.root;
        for field in 0..key.concrete_depth() {
            node = node
                .children
                .entry(key.rank(field))
                .or_insert_with(ScopeNode::new);
        }
        if node.value.is_none() {
            self.len += 1;
        }
        node.value.get_or_insert_with(make)
    }

    /// Remove the value at `key`'s exact scope. Absent keys leave the tree untouched.
    pub fn unset(&mut self, key: &K) -> Option<V> {
        let removed = unset_at(&mut self.root, key, 0, key.concrete_depth());
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Exact lookup: never falls back to an ancestor's value.
    pub fn find_exact(&self, key: &K) -> Option<&V> {
        let mut node = &self.root;
        for field in 0..key.concrete_depth() {
            node = node.children.get(&key.rank(field))?;
        }
        node.value.as_ref()
    }

    /// Exact lookup that also reports the nearest ancestor value and whether
    /// narrower scopes exist, leaving fallback policy to the caller.
    pub fn find_exact_with_context(&self, key: &K) -> ExactMatch<'_, V> {
        let mut parent_value = None;
        let mut node = &self.root;
        for field in 0..key.concrete_depth() {
            if node.value.is_some() {
                parent_value = node.value.as_ref();
            }
            match node.children.get(&key.rank(field)) {
                Some(child) => node = child,
                None => {
                    return ExactMatch {
                        value: None,
                        parent_value,
                        has_children: false,
                    }
                }
            }
        }
        ExactMatch {
            value: node.value.as_ref(),
            parent_value,
            has_children: !node.children.is_empty(),
        }
    }

    /// Most specific value applying to `key`.
    ///
    /// Each field first tries its concrete child, then the wildcard child of
    /// the same field. The walk stops at the first field with neither, and the
    /// deepest value seen on the way down wins. On return `key` describes the
    /// scope that actually matched: fields resolved through the wildcard child
    /// and every field below the matched node are cleared. On a miss the key
    /// is cleared entirely.
    pub fn find_best_match(&self, key: &mut K) -> Option<&V> {
        let mut node = &self.root;
        let mut best: Option<(usize, &V)> = node.value.as_ref().map(|v| (0, v));

        for field in 0..K::DEPTH {
            let rank = key.rank(field);
            let next = match node.children.get(&rank) {
                Some(child) => Some(child),
                None if rank != UNSET_RANK => {
                    let wildcard = node.children.get(&UNSET_RANK);
                    if wildcard.is_some() {
                        key.clear_field(field);
                    }
                    wildcard
                }
                None => None,
            };
            match next {
                Some(child) => {
                    node = child;
                    if let Some(v) = node.value.as_ref() {
                        best = Some((field + 1, v));
                    }
                }
                None => break,
            }
        }

        match best {
            Some((depth, value)) => {
                key.clear_from(depth);
                Some(value)
            }
            None => {
                key.clear_from(0);
                None
            }
        }
    }

    /// Remove every value whose scope matches `pattern`. Concrete pattern
    /// fields restrict the walk to one child, unset ones fan out to all
    /// children, and once the rest of the pattern is unset the whole subtree
    /// goes. Returns the number of values removed.
    pub fn remove_all(&mut self, pattern: &K) -> usize {
        let removed = remove_matching(&mut self.root, pattern, 0, pattern.concrete_depth());
        self.len -= removed;
        if removed > 0 {
            log::trace!(target: "rtpc::store", "removed {} values matching {:?}", removed, pattern);
        }
        removed
    }

    /// Depth-first, parent before children.
    pub fn for_each<F: FnMut(&K, &V)>(&self, mut visitor: F) {
        self.for_each_matching(&K::unset(), &mut visitor);
    }

    /// Visit every value whose scope matches `pattern`.
    pub fn for_each_matching<F: FnMut(&K, &V)>(&self, pattern: &K, mut visitor: F) {
        let mut key = K::unset();
        visit(
            &self.root,
            &mut key,
            pattern,
            pattern.concrete_depth(),
            0,
            &mut visitor,
        );
    }

    /// Like [`for_each`](Self::for_each), but the visitor may mutate or remove values.
    pub fn for_each_ex<F: FnMut(&K, &mut V) -> Visit>(&mut self, mut visitor: F) -> usize {
        self.for_each_matching_ex(&K::unset(), &mut visitor)
    }

    /// Returns the number of values removed by the visitor.
    pub fn for_each_matching_ex<F: FnMut(&K, &mut V) -> Visit>(
        &mut self,
        pattern: &K,
        mut visitor: F,
    ) -> usize {
        let mut key = K::unset();
        let removed = visit_mut(
            &mut self.root,
            &mut key,
            pattern,
            pattern.concrete_depth(),
            0,
            &mut visitor,
        );
        self.len -= removed;
        removed
    }

    /// Whether a broad update at `value_key` must leave `key_to_check` alone
    /// because another value already governs it.
    ///
    /// False unless `key_to_check` lies inside `value_key`'s scope and is
    /// narrower. Otherwise follows `key_to_check`'s path the way
    /// [`find_best_match`] does and reports true when the deepest value on it
    /// is not the one stored at `value_key`, or when the path reaches
    /// `key_to_check`'s own scope with narrower scopes still below it.
    ///
    /// [`find_best_match`]: Self::find_best_match
    pub fn check_exception(&self, value_key: &K, key_to_check: &K) -> bool {
        if !key_to_check.match_valid_fields(value_key)
            || !key_to_check.has_narrower_scope_than(value_key)
        {
            return false;
        }
        let own_depth = value_key.concrete_depth();
        let end = key_to_check.concrete_depth();

        let mut node = &self.root;
        let mut on_value_path = true;
        // Whether the deepest value seen so far is the one at `value_key`
        let mut governed_by_own = own_depth == 0 && node.value.is_some();
        for field in 0..end {
            let rank = key_to_check.rank(field);
            let next = match node.children.get(&rank) {
                Some(child) => Some((child, rank)),
                None if rank != UNSET_RANK => {
                    node.children.get(&UNSET_RANK).map(|c| (c, UNSET_RANK))
                }
                None => None,
            };
            let Some((child, taken)) = next else {
                return !governed_by_own;
            };
            node = child;
            on_value_path &= taken == value_key.rank(field);
            if node.value.is_some() {
                governed_by_own = on_value_path && field + 1 == own_depth;
            }
        }
        !governed_by_own || !node.children.is_empty()
    }

    /// Total tree nodes including the root.
    pub(crate) fn node_count(&self) -> usize {
        self.root.node_count()
    }
}

fn unset_at<K: HierarchicalKey, V>(
    node: &mut ScopeNode<V>,
    key: &K,
    field: usize,
    depth: usize,
) -> Option<V> {
    if field == depth {
        return node.value.take();
    }
    let rank = key.rank(field);
    let child = node.children.get_mut(&rank)?;
    let removed = unset_at(child, key, field + 1, depth);
    if child.is_empty() {
        node.children.remove(&rank);
    }
    removed
}

fn remove_matching<K: HierarchicalKey, V>(
    node: &mut ScopeNode<V>,
    pattern: &K,
    field: usize,
    end: usize,
) -> usize {
    if field >= end {
        let removed = node.value_count();
        node.value = None;
        node.children.clear();
        return removed;
    }

    let rank = pattern.rank(field);
    if rank != UNSET_RANK {
        let Some(child) = node.children.get_mut(&rank) else {
            return 0;
        };
        let removed = remove_matching(child, pattern, field + 1, end);
        if child.is_empty() {
            node.children.remove(&rank);
        }
        removed
    } else {
        let removed = node
            .children
            .values_mut()
            .map(|child| remove_matching(child, pattern, field + 1, end))
            .sum();
        node.children.retain(|_, child| !child.is_empty());
        removed
    }
}

fn visit<K: HierarchicalKey, V, F: FnMut(&K, &V)>(
    node: &ScopeNode<V>,
    key: &mut K,
    pattern: &K,
    end: usize,
    field: usize,
    visitor: &mut F,
) {
    if field >= end {
        if let Some(v) = node.value.as_ref() {
            visitor(key, v);
        }
    }
    if field >= K::DEPTH {
        return;
    }

    let rank = pattern.rank(field);
    if field < end && rank != UNSET_RANK {
        if let Some(child) = node.children.get(&rank) {
            key.set_rank(field, rank);
            visit(child, key, pattern, end, field + 1, visitor);
        }
    } else {
        for (child_rank, child) in &node.children {
            key.set_rank(field, *child_rank);
            visit(child, key, pattern, end, field + 1, visitor);
        }
    }
    key.clear_field(field);
}

fn visit_mut<K: HierarchicalKey, V, F: FnMut(&K, &mut V) -> Visit>(
    node: &mut ScopeNode<V>,
    key: &mut K,
    pattern: &K,
    end: usize,
    field: usize,
    visitor: &mut F,
) -> usize {
    let mut removed = 0;
    if field >= end {
        if let Some(v) = node.value.as_mut() {
            if visitor(key, v) == Visit::Remove {
                node.value = None;
                removed += 1;
            }
        }
    }
    if field >= K::DEPTH {
        return removed;
    }

    let rank = pattern.rank(field);
    if field < end && rank != UNSET_RANK {
        if let Some(child) = node.children.get_mut(&rank) {
            key.set_rank(field, rank);
            removed += visit_mut(child, key, pattern, end, field + 1, visitor);
            if child.is_empty() {
                node.children.remove(&rank);
            }
        }
    } else {
        for (child_rank, child) in node.children.iter_mut() {
            key.set_rank(field, *child_rank);
            removed += visit_mut(child, key, pattern, end, field + 1, visitor);
        }
        node.children.retain(|_, child| !child.is_empty());
    }
    key.clear_field(field);
    removed
}
