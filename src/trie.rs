//! Persistent base-3 tries.
//!
//! A [`Trie`] maps non-negative integer keys to values, with an
//! explicit [`Trie::Default`] variant standing for the map that sends
//! every key to the value type's default. All maps arise from a finite
//! number of persistent updates of the default map: `set` returns a
//! new trie sharing all untouched substructure, growing the root by
//! wrapping it in a taller node when the key is out of range.
//!
//! `normalize` rewrites a trie bottom-up into its canonical form:
//! every value and every trie node is interned, absent slots become
//! explicit default entries, and a node whose upper two children are
//! all-default collapses to its first child, so that pointwise-equal
//! maps always end up with the same canonical id.

use std::cell::Cell;
use std::rc::Rc;

use crate::intern::{InternTables, Table, DEFAULT_UID};
use crate::utils::{hash3, mix, MyHash};

/// Behavior a payload type must supply for its trie family.
///
/// The two instantiations in this crate are packed Kleene leaves (for
/// int->Kleene maps) and whole Kleene maps (for the outer node-indexed
/// maps); each family interns its trie nodes in its own table.
pub trait TrieValue: Clone {
    fn default_value() -> Self;
    fn is_default(&self) -> bool;
    fn join(a: &Self, b: &Self) -> Self;
    /// Intern the value, caching its canonical id. Idempotent.
    fn normalize(&self, tables: &mut InternTables) -> Self;
    /// Canonical id; only meaningful after `normalize`.
    fn uid(&self) -> u32;
    /// The intern table for trie nodes over this value type.
    fn table(tables: &mut InternTables) -> &mut Table<TrieKey>;
}

/// Structural key of a normalized trie node: leaf nodes have `span`
/// 3 and carry value ids, taller nodes carry child node ids.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TrieKey {
    pub span: u32,
    pub items: [u32; 3],
}

impl MyHash for TrieKey {
    fn hash(&self) -> u64 {
        mix(
            hash3(
                self.items[0] as u64,
                self.items[1] as u64,
                self.items[2] as u64,
            ),
            self.span as u64,
        )
    }
}

#[derive(Clone)]
pub enum Trie<V: TrieValue> {
    /// Every key maps to the default value.
    Default,
    Node(Rc<TrieNode<V>>),
}

pub struct TrieNode<V: TrieValue> {
    /// Canonical id; `DEFAULT_UID` until this node is interned.
    uid: Cell<u32>,
    kind: TrieKind<V>,
}

enum TrieKind<V: TrieValue> {
    Leaf([Option<V>; 3]),
    Branch {
        child_span: u32,
        children: [Trie<V>; 3],
    },
}

fn leaf<V: TrieValue>(values: [Option<V>; 3]) -> Trie<V> {
    Trie::Node(Rc::new(TrieNode {
        uid: Cell::new(DEFAULT_UID),
        kind: TrieKind::Leaf(values),
    }))
}

fn branch<V: TrieValue>(child_span: u32, children: [Trie<V>; 3]) -> Trie<V> {
    Trie::Node(Rc::new(TrieNode {
        uid: Cell::new(DEFAULT_UID),
        kind: TrieKind::Branch {
            child_span,
            children,
        },
    }))
}

impl<V: TrieValue> Trie<V> {
    pub fn new() -> Self {
        Trie::Default
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Trie::Default)
    }

    /// Number of keys addressable without growing (0 for the default).
    fn span(&self) -> u32 {
        match self {
            Trie::Default => 0,
            Trie::Node(n) => match &n.kind {
                TrieKind::Leaf(_) => 3,
                TrieKind::Branch { child_span, .. } => 3 * child_span,
            },
        }
    }

    /// Canonical id of a normalized trie (`DEFAULT_UID` for the
    /// default map placeholder).
    pub fn uid(&self) -> u32 {
        match self {
            Trie::Default => DEFAULT_UID,
            Trie::Node(n) => {
                let uid = n.uid.get();
                assert_ne!(uid, DEFAULT_UID, "Trie node was not normalized");
                uid
            }
        }
    }

    pub fn get(&self, key: u32) -> Option<&V> {
        match self {
            Trie::Default => None,
            Trie::Node(n) => match &n.kind {
                TrieKind::Leaf(values) => {
                    if key < 3 {
                        values[key as usize].as_ref()
                    } else {
                        None
                    }
                }
                TrieKind::Branch {
                    child_span,
                    children,
                } => {
                    if key >= 3 * child_span {
                        None
                    } else {
                        children[(key / child_span) as usize].get(key % child_span)
                    }
                }
            },
        }
    }

    /// Persistent update: return a new trie with `key` bound to
    /// `value` (`None` restores the default). The receiver is
    /// unchanged and all untouched substructure is shared.
    pub fn set(&self, key: u32, value: Option<V>) -> Trie<V> {
        if self.is_default() {
            return match value {
                None => Trie::Default,
                Some(v) => Self::point(key, v),
            };
        }
        // Grow the root until the key is in range.
        let mut root = self.clone();
        while root.span() <= key {
            let child_span = root.span();
            root = branch(child_span, [root, Trie::Default, Trie::Default]);
        }
        root.update_in_range(key, value)
    }

    /// A singleton map `[key -> value]`, built bottom-up.
    fn point(key: u32, value: V) -> Trie<V> {
        let mut values = [None, None, None];
        values[(key % 3) as usize] = Some(value);
        let mut result = leaf(values);
        let mut i = key / 3;
        while i > 0 {
            let child_span = result.span();
            let mut children = [Trie::Default, Trie::Default, Trie::Default];
            children[(i % 3) as usize] = result;
            result = branch(child_span, children);
            i /= 3;
        }
        result
    }

    fn update_in_range(&self, key: u32, value: Option<V>) -> Trie<V> {
        match self {
            Trie::Default => unreachable!("update_in_range on the default map"),
            Trie::Node(n) => match &n.kind {
                TrieKind::Leaf(values) => {
                    let mut new_values = values.clone();
                    new_values[key as usize] = value;
                    leaf(new_values)
                }
                TrieKind::Branch {
                    child_span,
                    children,
                } => {
                    let index = (key / child_span) as usize;
                    let mut new_children = children.clone();
                    new_children[index] = children[index].set(key % child_span, value);
                    branch(*child_span, new_children)
                }
            },
        }
    }

    /// Pointwise information-order join of two maps.
    pub fn join(a: &Trie<V>, b: &Trie<V>) -> Trie<V> {
        match (a, b) {
            (Trie::Default, Trie::Default) => Trie::Default,
            (Trie::Default, _) => b.join_default(),
            (_, Trie::Default) => a.join_default(),
            (Trie::Node(na), Trie::Node(nb)) => {
                if a.span() < b.span() {
                    return Trie::join(b, a);
                }
                if a.span() > b.span() {
                    match &na.kind {
                        TrieKind::Branch {
                            child_span,
                            children,
                        } => branch(
                            *child_span,
                            [
                                Trie::join(&children[0], b),
                                children[1].join_default(),
                                children[2].join_default(),
                            ],
                        ),
                        TrieKind::Leaf(_) => unreachable!("leaf wider than a non-default trie"),
                    }
                } else {
                    match (&na.kind, &nb.kind) {
                        (TrieKind::Leaf(va), TrieKind::Leaf(vb)) => {
                            let default = V::default_value();
                            let values = std::array::from_fn(|i| match (&va[i], &vb[i]) {
                                (None, None) => None,
                                (x, y) => Some(V::join(
                                    x.as_ref().unwrap_or(&default),
                                    y.as_ref().unwrap_or(&default),
                                )),
                            });
                            leaf(values)
                        }
                        (
                            TrieKind::Branch {
                                child_span,
                                children: ca,
                            },
                            TrieKind::Branch { children: cb, .. },
                        ) => branch(
                            *child_span,
                            std::array::from_fn(|i| Trie::join(&ca[i], &cb[i])),
                        ),
                        _ => unreachable!("equal spans imply equal node shapes"),
                    }
                }
            }
        }
    }

    /// Join every entry with the default value. Not the identity: for
    /// Kleene payloads, joining a definite value with false loses
    /// information.
    fn join_default(&self) -> Trie<V> {
        match self {
            Trie::Default => Trie::Default,
            Trie::Node(n) => match &n.kind {
                TrieKind::Leaf(values) => {
                    let default = V::default_value();
                    leaf(std::array::from_fn(|i| {
                        values[i].as_ref().map(|v| V::join(v, &default))
                    }))
                }
                TrieKind::Branch {
                    child_span,
                    children,
                } => branch(
                    *child_span,
                    std::array::from_fn(|i| children[i].join_default()),
                ),
            },
        }
    }

    /// Canonicalize: intern values and nodes bottom-up, make default
    /// slots explicit, collapse spans. After this, two tries have the
    /// same `uid` iff they are pointwise equal.
    pub fn normalize(&self, tables: &mut InternTables) -> Trie<V> {
        let default_value = V::default_value().normalize(tables);
        let default_leaf = Self::normalized_default(tables, &default_value);
        self.normalize_rec(tables, &default_value, &default_leaf)
    }

    /// The canonical form of the all-default map: one interned leaf.
    fn normalized_default(tables: &mut InternTables, default_value: &V) -> Trie<V> {
        let key = TrieKey {
            span: 3,
            items: [default_value.uid(); 3],
        };
        let uid = V::table(tables).put(key);
        Trie::Node(Rc::new(TrieNode {
            uid: Cell::new(uid),
            kind: TrieKind::Leaf([
                Some(default_value.clone()),
                Some(default_value.clone()),
                Some(default_value.clone()),
            ]),
        }))
    }

    fn normalize_rec(&self, tables: &mut InternTables, default_value: &V, default_leaf: &Trie<V>) -> Trie<V> {
        let node = match self {
            Trie::Default => return default_leaf.clone(),
            Trie::Node(n) => n,
        };
        if node.uid.get() != DEFAULT_UID {
            // Interned nodes are already canonical.
            return self.clone();
        }
        match &node.kind {
            TrieKind::Leaf(values) => {
                let normalized: [V; 3] = std::array::from_fn(|i| match &values[i] {
                    Some(v) => v.normalize(tables),
                    None => default_value.clone(),
                });
                let key = TrieKey {
                    span: 3,
                    items: [normalized[0].uid(), normalized[1].uid(), normalized[2].uid()],
                };
                let uid = V::table(tables).put(key);
                let [v0, v1, v2] = normalized;
                Trie::Node(Rc::new(TrieNode {
                    uid: Cell::new(uid),
                    kind: TrieKind::Leaf([Some(v0), Some(v1), Some(v2)]),
                }))
            }
            TrieKind::Branch {
                child_span,
                children,
            } => {
                let normalized: [Trie<V>; 3] =
                    std::array::from_fn(|i| children[i].normalize_rec(tables, default_value, default_leaf));
                let default_uid = default_leaf.uid();
                if normalized[1].uid() == default_uid && normalized[2].uid() == default_uid {
                    // The upper two thirds are all-default: the whole
                    // node denotes the same map as its first child.
                    let [first, _, _] = normalized;
                    return first;
                }
                let key = TrieKey {
                    span: 3 * child_span,
                    items: [normalized[0].uid(), normalized[1].uid(), normalized[2].uid()],
                };
                let uid = V::table(tables).put(key);
                Trie::Node(Rc::new(TrieNode {
                    uid: Cell::new(uid),
                    kind: TrieKind::Branch {
                        child_span: *child_span,
                        children: normalized,
                    },
                }))
            }
        }
    }

    /// Visit every explicit entry as `(key, value)`. After
    /// normalization explicit entries include default values; callers
    /// that only want live data must filter.
    pub fn for_each(&self, f: &mut impl FnMut(u32, &V)) {
        self.visit(0, f)
    }

    fn visit(&self, base: u32, f: &mut impl FnMut(u32, &V)) {
        match self {
            Trie::Default => {}
            Trie::Node(n) => match &n.kind {
                TrieKind::Leaf(values) => {
                    for (i, slot) in values.iter().enumerate() {
                        if let Some(v) = slot {
                            f(base + i as u32, v);
                        }
                    }
                }
                TrieKind::Branch {
                    child_span,
                    children,
                } => {
                    children[0].visit(base, f);
                    children[1].visit(base + child_span, f);
                    children[2].visit(base + 2 * child_span, f);
                }
            },
        }
    }
}

impl<V: TrieValue> Default for Trie<V> {
    fn default() -> Self {
        Trie::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::CanonicLevel;
    use crate::kleene::Kleene;
    use crate::leaf::PackedLeaf;

    fn some_leaf(slot: u32, k: Kleene) -> Option<PackedLeaf> {
        Some(PackedLeaf::all_false().set(slot, k))
    }

    #[test]
    fn test_set_get() {
        let empty: Trie<PackedLeaf> = Trie::new();
        assert!(empty.get(0).is_none());
        assert!(empty.get(1000).is_none());

        let t = empty.set(7, some_leaf(1, Kleene::True));
        assert!(t.get(6).is_none());
        assert_eq!(t.get(7).unwrap().get(1), Kleene::True);
        assert!(empty.get(7).is_none(), "original is unchanged");
    }

    #[test]
    fn test_grow_and_clear() {
        let t: Trie<PackedLeaf> = Trie::new()
            .set(2, some_leaf(0, Kleene::True))
            .set(80, some_leaf(0, Kleene::Unknown));
        assert_eq!(t.get(2).unwrap().get(0), Kleene::True);
        assert_eq!(t.get(80).unwrap().get(0), Kleene::Unknown);

        let cleared = t.set(2, None);
        assert!(cleared.get(2).is_none());
        assert_eq!(cleared.get(80).unwrap().get(0), Kleene::Unknown);
    }

    #[test]
    fn test_normalize_collapses_spans() {
        let mut tables = InternTables::new(CanonicLevel::Leaves);

        // Same content, but one trie grew to a larger span and back.
        let a: Trie<PackedLeaf> = Trie::new().set(1, some_leaf(3, Kleene::True));
        let b: Trie<PackedLeaf> = Trie::new()
            .set(1, some_leaf(3, Kleene::True))
            .set(40, some_leaf(0, Kleene::True))
            .set(40, None);

        let na = a.normalize(&mut tables);
        let nb = b.normalize(&mut tables);
        assert_eq!(na.uid(), nb.uid());
    }

    #[test]
    fn test_normalize_explicit_defaults() {
        let mut tables = InternTables::new(CanonicLevel::Leaves);

        // An explicitly stored all-false leaf is the same map as an
        // absent entry.
        let a: Trie<PackedLeaf> = Trie::new().set(0, Some(PackedLeaf::all_false()));
        let b: Trie<PackedLeaf> = Trie::new();
        assert_eq!(
            a.normalize(&mut tables).uid(),
            b.normalize(&mut tables).uid()
        );
    }

    #[test]
    fn test_join_widens() {
        let a: Trie<PackedLeaf> = Trie::new().set(0, some_leaf(0, Kleene::True));
        let j = Trie::join(&a, &Trie::Default);
        // true joined with the implicit false is unknown.
        assert_eq!(j.get(0).unwrap().get(0), Kleene::Unknown);
    }
}
