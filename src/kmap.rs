//! Persistent int->Kleene maps.
//!
//! A [`KleeneMap`] is a base-3 trie whose leaves are 64-value packed
//! blocks; every key outside the explicit domain reads as `false`.
//! This is the interpretation of one predicate class at one node (or
//! node pair, or the whole nullary section): keys are dense predicate
//! numbers. The same type doubles as the *value* of the outer
//! node-indexed maps, which is why it implements [`TrieValue`] itself.

use crate::intern::{InternTables, Table};
use crate::kleene::Kleene;
use crate::leaf::{PackedLeaf, LEAF_SIZE};
use crate::trie::{Trie, TrieKey, TrieValue};

impl TrieValue for PackedLeaf {
    fn default_value() -> Self {
        PackedLeaf::all_false()
    }

    fn is_default(&self) -> bool {
        self.is_all_false()
    }

    fn join(a: &Self, b: &Self) -> Self {
        a.join(b)
    }

    fn normalize(&self, tables: &mut InternTables) -> Self {
        self.normalize(tables)
    }

    fn uid(&self) -> u32 {
        self.uid()
    }

    fn table(tables: &mut InternTables) -> &mut Table<TrieKey> {
        &mut tables.kleene_tries
    }
}

/// A persistent map from `u32` keys to Kleene values, false by
/// default.
#[derive(Clone, Default)]
pub struct KleeneMap {
    major: Trie<PackedLeaf>,
}

impl KleeneMap {
    /// The all-false map.
    pub fn new() -> Self {
        Self {
            major: Trie::Default,
        }
    }

    pub fn get(&self, key: u32) -> Kleene {
        match self.major.get(key / LEAF_SIZE) {
            Some(leaf) => leaf.get(key % LEAF_SIZE),
            None => Kleene::False,
        }
    }

    /// Persistent update; the receiver is unchanged. Writing the value
    /// already present returns an equivalent map without new
    /// structure.
    pub fn set(&self, key: u32, k: Kleene) -> KleeneMap {
        let block = key / LEAF_SIZE;
        let leaf = match self.major.get(block) {
            Some(leaf) => leaf.clone(),
            None => {
                if k == Kleene::False {
                    return self.clone();
                }
                PackedLeaf::all_false()
            }
        };
        if leaf.get(key % LEAF_SIZE) == k {
            return self.clone();
        }
        let updated = leaf.set(key % LEAF_SIZE, k);
        let slot = if updated.is_all_false() {
            None
        } else {
            Some(updated)
        };
        KleeneMap {
            major: self.major.set(block, slot),
        }
    }

    /// Pointwise information-order join.
    pub fn join(&self, other: &KleeneMap) -> KleeneMap {
        KleeneMap {
            major: Trie::join(&self.major, &other.major),
        }
    }

    /// Intern into canonical form. Two normalized maps have the same
    /// [`uid`](Self::uid) iff they are pointwise equal.
    pub fn normalize(&self, tables: &mut InternTables) -> KleeneMap {
        KleeneMap {
            major: self.major.normalize(tables),
        }
    }

    /// Canonical id of a normalized map. The never-written all-false
    /// map reads as id 0.
    pub fn uid(&self) -> u32 {
        self.major.uid()
    }

    /// Is this the structurally-default (all-false, never-written)
    /// map?
    pub fn is_default(&self) -> bool {
        self.major.is_default()
    }

    /// Visit every non-false entry.
    pub fn for_each_non_false(&self, f: &mut impl FnMut(u32, Kleene)) {
        self.major.for_each(&mut |block, leaf| {
            leaf.for_each_non_false(block * LEAF_SIZE, f);
        });
    }
}

impl TrieValue for KleeneMap {
    fn default_value() -> Self {
        KleeneMap::new()
    }

    fn is_default(&self) -> bool {
        self.major.is_default()
    }

    fn join(a: &Self, b: &Self) -> Self {
        a.join(b)
    }

    fn normalize(&self, tables: &mut InternTables) -> Self {
        self.normalize(tables)
    }

    fn uid(&self) -> u32 {
        self.uid()
    }

    fn table(tables: &mut InternTables) -> &mut Table<TrieKey> {
        &mut tables.outer_tries
    }
}
