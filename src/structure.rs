//! Three-valued logical structures.
//!
//! A [`Structure`] is a node universe plus one persistent map per
//! predicate class: a nullary map, two unary maps (abstraction and
//! plain, both keyed by node id) and a binary map keyed by the Cantor
//! diagonal pairing of two node ids. The structure itself is a thin
//! mutable cell over those immutable maps: updates swap in new maps,
//! and [`Clone`] is an O(1) snapshot sharing everything.
//!
//! The two correctness-critical operations live here:
//!
//! - [`blur`](Structure::blur) performs canonical abstraction: nodes
//!   that agree on every abstraction predicate merge into one summary
//!   node whose remaining values are the pointwise Kleene join of the
//!   merged nodes. Blur bounds the universe, which is what bounds the
//!   whole abstract state space.
//! - [`normalize`](Structure::normalize) interns the structure at the
//!   run's canonicalization level, making isomorphism checks cheap
//!   (up to O(1) at the renumbering and folded levels).

use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::error::{Result, TvsError};
use crate::intern::{CanonicLevel, InternTables, DEFAULT_UID};
use crate::kleene::Kleene;
use crate::kmap::KleeneMap;
use crate::node::{Node, NodeTuple};
use crate::predicate::{Predicate, Vocabulary};
use crate::trie::Trie;
use crate::universe::Universe;
use crate::utils::{hash2, mix, pairing_cantor, unpair_cantor};

/// Largest key the base-3 tries can address without overflowing
/// their span arithmetic.
const MAX_MAP_KEY: u64 = 3u64.pow(20) - 1;

/// Diagonal pairing of two node ids into one binary-map key.
fn code(a: Node, b: Node) -> u32 {
    let code = pairing_cantor(a.id() as u64, b.id() as u64);
    // Validated when the participating nodes were allocated.
    assert!(code <= MAX_MAP_KEY, "Unvalidated node pair");
    code as u32
}

fn try_code(a: Node, b: Node) -> Result<u32> {
    let code = pairing_cantor(a.id() as u64, b.id() as u64);
    if code > MAX_MAP_KEY {
        return Err(TvsError::PairOverflow(a.id(), b.id()));
    }
    Ok(code as u32)
}

/// A three-valued structure: one abstract heap configuration.
#[derive(Clone)]
pub struct Structure {
    vocabulary: Rc<Vocabulary>,
    universe: Universe,
    nullary: KleeneMap,
    abs_unary: Trie<KleeneMap>,
    plain_unary: Trie<KleeneMap>,
    binary: Trie<KleeneMap>,
    blurred: bool,
    /// Canonicalization level this structure was last normalized
    /// under, if any.
    level: Option<CanonicLevel>,
    /// Folded whole-structure signature (level 4 only).
    folded: Option<u32>,
}

impl Structure {
    /// An empty structure over the given vocabulary.
    pub fn new(vocabulary: Rc<Vocabulary>) -> Self {
        Structure {
            vocabulary,
            universe: Universe::new(),
            nullary: KleeneMap::new(),
            abs_unary: Trie::new(),
            plain_unary: Trie::new(),
            binary: Trie::new(),
            blurred: false,
            level: None,
            folded: None,
        }
    }

    pub fn vocabulary(&self) -> &Rc<Vocabulary> {
        &self.vocabulary
    }

    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.universe.iter()
    }

    pub fn node_count(&self) -> u32 {
        self.universe.len()
    }

    /// Has canonical abstraction already been applied since the last
    /// relevant update?
    pub fn is_blurred(&self) -> bool {
        self.blurred
    }

    /// The level this structure was last normalized under.
    pub fn canonic_level(&self) -> Option<CanonicLevel> {
        self.level
    }

    fn invalidate_normal_form(&mut self) {
        self.level = None;
        self.folded = None;
    }

    // ----- per-arity evaluation ------------------------------------

    pub fn eval_nullary(&self, p: &Predicate) -> Kleene {
        assert_eq!(p.arity(), 0, "Predicate {} is not nullary", p);
        self.nullary.get(p.num())
    }

    pub fn eval_unary(&self, p: &Predicate, n: Node) -> Kleene {
        assert_eq!(p.arity(), 1, "Predicate {} is not unary", p);
        let map = if p.abstraction() {
            &self.abs_unary
        } else {
            &self.plain_unary
        };
        match map.get(n.id()) {
            Some(flik) => flik.get(p.num()),
            None => Kleene::False,
        }
    }

    pub fn eval_binary(&self, p: &Predicate, a: Node, b: Node) -> Kleene {
        assert_eq!(p.arity(), 2, "Predicate {} is not binary", p);
        match self.binary.get(code(a, b)) {
            Some(flik) => flik.get(p.num()),
            None => Kleene::False,
        }
    }

    /// The predicate's value on a node tuple.
    pub fn eval(&self, p: &Predicate, tuple: &NodeTuple) -> Result<Kleene> {
        if p.arity() as usize != tuple.len() {
            return Err(TvsError::ArityMismatch {
                predicate: p.name().to_string(),
                expected: p.arity(),
                actual: tuple.len(),
            });
        }
        match tuple {
            NodeTuple::Empty => Ok(self.eval_nullary(p)),
            NodeTuple::Single(n) => Ok(self.eval_unary(p, *n)),
            NodeTuple::Pair(a, b) => Ok(self.eval_binary(p, *a, *b)),
            NodeTuple::Many(_) => Err(TvsError::UnsupportedArity(p.arity())),
        }
    }

    // ----- per-arity update ----------------------------------------

    pub fn update_nullary(&mut self, p: &Predicate, k: Kleene) {
        if self.eval_nullary(p) == k {
            return;
        }
        self.nullary = self.nullary.set(p.num(), k);
        self.invalidate_normal_form();
    }

    pub fn update_unary(&mut self, p: &Predicate, n: Node, k: Kleene) {
        if self.eval_unary(p, n) == k {
            return;
        }
        let map = if p.abstraction() {
            &self.abs_unary
        } else {
            &self.plain_unary
        };
        let flik = match map.get(n.id()) {
            Some(flik) => flik.clone(),
            None => KleeneMap::new(),
        };
        let updated = flik.set(p.num(), k);
        let slot = if updated.is_default() {
            None
        } else {
            Some(updated)
        };
        if p.abstraction() {
            self.abs_unary = self.abs_unary.set(n.id(), slot);
            self.blurred = false;
        } else {
            self.plain_unary = self.plain_unary.set(n.id(), slot);
        }
        self.invalidate_normal_form();
    }

    pub fn update_binary(&mut self, p: &Predicate, a: Node, b: Node, k: Kleene) {
        if self.eval_binary(p, a, b) == k {
            return;
        }
        let key = code(a, b);
        let flik = match self.binary.get(key) {
            Some(flik) => flik.clone(),
            None => KleeneMap::new(),
        };
        let updated = flik.set(p.num(), k);
        let slot = if updated.is_default() {
            None
        } else {
            Some(updated)
        };
        self.binary = self.binary.set(key, slot);
        self.invalidate_normal_form();
    }

    /// Assign a new value to the predicate on a node tuple. A write of
    /// the value already present is a no-op.
    pub fn update(&mut self, p: &Predicate, tuple: &NodeTuple, k: Kleene) -> Result<()> {
        if p.arity() as usize != tuple.len() {
            return Err(TvsError::ArityMismatch {
                predicate: p.name().to_string(),
                expected: p.arity(),
                actual: tuple.len(),
            });
        }
        match tuple {
            NodeTuple::Empty => self.update_nullary(p, k),
            NodeTuple::Single(n) => self.update_unary(p, *n, k),
            NodeTuple::Pair(a, b) => self.update_binary(p, *a, *b, k),
            NodeTuple::Many(_) => return Err(TvsError::UnsupportedArity(p.arity())),
        }
        Ok(())
    }

    /// Reset every value of a predicate to false.
    pub fn clear_predicate(&mut self, p: &Predicate) -> Result<()> {
        let nodes: Vec<Node> = self.universe.iter().collect();
        match p.arity() {
            0 => self.update_nullary(p, Kleene::False),
            1 => {
                for &n in &nodes {
                    self.update_unary(p, n, Kleene::False);
                }
            }
            2 => {
                for &a in &nodes {
                    for &b in &nodes {
                        self.update_binary(p, a, b, Kleene::False);
                    }
                }
            }
            arity => return Err(TvsError::UnsupportedArity(arity)),
        }
        Ok(())
    }

    // ----- node lifecycle ------------------------------------------

    /// Allocate a node, clear any stale entries a recycled id may
    /// have, and mark it active.
    pub fn new_node(&mut self) -> Result<Node> {
        let node = self.universe.alloc()?;
        // Every pair over the universe must fit the pairing key
        // space; the largest code involves the largest id.
        let max_id = self
            .universe
            .iter()
            .map(Node::id)
            .max()
            .unwrap_or(node.id());
        if let Err(e) = try_code(Node::new(max_id), Node::new(max_id)) {
            self.universe.remove(node);
            return Err(e);
        }
        self.clear_node_entries(node);
        let active = self.vocabulary.active().clone();
        self.update_unary(&active, node, Kleene::True);
        self.blurred = false;
        Ok(node)
    }

    /// Remove a node, recycling its id.
    pub fn remove_node(&mut self, node: Node) {
        self.clear_node_entries(node);
        self.universe.remove(node);
        self.invalidate_normal_form();
    }

    fn clear_node_entries(&mut self, node: Node) {
        self.abs_unary = self.abs_unary.set(node.id(), None);
        self.plain_unary = self.plain_unary.set(node.id(), None);
        let nodes: Vec<Node> = self.universe.iter().collect();
        for &m in &nodes {
            self.binary = self.binary.set(code(node, m), None);
            self.binary = self.binary.set(code(m, node), None);
        }
        self.invalidate_normal_form();
    }

    // ----- canonical abstraction -----------------------------------

    fn abs_flik(&self, n: Node) -> KleeneMap {
        match self.abs_unary.get(n.id()) {
            Some(flik) => flik.clone(),
            None => KleeneMap::new(),
        }
    }

    fn plain_flik(&self, n: Node) -> KleeneMap {
        match self.plain_unary.get(n.id()) {
            Some(flik) => flik.clone(),
            None => KleeneMap::new(),
        }
    }

    fn bin_flik(&self, a: Node, b: Node) -> KleeneMap {
        match self.binary.get(code(a, b)) {
            Some(flik) => flik.clone(),
            None => KleeneMap::new(),
        }
    }

    /// Canonical name of a node: the id of its interned abstraction
    /// sub-map. Two nodes share a name iff they agree on every
    /// abstraction predicate. Only meaningful once blurred.
    pub fn canonic_name(&self, n: Node) -> u32 {
        match self.abs_unary.get(n.id()) {
            Some(flik) => flik.uid(),
            None => DEFAULT_UID,
        }
    }

    /// Canonical abstraction. Merges every maximal run of nodes
    /// sharing a canonical name into one survivor whose plain-unary
    /// and binary values are the Kleene join of the merged nodes, and
    /// whose summary marker becomes unknown. Idempotent.
    pub fn blur(&mut self, tables: &mut InternTables) {
        if self.blurred {
            return;
        }
        debug!("blur: {} nodes", self.universe.len());

        // Canonical names: interned abstraction sub-maps, stored back
        // explicitly so name comparison is id comparison.
        let nodes: Vec<Node> = self.universe.iter().collect();
        let mut keyed: Vec<(u32, Node)> = Vec::with_capacity(nodes.len());
        for &n in &nodes {
            let flik = self.abs_flik(n).normalize(tables);
            let uid = flik.uid();
            self.abs_unary = self.abs_unary.set(n.id(), Some(flik));
            keyed.push((uid, n));
        }
        keyed.sort_by_key(|&(uid, n)| (uid, n.id()));

        let mut alive: Vec<Node> = keyed.iter().map(|&(_, n)| n).collect();
        let mut merged_away: Vec<Node> = Vec::new();
        let sm = self.vocabulary.sm().clone();

        let mut start = 0;
        while start < keyed.len() {
            let (name, survivor) = keyed[start];
            let mut next = start + 1;
            while next < keyed.len() && keyed[next].0 == name {
                let victim = keyed[next].1;
                debug!("blur: merging {} into {}", victim, survivor);
                self.merge_nodes(survivor, victim, &alive, &sm);
                alive.retain(|&n| n != victim);
                merged_away.push(victim);
                next += 1;
            }
            start = next;
        }

        // Rebuild the universe in canonical-name order.
        let mut fresh = self.universe.empty_copy();
        for &n in alive.iter().rev() {
            fresh.push_front(n);
        }
        for &n in &merged_away {
            fresh.recycle(n);
        }
        self.universe = fresh;
        self.blurred = true;
        self.invalidate_normal_form();
    }

    fn merge_nodes(&mut self, survivor: Node, victim: Node, alive: &[Node], sm: &Predicate) {
        let merged = self.plain_flik(survivor).join(&self.plain_flik(victim));
        self.plain_unary = self.plain_unary.set(survivor.id(), Some(merged));

        for &other in alive {
            if other == survivor || other == victim {
                continue;
            }
            let row = self.bin_flik(survivor, other).join(&self.bin_flik(victim, other));
            self.binary = self.binary.set(code(survivor, other), Some(row));
            let column = self.bin_flik(other, survivor).join(&self.bin_flik(other, victim));
            self.binary = self.binary.set(code(other, survivor), Some(column));
        }

        // The four pairs over {survivor, victim} collapse into one
        // self loop.
        let self_pair = self
            .bin_flik(survivor, survivor)
            .join(&self.bin_flik(survivor, victim))
            .join(&self.bin_flik(victim, survivor))
            .join(&self.bin_flik(victim, victim));
        self.binary = self.binary.set(code(survivor, survivor), Some(self_pair));

        // Drop the victim's entries.
        self.abs_unary = self.abs_unary.set(victim.id(), None);
        self.plain_unary = self.plain_unary.set(victim.id(), None);
        for &other in alive {
            if other == victim {
                continue;
            }
            self.binary = self.binary.set(code(victim, other), None);
            self.binary = self.binary.set(code(other, victim), None);
        }
        self.binary = self.binary.set(code(victim, victim), None);

        self.update_unary(sm, survivor, Kleene::Unknown);
    }

    // ----- normalization -------------------------------------------

    /// Blur, then intern the structure at the level carried by
    /// `tables`.
    pub fn normalize(&mut self, tables: &mut InternTables) {
        self.blur(tables);
        self.nullary = self.nullary.normalize(tables);

        let nodes: Vec<Node> = self.universe.iter().collect();
        for &n in &nodes {
            let flik = self.plain_flik(n).normalize(tables);
            self.plain_unary = self.plain_unary.set(n.id(), Some(flik));
            for &m in &nodes {
                let flik = self.bin_flik(n, m).normalize(tables);
                self.binary = self.binary.set(code(n, m), Some(flik));
            }
        }

        match tables.level() {
            CanonicLevel::Leaves => {}
            CanonicLevel::Maps => {
                self.abs_unary = self.abs_unary.normalize(tables);
                self.plain_unary = self.plain_unary.normalize(tables);
                self.binary = self.binary.normalize(tables);
                self.universe.normalize(tables);
            }
            CanonicLevel::Renumber => self.renumber(tables),
            CanonicLevel::Signature => {
                self.folded = Some(self.fold_signature(tables));
            }
        }
        self.level = Some(tables.level());
    }

    /// Blur plus the cheap part of normalization, enough for partial
    /// signatures and partial isomorphism.
    pub fn part_normalize(&mut self, tables: &mut InternTables) {
        self.blur(tables);
        self.nullary = self.nullary.normalize(tables);
    }

    /// Renumber nodes to canonical 0..n order, rebuilding every map,
    /// so isomorphic structures end up with identical map ids.
    fn renumber(&mut self, tables: &mut InternTables) {
        let nodes: Vec<Node> = self.universe.iter().collect();
        let count = nodes.len() as u32;

        let mut abs = Trie::new();
        let mut plain = Trie::new();
        let mut binary = Trie::new();
        for (i, &old) in nodes.iter().enumerate() {
            abs = abs.set(i as u32, Some(self.abs_flik(old)));
            plain = plain.set(i as u32, Some(self.plain_flik(old)));
        }
        for (i, &a) in nodes.iter().enumerate() {
            for (j, &b) in nodes.iter().enumerate() {
                let key = code(Node::new(i as u32), Node::new(j as u32));
                binary = binary.set(key, Some(self.bin_flik(a, b)));
            }
        }

        self.abs_unary = abs.normalize(tables);
        self.plain_unary = plain.normalize(tables);
        self.binary = binary.normalize(tables);
        self.universe = Universe::renumbered(count);
    }

    /// Fold the whole structure into one interned integer (level 4).
    fn fold_signature(&self, tables: &mut InternTables) -> u32 {
        let nodes: Vec<Node> = self.universe.iter().collect();
        let mut sig = self.nullary.uid();

        if !nodes.is_empty() {
            let mut unary = tables.pair(self.canonic_name(nodes[0]), self.plain_flik_uid(nodes[0]));
            for &n in &nodes[1..] {
                let this = tables.pair(self.canonic_name(n), self.plain_flik_uid(n));
                unary = tables.pair(this, unary);
            }
            sig = tables.pair(unary, sig);

            for &a in &nodes {
                let mut row = self.bin_flik_uid(a, nodes[0]);
                for &b in &nodes[1..] {
                    row = tables.pair(self.bin_flik_uid(a, b), row);
                }
                sig = tables.pair(row, sig);
            }
        }

        tables.pair(nodes.len() as u32, sig)
    }

    fn plain_flik_uid(&self, n: Node) -> u32 {
        match self.plain_unary.get(n.id()) {
            Some(flik) => flik.uid(),
            None => DEFAULT_UID,
        }
    }

    fn bin_flik_uid(&self, a: Node, b: Node) -> u32 {
        match self.binary.get(code(a, b)) {
            Some(flik) => flik.uid(),
            None => DEFAULT_UID,
        }
    }

    // ----- signatures and isomorphism ------------------------------

    /// Bucketing signature: equal for isomorphic structures normalized
    /// under the same level, with collisions possible except at the
    /// folded level.
    pub fn signature(&self) -> u64 {
        match self.level {
            Some(CanonicLevel::Renumber) => {
                let mut h = hash2(self.universe.len() as u64, self.nullary.uid() as u64);
                h = mix(h, self.abs_unary.uid() as u64);
                h = mix(h, self.plain_unary.uid() as u64);
                mix(h, self.binary.uid() as u64)
            }
            Some(CanonicLevel::Signature) => self.folded.unwrap_or(0) as u64,
            _ => {
                let mut h = self.nullary.uid() as u64;
                for n in self.universe.iter() {
                    h = mix(h, self.canonic_name(n) as u64);
                    h = mix(h, self.plain_flik_uid(n) as u64);
                }
                h
            }
        }
    }

    /// Signature over abstraction predicates only, for the partial
    /// (relational) join strategy.
    pub fn partial_signature(&self) -> u64 {
        let mut h = self.nullary.uid() as u64;
        for n in self.universe.iter() {
            h = mix(h, self.canonic_name(n) as u64);
        }
        h
    }

    /// Full isomorphism test. Both structures must have been
    /// normalized under the same canonicalization level.
    pub fn isomorphic(&self, other: &Structure) -> Result<bool> {
        let level = match (self.level, other.level) {
            (Some(a), Some(b)) if a == b => a,
            _ => return Err(TvsError::MixedCanonicLevels),
        };
        Ok(match level {
            CanonicLevel::Renumber => {
                self.universe.len() == other.universe.len()
                    && self.nullary.uid() == other.nullary.uid()
                    && self.abs_unary.uid() == other.abs_unary.uid()
                    && self.plain_unary.uid() == other.plain_unary.uid()
                    && self.binary.uid() == other.binary.uid()
            }
            CanonicLevel::Signature => self.folded == other.folded,
            CanonicLevel::Leaves | CanonicLevel::Maps => self.isomorphism_test(other),
        })
    }

    /// Node-by-node comparison of interned sub-maps, in canonical
    /// universe order.
    fn isomorphism_test(&self, other: &Structure) -> bool {
        if self.universe.len() != other.universe.len() {
            return false;
        }
        if self.nullary.uid() != other.nullary.uid() {
            return false;
        }
        let mine: Vec<Node> = self.universe.iter().collect();
        let theirs: Vec<Node> = other.universe.iter().collect();
        for (&a, &b) in mine.iter().zip(theirs.iter()) {
            if self.canonic_name(a) != other.canonic_name(b) {
                return false;
            }
            if self.plain_flik_uid(a) != other.plain_flik_uid(b) {
                return false;
            }
        }
        for (&a1, &a2) in mine.iter().zip(theirs.iter()) {
            for (&b1, &b2) in mine.iter().zip(theirs.iter()) {
                if self.bin_flik_uid(a1, b1) != other.bin_flik_uid(a2, b2) {
                    return false;
                }
            }
        }
        true
    }

    /// Do the structures agree on node count, nullary values and every
    /// abstraction predicate (in canonical order)? This is the match
    /// criterion of the partial join, weaker than full isomorphism.
    pub fn partially_isomorphic(&self, other: &Structure) -> bool {
        if self.universe.len() != other.universe.len() {
            return false;
        }
        if self.nullary.uid() != other.nullary.uid() {
            return false;
        }
        self.universe
            .iter()
            .zip(other.universe.iter())
            .all(|(a, b)| self.canonic_name(a) == other.canonic_name(b))
    }

    /// Pointwise join of `other` into `self`, matching nodes by
    /// canonical order. Requires
    /// [`partially_isomorphic`](Self::partially_isomorphic) to hold.
    /// Returns whether any value changed.
    pub fn join_from(&mut self, other: &Structure, tables: &mut InternTables) -> bool {
        assert_eq!(
            self.universe.len(),
            other.universe.len(),
            "Joined structures must have matching universes"
        );
        let mine: Vec<Node> = self.universe.iter().collect();
        let theirs: Vec<Node> = other.universe.iter().collect();
        let mut changed = false;

        for (&a, &b) in mine.iter().zip(theirs.iter()) {
            let original = self.plain_flik(a);
            let joined = original.join(&other.plain_flik(b)).normalize(tables);
            if joined.uid() != original.normalize(tables).uid() {
                self.plain_unary = self.plain_unary.set(a.id(), Some(joined));
                changed = true;
            }
        }

        for (&a1, &a2) in mine.iter().zip(theirs.iter()) {
            for (&b1, &b2) in mine.iter().zip(theirs.iter()) {
                let original = self.bin_flik(a1, b1);
                let joined = original.join(&other.bin_flik(a2, b2)).normalize(tables);
                if joined.uid() != original.normalize(tables).uid() {
                    self.binary = self.binary.set(code(a1, b1), Some(joined));
                    changed = true;
                }
            }
        }

        if changed {
            self.invalidate_normal_form();
        }
        changed
    }

    // ----- enumeration support -------------------------------------

    /// All nodes with a non-false value for a unary predicate.
    pub fn unary_non_false(&self, p: &Predicate) -> Vec<(Node, Kleene)> {
        assert_eq!(p.arity(), 1, "Predicate {} is not unary", p);
        self.universe
            .iter()
            .filter_map(|n| {
                let k = self.eval_unary(p, n);
                (k != Kleene::False).then_some((n, k))
            })
            .collect()
    }

    /// All node pairs with a non-false value for a binary predicate,
    /// walking only the binary map's explicit entries.
    pub fn binary_non_false(&self, p: &Predicate) -> Vec<(Node, Node, Kleene)> {
        assert_eq!(p.arity(), 2, "Predicate {} is not binary", p);
        let num = p.num();
        let mut result = Vec::new();
        self.binary.for_each(&mut |key, flik| {
            let k = flik.get(num);
            if k != Kleene::False {
                let (a, b) = unpair_cantor(key as u64);
                result.push((Node::new(a as u32), Node::new(b as u32), k));
            }
        });
        result
    }

    /// Nodes whose active value is non-false, with that value. This is
    /// the range of every quantifier.
    pub fn active_nodes(&self) -> Vec<(Node, Kleene)> {
        let active = self.vocabulary.active().clone();
        self.unary_non_false(&active)
    }

    #[cfg(test)]
    pub(crate) fn force_unblurred(&mut self) {
        self.blurred = false;
    }
}

impl fmt::Debug for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Structure")
            .field("nodes", &self.universe.len())
            .field("blurred", &self.blurred)
            .field("level", &self.level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::CanonicLevel;

    fn vocabulary() -> Rc<Vocabulary> {
        let mut v = Vocabulary::new();
        v.create("x", 1, true).unwrap();
        v.create("y", 1, true).unwrap();
        v.create("reach", 1, false).unwrap();
        v.create("n", 2, false).unwrap();
        v.create("flag", 0, false).unwrap();
        Rc::new(v)
    }

    fn pred(v: &Rc<Vocabulary>, name: &str) -> Predicate {
        v.get(name).unwrap().clone()
    }

    #[test]
    fn test_eval_update_nullary() {
        let v = vocabulary();
        let flag = pred(&v, "flag");
        let mut s = Structure::new(v);
        assert_eq!(s.eval_nullary(&flag), Kleene::False);
        s.update_nullary(&flag, Kleene::Unknown);
        assert_eq!(s.eval_nullary(&flag), Kleene::Unknown);
    }

    #[test]
    fn test_eval_update_per_arity() {
        let v = vocabulary();
        let x = pred(&v, "x");
        let n = pred(&v, "n");
        let mut s = Structure::new(v);
        let a = s.new_node().unwrap();
        let b = s.new_node().unwrap();

        assert_eq!(s.eval_unary(&x, a), Kleene::False);
        s.update_unary(&x, a, Kleene::True);
        assert_eq!(s.eval_unary(&x, a), Kleene::True);
        assert_eq!(s.eval_unary(&x, b), Kleene::False);

        s.update_binary(&n, a, b, Kleene::Unknown);
        assert_eq!(s.eval_binary(&n, a, b), Kleene::Unknown);
        assert_eq!(s.eval_binary(&n, b, a), Kleene::False);
    }

    #[test]
    fn test_new_node_is_active() {
        let v = vocabulary();
        let active = v.active().clone();
        let mut s = Structure::new(v);
        let a = s.new_node().unwrap();
        assert_eq!(s.eval_unary(&active, a), Kleene::True);
    }

    #[test]
    fn test_copy_is_independent() {
        let v = vocabulary();
        let x = pred(&v, "x");
        let mut s = Structure::new(v);
        let a = s.new_node().unwrap();
        let snapshot = s.clone();
        s.update_unary(&x, a, Kleene::True);
        assert_eq!(snapshot.eval_unary(&x, a), Kleene::False);
        assert_eq!(s.eval_unary(&x, a), Kleene::True);
    }

    #[test]
    fn test_remove_node_recycles_cleanly() {
        let v = vocabulary();
        let x = pred(&v, "x");
        let mut s = Structure::new(v);
        let a = s.new_node().unwrap();
        s.update_unary(&x, a, Kleene::True);
        s.remove_node(a);
        let b = s.new_node().unwrap();
        assert_eq!(b.id(), a.id(), "id is recycled");
        assert_eq!(s.eval_unary(&x, b), Kleene::False, "no stale values");
    }

    #[test]
    fn test_blur_merges_indistinguishable_nodes() {
        // Scenario: n1 and n2 share the abstraction vector; n0 points
        // to both. After blur they merge into a summary node holding
        // the union of the incoming edges.
        let v = vocabulary();
        let x = pred(&v, "x");
        let n = pred(&v, "n");
        let sm = v.sm().clone();
        let mut tables = InternTables::new(CanonicLevel::Renumber);
        let mut s = Structure::new(v);

        let n0 = s.new_node().unwrap();
        let n1 = s.new_node().unwrap();
        let n2 = s.new_node().unwrap();
        s.update_unary(&x, n0, Kleene::True);
        s.update_binary(&n, n0, n1, Kleene::True);
        s.update_binary(&n, n0, n2, Kleene::True);

        s.blur(&mut tables);
        assert_eq!(s.node_count(), 2);

        let survivors: Vec<Node> = s.nodes().collect();
        let head = *survivors.iter().find(|&&m| s.eval_unary(&x, m) == Kleene::True).unwrap();
        let summary = *survivors.iter().find(|&&m| m != head).unwrap();

        assert_eq!(s.eval_unary(&sm, summary), Kleene::Unknown);
        assert_eq!(s.eval_unary(&sm, head), Kleene::False);
        assert_eq!(s.eval_binary(&n, head, summary), Kleene::True);
    }

    #[test]
    fn test_blur_is_idempotent() {
        let v = vocabulary();
        let x = pred(&v, "x");
        let n = pred(&v, "n");
        let mut tables = InternTables::new(CanonicLevel::Renumber);
        let mut s = Structure::new(v);

        let n0 = s.new_node().unwrap();
        let n1 = s.new_node().unwrap();
        let n2 = s.new_node().unwrap();
        s.update_unary(&x, n0, Kleene::True);
        s.update_binary(&n, n0, n1, Kleene::Unknown);
        s.update_binary(&n, n1, n2, Kleene::True);

        s.blur(&mut tables);
        let mut again = s.clone();
        again.force_unblurred();
        again.blur(&mut tables);

        s.normalize(&mut tables);
        again.normalize(&mut tables);
        assert!(s.isomorphic(&again).unwrap());
    }

    #[test]
    fn test_normalize_ignores_explicit_false_entries() {
        // Scenario: two structures differing only by explicit false
        // entries are identical after renumbering normalization.
        let v = vocabulary();
        let x = pred(&v, "x");
        let n = pred(&v, "n");
        let mut tables = InternTables::new(CanonicLevel::Renumber);

        let mut s1 = Structure::new(v.clone());
        let a1 = s1.new_node().unwrap();
        let b1 = s1.new_node().unwrap();
        s1.update_unary(&x, a1, Kleene::True);
        s1.update_binary(&n, a1, b1, Kleene::True);

        let mut s2 = Structure::new(v);
        let a2 = s2.new_node().unwrap();
        let b2 = s2.new_node().unwrap();
        s2.update_unary(&x, a2, Kleene::True);
        s2.update_binary(&n, a2, b2, Kleene::True);
        // Extra explicit false writes: semantically nothing.
        s2.update_binary(&n, b2, a2, Kleene::Unknown);
        s2.update_binary(&n, b2, a2, Kleene::False);
        s2.update_unary(&x, b2, Kleene::Unknown);
        s2.update_unary(&x, b2, Kleene::False);

        s1.normalize(&mut tables);
        s2.normalize(&mut tables);
        assert!(s1.isomorphic(&s2).unwrap());
        assert_eq!(s1.signature(), s2.signature());
    }

    #[test]
    fn test_mixed_levels_rejected() {
        let v = vocabulary();
        let mut t3 = InternTables::new(CanonicLevel::Renumber);
        let mut t4 = InternTables::new(CanonicLevel::Signature);
        let mut s1 = Structure::new(v.clone());
        let mut s2 = Structure::new(v);
        s1.normalize(&mut t3);
        s2.normalize(&mut t4);
        assert!(matches!(
            s1.isomorphic(&s2),
            Err(TvsError::MixedCanonicLevels)
        ));
    }

    #[test]
    fn test_binary_non_false_walks_entries() {
        let v = vocabulary();
        let n = pred(&v, "n");
        let mut s = Structure::new(v);
        let a = s.new_node().unwrap();
        let b = s.new_node().unwrap();
        s.update_binary(&n, a, b, Kleene::True);
        s.update_binary(&n, b, b, Kleene::Unknown);

        let mut edges = s.binary_non_false(&n);
        edges.sort_by_key(|&(x, y, _)| (x.id(), y.id()));
        assert_eq!(
            edges,
            vec![(a, b, Kleene::True), (b, b, Kleene::Unknown)]
        );
    }
}
