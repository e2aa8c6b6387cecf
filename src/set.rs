//! Sets of structures: the lattice element at a program point.
//!
//! A structure set keeps its members pairwise non-isomorphic (exact
//! join) or non-mergeable (partial join). Candidates arrive through
//! [`StructureSet::merge`], which returns the structure that changed
//! the set, or `None` when the candidate was subsumed by an existing
//! member; the fixpoint driver detects convergence from that `None`.
//! Members are bucketed by signature so a candidate is compared only
//! against plausible matches, never the whole set.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::{Result, TvsError};
use crate::intern::InternTables;
use crate::structure::Structure;

/// Which lattice the analysis runs in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JoinMode {
    /// Keep every non-isomorphic structure.
    Exact,
    /// Join structures that agree on their abstraction signatures.
    Partial,
}

impl FromStr for JoinMode {
    type Err = TvsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exact" => Ok(JoinMode::Exact),
            "partial" | "relational" => Ok(JoinMode::Partial),
            other => Err(TvsError::InvalidJoinMode(other.to_string())),
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinMode::Exact => write!(f, "exact"),
            JoinMode::Partial => write!(f, "partial"),
        }
    }
}

/// What became of a merged candidate, with the member involved.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MergeOutcome {
    /// The candidate entered the set as a new member.
    Added,
    /// An existing member already covers the candidate.
    Subsumed { member: usize },
    /// The candidate was joined into an existing member, changing it.
    Joined { member: usize },
}

/// The lattice interface consumed by fixpoint drivers.
pub trait StructureSet {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Structure> + '_>;

    /// Merge a candidate. Returns the member that changed (the
    /// inserted candidate, or the member it was joined into), or
    /// `None` when the set is unchanged.
    fn merge<'a>(
        &'a mut self,
        candidate: Structure,
        tables: &mut InternTables,
    ) -> Result<Option<&'a Structure>>;

    /// Like [`merge`](Self::merge), reporting which member the
    /// candidate matched, for provenance tracking.
    fn merge_traced(
        &mut self,
        candidate: Structure,
        tables: &mut InternTables,
    ) -> Result<MergeOutcome>;
}

/// Construct the set implementing a join mode.
pub fn structure_set(mode: JoinMode) -> Box<dyn StructureSet> {
    match mode {
        JoinMode::Exact => Box::new(ExactJoinSet::new()),
        JoinMode::Partial => Box::new(PartialJoinSet::new()),
    }
}

/// Exact join: a member per isomorphism class.
#[derive(Default)]
pub struct ExactJoinSet {
    members: Vec<Structure>,
    buckets: HashMap<u64, Vec<usize>>,
}

impl ExactJoinSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructureSet for ExactJoinSet {
    fn len(&self) -> usize {
        self.members.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Structure> + '_> {
        Box::new(self.members.iter())
    }

    fn merge<'a>(
        &'a mut self,
        candidate: Structure,
        tables: &mut InternTables,
    ) -> Result<Option<&'a Structure>> {
        Ok(match self.merge_traced(candidate, tables)? {
            MergeOutcome::Added => self.members.last(),
            MergeOutcome::Subsumed { .. } => None,
            MergeOutcome::Joined { member } => Some(&self.members[member]),
        })
    }

    fn merge_traced(
        &mut self,
        mut candidate: Structure,
        tables: &mut InternTables,
    ) -> Result<MergeOutcome> {
        candidate.blur(tables);
        candidate.normalize(tables);
        let signature = candidate.signature();

        if let Some(indices) = self.buckets.get(&signature) {
            // Isomorphic structures share a signature; equal
            // signatures may or may not be isomorphic (except at the
            // folded level, where the test below is a single integer
            // comparison anyway).
            for &index in indices {
                if self.members[index].isomorphic(&candidate)? {
                    debug!("merge: candidate subsumed by member {}", index);
                    return Ok(MergeOutcome::Subsumed { member: index });
                }
            }
        }

        let index = self.members.len();
        self.members.push(candidate);
        self.buckets.entry(signature).or_default().push(index);
        Ok(MergeOutcome::Added)
    }
}

/// Partial (relational) join: structures agreeing on abstraction
/// signatures collapse into one member via pointwise join.
#[derive(Default)]
pub struct PartialJoinSet {
    members: Vec<Structure>,
    buckets: HashMap<u64, Vec<usize>>,
}

impl PartialJoinSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructureSet for PartialJoinSet {
    fn len(&self) -> usize {
        self.members.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Structure> + '_> {
        Box::new(self.members.iter())
    }

    fn merge<'a>(
        &'a mut self,
        candidate: Structure,
        tables: &mut InternTables,
    ) -> Result<Option<&'a Structure>> {
        Ok(match self.merge_traced(candidate, tables)? {
            MergeOutcome::Added => self.members.last(),
            MergeOutcome::Subsumed { .. } => None,
            MergeOutcome::Joined { member } => Some(&self.members[member]),
        })
    }

    fn merge_traced(
        &mut self,
        mut candidate: Structure,
        tables: &mut InternTables,
    ) -> Result<MergeOutcome> {
        candidate.part_normalize(tables);
        let signature = candidate.partial_signature();

        if let Some(indices) = self.buckets.get(&signature) {
            for &index in indices {
                if self.members[index].partially_isomorphic(&candidate) {
                    let changed = self.members[index].join_from(&candidate, tables);
                    return Ok(if changed {
                        debug!("merge: candidate joined into member {}", index);
                        MergeOutcome::Joined { member: index }
                    } else {
                        debug!("merge: candidate subsumed by member {}", index);
                        MergeOutcome::Subsumed { member: index }
                    });
                }
            }
        }

        candidate.normalize(tables);
        let index = self.members.len();
        self.members.push(candidate);
        self.buckets.entry(signature).or_default().push(index);
        Ok(MergeOutcome::Added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::CanonicLevel;
    use crate::kleene::Kleene;
    use crate::node::Node;
    use crate::predicate::{Predicate, Vocabulary};
    use std::rc::Rc;

    fn vocabulary() -> Rc<Vocabulary> {
        let mut v = Vocabulary::new();
        v.create("x", 1, true).unwrap();
        v.create("n", 2, false).unwrap();
        Rc::new(v)
    }

    /// A two-node structure: x on the head, an n-edge of the given
    /// value between head and tail.
    fn two_node(vocabulary: &Rc<Vocabulary>, edge: Kleene) -> Structure {
        let x = vocabulary.get("x").unwrap().clone();
        let n = vocabulary.get("n").unwrap().clone();
        let mut s = Structure::new(vocabulary.clone());
        let head = s.new_node().unwrap();
        let tail = s.new_node().unwrap();
        s.update_unary(&x, head, Kleene::True);
        s.update_binary(&n, head, tail, edge);
        s
    }

    fn find_node(s: &Structure, p: &Predicate, value: Kleene) -> Node {
        s.nodes().find(|&n| s.eval_unary(p, n) == value).unwrap()
    }

    #[test]
    fn test_isomorphic_candidates_are_subsumed() {
        let vocabulary = vocabulary();
        let mut tables = InternTables::new(CanonicLevel::Renumber);
        let mut set = ExactJoinSet::new();

        let s1 = two_node(&vocabulary, Kleene::True);
        let s2 = two_node(&vocabulary, Kleene::True);

        assert!(set.merge(s1, &mut tables).unwrap().is_some());
        assert!(set.merge(s2, &mut tables).unwrap().is_none());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_distinct_candidates_accumulate() {
        let vocabulary = vocabulary();
        let mut tables = InternTables::new(CanonicLevel::Renumber);
        let mut set = ExactJoinSet::new();

        set.merge(two_node(&vocabulary, Kleene::True), &mut tables)
            .unwrap();
        set.merge(two_node(&vocabulary, Kleene::Unknown), &mut tables)
            .unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_folded_level_subsumption() {
        let vocabulary = vocabulary();
        let mut tables = InternTables::new(CanonicLevel::Signature);
        let mut set = ExactJoinSet::new();

        set.merge(two_node(&vocabulary, Kleene::True), &mut tables)
            .unwrap();
        let outcome = set
            .merge_traced(two_node(&vocabulary, Kleene::True), &mut tables)
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Subsumed { member: 0 });
    }

    #[test]
    fn test_partial_join_widens_member() {
        let vocabulary = vocabulary();
        let x = vocabulary.get("x").unwrap().clone();
        let n = vocabulary.get("n").unwrap().clone();
        let mut tables = InternTables::new(CanonicLevel::Renumber);
        let mut set = PartialJoinSet::new();

        // Same abstraction signatures, different edge values.
        let s_true = two_node(&vocabulary, Kleene::True);
        let s_false = two_node(&vocabulary, Kleene::False);

        let outcome = set.merge_traced(s_true.clone(), &mut tables).unwrap();
        assert_eq!(outcome, MergeOutcome::Added);
        let outcome = set.merge_traced(s_false, &mut tables).unwrap();
        assert_eq!(outcome, MergeOutcome::Joined { member: 0 });
        assert_eq!(set.len(), 1);

        // The joined member is no less unknown than either input: the
        // disagreeing edge widened to unknown.
        let member = set.iter().next().unwrap();
        let head = find_node(member, &x, Kleene::True);
        let tail = find_node(member, &x, Kleene::False);
        assert_eq!(member.eval_binary(&n, head, tail), Kleene::Unknown);

        // Re-merging either input is now subsumed.
        let outcome = set.merge_traced(s_true, &mut tables).unwrap();
        assert_eq!(outcome, MergeOutcome::Subsumed { member: 0 });
    }

    #[test]
    fn test_join_mode_parse() {
        assert_eq!("exact".parse::<JoinMode>().unwrap(), JoinMode::Exact);
        assert_eq!("relational".parse::<JoinMode>().unwrap(), JoinMode::Partial);
        assert!("best-effort".parse::<JoinMode>().is_err());
    }
}
