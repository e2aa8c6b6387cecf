//! Predicates and the vocabulary that numbers them.
//!
//! A [`Predicate`] is immutable: a name, an arity, an abstraction flag
//! deciding whether it takes part in canonical naming, and display
//! flags. The [`Vocabulary`] owns every predicate of one analysis and
//! partitions them into four disjoint classes, numbering each class
//! densely from zero; the per-class number is the key of the predicate
//! inside the packed interpretation maps. Two built-in predicates
//! exist in every vocabulary: `sm` (is this node a summary of several
//! individuals?) and `ac` (does this node denote a live individual?),
//! both unary and deliberately outside the abstraction class.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::{Result, TvsError};

/// The four dense-numbered predicate classes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PredicateClass {
    Nullary,
    AbstractionUnary,
    PlainUnary,
    Binary,
}

#[derive(Debug)]
struct PredicateData {
    name: String,
    arity: u8,
    abstraction: bool,
    unique: bool,
    function: bool,
    class: PredicateClass,
    num: u32,
}

/// A predicate of the analyzed vocabulary.
#[derive(Debug, Clone)]
pub struct Predicate(Rc<PredicateData>);

impl Predicate {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn arity(&self) -> u8 {
        self.0.arity
    }

    /// Does this predicate participate in canonical naming (blur)?
    pub fn abstraction(&self) -> bool {
        self.0.abstraction
    }

    /// Display flag: unary predicate holding for at most one node.
    pub fn unique(&self) -> bool {
        self.0.unique
    }

    /// Display flag: binary predicate with at most one successor per
    /// node.
    pub fn function(&self) -> bool {
        self.0.function
    }

    pub fn class(&self) -> PredicateClass {
        self.0.class
    }

    /// Dense number within the predicate's class.
    pub fn num(&self) -> u32 {
        self.0.num
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Predicate {}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.0.class, self.0.num).hash(state);
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

/// The predicate registry of one analysis run.
pub struct Vocabulary {
    by_name: HashMap<String, Predicate>,
    counts: HashMap<PredicateClass, u32>,
    sm: Predicate,
    active: Predicate,
}

impl Vocabulary {
    pub fn new() -> Self {
        let builtin = |name: &str, num: u32| {
            Predicate(Rc::new(PredicateData {
                name: name.to_string(),
                arity: 1,
                abstraction: false,
                unique: false,
                function: false,
                class: PredicateClass::PlainUnary,
                num,
            }))
        };
        let sm = builtin("sm", 0);
        let active = builtin("ac", 1);
        let mut by_name = HashMap::new();
        by_name.insert("sm".to_string(), sm.clone());
        by_name.insert("ac".to_string(), active.clone());
        let mut counts = HashMap::new();
        counts.insert(PredicateClass::PlainUnary, 2);
        Vocabulary {
            by_name,
            counts,
            sm,
            active,
        }
    }

    /// The summary predicate: unknown on nodes that may stand for more
    /// than one individual.
    pub fn sm(&self) -> &Predicate {
        &self.sm
    }

    /// The active predicate: marks nodes denoting a real individual.
    pub fn active(&self) -> &Predicate {
        &self.active
    }

    /// Create a predicate. Arities above two are accepted here (the
    /// vocabulary is representation-agnostic); storing them in a
    /// structure reports [`TvsError::UnsupportedArity`].
    pub fn create(&mut self, name: &str, arity: u8, abstraction: bool) -> Result<Predicate> {
        self.create_with_flags(name, arity, abstraction, false, false)
    }

    pub fn create_with_flags(
        &mut self,
        name: &str,
        arity: u8,
        abstraction: bool,
        unique: bool,
        function: bool,
    ) -> Result<Predicate> {
        if self.by_name.contains_key(name) {
            return Err(TvsError::DuplicatePredicate(name.to_string()));
        }
        let class = match (arity, abstraction) {
            (0, _) => PredicateClass::Nullary,
            (1, true) => PredicateClass::AbstractionUnary,
            (1, false) => PredicateClass::PlainUnary,
            _ => PredicateClass::Binary,
        };
        let count = self.counts.entry(class).or_insert(0);
        let num = *count;
        *count += 1;
        let predicate = Predicate(Rc::new(PredicateData {
            name: name.to_string(),
            arity,
            abstraction,
            unique,
            function,
            class,
            num,
        }));
        self.by_name.insert(name.to_string(), predicate.clone());
        Ok(predicate)
    }

    pub fn get(&self, name: &str) -> Option<&Predicate> {
        self.by_name.get(name)
    }

    /// Number of predicates in a class.
    pub fn class_len(&self, class: PredicateClass) -> u32 {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.by_name.values()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Vocabulary::new()
    }
}

impl fmt::Debug for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vocabulary")
            .field("predicates", &self.by_name.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let vocabulary = Vocabulary::new();
        assert_eq!(vocabulary.sm().arity(), 1);
        assert!(!vocabulary.sm().abstraction());
        assert_eq!(vocabulary.active().name(), "ac");
        assert_eq!(vocabulary.sm().class(), PredicateClass::PlainUnary);
    }

    #[test]
    fn test_dense_numbering_per_class() {
        let mut vocabulary = Vocabulary::new();
        let x = vocabulary.create("x", 1, true).unwrap();
        let y = vocabulary.create("y", 1, true).unwrap();
        let n = vocabulary.create("n", 2, false).unwrap();
        let flag = vocabulary.create("flag", 0, false).unwrap();

        assert_eq!(x.num(), 0);
        assert_eq!(y.num(), 1);
        assert_eq!(n.num(), 0, "classes are numbered independently");
        assert_eq!(flag.num(), 0);
        // sm and ac already occupy the first two plain-unary slots.
        assert_eq!(vocabulary.class_len(PredicateClass::PlainUnary), 2);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.create("x", 1, true).unwrap();
        assert!(matches!(
            vocabulary.create("x", 2, false),
            Err(TvsError::DuplicatePredicate(_))
        ));
    }
}
