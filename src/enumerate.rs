//! Lazy enumeration of satisfying assignments.
//!
//! [`Formula::assignments`] returns a finite, forward-only,
//! non-restartable sequence of completed assignments together with
//! the Kleene value the formula takes under each. With a desired
//! value, only exact matches are produced; without one, any non-false
//! value qualifies.
//!
//! Each formula shape gets its own strategy: predicate atoms walk
//! only the predicate's non-false tuples, equality special-cases how
//! many operands are already bound, conjunctions extend the
//! assignment one flattened conjunct at a time and prune branches
//! whose desired value has become unreachable. Everything else,
//! including quantifiers (whose evaluation already folds over the
//! active nodes), enumerates the remaining free variables and
//! evaluates directly; the same holds whenever the incoming
//! assignment is already total.

use crate::assign::{Assignment, AssignmentKleene};
use crate::error::TvsError;
use crate::formula::{Formula, FormulaKind};
use crate::kleene::Kleene;
use crate::node::Node;
use crate::structure::Structure;
use crate::variable::Var;

pub type AssignItem = Result<AssignmentKleene, TvsError>;

/// A lazy sequence of satisfying assignments.
pub struct Assignments<'a> {
    inner: Box<dyn Iterator<Item = AssignItem> + 'a>,
}

impl<'a> Assignments<'a> {
    fn new(inner: impl Iterator<Item = AssignItem> + 'a) -> Self {
        Assignments {
            inner: Box::new(inner),
        }
    }

    fn once(item: AssignmentKleene) -> Assignments<'a> {
        Assignments::new(std::iter::once(Ok(item)))
    }
}

impl Iterator for Assignments<'_> {
    type Item = AssignItem;

    fn next(&mut self) -> Option<AssignItem> {
        self.inner.next()
    }
}

fn matches_desired(desired: Option<Kleene>, k: Kleene) -> bool {
    match desired {
        None => k != Kleene::False,
        Some(d) => k == d,
    }
}

impl Formula {
    /// Enumerate assignments extending `partial` under which this
    /// formula takes the desired value (any non-false value when
    /// `desired` is `None`).
    pub fn assignments<'a>(
        &'a self,
        structure: &'a Structure,
        partial: &Assignment,
        desired: Option<Kleene>,
    ) -> Assignments<'a> {
        if self.is_total_under(partial) {
            return Assignments::new(EvalOnce {
                formula: self,
                structure,
                assign: Some(partial.clone()),
                desired,
            });
        }
        // Only the exhaustive strategy sees false-valued assignments.
        if desired == Some(Kleene::False) {
            return self.product_assignments(structure, partial, desired);
        }
        match self.kind() {
            FormulaKind::Predicate { predicate, vars } if predicate.arity() == 1 => {
                Assignments::new(PredicateUnary {
                    entries: structure.unary_non_false(predicate).into_iter(),
                    var: vars[0].clone(),
                    base: partial.clone(),
                    desired,
                })
            }
            FormulaKind::Predicate { predicate, vars } if predicate.arity() == 2 => {
                Assignments::new(PredicateBinary {
                    entries: structure.binary_non_false(predicate).into_iter(),
                    var_left: vars[0].clone(),
                    var_right: vars[1].clone(),
                    bound_left: partial.get(&vars[0]),
                    bound_right: partial.get(&vars[1]),
                    base: partial.clone(),
                    desired,
                })
            }
            FormulaKind::Equality(left, right) => {
                Assignments::new(EqualityAssignments::new(structure, left, right, partial, desired))
            }
            FormulaKind::And(_, _) => Assignments::new(AndAssignments::new(
                self, structure, partial, desired,
            )),
            _ => self.product_assignments(structure, partial, desired),
        }
    }

    /// Exhaustive fallback: enumerate every combination of nodes for
    /// the unbound free variables and evaluate.
    fn product_assignments<'a>(
        &'a self,
        structure: &'a Structure,
        partial: &Assignment,
        desired: Option<Kleene>,
    ) -> Assignments<'a> {
        let vars: Vec<Var> = self
            .free_vars()
            .iter()
            .filter(|v| !partial.contains(*v))
            .cloned()
            .collect();
        let nodes: Vec<Node> = structure.nodes().collect();
        let exhausted = nodes.is_empty();
        Assignments::new(ProductAssignments {
            formula: self,
            structure,
            indices: vec![0; vars.len()],
            vars,
            nodes,
            base: partial.clone(),
            exhausted,
            desired,
        })
    }
}

/// Fast path: the incoming assignment is already total.
struct EvalOnce<'a> {
    formula: &'a Formula,
    structure: &'a Structure,
    assign: Option<Assignment>,
    desired: Option<Kleene>,
}

impl Iterator for EvalOnce<'_> {
    type Item = AssignItem;

    fn next(&mut self) -> Option<AssignItem> {
        let mut assign = self.assign.take()?;
        match self.formula.eval(self.structure, &mut assign) {
            Err(e) => Some(Err(e)),
            Ok(k) => {
                if matches_desired(self.desired, k) {
                    Some(Ok(AssignmentKleene::new(assign, k)))
                } else {
                    None
                }
            }
        }
    }
}

struct ProductAssignments<'a> {
    formula: &'a Formula,
    structure: &'a Structure,
    vars: Vec<Var>,
    nodes: Vec<Node>,
    base: Assignment,
    indices: Vec<usize>,
    exhausted: bool,
    desired: Option<Kleene>,
}

impl ProductAssignments<'_> {
    fn advance(&mut self) {
        for i in (0..self.indices.len()).rev() {
            self.indices[i] += 1;
            if self.indices[i] < self.nodes.len() {
                return;
            }
            self.indices[i] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for ProductAssignments<'_> {
    type Item = AssignItem;

    fn next(&mut self) -> Option<AssignItem> {
        loop {
            if self.exhausted {
                return None;
            }
            let mut assign = self.base.clone();
            for (v, &i) in self.vars.iter().zip(self.indices.iter()) {
                assign.bind(v.clone(), self.nodes[i]);
            }
            self.advance();
            match self.formula.eval(self.structure, &mut assign) {
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                Ok(k) => {
                    if matches_desired(self.desired, k) {
                        return Some(Ok(AssignmentKleene::new(assign, k)));
                    }
                }
            }
        }
    }
}

/// Unary predicate atom with an unbound variable: walk the non-false
/// entries only.
struct PredicateUnary {
    entries: std::vec::IntoIter<(Node, Kleene)>,
    var: Var,
    base: Assignment,
    desired: Option<Kleene>,
}

impl Iterator for PredicateUnary {
    type Item = AssignItem;

    fn next(&mut self) -> Option<AssignItem> {
        for (node, k) in self.entries.by_ref() {
            if !matches_desired(self.desired, k) {
                continue;
            }
            let mut assign = self.base.clone();
            assign.bind(self.var.clone(), node);
            return Some(Ok(AssignmentKleene::new(assign, k)));
        }
        None
    }
}

/// Binary predicate atom with at least one unbound variable: walk the
/// non-false tuples, filtering against whatever is already bound.
struct PredicateBinary {
    entries: std::vec::IntoIter<(Node, Node, Kleene)>,
    var_left: Var,
    var_right: Var,
    bound_left: Option<Node>,
    bound_right: Option<Node>,
    base: Assignment,
    desired: Option<Kleene>,
}

impl Iterator for PredicateBinary {
    type Item = AssignItem;

    fn next(&mut self) -> Option<AssignItem> {
        for (left, right, k) in self.entries.by_ref() {
            if !matches_desired(self.desired, k) {
                continue;
            }
            if self.var_left == self.var_right && left != right {
                continue;
            }
            if let Some(n) = self.bound_left {
                if n != left {
                    continue;
                }
            }
            if let Some(n) = self.bound_right {
                if n != right {
                    continue;
                }
            }
            let mut assign = self.base.clone();
            assign.bind(self.var_left.clone(), left);
            assign.bind(self.var_right.clone(), right);
            return Some(Ok(AssignmentKleene::new(assign, k)));
        }
        None
    }
}

/// Equality with at least one unbound side. With one side bound the
/// only candidate is that node; with neither bound, every node paired
/// with itself.
struct EqualityAssignments {
    candidates: std::vec::IntoIter<Node>,
    left: Var,
    right: Var,
    base: Assignment,
    summary: Vec<(Node, Kleene)>,
    desired: Option<Kleene>,
}

impl EqualityAssignments {
    fn new(
        structure: &Structure,
        left: &Var,
        right: &Var,
        partial: &Assignment,
        desired: Option<Kleene>,
    ) -> EqualityAssignments {
        let candidates: Vec<Node> = match (partial.get(left), partial.get(right)) {
            (Some(n), None) | (None, Some(n)) => vec![n],
            (None, None) => structure.nodes().collect(),
            (Some(_), Some(_)) => unreachable!("total assignments take the fast path"),
        };
        let sm = structure.vocabulary().sm().clone();
        let summary = candidates
            .iter()
            .map(|&n| (n, structure.eval_unary(&sm, n)))
            .collect();
        EqualityAssignments {
            candidates: candidates.into_iter(),
            left: left.clone(),
            right: right.clone(),
            base: partial.clone(),
            summary,
            desired,
        }
    }
}

impl Iterator for EqualityAssignments {
    type Item = AssignItem;

    fn next(&mut self) -> Option<AssignItem> {
        for node in self.candidates.by_ref() {
            let k = if self.left == self.right {
                Kleene::True
            } else {
                let summary = self
                    .summary
                    .iter()
                    .find(|(n, _)| *n == node)
                    .map(|(_, k)| *k)
                    .unwrap_or(Kleene::False);
                summary.not()
            };
            if !matches_desired(self.desired, k) {
                continue;
            }
            let mut assign = self.base.clone();
            assign.bind(self.left.clone(), node);
            assign.bind(self.right.clone(), node);
            return Some(Ok(AssignmentKleene::new(assign, k)));
        }
        None
    }
}

/// Conjunction: extend the assignment one flattened conjunct at a
/// time, pruning a branch as soon as the desired value is
/// unreachable.
struct AndAssignments<'a> {
    structure: &'a Structure,
    conjuncts: Vec<&'a Formula>,
    stack: Vec<Assignments<'a>>,
    unknown_mask: u64,
    desired: Option<Kleene>,
    failed: bool,
}

impl<'a> AndAssignments<'a> {
    fn new(
        formula: &'a Formula,
        structure: &'a Structure,
        partial: &Assignment,
        desired: Option<Kleene>,
    ) -> AndAssignments<'a> {
        let conjuncts = formula.conjuncts();
        assert!(
            conjuncts.len() <= 64,
            "Conjunctions wider than 64 are not supported"
        );
        let seed = AssignmentKleene::new(partial.clone(), Kleene::True);
        AndAssignments {
            structure,
            conjuncts,
            stack: vec![Assignments::once(seed)],
            unknown_mask: 0,
            desired,
            failed: false,
        }
    }
}

impl Iterator for AndAssignments<'_> {
    type Item = AssignItem;

    fn next(&mut self) -> Option<AssignItem> {
        if self.failed {
            return None;
        }
        loop {
            let item = match self.stack.last_mut() {
                None => return None,
                Some(top) => top.next(),
            };
            match item {
                None => {
                    self.stack.pop();
                    let top = self.stack.len();
                    if top > 0 {
                        self.unknown_mask &= (1u64 << (top - 1)) - 1;
                    }
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                Some(Ok(item)) => {
                    let level = self.stack.len() - 1;
                    if item.kleene == Kleene::Unknown && self.desired == Some(Kleene::True) {
                        // Already unknown: no chance to become true.
                        continue;
                    }
                    if level == self.conjuncts.len() {
                        let earlier = if self.unknown_mask == 0 {
                            Kleene::True
                        } else {
                            Kleene::Unknown
                        };
                        let k = earlier.and(item.kleene);
                        if matches_desired(self.desired, k) {
                            return Some(Ok(AssignmentKleene::new(item.assignment, k)));
                        }
                    } else {
                        if item.kleene == Kleene::Unknown {
                            self.unknown_mask |= 1 << level;
                        }
                        let wanted = if self.desired == Some(Kleene::Unknown) {
                            None
                        } else {
                            self.desired
                        };
                        let child =
                            self.conjuncts[level].assignments(self.structure, &item.assignment, wanted);
                        self.stack.push(child);
                    }
                }
            }
        }
    }
}
