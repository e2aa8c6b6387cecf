//! Bulk predicate updates: the kernel side of a transfer function.
//!
//! A [`PredicateUpdate`] rewrites one predicate from a right-hand-side
//! formula. Applying a batch of updates evaluates every right-hand
//! side against a frozen copy of the pre-state, so updates within one
//! batch never observe each other's effects.

use crate::assign::Assignment;
use crate::error::{Result, TvsError};
use crate::formula::Formula;
use crate::node::NodeTuple;
use crate::predicate::Predicate;
use crate::structure::Structure;
use crate::variable::Var;

/// `p(v1..vk) := rhs`, evaluated pointwise over the universe.
#[derive(Clone, Debug)]
pub struct PredicateUpdate {
    predicate: Predicate,
    vars: Vec<Var>,
    rhs: Formula,
}

impl PredicateUpdate {
    /// The variable tuple must match the predicate's arity, and no
    /// left-hand-side variable may occur bound in the right-hand
    /// side.
    pub fn new(predicate: Predicate, vars: Vec<Var>, rhs: Formula) -> Result<PredicateUpdate> {
        if predicate.arity() as usize != vars.len() {
            return Err(TvsError::ArityMismatch {
                predicate: predicate.name().to_string(),
                expected: predicate.arity(),
                actual: vars.len(),
            });
        }
        for v in &vars {
            if rhs.bound_vars().contains(v) {
                return Err(TvsError::BoundUpdateVariable(v.name().to_string()));
            }
        }
        Ok(PredicateUpdate {
            predicate,
            vars,
            rhs,
        })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn rhs(&self) -> &Formula {
        &self.rhs
    }
}

impl Structure {
    /// Apply a batch of updates, evaluating every right-hand side on
    /// the pre-state under `assign` extended with the left-hand-side
    /// variables.
    pub fn update_predicates(
        &mut self,
        updates: &[PredicateUpdate],
        assign: &Assignment,
    ) -> Result<()> {
        let pre = self.clone();
        let nodes: Vec<_> = pre.nodes().collect();

        for update in updates {
            update.rhs.prepare(&pre);
            let mut local = assign.clone();
            match update.predicate.arity() {
                0 => {
                    let value = update.rhs.eval(&pre, &mut local)?;
                    self.update(&update.predicate, &NodeTuple::Empty, value)?;
                }
                1 => {
                    let var = &update.vars[0];
                    for &n in &nodes {
                        local.bind(var.clone(), n);
                        let value = update.rhs.eval(&pre, &mut local)?;
                        self.update(&update.predicate, &NodeTuple::single(n), value)?;
                    }
                }
                2 => {
                    let left = &update.vars[0];
                    let right = &update.vars[1];
                    for &a in &nodes {
                        local.bind(left.clone(), a);
                        for &b in &nodes {
                            local.bind(right.clone(), b);
                            let value = update.rhs.eval(&pre, &mut local)?;
                            self.update(&update.predicate, &NodeTuple::pair(a, b), value)?;
                        }
                    }
                }
                arity => return Err(TvsError::UnsupportedArity(arity)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kleene::Kleene;
    use crate::predicate::Vocabulary;
    use crate::variable::VarPool;
    use std::rc::Rc;

    #[test]
    fn test_pointer_swing() {
        // y := x, modeled as the update y(v) := x(v).
        let mut vocabulary = Vocabulary::new();
        let x = vocabulary.create("x", 1, true).unwrap();
        let y = vocabulary.create("y", 1, true).unwrap();
        let vocabulary = Rc::new(vocabulary);
        let mut pool = VarPool::new();

        let mut s = Structure::new(vocabulary);
        let a = s.new_node().unwrap();
        let b = s.new_node().unwrap();
        s.update_unary(&x, a, Kleene::True);
        s.update_unary(&y, b, Kleene::True);

        let v = pool.var("v");
        let rhs = Formula::predicate(x.clone(), vec![v.clone()]).unwrap();
        let update = PredicateUpdate::new(y.clone(), vec![v], rhs).unwrap();

        s.update_predicates(&[update], &Assignment::new()).unwrap();
        assert_eq!(s.eval_unary(&y, a), Kleene::True);
        assert_eq!(s.eval_unary(&y, b), Kleene::False);
        assert_eq!(s.eval_unary(&x, a), Kleene::True, "rhs reads the pre-state");
    }

    #[test]
    fn test_edge_reversal_reads_pre_state() {
        // next(v, w) := next(w, v): swapping all edges in one batch
        // must not observe its own writes.
        let mut vocabulary = Vocabulary::new();
        let next = vocabulary.create("next", 2, false).unwrap();
        let vocabulary = Rc::new(vocabulary);
        let mut pool = VarPool::new();

        let mut s = Structure::new(vocabulary);
        let a = s.new_node().unwrap();
        let b = s.new_node().unwrap();
        s.update_binary(&next, a, b, Kleene::True);

        let v = pool.var("v");
        let w = pool.var("w");
        let rhs = Formula::predicate(next.clone(), vec![w.clone(), v.clone()]).unwrap();
        let update = PredicateUpdate::new(next.clone(), vec![v, w], rhs).unwrap();

        s.update_predicates(&[update], &Assignment::new()).unwrap();
        assert_eq!(s.eval_binary(&next, b, a), Kleene::True);
        assert_eq!(s.eval_binary(&next, a, b), Kleene::False);
    }

    #[test]
    fn test_bound_lhs_variable_rejected() {
        let mut vocabulary = Vocabulary::new();
        let x = vocabulary.create("x", 1, true).unwrap();
        let mut pool = VarPool::new();
        let v = pool.var("v");

        let rhs = Formula::exists(
            v.clone(),
            Formula::predicate(x.clone(), vec![v.clone()]).unwrap(),
        );
        assert!(matches!(
            PredicateUpdate::new(x, vec![v], rhs),
            Err(TvsError::BoundUpdateVariable(_))
        ));
    }
}
