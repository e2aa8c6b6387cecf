//! Transitive closure with an explicitly invalidated cache.
//!
//! A [`TcFormula`] wraps a binary sub-formula and caches the closure
//! of the relation it denotes as a node-pair table. The cache follows
//! an explicit invalidate/prepare contract: evaluating a formula
//! against a structure requires a preceding `prepare` for that
//! structure, which drops the cache; repeated evaluations on an
//! unmutated structure then reuse it.
//!
//! Two algorithms compute the closure and must agree exactly: the
//! cubic all-pairs relaxation and the worklist algorithm that is
//! O(V*E) per run. Both weight every relaxation step by the active
//! value of the node being relaxed through, so a path over a
//! maybe-allocated node carries at most unknown confidence.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use log::trace;

use crate::assign::Assignment;
use crate::error::{Result, TvsError};
use crate::formula::Formula;
use crate::kleene::Kleene;
use crate::node::Node;
use crate::structure::Structure;
use crate::variable::{Var, VarPool};

/// A node-pair to Kleene cache; false pairs are not stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TcCache {
    values: HashMap<(Node, Node), Kleene>,
    valid: bool,
}

impl TcCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, left: Node, right: Node) -> Kleene {
        self.values
            .get(&(left, right))
            .copied()
            .unwrap_or(Kleene::False)
    }

    pub fn set(&mut self, left: Node, right: Node, value: Kleene) {
        if value == Kleene::False {
            self.values.remove(&(left, right));
        } else {
            self.values.insert((left, right), value);
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn validate(&mut self) {
        self.valid = true;
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// A transitive-closure formula node.
#[derive(Clone)]
pub struct TcFormula {
    left: Var,
    right: Var,
    sub_left: Var,
    sub_right: Var,
    body: Rc<Formula>,
    cache: RefCell<TcCache>,
}

impl TcFormula {
    /// The body must have both designated variables free, and they
    /// must be distinct.
    pub fn new(
        left: Var,
        right: Var,
        sub_left: Var,
        sub_right: Var,
        body: Rc<Formula>,
    ) -> Result<TcFormula> {
        let free = body.free_vars();
        if sub_left == sub_right || !free.contains(&sub_left) || !free.contains(&sub_right) {
            return Err(TvsError::TcFreeVars {
                left: sub_left.name().to_string(),
                right: sub_right.name().to_string(),
            });
        }
        Ok(TcFormula {
            left,
            right,
            sub_left,
            sub_right,
            body,
            cache: RefCell::new(TcCache::new()),
        })
    }

    pub fn left(&self) -> &Var {
        &self.left
    }

    pub fn right(&self) -> &Var {
        &self.right
    }

    pub fn sub_left(&self) -> &Var {
        &self.sub_left
    }

    pub fn sub_right(&self) -> &Var {
        &self.sub_right
    }

    pub fn body(&self) -> &Formula {
        &self.body
    }

    /// Drop the cached closure. Called by `Formula::prepare` whenever
    /// the evaluation target changes.
    pub fn invalidate(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Does the body mention free variables beyond the designated
    /// pair? If so the closure depends on the outer assignment and the
    /// cache cannot be reused across assignments.
    fn has_outer_free_vars(&self) -> bool {
        self.body
            .free_vars()
            .iter()
            .any(|v| v != &self.sub_left && v != &self.sub_right)
    }

    /// Closure value on the nodes bound to `left`/`right`.
    pub fn eval(&self, structure: &Structure, assign: &mut Assignment) -> Result<Kleene> {
        let stale = !self.cache.borrow().is_valid() || self.has_outer_free_vars();
        if stale {
            trace!("tc: recomputing closure over {} nodes", structure.node_count());
            let computed = self.closure_worklist(structure, assign)?;
            *self.cache.borrow_mut() = computed;
        }
        let left = assign.node(&self.left)?;
        let right = assign.node(&self.right)?;
        Ok(self.cache.borrow().get(left, right))
    }

    fn edge(
        &self,
        structure: &Structure,
        assign: &mut Assignment,
        from: Node,
        to: Node,
    ) -> Result<Kleene> {
        assign.bind(self.sub_left.clone(), from);
        assign.bind(self.sub_right.clone(), to);
        self.body.eval(structure, assign)
    }

    /// Cubic all-pairs closure: seed the cache with the body's value
    /// on every pair, then relax every pair through every intermediate
    /// node to a fixed point.
    pub fn closure_all_pairs(
        &self,
        structure: &Structure,
        assign: &mut Assignment,
    ) -> Result<TcCache> {
        let nodes: Vec<Node> = structure.nodes().collect();
        let active = structure.vocabulary().active().clone();
        let saved_left = assign.unbind(&self.sub_left);
        let saved_right = assign.unbind(&self.sub_right);

        let mut cache = TcCache::new();
        let mut run = || -> Result<()> {
            for &a in &nodes {
                for &b in &nodes {
                    let value = self.edge(structure, assign, a, b)?;
                    cache.set(a, b, value);
                }
            }
            for &via in &nodes {
                let via_active = structure.eval_unary(&active, via);
                for &a in &nodes {
                    for &b in &nodes {
                        let through = cache.get(a, via).and(cache.get(via, b)).and(via_active);
                        cache.set(a, b, cache.get(a, b).or(through));
                    }
                }
            }
            Ok(())
        };
        let result = run();

        assign.restore(&self.sub_left, saved_left);
        assign.restore(&self.sub_right, saved_right);
        result?;
        cache.validate();
        Ok(cache)
    }

    /// Worklist closure: build an adjacency list of non-false edges,
    /// then propagate per source node, revisiting a destination only
    /// when its value changes.
    pub fn closure_worklist(
        &self,
        structure: &Structure,
        assign: &mut Assignment,
    ) -> Result<TcCache> {
        let nodes: Vec<Node> = structure.nodes().collect();
        let active = structure.vocabulary().active().clone();
        let saved_left = assign.unbind(&self.sub_left);
        let saved_right = assign.unbind(&self.sub_right);

        let mut cache = TcCache::new();
        let mut run = || -> Result<()> {
            let mut edges: HashMap<Node, Vec<Node>> = HashMap::with_capacity(nodes.len());
            for &a in &nodes {
                let mut out = Vec::new();
                for &b in &nodes {
                    let value = self.edge(structure, assign, a, b)?;
                    if value != Kleene::False {
                        out.push(b);
                        cache.set(a, b, value);
                    }
                }
                edges.insert(a, out);
            }

            let mut visited: HashMap<Node, Kleene> = HashMap::with_capacity(nodes.len());
            let mut work: VecDeque<Node> = VecDeque::new();
            for &source in &nodes {
                visited.clear();
                work.push_back(source);
                while let Some(via) = work.pop_front() {
                    let via_active = structure.eval_unary(&active, via);
                    let path = cache.get(source, via);
                    for &next in &edges[&via] {
                        let previous = visited.get(&next).copied();
                        if previous == Some(Kleene::True) {
                            continue;
                        }
                        let value = cache
                            .get(source, next)
                            .or(path.and(cache.get(via, next)).and(via_active));
                        if previous == Some(value) {
                            continue;
                        }
                        cache.set(source, next, value);
                        visited.insert(next, value);
                        work.push_back(next);
                    }
                }
            }
            Ok(())
        };
        let result = run();

        assign.restore(&self.sub_left, saved_left);
        assign.restore(&self.sub_right, saved_right);
        result?;
        cache.validate();
        Ok(cache)
    }

    // ----- substitution plumbing for Formula -----------------------

    pub(crate) fn substitute_var(&self, from: &Var, to: &Var) -> Result<TcFormula> {
        let left = if &self.left == from {
            to.clone()
        } else {
            self.left.clone()
        };
        let right = if &self.right == from {
            to.clone()
        } else {
            self.right.clone()
        };
        if to == &self.sub_left || to == &self.sub_right {
            return Err(TvsError::CapturedSubstitution {
                from: from.name().to_string(),
                to: to.name().to_string(),
            });
        }
        let body = if from == &self.sub_left || from == &self.sub_right {
            self.body.clone()
        } else {
            Rc::new(self.body.substitute_var(from, to)?)
        };
        TcFormula::new(
            left,
            right,
            self.sub_left.clone(),
            self.sub_right.clone(),
            body,
        )
    }

    pub(crate) fn substitute_vars(&self, map: &HashMap<Var, Var>) -> Result<TcFormula> {
        let lookup = |v: &Var| map.get(v).cloned().unwrap_or_else(|| v.clone());
        for (from, to) in map {
            if to == &self.sub_left || to == &self.sub_right {
                return Err(TvsError::CapturedSubstitution {
                    from: from.name().to_string(),
                    to: to.name().to_string(),
                });
            }
        }
        let mut reduced = map.clone();
        reduced.remove(&self.sub_left);
        reduced.remove(&self.sub_right);
        let body = Rc::new(self.body.substitute_vars(&reduced)?);
        TcFormula::new(
            lookup(&self.left),
            lookup(&self.right),
            self.sub_left.clone(),
            self.sub_right.clone(),
            body,
        )
    }

    pub(crate) fn rename_binders(&self, target: &Var, pool: &mut VarPool) -> Result<TcFormula> {
        let mut body = Rc::new(self.body.rename_binders_in(target, pool)?);
        let mut sub_left = self.sub_left.clone();
        let mut sub_right = self.sub_right.clone();
        if &sub_left == target {
            let fresh = pool.fresh();
            body = Rc::new(body.substitute_var(&sub_left, &fresh)?);
            sub_left = fresh;
        }
        if &sub_right == target {
            let fresh = pool.fresh();
            body = Rc::new(body.substitute_var(&sub_right, &fresh)?);
            sub_right = fresh;
        }
        TcFormula::new(
            self.left.clone(),
            self.right.clone(),
            sub_left,
            sub_right,
            body,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Vocabulary;

    fn list_structure() -> (Rc<Vocabulary>, Structure, Vec<Node>) {
        let mut vocabulary = Vocabulary::new();
        let next = vocabulary.create("next", 2, false).unwrap();
        let vocabulary = Rc::new(vocabulary);
        let mut s = Structure::new(vocabulary.clone());
        let n0 = s.new_node().unwrap();
        let n1 = s.new_node().unwrap();
        let n2 = s.new_node().unwrap();
        s.update_binary(&next, n0, n1, Kleene::True);
        s.update_binary(&next, n1, n2, Kleene::True);
        (vocabulary, s, vec![n0, n1, n2])
    }

    fn next_tc(vocabulary: &Rc<Vocabulary>, pool: &mut VarPool) -> (Formula, Var, Var) {
        let x = pool.var("x");
        let y = pool.var("y");
        let sx = pool.var("sx");
        let sy = pool.var("sy");
        let next = vocabulary.get("next").unwrap().clone();
        let body = Formula::predicate(next, vec![sx.clone(), sy.clone()]).unwrap();
        let tc = Formula::tc(x.clone(), y.clone(), sx, sy, body).unwrap();
        (tc, x, y)
    }

    #[test]
    fn test_chain_reachability() {
        // Scenario: next holds on (n0,n1) and (n1,n2); TC reaches n0
        // to n2 but not backwards.
        let (vocabulary, s, nodes) = list_structure();
        let mut pool = VarPool::new();
        let (tc, x, y) = next_tc(&vocabulary, &mut pool);

        tc.prepare(&s);
        let mut assign = Assignment::new();
        assign.bind(x.clone(), nodes[0]);
        assign.bind(y.clone(), nodes[2]);
        assert_eq!(tc.eval(&s, &mut assign).unwrap(), Kleene::True);

        assign.bind(x.clone(), nodes[2]);
        assign.bind(y.clone(), nodes[0]);
        assert_eq!(tc.eval(&s, &mut assign).unwrap(), Kleene::False);
    }

    #[test]
    fn test_unknown_active_weakens_paths() {
        let (vocabulary, mut s, nodes) = list_structure();
        let active = vocabulary.active().clone();
        s.update_unary(&active, nodes[1], Kleene::Unknown);

        let mut pool = VarPool::new();
        let (tc, x, y) = next_tc(&vocabulary, &mut pool);
        tc.prepare(&s);
        let mut assign = Assignment::new();
        assign.bind(x.clone(), nodes[0]);
        assign.bind(y.clone(), nodes[2]);
        // The only path runs through a maybe-allocated node.
        assert_eq!(tc.eval(&s, &mut assign).unwrap(), Kleene::Unknown);

        // The direct edge does not pass through it and stays true.
        assign.bind(x.clone(), nodes[0]);
        assign.bind(y.clone(), nodes[1]);
        assert_eq!(tc.eval(&s, &mut assign).unwrap(), Kleene::True);
    }

    #[test]
    fn test_cache_reuse_and_invalidation() {
        let (vocabulary, mut s, nodes) = list_structure();
        let next = vocabulary.get("next").unwrap().clone();
        let mut pool = VarPool::new();
        let (tc, x, y) = next_tc(&vocabulary, &mut pool);

        tc.prepare(&s);
        let mut assign = Assignment::new();
        assign.bind(x.clone(), nodes[2]);
        assign.bind(y.clone(), nodes[0]);
        assert_eq!(tc.eval(&s, &mut assign).unwrap(), Kleene::False);

        // Mutate and re-prepare: the closure must be recomputed.
        s.update_binary(&next, nodes[2], nodes[0], Kleene::True);
        tc.prepare(&s);
        assert_eq!(tc.eval(&s, &mut assign).unwrap(), Kleene::True);
    }

    #[test]
    fn test_body_must_have_designated_free_vars() {
        let mut vocabulary = Vocabulary::new();
        let p = vocabulary.create("p", 1, false).unwrap();
        let mut pool = VarPool::new();
        let x = pool.var("x");
        let y = pool.var("y");
        let sx = pool.var("sx");
        let sy = pool.var("sy");
        let body = Formula::predicate(p, vec![sx.clone()]).unwrap();
        assert!(matches!(
            Formula::tc(x, y, sx, sy, body),
            Err(TvsError::TcFreeVars { .. })
        ));
    }
}
