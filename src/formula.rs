//! First-order formulas with equality, quantifiers and transitive
//! closure, and their three-valued evaluation.
//!
//! A [`Formula`] is an immutable AST. Sub-formulas are shared through
//! `Rc` (the tree may be a DAG, never a cycle); free and bound
//! variable lists are computed lazily and cached per node. Substitution
//! returns a new formula; a substitution that would be captured by an
//! enclosing binder is a hard error unless routed through the
//! [`safe_substitute_var`](Formula::safe_substitute_var) entry point,
//! which alpha-renames the offending binders first.
//!
//! Before evaluating a formula against a structure, call
//! [`prepare`](Formula::prepare) once for that structure: it resets
//! every transitive-closure cache below the formula.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::assign::Assignment;
use crate::error::{Result, TvsError};
use crate::kleene::Kleene;
use crate::node::NodeTuple;
use crate::predicate::Predicate;
use crate::structure::Structure;
use crate::tc::TcFormula;
use crate::variable::{Var, VarPool};

/// A three-valued first-order formula.
#[derive(Clone)]
pub struct Formula {
    kind: FormulaKind,
    free: OnceCell<Vec<Var>>,
    bound: OnceCell<Vec<Var>>,
}

#[derive(Clone)]
pub enum FormulaKind {
    /// A constant Kleene value.
    Value(Kleene),
    /// A predicate applied to a tuple of variables.
    Predicate {
        predicate: Predicate,
        vars: Vec<Var>,
    },
    /// Equality of two variables, refined by summary information.
    Equality(Var, Var),
    Not(Rc<Formula>),
    And(Rc<Formula>, Rc<Formula>),
    Or(Rc<Formula>, Rc<Formula>),
    Implies(Rc<Formula>, Rc<Formula>),
    Equiv(Rc<Formula>, Rc<Formula>),
    /// Three-valued conditional: the condition arbitrates between the
    /// branches, joining them when it is unknown.
    If(Rc<Formula>, Rc<Formula>, Rc<Formula>),
    All(Var, Rc<Formula>),
    Exist(Var, Rc<Formula>),
    Tc(TcFormula),
}

fn push_unique(out: &mut Vec<Var>, v: &Var) {
    if !out.contains(v) {
        out.push(v.clone());
    }
}

fn extend_unique(out: &mut Vec<Var>, vars: &[Var]) {
    for v in vars {
        push_unique(out, v);
    }
}

impl Formula {
    fn from_kind(kind: FormulaKind) -> Formula {
        Formula {
            kind,
            free: OnceCell::new(),
            bound: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> &FormulaKind {
        &self.kind
    }

    // ----- constructors --------------------------------------------

    pub fn value(k: Kleene) -> Formula {
        Formula::from_kind(FormulaKind::Value(k))
    }

    /// A predicate atom. The variable tuple must match the predicate's
    /// arity.
    pub fn predicate(predicate: Predicate, vars: Vec<Var>) -> Result<Formula> {
        if predicate.arity() as usize != vars.len() {
            return Err(TvsError::ArityMismatch {
                predicate: predicate.name().to_string(),
                expected: predicate.arity(),
                actual: vars.len(),
            });
        }
        Ok(Formula::from_kind(FormulaKind::Predicate { predicate, vars }))
    }

    pub fn equality(left: Var, right: Var) -> Formula {
        Formula::from_kind(FormulaKind::Equality(left, right))
    }

    pub fn not(sub: Formula) -> Formula {
        Formula::from_kind(FormulaKind::Not(Rc::new(sub)))
    }

    pub fn and(left: Formula, right: Formula) -> Formula {
        Formula::from_kind(FormulaKind::And(Rc::new(left), Rc::new(right)))
    }

    pub fn or(left: Formula, right: Formula) -> Formula {
        Formula::from_kind(FormulaKind::Or(Rc::new(left), Rc::new(right)))
    }

    pub fn implies(left: Formula, right: Formula) -> Formula {
        Formula::from_kind(FormulaKind::Implies(Rc::new(left), Rc::new(right)))
    }

    pub fn equiv(left: Formula, right: Formula) -> Formula {
        Formula::from_kind(FormulaKind::Equiv(Rc::new(left), Rc::new(right)))
    }

    pub fn ite(cond: Formula, then: Formula, otherwise: Formula) -> Formula {
        Formula::from_kind(FormulaKind::If(
            Rc::new(cond),
            Rc::new(then),
            Rc::new(otherwise),
        ))
    }

    pub fn forall(var: Var, sub: Formula) -> Formula {
        Formula::from_kind(FormulaKind::All(var, Rc::new(sub)))
    }

    pub fn exists(var: Var, sub: Formula) -> Formula {
        Formula::from_kind(FormulaKind::Exist(var, Rc::new(sub)))
    }

    /// Transitive closure of a binary relation given by `body` over
    /// its free variables `sub_left`/`sub_right`, applied to
    /// `left`/`right`.
    pub fn tc(left: Var, right: Var, sub_left: Var, sub_right: Var, body: Formula) -> Result<Formula> {
        let tc = TcFormula::new(left, right, sub_left, sub_right, Rc::new(body))?;
        Ok(Formula::from_kind(FormulaKind::Tc(tc)))
    }

    /// Conjunction of all formulas, or a true constant for none.
    pub fn and_all(formulas: impl IntoIterator<Item = Formula>) -> Formula {
        let mut result: Option<Formula> = None;
        for f in formulas {
            result = Some(match result {
                None => f,
                Some(acc) => Formula::and(acc, f),
            });
        }
        result.unwrap_or_else(|| Formula::value(Kleene::True))
    }

    /// Disjunction of all formulas, or a false constant for none.
    pub fn or_all(formulas: impl IntoIterator<Item = Formula>) -> Formula {
        let mut result: Option<Formula> = None;
        for f in formulas {
            result = Some(match result {
                None => f,
                Some(acc) => Formula::or(acc, f),
            });
        }
        result.unwrap_or_else(|| Formula::value(Kleene::False))
    }

    // ----- variable bookkeeping ------------------------------------

    /// Free variables, in order of first appearance.
    pub fn free_vars(&self) -> &[Var] {
        self.free.get_or_init(|| self.calc_free_vars())
    }

    /// Variables bound in this formula or below, binders first.
    pub fn bound_vars(&self) -> &[Var] {
        self.bound.get_or_init(|| self.calc_bound_vars())
    }

    fn calc_free_vars(&self) -> Vec<Var> {
        let mut out = Vec::new();
        match &self.kind {
            FormulaKind::Value(_) => {}
            FormulaKind::Predicate { vars, .. } => extend_unique(&mut out, vars),
            FormulaKind::Equality(l, r) => {
                push_unique(&mut out, l);
                push_unique(&mut out, r);
            }
            FormulaKind::Not(f) => extend_unique(&mut out, f.free_vars()),
            FormulaKind::And(l, r)
            | FormulaKind::Or(l, r)
            | FormulaKind::Implies(l, r)
            | FormulaKind::Equiv(l, r) => {
                extend_unique(&mut out, l.free_vars());
                extend_unique(&mut out, r.free_vars());
            }
            FormulaKind::If(c, t, e) => {
                extend_unique(&mut out, c.free_vars());
                extend_unique(&mut out, t.free_vars());
                extend_unique(&mut out, e.free_vars());
            }
            FormulaKind::All(v, f) | FormulaKind::Exist(v, f) => {
                extend_unique(&mut out, f.free_vars());
                out.retain(|u| u != v);
            }
            FormulaKind::Tc(tc) => {
                extend_unique(&mut out, tc.body().free_vars());
                out.retain(|u| u != tc.sub_left() && u != tc.sub_right());
                push_unique(&mut out, tc.left());
                push_unique(&mut out, tc.right());
            }
        }
        out
    }

    fn calc_bound_vars(&self) -> Vec<Var> {
        let mut out = Vec::new();
        match &self.kind {
            FormulaKind::Value(_)
            | FormulaKind::Predicate { .. }
            | FormulaKind::Equality(_, _) => {}
            FormulaKind::Not(f) => extend_unique(&mut out, f.bound_vars()),
            FormulaKind::And(l, r)
            | FormulaKind::Or(l, r)
            | FormulaKind::Implies(l, r)
            | FormulaKind::Equiv(l, r) => {
                extend_unique(&mut out, l.bound_vars());
                extend_unique(&mut out, r.bound_vars());
            }
            FormulaKind::If(c, t, e) => {
                extend_unique(&mut out, c.bound_vars());
                extend_unique(&mut out, t.bound_vars());
                extend_unique(&mut out, e.bound_vars());
            }
            FormulaKind::All(v, f) | FormulaKind::Exist(v, f) => {
                push_unique(&mut out, v);
                extend_unique(&mut out, f.bound_vars());
            }
            FormulaKind::Tc(tc) => {
                push_unique(&mut out, tc.sub_left());
                push_unique(&mut out, tc.sub_right());
                extend_unique(&mut out, tc.body().bound_vars());
            }
        }
        out
    }

    /// Is the formula closed under the given partial assignment?
    pub fn is_total_under(&self, assign: &Assignment) -> bool {
        assign.binds_all(self.free_vars())
    }

    // ----- flattening ----------------------------------------------

    /// The leaves of the topmost conjunction, left to right.
    pub fn conjuncts(&self) -> Vec<&Formula> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Formula>) {
        if let FormulaKind::And(l, r) = &self.kind {
            l.collect_conjuncts(out);
            r.collect_conjuncts(out);
        } else {
            out.push(self);
        }
    }

    /// The leaves of the topmost disjunction, left to right.
    pub fn disjuncts(&self) -> Vec<&Formula> {
        let mut out = Vec::new();
        self.collect_disjuncts(&mut out);
        out
    }

    fn collect_disjuncts<'a>(&'a self, out: &mut Vec<&'a Formula>) {
        if let FormulaKind::Or(l, r) = &self.kind {
            l.collect_disjuncts(out);
            r.collect_disjuncts(out);
        } else {
            out.push(self);
        }
    }

    // ----- substitution --------------------------------------------

    /// Substitute `from` by `to`, erroring when `to` is captured by a
    /// binder. Use [`safe_substitute_var`](Self::safe_substitute_var)
    /// to alpha-rename instead.
    pub fn substitute_var(&self, from: &Var, to: &Var) -> Result<Formula> {
        if from == to {
            return Ok(self.clone());
        }
        let kind = match &self.kind {
            FormulaKind::Value(k) => FormulaKind::Value(*k),
            FormulaKind::Predicate { predicate, vars } => FormulaKind::Predicate {
                predicate: predicate.clone(),
                vars: vars
                    .iter()
                    .map(|v| if v == from { to.clone() } else { v.clone() })
                    .collect(),
            },
            FormulaKind::Equality(l, r) => {
                let l = if l == from { to.clone() } else { l.clone() };
                let r = if r == from { to.clone() } else { r.clone() };
                FormulaKind::Equality(l, r)
            }
            FormulaKind::Not(f) => FormulaKind::Not(Rc::new(f.substitute_var(from, to)?)),
            FormulaKind::And(l, r) => FormulaKind::And(
                Rc::new(l.substitute_var(from, to)?),
                Rc::new(r.substitute_var(from, to)?),
            ),
            FormulaKind::Or(l, r) => FormulaKind::Or(
                Rc::new(l.substitute_var(from, to)?),
                Rc::new(r.substitute_var(from, to)?),
            ),
            FormulaKind::Implies(l, r) => FormulaKind::Implies(
                Rc::new(l.substitute_var(from, to)?),
                Rc::new(r.substitute_var(from, to)?),
            ),
            FormulaKind::Equiv(l, r) => FormulaKind::Equiv(
                Rc::new(l.substitute_var(from, to)?),
                Rc::new(r.substitute_var(from, to)?),
            ),
            FormulaKind::If(c, t, e) => FormulaKind::If(
                Rc::new(c.substitute_var(from, to)?),
                Rc::new(t.substitute_var(from, to)?),
                Rc::new(e.substitute_var(from, to)?),
            ),
            FormulaKind::All(v, f) | FormulaKind::Exist(v, f) => {
                if v == from {
                    // Shadowed: nothing to substitute below.
                    return Ok(self.clone());
                }
                if v == to {
                    return Err(TvsError::CapturedSubstitution {
                        from: from.name().to_string(),
                        to: to.name().to_string(),
                    });
                }
                let sub = Rc::new(f.substitute_var(from, to)?);
                match &self.kind {
                    FormulaKind::All(_, _) => FormulaKind::All(v.clone(), sub),
                    _ => FormulaKind::Exist(v.clone(), sub),
                }
            }
            FormulaKind::Tc(tc) => FormulaKind::Tc(tc.substitute_var(from, to)?),
        };
        Ok(Formula::from_kind(kind))
    }

    /// Parallel substitution, erroring on capture. All replacements
    /// happen simultaneously, so swapping two variables is well
    /// defined.
    pub fn substitute_vars(&self, map: &HashMap<Var, Var>) -> Result<Formula> {
        if map.is_empty() {
            return Ok(self.clone());
        }
        let lookup = |v: &Var| map.get(v).cloned().unwrap_or_else(|| v.clone());
        let kind = match &self.kind {
            FormulaKind::Value(k) => FormulaKind::Value(*k),
            FormulaKind::Predicate { predicate, vars } => FormulaKind::Predicate {
                predicate: predicate.clone(),
                vars: vars.iter().map(lookup).collect(),
            },
            FormulaKind::Equality(l, r) => FormulaKind::Equality(lookup(l), lookup(r)),
            FormulaKind::Not(f) => FormulaKind::Not(Rc::new(f.substitute_vars(map)?)),
            FormulaKind::And(l, r) => FormulaKind::And(
                Rc::new(l.substitute_vars(map)?),
                Rc::new(r.substitute_vars(map)?),
            ),
            FormulaKind::Or(l, r) => FormulaKind::Or(
                Rc::new(l.substitute_vars(map)?),
                Rc::new(r.substitute_vars(map)?),
            ),
            FormulaKind::Implies(l, r) => FormulaKind::Implies(
                Rc::new(l.substitute_vars(map)?),
                Rc::new(r.substitute_vars(map)?),
            ),
            FormulaKind::Equiv(l, r) => FormulaKind::Equiv(
                Rc::new(l.substitute_vars(map)?),
                Rc::new(r.substitute_vars(map)?),
            ),
            FormulaKind::If(c, t, e) => FormulaKind::If(
                Rc::new(c.substitute_vars(map)?),
                Rc::new(t.substitute_vars(map)?),
                Rc::new(e.substitute_vars(map)?),
            ),
            FormulaKind::All(v, f) | FormulaKind::Exist(v, f) => {
                if let Some((from, _)) = map.iter().find(|(_, to)| *to == v) {
                    return Err(TvsError::CapturedSubstitution {
                        from: from.name().to_string(),
                        to: v.name().to_string(),
                    });
                }
                let sub = if map.contains_key(v) {
                    let mut reduced = map.clone();
                    reduced.remove(v);
                    Rc::new(f.substitute_vars(&reduced)?)
                } else {
                    Rc::new(f.substitute_vars(map)?)
                };
                match &self.kind {
                    FormulaKind::All(_, _) => FormulaKind::All(v.clone(), sub),
                    _ => FormulaKind::Exist(v.clone(), sub),
                }
            }
            FormulaKind::Tc(tc) => FormulaKind::Tc(tc.substitute_vars(map)?),
        };
        Ok(Formula::from_kind(kind))
    }

    /// Substitute `from` by `to`, alpha-renaming any binder of `to`
    /// first so the substitution can never be captured.
    pub fn safe_substitute_var(&self, from: &Var, to: &Var, pool: &mut VarPool) -> Result<Formula> {
        let renamed = if self.bound_vars().contains(to) {
            self.rename_binders_in(to, pool)?
        } else {
            self.clone()
        };
        renamed.substitute_var(from, to)
    }

    /// Parallel variant of
    /// [`safe_substitute_var`](Self::safe_substitute_var):
    /// alpha-rename every binder that would capture a replacement
    /// variable, then substitute simultaneously.
    pub fn safe_substitute_vars(
        &self,
        map: &HashMap<Var, Var>,
        pool: &mut VarPool,
    ) -> Result<Formula> {
        let mut renamed = self.clone();
        for to in map.values() {
            if renamed.bound_vars().contains(to) {
                renamed = renamed.rename_binders_in(to, pool)?;
            }
        }
        renamed.substitute_vars(map)
    }

    /// Rename every binder that binds `target` to a fresh variable.
    pub(crate) fn rename_binders_in(&self, target: &Var, pool: &mut VarPool) -> Result<Formula> {
        let kind = match &self.kind {
            FormulaKind::Value(_)
            | FormulaKind::Predicate { .. }
            | FormulaKind::Equality(_, _) => return Ok(self.clone()),
            FormulaKind::Not(f) => FormulaKind::Not(Rc::new(f.rename_binders_in(target, pool)?)),
            FormulaKind::And(l, r) => FormulaKind::And(
                Rc::new(l.rename_binders_in(target, pool)?),
                Rc::new(r.rename_binders_in(target, pool)?),
            ),
            FormulaKind::Or(l, r) => FormulaKind::Or(
                Rc::new(l.rename_binders_in(target, pool)?),
                Rc::new(r.rename_binders_in(target, pool)?),
            ),
            FormulaKind::Implies(l, r) => FormulaKind::Implies(
                Rc::new(l.rename_binders_in(target, pool)?),
                Rc::new(r.rename_binders_in(target, pool)?),
            ),
            FormulaKind::Equiv(l, r) => FormulaKind::Equiv(
                Rc::new(l.rename_binders_in(target, pool)?),
                Rc::new(r.rename_binders_in(target, pool)?),
            ),
            FormulaKind::If(c, t, e) => FormulaKind::If(
                Rc::new(c.rename_binders_in(target, pool)?),
                Rc::new(t.rename_binders_in(target, pool)?),
                Rc::new(e.rename_binders_in(target, pool)?),
            ),
            FormulaKind::All(v, f) | FormulaKind::Exist(v, f) => {
                let inner = f.rename_binders_in(target, pool)?;
                let (binder, sub) = if v == target {
                    let fresh = pool.fresh();
                    (fresh.clone(), inner.substitute_var(v, &fresh)?)
                } else {
                    (v.clone(), inner)
                };
                match &self.kind {
                    FormulaKind::All(_, _) => FormulaKind::All(binder, Rc::new(sub)),
                    _ => FormulaKind::Exist(binder, Rc::new(sub)),
                }
            }
            FormulaKind::Tc(tc) => FormulaKind::Tc(tc.rename_binders(target, pool)?),
        };
        Ok(Formula::from_kind(kind))
    }

    // ----- evaluation ----------------------------------------------

    /// Reset every transitive-closure cache below this formula. Must
    /// run once per structure before [`eval`](Self::eval).
    pub fn prepare(&self, structure: &Structure) {
        match &self.kind {
            FormulaKind::Value(_)
            | FormulaKind::Predicate { .. }
            | FormulaKind::Equality(_, _) => {}
            FormulaKind::Not(f) => f.prepare(structure),
            FormulaKind::And(l, r)
            | FormulaKind::Or(l, r)
            | FormulaKind::Implies(l, r)
            | FormulaKind::Equiv(l, r) => {
                l.prepare(structure);
                r.prepare(structure);
            }
            FormulaKind::If(c, t, e) => {
                c.prepare(structure);
                t.prepare(structure);
                e.prepare(structure);
            }
            FormulaKind::All(_, f) | FormulaKind::Exist(_, f) => f.prepare(structure),
            FormulaKind::Tc(tc) => {
                tc.invalidate();
                tc.body().prepare(structure);
            }
        }
    }

    /// Evaluate against a structure under an assignment of the free
    /// variables. An unbound free variable is an error.
    pub fn eval(&self, structure: &Structure, assign: &mut Assignment) -> Result<Kleene> {
        match &self.kind {
            FormulaKind::Value(k) => Ok(*k),
            FormulaKind::Predicate { predicate, vars } => {
                let mut nodes = Vec::with_capacity(vars.len());
                for v in vars {
                    nodes.push(assign.node(v)?);
                }
                structure.eval(predicate, &NodeTuple::from_slice(&nodes))
            }
            FormulaKind::Equality(l, r) => {
                if l == r {
                    return Ok(Kleene::True);
                }
                let ln = assign.node(l)?;
                let rn = assign.node(r)?;
                if ln != rn {
                    return Ok(Kleene::False);
                }
                // Equality on a summary node holds for at most some of
                // the individuals it stands for.
                Ok(structure.eval_unary(structure.vocabulary().sm(), ln).not())
            }
            FormulaKind::Not(f) => Ok(f.eval(structure, assign)?.not()),
            FormulaKind::And(l, r) => {
                let left = l.eval(structure, assign)?;
                if left == Kleene::False {
                    return Ok(Kleene::False);
                }
                Ok(left.and(r.eval(structure, assign)?))
            }
            FormulaKind::Or(l, r) => {
                let left = l.eval(structure, assign)?;
                if left == Kleene::True {
                    return Ok(Kleene::True);
                }
                Ok(left.or(r.eval(structure, assign)?))
            }
            FormulaKind::Implies(l, r) => {
                let left = l.eval(structure, assign)?;
                let right = r.eval(structure, assign)?;
                Ok(left.not().or(right))
            }
            FormulaKind::Equiv(l, r) => {
                let left = l.eval(structure, assign)?;
                let right = r.eval(structure, assign)?;
                Ok(left.not().or(right).and(left.or(right.not())))
            }
            FormulaKind::If(c, t, e) => {
                let cond = c.eval(structure, assign)?;
                match cond {
                    Kleene::True => t.eval(structure, assign),
                    Kleene::False => e.eval(structure, assign),
                    Kleene::Unknown => {
                        Ok(t.eval(structure, assign)?.join(e.eval(structure, assign)?))
                    }
                }
            }
            FormulaKind::All(v, f) => {
                let saved = assign.unbind(v);
                let mut result = Kleene::True;
                for (node, active) in structure.active_nodes() {
                    assign.bind(v.clone(), node);
                    let value = match f.eval(structure, assign) {
                        Ok(value) => value,
                        Err(e) => {
                            assign.restore(v, saved);
                            return Err(e);
                        }
                    };
                    result = result.and(value);
                    if result == Kleene::False {
                        // A failing placeholder only refutes the
                        // quantifier to the extent the node is real.
                        result = active.not();
                    }
                    if result == Kleene::False {
                        break;
                    }
                }
                assign.restore(v, saved);
                Ok(result)
            }
            FormulaKind::Exist(v, f) => {
                let saved = assign.unbind(v);
                let mut result = Kleene::False;
                for (node, active) in structure.active_nodes() {
                    assign.bind(v.clone(), node);
                    let value = match f.eval(structure, assign) {
                        Ok(value) => value,
                        Err(e) => {
                            assign.restore(v, saved);
                            return Err(e);
                        }
                    };
                    result = result.or(value);
                    if result == Kleene::True {
                        // A witness counts only as far as it is real.
                        result = active;
                    }
                    if result == Kleene::True {
                        break;
                    }
                }
                assign.restore(v, saved);
                Ok(result)
            }
            FormulaKind::Tc(tc) => tc.eval(structure, assign),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FormulaKind::Value(k) => write!(f, "{}", k),
            FormulaKind::Predicate { predicate, vars } => {
                write!(f, "{}(", predicate)?;
                for (i, v) in vars.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
            FormulaKind::Equality(l, r) => write!(f, "{} == {}", l, r),
            FormulaKind::Not(sub) => write!(f, "!({})", sub),
            FormulaKind::And(l, r) => write!(f, "({} & {})", l, r),
            FormulaKind::Or(l, r) => write!(f, "({} | {})", l, r),
            FormulaKind::Implies(l, r) => write!(f, "({} -> {})", l, r),
            FormulaKind::Equiv(l, r) => write!(f, "({} <-> {})", l, r),
            FormulaKind::If(c, t, e) => write!(f, "({} ? {} : {})", c, t, e),
            FormulaKind::All(v, sub) => write!(f, "(A {}. {})", v, sub),
            FormulaKind::Exist(v, sub) => write!(f, "(E {}. {})", v, sub),
            FormulaKind::Tc(tc) => write!(
                f,
                "TC({},{}: {})({},{})",
                tc.sub_left(),
                tc.sub_right(),
                tc.body(),
                tc.left(),
                tc.right()
            ),
        }
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Vocabulary;

    fn setup() -> (Rc<Vocabulary>, VarPool) {
        let mut vocabulary = Vocabulary::new();
        vocabulary.create("x", 1, true).unwrap();
        vocabulary.create("n", 2, false).unwrap();
        (Rc::new(vocabulary), VarPool::new())
    }

    #[test]
    fn test_free_and_bound_vars() {
        let (vocabulary, mut pool) = setup();
        let v = pool.var("v");
        let w = pool.var("w");
        let n = vocabulary.get("n").unwrap().clone();

        let f = Formula::exists(
            w.clone(),
            Formula::predicate(n, vec![v.clone(), w.clone()]).unwrap(),
        );
        assert_eq!(f.free_vars(), &[v.clone()]);
        assert_eq!(f.bound_vars(), &[w]);
    }

    #[test]
    fn test_eval_connectives() {
        let (vocabulary, _) = setup();
        let s = Structure::new(vocabulary);
        let mut assign = Assignment::new();

        let t = || Formula::value(Kleene::True);
        let u = || Formula::value(Kleene::Unknown);
        let f = || Formula::value(Kleene::False);

        let cases = [
            (Formula::and(t(), u()), Kleene::Unknown),
            (Formula::or(f(), u()), Kleene::Unknown),
            (Formula::not(u()), Kleene::Unknown),
            (Formula::implies(u(), f()), Kleene::Unknown),
            (Formula::implies(f(), f()), Kleene::True),
            (Formula::equiv(t(), t()), Kleene::True),
            (Formula::equiv(t(), f()), Kleene::False),
            (Formula::equiv(u(), t()), Kleene::Unknown),
            (Formula::ite(u(), t(), t()), Kleene::True),
            (Formula::ite(u(), t(), f()), Kleene::Unknown),
            (Formula::ite(t(), f(), t()), Kleene::False),
        ];
        for (formula, expected) in cases {
            assert_eq!(formula.eval(&s, &mut assign).unwrap(), expected, "{}", formula);
        }
    }

    #[test]
    fn test_quantifiers_weight_by_active() {
        let (vocabulary, mut pool) = setup();
        let x = vocabulary.get("x").unwrap().clone();
        let active = vocabulary.active().clone();
        let mut s = Structure::new(vocabulary);
        let a = s.new_node().unwrap();
        let b = s.new_node().unwrap();
        s.update_unary(&x, a, Kleene::True);
        s.update_unary(&x, b, Kleene::True);

        let v = pool.var("v");
        let all_x = Formula::forall(
            v.clone(),
            Formula::predicate(x.clone(), vec![v.clone()]).unwrap(),
        );
        let some_x = Formula::exists(
            v.clone(),
            Formula::predicate(x.clone(), vec![v.clone()]).unwrap(),
        );
        let mut assign = Assignment::new();
        assert_eq!(all_x.eval(&s, &mut assign).unwrap(), Kleene::True);
        assert_eq!(some_x.eval(&s, &mut assign).unwrap(), Kleene::True);

        // A maybe-allocated node failing the body weakens the
        // universal only to unknown.
        let c = s.new_node().unwrap();
        s.update_unary(&active, c, Kleene::Unknown);
        assert_eq!(all_x.eval(&s, &mut assign).unwrap(), Kleene::Unknown);

        // A witness that only maybe exists gives an unknown witness.
        let only_c = {
            let mut s2 = Structure::new(s.vocabulary().clone());
            let c2 = s2.new_node().unwrap();
            s2.update_unary(&x, c2, Kleene::True);
            s2.update_unary(&active, c2, Kleene::Unknown);
            s2
        };
        assert_eq!(some_x.eval(&only_c, &mut assign).unwrap(), Kleene::Unknown);
    }

    #[test]
    fn test_equality_on_summary_node() {
        let (vocabulary, mut pool) = setup();
        let sm = vocabulary.sm().clone();
        let mut s = Structure::new(vocabulary);
        let a = s.new_node().unwrap();
        s.update_unary(&sm, a, Kleene::Unknown);

        let v = pool.var("v");
        let w = pool.var("w");
        let mut assign = Assignment::new();
        assign.bind(v.clone(), a);
        assign.bind(w.clone(), a);

        let eq = Formula::equality(v.clone(), w.clone());
        assert_eq!(eq.eval(&s, &mut assign).unwrap(), Kleene::Unknown);

        let self_eq = Formula::equality(v.clone(), v.clone());
        assert_eq!(self_eq.eval(&s, &mut assign).unwrap(), Kleene::True);
    }

    #[test]
    fn test_unassigned_variable_is_loud() {
        let (vocabulary, mut pool) = setup();
        let x = vocabulary.get("x").unwrap().clone();
        let s = Structure::new(vocabulary);
        let v = pool.var("v");
        let f = Formula::predicate(x, vec![v]).unwrap();
        let mut assign = Assignment::new();
        assert!(matches!(
            f.eval(&s, &mut assign),
            Err(TvsError::UnassignedVariable(_))
        ));
    }

    #[test]
    fn test_substitution_capture_is_an_error() {
        let (vocabulary, mut pool) = setup();
        let n = vocabulary.get("n").unwrap().clone();
        let v = pool.var("v");
        let w = pool.var("w");
        let u = pool.var("u");

        // (E w. n(v, w)): substituting v -> w is a capture.
        let f = Formula::exists(
            w.clone(),
            Formula::predicate(n, vec![v.clone(), w.clone()]).unwrap(),
        );
        assert!(matches!(
            f.substitute_var(&v, &w),
            Err(TvsError::CapturedSubstitution { .. })
        ));

        // Plain renaming works.
        let renamed = f.substitute_var(&v, &u).unwrap();
        assert_eq!(renamed.free_vars(), &[u.clone()]);

        // The safe variant alpha-renames the binder instead.
        let safe = f.safe_substitute_var(&v, &w, &mut pool).unwrap();
        assert_eq!(safe.free_vars(), &[w.clone()]);
        assert_ne!(safe.bound_vars()[0], w);
    }

    #[test]
    fn test_conjunct_flattening() {
        let a = Formula::value(Kleene::True);
        let b = Formula::value(Kleene::Unknown);
        let c = Formula::value(Kleene::False);
        let f = Formula::and(Formula::and(a, b), c);
        assert_eq!(f.conjuncts().len(), 3);
    }
}
