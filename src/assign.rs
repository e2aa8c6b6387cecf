//! Variable assignments used during evaluation and enumeration.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, TvsError};
use crate::kleene::Kleene;
use crate::node::Node;
use crate::variable::Var;

/// A mutable partial map from variables to nodes.
#[derive(Clone, Default)]
pub struct Assignment {
    bindings: HashMap<Var, Node>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &Var) -> Option<Node> {
        self.bindings.get(var).copied()
    }

    /// The node bound to `var`, or an error naming the variable.
    /// Evaluating a formula with an unbound free variable is an API
    /// misuse that must surface immediately.
    pub fn node(&self, var: &Var) -> Result<Node> {
        self.bindings
            .get(var)
            .copied()
            .ok_or_else(|| TvsError::UnassignedVariable(var.name().to_string()))
    }

    pub fn contains(&self, var: &Var) -> bool {
        self.bindings.contains_key(var)
    }

    /// Bind `var`, returning its previous binding.
    pub fn bind(&mut self, var: Var, node: Node) -> Option<Node> {
        self.bindings.insert(var, node)
    }

    /// Remove the binding of `var`.
    pub fn unbind(&mut self, var: &Var) -> Option<Node> {
        self.bindings.remove(var)
    }

    /// Restore the state before a [`bind`](Self::bind): rebind the old
    /// node when there was one, drop the binding otherwise.
    pub fn restore(&mut self, var: &Var, previous: Option<Node>) {
        match previous {
            Some(node) => {
                self.bindings.insert(var.clone(), node);
            }
            None => {
                self.bindings.remove(var);
            }
        }
    }

    /// Does this assignment bind every variable in `vars`?
    pub fn binds_all<'a>(&self, vars: impl IntoIterator<Item = &'a Var>) -> bool {
        vars.into_iter().all(|v| self.contains(v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, Node)> {
        self.bindings.iter().map(|(v, n)| (v, *n))
    }
}

impl fmt::Debug for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self
            .bindings
            .iter()
            .map(|(v, n)| format!("{}->{}", v, n))
            .collect();
        entries.sort();
        write!(f, "[{}]", entries.join(", "))
    }
}

/// An assignment tagged with the Kleene value it produced, the item
/// type of assignment enumeration.
#[derive(Clone, Debug)]
pub struct AssignmentKleene {
    pub assignment: Assignment,
    pub kleene: Kleene,
}

impl AssignmentKleene {
    pub fn new(assignment: Assignment, kleene: Kleene) -> Self {
        Self { assignment, kleene }
    }
}
