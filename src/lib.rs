//! # tvs-rs: Three-Valued Logical Structures in Rust
//!
//! **`tvs-rs`** is the abstract-domain kernel of a shape analysis: it
//! represents abstract heap configurations as logical structures over
//! **Kleene three-valued logic** and gives them a sound, finite
//! lattice via **canonical abstraction**.
//!
//! ## What is a three-valued structure?
//!
//! A structure is a universe of nodes (abstract individuals) plus an
//! interpretation of every predicate over them, where each value is
//! `true`, `false` or `unknown`. Nodes that are indistinguishable
//! under the abstraction predicates are merged ("blurred") into one
//! *summary node*, which bounds the number of distinct structures and
//! makes fixpoint iteration terminate.
//!
//! ## Key Features
//!
//! - **Persistent interpretation maps**: predicate values live in
//!   hash-consed base-3 tries with packed two-bit leaves; updates are
//!   non-destructive and copying a structure is O(1).
//! - **Canonical abstraction**: [`Structure::blur`][crate::structure::Structure::blur]
//!   merges indistinguishable nodes; [`Structure::normalize`][crate::structure::Structure::normalize]
//!   interns structures so isomorphism checks degrade to integer
//!   comparisons at the higher canonicalization levels.
//! - **Pluggable joins**: structure sets keep members pairwise
//!   non-isomorphic (exact) or collapse abstraction-compatible
//!   members pointwise (partial/relational).
//! - **Three-valued formulas**: first-order formulas with equality,
//!   quantifiers and cached transitive closure evaluate against a
//!   structure, and lazily enumerate their satisfying assignments.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use tvs_rs::intern::{CanonicLevel, InternTables};
//! use tvs_rs::kleene::Kleene;
//! use tvs_rs::predicate::Vocabulary;
//! use tvs_rs::structure::Structure;
//!
//! // 1. Declare the vocabulary of the analysis.
//! let mut vocabulary = Vocabulary::new();
//! let x = vocabulary.create("x", 1, true).unwrap();
//! let next = vocabulary.create("next", 2, false).unwrap();
//! let vocabulary = Rc::new(vocabulary);
//!
//! // 2. Build a structure: x points at a two-cell list.
//! let mut s = Structure::new(vocabulary.clone());
//! let head = s.new_node().unwrap();
//! let tail = s.new_node().unwrap();
//! s.update_unary(&x, head, Kleene::True);
//! s.update_binary(&next, head, tail, Kleene::True);
//!
//! // 3. Apply canonical abstraction.
//! let mut tables = InternTables::new(CanonicLevel::Renumber);
//! s.blur(&mut tables);
//! assert_eq!(s.node_count(), 2);
//! ```
//!
//! ## Core Components
//!
//! - **[`kleene`]**: the three-valued logic itself.
//! - **[`structure`]**: structures, blur and normalization.
//! - **[`set`]**: the lattice of structures at a program point.
//! - **[`formula`]** / **[`enumerate`]** / **[`tc`]**: evaluation,
//!   assignment enumeration and transitive closure.
//!
//! Parsers for input formats, fixpoint drivers and output rendering
//! are deliberately outside this crate; they interact with the kernel
//! only through the types re-exported here.

pub mod assign;
pub mod enumerate;
pub mod error;
pub mod formula;
pub mod intern;
pub mod kleene;
pub mod kmap;
pub mod leaf;
pub mod node;
pub mod pack;
pub mod predicate;
pub mod set;
pub mod structure;
pub mod tc;
pub mod trie;
pub mod universe;
pub mod update;
pub mod utils;
pub mod variable;

pub use crate::assign::{Assignment, AssignmentKleene};
pub use crate::error::{Result, TvsError};
pub use crate::formula::{Formula, FormulaKind};
pub use crate::intern::{CanonicLevel, InternTables};
pub use crate::kleene::Kleene;
pub use crate::node::{Node, NodeTuple};
pub use crate::predicate::{Predicate, PredicateClass, Vocabulary};
pub use crate::set::{structure_set, JoinMode, MergeOutcome, StructureSet};
pub use crate::structure::Structure;
pub use crate::update::PredicateUpdate;
pub use crate::variable::{Var, VarPool};
