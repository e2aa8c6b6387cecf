use thiserror::Error;

/// Errors raised by the kernel.
///
/// Nothing in here is retried internally; every error propagates to the
/// caller, which decides whether to abort the analysis or refine the
/// abstraction.
#[derive(Debug, Error)]
pub enum TvsError {
    /// A free variable of a formula was not bound by the assignment.
    #[error("variable {0} missing from assignment")]
    UnassignedVariable(String),

    /// A substitution would have been captured by an enclosing binder.
    #[error("substitution of {from} to {to} is captured by a binder")]
    CapturedSubstitution { from: String, to: String },

    /// A predicate was applied to a tuple of the wrong size.
    #[error("predicate {predicate} has arity {expected}, got a tuple of size {actual}")]
    ArityMismatch {
        predicate: String,
        expected: u8,
        actual: usize,
    },

    /// Predicates of arity above two cannot be stored in the packed
    /// per-arity maps. An unpacked representation is a deliberate
    /// extension point, not an implicit fallback.
    #[error("predicates of arity {0} are not supported by the packed representation")]
    UnsupportedArity(u8),

    /// The body of a transitive-closure formula must have both
    /// designated variables free.
    #[error("transitive-closure body must have {left} and {right} free")]
    TcFreeVars { left: String, right: String },

    /// A left-hand-side variable of a predicate update occurs bound in
    /// the right-hand-side formula.
    #[error("update variable {0} is bound in the right-hand-side formula")]
    BoundUpdateVariable(String),

    /// The dense node-id space is exhausted.
    #[error("node id space exhausted")]
    NodeIdsExhausted,

    /// The diagonal pairing of two node ids does not fit the key space.
    #[error("node pair ({0}, {1}) overflows the pairing key space")]
    PairOverflow(u32, u32),

    /// Structures normalized under different canonicalization levels
    /// (or not normalized at all) were compared.
    #[error("structures were normalized under different canonicalization levels")]
    MixedCanonicLevels,

    /// Configuration named an unknown canonicalization level.
    #[error("unknown canonicalization level: {0}")]
    InvalidCanonicLevel(String),

    /// Startup configuration named an unknown join mode.
    #[error("unknown join mode: {0}")]
    InvalidJoinMode(String),

    /// A predicate with this name already exists in the vocabulary.
    #[error("predicate {0} is already defined")]
    DuplicatePredicate(String),
}

pub type Result<T> = std::result::Result<T, TvsError>;
