//! Error types for contract declaration and invocation.

/// Error type rule bodies return to abort a call.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by contract declaration or by a rule body at call time.
///
/// Validation failures are not errors; they land in the result's error tree.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// A rule names keys the schema does not declare. `keys` echoes the
    /// offending specs in the shape the caller wrote them.
    #[error("{contract}.rule specifies keys that are not defined by the schema: {keys}")]
    InvalidKeys { contract: String, keys: String },

    /// A rule refers to a macro no contract in the chain registered.
    #[error("{contract}.rule refers to an unregistered macro: {name}")]
    UnknownMacro { contract: String, name: String },

    /// An each-rule must iterate exactly one array key.
    #[error("{contract}.rule each requires exactly one key, got {count}")]
    EachArity { contract: String, count: usize },

    /// A rule bound to several keys recorded a failure through `key()`.
    #[error("rule #{rule} of {contract} has {count} keys; `key()` is ambiguous, use `key_at`")]
    AmbiguousKey {
        contract: String,
        rule: usize,
        count: usize,
    },

    /// A rule body returned an error; the call is aborted.
    #[error("rule #{rule} of {contract} failed: {source}")]
    RuleFailed {
        contract: String,
        rule: usize,
        #[source]
        source: BoxError,
    },
}
