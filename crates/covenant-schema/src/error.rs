//! Error types for schema construction.

/// Errors raised while declaring a schema.
///
/// Validation failures are never errors: they are messages in the
/// [`SchemaResult`](crate::SchemaResult). These variants signal a malformed
/// declaration.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Two declarations at the same level share a name.
    #[error("duplicate key declaration: {0}")]
    DuplicateKey(String),

    /// A key was declared with an empty name or a name containing `.`.
    #[error("invalid key name: {0:?}")]
    InvalidKeyName(String),

    /// A `format` predicate carries a pattern that does not compile.
    #[error("invalid format pattern {pattern:?} for key {key}: {source}")]
    InvalidFormat {
        key: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
