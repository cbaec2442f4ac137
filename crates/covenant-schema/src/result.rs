//! The schema phase's output and the collaborator seam.

use crate::schema::without_indices;
use covenant_kernel::{ErrorTree, KeyPath};
use serde::Serialize;
use serde_json::Value;

/// Output of structural validation: the validated value tree plus the
/// path-keyed error tree. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaResult {
    values: Value,
    errors: ErrorTree,
}

impl SchemaResult {
    pub fn new(values: Value, errors: ErrorTree) -> Self {
        Self { values, errors }
    }

    pub fn values(&self) -> &Value {
        &self.values
    }

    pub fn errors(&self) -> &ErrorTree {
        &self.errors
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// True iff the schema failed at `path`, at one of its ancestors, or
    /// anywhere below it.
    pub fn error_touches(&self, path: &KeyPath) -> bool {
        self.errors
            .iter()
            .filter_map(|message| message.path.as_ref())
            .any(|failed| failed.overlaps(path))
    }

    /// True iff the schema failed at `path` or at one of its ancestors.
    /// Failures below `path` do not count.
    pub fn error_at_or_above(&self, path: &KeyPath) -> bool {
        self.errors
            .iter()
            .filter_map(|message| message.path.as_ref())
            .any(|failed| failed.is_ancestor_of(path))
    }

    pub fn into_parts(self) -> (Value, ErrorTree) {
        (self.values, self.errors)
    }
}

/// The structural validator a contract delegates its first phase to.
///
/// [`Schema`](crate::Schema) is the in-tree implementation; any other
/// validator producing a [`SchemaResult`] and a key map plugs in here.
pub trait Validator: Send + Sync {
    /// Validate a raw input tree.
    fn validate(&self, input: &Value) -> SchemaResult;

    /// Every declarable path, used to check rule triggers at declaration time.
    fn key_map(&self) -> Vec<KeyPath>;

    /// Whether `path` names a declared location or an ancestor of one.
    ///
    /// Array indices in `path` are ignored.
    fn declares(&self, path: &KeyPath) -> bool {
        let path = without_indices(path);
        !path.is_empty() && self.key_map().iter().any(|known| path.is_ancestor_of(known))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyDecl, Schema, ValueType};
    use covenant_kernel::Message;
    use serde_json::json;

    #[test]
    fn error_touches_ancestors_and_descendants() {
        let mut errors = ErrorTree::new();
        errors.push(Message::schema("details.address", "must be a hash"));
        let result = SchemaResult::new(json!({}), errors);

        assert!(result.error_touches(&KeyPath::parse("details")));
        assert!(result.error_touches(&KeyPath::parse("details.address")));
        assert!(result.error_touches(&KeyPath::parse("details.address.street")));
        assert!(!result.error_touches(&KeyPath::parse("email")));
    }

    #[test]
    fn error_at_or_above_ignores_descendants() {
        let mut errors = ErrorTree::new();
        errors.push(Message::schema("nums.2", "must be an integer"));
        let result = SchemaResult::new(json!({}), errors);

        assert!(!result.error_at_or_above(&KeyPath::parse("nums")));
        assert!(result.error_at_or_above(&KeyPath::parse("nums.2")));
        assert!(result.error_at_or_above(&KeyPath::parse("nums.2.x")));
        assert!(!result.error_at_or_above(&KeyPath::parse("nums.1")));
    }

    #[test]
    fn declares_accepts_prefixes_and_ignores_indices() {
        let item = Schema::new(vec![KeyDecl::required("name", ValueType::String)]).unwrap();
        let schema = Schema::new(vec![
            KeyDecl::required("email", ValueType::String),
            KeyDecl::optional("items", ValueType::array_of(ValueType::Hash(item))),
        ])
        .unwrap();

        assert!(schema.declares(&KeyPath::parse("email")));
        assert!(schema.declares(&KeyPath::parse("items")));
        assert!(schema.declares(&KeyPath::parse("items.name")));
        assert!(schema.declares(&KeyPath::parse("items.0.name")));
        assert!(!schema.declares(&KeyPath::parse("items.title")));
        assert!(!schema.declares(&KeyPath::parse("emails")));
        assert!(!schema.declares(&KeyPath::root()));
    }
}
