//! Declarative key schema and its validator.
//!
//! A [`Schema`] is an ordered list of [`KeyDecl`]s. Each declaration names a
//! key, whether it is required, its [`ValueType`], and a short chain of
//! [`Predicate`]s. Validation walks the input once, in declaration order,
//! and records at most one message per location: the first type or
//! predicate check that fails stops the chain for that key.

use crate::error::SchemaError;
use crate::result::{SchemaResult, Validator};
use covenant_kernel::{ErrorTree, KeyPath, Message, MessageSource, Segment};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Canonical failure texts produced by the schema phase.
pub mod message {
    pub const MISSING: &str = "is missing";
    pub const FILLED: &str = "must be filled";
    pub const STRING: &str = "must be a string";
    pub const INTEGER: &str = "must be an integer";
    pub const NUMBER: &str = "must be a number";
    pub const BOOL: &str = "must be boolean";
    pub const HASH: &str = "must be a hash";
    pub const ARRAY: &str = "must be an array";
    pub const FORMAT: &str = "is in invalid format";

    pub fn min_size(size: usize) -> String {
        format!("size cannot be less than {size}")
    }

    pub fn max_size(size: usize) -> String {
        format!("size cannot be greater than {size}")
    }

    pub fn included_in(values: &[String]) -> String {
        format!("must be one of: {}", values.join(", "))
    }
}

/// The type a key's value must have.
#[derive(Debug, Clone)]
pub enum ValueType {
    Any,
    String,
    Integer,
    Number,
    Bool,
    /// A nested hash validated against its own schema.
    Hash(Schema),
    /// An array whose every element has the given type.
    Array(Box<ValueType>),
}

impl ValueType {
    pub fn array_of(item: ValueType) -> Self {
        Self::Array(Box::new(item))
    }

    fn type_message(&self) -> &'static str {
        match self {
            Self::Any => message::FILLED,
            Self::String => message::STRING,
            Self::Integer => message::INTEGER,
            Self::Number => message::NUMBER,
            Self::Bool => message::BOOL,
            Self::Hash(_) => message::HASH,
            Self::Array(_) => message::ARRAY,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => !value.is_null(),
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Hash(_) => value.is_object(),
            Self::Array(_) => value.is_array(),
        }
    }
}

/// A built-in check applied after the type check passes.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Non-empty string, array, or hash.
    Filled,
    MinSize(usize),
    MaxSize(usize),
    Format(Regex),
    IncludedIn(Vec<String>),
}

impl Predicate {
    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::Filled => match size_of(value) {
                Some(0) => Err(message::FILLED.to_string()),
                _ => Ok(()),
            },
            Self::MinSize(min) => match size_of(value) {
                Some(size) if size < *min => Err(message::min_size(*min)),
                _ => Ok(()),
            },
            Self::MaxSize(max) => match size_of(value) {
                Some(size) if size > *max => Err(message::max_size(*max)),
                _ => Ok(()),
            },
            Self::Format(pattern) => match value.as_str() {
                Some(text) if !pattern.is_match(text) => Err(message::FORMAT.to_string()),
                _ => Ok(()),
            },
            Self::IncludedIn(allowed) => {
                let rendered = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                if allowed.contains(&rendered) {
                    Ok(())
                } else {
                    Err(message::included_in(allowed))
                }
            }
        }
    }
}

fn size_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

/// One key declaration.
#[derive(Debug, Clone)]
pub struct KeyDecl {
    name: String,
    required: bool,
    nullable: bool,
    value_type: ValueType,
    predicates: Vec<Predicate>,
}

impl KeyDecl {
    /// A key that must be present.
    pub fn required(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name.into(), true, value_type)
    }

    /// A key that may be absent.
    pub fn optional(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name.into(), false, value_type)
    }

    fn new(name: String, required: bool, value_type: ValueType) -> Self {
        Self {
            name,
            required,
            nullable: false,
            value_type,
            predicates: Vec::new(),
        }
    }

    /// Accept `null` as a valid value.
    pub fn maybe(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn filled(mut self) -> Self {
        self.predicates.push(Predicate::Filled);
        self
    }

    pub fn min_size(mut self, size: usize) -> Self {
        self.predicates.push(Predicate::MinSize(size));
        self
    }

    pub fn max_size(mut self, size: usize) -> Self {
        self.predicates.push(Predicate::MaxSize(size));
        self
    }

    pub fn included_in<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates
            .push(Predicate::IncludedIn(values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn format(mut self, pattern: &str) -> Result<Self, SchemaError> {
        let regex = Regex::new(pattern).map_err(|source| SchemaError::InvalidFormat {
            key: self.name.clone(),
            pattern: pattern.to_string(),
            source,
        })?;
        self.predicates.push(Predicate::Format(regex));
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    fn check(&self, raw: &Value, path: &KeyPath, errors: &mut ErrorTree) -> Value {
        if raw.is_null() {
            if !self.nullable {
                let text = if self
                    .predicates
                    .iter()
                    .any(|p| matches!(p, Predicate::Filled))
                {
                    message::FILLED
                } else {
                    self.value_type.type_message()
                };
                errors.push(Message::schema(path, text));
            }
            return Value::Null;
        }

        if !self.value_type.accepts(raw) {
            errors.push(Message::schema(path, self.value_type.type_message()));
            return raw.clone();
        }

        if let Some(text) = self.predicates.iter().find_map(|p| p.check(raw).err()) {
            errors.push(Message::schema(path, text));
            return raw.clone();
        }

        check_nested(&self.value_type, raw, path, errors)
    }
}

/// Descend into hashes and arrays once the outer value passed its checks.
fn check_nested(value_type: &ValueType, raw: &Value, path: &KeyPath, errors: &mut ErrorTree) -> Value {
    match (value_type, raw) {
        (ValueType::Hash(schema), Value::Object(map)) => {
            Value::Object(schema.validate_keys(map, path, errors))
        }
        (ValueType::Array(item), Value::Array(items)) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(idx, element)| {
                    let element_path = path.child(idx);
                    if !item.accepts(element) {
                        errors.push(Message::schema(&element_path, item.type_message()));
                        return element.clone();
                    }
                    check_nested(item, element, &element_path, errors)
                })
                .collect(),
        ),
        _ => raw.clone(),
    }
}

/// An ordered set of key declarations.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    keys: Vec<KeyDecl>,
}

impl Schema {
    /// Build a schema, rejecting duplicate or malformed key names.
    pub fn new(keys: Vec<KeyDecl>) -> Result<Self, SchemaError> {
        let mut seen = BTreeSet::new();
        for decl in &keys {
            if decl.name.is_empty() || decl.name.contains('.') {
                return Err(SchemaError::InvalidKeyName(decl.name.clone()));
            }
            if !seen.insert(decl.name.as_str()) {
                return Err(SchemaError::DuplicateKey(decl.name.clone()));
            }
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[KeyDecl] {
        &self.keys
    }

    /// Validate a raw input tree.
    ///
    /// Only declared keys survive into the output value tree.
    pub fn call(&self, input: &Value) -> SchemaResult {
        let mut errors = ErrorTree::new();
        let values = match input {
            Value::Object(map) => Value::Object(self.validate_keys(map, &KeyPath::root(), &mut errors)),
            _ => {
                errors.push(Message::base(message::HASH, MessageSource::Schema));
                Value::Object(Map::new())
            }
        };
        tracing::debug!(
            target: "covenant::schema",
            keys = self.keys.len(),
            failures = errors.len(),
            "schema validation finished"
        );
        SchemaResult::new(values, errors)
    }

    fn validate_keys(
        &self,
        input: &Map<String, Value>,
        prefix: &KeyPath,
        errors: &mut ErrorTree,
    ) -> Map<String, Value> {
        let mut output = Map::new();
        for decl in &self.keys {
            let path = prefix.child(decl.name.as_str());
            match input.get(&decl.name) {
                Some(raw) => {
                    let value = decl.check(raw, &path, errors);
                    output.insert(decl.name.clone(), value);
                }
                None if decl.required => errors.push(Message::schema(path, message::MISSING)),
                None => {}
            }
        }
        output
    }

    /// Every declarable path, parents before children, in declaration order.
    ///
    /// Members of arrays of hashes are listed without an index segment
    /// (`items.name`).
    pub fn paths(&self) -> Vec<KeyPath> {
        let mut out = Vec::new();
        self.collect_paths(&KeyPath::root(), &mut out);
        out
    }

    fn collect_paths(&self, prefix: &KeyPath, out: &mut Vec<KeyPath>) {
        for decl in &self.keys {
            let path = prefix.child(decl.name.as_str());
            out.push(path.clone());
            let mut value_type = &decl.value_type;
            while let ValueType::Array(item) = value_type {
                value_type = item;
            }
            if let ValueType::Hash(nested) = value_type {
                nested.collect_paths(&path, out);
            }
        }
    }
}

impl Validator for Schema {
    fn validate(&self, input: &Value) -> SchemaResult {
        self.call(input)
    }

    fn key_map(&self) -> Vec<KeyPath> {
        self.paths()
    }
}

/// Drop array indices so `tags.0.name` compares against `tags.name`.
pub(crate) fn without_indices(path: &KeyPath) -> KeyPath {
    path.segments()
        .iter()
        .filter(|segment| matches!(segment, Segment::Key(_)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> Schema {
        let address = Schema::new(vec![KeyDecl::required("street", ValueType::String).filled()])
            .unwrap();
        let details =
            Schema::new(vec![KeyDecl::required("address", ValueType::Hash(address))]).unwrap();
        Schema::new(vec![
            KeyDecl::required("email", ValueType::String).filled(),
            KeyDecl::optional("login", ValueType::String).filled(),
            KeyDecl::optional("details", ValueType::Hash(details)),
        ])
        .unwrap()
    }

    #[test]
    fn valid_input_passes_and_strips_unknown_keys() {
        let result = user_schema().call(&json!({
            "email": "jane@doe.org",
            "login": "jane",
            "admin": true,
        }));
        assert!(result.is_success());
        assert_eq!(
            result.values(),
            &json!({"email": "jane@doe.org", "login": "jane"})
        );
    }

    #[test]
    fn missing_required_and_empty_filled_keys_fail() {
        let result = user_schema().call(&json!({"login": ""}));
        assert_eq!(
            result.errors().messages_at(&KeyPath::parse("email")),
            vec![message::MISSING]
        );
        assert_eq!(
            result.errors().messages_at(&KeyPath::parse("login")),
            vec![message::FILLED]
        );
    }

    #[test]
    fn null_hash_reports_type_message() {
        let result = user_schema().call(&json!({"email": "jane@doe.org", "details": null}));
        assert_eq!(
            result.errors().messages_at(&KeyPath::parse("details")),
            vec![message::HASH]
        );
    }

    #[test]
    fn nested_failures_are_keyed_by_full_path() {
        let result = user_schema().call(&json!({
            "email": "jane@doe.org",
            "details": {"address": {"street": 12}},
        }));
        assert_eq!(
            result
                .errors()
                .messages_at(&KeyPath::parse("details.address.street")),
            vec![message::STRING]
        );
        assert!(result.errors().error_at(&KeyPath::parse("details")));
    }

    #[test]
    fn maybe_accepts_null() {
        let schema =
            Schema::new(vec![KeyDecl::required("nick", ValueType::String).maybe()]).unwrap();
        assert!(schema.call(&json!({"nick": null})).is_success());
    }

    #[test]
    fn predicates_stop_at_first_failure() {
        let schema = Schema::new(vec![
            KeyDecl::required("code", ValueType::String)
                .min_size(3)
                .format("^[0-9]+$")
                .unwrap(),
            KeyDecl::required("tier", ValueType::String).included_in(["gold", "silver"]),
        ])
        .unwrap();
        let result = schema.call(&json!({"code": "a", "tier": "bronze"}));
        assert_eq!(
            result.errors().messages_at(&KeyPath::parse("code")),
            vec!["size cannot be less than 3"]
        );
        assert_eq!(
            result.errors().messages_at(&KeyPath::parse("tier")),
            vec!["must be one of: gold, silver"]
        );
    }

    #[test]
    fn array_elements_are_checked_by_index() {
        let schema = Schema::new(vec![KeyDecl::required(
            "tags",
            ValueType::array_of(ValueType::String),
        )])
        .unwrap();
        let result = schema.call(&json!({"tags": ["a", 1, "c"]}));
        assert_eq!(
            result.errors().messages_at(&KeyPath::parse("tags.1")),
            vec![message::STRING]
        );
    }

    #[test]
    fn non_object_input_is_a_base_failure() {
        let result = user_schema().call(&json!([1, 2]));
        assert_eq!(result.errors().base_messages(), vec![message::HASH]);
    }

    #[test]
    fn paths_list_parents_before_children() {
        let rendered: Vec<String> = user_schema().paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "email",
                "login",
                "details",
                "details.address",
                "details.address.street"
            ]
        );
    }

    #[test]
    fn declaration_errors() {
        assert!(matches!(
            Schema::new(vec![
                KeyDecl::required("a", ValueType::Any),
                KeyDecl::optional("a", ValueType::Any),
            ]),
            Err(SchemaError::DuplicateKey(name)) if name == "a"
        ));
        assert!(matches!(
            Schema::new(vec![KeyDecl::required("a.b", ValueType::Any)]),
            Err(SchemaError::InvalidKeyName(_))
        ));
        assert!(matches!(
            KeyDecl::required("a", ValueType::String).format("("),
            Err(SchemaError::InvalidFormat { .. })
        ));
    }
}
