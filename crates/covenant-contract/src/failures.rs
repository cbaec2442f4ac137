//! What a rule body sees: read access to validated values and a handle for
//! recording failures.

use covenant_kernel::{KeyPath, Message};
use serde_json::Value;

/// Read-only view handed to a rule body.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    values: &'a Value,
    keys: &'a [KeyPath],
    element: Option<(&'a KeyPath, &'a Value)>,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(values: &'a Value, keys: &'a [KeyPath]) -> Self {
        Self {
            values,
            keys,
            element: None,
        }
    }

    pub(crate) fn for_element(
        values: &'a Value,
        keys: &'a [KeyPath],
        path: &'a KeyPath,
        element: &'a Value,
    ) -> Self {
        Self {
            values,
            keys,
            element: Some((path, element)),
        }
    }

    /// The whole validated value tree.
    pub fn values(&self) -> &'a Value {
        self.values
    }

    /// Trigger paths of the running rule.
    pub fn keys(&self) -> &'a [KeyPath] {
        self.keys
    }

    /// Path `key()` resolves to: the current element for each-rules, the
    /// single trigger otherwise.
    pub fn key_path(&self) -> Option<&'a KeyPath> {
        match self.element {
            Some((path, _)) => Some(path),
            None => match self.keys {
                [only] => Some(only),
                _ => None,
            },
        }
    }

    /// Value at [`key_path`](Self::key_path).
    pub fn value(&self) -> Option<&'a Value> {
        match self.element {
            Some((_, element)) => Some(element),
            None => self.key_path().and_then(|path| path.lookup(self.values)),
        }
    }

    /// Value at an arbitrary path.
    pub fn value_at(&self, path: impl Into<KeyPath>) -> Option<&'a Value> {
        path.into().lookup(self.values)
    }

    /// String value at [`key_path`](Self::key_path), if it is one.
    pub fn str_value(&self) -> Option<&'a str> {
        self.value().and_then(Value::as_str)
    }

    /// Whether the input carried `path` (null counts as present).
    pub fn key_present(&self, path: impl Into<KeyPath>) -> bool {
        self.value_at(path).is_some()
    }
}

#[derive(Debug, Clone)]
pub(crate) enum DefaultKey {
    Base,
    Path(KeyPath),
    Ambiguous,
}

/// Failure-recording handle passed to every rule body.
///
/// ```
/// # use covenant_contract::Failures;
/// # fn body(failures: &mut Failures) {
/// failures.key().failure("is too short");
/// failures.key_at("details.address").failure("is incomplete");
/// failures.base().failure("this whole thing is invalid");
/// # }
/// ```
#[derive(Debug)]
pub struct Failures {
    default_key: DefaultKey,
    recorded: Vec<Message>,
    ambiguous: bool,
}

impl Failures {
    pub(crate) fn new(default_key: DefaultKey) -> Self {
        Self {
            default_key,
            recorded: Vec::new(),
            ambiguous: false,
        }
    }

    /// Target the rule's own key. For a rule without keys this is the base
    /// slot; for a rule with several keys it is an error reported after the
    /// body returns.
    pub fn key(&mut self) -> KeyFailure<'_> {
        let target = match &self.default_key {
            DefaultKey::Base => Target::Path(None),
            DefaultKey::Path(path) => Target::Path(Some(path.clone())),
            DefaultKey::Ambiguous => Target::Ambiguous,
        };
        KeyFailure {
            failures: self,
            target,
        }
    }

    /// Target any path. The path is not checked against the schema.
    pub fn key_at(&mut self, path: impl Into<KeyPath>) -> KeyFailure<'_> {
        KeyFailure {
            target: Target::Path(Some(path.into())),
            failures: self,
        }
    }

    /// Target the whole input.
    pub fn base(&mut self) -> KeyFailure<'_> {
        KeyFailure {
            failures: self,
            target: Target::Path(None),
        }
    }

    /// Shorthand for `key().failure(text)`.
    pub fn failure(&mut self, text: impl Into<String>) {
        self.key().failure(text);
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }

    pub(crate) fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    pub(crate) fn into_messages(self) -> Vec<Message> {
        self.recorded
    }
}

#[derive(Debug)]
enum Target {
    Path(Option<KeyPath>),
    Ambiguous,
}

/// A failure target chosen through [`Failures`].
#[must_use = "call `.failure(..)` to record a message"]
#[derive(Debug)]
pub struct KeyFailure<'a> {
    failures: &'a mut Failures,
    target: Target,
}

impl KeyFailure<'_> {
    pub fn failure(self, text: impl Into<String>) {
        match self.target {
            Target::Path(path) => self.failures.recorded.push(Message::rule(path, text)),
            Target::Ambiguous => self.failures.ambiguous = true,
        }
    }
}
