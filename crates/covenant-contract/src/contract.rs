//! The composition root: a schema, a rule table, and an optional parent.

use crate::error::{BoxError, ContractError};
use crate::executor::RuleExecutor;
use crate::failures::{Failures, RuleContext};
use crate::key_spec::KeySpec;
use crate::rule::{Rule, RuleMode, RuleRegistry, rule_body};
use covenant_kernel::{ErrorTree, KeyPath, Message};
use covenant_schema::Validator;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;

/// A built contract. Cheap to clone and safe to share across threads; every
/// [`call`](Contract::call) works on its own result.
#[derive(Clone)]
pub struct Contract {
    name: String,
    validator: Arc<dyn Validator>,
    registry: Arc<RuleRegistry>,
}

impl Contract {
    /// Start declaring a contract over `schema`.
    pub fn builder(name: impl Into<String>, schema: impl Validator + 'static) -> ContractBuilder {
        let name = name.into();
        ContractBuilder {
            registry: RuleRegistry::new(name.clone()),
            name,
            validator: Arc::new(schema),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    /// Rules declared on this contract only.
    pub fn own_rules(&self) -> &[Rule] {
        self.registry.all()
    }

    /// Rules run by [`call`](Contract::call): ancestors first.
    pub fn rules(&self) -> Vec<&Rule> {
        self.registry.inherited_and_own()
    }

    /// Validate `input`: schema first, then every eligible rule.
    pub fn call(&self, input: &Value) -> Result<ContractResult, ContractError> {
        let schema_result = self.validator.validate(input);
        let errors = RuleExecutor::new(&schema_result).execute(self.rules())?;
        tracing::debug!(
            target: "covenant::rules",
            contract = %self.name,
            failures = errors.len(),
            "contract call finished"
        );
        let (values, _) = schema_result.into_parts();
        Ok(ContractResult { values, errors })
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("name", &self.name)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Declaration-time view of a contract.
///
/// Every rule method validates its keys against the schema bound at that
/// moment and fails immediately on unknown keys.
pub struct ContractBuilder {
    name: String,
    validator: Arc<dyn Validator>,
    registry: RuleRegistry,
}

impl ContractBuilder {
    /// Declare a contract extending `parent`: it starts with the parent's
    /// schema, and the parent's rules run before its own.
    pub fn inherit(name: impl Into<String>, parent: &Contract) -> Self {
        let name = name.into();
        Self {
            registry: RuleRegistry::inheriting(name.clone(), Arc::clone(&parent.registry)),
            name,
            validator: Arc::clone(&parent.validator),
        }
    }

    /// Replace the schema. Rules already resolved (inherited ones included)
    /// must still name declared keys; rules declared afterwards are checked
    /// against the new schema as usual.
    pub fn schema(mut self, schema: impl Validator + 'static) -> Result<Self, ContractError> {
        self.registry.check_against(&schema)?;
        self.validator = Arc::new(schema);
        Ok(self)
    }

    /// Declare a rule triggered by `keys`.
    pub fn rule<I, K, F>(self, keys: I, body: F) -> Result<Self, ContractError>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeySpec>,
        F: Fn(&RuleContext<'_>, &mut Failures) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.declare(keys, RuleMode::Single, rule_body(body))
    }

    /// Declare a rule run once per element of the array at `keys`.
    pub fn rule_each<I, K, F>(self, keys: I, body: F) -> Result<Self, ContractError>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeySpec>,
        F: Fn(&RuleContext<'_>, &mut Failures) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.declare(keys, RuleMode::Each, rule_body(body))
    }

    /// Declare an unconditional rule. `key()` inside it targets the base slot.
    pub fn base_rule<F>(mut self, body: F) -> Self
    where
        F: Fn(&RuleContext<'_>, &mut Failures) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.registry.register_unconditional(rule_body(body));
        self
    }

    /// Register a named rule body for this contract and its descendants.
    pub fn register_macro<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&RuleContext<'_>, &mut Failures) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.registry.register_macro(name, rule_body(body));
        self
    }

    /// Declare a rule whose body is the macro `name`.
    pub fn rule_macro<I, K>(self, keys: I, name: &str) -> Result<Self, ContractError>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeySpec>,
    {
        self.declare_macro(keys, RuleMode::Single, name)
    }

    /// Declare an each-rule whose body is the macro `name`.
    pub fn rule_each_macro<I, K>(self, keys: I, name: &str) -> Result<Self, ContractError>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeySpec>,
    {
        self.declare_macro(keys, RuleMode::Each, name)
    }

    fn declare_macro<I, K>(self, keys: I, mode: RuleMode, name: &str) -> Result<Self, ContractError>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeySpec>,
    {
        let body = self
            .registry
            .find_macro(name)
            .ok_or_else(|| ContractError::UnknownMacro {
                contract: self.name.clone(),
                name: name.to_string(),
            })?;
        self.declare(keys, mode, body)
    }

    fn declare<I, K>(
        mut self,
        keys: I,
        mode: RuleMode,
        body: crate::rule::RuleBody,
    ) -> Result<Self, ContractError>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeySpec>,
    {
        let specs = keys.into_iter().map(Into::into).collect();
        self.registry
            .register(self.validator.as_ref(), specs, mode, body)?;
        Ok(self)
    }

    /// Freeze the declarations.
    pub fn build(self) -> Contract {
        Contract {
            name: self.name,
            validator: self.validator,
            registry: Arc::new(self.registry),
        }
    }
}

impl fmt::Debug for ContractBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractBuilder")
            .field("name", &self.name)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Outcome of one [`Contract::call`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractResult {
    values: Value,
    errors: ErrorTree,
}

impl ContractResult {
    /// True iff neither phase recorded a failure.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn errors(&self) -> &ErrorTree {
        &self.errors
    }

    /// Validated values (declared keys only).
    pub fn values(&self) -> &Value {
        &self.values
    }

    pub fn value_at(&self, path: impl Into<KeyPath>) -> Option<&Value> {
        path.into().lookup(&self.values)
    }

    /// Any failure at `path` or below it.
    pub fn error_at(&self, path: impl Into<KeyPath>) -> bool {
        self.errors.error_at(&path.into())
    }

    /// A schema failure at `path` or below it.
    pub fn schema_error_at(&self, path: impl Into<KeyPath>) -> bool {
        let path = path.into();
        self.errors
            .filter(Message::is_schema)
            .any(|message| message.is_under(&path))
    }

    /// A rule failure at `path` or below it.
    pub fn rule_error_at(&self, path: impl Into<KeyPath>) -> bool {
        let path = path.into();
        self.errors
            .filter(Message::is_rule)
            .any(|message| message.is_under(&path))
    }

    /// Machine-readable summary: success flag, values, and errors.
    pub fn to_json(&self) -> Value {
        json!({
            "success": self.is_success(),
            "values": self.values,
            "errors": self.errors.to_json(),
        })
    }

    pub fn into_parts(self) -> (Value, ErrorTree) {
        (self.values, self.errors)
    }
}
