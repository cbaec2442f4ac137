//! Second phase: run eligible rules against a schema result.
//!
//! A rule is eligible when every trigger path is present in the validated
//! values and no schema failure sits at the path, above it, or below it.
//! Each-rules only look at the array path and above; failing elements are
//! skipped one by one. Unconditional rules are always eligible. Eligible rules run strictly in
//! the order given, and whatever each one records is appended to a copy of
//! the schema's error tree.

use crate::error::ContractError;
use crate::failures::{DefaultKey, Failures, RuleContext};
use crate::rule::{Rule, RuleMode};
use covenant_kernel::{ErrorTree, KeyPath, Message};
use covenant_schema::SchemaResult;
use serde_json::Value;

/// Runs rules over one schema result.
#[derive(Debug, Clone, Copy)]
pub struct RuleExecutor<'a> {
    schema_result: &'a SchemaResult,
}

impl<'a> RuleExecutor<'a> {
    pub fn new(schema_result: &'a SchemaResult) -> Self {
        Self { schema_result }
    }

    /// Run `rules` in order and return the merged error tree.
    ///
    /// The first rule body that returns an error aborts execution.
    pub fn execute<'r, I>(&self, rules: I) -> Result<ErrorTree, ContractError>
    where
        I: IntoIterator<Item = &'r Rule>,
    {
        let mut errors = self.schema_result.errors().clone();
        for rule in rules {
            if !self.is_eligible(rule) {
                tracing::debug!(
                    target: "covenant::rules",
                    contract = rule.owner(),
                    order = rule.order(),
                    "rule skipped: trigger missing or failed schema validation"
                );
                continue;
            }
            let recorded = match rule.mode() {
                RuleMode::Single => self.run_single(rule)?,
                RuleMode::Each => self.run_each(rule)?,
            };
            tracing::debug!(
                target: "covenant::rules",
                contract = rule.owner(),
                order = rule.order(),
                failures = recorded.len(),
                "rule executed"
            );
            errors.extend(recorded);
        }
        Ok(errors)
    }

    /// Whether `rule` may run against this schema result.
    pub fn is_eligible(&self, rule: &Rule) -> bool {
        rule.paths().iter().all(|path| {
            let blocked = match rule.mode() {
                RuleMode::Single => self.schema_result.error_touches(path),
                RuleMode::Each => self.schema_result.error_at_or_above(path),
            };
            path.lookup(self.schema_result.values()).is_some() && !blocked
        })
    }

    fn run_single(&self, rule: &Rule) -> Result<Vec<Message>, ContractError> {
        let default_key = match rule.paths() {
            [] => DefaultKey::Base,
            [only] => DefaultKey::Path(only.clone()),
            _ => DefaultKey::Ambiguous,
        };
        let context = RuleContext::new(self.schema_result.values(), rule.paths());
        invoke(rule, &context, Failures::new(default_key))
    }

    fn run_each(&self, rule: &Rule) -> Result<Vec<Message>, ContractError> {
        let values = self.schema_result.values();
        let Some(array_path) = rule.paths().first() else {
            return Ok(Vec::new());
        };
        let Some(Value::Array(items)) = array_path.lookup(values) else {
            return Ok(Vec::new());
        };

        let mut recorded = Vec::new();
        for (idx, element) in items.iter().enumerate() {
            let element_path: KeyPath = array_path.child(idx);
            if self.schema_result.error_touches(&element_path) {
                continue;
            }
            let context = RuleContext::for_element(values, rule.paths(), &element_path, element);
            let failures = Failures::new(DefaultKey::Path(element_path.clone()));
            recorded.extend(invoke(rule, &context, failures)?);
        }
        Ok(recorded)
    }
}

fn invoke(
    rule: &Rule,
    context: &RuleContext<'_>,
    mut failures: Failures,
) -> Result<Vec<Message>, ContractError> {
    (rule.body())(context, &mut failures).map_err(|source| ContractError::RuleFailed {
        contract: rule.owner().to_string(),
        rule: rule.order(),
        source,
    })?;
    if failures.is_ambiguous() {
        return Err(ContractError::AmbiguousKey {
            contract: rule.owner().to_string(),
            rule: rule.order(),
            count: rule.paths().len(),
        });
    }
    let recorded = failures.into_messages();
    for message in &recorded {
        tracing::trace!(
            target: "covenant::rules",
            path = %message.path.as_ref().map(ToString::to_string).unwrap_or_default(),
            text = %message.text,
            "failure recorded"
        );
    }
    Ok(recorded)
}
