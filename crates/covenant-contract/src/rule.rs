//! Rule declarations and the per-contract registry.
//!
//! A registry is filled while a contract is being built and is frozen
//! behind an `Arc` afterwards. Descendant contracts hold their parent's
//! registry, so resolving the rules for a call is a walk up that chain.

use crate::error::{BoxError, ContractError};
use crate::failures::{Failures, RuleContext};
use crate::key_spec::{KeySpec, render_list};
use covenant_kernel::KeyPath;
use covenant_schema::Validator;
use std::fmt;
use std::sync::Arc;

/// A rule body: reads values through the context, records failures through
/// the handle. Returning `Err` aborts the whole call.
pub type RuleBody =
    Arc<dyn Fn(&RuleContext<'_>, &mut Failures) -> Result<(), BoxError> + Send + Sync>;

/// Wrap a closure as a [`RuleBody`].
pub fn rule_body<F>(body: F) -> RuleBody
where
    F: Fn(&RuleContext<'_>, &mut Failures) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// How a rule applies to its trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMode {
    /// Run once.
    Single,
    /// Run once per element of the (single) array trigger.
    Each,
}

/// One declared rule. Immutable once registered.
#[derive(Clone)]
pub struct Rule {
    owner: Arc<str>,
    order: usize,
    specs: Vec<KeySpec>,
    paths: Vec<KeyPath>,
    mode: RuleMode,
    body: RuleBody,
}

impl Rule {
    /// Name of the contract that declared this rule.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Declaration index within the owning contract.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Keys as the caller wrote them.
    pub fn specs(&self) -> &[KeySpec] {
        &self.specs
    }

    /// Normalized trigger paths. Empty for unconditional rules.
    pub fn paths(&self) -> &[KeyPath] {
        &self.paths
    }

    pub fn mode(&self) -> RuleMode {
        self.mode
    }

    pub fn is_unconditional(&self) -> bool {
        self.paths.is_empty()
    }

    pub(crate) fn body(&self) -> &RuleBody {
        &self.body
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("owner", &self.owner)
            .field("order", &self.order)
            .field("specs", &self.specs)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Ordered rule table of one contract, plus its named macros.
#[derive(Clone)]
pub struct RuleRegistry {
    contract: Arc<str>,
    parent: Option<Arc<RuleRegistry>>,
    rules: Vec<Rule>,
    macros: Vec<(String, RuleBody)>,
}

impl RuleRegistry {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: Arc::from(contract.into()),
            parent: None,
            rules: Vec::new(),
            macros: Vec::new(),
        }
    }

    /// A registry whose resolved rules start with everything `parent` resolves.
    pub fn inheriting(contract: impl Into<String>, parent: Arc<RuleRegistry>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new(contract)
        }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Declare a rule.
    ///
    /// Every spec must normalize to paths the validator declares; otherwise
    /// nothing is registered and the offending specs are reported in the
    /// caller's shape.
    pub fn register(
        &mut self,
        validator: &dyn Validator,
        specs: Vec<KeySpec>,
        mode: RuleMode,
        body: RuleBody,
    ) -> Result<&Rule, ContractError> {
        let mut invalid: Vec<KeySpec> = Vec::new();
        for spec in &specs {
            let known = spec.paths().iter().all(|path| validator.declares(path));
            if !known && !invalid.contains(spec) {
                invalid.push(spec.clone());
            }
        }
        if !invalid.is_empty() {
            return Err(ContractError::InvalidKeys {
                contract: self.contract.to_string(),
                keys: render_list(&invalid),
            });
        }

        let mut paths: Vec<KeyPath> = Vec::new();
        for path in specs.iter().flat_map(KeySpec::paths) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        if mode == RuleMode::Each && paths.len() != 1 {
            return Err(ContractError::EachArity {
                contract: self.contract.to_string(),
                count: paths.len(),
            });
        }

        Ok(self.push(specs, paths, mode, body))
    }

    /// Declare a rule without keys. It always runs and cannot fail to register.
    pub fn register_unconditional(&mut self, body: RuleBody) -> &Rule {
        self.push(Vec::new(), Vec::new(), RuleMode::Single, body)
    }

    fn push(
        &mut self,
        specs: Vec<KeySpec>,
        paths: Vec<KeyPath>,
        mode: RuleMode,
        body: RuleBody,
    ) -> &Rule {
        let order = self.rules.len();
        tracing::debug!(
            target: "covenant::rules",
            contract = %self.contract,
            order,
            keys = %render_list(&specs),
            "rule registered"
        );
        self.rules.push(Rule {
            owner: Arc::clone(&self.contract),
            order,
            specs,
            paths,
            mode,
            body,
        });
        &self.rules[order]
    }

    /// Re-check every resolved rule (inherited ones included) against a
    /// replacement validator. Offending specs are reported in caller shape.
    pub fn check_against(&self, validator: &dyn Validator) -> Result<(), ContractError> {
        let mut invalid: Vec<KeySpec> = Vec::new();
        for spec in self.inherited_and_own().into_iter().flat_map(Rule::specs) {
            let known = spec.paths().iter().all(|path| validator.declares(path));
            if !known && !invalid.contains(spec) {
                invalid.push(spec.clone());
            }
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ContractError::InvalidKeys {
                contract: self.contract.to_string(),
                keys: render_list(&invalid),
            })
        }
    }

    /// Register a named body for reuse by this contract and its descendants.
    /// A later registration under the same name shadows earlier ones.
    pub fn register_macro(&mut self, name: impl Into<String>, body: RuleBody) {
        self.macros.push((name.into(), body));
    }

    /// Look a macro up here first, then along the ancestor chain.
    pub fn find_macro(&self, name: &str) -> Option<RuleBody> {
        self.macros
            .iter()
            .rev()
            .find(|(registered, _)| registered == name)
            .map(|(_, body)| Arc::clone(body))
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.find_macro(name)))
    }

    /// Own rules in declaration order.
    pub fn all(&self) -> &[Rule] {
        &self.rules
    }

    /// Ancestor rules (oldest ancestor first), then own rules.
    pub fn inherited_and_own(&self) -> Vec<&Rule> {
        let mut out = match &self.parent {
            Some(parent) => parent.inherited_and_own(),
            None => Vec::new(),
        };
        out.extend(self.rules.iter());
        out
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("contract", &self.contract)
            .field("parent", &self.parent.as_ref().map(|p| p.contract()))
            .field("rules", &self.rules)
            .field(
                "macros",
                &self.macros.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
