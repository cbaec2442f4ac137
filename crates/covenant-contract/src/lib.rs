//! # covenant-contract
//!
//! Two-phase validation. A [`Contract`] first hands the input to its schema
//! validator, then runs its domain rules, in declaration order, against the
//! keys that passed. Rule failures are appended to the schema's error tree.
//!
//! ```text
//! Contract::call(input)
//!     │
//! Validator::validate     ← phase one: structure and types
//!     │  SchemaResult
//! RuleExecutor            ← phase two: eligible rules, ancestors first
//!     │  ErrorTree
//! ContractResult
//! ```
//!
//! ```
//! use covenant_contract::Contract;
//! use covenant_schema::{KeyDecl, Schema, ValueType};
//! use serde_json::json;
//!
//! let schema = Schema::new(vec![
//!     KeyDecl::required("email", ValueType::String).filled(),
//!     KeyDecl::optional("login", ValueType::String).filled(),
//! ])?;
//! let contract = Contract::builder("NewUserContract", schema)
//!     .rule(["login"], |ctx, failures| {
//!         if ctx.str_value().is_some_and(|login| login.len() < 3) {
//!             failures.failure("is too short");
//!         }
//!         Ok(())
//!     })?
//!     .build();
//!
//! let result = contract.call(&json!({"email": "jane@doe.org", "login": "ab"}))?;
//! assert!(result.is_failure());
//! assert_eq!(result.errors().messages_at(&"login".into()), vec!["is too short"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod contract;
pub mod error;
pub mod executor;
pub mod failures;
pub mod key_spec;
pub mod rule;

pub use contract::{Contract, ContractBuilder, ContractResult};
pub use error::{BoxError, ContractError};
pub use executor::RuleExecutor;
pub use failures::{Failures, KeyFailure, RuleContext};
pub use key_spec::KeySpec;
pub use rule::{Rule, RuleBody, RuleMode, RuleRegistry, rule_body};
