//! # covenant-schema
//!
//! The structural phase of a contract.
//!
//! This crate provides:
//! - `Schema` / `KeyDecl` / `ValueType`: a small declarative key schema
//! - `SchemaResult`: validated values plus a path-keyed `ErrorTree`
//! - `Validator`: the seam a contract uses, so other schema engines can
//!   stand in for the reference one
//!
//! Type coercion and a full predicate library are intentionally out of
//! scope; the schema exists to feed the rule phase.

pub mod error;
pub mod result;
pub mod schema;

pub use error::SchemaError;
pub use result::{SchemaResult, Validator};
pub use schema::{KeyDecl, Predicate, Schema, ValueType, message};
