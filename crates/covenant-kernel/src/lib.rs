//! # Covenant Kernel
//!
//! Shared vocabulary for two-phase contract validation: where a failure
//! lives ([`KeyPath`]) and how failures from every phase accumulate
//! ([`ErrorTree`]).
//!
//! ## Architecture
//!
//! ```text
//! KeyPath / Segment     ← locations inside the nested input
//!     │
//! Message               ← one failure: path-or-base, text, source phase
//!     │
//! ErrorTree             ← append-only message set, nested `to_h` view
//! ```
//!
//! The schema collaborator (`covenant-schema`) and the rule engine
//! (`covenant-contract`) both write into the same [`ErrorTree`].

pub mod error_tree;
pub mod key_path;

pub use error_tree::{ErrorHash, ErrorKey, ErrorTree, Message, MessageSource};
pub use key_path::{KeyPath, Segment};
