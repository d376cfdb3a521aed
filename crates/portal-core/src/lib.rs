//! portal-core: Domain types and rules for the REC Cup registration portal
//!
//! Everything in this crate is pure: the fee table, roster caps, team
//! composition bookkeeping, and draft validation. Network and UI concerns
//! live in the `portal` crate.

pub mod errors;
pub mod roster;
pub mod rules;
pub mod types;
pub mod validation;

pub use errors::*;
pub use roster::*;
pub use rules::*;
pub use types::*;
pub use validation::*;
