//! Account-domain identifiers and resolved service-account identities.

pub mod id;
pub mod identity;

pub use id::*;
pub use identity::*;
