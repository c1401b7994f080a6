//! Actor identity: mapping source-tool accounts to canonical actors
//!
//! [`IdentityResolver`] runs on the event path and only ever appends mappings.
//! [`IdentityAdmin`] is the administrative write path (merge, split, profile recompute).

pub mod admin;
pub mod resolver;

pub use admin::IdentityAdmin;
pub use resolver::{IdentityRequest, IdentityResolver, Resolution};
