//! Role and resource authorization

pub mod engine;
pub mod policy;

pub use engine::AuthorizationEngine;
pub use policy::{Action, Relation, ADMIN_ONLY, ANY_ROLE};
