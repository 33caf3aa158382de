//! `clawdeck-auth` — pure authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it answers
//! yes/no capability questions against an already-resolved actor and never
//! performs IO.

pub mod actor;
pub mod capability;
pub mod roles;

pub use actor::Actor;
pub use capability::{elevated_roles, has_capability};
pub use roles::Role;
