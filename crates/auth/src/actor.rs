use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use clawdeck_core::ActorId;

use crate::Role;

/// A fully resolved actor for authorization decisions.
///
/// Construction of this object is intentionally decoupled from storage and
/// transport: callers derive it from their session/claims layer and hand it
/// to the engine per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub display_name: String,
    pub roles: HashSet<Role>,
}

impl Actor {
    pub fn new(id: ActorId, display_name: impl Into<String>, roles: HashSet<Role>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            roles,
        }
    }
}
