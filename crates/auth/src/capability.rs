//! Capability checks (pure policy functions).

use std::collections::HashSet;

use crate::Role;

/// Roles allowed to activate an out-of-stock item on a machine.
pub fn elevated_roles() -> [Role; 2] {
    [Role::new("manager"), Role::new("admin")]
}

/// Check whether a set of held roles satisfies a requirement.
///
/// The requirement is satisfied by holding **any** of the listed roles.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn has_capability(held: &HashSet<Role>, required: &[Role]) -> bool {
    required.iter().any(|role| held.contains(role))
}
