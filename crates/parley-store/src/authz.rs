//! Authorization predicates.
//!
//! Every check reads the live snapshot; nothing is cached between calls.

use crate::models::{Group, Role, Snapshot};

/// Name of the account created on first run. Only this account may create
/// other admins.
pub const BOOTSTRAP_USERNAME: &str = "mainadmin";

pub fn is_bootstrap(username: &str) -> bool {
    username == BOOTSTRAP_USERNAME
}

/// The account exists and holds the global admin role.
pub fn is_global_admin(snapshot: &Snapshot, username: &str) -> bool {
    snapshot
        .users
        .get(username)
        .map(|user| user.role == Role::Admin)
        .unwrap_or(false)
}

pub fn is_member(group: &Group, username: &str) -> bool {
    group.members.iter().any(|m| m == username)
}

pub fn is_group_admin(group: &Group, username: &str) -> bool {
    group.admins.iter().any(|a| a == username)
}
