//! Permission predicates over the signed-in viewer.

use crate::client::identity::Viewer;

/// The single account allowed to grant admin rights and reset passwords.
pub const OWNER_USERNAME: &str = "kowse";

pub fn is_owner_username(username: &str) -> bool {
    username.to_lowercase() == OWNER_USERNAME
}

pub fn is_admin(viewer: Option<&Viewer>) -> bool {
    viewer.is_some_and(|v| v.is_admin)
}

pub fn is_owner(viewer: Option<&Viewer>) -> bool {
    viewer.is_some_and(|v| is_owner_username(&v.username))
}

/// Any admin may move accounts between `user`, `member` and `head`.
pub fn can_edit_roles(viewer: Option<&Viewer>) -> bool {
    is_admin(viewer)
}

pub fn can_toggle_admin(viewer: Option<&Viewer>) -> bool {
    is_admin(viewer) && is_owner(viewer)
}

pub fn can_reset_passwords(viewer: Option<&Viewer>) -> bool {
    is_admin(viewer) && is_owner(viewer)
}

/// Label shown on a disabled owner-only control.
pub const OWNER_ONLY_LABEL: &str = "Only the owner can change this";
