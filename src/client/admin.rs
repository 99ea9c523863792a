//! Member management for admins.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::auth::privileged::{self, ChangePasswordRequest};
use crate::auth::{validate_password, IdentityProvider};
use crate::client::gate::{self, OWNER_ONLY_LABEL};
use crate::client::identity::{SessionState, Viewer};
use crate::client::{ClientError, ClientResult};
use crate::db::models::{Profile, Role};
use crate::db::repository::ProfileRepository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub enabled: bool,
    pub label: &'static str,
}

impl Control {
    fn gated(enabled: bool, label: &'static str) -> Self {
        Self {
            enabled,
            label: if enabled { label } else { OWNER_ONLY_LABEL },
        }
    }
}

/// Per-row controls in the member table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminControls {
    pub role: Control,
    pub admin_toggle: Control,
    pub password_reset: Control,
}

pub struct AdminPanel {
    profiles: Arc<dyn ProfileRepository>,
    identity: Arc<dyn IdentityProvider>,
    session: watch::Receiver<SessionState>,
    members: Mutex<Vec<Profile>>,
}

impl AdminPanel {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        identity: Arc<dyn IdentityProvider>,
        session: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            profiles,
            identity,
            session,
            members: Mutex::new(Vec::new()),
        }
    }

    fn viewer(&self) -> Option<Viewer> {
        self.session.borrow().viewer().cloned()
    }

    fn require_admin(&self) -> ClientResult<Viewer> {
        let viewer = self.viewer().ok_or(ClientError::NotAuthenticated)?;
        if !viewer.is_admin {
            return Err(ClientError::Forbidden("Admin access required".into()));
        }
        Ok(viewer)
    }

    /// Every member, ordered by username.
    pub async fn load(&self) -> ClientResult<Vec<Profile>> {
        self.require_admin()?;
        let members = self.profiles.list_all().await?;
        *self.members.lock().await = members.clone();
        Ok(members)
    }

    /// Loaded members whose username or email contains `query`.
    pub async fn filter(&self, query: &str) -> Vec<Profile> {
        let query = query.trim().to_lowercase();
        let members = self.members.lock().await;
        members
            .iter()
            .filter(|p| {
                query.is_empty()
                    || p.username.to_lowercase().contains(&query)
                    || p.email.to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }

    pub async fn update_role(&self, user_id: &str, role: Role) -> ClientResult<()> {
        let viewer = self.require_admin()?;
        if !gate::can_edit_roles(Some(&viewer)) {
            return Err(ClientError::Forbidden("Admin access required".into()));
        }
        self.profiles.set_role(user_id, role).await?;
        tracing::info!(admin = %viewer.id, user_id, %role, "Role updated");

        self.patch(user_id, |p| p.role = role).await;
        Ok(())
    }

    pub async fn set_admin(&self, user_id: &str, is_admin: bool) -> ClientResult<()> {
        let viewer = self.require_admin()?;
        if !gate::can_toggle_admin(Some(&viewer)) {
            return Err(ClientError::Forbidden(
                "Only the owner can modify admin permissions".into(),
            ));
        }
        self.profiles.set_admin(user_id, is_admin).await?;
        tracing::info!(admin = %viewer.id, user_id, is_admin, "Admin flag updated");

        self.patch(user_id, |p| p.is_admin = is_admin).await;
        Ok(())
    }

    /// Reset another member's password; the server re-checks owner rights.
    pub async fn change_password(&self, user_id: &str, new_password: &str) -> ClientResult<()> {
        validate_password(new_password)?;
        let viewer = self.require_admin()?;

        privileged::change_user_password(
            self.identity.as_ref(),
            self.profiles.as_ref(),
            Some(&viewer.access_token),
            &ChangePasswordRequest {
                user_id: Some(user_id.to_string()),
                new_password: Some(new_password.to_string()),
            },
        )
        .await?;
        Ok(())
    }

    /// The owner's own admin flag is never toggleable.
    pub fn controls_for(&self, member: &Profile) -> AdminControls {
        let viewer = self.viewer();
        let viewer = viewer.as_ref();
        let admin_toggle = if gate::is_owner_username(&member.username) {
            Control {
                enabled: false,
                label: "Owner",
            }
        } else {
            Control::gated(gate::can_toggle_admin(viewer), "Admin")
        };
        AdminControls {
            role: Control {
                enabled: gate::can_edit_roles(viewer),
                label: "Role",
            },
            admin_toggle,
            password_reset: Control::gated(gate::can_reset_passwords(viewer), "Change Password"),
        }
    }

    async fn patch(&self, user_id: &str, apply: impl FnOnce(&mut Profile)) {
        let mut members = self.members.lock().await;
        if let Some(member) = members.iter_mut().find(|p| p.id == user_id) {
            apply(member);
        }
    }
}
