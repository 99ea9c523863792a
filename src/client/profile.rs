//! Profile viewing, editing, avatar upload, member search and account settings.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::privileged::{self, UpdateEmailRequest};
use crate::auth::{validate_password, IdentityProvider, UserUpdate};
use crate::client::feed::{check_upload_size, MediaUpload};
use crate::client::identity::{SessionState, Viewer};
use crate::client::views::ViewState;
use crate::client::{ClientError, ClientResult};
use crate::db::models::{Profile, ProfileEdit};
use crate::db::repository::ProfileRepository;
use crate::storage::{extension_of, Bucket, ObjectStore};

pub const SEARCH_LIMIT: usize = 20;

/// One member search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub profile: Profile,
}

impl SearchResult {
    pub const ACTION_LABEL: &'static str = "View Profile";

    /// Open this member's profile.
    pub fn view_profile(&self, views: &ViewState) {
        views.view_profile(&self.profile.username);
    }
}

pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
    identity: Arc<dyn IdentityProvider>,
    media: Arc<dyn ObjectStore>,
    session: watch::Receiver<SessionState>,
}

impl ProfileService {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        identity: Arc<dyn IdentityProvider>,
        media: Arc<dyn ObjectStore>,
        session: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            profiles,
            identity,
            media,
            session,
        }
    }

    fn viewer(&self) -> ClientResult<Viewer> {
        self.session
            .borrow()
            .viewer()
            .cloned()
            .ok_or(ClientError::NotAuthenticated)
    }

    /// The viewer's own profile, or another member's by username.
    pub async fn resolve(&self, viewing_username: Option<&str>) -> ClientResult<Profile> {
        let viewer = self.viewer()?;
        let profile = match viewing_username.map(str::trim).filter(|u| !u.is_empty()) {
            Some(username) => self.profiles.find_by_username(username).await?,
            None => self.profiles.get(&viewer.id).await?,
        };
        profile.ok_or(ClientError::UserNotFound)
    }

    pub async fn save_details(&self, edit: &ProfileEdit) -> ClientResult<Profile> {
        let viewer = self.viewer()?;
        self.profiles.update_details(&viewer.id, edit).await?;
        self.resolve(None).await
    }

    /// Replace the viewer's avatar and return its public URL.
    pub async fn upload_avatar(&self, upload: MediaUpload) -> ClientResult<String> {
        let viewer = self.viewer()?;
        check_upload_size(self.media.as_ref(), upload.data.len())?;

        let path = format!("{}/avatar.{}", viewer.id, extension_of(&upload.file_name));
        self.media
            .upload(Bucket::Avatars, &path, upload.data, true)
            .await?;
        let url = self.media.public_url(Bucket::Avatars, &path);
        self.profiles.set_avatar(&viewer.id, &url).await?;
        Ok(url)
    }

    /// Members whose username contains `query`, ignoring case.
    pub async fn search(&self, query: &str) -> ClientResult<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let profiles = self.profiles.search(query, SEARCH_LIMIT).await?;
        Ok(profiles
            .into_iter()
            .map(|profile| SearchResult { profile })
            .collect())
    }

    pub async fn change_password(&self, new_password: &str, confirm: &str) -> ClientResult<()> {
        if new_password != confirm {
            return Err(ClientError::Validation("Passwords do not match".into()));
        }
        validate_password(new_password)?;
        let viewer = self.viewer()?;

        self.identity
            .update_user(
                &viewer.access_token,
                &UserUpdate {
                    password: Some(new_password.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Change the sign-in email through the server route, which also updates the profile.
    pub async fn change_email(&self, new_email: &str) -> ClientResult<()> {
        let viewer = self.viewer()?;
        privileged::update_own_email(
            self.identity.as_ref(),
            self.profiles.as_ref(),
            Some(&viewer.access_token),
            &UpdateEmailRequest {
                new_email: Some(new_email.trim().to_string()),
            },
        )
        .await?;
        Ok(())
    }
}
