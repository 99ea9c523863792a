//! Who is signed in, resolved from the persisted session token.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::auth::{resolve_login_email, validate_password, AuthError, IdentityProvider};
use crate::client::kv::{KeyValueStore, SESSION_KEY};
use crate::client::{ClientError, ClientResult};
use crate::db::repository::ProfileRepository;

/// The signed-in user as the rest of the client sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Checking,
    Authenticated(Viewer),
    Anonymous,
}

impl SessionState {
    pub fn viewer(&self) -> Option<&Viewer> {
        match self {
            SessionState::Authenticated(viewer) => Some(viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    /// Checks that need no round trip.
    pub fn validate(&self) -> ClientResult<()> {
        if self.password != self.confirm_password {
            return Err(ClientError::Validation("Passwords do not match".into()));
        }
        if self.username.trim().is_empty() {
            return Err(ClientError::Validation("Username is required".into()));
        }
        validate_password(&self.password)?;
        Ok(())
    }
}

pub struct IdentityCache {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    kv: Arc<dyn KeyValueStore>,
    check_timeout: Duration,
    state: watch::Sender<SessionState>,
}

impl IdentityCache {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
        kv: Arc<dyn KeyValueStore>,
        check_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            identity,
            profiles,
            kv,
            check_timeout,
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn viewer(&self) -> Option<Viewer> {
        self.state.borrow().viewer().cloned()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn check_timeout(&self) -> Duration {
        self.check_timeout
    }

    /// Initial check. A check that outlives the timeout settles as anonymous.
    pub async fn mount(&self) -> SessionState {
        self.state.send_replace(SessionState::Checking);
        match tokio::time::timeout(self.check_timeout, self.check()).await {
            Ok(state) => state,
            Err(_) => {
                tracing::warn!(timeout = ?self.check_timeout, "Auth check timed out");
                self.settle(SessionState::Anonymous)
            }
        }
    }

    /// Resolve the persisted token to a viewer.
    pub async fn check(&self) -> SessionState {
        let resolved = match self.kv.get(SESSION_KEY) {
            Some(token) => self.resolve(token).await,
            None => None,
        };
        match resolved {
            Some(viewer) => self.settle(SessionState::Authenticated(viewer)),
            None => self.settle(SessionState::Anonymous),
        }
    }

    async fn resolve(&self, token: String) -> Option<Viewer> {
        let user = match self.identity.get_user(&token).await {
            Ok(user) => user,
            Err(AuthError::InvalidToken) => {
                tracing::debug!("Stored session rejected");
                self.kv.remove(SESSION_KEY);
                return None;
            }
            Err(e) => {
                tracing::error!("Session lookup failed: {}", e);
                return None;
            }
        };

        let profile = match self.profiles.get(&user.id).await {
            Ok(profile) => profile?,
            Err(e) => {
                tracing::error!(user_id = %user.id, "Profile lookup failed: {}", e);
                return None;
            }
        };
        if profile.username.trim().is_empty() {
            return None;
        }

        Some(Viewer {
            id: user.id,
            username: profile.username,
            is_admin: profile.is_admin,
            access_token: token,
        })
    }

    fn settle(&self, next: SessionState) -> SessionState {
        self.state.send_replace(next.clone());
        next
    }

    /// Re-check on every provider auth event until the provider goes away.
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let mut events = BroadcastStream::new(self.identity.subscribe());
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = &event {
                    tracing::debug!("Auth events lagged: {}", e);
                }
                cache.check().await;
            }
        })
    }

    /// Sign in by email or username and persist the session.
    pub async fn sign_in(&self, identifier: &str, password: &str) -> ClientResult<Viewer> {
        let email = resolve_login_email(self.profiles.as_ref(), identifier).await?;
        let session = self.identity.sign_in(&email, password).await?;
        self.kv.set(SESSION_KEY, &session.access_token);
        self.check().await.viewer().cloned().ok_or_else(|| {
            ClientError::Auth(AuthError::UserNotFound("Profile not found".into()))
        })
    }

    pub async fn register(&self, form: &RegisterForm) -> ClientResult<Viewer> {
        form.validate()?;
        let session = self
            .identity
            .sign_up(&form.email, &form.password, form.username.trim())
            .await?;
        self.kv.set(SESSION_KEY, &session.access_token);
        self.check().await.viewer().cloned().ok_or_else(|| {
            ClientError::Auth(AuthError::UserNotFound("Profile not found".into()))
        })
    }

    /// Drop the session locally and remotely. Dependent caches are reset by the caller.
    pub async fn sign_out(&self) {
        if let Some(token) = self.kv.get(SESSION_KEY) {
            if let Err(e) = self.identity.sign_out(&token).await {
                tracing::debug!("Remote sign-out failed: {}", e);
            }
        }
        self.kv.remove(SESSION_KEY);
        self.settle(SessionState::Anonymous);
    }
}
