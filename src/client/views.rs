//! Which screen is showing, plus the persisted UI preferences and the banner.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::client::identity::SessionState;
use crate::client::kv::{KeyValueStore, ACTIVE_TAB_KEY, DARK_MODE_KEY};
use crate::client::profile::ProfileService;
use crate::client::ClientResult;
use crate::db::models::Profile;

pub const LOGIN_PATH: &str = "/login";
pub const SUCCESS_BANNER_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    Members,
    Education,
    Search,
    Profile,
    Settings,
    EditProfile,
    Login,
    Register,
    /// Reached from the tab bar only.
    Admin,
}

impl View {
    pub const ALL: [View; 10] = [
        View::Home,
        View::Members,
        View::Education,
        View::Search,
        View::Profile,
        View::Settings,
        View::EditProfile,
        View::Login,
        View::Register,
        View::Admin,
    ];

    pub fn path(&self) -> Option<&'static str> {
        match self {
            View::Home => Some("/"),
            View::Members => Some("/members"),
            View::Education => Some("/education"),
            View::Search => Some("/search"),
            View::Profile => Some("/profile"),
            View::Settings => Some("/settings"),
            View::EditProfile => Some("/edit-profile"),
            View::Login => Some("/login"),
            View::Register => Some("/register"),
            View::Admin => None,
        }
    }

    pub fn from_path(path: &str) -> Option<View> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        View::ALL.into_iter().find(|v| v.path() == Some(path))
    }

    pub fn tab(&self) -> &'static str {
        match self {
            View::Home => "home",
            View::Members => "members",
            View::Education => "education",
            View::Search => "search",
            View::Profile => "profile",
            View::Settings => "settings",
            View::EditProfile => "edit-profile",
            View::Login => "login",
            View::Register => "register",
            View::Admin => "admin",
        }
    }

    pub fn from_tab(tab: &str) -> Option<View> {
        View::ALL.into_iter().find(|v| v.tab() == tab)
    }

    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            View::Profile | View::Settings | View::EditProfile | View::Admin
        )
    }
}

/// What a view renders for the current session.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// The session check has not settled yet.
    Loading,
    /// `login_path` is offered to anonymous viewers only.
    AccessDenied { login_path: Option<&'static str> },
    Profile(Profile),
    Page(View),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Error(String),
    Success(String),
}

struct Inner {
    active: View,
    viewing_username: Option<String>,
    dark_mode: bool,
    banner: Option<(u64, Banner)>,
    banner_seq: u64,
}

pub struct ViewState {
    kv: Arc<dyn KeyValueStore>,
    success_ttl: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl ViewState {
    /// Restore the active tab and dark-mode flag from `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let active = kv
            .get(ACTIVE_TAB_KEY)
            .and_then(|tab| View::from_tab(&tab))
            .unwrap_or(View::Home);
        let dark_mode = kv.get(DARK_MODE_KEY).is_some_and(|v| v == "true");
        Self {
            kv,
            success_ttl: SUCCESS_BANNER_TTL,
            inner: Arc::new(Mutex::new(Inner {
                active,
                viewing_username: None,
                dark_mode,
                banner: None,
                banner_seq: 0,
            })),
        }
    }

    pub fn with_success_ttl(mut self, ttl: Duration) -> Self {
        self.success_ttl = ttl;
        self
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn active(&self) -> View {
        self.inner().active
    }

    pub fn set_active(&self, view: View) {
        let mut inner = self.inner();
        inner.active = view;
        if view != View::Profile {
            inner.viewing_username = None;
        }
        self.kv.set(ACTIVE_TAB_KEY, view.tab());
    }

    pub fn viewing_username(&self) -> Option<String> {
        self.inner().viewing_username.clone()
    }

    /// Switch to another member's profile.
    pub fn view_profile(&self, username: &str) {
        self.set_active(View::Profile);
        self.inner().viewing_username = Some(username.to_string());
    }

    pub fn dark_mode(&self) -> bool {
        self.inner().dark_mode
    }

    pub fn toggle_dark_mode(&self) -> bool {
        let mut inner = self.inner();
        inner.dark_mode = !inner.dark_mode;
        self.kv
            .set(DARK_MODE_KEY, if inner.dark_mode { "true" } else { "false" });
        inner.dark_mode
    }

    pub fn banner(&self) -> Option<Banner> {
        self.inner().banner.as_ref().map(|(_, b)| b.clone())
    }

    /// Errors stay until dismissed or replaced.
    pub fn show_error(&self, message: impl Into<String>) {
        self.show(Banner::Error(message.into()));
    }

    /// Success messages clear themselves. Needs a Tokio runtime.
    pub fn show_success(&self, message: impl Into<String>) {
        let seq = self.show(Banner::Success(message.into()));
        let inner = Arc::clone(&self.inner);
        let ttl = self.success_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.banner.as_ref().is_some_and(|(s, _)| *s == seq) {
                inner.banner = None;
            }
        });
    }

    pub fn dismiss(&self) {
        self.inner().banner = None;
    }

    fn show(&self, banner: Banner) -> u64 {
        let mut inner = self.inner();
        inner.banner_seq += 1;
        let seq = inner.banner_seq;
        inner.banner = Some((seq, banner));
        seq
    }

    /// Decide what `view` renders. Protected views fetch nothing for anonymous viewers.
    pub async fn open(
        &self,
        view: View,
        session: &SessionState,
        profiles: &ProfileService,
    ) -> ClientResult<Screen> {
        let viewer = match session {
            SessionState::Unknown | SessionState::Checking if view.requires_auth() => {
                return Ok(Screen::Loading)
            }
            SessionState::Anonymous if view.requires_auth() => {
                return Ok(Screen::AccessDenied {
                    login_path: Some(LOGIN_PATH),
                })
            }
            other => other.viewer(),
        };

        match view {
            View::Admin if !viewer.is_some_and(|v| v.is_admin) => {
                Ok(Screen::AccessDenied { login_path: None })
            }
            View::Profile => {
                let username = self.viewing_username();
                let profile = profiles.resolve(username.as_deref()).await?;
                Ok(Screen::Profile(profile))
            }
            View::EditProfile | View::Settings => {
                let profile = profiles.resolve(None).await?;
                Ok(Screen::Profile(profile))
            }
            other => Ok(Screen::Page(other)),
        }
    }
}
