// Identity provider - sign-up/sign-in, sessions and account mutation
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::auth::session;
use crate::auth::{validate_password, AuthError};
use crate::state::DbPool;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

/// Broadcast to every subscriber whenever auth state changes anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: String },
    SignedOut { user_id: String },
    UserUpdated { user_id: String },
    AllSignedOut,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the identity and its profile row together.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<AuthSession, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError>;

    /// Self-service update for the token's owner.
    async fn update_user(
        &self,
        access_token: &str,
        update: &UserUpdate,
    ) -> Result<AuthUser, AuthError>;

    /// Privileged update of any account. Callers must authorise first.
    async fn admin_update_user_by_id(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<AuthUser, AuthError>;

    async fn sign_out_all(&self) -> Result<u64, AuthError>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

pub struct SqliteIdentityProvider {
    pool: DbPool,
    session_hours: u64,
    hash_cost: u32,
    events: broadcast::Sender<AuthEvent>,
}

impl SqliteIdentityProvider {
    pub fn new(pool: DbPool, session_hours: u64) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            pool,
            session_hours,
            hash_cost: bcrypt::DEFAULT_COST,
            events,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    fn publish(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn start_session(&self, user: AuthUser) -> Result<AuthSession, AuthError> {
        let (access_token, expires_at) =
            session::create_session(&self.pool, &user.id, self.session_hours)?;
        self.publish(AuthEvent::SignedIn {
            user_id: user.id.clone(),
        });
        Ok(AuthSession {
            access_token,
            expires_at,
            user,
        })
    }

    fn load_user(&self, user_id: &str) -> Result<Option<AuthUser>, AuthError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                "SELECT id, email FROM auth_users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(AuthUser {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn apply_update(&self, user_id: &str, update: &UserUpdate) -> Result<AuthUser, AuthError> {
        if let Some(password) = &update.password {
            validate_password(password)?;
        }

        let conn = self.pool.get()?;

        if let Some(email) = &update.email {
            let email = email.trim();
            if email.is_empty() {
                return Err(AuthError::MissingField("Email"));
            }
            let taken: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM auth_users WHERE email = ?1 AND id != ?2",
                params![email, user_id],
                |row| row.get(0),
            )?;
            if taken {
                return Err(AuthError::EmailTaken);
            }
            conn.execute(
                "UPDATE auth_users SET email = ?1 WHERE id = ?2",
                params![email, user_id],
            )?;
        }

        if let Some(password) = &update.password {
            let hash = bcrypt::hash(password, self.hash_cost)?;
            conn.execute(
                "UPDATE auth_users SET password_hash = ?1 WHERE id = ?2",
                params![hash, user_id],
            )?;
        }
        drop(conn);

        let user = self
            .load_user(user_id)?
            .ok_or_else(|| AuthError::UserNotFound("User not found".into()))?;
        self.publish(AuthEvent::UserUpdated {
            user_id: user.id.clone(),
        });
        Ok(user)
    }
}

#[async_trait]
impl IdentityProvider for SqliteIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<AuthSession, AuthError> {
        let email = email.trim();
        let username = username.trim();
        if email.is_empty() {
            return Err(AuthError::MissingField("Email"));
        }
        if username.is_empty() {
            return Err(AuthError::MissingField("Username"));
        }
        validate_password(password)?;

        let password_hash = bcrypt::hash(password, self.hash_cost)?;
        let user_id = uuid::Uuid::now_v7().to_string();
        let now = Utc::now();

        {
            let mut conn = self.pool.get()?;
            let tx = conn.transaction()?;

            let email_taken: bool = tx.query_row(
                "SELECT COUNT(*) > 0 FROM auth_users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )?;
            if email_taken {
                return Err(AuthError::EmailTaken);
            }
            let username_taken: bool = tx.query_row(
                "SELECT COUNT(*) > 0 FROM profiles WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )?;
            if username_taken {
                return Err(AuthError::UsernameTaken);
            }

            tx.execute(
                "INSERT INTO auth_users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, email, password_hash, now],
            )?;
            tx.execute(
                "INSERT INTO profiles (id, username, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, username, email, now],
            )?;
            tx.commit()?;
        }

        tracing::info!(user_id = %user_id, username = %username, "Registered new account");
        self.start_session(AuthUser {
            id: user_id,
            email: email.to_string(),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let row: Option<(String, String, String)> = {
            let conn = self.pool.get()?;
            conn.query_row(
                "SELECT id, email, password_hash FROM auth_users WHERE email = ?1",
                params![email.trim()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
        };

        let (id, email, password_hash) = row.ok_or(AuthError::InvalidCredentials)?;
        if !bcrypt::verify(password, &password_hash).unwrap_or(false) {
            tracing::warn!(user_id = %id, "Rejected sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.start_session(AuthUser { id, email })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        if let Some(user_id) = session::delete_session(&self.pool, access_token)? {
            self.publish(AuthEvent::SignedOut { user_id });
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let user_id =
            session::session_user(&self.pool, access_token)?.ok_or(AuthError::InvalidToken)?;
        self.load_user(&user_id)?.ok_or(AuthError::InvalidToken)
    }

    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError> {
        let conn = self.pool.get()?;
        let hash: Option<String> = conn
            .query_row(
                "SELECT password_hash FROM auth_users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(hash
            .map(|hash| bcrypt::verify(password, &hash).unwrap_or(false))
            .unwrap_or(false))
    }

    async fn update_user(
        &self,
        access_token: &str,
        update: &UserUpdate,
    ) -> Result<AuthUser, AuthError> {
        let user = self.get_user(access_token).await?;
        self.apply_update(&user.id, update)
    }

    async fn admin_update_user_by_id(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<AuthUser, AuthError> {
        if self.load_user(user_id)?.is_none() {
            return Err(AuthError::UserNotFound("User not found".into()));
        }
        tracing::info!(user_id = %user_id, "Privileged account update");
        self.apply_update(user_id, update)
    }

    async fn sign_out_all(&self) -> Result<u64, AuthError> {
        let removed = session::delete_all_sessions(&self.pool)?;
        tracing::info!(sessions = removed, "Signed out all users");
        self.publish(AuthEvent::AllSignedOut);
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
