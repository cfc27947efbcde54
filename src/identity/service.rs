//! Authentication service: registration, login, logout and token resolution.
//!
//! Store handles are injected at construction; the service holds no state of
//! its own and performs no locking. Uniqueness of usernames and tokens is
//! enforced by the stores' conditional inserts.

use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::storage::{Put, RecordStore};

use super::account::{valid_username, Account};
use super::session::{generate_token, Session};

// "No such user" and "wrong password" collapse into this one error so the
// API cannot be used to enumerate accounts.
fn invalid_credentials() -> AppError {
    AppError::auth("invalid_credentials", "Invalid credentials")
}

pub struct AuthService {
    accounts: Arc<dyn RecordStore<Account>>,
    sessions: Arc<dyn RecordStore<Session>>,
}

impl AuthService {
    pub fn new(accounts: Arc<dyn RecordStore<Account>>, sessions: Arc<dyn RecordStore<Session>>) -> Self {
        Self { accounts, sessions }
    }

    pub fn register(&self, username: &str, password: &str) -> AppResult<()> {
        if !valid_username(username) {
            return Err(AppError::validation("invalid_username", "Invalid username"));
        }
        let hash = crate::security::hash_password(password).map_err(AppError::from)?;
        match self.accounts.put_if_absent(username, Account::new(username, hash))? {
            Put::Inserted => {
                info!(user = username, "auth.register");
                Ok(())
            }
            Put::AlreadyExists => Err(AppError::conflict("username_exists", "Username already exists")),
        }
    }

    pub fn login(&self, username: &str, password: &str) -> AppResult<String> {
        let Some(account) = self.accounts.get(username)? else {
            return Err(invalid_credentials());
        };
        if !crate::security::verify_password(&account.password_hash, password) {
            return Err(invalid_credentials());
        }
        // One regenerate-and-retry cycle guards the astronomically unlikely
        // token collision; the session insert itself is conditional.
        for _ in 0..2 {
            let token = generate_token().map_err(AppError::from)?;
            let session = Session { token: token.clone(), username: username.to_string() };
            if self.sessions.put_if_absent(&token, session)? == Put::Inserted {
                info!(user = username, "auth.login");
                return Ok(token);
            }
        }
        Err(AppError::conflict("token_collision", "Could not allocate session token"))
    }

    /// Idempotent: unknown tokens log out successfully.
    pub fn logout(&self, token: &str) -> AppResult<()> {
        self.sessions.delete(token)?;
        Ok(())
    }

    /// The single authority for "who is making this request". Every
    /// protected operation resolves its token here first.
    pub fn resolve(&self, token: &str) -> AppResult<String> {
        match self.sessions.get(token)? {
            Some(session) => Ok(session.username),
            None => Err(AppError::auth("no_session", "No active session")),
        }
    }
}
