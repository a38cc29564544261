//! Registration, login and token lifecycle.
mod federated;

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

pub use federated::{GoogleIdentityVerifier, IdentityVerifier};

use crate::clock::Clock;
use crate::config::SeedAccount;
use crate::crypto::PasswordManager;
use crate::error::{Result, ServerError, TokenKind};
use crate::retry::RetryPolicy;
use crate::session::{Session, SessionStore};
use crate::token::{TOKEN_TYPE, TokenCodec};
use crate::user::{CredentialStore, Role, User};

const UNKNOWN_USER: &str = "The user id in the jwt does not exists";
const UNKNOWN_SESSION: &str = "The session id in the jwt does not exists";
const ADMIN_ONLY: &str = "Only admin is allowed to access this.";
const REGULAR_ONLY: &str = "Only regular user is allowed to access this.";
const NOT_SESSION_OWNER: &str = "You are not allowed to revoke this session";

/// New account fields.
#[derive(Clone, Debug)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Tokens issued on login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime, in seconds.
    pub expires_in: u64,
    pub user: User,
}

/// Authentication use cases.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<TokenCodec>,
    pwd: Arc<PasswordManager>,
    clock: Arc<dyn Clock>,
    identity: Option<Arc<dyn IdentityVerifier>>,
    retry: RetryPolicy,
}

impl AuthService {
    /// Create a new [`AuthService`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<TokenCodec>,
        pwd: Arc<PasswordManager>,
        clock: Arc<dyn Clock>,
        identity: Option<Arc<dyn IdentityVerifier>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            pwd,
            clock,
            identity,
            retry,
        }
    }

    /// Reject users without `role`.
    pub fn require_role(user: &User, role: Role) -> Result<()> {
        if user.role == role {
            return Ok(());
        }

        let message = match role {
            Role::Admin => ADMIN_ONLY,
            Role::Regular => REGULAR_ONLY,
        };
        Err(ServerError::Forbidden(message.into()))
    }

    pub async fn register(&self, registration: Registration) -> Result<User> {
        let hash = self.pwd.hash_password(&registration.password)?;

        let mut user = User::new(
            registration.email,
            registration.full_name,
            registration.phone,
        )
        .with_password_hash(hash);
        user.created_at = self.clock.now();
        user.updated_at = user.created_at;

        self.users.insert(&user).await?;

        tracing::info!(id = %user.id, "user registered");
        Ok(user)
    }

    /// Open a new session for `user` and sign both tokens.
    async fn issue(
        &self,
        user: User,
        user_agent: &str,
        method: &'static str,
    ) -> Result<Tokens> {
        let session = Session::new(user.id, user_agent, self.clock.now());
        self.sessions.create(&session).await?;

        let now = self.clock.timestamp();
        let access_token = self.tokens.create_access(&user, now)?;
        let refresh_token =
            self.tokens.create_refresh(session.id, user.id, now)?;

        metrics::counter!("auth_logins_total", "method" => method).increment(1);
        tracing::info!(user = %user.id, session = %session.id, method, "user logged in");

        Ok(Tokens {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE,
            expires_in: self.tokens.expires_in(),
            user,
        })
    }

    /// Password login. Every failure gives the same error.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        user_agent: &str,
    ) -> Result<Tokens> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(ServerError::InvalidCredentials)?;

        let correct = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| self.pwd.verify_password(password, hash));
        if !correct {
            return Err(ServerError::InvalidCredentials);
        }

        self.issue(user, user_agent, "password").await
    }

    /// Current row of the user an access token was issued to.
    pub async fn validate_access_token(&self, token: &str) -> Result<User> {
        let claims = self
            .tokens
            .decode_access(token)
            .into_result(TokenKind::Access)?;

        self.users
            .find_by_id(claims.id)
            .await?
            .ok_or_else(|| ServerError::NotFound(UNKNOWN_USER.into()))
    }

    /// New access token, as long as the session still exists.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self
            .tokens
            .decode_refresh(refresh_token)
            .into_result(TokenKind::Refresh)?;

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(|| ServerError::NotFound(UNKNOWN_USER.into()))?;
        let session = self
            .sessions
            .find_session(claims.session_id)
            .await?
            .ok_or_else(|| ServerError::NotFound(UNKNOWN_SESSION.into()))?;

        if session.user_id != user.id {
            return Err(ServerError::TokenInvalid {
                kind: TokenKind::Refresh,
            });
        }

        self.tokens.create_access(&user, self.clock.timestamp())
    }

    /// Find the account of a federated identity, creating it on first use.
    pub async fn register_or_get_federated_user(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<User> {
        if let Some(user) = self.users.find_by_email(email).await? {
            return Ok(user);
        }

        let mut user = User::new(email, display_name, None);
        user.created_at = self.clock.now();
        user.updated_at = user.created_at;
        self.users.insert(&user).await?;

        tracing::info!(id = %user.id, "federated user registered");
        Ok(user)
    }

    /// "Sign in with Google".
    pub async fn login_federated(
        &self,
        credential: &str,
        user_agent: &str,
    ) -> Result<Tokens> {
        let verifier = self.identity.as_ref().ok_or_else(|| {
            ServerError::ServiceUnavailable {
                service: "identity provider",
                details: "google sign-in is not configured".into(),
            }
        })?;

        let identity = self
            .retry
            .run("identity provider", || verifier.verify(credential))
            .await?;
        let user = self
            .register_or_get_federated_user(&identity.email, &identity.name)
            .await?;

        self.issue(user, user_agent, "google").await
    }

    pub async fn sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        self.sessions.list_by_user(user_id).await
    }

    /// Delete one of the caller's sessions.
    pub async fn revoke_session(&self, current: &User, id: Uuid) -> Result<()> {
        let session = self.sessions.find_session(id).await?.ok_or_else(|| {
            ServerError::NotFound(format!("There is no session with id {id}"))
        })?;
        if session.user_id != current.id {
            return Err(ServerError::Forbidden(NOT_SESSION_OWNER.into()));
        }

        self.sessions.revoke(id).await?;
        tracing::info!(user = %current.id, session = %id, "session revoked");
        Ok(())
    }

    /// Create a configured account unless its email is taken.
    ///
    /// Returns whether the account was created.
    pub async fn seed_account(&self, account: &SeedAccount) -> Result<bool> {
        if self.users.find_by_email(&account.email).await?.is_some() {
            tracing::debug!(email = %account.email, "seed account already exists");
            return Ok(false);
        }

        let role = if account.admin {
            Role::Admin
        } else {
            Role::Regular
        };
        let hash = self.pwd.hash_password(&account.password)?;
        let user = User::new(&account.email, &account.full_name, account.phone.clone())
            .with_password_hash(hash)
            .with_role(role);
        self.users.insert(&user).await?;

        tracing::info!(id = %user.id, %role, "seed account created");
        Ok(true)
    }
}
