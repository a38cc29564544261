use std::sync::Arc;

use uuid::Uuid;

use crate::clock::Clock;
use crate::crypto::PasswordManager;
use crate::error::{Result, ServerError};
use crate::user::{CredentialStore, User, UserPatch};

const PATH_MISMATCH: &str = "The user id in token and path is not matching";
const WRONG_PASSWORD: &str = "Current password is incorrect";

/// Both passwords are required to change it.
#[derive(Clone, Debug)]
pub struct PasswordChange {
    pub current: String,
    pub new: String,
}

impl PasswordChange {
    /// `None` when neither password is given.
    pub fn from_parts(
        current: Option<String>,
        new: Option<String>,
    ) -> Result<Option<Self>> {
        match (current, new) {
            (Some(current), Some(new)) => Ok(Some(Self { current, new })),
            (None, None) => Ok(None),
            _ => Err(ServerError::Forbidden(WRONG_PASSWORD.into())),
        }
    }
}

/// User manager.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn CredentialStore>,
    pwd: Arc<PasswordManager>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(
        users: Arc<dyn CredentialStore>,
        pwd: Arc<PasswordManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { users, pwd, clock }
    }

    /// Only the account owner and admins may act on `target`.
    pub fn authorize(current: &User, target: Uuid) -> Result<()> {
        if current.id != target && !current.is_admin() {
            return Err(ServerError::Forbidden(PATH_MISMATCH.into()));
        }
        Ok(())
    }

    /// Find user using `id` field.
    pub async fn get(&self, id: Uuid) -> Result<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("There is no user with id {id}")))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.users.list().await
    }

    /// Update profile fields and, optionally, the password.
    pub async fn update(
        &self,
        id: Uuid,
        patch: UserPatch,
        password: Option<PasswordChange>,
    ) -> Result<User> {
        let mut user = self.get(id).await?;

        if let Some(change) = password {
            let correct = user
                .password_hash
                .as_deref()
                .is_some_and(|hash| self.pwd.verify_password(&change.current, hash));
            if !correct {
                return Err(ServerError::Forbidden(WRONG_PASSWORD.into()));
            }
            user.password_hash = Some(self.pwd.hash_password(&change.new)?);
        }

        patch.merge(&mut user);
        user.updated_at = self.clock.now();
        self.users.update(&user).await?;

        tracing::info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    /// Delete user, its sessions and its diaries.
    pub async fn delete(&self, id: Uuid) -> Result<User> {
        let user = self.get(id).await?;
        self.users.delete(id).await?;

        tracing::info!(user_id = %user.id, "user deleted");
        Ok(user)
    }
}
