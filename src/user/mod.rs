//! User accounts.
mod repository;
mod service;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use repository::{CredentialStore, EMAIL_CONFLICT, PHONE_CONFLICT, PgCredentialStore};
pub use service::{PasswordChange, UserService};

pub const DEFAULT_PHOTO: &str = "default.png";

/// User role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[default]
    Regular,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Regular => write!(f, "REGULAR"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "REGULAR" => Ok(Role::Regular),
            _ => Err(format!("unknown role `{s}`")),
        }
    }
}

/// User account.
///
/// The password hash is never serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub full_name: String,
    pub is_active: bool,
    pub role: Role,
    pub photo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active [`User`] with the regular role and no password.
    pub fn new(
        email: impl Into<String>,
        full_name: impl Into<String>,
        phone: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: None,
            phone,
            full_name: full_name.into(),
            is_active: true,
            role: Role::Regular,
            photo: DEFAULT_PHOTO.to_owned(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_password_hash(mut self, hash: String) -> Self {
        self.password_hash = Some(hash);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Profile fields a user may change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
}

impl UserPatch {
    /// Apply every field set on the patch.
    pub fn merge(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(phone) = self.phone {
            user.phone = Some(phone);
        }
        if let Some(full_name) = self.full_name {
            user.full_name = full_name;
        }
    }
}
