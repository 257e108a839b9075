//! Profile lookup: the application record behind an identity.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::DataAccessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

/// Row of the `profiles` table, keyed by identity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, id: Uuid) -> Result<Profile, DataAccessError>;
}

/// [`ProfileStore`] backed by the hosted Postgres database.
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileStore for PgProfileStore {
    async fn fetch_profile(&self, id: Uuid) -> Result<Profile, DataAccessError> {
        let row = sqlx::query("SELECT id, email, role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DataAccessError::ProfileNotFound(id))?;

        let role: String = row.get("role");
        Ok(Profile {
            id: row.get("id"),
            email: row.get("email"),
            role: Role::parse(&role).ok_or_else(|| DataAccessError::InvalidRole(role.clone()))?,
        })
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
