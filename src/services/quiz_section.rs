//! Quiz section CRUD for the admin panel.
//!
//! The table enforces nothing beyond its column checks; titles and time
//! limits are validated here before insert.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::DataAccessError;

pub const DEFAULT_TIME_LIMIT_MINUTES: i32 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct QuizSection {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Minutes allowed to complete the section.
    pub time_limit: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: Option<Uuid>,
}

/// Admin form payload for a new section.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuizSection {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_time_limit")]
    pub time_limit: i32,
}

fn default_time_limit() -> i32 {
    DEFAULT_TIME_LIMIT_MINUTES
}

impl NewQuizSection {
    /// Trim text fields and check bounds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuizSection` for a blank title or a time limit below
    /// one minute.
    pub fn validate(self) -> Result<Self, DataAccessError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(DataAccessError::InvalidQuizSection("title is required".into()));
        }
        if self.time_limit < 1 {
            return Err(DataAccessError::InvalidQuizSection("time_limit must be at least 1 minute".into()));
        }
        Ok(Self { title, description: self.description.trim().to_owned(), time_limit: self.time_limit })
    }
}

fn section_from_row(row: &PgRow) -> QuizSection {
    QuizSection {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        time_limit: row.get("time_limit"),
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
    }
}

/// List all sections, newest first.
pub async fn list_sections(pool: &PgPool) -> Result<Vec<QuizSection>, DataAccessError> {
    let rows = sqlx::query(
        "SELECT id, title, description, time_limit, created_at, created_by
         FROM quiz_sections
         ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(section_from_row).collect())
}

/// Validate and insert a section owned by `created_by`.
pub async fn create_section(
    pool: &PgPool,
    new: NewQuizSection,
    created_by: Uuid,
) -> Result<QuizSection, DataAccessError> {
    let new = new.validate()?;
    let row = sqlx::query(
        r"INSERT INTO quiz_sections (title, description, time_limit, created_by)
          VALUES ($1, $2, $3, $4)
          RETURNING id, title, description, time_limit, created_at, created_by",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.time_limit)
    .bind(created_by)
    .fetch_one(pool)
    .await?;
    Ok(section_from_row(&row))
}

pub async fn delete_section(pool: &PgPool, id: Uuid) -> Result<(), DataAccessError> {
    let result = sqlx::query("DELETE FROM quiz_sections WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DataAccessError::NotFound(id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "quiz_section_test.rs"]
mod tests;
