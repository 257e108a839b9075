//! Admin routes: quiz section management. Every handler requires an admin.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::db::DataAccessError;
use crate::routes::auth::RequireAdmin;
use crate::services::quiz_section::{self, NewQuizSection, QuizSection};
use crate::state::AppState;

pub(crate) fn data_error_to_status(err: &DataAccessError) -> StatusCode {
    match err {
        DataAccessError::InvalidQuizSection(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DataAccessError::NotFound(_) | DataAccessError::ProfileNotFound(_) => StatusCode::NOT_FOUND,
        DataAccessError::InvalidRole(_) | DataAccessError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn log_and_map(err: DataAccessError) -> StatusCode {
    let status = data_error_to_status(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "quiz section query failed");
    } else {
        tracing::debug!(error = %err, "quiz section request rejected");
    }
    status
}

/// `GET /api/admin/quiz-sections`: all sections, newest first.
pub async fn list_quiz_sections(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<QuizSection>>, StatusCode> {
    let sections = quiz_section::list_sections(&state.pool).await.map_err(log_and_map)?;
    Ok(Json(sections))
}

/// `POST /api/admin/quiz-sections`: create a section owned by the caller.
pub async fn create_quiz_section(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewQuizSection>,
) -> Result<(StatusCode, Json<QuizSection>), StatusCode> {
    let section = quiz_section::create_section(&state.pool, body, admin.id)
        .await
        .map_err(log_and_map)?;
    tracing::info!(section_id = %section.id, admin_id = %admin.id, "quiz section created");
    Ok((StatusCode::CREATED, Json(section)))
}

/// `DELETE /api/admin/quiz-sections/:id`: remove one section.
pub async fn delete_quiz_section(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    quiz_section::delete_section(&state.pool, id).await.map_err(log_and_map)?;
    tracing::info!(section_id = %id, admin_id = %admin.id, "quiz section deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
