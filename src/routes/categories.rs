use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;

use crate::auth::policy;
use crate::db::models::Category;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::accounts::CreatedResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list).post(create))
        .route("/api/categories/{id}", axum::routing::delete(delete))
}

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// GET /api/categories — alphabetical listing.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Category>>> {
    policy::view(&user.actor()).check()?;

    let conn = state.db.get()?;
    let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name ASC")?;
    let categories = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(categories))
}

/// POST /api/categories — admin-only.
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    policy::manage_categories(&user.actor()).check()?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("category name is required".into()));
    }

    let conn = state.db.get()?;
    match conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name]) {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(AppError::Conflict("category name already exists".into()));
        }
        Err(e) => return Err(e.into()),
    }
    let id = conn.last_insert_rowid();

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// DELETE /api/categories/{id} — admin-only; cascades to the category's
/// posts.
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    policy::manage_categories(&user.actor()).check()?;

    let conn = state.db.get()?;
    let deleted = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
