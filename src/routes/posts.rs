use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::auth::policy;
use crate::db::models::{Post, Role};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::accounts::CreatedResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list).post(create))
        .route("/api/posts/category/{category_id}", get(list_by_category))
        .route("/api/posts/{id}", get(detail).delete(delete))
}

// -- Request/response types --

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub category_id: i64,
    pub title: String,
    pub body: String,
}

/// Post detail with the author joined in.
#[derive(Serialize)]
pub struct PostDetail {
    pub id: i64,
    pub category_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_role: Role,
    pub title: String,
    pub body: String,
    pub created_at: String,
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        category_id: row.get(1)?,
        author_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const POST_COLUMNS: &str = "id, category_id, author_id, title, body, created_at";

// -- Handlers --

/// GET /api/posts — newest first.
pub async fn list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<Post>>> {
    policy::view(&user.actor()).check()?;

    let conn = state.db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC"
    ))?;
    let posts = stmt
        .query_map([], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(posts))
}

/// GET /api/posts/category/{category_id} — newest first; an unknown category
/// yields an empty list, never a 404.
pub async fn list_by_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(category_id): Path<i64>,
) -> AppResult<Json<Vec<Post>>> {
    policy::view(&user.actor()).check()?;

    let conn = state.db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE category_id = ?1 ORDER BY created_at DESC, id DESC"
    ))?;
    let posts = stmt
        .query_map(params![category_id], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(posts))
}

/// GET /api/posts/{id} — detail with author name and role.
pub async fn detail(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<PostDetail>> {
    policy::view(&user.actor()).check()?;

    let conn = state.db.get()?;
    let post = conn
        .query_row(
            "SELECT p.id, p.category_id, p.author_id, a.display_name, a.role,
                    p.title, p.body, p.created_at
             FROM posts p JOIN accounts a ON a.id = p.author_id
             WHERE p.id = ?1",
            params![id],
            |row| {
                Ok(PostDetail {
                    id: row.get(0)?,
                    category_id: row.get(1)?,
                    author_id: row.get(2)?,
                    author_name: row.get(3)?,
                    author_role: row.get(4)?,
                    title: row.get(5)?,
                    body: row.get(6)?,
                    created_at: row.get(7)?,
                })
            },
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    Ok(Json(post))
}

/// POST /api/posts — any authenticated account; the author is the token
/// subject, never a client-supplied id.
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    policy::create_content(&user.actor()).check()?;

    let title = req.title.trim();
    let body = req.body.trim();
    if title.is_empty() || body.is_empty() {
        return Err(AppError::Validation("title and body are required".into()));
    }

    let conn = state.db.get()?;
    let category_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM categories WHERE id = ?1",
        params![req.category_id],
        |row| row.get(0),
    )?;
    if !category_exists {
        return Err(AppError::Validation("category does not exist".into()));
    }

    conn.execute(
        "INSERT INTO posts (category_id, author_id, title, body) VALUES (?1, ?2, ?3, ?4)",
        params![req.category_id, user.id, title, body],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!("post {} created by {}", id, user.display_name);

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// DELETE /api/posts/{id} — author or admin.
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    let owner: Option<i64> = conn
        .query_row(
            "SELECT author_id FROM posts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    policy::delete_post(&user.actor(), owner).check()?;

    conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(StatusCode::NO_CONTENT)
}
