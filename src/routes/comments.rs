use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::auth::policy;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::accounts::CreatedResponse;
use crate::state::AppState;
use crate::threads::{build_thread, CommentNode, CommentRow};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts/{id}/comments", get(list).post(create))
        .route("/api/comments/{id}", axum::routing::delete(delete))
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
    pub parent_id: Option<i64>,
}

fn post_exists(conn: &Connection, post_id: i64) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )
}

// -- Handlers --

/// GET /api/posts/{post_id}/comments — the post's comments as a nested reply
/// forest, chronological within each level.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Json<Vec<CommentNode>>> {
    policy::view(&user.actor()).check()?;

    let conn = state.db.get()?;
    if !post_exists(&conn, post_id)? {
        return Err(AppError::NotFound);
    }

    let mut stmt = conn.prepare(
        "SELECT c.id, c.author_id, a.display_name, c.body, c.created_at, c.parent_id
         FROM comments c JOIN accounts a ON a.id = c.author_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;
    let rows = stmt
        .query_map(params![post_id], |row| {
            Ok(CommentRow {
                id: row.get(0)?,
                author_id: row.get(1)?,
                author_name: row.get(2)?,
                body: row.get(3)?,
                created_at: row.get(4)?,
                parent_id: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(build_thread(rows)))
}

/// POST /api/posts/{post_id}/comments — any authenticated account. A reply's
/// parent must be an existing comment on the same post.
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    policy::create_content(&user.actor()).check()?;

    let body = req.body.trim();
    if body.is_empty() {
        return Err(AppError::Validation("comment body is required".into()));
    }

    let conn = state.db.get()?;
    if !post_exists(&conn, post_id)? {
        return Err(AppError::NotFound);
    }

    if let Some(parent_id) = req.parent_id {
        let parent_post: Option<i64> = conn
            .query_row(
                "SELECT post_id FROM comments WHERE id = ?1",
                params![parent_id],
                |row| row.get(0),
            )
            .optional()?;
        match parent_post {
            None => return Err(AppError::Validation("parent comment does not exist".into())),
            Some(p) if p != post_id => {
                return Err(AppError::Validation(
                    "parent comment belongs to a different post".into(),
                ));
            }
            Some(_) => {}
        }
    }

    conn.execute(
        "INSERT INTO comments (post_id, author_id, parent_id, body) VALUES (?1, ?2, ?3, ?4)",
        params![post_id, user.id, req.parent_id, body],
    )?;
    let id = conn.last_insert_rowid();

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// DELETE /api/comments/{id} — author or admin. Direct replies are promoted
/// to top level by the schema's SET NULL rule.
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    let owner: Option<i64> = conn
        .query_row(
            "SELECT author_id FROM comments WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    policy::delete_comment(&user.actor(), owner).check()?;

    conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    Ok(StatusCode::NO_CONTENT)
}
