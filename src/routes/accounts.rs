use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::auth::{password, policy};
use crate::db::models::Role;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/accounts", get(list).post(register))
        .route("/api/accounts/count", get(count))
        .route("/api/accounts/{id}", axum::routing::delete(delete))
        .route("/api/accounts/{id}/role", axum::routing::put(change_role))
}

// -- Request/response types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub birth_date: Option<String>,
    pub bio: Option<String>,
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub total: i64,
}

/// Listing row for the admin panel; no password hash, no bio.
#[derive(Serialize)]
pub struct AccountSummary {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

// -- Handlers --

/// POST /api/accounts — public registration. New accounts are always
/// `normal`; the role field is not accepted from the client.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let username = req.username.trim();
    let email = req.email.trim();
    let display_name = req.display_name.trim();
    if username.is_empty() || email.is_empty() || display_name.is_empty() || req.password.is_empty()
    {
        return Err(AppError::Validation(
            "username, email, password and display name are required".into(),
        ));
    }

    let conn = state.db.get()?;
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM accounts WHERE username = ?1 OR email = ?2",
        params![username, email],
        |row| row.get(0),
    )?;
    if exists {
        return Err(AppError::Conflict("username or email already registered".into()));
    }

    let hash = password::hash_password(&req.password)?;
    conn.execute(
        "INSERT INTO accounts (username, email, password_hash, display_name, bio, birth_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            username,
            email,
            hash,
            display_name,
            req.bio.unwrap_or_default(),
            req.birth_date,
        ],
    )?;
    let id = conn.last_insert_rowid();

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// GET /api/accounts/count — public member counter.
pub async fn count(State(state): State<AppState>) -> AppResult<Json<CountResponse>> {
    let conn = state.db.get()?;
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
    Ok(Json(CountResponse { total }))
}

/// GET /api/accounts — admin-only listing.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<AccountSummary>>> {
    policy::list_accounts(&user.actor()).check()?;

    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, username, display_name, email, role, created_at
         FROM accounts ORDER BY created_at ASC, id ASC",
    )?;
    let accounts = stmt
        .query_map([], |row| {
            Ok(AccountSummary {
                id: row.get(0)?,
                username: row.get(1)?,
                display_name: row.get(2)?,
                email: row.get(3)?,
                role: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(accounts))
}

/// DELETE /api/accounts/{id} — admin-only; the general administrator and the
/// caller's own account are off limits.
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    let target: Option<i64> = conn
        .query_row(
            "SELECT id FROM accounts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    policy::delete_account(&user.actor(), target).check()?;

    conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/accounts/{id}/role — admin-only role change under the rules in
/// [`policy::change_role`].
pub async fn change_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<ChangeRoleRequest>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    let target: Option<(i64, Role)> = conn
        .query_row(
            "SELECT id, role FROM accounts WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    policy::change_role(&user.actor(), target, req.role).check()?;

    conn.execute(
        "UPDATE accounts SET role = ?1 WHERE id = ?2",
        params![req.role, id],
    )?;
    Ok(StatusCode::NO_CONTENT)
}
