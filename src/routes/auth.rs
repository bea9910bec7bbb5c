use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{password, reset};
use crate::db::models::{Account, Role, ACCOUNT_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/profile", get(profile).patch(update_profile))
        .route("/api/auth/password", patch(change_password))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
}

// -- Request/response types --

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Account as returned to its owner: everything except the password hash.
#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub bio: String,
    pub birth_date: Option<String>,
    pub role: Role,
    pub created_at: String,
}

impl From<Account> for ProfileResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            display_name: account.display_name,
            avatar: account.avatar,
            bio: account.bio,
            birth_date: account.birth_date,
            role: account.role,
            created_at: account.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub birth_date: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

// -- Query helpers --

pub(crate) fn account_by_id(conn: &Connection, id: i64) -> Result<Option<Account>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        params![id],
        Account::from_row,
    )
    .optional()
}

fn account_by_email(conn: &Connection, email: &str) -> Result<Option<Account>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
        params![email],
        Account::from_row,
    )
    .optional()
}

// -- Handlers --

/// POST /api/auth/login — exchange email + password for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("email and password are required".into()));
    }

    let conn = state.db.get()?;
    let account = account_by_email(&conn, email)?.ok_or(AppError::Unauthenticated)?;

    if !password::verify_password(&req.password, &account.password_hash) {
        return Err(AppError::Unauthenticated);
    }

    Ok(Json(TokenResponse {
        token: state.tokens.issue(&account),
    }))
}

/// POST /api/auth/refresh — issue a fresh token. Claims are re-derived from
/// the accounts table, so a role change or deletion takes effect here.
pub async fn refresh(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<TokenResponse>> {
    let conn = state.db.get()?;
    let account = account_by_id(&conn, user.id)?.ok_or(AppError::Unauthenticated)?;

    Ok(Json(TokenResponse {
        token: state.tokens.issue(&account),
    }))
}

/// GET /api/auth/profile — the caller's own account.
pub async fn profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ProfileResponse>> {
    let conn = state.db.get()?;
    let account = account_by_id(&conn, user.id)?.ok_or(AppError::NotFound)?;
    Ok(Json(account.into()))
}

/// PATCH /api/auth/profile — self-edit of name, bio, avatar, birth date and
/// username. Only the caller's own row; role and email are not editable here.
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileResponse>> {
    let conn = state.db.get()?;
    let account = account_by_id(&conn, user.id)?.ok_or(AppError::NotFound)?;

    let username = match req.username {
        Some(ref new_name) => {
            let new_name = new_name.trim();
            if new_name.is_empty() {
                return Err(AppError::Validation("username must not be empty".into()));
            }
            let taken: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM accounts WHERE username = ?1 AND id != ?2",
                params![new_name, user.id],
                |row| row.get(0),
            )?;
            if taken {
                return Err(AppError::Conflict("username already taken".into()));
            }
            new_name.to_string()
        }
        None => account.username,
    };

    let display_name = match req.display_name {
        Some(ref name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::Validation("display name must not be empty".into()));
            }
            name.to_string()
        }
        None => account.display_name,
    };

    let bio = req.bio.unwrap_or(account.bio);
    let avatar = req.avatar.or(account.avatar);
    let birth_date = req.birth_date.or(account.birth_date);

    conn.execute(
        "UPDATE accounts
         SET username = ?1, display_name = ?2, bio = ?3, avatar = ?4, birth_date = ?5
         WHERE id = ?6",
        params![username, display_name, bio, avatar, birth_date, user.id],
    )?;

    let updated = account_by_id(&conn, user.id)?.ok_or(AppError::NotFound)?;
    Ok(Json(updated.into()))
}

/// PATCH /api/auth/password — change the caller's password, requiring the
/// current one.
pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    if req.new_password.is_empty() {
        return Err(AppError::Validation("new password is required".into()));
    }

    let conn = state.db.get()?;
    let account = account_by_id(&conn, user.id)?.ok_or(AppError::NotFound)?;

    if !password::verify_password(&req.current_password, &account.password_hash) {
        return Err(AppError::Validation("current password is incorrect".into()));
    }

    let hash = password::hash_password(&req.new_password)?;
    conn.execute(
        "UPDATE accounts SET password_hash = ?1 WHERE id = ?2",
        params![hash, user.id],
    )?;

    Ok(StatusCode::NO_CONTENT)
}

const RESET_SENT_MESSAGE: &str = "If that address is registered, a reset link has been sent";

/// POST /api/auth/forgot-password — issue a reset ticket and mail the link.
/// The response is the same whether or not the address is registered, so the
/// endpoint cannot be used to probe for accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let email = req.email.trim().to_string();
    if email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }

    let account = {
        let conn = state.db.get()?;
        account_by_email(&conn, &email)?
    };
    let Some(account) = account else {
        tracing::debug!("password reset requested for unknown address");
        return Ok(Json(json!({ "message": RESET_SENT_MESSAGE })));
    };

    let secret = reset::issue_ticket(
        &state.db,
        account.id,
        state.config.auth.reset_ticket_minutes,
    )?;

    let reset_url = format!(
        "{}/password-reset?token={}",
        state.config.mail.frontend_url.trim_end_matches('/'),
        secret
    );
    let body = format!(
        "<p>A password reset was requested for your account.</p>\n\
         <p>The link below is valid for one hour:</p>\n\
         <p><a href=\"{reset_url}\">Reset your password</a></p>\n\
         <p>If you did not request this, ignore this message.</p>"
    );
    state
        .mailer
        .send(&account.email, "Password reset", &body)
        .await?;

    Ok(Json(json!({ "message": RESET_SENT_MESSAGE })))
}

/// POST /api/auth/reset-password — consume a reset ticket.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let token = req.token.trim();
    if token.is_empty() || req.new_password.is_empty() {
        return Err(AppError::Validation(
            "token and new password are required".into(),
        ));
    }

    let hash = password::hash_password(&req.new_password)?;
    reset::consume_ticket(&state.db, token, &hash)?;

    Ok(Json(json!({ "message": "password updated" })))
}
