use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::policy::Actor;
use crate::auth::token::TokenError;
use crate::db::models::Role;
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller, derived from the verified bearer token. Token
/// claims are the only source of actor identity; ids supplied in a request
/// body are never trusted for ownership.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub display_name: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            role: self.role,
        }
    }
}

/// Extractor that requires authentication.
/// A missing credential is 401; a credential that fails verification
/// (bad signature, garbage, expired) is 403.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(AppError::Unauthenticated)?;

        let claims = state.tokens.verify(token).map_err(|err| match err {
            TokenError::Expired | TokenError::Invalid => AppError::Forbidden,
        })?;

        Ok(CurrentUser {
            id: claims.sub,
            display_name: claims.name,
            role: claims.role,
        })
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
