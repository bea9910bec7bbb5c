pub mod accounts;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod posts;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(accounts::router())
        .merge(categories::router())
        .merge(posts::router())
        .merge(comments::router())
}
