use crate::state::AppState;
use axum::Router;

pub mod extractors;
mod forms;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod session;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    handlers::auth_routes(max_upload_bytes)
}
