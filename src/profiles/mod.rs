use crate::state::AppState;
use axum::Router;

mod forms;
pub mod handlers;
pub mod repo;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    handlers::profile_routes(max_upload_bytes)
}
