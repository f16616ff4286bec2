use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod models;
pub mod repo;
pub mod views;
pub mod voting;

pub fn router() -> Router<AppState> {
    handlers::poll_routes()
}
