use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod reset;
pub mod service;

pub use service::AuthService;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
