pub mod client;
pub mod dto;
pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::food_routes())
}
