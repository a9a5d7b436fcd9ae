use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use super::controller;
use crate::AppState;

pub fn polling_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/visibility", put(controller::set_visibility))
        .route("/{kind}/{subject_id}", get(controller::get_poll))
        .route("/{kind}/{subject_id}/start", post(controller::start_poll))
        .route("/{kind}/{subject_id}/stop", post(controller::stop_poll))
}
