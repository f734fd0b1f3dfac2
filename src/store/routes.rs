use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/book", get(handler::list_books))
        .route("/book", post(handler::create_book))
        .route("/book/:id", get(handler::get_book))
        .route("/book/:id", put(handler::update_book))
        .route("/book/:id", patch(handler::update_book))
        .route("/book/:id", delete(handler::delete_book))
        .route("/book_relation/:book_id", get(handler::get_relation))
        .route("/book_relation/:book_id", patch(handler::patch_relation))
}
