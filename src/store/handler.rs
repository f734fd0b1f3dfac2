//! HTTP Handlers for the Store API

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{BookQuery, CreateBook, Store, UpdateBook, UpdateRelation, is_valid_rate};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::handler::AppState;

/// 404 when the book is missing, 403 when the caller is neither owner
/// nor staff.
async fn authorize_book_write(store: &Store<'_>, user: &CurrentUser, id: i64) -> ApiResult<()> {
    let owner_id = store.find_book_owner(id).await?.ok_or(ApiError::NotFound)?;
    if !user.can_modify(owner_id) {
        return Err(ApiError::PermissionDenied);
    }
    Ok(())
}

pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> ApiResult<Response> {
    let store = Store::new(&state.db);
    let books = store.list_books(&query).await?;
    Ok(Json(books).into_response())
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Response> {
    let store = Store::new(&state.db);
    let book = store.get_book(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(book).into_response())
}

pub async fn create_book(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateBook>,
) -> ApiResult<Response> {
    let store = Store::new(&state.db);
    let book = store.create_book(Some(&user.0), payload).await?;
    Ok((StatusCode::CREATED, Json(book)).into_response())
}

pub async fn update_book(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateBook>,
) -> ApiResult<Response> {
    let store = Store::new(&state.db);
    authorize_book_write(&store, &user, id).await?;

    let book = store.update_book(id, payload).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(book).into_response())
}

pub async fn delete_book(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let store = Store::new(&state.db);
    authorize_book_write(&store, &user, id).await?;

    if !store.delete_book(id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn get_relation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(book_id): Path<i64>,
) -> ApiResult<Response> {
    let store = Store::new(&state.db);
    if store.find_book_owner(book_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let relation = store.get_or_create_relation(user.0.id, book_id).await?;
    Ok(Json(relation).into_response())
}

pub async fn patch_relation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(book_id): Path<i64>,
    Json(payload): Json<UpdateRelation>,
) -> ApiResult<Response> {
    if let Some(Some(rate)) = payload.rate {
        if !is_valid_rate(rate) {
            return Err(ApiError::invalid_choice("rate", rate));
        }
    }

    let store = Store::new(&state.db);
    let relation = store
        .update_relation(user.0.id, book_id, payload)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(relation).into_response())
}
