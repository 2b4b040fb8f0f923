//! Request handlers for `/api/books`.
//!
//! Every handler makes one repository call and returns `AppError` on failure;
//! status codes and error bodies are decided by `AppError`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use libris_http::error::AppError;
use serde_json::{Map, Value};

use super::models::{Book, Deleted, OneOrMany, Page, Sidebar};
use super::query::{BookQuery, FilterParams, SearchParams, SearchQuery};
use super::repository::BookRepository;

pub const BOOK_NOT_FOUND: &str = "Book not found";
pub const BOOK_DELETED: &str = "Book deleted successfully";

pub async fn list_books(State(books): State<BookRepository>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(books.list().await?))
}

pub async fn get_book(
    State(books): State<BookRepository>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    books
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))
}

pub async fn create_books(
    State(books): State<BookRepository>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<OneOrMany<Book>>), AppError> {
    let Json(body) = body?;
    let input = match body {
        Value::Object(book) => OneOrMany::One(book),
        Value::Array(entries) if entries.is_empty() => {
            return Err(AppError::bad_request("Request body must contain at least one book"));
        }
        Value::Array(entries) => OneOrMany::Many(
            entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| match entry {
                    Value::Object(book) => Ok(book),
                    _ => Err(AppError::bad_request(format!(
                        "Entry {index} of the request body is not a book object"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => {
            return Err(AppError::bad_request(
                "Request body must be a book object or an array of book objects",
            ))
        }
    };

    let created = books.create(input).await?;
    match &created {
        OneOrMany::One(book) => tracing::debug!(id = %book.id, "book created"),
        OneOrMany::Many(created) => tracing::debug!(count = created.len(), "books created"),
    }
    Ok((StatusCode::CREATED, Json(created)))
}

/// Fields missing from the body keep their stored values.
pub async fn update_book(
    State(books): State<BookRepository>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let Json(body) = body?;
    let patch: Map<String, Value> = match body {
        Value::Object(patch) => patch,
        _ => return Err(AppError::bad_request("Request body must be a book object")),
    };
    books
        .update(&id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))
}

pub async fn delete_book(
    State(books): State<BookRepository>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, AppError> {
    let deleted = books
        .delete(&id)
        .await?
        .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))?;

    tracing::debug!(id = %deleted.id, "book deleted");
    Ok(Json(Deleted {
        message: BOOK_DELETED.to_string(),
    }))
}

pub async fn search_books(
    State(books): State<BookRepository>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Book>>, AppError> {
    let Query(params) = params?;
    let query = SearchQuery::try_from(params)?;
    Ok(Json(books.search(&query).await?))
}

pub async fn filter_books(
    State(books): State<BookRepository>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<Page<Book>>, AppError> {
    let Query(params) = params?;
    let query = BookQuery::try_from(params)?;
    Ok(Json(books.filter(&query).await?))
}

pub async fn sidebar(State(books): State<BookRepository>) -> Result<Json<Sidebar>, AppError> {
    Ok(Json(books.sidebar().await?))
}
