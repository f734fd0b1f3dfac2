//! Store Module
//!
//! The book-catalog core: books, per-user book relations (like, bookmark,
//! star rating), and the users they hang off. Exposes CRUD operations,
//! the derived-rating recomputation, ready-to-use HTTP handlers and routes,
//! and the database migrations for all three tables.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bookstore::store;
//!
//! // Get the migrations to run
//! for (name, sql) in store::migrations() {
//!     // Run migration...
//! }
//!
//! // Mount the routes
//! let app = Router::new()
//!     .merge(store::routes())
//!     .with_state(app_state);
//!
//! // Use the store directly
//! let store = store::Store::new(&db);
//! let book = store.create_book(Some(&user), input).await?;
//! ```

mod handler;
mod lib;
mod routes;

pub use lib::*;
pub use routes::routes;

/// Returns the migrations for the store module.
///
/// These should be run during application startup to ensure the database
/// schema is up to date.
pub fn migrations() -> &'static [(&'static str, &'static str)] {
    &[
        ("store_001_schema.sql", include_str!("migrations/001_schema.sql")),
        (
            "store_002_add_book_rating.sql",
            include_str!("migrations/002_add_book_rating.sql"),
        ),
    ]
}
