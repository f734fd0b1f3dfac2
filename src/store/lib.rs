use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::model::{Decimal2, User};

/// The rate values a relation accepts, with their display labels.
pub const RATE_CHOICES: &[(i64, &str)] = &[
    (1, "Ok"),
    (2, "Fine"),
    (3, "Good"),
    (4, "Amazing"),
    (5, "Incredible"),
];

pub fn is_valid_rate(rate: i64) -> bool {
    RATE_CHOICES.iter().any(|(value, _)| *value == rate)
}

/// Book as served by the API: catalog fields plus the aggregates computed
/// in the list/get query (likes_count, owner_name) and the reader summaries.
#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub id: i64,
    pub name: String,
    pub price: Decimal2,
    pub author_name: String,
    pub rating: Option<Decimal2>,
    pub likes_count: i64,
    pub owner_name: Option<String>,
    pub readers: Vec<Reader>,
    #[serde(skip_serializing)]
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reader {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookRelation {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    #[serde(rename = "book")]
    pub book_id: i64,
    pub like: bool,
    pub in_bookmarks: bool,
    pub rate: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBook {
    pub name: String,
    pub price: Decimal2,
    pub author_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBook {
    pub name: Option<String>,
    pub price: Option<Decimal2>,
    pub author_name: Option<String>,
}

/// Patch input for a relation. `rate` distinguishes an absent field (no
/// change) from an explicit null (clear the rate).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRelation {
    pub like: Option<bool>,
    pub in_bookmarks: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub rate: Option<Option<i64>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookQuery {
    pub price: Option<Decimal2>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// Shared SELECT for books: joins relations to count likes in the same
/// query and joins the owner for its username. Callers append WHERE and
/// ORDER BY clauses; GROUP BY books.id is mandatory.
const ANNOTATED_BOOK_SELECT: &str = r#"
    SELECT
        books.id,
        books.name,
        books.price,
        books.author_name,
        books.rating,
        books.owner_id,
        COUNT(CASE WHEN relations."like" = 1 THEN 1 END) AS likes_count,
        owners.username
    FROM books
    LEFT JOIN user_book_relations AS relations ON relations.book_id = books.id
    LEFT JOIN users AS owners ON owners.id = books.owner_id
"#;

pub struct Store<'a> {
    db: &'a Database,
}

impl<'a> Store<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn conn(&self) -> &libsql::Connection {
        self.db.connection()
    }

    pub async fn create_user(&self, input: CreateUser) -> Result<User> {
        let query = r#"
            INSERT INTO users (username, first_name, last_name, is_staff, token)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, username, first_name, last_name, is_staff
        "#;

        let mut rows = self
            .conn()
            .query(
                query,
                libsql::params![
                    input.username,
                    input.first_name,
                    input.last_name,
                    input.is_staff as i64,
                    input.token
                ],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(self.row_to_user(&row)?)
        } else {
            anyhow::bail!("Failed to create user")
        }
    }

    pub async fn find_user_by_token(&self, token: &str) -> Result<Option<User>> {
        let query = r#"
            SELECT id, username, first_name, last_name, is_staff
            FROM users WHERE token = ?
        "#;

        let mut rows = self.conn().query(query, libsql::params![token]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(self.row_to_user(&row)?))
        } else {
            Ok(None)
        }
    }

    fn row_to_user(&self, row: &libsql::Row) -> Result<User> {
        let is_staff: i64 = row.get(4)?;

        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            is_staff: is_staff != 0,
        })
    }

    pub async fn create_book(&self, owner: Option<&User>, input: CreateBook) -> Result<Book> {
        let query = r#"
            INSERT INTO books (name, price, author_name, owner_id)
            VALUES (?, ?, ?, ?)
            RETURNING id
        "#;

        let owner_id = owner.map(|user| user.id);
        let mut rows = self
            .conn()
            .query(
                query,
                libsql::params![input.name, input.price.hundredths(), input.author_name, owner_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let id: i64 = row.get(0)?;
            match self.get_book(id).await? {
                Some(book) => Ok(book),
                None => anyhow::bail!("Failed to create book"),
            }
        } else {
            anyhow::bail!("Failed to create book")
        }
    }

    pub async fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let query = format!("{ANNOTATED_BOOK_SELECT} WHERE books.id = ? GROUP BY books.id");

        let mut rows = self.conn().query(&query, libsql::params![id]).await?;

        if let Some(row) = rows.next().await? {
            let mut book = self.row_to_book(&row)?;
            self.attach_readers(std::slice::from_mut(&mut book)).await?;
            Ok(Some(book))
        } else {
            Ok(None)
        }
    }

    pub async fn list_books(&self, query: &BookQuery) -> Result<Vec<Book>> {
        let mut filters: Vec<&str> = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(price) = query.price {
            filters.push("books.price = ?");
            params.push(price.hundredths().into());
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            filters.push("(books.name LIKE ? OR books.author_name LIKE ?)");
            let pattern = format!("%{search}%");
            params.push(pattern.clone().into());
            params.push(pattern.into());
        }

        let where_clause = if filters.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };
        let order_clause = order_clause(query.ordering.as_deref());
        let sql =
            format!("{ANNOTATED_BOOK_SELECT} {where_clause} GROUP BY books.id ORDER BY {order_clause}");

        let mut rows = self.conn().query(&sql, params).await?;
        let mut books = Vec::new();

        while let Some(row) = rows.next().await? {
            books.push(self.row_to_book(&row)?);
        }

        self.attach_readers(&mut books).await?;
        Ok(books)
    }

    /// Returns the owner column for a book, or None if the book itself is
    /// missing. The inner Option is the nullable owner.
    pub async fn find_book_owner(&self, book_id: i64) -> Result<Option<Option<i64>>> {
        let mut rows = self
            .conn()
            .query("SELECT owner_id FROM books WHERE id = ?", libsql::params![book_id])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub async fn update_book(&self, id: i64, input: UpdateBook) -> Result<Option<Book>> {
        if self.find_book_owner(id).await?.is_none() {
            return Ok(None);
        }

        let mut updates = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(name) = &input.name {
            updates.push("name = ?");
            params.push(name.clone().into());
        }
        if let Some(price) = input.price {
            updates.push("price = ?");
            params.push(price.hundredths().into());
        }
        if let Some(author_name) = &input.author_name {
            updates.push("author_name = ?");
            params.push(author_name.clone().into());
        }

        if updates.is_empty() {
            return self.get_book(id).await;
        }

        updates.push("updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')");
        params.push(id.into());

        let query = format!("UPDATE books SET {} WHERE id = ?", updates.join(", "));

        self.conn().execute(&query, params).await?;
        self.get_book(id).await
    }

    pub async fn delete_book(&self, id: i64) -> Result<bool> {
        let _guard = self.db.lock_for_transaction().await;

        self.conn().execute("BEGIN TRANSACTION", ()).await?;

        let result = self.delete_book_internal(id).await;

        match result {
            Ok(deleted) => {
                self.conn().execute("COMMIT", ()).await?;
                Ok(deleted)
            }
            Err(e) => {
                let _ = self.conn().execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn delete_book_internal(&self, id: i64) -> Result<bool> {
        self.conn()
            .execute(
                "DELETE FROM user_book_relations WHERE book_id = ?",
                libsql::params![id],
            )
            .await?;

        let deleted = self
            .conn()
            .execute("DELETE FROM books WHERE id = ?", libsql::params![id])
            .await?;

        Ok(deleted > 0)
    }

    /// Returns the user's relation to a book, creating a blank one if none
    /// exists yet. When duplicates exist the oldest row wins.
    pub async fn get_or_create_relation(
        &self,
        user_id: i64,
        book_id: i64,
    ) -> Result<BookRelation> {
        let query = r#"
            SELECT id, user_id, book_id, "like", in_bookmarks, rate
            FROM user_book_relations
            WHERE user_id = ? AND book_id = ?
            ORDER BY id ASC
            LIMIT 1
        "#;

        let mut rows = self
            .conn()
            .query(query, libsql::params![user_id, book_id])
            .await?;

        if let Some(row) = rows.next().await? {
            return Ok(self.row_to_relation(&row)?);
        }

        let insert = r#"
            INSERT INTO user_book_relations (user_id, book_id)
            VALUES (?, ?)
            RETURNING id, user_id, book_id, "like", in_bookmarks, rate
        "#;

        let mut rows = self
            .conn()
            .query(insert, libsql::params![user_id, book_id])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(self.row_to_relation(&row)?)
        } else {
            anyhow::bail!("Failed to create relation")
        }
    }

    /// Applies a partial update to the user's relation, creating it first if
    /// needed. Recomputes the book's rating when the rate value changed.
    /// Returns None when the book does not exist.
    pub async fn update_relation(
        &self,
        user_id: i64,
        book_id: i64,
        input: UpdateRelation,
    ) -> Result<Option<BookRelation>> {
        if self.find_book_owner(book_id).await?.is_none() {
            return Ok(None);
        }

        let _guard = self.db.lock_for_transaction().await;

        self.conn().execute("BEGIN TRANSACTION", ()).await?;

        let result = self.update_relation_internal(user_id, book_id, input).await;

        match result {
            Ok(relation) => {
                self.conn().execute("COMMIT", ()).await?;
                Ok(Some(relation))
            }
            Err(e) => {
                let _ = self.conn().execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn update_relation_internal(
        &self,
        user_id: i64,
        book_id: i64,
        input: UpdateRelation,
    ) -> Result<BookRelation> {
        let relation = self.get_or_create_relation(user_id, book_id).await?;

        let mut updates = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(like) = input.like {
            updates.push(r#""like" = ?"#);
            params.push((like as i64).into());
        }
        if let Some(in_bookmarks) = input.in_bookmarks {
            updates.push("in_bookmarks = ?");
            params.push((in_bookmarks as i64).into());
        }
        if let Some(rate) = input.rate {
            updates.push("rate = ?");
            params.push(match rate {
                Some(value) => value.into(),
                None => libsql::Value::Null,
            });
        }

        if updates.is_empty() {
            return Ok(relation);
        }

        updates.push("updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')");
        params.push(relation.id.into());

        let query = format!(
            "UPDATE user_book_relations SET {} WHERE id = ?",
            updates.join(", ")
        );

        self.conn().execute(&query, params).await?;

        let updated = match self.get_relation(relation.id).await? {
            Some(relation) => relation,
            None => anyhow::bail!("Relation disappeared during update"),
        };

        if updated.rate != relation.rate {
            self.set_rating(book_id).await?;
        }

        Ok(updated)
    }

    async fn get_relation(&self, id: i64) -> Result<Option<BookRelation>> {
        let query = r#"
            SELECT id, user_id, book_id, "like", in_bookmarks, rate
            FROM user_book_relations WHERE id = ?
        "#;

        let mut rows = self.conn().query(query, libsql::params![id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(self.row_to_relation(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Persists the book's rating as the mean of all non-null relation rates
    /// rounded to 2 decimals, or null when no relation carries a rate.
    pub async fn set_rating(&self, book_id: i64) -> Result<()> {
        let query = r#"
            SELECT AVG(rate)
            FROM user_book_relations
            WHERE book_id = ? AND rate IS NOT NULL
        "#;

        let mut rows = self.conn().query(query, libsql::params![book_id]).await?;
        let mean: Option<f64> = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => None,
        };
        let rating = mean.map(|mean| (mean * 100.0).round() as i64);

        self.conn()
            .execute(
                "UPDATE books SET rating = ? WHERE id = ?",
                libsql::params![rating, book_id],
            )
            .await?;

        Ok(())
    }

    async fn attach_readers(&self, books: &mut [Book]) -> Result<()> {
        if books.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; books.len()].join(", ");
        let query = format!(
            r#"
            SELECT relations.book_id, users.first_name, users.last_name
            FROM user_book_relations AS relations
            JOIN users ON users.id = relations.user_id
            WHERE relations.book_id IN ({placeholders})
            ORDER BY relations.id ASC
            "#
        );
        let params: Vec<libsql::Value> = books.iter().map(|book| book.id.into()).collect();

        let mut rows = self.conn().query(&query, params).await?;

        while let Some(row) = rows.next().await? {
            let book_id: i64 = row.get(0)?;
            let reader = Reader {
                first_name: row.get(1)?,
                last_name: row.get(2)?,
            };
            if let Some(book) = books.iter_mut().find(|book| book.id == book_id) {
                book.readers.push(reader);
            }
        }

        Ok(())
    }

    fn row_to_book(&self, row: &libsql::Row) -> Result<Book> {
        let price: i64 = row.get(2)?;
        let rating: Option<i64> = row.get(4)?;

        Ok(Book {
            id: row.get(0)?,
            name: row.get(1)?,
            price: Decimal2::from_hundredths(price),
            author_name: row.get(3)?,
            rating: rating.map(Decimal2::from_hundredths),
            owner_id: row.get(5)?,
            likes_count: row.get(6)?,
            owner_name: row.get(7)?,
            readers: Vec::new(),
        })
    }

    fn row_to_relation(&self, row: &libsql::Row) -> Result<BookRelation> {
        let like: i64 = row.get(3)?;
        let in_bookmarks: i64 = row.get(4)?;

        Ok(BookRelation {
            id: row.get(0)?,
            user_id: row.get(1)?,
            book_id: row.get(2)?,
            like: like != 0,
            in_bookmarks: in_bookmarks != 0,
            rate: row.get(5)?,
        })
    }
}

fn order_clause(ordering: Option<&str>) -> &'static str {
    match ordering {
        Some("price") => "books.price ASC, books.id ASC",
        Some("-price") => "books.price DESC, books.id ASC",
        Some("author_name") => "books.author_name ASC, books.id ASC",
        Some("-author_name") => "books.author_name DESC, books.id ASC",
        _ => "books.id ASC",
    }
}
