//! Books repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// List books with optional title/category filter
    pub async fn list(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let title = query
            .title
            .as_deref()
            .map(|t| format!("%{}%", t))
            .unwrap_or_else(|| "%".to_string());

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE title ILIKE $1 AND ($2::text IS NULL OR category = $2)
            ORDER BY title
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&title)
        .bind(&query.category)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM books WHERE title ILIKE $1 AND ($2::text IS NULL OR category = $2)",
        )
        .bind(&title)
        .bind(&query.category)
        .fetch_one(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Create a new book; available stock starts equal to total stock
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, publisher, publication_year,
                               category, synopsis, total_stock, available_stock,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.publisher)
        .bind(book.publication_year)
        .bind(&book.category)
        .bind(&book.synopsis)
        .bind(book.total_stock)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update book fields. A change to total stock shifts available stock by
    /// the same delta so copies currently out stay accounted for.
    pub async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let current = self.get_by_id(id).await?;

        let new_total = update.total_stock.unwrap_or(current.total_stock);
        let delta = new_total - current.total_stock;
        let new_available = current.available_stock + delta;
        if new_available < 0 {
            return Err(AppError::Validation(format!(
                "Cannot reduce total stock below the {} copies currently on loan",
                current.total_stock - current.available_stock
            )));
        }

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = COALESCE($1, title),
                author = COALESCE($2, author),
                isbn = COALESCE($3, isbn),
                publisher = COALESCE($4, publisher),
                publication_year = COALESCE($5, publication_year),
                category = COALESCE($6, category),
                synopsis = COALESCE($7, synopsis),
                total_stock = $8,
                available_stock = $9,
                updated_at = NOW()
            WHERE id = $10
            RETURNING *
            "#,
        )
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.isbn)
        .bind(&update.publisher)
        .bind(update.publication_year)
        .bind(&update.category)
        .bind(&update.synopsis)
        .bind(new_total)
        .bind(new_available)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Set the cover image URL
    pub async fn set_cover(&self, id: i32, cover_url: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE books SET cover_url = $1, updated_at = NOW() WHERE id = $2")
            .bind(cover_url)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
