//! Book catalog service

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
    services::media::MediaStore,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    media: Arc<dyn MediaStore>,
}

impl CatalogService {
    pub fn new(repository: Repository, media: Arc<dyn MediaStore>) -> Self {
        Self { repository, media }
    }

    pub async fn get(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn list(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.list(query).await
    }

    pub async fn create(&self, book: CreateBook) -> AppResult<Book> {
        self.repository.books.create(&book).await
    }

    pub async fn update(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        self.repository.books.update(id, &update).await
    }

    /// Store a cover image and remember its URL
    pub async fn set_cover(&self, id: i32, filename: &str, bytes: &[u8]) -> AppResult<String> {
        let url = self.media.store(filename, bytes).await?;
        self.repository.books.set_cover(id, &url).await?;
        Ok(url)
    }
}
