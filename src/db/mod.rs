//! Database layer for Lectern
//!
//! Durable article and author storage behind the [`ArticleRepository`] and
//! [`AuthorRepository`] traits, with MongoDB and in-memory implementations.

pub mod memory;
pub mod mongo;
pub mod mongo_repository;
pub mod repository;
pub mod schemas;

pub use memory::{InMemoryArticleRepository, InMemoryAuthorRepository};
pub use mongo::{MongoClient, MongoCollection};
pub use mongo_repository::{MongoArticleRepository, MongoAuthorRepository};
pub use repository::{ArticleRepository, AuthorRepository};
pub use schemas::{ArticleDoc, AuthorDoc, Metadata};
