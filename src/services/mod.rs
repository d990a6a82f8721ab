//! Application services

pub mod article;

pub use article::{clamp_page_size, ArticleService, ReadConfig};
