//! Domain model
//!
//! Articles are owned by the durable repository; every cached copy is a
//! disposable projection of one of these.

mod article;

pub use article::{Article, Author};
