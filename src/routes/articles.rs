//! Article endpoints
//!
//! - `GET /articles/{id}` - read one article, recording a view
//! - `GET /articles?cursor=&num=` - page of articles, next cursor in `X-Cursor`
//! - `POST /articles` - create an article from an [`ArticleInput`] body
//! - `PUT /articles/{id}` - replace an article's title, body and author
//! - `DELETE /articles/{id}` - remove an article

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::HeaderValue;
use hyper::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{empty_response, error_response, json_response};
use crate::domain::Article;
use crate::server::AppState;
use crate::types::{LecternError, Result};

/// Header carrying the next page cursor
pub const CURSOR_HEADER: &str = "x-cursor";

/// Query parameters for the listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub num: Option<String>,
}

impl ListQuery {
    pub fn parse(query: Option<&str>) -> Result<Self> {
        match query {
            None | Some("") => Ok(Self::default()),
            Some(q) => serde_urlencoded::from_str(q)
                .map_err(|e| LecternError::BadRequest(format!("invalid query: {}", e))),
        }
    }

    /// Requested page size. Anything unparsable counts as "not given"
    /// and falls back to the service minimum.
    pub fn page_size(&self) -> i64 {
        self.num
            .as_deref()
            .and_then(|n| n.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }
}

/// Body of `POST /articles` and `PUT /articles/{id}`
#[derive(Debug, Deserialize)]
pub struct ArticleInput {
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub author_id: i64,
}

impl ArticleInput {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let input: Self = serde_json::from_slice(raw)
            .map_err(|e| LecternError::BadRequest(format!("invalid article body: {}", e)))?;
        if input.title.trim().is_empty() {
            return Err(LecternError::BadRequest("title is required".into()));
        }
        Ok(input)
    }

    fn into_article(self) -> Article {
        Article::new(self.title, self.body, self.author_id)
    }
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| LecternError::NotFound(format!("article {:?}", raw)))
}

/// Handle `GET /articles/{id}`
pub async fn handle_get_article(state: &AppState, raw_id: &str) -> Response<Full<Bytes>> {
    let id = match parse_id(raw_id) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match state.service.get_by_id(id).await {
        Ok(article) => json_response(StatusCode::OK, &article),
        Err(e) => {
            debug!(article_id = id, error = %e, "Article read failed");
            error_response(e)
        }
    }
}

/// Handle `GET /articles`
pub async fn handle_list_articles(state: &AppState, query: Option<&str>) -> Response<Full<Bytes>> {
    let params = match ListQuery::parse(query) {
        Ok(params) => params,
        Err(e) => return error_response(e),
    };

    match state
        .service
        .fetch(&params.cursor, params.page_size())
        .await
    {
        Ok((page, next)) => {
            let mut response = json_response(StatusCode::OK, &page);
            if let Ok(value) = HeaderValue::from_str(&next) {
                response.headers_mut().insert(CURSOR_HEADER, value);
            }
            response
        }
        Err(e) => error_response(e),
    }
}

/// Handle `POST /articles`
pub async fn handle_create_article(state: &AppState, body: &[u8]) -> Response<Full<Bytes>> {
    let mut article = match ArticleInput::parse(body) {
        Ok(input) => input.into_article(),
        Err(e) => return error_response(e),
    };

    match state.service.store(&mut article).await {
        Ok(()) => json_response(StatusCode::CREATED, &article),
        Err(e) => {
            debug!(title = %article.title, error = %e, "Article create failed");
            error_response(e)
        }
    }
}

/// Handle `PUT /articles/{id}`
pub async fn handle_update_article(
    state: &AppState,
    raw_id: &str,
    body: &[u8],
) -> Response<Full<Bytes>> {
    let id = match parse_id(raw_id) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };
    let mut article = match ArticleInput::parse(body) {
        Ok(input) => input.into_article(),
        Err(e) => return error_response(e),
    };
    article.id = id;

    match state.service.update(&mut article).await {
        Ok(()) => json_response(StatusCode::OK, &article),
        Err(e) => error_response(e),
    }
}

/// Handle `DELETE /articles/{id}`
pub async fn handle_delete_article(state: &AppState, raw_id: &str) -> Response<Full<Bytes>> {
    let id = match parse_id(raw_id) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match state.service.delete(id).await {
        Ok(()) => empty_response(StatusCode::NO_CONTENT),
        Err(e) => error_response(e),
    }
}
