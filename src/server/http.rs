//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::routes::{self, error_response};
use crate::services::ArticleService;
use crate::types::LecternError;
use crate::worker::SyncWorker;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub service: Arc<ArticleService>,
    pub worker: Arc<SyncWorker>,
}

impl AppState {
    pub fn new(args: Args, service: Arc<ArticleService>, worker: Arc<SyncWorker>) -> Self {
        Self {
            args,
            service,
            worker,
        }
    }
}

/// Serve HTTP until `shutdown` fires
pub async fn run(state: Arc<AppState>, shutdown: CancellationToken) -> Result<(), LecternError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Lectern listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory storage, nothing is persisted");
    }

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("HTTP server no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let method = parts.method;
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);

    debug!("[{}] {} {}", addr, method, path);

    let handled = async {
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("[{}] Request body error: {}", addr, e);
                return routes::with_cors(error_response(LecternError::BadRequest(
                    "failed to read request body".into(),
                )));
            }
        };
        dispatch(&state, &method, &path, query.as_deref(), &body).await
    };

    let response = match tokio::time::timeout(state.args.request_timeout(), handled).await {
        Ok(response) => response,
        Err(_) => {
            warn!("[{}] {} {} timed out", addr, method, path);
            routes::with_cors(error_response(LecternError::Internal(
                "request timed out".into(),
            )))
        }
    };

    Ok(to_boxed(response))
}

/// Match a request to its route. Every response allows any origin.
pub async fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: &[u8],
) -> Response<Full<Bytes>> {
    if *method == Method::OPTIONS {
        return routes::preflight_response();
    }

    let article_id = path
        .strip_prefix("/articles/")
        .filter(|id| !id.is_empty() && !id.contains('/'));

    let response = match (method, path, article_id) {
        (&Method::GET, "/health", _) => routes::health_check(state),
        (&Method::GET, "/articles", _) | (&Method::GET, "/articles/", _) => {
            routes::handle_list_articles(state, query).await
        }
        (&Method::POST, "/articles", _) | (&Method::POST, "/articles/", _) => {
            routes::handle_create_article(state, body).await
        }
        (&Method::GET, _, Some(id)) => routes::handle_get_article(state, id).await,
        (&Method::PUT, _, Some(id)) => routes::handle_update_article(state, id, body).await,
        (&Method::DELETE, _, Some(id)) => routes::handle_delete_article(state, id).await,
        _ => not_found_response(path),
    };

    routes::with_cors(response)
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    routes::json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "message": format!("no route for {}", path) }),
    )
}
