//! Lectern - article service with buffered view counting

use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lectern::{
    cache::{CacheBackend, CounterBuffer, MemoryBackend, ObjectCache, RedisBackend},
    config::Args,
    db::{
        ArticleRepository, AuthorRepository, InMemoryArticleRepository, InMemoryAuthorRepository,
        MongoArticleRepository, MongoAuthorRepository, MongoClient,
    },
    domain::{Article, Author},
    logging,
    server::{self, AppState},
    services::ArticleService,
    worker::SyncWorker,
};

type Repositories = (Arc<dyn ArticleRepository>, Arc<dyn AuthorRepository>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_json);

    if let Err(e) = args.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Lectern - articles & view counting");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Cache TTL: {}s", args.cache_ttl_secs);
    info!("View sync interval: {}s", args.sync_interval_secs);
    info!("View flush threshold: {}", args.view_flush_threshold);
    info!("======================================");

    let backend = connect_cache(&args).await;
    let (articles, authors) = connect_storage(&args).await?;

    let cache = Arc::new(ObjectCache::new(Arc::clone(&backend), &args.cache_config()));
    let counters = Arc::new(CounterBuffer::new(backend));

    let service = Arc::new(ArticleService::new(
        Arc::clone(&articles),
        authors,
        cache,
        Arc::clone(&counters),
        args.read_config(),
    ));

    let shutdown = CancellationToken::new();

    let worker = Arc::new(SyncWorker::new(articles, counters, args.sync_config()));
    let worker_handle = Arc::clone(&worker).spawn(shutdown.child_token());

    let state = Arc::new(AppState::new(args, Arc::clone(&service), worker));
    let mut server_handle = tokio::spawn(server::run(state, shutdown.child_token()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => warn!("HTTP server exited"),
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("HTTP server task error: {}", e),
            }
        }
    }

    shutdown.cancel();

    if !server_handle.is_finished() {
        if let Err(e) = server_handle.await {
            error!("HTTP server task error: {}", e);
        }
    }

    // Final view flush happens before the worker task completes
    if let Err(e) = worker_handle.await {
        error!("View sync worker task error: {}", e);
    }

    service.wait_background().await;

    info!("Lectern stopped");
    Ok(())
}

async fn connect_cache(args: &Args) -> Arc<dyn CacheBackend> {
    if args.dev_mode {
        warn!("Dev mode: using in-process cache backend");
        return Arc::new(MemoryBackend::new());
    }

    match RedisBackend::connect(&args.redis_url).await {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            error!("Redis connection failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn connect_storage(args: &Args) -> anyhow::Result<Repositories> {
    let Some(uri) = args.mongodb_uri.as_deref().filter(|_| !args.dev_mode) else {
        warn!("Dev mode: using in-memory repositories");
        return seed_dev_storage().await;
    };

    let mongo = match MongoClient::new(uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let authors: Arc<dyn AuthorRepository> = Arc::new(MongoAuthorRepository::new(&mongo).await?);
    let articles: Arc<dyn ArticleRepository> = Arc::new(MongoArticleRepository::new(mongo).await?);
    Ok((articles, authors))
}

/// In-memory storage with one author and one article to read
async fn seed_dev_storage() -> anyhow::Result<Repositories> {
    let articles = Arc::new(InMemoryArticleRepository::new());
    let authors = Arc::new(InMemoryAuthorRepository::new());

    let now = chrono::Utc::now();
    authors
        .insert(Author {
            id: 1,
            name: "Dev Author".into(),
            username: "dev".into(),
            created_at: now,
            updated_at: now,
        })
        .await;

    let mut article = Article::new(
        "Hello, Lectern",
        "Read me a few times and watch the view count.",
        1,
    );
    article.created_at = now;
    article.updated_at = now;
    articles.store(&mut article).await?;
    info!(article_id = article.id, "Seeded dev article");

    Ok((articles as Arc<dyn ArticleRepository>, authors as Arc<dyn AuthorRepository>))
}
