//! Bazaar shop API server.
//!
//! Serves the JSON API on port 5000 by default.
//!
//! # Backends
//!
//! - `PostgreSQL` for users and products (required)
//! - Redis for refresh tokens and the featured list when `REDIS_URL` is set,
//!   otherwise an in-process cache
//! - SMTP for password reset email when `SMTP_HOST` is set, otherwise the
//!   message is logged

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use bazaar_storefront::cache::{MemorySessionCache, RedisSessionCache, SessionCache};
use bazaar_storefront::clock::SystemClock;
use bazaar_storefront::config::StorefrontConfig;
use bazaar_storefront::db::{self, PgProductStore, PgUserStore};
use bazaar_storefront::routes;
use bazaar_storefront::services::email::{EmailSender, LogEmailSender, SmtpEmailSender};
use bazaar_storefront::state::{AppState, Backends};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn session_cache(
    config: &StorefrontConfig,
) -> Result<Arc<dyn SessionCache>, Box<dyn std::error::Error>> {
    if let Some(redis) = &config.redis {
        let cache = RedisSessionCache::connect(redis)?;
        tracing::info!(pool_size = redis.pool_size, "Using Redis session cache");
        return Ok(Arc::new(cache));
    }

    tracing::warn!("REDIS_URL not set; sessions live in process memory and end on restart");
    Ok(Arc::new(MemorySessionCache::default()))
}

fn email_sender(
    config: &StorefrontConfig,
) -> Result<Arc<dyn EmailSender>, Box<dyn std::error::Error>> {
    if let Some(email) = &config.email {
        let sender = SmtpEmailSender::new(email)?;
        tracing::info!(smtp_host = %email.smtp_host, "Using SMTP email delivery");
        return Ok(Arc::new(sender));
    }

    tracing::warn!("SMTP_HOST not set; outgoing email is logged, not sent");
    Ok(Arc::new(LogEmailSender))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env()?;

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bazaar_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Migrations are not run on startup: `cargo run -p bazaar-cli -- migrate`

    let backends = Backends {
        users: Arc::new(PgUserStore::new(pool.clone())),
        products: Arc::new(PgProductStore::new(pool)),
        cache: session_cache(&config)?,
        mailer: email_sender(&config)?,
        clock: Arc::new(SystemClock),
    };
    let state = AppState::new(config.clone(), backends);

    let app = routes::app(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Connect info feeds the rate limiter when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
