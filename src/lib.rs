//! Bidauth manages credentials and sessions for the bid-announcement
//! tracking platform.

#![forbid(unsafe_code)]

pub mod account;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod middleware;
mod router;
pub mod session;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

pub use auth::spawn_session_sweeper;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub crypto: Arc<crypto::Crypto>,
    pub token: token::TokenManager,
    pub auth: auth::AuthService,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(false).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    // Routes behind the access-token gateway.
    let protected = Router::new()
        .route("/me", get(router::me::handler))
        .route(
            "/revoke-all",
            post(router::revoke::handler)
                .route_layer(AxumMiddleware::from_fn(
                    middleware::require_superadmin,
                )),
        )
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    let auth_routes = Router::new()
        // `POST /auth/register` goes to `register`.
        .route("/register", post(router::register::handler))
        // `POST /auth/login` goes to `login`.
        .route("/login", post(router::login::handler))
        // `POST /auth/refresh` goes to `refresh`.
        .route("/refresh", post(router::refresh::handler))
        // `POST /auth/logout` goes to `logout`.
        .route("/logout", post(router::logout::handler))
        // `POST /auth/forgot-password` goes to `password`.
        .route("/forgot-password", post(router::password::forgot))
        .merge(protected);

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .nest("/auth", auth_routes)
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let db = match config.postgres {
        Some(ref config) => {
            database::Database::new(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    let salt = std::env::var("SALT")
        .expect("missing `SALT` environnement variable");
    let crypto = Arc::new(crypto::Crypto::new(config.argon2.clone(), &salt)?);

    // handle jwt. two distinct signing secrets, never from the config file.
    let access_secret = std::env::var("ACCESS_TOKEN_SECRET")
        .expect("missing `ACCESS_TOKEN_SECRET` environnement variable");
    let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET")
        .expect("missing `REFRESH_TOKEN_SECRET` environnement variable");
    let mut token =
        token::TokenManager::new(&access_secret, &refresh_secret);
    if let Some(ttls) = &config.token {
        token = token.with_ttls(
            chrono::Duration::seconds(
                ttls.access_ttl_seconds.unwrap_or(token::ACCESS_EXPIRATION),
            ),
            chrono::Duration::seconds(
                ttls.refresh_ttl_seconds
                    .unwrap_or(token::REFRESH_EXPIRATION),
            ),
        );
    }

    let limits = config
        .auth
        .as_ref()
        .map(auth::Limits::from)
        .unwrap_or_default();
    let auth = auth::AuthService::new(
        Arc::new(account::PgAccountStore::new(db.postgres.clone())),
        Arc::new(session::PgSessionStore::new(db.postgres.clone())),
        Arc::clone(&crypto),
        token.clone(),
        limits,
    );

    Ok(AppState {
        config,
        db,
        crypto,
        token,
        auth,
    })
}
