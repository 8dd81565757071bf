//! HTTP surface: router, server bootstrap and the layer stack.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::body::Body;
use axum::extract::{Extension, MatchedPath};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, Request};
use axum::middleware as axum_middleware;
use axum::routing::{get, post, put};
use axum::Router;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::PropagateRequestIdLayer;
use tower_http::set_header::SetRequestHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

use crate::auth::accounts::AccountStore;
use crate::auth::notify::Notifier;
use crate::auth::otp::OtpStore;
use crate::auth::token::TokenIssuer;
use crate::auth::{AuthConfig, AuthService};

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod response;

use handlers::{admin, auth as auth_handlers, health};

/// Everything the server needs, assembled by the CLI.
pub struct ServerSettings {
    pub port: u16,
    pub dsn: String,
    pub frontend_origin: String,
    pub jwt_secret: SecretString,
    pub jwt_ttl_hours: i64,
    pub auth: AuthConfig,
    pub notifier: Arc<dyn Notifier>,
}

/// Connect, migrate, wire the orchestrator and serve until interrupted.
pub async fn new(settings: ServerSettings) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&settings.dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let service = Arc::new(AuthService::new(
        AccountStore::new(pool.clone()),
        OtpStore::new(pool.clone()),
        TokenIssuer::new(settings.jwt_secret, settings.jwt_ttl_hours),
        settings.notifier,
        settings.auth,
    ));

    let app = router(service, pool, &settings.frontend_origin)?;

    let listener = TcpListener::bind(format!("::0:{}", settings.port)).await?;

    info!("Listening on [::]:{}", settings.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Full application router with gates and the shared layer stack.
pub fn router(
    service: Arc<AuthService>,
    pool: PgPool,
    frontend_origin: &str,
) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(AllowOrigin::exact(origin_header(frontend_origin)?))
        .allow_credentials(true);

    let public = Router::new()
        .route("/api/auth/signup", post(auth_handlers::signup::signup))
        .route("/api/auth/login", post(auth_handlers::login::login))
        .route("/api/auth/verify-otp", post(auth_handlers::otp::verify_otp))
        .route("/api/auth/resend-otp", post(auth_handlers::otp::resend_otp))
        .route("/api/auth/send-otp", post(auth_handlers::otp::send_otp))
        .route(
            "/api/auth/reset-password",
            post(auth_handlers::password::reset_password),
        );

    // Change-password stays reachable while the forced-change gate is up,
    // otherwise a provisioned user could never clear it.
    let authed = Router::new()
        .route(
            "/api/auth/change-password",
            post(auth_handlers::password::change_password),
        )
        .layer(axum_middleware::from_fn(middleware::require_auth));

    let admin_routes = Router::new()
        .route(
            "/api/admin/users",
            get(admin::list_users)
                .post(admin::create_user)
                .delete(admin::delete_users),
        )
        .route(
            "/api/admin/users/:id",
            put(admin::update_user).delete(admin::delete_user),
        )
        .layer(axum_middleware::from_fn(middleware::require_admin))
        .layer(axum_middleware::from_fn(
            middleware::require_password_changed,
        ))
        .layer(axum_middleware::from_fn(middleware::require_auth));

    Ok(Router::new()
        .merge(public)
        .merge(authed)
        .merge(admin_routes)
        .route("/", get(handlers::root))
        .route("/health", get(health::health))
        .route("/openapi.json", get(openapi::openapi_json))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(service))
                .layer(Extension(pool)),
        ))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn origin_header(frontend_origin: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_origin)
        .with_context(|| format!("Invalid frontend origin: {frontend_origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend origin must include a valid host: {frontend_origin}"))?;
    let origin = match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    };
    HeaderValue::from_str(&origin)
        .with_context(|| format!("Invalid frontend origin: {frontend_origin}"))
}

#[cfg(test)]
mod tests {
    use super::origin_header;

    #[test]
    fn origin_drops_path_and_keeps_port() {
        let value = origin_header("http://localhost:5173/dashboard").expect("origin");
        assert_eq!(value.to_str().expect("ascii"), "http://localhost:5173");
    }

    #[test]
    fn origin_rejects_garbage() {
        assert!(origin_header("not a url").is_err());
    }
}
