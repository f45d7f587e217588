use axum::Router;
use axum::http::{HeaderValue, Method, header, request::Parts};
use axum::routing::{get, patch, post};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod session;
pub mod utils;

use config::Config;
use notify::Mailer;
use session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub sessions: SessionStore,
    pub mailer: Option<Mailer>,
}

/// 组装完整路由。公开路由与受保护路由分开，
/// 受保护部分挂认证中间件（只解析身份，不做拒绝）
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(routes::user::register))
        .route("/login", post(routes::user::login))
        .route("/auth/request-reset", post(routes::user::request_password_reset))
        .route("/auth/reset-password", post(routes::user::reset_password));

    let protected_routes = Router::new()
        .route("/logout", post(routes::user::logout))
        .route("/user", get(routes::user::current_user))
        .route(
            "/users",
            get(routes::user::list_users).post(routes::user::create_user),
        )
        .route(
            "/reports",
            get(routes::report::list_reports).post(routes::report::create_report),
        )
        .route(
            "/reports/{id}",
            get(routes::report::get_report).delete(routes::report::delete_report),
        )
        .route("/reports/{id}/status", patch(routes::report::update_status))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // 前端单独部署：配置了 CORS_ORIGIN 就按来源放行并带凭据，否则全放（开发）
    let cors = match &state.config.cors_origin {
        Some(origin) => {
            let origin = origin.clone().into_bytes();
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(
                    move |value: &HeaderValue, _: &Parts| value.as_bytes() == origin.as_slice(),
                ))
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        }
        None => CorsLayer::permissive(),
    };

    Router::new()
        .nest(
            "/api",
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(axum::middleware::from_fn(middleware::log_errors)),
        )
        .with_state(state)
}
