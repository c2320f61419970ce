use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod engine;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api/v1", public_routes(app_state.clone()))
        .nest("/api/cron", cron_routes())
        .nest("/admin", admin_routes(app_state.clone()))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn public_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Writes that create state are rate limited per client IP
    let limited_writes = Router::new()
        .route("/users", post(handlers::users::create_user))
        .route(
            "/users/{id}/draft/answers",
            post(handlers::drafts::submit_answer),
        )
        .route(
            "/assessments/{id}/email",
            post(handlers::assessments::resend_results_email),
        )
        .layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::rate_limit_middleware,
        ));

    Router::new()
        .route("/questions", get(handlers::questions::get_questions))
        .route("/scores", post(handlers::questions::score_answers))
        .route("/users/{id}", get(handlers::users::get_user))
        .route(
            "/users/{id}/draft",
            get(handlers::drafts::get_draft).delete(handlers::drafts::discard_draft),
        )
        .route(
            "/users/{id}/draft/previous",
            post(handlers::drafts::previous_question),
        )
        .route(
            "/users/{id}/assessments",
            get(handlers::assessments::list_user_assessments),
        )
        .route(
            "/users/{id}/progress",
            get(handlers::assessments::user_progress),
        )
        .route(
            "/assessments/{id}",
            get(handlers::assessments::get_assessment),
        )
        .route(
            "/assessments/{id}/pdf",
            get(handlers::assessments::get_assessment_pdf),
        )
        .merge(limited_writes)
}

fn cron_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reminders", post(handlers::cron::run_reminders))
        .route("/cleanup-drafts", post(handlers::cron::cleanup_drafts))
}

fn admin_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let login = Router::new()
        .route("/auth/login", post(handlers::admin::login))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    // Layers run bottom-up: auth, then admin guard, then rate limit
    let protected = Router::new()
        .route(
            "/questions",
            get(handlers::admin::get_question_bank)
                .put(handlers::admin::put_question_override)
                .delete(handlers::admin::delete_question_override),
        )
        .route("/assessments", get(handlers::admin::list_assessments))
        .route(
            "/assessments/export",
            get(handlers::admin::export_assessments),
        )
        .route(
            "/assessments/{id}",
            get(handlers::admin::get_assessment_detail),
        )
        .route(
            "/assessments/{id}/pdf",
            get(handlers::admin::get_assessment_pdf),
        )
        .route("/drafts", get(handlers::admin::list_drafts))
        .route("/stats", get(handlers::admin::get_stats))
        .route(
            "/recommendations/preview",
            post(handlers::admin::preview_recommendations),
        )
        .route("/settings", get(handlers::admin::get_system_settings))
        .route(
            "/settings/email",
            put(handlers::admin::update_email_settings),
        )
        .route(
            "/settings/reminders",
            put(handlers::admin::update_reminder_settings),
        )
        .route(
            "/settings/site",
            put(handlers::admin::update_site_settings),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::admin_rate_limit_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    login.merge(protected)
}
