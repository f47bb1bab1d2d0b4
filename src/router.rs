use crate::handlers::{
    accounts::{login, login_form, logout, signup, signup_form},
    articles::{
        article_detail, create_article, delete_article, delete_article_form, edit_article_form,
        list_articles, new_article_form, update_article,
    },
    comments::create_comment,
    health::health_check,
    pages::home,
    password::{
        password_change, password_change_done, password_change_form, password_reset,
        password_reset_complete, password_reset_confirm, password_reset_confirm_form,
        password_reset_done, password_reset_form,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{routing::get, Router};
use axum_prometheus::PrometheusMetricLayer;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/", get(home))
        // Accounts
        .route("/accounts/signup/", get(signup_form).post(signup))
        .route("/accounts/login/", get(login_form).post(login))
        .route("/accounts/logout/", get(logout).post(logout))
        // Password change and reset
        .route(
            "/accounts/password_change/",
            get(password_change_form).post(password_change),
        )
        .route("/accounts/password_change/done/", get(password_change_done))
        .route(
            "/accounts/password_reset/",
            get(password_reset_form).post(password_reset),
        )
        .route("/accounts/password_reset/done/", get(password_reset_done))
        .route(
            "/accounts/reset/:uidb64/:token/",
            get(password_reset_confirm_form).post(password_reset_confirm),
        )
        .route("/accounts/reset/done/", get(password_reset_complete))
        // Articles and comments
        .route("/articles/", get(list_articles))
        .route("/articles/new/", get(new_article_form).post(create_article))
        .route(
            "/articles/details/:id",
            get(article_detail).post(create_comment),
        )
        .route(
            "/articles/edit/:id",
            get(edit_article_form).post(update_article),
        )
        .route(
            "/articles/delete/:id",
            get(delete_article_form).post(delete_article),
        )
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

fn with_middleware(router: Router<AppState>, state: AppState) -> Router {
    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        )
        .with_state(state)
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    with_middleware(routes(), state)
}

/// Router plus request metrics on `/metrics`.
///
/// The Prometheus recorder is process global and can only be installed once,
/// so only the served binary uses this.
pub fn create_router_with_metrics(state: AppState) -> Router {
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
    let router = routes()
        .route("/metrics", get(move || async move { metric_handle.render() }))
        .layer(prometheus_layer);
    with_middleware(router, state)
}
