use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tera::Tera;
use utoipa::{OpenApi, ToSchema};

use crate::auth::tokens::PasswordResetTokenGenerator;
use crate::config::Settings;
use crate::forms::{
    ArticleForm, ArticleListQuery, CommentForm, LoginForm, PasswordChangeForm,
    PasswordResetForm, SetPasswordForm, SignupForm,
};
use crate::mail::EmailBackend;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Compiled page and email templates
    pub templates: Arc<Tera>,
    /// Outgoing mail
    pub mailer: Arc<dyn EmailBackend>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn token_generator(&self) -> PasswordResetTokenGenerator {
        PasswordResetTokenGenerator::new(
            self.settings.secret_key.clone(),
            self.settings.password_reset_timeout_secs,
        )
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::pages::home,
        crate::handlers::accounts::signup_form,
        crate::handlers::accounts::signup,
        crate::handlers::accounts::login_form,
        crate::handlers::accounts::login,
        crate::handlers::accounts::logout,
        crate::handlers::password::password_change_form,
        crate::handlers::password::password_change,
        crate::handlers::password::password_change_done,
        crate::handlers::password::password_reset_form,
        crate::handlers::password::password_reset,
        crate::handlers::password::password_reset_done,
        crate::handlers::password::password_reset_confirm_form,
        crate::handlers::password::password_reset_confirm,
        crate::handlers::password::password_reset_complete,
        crate::handlers::articles::list_articles,
        crate::handlers::articles::article_detail,
        crate::handlers::articles::new_article_form,
        crate::handlers::articles::create_article,
        crate::handlers::articles::edit_article_form,
        crate::handlers::articles::update_article,
        crate::handlers::articles::delete_article_form,
        crate::handlers::articles::delete_article,
        crate::handlers::comments::create_comment,
    ),
    components(
        schemas(
            HealthResponse,
            SignupForm,
            LoginForm,
            PasswordChangeForm,
            PasswordResetForm,
            SetPasswordForm,
            ArticleForm,
            CommentForm,
            ArticleListQuery,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "pages", description = "Static pages"),
        (name = "accounts", description = "Signup, login and logout"),
        (name = "password", description = "Password change and reset"),
        (name = "articles", description = "Article pages, editable by their author"),
        (name = "comments", description = "Comments on articles"),
    ),
    info(
        title = "Newsroom",
        description = "Newspaper site where journalists publish articles and comment on each other's work",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;
