//! Server-side HTML via tera. Templates are compiled into the binary.

use axum::response::Html;
use model::entities::user;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{debug, trace};

use crate::auth::CurrentUser;
use crate::error::AppError;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("home.html", include_str!("../templates/home.html")),
    (
        "registration/login.html",
        include_str!("../templates/registration/login.html"),
    ),
    (
        "registration/signup.html",
        include_str!("../templates/registration/signup.html"),
    ),
    (
        "registration/password_change_form.html",
        include_str!("../templates/registration/password_change_form.html"),
    ),
    (
        "registration/password_change_done.html",
        include_str!("../templates/registration/password_change_done.html"),
    ),
    (
        "registration/password_reset_form.html",
        include_str!("../templates/registration/password_reset_form.html"),
    ),
    (
        "registration/password_reset_done.html",
        include_str!("../templates/registration/password_reset_done.html"),
    ),
    (
        "registration/password_reset_confirm.html",
        include_str!("../templates/registration/password_reset_confirm.html"),
    ),
    (
        "registration/password_reset_complete.html",
        include_str!("../templates/registration/password_reset_complete.html"),
    ),
    (
        "registration/password_reset_email.txt",
        include_str!("../templates/registration/password_reset_email.txt"),
    ),
    (
        "registration/password_reset_subject.txt",
        include_str!("../templates/registration/password_reset_subject.txt"),
    ),
    (
        "articles/article_list.html",
        include_str!("../templates/articles/article_list.html"),
    ),
    (
        "articles/article_detail.html",
        include_str!("../templates/articles/article_detail.html"),
    ),
    (
        "articles/article_new.html",
        include_str!("../templates/articles/article_new.html"),
    ),
    (
        "articles/article_edit.html",
        include_str!("../templates/articles/article_edit.html"),
    ),
    (
        "articles/article_delete.html",
        include_str!("../templates/articles/article_delete.html"),
    ),
];

/// Compile every page and email template.
pub fn load_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    // added together so child templates can resolve `base.html`
    tera.add_raw_templates(TEMPLATES.iter().copied())?;
    debug!("Loaded {} templates", TEMPLATES.len());
    Ok(tera)
}

/// The logged-in user as templates see it.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i32,
    pub username: String,
    pub display_name: String,
}

impl From<&user::Model> for UserView {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
        }
    }
}

/// Context every page starts from.
pub fn base_context(user: Option<&user::Model>) -> Context {
    let mut context = Context::new();
    context.insert("user", &user.map(UserView::from));
    context
}

impl CurrentUser {
    pub fn context(&self) -> Context {
        base_context(self.user.as_ref())
    }
}

pub fn render_text(tera: &Tera, name: &str, context: &Context) -> Result<String, AppError> {
    Ok(tera.render(name, context)?)
}

/// Render a page. The template name is exposed on `<body data-template>`.
pub fn render(tera: &Tera, name: &str, mut context: Context) -> Result<Html<String>, AppError> {
    trace!("Rendering template {}", name);
    context.insert("template_name", name);
    Ok(Html(tera.render(name, &context)?))
}
