use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    Form,
};
use chrono::Utc;
use model::entities::user;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect,
    Set, SqlErr, TransactionTrait,
};
use serde::Deserialize;
use tera::Context;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::IntoParams;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::{
    end_session, removal_cookie, session_cookie, start_session, with_cookie,
};
use crate::auth::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::forms::{FormErrors, LoginForm, SignupForm, INVALID_LOGIN, USERNAME_TAKEN};
use crate::handlers::{found, is_safe_redirect, LOGIN_URL};
use crate::schemas::AppState;
use crate::templates::render;

/// Query string of the login page
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
pub struct LoginQuery {
    /// Path to continue to after logging in
    pub next: Option<String>,
}

/// Case-insensitive username lookup.
///
/// Folding happens in Rust on both sides, since SQLite `LOWER()` only folds ASCII.
pub(crate) async fn username_taken<C>(db: &C, username: &str) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let wanted = username.to_lowercase();
    let usernames: Vec<String> = user::Entity::find()
        .select_only()
        .column(user::Column::Username)
        .into_tuple()
        .all(db)
        .await?;
    Ok(usernames.iter().any(|taken| taken.to_lowercase() == wanted))
}

/// The active user matching `username` and `password`.
async fn authenticate<C>(db: &C, username: &str, password: &str) -> Result<Option<user::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let Some(found) = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
    else {
        debug!("No user named {}", username);
        return Ok(None);
    };

    if !found.is_active {
        debug!("User {} is inactive", found.id);
        return Ok(None);
    }
    if !verify_password(password, &found.password) {
        debug!("Wrong password for user {}", found.id);
        return Ok(None);
    }
    Ok(Some(found))
}

fn signup_page(
    state: &AppState,
    current: &CurrentUser,
    form: &SignupForm,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut context = current.context();
    context.insert("form", form);
    context.insert("errors", errors);
    render(&state.templates, "registration/signup.html", context)
}

fn login_page(
    state: &AppState,
    current: &CurrentUser,
    form: &LoginForm,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut context: Context = current.context();
    context.insert("form", form);
    context.insert("errors", errors);
    render(&state.templates, "registration/login.html", context)
}

/// Signup form
#[utoipa::path(
    get,
    path = "/accounts/signup/",
    tag = "accounts",
    responses(
        (status = 200, description = "Signup form", body = String, content_type = "text/html"),
        (status = 403, description = "Already logged in")
    )
)]
#[instrument(skip(state, current))]
pub async fn signup_form(State(state): State<AppState>, current: CurrentUser) -> AppResult<Html<String>> {
    trace!("Entering signup_form function");
    if current.is_authenticated() {
        return Err(AppError::PermissionDenied);
    }
    signup_page(&state, &current, &SignupForm::default(), &FormErrors::default())
}

/// Create an account
#[utoipa::path(
    post,
    path = "/accounts/signup/",
    tag = "accounts",
    request_body(content = SignupForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Account created, redirect to the login page"),
        (status = 200, description = "Form re-rendered with errors", body = String, content_type = "text/html"),
        (status = 403, description = "Already logged in")
    )
)]
#[instrument(skip(state, current, form), fields(username = %form.username))]
pub async fn signup(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    trace!("Entering signup function");
    if current.is_authenticated() {
        return Err(AppError::PermissionDenied);
    }

    let mut errors = form.errors();
    if !errors.has("username") && username_taken(&state.db, &form.username).await? {
        errors.add("username", USERNAME_TAKEN);
    }
    if !errors.is_empty() {
        debug!("Signup rejected: {:?}", errors);
        return Ok(signup_page(&state, &current, &form, &errors)?.into_response());
    }

    let new_user = user::ActiveModel {
        username: Set(form.username.clone()),
        email: Set(form.email.trim().to_string()),
        password: Set(hash_password(&form.password1)?),
        age: Set(form.age_value()),
        ..Default::default()
    };

    match new_user.insert(&state.db).await {
        Ok(created) => {
            info!("User created with ID: {}, username: {}", created.id, created.username);
            Ok(found(LOGIN_URL))
        }
        // lost a race with a concurrent signup
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            warn!("Username '{}' was taken concurrently", form.username);
            errors.add("username", USERNAME_TAKEN);
            Ok(signup_page(&state, &current, &form, &errors)?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Login form
#[utoipa::path(
    get,
    path = "/accounts/login/",
    tag = "accounts",
    params(LoginQuery),
    responses(
        (status = 200, description = "Login form", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, current))]
pub async fn login_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<LoginQuery>,
) -> AppResult<Html<String>> {
    trace!("Entering login_form function");
    let form = LoginForm {
        next: query.next.unwrap_or_default(),
        ..Default::default()
    };
    login_page(&state, &current, &form, &FormErrors::default())
}

/// Log in
#[utoipa::path(
    post,
    path = "/accounts/login/",
    tag = "accounts",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Logged in, session cookie set"),
        (status = 200, description = "Invalid credentials", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, current, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    trace!("Entering login function");
    let mut errors = form.errors();

    if errors.is_empty() {
        match authenticate(&state.db, &form.username, &form.password).await? {
            Some(user) => {
                let age = state.settings.session_age_secs;
                let user_id = user.id;

                let txn = state.db.begin().await?;
                if let Some(previous) = &current.session_key {
                    end_session(&txn, previous).await?;
                }
                let session = start_session(&txn, user_id, age).await?;
                let mut active: user::ActiveModel = user.into();
                active.last_login = Set(Some(Utc::now()));
                active.update(&txn).await?;
                txn.commit().await?;

                info!("User {} logged in", user_id);
                let target = if is_safe_redirect(&form.next) { form.next.as_str() } else { "/" };
                return Ok(with_cookie(
                    found(target),
                    session_cookie(&session.session_key, age),
                ));
            }
            None => errors.add_non_field(INVALID_LOGIN),
        }
    }

    Ok(login_page(&state, &current, &form, &errors)?.into_response())
}

/// Log out
#[utoipa::path(
    post,
    path = "/accounts/logout/",
    tag = "accounts",
    responses(
        (status = 302, description = "Session deleted, redirect home")
    )
)]
#[instrument(skip(state, current))]
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> AppResult<Response> {
    trace!("Entering logout function");
    if let Some(session_key) = &current.session_key {
        end_session(&state.db, session_key).await?;
    }
    if let Some(user) = &current.user {
        info!("User {} logged out", user.id);
    }
    Ok(with_cookie(found("/"), removal_cookie()))
}
