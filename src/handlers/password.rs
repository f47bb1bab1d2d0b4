//! Password change for logged-in users and the emailed reset flow.

use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
    Form,
};
use chrono::Utc;
use model::entities::user;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use tera::Context;
use tracing::{debug, info, instrument, trace};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::delete_user_sessions;
use crate::auth::tokens::{decode_uid, encode_uid};
use crate::auth::{AuthUser, CurrentUser};
use crate::error::AppResult;
use crate::forms::{
    FormErrors, PasswordChangeForm, PasswordResetForm, SetPasswordForm, OLD_PASSWORD_INCORRECT,
};
use crate::handlers::found;
use crate::mail::EmailMessage;
use crate::schemas::AppState;
use crate::templates::{base_context, render, render_text};

fn password_change_page(
    state: &AppState,
    user: &user::Model,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut context = base_context(Some(user));
    context.insert("errors", errors);
    render(&state.templates, "registration/password_change_form.html", context)
}

/// Password change form
#[utoipa::path(
    get,
    path = "/accounts/password_change/",
    tag = "password",
    responses(
        (status = 200, description = "Password change form", body = String, content_type = "text/html"),
        (status = 302, description = "Not logged in, redirect to login")
    )
)]
#[instrument(skip(state, auth))]
pub async fn password_change_form(State(state): State<AppState>, auth: AuthUser) -> AppResult<Html<String>> {
    trace!("Entering password_change_form function");
    password_change_page(&state, &auth.user, &FormErrors::default())
}

/// Change the password of the logged-in user
#[utoipa::path(
    post,
    path = "/accounts/password_change/",
    tag = "password",
    request_body(content = PasswordChangeForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Password changed, or not logged in"),
        (status = 200, description = "Form re-rendered with errors", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, auth, form), fields(user_id = auth.user.id))]
pub async fn password_change(
    State(state): State<AppState>,
    auth: AuthUser,
    Form(form): Form<PasswordChangeForm>,
) -> AppResult<Response> {
    trace!("Entering password_change function");
    let mut errors = form.errors();
    if !form.old_password.is_empty() && !verify_password(&form.old_password, &auth.user.password) {
        errors.add("old_password", OLD_PASSWORD_INCORRECT);
    }
    if !errors.is_empty() {
        debug!("Password change rejected: {:?}", errors.fields.keys());
        return Ok(password_change_page(&state, &auth.user, &errors)?.into_response());
    }

    let hash = hash_password(&form.new_password1)?;
    let user_id = auth.user.id;

    let txn = state.db.begin().await?;
    let mut active: user::ActiveModel = auth.user.into();
    active.password = Set(hash);
    active.update(&txn).await?;
    delete_user_sessions(&txn, user_id, Some(&auth.session_key)).await?;
    txn.commit().await?;

    info!("User {} changed their password", user_id);
    Ok(found("/accounts/password_change/done/"))
}

/// Password change confirmation
#[utoipa::path(
    get,
    path = "/accounts/password_change/done/",
    tag = "password",
    responses(
        (status = 200, description = "Password changed page", body = String, content_type = "text/html"),
        (status = 302, description = "Not logged in, redirect to login")
    )
)]
#[instrument(skip(state, auth))]
pub async fn password_change_done(State(state): State<AppState>, auth: AuthUser) -> AppResult<Html<String>> {
    render(
        &state.templates,
        "registration/password_change_done.html",
        base_context(Some(&auth.user)),
    )
}

fn password_reset_page(
    state: &AppState,
    current: &CurrentUser,
    form: &PasswordResetForm,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut context = current.context();
    context.insert("form", form);
    context.insert("errors", errors);
    render(&state.templates, "registration/password_reset_form.html", context)
}

/// Password reset request form
#[utoipa::path(
    get,
    path = "/accounts/password_reset/",
    tag = "password",
    responses(
        (status = 200, description = "Email form", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, current))]
pub async fn password_reset_form(State(state): State<AppState>, current: CurrentUser) -> AppResult<Html<String>> {
    trace!("Entering password_reset_form function");
    password_reset_page(&state, &current, &PasswordResetForm::default(), &FormErrors::default())
}

/// Email a reset link to every active account with the given address
#[utoipa::path(
    post,
    path = "/accounts/password_reset/",
    tag = "password",
    request_body(content = PasswordResetForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Redirect to the sent page, whether or not an account matched"),
        (status = 200, description = "Form re-rendered with errors", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, current, form))]
pub async fn password_reset(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<PasswordResetForm>,
) -> AppResult<Response> {
    trace!("Entering password_reset function");
    let errors = form.errors();
    if !errors.is_empty() {
        return Ok(password_reset_page(&state, &current, &form, &errors)?.into_response());
    }

    let email = form.email.trim().to_lowercase();
    let users = user::Entity::find()
        .filter(Expr::expr(Func::lower(Expr::col(user::Column::Email))).eq(email))
        .filter(user::Column::IsActive.eq(true))
        .all(&state.db)
        .await?;
    debug!("{} account(s) match the reset request", users.len());

    let generator = state.token_generator();
    let now = Utc::now();
    let mut messages = Vec::with_capacity(users.len());
    for user in &users {
        let mut context = Context::new();
        context.insert("site_name", state.settings.site_domain());
        context.insert("site_url", state.settings.site_url.trim_end_matches('/'));
        context.insert("uid", &encode_uid(user.id));
        context.insert("token", &generator.make_token(user, now)?);
        context.insert("username", &user.username);

        let subject = render_text(&state.templates, "registration/password_reset_subject.txt", &context)?;
        messages.push(EmailMessage {
            from: state.settings.default_from_email.clone(),
            to: vec![user.email.clone()],
            // headers are single-line
            subject: subject.lines().collect::<String>(),
            body: render_text(&state.templates, "registration/password_reset_email.txt", &context)?,
        });
    }

    if !messages.is_empty() {
        let sent = state.mailer.send_messages(&messages).await?;
        info!("Sent {} password reset email(s)", sent);
    }
    Ok(found("/accounts/password_reset/done/"))
}

/// Reset email sent page
#[utoipa::path(
    get,
    path = "/accounts/password_reset/done/",
    tag = "password",
    responses(
        (status = 200, description = "Check your inbox page", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, current))]
pub async fn password_reset_done(State(state): State<AppState>, current: CurrentUser) -> AppResult<Html<String>> {
    render(&state.templates, "registration/password_reset_done.html", current.context())
}

/// The user a reset link belongs to, if the link is still valid.
async fn reset_link_user(state: &AppState, uidb64: &str, token: &str) -> AppResult<Option<user::Model>> {
    let Some(user_id) = decode_uid(uidb64) else {
        debug!("Reset link carries an undecodable uid");
        return Ok(None);
    };
    let Some(user) = user::Entity::find_by_id(user_id).one(&state.db).await? else {
        debug!("Reset link for unknown user {}", user_id);
        return Ok(None);
    };
    if !user.is_active || !state.token_generator().check_token(&user, token, Utc::now()) {
        debug!("Reset link for user {} is invalid or expired", user_id);
        return Ok(None);
    }
    Ok(Some(user))
}

fn password_reset_confirm_page(
    state: &AppState,
    current: &CurrentUser,
    validlink: bool,
    action: &str,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut context = current.context();
    context.insert("validlink", &validlink);
    context.insert("action", action);
    context.insert("errors", errors);
    render(&state.templates, "registration/password_reset_confirm.html", context)
}

/// New password form behind a reset link
#[utoipa::path(
    get,
    path = "/accounts/reset/{uidb64}/{token}/",
    tag = "password",
    params(
        ("uidb64" = String, Path, description = "Base64 encoded user id"),
        ("token" = String, Path, description = "Reset token")
    ),
    responses(
        (status = 200, description = "Form, or a page explaining the link is invalid", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, current, token))]
pub async fn password_reset_confirm_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((uidb64, token)): Path<(String, String)>,
) -> AppResult<Html<String>> {
    trace!("Entering password_reset_confirm_form function");
    let validlink = reset_link_user(&state, &uidb64, &token).await?.is_some();
    let action = format!("/accounts/reset/{uidb64}/{token}/");
    password_reset_confirm_page(&state, &current, validlink, &action, &FormErrors::default())
}

/// Set a new password through a reset link
#[utoipa::path(
    post,
    path = "/accounts/reset/{uidb64}/{token}/",
    tag = "password",
    params(
        ("uidb64" = String, Path, description = "Base64 encoded user id"),
        ("token" = String, Path, description = "Reset token")
    ),
    request_body(content = SetPasswordForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Password set, every session of the user ended"),
        (status = 200, description = "Invalid link, or form re-rendered with errors", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, current, token, form))]
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((uidb64, token)): Path<(String, String)>,
    Form(form): Form<SetPasswordForm>,
) -> AppResult<Response> {
    trace!("Entering password_reset_confirm function");
    let action = format!("/accounts/reset/{uidb64}/{token}/");
    let Some(user) = reset_link_user(&state, &uidb64, &token).await? else {
        return Ok(
            password_reset_confirm_page(&state, &current, false, &action, &FormErrors::default())?
                .into_response(),
        );
    };

    let errors = form.errors();
    if !errors.is_empty() {
        return Ok(password_reset_confirm_page(&state, &current, true, &action, &errors)?.into_response());
    }

    let hash = hash_password(&form.new_password1)?;
    let user_id = user.id;

    let txn = state.db.begin().await?;
    let mut active: user::ActiveModel = user.into();
    active.password = Set(hash);
    active.update(&txn).await?;
    delete_user_sessions(&txn, user_id, None).await?;
    txn.commit().await?;

    info!("Password of user {} reset through an emailed link", user_id);
    Ok(found("/accounts/reset/done/"))
}

/// Reset complete page
#[utoipa::path(
    get,
    path = "/accounts/reset/done/",
    tag = "password",
    responses(
        (status = 200, description = "Password set page", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, current))]
pub async fn password_reset_complete(State(state): State<AppState>, current: CurrentUser) -> AppResult<Html<String>> {
    render(&state.templates, "registration/password_reset_complete.html", current.context())
}
