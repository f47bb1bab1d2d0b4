use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Form,
};
use model::entities::{article, comment};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tracing::{debug, info, instrument, trace};

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::forms::CommentForm;
use crate::handlers::articles::{article_detail_page, load_article_view, ArticleId};
use crate::handlers::found;
use crate::schemas::AppState;

/// Comment on an article
#[utoipa::path(
    post,
    path = "/articles/details/{id}",
    tag = "comments",
    params(("id" = i32, Path, description = "Article ID")),
    request_body(content = CommentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Comment saved, redirect back to the article, or not logged in"),
        (status = 200, description = "Article re-rendered with form errors", body = String, content_type = "text/html"),
        (status = 404, description = "Article not found")
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    ArticleId(id): ArticleId,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    trace!("Entering create_comment function");

    let errors = form.errors();
    if !errors.is_empty() {
        debug!("Comment on article {} rejected: {:?}", id, errors);
        let article = load_article_view(&state, id, auth.user.id).await?;
        return Ok(article_detail_page(&state, &auth.user, &article, &form, &errors)?.into_response());
    }

    if article::Entity::find_by_id(id).one(&state.db).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let created = comment::ActiveModel {
        comment: Set(form.comment),
        article_id: Set(id),
        author_id: Set(auth.user.id),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Comment {} added to article {} by user {}", created.id, id, auth.user.id);
    Ok(found(&format!("/articles/details/{id}")))
}
