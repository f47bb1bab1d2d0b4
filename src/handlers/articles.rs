use std::collections::HashMap;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::request::Parts,
    response::{Html, IntoResponse, Response},
    Form,
};
use axum_valid::Valid;
use model::entities::{article, comment, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::forms::{ArticleListQuery, ArticleForm, CommentForm, FormErrors};
use crate::handlers::found;
use crate::schemas::AppState;
use crate::templates::{base_context, render};

const DATE_FORMAT: &str = "%b %-d, %Y, %H:%M";

/// A comment as rendered under its article
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i32,
    pub comment: String,
    pub author: String,
}

/// An article with its author and comments, from one viewer's point of view
#[derive(Debug, Clone, Serialize)]
pub struct ArticleView {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub date: String,
    pub author: String,
    pub is_owner: bool,
    pub comments: Vec<CommentView>,
}

/// Article id from the path. Anything that is not an integer is a 404.
#[derive(Debug, Clone, Copy)]
pub struct ArticleId(pub i32);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ArticleId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<i32>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(Self(id)),
            Err(rejection) => {
                debug!("No article route for {}: {}", parts.uri.path(), rejection);
                Err(AppError::NotFound)
            }
        }
    }
}

fn author_name(author: Option<&user::Model>) -> String {
    author.map(|u| u.username.clone()).unwrap_or_default()
}

/// Attach comments to `rows`, two queries regardless of page size.
pub(crate) async fn article_views<C>(
    db: &C,
    rows: Vec<(article::Model, Option<user::Model>)>,
    viewer_id: i32,
) -> Result<Vec<ArticleView>, DbErr>
where
    C: ConnectionTrait,
{
    let ids: Vec<i32> = rows.iter().map(|(a, _)| a.id).collect();
    let mut comments_by_article: HashMap<i32, Vec<CommentView>> = HashMap::new();
    if !ids.is_empty() {
        let comments = comment::Entity::find()
            .filter(comment::Column::ArticleId.is_in(ids))
            .order_by_asc(comment::Column::Id)
            .find_also_related(user::Entity)
            .all(db)
            .await?;
        for (comment, author) in comments {
            comments_by_article
                .entry(comment.article_id)
                .or_default()
                .push(CommentView {
                    id: comment.id,
                    comment: comment.comment,
                    author: author_name(author.as_ref()),
                });
        }
    }

    Ok(rows
        .into_iter()
        .map(|(article, author)| ArticleView {
            id: article.id,
            is_owner: article.is_authored_by(viewer_id),
            date: article.date.format(DATE_FORMAT).to_string(),
            author: author_name(author.as_ref()),
            comments: comments_by_article.remove(&article.id).unwrap_or_default(),
            title: article.title,
            body: article.body,
        })
        .collect())
}

/// Load one article with its author and comments, or 404.
pub(crate) async fn load_article_view(state: &AppState, id: i32, viewer_id: i32) -> AppResult<ArticleView> {
    let row = article::Entity::find_by_id(id)
        .find_also_related(user::Entity)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;
    article_views(&state.db, vec![row], viewer_id)
        .await?
        .pop()
        .ok_or(AppError::NotFound)
}

/// Render the detail page with a comment form.
pub(crate) fn article_detail_page(
    state: &AppState,
    viewer: &user::Model,
    article: &ArticleView,
    form: &CommentForm,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut context = base_context(Some(viewer));
    context.insert("article", article);
    context.insert("form", form);
    context.insert("errors", errors);
    render(&state.templates, "articles/article_detail.html", context)
}

/// The article `id` if `user` wrote it. Missing → 404, someone else's → 403.
async fn owned_article(state: &AppState, id: i32, user: &user::Model) -> AppResult<article::Model> {
    let article = article::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;
    if !article.is_authored_by(user.id) {
        warn!("User {} tried to modify article {} of user {}", user.id, id, article.author_id);
        return Err(AppError::PermissionDenied);
    }
    Ok(article)
}

/// List articles
#[utoipa::path(
    get,
    path = "/articles/",
    tag = "articles",
    params(ArticleListQuery),
    responses(
        (status = 200, description = "Articles with their comments", body = String, content_type = "text/html"),
        (status = 302, description = "Not logged in, redirect to login"),
        (status = 400, description = "Page or limit out of range")
    )
)]
#[instrument(skip(state, auth))]
pub async fn list_articles(
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Query(query)): Valid<Query<ArticleListQuery>>,
) -> AppResult<Html<String>> {
    trace!("Entering list_articles function");
    let page = query.page();
    let limit = query.limit();
    debug!("Fetching articles - page: {}, limit: {}", page, limit);

    let paginator = article::Entity::find()
        .order_by_asc(article::Column::Id)
        .find_also_related(user::Entity)
        .paginate(&state.db, limit);
    let num_pages = paginator.num_pages().await?;
    let rows = paginator.fetch_page(page - 1).await?;
    let articles = article_views(&state.db, rows, auth.user.id).await?;
    debug!("Retrieved {} articles", articles.len());

    let mut context = base_context(Some(&auth.user));
    context.insert("articles", &articles);
    context.insert("page", &page);
    context.insert("limit", &limit);
    context.insert("num_pages", &num_pages);
    render(&state.templates, "articles/article_list.html", context)
}

/// Article detail
#[utoipa::path(
    get,
    path = "/articles/details/{id}",
    tag = "articles",
    params(("id" = i32, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article with comments and a comment form", body = String, content_type = "text/html"),
        (status = 302, description = "Not logged in, redirect to login"),
        (status = 404, description = "Article not found")
    )
)]
#[instrument(skip(state, auth))]
pub async fn article_detail(
    State(state): State<AppState>,
    auth: AuthUser,
    ArticleId(id): ArticleId,
) -> AppResult<Html<String>> {
    trace!("Entering article_detail function");
    let article = load_article_view(&state, id, auth.user.id).await?;
    article_detail_page(&state, &auth.user, &article, &CommentForm::default(), &FormErrors::default())
}

fn article_new_page(
    state: &AppState,
    user: &user::Model,
    form: &ArticleForm,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut context = base_context(Some(user));
    context.insert("form", form);
    context.insert("errors", errors);
    render(&state.templates, "articles/article_new.html", context)
}

/// New article form
#[utoipa::path(
    get,
    path = "/articles/new/",
    tag = "articles",
    responses(
        (status = 200, description = "Empty article form", body = String, content_type = "text/html"),
        (status = 302, description = "Not logged in, redirect to login")
    )
)]
#[instrument(skip(state, auth))]
pub async fn new_article_form(State(state): State<AppState>, auth: AuthUser) -> AppResult<Html<String>> {
    trace!("Entering new_article_form function");
    article_new_page(&state, &auth.user, &ArticleForm::default(), &FormErrors::default())
}

/// Publish an article as the logged-in user
#[utoipa::path(
    post,
    path = "/articles/new/",
    tag = "articles",
    request_body(content = ArticleForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Created, redirect to the article, or not logged in"),
        (status = 200, description = "Form re-rendered with errors", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn create_article(
    State(state): State<AppState>,
    auth: AuthUser,
    Form(form): Form<ArticleForm>,
) -> AppResult<Response> {
    trace!("Entering create_article function");
    let errors = form.errors();
    if !errors.is_empty() {
        return Ok(article_new_page(&state, &auth.user, &form, &errors)?.into_response());
    }

    let created = article::ActiveModel {
        title: Set(form.title),
        body: Set(form.body),
        author_id: Set(auth.user.id),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Article {} created by user {}", created.id, auth.user.id);
    Ok(found(&format!("/articles/details/{}", created.id)))
}

fn article_edit_page(
    state: &AppState,
    user: &user::Model,
    article_id: i32,
    form: &ArticleForm,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut context = base_context(Some(user));
    context.insert("article_id", &article_id);
    context.insert("form", form);
    context.insert("errors", errors);
    render(&state.templates, "articles/article_edit.html", context)
}

/// Edit form, prefilled
#[utoipa::path(
    get,
    path = "/articles/edit/{id}",
    tag = "articles",
    params(("id" = i32, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Prefilled article form", body = String, content_type = "text/html"),
        (status = 302, description = "Not logged in, redirect to login"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Article not found")
    )
)]
#[instrument(skip(state, auth))]
pub async fn edit_article_form(
    State(state): State<AppState>,
    auth: AuthUser,
    ArticleId(id): ArticleId,
) -> AppResult<Html<String>> {
    trace!("Entering edit_article_form function");
    let article = owned_article(&state, id, &auth.user).await?;
    let form = ArticleForm {
        title: article.title,
        body: article.body,
    };
    article_edit_page(&state, &auth.user, id, &form, &FormErrors::default())
}

/// Update an article
#[utoipa::path(
    post,
    path = "/articles/edit/{id}",
    tag = "articles",
    params(("id" = i32, Path, description = "Article ID")),
    request_body(content = ArticleForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Updated, redirect to the article, or not logged in"),
        (status = 200, description = "Form re-rendered with errors", body = String, content_type = "text/html"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Article not found")
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn update_article(
    State(state): State<AppState>,
    auth: AuthUser,
    ArticleId(id): ArticleId,
    Form(form): Form<ArticleForm>,
) -> AppResult<Response> {
    trace!("Entering update_article function");
    let article = owned_article(&state, id, &auth.user).await?;

    let errors = form.errors();
    if !errors.is_empty() {
        return Ok(article_edit_page(&state, &auth.user, id, &form, &errors)?.into_response());
    }

    let mut active: article::ActiveModel = article.into();
    active.title = Set(form.title);
    active.body = Set(form.body);
    active.update(&state.db).await?;

    info!("Article {} updated", id);
    Ok(found(&format!("/articles/details/{id}")))
}

/// Delete confirmation
#[utoipa::path(
    get,
    path = "/articles/delete/{id}",
    tag = "articles",
    params(("id" = i32, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Confirmation page", body = String, content_type = "text/html"),
        (status = 302, description = "Not logged in, redirect to login"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Article not found")
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_article_form(
    State(state): State<AppState>,
    auth: AuthUser,
    ArticleId(id): ArticleId,
) -> AppResult<Html<String>> {
    trace!("Entering delete_article_form function");
    let article = owned_article(&state, id, &auth.user).await?;

    let mut context = base_context(Some(&auth.user));
    context.insert("article", &serde_json::json!({ "id": article.id, "title": article.title }));
    render(&state.templates, "articles/article_delete.html", context)
}

/// Delete an article and its comments
#[utoipa::path(
    post,
    path = "/articles/delete/{id}",
    tag = "articles",
    params(("id" = i32, Path, description = "Article ID")),
    responses(
        (status = 302, description = "Deleted, redirect to the list, or not logged in"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Article not found")
    )
)]
#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn delete_article(
    State(state): State<AppState>,
    auth: AuthUser,
    ArticleId(id): ArticleId,
) -> AppResult<Response> {
    trace!("Entering delete_article function");
    let article = owned_article(&state, id, &auth.user).await?;

    let txn = state.db.begin().await?;
    let comments = comment::Entity::delete_many()
        .filter(comment::Column::ArticleId.eq(article.id))
        .exec(&txn)
        .await?;
    article::Entity::delete_by_id(article.id).exec(&txn).await?;
    txn.commit().await?;

    info!("Article {} deleted with {} comment(s)", id, comments.rows_affected);
    Ok(found("/articles/"))
}
