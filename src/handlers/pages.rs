use axum::{extract::State, response::Html};
use tracing::{instrument, trace};

use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::schemas::AppState;
use crate::templates::render;

/// Homepage
#[utoipa::path(
    get,
    path = "/",
    tag = "pages",
    responses(
        (status = 200, description = "Homepage", body = String, content_type = "text/html")
    )
)]
#[instrument(skip(state, current))]
pub async fn home(State(state): State<AppState>, current: CurrentUser) -> AppResult<Html<String>> {
    trace!("Entering home function");
    render(&state.templates, "home.html", current.context())
}
