pub mod accounts;
pub mod articles;
pub mod comments;
pub mod health;
pub mod pages;
pub mod password;

use axum::{
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
};

pub const LOGIN_URL: &str = "/accounts/login/";

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// Login page that sends the user back to `next` afterwards.
pub fn login_url(next: &str) -> String {
    let query = serde_urlencoded::to_string([("next", next)]).unwrap_or_default();
    // slashes stay unescaped
    format!("{}?{}", LOGIN_URL, query.replace("%2F", "/"))
}

/// Only same-site absolute paths are followed after login.
///
/// Browsers drop tabs and newlines while parsing a `Location`, so a target
/// carrying any control character is refused outright.
pub fn is_safe_redirect(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(char::is_control)
}
