use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use cookie::{time, Cookie, SameSite};
use model::entities::{session, user};
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use tracing::{debug, error, trace};

pub const SESSION_COOKIE: &str = "sessionid";
pub const SESSION_KEY_LENGTH: usize = 32;

pub fn new_session_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Persist a new session for `user_id`, valid for `age_secs`.
pub async fn start_session<C>(db: &C, user_id: i32, age_secs: i64) -> Result<session::Model, DbErr>
where
    C: ConnectionTrait,
{
    trace!("Starting session for user {}", user_id);
    session::ActiveModel {
        session_key: Set(new_session_key()),
        user_id: Set(user_id),
        expire_date: Set(Utc::now() + Duration::seconds(age_secs)),
    }
    .insert(db)
    .await
}

pub async fn end_session<C>(db: &C, session_key: &str) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let result = session::Entity::delete_by_id(session_key.to_string())
        .exec(db)
        .await?;
    debug!("Ended session, {} row(s) removed", result.rows_affected);
    Ok(())
}

/// The active user owning an unexpired session, if any.
pub async fn load_session_user<C>(
    db: &C,
    session_key: &str,
    now: DateTime<Utc>,
) -> Result<Option<user::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let found = session::Entity::find_by_id(session_key.to_string())
        .find_also_related(user::Entity)
        .one(db)
        .await?;

    Ok(match found {
        Some((session, Some(user))) if !session.is_expired(now) && user.is_active => Some(user),
        Some((session, _)) => {
            debug!("Session for user {} is expired or inactive", session.user_id);
            None
        }
        None => None,
    })
}

/// Delete every session of `user_id` except `keep`.
pub async fn delete_user_sessions<C>(
    db: &C,
    user_id: i32,
    keep: Option<&str>,
) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let mut query = session::Entity::delete_many().filter(session::Column::UserId.eq(user_id));
    if let Some(keep) = keep {
        query = query.filter(session::Column::SessionKey.ne(keep));
    }
    let result = query.exec(db).await?;
    debug!("Deleted {} session(s) of user {}", result.rows_affected, user_id);
    Ok(result.rows_affected)
}

pub async fn clear_expired<C>(db: &C, now: DateTime<Utc>) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let result = session::Entity::delete_many()
        .filter(session::Column::ExpireDate.lte(now))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Session key sent by the browser, if any.
pub fn session_key_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|key| !key.is_empty())
}

pub fn session_cookie(session_key: &str, age_secs: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_key.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(age_secs))
        .build()
}

/// Cookie that makes the browser forget its session.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

pub fn with_cookie(mut response: Response, cookie: Cookie<'_>) -> Response {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!("Could not encode {} cookie: {}", cookie.name(), e),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    #[test]
    fn keys_are_32_alphanumeric_chars() {
        let key = new_session_key();
        assert_eq!(key.len(), SESSION_KEY_LENGTH);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(key, new_session_key());
    }

    #[test]
    fn session_key_is_read_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; sessionid=abc123"));
        assert_eq!(session_key_from_headers(&headers), Some("abc123".to_string()));

        headers.insert(COOKIE, HeaderValue::from_static("sessionid="));
        assert_eq!(session_key_from_headers(&headers), None);

        assert_eq!(session_key_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("abc", 1_209_600).to_string();
        assert!(cookie.starts_with("sessionid=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=1209600"));

        assert!(removal_cookie().to_string().contains("Max-Age=0"));
    }
}
