//! One-time password reset links.
//!
//! A token is `{timestamp_hex}-{mac}`, with an HMAC-SHA256 over the user's id,
//! password hash, last login, the timestamp and the email. Any of those
//! changing (a new password, a login) invalidates every token already sent.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{digest::InvalidLength, Hmac, Mac};
use model::entities::user;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct PasswordResetTokenGenerator {
    secret: String,
    timeout_secs: i64,
}

impl PasswordResetTokenGenerator {
    pub fn new(secret: impl Into<String>, timeout_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            timeout_secs,
        }
    }

    pub fn make_token(&self, user: &user::Model, now: DateTime<Utc>) -> Result<String, InvalidLength> {
        let timestamp = now.timestamp();
        let mac = self.signature(user, timestamp)?.finalize().into_bytes();
        Ok(format!("{:x}-{}", timestamp, URL_SAFE_NO_PAD.encode(mac)))
    }

    pub fn check_token(&self, user: &user::Model, token: &str, now: DateTime<Utc>) -> bool {
        let Some((timestamp_hex, mac_b64)) = token.split_once('-') else {
            return false;
        };
        let Ok(timestamp) = i64::from_str_radix(timestamp_hex, 16) else {
            return false;
        };
        let Ok(provided) = URL_SAFE_NO_PAD.decode(mac_b64) else {
            return false;
        };

        let age = now.timestamp() - timestamp;
        if age < 0 || age > self.timeout_secs {
            debug!("Reset token for user {} is {}s old, rejecting", user.id, age);
            return false;
        }

        match self.signature(user, timestamp) {
            Ok(mac) => mac.verify_slice(&provided).is_ok(),
            Err(_) => false,
        }
    }

    fn signature(&self, user: &user::Model, timestamp: i64) -> Result<HmacSha256, InvalidLength> {
        let last_login = user
            .last_login
            .map(|t| t.timestamp().to_string())
            .unwrap_or_default();

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())?;
        mac.update(
            format!(
                "{}{}{}{}{}",
                user.id, user.password, last_login, timestamp, user.email
            )
            .as_bytes(),
        );
        Ok(mac)
    }
}

/// URL-safe form of a user id, as used in reset links.
pub fn encode_uid(id: i32) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<i32> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> user::Model {
        user::Model {
            id: 7,
            username: "writer".to_string(),
            email: "writer@example.com".to_string(),
            password: "$argon2id$v=19$stored".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_staff: false,
            is_superuser: false,
            is_active: true,
            age: None,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    fn generator() -> PasswordResetTokenGenerator {
        PasswordResetTokenGenerator::new("test-secret", 60 * 60 * 24 * 3)
    }

    #[test]
    fn fresh_token_is_accepted() {
        let now = Utc::now();
        let token = generator().make_token(&user(), now).unwrap();
        assert!(generator().check_token(&user(), &token, now));
    }

    #[test]
    fn password_change_invalidates_token() {
        let now = Utc::now();
        let token = generator().make_token(&user(), now).unwrap();

        let mut changed = user();
        changed.password = "$argon2id$v=19$other".to_string();
        assert!(!generator().check_token(&changed, &token, now));
    }

    #[test]
    fn login_invalidates_token() {
        let now = Utc::now();
        let token = generator().make_token(&user(), now).unwrap();

        let mut logged_in = user();
        logged_in.last_login = Some(now);
        assert!(!generator().check_token(&logged_in, &token, now));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - Duration::days(3) - Duration::seconds(1);
        let token = generator().make_token(&user(), issued).unwrap();
        assert!(!generator().check_token(&user(), &token, Utc::now()));
    }

    #[test]
    fn other_secret_rejects_token() {
        let now = Utc::now();
        let token = generator().make_token(&user(), now).unwrap();
        let other = PasswordResetTokenGenerator::new("another-secret", 60);
        assert!(!other.check_token(&user(), &token, now));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let now = Utc::now();
        for token in ["", "-", "nodash", "zz-abc", "1-!!!"] {
            assert!(!generator().check_token(&user(), token, now), "{token}");
        }
    }

    #[test]
    fn uid_encoding() {
        assert_eq!(encode_uid(1), "MQ");
        assert_eq!(decode_uid(&encode_uid(4242)), Some(4242));
        assert_eq!(decode_uid("not base64!"), None);
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("abc")), None);
    }
}
