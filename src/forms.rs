//! HTML form payloads and their validation.
//!
//! Every field deserializes with `#[serde(default)]` so a missing field is a
//! validation error rendered next to the input, never an extractor rejection.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

pub const REQUIRED: &str = "This field is required.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const PASSWORD_TOO_SHORT: &str =
    "This password is too short. It must contain at least 8 characters.";
pub const PASSWORD_NUMERIC: &str = "This password is entirely numeric.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password. \
     Note that both fields may be case-sensitive.";
pub const OLD_PASSWORD_INCORRECT: &str =
    "Your old password was entered incorrectly. Please enter it again.";

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Field-keyed error messages handed to templates.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    pub fields: BTreeMap<String, Vec<String>>,
    pub non_field: Vec<String>,
}

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    /// Runs the derived validators of `form`.
    pub fn of<T: Validate>(form: &T) -> Self {
        match form.validate() {
            Ok(()) => Self::default(),
            Err(errors) => errors.into(),
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = FormErrors::default();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                form_errors.add(&field.to_string(), message);
            }
        }
        form_errors
    }
}

/// Text inputs arrive without surrounding whitespace. Passwords are taken as typed.
fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

fn error_with_message(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

fn validate_required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error_with_message("required", REQUIRED));
    }
    Ok(())
}

fn validate_username(value: &str) -> Result<(), ValidationError> {
    validate_required(value)?;
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !value.chars().all(allowed) {
        return Err(error_with_message(
            "invalid_username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

fn validate_optional_email(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && !value.validate_email() {
        return Err(error_with_message("invalid_email", "Enter a valid email address."));
    }
    Ok(())
}

fn validate_required_email(value: &str) -> Result<(), ValidationError> {
    validate_required(value)?;
    validate_optional_email(value)
}

fn validate_optional_age(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    match value.parse::<i64>() {
        Ok(age) if age < 0 => Err(error_with_message(
            "min_value",
            "Ensure this value is greater than or equal to 0.",
        )),
        Ok(age) if age > i64::from(i32::MAX) => Err(error_with_message(
            "max_value",
            "Ensure this value is less than or equal to 2147483647.",
        )),
        Ok(_) => Ok(()),
        Err(_) => Err(error_with_message("invalid", "Enter a whole number.")),
    }
}

/// Strength rules applied to every newly chosen password.
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(PASSWORD_TOO_SHORT);
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push(PASSWORD_NUMERIC);
    }
    problems
}

/// Mismatch and strength checks for a password typed twice. Errors land on `confirm_field`.
fn check_new_password_pair(
    errors: &mut FormErrors,
    password: &str,
    confirmation: &str,
    confirm_field: &str,
) {
    if password.is_empty() || confirmation.is_empty() {
        return;
    }
    if password != confirmation {
        errors.add(confirm_field, PASSWORD_MISMATCH);
        return;
    }
    for problem in password_problems(password) {
        errors.add(confirm_field, problem);
    }
}

/// Account creation form
#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(default)]
pub struct SignupForm {
    /// 150 characters or fewer. Letters, digits and @/./+/-/_ only.
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    /// Optional contact address, used for password resets
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "validate_optional_email"))]
    pub email: String,
    /// Optional non-negative age
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "validate_optional_age"))]
    pub age: String,
    #[serde(skip_serializing)]
    #[validate(custom(function = "validate_required"))]
    pub password1: String,
    /// Same password again, for verification
    #[serde(skip_serializing)]
    #[validate(custom(function = "validate_required"))]
    pub password2: String,
}

impl SignupForm {
    pub fn errors(&self) -> FormErrors {
        let mut errors = FormErrors::of(self);
        check_new_password_pair(&mut errors, &self.password1, &self.password2, "password2");
        errors
    }

    pub fn age_value(&self) -> Option<i32> {
        self.age.trim().parse().ok()
    }
}

/// Credentials form
#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(default)]
pub struct LoginForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "validate_required"))]
    pub username: String,
    #[serde(skip_serializing)]
    #[validate(custom(function = "validate_required"))]
    pub password: String,
    /// Where to go after a successful login
    pub next: String,
}

impl LoginForm {
    pub fn errors(&self) -> FormErrors {
        FormErrors::of(self)
    }
}

/// Password change form for a logged-in user
#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct PasswordChangeForm {
    #[validate(custom(function = "validate_required"))]
    pub old_password: String,
    #[validate(custom(function = "validate_required"))]
    pub new_password1: String,
    #[validate(custom(function = "validate_required"))]
    pub new_password2: String,
}

impl PasswordChangeForm {
    pub fn errors(&self) -> FormErrors {
        let mut errors = FormErrors::of(self);
        check_new_password_pair(
            &mut errors,
            &self.new_password1,
            &self.new_password2,
            "new_password2",
        );
        errors
    }
}

/// Password reset request form
#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(default)]
pub struct PasswordResetForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(max = 254, message = "Ensure this value has at most 254 characters."))]
    #[validate(custom(function = "validate_required_email"))]
    pub email: String,
}

impl PasswordResetForm {
    pub fn errors(&self) -> FormErrors {
        FormErrors::of(self)
    }
}

/// New password form reached from a reset link
#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct SetPasswordForm {
    #[validate(custom(function = "validate_required"))]
    pub new_password1: String,
    #[validate(custom(function = "validate_required"))]
    pub new_password2: String,
}

impl SetPasswordForm {
    pub fn errors(&self) -> FormErrors {
        let mut errors = FormErrors::of(self);
        check_new_password_pair(
            &mut errors,
            &self.new_password1,
            &self.new_password2,
            "new_password2",
        );
        errors
    }
}

/// Article create/update form
#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(default)]
pub struct ArticleForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(max = 255, message = "Ensure this value has at most 255 characters."))]
    #[validate(custom(function = "validate_required"))]
    pub title: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "validate_required"))]
    pub body: String,
}

impl ArticleForm {
    pub fn errors(&self) -> FormErrors {
        FormErrors::of(self)
    }
}

/// Comment form shown under an article
#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(default)]
pub struct CommentForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    #[validate(custom(function = "validate_required"))]
    pub comment: String,
}

impl CommentForm {
    pub fn errors(&self) -> FormErrors {
        FormErrors::of(self)
    }
}

/// Query parameters for the article list
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ArticleListQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

impl ArticleListQuery {
    pub const DEFAULT_LIMIT: u64 = 50;

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(username: &str, password1: &str, password2: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            email: "writer@example.com".to_string(),
            age: "30".to_string(),
            password1: password1.to_string(),
            password2: password2.to_string(),
        }
    }

    #[test]
    fn valid_signup_has_no_errors() {
        let form = signup("writer", "user12345", "user12345");
        assert!(form.errors().is_empty());
        assert_eq!(form.age_value(), Some(30));
    }

    #[test]
    fn empty_signup_flags_every_required_field() {
        let errors = SignupForm::default().errors();

        for field in ["username", "password1", "password2"] {
            assert_eq!(errors.fields[field], vec![REQUIRED.to_string()], "{field}");
        }
        assert!(!errors.has("email"));
        assert!(!errors.has("age"));
    }

    #[test]
    fn signup_password_mismatch_is_reported_on_confirmation() {
        let errors = signup("writer", "user12345", "user54321").errors();
        assert_eq!(errors.fields["password2"], vec![PASSWORD_MISMATCH.to_string()]);
    }

    #[test]
    fn weak_passwords_are_rejected() {
        let errors = signup("writer", "1234", "1234").errors();
        assert_eq!(
            errors.fields["password2"],
            vec![PASSWORD_TOO_SHORT.to_string(), PASSWORD_NUMERIC.to_string()]
        );
    }

    #[test]
    fn username_characters_are_restricted() {
        let errors = signup("bad name!", "user12345", "user12345").errors();
        assert!(errors.has("username"));

        let errors = signup("a.b+c-d_e@f", "user12345", "user12345").errors();
        assert!(!errors.has("username"));
    }

    #[test]
    fn signup_email_and_age_are_checked_only_when_present() {
        let mut form = signup("writer", "user12345", "user12345");
        form.email = "not-an-email".to_string();
        form.age = "-1".to_string();
        let errors = form.errors();
        assert_eq!(errors.fields["email"], vec!["Enter a valid email address.".to_string()]);
        assert!(errors.has("age"));

        form.email.clear();
        form.age = "abc".to_string();
        let errors = form.errors();
        assert!(!errors.has("email"));
        assert_eq!(errors.fields["age"], vec!["Enter a whole number.".to_string()]);
        assert_eq!(form.age_value(), None);
    }

    #[test]
    fn article_title_length_is_bounded() {
        let form = ArticleForm {
            title: "x".repeat(256),
            body: "body".to_string(),
        };
        assert!(form.errors().has("title"));

        let form = ArticleForm {
            title: "x".repeat(255),
            body: "body".to_string(),
        };
        assert!(form.errors().is_empty());
    }

    #[test]
    fn blank_article_fields_are_required() {
        let form = ArticleForm {
            title: "   ".to_string(),
            body: String::new(),
        };
        let errors = form.errors();
        assert_eq!(errors.fields["title"], vec![REQUIRED.to_string()]);
        assert_eq!(errors.fields["body"], vec![REQUIRED.to_string()]);
    }

    #[test]
    fn text_inputs_are_stripped_but_passwords_are_not() {
        let form: ArticleForm =
            serde_urlencoded::from_str("title=++Spaced+title++&body=%0A+Body+%0A").unwrap();
        assert_eq!(form.title, "Spaced title");
        assert_eq!(form.body, "Body");

        // a padded 150 character comment still fits
        let padded = format!("comment=++{}++", "c".repeat(150));
        let form: CommentForm = serde_urlencoded::from_str(&padded).unwrap();
        assert_eq!(form.comment.len(), 150);
        assert!(form.errors().is_empty());

        let form: SignupForm = serde_urlencoded::from_str(
            "username=+writer+&email=+w%40example.com+&age=+30+&password1=+pass+word+&password2=+pass+word+",
        )
        .unwrap();
        assert_eq!(form.username, "writer");
        assert_eq!(form.email, "w@example.com");
        assert_eq!(form.age_value(), Some(30));
        assert_eq!(form.password1, " pass word ");

        let form: LoginForm = serde_urlencoded::from_str("username=writer+&password=x").unwrap();
        assert_eq!(form.username, "writer");
        assert_eq!(form.next, "");
    }

    #[test]
    fn comment_is_limited_to_150_characters() {
        let form = CommentForm {
            comment: "c".repeat(151),
        };
        assert!(form.errors().has("comment"));

        let form = CommentForm {
            comment: "c".repeat(150),
        };
        assert!(form.errors().is_empty());
    }

    #[test]
    fn reset_form_requires_a_valid_email() {
        assert_eq!(
            PasswordResetForm::default().errors().fields["email"],
            vec![REQUIRED.to_string()]
        );

        let form = PasswordResetForm {
            email: "nobody".to_string(),
        };
        assert!(form.errors().has("email"));
    }

    #[test]
    fn set_password_form_checks_the_pair() {
        let form = SetPasswordForm {
            new_password1: "new_pass123".to_string(),
            new_password2: "another_pass".to_string(),
        };
        assert_eq!(form.errors().fields["new_password2"], vec![PASSWORD_MISMATCH.to_string()]);
    }

    #[test]
    fn list_query_defaults() {
        let query = ArticleListQuery {
            page: None,
            limit: None,
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), ArticleListQuery::DEFAULT_LIMIT);
        assert!(query.validate().is_ok());

        let query = ArticleListQuery {
            page: Some(0),
            limit: Some(5000),
        };
        assert!(query.validate().is_err());
    }
}
