use anyhow::{bail, Result};
use model::entities::user;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, SqlErr};
use tracing::{debug, error, info, trace};

use super::{connect, load_settings};
use crate::auth::password::hash_password;
use crate::forms::password_problems;
use crate::handlers::accounts::username_taken;

/// Account details taken from the command line.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub age: Option<i32>,
    pub password: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("age", &self.age)
            .field("is_staff", &self.is_staff)
            .field("is_superuser", &self.is_superuser)
            .finish_non_exhaustive()
    }
}

pub async fn create_user(database_url: Option<String>, new_user: NewUser) -> Result<()> {
    trace!("Entering create_user function");
    let settings = load_settings(database_url)?;
    let db = connect(&settings.database_url).await?;

    let created = insert_user(&db, new_user).await?;
    info!(
        "Created user '{}' with ID {} (staff: {}, superuser: {})",
        created.username, created.id, created.is_staff, created.is_superuser
    );
    Ok(())
}

/// Validate and store `new_user`.
pub async fn insert_user<C>(db: &C, new_user: NewUser) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    debug!("Creating {:?}", new_user);
    if new_user.username.trim().is_empty() {
        bail!("username must not be empty");
    }
    if let Some(age) = new_user.age.filter(|age| *age < 0) {
        bail!("age must be non-negative, got {age}");
    }
    let problems = password_problems(&new_user.password);
    if !problems.is_empty() {
        bail!("{}", problems.join(" "));
    }

    if username_taken(db, &new_user.username).await? {
        error!("Username '{}' is already taken", new_user.username);
        bail!("a user named '{}' already exists", new_user.username);
    }

    let password = hash_password(&new_user.password)?;
    let model = user::ActiveModel {
        username: Set(new_user.username.clone()),
        email: Set(new_user.email),
        password: Set(password),
        age: Set(new_user.age),
        is_staff: Set(new_user.is_staff),
        is_superuser: Set(new_user.is_superuser),
        ..Default::default()
    };

    match model.insert(db).await {
        Ok(created) => Ok(created),
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            error!("Username '{}' is already taken", new_user.username);
            bail!("a user named '{}' already exists", new_user.username)
        }
        Err(e) => Err(e.into()),
    }
}
