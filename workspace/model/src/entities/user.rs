use sea_orm::entity::prelude::*;
use sea_orm::Set;

/// A journalist account.
///
/// `password` holds an argon2 PHC string, never the clear text.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    /// May be empty; password reset only reaches users with an address.
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// May log into administrative tooling.
    pub is_staff: bool,
    /// Holds every permission without explicitly assigning them.
    pub is_superuser: bool,
    /// Inactive accounts cannot log in or reset their password.
    pub is_active: bool,
    pub age: Option<i32>,
    pub date_joined: DateTimeUtc,
    pub last_login: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A user can author multiple articles.
    #[sea_orm(has_many = "super::article::Entity")]
    Article,
    /// A user can write multiple comments.
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
    #[sea_orm(has_many = "super::session::Entity")]
    Session,
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Article.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            email: Set(String::new()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            is_staff: Set(false),
            is_superuser: Set(false),
            is_active: Set(true),
            age: Set(None),
            last_login: Set(None),
            ..ActiveModelTrait::default()
        }
    }

    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert && self.date_joined.is_not_set() {
            self.date_joined = Set(chrono::Utc::now());
        }
        Ok(self)
    }
}

impl Model {
    /// Display name used in templates: "First Last" when set, otherwise the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}
