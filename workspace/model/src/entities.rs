//! Root of the SeaORM entity modules for the newsroom.
//! Users author articles, articles collect comments, and sessions tie a
//! browser cookie to a user.

pub mod article;
pub mod comment;
pub mod session;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::article::Entity as Article;
    pub use super::comment::Entity as Comment;
    pub use super::session::Entity as Session;
    pub use super::user::Entity as User;
}
