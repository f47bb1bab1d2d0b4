//! Identity plumbing shared by the page handlers: password hashing, reset
//! tokens, database-backed sessions and the extractors built on them.

pub mod extract;
pub mod password;
pub mod session;
pub mod tokens;

pub use extract::{AuthUser, CurrentUser};
