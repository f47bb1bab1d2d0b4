pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod mail;
pub mod router;
pub mod schemas;
pub mod templates;

mod tests;
