pub mod admin;
pub mod auth;
pub mod blog;
pub mod error;
pub mod events;
pub mod mailer;
pub mod models;
pub mod repos;
pub mod users;
