pub mod auth;
pub mod catalog;
pub mod events;
pub mod functions;
pub mod health;
pub mod notifications;
pub mod users;
