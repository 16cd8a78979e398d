pub mod auth;
pub mod cache;
pub mod config;
pub mod habit;
pub mod profile;
pub mod reminders;
pub mod stats;
pub mod today;
