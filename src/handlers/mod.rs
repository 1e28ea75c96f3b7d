pub mod auth;
pub mod blobs;
pub mod events;
pub mod file;
pub mod user;
