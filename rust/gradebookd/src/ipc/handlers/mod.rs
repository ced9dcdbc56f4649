pub mod auth;
pub mod core;
pub mod courses;
pub mod reports;
pub mod students;
