//! Student gradebook: stage scores, derived averages and pass status,
//! record filtering and admin sessions, served as a JSON-lines sidecar.

pub mod auth;
pub mod calc;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod ipc;
pub mod model;
pub mod reports;
pub mod store;
