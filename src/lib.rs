// Library exports for tradehall
// This allows integration tests and the binary to share one module tree

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod storage;
