pub mod api;
pub mod config;
pub mod deposits;
pub mod geometry;
pub mod registry;
pub mod server;
pub mod session;
pub mod similarity;
