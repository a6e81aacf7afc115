//! LED REST API library (server + routes).

pub mod server;
