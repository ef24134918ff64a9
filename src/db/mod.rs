// Database module
// This module handles the SQLite user and profile store

pub mod connection;
pub mod migrations;
pub mod models;
pub mod operations;
pub mod password;

pub use connection::DatabaseConnection;
pub use operations::UserOps;
