// Database migrations
use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Create users table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            username TEXT PRIMARY KEY,
            password TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Create user_profiles table; profile documents are stored as JSON text
    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_profiles (
            username TEXT PRIMARY KEY REFERENCES users(username) ON DELETE CASCADE,
            information TEXT
        )",
        [],
    )?;

    Ok(())
}
