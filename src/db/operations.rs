use rusqlite::{params, OptionalExtension};
use tracing::warn;

use crate::db::connection::DatabaseConnection;
use crate::db::models::UserAccount;
use crate::db::password::{hash_password, verify_password};

/// Database operations for user accounts and profiles
pub struct UserOps;

impl UserOps {
    /// Register a new user. Returns false if the username is already taken.
    pub fn add_user(
        db: &DatabaseConnection,
        username: &str,
        password: &str,
    ) -> Result<bool, anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        let hashed = hash_password(password);
        let created_at = chrono::Utc::now().timestamp();

        match conn.execute(
            "INSERT INTO users (username, password, created_at) VALUES (?1, ?2, ?3)",
            params![username, hashed, created_at],
        ) {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check a username/password pair. Unknown users authenticate false.
    pub fn authenticate(
        db: &DatabaseConnection,
        username: &str,
        password: &str,
    ) -> Result<bool, anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        let stored: Option<String> = conn
            .query_row(
                "SELECT password FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        Ok(stored
            .map(|hash| verify_password(password, &hash))
            .unwrap_or(false))
    }

    pub fn user_exists(db: &DatabaseConnection, username: &str) -> Result<bool, anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        Ok(found.is_some())
    }

    pub fn get_user(
        db: &DatabaseConnection,
        username: &str,
    ) -> Result<Option<UserAccount>, anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        let account = conn
            .query_row(
                "SELECT username, created_at FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(UserAccount {
                        username: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(account)
    }

    /// Upsert the profile document for a user.
    ///
    /// A missing user row is created with an empty password so the foreign
    /// key holds; such placeholder accounts can never authenticate.
    pub fn set_profile(
        db: &DatabaseConnection,
        username: &str,
        profile: &serde_json::Value,
    ) -> Result<(), anyhow::Error> {
        if !Self::user_exists(db, username)? {
            let conn = db.get_connection();
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO users (username, password, created_at) VALUES (?1, '', ?2)",
                params![username, chrono::Utc::now().timestamp()],
            )?;
        }

        let json_str = serde_json::to_string(profile)?;

        let conn = db.get_connection();
        let conn = conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_profiles (username, information) VALUES (?1, ?2)
             ON CONFLICT (username) DO UPDATE SET information = excluded.information",
            params![username, json_str],
        )?;

        Ok(())
    }

    /// Fetch the profile document for a user, or None when absent.
    ///
    /// Stored text that no longer parses as JSON is treated as absent.
    pub fn get_profile(
        db: &DatabaseConnection,
        username: &str,
    ) -> Result<Option<serde_json::Value>, anyhow::Error> {
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        let info: Option<Option<String>> = conn
            .query_row(
                "SELECT information FROM user_profiles WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        let Some(Some(text)) = info else {
            return Ok(None);
        };

        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("stored profile for {username} is not valid JSON: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_db() -> DatabaseConnection {
        DatabaseConnection::in_memory().unwrap()
    }

    #[test]
    fn add_user_rejects_duplicates() {
        let db = test_db();

        assert!(UserOps::add_user(&db, "ada", "lovelace").unwrap());
        assert!(!UserOps::add_user(&db, "ada", "other").unwrap());
        assert!(UserOps::user_exists(&db, "ada").unwrap());

        let account = UserOps::get_user(&db, "ada").unwrap().unwrap();
        assert_eq!(account.username, "ada");
        assert!(account.created_at > 0);
        assert!(UserOps::get_user(&db, "nobody").unwrap().is_none());
    }

    #[test]
    fn authenticate_checks_password() {
        let db = test_db();
        UserOps::add_user(&db, "ada", "lovelace").unwrap();

        assert!(UserOps::authenticate(&db, "ada", "lovelace").unwrap());
        assert!(!UserOps::authenticate(&db, "ada", "wrong").unwrap());
        assert!(!UserOps::authenticate(&db, "nobody", "lovelace").unwrap());
    }

    #[test]
    fn profile_round_trip() {
        let db = test_db();
        UserOps::add_user(&db, "ada", "lovelace").unwrap();

        let profile = json!({"language": "en", "voice": "alto"});
        UserOps::set_profile(&db, "ada", &profile).unwrap();

        assert_eq!(UserOps::get_profile(&db, "ada").unwrap(), Some(profile));
    }

    #[test]
    fn set_profile_overwrites() {
        let db = test_db();
        UserOps::add_user(&db, "ada", "lovelace").unwrap();

        UserOps::set_profile(&db, "ada", &json!({"v": 1})).unwrap();
        UserOps::set_profile(&db, "ada", &json!({"v": 2})).unwrap();

        assert_eq!(
            UserOps::get_profile(&db, "ada").unwrap(),
            Some(json!({"v": 2}))
        );
    }

    #[test]
    fn set_profile_creates_placeholder_user() {
        let db = test_db();

        UserOps::set_profile(&db, "ghost", &json!({"seen": false})).unwrap();

        assert!(UserOps::user_exists(&db, "ghost").unwrap());
        // Placeholder accounts have no usable credentials.
        assert!(!UserOps::authenticate(&db, "ghost", "").unwrap());
        assert_eq!(
            UserOps::get_profile(&db, "ghost").unwrap(),
            Some(json!({"seen": false}))
        );
    }

    #[test]
    fn get_profile_missing_user_is_none() {
        let db = test_db();
        assert_eq!(UserOps::get_profile(&db, "nobody").unwrap(), None);
    }

    #[test]
    fn get_profile_tolerates_corrupt_rows() {
        let db = test_db();
        UserOps::add_user(&db, "ada", "lovelace").unwrap();

        let conn = db.get_connection();
        conn.lock()
            .unwrap()
            .execute(
                "INSERT INTO user_profiles (username, information) VALUES ('ada', '{broken')",
                [],
            )
            .unwrap();

        assert_eq!(UserOps::get_profile(&db, "ada").unwrap(), None);
    }

    #[test]
    fn deleting_a_user_cascades_to_profile() {
        let db = test_db();
        UserOps::add_user(&db, "ada", "lovelace").unwrap();
        UserOps::set_profile(&db, "ada", &json!({"v": 1})).unwrap();

        let conn = db.get_connection();
        conn.lock()
            .unwrap()
            .execute("DELETE FROM users WHERE username = 'ada'", [])
            .unwrap();

        assert_eq!(UserOps::get_profile(&db, "ada").unwrap(), None);
    }
}
