use super::models::{NewUser, User, UserChanges, USER_COLUMNS};
use crate::types::{AppError, Result};
use crate::utils::config::DatabaseConfig;
use chrono::Utc;
use libsql::{Builder, Connection};
use std::path::Path;
use uuid::Uuid;

const MEMORY_URL: &str = ":memory:";

/// libsql-backed store for users, courses and learner progress.
///
/// Works against a local SQLite file, an in-memory database or a remote
/// Turso instance.
pub struct Database {
    db: libsql::Database,
    /// Pinned connection for `:memory:` databases, where every `connect()`
    /// would otherwise open a fresh, empty database.
    shared: Option<Connection>,
}

impl Database {
    /// Opens the database described by the configuration.
    ///
    /// Remote Turso is used when both the URL and token environment
    /// variables named in the config are set.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let remote_url = std::env::var(&config.turso_url_env).ok();
        let remote_token = std::env::var(&config.turso_token_env).ok();

        match (remote_url, remote_token) {
            (Some(url), Some(token)) if !url.is_empty() => {
                tracing::info!(url = %url, "Connecting to remote Turso database");
                Self::new_remote(url, token).await
            }
            _ if config.url == MEMORY_URL => {
                tracing::warn!("Using in-memory database; data will not persist");
                Self::new_memory().await
            }
            _ => {
                tracing::info!(path = %config.url, "Opening local database");
                Self::new_local(&config.url).await
            }
        }
    }

    pub async fn new_remote(url: String, auth_token: String) -> Result<Self> {
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Turso: {}", e)))?;

        Self::init(db, false).await
    }

    pub async fn new_local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Database(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open local database: {}", e)))?;

        Self::init(db, false).await
    }

    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(MEMORY_URL)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open memory database: {}", e)))?;

        Self::init(db, true).await
    }

    async fn init(db: libsql::Database, pin_connection: bool) -> Result<Self> {
        let shared = if pin_connection {
            Some(
                db.connect()
                    .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?,
            )
        } else {
            None
        };

        let database = Self { db, shared };
        database.initialize_schema().await?;
        Ok(database)
    }

    pub fn connection(&self) -> Result<Connection> {
        if let Some(conn) = &self.shared {
            return Ok(conn.clone());
        }
        self.db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                user_name TEXT UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'learner',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create users table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS courses (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create courses table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chapters (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL,
                chapter_num INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (course_id) REFERENCES courses(id),
                UNIQUE(course_id, chapter_num)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create chapters table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chapter_points (
                id TEXT PRIMARY KEY,
                chapter_id TEXT NOT NULL,
                point_num INTEGER NOT NULL,
                text TEXT,
                code_block TEXT,
                image TEXT,
                video TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (chapter_id) REFERENCES chapters(id),
                UNIQUE(chapter_id, point_num)
            )",
            (),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to create chapter_points table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_courses (
                user_id TEXT NOT NULL,
                course_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'enrolled',
                current_chapter INTEGER NOT NULL DEFAULT 1,
                progress INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, course_id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (course_id) REFERENCES courses(id)
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create user_courses table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS finished_chapters (
                user_id TEXT NOT NULL,
                course_id TEXT NOT NULL,
                chapter_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, chapter_id),
                FOREIGN KEY (user_id, course_id) REFERENCES user_courses(user_id, course_id),
                FOREIGN KEY (chapter_id) REFERENCES chapters(id)
            )",
            (),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to create finished_chapters table: {}", e))
        })?;

        Ok(())
    }

    // User operations

    pub async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        if self.get_user_by_email(&new_user.email).await?.is_some() {
            return Err(AppError::Conflict(
                "The user with this email already exists in the system".to_string(),
            ));
        }
        if let Some(name) = &new_user.user_name {
            if self.get_user_by_user_name(name).await?.is_some() {
                return Err(AppError::Conflict(
                    "The user with this user name already exists in the system".to_string(),
                ));
            }
        }

        let conn = self.connection()?;
        let id = Uuid::new_v4();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO users (id, email, user_name, password_hash, role, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                new_user.email.as_str(),
                new_user.user_name.as_deref(),
                new_user.password_hash.as_str(),
                new_user.role.as_str(),
                i64::from(new_user.is_active),
                now,
                now,
            ),
        )
        .await
        .map_err(|e| write_error("create user", e))?;

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::Database("Created user could not be read back".to_string()))
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.query_user("id", &id.to_string()).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_user("email", email).await
    }

    pub async fn get_user_by_user_name(&self, user_name: &str) -> Result<Option<User>> {
        self.query_user("user_name", user_name).await
    }

    async fn query_user(&self, column: &'static str, value: &str) -> Result<Option<User>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?"),
                [value],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query user: {}", e)))?;

        match rows.next().await? {
            Some(row) => Ok(Some(User::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<User>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users ORDER BY rowid LIMIT ? OFFSET ?"),
                (i64::from(limit), i64::from(skip)),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to list users: {}", e)))?;

        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(User::from_row(&row)?);
        }
        Ok(users)
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM users").await
    }

    pub(crate) async fn count(&self, sql: &str) -> Result<u64> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(sql, ())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count rows: {}", e)))?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.max(0) as u64),
            None => Ok(0),
        }
    }

    /// Applies a partial update and returns the stored result.
    ///
    /// A new email or user name already used by another account is a
    /// conflict.
    pub async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<User> {
        let current = self
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))?;

        if let Some(email) = &changes.email {
            if let Some(other) = self.get_user_by_email(email).await? {
                if other.id != current.id {
                    return Err(AppError::Conflict(
                        "User with this email already exists".to_string(),
                    ));
                }
            }
        }
        if let Some(name) = &changes.user_name {
            if let Some(other) = self.get_user_by_user_name(name).await? {
                if other.id != current.id {
                    return Err(AppError::Conflict(
                        "User with this user name already exists".to_string(),
                    ));
                }
            }
        }

        let conn = self.connection()?;
        conn.execute(
            "UPDATE users SET
                email = COALESCE(?, email),
                user_name = COALESCE(?, user_name),
                password_hash = COALESCE(?, password_hash),
                role = COALESCE(?, role),
                is_active = COALESCE(?, is_active),
                updated_at = ?
             WHERE id = ?",
            (
                changes.email.as_deref(),
                changes.user_name.as_deref(),
                changes.password_hash.as_deref(),
                changes.role.map(|r| r.as_str()),
                changes.is_active.map(i64::from),
                Utc::now().timestamp(),
                id.to_string(),
            ),
        )
        .await
        .map_err(|e| write_error("update user", e))?;

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    /// Soft delete / reactivation. Users are never removed.
    pub async fn set_user_active(&self, id: Uuid, active: bool) -> Result<User> {
        self.update_user(
            id,
            &UserChanges {
                is_active: Some(active),
                ..UserChanges::default()
            },
        )
        .await
    }
}

/// Maps a failed write, turning constraint violations into conflicts.
pub(crate) fn write_error(action: &str, err: libsql::Error) -> AppError {
    let message = err.to_string();
    if message.contains("UNIQUE constraint failed") {
        AppError::Conflict(format!("Failed to {action}: record already exists"))
    } else {
        AppError::Database(format!("Failed to {action}: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn new_user(email: &str, user_name: Option<&str>) -> NewUser {
        NewUser {
            email: email.to_string(),
            user_name: user_name.map(str::to_string),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::Learner,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let db = Database::new_memory().await.unwrap();

        let user = db
            .create_user(&new_user("ada@example.com", Some("ada")))
            .await
            .unwrap();

        let by_id = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ada@example.com");
        assert_eq!(by_id.user_name.as_deref(), Some("ada"));
        assert_eq!(by_id.role, Role::Learner);
        assert!(by_id.is_active);

        let by_email = db.get_user_by_email("ada@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));
        assert!(db.get_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let db = Database::new_memory().await.unwrap();
        db.create_user(&new_user("dup@example.com", None))
            .await
            .unwrap();

        let result = db.create_user(&new_user("dup@example.com", None)).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_user_partial() {
        let db = Database::new_memory().await.unwrap();
        let user = db
            .create_user(&new_user("before@example.com", None))
            .await
            .unwrap();

        let updated = db
            .update_user(
                user.id,
                &UserChanges {
                    user_name: Some("renamed".to_string()),
                    role: Some(Role::Admin),
                    ..UserChanges::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.email, "before@example.com");
        assert_eq!(updated.user_name.as_deref(), Some("renamed"));
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_update_email_taken_by_other_user() {
        let db = Database::new_memory().await.unwrap();
        db.create_user(&new_user("one@example.com", None))
            .await
            .unwrap();
        let two = db
            .create_user(&new_user("two@example.com", None))
            .await
            .unwrap();

        let result = db
            .update_user(
                two.id,
                &UserChanges {
                    email: Some("one@example.com".to_string()),
                    ..UserChanges::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row() {
        let db = Database::new_memory().await.unwrap();
        let user = db
            .create_user(&new_user("gone@example.com", None))
            .await
            .unwrap();

        let disabled = db.set_user_active(user.id, false).await.unwrap();

        assert!(!disabled.is_active);
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_users_paginates_in_insert_order() {
        let db = Database::new_memory().await.unwrap();
        for i in 0..5 {
            db.create_user(&new_user(&format!("u{i}@example.com"), None))
                .await
                .unwrap();
        }

        let page = db.list_users(1, 2).await.unwrap();

        let emails: Vec<_> = page.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, ["u1@example.com", "u2@example.com"]);
        assert_eq!(db.count_users().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("codepath.db");

        {
            let db = Database::new_local(&path).await.unwrap();
            db.create_user(&new_user("disk@example.com", None))
                .await
                .unwrap();
        }

        let reopened = Database::new_local(&path).await.unwrap();
        assert!(reopened
            .get_user_by_email("disk@example.com")
            .await
            .unwrap()
            .is_some());
    }
}
