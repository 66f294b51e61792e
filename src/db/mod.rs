/// Lesson content blocks inside chapters.
pub mod chapter_points;
/// Course and chapter storage.
pub mod courses;
/// Row types and their public projections.
pub mod models;
/// Enrollments and chapter completion.
pub mod progress;
/// Connection handling, schema and user storage.
pub mod turso;

pub use models::{Chapter, ChapterPoint, Course, Enrollment, NewUser, User, UserChanges};
pub use turso::Database;

use crate::auth::AuthService;
use crate::types::{Result, Role};
use crate::utils::config::AdminConfig;

/// Creates the first admin account if it does not exist yet.
///
/// Skipped when no admin email is configured or the password variable is
/// unset.
pub async fn ensure_first_admin(
    db: &Database,
    auth: &AuthService,
    admin: &AdminConfig,
) -> Result<Option<User>> {
    let Some(email) = admin.email.as_deref().filter(|e| !e.is_empty()) else {
        return Ok(None);
    };

    if let Some(existing) = db.get_user_by_email(email).await? {
        tracing::debug!(email = %email, "First admin already present");
        return Ok(Some(existing));
    }

    let Ok(password) = std::env::var(&admin.password_env) else {
        tracing::warn!(
            env = %admin.password_env,
            "Admin email configured but password variable is unset; skipping seed"
        );
        return Ok(None);
    };

    let user = db
        .create_user(&NewUser {
            email: email.to_string(),
            user_name: admin.user_name.clone(),
            password_hash: auth.hash_password(&password).await?,
            role: Role::Admin,
            is_active: true,
        })
        .await?;

    tracing::info!(user_id = %user.id, email = %email, "Seeded first admin user");
    Ok(Some(user))
}
