use crate::types::{
    timestamp, AppError, ChapterPointPublic, ChapterPublic, CoursePublic, CourseStatus, Result, Role, UserCoursePublic,
    UserPublic,
};
use chrono::{DateTime, Utc};
use libsql::{Row, Value};
use uuid::Uuid;

pub(crate) fn uuid_at(row: &Row, idx: i32) -> Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| AppError::Database(format!("Bad stored id '{raw}': {e}")))
}

pub(crate) fn opt_text_at(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(AppError::Database(format!(
            "Expected text in column {idx}, found {other:?}"
        ))),
    }
}

fn time_at(row: &Row, idx: i32) -> Result<DateTime<Utc>> {
    Ok(timestamp(row.get::<i64>(idx)?))
}

/// Stored user record, including the password hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub user_name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const USER_COLUMNS: &str =
    "id, email, user_name, password_hash, role, is_active, created_at, updated_at";

impl User {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        let role: String = row.get(4)?;
        Ok(Self {
            id: uuid_at(row, 0)?,
            email: row.get(1)?,
            user_name: opt_text_at(row, 2)?,
            password_hash: row.get(3)?,
            role: Role::parse(&role)
                .ok_or_else(|| AppError::Database(format!("Unknown role '{role}'")))?,
            is_active: row.get::<i64>(5)? != 0,
            created_at: time_at(row, 6)?,
            updated_at: time_at(row, 7)?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            email: self.email.clone(),
            user_name: self.user_name.clone(),
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Fields for a new user row. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub user_name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

/// Partial user update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub user_name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const COURSE_COLUMNS: &str = "id, title, description, created_at, updated_at";

impl Course {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: uuid_at(row, 0)?,
            title: row.get(1)?,
            description: opt_text_at(row, 2)?,
            created_at: time_at(row, 3)?,
            updated_at: time_at(row, 4)?,
        })
    }

    pub fn to_public(&self, chapters: Option<Vec<ChapterPublic>>) -> CoursePublic {
        CoursePublic {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            chapters,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chapter {
    pub id: Uuid,
    pub course_id: Uuid,
    pub chapter_num: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const CHAPTER_COLUMNS: &str =
    "id, course_id, chapter_num, title, description, created_at, updated_at";

impl Chapter {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: uuid_at(row, 0)?,
            course_id: uuid_at(row, 1)?,
            chapter_num: row.get(2)?,
            title: row.get(3)?,
            description: opt_text_at(row, 4)?,
            created_at: time_at(row, 5)?,
            updated_at: time_at(row, 6)?,
        })
    }

    pub fn to_public(&self, points: Option<Vec<ChapterPointPublic>>) -> ChapterPublic {
        ChapterPublic {
            id: self.id,
            course_id: self.course_id,
            chapter_num: self.chapter_num,
            title: self.title.clone(),
            description: self.description.clone(),
            points,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChapterPoint {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub point_num: i64,
    pub text: Option<String>,
    pub code_block: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const CHAPTER_POINT_COLUMNS: &str =
    "id, chapter_id, point_num, text, code_block, image, video, created_at, updated_at";

impl ChapterPoint {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: uuid_at(row, 0)?,
            chapter_id: uuid_at(row, 1)?,
            point_num: row.get(2)?,
            text: opt_text_at(row, 3)?,
            code_block: opt_text_at(row, 4)?,
            image: opt_text_at(row, 5)?,
            video: opt_text_at(row, 6)?,
            created_at: time_at(row, 7)?,
            updated_at: time_at(row, 8)?,
        })
    }

    pub fn to_public(&self) -> ChapterPointPublic {
        ChapterPointPublic {
            id: self.id,
            chapter_id: self.chapter_id,
            point_num: self.point_num,
            text: self.text.clone(),
            code_block: self.code_block.clone(),
            image: self.image.clone(),
            video: self.video.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A learner's enrollment in a course.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub status: CourseStatus,
    pub current_chapter: i64,
    pub progress: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const ENROLLMENT_COLUMNS: &str =
    "user_id, course_id, status, current_chapter, progress, created_at, updated_at";

impl Enrollment {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        let status: String = row.get(2)?;
        Ok(Self {
            user_id: uuid_at(row, 0)?,
            course_id: uuid_at(row, 1)?,
            status: CourseStatus::parse(&status)
                .ok_or_else(|| AppError::Database(format!("Unknown course status '{status}'")))?,
            current_chapter: row.get(3)?,
            progress: row.get(4)?,
            created_at: time_at(row, 5)?,
            updated_at: time_at(row, 6)?,
        })
    }

    pub fn to_public(&self, finished_chapters: Vec<Uuid>) -> UserCoursePublic {
        UserCoursePublic {
            user_id: self.user_id,
            course_id: self.course_id,
            status: self.status,
            current_chapter: self.current_chapter,
            progress: self.progress,
            finished_chapters,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
