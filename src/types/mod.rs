//! Request/response types shared by the API, auth and storage layers.

mod error;

pub use error::{AppError, AuthError, Result, Upstream};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// ============= Shared Limits =============

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 40;
pub const FIELD_MAX_LEN: usize = 255;
pub const PAGINATION_LIMIT_DEFAULT: u32 = 50;
pub const PAGINATION_LIMIT_MAX: u32 = 100;

fn validate_email(email: &str) -> Result<()> {
    let valid = email.len() <= FIELD_MAX_LEN
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        };

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "'{email}' is not a valid email address"
        )))
    }
}

fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )))
    }
}

fn validate_text(field: &str, value: &str, required: bool) -> Result<()> {
    let len = value.chars().count();
    if required && value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if len > FIELD_MAX_LEN {
        return Err(AppError::Validation(format!(
            "{field} must be at most {FIELD_MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// Converts a stored unix timestamp into a UTC datetime.
pub fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

// ============= Authentication Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Learner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Learner => "learner",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "learner" => Some(Role::Learner),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// JWT claim set. Only the subject and the validity window are carried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// OAuth2 password-flow form (`username` carries the email).
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

impl Token {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Generic message response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============= User Types =============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub user_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsersPublic {
    pub data: Vec<UserPublic>,
    pub count: Option<u64>,
}

/// Self-service signup.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UserRegister {
    pub email: String,
    pub password: String,
    pub user_name: Option<String>,
}

impl UserRegister {
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if let Some(name) = &self.user_name {
            validate_text("user_name", name, true)?;
        }
        Ok(())
    }
}

/// Admin-side user creation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    pub user_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl UserCreate {
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if let Some(name) = &self.user_name {
            validate_text("user_name", name, true)?;
        }
        Ok(())
    }
}

/// Admin-side partial update.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        if let Some(name) = &self.user_name {
            validate_text("user_name", name, true)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserUpdateMe {
    pub email: Option<String>,
    pub user_name: Option<String>,
}

impl UserUpdateMe {
    pub fn validate(&self) -> Result<()> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(name) = &self.user_name {
            validate_text("user_name", name, true)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePassword {
    pub current_password: String,
    pub new_password: String,
}

impl UpdatePassword {
    pub fn validate(&self) -> Result<()> {
        validate_password(&self.new_password)?;
        if self.current_password == self.new_password {
            return Err(AppError::Validation(
                "New password cannot be the same as the current one".to_string(),
            ));
        }
        Ok(())
    }
}

// ============= Course Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    #[default]
    Enrolled,
    InProgress,
    Completed,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Enrolled => "enrolled",
            CourseStatus::InProgress => "in_progress",
            CourseStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "enrolled" => Some(CourseStatus::Enrolled),
            "in_progress" => Some(CourseStatus::InProgress),
            "completed" => Some(CourseStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CoursePublic {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<ChapterPublic>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CoursesPublic {
    pub data: Vec<CoursePublic>,
    pub count: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CourseCreate {
    pub title: String,
    pub description: Option<String>,
}

impl CourseCreate {
    pub fn validate(&self) -> Result<()> {
        validate_text("title", &self.title, true)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl CourseUpdate {
    pub fn validate(&self) -> Result<()> {
        match &self.title {
            Some(title) => validate_text("title", title, true),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChapterPublic {
    pub id: Uuid,
    pub course_id: Uuid,
    pub chapter_num: i64,
    pub title: String,
    pub description: Option<String>,
    /// Lesson content, ordered by `point_num`. Omitted unless requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<ChapterPointPublic>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChaptersPublic {
    pub data: Vec<ChapterPublic>,
    pub count: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChapterCreate {
    pub course_id: Uuid,
    #[serde(default = "default_chapter_num")]
    pub chapter_num: i64,
    pub title: String,
    pub description: Option<String>,
}

fn default_chapter_num() -> i64 {
    1
}

impl ChapterCreate {
    pub fn validate(&self) -> Result<()> {
        if self.chapter_num < 1 {
            return Err(AppError::Validation(
                "chapter_num must be at least 1".to_string(),
            ));
        }
        validate_text("title", &self.title, true)?;
        if let Some(description) = &self.description {
            validate_text("description", description, false)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ChapterUpdate {
    pub chapter_num: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl ChapterUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.chapter_num, Some(num) if num < 1) {
            return Err(AppError::Validation(
                "chapter_num must be at least 1".to_string(),
            ));
        }
        if let Some(title) = &self.title {
            validate_text("title", title, true)?;
        }
        if let Some(description) = &self.description {
            validate_text("description", description, false)?;
        }
        Ok(())
    }
}

// ============= Chapter Point Types =============

fn validate_media_url(field: &str, value: &str) -> Result<()> {
    let valid = value.len() <= FIELD_MAX_LEN
        && reqwest::Url::parse(value)
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{field} must be an http(s) URL of at most {FIELD_MAX_LEN} characters"
        )))
    }
}

fn validate_point_num(point_num: i64) -> Result<()> {
    if point_num < 1 {
        return Err(AppError::Validation(
            "point_num must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// One block of lesson content inside a chapter.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChapterPointPublic {
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

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChapterPointsPublic {
    pub data: Vec<ChapterPointPublic>,
    pub count: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChapterPointCreate {
    pub chapter_id: Uuid,
    #[serde(default = "default_chapter_num")]
    pub point_num: i64,
    pub text: Option<String>,
    pub code_block: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
}

impl ChapterPointCreate {
    pub fn validate(&self) -> Result<()> {
        validate_point_num(self.point_num)?;
        if let Some(image) = &self.image {
            validate_media_url("image", image)?;
        }
        if let Some(video) = &self.video {
            validate_media_url("video", video)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ChapterPointUpdate {
    pub point_num: Option<i64>,
    pub text: Option<String>,
    pub code_block: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
}

impl ChapterPointUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(num) = self.point_num {
            validate_point_num(num)?;
        }
        if let Some(image) = &self.image {
            validate_media_url("image", image)?;
        }
        if let Some(video) = &self.video {
            validate_media_url("video", video)?;
        }
        Ok(())
    }
}

// ============= Progress Types =============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCoursePublic {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub status: CourseStatus,
    pub current_chapter: i64,
    pub progress: i64,
    pub finished_chapters: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserCourseUpdate {
    pub status: Option<CourseStatus>,
    pub current_chapter: Option<i64>,
    pub progress: Option<i64>,
    /// Full set of finished chapter ids; the stored set is synced to it.
    pub finished_chapters: Option<Vec<Uuid>>,
}

impl UserCourseUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.current_chapter, Some(chapter) if chapter < 1) {
            return Err(AppError::Validation(
                "current_chapter must be at least 1".to_string(),
            ));
        }
        if matches!(self.progress, Some(progress) if !(0..=100).contains(&progress)) {
            return Err(AppError::Validation(
                "progress must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChapterCompletion {
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Stats {
    pub total_users: u64,
    pub total_courses: u64,
}

// ============= Query Parameters =============

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub include_count: bool,
}

fn default_limit() -> u32 {
    PAGINATION_LIMIT_DEFAULT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: PAGINATION_LIMIT_DEFAULT,
            include_count: false,
        }
    }
}

impl Pagination {
    pub fn validate(&self) -> Result<()> {
        if self.skip >= PAGINATION_LIMIT_MAX {
            return Err(AppError::Validation(format!(
                "skip must be between 0 and {}",
                PAGINATION_LIMIT_MAX - 1
            )));
        }
        if !(1..=PAGINATION_LIMIT_MAX).contains(&self.limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {PAGINATION_LIMIT_MAX}"
            )));
        }
        Ok(())
    }
}
