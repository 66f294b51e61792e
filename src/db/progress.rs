use super::models::{uuid_at, Enrollment, ENROLLMENT_COLUMNS};
use super::turso::{write_error, Database};
use crate::types::{AppError, CourseStatus, Result, UserCourseUpdate};
use chrono::Utc;
use std::collections::HashSet;
use uuid::Uuid;

impl Database {
    /// Enrolls a user in a course. Enrolling twice is a conflict.
    pub async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        self.require_course(course_id).await?;
        if self.get_enrollment(user_id, course_id).await?.is_some() {
            return Err(AppError::Conflict(
                "User is already enrolled in this course".to_string(),
            ));
        }

        let conn = self.connection()?;
        let now = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO user_courses (user_id, course_id, status, current_chapter, progress, created_at, updated_at)
             VALUES (?, ?, ?, 1, 0, ?, ?)",
            (
                user_id.to_string(),
                course_id.to_string(),
                CourseStatus::Enrolled.as_str(),
                now,
                now,
            ),
        )
        .await
        .map_err(|e| write_error("enroll user", e))?;

        self.require_enrollment(user_id, course_id).await
    }

    pub async fn get_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ENROLLMENT_COLUMNS} FROM user_courses WHERE user_id = ? AND course_id = ?"
                ),
                (user_id.to_string(), course_id.to_string()),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query enrollment: {}", e)))?;

        match rows.next().await? {
            Some(row) => Ok(Some(Enrollment::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn require_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        self.get_enrollment(user_id, course_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("User is not enrolled in course {course_id}"))
            })
    }

    pub async fn list_enrollments(&self, user_id: Uuid) -> Result<Vec<Enrollment>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ENROLLMENT_COLUMNS} FROM user_courses WHERE user_id = ? ORDER BY rowid"
                ),
                [user_id.to_string()],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to list enrollments: {}", e)))?;

        let mut enrollments = Vec::new();
        while let Some(row) = rows.next().await? {
            enrollments.push(Enrollment::from_row(&row)?);
        }
        Ok(enrollments)
    }

    /// Applies a learner's progress update.
    ///
    /// When `finished_chapters` is given, the stored set is replaced by it;
    /// every id must belong to the course.
    pub async fn update_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        update: &UserCourseUpdate,
    ) -> Result<Enrollment> {
        self.require_enrollment(user_id, course_id).await?;

        if let Some(finished) = &update.finished_chapters {
            self.sync_finished_chapters(user_id, course_id, finished)
                .await?;
        }

        let conn = self.connection()?;
        conn.execute(
            "UPDATE user_courses SET
                status = COALESCE(?, status),
                current_chapter = COALESCE(?, current_chapter),
                progress = COALESCE(?, progress),
                updated_at = ?
             WHERE user_id = ? AND course_id = ?",
            (
                update.status.map(|s| s.as_str()),
                update.current_chapter,
                update.progress,
                Utc::now().timestamp(),
                user_id.to_string(),
                course_id.to_string(),
            ),
        )
        .await
        .map_err(|e| write_error("update enrollment", e))?;

        self.require_enrollment(user_id, course_id).await
    }

    /// Finished chapter ids for one enrollment, in completion order.
    pub async fn finished_chapters(&self, user_id: Uuid, course_id: Uuid) -> Result<Vec<Uuid>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                "SELECT chapter_id FROM finished_chapters
                 WHERE user_id = ? AND course_id = ? ORDER BY rowid",
                (user_id.to_string(), course_id.to_string()),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query finished chapters: {}", e)))?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(uuid_at(&row, 0)?);
        }
        Ok(ids)
    }

    async fn sync_finished_chapters(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        wanted: &[Uuid],
    ) -> Result<()> {
        let course_chapters: HashSet<Uuid> = self
            .course_chapters(course_id)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        if let Some(stray) = wanted.iter().find(|id| !course_chapters.contains(id)) {
            return Err(AppError::Validation(format!(
                "Chapter {stray} does not belong to course {course_id}"
            )));
        }

        let wanted: HashSet<Uuid> = wanted.iter().copied().collect();
        let current: HashSet<Uuid> = self
            .finished_chapters(user_id, course_id)
            .await?
            .into_iter()
            .collect();

        let conn = self.connection()?;
        for removed in current.difference(&wanted) {
            conn.execute(
                "DELETE FROM finished_chapters WHERE user_id = ? AND chapter_id = ?",
                (user_id.to_string(), removed.to_string()),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to unmark chapter: {}", e)))?;
        }
        for added in wanted.difference(&current) {
            self.insert_finished(user_id, course_id, *added).await?;
        }

        Ok(())
    }

    async fn insert_finished(&self, user_id: Uuid, course_id: Uuid, chapter_id: Uuid) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO finished_chapters (user_id, course_id, chapter_id, created_at)
             VALUES (?, ?, ?, ?)",
            (
                user_id.to_string(),
                course_id.to_string(),
                chapter_id.to_string(),
                Utc::now().timestamp(),
            ),
        )
        .await
        .map_err(|e| write_error("mark chapter finished", e))?;
        Ok(())
    }

    pub async fn is_chapter_finished(&self, user_id: Uuid, chapter_id: Uuid) -> Result<bool> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM finished_chapters WHERE user_id = ? AND chapter_id = ?",
                (user_id.to_string(), chapter_id.to_string()),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query finished chapter: {}", e)))?;

        Ok(rows.next().await?.is_some())
    }

    /// Marks a chapter finished and recomputes the enrollment's progress.
    ///
    /// The learner must be enrolled in the chapter's course.
    pub async fn complete_chapter(&self, user_id: Uuid, chapter_id: Uuid) -> Result<Enrollment> {
        let chapter = self.require_chapter(chapter_id).await?;
        self.require_enrollment(user_id, chapter.course_id).await?;

        if self.is_chapter_finished(user_id, chapter_id).await? {
            return Err(AppError::Conflict(
                "Chapter is already marked as finished".to_string(),
            ));
        }

        self.insert_finished(user_id, chapter.course_id, chapter_id)
            .await?;
        self.recompute_progress(user_id, chapter.course_id).await
    }

    /// Sets `progress` to the finished share of the course's chapters and
    /// derives the status from it.
    pub async fn recompute_progress(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        let chapters = self.course_chapters(course_id).await?;
        let finished: HashSet<Uuid> = self
            .finished_chapters(user_id, course_id)
            .await?
            .into_iter()
            .collect();

        let total = chapters.len() as i64;
        let done = chapters.iter().filter(|c| finished.contains(&c.id)).count() as i64;
        let progress = if total == 0 { 0 } else { done * 100 / total };
        let status = match done {
            0 => CourseStatus::Enrolled,
            n if n == total => CourseStatus::Completed,
            _ => CourseStatus::InProgress,
        };
        let current_chapter = chapters
            .iter()
            .find(|c| !finished.contains(&c.id))
            .or(chapters.last())
            .map_or(1, |c| c.chapter_num);

        let conn = self.connection()?;
        conn.execute(
            "UPDATE user_courses SET status = ?, current_chapter = ?, progress = ?, updated_at = ?
             WHERE user_id = ? AND course_id = ?",
            (
                status.as_str(),
                current_chapter,
                progress,
                Utc::now().timestamp(),
                user_id.to_string(),
                course_id.to_string(),
            ),
        )
        .await
        .map_err(|e| write_error("update progress", e))?;

        self.require_enrollment(user_id, course_id).await
    }
}
