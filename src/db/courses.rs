use super::models::{Chapter, Course, CHAPTER_COLUMNS, COURSE_COLUMNS};
use super::turso::{write_error, Database};
use crate::types::{AppError, ChapterCreate, ChapterUpdate, CourseCreate, CourseUpdate, Result};
use chrono::Utc;
use uuid::Uuid;

impl Database {
    // Course operations

    pub async fn create_course(&self, course: &CourseCreate) -> Result<Course> {
        let conn = self.connection()?;
        let id = Uuid::new_v4();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO courses (id, title, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                course.title.as_str(),
                course.description.as_deref(),
                now,
                now,
            ),
        )
        .await
        .map_err(|e| write_error("create course", e))?;

        self.require_course(id).await
    }

    pub async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?"),
                [id.to_string()],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query course: {}", e)))?;

        match rows.next().await? {
            Some(row) => Ok(Some(Course::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Like [`get_course`](Self::get_course) but absent is a 404.
    pub async fn require_course(&self, id: Uuid) -> Result<Course> {
        self.get_course(id)
            .await?
            .ok_or_else(|| AppError::not_found("Course", id))
    }

    pub async fn list_courses(&self, skip: u32, limit: u32) -> Result<Vec<Course>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY rowid LIMIT ? OFFSET ?"),
                (i64::from(limit), i64::from(skip)),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to list courses: {}", e)))?;

        let mut courses = Vec::new();
        while let Some(row) = rows.next().await? {
            courses.push(Course::from_row(&row)?);
        }
        Ok(courses)
    }

    pub async fn count_courses(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM courses").await
    }

    pub async fn update_course(&self, id: Uuid, update: &CourseUpdate) -> Result<Course> {
        self.require_course(id).await?;
        let conn = self.connection()?;

        conn.execute(
            "UPDATE courses SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                updated_at = ?
             WHERE id = ?",
            (
                update.title.as_deref(),
                update.description.as_deref(),
                Utc::now().timestamp(),
                id.to_string(),
            ),
        )
        .await
        .map_err(|e| write_error("update course", e))?;

        self.require_course(id).await
    }

    /// Deletes a course together with its chapters, their points,
    /// enrollments and completion records.
    pub async fn delete_course(&self, id: Uuid) -> Result<()> {
        self.require_course(id).await?;
        let conn = self.connection()?;
        let id = id.to_string();

        conn.execute(
            "DELETE FROM chapter_points
             WHERE chapter_id IN (SELECT id FROM chapters WHERE course_id = ?)",
            [id.as_str()],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to delete chapter points: {}", e)))?;

        for (table, column) in [
            ("finished_chapters", "course_id"),
            ("user_courses", "course_id"),
            ("chapters", "course_id"),
            ("courses", "id"),
        ] {
            conn.execute(
                &format!("DELETE FROM {table} WHERE {column} = ?"),
                [id.as_str()],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete from {table}: {}", e)))?;
        }

        Ok(())
    }

    // Chapter operations

    pub async fn create_chapter(&self, chapter: &ChapterCreate) -> Result<Chapter> {
        self.require_course(chapter.course_id).await?;
        self.ensure_chapter_num_free(chapter.course_id, chapter.chapter_num, None)
            .await?;

        let conn = self.connection()?;
        let id = Uuid::new_v4();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO chapters (id, course_id, chapter_num, title, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                chapter.course_id.to_string(),
                chapter.chapter_num,
                chapter.title.as_str(),
                chapter.description.as_deref(),
                now,
                now,
            ),
        )
        .await
        .map_err(|e| write_error("create chapter", e))?;

        self.require_chapter(id).await
    }

    async fn ensure_chapter_num_free(
        &self,
        course_id: Uuid,
        chapter_num: i64,
        except: Option<Uuid>,
    ) -> Result<()> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT id FROM chapters WHERE course_id = ? AND chapter_num = ?",
                (course_id.to_string(), chapter_num),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query chapters: {}", e)))?;

        if let Some(row) = rows.next().await? {
            let existing = super::models::uuid_at(&row, 0)?;
            if Some(existing) != except {
                return Err(AppError::Conflict(format!(
                    "Chapter {chapter_num} already exists in this course"
                )));
            }
        }
        Ok(())
    }

    pub async fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = ?"),
                [id.to_string()],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query chapter: {}", e)))?;

        match rows.next().await? {
            Some(row) => Ok(Some(Chapter::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn require_chapter(&self, id: Uuid) -> Result<Chapter> {
        self.get_chapter(id)
            .await?
            .ok_or_else(|| AppError::not_found("Chapter", id))
    }

    pub async fn list_chapters(&self, skip: u32, limit: u32) -> Result<Vec<Chapter>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!("SELECT {CHAPTER_COLUMNS} FROM chapters ORDER BY rowid LIMIT ? OFFSET ?"),
                (i64::from(limit), i64::from(skip)),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to list chapters: {}", e)))?;

        let mut chapters = Vec::new();
        while let Some(row) = rows.next().await? {
            chapters.push(Chapter::from_row(&row)?);
        }
        Ok(chapters)
    }

    pub async fn count_chapters(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM chapters").await
    }

    /// Chapters of one course in `chapter_num` order.
    pub async fn course_chapters(&self, course_id: Uuid) -> Result<Vec<Chapter>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE course_id = ? ORDER BY chapter_num"
                ),
                [course_id.to_string()],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query chapters: {}", e)))?;

        let mut chapters = Vec::new();
        while let Some(row) = rows.next().await? {
            chapters.push(Chapter::from_row(&row)?);
        }
        Ok(chapters)
    }

    pub async fn update_chapter(&self, id: Uuid, update: &ChapterUpdate) -> Result<Chapter> {
        let current = self.require_chapter(id).await?;
        if let Some(num) = update.chapter_num {
            self.ensure_chapter_num_free(current.course_id, num, Some(id))
                .await?;
        }

        let conn = self.connection()?;
        conn.execute(
            "UPDATE chapters SET
                chapter_num = COALESCE(?, chapter_num),
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                updated_at = ?
             WHERE id = ?",
            (
                update.chapter_num,
                update.title.as_deref(),
                update.description.as_deref(),
                Utc::now().timestamp(),
                id.to_string(),
            ),
        )
        .await
        .map_err(|e| write_error("update chapter", e))?;

        self.require_chapter(id).await
    }

    pub async fn delete_chapter(&self, id: Uuid) -> Result<()> {
        self.require_chapter(id).await?;
        let conn = self.connection()?;
        let id = id.to_string();

        for table in ["finished_chapters", "chapter_points"] {
            conn.execute(
                &format!("DELETE FROM {table} WHERE chapter_id = ?"),
                [id.as_str()],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete from {table}: {}", e)))?;
        }

        conn.execute("DELETE FROM chapters WHERE id = ?", [id.as_str()])
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete chapter: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(title: &str) -> CourseCreate {
        CourseCreate {
            title: title.to_string(),
            description: Some("JavaScript from zero".to_string()),
        }
    }

    fn chapter(course_id: Uuid, num: i64) -> ChapterCreate {
        ChapterCreate {
            course_id,
            chapter_num: num,
            title: format!("Chapter {num}"),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_course_crud() {
        let db = Database::new_memory().await.unwrap();

        let created = db.create_course(&course("Intro to JS")).await.unwrap();
        assert_eq!(db.count_courses().await.unwrap(), 1);

        let updated = db
            .update_course(
                created.id,
                &CourseUpdate {
                    title: Some("Intro to JavaScript".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Intro to JavaScript");
        assert_eq!(updated.description.as_deref(), Some("JavaScript from zero"));

        db.delete_course(created.id).await.unwrap();
        assert!(db.get_course(created.id).await.unwrap().is_none());
        assert!(matches!(
            db.delete_course(created.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_chapter_requires_existing_course() {
        let db = Database::new_memory().await.unwrap();

        let result = db.create_chapter(&chapter(Uuid::new_v4(), 1)).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_chapter_num_is_unique_per_course() {
        let db = Database::new_memory().await.unwrap();
        let first = db.create_course(&course("First")).await.unwrap();
        let second = db.create_course(&course("Second")).await.unwrap();

        db.create_chapter(&chapter(first.id, 1)).await.unwrap();
        let clash = db.create_chapter(&chapter(first.id, 1)).await;
        let other_course = db.create_chapter(&chapter(second.id, 1)).await;

        assert!(matches!(clash, Err(AppError::Conflict(_))));
        assert!(other_course.is_ok());
    }

    #[tokio::test]
    async fn test_update_chapter_num_conflict() {
        let db = Database::new_memory().await.unwrap();
        let course = db.create_course(&course("Course")).await.unwrap();
        db.create_chapter(&chapter(course.id, 1)).await.unwrap();
        let two = db.create_chapter(&chapter(course.id, 2)).await.unwrap();

        let clash = db
            .update_chapter(
                two.id,
                &ChapterUpdate {
                    chapter_num: Some(1),
                    ..ChapterUpdate::default()
                },
            )
            .await;
        let same = db
            .update_chapter(
                two.id,
                &ChapterUpdate {
                    chapter_num: Some(2),
                    title: Some("Loops".to_string()),
                    ..ChapterUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(clash, Err(AppError::Conflict(_))));
        assert_eq!(same.title, "Loops");
    }

    #[tokio::test]
    async fn test_course_chapters_are_ordered_and_cascade() {
        let db = Database::new_memory().await.unwrap();
        let course = db.create_course(&course("Course")).await.unwrap();
        db.create_chapter(&chapter(course.id, 3)).await.unwrap();
        db.create_chapter(&chapter(course.id, 1)).await.unwrap();
        db.create_chapter(&chapter(course.id, 2)).await.unwrap();

        let nums: Vec<_> = db
            .course_chapters(course.id)
            .await
            .unwrap()
            .iter()
            .map(|c| c.chapter_num)
            .collect();
        assert_eq!(nums, [1, 2, 3]);

        db.delete_course(course.id).await.unwrap();
        assert_eq!(db.count_chapters().await.unwrap(), 0);
    }
}
