use super::models::{ChapterPoint, CHAPTER_POINT_COLUMNS};
use super::turso::{write_error, Database};
use crate::types::{AppError, ChapterPointCreate, ChapterPointUpdate, Result};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

impl Database {
    pub async fn create_chapter_point(&self, point: &ChapterPointCreate) -> Result<ChapterPoint> {
        self.require_chapter(point.chapter_id).await?;
        self.ensure_point_num_free(point.chapter_id, point.point_num, None)
            .await?;

        let conn = self.connection()?;
        let id = Uuid::new_v4();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO chapter_points
                (id, chapter_id, point_num, text, code_block, image, video, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                point.chapter_id.to_string(),
                point.point_num,
                point.text.as_deref(),
                point.code_block.as_deref(),
                point.image.as_deref(),
                point.video.as_deref(),
                now,
                now,
            ),
        )
        .await
        .map_err(|e| write_error("create chapter point", e))?;

        self.require_chapter_point(id).await
    }

    async fn ensure_point_num_free(
        &self,
        chapter_id: Uuid,
        point_num: i64,
        except: Option<Uuid>,
    ) -> Result<()> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT id FROM chapter_points WHERE chapter_id = ? AND point_num = ?",
                (chapter_id.to_string(), point_num),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query chapter points: {}", e)))?;

        if let Some(row) = rows.next().await? {
            let existing = super::models::uuid_at(&row, 0)?;
            if Some(existing) != except {
                return Err(AppError::Conflict(format!(
                    "Point {point_num} already exists in this chapter"
                )));
            }
        }
        Ok(())
    }

    pub async fn get_chapter_point(&self, id: Uuid) -> Result<Option<ChapterPoint>> {
        let conn = self.connection()?;

        let mut rows = conn
            .query(
                &format!("SELECT {CHAPTER_POINT_COLUMNS} FROM chapter_points WHERE id = ?"),
                [id.to_string()],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query chapter point: {}", e)))?;

        match rows.next().await? {
            Some(row) => Ok(Some(ChapterPoint::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn require_chapter_point(&self, id: Uuid) -> Result<ChapterPoint> {
        self.get_chapter_point(id)
            .await?
            .ok_or_else(|| AppError::not_found("Chapter point", id))
    }

    pub async fn list_chapter_points(&self, skip: u32, limit: u32) -> Result<Vec<ChapterPoint>> {
        self.query_points(
            &format!(
                "SELECT {CHAPTER_POINT_COLUMNS} FROM chapter_points ORDER BY rowid LIMIT ? OFFSET ?"
            ),
            (i64::from(limit), i64::from(skip)),
        )
        .await
    }

    pub async fn count_chapter_points(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM chapter_points").await
    }

    /// Points of one chapter in `point_num` order.
    pub async fn chapter_points(&self, chapter_id: Uuid) -> Result<Vec<ChapterPoint>> {
        self.query_points(
            &format!(
                "SELECT {CHAPTER_POINT_COLUMNS} FROM chapter_points
                 WHERE chapter_id = ? ORDER BY point_num"
            ),
            [chapter_id.to_string()],
        )
        .await
    }

    /// Every point of a course's chapters, grouped by chapter id.
    pub async fn course_chapter_points(
        &self,
        course_id: Uuid,
    ) -> Result<HashMap<Uuid, Vec<ChapterPoint>>> {
        let points = self
            .query_points(
                &format!(
                    "SELECT {CHAPTER_POINT_COLUMNS} FROM chapter_points
                     WHERE chapter_id IN (SELECT id FROM chapters WHERE course_id = ?)
                     ORDER BY point_num"
                ),
                [course_id.to_string()],
            )
            .await?;

        let mut grouped: HashMap<Uuid, Vec<ChapterPoint>> = HashMap::new();
        for point in points {
            grouped.entry(point.chapter_id).or_default().push(point);
        }
        Ok(grouped)
    }

    async fn query_points(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<ChapterPoint>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| AppError::Database(format!("Failed to query chapter points: {}", e)))?;

        let mut points = Vec::new();
        while let Some(row) = rows.next().await? {
            points.push(ChapterPoint::from_row(&row)?);
        }
        Ok(points)
    }

    pub async fn update_chapter_point(
        &self,
        id: Uuid,
        update: &ChapterPointUpdate,
    ) -> Result<ChapterPoint> {
        let current = self.require_chapter_point(id).await?;
        if let Some(num) = update.point_num {
            self.ensure_point_num_free(current.chapter_id, num, Some(id))
                .await?;
        }

        let conn = self.connection()?;
        conn.execute(
            "UPDATE chapter_points SET
                point_num = COALESCE(?, point_num),
                text = COALESCE(?, text),
                code_block = COALESCE(?, code_block),
                image = COALESCE(?, image),
                video = COALESCE(?, video),
                updated_at = ?
             WHERE id = ?",
            (
                update.point_num,
                update.text.as_deref(),
                update.code_block.as_deref(),
                update.image.as_deref(),
                update.video.as_deref(),
                Utc::now().timestamp(),
                id.to_string(),
            ),
        )
        .await
        .map_err(|e| write_error("update chapter point", e))?;

        self.require_chapter_point(id).await
    }

    pub async fn delete_chapter_point(&self, id: Uuid) -> Result<()> {
        self.require_chapter_point(id).await?;
        let conn = self.connection()?;

        conn.execute("DELETE FROM chapter_points WHERE id = ?", [id.to_string()])
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete chapter point: {}", e)))?;

        Ok(())
    }
}
