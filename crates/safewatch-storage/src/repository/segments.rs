//! Audience segment repository

use safewatch_common::types::{ContactId, PageParams, SegmentId};
use safewatch_common::{Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

use super::like_pattern;
use crate::db::{db_failure, is_unique_violation};
use crate::models::{
    Contact, ContactStatus, CreateSegment, Segment, SegmentFilter, SegmentStatus, UpdateSegment,
};

const SEGMENT_COLUMNS: &str = r#"
    s.id, s.name, s.description, s.criteria, s.status, s.created_by,
    (SELECT COUNT(*) FROM segment_contacts sc WHERE sc.segment_id = s.id) AS contact_count,
    s.created_at, s.updated_at
"#;

/// Segment repository
#[derive(Clone)]
pub struct SegmentRepository {
    pool: PgPool,
}

impl SegmentRepository {
    /// Create a new segment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new segment; the name must be unique
    pub async fn create(&self, input: CreateSegment) -> Result<Segment> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO segments (id, name, description, criteria, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.criteria.clone().unwrap_or_else(|| serde_json::json!({})))
        .bind(SegmentStatus::Active.to_string())
        .bind(input.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::conflict("A segment with this name already exists")
            } else {
                db_failure("Failed to create segment")(e)
            }
        })?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal("Segment vanished after insert".to_string()))
    }

    /// Get a segment by ID, with its member count
    pub async fn get(&self, id: SegmentId) -> Result<Option<Segment>> {
        let sql = format!("SELECT {} FROM segments s WHERE s.id = $1", SEGMENT_COLUMNS);
        sqlx::query_as::<_, Segment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("Failed to get segment"))
    }

    /// Check that a segment exists
    pub async fn exists(&self, id: SegmentId) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM segments WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("Failed to check segment"))?;
        Ok(row.0)
    }

    /// List segments with member counts, ordered by name
    pub async fn list(&self, filter: &SegmentFilter, page: PageParams) -> Result<(Vec<Segment>, i64)> {
        let search = like_pattern(filter.search.as_deref());
        let status = filter.status.map(|s| s.to_string());

        let sql = format!(
            r#"
            SELECT {} FROM segments s
            WHERE ($1::text IS NULL OR s.status = $1)
              AND ($2::text IS NULL OR s.name ILIKE $2 OR s.description ILIKE $2)
            ORDER BY s.name
            LIMIT $3 OFFSET $4
            "#,
            SEGMENT_COLUMNS
        );

        let segments = sqlx::query_as::<_, Segment>(&sql)
            .bind(&status)
            .bind(&search)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db_failure("Failed to list segments"))?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM segments s
            WHERE ($1::text IS NULL OR s.status = $1)
              AND ($2::text IS NULL OR s.name ILIKE $2 OR s.description ILIKE $2)
            "#,
        )
        .bind(&status)
        .bind(&search)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to count segments"))?;

        Ok((segments, total.0))
    }

    /// Apply a partial update
    pub async fn update(&self, id: SegmentId, input: UpdateSegment) -> Result<Option<Segment>> {
        let result = sqlx::query(
            r#"
            UPDATE segments SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                criteria = COALESCE($4, criteria),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.criteria)
        .bind(input.status.map(|s| s.to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::conflict("A segment with this name already exists")
            } else {
                db_failure("Failed to update segment")(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Add contacts to a segment in one transaction, skipping existing
    /// members. Returns how many memberships were created.
    pub async fn add_members(&self, id: SegmentId, contact_ids: &[ContactId]) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_failure("Failed to add contacts to segment"))?;

        let mut added = 0;
        for contact_id in contact_ids {
            let result = sqlx::query(
                r#"
                INSERT INTO segment_contacts (segment_id, contact_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(contact_id)
            .execute(&mut *tx)
            .await
            .map_err(db_failure("Failed to add contacts to segment"))?;
            added += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(db_failure("Failed to add contacts to segment"))?;

        Ok(added)
    }

    /// Remove one contact from a segment
    pub async fn remove_member(&self, id: SegmentId, contact_id: ContactId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM segment_contacts WHERE segment_id = $1 AND contact_id = $2")
                .bind(id)
                .bind(contact_id)
                .execute(&self.pool)
                .await
                .map_err(db_failure("Failed to remove contact from segment"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Page through a segment's members
    pub async fn members(&self, id: SegmentId, page: PageParams) -> Result<(Vec<Contact>, i64)> {
        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT c.* FROM contacts c
            JOIN segment_contacts sc ON sc.contact_id = c.id
            WHERE sc.segment_id = $1
            ORDER BY c.last_name, c.first_name
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list segment contacts"))?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM segment_contacts WHERE segment_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_failure("Failed to count segment contacts"))?;

        Ok((contacts, total.0))
    }

    /// Members that would receive an SMS alert: active with a phone
    pub async fn eligible_count(&self, id: SegmentId) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM contacts c
            JOIN segment_contacts sc ON sc.contact_id = c.id
            WHERE sc.segment_id = $1
              AND c.status = $2
              AND c.phone IS NOT NULL AND BTRIM(c.phone) <> ''
            "#,
        )
        .bind(id)
        .bind(ContactStatus::Active.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to count eligible contacts"))?;
        Ok(row.0)
    }

    /// Whether any SMS alert targets the segment
    pub async fn referenced_by_alerts(&self, id: SegmentId) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM sms_alerts WHERE audience_segment_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to check segment usage"))?;
        Ok(row.0)
    }

    /// Soft delete: archive the segment
    pub async fn archive(&self, id: SegmentId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE segments SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(SegmentStatus::Archived.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_failure("Failed to archive segment"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard delete a segment and its memberships in one transaction
    pub async fn delete(&self, id: SegmentId) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_failure("Failed to delete segment"))?;

        sqlx::query("DELETE FROM segment_contacts WHERE segment_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_failure("Failed to delete segment"))?;

        let result = sqlx::query("DELETE FROM segments WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_failure("Failed to delete segment"))?;

        tx.commit()
            .await
            .map_err(db_failure("Failed to delete segment"))?;

        Ok(result.rows_affected() > 0)
    }
}
