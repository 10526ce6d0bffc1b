//! Campaign repository

use chrono::Utc;
use safewatch_common::types::{CampaignId, PageParams, UserId};
use safewatch_common::{Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

use super::like_pattern;
use crate::db::{db_failure, is_unique_violation};
use crate::models::{
    Campaign, CampaignEvent, CampaignFilter, CampaignMilestone, CampaignObjective,
    CampaignStatus, Collaborator, CollaboratorRole, CreateCampaign, CreateEvent,
    CreateMilestone, CreateObjective, MilestoneStatus, Priority, UpdateCampaign,
    UpdateObjective,
};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new campaign in `draft`
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, name, description, category, status, priority, start_date, end_date,
                budget, target_audience, region, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.category.to_string())
        .bind(CampaignStatus::Draft.to_string())
        .bind(input.priority.unwrap_or(Priority::Medium).to_string())
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .bind(&input.target_audience)
        .bind(&input.region)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to create campaign"))
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("Failed to get campaign"))
    }

    /// Check that a campaign exists
    pub async fn exists(&self, id: CampaignId) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM campaigns WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("Failed to check campaign"))?;
        Ok(row.0)
    }

    /// List campaigns matching a filter, newest first, with the total match count
    pub async fn list(
        &self,
        filter: &CampaignFilter,
        page: PageParams,
    ) -> Result<(Vec<Campaign>, i64)> {
        let search = like_pattern(filter.search.as_deref());
        let status = filter.status.map(|s| s.to_string());
        let category = filter.category.map(|c| c.to_string());
        let priority = filter.priority.map(|p| p.to_string());

        let campaigns = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::text IS NULL OR priority = $3)
              AND ($4::text IS NULL OR name ILIKE $4 OR description ILIKE $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(&status)
        .bind(&category)
        .bind(&priority)
        .bind(&search)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list campaigns"))?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM campaigns
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::text IS NULL OR priority = $3)
              AND ($4::text IS NULL OR name ILIKE $4 OR description ILIKE $4)
            "#,
        )
        .bind(&status)
        .bind(&category)
        .bind(&priority)
        .bind(&search)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to count campaigns"))?;

        Ok((campaigns, total.0))
    }

    /// Apply a partial update
    pub async fn update(&self, id: CampaignId, input: UpdateCampaign) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                priority = COALESCE($5, priority),
                start_date = COALESCE($6, start_date),
                end_date = COALESCE($7, end_date),
                budget = COALESCE($8, budget),
                target_audience = COALESCE($9, target_audience),
                region = COALESCE($10, region),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.category.map(|c| c.to_string()))
        .bind(input.priority.map(|p| p.to_string()))
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .bind(&input.target_audience)
        .bind(&input.region)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to update campaign"))
    }

    /// Move a campaign from `from` to `to`; `None` when it is no longer in `from`
    pub async fn transition_status(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to update campaign status"))
    }

    /// Number of alerts and surveys attached to a campaign
    pub async fn dependent_counts(&self, id: CampaignId) -> Result<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM sms_alerts WHERE campaign_id = $1),
                (SELECT COUNT(*) FROM surveys WHERE campaign_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to count campaign dependencies"))?;
        Ok(row)
    }

    /// Soft delete: archive the campaign
    pub async fn archive(&self, id: CampaignId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE campaigns SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(CampaignStatus::Archived.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_failure("Failed to archive campaign"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard delete a campaign and its sub-entities in one transaction
    pub async fn delete(&self, id: CampaignId) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_failure("Failed to delete campaign"))?;

        for statement in [
            "DELETE FROM campaign_objectives WHERE campaign_id = $1",
            "DELETE FROM campaign_milestones WHERE campaign_id = $1",
            "DELETE FROM campaign_collaborators WHERE campaign_id = $1",
            "DELETE FROM campaign_events WHERE campaign_id = $1",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_failure("Failed to delete campaign"))?;
        }

        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_failure("Failed to delete campaign"))?;

        tx.commit()
            .await
            .map_err(db_failure("Failed to delete campaign"))?;

        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------------
    // Objectives
    // ------------------------------------------------------------------------

    pub async fn objectives(&self, campaign_id: CampaignId) -> Result<Vec<CampaignObjective>> {
        sqlx::query_as::<_, CampaignObjective>(
            "SELECT * FROM campaign_objectives WHERE campaign_id = $1 ORDER BY created_at",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list objectives"))
    }

    pub async fn add_objective(&self, input: CreateObjective) -> Result<CampaignObjective> {
        sqlx::query_as::<_, CampaignObjective>(
            r#"
            INSERT INTO campaign_objectives (id, campaign_id, title, description, target_value, unit)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.campaign_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.target_value)
        .bind(&input.unit)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to add objective"))
    }

    pub async fn update_objective(
        &self,
        id: Uuid,
        input: UpdateObjective,
    ) -> Result<Option<CampaignObjective>> {
        sqlx::query_as::<_, CampaignObjective>(
            r#"
            UPDATE campaign_objectives SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                target_value = COALESCE($4, target_value),
                current_value = COALESCE($5, current_value),
                unit = COALESCE($6, unit),
                status = COALESCE($7, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.target_value)
        .bind(input.current_value)
        .bind(&input.unit)
        .bind(input.status.map(|s| s.to_string()))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to update objective"))
    }

    pub async fn delete_objective(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM campaign_objectives WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to delete objective"))?;
        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------------
    // Milestones
    // ------------------------------------------------------------------------

    pub async fn milestones(&self, campaign_id: CampaignId) -> Result<Vec<CampaignMilestone>> {
        sqlx::query_as::<_, CampaignMilestone>(
            "SELECT * FROM campaign_milestones WHERE campaign_id = $1 ORDER BY due_date",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list milestones"))
    }

    pub async fn add_milestone(&self, input: CreateMilestone) -> Result<CampaignMilestone> {
        sqlx::query_as::<_, CampaignMilestone>(
            r#"
            INSERT INTO campaign_milestones (id, campaign_id, title, description, due_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.campaign_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.due_date)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to add milestone"))
    }

    /// Mark a pending milestone completed; `None` if missing or already done
    pub async fn complete_milestone(&self, id: Uuid) -> Result<Option<CampaignMilestone>> {
        sqlx::query_as::<_, CampaignMilestone>(
            r#"
            UPDATE campaign_milestones SET
                status = $2,
                completed_at = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = $4
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(MilestoneStatus::Completed.to_string())
        .bind(Utc::now())
        .bind(MilestoneStatus::Pending.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to complete milestone"))
    }

    pub async fn delete_milestone(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM campaign_milestones WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to delete milestone"))?;
        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------------

    pub async fn collaborators(&self, campaign_id: CampaignId) -> Result<Vec<Collaborator>> {
        sqlx::query_as::<_, Collaborator>(
            r#"
            SELECT cc.campaign_id, cc.user_id, u.username, u.full_name, cc.role, cc.added_at
            FROM campaign_collaborators cc
            JOIN users u ON u.id = cc.user_id
            WHERE cc.campaign_id = $1
            ORDER BY cc.added_at
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list collaborators"))
    }

    /// Add a collaborator; a duplicate pair is a conflict
    pub async fn add_collaborator(
        &self,
        campaign_id: CampaignId,
        user_id: UserId,
        role: CollaboratorRole,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO campaign_collaborators (campaign_id, user_id, role) VALUES ($1, $2, $3)",
        )
        .bind(campaign_id)
        .bind(user_id)
        .bind(role.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::conflict("User is already a collaborator on this campaign")
            } else {
                db_failure("Failed to add collaborator")(e)
            }
        })?;
        Ok(())
    }

    pub async fn remove_collaborator(&self, campaign_id: CampaignId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM campaign_collaborators WHERE campaign_id = $1 AND user_id = $2",
        )
        .bind(campaign_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_failure("Failed to remove collaborator"))?;
        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub async fn events(&self, campaign_id: CampaignId) -> Result<Vec<CampaignEvent>> {
        sqlx::query_as::<_, CampaignEvent>(
            "SELECT * FROM campaign_events WHERE campaign_id = $1 ORDER BY event_date",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list events"))
    }

    pub async fn add_event(&self, input: CreateEvent) -> Result<CampaignEvent> {
        sqlx::query_as::<_, CampaignEvent>(
            r#"
            INSERT INTO campaign_events (id, campaign_id, title, description, event_date, location)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.campaign_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.event_date)
        .bind(&input.location)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to add event"))
    }

    pub async fn delete_event(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM campaign_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to delete event"))?;
        Ok(result.rows_affected() > 0)
    }
}
