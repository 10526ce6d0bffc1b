//! Survey repository

use safewatch_common::types::{ContactId, PageParams, QuestionId, SurveyId};
use safewatch_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::like_pattern;
use crate::db::{db_failure, reference_failure};
use crate::models::{
    CreateQuestion, CreateSurvey, Survey, SurveyFilter, SurveyQuestion, SurveyResponse,
    SurveyStatus, UpdateSurvey,
};

/// Survey repository
#[derive(Clone)]
pub struct SurveyRepository {
    pool: PgPool,
}

impl SurveyRepository {
    /// Create a new survey repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a survey together with its initial questions in one transaction
    pub async fn create(
        &self,
        input: CreateSurvey,
        questions: Vec<CreateQuestion>,
    ) -> Result<(Survey, Vec<SurveyQuestion>)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_failure("Failed to create survey"))?;

        let survey = sqlx::query_as::<_, Survey>(
            r#"
            INSERT INTO surveys (
                id, title, description, campaign_id, status, start_date, end_date,
                is_anonymous, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.campaign_id)
        .bind(input.status.unwrap_or(SurveyStatus::Draft).to_string())
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.is_anonymous.unwrap_or(false))
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_failure("Failed to create survey"))?;

        let mut created = Vec::with_capacity(questions.len());
        for (position, question) in questions.into_iter().enumerate() {
            let order_index = question.order_index.unwrap_or(position as i32);
            let row = insert_question(&mut tx, survey.id, &question, order_index)
                .await
                .map_err(db_failure("Failed to create survey"))?;
            created.push(row);
        }

        tx.commit()
            .await
            .map_err(db_failure("Failed to create survey"))?;

        created.sort_by_key(|q| q.order_index);
        Ok((survey, created))
    }

    /// Get a survey by ID
    pub async fn get(&self, id: SurveyId) -> Result<Option<Survey>> {
        sqlx::query_as::<_, Survey>("SELECT * FROM surveys WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("Failed to get survey"))
    }

    /// List surveys matching a filter, newest first
    pub async fn list(&self, filter: &SurveyFilter, page: PageParams) -> Result<(Vec<Survey>, i64)> {
        let search = like_pattern(filter.search.as_deref());
        let status = filter.status.map(|s| s.to_string());

        let surveys = sqlx::query_as::<_, Survey>(
            r#"
            SELECT * FROM surveys
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR campaign_id = $2)
              AND ($3::text IS NULL OR title ILIKE $3 OR description ILIKE $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&status)
        .bind(filter.campaign_id)
        .bind(&search)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list surveys"))?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM surveys
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR campaign_id = $2)
              AND ($3::text IS NULL OR title ILIKE $3 OR description ILIKE $3)
            "#,
        )
        .bind(&status)
        .bind(filter.campaign_id)
        .bind(&search)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to count surveys"))?;

        Ok((surveys, total.0))
    }

    /// Apply a partial update
    pub async fn update(&self, id: SurveyId, input: UpdateSurvey) -> Result<Option<Survey>> {
        sqlx::query_as::<_, Survey>(
            r#"
            UPDATE surveys SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                campaign_id = COALESCE($4, campaign_id),
                status = COALESCE($5, status),
                start_date = COALESCE($6, start_date),
                end_date = COALESCE($7, end_date),
                is_anonymous = COALESCE($8, is_anonymous),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.campaign_id)
        .bind(input.status.map(|s| s.to_string()))
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.is_anonymous)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to update survey"))
    }

    /// Questions of a survey in display order
    pub async fn questions(&self, survey_id: SurveyId) -> Result<Vec<SurveyQuestion>> {
        sqlx::query_as::<_, SurveyQuestion>(
            r#"
            SELECT * FROM survey_questions
            WHERE survey_id = $1
            ORDER BY order_index, created_at
            "#,
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list survey questions"))
    }

    /// Append a question; without an explicit index it goes last
    pub async fn add_question(
        &self,
        survey_id: SurveyId,
        question: CreateQuestion,
    ) -> Result<SurveyQuestion> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_failure("Failed to add question"))?;

        let order_index = match question.order_index {
            Some(index) => index,
            None => {
                let row: (i32,) = sqlx::query_as(
                    "SELECT COALESCE(MAX(order_index) + 1, 0) FROM survey_questions WHERE survey_id = $1",
                )
                .bind(survey_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_failure("Failed to add question"))?;
                row.0
            }
        };

        let created = insert_question(&mut tx, survey_id, &question, order_index)
            .await
            .map_err(db_failure("Failed to add question"))?;

        tx.commit()
            .await
            .map_err(db_failure("Failed to add question"))?;

        Ok(created)
    }

    /// Delete one question of a survey
    pub async fn delete_question(&self, survey_id: SurveyId, id: QuestionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM survey_questions WHERE id = $1 AND survey_id = $2")
            .bind(id)
            .bind(survey_id)
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to delete question"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of responses submitted to a survey
    pub async fn response_count(&self, survey_id: SurveyId) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM survey_responses WHERE survey_id = $1")
            .bind(survey_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("Failed to count survey responses"))?;
        Ok(row.0)
    }

    /// Store a validated response
    pub async fn insert_response(
        &self,
        survey_id: SurveyId,
        contact_id: Option<ContactId>,
        answers: serde_json::Value,
    ) -> Result<SurveyResponse> {
        sqlx::query_as::<_, SurveyResponse>(
            r#"
            INSERT INTO survey_responses (id, survey_id, contact_id, answers)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(survey_id)
        .bind(contact_id)
        .bind(answers)
        .fetch_one(&self.pool)
        .await
        .map_err(reference_failure("Failed to submit response", "Contact not found"))
    }

    /// Page through responses, newest first
    pub async fn list_responses(
        &self,
        survey_id: SurveyId,
        page: PageParams,
    ) -> Result<(Vec<SurveyResponse>, i64)> {
        let responses = sqlx::query_as::<_, SurveyResponse>(
            r#"
            SELECT * FROM survey_responses
            WHERE survey_id = $1
            ORDER BY submitted_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(survey_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list survey responses"))?;

        let total = self.response_count(survey_id).await?;
        Ok((responses, total))
    }

    /// Every response of a survey, newest first (analytics input)
    pub async fn all_responses(&self, survey_id: SurveyId) -> Result<Vec<SurveyResponse>> {
        sqlx::query_as::<_, SurveyResponse>(
            "SELECT * FROM survey_responses WHERE survey_id = $1 ORDER BY submitted_at DESC",
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to load survey responses"))
    }

    /// Soft delete: archive the survey
    pub async fn archive(&self, id: SurveyId) -> Result<bool> {
        let result = sqlx::query("UPDATE surveys SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(SurveyStatus::Archived.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to archive survey"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard delete a survey and its questions in one transaction
    pub async fn delete(&self, id: SurveyId) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_failure("Failed to delete survey"))?;

        sqlx::query("DELETE FROM survey_questions WHERE survey_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_failure("Failed to delete survey"))?;

        let result = sqlx::query("DELETE FROM surveys WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_failure("Failed to delete survey"))?;

        tx.commit()
            .await
            .map_err(db_failure("Failed to delete survey"))?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_question(
    conn: &mut sqlx::PgConnection,
    survey_id: SurveyId,
    question: &CreateQuestion,
    order_index: i32,
) -> std::result::Result<SurveyQuestion, sqlx::Error> {
    sqlx::query_as::<_, SurveyQuestion>(
        r#"
        INSERT INTO survey_questions (
            id, survey_id, question_text, question_type, options, is_required, order_index
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(survey_id)
    .bind(&question.question_text)
    .bind(question.question_type.to_string())
    .bind(serde_json::json!(question.options))
    .bind(question.is_required)
    .bind(order_index)
    .fetch_one(conn)
    .await
}
