//! Contact repository

use safewatch_common::types::{ContactId, PageParams, SegmentId};
use safewatch_common::{Error, Result};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::like_pattern;
use crate::db::{db_failure, is_unique_violation};
use crate::models::{Contact, ContactFilter, ContactStatus, CreateContact, UpdateContact};

/// A validated row of a bulk import, with its position in the request
#[derive(Debug, Clone)]
pub struct ImportRow {
    pub row: usize,
    pub contact: CreateContact,
}

/// Why an import row was not inserted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSkip {
    pub row: usize,
    pub reason: String,
}

/// Contact repository
#[derive(Clone)]
pub struct ContactRepository {
    pool: PgPool,
}

impl ContactRepository {
    /// Create a new contact repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new contact
    pub async fn create(&self, input: CreateContact) -> Result<Contact> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_failure("Failed to create contact"))?;

        insert_contact(&mut conn, &input).await.map_err(|e| {
            if is_unique_violation(&e) {
                Error::conflict("A contact with this email already exists")
            } else {
                db_failure("Failed to create contact")(e)
            }
        })
    }

    /// Get a contact by ID
    pub async fn get(&self, id: ContactId) -> Result<Option<Contact>> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("Failed to get contact"))
    }

    /// Check whether an email belongs to another contact
    pub async fn email_exists(&self, email: &str, exclude: Option<ContactId>) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM contacts
                WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to check contact email"))?;
        Ok(row.0)
    }

    /// List contacts matching a filter, with the total match count
    pub async fn list(&self, filter: &ContactFilter, page: PageParams) -> Result<(Vec<Contact>, i64)> {
        let search = like_pattern(filter.search.as_deref());
        let status = filter.status.map(|s| s.to_string());

        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT c.* FROM contacts c
            WHERE ($1::text IS NULL OR c.status = $1)
              AND ($2::text IS NULL OR c.region = $2)
              AND ($3::text IS NULL
                   OR c.first_name ILIKE $3 OR c.last_name ILIKE $3
                   OR c.email ILIKE $3 OR c.phone ILIKE $3)
              AND ($4::uuid IS NULL OR EXISTS (
                   SELECT 1 FROM segment_contacts sc
                   WHERE sc.contact_id = c.id AND sc.segment_id = $4))
            ORDER BY c.last_name, c.first_name
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(&status)
        .bind(&filter.region)
        .bind(&search)
        .bind(filter.segment_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list contacts"))?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM contacts c
            WHERE ($1::text IS NULL OR c.status = $1)
              AND ($2::text IS NULL OR c.region = $2)
              AND ($3::text IS NULL
                   OR c.first_name ILIKE $3 OR c.last_name ILIKE $3
                   OR c.email ILIKE $3 OR c.phone ILIKE $3)
              AND ($4::uuid IS NULL OR EXISTS (
                   SELECT 1 FROM segment_contacts sc
                   WHERE sc.contact_id = c.id AND sc.segment_id = $4))
            "#,
        )
        .bind(&status)
        .bind(&filter.region)
        .bind(&search)
        .bind(filter.segment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to count contacts"))?;

        Ok((contacts, total.0))
    }

    /// Names of the segments a contact belongs to
    pub async fn segment_names(&self, id: ContactId) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT s.name FROM segments s
            JOIN segment_contacts sc ON sc.segment_id = s.id
            WHERE sc.contact_id = $1
            ORDER BY s.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list contact segments"))?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// IDs from `ids` that match no contact
    pub async fn missing_ids(&self, ids: &[ContactId]) -> Result<Vec<ContactId>> {
        let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM contacts WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_failure("Failed to look up contacts"))?;

        let found: Vec<Uuid> = found.into_iter().map(|(id,)| id).collect();
        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }

    /// Apply a partial update
    pub async fn update(&self, id: ContactId, input: UpdateContact) -> Result<Option<Contact>> {
        let tags = input
            .tags
            .as_ref()
            .map(|t| serde_json::to_value(t).unwrap_or_default());

        sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                region = COALESCE($6, region),
                city = COALESCE($7, city),
                age_group = COALESCE($8, age_group),
                language = COALESCE($9, language),
                tags = COALESCE($10, tags),
                status = COALESCE($11, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.region)
        .bind(&input.city)
        .bind(&input.age_group)
        .bind(&input.language)
        .bind(tags)
        .bind(input.status.map(|s| s.to_string()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::conflict("A contact with this email already exists")
            } else {
                db_failure("Failed to update contact")(e)
            }
        })
    }

    /// Whether the contact belongs to at least one segment
    pub async fn has_memberships(&self, id: ContactId) -> Result<bool> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM segment_contacts WHERE contact_id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_failure("Failed to check contact segments"))?;
        Ok(row.0)
    }

    /// Soft delete: mark the contact inactive
    pub async fn deactivate(&self, id: ContactId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE contacts SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(ContactStatus::Inactive.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_failure("Failed to deactivate contact"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard delete a contact
    pub async fn delete(&self, id: ContactId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to delete contact"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert validated rows in one transaction, optionally adding each new
    /// contact to a segment.
    ///
    /// Rows whose email already exists (in the table or earlier in the batch)
    /// are skipped. Returns the number inserted and the skipped rows.
    pub async fn import(
        &self,
        rows: Vec<ImportRow>,
        segment_id: Option<SegmentId>,
    ) -> Result<(usize, Vec<ImportSkip>)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_failure("Failed to import contacts"))?;

        let mut imported = 0;
        let mut skipped = Vec::new();
        let mut seen_emails: Vec<String> = Vec::new();

        for ImportRow { row, contact } in rows {
            if let Some(email) = contact.email.as_deref() {
                let email = email.to_lowercase();
                if seen_emails.contains(&email) || email_taken(&mut tx, &email).await? {
                    skipped.push(ImportSkip {
                        row,
                        reason: format!("Duplicate email: {}", email),
                    });
                    continue;
                }
                seen_emails.push(email);
            }

            let created = insert_contact(&mut tx, &contact)
                .await
                .map_err(db_failure("Failed to import contacts"))?;

            if let Some(segment_id) = segment_id {
                sqlx::query(
                    r#"
                    INSERT INTO segment_contacts (segment_id, contact_id)
                    VALUES ($1, $2)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(segment_id)
                .bind(created.id)
                .execute(&mut *tx)
                .await
                .map_err(db_failure("Failed to import contacts"))?;
            }

            imported += 1;
        }

        tx.commit()
            .await
            .map_err(db_failure("Failed to import contacts"))?;

        Ok((imported, skipped))
    }
}

async fn insert_contact(
    conn: &mut sqlx::PgConnection,
    input: &CreateContact,
) -> std::result::Result<Contact, sqlx::Error> {
    let tags = serde_json::to_value(input.tags.clone().unwrap_or_default())
        .unwrap_or_else(|_| serde_json::json!([]));

    sqlx::query_as::<_, Contact>(
        r#"
        INSERT INTO contacts (
            id, first_name, last_name, email, phone, region, city, age_group,
            language, tags, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.region)
    .bind(&input.city)
    .bind(&input.age_group)
    .bind(&input.language)
    .bind(tags)
    .bind(input.status.unwrap_or(ContactStatus::Active).to_string())
    .fetch_one(conn)
    .await
}

async fn email_taken(tx: &mut Transaction<'static, Postgres>, email: &str) -> Result<bool> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM contacts WHERE LOWER(email) = $1)")
            .bind(email)
            .fetch_one(&mut **tx)
            .await
            .map_err(db_failure("Failed to import contacts"))?;
    Ok(row.0)
}
