use async_trait::async_trait;
use uuid::Uuid;

use crate::contacts::repo_types::{Contact, ContactInput, ContactSearch, Page};
use crate::db::{PgStore, StoreError};

/// Every id-addressed call filters on id and owner in the same statement.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn find_by_id_for_owner(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Contact>, StoreError>;

    async fn list_for_owner(&self, owner_id: Uuid, page: Page) -> Result<Vec<Contact>, StoreError>;

    /// `owner_id = None` searches across all owners.
    async fn search(
        &self,
        query: &ContactSearch,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<Contact>, StoreError>;

    async fn create(&self, owner_id: Uuid, input: ContactInput) -> Result<Contact, StoreError>;

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        input: ContactInput,
    ) -> Result<Option<Contact>, StoreError>;

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError>;
}

const CONTACT_COLUMNS: &str = "id, user_id, first_name, last_name, phone, email, birthdate, \
                               description, created_at, updated_at";

/// `%term%` with LIKE wildcards in the term taken literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl ContactStore for PgStore {
    async fn find_by_id_for_owner(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Contact>, StoreError> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(contact)
    }

    async fn list_for_owner(&self, owner_id: Uuid, page: Page) -> Result<Vec<Contact>, StoreError> {
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE user_id = $1
            ORDER BY last_name, first_name, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn search(
        &self,
        query: &ContactSearch,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<Contact>, StoreError> {
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR first_name ILIKE $2)
              AND ($3::text IS NULL OR last_name ILIKE $3)
              AND ($4::text IS NULL OR email ILIKE $4)
            ORDER BY last_name, first_name, id
            "#
        ))
        .bind(owner_id)
        .bind(query.first_name.as_deref().map(like_pattern))
        .bind(query.last_name.as_deref().map(like_pattern))
        .bind(query.email.as_deref().map(like_pattern))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create(&self, owner_id: Uuid, input: ContactInput) -> Result<Contact, StoreError> {
        sqlx::query_as::<_, Contact>(&format!(
            r#"
            INSERT INTO contacts
                (id, user_id, first_name, last_name, phone, email, birthdate, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(input.birthdate)
        .bind(&input.description)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_foreign_key_violation())
            {
                StoreError::MissingOwner(owner_id)
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        input: ContactInput,
    ) -> Result<Option<Contact>, StoreError> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            r#"
            UPDATE contacts
               SET first_name = $3, last_name = $4, phone = $5, email = $6,
                   birthdate = $7, description = $8, updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(input.birthdate)
        .bind(&input.description)
        .fetch_optional(&self.db)
        .await?;
        Ok(contact)
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}
