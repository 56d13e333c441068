use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Contact record in the database. Always owned by exactly one user.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub birthdate: Option<Date>,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated mutable fields of a contact, used for create and full update.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactInput {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub birthdate: Option<Date>,
    pub description: Option<String>,
}

/// Case-insensitive substring criteria, AND-combined. `None` matches anything.
#[derive(Debug, Clone, Default)]
pub struct ContactSearch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ContactSearch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// `None` returns every remaining row.
    pub limit: Option<i64>,
    pub offset: i64,
}

impl Page {
    pub const ALL: Page = Page {
        limit: None,
        offset: 0,
    };
}
