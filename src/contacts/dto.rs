use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{Contact, ContactInput, ContactSearch, Page};
use super::services::UpcomingBirthday;
use crate::{auth::services::is_valid_email, error::AppError};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Body of `POST /contacts` and `PUT /contacts/:id`.
#[derive(Debug, Deserialize)]
pub struct ContactPayload {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub birthdate: Option<Date>,
    #[serde(default)]
    pub description: Option<String>,
}

fn required(field: &str, value: String) -> Result<String, AppError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value)
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ContactPayload {
    /// Normalizes fields; a birthdate after `today` is rejected.
    pub fn into_input(self, today: Date) -> Result<ContactInput, AppError> {
        if self.birthdate.is_some_and(|b| b > today) {
            return Err(AppError::Validation("birthdate cannot be in the future".into()));
        }
        let email = optional(self.email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            if !is_valid_email(email) {
                return Err(AppError::Validation("Invalid email".into()));
            }
        }
        Ok(ContactInput {
            first_name: required("first_name", self.first_name)?,
            last_name: required("last_name", self.last_name)?,
            phone: required("phone", self.phone)?,
            email,
            birthdate: self.birthdate,
            description: optional(self.description),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    #[serde(with = "iso_date::option")]
    pub birthdate: Option<Date>,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            phone: c.phone,
            email: c.email,
            birthdate: c.birthdate,
            description: c.description,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BirthdayResponse {
    #[serde(flatten)]
    pub contact: ContactResponse,
    #[serde(with = "iso_date")]
    pub next_birthday: Date,
    pub days_until: i64,
    pub turning: i32,
}

impl From<UpcomingBirthday> for BirthdayResponse {
    fn from(b: UpcomingBirthday) -> Self {
        Self {
            contact: b.contact.into(),
            next_birthday: b.date,
            days_until: b.days_until,
            turning: b.turning,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 20 }

impl Pagination {
    pub fn into_page(self) -> Result<Page, AppError> {
        if !(1..=100).contains(&self.limit) || self.offset < 0 {
            return Err(AppError::Validation(
                "limit must be 1-100 and offset non-negative".into(),
            ));
        }
        Ok(Page {
            limit: Some(self.limit),
            offset: self.offset,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl SearchParams {
    pub fn into_search(self) -> Result<ContactSearch, AppError> {
        let search = ContactSearch {
            first_name: optional(self.first_name),
            last_name: optional(self.last_name),
            email: optional(self.email),
        };
        if search.is_empty() {
            return Err(AppError::Validation(
                "at least one of first_name, last_name, email is required".into(),
            ));
        }
        Ok(search)
    }
}

#[derive(Debug, Deserialize)]
pub struct BirthdayParams {
    #[serde(default = "default_days")]
    pub days: i64,
}
fn default_days() -> i64 { 7 }
