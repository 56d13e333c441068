use time::{Date, Month};
use tracing::debug;
use uuid::Uuid;

use super::repo::ContactStore;
use super::repo_types::{Contact, ContactInput};
use crate::error::{AppError, OwnershipError};

// Ownership lives in the store query: a contact that is missing and one that
// belongs to another user both come back as `None` and both become 404.

pub async fn get_owned(
    store: &dyn ContactStore,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Contact, AppError> {
    store
        .find_by_id_for_owner(id, owner_id)
        .await?
        .ok_or_else(|| not_found(owner_id, id))
}

pub async fn update_owned(
    store: &dyn ContactStore,
    owner_id: Uuid,
    id: Uuid,
    input: ContactInput,
) -> Result<Contact, AppError> {
    store
        .update(id, owner_id, input)
        .await?
        .ok_or_else(|| not_found(owner_id, id))
}

pub async fn delete_owned(store: &dyn ContactStore, owner_id: Uuid, id: Uuid) -> Result<(), AppError> {
    if store.delete(id, owner_id).await? {
        Ok(())
    } else {
        Err(not_found(owner_id, id))
    }
}

fn not_found(owner_id: Uuid, id: Uuid) -> AppError {
    debug!(%owner_id, contact_id = %id, "contact not visible to owner");
    OwnershipError::NotFoundOrForbidden.into()
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingBirthday {
    pub contact: Contact,
    pub date: Date,
    pub days_until: i64,
    pub turning: i32,
}

/// The birthday in `year`; Feb 29 falls back to Feb 28 outside leap years.
fn anniversary(birthdate: Date, year: i32) -> Option<Date> {
    Date::from_calendar_date(year, birthdate.month(), birthdate.day())
        .or_else(|_| Date::from_calendar_date(year, Month::February, 28))
        .ok()
}

/// First birthday on or after `today`.
pub fn next_birthday(birthdate: Date, today: Date) -> Option<Date> {
    let this_year = anniversary(birthdate, today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        anniversary(birthdate, today.year() + 1)
    }
}

/// Contacts whose next birthday is within `days` of `today`, soonest first.
/// Birthdates after `today` are skipped.
pub fn upcoming_birthdays(contacts: Vec<Contact>, today: Date, days: i64) -> Vec<UpcomingBirthday> {
    let mut upcoming: Vec<UpcomingBirthday> = contacts
        .into_iter()
        .filter_map(|contact| {
            let birthdate = contact.birthdate.filter(|&b| b <= today)?;
            let date = next_birthday(birthdate, today)?;
            let days_until = (date - today).whole_days();
            (days_until <= days).then(|| UpcomingBirthday {
                turning: date.year() - birthdate.year(),
                contact,
                date,
                days_until,
            })
        })
        .collect();
    upcoming.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.contact.last_name.cmp(&b.contact.last_name))
            .then_with(|| a.contact.first_name.cmp(&b.contact.first_name))
    });
    upcoming
}
