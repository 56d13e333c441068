//! In-memory user and contact stores for tests.
//!
//! One mutex guards both tables so the user cascade and the ownership filter
//! behave atomically, like the Postgres adapter's transactions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::contacts::{
    repo::ContactStore,
    repo_types::{Contact, ContactInput, ContactSearch, Page},
};
use crate::db::StoreError;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    contacts: HashMap<Uuid, Contact>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn contact_count(&self) -> usize {
        self.tables.lock().expect("store poisoned").contacts.len()
    }
}

/// Mirrors the Postgres `ILIKE '%term%'` filters.
fn matches(query: &ContactSearch, c: &Contact) -> bool {
    fn contains(hay: Option<&str>, needle: &Option<String>) -> bool {
        match needle {
            None => true,
            Some(n) => hay.is_some_and(|h| h.to_lowercase().contains(&n.to_lowercase())),
        }
    }
    contains(Some(&c.first_name), &query.first_name)
        && contains(Some(&c.last_name), &query.last_name)
        && contains(c.email.as_deref(), &query.email)
}

fn sorted(mut contacts: Vec<Contact>) -> Vec<Contact> {
    contacts.sort_by(|a, b| {
        a.last_name
            .cmp(&b.last_name)
            .then_with(|| a.first_name.cmp(&b.first_name))
            .then_with(|| a.id.cmp(&b.id))
    });
    contacts
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().expect("store poisoned");
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().expect("store poisoned");
        Ok(tables
            .users
            .values()
            .find(|u| u.email == email || u.username == username)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().expect("store poisoned");
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email"));
        }
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("username"));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().expect("store poisoned");
        tables.contacts.retain(|_, c| c.user_id != id);
        Ok(tables.users.remove(&id).is_some())
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn find_by_id_for_owner(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Contact>, StoreError> {
        let tables = self.tables.lock().expect("store poisoned");
        Ok(tables
            .contacts
            .get(&id)
            .filter(|c| c.user_id == owner_id)
            .cloned())
    }

    async fn list_for_owner(&self, owner_id: Uuid, page: Page) -> Result<Vec<Contact>, StoreError> {
        let tables = self.tables.lock().expect("store poisoned");
        let owned = tables
            .contacts
            .values()
            .filter(|c| c.user_id == owner_id)
            .cloned()
            .collect();
        let rows = sorted(owned).into_iter().skip(page.offset as usize);
        Ok(match page.limit {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        })
    }

    async fn search(
        &self,
        query: &ContactSearch,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<Contact>, StoreError> {
        let tables = self.tables.lock().expect("store poisoned");
        let hits = tables
            .contacts
            .values()
            .filter(|c| owner_id.map_or(true, |o| c.user_id == o))
            .filter(|c| matches(query, c))
            .cloned()
            .collect();
        Ok(sorted(hits))
    }

    async fn create(&self, owner_id: Uuid, input: ContactInput) -> Result<Contact, StoreError> {
        let mut tables = self.tables.lock().expect("store poisoned");
        if !tables.users.contains_key(&owner_id) {
            return Err(StoreError::MissingOwner(owner_id));
        }
        let now = OffsetDateTime::now_utc();
        let contact = Contact {
            id: Uuid::new_v4(),
            user_id: owner_id,
            first_name: input.first_name,
            last_name: input.last_name,
            phone: input.phone,
            email: input.email,
            birthdate: input.birthdate,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        tables.contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        input: ContactInput,
    ) -> Result<Option<Contact>, StoreError> {
        let mut tables = self.tables.lock().expect("store poisoned");
        let Some(contact) = tables
            .contacts
            .get_mut(&id)
            .filter(|c| c.user_id == owner_id)
        else {
            return Ok(None);
        };
        contact.first_name = input.first_name;
        contact.last_name = input.last_name;
        contact.phone = input.phone;
        contact.email = input.email;
        contact.birthdate = input.birthdate;
        contact.description = input.description;
        contact.updated_at = OffsetDateTime::now_utc();
        Ok(Some(contact.clone()))
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().expect("store poisoned");
        let owned = tables
            .contacts
            .get(&id)
            .is_some_and(|c| c.user_id == owner_id);
        if owned {
            tables.contacts.remove(&id);
        }
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.into(),
            email: format!("{name}@x.com"),
            password_hash: "unused".into(),
            first_name: None,
            last_name: None,
        }
    }

    fn input(first: &str, last: &str, email: Option<&str>) -> ContactInput {
        ContactInput {
            first_name: first.into(),
            last_name: last.into(),
            phone: "555-0100".into(),
            email: email.map(Into::into),
            birthdate: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn deleting_user_cascades_contacts() {
        let store = MemoryStore::default();
        let alice = UserStore::create(&store, new_user("alice")).await.unwrap();
        let bob = UserStore::create(&store, new_user("bob")).await.unwrap();
        for name in ["A", "B", "C"] {
            ContactStore::create(&store, alice.id, input(name, "Lee", None)).await.unwrap();
        }
        ContactStore::create(&store, bob.id, input("D", "Lee", None)).await.unwrap();

        assert!(UserStore::delete(&store, alice.id).await.unwrap());
        assert_eq!(store.contact_count(), 1);
        assert!(store.list_for_owner(alice.id, Page::ALL).await.unwrap().is_empty());
        assert_eq!(store.list_for_owner(bob.id, Page::ALL).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn contacts_need_an_existing_owner() {
        let store = MemoryStore::default();
        let err = ContactStore::create(&store, Uuid::new_v4(), input("A", "B", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingOwner(_)));
    }

    #[tokio::test]
    async fn duplicate_username_or_email_conflicts() {
        let store = MemoryStore::default();
        UserStore::create(&store, new_user("alice")).await.unwrap();

        let mut same_email = new_user("alice2");
        same_email.email = "alice@x.com".into();
        assert!(matches!(
            UserStore::create(&store, same_email).await,
            Err(StoreError::Conflict("email"))
        ));

        let mut same_name = new_user("alice");
        same_name.email = "other@x.com".into();
        assert!(matches!(
            UserStore::create(&store, same_name).await,
            Err(StoreError::Conflict("username"))
        ));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_scoped() {
        let store = MemoryStore::default();
        let alice = UserStore::create(&store, new_user("alice")).await.unwrap();
        let bob = UserStore::create(&store, new_user("bob")).await.unwrap();
        ContactStore::create(&store, alice.id, input("Bob", "Lee", Some("bob@lee.com")))
            .await
            .unwrap();
        ContactStore::create(&store, alice.id, input("Ann", "Bobson", None))
            .await
            .unwrap();
        ContactStore::create(&store, bob.id, input("Bobby", "Tables", None))
            .await
            .unwrap();

        let by_first = ContactSearch {
            first_name: Some("BOB".into()),
            ..Default::default()
        };
        let hits = store.search(&by_first, Some(alice.id)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].last_name, "Lee");

        let everywhere = store.search(&by_first, None).await.unwrap();
        assert_eq!(everywhere.len(), 2);

        let by_email = ContactSearch {
            email: Some("lee.com".into()),
            ..Default::default()
        };
        assert_eq!(store.search(&by_email, Some(alice.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_is_sorted_and_paged() {
        let store = MemoryStore::default();
        let alice = UserStore::create(&store, new_user("alice")).await.unwrap();
        for (first, last) in [("Zed", "Adams"), ("Amy", "Zhou"), ("Bea", "Adams")] {
            ContactStore::create(&store, alice.id, input(first, last, None))
                .await
                .unwrap();
        }
        let page = store
            .list_for_owner(alice.id, Page { limit: Some(2), offset: 1 })
            .await
            .unwrap();
        let names: Vec<_> = page.iter().map(|c| c.first_name.as_str()).collect();
        assert_eq!(names, ["Zed", "Amy"]);
    }
}
