//! In-memory identity store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{IdentityStoreError, IdentityStoreResult};
use crate::identity::{Identity, IdentityId, normalize_email};
use crate::store::IdentityStore;

/// In-memory identity store
#[derive(Default)]
pub struct InMemoryIdentityStore {
    /// id -> identity
    identities: RwLock<HashMap<IdentityId, Identity>>,
    /// normalized email -> id
    emails: RwLock<HashMap<String, IdentityId>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered identities
    pub fn len(&self) -> usize {
        self.identities.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn insert(&self, identity: Identity) -> IdentityStoreResult<()> {
        let email = normalize_email(&identity.email);
        let mut emails = self.emails.write().unwrap();
        if emails.contains_key(&email) {
            return Err(IdentityStoreError::AlreadyExists(email));
        }

        emails.insert(email, identity.id);
        self.identities
            .write()
            .unwrap()
            .insert(identity.id, identity);
        Ok(())
    }

    async fn find_by_id(&self, id: &IdentityId) -> IdentityStoreResult<Option<Identity>> {
        Ok(self.identities.read().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> IdentityStoreResult<Option<Identity>> {
        let id = match self.emails.read().unwrap().get(&normalize_email(email)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.identities.read().unwrap().get(&id).cloned())
    }

    async fn remove(&self, id: &IdentityId) -> IdentityStoreResult<bool> {
        let removed = self.identities.write().unwrap().remove(id);
        match removed {
            Some(identity) => {
                self.emails.write().unwrap().remove(&identity.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::PasswordHash;

    fn identity(email: &str) -> Identity {
        Identity::new(email, PasswordHash::from_phc("x"))
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = InMemoryIdentityStore::new();
        let alice = identity("alice@example.com");
        let id = alice.id;

        store.insert(alice).await.unwrap();

        assert_eq!(store.find_by_id(&id).await.unwrap().unwrap().id, id);
        assert_eq!(
            store.find_by_email("ALICE@example.com").await.unwrap().unwrap().id,
            id
        );
        assert!(store.find_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryIdentityStore::new();
        store.insert(identity("alice@example.com")).await.unwrap();

        let result = store.insert(identity("Alice@Example.com")).await;
        assert!(matches!(result, Err(IdentityStoreError::AlreadyExists(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemoryIdentityStore::new();
        let alice = identity("alice@example.com");
        let id = alice.id;
        store.insert(alice).await.unwrap();

        assert!(store.remove(&id).await.unwrap());
        assert!(!store.remove(&id).await.unwrap());
        assert!(store.find_by_id(&id).await.unwrap().is_none());
        assert!(store.find_by_email("alice@example.com").await.unwrap().is_none());

        // Email is free again
        store.insert(identity("alice@example.com")).await.unwrap();
    }
}
