//! In-process store with the same semantics as the redis layout.
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bank::frames::Credential;
use tokio::sync::RwLock;

use crate::database::{Collection, CredentialStore, SnapshotStore, StoreError};

type Documents = HashMap<(Collection, String), BTreeMap<String, Vec<u8>>>;

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<Documents>,
    credentials: RwLock<HashMap<String, Credential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn insert(
        &self,
        collection: Collection,
        user: &str,
        update_time: &str,
        document: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let history = documents
            .entry((collection, user.to_string()))
            .or_default();

        if history.contains_key(update_time) {
            return Err(StoreError::Duplicate {
                user: user.to_string(),
                update_time: update_time.to_string(),
            });
        }

        history.insert(update_time.to_string(), document);

        Ok(())
    }

    async fn get(
        &self,
        collection: Collection,
        user: &str,
        update_time: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let documents = self.documents.read().await;

        Ok(documents
            .get(&(collection, user.to_string()))
            .and_then(|history| history.get(update_time))
            .cloned())
    }

    async fn times(&self, collection: Collection, user: &str) -> Result<Vec<String>, StoreError> {
        let documents = self.documents.read().await;

        Ok(documents
            .get(&(collection, user.to_string()))
            .map(|history| history.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn users(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let documents = self.documents.read().await;

        Ok(documents
            .keys()
            .filter(|(kind, _)| *kind == collection)
            .map(|(_, user)| user.clone())
            .collect())
    }

    async fn remove(
        &self,
        collection: Collection,
        user: &str,
        update_time: &str,
    ) -> Result<bool, StoreError> {
        let mut documents = self.documents.write().await;

        Ok(documents
            .get_mut(&(collection, user.to_string()))
            .is_some_and(|history| history.remove(update_time).is_some()))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.credentials.read().await.get(username).cloned())
    }

    async fn put_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        self.credentials
            .write()
            .await
            .insert(credential.username.clone(), credential.clone());

        Ok(())
    }
}
