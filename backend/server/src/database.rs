//! # Stores
//!
//! Document storage behind two traits so handlers never see the backend.
//!
//! - [`SnapshotStore`]: append-only documents keyed by (collection, user, update_time)
//! - [`CredentialStore`]: username to [`Credential`]
//!
//! [`RedisStore`] is the deployed backend; [`crate::memory::MemoryStore`] backs
//! tests and `STORE_BACKEND=memory`.
//!
//! ## Redis Layout
//!
//! - `color:user:{user}` hash: update_time to protobuf `StoredPlayers`
//! - `raw:user:{user}` hash: update_time to the raw blob
//! - `color:users` / `raw:users` sets: users that have stored a snapshot
//! - `credentials` hash: username to protobuf `Credential`
//!
//! Inserts go through `HSETNX`, so a document is never overwritten. Each
//! command is atomic on its own; nothing here spans a transaction.
use std::time::Duration;

use async_trait::async_trait;
use bank::frames::Credential;
use prost::Message;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use thiserror::Error;

pub const CREDENTIALS_KEY: &str = "credentials";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Color,
    Raw,
}

impl Collection {
    pub fn prefix(self) -> &'static str {
        match self {
            Collection::Color => "color",
            Collection::Raw => "raw",
        }
    }

    pub fn user_key(self, user: &str) -> String {
        format!("{}:user:{user}", self.prefix())
    }

    pub fn users_key(self) -> String {
        format!("{}:users", self.prefix())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("stored record is corrupt: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("stored raw snapshot is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("snapshot {update_time} already exists for '{user}'")]
    Duplicate { user: String, update_time: String },
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] if the key is taken.
    async fn insert(
        &self,
        collection: Collection,
        user: &str,
        update_time: &str,
        document: Vec<u8>,
    ) -> Result<(), StoreError>;

    async fn get(
        &self,
        collection: Collection,
        user: &str,
        update_time: &str,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Update times of every document the user has, in no particular order.
    async fn times(&self, collection: Collection, user: &str) -> Result<Vec<String>, StoreError>;

    async fn users(&self, collection: Collection) -> Result<Vec<String>, StoreError>;

    async fn remove(
        &self,
        collection: Collection,
        user: &str,
        update_time: &str,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn credential(&self, username: &str) -> Result<Option<Credential>, StoreError>;

    async fn put_credential(&self, credential: &Credential) -> Result<(), StoreError>;
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;

    client.get_connection_manager_with_config(config).await
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self::new(init_redis(redis_url).await?))
    }
}

#[async_trait]
impl SnapshotStore for RedisStore {
    async fn insert(
        &self,
        collection: Collection,
        user: &str,
        update_time: &str,
        document: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        let inserted: bool = connection
            .hset_nx(collection.user_key(user), update_time, document)
            .await?;

        if !inserted {
            return Err(StoreError::Duplicate {
                user: user.to_string(),
                update_time: update_time.to_string(),
            });
        }

        let _: () = connection.sadd(collection.users_key(), user).await?;

        Ok(())
    }

    async fn get(
        &self,
        collection: Collection,
        user: &str,
        update_time: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let mut connection = self.connection.clone();

        Ok(connection.hget(collection.user_key(user), update_time).await?)
    }

    async fn times(&self, collection: Collection, user: &str) -> Result<Vec<String>, StoreError> {
        let mut connection = self.connection.clone();

        Ok(connection.hkeys(collection.user_key(user)).await?)
    }

    async fn users(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let mut connection = self.connection.clone();

        Ok(connection.smembers(collection.users_key()).await?)
    }

    async fn remove(
        &self,
        collection: Collection,
        user: &str,
        update_time: &str,
    ) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();

        let removed: u32 = connection
            .hdel(collection.user_key(user), update_time)
            .await?;

        Ok(removed > 0)
    }
}

#[async_trait]
impl CredentialStore for RedisStore {
    async fn credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let mut connection = self.connection.clone();

        let bytes: Option<Vec<u8>> = connection.hget(CREDENTIALS_KEY, username).await?;

        Ok(bytes
            .map(|bytes| Credential::decode(bytes.as_slice()))
            .transpose()?)
    }

    async fn put_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        let _: () = connection
            .hset(CREDENTIALS_KEY, &credential.username, credential.encode_to_vec())
            .await?;

        Ok(())
    }
}
