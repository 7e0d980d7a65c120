//! # Snapshots
//!
//! A snapshot is one saved version of a user's choreography. Every upload
//! appends a new one keyed by its update time; nothing is edited in place.
//!
//! ## Collections
//! - Color: structured players/frames, fetched whole, per player, or in chunks
//! - Raw: an opaque client encoding of the same choreography
//!
//! ## Rules
//! - `LATEST` resolves to the largest update time the user has in that collection
//! - Update times use a fixed zero-padded format, so string order is time order
//! - After an append, the oldest snapshots beyond the retention cap are
//!   evicted. A cap of 0 keeps everything
//! - Two appends in the same second collide and the second is rejected
//!   without touching existing snapshots
//!
//! Concurrent appends for one user are not serialized, so racing writers can
//! briefly leave more than `cap` snapshots behind.
use std::sync::Arc;

use bank::{
    frames::{PlayerFrame, PlayerTrack},
    get_players_from_bytes, players_to_bytes,
};
use serde::Serialize;
use tracing::info;

use crate::database::{Collection, SnapshotStore, StoreError};

pub const LATEST: &str = "LATEST";
pub const CHUNK_SIZE: usize = 10;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub user: String,
    pub update_time: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ColorSnapshot {
    pub user: String,
    pub update_time: String,
    pub players: Vec<PlayerTrack>,
}

impl ColorSnapshot {
    pub fn player(&self, index: usize) -> Option<&PlayerTrack> {
        self.players.get(index)
    }

    pub fn into_player(mut self, index: usize) -> Option<PlayerTrack> {
        (index < self.players.len()).then(|| self.players.swap_remove(index))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RawSnapshot {
    pub user: String,
    pub update_time: String,
    pub raw_data: String,
}

/// Frames `[chunk * 10, chunk * 10 + 10)` clipped to the track, empty past the end.
pub fn chunk(frames: &[PlayerFrame], chunk: usize) -> &[PlayerFrame] {
    let Some(start) = chunk.checked_mul(CHUNK_SIZE) else {
        return &[];
    };

    if start >= frames.len() {
        return &[];
    }

    &frames[start..start.saturating_add(CHUNK_SIZE).min(frames.len())]
}

pub struct Snapshots {
    store: Arc<dyn SnapshotStore>,
    retention_cap: usize,
}

impl Snapshots {
    pub fn new(store: Arc<dyn SnapshotStore>, retention_cap: usize) -> Self {
        Self {
            store,
            retention_cap,
        }
    }

    pub fn retention_cap(&self) -> usize {
        self.retention_cap
    }

    /// Color summaries grouped by user ascending, newest first within a user.
    pub async fn summaries(&self, user: Option<&str>) -> Result<Vec<SnapshotSummary>, StoreError> {
        let users = match user {
            Some(user) => vec![user.to_string()],
            None => self.store.users(Collection::Color).await?,
        };

        let mut list = Vec::new();
        for user in users {
            for update_time in self.store.times(Collection::Color, &user).await? {
                list.push(SnapshotSummary {
                    user: user.clone(),
                    update_time,
                });
            }
        }

        list.sort_by(|a, b| {
            a.user
                .cmp(&b.user)
                .then_with(|| b.update_time.cmp(&a.update_time))
        });

        Ok(list)
    }

    async fn resolve(
        &self,
        collection: Collection,
        user: &str,
        query_time: &str,
    ) -> Result<Option<String>, StoreError> {
        if query_time == LATEST {
            return Ok(self.store.times(collection, user).await?.into_iter().max());
        }

        Ok(Some(query_time.to_string()))
    }

    async fn document(
        &self,
        collection: Collection,
        user: &str,
        query_time: &str,
    ) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        let Some(update_time) = self.resolve(collection, user, query_time).await? else {
            return Ok(None);
        };

        Ok(self
            .store
            .get(collection, user, &update_time)
            .await?
            .map(|document| (update_time, document)))
    }

    pub async fn color(
        &self,
        user: &str,
        query_time: &str,
    ) -> Result<Option<ColorSnapshot>, StoreError> {
        let Some((update_time, document)) = self.document(Collection::Color, user, query_time).await?
        else {
            return Ok(None);
        };

        Ok(Some(ColorSnapshot {
            user: user.to_string(),
            update_time,
            players: get_players_from_bytes(document.as_slice())?,
        }))
    }

    pub async fn raw(&self, user: &str, query_time: &str) -> Result<Option<RawSnapshot>, StoreError> {
        let Some((update_time, document)) = self.document(Collection::Raw, user, query_time).await?
        else {
            return Ok(None);
        };

        Ok(Some(RawSnapshot {
            user: user.to_string(),
            update_time,
            raw_data: String::from_utf8(document)?,
        }))
    }

    pub async fn append_color(
        &self,
        user: &str,
        update_time: &str,
        players: Vec<PlayerTrack>,
    ) -> Result<Vec<String>, StoreError> {
        self.store
            .insert(Collection::Color, user, update_time, players_to_bytes(players))
            .await?;

        self.trim(Collection::Color, user).await
    }

    pub async fn append_raw(
        &self,
        user: &str,
        update_time: &str,
        raw_data: String,
    ) -> Result<Vec<String>, StoreError> {
        self.store
            .insert(Collection::Raw, user, update_time, raw_data.into_bytes())
            .await?;

        self.trim(Collection::Raw, user).await
    }

    /// Evicts oldest first until the user is back under the cap. Returns the
    /// evicted update times.
    async fn trim(&self, collection: Collection, user: &str) -> Result<Vec<String>, StoreError> {
        if self.retention_cap == 0 {
            return Ok(Vec::new());
        }

        let mut times = self.store.times(collection, user).await?;
        times.sort();
        let excess = times.len().saturating_sub(self.retention_cap);

        let mut evicted = Vec::with_capacity(excess);
        for time in times.into_iter().take(excess) {
            if self.store.remove(collection, user, &time).await? {
                info!("Evicted {} snapshot {time} for {user}", collection.prefix());
                evicted.push(time);
            }
        }

        Ok(evicted)
    }
}
