use std::sync::Arc;

use bank::frames::Credential;
use tracing::info;

use super::{
    config::{Config, StoreBackend},
    database::{CredentialStore, RedisStore, SnapshotStore, StoreError},
    memory::MemoryStore,
    music::MusicStore,
    snapshots::Snapshots,
};

pub struct AppState {
    pub config: Config,
    pub snapshots: Snapshots,
    pub credentials: Arc<dyn CredentialStore>,
    pub music: MusicStore,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>, anyhow::Error> {
        let config = Config::load()?;

        let (snapshots, credentials): (Arc<dyn SnapshotStore>, Arc<dyn CredentialStore>) =
            match config.store_backend {
                StoreBackend::Redis => {
                    info!("Connecting to redis at {}", config.redis_url);
                    let store = Arc::new(RedisStore::connect(&config.redis_url).await?);
                    (
                        store.clone() as Arc<dyn SnapshotStore>,
                        store as Arc<dyn CredentialStore>,
                    )
                }
                StoreBackend::Memory => {
                    info!("Using in-memory store, nothing survives a restart");
                    let store = Arc::new(MemoryStore::new());
                    (
                        store.clone() as Arc<dyn SnapshotStore>,
                        store as Arc<dyn CredentialStore>,
                    )
                }
            };

        Ok(Self::with_stores(config, snapshots, credentials).await?)
    }

    pub async fn with_stores(
        config: Config,
        snapshots: Arc<dyn SnapshotStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Arc<Self>, StoreError> {
        for (username, password) in &config.seed_users {
            credentials
                .put_credential(&Credential {
                    username: username.clone(),
                    password: password.clone(),
                    disabled: false,
                })
                .await?;

            info!("Seeded credentials for {username}");
        }

        Ok(Arc::new(Self {
            snapshots: Snapshots::new(snapshots, config.retention_cap),
            music: MusicStore::new(&config.music_path),
            credentials,
            config,
        }))
    }
}
