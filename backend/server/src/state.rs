use std::sync::Arc;

use super::{
    config::Config,
    database::{RedisStore, init_redis},
};

pub struct AppState {
    pub config: Config,
    pub store: RedisStore,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Arc<Self>> {
        let config = Config::load()?;

        let store = init_redis(&config).await?;
        store.create_index().await?;

        Ok(Arc::new(Self { config, store }))
    }
}
