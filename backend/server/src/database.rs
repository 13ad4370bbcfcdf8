//! # Redis
//!
//! Document store for sightings plus a couple of small side values.
//!
//! ## Layout
//!
//! - `bigfoot:sighting:<id>`: JSON document, root `$`
//! - `bigfoot:sightings`: set of every sighting id
//! - `bigfoot:sightings:byState:<state>`, `bigfoot:sightings:byClass:<class>`:
//!   ids per categorical value, see [`crate::index`]
//! - `bigfoot:motd`: string, optional expiry
//! - `bigfoot:sightings:reported`: list, pushed right and popped left
//!
//! ## Connections
//!
//! One [`ConnectionManager`] is shared by every request. `WATCH` state lives on
//! a connection though, so each patch opens its own connection for the
//! watch/multi/exec round and drops it afterwards.
use std::{num::NonZeroUsize, time::Duration};

use redis::{
    AsyncCommands, Client, IntoConnectionInfo,
    aio::{ConnectionManager, ConnectionManagerConfig, MultiplexedConnection},
};
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    config::Config,
    keys::{IndexSet, MOTD_KEY, REPORTS_KEY, sighting_key},
    store::{
        CLASS_FIELD, FieldWrite, LATITUDE_FIELD, LONGITUDE_FIELD, STATE_FIELD, SightingStore,
        Snapshot, StoreResult, Tags, WatchedDocument,
    },
};

const CONNECTION_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct RedisStore {
    pub(crate) client: Client,
    pub(crate) connection: ConnectionManager,
}

pub async fn init_redis(config: &Config) -> StoreResult<RedisStore> {
    let manager_config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(CONNECTION_TIMEOUT);

    let mut connection_info = (config.redis_host.as_str(), config.redis_port).into_connection_info()?;
    connection_info.redis.password = config.redis_password.clone();

    let client = Client::open(connection_info)?;
    let connection = client
        .get_connection_manager_with_config(manager_config)
        .await?;

    info!("Connected to Redis at {}:{}", config.redis_host, config.redis_port);

    Ok(RedisStore { client, connection })
}

impl RedisStore {
    pub async fn ping(&self) -> StoreResult<String> {
        let mut connection = self.connection.clone();

        Ok(redis::cmd("PING").query_async(&mut connection).await?)
    }

    pub async fn motd(&self) -> StoreResult<Option<String>> {
        let mut connection = self.connection.clone();

        Ok(connection.get(MOTD_KEY).await?)
    }

    pub async fn set_motd(&self, motd: &str, expire_in: Option<u64>) -> StoreResult<()> {
        let mut connection = self.connection.clone();

        match expire_in.filter(|seconds| *seconds > 0) {
            Some(seconds) => connection.set_ex::<_, _, ()>(MOTD_KEY, motd, seconds).await?,
            None => connection.set::<_, _, ()>(MOTD_KEY, motd).await?,
        }

        Ok(())
    }

    pub async fn clear_motd(&self) -> StoreResult<()> {
        let mut connection = self.connection.clone();
        connection.unlink::<_, ()>(MOTD_KEY).await?;

        Ok(())
    }

    pub async fn push_report(&self, report: &str) -> StoreResult<()> {
        let mut connection = self.connection.clone();
        connection.rpush::<_, _, ()>(REPORTS_KEY, report).await?;

        Ok(())
    }

    pub async fn reports(&self) -> StoreResult<Vec<String>> {
        let mut connection = self.connection.clone();

        Ok(connection.lrange(REPORTS_KEY, 0, -1).await?)
    }

    pub async fn pop_report(&self) -> StoreResult<Option<String>> {
        let mut connection = self.connection.clone();

        Ok(connection.lpop(REPORTS_KEY, None::<NonZeroUsize>).await?)
    }
}

/// `JSON.GET key $` wraps the root in an array.
fn root_document(reply: Option<String>) -> StoreResult<Option<Value>> {
    let Some(reply) = reply else {
        return Ok(None);
    };

    match serde_json::from_str(&reply)? {
        Value::Array(mut roots) if !roots.is_empty() => Ok(Some(roots.swap_remove(0))),
        Value::Array(_) => Ok(None),
        document => Ok(Some(document)),
    }
}

/// Reply of `JSON.GET key $.state $.classification $.longitude $.latitude`,
/// keyed by path.
fn snapshot_from_paths(reply: Option<String>) -> StoreResult<Option<Snapshot>> {
    let Some(reply) = reply else {
        return Ok(None);
    };

    let paths: Map<String, Value> = serde_json::from_str(&reply)?;
    let first = |field: &str| {
        paths
            .get(&format!("$.{field}"))
            .and_then(Value::as_array)
            .and_then(|values| values.first())
    };
    let tag = |field: &str| {
        first(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(Some(Snapshot {
        tags: Tags {
            state: tag(STATE_FIELD),
            classification: tag(CLASS_FIELD),
        },
        longitude: first(LONGITUDE_FIELD).and_then(Value::as_f64),
        latitude: first(LATITUDE_FIELD).and_then(Value::as_f64),
    }))
}

fn snapshot_command(id: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("JSON.GET");
    cmd.arg(sighting_key(id));

    for field in [STATE_FIELD, CLASS_FIELD, LONGITUDE_FIELD, LATITUDE_FIELD] {
        cmd.arg(format!("$.{field}"));
    }

    cmd
}

impl SightingStore for RedisStore {
    type Watch = RedisWatch;

    async fn read_document(&self, id: &str) -> StoreResult<Option<Value>> {
        let mut connection = self.connection.clone();

        let reply: Option<String> = redis::cmd("JSON.GET")
            .arg(sighting_key(id))
            .arg("$")
            .query_async(&mut connection)
            .await?;

        root_document(reply)
    }

    async fn read_documents(&self, ids: &[String]) -> StoreResult<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut connection = self.connection.clone();
        let keys: Vec<String> = ids.iter().map(|id| sighting_key(id)).collect();

        let replies: Vec<Option<String>> = redis::cmd("JSON.MGET")
            .arg(&keys)
            .arg("$")
            .query_async(&mut connection)
            .await?;

        let mut documents = Vec::with_capacity(replies.len());
        for reply in replies {
            if let Some(document) = root_document(reply)? {
                documents.push(document);
            }
        }

        Ok(documents)
    }

    async fn read_tags(&self, id: &str) -> StoreResult<Option<Tags>> {
        let mut connection = self.connection.clone();

        let reply: Option<String> = snapshot_command(id).query_async(&mut connection).await?;

        Ok(snapshot_from_paths(reply)?.map(|snapshot| snapshot.tags))
    }

    async fn write_document(&self, id: &str, document: &Map<String, Value>) -> StoreResult<()> {
        let mut connection = self.connection.clone();

        redis::cmd("JSON.SET")
            .arg(sighting_key(id))
            .arg("$")
            .arg(serde_json::to_string(document)?)
            .query_async::<()>(&mut connection)
            .await?;

        Ok(())
    }

    async fn delete_document(&self, id: &str) -> StoreResult<bool> {
        let mut connection = self.connection.clone();

        let removed: usize = connection.unlink(sighting_key(id)).await?;

        Ok(removed > 0)
    }

    async fn add_member(&self, set: &IndexSet, id: &str) -> StoreResult<()> {
        let mut connection = self.connection.clone();
        connection.sadd::<_, _, ()>(set.key(), id).await?;

        Ok(())
    }

    async fn remove_member(&self, set: &IndexSet, id: &str) -> StoreResult<()> {
        let mut connection = self.connection.clone();
        connection.srem::<_, _, ()>(set.key(), id).await?;

        Ok(())
    }

    async fn members(&self, sets: &[IndexSet]) -> StoreResult<Vec<String>> {
        let mut connection = self.connection.clone();

        match sets {
            [] => Ok(Vec::new()),
            [set] => Ok(connection.smembers(set.key()).await?),
            sets => {
                let keys: Vec<String> = sets.iter().map(IndexSet::key).collect();

                Ok(connection.sinter(keys).await?)
            }
        }
    }

    async fn watch(&self, id: &str) -> StoreResult<RedisWatch> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        let key = sighting_key(id);

        redis::cmd("WATCH")
            .arg(&key)
            .query_async::<()>(&mut connection)
            .await?;

        let reply: Option<String> = snapshot_command(id).query_async(&mut connection).await?;
        let prior = snapshot_from_paths(reply)?;

        Ok(RedisWatch {
            connection,
            key,
            prior,
        })
    }
}

pub struct RedisWatch {
    connection: MultiplexedConnection,
    key: String,
    prior: Option<Snapshot>,
}

impl WatchedDocument for RedisWatch {
    fn prior(&self) -> Option<&Snapshot> {
        self.prior.as_ref()
    }

    async fn commit(mut self, writes: &[FieldWrite]) -> StoreResult<bool> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for write in writes {
            match write {
                FieldWrite::Set { value, .. } => {
                    pipe.cmd("JSON.SET")
                        .arg(&self.key)
                        .arg(write.path())
                        .arg(serde_json::to_string(value)?)
                        .ignore();
                }
                FieldWrite::Remove { .. } => {
                    pipe.cmd("JSON.DEL")
                        .arg(&self.key)
                        .arg(write.path())
                        .ignore();
                }
            }
        }

        // EXEC answers nil when the watched key was touched
        let reply: Option<()> = pipe.query_async(&mut self.connection).await?;

        Ok(reply.is_some())
    }
}
