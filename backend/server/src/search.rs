//! # Search Index
//!
//! Declared over every `bigfoot:sighting:*` JSON document. Tag lookups go
//! through the membership sets instead, this index serves the rest: pages,
//! free text, numeric thresholds and radius queries.
//!
//! ## Schema
//! - `title`, `observedNarrative`: **text**
//! - `state`, `classification`, `county`: **tag**
//! - `timestamp`, `temperature_high|mid|low`: **numeric**
//! - `location`: **geo**, stored as a `"lon,lat"` string
//!
//! ## Commands
//!
//! Inspect the index.
//! ```sh
//! redis-cli FT.INFO bigfoot:sighting:index
//! ```
use redis::Value as RedisValue;
use serde_json::Value;
use tracing::info;

use crate::{
    database::RedisStore,
    keys::{SIGHTING_INDEX, SIGHTING_PREFIX},
    store::{StoreError, StoreResult},
};

/// Upper bound for the "return everything" queries.
pub const SEARCH_LIMIT: usize = 10_000;

const INDEX_EXISTS: &str = "Index already exists";

const SCHEMA: [(&str, &str, &str); 10] = [
    ("$.title", "title", "TEXT"),
    ("$.observedNarrative", "observedNarrative", "TEXT"),
    ("$.state", "state", "TAG"),
    ("$.classification", "classification", "TAG"),
    ("$.county", "county", "TAG"),
    ("$.timestamp", "timestamp", "NUMERIC"),
    ("$.temperature.high", "temperature_high", "NUMERIC"),
    ("$.temperature.mid", "temperature_mid", "NUMERIC"),
    ("$.temperature.low", "temperature_low", "NUMERIC"),
    ("$.location", "location", "GEO"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum SightingQuery {
    /// Built through [`SightingQuery::page`]
    Page { offset: usize, size: usize },
    Containing(String),
    AboveTemperature(f64),
    Within {
        radius: f64,
        longitude: f64,
        latitude: f64,
    },
}

impl SightingQuery {
    /// 1-based `page`. `None` for an empty page or size, or a window reaching
    /// past [`SEARCH_LIMIT`], which the search module refuses.
    pub fn page(page: usize, size: usize) -> Option<Self> {
        if page == 0 || size == 0 {
            return None;
        }

        let offset = (page - 1).checked_mul(size)?;
        let end = offset.checked_add(size)?;

        (end <= SEARCH_LIMIT).then_some(SightingQuery::Page { offset, size })
    }

    pub fn query(&self) -> String {
        match self {
            SightingQuery::Page { .. } => "*".to_string(),
            SightingQuery::Containing(word) => {
                let word = escape(word);
                format!("(@title:{word}) | (@observedNarrative:{word})")
            }
            SightingQuery::AboveTemperature(temperature) => {
                format!("@temperature_mid:[{temperature} +inf]")
            }
            SightingQuery::Within {
                radius,
                longitude,
                latitude,
            } => format!("@location:[{longitude} {latitude} {radius} mi]"),
        }
    }

    /// `(offset, count)`
    pub fn limit(&self) -> (usize, usize) {
        match self {
            SightingQuery::Page { offset, size } => (*offset, *size),
            _ => (0, SEARCH_LIMIT),
        }
    }
}

fn escape(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());

    for c in term.chars() {
        if (c.is_ascii_punctuation() && c != '_') || c.is_whitespace() {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

impl RedisStore {
    /// An existing index is left as is.
    pub async fn create_index(&self) -> StoreResult<()> {
        let mut connection = self.connection.clone();

        let mut cmd = redis::cmd("FT.CREATE");
        cmd.arg(SIGHTING_INDEX)
            .arg("ON")
            .arg("JSON")
            .arg("PREFIX")
            .arg(1)
            .arg(SIGHTING_PREFIX)
            .arg("SCHEMA");

        for (path, alias, kind) in SCHEMA {
            cmd.arg(path).arg("AS").arg(alias).arg(kind);
        }

        match cmd.query_async::<()>(&mut connection).await {
            Ok(()) => info!("Created search index {SIGHTING_INDEX}"),
            Err(e) if e.to_string().contains(INDEX_EXISTS) => {
                info!("Search index {SIGHTING_INDEX} already exists");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    pub async fn search(&self, query: &SightingQuery) -> StoreResult<Vec<Value>> {
        let mut connection = self.connection.clone();
        let (offset, count) = query.limit();

        let reply: RedisValue = redis::cmd("FT.SEARCH")
            .arg(SIGHTING_INDEX)
            .arg(query.query())
            .arg("LIMIT")
            .arg(offset)
            .arg(count)
            .query_async(&mut connection)
            .await?;

        #[cfg(feature = "verbose")]
        println!("FT.SEARCH {:?}: {:?}", query, reply);

        parse_search_reply(reply)
    }
}

/// `[total, key, [field, value, ...], key, [...], ...]`, documents under `$`.
pub fn parse_search_reply(reply: RedisValue) -> StoreResult<Vec<Value>> {
    let RedisValue::Array(items) = reply else {
        return Err(StoreError::Reply(format!("expected array, got {reply:?}")));
    };

    let mut documents = Vec::new();

    for item in items.into_iter().skip(1) {
        let RedisValue::Array(fields) = item else {
            continue;
        };

        for pair in fields.chunks(2) {
            let [RedisValue::BulkString(name), RedisValue::BulkString(json)] = pair else {
                continue;
            };

            if name.as_slice() != b"$" {
                continue;
            }

            match serde_json::from_slice(json)? {
                Value::Array(mut roots) if !roots.is_empty() => documents.push(roots.swap_remove(0)),
                Value::Array(_) => {}
                document => documents.push(document),
            }
        }
    }

    Ok(documents)
}
