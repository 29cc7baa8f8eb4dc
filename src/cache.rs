use crate::normalize::table::ObservationTable;
use log::{debug, info};
use std::collections::{hash_map::Entry, HashMap};
use std::fmt;
use std::future::Future;
use tokio::sync::Mutex;

/// Identifies one full-collection query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub source: String,
    pub database: Option<String>,
    pub collection: Option<String>,
}

impl QueryKey {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            database: None,
            collection: None,
        }
    }

    pub fn scoped(mut self, database: impl Into<String>, collection: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self.collection = Some(collection.into());
        self
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.database, &self.collection) {
            (Some(db), Some(coll)) => write!(f, "{} [{}/{}]", self.source, db, coll),
            _ => f.write_str(&self.source),
        }
    }
}

/// Memoizes normalized tables per query.
///
/// Entries stay until [`ObservationCache::invalidate`] or
/// [`ObservationCache::clear`] is called. Failed loads are not cached.
#[derive(Debug, Default)]
pub struct ObservationCache {
    tables: Mutex<HashMap<QueryKey, ObservationTable>>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached table for `key`, running `load` to fill the entry when it is missing.
    ///
    /// The lock is not held while loading. If another caller fills the entry
    /// in the meantime, its table wins and the freshly loaded one is dropped.
    pub async fn get_or_load<F, Fut, E>(&self, key: &QueryKey, load: F) -> Result<ObservationTable, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ObservationTable, E>>,
    {
        {
            let tables = self.tables.lock().await;
            if let Some(table) = tables.get(key) {
                debug!("Cache hit for {}", key);
                return Ok(table.clone());
            }
        }

        let loaded = load().await?;

        let mut tables = self.tables.lock().await;
        match tables.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                info!("Cached {} observations for {}", loaded.height(), key);
                entry.insert(loaded.clone());
                Ok(loaded)
            }
        }
    }

    /// Drops the entry for `key`. Returns whether there was one.
    pub async fn invalidate(&self, key: &QueryKey) -> bool {
        let removed = self.tables.lock().await.remove(key).is_some();
        if removed {
            info!("Invalidated cached observations for {}", key);
        }
        removed
    }

    pub async fn clear(&self) {
        let mut tables = self.tables.lock().await;
        info!("Clearing {} cached queries", tables.len());
        tables.clear();
    }

    pub async fn contains(&self, key: &QueryKey) -> bool {
        self.tables.lock().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.tables.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::row::ObservationRow;
    use polars::prelude::PolarsError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table(rows: usize) -> ObservationTable {
        ObservationTable::from_rows(&vec![ObservationRow::at(None); rows]).unwrap()
    }

    #[tokio::test]
    async fn test_loads_once_until_invalidated() -> Result<(), PolarsError> {
        let cache = ObservationCache::new();
        let key = QueryKey::new("memory:test");
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let loaded = cache
                .get_or_load(&key, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, PolarsError>(table(2))
                })
                .await?;
            assert_eq!(loaded.height(), 2);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        assert!(cache.invalidate(&key).await);
        assert!(!cache.invalidate(&key).await);
        cache
            .get_or_load(&key, || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, PolarsError>(table(2))
            })
            .await?;
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = ObservationCache::new();
        let key = QueryKey::new("memory:failing");
        let result = cache
            .get_or_load(&key, || async {
                Err::<ObservationTable, _>("store down".to_string())
            })
            .await;
        assert!(result.is_err());
        assert!(!cache.contains(&key).await);
    }

    #[tokio::test]
    async fn test_keys_are_independent_and_clear_empties() -> Result<(), PolarsError> {
        let cache = ObservationCache::new();
        let a = QueryKey::new("http://store").scoped("weatherdb", "Weather Data");
        let b = QueryKey::new("http://store").scoped("weatherdb", "Archive");
        cache.get_or_load(&a, || async { Ok::<_, PolarsError>(table(1)) }).await?;
        cache.get_or_load(&b, || async { Ok::<_, PolarsError>(table(3)) }).await?;
        assert_eq!(cache.len().await, 2);
        assert_eq!(
            cache
                .get_or_load(&b, || async { Ok::<_, PolarsError>(table(0)) })
                .await?
                .height(),
            3
        );
        cache.clear().await;
        assert!(cache.is_empty().await);
        Ok(())
    }

    #[test]
    fn test_key_display() {
        assert_eq!(
            QueryKey::new("http://store")
                .scoped("weatherdb", "Weather Data")
                .to_string(),
            "http://store [weatherdb/Weather Data]"
        );
        assert_eq!(QueryKey::new("memory:x").to_string(), "memory:x");
    }
}
