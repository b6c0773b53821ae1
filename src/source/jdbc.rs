//! Query source: run a parameterized query and map each row.
//!
//! The crate does not talk to databases itself. Callers plug in a
//! [`QueryExecutor`] over whatever driver they use; rows come back as
//! column-name → JSON value maps.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{TryStreamExt, stream};
use serde_json::Value;
use tracing::debug;

use crate::cache::KeyValueStore;
use crate::error::LoadError;

/// One result row: column name → value.
pub type Row = serde_json::Map<String, Value>;

/// Decides whether a row is loaded.
pub type RowFilter = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// Derives the cache key from a row.
pub type RowKeyFn = Arc<dyn Fn(&Row) -> Result<String, LoadError> + Send + Sync>;

/// Derives the cached value from a row.
pub type RowValueFn<V> = Arc<dyn Fn(&Row) -> Result<V, LoadError> + Send + Sync>;

/// Executes parameterized queries on behalf of a [`JdbcSource`].
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, LoadError>;
}

/// Loads a cache from query results.
///
/// Rows pass through the filter (default: accept all), then the key and
/// value extractors. Rows are processed concurrently into the shared store.
/// An empty query loads nothing.
pub struct JdbcSource<V> {
    executor: Arc<dyn QueryExecutor>,
    query: String,
    params: Vec<Value>,
    filter: Option<RowFilter>,
    key: RowKeyFn,
    value: RowValueFn<V>,
    concurrency: Option<usize>,
}

impl<V> JdbcSource<V> {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        query: impl Into<String>,
        key: impl Fn(&Row) -> Result<String, LoadError> + Send + Sync + 'static,
        value: impl Fn(&Row) -> Result<V, LoadError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            executor,
            query: query.into(),
            params: Vec::new(),
            filter: None,
            key: Arc::new(key),
            value: Arc::new(value),
            concurrency: None,
        }
    }

    /// Only load rows for which `filter` returns true.
    pub fn filter(mut self, filter: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Append a positional query parameter.
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Replace all query parameters.
    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Cap the number of rows processed at once. Default: unbounded.
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit.max(1));
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    fn accepts(&self, row: &Row) -> bool {
        self.filter.as_ref().is_none_or(|f| f(row))
    }
}

impl<V: Send + Sync> JdbcSource<V> {
    pub async fn load(&self, store: &KeyValueStore<V>) -> Result<(), LoadError> {
        if self.query.trim().is_empty() {
            debug!("empty query, nothing to load");
            return Ok(());
        }

        let rows = self.executor.query(&self.query, &self.params).await?;
        debug!(rows = rows.len(), query = %self.query, "query returned");

        stream::iter(rows.into_iter().map(Ok::<Row, LoadError>))
            .try_for_each_concurrent(self.concurrency, |row| async move {
                if !self.accepts(&row) {
                    return Ok(());
                }
                let key = (self.key)(&row)?;
                let value = (self.value)(&row)?;
                store.put(key, value);
                Ok(())
            })
            .await
    }
}

/// Read a column as a string.
///
/// Strings are taken verbatim, `null` becomes `""`, other values use their
/// JSON rendering. A missing column is an error.
pub fn column_string(row: &Row, column: &str) -> Result<String, LoadError> {
    match row.get(column) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(other) => Ok(other.to_string()),
        None => Err(LoadError::Extract {
            what: "column",
            message: format!("no column named '{column}'"),
        }),
    }
}
