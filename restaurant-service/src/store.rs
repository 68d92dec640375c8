use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use common_http_errors::ApiError;
use serde_json::{Map, Value};
use thiserror::Error;

/// Budget for single-document lookups and writes.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for the multi-stage billing aggregation.
pub const AGGREGATE_TIMEOUT: Duration = Duration::from_secs(100);

/// A stored document. Always a JSON object.
pub type Document = Value;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation timed out")]
    Timeout,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::internal(err, None)
    }
}

/// Equality filter over top-level document fields.
#[derive(Debug, Clone, Default)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    pub fn as_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub upserted: bool,
}

/// The document store capabilities the core depends on. Concrete store
/// choice stays behind this trait; handlers and the billing aggregator
/// receive an injected implementation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Document>, StoreError>;

    async fn find_many(&self, collection: &str, filter: &Filter)
        -> Result<Vec<Document>, StoreError>;

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<(), StoreError>;

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError>;

    /// Applies `patch` to the first matching document. With `upsert` a new
    /// document is created from filter + patch when nothing matches.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;
}

/// Serialize a model into its stored document form.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<Document, StoreError> {
    serde_json::to_value(value).map_err(|err| StoreError::Malformed(err.to_string()))
}

/// Deserialize a stored document back into a model.
pub fn from_document<T: serde::de::DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    serde_json::from_value(doc).map_err(|err| StoreError::Malformed(err.to_string()))
}

/// Bound a store operation so a slow backend cannot hang a request.
/// No retry on elapse; the failure surfaces as a server error.
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>> + Send,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| StoreError::Timeout)?
}

/// In-process store used by tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let guard = self.collections.lock().expect("mutex poisoned");
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)).cloned()))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.lock().expect("mutex poisoned");
        Ok(guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let mut guard = self.collections.lock().expect("mutex poisoned");
        guard.entry(collection.to_string()).or_default().push(doc);
        Ok(())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError> {
        let mut guard = self.collections.lock().expect("mutex poisoned");
        guard
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let patch_obj = match patch {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Malformed(format!(
                    "patch must be an object, got {other}"
                )))
            }
        };

        let mut guard = self.collections.lock().expect("mutex poisoned");
        let docs = guard.entry(collection.to_string()).or_default();

        if let Some(doc) = docs.iter_mut().find(|doc| filter.matches(doc)) {
            if let Value::Object(fields) = doc {
                for (key, value) in patch_obj {
                    fields.insert(key, value);
                }
            }
            return Ok(UpdateOutcome {
                matched: 1,
                upserted: false,
            });
        }

        if upsert {
            let mut fields = match filter.as_json() {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            for (key, value) in patch_obj {
                fields.insert(key, value);
            }
            docs.push(Value::Object(fields));
            return Ok(UpdateOutcome {
                matched: 0,
                upserted: true,
            });
        }

        Ok(UpdateOutcome::default())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let guard = self.collections.lock().expect("mutex poisoned");
        Ok(guard
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).count() as u64)
            .unwrap_or(0))
    }
}
