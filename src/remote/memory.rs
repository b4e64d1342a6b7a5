//! In-process remote store.
//!
//! `MemoryTransport` behaves like the HTTP store (numeric auto-increment IDs,
//! server-stamped `created_at`, full-record replace) without a network. It
//! also supports failure injection and records every call so tests can assert
//! on network traffic. Each call yields to the scheduler once before touching
//! state, so concurrent read-merge-write updates interleave the way they do
//! against a real server.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::{RemoteError, Transport};

/// CRUD verb, used to target injected failures and to inspect the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    List,
    Get,
    Create,
    Replace,
    Delete,
}

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub verb: Verb,
    pub collection: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
struct FailureRule {
    verb: Verb,
    collection: String,
    id: Option<String>,
    error: RemoteError,
    /// `None` fails forever
    remaining: Option<usize>,
}

impl FailureRule {
    fn matches(&self, call: &Call) -> bool {
        self.verb == call.verb
            && self.collection == call.collection
            && (self.id.is_none() || self.id == call.id)
    }
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<u64, Map<String, Value>>>,
    next_id: u64,
    failures: Vec<FailureRule>,
    calls: Vec<Call>,
}

impl Inner {
    /// Record the call and return the injected failure, if any.
    fn enter(&mut self, call: Call) -> Result<(), RemoteError> {
        let mut injected = None;
        if let Some(rule) = self.failures.iter_mut().find(|r| r.matches(&call)) {
            injected = Some(rule.error.clone());
            if let Some(n) = rule.remaining.as_mut() {
                *n = n.saturating_sub(1);
            }
        }
        self.failures.retain(|r| r.remaining != Some(0));
        self.calls.push(call);
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn insert(&mut self, collection: &str, body: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id;
        let mut record = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        record.insert("id".to_string(), Value::from(id));
        record
            .entry("created_at".to_string())
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)));
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, record.clone());
        Value::Object(record)
    }
}

fn not_found(collection: &str, id: &str) -> RemoteError {
    RemoteError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

/// In-memory stand-in for the remote store.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inner: Mutex<Inner>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a raw record directly, bypassing the call log. Returns its ID.
    pub fn insert(&self, collection: &str, body: Value) -> String {
        let record = self.lock().insert(collection, body);
        record["id"].to_string()
    }

    /// Raw stored record, as the server holds it.
    pub fn record(&self, collection: &str, id: &str) -> Option<Value> {
        let key = id.parse::<u64>().ok()?;
        self.lock()
            .collections
            .get(collection)
            .and_then(|c| c.get(&key))
            .map(|r| Value::Object(r.clone()))
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.lock().collections.get(collection).map_or(0, |c| c.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Fail every matching call until cleared.
    pub fn fail(&self, verb: Verb, collection: &str, error: RemoteError) {
        self.push_rule(verb, collection, None, error, None);
    }

    /// Fail every matching call that targets `id`.
    pub fn fail_id(&self, verb: Verb, collection: &str, id: &str, error: RemoteError) {
        self.push_rule(verb, collection, Some(id.to_string()), error, None);
    }

    /// Fail only the next matching call.
    pub fn fail_once(&self, verb: Verb, collection: &str, error: RemoteError) {
        self.push_rule(verb, collection, None, error, Some(1));
    }

    fn push_rule(
        &self,
        verb: Verb,
        collection: &str,
        id: Option<String>,
        error: RemoteError,
        remaining: Option<usize>,
    ) {
        self.lock().failures.push(FailureRule {
            verb,
            collection: collection.to_string(),
            id,
            error,
            remaining,
        });
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// All calls made so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls with this verb against `collection`.
    pub fn count(&self, verb: Verb, collection: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.verb == verb && c.collection == collection)
            .count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    async fn enter(&self, verb: Verb, collection: &str, id: Option<&str>) -> Result<(), RemoteError> {
        tokio::task::yield_now().await;
        self.lock().enter(Call {
            verb,
            collection: collection.to_string(),
            id: id.map(str::to_string),
        })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn list(&self, collection: &str, _per_page: u32) -> Result<Value, RemoteError> {
        self.enter(Verb::List, collection, None).await?;
        let inner = self.lock();
        let records: Vec<Value> = inner
            .collections
            .get(collection)
            .map(|c| c.values().cloned().map(Value::Object).collect())
            .unwrap_or_default();
        Ok(serde_json::json!({ "records": records, "total_pages": 1 }))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, RemoteError> {
        self.enter(Verb::Get, collection, Some(id)).await?;
        self.record(collection, id)
            .ok_or_else(|| not_found(collection, id))
    }

    async fn create(&self, collection: &str, body: Value) -> Result<Value, RemoteError> {
        self.enter(Verb::Create, collection, None).await?;
        Ok(self.lock().insert(collection, body))
    }

    async fn replace(&self, collection: &str, id: &str, body: Value) -> Result<Value, RemoteError> {
        self.enter(Verb::Replace, collection, Some(id)).await?;
        let key = id.parse::<u64>().map_err(|_| not_found(collection, id))?;
        let mut inner = self.lock();
        let record = inner
            .collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(&key))
            .ok_or_else(|| not_found(collection, id))?;

        let created_at = record.get("created_at").cloned();
        *record = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        record.insert("id".to_string(), Value::from(key));
        if let Some(created_at) = created_at {
            record.insert("created_at".to_string(), created_at);
        }
        Ok(Value::Object(record.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.enter(Verb::Delete, collection, Some(id)).await?;
        let key = id.parse::<u64>().map_err(|_| not_found(collection, id))?;
        self.lock()
            .collections
            .get_mut(collection)
            .and_then(|c| c.remove(&key))
            .map(|_| ())
            .ok_or_else(|| not_found(collection, id))
    }
}
