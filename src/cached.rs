//! A read cache in front of a `Jsonify` engine.

use async_std::task::{self, JoinHandle};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

use crate::jsonify::{Jsonify, JsonifyError, Request};
use crate::store::GraphStore;

/// Identifier plus the serialized context it was compacted with.
type CacheKey = (String, String);

/// The outcome of a cached `get`.
#[derive(Debug)]
pub enum Lookup {
    /// The document was in the cache.
    Immediate(Value),

    /// The document is being fetched. The handle resolves once the result
    /// has been stored in the cache.
    Pending(JoinHandle<Result<Value, JsonifyError>>),
}

impl Lookup {
    pub fn is_immediate(&self) -> bool {
        match self {
            Lookup::Immediate(_) => true,
            Lookup::Pending(_) => false,
        }
    }

    /// Waits for the document, whichever way it comes.
    pub async fn resolve(self) -> Result<Value, JsonifyError> {
        match self {
            Lookup::Immediate(document) => Ok(document),
            Lookup::Pending(handle) => handle.await,
        }
    }
}

/// Wraps a `Jsonify` engine so that reads of documents seen before are
/// answered synchronously.
///
/// Entries are only dropped by `clear`. `put`, `patch` and `delete` go
/// straight to the engine and leave the cache alone, so a cached document
/// keeps its old content after a write until the cache is cleared.
///
/// Two concurrent misses on the same key both fetch; the last one to finish
/// is what stays cached.
pub struct CachedJsonify<S: GraphStore + ?Sized + 'static> {
    inner: Arc<Jsonify<S>>,
    cache: Arc<Mutex<HashMap<CacheKey, Value>>>,
}

impl<S: GraphStore + ?Sized + 'static> CachedJsonify<S> {
    pub fn new(inner: Arc<Jsonify<S>>) -> CachedJsonify<S> {
        CachedJsonify {
            inner,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn inner(&self) -> &Arc<Jsonify<S>> {
        &self.inner
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Value>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self, id: &str, context: Option<&Value>) -> (CacheKey, Option<Value>) {
        let context = match context {
            Some(context) => Some(context.clone()),
            None => self.inner.resolve_context(id),
        };
        let identity = context.as_ref().map(Value::to_string).unwrap_or_default();

        ((id.to_owned(), identity), context)
    }

    /// Returns the cached document for `id` right away, or starts fetching
    /// it in the background.
    pub fn get(&self, id: &str, context: Option<&Value>) -> Lookup {
        let (key, context) = self.key(id, context);

        if let Some(document) = self.entries().get(&key) {
            trace!(%id, "cache hit");
            return Lookup::Immediate(document.clone());
        }

        trace!(%id, "cache miss");
        let inner = self.inner.clone();
        let cache = self.cache.clone();

        Lookup::Pending(task::spawn(async move {
            let document = inner.get(&key.0, context.as_ref()).await?;
            debug!(id = %key.0, "caching document");

            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, document.clone());

            Ok(document)
        }))
    }

    /// Callback form of `get`. A hit is returned and `on_resolved` is not
    /// called. On a miss this returns `None` and `on_resolved` is called
    /// exactly once with the result of the fetch.
    pub fn get_with<F>(&self, id: &str, context: Option<&Value>, on_resolved: F) -> Option<Value>
    where
        F: FnOnce(Result<Value, JsonifyError>) + Send + 'static,
    {
        match self.get(id, context) {
            Lookup::Immediate(document) => Some(document),
            Lookup::Pending(handle) => {
                task::spawn(async move { on_resolved(handle.await) });
                None
            }
        }
    }

    /// True if `get(id, context)` would be answered from the cache.
    pub fn contains(&self, id: &str, context: Option<&Value>) -> bool {
        let (key, _) = self.key(id, context);
        self.entries().contains_key(&key)
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Passes through to `Jsonify::put`; the cache is not touched.
    pub async fn put<R: Into<Request>>(&self, request: R) -> Result<(), JsonifyError> {
        self.inner.put(request).await
    }

    /// Passes through to `Jsonify::patch`; the cache is not touched.
    pub async fn patch<R: Into<Request>>(&self, request: R) -> Result<(), JsonifyError> {
        self.inner.patch(request).await
    }

    /// Passes through to `Jsonify::delete`; the cache is not touched.
    pub async fn delete<R: Into<Request>>(&self, request: R) -> Result<(), JsonifyError> {
        self.inner.delete(request).await
    }
}
