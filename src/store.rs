//! The graph store the engine reads and writes named graphs in.

use async_std::sync::RwLock;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::trace;

use crate::rdf::Graph;

/// Boxed future returned by every `GraphStore` operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug)]
/// The store could not complete an operation. The backend's own error is
/// kept as the source.
pub enum StoreError {
    /// The store refused or could not be reached.
    Unavailable(String),

    /// Any other failure reported by the backend.
    Backend(Box<dyn Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E: Into<Box<dyn Error + Send + Sync>>>(err: E) -> StoreError {
        StoreError::Backend(err.into())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StoreError::Unavailable(ref reason) => write!(f, "store unavailable: {}", reason),
            StoreError::Backend(ref err) => write!(f, "store failure: {}", err),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            StoreError::Backend(ref err) => Some(err.as_ref()),
            StoreError::Unavailable(_) => None,
        }
    }
}

/// This trait is implemented by consumers of the API, to provide the
/// persistence for named graphs.
pub trait GraphStore: Send + Sync {
    /// Fetches the graph named `id`. An absent graph is empty, not an error.
    fn fetch_graph<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Graph>;

    /// Replaces the graph named `id` with `graph`.
    fn replace_graph<'a>(&'a self, id: &'a str, graph: Graph) -> StoreFuture<'a, ()>;

    /// Adds the triples of `graph` to the graph named `id`.
    fn merge_graph<'a>(&'a self, id: &'a str, graph: Graph) -> StoreFuture<'a, ()>;

    /// Removes the graph named `id`. Removing an absent graph succeeds.
    fn delete_graph<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()>;
}

impl<S: GraphStore + ?Sized> GraphStore for Arc<S> {
    fn fetch_graph<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Graph> {
        (**self).fetch_graph(id)
    }

    fn replace_graph<'a>(&'a self, id: &'a str, graph: Graph) -> StoreFuture<'a, ()> {
        (**self).replace_graph(id, graph)
    }

    fn merge_graph<'a>(&'a self, id: &'a str, graph: Graph) -> StoreFuture<'a, ()> {
        (**self).merge_graph(id, graph)
    }

    fn delete_graph<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()> {
        (**self).delete_graph(id)
    }
}

/// Keeps named graphs in memory. Merges happen under the write lock, so
/// concurrent patches of one graph do not lose triples.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graphs: RwLock<HashMap<String, Graph>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Number of non-empty graphs held.
    pub async fn len(&self) -> usize {
        self.graphs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl GraphStore for MemoryStore {
    fn fetch_graph<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Graph> {
        Box::pin(async move {
            let graphs = self.graphs.read().await;
            let graph = graphs.get(id).cloned().unwrap_or_default();
            trace!(%id, triples = graph.len(), "fetched graph");

            Ok(graph)
        })
    }

    fn replace_graph<'a>(&'a self, id: &'a str, graph: Graph) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut graphs = self.graphs.write().await;
            if graph.is_empty() {
                graphs.remove(id);
            } else {
                graphs.insert(id.to_owned(), graph);
            }

            Ok(())
        })
    }

    fn merge_graph<'a>(&'a self, id: &'a str, graph: Graph) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if graph.is_empty() {
                return Ok(());
            }

            let mut graphs = self.graphs.write().await;
            graphs.entry(id.to_owned()).or_insert_with(Graph::new).merge(graph);

            Ok(())
        })
    }

    fn delete_graph<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.graphs.write().await.remove(id);

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Object, Triple};

    fn triple(value: &str) -> Triple {
        Triple::new(
            "http://localhost/person/john",
            "http://schema.org/givenName",
            Object::string(value),
        )
    }

    #[async_std::test]
    async fn absent_graphs_are_empty() {
        let store = MemoryStore::new();

        assert!(store.fetch_graph("http://localhost/nobody").await.unwrap().is_empty());
    }

    #[async_std::test]
    async fn replace_overwrites_and_merge_unions() {
        let store = MemoryStore::new();
        let id = "http://localhost/person/john";

        store.replace_graph(id, vec![triple("a")].into_iter().collect()).await.unwrap();
        store.merge_graph(id, vec![triple("b")].into_iter().collect()).await.unwrap();
        assert_eq!(store.fetch_graph(id).await.unwrap().len(), 2);

        store.replace_graph(id, vec![triple("c")].into_iter().collect()).await.unwrap();
        assert_eq!(
            store.fetch_graph(id).await.unwrap(),
            vec![triple("c")].into_iter().collect::<Graph>()
        );
    }

    #[async_std::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        let id = "http://localhost/person/john";

        store.merge_graph(id, vec![triple("a")].into_iter().collect()).await.unwrap();
        store.delete_graph(id).await.unwrap();
        store.delete_graph(id).await.unwrap();

        assert!(store.is_empty().await);
    }

    #[async_std::test]
    async fn arc_stores_are_stores() {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn GraphStore> = store.clone();

        shared
            .merge_graph("http://localhost/person/john", vec![triple("a")].into_iter().collect())
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn backend_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = StoreError::backend(io);

        assert_eq!(err.to_string(), "store failure: reset");
        assert!(err.source().is_some());
    }
}
