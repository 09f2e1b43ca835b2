//! Read and write JSON-LD documents as named graphs in an RDF store.
//!
//! A `Jsonify` engine expands documents to triples on the way in and
//! compacts graphs back to documents on the way out. Contexts are routed to
//! identifiers through a `ContextRegistry`, and `CachedJsonify` puts a read
//! cache in front of an engine.

mod compact;
mod context;
mod expand;
pub mod rdf;

mod api;
pub use api::{compact, expand, ConversionError, JsonLdOptions};

mod cached;
mod jsonify;
mod registry;
mod store;

pub use cached::{CachedJsonify, Lookup};
pub use jsonify::{graph_name, Jsonify, JsonifyError, Request};
pub use rdf::{Graph, Object, Triple};
pub use registry::{ContextRegistry, Matcher};
pub use store::{GraphStore, MemoryStore, StoreError, StoreFuture};

pub mod error {
    pub use crate::api::ConversionError;
    pub use crate::compact::CompactionError;
    pub use crate::context::{ContextCreationError, TermCreationError};
    pub use crate::expand::ExpansionError;
    pub use crate::jsonify::JsonifyError;
    pub use crate::store::StoreError;
}
