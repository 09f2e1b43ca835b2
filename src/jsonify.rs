//! Reading and writing JSON-LD documents as named graphs.

use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::api::{self, ConversionError, JsonLdOptions};
use crate::context::{Context, ContextCreationError};
use crate::expand::ExpansionError;
use crate::rdf::{is_blank, Graph, UuidBlankNodes};
use crate::registry::{ContextRegistry, Matcher};
use crate::store::{GraphStore, StoreError};

#[derive(Debug)]
pub enum JsonifyError {
    /// No context could be found for the identifier, and the document
    /// needs one.
    ContextResolution(String),

    /// The graph to write to or delete could not be worked out.
    TargetResolution(String),

    /// A document could not be translated to triples, or back.
    Conversion(ConversionError),

    /// The graph store failed.
    Store(StoreError),
}

impl fmt::Display for JsonifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            JsonifyError::ContextResolution(ref id) => write!(f, "no context found for {}", id),
            JsonifyError::TargetResolution(ref reason) => {
                write!(f, "cannot determine target graph: {}", reason)
            }
            JsonifyError::Conversion(ref err) => write!(f, "{}", err),
            JsonifyError::Store(ref err) => write!(f, "{}", err),
        }
    }
}

impl Error for JsonifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            JsonifyError::Conversion(ref err) => Some(err),
            JsonifyError::Store(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConversionError> for JsonifyError {
    fn from(err: ConversionError) -> Self {
        JsonifyError::Conversion(err)
    }
}

impl From<StoreError> for JsonifyError {
    fn from(err: StoreError) -> Self {
        JsonifyError::Store(err)
    }
}

/// The graph a document identifier lives in: the identifier without its
/// fragment, so `http://localhost/blog#post` is stored in
/// `http://localhost/blog`.
pub fn graph_name(id: &str) -> &str {
    match id.find('#') {
        Some(idx) => &id[..idx],
        None => id,
    }
}

fn check_absolute(id: &str) -> Result<(), JsonifyError> {
    Url::parse(id)
        .map(|_| ())
        .map_err(|err| JsonifyError::TargetResolution(format!("{} is not an absolute IRI ({})", id, err)))
}

fn context_error(err: ContextCreationError) -> JsonifyError {
    JsonifyError::Conversion(ExpansionError::ContextExpansionError(err).into())
}

/// What to write (or delete): an optional explicit identifier, an optional
/// context that applies to every document, and the documents themselves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    pub id: Option<String>,
    pub context: Option<Value>,
    pub documents: Vec<Value>,
}

impl Request {
    pub fn new() -> Request {
        Request::default()
    }

    /// A single document stored under `id`, whatever its own `@id` says.
    pub fn with_id<S: Into<String>>(id: S, document: Value) -> Request {
        Request {
            id: Some(id.into()),
            context: None,
            documents: vec![document],
        }
    }

    pub fn id<S: Into<String>>(mut self, id: S) -> Request {
        self.id = Some(id.into());
        self
    }

    pub fn context(mut self, context: Value) -> Request {
        self.context = Some(context);
        self
    }

    pub fn document(mut self, document: Value) -> Request {
        self.documents.push(document);
        self
    }

    /// Works out which graph the request addresses, with default options.
    /// See `target_with`.
    pub fn target(&self) -> Result<String, JsonifyError> {
        self.target_with(&JsonLdOptions::default())
    }

    /// Works out which graph the request addresses: the explicit identifier
    /// as given, or else the graph every document's expanded `@id` lives in.
    ///
    /// Only document identifiers lose their fragment. `delete` of
    /// `http://localhost/blog#post` removes a graph by that exact name,
    /// while deleting a document whose `@id` is `http://localhost/blog#post`
    /// removes `http://localhost/blog`.
    pub fn target_with(&self, options: &JsonLdOptions) -> Result<String, JsonifyError> {
        let ids = self.document_ids(options)?;
        self.target_of(&ids)
    }

    fn target_of(&self, ids: &[Option<String>]) -> Result<String, JsonifyError> {
        if let Some(id) = &self.id {
            check_absolute(id)?;
            return Ok(id.to_owned());
        }

        let mut target: Option<&str> = None;
        for id in ids.iter().filter_map(Option::as_ref) {
            let name = graph_name(id);
            match target {
                None => target = Some(name),
                Some(existing) if existing == name => {}
                Some(existing) => {
                    return Err(JsonifyError::TargetResolution(format!(
                        "documents address both {} and {}",
                        existing, name
                    )))
                }
            }
        }

        match target {
            Some(target) => {
                check_absolute(target)?;
                Ok(target.to_owned())
            }
            None => Err(JsonifyError::TargetResolution(
                "no identifier given and no document has an @id".to_owned(),
            )),
        }
    }

    /// The expanded `@id` of every document, in order. Each is read with the
    /// request context and the document's own `@context` on top of it, so
    /// compact IRIs, `@base`-relative identifiers and `@id` aliases resolve
    /// the way they do when the document is expanded.
    fn document_ids(&self, options: &JsonLdOptions) -> Result<Vec<Option<String>>, JsonifyError> {
        let base = api::active_context(self.context.as_ref(), self.id.as_deref(), options)
            .map_err(context_error)?;

        self.documents
            .iter()
            .map(|document| document_id(&base, document))
            .collect()
    }
}

fn document_id(base: &Context, document: &Value) -> Result<Option<String>, JsonifyError> {
    let map = match document {
        Value::Object(map) => map,
        _ => return Ok(None),
    };

    let scoped;
    let ctx = match map.get("@context") {
        Some(local_context) => {
            let mut inner = base.clone();
            inner.process_context(local_context).map_err(context_error)?;
            scoped = inner;
            &scoped
        }
        None => base,
    };

    let id = map
        .iter()
        .find(|(key, _)| ctx.expand_iri(key, false, true).as_deref() == Some("@id"))
        .and_then(|(_, value)| value.as_str());

    match id {
        None => Ok(None),
        Some(id) if is_blank(id) => Ok(None),
        Some(id) => match ctx.expand_iri(id, true, false) {
            Some(expanded) => Ok(Some(expanded)),
            None => Err(JsonifyError::TargetResolution(format!(
                "{} is not an absolute IRI",
                id
            ))),
        },
    }
}

impl From<&str> for Request {
    fn from(id: &str) -> Self {
        Request::new().id(id)
    }
}

impl From<String> for Request {
    fn from(id: String) -> Self {
        Request::new().id(id)
    }
}

impl From<Value> for Request {
    /// One document, or each member of a top-level array.
    fn from(document: Value) -> Self {
        match document {
            Value::Array(documents) => documents.into(),
            document => Request::new().document(document),
        }
    }
}

impl From<Vec<Value>> for Request {
    fn from(documents: Vec<Value>) -> Self {
        Request {
            documents,
            ..Request::default()
        }
    }
}

/// Maps JSON-LD documents onto named graphs in a `GraphStore`.
///
/// Contexts can be passed explicitly, carried by the documents, or looked up
/// in the engine's own `ContextRegistry` by identifier.
pub struct Jsonify<S: GraphStore + ?Sized> {
    store: Arc<S>,
    registry: ContextRegistry,
    options: JsonLdOptions,
}

impl<S: GraphStore + ?Sized> Jsonify<S> {
    pub fn new(store: Arc<S>) -> Jsonify<S> {
        Jsonify::with_registry(store, ContextRegistry::new())
    }

    pub fn with_registry(store: Arc<S>, registry: ContextRegistry) -> Jsonify<S> {
        Jsonify {
            store,
            registry,
            options: JsonLdOptions::default(),
        }
    }

    pub fn with_options(mut self, options: JsonLdOptions) -> Jsonify<S> {
        self.options = options;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// See `ContextRegistry::add_context`: first registered match wins.
    pub fn add_context<M: Into<Matcher>>(&self, matcher: M, context: Value) {
        self.registry.add_context(matcher, context)
    }

    pub fn resolve_context(&self, id: &str) -> Option<Value> {
        self.registry.resolve_context(id)
    }

    /// Fetches the graph `id` and compacts it with `context`, or the
    /// registered context for `id`. Without either the document comes back
    /// with absolute IRIs as keys. An absent graph gives a document with only
    /// `@context` and `@id`.
    pub async fn get(&self, id: &str, context: Option<&Value>) -> Result<Value, JsonifyError> {
        let context = match context {
            Some(context) => Some(context.clone()),
            None => self.registry.resolve_context(id),
        };

        let graph = self.store.fetch_graph(id).await?;
        debug!(%id, triples = graph.len(), contextual = context.is_some(), "get");

        Ok(api::compact(&graph, context.as_ref(), id, &self.options)?)
    }

    /// Replaces the target graph with the triples of every document.
    pub async fn put<R: Into<Request>>(&self, request: R) -> Result<(), JsonifyError> {
        let request: Request = request.into();
        let (target, graph) = self.expand_request(&request)?;
        debug!(graph = %target, triples = graph.len(), documents = request.documents.len(), "put");

        Ok(self.store.replace_graph(&target, graph).await?)
    }

    /// Adds the triples of every document to the target graph, keeping what
    /// is already there.
    pub async fn patch<R: Into<Request>>(&self, request: R) -> Result<(), JsonifyError> {
        let request: Request = request.into();
        let (target, graph) = self.expand_request(&request)?;
        debug!(graph = %target, triples = graph.len(), documents = request.documents.len(), "patch");

        Ok(self.store.merge_graph(&target, graph).await?)
    }

    /// Removes the target graph. Documents in the request only serve to name
    /// it.
    pub async fn delete<R: Into<Request>>(&self, request: R) -> Result<(), JsonifyError> {
        let request: Request = request.into();
        let target = request.target_with(&self.options)?;
        debug!(graph = %target, "delete");

        Ok(self.store.delete_graph(&target).await?)
    }

    /// The context a document is expanded with, if it doesn't carry its own.
    fn document_context(&self, request: &Request, id: Option<&str>, target: &str) -> Option<Value> {
        request
            .context
            .clone()
            .or_else(|| id.and_then(|id| self.registry.resolve_context(id)))
            .or_else(|| self.registry.resolve_context(target))
    }

    fn expand_request(&self, request: &Request) -> Result<(String, Graph), JsonifyError> {
        let ids = request.document_ids(&self.options)?;
        let target = request.target_of(&ids)?;
        let mut generator = UuidBlankNodes::new();
        let mut graph = Graph::new();

        for (document, id) in request.documents.iter().zip(&ids) {
            let id = id.as_deref();
            let own_context = document.get("@context").is_some();
            let context = if own_context {
                None
            } else {
                self.document_context(request, id, &target)
            };

            match api::expand(document, context.as_ref(), Some(&target), &self.options, &mut generator) {
                Ok(triples) => graph.merge(triples),
                Err(ConversionError::Expansion(ExpansionError::UnresolvedTerm(_)))
                    if !own_context && context.is_none() =>
                {
                    let id = id.unwrap_or(&target);
                    return Err(JsonifyError::ContextResolution(id.to_owned()));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok((target, graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_identifier_wins() {
        let request = Request::with_id(
            "http://localhost/person/john",
            json!({ "@id": "http://localhost/person/jane" }),
        );

        assert_eq!(request.target().unwrap(), "http://localhost/person/john");
    }

    #[test]
    fn documents_share_a_graph_by_fragment() {
        let request: Request = vec![
            json!({ "@id": "http://localhost/blog#post" }),
            json!({ "@id": "http://localhost/blog#comment" }),
            json!({ "headline": "no id" }),
        ]
        .into();

        assert_eq!(request.target().unwrap(), "http://localhost/blog");
    }

    #[test]
    fn disagreeing_documents_are_rejected() {
        let request: Request = vec![
            json!({ "@id": "http://localhost/blog#post" }),
            json!({ "@id": "http://localhost/person/john" }),
        ]
        .into();

        match request.target() {
            Err(JsonifyError::TargetResolution(_)) => {}
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn missing_and_relative_identifiers_are_rejected() {
        let anonymous: Request = json!({ "givenName": "John" }).into();
        let relative: Request = json!({ "@id": "john" }).into();

        assert!(matches!(anonymous.target(), Err(JsonifyError::TargetResolution(_))));
        assert!(matches!(relative.target(), Err(JsonifyError::TargetResolution(_))));
    }

    #[test]
    fn identifiers_and_arrays_convert_into_requests() {
        let by_id: Request = "http://localhost/person/john".into();
        assert_eq!(by_id.id.as_deref(), Some("http://localhost/person/john"));
        assert!(by_id.documents.is_empty());

        let many: Request = json!([{ "@id": "http://a/#1" }, { "@id": "http://a/#2" }]).into();
        assert_eq!(many.documents.len(), 2);
    }

    #[test]
    fn document_ids_are_expanded_before_naming_the_graph() {
        let compact: Request = json!({
            "@context": { "blog": "http://localhost/blog#" },
            "@id": "blog:post"
        })
        .into();
        let aliased: Request = json!({ "@context": { "id": "@id" }, "id": "http://localhost/blog#post" }).into();
        let relative = Request::new()
            .context(json!({ "@base": "http://localhost/" }))
            .document(json!({ "@id": "blog#comment" }));

        assert_eq!(compact.target().unwrap(), "http://localhost/blog");
        assert_eq!(aliased.target().unwrap(), "http://localhost/blog");
        assert_eq!(relative.target().unwrap(), "http://localhost/blog");
    }

    #[test]
    fn options_base_resolves_relative_ids() {
        let request: Request = json!({ "@id": "john" }).into();
        let options = JsonLdOptions {
            base: Some("http://localhost/person/".to_owned()),
            ..JsonLdOptions::default()
        };

        assert_eq!(request.target_with(&options).unwrap(), "http://localhost/person/john");
    }

    #[test]
    fn graph_names_drop_the_fragment() {
        assert_eq!(graph_name("http://localhost/blog#post"), "http://localhost/blog");
        assert_eq!(graph_name("http://localhost/person/john"), "http://localhost/person/john");
    }
}
