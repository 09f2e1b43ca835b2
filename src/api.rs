use serde_json::Value;
use std::error::Error;
use std::fmt;

use crate::compact::CompactionError;
use crate::context::Context;
use crate::expand::ExpansionError;
use crate::rdf::{BlankNodeGenerator, Graph};

/// Options that may be passed to either `compact` or `expand`.
#[derive(Clone, Debug, Default)]
pub struct JsonLdOptions {
    /// The base IRI of the document. Used to resolve relative references.
    /// Defaults to the identifier of the graph being read or written.
    pub base: Option<String>,

    /// When compacting, if single-element arrays should be unpacked.
    pub compact_arrays: Option<bool>,
}

#[derive(Debug)]
/// A document could not be translated to triples, or back.
pub enum ConversionError {
    Expansion(ExpansionError),
    Compaction(CompactionError),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConversionError::Expansion(ref err) => write!(f, "expansion failed: {}", err),
            ConversionError::Compaction(ref err) => write!(f, "compaction failed: {}", err),
        }
    }
}

impl Error for ConversionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            ConversionError::Expansion(ref err) => Some(err),
            ConversionError::Compaction(ref err) => Some(err),
        }
    }
}

impl From<ExpansionError> for ConversionError {
    fn from(err: ExpansionError) -> Self {
        ConversionError::Expansion(err)
    }
}

impl From<CompactionError> for ConversionError {
    fn from(err: CompactionError) -> Self {
        ConversionError::Compaction(err)
    }
}

/// Takes a context value, pulls out the relevant @context value if it is
/// wrapped in a document.
fn unwrap_context(context: &Value) -> &Value {
    match context {
        Value::Object(ref val) => val.get("@context").unwrap_or(context),
        _ => context,
    }
}

pub(crate) fn active_context(
    context: Option<&Value>,
    root: Option<&str>,
    options: &JsonLdOptions,
) -> Result<Context, crate::context::ContextCreationError> {
    let mut ctx = Context::with_base(options.base.as_ref().map(|f| f as &str).or(root));

    if let Some(context) = context {
        ctx.process_context(unwrap_context(context))?;
    }

    Ok(ctx)
}

/// Expands a JSON-LD document into the triples it asserts.
///
/// `context` is applied first and the document's own `@context` on top of
/// it. Top-level nodes without an `@id` are about `root`.
pub fn expand<G: BlankNodeGenerator>(
    document: &Value,
    context: Option<&Value>,
    root: Option<&str>,
    options: &JsonLdOptions,
    generator: &mut G,
) -> Result<Graph, ConversionError> {
    let ctx = active_context(context, root, options)
        .map_err(ExpansionError::ContextExpansionError)?;

    Ok(crate::expand::expand(&ctx, document, root, generator)?)
}

/// Compacts a graph into a document about `root`, carrying `context` as its
/// `@context`.
pub fn compact(
    graph: &Graph,
    context: Option<&Value>,
    root: &str,
    options: &JsonLdOptions,
) -> Result<Value, ConversionError> {
    let ctx = active_context(context, Some(root), options).map_err(CompactionError::ContextError)?;
    let context = context.map(unwrap_context);

    Ok(crate::compact::compact(
        &ctx,
        context,
        graph,
        root,
        options.compact_arrays.unwrap_or(true),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::UuidBlankNodes;
    use serde_json::json;

    #[test]
    fn person_survives_a_round_trip() {
        let context = json!({ "@vocab": "http://schema.org/" });
        let document = json!({
            "@context": { "@vocab": "http://schema.org/" },
            "@id": "http://localhost/person/john",
            "familyName": "Doe",
            "givenName": "John"
        });
        let options = JsonLdOptions::default();

        let graph = expand(&document, None, None, &options, &mut UuidBlankNodes::new()).unwrap();
        assert_eq!(graph.len(), 2);

        let back = compact(&graph, Some(&context), "http://localhost/person/john", &options).unwrap();
        assert_eq!(back, document);
    }

    #[test]
    fn wrapped_contexts_are_unwrapped() {
        let wrapped = json!({ "@context": { "@vocab": "http://schema.org/" } });
        let document = json!({ "@id": "http://localhost/person/john", "givenName": "John" });
        let options = JsonLdOptions::default();

        let graph = expand(&document, Some(&wrapped), None, &options, &mut UuidBlankNodes::new())
            .unwrap();
        let back = compact(&graph, Some(&wrapped), "http://localhost/person/john", &options).unwrap();

        assert_eq!(back["@context"], json!({ "@vocab": "http://schema.org/" }));
        assert_eq!(back["givenName"], "John");
    }

    #[test]
    fn relative_ids_resolve_against_the_root() {
        let context = json!({ "@vocab": "http://schema.org/" });
        let document = json!({ "@id": "#post", "headline": "Headline" });

        let graph = expand(
            &document,
            Some(&context),
            Some("http://localhost/blog"),
            &JsonLdOptions::default(),
            &mut UuidBlankNodes::new(),
        )
        .unwrap();

        assert_eq!(
            graph.iter().next().map(|t| t.subject.as_str()),
            Some("http://localhost/blog#post")
        );
    }

    #[test]
    fn arrays_can_stay_arrays() {
        let context = json!({ "@vocab": "http://schema.org/" });
        let document = json!({ "@id": "http://localhost/person/john", "givenName": "John" });
        let options = JsonLdOptions {
            compact_arrays: Some(false),
            ..JsonLdOptions::default()
        };

        let graph = expand(&document, Some(&context), None, &options, &mut UuidBlankNodes::new())
            .unwrap();
        let back = compact(&graph, Some(&context), "http://localhost/person/john", &options).unwrap();

        assert_eq!(back["givenName"], json!(["John"]));
    }

    #[test]
    fn bad_contexts_are_conversion_errors() {
        let err = compact(
            &Graph::new(),
            Some(&json!({ "@vocab": 5 })),
            "http://localhost/person/john",
            &JsonLdOptions::default(),
        )
        .unwrap_err();

        match err {
            ConversionError::Compaction(CompactionError::ContextError(_)) => {}
            other => panic!("unexpected error {:?}", other),
        }
    }
}
