//! Compaction of a triple set back into a JSON-LD document.

use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt;

use crate::context::{Context, ContextCreationError, Term};
use crate::rdf::{
    is_blank, Graph, Object, RDF_LANG_STRING, RDF_TYPE, XSD_BOOLEAN, XSD_DOUBLE, XSD_INTEGER,
    XSD_STRING,
};

#[derive(Debug)]
/// Errors that might occur when compacting triples into a document.
pub enum CompactionError {
    /// An error occured parsing the context to use when compacting.
    ContextError(ContextCreationError),
}

impl fmt::Display for CompactionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CompactionError::ContextError(ref err) => write!(f, "error parsing the context: {}", err),
        }
    }
}

impl Error for CompactionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            CompactionError::ContextError(ref err) => Some(err),
        }
    }
}

type Properties<'a> = BTreeMap<&'a str, Vec<&'a Object>>;

struct Compactor<'a> {
    ctx: &'a Context,
    nodes: BTreeMap<&'a str, Properties<'a>>,

    /// How often each subject is used as an object (outside of `@type`).
    references: HashMap<&'a str, usize>,
    emitted: HashSet<&'a str>,
    compact_arrays: bool,
}

impl<'a> Compactor<'a> {
    fn new(ctx: &'a Context, graph: &'a Graph, compact_arrays: bool) -> Compactor<'a> {
        let mut nodes: BTreeMap<&'a str, Properties<'a>> = BTreeMap::new();
        for triple in graph {
            nodes
                .entry(triple.subject.as_str())
                .or_insert_with(BTreeMap::new)
                .entry(triple.predicate.as_str())
                .or_insert_with(Vec::new)
                .push(&triple.object);
        }

        let mut references = HashMap::new();
        for triple in graph {
            if triple.predicate == RDF_TYPE {
                continue;
            }

            if let Object::Id(ref id) = triple.object {
                if nodes.contains_key(id.as_str()) && id != &triple.subject {
                    *references.entry(id.as_str()).or_insert(0) += 1;
                }
            }
        }

        Compactor {
            ctx,
            nodes,
            references,
            emitted: HashSet::new(),
            compact_arrays,
        }
    }

    fn reference_count(&self, id: &str) -> usize {
        self.references.get(id).cloned().unwrap_or(0)
    }

    fn embeddable(&self, id: &str) -> bool {
        self.nodes.contains_key(id) && !self.emitted.contains(id) && self.reference_count(id) == 1
    }

    fn includes_id(&self, id: &str) -> bool {
        !is_blank(id) || self.reference_count(id) > 1
    }

    fn wrap(&self, mut values: Vec<Value>) -> Value {
        if self.compact_arrays && values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        }
    }

    fn node(&mut self, subject: &'a str) -> Map<String, Value> {
        self.emitted.insert(subject);

        let mut result = Map::new();
        if self.includes_id(subject) {
            result.insert("@id".to_owned(), Value::String(subject.to_owned()));
        }

        let properties: Vec<(&'a str, Vec<&'a Object>)> = match self.nodes.get(subject) {
            Some(properties) => properties.iter().map(|(p, o)| (*p, o.clone())).collect(),
            None => Vec::new(),
        };

        for (predicate, objects) in properties {
            if predicate == RDF_TYPE && objects.iter().all(|o| o.as_id().is_some()) {
                let types = objects
                    .iter()
                    .filter_map(|o| o.as_id())
                    .map(|id| Value::String(self.ctx.compact_iri(id, true)))
                    .collect();
                result.insert("@type".to_owned(), self.wrap(types));
                continue;
            }

            let (key, term) = self.select_term(predicate, &objects);
            let values = objects
                .into_iter()
                .map(|object| self.value(object, term.as_ref()))
                .collect();
            result.insert(key, self.wrap(values));
        }

        result
    }

    /// Picks the key for `predicate`: a term whose coercion fits every value,
    /// then a plain term, then whatever IRI compaction gives.
    fn select_term(&self, predicate: &str, objects: &[&Object]) -> (String, Option<Term>) {
        let mut plain = None;

        for (name, term) in self.ctx.terms_for(predicate) {
            if term.type_mapping.is_none() && term.language_mapping.is_none() {
                if plain.is_none() {
                    plain = Some((name.to_owned(), term.clone()));
                }
                continue;
            }

            if objects.iter().all(|object| coercion_fits(term, object)) {
                return (name.to_owned(), Some(term.clone()));
            }
        }

        match plain {
            Some((name, term)) => (name, Some(term)),
            None => (self.ctx.compact_iri(predicate, true), None),
        }
    }

    fn value(&mut self, object: &'a Object, term: Option<&Term>) -> Value {
        let type_mapping = term.and_then(|t| t.type_mapping.as_ref()).map(|s| s.as_str());

        match object {
            Object::Id(id) => match type_mapping {
                Some("@id") => Value::String(id.to_owned()),
                Some("@vocab") => Value::String(self.ctx.compact_iri(id, true)),
                _ => {
                    if self.embeddable(id) {
                        Value::Object(self.node(id.as_str()))
                    } else {
                        let mut reference = Map::new();
                        reference.insert("@id".to_owned(), Value::String(id.to_owned()));
                        Value::Object(reference)
                    }
                }
            },

            Object::Literal {
                value,
                datatype,
                language,
            } => {
                if let Some(term) = term {
                    if coercion_fits(term, object)
                        && (term.type_mapping.is_some() || term.language_mapping.is_some())
                    {
                        return Value::String(value.to_owned());
                    }
                }

                self.literal(value, datatype, language.as_ref(), term)
            }
        }
    }

    fn literal(&self, value: &str, datatype: &str, language: Option<&String>, term: Option<&Term>) -> Value {
        let default_language = match term.and_then(|t| t.language_mapping.as_ref()) {
            Some(language) => language.as_ref(),
            None => self.ctx.language.as_ref(),
        };

        let native = match datatype {
            XSD_STRING if default_language.is_none() => Some(Value::String(value.to_owned())),
            XSD_BOOLEAN => match value {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            XSD_INTEGER => value.parse::<i64>().ok().map(Value::from),
            XSD_DOUBLE => value
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            RDF_LANG_STRING if language.is_some() && language == default_language => {
                Some(Value::String(value.to_owned()))
            }
            _ => None,
        };

        if let Some(native) = native {
            return native;
        }

        let mut obj = Map::new();
        obj.insert("@value".to_owned(), Value::String(value.to_owned()));

        if datatype == RDF_LANG_STRING {
            if let Some(language) = language {
                obj.insert("@language".to_owned(), Value::String(language.to_owned()));
            }
        } else if datatype != XSD_STRING {
            obj.insert(
                "@type".to_owned(),
                Value::String(self.ctx.compact_iri(datatype, true)),
            );
        }

        Value::Object(obj)
    }
}

fn coercion_fits(term: &Term, object: &Object) -> bool {
    match (term.type_mapping.as_ref().map(|s| s.as_str()), object) {
        (Some("@id"), Object::Id(_)) | (Some("@vocab"), Object::Id(_)) => true,
        (Some("@id"), _) | (Some("@vocab"), _) => false,
        (Some(mapping), Object::Literal { datatype, language, .. }) => {
            mapping == datatype && language.is_none()
        }
        (Some(_), Object::Id(_)) => false,
        (None, Object::Literal { datatype, language, .. }) => match &term.language_mapping {
            Some(Some(mapping)) => datatype == RDF_LANG_STRING && language.as_ref() == Some(mapping),
            Some(None) => datatype == XSD_STRING,
            None => true,
        },
        (None, Object::Id(_)) => term.language_mapping.is_none(),
    }
}

/// Compacts `graph` into a document about `root`.
///
/// The document carries `context` (when given) as its `@context` and `root`
/// as its `@id`. If everything in the graph hangs off `root` the root node's
/// properties are inlined; otherwise the top-level nodes go in `@graph`.
pub fn compact<'a>(
    active_context: &'a Context,
    context: Option<&Value>,
    graph: &'a Graph,
    root: &'a str,
    compact_arrays: bool,
) -> Value {
    let mut compactor = Compactor::new(active_context, graph, compact_arrays);
    let mut top_level = Vec::new();

    let root_has_triples = compactor.nodes.contains_key(root);
    if root_has_triples {
        top_level.push(compactor.node(root));
    }

    let subjects: Vec<&'a str> = compactor.nodes.keys().cloned().collect();
    for &subject in &subjects {
        if !compactor.emitted.contains(subject) && compactor.reference_count(subject) != 1 {
            top_level.push(compactor.node(subject));
        }
    }

    // anything left is only reachable through a cycle or a coerced @id
    for &subject in &subjects {
        if !compactor.emitted.contains(subject) {
            top_level.push(compactor.node(subject));
        }
    }

    let mut result = Map::new();
    if let Some(context) = context {
        if !context.is_null() {
            result.insert("@context".to_owned(), context.clone());
        }
    }

    if root_has_triples && top_level.len() == 1 {
        for (key, value) in top_level.remove(0) {
            result.insert(key, value);
        }
    } else {
        result.insert("@id".to_owned(), Value::String(root.to_owned()));
        if !top_level.is_empty() {
            result.insert(
                "@graph".to_owned(),
                Value::Array(top_level.into_iter().map(Value::Object).collect()),
            );
        }
    }

    Value::Object(result)
}
