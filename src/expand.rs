//! Expansion of JSON-LD documents straight into triples.
//!
//! This folds expansion, node map generation and RDF serialization into one
//! pass over the document, since the only thing we ever want out of a
//! document is the set of triples it asserts.

use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;

use crate::context::{Context, ContextCreationError, Term};
use crate::rdf::{
    is_blank, BlankNodeGenerator, Graph, Object, Triple, RDF_TYPE, XSD_BOOLEAN, XSD_DOUBLE,
    XSD_INTEGER, XSD_STRING,
};

#[derive(Debug)]
/// Errors that might occur when expanding a JSON-LD document into triples.
pub enum ExpansionError {
    /// Processing an embedded `@context` failed.
    ContextExpansionError(ContextCreationError),

    /// The document is neither a node object nor an array of them.
    NotAnObject,

    /// `@id` is not a string, or cannot be made absolute.
    InvalidIdValue,

    /// `@type` is not a string or array of strings, or cannot be expanded.
    InvalidTypeValue,

    /// Value object contains invalid keys, or both `@type` and `@language`.
    InvalidValueObject,

    /// `@type` inside a value object is not a string.
    InvalidTypedValue,

    /// `@language` is not a string, or is set on a non-string value.
    InvalidLanguageTaggedString,

    /// A property name that neither the context nor IRI syntax can expand.
    UnresolvedTerm(String),

    /// A keyword this crate does not store, such as `@list` or `@reverse`.
    UnsupportedKeyword(String),
}

impl fmt::Display for ExpansionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ExpansionError::ContextExpansionError(ref err) => {
                write!(f, "context expansion error: {}", err)
            }
            ExpansionError::NotAnObject => f.write_str("document is not a JSON-LD node object"),
            ExpansionError::InvalidIdValue => f.write_str("invalid @id value"),
            ExpansionError::InvalidTypeValue => f.write_str("invalid @type value"),
            ExpansionError::InvalidValueObject => f.write_str("invalid value object"),
            ExpansionError::InvalidTypedValue => f.write_str("invalid typed value"),
            ExpansionError::InvalidLanguageTaggedString => {
                f.write_str("invalid language-tagged string")
            }
            ExpansionError::UnresolvedTerm(ref term) => {
                write!(f, "term {} does not expand to an IRI", term)
            }
            ExpansionError::UnsupportedKeyword(ref keyword) => {
                write!(f, "{} is not supported", keyword)
            }
        }
    }
}

impl Error for ExpansionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            ExpansionError::ContextExpansionError(ref err) => Some(err),
            _ => None,
        }
    }
}

struct Expander<'g, G: BlankNodeGenerator> {
    generator: &'g mut G,
    graph: Graph,
}

impl<'g, G: BlankNodeGenerator> Expander<'g, G> {
    fn expand_id(&mut self, ctx: &Context, id: &str) -> Result<String, ExpansionError> {
        if is_blank(id) {
            Ok(self.generator.generate_blank_node(Some(id)))
        } else {
            match ctx.expand_iri(id, true, false) {
                Some(ref iri) if !iri.starts_with('@') => Ok(iri.to_owned()),
                _ => Err(ExpansionError::InvalidIdValue),
            }
        }
    }

    fn expand_type(&mut self, ctx: &Context, typeval: &str) -> Result<String, ExpansionError> {
        if is_blank(typeval) {
            return Ok(self.generator.generate_blank_node(Some(typeval)));
        }

        match ctx.expand_iri(typeval, true, true) {
            Some(ref iri) if !iri.starts_with('@') => Ok(iri.to_owned()),
            _ => Err(ExpansionError::InvalidTypeValue),
        }
    }

    fn top_level(&mut self, ctx: &Context, elem: &Value, root: Option<&str>) -> Result<(), ExpansionError> {
        match elem {
            Value::Null => Ok(()),
            Value::Array(items) => {
                for item in items {
                    self.top_level(ctx, item, root)?;
                }

                Ok(())
            }
            Value::Object(map) => self.node(ctx, map, root).map(|_| ()),
            _ => Err(ExpansionError::NotAnObject),
        }
    }

    /// Expands a node object, returning its subject.
    fn node(
        &mut self,
        ctx: &Context,
        map: &Map<String, Value>,
        default_subject: Option<&str>,
    ) -> Result<String, ExpansionError> {
        let scoped;
        let ctx = match map.get("@context") {
            Some(local_context) => {
                let mut inner = ctx.clone();
                inner
                    .process_context(local_context)
                    .map_err(ExpansionError::ContextExpansionError)?;
                scoped = inner;
                &scoped
            }
            None => ctx,
        };

        let mut id = None;
        let mut types = Vec::new();
        let mut graph = None;
        let mut properties = Vec::new();

        for (key, value) in map {
            if key == "@context" {
                continue;
            }

            let prop = ctx
                .expand_iri(key, false, true)
                .ok_or_else(|| ExpansionError::UnresolvedTerm(key.to_owned()))?;

            if !prop.starts_with('@') {
                properties.push((key.as_str(), prop));
                continue;
            }

            match prop.as_str() {
                "@id" => match value {
                    Value::String(idval) => id = Some(idval.as_str()),
                    _ => return Err(ExpansionError::InvalidIdValue),
                },

                "@type" => match value {
                    Value::String(typeval) => types.push(typeval.as_str()),
                    Value::Array(typevals) => {
                        for typeval in typevals {
                            match typeval {
                                Value::String(typeval) => types.push(typeval.as_str()),
                                _ => return Err(ExpansionError::InvalidTypeValue),
                            }
                        }
                    }
                    _ => return Err(ExpansionError::InvalidTypeValue),
                },

                "@graph" => graph = Some(value),

                "@index" => {}

                "@value" | "@language" => return Err(ExpansionError::InvalidValueObject),

                other => return Err(ExpansionError::UnsupportedKeyword(other.to_owned())),
            }
        }

        let subject = match id {
            Some(id) => self.expand_id(ctx, id)?,
            None => match default_subject {
                Some(subject) => subject.to_owned(),
                None => self.generator.generate_blank_node(None),
            },
        };

        for typeval in types {
            let typeval = self.expand_type(ctx, typeval)?;
            self.graph
                .insert(Triple::new(subject.as_str(), RDF_TYPE, Object::Id(typeval)));
        }

        for (key, prop) in properties {
            let term = ctx.term(key);
            for object in self.value(ctx, term, &map[key])? {
                self.graph
                    .insert(Triple::new(subject.as_str(), prop.as_str(), object));
            }
        }

        if let Some(graph) = graph {
            match graph {
                Value::Array(items) => {
                    for item in items {
                        match item {
                            Value::Object(node) => {
                                self.node(ctx, node, None)?;
                            }
                            _ => return Err(ExpansionError::NotAnObject),
                        }
                    }
                }
                Value::Object(node) => {
                    self.node(ctx, node, None)?;
                }
                _ => return Err(ExpansionError::NotAnObject),
            }
        }

        Ok(subject)
    }

    /// Expands a property value into the objects it asserts.
    fn value(&mut self, ctx: &Context, term: Option<&Term>, elem: &Value) -> Result<Vec<Object>, ExpansionError> {
        let type_mapping = term.and_then(|t| t.type_mapping.as_ref());

        let object = match elem {
            Value::Null => return Ok(Vec::new()),

            Value::Array(items) => {
                let mut objects = Vec::new();
                for item in items {
                    objects.extend(self.value(ctx, term, item)?);
                }

                return Ok(objects);
            }

            Value::String(strval) => match type_mapping.map(|s| s.as_str()) {
                Some("@id") => Object::Id(self.expand_id(ctx, strval)?),
                Some("@vocab") => Object::Id(self.expand_type(ctx, strval)?),
                Some(datatype) => Object::typed(strval.as_str(), datatype),
                None => {
                    let language = match term.and_then(|t| t.language_mapping.as_ref()) {
                        Some(language) => language.as_ref(),
                        None => ctx.language.as_ref(),
                    };

                    match language {
                        Some(language) => Object::lang_string(strval.as_str(), language.as_str()),
                        None => Object::string(strval.as_str()),
                    }
                }
            },

            Value::Bool(boolval) => {
                let datatype = coerced_datatype(type_mapping).unwrap_or(XSD_BOOLEAN);
                Object::typed(boolval.to_string(), datatype)
            }

            Value::Number(numval) => {
                let datatype = coerced_datatype(type_mapping).unwrap_or(if numval.is_f64() {
                    XSD_DOUBLE
                } else {
                    XSD_INTEGER
                });
                Object::typed(numval.to_string(), datatype)
            }

            Value::Object(map) => {
                if map.contains_key("@value") {
                    match value_object(ctx, map)? {
                        Some(object) => object,
                        None => return Ok(Vec::new()),
                    }
                } else if let Some(set) = map.get("@set") {
                    return self.value(ctx, term, set);
                } else if map.contains_key("@list") {
                    return Err(ExpansionError::UnsupportedKeyword("@list".to_owned()));
                } else {
                    Object::Id(self.node(ctx, map, None)?)
                }
            }
        };

        Ok(vec![object])
    }
}

fn coerced_datatype(type_mapping: Option<&String>) -> Option<&str> {
    match type_mapping.map(|s| s.as_str()) {
        Some("@id") | Some("@vocab") | None => None,
        Some(datatype) => Some(datatype),
    }
}

/// Turns a value object into a literal. A null `@value` yields nothing.
fn value_object(ctx: &Context, map: &Map<String, Value>) -> Result<Option<Object>, ExpansionError> {
    let mut datatype = None;
    let mut language = None;

    for (key, value) in map {
        match key.as_str() {
            "@value" | "@index" => {}
            "@type" => match value {
                Value::String(typeval) => match ctx.expand_iri(typeval, true, true) {
                    Some(ref iri) if !iri.starts_with('@') => datatype = Some(iri.to_owned()),
                    _ => return Err(ExpansionError::InvalidTypedValue),
                },
                _ => return Err(ExpansionError::InvalidTypedValue),
            },
            "@language" => match value {
                Value::String(lang) => language = Some(lang.to_lowercase()),
                _ => return Err(ExpansionError::InvalidLanguageTaggedString),
            },
            _ => return Err(ExpansionError::InvalidValueObject),
        }
    }

    if datatype.is_some() && language.is_some() {
        return Err(ExpansionError::InvalidValueObject);
    }

    let (lexical, natural_type) = match &map["@value"] {
        Value::Null => return Ok(None),
        Value::String(strval) => (strval.to_owned(), XSD_STRING),
        Value::Bool(boolval) => (boolval.to_string(), XSD_BOOLEAN),
        Value::Number(numval) if numval.is_f64() => (numval.to_string(), XSD_DOUBLE),
        Value::Number(numval) => (numval.to_string(), XSD_INTEGER),
        _ => return Err(ExpansionError::InvalidValueObject),
    };

    Ok(Some(match (datatype, language) {
        (_, Some(language)) => {
            if natural_type != XSD_STRING {
                return Err(ExpansionError::InvalidLanguageTaggedString);
            }

            Object::lang_string(lexical, language)
        }
        (Some(datatype), None) => Object::typed(lexical, datatype),
        (None, None) => Object::typed(lexical, natural_type),
    }))
}

/// Expands `document` under `active_context` into the triples it asserts.
///
/// Top-level nodes without an `@id` take `root` as their subject; every
/// other anonymous node gets a blank node from `generator`. Members of
/// `@graph` end up in the same triple set.
pub fn expand<G: BlankNodeGenerator>(
    active_context: &Context,
    document: &Value,
    root: Option<&str>,
    generator: &mut G,
) -> Result<Graph, ExpansionError> {
    let mut expander = Expander {
        generator,
        graph: Graph::new(),
    };

    expander.top_level(active_context, document, root)?;

    Ok(expander.graph)
}
