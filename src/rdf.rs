//! Stuff that has to do with RDF graphs.
//!
//! This library defines its own structs for RDF triples, which is what
//! JSON-LD documents get expanded into and compacted from.

use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::{BTreeSet, HashMap};
use std::iter::FromIterator;
use uuid::Uuid;

/// `rdf:type`, the predicate `@type` expands to.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Datatype of language-tagged strings.
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The object position of a triple, which is either an ID reference or a literal.
pub enum Object {
    /// An IRI or blank node reference.
    Id(String),

    /// A literal, which consists of a lexical value, a datatype, and optionally a language.
    Literal {
        value: String,
        datatype: String,
        language: Option<String>,
    },
}

impl Object {
    /// A plain `xsd:string` literal.
    pub fn string<S: Into<String>>(value: S) -> Object {
        Object::typed(value, XSD_STRING)
    }

    /// A literal with the given datatype and no language.
    pub fn typed<S: Into<String>, T: Into<String>>(value: S, datatype: T) -> Object {
        Object::Literal {
            value: value.into(),
            datatype: datatype.into(),
            language: None,
        }
    }

    /// A language-tagged string.
    pub fn lang_string<S: Into<String>, L: Into<String>>(value: S, language: L) -> Object {
        Object::Literal {
            value: value.into(),
            datatype: RDF_LANG_STRING.to_owned(),
            language: Some(language.into()),
        }
    }

    pub fn as_id(&self) -> Option<&str> {
        match self {
            Object::Id(id) => Some(id),
            Object::Literal { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// A single triple, consisting of a subject, predicate, and object.
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
}

impl Triple {
    pub fn new<S: Into<String>, P: Into<String>>(subject: S, predicate: P, object: Object) -> Triple {
        Triple {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

/// Returns true if the identifier is a blank node label.
pub fn is_blank(id: &str) -> bool {
    id.starts_with("_:")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
/// An unordered set of triples. Iteration order is the triples' sort order,
/// which keeps compaction output stable.
pub struct Graph {
    triples: BTreeSet<Triple>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph::default()
    }

    /// Adds a triple, returning false if it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Set-union of `other` into this graph.
    pub fn merge(&mut self, other: Graph) {
        self.triples.extend(other.triples);
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Triple> {
        self.triples.iter()
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Graph {
        Graph {
            triples: iter.into_iter().collect(),
        }
    }
}

impl Extend<Triple> for Graph {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        self.triples.extend(iter)
    }
}

impl IntoIterator for Graph {
    type Item = Triple;
    type IntoIter = btree_set::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Triple;
    type IntoIter = btree_set::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}

/// Trait used to generate blank nodes during expansion.
pub trait BlankNodeGenerator {
    /// Generate a new blank node. If `id` is Some, this method
    /// should return the same `String`, based on the `id`.
    fn generate_blank_node(&mut self, id: Option<&str>) -> String;
}

/// Generates globally unique blank node labels, so triples expanded by one
/// request never collide with blank nodes already held in a store.
#[derive(Debug, Default)]
pub struct UuidBlankNodes {
    issued: HashMap<String, String>,
}

impl UuidBlankNodes {
    pub fn new() -> UuidBlankNodes {
        UuidBlankNodes::default()
    }
}

impl BlankNodeGenerator for UuidBlankNodes {
    fn generate_blank_node(&mut self, id: Option<&str>) -> String {
        let fresh = || format!("_:b{}", Uuid::new_v4().simple());

        match id {
            Some(id) => self
                .issued
                .entry(id.to_owned())
                .or_insert_with(fresh)
                .clone(),
            None => fresh(),
        }
    }
}
