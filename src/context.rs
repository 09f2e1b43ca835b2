//! Active context processing.
//!
//! Just enough of the JSON-LD context algorithms to expand and compact the
//! documents this crate stores: `@base`, `@vocab`, `@language`, prefixes,
//! and term definitions with `@id`, `@type` and `@language`. Remote contexts
//! are never fetched.

use lazy_static::lazy_static;
use serde_json::Map as JsonMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt;
use url::Url;

lazy_static! {
    static ref KEYWORDS: HashSet<&'static str> = vec![
        "@context",
        "@id",
        "@value",
        "@language",
        "@type",
        "@container",
        "@list",
        "@set",
        "@reverse",
        "@index",
        "@base",
        "@vocab",
        "@graph",
        "@nest",
        "@none",
        "@prefix",
        "@version",
        "@protected",
        "@propagate",
        "@import",
        "@included",
        "@json",
        "@direction",
    ]
    .into_iter()
    .collect();
}

pub(crate) fn is_keyword(val: &str) -> bool {
    KEYWORDS.contains(val)
}

/// Splits `prefix:suffix`, refusing things that are already absolute
/// (`http://...`) or blank node labels.
fn split_compact_iri(value: &str) -> Option<(&str, &str)> {
    let idx = value.find(':')?;
    let (prefix, suffix) = (&value[..idx], &value[idx + 1..]);

    if prefix == "_" || suffix.starts_with("//") {
        None
    } else {
        Some((prefix, suffix))
    }
}

#[derive(Debug)]
pub enum TermCreationError {
    CyclicIRIMapping(String),
    KeywordRedefinition(String),
    InvalidTermDefinition(String),
    InvalidIRIMapping(String),
    InvalidTypeMapping(String),
    InvalidLanguageMapping(String),
    InvalidContainerMapping(String),
    InvalidReverseProperty(String),
}

impl fmt::Display for TermCreationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TermCreationError::CyclicIRIMapping(term) => write!(f, "cyclic IRI mapping for {}", term),
            TermCreationError::KeywordRedefinition(term) => {
                write!(f, "keyword redefinition of {}", term)
            }
            TermCreationError::InvalidTermDefinition(term) => {
                write!(f, "invalid term definition for {}", term)
            }
            TermCreationError::InvalidIRIMapping(term) => write!(f, "invalid IRI mapping for {}", term),
            TermCreationError::InvalidTypeMapping(term) => {
                write!(f, "invalid type mapping for {}", term)
            }
            TermCreationError::InvalidLanguageMapping(term) => {
                write!(f, "invalid language mapping for {}", term)
            }
            TermCreationError::InvalidContainerMapping(term) => {
                write!(f, "unsupported container mapping for {}", term)
            }
            TermCreationError::InvalidReverseProperty(term) => {
                write!(f, "unsupported reverse property {}", term)
            }
        }
    }
}

impl Error for TermCreationError {}

#[derive(Debug)]
pub enum ContextCreationError {
    InvalidTerm(TermCreationError),
    RemoteContextUnsupported(String),
    InvalidBaseIRI,
    InvalidVocabMapping,
    InvalidLanguageMapping,
    InvalidLocalContext,
}

impl From<TermCreationError> for ContextCreationError {
    fn from(item: TermCreationError) -> Self {
        ContextCreationError::InvalidTerm(item)
    }
}

impl fmt::Display for ContextCreationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ContextCreationError::InvalidTerm(ref err) => write!(f, "invalid term: {}", err),
            ContextCreationError::RemoteContextUnsupported(ref url) => {
                write!(f, "remote context {} cannot be loaded", url)
            }
            ContextCreationError::InvalidBaseIRI => write!(f, "invalid base IRI"),
            ContextCreationError::InvalidVocabMapping => write!(f, "invalid vocab mapping"),
            ContextCreationError::InvalidLanguageMapping => write!(f, "invalid language mapping"),
            ContextCreationError::InvalidLocalContext => write!(f, "invalid local context"),
        }
    }
}

impl Error for ContextCreationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            ContextCreationError::InvalidTerm(ref err) => Some(err),
            _ => None,
        }
    }
}

enum DefineStatus {
    Defining,
    Defined,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Term {
    pub iri_mapping: String,

    /// `@id`, `@vocab`, or a datatype IRI.
    pub type_mapping: Option<String>,

    /// `Some(None)` when the definition resets the language to null.
    pub language_mapping: Option<Option<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct Context {
    pub base_iri: Option<Url>,
    pub(crate) vocabulary_mapping: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) terms: BTreeMap<String, Term>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// An empty context whose base IRI is `base`, if it parses.
    pub fn with_base(base: Option<&str>) -> Context {
        Context {
            base_iri: base.and_then(|url| Url::parse(url).ok()),
            ..Context::default()
        }
    }

    pub(crate) fn term(&self, name: &str) -> Option<&Term> {
        self.terms.get(name)
    }

    /// All terms whose IRI mapping is exactly `iri`.
    pub(crate) fn terms_for<'a>(&'a self, iri: &'a str) -> impl Iterator<Item = (&'a str, &'a Term)> {
        self.terms
            .iter()
            .filter(move |(_, term)| term.iri_mapping == iri)
            .map(|(name, term)| (name as &str, term))
    }

    /// Processes a local context (object, array of objects, or null) on top
    /// of this one.
    pub fn process_context(&mut self, local_context: &Value) -> Result<(), ContextCreationError> {
        let local_context = match local_context {
            Value::Array(a) => a.iter().collect(),
            _ => vec![local_context],
        };

        for context in local_context {
            match context {
                Value::Null => {
                    let base_iri = self.base_iri.take();
                    *self = Context::new();
                    self.base_iri = base_iri;
                }

                Value::String(url) => {
                    return Err(ContextCreationError::RemoteContextUnsupported(url.to_owned()))
                }

                Value::Object(ref map) => {
                    if let Some(base) = map.get("@base") {
                        match base {
                            Value::Null => self.base_iri = None,
                            Value::String(val) => {
                                let joined = match &self.base_iri {
                                    Some(iri) => iri.join(val),
                                    None => Url::parse(val),
                                };
                                self.base_iri =
                                    Some(joined.map_err(|_| ContextCreationError::InvalidBaseIRI)?);
                            }
                            _ => return Err(ContextCreationError::InvalidBaseIRI),
                        }
                    }

                    if let Some(vocab) = map.get("@vocab") {
                        match vocab {
                            Value::Null => self.vocabulary_mapping = None,
                            Value::String(data) => {
                                let expanded = self
                                    .expand_iri(data, true, true)
                                    .ok_or(ContextCreationError::InvalidVocabMapping)?;
                                self.vocabulary_mapping = Some(expanded);
                            }
                            _ => return Err(ContextCreationError::InvalidVocabMapping),
                        }
                    }

                    if let Some(language) = map.get("@language") {
                        match language {
                            Value::Null => self.language = None,
                            Value::String(data) => self.language = Some(data.to_lowercase()),
                            _ => return Err(ContextCreationError::InvalidLanguageMapping),
                        }
                    }

                    let mut defined: HashMap<String, DefineStatus> = HashMap::new();
                    for key in map.keys() {
                        match key as &str {
                            "@base" | "@vocab" | "@language" | "@version" | "@protected"
                            | "@propagate" => continue,
                            _ => self.create_term(map, key, &mut defined)?,
                        }
                    }
                }

                _ => return Err(ContextCreationError::InvalidLocalContext),
            }
        }

        Ok(())
    }

    fn create_term(
        &mut self,
        local_context: &JsonMap<String, Value>,
        term: &str,
        defined: &mut HashMap<String, DefineStatus>,
    ) -> Result<(), TermCreationError> {
        match defined.get(term) {
            Some(DefineStatus::Defined) => return Ok(()),
            Some(DefineStatus::Defining) => {
                return Err(TermCreationError::CyclicIRIMapping(term.to_owned()))
            }
            None => {}
        }

        if is_keyword(term) {
            return Err(TermCreationError::KeywordRedefinition(term.to_owned()));
        }

        defined.insert(term.to_owned(), DefineStatus::Defining);
        self.terms.remove(term);

        let value = match local_context.get(term) {
            Some(value) => value,
            None => return Err(TermCreationError::InvalidTermDefinition(term.to_owned())),
        };

        let (id, type_mapping, language_mapping) = match value {
            Value::Null => {
                defined.insert(term.to_owned(), DefineStatus::Defined);
                return Ok(());
            }

            Value::String(id) => (Some(id.as_str()), None, None),

            Value::Object(definition) => {
                if definition.contains_key("@reverse") {
                    return Err(TermCreationError::InvalidReverseProperty(term.to_owned()));
                }

                match definition.get("@container") {
                    None | Some(Value::Null) => {}
                    Some(Value::String(container)) if container == "@set" => {}
                    Some(_) => {
                        return Err(TermCreationError::InvalidContainerMapping(term.to_owned()))
                    }
                }

                let id = match definition.get("@id") {
                    None => None,
                    Some(Value::String(id)) => Some(id.as_str()),
                    Some(Value::Null) => {
                        defined.insert(term.to_owned(), DefineStatus::Defined);
                        return Ok(());
                    }
                    Some(_) => return Err(TermCreationError::InvalidIRIMapping(term.to_owned())),
                };

                let type_mapping = match definition.get("@type") {
                    None => None,
                    Some(Value::String(typeval)) if typeval == "@id" || typeval == "@vocab" => {
                        Some(typeval.to_owned())
                    }
                    Some(Value::String(typeval)) => {
                        match self.expand_iri_defining(local_context, typeval, defined)? {
                            Some(ref iri) if !iri.starts_with('@') && iri.contains(':') => {
                                Some(iri.to_owned())
                            }
                            _ => return Err(TermCreationError::InvalidTypeMapping(term.to_owned())),
                        }
                    }
                    Some(_) => return Err(TermCreationError::InvalidTypeMapping(term.to_owned())),
                };

                let language_mapping = match definition.get("@language") {
                    None => None,
                    Some(Value::Null) => Some(None),
                    Some(Value::String(language)) => Some(Some(language.to_lowercase())),
                    Some(_) => {
                        return Err(TermCreationError::InvalidLanguageMapping(term.to_owned()))
                    }
                };

                (id, type_mapping, language_mapping)
            }

            _ => return Err(TermCreationError::InvalidTermDefinition(term.to_owned())),
        };

        let iri_mapping = match id {
            Some(id) if is_keyword(id) => {
                if id != "@id" && id != "@type" {
                    return Err(TermCreationError::InvalidIRIMapping(term.to_owned()));
                }
                id.to_owned()
            }

            Some(id) => match self.expand_iri_defining(local_context, id, defined)? {
                Some(ref iri) if iri.contains(':') => iri.to_owned(),
                _ => return Err(TermCreationError::InvalidIRIMapping(term.to_owned())),
            },

            None => {
                if term.contains(':') {
                    if let Some((prefix, _)) = split_compact_iri(term) {
                        if local_context.contains_key(prefix) {
                            self.create_term(local_context, prefix, defined)?;
                        }
                    }

                    match self.expand_iri(term, false, false) {
                        Some(iri) => iri,
                        None => return Err(TermCreationError::InvalidIRIMapping(term.to_owned())),
                    }
                } else if let Some(vocab) = &self.vocabulary_mapping {
                    format!("{}{}", vocab, term)
                } else {
                    return Err(TermCreationError::InvalidIRIMapping(term.to_owned()));
                }
            }
        };

        self.terms.insert(
            term.to_owned(),
            Term {
                iri_mapping,
                type_mapping,
                language_mapping,
            },
        );
        defined.insert(term.to_owned(), DefineStatus::Defined);

        Ok(())
    }

    /// IRI expansion during term creation: terms and prefixes the value
    /// depends on are defined first, if the local context has them.
    fn expand_iri_defining(
        &mut self,
        local_context: &JsonMap<String, Value>,
        value: &str,
        defined: &mut HashMap<String, DefineStatus>,
    ) -> Result<Option<String>, TermCreationError> {
        if local_context.contains_key(value) && !is_keyword(value) {
            self.create_term(local_context, value, defined)?;
        }

        if let Some((prefix, _)) = split_compact_iri(value) {
            if local_context.contains_key(prefix) {
                self.create_term(local_context, prefix, defined)?;
            }
        }

        Ok(self.expand_iri(value, false, true))
    }

    /// Expands a term, compact IRI, or relative IRI. Returns None if the
    /// value cannot be turned into an absolute IRI (or keyword).
    pub(crate) fn expand_iri(&self, value: &str, document_relative: bool, vocab: bool) -> Option<String> {
        if is_keyword(value) {
            return Some(value.to_owned());
        }

        if vocab {
            if let Some(term) = self.terms.get(value) {
                return Some(term.iri_mapping.to_owned());
            }
        }

        if value.contains(':') {
            return match split_compact_iri(value) {
                Some((prefix, suffix)) => match self.terms.get(prefix) {
                    Some(term) => Some(format!("{}{}", term.iri_mapping, suffix)),
                    None => Some(value.to_owned()),
                },
                None => Some(value.to_owned()),
            };
        }

        if vocab {
            if let Some(vocabulary_mapping) = &self.vocabulary_mapping {
                return Some(format!("{}{}", vocabulary_mapping, value));
            }
        }

        if document_relative {
            if let Some(base) = &self.base_iri {
                return base.join(value).ok().map(String::from);
            }
        }

        None
    }

    /// Compacts an IRI without looking at value coercion: an exact plain
    /// term, then the vocabulary mapping, then the shortest `prefix:suffix`.
    pub(crate) fn compact_iri(&self, iri: &str, vocab: bool) -> String {
        if vocab {
            let exact = self
                .terms_for(iri)
                .find(|(_, term)| term.type_mapping.is_none() && term.language_mapping.is_none());
            if let Some((name, _)) = exact {
                return name.to_owned();
            }

            if let Some(suffix) = self.vocab_relative(iri) {
                return suffix.to_owned();
            }
        }

        let mut best: Option<String> = None;
        for (name, term) in &self.terms {
            if name.contains(':') || term.iri_mapping.starts_with('@') {
                continue;
            }

            if iri.len() > term.iri_mapping.len() && iri.starts_with(&term.iri_mapping as &str) {
                let candidate = format!("{}:{}", name, &iri[term.iri_mapping.len()..]);
                if best.as_ref().map_or(true, |b| candidate.len() < b.len()) {
                    best = Some(candidate);
                }
            }
        }

        best.unwrap_or_else(|| iri.to_owned())
    }

    /// The part of `iri` after the vocabulary mapping, if using it as a term
    /// would expand back to `iri`.
    pub(crate) fn vocab_relative<'a>(&self, iri: &'a str) -> Option<&'a str> {
        let vocabulary_mapping = self.vocabulary_mapping.as_ref()?;
        if !iri.starts_with(vocabulary_mapping as &str) {
            return None;
        }

        let suffix = &iri[vocabulary_mapping.len()..];
        if suffix.is_empty() || suffix.contains(':') || self.terms.contains_key(suffix) {
            None
        } else {
            Some(suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: Value) -> Context {
        let mut ctx = Context::new();
        ctx.process_context(&value).unwrap();
        ctx
    }

    #[test]
    fn vocab_expands_bare_terms() {
        let ctx = context(json!({ "@vocab": "http://schema.org/" }));

        assert_eq!(
            ctx.expand_iri("familyName", false, true),
            Some("http://schema.org/familyName".to_owned())
        );
        assert_eq!(ctx.expand_iri("familyName", false, false), None);
    }

    #[test]
    fn prefixes_are_defined_before_dependent_terms() {
        let ctx = context(json!({
            "name": "schema:name",
            "schema": "http://schema.org/",
            "knows": { "@id": "schema:knows", "@type": "@id" },
            "born": { "@id": "schema:birthDate", "@type": "xsd:date" },
            "xsd": "http://www.w3.org/2001/XMLSchema#"
        }));

        assert_eq!(ctx.term("name").unwrap().iri_mapping, "http://schema.org/name");
        assert_eq!(ctx.term("knows").unwrap().type_mapping.as_deref(), Some("@id"));
        assert_eq!(
            ctx.term("born").unwrap().type_mapping.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#date")
        );
        assert_eq!(
            ctx.expand_iri("schema:Person", false, true),
            Some("http://schema.org/Person".to_owned())
        );
    }

    #[test]
    fn cyclic_terms_are_rejected() {
        let mut ctx = Context::new();
        let err = ctx
            .process_context(&json!({ "a": "b:x", "b": "a:y" }))
            .unwrap_err();

        match err {
            ContextCreationError::InvalidTerm(TermCreationError::CyclicIRIMapping(_)) => {}
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn remote_contexts_are_not_fetched() {
        let mut ctx = Context::new();
        let err = ctx.process_context(&json!("http://schema.org/")).unwrap_err();

        match err {
            ContextCreationError::RemoteContextUnsupported(url) => assert_eq!(url, "http://schema.org/"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn relative_iris_resolve_against_base() {
        let ctx = context(json!({ "@base": "http://localhost/person/" }));

        assert_eq!(
            ctx.expand_iri("john", true, false),
            Some("http://localhost/person/john".to_owned())
        );
    }

    #[test]
    fn compaction_prefers_terms_then_vocab_then_prefixes() {
        let ctx = context(json!({
            "@vocab": "http://schema.org/",
            "foaf": "http://xmlns.com/foaf/0.1/",
            "nick": "http://xmlns.com/foaf/0.1/nick"
        }));

        assert_eq!(ctx.compact_iri("http://xmlns.com/foaf/0.1/nick", true), "nick");
        assert_eq!(ctx.compact_iri("http://schema.org/givenName", true), "givenName");
        assert_eq!(ctx.compact_iri("http://xmlns.com/foaf/0.1/name", true), "foaf:name");
        assert_eq!(ctx.compact_iri("http://example.org/other", true), "http://example.org/other");
    }

    #[test]
    fn keyword_aliases_are_allowed_for_id_and_type() {
        let ctx = context(json!({ "id": "@id", "type": "@type" }));

        assert_eq!(ctx.expand_iri("id", false, true), Some("@id".to_owned()));
        assert_eq!(ctx.expand_iri("type", false, true), Some("@type".to_owned()));
    }
}
