//! RDF serialization: output formats, prefix registry and triple writer

use std::fmt;
use std::str::FromStr;

use crate::output::{Output, Section};
use crate::Error;

pub mod grammar;

/// Serialization formats. QLever is Turtle with the header its loader
/// expects; since the writer never uses predicate or object lists, the two
/// produce identical triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    Nt,
    #[default]
    Ttl,
    Qlever,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Format, String> {
        match s {
            "nt" => Ok(Format::Nt),
            "ttl" => Ok(Format::Ttl),
            "qlever" => Ok(Format::Qlever),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Format::Nt => "nt",
            Format::Ttl => "ttl",
            Format::Qlever => "qlever",
        };
        write!(f, "{s}")
    }
}

/// One term of a triple.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// IRI through the prefix registry.
    Iri { prefix: &'static str, local: String },
    /// Absolute IRI, written as a full IRIREF in every format.
    Full(String),
    /// Blank node label (without the `_:`).
    Blank(String),
    /// Literal with optional datatype (a registered-prefix IRI) or language.
    Literal {
        value: String,
        datatype: Option<(&'static str, &'static str)>,
        lang: Option<String>,
    },
}

impl Term {
    pub fn iri(prefix: &'static str, local: impl Into<String>) -> Term {
        Term::Iri {
            prefix,
            local: local.into(),
        }
    }

    pub fn literal(value: impl Into<String>) -> Term {
        Term::Literal {
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn wkt_literal(value: impl Into<String>) -> Term {
        Term::Literal {
            value: value.into(),
            datatype: Some(("geo", "wktLiteral")),
            lang: None,
        }
    }
}

/// Default prefix registry, in header emission order.
const DEFAULT_PREFIXES: [(&str, &str); 11] = [
    ("geo", "http://www.opengis.net/ont/geosparql#"),
    ("ogc", "http://www.opengis.net/rdf#"),
    ("osm", "https://www.openstreetmap.org/"),
    ("osmnode", "https://www.openstreetmap.org/node/"),
    ("osmrel", "https://www.openstreetmap.org/relation/"),
    ("osmt", "https://www.openstreetmap.org/wiki/Key:"),
    ("osmway", "https://www.openstreetmap.org/way/"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("wd", "http://www.wikidata.org/entity/"),
    ("wikipedia", "https://en.wikipedia.org/wiki/"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

/// Stateful triple writer. Composes the grammar encoders into complete
/// documents; every triple stands alone on one line so emission carries no
/// state between triples apart from the blank-node counter.
pub struct Writer {
    format: Format,
    prefixes: Vec<(&'static str, &'static str)>,
    frozen: bool,
    blank_counter: u64,
    section: Section,
    out: Output,
}

impl Writer {
    pub fn new(format: Format, out: Output) -> Writer {
        Writer {
            format,
            prefixes: DEFAULT_PREFIXES.to_vec(),
            frozen: false,
            blank_counter: 0,
            section: Section::Prefixes,
            out,
        }
    }

    pub fn open(&mut self) -> Result<(), Error> {
        self.out.open()?;
        Ok(())
    }

    /// Registers an additional prefix. The registry closes at the first
    /// emission.
    pub fn add_prefix(
        &mut self,
        prefix: &'static str,
        iri: &'static str,
    ) -> Result<(), Error> {
        if self.frozen {
            return Err(Error::PrefixesFrozen);
        }
        self.prefixes.retain(|(p, _)| *p != prefix);
        self.prefixes.push((prefix, iri));
        Ok(())
    }

    fn expand(&self, prefix: &str) -> Result<&'static str, Error> {
        self.prefixes
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, iri)| *iri)
            .ok_or_else(|| Error::UnknownPrefix(prefix.to_string()))
    }

    /// Emits the `@prefix` header for TTL and QLever; N-Triples has no
    /// prefix declarations. Freezes the registry either way.
    pub fn write_header(&mut self) -> Result<(), Error> {
        self.frozen = true;
        if self.format == Format::Nt {
            return Ok(());
        }
        self.section = Section::Prefixes;
        for (prefix, iri) in self.prefixes.clone() {
            let line = format!(
                "@prefix {}: <{}> .\n",
                grammar::encode_pn_prefix(prefix)?,
                grammar::encode_iriref(iri)
            );
            self.out.write(Section::Prefixes, line.as_bytes())?;
        }
        Ok(())
    }

    pub fn set_section(&mut self, section: Section) {
        self.section = section;
    }

    /// A fresh blank node term.
    pub fn blank_node(&mut self) -> Term {
        let label = self.blank_counter.to_string();
        self.blank_counter += 1;
        Term::Blank(label)
    }

    fn format_iri(&self, prefix: &str, local: &str) -> Result<String, Error> {
        let expansion = self.expand(prefix)?;
        match self.format {
            Format::Nt => Ok(grammar::iriref(expansion, local)),
            Format::Ttl | Format::Qlever => match grammar::prefixed_name(prefix, local) {
                Ok(name) => Ok(name),
                // local part not expressible as a prefixed name
                Err(grammar::GrammarError::InvalidChar {
                    production: "PN_LOCAL",
                    ..
                }) => Ok(grammar::iriref(expansion, local)),
                Err(e) => Err(e.into()),
            },
        }
    }

    fn format_term(&self, term: &Term) -> Result<String, Error> {
        match term {
            Term::Iri { prefix, local } => self.format_iri(prefix, local),
            Term::Full(iri) => Ok(format!("<{}>", grammar::encode_iriref(iri))),
            Term::Blank(label) => Ok(format!("_:{label}")),
            Term::Literal {
                value,
                datatype,
                lang,
            } => {
                let mut s = grammar::string_literal_quote(value);
                if let Some((prefix, local)) = datatype {
                    s.push_str("^^");
                    s.push_str(&self.format_iri(prefix, local)?);
                } else if let Some(lang) = lang {
                    s.push('@');
                    s.push_str(lang);
                }
                Ok(s)
            }
        }
    }

    pub fn write_triple(&mut self, subject: &Term, predicate: &Term, object: &Term) -> Result<(), Error> {
        self.frozen = true;
        let line = format!(
            "{} {} {} .\n",
            self.format_term(subject)?,
            self.format_term(predicate)?,
            self.format_term(object)?
        );
        self.out.write(self.section, line.as_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.out.flush()?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.out.close()?;
        Ok(())
    }
}
