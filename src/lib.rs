//! Convert OpenStreetMap data to RDF triples
//!
//! osm2rdf-rust turns OSM nodes, ways, relations and derived multipolygon
//! areas into RDF triples serialized as N-Triples, Turtle or the Turtle
//! dialect the QLever triple store loads, and computes spatial containment
//! relations (area ⊇ area, area ⊇ node) through an area-containment DAG.

pub mod config;
pub mod contains;
pub mod dag;
pub mod handler;
pub mod mapper;
pub mod osm;
pub mod osmgeom;
pub mod osmpbf;
pub mod osmxml;
pub mod output;
pub mod ttl;

use ttl::grammar::GrammarError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error("unknown prefix: {0}")]
    UnknownPrefix(String),
    #[error("prefix registry is frozen")]
    PrefixesFrozen,
    #[error("duplicate tag key: {0}")]
    DuplicateTag(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("input error: {0}")]
    Input(String),
}
