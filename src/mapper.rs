//! Mapping from OSM entities to triple sequences
//!
//! Each entity maps to a fixed order: `rdf:type`, tags in insertion order,
//! enriched triples for recognized keys, geometry, and (for relations) one
//! blank-node group per member. Areas only add their multipolygon geometry
//! under the source way/relation IRI; identity, type and tags are emitted by
//! the source entity itself.

use std::fmt::Write;

use geo::{LineString, MultiPolygon};

use crate::osm::{Area, Member, MemberKind, Node, Relation, TagList, Way};
use crate::output::Section;
use crate::ttl::{Term, Writer};
use crate::Error;

/// Every WKT coordinate carries exactly 12 fractional digits.
fn wkt_coord(out: &mut String, x: f64, y: f64) {
    write!(out, "{x:.12} {y:.12}").unwrap();
}

fn wkt_point(lon: f64, lat: f64) -> String {
    let mut out = String::from("POINT(");
    wkt_coord(&mut out, lon, lat);
    out.push(')');
    out
}

fn wkt_linestring(line: &LineString<f64>) -> String {
    let mut out = String::from("LINESTRING(");
    for (i, c) in line.0.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        wkt_coord(&mut out, c.x, c.y);
    }
    out.push(')');
    out
}

fn wkt_ring(out: &mut String, ring: &LineString<f64>) {
    out.push('(');
    for (i, c) in ring.0.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        wkt_coord(out, c.x, c.y);
    }
    out.push(')');
}

fn wkt_multipolygon(geom: &MultiPolygon<f64>) -> String {
    let mut out = String::from("MULTIPOLYGON(");
    for (i, polygon) in geom.0.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('(');
        wkt_ring(&mut out, polygon.exterior());
        for interior in polygon.interiors() {
            out.push(',');
            wkt_ring(&mut out, interior);
        }
        out.push(')');
    }
    out.push(')');
    out
}

/// Percent-encodes the ASCII characters that may not appear in an IRI path;
/// non-ASCII passes through, IRIs allow it.
fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ' ' | '"' | '<' | '>' | '{' | '}' | '|' | '^' | '`' | '\\' | '%' | '?' | '#' => {
                write!(out, "%{:02X}", c as u32).unwrap();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Tag triples in insertion order, followed by the enriched triples for
/// recognized keys.
fn write_tags(writer: &mut Writer, subject: &Term, tags: &TagList) -> Result<(), Error> {
    for (key, value) in tags.iter() {
        writer.write_triple(
            subject,
            &Term::iri("osmt", key),
            &Term::literal(value),
        )?;
    }
    for (key, value) in tags.iter() {
        match key {
            "wikidata" => {
                // only plain Qxxx / Pxxx values map to an entity IRI
                let mut chars = value.chars();
                let tagged = matches!(chars.next(), Some('Q' | 'P'))
                    && chars.clone().next().is_some()
                    && chars.all(|c| c.is_ascii_digit());
                if tagged {
                    writer.write_triple(
                        subject,
                        &Term::iri("osm", "wikidata"),
                        &Term::iri("wd", value),
                    )?;
                }
            }
            "wikipedia" => {
                if let Some((lang, title)) = value.split_once(':') {
                    let iri = format!(
                        "https://{}.wikipedia.org/wiki/{}",
                        lang,
                        url_encode(title)
                    );
                    writer.write_triple(
                        subject,
                        &Term::iri("osm", "wikipedia"),
                        &Term::Full(iri),
                    )?;
                }
            }
            _ => (),
        }
    }
    Ok(())
}

/// Subject IRI of a node.
pub fn node_subject(id: u64) -> Term {
    Term::iri("osmnode", id.to_string())
}

/// Subject IRI of a way.
pub fn way_subject(id: u64) -> Term {
    Term::iri("osmway", id.to_string())
}

/// Subject IRI of a relation.
pub fn relation_subject(id: u64) -> Term {
    Term::iri("osmrel", id.to_string())
}

/// Subject IRI of an area, through its source way or relation.
pub fn area_subject(area_id: u64) -> Term {
    let source_id = area_id >> 1;
    if area_id & 1 == 0 {
        way_subject(source_id)
    } else {
        relation_subject(source_id)
    }
}

pub fn write_node(writer: &mut Writer, node: &Node) -> Result<(), Error> {
    writer.set_section(Section::Nodes);
    let subject = node_subject(node.id);
    writer.write_triple(&subject, &Term::iri("rdf", "type"), &Term::iri("osm", "node"))?;
    write_tags(writer, &subject, &node.tags)?;
    writer.write_triple(
        &subject,
        &Term::iri("geo", "hasGeometry"),
        &Term::wkt_literal(wkt_point(node.lon, node.lat)),
    )?;
    Ok(())
}

pub fn write_way(writer: &mut Writer, way: &Way) -> Result<(), Error> {
    writer.set_section(Section::Ways);
    let subject = way_subject(way.id);
    writer.write_triple(&subject, &Term::iri("rdf", "type"), &Term::iri("osm", "way"))?;
    write_tags(writer, &subject, &way.tags)?;
    writer.write_triple(
        &subject,
        &Term::iri("geo", "hasGeometry"),
        &Term::wkt_literal(wkt_linestring(&way.geom)),
    )?;
    Ok(())
}

fn member_term(member: &Member) -> Term {
    match member.kind {
        MemberKind::Node => node_subject(member.ref_),
        MemberKind::Way => way_subject(member.ref_),
        MemberKind::Relation => relation_subject(member.ref_),
    }
}

pub fn write_relation(writer: &mut Writer, relation: &Relation) -> Result<(), Error> {
    writer.set_section(Section::Relations);
    let subject = relation_subject(relation.id);
    writer.write_triple(
        &subject,
        &Term::iri("rdf", "type"),
        &Term::iri("osm", "relation"),
    )?;
    write_tags(writer, &subject, &relation.tags)?;
    for member in &relation.members {
        let blank = writer.blank_node();
        writer.write_triple(&blank, &Term::iri("osm", "id"), &member_term(member))?;
        writer.write_triple(
            &blank,
            &Term::iri("osm", "role"),
            &Term::literal(member.role.as_str()),
        )?;
        writer.write_triple(&subject, &Term::iri("osm", "member"), &blank)?;
    }
    Ok(())
}

pub fn write_area(writer: &mut Writer, area: &Area) -> Result<(), Error> {
    writer.set_section(Section::Areas);
    let subject = area_subject(area.id);
    writer.write_triple(
        &subject,
        &Term::iri("geo", "hasGeometry"),
        &Term::wkt_literal(wkt_multipolygon(&area.geom)),
    )?;
    Ok(())
}
