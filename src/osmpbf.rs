//! OSM PBF reader
//!
//! Same two-pass dispatch as the XML reader, driven by [`osmpbfreader`].

use osmpbfreader::objects::{OsmId, OsmObj, Ref, Tags};
use rustc_hash::FxHashMap;
use std::fs::File;

use crate::osm::{Area, Member, MemberKind, Node, OsmHandler, Relation, TagList, Way};
use crate::osmgeom;
use crate::Error;

pub struct OsmPbfReader {
    filename: String,
    locations: FxHashMap<u64, (f64, f64)>,
    ways: FxHashMap<u64, Vec<u64>>,
}

fn convert_tags(tags: &Tags) -> Result<TagList, Error> {
    let mut out = TagList::new();
    for (k, v) in tags.iter() {
        out.insert(k.to_string(), v.to_string())?;
    }
    Ok(out)
}

fn convert_members(refs: &[Ref]) -> Vec<Member> {
    refs.iter()
        .map(|r| {
            let (kind, ref_) = match r.member {
                OsmId::Node(id) => (MemberKind::Node, id.0 as u64),
                OsmId::Way(id) => (MemberKind::Way, id.0 as u64),
                OsmId::Relation(id) => (MemberKind::Relation, id.0 as u64),
            };
            Member {
                kind,
                ref_,
                role: r.role.to_string(),
            }
        })
        .collect()
}

impl OsmPbfReader {
    pub fn new(filename: &str) -> Result<OsmPbfReader, Error> {
        Ok(OsmPbfReader {
            filename: filename.to_string(),
            locations: FxHashMap::default(),
            ways: FxHashMap::default(),
        })
    }

    /// Reads the input twice and drives the handler through both pipeline
    /// passes.
    pub fn read(&mut self, handler: &mut impl OsmHandler) -> Result<(), Error> {
        let file = File::open(&self.filename)?;
        let mut pbf = osmpbfreader::OsmPbfReader::new(file);

        for obj in pbf.iter() {
            let obj = obj.map_err(|e| Error::Input(e.to_string()))?;
            match obj {
                OsmObj::Node(node) => {
                    self.locations
                        .insert(node.id.0 as u64, (node.lon(), node.lat()));
                }
                OsmObj::Way(way) => {
                    let id = way.id.0 as u64;
                    let nodes: Vec<u64> = way.nodes.iter().map(|n| n.0 as u64).collect();
                    let geom = osmgeom::resolve_line(&nodes, &self.locations);
                    let way = Way {
                        id,
                        nodes,
                        geom,
                        tags: convert_tags(&way.tags)?,
                    };
                    if let Some(area) = Area::from_way(&way) {
                        handler.on_area(area)?;
                    }
                    self.ways.insert(id, way.nodes);
                }
                OsmObj::Relation(relation) => {
                    let converted = Relation {
                        id: relation.id.0 as u64,
                        members: convert_members(&relation.refs),
                        tags: convert_tags(&relation.tags)?,
                    };
                    if !osmgeom::is_area_relation(&converted.tags) {
                        continue;
                    }
                    let (outers, inners) = osmgeom::ring_segments(&converted, &self.ways);
                    if outers.is_empty() {
                        continue;
                    }
                    match osmgeom::relation_area(
                        converted.id,
                        converted.tags.clone(),
                        outers,
                        inners,
                        &self.locations,
                    ) {
                        Some(area) => handler.on_area(area)?,
                        None => eprintln!(
                            "relation {}: degenerate multipolygon geometry, area skipped",
                            converted.id
                        ),
                    }
                }
            }
        }

        pbf.rewind().map_err(|e| Error::Input(e.to_string()))?;
        handler.freeze()?;

        for obj in pbf.iter() {
            let obj = obj.map_err(|e| Error::Input(e.to_string()))?;
            match obj {
                OsmObj::Node(node) => {
                    handler.on_node(Node {
                        id: node.id.0 as u64,
                        lon: node.lon(),
                        lat: node.lat(),
                        tags: convert_tags(&node.tags)?,
                    })?;
                }
                OsmObj::Way(way) => {
                    let id = way.id.0 as u64;
                    let nodes: Vec<u64> = way.nodes.iter().map(|n| n.0 as u64).collect();
                    let geom = osmgeom::resolve_line(&nodes, &self.locations);
                    handler.on_way(Way {
                        id,
                        nodes,
                        geom,
                        tags: convert_tags(&way.tags)?,
                    })?;
                }
                OsmObj::Relation(relation) => {
                    handler.on_relation(Relation {
                        id: relation.id.0 as u64,
                        members: convert_members(&relation.refs),
                        tags: convert_tags(&relation.tags)?,
                    })?;
                }
            }
        }
        Ok(())
    }
}
