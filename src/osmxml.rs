//! Streaming OSM XML reader
//!
//! Drives an [`OsmHandler`] in the two passes the pipeline expects: the
//! first scan collects node locations and way skeletons and assembles areas
//! (closed ways, multipolygon relations), the second dispatches nodes, ways
//! and relations. Input files ending in `.gz` are decompressed on the fly.

use flate2::bufread::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::osm::{Area, Member, MemberKind, Node, OsmHandler, Relation, TagList, Way};
use crate::osmgeom;
use crate::Error;

enum CurObj {
    Empty,
    Node(Node),
    Way { id: u64 },
    Relation { id: u64 },
}

enum Parsed {
    Node(Node),
    Way {
        id: u64,
        nodes: Vec<u64>,
        tags: TagList,
    },
    Relation(Relation),
}

pub struct OsmXmlReader {
    filename: String,
    locations: FxHashMap<u64, (f64, f64)>,
    ways: FxHashMap<u64, Vec<u64>>,
}

fn xml_reader(filename: &str) -> Result<Reader<Box<dyn BufRead>>, Error> {
    let file = File::open(filename)?;
    let reader: Box<dyn BufRead> = if filename.ends_with(".gz") {
        Box::new(BufReader::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(Reader::from_reader(reader))
}

fn attr_value(attr: &quick_xml::events::attributes::Attribute) -> Result<String, Error> {
    attr.unescape_value()
        .map(|v| v.into_owned())
        .map_err(|e| Error::Encoding(format!("bad attribute value: {e}")))
}

fn parse_u64(v: &str) -> Result<u64, Error> {
    v.parse()
        .map_err(|_| Error::Input(format!("invalid id: {v}")))
}

fn parse_f64(v: &str) -> Result<f64, Error> {
    v.parse()
        .map_err(|_| Error::Input(format!("invalid coordinate: {v}")))
}

fn start_elem(
    e: &BytesStart,
    curobj: &mut CurObj,
    tags: &mut TagList,
    nodes: &mut Vec<u64>,
    members: &mut Vec<Member>,
) -> Result<(), Error> {
    match e.name().as_ref() {
        b"node" => {
            let mut id: u64 = 0;
            let mut lat: f64 = 0.0;
            let mut lon: f64 = 0.0;
            for a in e.attributes() {
                let a = a.map_err(|e| Error::Input(format!("bad attribute: {e}")))?;
                let v = attr_value(&a)?;
                match a.key.as_ref() {
                    b"id" => id = parse_u64(&v)?,
                    b"lat" => lat = parse_f64(&v)?,
                    b"lon" => lon = parse_f64(&v)?,
                    _ => (),
                }
            }
            *tags = TagList::new();
            *curobj = CurObj::Node(Node {
                id,
                lon,
                lat,
                tags: TagList::new(),
            });
        }
        b"way" => {
            let mut id: u64 = 0;
            for a in e.attributes() {
                let a = a.map_err(|e| Error::Input(format!("bad attribute: {e}")))?;
                if a.key.as_ref() == b"id" {
                    id = parse_u64(&attr_value(&a)?)?;
                }
            }
            *tags = TagList::new();
            nodes.clear();
            *curobj = CurObj::Way { id };
        }
        b"relation" => {
            let mut id: u64 = 0;
            for a in e.attributes() {
                let a = a.map_err(|e| Error::Input(format!("bad attribute: {e}")))?;
                if a.key.as_ref() == b"id" {
                    id = parse_u64(&attr_value(&a)?)?;
                }
            }
            *tags = TagList::new();
            members.clear();
            *curobj = CurObj::Relation { id };
        }
        b"tag" => {
            let mut key = String::new();
            let mut value = String::new();
            for a in e.attributes() {
                let a = a.map_err(|e| Error::Input(format!("bad attribute: {e}")))?;
                match a.key.as_ref() {
                    b"k" => key = attr_value(&a)?,
                    b"v" => value = attr_value(&a)?,
                    _ => (),
                }
            }
            tags.insert(key, value)?;
        }
        b"nd" => {
            for a in e.attributes() {
                let a = a.map_err(|e| Error::Input(format!("bad attribute: {e}")))?;
                if a.key.as_ref() == b"ref" {
                    nodes.push(parse_u64(&attr_value(&a)?)?);
                }
            }
        }
        b"member" => {
            let mut kind = None;
            let mut ref_: u64 = 0;
            let mut role = String::new();
            for a in e.attributes() {
                let a = a.map_err(|e| Error::Input(format!("bad attribute: {e}")))?;
                let v = attr_value(&a)?;
                match a.key.as_ref() {
                    b"type" => {
                        kind = Some(match v.as_str() {
                            "node" => MemberKind::Node,
                            "way" => MemberKind::Way,
                            "relation" => MemberKind::Relation,
                            other => {
                                return Err(Error::Input(format!(
                                    "unsupported member type: {other}"
                                )))
                            }
                        });
                    }
                    b"ref" => ref_ = parse_u64(&v)?,
                    b"role" => role = v,
                    _ => (),
                }
            }
            let kind = kind.ok_or_else(|| Error::Input("member without a type".to_string()))?;
            members.push(Member { kind, ref_, role });
        }
        _ => (),
    }
    Ok(())
}

fn finish_elem(
    curobj: &mut CurObj,
    tags: &mut TagList,
    nodes: &mut Vec<u64>,
    members: &mut Vec<Member>,
    f: &mut dyn FnMut(Parsed) -> Result<(), Error>,
) -> Result<(), Error> {
    match std::mem::replace(curobj, CurObj::Empty) {
        CurObj::Empty => Ok(()),
        CurObj::Node(mut node) => {
            node.tags = std::mem::take(tags);
            f(Parsed::Node(node))
        }
        CurObj::Way { id } => f(Parsed::Way {
            id,
            nodes: std::mem::take(nodes),
            tags: std::mem::take(tags),
        }),
        CurObj::Relation { id } => f(Parsed::Relation(Relation {
            id,
            members: std::mem::take(members),
            tags: std::mem::take(tags),
        })),
    }
}

fn scan(filename: &str, f: &mut dyn FnMut(Parsed) -> Result<(), Error>) -> Result<(), Error> {
    let mut reader = xml_reader(filename)?;
    let mut buf = Vec::new();
    let mut tags = TagList::new();
    let mut nodes: Vec<u64> = Vec::new();
    let mut members: Vec<Member> = Vec::new();
    let mut curobj = CurObj::Empty;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => {
                return Err(Error::Input(format!(
                    "xml error at position {}: {e}",
                    reader.error_position()
                )))
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                start_elem(&e, &mut curobj, &mut tags, &mut nodes, &mut members)?;
            }
            Ok(Event::Empty(e)) => {
                start_elem(&e, &mut curobj, &mut tags, &mut nodes, &mut members)?;
                if matches!(e.name().as_ref(), b"node" | b"way" | b"relation") {
                    finish_elem(&mut curobj, &mut tags, &mut nodes, &mut members, f)?;
                }
            }
            Ok(Event::End(e)) => {
                if matches!(e.name().as_ref(), b"node" | b"way" | b"relation") {
                    finish_elem(&mut curobj, &mut tags, &mut nodes, &mut members, f)?;
                }
            }
            Ok(_) => (),
        }
        buf.clear();
    }
    Ok(())
}

impl OsmXmlReader {
    pub fn new(filename: &str) -> Result<OsmXmlReader, Error> {
        Ok(OsmXmlReader {
            filename: filename.to_string(),
            locations: FxHashMap::default(),
            ways: FxHashMap::default(),
        })
    }

    /// Reads the input twice and drives the handler through both pipeline
    /// passes.
    pub fn read(&mut self, handler: &mut impl OsmHandler) -> Result<(), Error> {
        let filename = self.filename.clone();

        scan(&filename, &mut |parsed| match parsed {
            Parsed::Node(node) => {
                self.locations.insert(node.id, (node.lon, node.lat));
                Ok(())
            }
            Parsed::Way { id, nodes, tags } => {
                let geom = osmgeom::resolve_line(&nodes, &self.locations);
                let way = Way {
                    id,
                    nodes,
                    geom,
                    tags,
                };
                if let Some(area) = Area::from_way(&way) {
                    handler.on_area(area)?;
                }
                self.ways.insert(way.id, way.nodes);
                Ok(())
            }
            Parsed::Relation(relation) => {
                if !osmgeom::is_area_relation(&relation.tags) {
                    return Ok(());
                }
                let (outers, inners) = osmgeom::ring_segments(&relation, &self.ways);
                if outers.is_empty() {
                    return Ok(());
                }
                match osmgeom::relation_area(
                    relation.id,
                    relation.tags.clone(),
                    outers,
                    inners,
                    &self.locations,
                ) {
                    Some(area) => handler.on_area(area)?,
                    None => eprintln!(
                        "relation {}: degenerate multipolygon geometry, area skipped",
                        relation.id
                    ),
                }
                Ok(())
            }
        })?;

        handler.freeze()?;

        scan(&filename, &mut |parsed| match parsed {
            Parsed::Node(node) => handler.on_node(node),
            Parsed::Way { id, nodes, tags } => {
                let geom = osmgeom::resolve_line(&nodes, &self.locations);
                handler.on_way(Way {
                    id,
                    nodes,
                    geom,
                    tags,
                })
            }
            Parsed::Relation(relation) => handler.on_relation(relation),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Default)]
    struct Collector {
        areas: Vec<Area>,
        nodes: Vec<Node>,
        ways: Vec<Way>,
        relations: Vec<Relation>,
        frozen: bool,
    }

    impl OsmHandler for Collector {
        fn on_area(&mut self, area: Area) -> Result<(), Error> {
            assert!(!self.frozen);
            self.areas.push(area);
            Ok(())
        }
        fn freeze(&mut self) -> Result<(), Error> {
            self.frozen = true;
            Ok(())
        }
        fn on_node(&mut self, node: Node) -> Result<(), Error> {
            assert!(self.frozen);
            self.nodes.push(node);
            Ok(())
        }
        fn on_way(&mut self, way: Way) -> Result<(), Error> {
            self.ways.push(way);
            Ok(())
        }
        fn on_relation(&mut self, relation: Relation) -> Result<(), Error> {
            self.relations.push(relation);
            Ok(())
        }
    }

    const WIKI_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="CGImap 0.0.2">
 <node id="298884269" lat="54.0901746" lon="12.2482632" version="1"/>
 <node id="261728686" lat="54.0906309" lon="12.2441924" version="1"/>
 <node id="1831881213" version="1" lat="54.0900666" lon="12.2539381">
  <tag k="name" v="Neu Broderstorf"/>
  <tag k="traffic_sign" v="city_limit"/>
 </node>
 <way id="26659127" version="5">
  <nd ref="298884269"/>
  <nd ref="261728686"/>
  <tag k="highway" v="unclassified"/>
 </way>
 <relation id="56688" version="28">
  <member type="node" ref="298884269" role=""/>
  <member type="way" ref="26659127" role="stop"/>
  <tag k="type" v="route"/>
 </relation>
</osm>
"#;

    fn write_input(dir: &tempfile::TempDir, name: &str, data: &str) -> String {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(data.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn parses_nodes_ways_relations() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(&dir, "wiki.osm", WIKI_XML);
        let mut reader = OsmXmlReader::new(&path).unwrap();
        let mut collector = Collector::default();
        reader.read(&mut collector).unwrap();

        assert_eq!(0, collector.areas.len());
        assert_eq!(3, collector.nodes.len());
        assert_eq!(1, collector.ways.len());
        assert_eq!(1, collector.relations.len());

        let tagged = &collector.nodes[2];
        assert_eq!(1831881213, tagged.id);
        assert_eq!(Some("Neu Broderstorf"), tagged.tags.get("name"));

        let way = &collector.ways[0];
        assert_eq!(vec![298884269, 261728686], way.nodes);
        assert_eq!(2, way.geom.0.len());
        assert_eq!(12.2482632, way.geom.0[0].x);

        let relation = &collector.relations[0];
        assert_eq!(2, relation.members.len());
        assert_eq!(MemberKind::Way, relation.members[1].kind);
        assert_eq!("stop", relation.members[1].role);
    }

    #[test]
    fn closed_way_becomes_an_area() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
 <node id="1" lat="0.0" lon="0.0"/>
 <node id="2" lat="0.0" lon="1.0"/>
 <node id="3" lat="1.0" lon="1.0"/>
 <node id="4" lat="1.0" lon="0.0"/>
 <way id="9">
  <nd ref="1"/><nd ref="2"/><nd ref="3"/><nd ref="4"/><nd ref="1"/>
  <tag k="building" v="yes"/>
 </way>
</osm>
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(&dir, "area.osm", xml);
        let mut reader = OsmXmlReader::new(&path).unwrap();
        let mut collector = Collector::default();
        reader.read(&mut collector).unwrap();

        assert_eq!(1, collector.areas.len());
        let area = &collector.areas[0];
        assert_eq!(18, area.id);
        assert_eq!(Some("yes"), area.tags.get("building"));
        assert_eq!(vec![1, 2, 3, 4, 1], area.node_ids);
        assert_eq!(1, collector.ways.len());
    }

    #[test]
    fn multipolygon_relation_becomes_an_area() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
 <node id="1" lat="0.0" lon="0.0"/>
 <node id="2" lat="0.0" lon="4.0"/>
 <node id="3" lat="4.0" lon="4.0"/>
 <node id="4" lat="4.0" lon="0.0"/>
 <way id="10">
  <nd ref="1"/><nd ref="2"/><nd ref="3"/>
 </way>
 <way id="11">
  <nd ref="3"/><nd ref="4"/><nd ref="1"/>
 </way>
 <relation id="20">
  <member type="way" ref="10" role="outer"/>
  <member type="way" ref="11" role="outer"/>
  <tag k="type" v="multipolygon"/>
  <tag k="landuse" v="forest"/>
 </relation>
</osm>
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(&dir, "mp.osm", xml);
        let mut reader = OsmXmlReader::new(&path).unwrap();
        let mut collector = Collector::default();
        reader.read(&mut collector).unwrap();

        assert_eq!(1, collector.areas.len());
        let area = &collector.areas[0];
        assert_eq!(41, area.id);
        assert!(!area.from_way_source());
        assert_eq!(Some("forest"), area.tags.get("landuse"));
        assert_eq!(1, area.geom.0.len());
    }

    #[test]
    fn reads_gzipped_input() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wiki.osm.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(WIKI_XML.as_bytes()).unwrap();
        enc.finish().unwrap();

        let mut reader = OsmXmlReader::new(path.to_str().unwrap()).unwrap();
        let mut collector = Collector::default();
        reader.read(&mut collector).unwrap();
        assert_eq!(3, collector.nodes.len());
        assert_eq!(1, collector.ways.len());
    }
}
