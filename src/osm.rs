//! OSM data model shared by the readers, the mapper and the containment
//! engine

use geo::{coord, Coord, LineString, MultiPolygon, Point, Rect};

use crate::Error;

/// Insertion-ordered tag list. Duplicate keys within one entity are
/// rejected.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TagList(Vec<(String, String)>);

impl TagList {
    pub fn new() -> TagList {
        TagList(Vec::new())
    }

    pub fn insert(&mut self, key: String, value: String) -> Result<(), Error> {
        if self.0.iter().any(|(k, _)| *k == key) {
            return Err(Error::DuplicateTag(key));
        }
        self.0.push((key, value));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node id
    pub id: u64,
    /// Longitude in WGS84 degrees
    pub lon: f64,
    /// Latitude in WGS84 degrees
    pub lat: f64,
    /// Tags
    pub tags: TagList,
}

impl Node {
    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// Way
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    /// Way id. OSM ids are 64-bit; the 32-bit limit of older data models is
    /// not carried over.
    pub id: u64,
    /// List of ordered node ids
    pub nodes: Vec<u64>,
    /// Polyline through the resolved node locations
    pub geom: LineString<f64>,
    /// Tags
    pub tags: TagList,
}

impl Way {
    /// A way is closed when it loops back onto its first node and has enough
    /// nodes to enclose something.
    pub fn closed(&self) -> bool {
        self.nodes.len() >= 4 && self.nodes.first() == self.nodes.last()
    }

    pub fn envelope(&self) -> Option<Rect<f64>> {
        use geo::BoundingRect;
        self.geom.bounding_rect()
    }
}

/// Relation member kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

/// Relation member
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Member kind: node/way/relation
    pub kind: MemberKind,
    /// Referenced id
    pub ref_: u64,
    /// Role in relation
    pub role: String,
}

/// Relation
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// Relation id
    pub id: u64,
    /// List of ordered members
    pub members: Vec<Member>,
    /// Tags
    pub tags: TagList,
}

/// Derived polygon or multipolygon. Way- and relation-derived areas share
/// one id space: `2·osm_id` for ways, `2·osm_id + 1` for relations. This
/// encoding is assumed by downstream consumers and preserved literally.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    /// Encoded area id
    pub id: u64,
    /// Multipolygon geometry
    pub geom: MultiPolygon<f64>,
    /// Node ids of every way the geometry was built from
    pub node_ids: Vec<u64>,
    /// Tags inherited from the source way or relation
    pub tags: TagList,
}

impl Area {
    /// Area derived from a closed way. `None` when the way is not closed or
    /// its locations did not all resolve.
    pub fn from_way(way: &Way) -> Option<Area> {
        if !way.closed() || way.geom.0.len() != way.nodes.len() {
            return None;
        }
        let ring = LineString::new(way.geom.0.clone());
        Some(Area {
            id: way.id * 2,
            geom: MultiPolygon::new(vec![geo::Polygon::new(ring, vec![])]),
            node_ids: way.nodes.clone(),
            tags: way.tags.clone(),
        })
    }

    /// Area derived from a multipolygon relation with pre-assembled rings.
    pub fn from_relation(
        id: u64,
        geom: MultiPolygon<f64>,
        node_ids: Vec<u64>,
        tags: TagList,
    ) -> Area {
        Area {
            id: id * 2 + 1,
            geom,
            node_ids,
            tags,
        }
    }

    /// OSM id of the source way or relation.
    pub fn source_id(&self) -> u64 {
        self.id >> 1
    }

    /// True when the area was derived from a way.
    pub fn from_way_source(&self) -> bool {
        self.id & 1 == 0
    }

    pub fn envelope(&self) -> Option<Rect<f64>> {
        use geo::BoundingRect;
        self.geom.bounding_rect()
    }

    /// Area of the envelope, the ordering key for deterministic containment
    /// walks.
    pub fn envelope_area(&self) -> f64 {
        match self.envelope() {
            Some(rect) => rect.width() * rect.height(),
            None => 0.0,
        }
    }
}

/// Callbacks driven by an OSM reader. Areas arrive in a first pass, nodes,
/// ways and relations in a second; `freeze` separates the two.
pub trait OsmHandler {
    fn on_area(&mut self, area: Area) -> Result<(), Error>;
    fn freeze(&mut self) -> Result<(), Error> {
        Ok(())
    }
    fn on_node(&mut self, node: Node) -> Result<(), Error>;
    fn on_way(&mut self, way: Way) -> Result<(), Error>;
    fn on_relation(&mut self, relation: Relation) -> Result<(), Error>;
}

/// Axis-aligned envelope containment.
pub fn rect_contains(outer: &Rect<f64>, inner: &Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

/// Axis-aligned envelope intersection.
pub fn rect_intersects(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x
        && b.min().x <= a.max().x
        && a.min().y <= b.max().y
        && b.min().y <= a.max().y
}

/// Envelope containing a single point.
pub fn rect_contains_point(rect: &Rect<f64>, point: &Point<f64>) -> bool {
    rect.min().x <= point.x()
        && point.x() <= rect.max().x
        && rect.min().y <= point.y()
        && point.y() <= rect.max().y
}

/// Helper building a linestring from (lon, lat) pairs.
pub fn line_from_coords(coords: &[(f64, f64)]) -> LineString<f64> {
    LineString::new(
        coords
            .iter()
            .map(|(x, y)| coord! { x: *x, y: *y })
            .collect::<Vec<Coord<f64>>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taglist_keeps_insertion_order_and_rejects_duplicates() {
        let mut tags = TagList::new();
        tags.insert("name".to_string(), "a".to_string()).unwrap();
        tags.insert("highway".to_string(), "b".to_string()).unwrap();
        let keys: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(vec!["name", "highway"], keys);
        assert!(matches!(
            tags.insert("name".to_string(), "c".to_string()),
            Err(Error::DuplicateTag(_))
        ));
        assert_eq!(Some("a"), tags.get("name"));
    }

    #[test]
    fn way_closed_needs_four_nodes_and_a_loop() {
        let mut way = Way {
            id: 1,
            nodes: vec![1, 2, 3, 1],
            geom: line_from_coords(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]),
            tags: TagList::new(),
        };
        assert!(way.closed());
        way.nodes = vec![1, 2, 1];
        assert!(!way.closed());
        way.nodes = vec![1, 2, 3, 4];
        assert!(!way.closed());
    }

    #[test]
    fn area_id_encoding() {
        let way = Way {
            id: 21,
            nodes: vec![1, 2, 3, 1],
            geom: line_from_coords(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]),
            tags: TagList::new(),
        };
        let area = Area::from_way(&way).unwrap();
        assert_eq!(42, area.id);
        assert_eq!(21, area.source_id());
        assert!(area.from_way_source());

        let rel_area = Area::from_relation(
            21,
            area.geom.clone(),
            area.node_ids.clone(),
            TagList::new(),
        );
        assert_eq!(43, rel_area.id);
        assert_eq!(21, rel_area.source_id());
        assert!(!rel_area.from_way_source());
    }

    #[test]
    fn area_from_open_way_is_none() {
        let way = Way {
            id: 1,
            nodes: vec![1, 2, 3, 4],
            geom: line_from_coords(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]),
            tags: TagList::new(),
        };
        assert_eq!(None, Area::from_way(&way));
    }

    #[test]
    fn rect_predicates() {
        let outer = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 });
        let inner = Rect::new(coord! { x: 2.0, y: 2.0 }, coord! { x: 3.0, y: 3.0 });
        let apart = Rect::new(coord! { x: 20.0, y: 20.0 }, coord! { x: 30.0, y: 30.0 });
        assert!(rect_contains(&outer, &inner));
        assert!(!rect_contains(&inner, &outer));
        assert!(rect_intersects(&outer, &inner));
        assert!(!rect_intersects(&outer, &apart));
        assert!(rect_contains_point(&outer, &Point::new(5.0, 5.0)));
        assert!(!rect_contains_point(&outer, &Point::new(15.0, 5.0)));
    }
}
