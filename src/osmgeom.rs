//! Convert OSM objects to [`geo`] geometries
//!
//! Shared by the XML and PBF readers: location resolution for way
//! polylines, and ring assembly for multipolygon relations.

use geo::{coord, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use rustc_hash::FxHashMap;

use crate::osm::{Area, MemberKind, Relation, TagList};

/// Resolves a node-id sequence against the location store. Unresolved ids
/// are dropped; a way with no resolvable reference yields an empty
/// polyline.
pub fn resolve_line(nodes: &[u64], locations: &FxHashMap<u64, (f64, f64)>) -> LineString<f64> {
    LineString::new(
        nodes
            .iter()
            .filter_map(|id| locations.get(id))
            .map(|(lon, lat)| coord! { x: *lon, y: *lat })
            .collect::<Vec<Coord<f64>>>(),
    )
}

/// True when a relation assembles into an area.
pub fn is_area_relation(tags: &TagList) -> bool {
    matches!(tags.get("type"), Some("multipolygon" | "boundary"))
}

/// Splits a relation's way members into outer and inner ring segments. An
/// empty role counts as outer, the OSM convention for old multipolygons.
/// Members whose ways are unknown are ignored.
pub fn ring_segments(
    relation: &Relation,
    ways: &FxHashMap<u64, Vec<u64>>,
) -> (Vec<Vec<u64>>, Vec<Vec<u64>>) {
    let mut outers: Vec<Vec<u64>> = Vec::new();
    let mut inners: Vec<Vec<u64>> = Vec::new();
    for member in &relation.members {
        if member.kind != MemberKind::Way {
            continue;
        }
        let Some(segment) = ways.get(&member.ref_) else {
            continue;
        };
        if member.role == "inner" {
            inners.push(segment.clone());
        } else {
            outers.push(segment.clone());
        }
    }
    (outers, inners)
}

/// Stitches way segments into closed rings of node ids. Segments may run in
/// either direction. Returns `None` when a ring cannot be closed.
pub fn stitch_rings(mut segments: Vec<Vec<u64>>) -> Option<Vec<Vec<u64>>> {
    segments.retain(|s| s.len() >= 2);
    let mut rings: Vec<Vec<u64>> = Vec::new();
    while let Some(mut ring) = segments.pop() {
        loop {
            if ring.len() >= 4 && ring.first() == ring.last() {
                rings.push(ring);
                break;
            }
            let last = *ring.last()?;
            let pos = segments
                .iter()
                .position(|s| s.first() == Some(&last) || s.last() == Some(&last))?;
            let mut segment = segments.remove(pos);
            if segment.last() == Some(&last) {
                segment.reverse();
            }
            ring.extend_from_slice(&segment[1..]);
        }
    }
    if rings.is_empty() {
        None
    } else {
        Some(rings)
    }
}

fn ring_to_linestring(
    ring: &[u64],
    locations: &FxHashMap<u64, (f64, f64)>,
) -> Option<LineString<f64>> {
    let line = resolve_line(ring, locations);
    if line.0.len() != ring.len() {
        return None;
    }
    Some(line)
}

/// Assembles a relation area from its outer and inner member way segments.
/// Each inner ring attaches to the first outer ring containing it. `None`
/// when the rings cannot be stitched or resolved; the caller reports the
/// degenerate geometry and drops the area.
pub fn relation_area(
    relation_id: u64,
    tags: TagList,
    outer_segments: Vec<Vec<u64>>,
    inner_segments: Vec<Vec<u64>>,
    locations: &FxHashMap<u64, (f64, f64)>,
) -> Option<Area> {
    let mut node_ids: Vec<u64> = Vec::new();
    for segment in outer_segments.iter().chain(inner_segments.iter()) {
        node_ids.extend_from_slice(segment);
    }

    let outer_rings = stitch_rings(outer_segments)?;
    let inner_rings = if inner_segments.is_empty() {
        Vec::new()
    } else {
        stitch_rings(inner_segments)?
    };

    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for ring in &outer_rings {
        polygons.push(Polygon::new(ring_to_linestring(ring, locations)?, vec![]));
    }
    for ring in &inner_rings {
        let line = ring_to_linestring(ring, locations)?;
        let probe = Point::new(line.0[0].x, line.0[0].y);
        let outer = polygons.iter_mut().find(|p| p.contains(&probe))?;
        outer.interiors_push(line);
    }

    Some(Area::from_relation(
        relation_id,
        MultiPolygon::new(polygons),
        node_ids,
        tags,
    ))
}
