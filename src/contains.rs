//! Spatial containment engine
//!
//! Pass 1 inserts every area into a containment DAG and records which nodes
//! belong to which area. After the freeze, the engine answers two sweeps:
//! which areas contain each dumped node, and which areas contain or
//! intersect each queued way. Both sweeps walk the candidate areas in
//! ascending envelope-area order so that once a small area is confirmed as a
//! container, every DAG ancestor is adopted without another geometric test.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use geo::{Contains, Intersects, LineString, MultiPolygon, Point, Rect};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::dag::DirectedGraph;
use crate::mapper::{area_subject, node_subject, way_subject};
use crate::osm::{rect_contains, rect_contains_point, rect_intersects, Area};
use crate::output::Section;
use crate::ttl::{Term, Writer};
use crate::Error;

struct StoredArea {
    id: u64,
    geom: MultiPolygon<f64>,
    envelope: Rect<f64>,
    env_area: f64,
}

struct QueuedNode {
    id: u64,
    point: Point<f64>,
}

struct QueuedWay {
    id: u64,
    nodes: Vec<u64>,
    geom: LineString<f64>,
    envelope: Rect<f64>,
}

const STATS_PAD: &str = "                           ";

#[derive(Default)]
pub struct ContainmentEngine {
    areas: Vec<StoredArea>,
    /// Area indices in ascending envelope-area order, fixed at freeze.
    order: Vec<usize>,
    dag: DirectedGraph,
    node_areas: FxHashMap<u64, Vec<u64>>,
    queued_nodes: Vec<QueuedNode>,
    queued_ways: Vec<QueuedWay>,
    frozen: bool,
}

impl ContainmentEngine {
    pub fn new() -> ContainmentEngine {
        ContainmentEngine::default()
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    /// Inserts an area into the DAG and the node→areas map. Returns false
    /// when the geometry is degenerate and the area cannot take part in
    /// containment.
    pub fn add_area(&mut self, area: &Area) -> bool {
        assert!(!self.frozen, "engine is frozen");
        let Some(envelope) = area.envelope() else {
            return false;
        };
        for node_id in &area.node_ids {
            let entry = self.node_areas.entry(*node_id).or_default();
            if !entry.contains(&area.id) {
                entry.push(area.id);
            }
        }

        let mut containers: Vec<u64> = Vec::new();
        let mut containees: Vec<u64> = Vec::new();
        for other in &self.areas {
            if !rect_intersects(&other.envelope, &envelope) {
                continue;
            }
            if rect_contains(&other.envelope, &envelope) && other.geom.contains(&area.geom) {
                containers.push(other.id);
            } else if rect_contains(&envelope, &other.envelope)
                && area.geom.contains(&other.geom)
            {
                containees.push(other.id);
            }
        }
        // direct container: contains no other container of the new area
        let direct_containers: Vec<u64> = containers
            .iter()
            .filter(|c| !containers.iter().any(|c2| *c2 != **c && self.dag.reaches(**c, *c2)))
            .copied()
            .collect();
        // direct containee: not already below another containee
        let direct_containees: Vec<u64> = containees
            .iter()
            .filter(|d| !containees.iter().any(|d2| *d2 != **d && self.dag.reaches(*d2, **d)))
            .copied()
            .collect();
        for c in &direct_containers {
            for d in &direct_containees {
                if self.dag.has_edge(*c, *d) {
                    self.dag.remove_edge(*c, *d);
                }
            }
            self.dag.add_edge(*c, area.id);
        }
        for d in &direct_containees {
            self.dag.add_edge(area.id, *d);
        }

        self.areas.push(StoredArea {
            id: area.id,
            geom: area.geom.clone(),
            envelope,
            env_area: area.envelope_area(),
        });
        true
    }

    /// Closes the DAG and the map; queries only run on a frozen engine.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.dag.freeze();
        let mut order: Vec<usize> = (0..self.areas.len()).collect();
        order.sort_by(|a, b| {
            self.areas[*a]
                .env_area
                .total_cmp(&self.areas[*b].env_area)
                .then(self.areas[*a].id.cmp(&self.areas[*b].id))
        });
        self.order = order;
        self.frozen = true;
    }

    /// Number of distinct node ids of `nodes` that belong to any area.
    pub fn member_node_count(&self, nodes: &[u64]) -> usize {
        let mut seen: FxHashSet<u64> = FxHashSet::default();
        nodes
            .iter()
            .filter(|n| self.node_areas.contains_key(n) && seen.insert(**n))
            .count()
    }

    pub fn queue_node(&mut self, id: u64, point: Point<f64>) {
        self.queued_nodes.push(QueuedNode { id, point });
    }

    pub fn queue_way(
        &mut self,
        id: u64,
        nodes: Vec<u64>,
        geom: LineString<f64>,
        envelope: Rect<f64>,
    ) {
        self.queued_ways.push(QueuedWay {
            id,
            nodes,
            geom,
            envelope,
        });
    }

    /// True when a node of the way is known to lie inside the candidate:
    /// either as a direct geometry member of the candidate or as a member of
    /// an area the DAG places below the candidate.
    fn node_inside_candidate(&self, nodes: &[u64], candidate: u64) -> bool {
        let descendants = self.dag.descendants_of(candidate);
        nodes.iter().any(|n| {
            self.node_areas.get(n).is_some_and(|areas| {
                areas.iter().any(|aid| {
                    *aid == candidate
                        || descendants.is_some_and(|d| d.contains(aid))
                })
            })
        })
    }

    /// Area ⊇ node sweep: emits `ogc:intersects` and `ogc:contains` for
    /// every (area, node) pair.
    pub fn dump_node_relations(
        &self,
        writer: &mut Writer,
        status: &mut dyn Write,
    ) -> Result<(), Error> {
        assert!(self.frozen, "engine not frozen");
        if self.queued_nodes.is_empty() {
            writeln!(status, "Skipping contains relation for nodes ... no nodes")?;
            return Ok(());
        }
        writeln!(
            status,
            "Contains relations for {} nodes in {} areas ...",
            self.queued_nodes.len(),
            self.areas.len()
        )?;

        let looked = AtomicU64::new(0);
        let skipped_dag = AtomicU64::new(0);
        let checks = AtomicU64::new(0);
        let yes = AtomicU64::new(0);

        let results: Vec<(u64, Vec<u64>)> = self
            .queued_nodes
            .par_iter()
            .map(|qn| {
                let mut result: FxHashSet<u64> = FxHashSet::default();
                for idx in &self.order {
                    let area = &self.areas[*idx];
                    if !rect_contains_point(&area.envelope, &qn.point) {
                        continue;
                    }
                    looked.fetch_add(1, Ordering::Relaxed);
                    if result.contains(&area.id) {
                        skipped_dag.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    checks.fetch_add(1, Ordering::Relaxed);
                    if area.geom.contains(&qn.point) {
                        yes.fetch_add(1, Ordering::Relaxed);
                        result.insert(area.id);
                        if let Some(ancestors) = self.dag.ancestors_of(area.id) {
                            result.extend(ancestors.iter().copied());
                        }
                    }
                }
                let ordered: Vec<u64> = self
                    .order
                    .iter()
                    .map(|i| self.areas[*i].id)
                    .filter(|id| result.contains(id))
                    .collect();
                (qn.id, ordered)
            })
            .collect();

        writer.set_section(Section::Spatial);
        for (node_id, area_ids) in results {
            let object = node_subject(node_id);
            for area_id in area_ids {
                let subject = area_subject(area_id);
                writer.write_triple(&subject, &Term::iri("ogc", "intersects"), &object)?;
                writer.write_triple(&subject, &Term::iri("ogc", "contains"), &object)?;
            }
        }

        writeln!(
            status,
            "... done with looking at {} areas, {} skipped by DAG",
            looked.load(Ordering::Relaxed),
            skipped_dag.load(Ordering::Relaxed)
        )?;
        writeln!(
            status,
            "{STATS_PAD}{} checks performed",
            checks.load(Ordering::Relaxed)
        )?;
        writeln!(
            status,
            "{STATS_PAD}contains: {} yes: {}",
            checks.load(Ordering::Relaxed),
            yes.load(Ordering::Relaxed)
        )?;
        Ok(())
    }

    /// Area ⊇ way sweep: emits `ogc:intersects_area` for every intersecting
    /// pair and `ogc:contains_area` when the candidate fully contains the
    /// way, both over the source way/relation IRIs.
    pub fn dump_way_relations(
        &self,
        writer: &mut Writer,
        status: &mut dyn Write,
    ) -> Result<(), Error> {
        assert!(self.frozen, "engine not frozen");
        if self.queued_ways.is_empty() {
            writeln!(status, "Skipping contains relation for ways ... no ways")?;
            return Ok(());
        }
        writeln!(
            status,
            "Contains relations for {} ways in {} areas ...",
            self.queued_ways.len(),
            self.areas.len()
        )?;

        let looked = AtomicU64::new(0);
        let inter_checks = AtomicU64::new(0);
        let inter_skip_dag = AtomicU64::new(0);
        let inter_skip_nodeinfo = AtomicU64::new(0);
        let inter_yes = AtomicU64::new(0);
        let cont_checks = AtomicU64::new(0);
        let cont_skip_dag = AtomicU64::new(0);
        let cont_env = AtomicU64::new(0);
        let cont_yes = AtomicU64::new(0);

        let results: Vec<(u64, Vec<(u64, bool)>)> = self
            .queued_ways
            .par_iter()
            .map(|qw| {
                let own_area = qw.id * 2;
                let mut pairs: Vec<(u64, bool)> = Vec::new();
                let mut known_containers: FxHashSet<u64> = FxHashSet::default();
                for idx in &self.order {
                    let area = &self.areas[*idx];
                    if area.id == own_area {
                        continue;
                    }
                    if !rect_intersects(&area.envelope, &qw.envelope) {
                        continue;
                    }
                    looked.fetch_add(1, Ordering::Relaxed);
                    if known_containers.contains(&area.id) {
                        inter_skip_dag.fetch_add(1, Ordering::Relaxed);
                        cont_skip_dag.fetch_add(1, Ordering::Relaxed);
                        pairs.push((area.id, true));
                        continue;
                    }
                    let intersects = if self.node_inside_candidate(&qw.nodes, area.id) {
                        inter_skip_nodeinfo.fetch_add(1, Ordering::Relaxed);
                        true
                    } else {
                        inter_checks.fetch_add(1, Ordering::Relaxed);
                        let hit = area.geom.intersects(&qw.geom);
                        if hit {
                            inter_yes.fetch_add(1, Ordering::Relaxed);
                        }
                        hit
                    };
                    if !intersects {
                        continue;
                    }
                    cont_checks.fetch_add(1, Ordering::Relaxed);
                    let mut contained = false;
                    if rect_contains(&area.envelope, &qw.envelope) {
                        cont_env.fetch_add(1, Ordering::Relaxed);
                        if area.geom.contains(&qw.geom) {
                            cont_yes.fetch_add(1, Ordering::Relaxed);
                            contained = true;
                        }
                    }
                    pairs.push((area.id, contained));
                    if contained {
                        if let Some(ancestors) = self.dag.ancestors_of(area.id) {
                            known_containers.extend(ancestors.iter().copied());
                        }
                    }
                }
                (qw.id, pairs)
            })
            .collect();

        writer.set_section(Section::Spatial);
        for (way_id, pairs) in results {
            let object = way_subject(way_id);
            for (area_id, contained) in pairs {
                let subject = area_subject(area_id);
                writer.write_triple(&subject, &Term::iri("ogc", "intersects_area"), &object)?;
                if contained {
                    writer.write_triple(&subject, &Term::iri("ogc", "contains_area"), &object)?;
                }
            }
        }

        writeln!(
            status,
            "... done with looking at {} areas",
            looked.load(Ordering::Relaxed)
        )?;
        writeln!(
            status,
            "{STATS_PAD}{} intersection checks performed, {} skipped by DAG, {} skipped by NodeInfo",
            inter_checks.load(Ordering::Relaxed),
            inter_skip_dag.load(Ordering::Relaxed),
            inter_skip_nodeinfo.load(Ordering::Relaxed)
        )?;
        writeln!(
            status,
            "{STATS_PAD}intersect: {} yes: {}",
            inter_checks.load(Ordering::Relaxed),
            inter_yes.load(Ordering::Relaxed)
        )?;
        writeln!(
            status,
            "{STATS_PAD}{} contains checks performed, {} skipped by DAG",
            cont_checks.load(Ordering::Relaxed),
            cont_skip_dag.load(Ordering::Relaxed)
        )?;
        writeln!(
            status,
            "{STATS_PAD}contains: {} contains envelope: {} yes: {}",
            cont_checks.load(Ordering::Relaxed),
            cont_env.load(Ordering::Relaxed),
            cont_yes.load(Ordering::Relaxed)
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::{line_from_coords, TagList, Way};

    fn square(id: u64, min: f64, max: f64) -> Area {
        let first = id * 100;
        let way = Way {
            id,
            nodes: vec![first, first + 1, first + 2, first + 3, first],
            geom: line_from_coords(&[
                (min, min),
                (max, min),
                (max, max),
                (min, max),
                (min, min),
            ]),
            tags: TagList::new(),
        };
        Area::from_way(&way).unwrap()
    }

    #[test]
    fn nested_areas_build_a_chain() {
        let mut engine = ContainmentEngine::new();
        assert!(engine.add_area(&square(1, 0.0, 10.0)));
        assert!(engine.add_area(&square(2, 1.0, 9.0)));
        assert!(engine.add_area(&square(3, 2.0, 8.0)));
        engine.freeze();
        // ids are 2·way_id
        assert!(engine.dag.has_edge(2, 4));
        assert!(engine.dag.has_edge(4, 6));
        assert!(!engine.dag.has_edge(2, 6));
        assert!(engine.dag.descendants_of(2).unwrap().contains(&6));
    }

    #[test]
    fn insertion_order_does_not_change_closure() {
        let areas = [square(1, 0.0, 10.0), square(2, 1.0, 9.0), square(3, 2.0, 8.0)];
        let orders: [[usize; 3]; 4] = [[0, 1, 2], [2, 1, 0], [1, 0, 2], [0, 2, 1]];
        let mut closures = Vec::new();
        for order in orders {
            let mut engine = ContainmentEngine::new();
            for i in order {
                engine.add_area(&areas[i]);
            }
            engine.freeze();
            let mut down: Vec<u64> = engine
                .dag
                .descendants_of(2)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default();
            down.sort_unstable();
            closures.push(down);
        }
        assert!(closures.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(vec![4, 6], closures[0]);
    }

    #[test]
    fn member_node_count_is_distinct() {
        let mut engine = ContainmentEngine::new();
        engine.add_area(&square(1, 0.0, 10.0));
        engine.freeze();
        // nodes 100..=103 belong to the area, the closing ref repeats 100
        assert_eq!(4, engine.member_node_count(&[100, 101, 102, 103, 100]));
        assert_eq!(0, engine.member_node_count(&[7, 8, 9]));
        assert_eq!(2, engine.member_node_count(&[100, 100, 101, 7]));
    }

    #[test]
    fn degenerate_area_is_rejected() {
        let area = Area {
            id: 2,
            geom: MultiPolygon::new(vec![]),
            node_ids: vec![],
            tags: TagList::new(),
        };
        let mut engine = ContainmentEngine::new();
        assert!(!engine.add_area(&area));
        assert_eq!(0, engine.area_count());
    }
}
