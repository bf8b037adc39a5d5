//! Two-pass ingest pipeline
//!
//! Pass 1 receives the assembled areas: their triples are written, the
//! containment engine is filled. Pass 2 receives nodes, ways and relations:
//! triples are written and containment candidates are queued. `finish` runs
//! the containment sweeps and reports the per-kind counters.

use std::io::Write;

use crate::contains::ContainmentEngine;
use crate::mapper;
use crate::osm::{Area, Node, OsmHandler, Relation, Way};
use crate::ttl::Writer;
use crate::Error;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    seen: u64,
    dumped: u64,
    geometry: u64,
}

pub struct DumpHandler<S: Write> {
    writer: Writer,
    engine: ContainmentEngine,
    status: S,
    areas: Counters,
    nodes: Counters,
    relations: Counters,
    ways: Counters,
}

impl<S: Write> DumpHandler<S> {
    pub fn new(writer: Writer, status: S) -> DumpHandler<S> {
        DumpHandler {
            writer,
            engine: ContainmentEngine::new(),
            status,
            areas: Counters::default(),
            nodes: Counters::default(),
            relations: Counters::default(),
            ways: Counters::default(),
        }
    }

    /// Runs the containment sweeps, reports the counters and closes the
    /// writer. Returns the status sink.
    pub fn finish(mut self) -> Result<S, Error> {
        for (kind, counters) in [
            ("areas", self.areas),
            ("nodes", self.nodes),
            ("relations", self.relations),
            ("ways", self.ways),
        ] {
            writeln!(
                self.status,
                "{} seen:{} dumped: {} geometry: {}",
                kind, counters.seen, counters.dumped, counters.geometry
            )?;
        }
        self.engine.freeze();
        self.engine
            .dump_node_relations(&mut self.writer, &mut self.status)?;
        self.engine
            .dump_way_relations(&mut self.writer, &mut self.status)?;
        self.writer.close()?;
        Ok(self.status)
    }
}

impl<S: Write> OsmHandler for DumpHandler<S> {
    fn on_area(&mut self, area: Area) -> Result<(), Error> {
        self.areas.seen += 1;
        mapper::write_area(&mut self.writer, &area)?;
        self.areas.dumped += 1;
        self.areas.geometry += 1;
        if !self.engine.add_area(&area) {
            writeln!(
                self.status,
                "area {} has a degenerate geometry, not used for containment",
                area.id
            )?;
        }
        Ok(())
    }

    fn freeze(&mut self) -> Result<(), Error> {
        self.engine.freeze();
        Ok(())
    }

    fn on_node(&mut self, node: Node) -> Result<(), Error> {
        self.nodes.seen += 1;
        if node.tags.is_empty() {
            return Ok(());
        }
        mapper::write_node(&mut self.writer, &node)?;
        self.nodes.dumped += 1;
        self.nodes.geometry += 1;
        self.engine.queue_node(node.id, node.point());
        Ok(())
    }

    fn on_way(&mut self, way: Way) -> Result<(), Error> {
        self.ways.seen += 1;
        mapper::write_way(&mut self.writer, &way)?;
        self.ways.dumped += 1;
        self.ways.geometry += 1;
        if self.engine.member_node_count(&way.nodes) >= 2 {
            if let Some(envelope) = way.envelope() {
                self.engine
                    .queue_way(way.id, way.nodes.clone(), way.geom.clone(), envelope);
            }
        }
        Ok(())
    }

    fn on_relation(&mut self, relation: Relation) -> Result<(), Error> {
        self.relations.seen += 1;
        if relation.tags.is_empty() && relation.members.is_empty() {
            return Ok(());
        }
        mapper::write_relation(&mut self.writer, &relation)?;
        self.relations.dumped += 1;
        Ok(())
    }
}
