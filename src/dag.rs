//! Directed acyclic graph of area containment
//!
//! An edge `container → containee` records direct containment; edges made
//! redundant by transitivity are pruned on insertion. The closure is
//! computed once when the graph is frozen and queried read-only afterwards.

use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Default)]
pub struct DirectedGraph {
    children: FxHashMap<u64, Vec<u64>>,
    parents: FxHashMap<u64, Vec<u64>>,
    descendants: FxHashMap<u64, FxHashSet<u64>>,
    ancestors: FxHashMap<u64, FxHashSet<u64>>,
    frozen: bool,
}

impl DirectedGraph {
    pub fn new() -> DirectedGraph {
        DirectedGraph::default()
    }

    pub fn add_edge(&mut self, from: u64, to: u64) {
        assert!(!self.frozen, "graph is frozen");
        debug_assert!(!self.reaches(to, from), "edge {from}->{to} would close a cycle");
        let children = self.children.entry(from).or_default();
        if !children.contains(&to) {
            children.push(to);
            self.parents.entry(to).or_default().push(from);
        }
    }

    pub fn remove_edge(&mut self, from: u64, to: u64) {
        assert!(!self.frozen, "graph is frozen");
        if let Some(children) = self.children.get_mut(&from) {
            children.retain(|c| *c != to);
        }
        if let Some(parents) = self.parents.get_mut(&to) {
            parents.retain(|p| *p != from);
        }
    }

    pub fn has_edge(&self, from: u64, to: u64) -> bool {
        self.children
            .get(&from)
            .is_some_and(|c| c.contains(&to))
    }

    pub fn children_of(&self, id: u64) -> &[u64] {
        self.children.get(&id).map_or(&[], |v| v.as_slice())
    }

    pub fn parents_of(&self, id: u64) -> &[u64] {
        self.parents.get(&id).map_or(&[], |v| v.as_slice())
    }

    /// True when `to` is reachable from `from` over one or more edges.
    /// Usable before the freeze; the frozen closure answers in O(1).
    pub fn reaches(&self, from: u64, to: u64) -> bool {
        if self.frozen {
            return self
                .descendants
                .get(&from)
                .is_some_and(|d| d.contains(&to));
        }
        let mut stack: Vec<u64> = self.children_of(from).to_vec();
        let mut seen = FxHashSet::default();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if seen.insert(id) {
                stack.extend_from_slice(self.children_of(id));
            }
        }
        false
    }

    /// Computes the transitive closure. Further edge mutation panics.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        let ids: Vec<u64> = self
            .children
            .keys()
            .chain(self.parents.keys())
            .copied()
            .collect();
        for id in ids {
            let mut down = FxHashSet::default();
            self.collect(id, &mut down, true);
            self.descendants.insert(id, down);
            let mut up = FxHashSet::default();
            self.collect(id, &mut up, false);
            self.ancestors.insert(id, up);
        }
        self.frozen = true;
    }

    fn collect(&self, id: u64, acc: &mut FxHashSet<u64>, down: bool) {
        let next = if down {
            self.children_of(id)
        } else {
            self.parents_of(id)
        };
        for n in next {
            if acc.insert(*n) {
                self.collect(*n, acc, down);
            }
        }
    }

    /// All ids reachable below `id` (transitively contained areas).
    pub fn descendants_of(&self, id: u64) -> Option<&FxHashSet<u64>> {
        debug_assert!(self.frozen, "closure queried before freeze");
        self.descendants.get(&id)
    }

    /// All ids above `id` (areas transitively containing it).
    pub fn ancestors_of(&self, id: u64) -> Option<&FxHashSet<u64>> {
        debug_assert!(self.frozen, "closure queried before freeze");
        self.ancestors.get(&id)
    }
}
