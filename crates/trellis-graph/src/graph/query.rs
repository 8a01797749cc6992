//! Adjacency queries and traversals over links.

use std::collections::VecDeque;

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use super::{
    ConnectedLinksOptions, EmbeddedCellsOptions, Graph, HashMap, HashSet, NeighborOptions,
    SearchOptions, Visit,
};
use crate::cell::{Cell, CellId};
use crate::link::LinkEnd;

type IdSet = IndexSet<CellId, FxBuildHasher>;

impl Graph {
    /// Links attached to `id`, in discovery order and without duplicates.
    ///
    /// With `indirect`, links attached to the found links are followed too. With `deep`, links
    /// of embedded elements are added, except those whose both ends are embedded elements
    /// unless `include_enclosed` is set. A link from `id` itself to one of its descendants is
    /// always kept.
    pub fn get_connected_links(&self, id: &str, options: &ConnectedLinksOptions) -> Vec<&Cell> {
        self.connected_link_ids(id, options)
            .iter()
            .filter_map(|l| self.get_cell(l))
            .collect()
    }

    pub(crate) fn connected_link_ids(&self, id: &str, options: &ConnectedLinksOptions) -> Vec<CellId> {
        let (inbound, outbound) = options.direction.resolve();
        let mut found = IdSet::default();
        if outbound {
            self.collect_outbound(id, options.indirect, inbound, &mut found);
        }
        if inbound {
            self.collect_inbound(id, options.indirect, outbound, &mut found);
        }

        if options.deep {
            let embedded = self.embedded_ids(id, &EmbeddedCellsOptions::deep());
            let elements: HashSet<&str> = embedded
                .iter()
                .filter(|c| self.get_cell(c).is_some_and(Cell::is_element))
                .map(CellId::as_str)
                .collect();
            let enclosed = |link: &CellId| {
                let Some((source, target)) = self.topology.ends(link) else {
                    return false;
                };
                source.as_ref().is_some_and(|s| elements.contains(s.as_str()))
                    && target.as_ref().is_some_and(|t| elements.contains(t.as_str()))
            };
            for cell in &embedded {
                if !elements.contains(cell.as_str()) {
                    continue;
                }
                let mut candidates: Vec<&CellId> = Vec::new();
                if outbound {
                    candidates.extend(self.topology.outbound(cell));
                }
                if inbound {
                    candidates.extend(self.topology.inbound(cell));
                }
                for link in candidates {
                    if found.contains(link) {
                        continue;
                    }
                    if !options.include_enclosed && enclosed(link) {
                        continue;
                    }
                    found.insert(link.clone());
                }
            }
        }
        found.into_iter().collect()
    }

    fn collect_outbound(&self, id: &str, indirect: bool, inbound: bool, found: &mut IdSet) {
        for link in self.topology.outbound(id) {
            if !found.insert(link.clone()) {
                continue;
            }
            if indirect {
                if inbound {
                    self.collect_inbound(link, indirect, true, found);
                }
                self.collect_outbound(link, indirect, inbound, found);
            }
        }
        if indirect {
            // A link whose target is another link continues through it.
            if let Some(next) = self.get_target_cell(id).filter(|c| c.is_link()) {
                if found.insert(next.id().clone()) {
                    self.collect_outbound(next.id(), indirect, inbound, found);
                }
            }
        }
    }

    fn collect_inbound(&self, id: &str, indirect: bool, outbound: bool, found: &mut IdSet) {
        for link in self.topology.inbound(id) {
            if !found.insert(link.clone()) {
                continue;
            }
            if indirect {
                self.collect_inbound(link, indirect, outbound, found);
                if outbound {
                    self.collect_outbound(link, indirect, true, found);
                }
            }
        }
        if indirect {
            if let Some(prev) = self.get_source_cell(id).filter(|c| c.is_link()) {
                if found.insert(prev.id().clone()) {
                    self.collect_inbound(prev.id(), indirect, outbound, found);
                }
            }
        }
    }

    /// The cell a link's source references, if it is in the graph.
    pub fn get_source_cell(&self, link: &str) -> Option<&Cell> {
        let id = self.get_cell(link)?.source()?.id()?;
        self.get_cell(id)
    }

    pub fn get_target_cell(&self, link: &str) -> Option<&Cell> {
        let id = self.get_cell(link)?.target()?.id()?;
        self.get_cell(id)
    }

    /// Elements joined to `id` by a link, without duplicates.
    ///
    /// An element with a self-loop is its own neighbor. With `deep`, neighbors of embedded
    /// elements count, but the descendants themselves do not.
    pub fn get_neighbors(&self, id: &str, options: &NeighborOptions) -> Vec<&Cell> {
        let (inbound, outbound) = options.direction.resolve();
        let mut neighbors = IdSet::default();
        for link in self.get_connected_links(id, options) {
            let looped = if options.deep {
                self.has_loop_deep(link.id())
            } else {
                link.has_loop()
            };
            let ends = [
                (inbound, link.source().and_then(LinkEnd::id)),
                (outbound, link.target().and_then(LinkEnd::id)),
            ];
            for (wanted, end) in ends {
                let Some(end) = end.filter(|_| wanted) else {
                    continue;
                };
                if neighbors.contains(end) || !self.get_cell(end).is_some_and(Cell::is_element) {
                    continue;
                }
                let outside =
                    end.as_str() != id && !(options.deep && self.is_embedded_in(end, id, true));
                if looped || outside {
                    neighbors.insert(end.clone());
                }
            }
        }
        if self.get_cell(id).is_some_and(Cell::is_link) {
            let ends = [
                (inbound, self.get_source_cell(id)),
                (outbound, self.get_target_cell(id)),
            ];
            for (wanted, cell) in ends {
                if let Some(cell) = cell.filter(|c| wanted && c.is_element()) {
                    neighbors.insert(cell.id().clone());
                }
            }
        }
        neighbors.iter().filter_map(|n| self.get_cell(n)).collect()
    }

    /// Whether a link joins `id` to `other` in the requested direction.
    pub fn is_neighbor(&self, id: &str, other: &str, options: &NeighborOptions) -> bool {
        let (inbound, outbound) = options.direction.resolve();
        self.get_connected_links(id, options).into_iter().any(|link| {
            let source = link.source().and_then(LinkEnd::id);
            let target = link.target().and_then(LinkEnd::id);
            (inbound && source.is_some_and(|s| s == other))
                || (outbound && target.is_some_and(|t| t == other))
        })
    }

    /// Walks the neighbor relation from `start`, calling `visit` with each element and its
    /// distance from `start`. Every element is visited once. Returning [`Visit::Prune`] stops
    /// the walk from expanding that element.
    pub fn search(
        &self,
        start: &str,
        options: &SearchOptions,
        visit: impl FnMut(&Cell, usize) -> Visit,
    ) {
        if options.breadth_first {
            self.bfs(start, &options.neighbors, visit);
        } else {
            self.dfs(start, &options.neighbors, visit);
        }
    }

    pub fn bfs(
        &self,
        start: &str,
        options: &NeighborOptions,
        mut visit: impl FnMut(&Cell, usize) -> Visit,
    ) {
        let Some(start) = self.get_cell(start) else {
            return;
        };
        let mut visited: HashSet<&str> = HashSet::default();
        let mut distance: HashMap<&str, usize> = HashMap::default();
        let mut queue = VecDeque::from([start]);
        distance.insert(start.id().as_str(), 0);
        while let Some(next) = queue.pop_front() {
            if !visited.insert(next.id().as_str()) {
                continue;
            }
            let d = distance.get(next.id().as_str()).copied().unwrap_or(0);
            if visit(next, d) == Visit::Prune {
                continue;
            }
            for neighbor in self.get_neighbors(next.id(), options) {
                distance.entry(neighbor.id().as_str()).or_insert(d + 1);
                queue.push_back(neighbor);
            }
        }
    }

    pub fn dfs(
        &self,
        start: &str,
        options: &NeighborOptions,
        mut visit: impl FnMut(&Cell, usize) -> Visit,
    ) {
        let Some(start) = self.get_cell(start) else {
            return;
        };
        let mut visited: HashSet<&str> = HashSet::default();
        self.dfs_from(start, options, &mut visit, &mut visited, 0);
    }

    fn dfs_from<'a>(
        &'a self,
        cell: &'a Cell,
        options: &NeighborOptions,
        visit: &mut impl FnMut(&Cell, usize) -> Visit,
        visited: &mut HashSet<&'a str>,
        distance: usize,
    ) {
        if !visited.insert(cell.id().as_str()) {
            return;
        }
        if visit(cell, distance) == Visit::Prune {
            return;
        }
        for neighbor in self.get_neighbors(cell.id(), options) {
            self.dfs_from(neighbor, options, visit, visited, distance + 1);
        }
    }

    /// Elements reachable from `id` along outbound links, excluding `id`.
    pub fn get_successors(&self, id: &str, options: &SearchOptions) -> Vec<&Cell> {
        let mut options = *options;
        options.neighbors.direction.outbound = Some(true);
        self.collect_reachable(id, &options)
    }

    pub fn get_predecessors(&self, id: &str, options: &SearchOptions) -> Vec<&Cell> {
        let mut options = *options;
        options.neighbors.direction.inbound = Some(true);
        self.collect_reachable(id, &options)
    }

    fn collect_reachable(&self, id: &str, options: &SearchOptions) -> Vec<&Cell> {
        let mut ids = Vec::new();
        self.search(id, options, |cell, _| {
            if cell.id() != id {
                ids.push(cell.id().clone());
            }
            Visit::Continue
        });
        ids.iter().filter_map(|i| self.get_cell(i)).collect()
    }

    pub fn is_successor(&self, id: &str, other: &str) -> bool {
        self.reaches(id, other, &NeighborOptions::outbound())
    }

    pub fn is_predecessor(&self, id: &str, other: &str) -> bool {
        self.reaches(id, other, &NeighborOptions::inbound())
    }

    fn reaches(&self, from: &str, to: &str, options: &NeighborOptions) -> bool {
        let mut found = false;
        self.dfs(from, options, |cell, _| {
            if found {
                return Visit::Prune;
            }
            if cell.id() == to && cell.id() != from {
                found = true;
                return Visit::Prune;
            }
            Visit::Continue
        });
        found
    }

    /// Elements without inbound links.
    pub fn get_sources(&self) -> Vec<&Cell> {
        self.cells()
            .filter(|c| c.is_element() && !self.topology.has_inbound(c.id()))
            .collect()
    }

    /// Elements without outbound links.
    pub fn get_sinks(&self) -> Vec<&Cell> {
        self.cells()
            .filter(|c| c.is_element() && !self.topology.has_outbound(c.id()))
            .collect()
    }

    pub fn is_source(&self, id: &str) -> bool {
        !self.topology.has_inbound(id)
    }

    pub fn is_sink(&self, id: &str) -> bool {
        !self.topology.has_outbound(id)
    }

    /// The given cells (and, with `deep`, their descendants), the elements their links attach
    /// to, and every link joining two cells of that set.
    pub fn get_subgraph(&self, ids: &[CellId], deep: bool) -> Vec<&Cell> {
        let mut members = IdSet::default();
        let mut elements = Vec::new();
        let mut links = Vec::new();
        let mut push = |cell: &Cell, members: &mut IdSet| {
            if members.insert(cell.id().clone()) {
                if cell.is_link() {
                    links.push(cell.id().clone());
                } else {
                    elements.push(cell.id().clone());
                }
            }
        };
        for id in ids {
            let Some(cell) = self.get_cell(id) else {
                continue;
            };
            push(cell, &mut members);
            if deep {
                for embedded in self.get_embedded_cells(id, &EmbeddedCellsOptions::deep()) {
                    push(embedded, &mut members);
                }
            }
        }
        for link in &links {
            let ends = [self.get_source_cell(link), self.get_target_cell(link)];
            for end in ends.into_iter().flatten() {
                if members.insert(end.id().clone()) {
                    elements.push(end.id().clone());
                }
            }
        }
        let connected = ConnectedLinksOptions {
            deep,
            ..ConnectedLinksOptions::default()
        };
        for element in &elements {
            for link in self.connected_link_ids(element, &connected) {
                if members.contains(&link) {
                    continue;
                }
                let Some((Some(source), Some(target))) = self.topology.ends(&link) else {
                    continue;
                };
                if members.contains(source) && members.contains(target) {
                    members.insert(link);
                }
            }
        }
        members.iter().filter_map(|m| self.get_cell(m)).collect()
    }
}
