//! Embedding (parent/child) and z-order operations.

use std::collections::VecDeque;

use serde_json::Value;

use super::{EmbeddedCellsOptions, Graph, HashSet, ZOrderOptions};
use crate::cell::{Cell, CellId, ChangeOptions};
use crate::error::{Error, Result};

impl Graph {
    pub fn get_parent_cell(&self, id: &str) -> Option<&Cell> {
        let parent = self.get_cell(id)?.parent()?;
        self.get_cell(parent)
    }

    /// Ancestors from the parent outwards.
    pub fn get_ancestors(&self, id: &str) -> Vec<&Cell> {
        self.ancestor_ids(id)
            .iter()
            .filter_map(|a| self.get_cell(a))
            .collect()
    }

    fn ancestor_ids(&self, id: &str) -> Vec<CellId> {
        let mut out = Vec::new();
        let mut seen: HashSet<&str> = HashSet::default();
        seen.insert(id);
        let mut current = self.get_cell(id).and_then(Cell::parent);
        while let Some(parent) = current {
            if !seen.insert(parent.as_str()) {
                tracing::warn!(id, %parent, "embedding cycle");
                break;
            }
            let Some(cell) = self.get_cell(parent) else {
                tracing::warn!(id, %parent, "parent is not in the graph");
                break;
            };
            out.push(parent.clone());
            current = cell.parent();
        }
        out
    }

    /// Whether `id` sits below `ancestor`. Without `deep` only the direct parent counts.
    pub fn is_embedded_in(&self, id: &str, ancestor: &str, deep: bool) -> bool {
        let Some(cell) = self.get_cell(id) else {
            return false;
        };
        if !deep {
            return cell.parent().is_some_and(|p| p == ancestor);
        }
        self.ancestor_ids(id).iter().any(|a| a == ancestor)
    }

    /// Embedded cells of `id`. Deep listings are breadth- or depth-first in `embeds` order
    /// (or z order, with `sort_siblings`).
    pub fn get_embedded_cells(&self, id: &str, options: &EmbeddedCellsOptions) -> Vec<&Cell> {
        self.embedded_ids(id, options)
            .iter()
            .filter_map(|c| self.get_cell(c))
            .collect()
    }

    pub(crate) fn embedded_ids(&self, id: &str, options: &EmbeddedCellsOptions) -> Vec<CellId> {
        if !options.deep {
            return self.children(id, options.sort_siblings);
        }
        let mut out = Vec::new();
        let mut seen: HashSet<CellId> = HashSet::default();
        seen.insert(CellId::from(id));
        if options.breadth_first {
            let mut queue: VecDeque<CellId> = self.children(id, options.sort_siblings).into();
            while let Some(current) = queue.pop_front() {
                if !seen.insert(current.clone()) {
                    continue;
                }
                queue.extend(self.children(&current, options.sort_siblings));
                out.push(current);
            }
        } else {
            let mut stack: Vec<CellId> = self.children(id, options.sort_siblings);
            stack.reverse();
            while let Some(current) = stack.pop() {
                if !seen.insert(current.clone()) {
                    continue;
                }
                stack.extend(self.children(&current, options.sort_siblings).into_iter().rev());
                out.push(current);
            }
        }
        out
    }

    /// Direct children that are in the graph.
    fn children(&self, id: &str, sort_siblings: bool) -> Vec<CellId> {
        let Some(cell) = self.get_cell(id) else {
            return Vec::new();
        };
        let mut children: Vec<&Cell> = cell
            .embeds()
            .iter()
            .filter_map(|c| self.get_cell(c))
            .collect();
        if sort_siblings {
            children.sort_by_key(|c| c.z().unwrap_or(0));
        }
        children.into_iter().map(|c| c.id().clone()).collect()
    }

    /// Neither a child itself nor an ancestor of `parent`.
    pub fn can_embed(&self, parent: &str, children: &[CellId]) -> bool {
        children
            .iter()
            .all(|c| c != parent && !self.is_embedded_in(parent, c, true))
    }

    /// Embeds `children` into `parent`, updating both sides. Links are listed before
    /// elements in the parent's `embeds`.
    pub fn embed(&mut self, parent: &str, children: &[CellId], options: &ChangeOptions) -> Result<()> {
        let Some(parent_cell) = self.get_cell(parent) else {
            return Err(Error::NotInGraph { id: parent.into() });
        };
        let mut embeds = parent_cell.embeds().to_vec();
        for child in children {
            let Some(cell) = self.get_cell(child) else {
                return Err(Error::NotInGraph { id: child.clone() });
            };
            if child == parent || self.is_embedded_in(parent, child, true) {
                return Err(Error::RecursiveEmbedding {
                    parent: parent.into(),
                    child: child.clone(),
                });
            }
            if let Some(current) = cell.parent().filter(|p| *p != parent) {
                return Err(Error::AlreadyEmbedded {
                    child: child.clone(),
                    current: current.clone(),
                });
            }
            if cell.is_link() {
                embeds.insert(0, child.clone());
            } else {
                embeds.push(child.clone());
            }
        }
        let mut seen: HashSet<CellId> = HashSet::default();
        embeds.retain(|e| seen.insert(e.clone()));

        let mut batch = self.batch("embed");
        for child in children {
            batch.set(child, "parent", Value::String(parent.to_string()), options)?;
        }
        batch.set(parent, "embeds", ids_value(&embeds), options)?;
        Ok(())
    }

    pub fn unembed(&mut self, parent: &str, children: &[CellId], options: &ChangeOptions) -> Result<()> {
        let Some(parent_cell) = self.get_cell(parent) else {
            return Err(Error::NotInGraph { id: parent.into() });
        };
        let embeds: Vec<CellId> = parent_cell
            .embeds()
            .iter()
            .filter(|e| !children.contains(e))
            .cloned()
            .collect();
        let mut batch = self.batch("unembed");
        for child in children {
            if batch.contains(child) {
                batch.update(child, |cell| cell.remove_prop("parent", options))?;
            }
        }
        batch.update(parent, |cell| {
            if embeds.is_empty() {
                cell.remove_prop("embeds", options)
            } else {
                cell.set("embeds", ids_value(&embeds), options)
            }
        })
    }

    pub(crate) fn detach_child(&mut self, parent: &str, child: &CellId, options: &ChangeOptions) -> Result<()> {
        self.unembed(parent, std::slice::from_ref(child), options)
    }

    /// Nearest cell every given cell is embedded in. A single cell is its own answer.
    pub fn get_common_ancestor(&self, ids: &[CellId]) -> Option<&Cell> {
        match ids {
            [] => None,
            [only] => self.get_cell(only),
            _ => self.common_ancestor(ids),
        }
    }

    fn common_ancestor(&self, ids: &[CellId]) -> Option<&Cell> {
        let mut lists: Vec<Vec<CellId>> = ids.iter().map(|id| self.ancestor_ids(id)).collect();
        lists.sort_by_key(Vec::len);
        let (first, rest) = lists.split_first()?;
        let common = first
            .iter()
            .find(|a| rest.iter().all(|list| list.contains(a)))?;
        self.get_cell(common)
    }

    /// Follows link-to-link sources until an element. `None` for free ends and cycles.
    pub fn get_source_element(&self, link: &str) -> Option<&Cell> {
        self.follow_ends(link, |graph, id| graph.get_source_cell(id))
    }

    pub fn get_target_element(&self, link: &str) -> Option<&Cell> {
        self.follow_ends(link, |graph, id| graph.get_target_cell(id))
    }

    fn follow_ends<'a>(
        &'a self,
        link: &str,
        next: impl Fn(&'a Graph, &str) -> Option<&'a Cell>,
    ) -> Option<&'a Cell> {
        let mut seen: HashSet<&str> = HashSet::default();
        let mut cell = self.get_cell(link)?;
        loop {
            if !seen.insert(cell.id().as_str()) {
                return None;
            }
            cell = next(self, cell.id())?;
            if !cell.is_link() {
                return Some(cell);
            }
        }
    }

    /// Nearest common ancestor of a link and the elements at its ends.
    pub fn get_relationship_ancestor(&self, link: &str) -> Option<&Cell> {
        let mut ids = vec![CellId::from(link)];
        ids.extend(self.get_source_element(link).map(|c| c.id().clone()));
        ids.extend(self.get_target_element(link).map(|c| c.id().clone()));
        self.common_ancestor(&ids)
    }

    pub fn is_relationship_embedded_in(&self, link: &str, ancestor: &str) -> bool {
        self.get_relationship_ancestor(link).is_some_and(|a| {
            a.id() == ancestor || self.is_embedded_in(a.id(), ancestor, true)
        })
    }

    /// Both ends reference the same cell, or one end is embedded in the other.
    pub fn has_loop_deep(&self, link: &str) -> bool {
        let Some(cell) = self.get_cell(link) else {
            return false;
        };
        if cell.has_loop() {
            return true;
        }
        match (self.get_source_cell(link), self.get_target_cell(link)) {
            (Some(s), Some(t)) => {
                self.is_embedded_in(s.id(), t.id(), true) || self.is_embedded_in(t.id(), s.id(), true)
            }
            _ => false,
        }
    }

    /// Embeds a link into the nearest cell containing both its end elements. Returns the new
    /// parent.
    pub fn reparent_link(&mut self, link: &str, options: &ChangeOptions) -> Result<Option<CellId>> {
        if !self.get_cell(link).is_some_and(Cell::is_link) {
            return Err(Error::NotALink { id: link.into() });
        }
        let source = self.get_source_element(link).map(|c| c.id().clone());
        let target = self.get_target_element(link).map(|c| c.id().clone());
        let previous = self.get_parent_cell(link).map(|c| c.id().clone());
        let parent = match (source, target) {
            (Some(s), Some(t)) => {
                if s == t || self.is_embedded_in(&s, &t, true) {
                    Some(t)
                } else if self.is_embedded_in(&t, &s, true) {
                    Some(s)
                } else {
                    self.common_ancestor(&[s, t]).map(|c| c.id().clone())
                }
            }
            _ => None,
        };
        let link_id = [CellId::from(link)];
        if let Some(previous) = &previous {
            if parent.as_ref() != Some(previous) {
                self.unembed(previous, &link_id, options)?;
            }
        }
        if let Some(parent) = &parent {
            self.embed(parent, &link_id, options)?;
        }
        Ok(parent)
    }

    /// Raises the cell (and with `deep` its descendants) above every other cell.
    pub fn to_front(&mut self, id: &str, options: &ZOrderOptions) -> Result<()> {
        let cells = self.z_order_group(id, options)?;
        let count = cells.len() as i64;
        let z = self.max_z() - count + 1;
        let in_place = self.index_of(&cells[0]) == Some(self.len() - cells.len())
            && self.z_sequence_from(&cells, z);
        if in_place {
            return Ok(());
        }
        let mut batch = self.batch("to-front");
        batch.assign_z(&cells, z + count, &options.options)
    }

    /// Lowers the cell (and with `deep` its descendants) below every other cell.
    pub fn to_back(&mut self, id: &str, options: &ZOrderOptions) -> Result<()> {
        let cells = self.z_order_group(id, options)?;
        let count = cells.len() as i64;
        let z = self.min_z();
        let in_place = self.index_of(&cells[0]) == Some(0) && self.z_sequence_from(&cells, z);
        if in_place {
            return Ok(());
        }
        let mut batch = self.batch("to-back");
        batch.assign_z(&cells, z - count, &options.options)
    }

    fn z_order_group(&self, id: &str, options: &ZOrderOptions) -> Result<Vec<CellId>> {
        if !self.contains(id) {
            return Err(Error::NotInGraph { id: id.into() });
        }
        let mut cells = vec![CellId::from(id)];
        if options.deep {
            let embedded = EmbeddedCellsOptions {
                deep: true,
                breadth_first: options.breadth_first,
                sort_siblings: options.foreground_embeds,
            };
            cells.extend(self.embedded_ids(id, &embedded));
        }
        if !options.foreground_embeds {
            cells.sort_by_key(|c| self.get_cell(c).and_then(Cell::z).unwrap_or(0));
        }
        Ok(cells)
    }

    fn z_sequence_from(&self, cells: &[CellId], z: i64) -> bool {
        cells
            .iter()
            .zip(z..)
            .all(|(c, expected)| self.get_cell(c).and_then(Cell::z) == Some(expected))
    }

    fn assign_z(&mut self, cells: &[CellId], z: i64, options: &ChangeOptions) -> Result<()> {
        for (cell, z) in cells.iter().zip(z..) {
            self.set(cell, "z", Value::from(z), options)?;
        }
        Ok(())
    }
}

fn ids_value(ids: &[CellId]) -> Value {
    Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
}
