//! Graph serialization and JSON-driven synchronization.
//!
//! The serialized form is `{"cells": [...]}` where every cell is in its flattened form (see
//! [`Cell::to_json`]). Cells are built through the graph's [`CellRegistry`](crate::CellRegistry).

use serde_json::{Map, Value, json};

use crate::cell::{Cell, CellId, ChangeOptions};
use crate::error::{Error, Result};
use crate::graph::{AddOptions, Graph, HashSet, RemoveOptions};

impl Graph {
    /// `{"cells": [...]}` in z order.
    pub fn to_json(&self) -> Value {
        json!({ "cells": self.cells().map(Cell::to_json).collect::<Vec<_>>() })
    }

    /// Replaces all cells with the ones in `json`.
    pub fn from_json(&mut self, json: &Value, options: &ChangeOptions) -> Result<()> {
        let Some(cells) = json.get("cells").and_then(Value::as_array) else {
            return Err(Error::MissingCells);
        };
        let cells = self.cells_from_json(cells)?;
        self.reset_cells(cells, options)
    }

    pub fn add_json(&mut self, cell: &Value, options: &AddOptions) -> Result<()> {
        let cell = self.create_cell(cell)?;
        self.add_cell(cell, options)
    }

    pub fn add_cells_json(&mut self, cells: &[Value], options: &AddOptions) -> Result<()> {
        let cells = self.cells_from_json(cells)?;
        self.add_cells(cells, options)
    }

    fn cells_from_json(&self, cells: &[Value]) -> Result<Vec<Cell>> {
        cells.iter().map(|c| self.create_cell(c)).collect()
    }

    /// Brings the graph in line with `cells`.
    ///
    /// New ids are added. Existing cells of the same type get every given top-level key set;
    /// keys they have that `cells` omits are left alone. A cell whose type changed is replaced
    /// in place, keeping its z. With `remove`, cells missing from `cells` are removed last.
    ///
    /// Every cell is checked before the graph is touched: on error nothing changes and no event
    /// fires.
    pub fn sync_cells(&mut self, cells: &[Value], remove: bool, options: &ChangeOptions) -> Result<()> {
        let mut built = Vec::with_capacity(cells.len());
        for json in cells {
            let cell = self.create_cell(json)?;
            let Value::Object(map) = json else {
                continue;
            };
            built.push((cell, map));
        }

        let mut fresh = Vec::new();
        let mut replaced = Vec::new();
        let mut existing = Vec::new();
        for (cell, map) in built {
            match self.get_cell(cell.id()).map(|c| c.cell_type() == cell.cell_type()) {
                None => fresh.push(cell),
                Some(true) => existing.push((cell, map)),
                Some(false) => replaced.push(cell),
            }
        }
        self.check_sync(&fresh, &replaced, &existing, options)?;

        let mut batch = self.batch("sync-cells");
        let add = AddOptions {
            dry: false,
            options: options.clone(),
        };
        let keep: HashSet<CellId> = fresh
            .iter()
            .chain(&replaced)
            .chain(existing.iter().map(|(c, _)| c))
            .map(|c| c.id().clone())
            .collect();
        batch.add_cells(fresh, &add)?;
        for cell in replaced {
            batch.replace_cell(cell, &add)?;
        }
        for (cell, map) in existing {
            batch.update(cell.id(), |target| apply_keys(target, &cell, map, options))?;
        }
        if remove {
            let stale: Vec<CellId> = batch
                .cells()
                .filter(|c| !keep.contains(c.id()))
                .map(|c| c.id().clone())
                .collect();
            if !stale.is_empty() {
                tracing::debug!(count = stale.len(), "removing cells missing from sync");
                batch.remove_cells(&stale, &RemoveOptions {
                    disconnect_links: false,
                    options: options.clone(),
                })?;
            }
        }
        Ok(())
    }

    /// Runs the add and update validations of every step of a sync before any step applies.
    fn check_sync(
        &self,
        fresh: &[Cell],
        replaced: &[Cell],
        existing: &[(Cell, &Map<String, Value>)],
        options: &ChangeOptions,
    ) -> Result<()> {
        let incoming: HashSet<&str> = fresh.iter().map(|c| c.id().as_str()).collect();
        for cell in fresh.iter().chain(replaced) {
            self.validate_cell(cell, &incoming)?;
        }
        for (cell, map) in existing {
            let Some(current) = self.get_cell(cell.id()) else {
                continue;
            };
            let mut preview = current.clone();
            apply_keys(&mut preview, cell, map, options)?;
            self.validate_updated(&preview, current, &incoming)?;
        }
        Ok(())
    }
}

/// Sets the top-level keys present in `given` from the registry-built `built` (which includes
/// the type defaults under them).
fn apply_keys(
    target: &mut Cell,
    built: &Cell,
    given: &Map<String, Value>,
    options: &ChangeOptions,
) -> Result<()> {
    for key in given.keys() {
        if key == "id" || key == "type" {
            continue;
        }
        let value = built.top_value(key).unwrap_or(Value::Null);
        if target.top_value(key).as_ref() == Some(&value) {
            continue;
        }
        if value.is_null() {
            target.remove_prop(key.as_str(), options)?;
        } else {
            target.set(key.as_str(), value, options)?;
        }
    }
    Ok(())
}
