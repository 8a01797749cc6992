//! Geometry over the whole graph: hit testing, bounding boxes, translation, scaling and
//! fitting parents to their children.

use serde_json::json;
use trellis_routing::geom::RectExt;
use trellis_routing::{Point, Rect, rect};

use super::{EmbeddedCellsOptions, FitOptions, Graph, SearchBy, TranslateOptions};
use crate::cell::{Cell, CellId, ChangeOptions, json_num};
use crate::error::{Error, Result};

impl Graph {
    /// Elements whose rotated box contains `p`.
    pub fn find_models_from_point(&self, p: Point) -> Vec<&Cell> {
        self.cells()
            .filter(|c| c.rotated_bbox().is_some_and(|b| b.contains_point(p)))
            .collect()
    }

    /// Elements overlapping `area`, or with `strict` fully inside it.
    pub fn find_models_in_area(&self, area: Rect, strict: bool) -> Vec<&Cell> {
        self.cells()
            .filter(|c| {
                c.rotated_bbox().is_some_and(|b| {
                    if strict {
                        area.contains_rect_inclusive(&b)
                    } else {
                        area.overlap(&b).is_some()
                    }
                })
            })
            .collect()
    }

    /// Elements under `id`, excluding the element itself and its descendants.
    pub fn find_models_under_element(&self, id: &str, search_by: SearchBy) -> Vec<&Cell> {
        let Some(bbox) = self.get_cell(id).and_then(Cell::rotated_bbox) else {
            return Vec::new();
        };
        let found = match search_by {
            SearchBy::BBox => self.find_models_in_area(bbox, false),
            other => self.find_models_from_point(rect_point(&bbox, other)),
        };
        found
            .into_iter()
            .filter(|c| c.id() != id && !self.is_embedded_in(c.id(), id, true))
            .collect()
    }

    /// Union of the rotated boxes of the given elements. Links are ignored.
    pub fn get_cells_bbox<'a>(&self, ids: impl IntoIterator<Item = &'a CellId>) -> Option<Rect> {
        ids.into_iter()
            .filter_map(|id| self.get_cell(id).and_then(Cell::rotated_bbox))
            .reduce(|acc, b| acc.union_with(&b))
    }

    /// Box around every element.
    pub fn get_bbox(&self) -> Option<Rect> {
        self.cells()
            .filter_map(Cell::rotated_bbox)
            .reduce(|acc, b| acc.union_with(&b))
    }

    /// Moves a cell and everything embedded in it.
    pub fn translate_cell(
        &mut self,
        id: &str,
        dx: f64,
        dy: f64,
        options: &TranslateOptions,
    ) -> Result<()> {
        let Some(cell) = self.get_cell(id) else {
            return Err(Error::NotInGraph { id: id.into() });
        };
        let (mut dx, mut dy) = (dx, dy);
        if let (Some(area), Some(position)) = (options.restricted_area, cell.position()) {
            let mut group = vec![CellId::from(id)];
            group.extend(self.embedded_ids(id, &EmbeddedCellsOptions::deep()));
            if let Some(bbox) = self.get_cells_bbox(&group) {
                let ox = position.x - bbox.min_x();
                let oy = position.y - bbox.min_y();
                let x = (area.min_x() + ox)
                    .max((area.max_x() + ox - bbox.width()).min(position.x + dx));
                let y = (area.min_y() + oy)
                    .max((area.max_y() + oy - bbox.height()).min(position.y + dy));
                dx = x - position.x;
                dy = y - position.y;
            }
        }
        if dx == 0.0 && dy == 0.0 {
            return Ok(());
        }
        let mut batch = self.batch("translate");
        batch.shift_subtree(id, dx, dy, &options.options)
    }

    fn shift_subtree(&mut self, id: &str, dx: f64, dy: f64, options: &ChangeOptions) -> Result<()> {
        self.update(id, |cell| cell.translate(dx, dy, options))?;
        for child in self.embedded_ids(id, &EmbeddedCellsOptions::default()) {
            self.shift_subtree(&child, dx, dy, options)?;
        }
        Ok(())
    }

    /// Moves every top-level cell. Embedded cells follow their parents.
    pub fn translate(&mut self, dx: f64, dy: f64, options: &ChangeOptions) -> Result<()> {
        let roots: Vec<CellId> = self
            .cells()
            .filter(|c| !c.is_embedded())
            .map(|c| c.id().clone())
            .collect();
        let translate = TranslateOptions {
            restricted_area: None,
            options: options.clone(),
        };
        for id in &roots {
            self.translate_cell(id, dx, dy, &translate)?;
        }
        Ok(())
    }

    /// Scales all cells so the element box becomes `width` x `height`.
    pub fn resize(&mut self, width: f64, height: f64, options: &ChangeOptions) -> Result<()> {
        let ids: Vec<CellId> = self.cells().map(|c| c.id().clone()).collect();
        self.resize_cells(width, height, &ids, options)
    }

    /// Scales `ids` about the origin of their element box. Without elements nothing happens.
    pub fn resize_cells(
        &mut self,
        width: f64,
        height: f64,
        ids: &[CellId],
        options: &ChangeOptions,
    ) -> Result<()> {
        let Some(bbox) = self.get_cells_bbox(ids) else {
            return Ok(());
        };
        // A flat axis has nothing to scale.
        let factor = |target: f64, current: f64| {
            if current > 0.0 {
                (target / current).max(0.0)
            } else {
                1.0
            }
        };
        let sx = factor(width, bbox.width());
        let sy = factor(height, bbox.height());
        for id in ids {
            if self.contains(id) {
                self.update(id, |cell| cell.scale(sx, sy, bbox.origin, options))?;
            }
        }
        Ok(())
    }

    /// Sets the element's box to the union of its child elements, plus padding.
    pub fn fit_to_children(&mut self, id: &str, options: &FitOptions) -> Result<()> {
        let Some(cell) = self.get_cell(id) else {
            return Err(Error::NotInGraph { id: id.into() });
        };
        if !cell.is_element() {
            return Err(Error::NotAnElement { id: id.into() });
        }
        let children = self.child_elements(id);
        if children.is_empty() {
            return Ok(());
        }
        let mut batch = self.batch("fit-embeds");
        if options.deep {
            for child in &children {
                batch.fit_to_children(child, options)?;
            }
        }
        batch.fit_to_elements(id, &children, options)
    }

    /// Fits the parent of `id` to its child elements. With `deep` the fitting continues up the
    /// ancestors, stopping after `terminator`.
    pub fn fit_parent(&mut self, id: &str, options: &FitOptions) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::NotInGraph { id: id.into() });
        }
        if options.deep && options.terminator.as_ref().is_some_and(|t| t == id) {
            return Ok(());
        }
        let Some(parent) = self
            .get_parent_cell(id)
            .filter(|p| p.is_element())
            .map(|p| p.id().clone())
        else {
            return Ok(());
        };
        let siblings = self.child_elements(&parent);
        if siblings.is_empty() {
            return Ok(());
        }
        let mut batch = self.batch("fit-parent");
        batch.fit_to_elements(&parent, &siblings, options)?;
        if options.deep {
            batch.fit_parent(&parent, options)?;
        }
        Ok(())
    }

    fn child_elements(&self, id: &str) -> Vec<CellId> {
        self.embedded_ids(id, &EmbeddedCellsOptions::default())
            .into_iter()
            .filter(|c| self.get_cell(c).is_some_and(Cell::is_element))
            .collect()
    }

    fn fit_to_elements(&mut self, id: &str, elements: &[CellId], options: &FitOptions) -> Result<()> {
        let Some(bbox) = self.get_cells_bbox(elements) else {
            return Ok(());
        };
        if options.expand_only && options.shrink_only {
            return Ok(());
        }
        let padding = options.padding;
        let mut result = rect(
            bbox.min_x() - padding.left,
            bbox.min_y() - padding.top,
            bbox.width() + padding.left + padding.right,
            bbox.height() + padding.top + padding.bottom,
        );
        let current = self.get_cell(id).and_then(Cell::bbox);
        if let Some(current) = current {
            if options.expand_only {
                result = current.union_with(&result);
            } else if options.shrink_only {
                let Some(overlap) = current.overlap(&result) else {
                    return Ok(());
                };
                result = overlap;
            }
        }
        self.update(id, |cell| {
            cell.set_position(result.origin, &options.options)?;
            cell.set(
                "size",
                json!({"width": json_num(result.width()), "height": json_num(result.height())}),
                &options.options,
            )
        })
    }
}

fn rect_point(bbox: &Rect, search_by: SearchBy) -> Point {
    match search_by {
        SearchBy::BBox | SearchBy::Origin | SearchBy::TopLeft => bbox.origin,
        SearchBy::Corner | SearchBy::BottomRight => bbox.corner(),
        SearchBy::TopRight => bbox.top_right(),
        SearchBy::TopMiddle => bbox.top_middle(),
        SearchBy::BottomLeft => bbox.bottom_left(),
        SearchBy::BottomMiddle => bbox.bottom_middle(),
        SearchBy::LeftMiddle => bbox.left_middle(),
        SearchBy::RightMiddle => bbox.right_middle(),
        SearchBy::Center => bbox.center(),
    }
}
