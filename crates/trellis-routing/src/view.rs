//! Geometry a link end can be attached to.
//!
//! Anchors and connection points only see an end through [`EndView`]. The default
//! implementation, [`ElementGeometry`], describes an element by its model box, rotation and port
//! boxes. A renderer with real shape outlines implements the trait itself.

use crate::geom::{Point, Rect, RectExt, Shape, point};

pub trait EndView {
    /// Unrotated model box of the whole element.
    fn bbox(&self) -> Rect;

    /// Rotation in degrees, clockwise on screen, around the center of [`EndView::bbox`].
    fn angle(&self) -> f64 {
        0.0
    }

    /// Unrotated box of a sub-node. `None` addresses the element root.
    fn unrotated_bbox(&self, selector: Option<&str>) -> Rect {
        let _ = selector;
        self.bbox()
    }

    /// Outline of a sub-node in unrotated model coordinates.
    fn shape(&self, selector: Option<&str>) -> Shape {
        Shape::Rect(self.unrotated_bbox(selector))
    }

    fn stroke_width(&self, selector: Option<&str>) -> f64 {
        let _ = selector;
        0.0
    }

    /// Unrotated box of a port, if the element has one with this id.
    fn port_bbox(&self, port: &str) -> Option<Rect> {
        let _ = port;
        None
    }

    fn center(&self) -> Point {
        self.bbox().center()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementGeometry {
    pub bbox: Rect,
    pub angle: f64,
    pub ports: Vec<(String, Rect)>,
}

impl ElementGeometry {
    pub fn new(bbox: Rect) -> Self {
        Self {
            bbox,
            angle: 0.0,
            ports: Vec::new(),
        }
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_port(mut self, id: impl Into<String>, bbox: Rect) -> Self {
        self.ports.push((id.into(), bbox));
        self
    }
}

impl EndView for ElementGeometry {
    fn bbox(&self) -> Rect {
        self.bbox
    }

    fn angle(&self) -> f64 {
        self.angle
    }

    fn port_bbox(&self, port: &str) -> Option<Rect> {
        self.ports
            .iter()
            .find(|(id, _)| id == port)
            .map(|(_, bbox)| *bbox)
    }
}

/// One end of a link as seen by an anchor or a connection point: the attached view plus the
/// magnet on it (a port or a selected sub-node).
#[derive(Clone, Copy)]
pub struct EndContext<'a> {
    pub view: &'a dyn EndView,
    pub port: Option<&'a str>,
    pub selector: Option<&'a str>,
}

impl<'a> EndContext<'a> {
    pub fn new(view: &'a dyn EndView) -> Self {
        Self {
            view,
            port: None,
            selector: None,
        }
    }

    pub fn with_port(mut self, port: Option<&'a str>) -> Self {
        self.port = port;
        self
    }

    pub fn with_selector(mut self, selector: Option<&'a str>) -> Self {
        self.selector = selector;
        self
    }

    pub fn angle(&self) -> f64 {
        self.view.angle()
    }

    /// Element center, the pivot of the element rotation.
    pub fn center(&self) -> Point {
        self.view.center()
    }

    /// Unrotated box of the magnet (port box, selected node or the element itself).
    pub fn magnet_unrotated_bbox(&self) -> Rect {
        if let Some(port) = self.port {
            if let Some(bbox) = self.view.port_bbox(port) {
                return bbox;
            }
        }
        self.view.unrotated_bbox(self.selector)
    }

    /// Axis-aligned box of the magnet after the element rotation is applied.
    pub fn magnet_bbox(&self) -> Rect {
        rotate_rect_about(self.magnet_unrotated_bbox(), self.center(), self.angle())
    }
}

/// Bounding box of `r` rotated clockwise by `angle` degrees around `pivot`.
pub fn rotate_rect_about(r: Rect, pivot: Point, angle: f64) -> Rect {
    use crate::geom::PointExt;

    if angle % 360.0 == 0.0 {
        return r;
    }
    let corners = [r.origin, r.top_right(), r.corner(), r.bottom_left()]
        .map(|p| p.rotate_around(pivot, -angle));
    let mut min = corners[0];
    let mut max = corners[0];
    for p in &corners[1..] {
        min = point(min.x.min(p.x), min.y.min(p.y));
        max = point(max.x.max(p.x), max.y.max(p.y));
    }
    crate::geom::rect(min.x, min.y, max.x - min.x, max.y - min.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::rect;

    #[test]
    fn port_box_wins_over_element_box() {
        let view = ElementGeometry::new(rect(0.0, 0.0, 100.0, 50.0))
            .with_port("in", rect(-5.0, 20.0, 10.0, 10.0));
        let end = EndContext::new(&view).with_port(Some("in"));
        assert_eq!(end.magnet_bbox(), rect(-5.0, 20.0, 10.0, 10.0));

        let missing = EndContext::new(&view).with_port(Some("out"));
        assert_eq!(missing.magnet_bbox(), rect(0.0, 0.0, 100.0, 50.0));
    }
}
