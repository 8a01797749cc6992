//! Connection points clip the line arriving at an anchor against the end's geometry.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geom::{Line, Point, PointExt, RectExt, Shape, Side};
use crate::spec::{NamedSpec, Offset};
use crate::view::EndContext;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnchorPointOptions {
    pub offset: Offset,
    pub align: Option<Side>,
    pub align_offset: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClipOptions {
    pub offset: Offset,
    /// Inflate the clipping box by half the stroke width.
    pub stroke: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoundaryOptions {
    pub offset: f64,
    pub stroke: bool,
    pub selector: Option<String>,
    pub sticky: bool,
    pub insideout: bool,
    pub extrapolate: bool,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            offset: 0.0,
            stroke: false,
            selector: None,
            sticky: false,
            insideout: true,
            extrapolate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionPoint {
    Anchor(AnchorPointOptions),
    BBox(ClipOptions),
    Rectangle(ClipOptions),
    Boundary(BoundaryOptions),
}

impl Default for ConnectionPoint {
    fn default() -> Self {
        ConnectionPoint::BBox(ClipOptions::default())
    }
}

impl ConnectionPoint {
    pub fn from_spec(spec: &NamedSpec) -> Result<Self> {
        match spec.name.as_str() {
            "anchor" => Ok(ConnectionPoint::Anchor(spec.options()?)),
            "bbox" => Ok(ConnectionPoint::BBox(spec.options()?)),
            "rectangle" => Ok(ConnectionPoint::Rectangle(spec.options()?)),
            "boundary" => Ok(ConnectionPoint::Boundary(spec.options()?)),
            other => Err(Error::UnknownConnectionPoint {
                name: other.to_string(),
            }),
        }
    }

    /// Clips `line` (from the previous route point to the anchor) against `end`.
    pub fn resolve(&self, line: Line, end: &EndContext<'_>) -> Point {
        match self {
            ConnectionPoint::Anchor(opts) => {
                let line = match opts.align {
                    Some(side) => align_line(line, side, opts.align_offset),
                    None => line,
                };
                offset_point(line.end, line.start, opts.offset)
            }
            ConnectionPoint::BBox(opts) => bbox_intersection(line, end, opts),
            ConnectionPoint::Rectangle(opts) => rectangle_intersection(line, end, opts),
            ConnectionPoint::Boundary(opts) => boundary_intersection(line, end, opts),
        }
    }
}

fn stroke_inflation(end: &EndContext<'_>, enabled: bool) -> f64 {
    if enabled {
        end.view.stroke_width(end.selector) / 2.0
    } else {
        0.0
    }
}

fn bbox_intersection(line: Line, end: &EndContext<'_>, opts: &ClipOptions) -> Point {
    let inflate = stroke_inflation(end, opts.stroke);
    let bbox = end.magnet_bbox().inflate(inflate, inflate);
    let hits = line.intersect_rect(&bbox);
    let cp = line.start.choose_closest(&hits).unwrap_or(line.end);
    offset_point(cp, line.start, opts.offset)
}

fn rectangle_intersection(line: Line, end: &EndContext<'_>, opts: &ClipOptions) -> Point {
    let angle = end.angle();
    if angle == 0.0 {
        return bbox_intersection(line, end, opts);
    }
    let inflate = stroke_inflation(end, opts.stroke);
    let bbox = end.magnet_unrotated_bbox().inflate(inflate, inflate);
    let center = bbox.center();
    let local = line.rotate_around(center, angle);
    let hits = local.with_length(1e6).intersect_rect(&bbox);
    let cp = match local.start.choose_closest(&hits) {
        Some(p) => p.rotate_around(center, -angle),
        None => line.end,
    };
    offset_point(cp, line.start, opts.offset)
}

fn boundary_intersection(line: Line, end: &EndContext<'_>, opts: &BoundaryOptions) -> Point {
    let anchor = line.end;
    let selector = opts.selector.as_deref().or(end.selector);
    let shape = match end.port.and_then(|port| end.view.port_bbox(port)) {
        Some(port_box) => Shape::Rect(port_box),
        None => end.view.shape(selector),
    };
    let angle = end.angle();
    let pivot = end.center();

    let mut local = line.rotate_around(pivot, angle);
    let local_ref = local.start;

    if !opts.insideout && shape.bbox().contains_point(local_ref) {
        return anchor;
    }
    if opts.extrapolate {
        local = local.with_length(1e6);
    }

    let hits = shape.intersect_line(&local);
    let hit = match local_ref.choose_closest(&hits) {
        Some(p) => Some(p),
        None if opts.sticky => Some(shape.nearest_point(local_ref)),
        None => None,
    };

    let cp = hit
        .map(|p| p.rotate_around(pivot, -angle))
        .unwrap_or(anchor);
    let offset = opts.offset
        + if opts.stroke {
            end.view.stroke_width(selector) / 2.0
        } else {
            0.0
        };
    offset_point(cp, line.start, Offset::Along(offset))
}

/// Moves `p1` towards `p2` by `offset`, never past one unit short of `p2`.
fn offset_point(p1: Point, p2: Point, offset: Offset) -> Point {
    let (p1, p2, along) = match offset {
        Offset::Along(d) => (p1, p2, d),
        Offset::Xy { x, y } => {
            let shifted = Line::new(p2, p1).parallel(y);
            (shifted.end, shifted.start, x)
        }
    };
    if !along.is_finite() {
        return p1;
    }
    let length = p1.distance(p2);
    if along == 0.0 && length > 0.0 {
        return p1;
    }
    p1.move_from(p2, -along.min(length - 1.0))
}

fn align_line(line: Line, side: Side, offset: f64) -> Line {
    let Line { mut start, mut end } = line;
    match side {
        Side::Left | Side::Right => {
            let dir = if side == Side::Left { -1.0 } else { 1.0 };
            let x = if side == Side::Left {
                if start.x < end.x { start.x } else { end.x }
            } else if start.x < end.x {
                end.x
            } else {
                start.x
            };
            start.x = x + dir * offset;
            end.x = x + dir * offset;
        }
        Side::Top | Side::Bottom => {
            let dir = if side == Side::Top { -1.0 } else { 1.0 };
            let y = if side == Side::Top {
                if start.y < end.y { start.y } else { end.y }
            } else if start.y < end.y {
                end.y
            } else {
                start.y
            };
            start.y = y + dir * offset;
            end.y = y + dir * offset;
        }
    }
    Line::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{point, rect};
    use crate::view::ElementGeometry;
    use serde_json::json;

    fn cp(name: &str, args: serde_json::Value) -> ConnectionPoint {
        ConnectionPoint::from_spec(&NamedSpec::with_args(name, args)).unwrap()
    }

    #[test]
    fn bbox_clips_to_nearest_side() {
        let view = ElementGeometry::new(rect(0.0, 0.0, 100.0, 40.0));
        let end = EndContext::new(&view);
        let line = Line::new(point(200.0, 20.0), point(50.0, 20.0));
        assert_eq!(cp("bbox", json!({})).resolve(line, &end), point(100.0, 20.0));
        assert_eq!(
            cp("bbox", json!({"offset": 5})).resolve(line, &end),
            point(105.0, 20.0)
        );
    }

    #[test]
    fn missed_bbox_falls_back_to_anchor() {
        let view = ElementGeometry::new(rect(0.0, 0.0, 100.0, 40.0));
        let end = EndContext::new(&view);
        let line = Line::new(point(60.0, 20.0), point(50.0, 20.0));
        assert_eq!(cp("bbox", json!({})).resolve(line, &end), point(50.0, 20.0));
    }

    #[test]
    fn anchor_connection_point_aligns_to_side() {
        let view = ElementGeometry::new(rect(0.0, 0.0, 100.0, 40.0));
        let end = EndContext::new(&view);
        let line = Line::new(point(200.0, 100.0), point(50.0, 20.0));
        let p = cp("anchor", json!({"align": "bottom", "alignOffset": 10})).resolve(line, &end);
        assert_eq!(p, point(50.0, 110.0));
    }

    #[test]
    fn boundary_clips_ellipse_outline() {
        struct Disc;
        impl crate::view::EndView for Disc {
            fn bbox(&self) -> crate::geom::Rect {
                rect(0.0, 0.0, 40.0, 40.0)
            }
            fn shape(&self, _selector: Option<&str>) -> crate::geom::Shape {
                crate::geom::Shape::Ellipse {
                    center: point(20.0, 20.0),
                    rx: 20.0,
                    ry: 20.0,
                }
            }
        }
        let end = EndContext::new(&Disc);
        let line = Line::new(point(100.0, 20.0), point(20.0, 20.0));
        assert_eq!(cp("boundary", json!({})).resolve(line, &end), point(40.0, 20.0));
    }

    #[test]
    fn unknown_connection_point_is_rejected() {
        assert!(matches!(
            ConnectionPoint::from_spec(&NamedSpec::new("magnet")),
            Err(Error::UnknownConnectionPoint { .. })
        ));
    }
}
