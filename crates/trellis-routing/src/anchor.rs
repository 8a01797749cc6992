//! Anchors: the point on an end's magnet a link aims at before clipping.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geom::{Point, PointExt, Rect, RectExt, Side, Sides};
use crate::spec::{Dimension, NamedSpec};
use crate::view::EndContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BBoxPoint {
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl BBoxPoint {
    fn of(self, r: &Rect) -> Point {
        match self {
            BBoxPoint::Center => r.center(),
            BBoxPoint::Top => r.top_middle(),
            BBoxPoint::Bottom => r.bottom_middle(),
            BBoxPoint::Left => r.left_middle(),
            BBoxPoint::Right => r.right_middle(),
            BBoxPoint::TopLeft => r.origin,
            BBoxPoint::TopRight => r.top_right(),
            BBoxPoint::BottomLeft => r.bottom_left(),
            BBoxPoint::BottomRight => r.corner(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BBoxAnchorOptions {
    pub dx: Option<Dimension>,
    pub dy: Option<Dimension>,
    /// Measure on the unrotated box and rotate the result with the element.
    pub rotate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerpendicularOptions {
    pub padding: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SideMode {
    PreferHorizontal,
    PreferVertical,
    Horizontal,
    Vertical,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MidSideOptions {
    pub padding: Option<f64>,
    pub rotate: bool,
    pub mode: SideMode,
    pub preference_threshold: Sides,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelCenterOptions {
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Anchor {
    BBox(BBoxPoint, BBoxAnchorOptions),
    Perpendicular(PerpendicularOptions),
    MidSide(MidSideOptions),
    ModelCenter(ModelCenterOptions),
}

impl Default for Anchor {
    fn default() -> Self {
        Anchor::BBox(BBoxPoint::Center, BBoxAnchorOptions::default())
    }
}

impl Anchor {
    pub fn from_spec(spec: &NamedSpec) -> Result<Self> {
        let bbox = |p: BBoxPoint| -> Result<Anchor> { Ok(Anchor::BBox(p, spec.options()?)) };
        match spec.name.as_str() {
            "center" => bbox(BBoxPoint::Center),
            "top" => bbox(BBoxPoint::Top),
            "bottom" => bbox(BBoxPoint::Bottom),
            "left" => bbox(BBoxPoint::Left),
            "right" => bbox(BBoxPoint::Right),
            "topLeft" => bbox(BBoxPoint::TopLeft),
            "topRight" => bbox(BBoxPoint::TopRight),
            "bottomLeft" => bbox(BBoxPoint::BottomLeft),
            "bottomRight" => bbox(BBoxPoint::BottomRight),
            "perpendicular" => Ok(Anchor::Perpendicular(spec.options()?)),
            "midSide" => Ok(Anchor::MidSide(spec.options()?)),
            "modelCenter" => Ok(Anchor::ModelCenter(spec.options()?)),
            other => Err(Error::UnknownAnchor {
                name: other.to_string(),
            }),
        }
    }

    /// Anchor point for `end`, given the point the link comes from.
    pub fn resolve(&self, end: &EndContext<'_>, reference: Point) -> Point {
        match self {
            Anchor::BBox(which, opts) => bbox_anchor(*which, opts, end),
            Anchor::Perpendicular(opts) => perpendicular(opts, end, reference),
            Anchor::MidSide(opts) => mid_side(opts, end, reference),
            Anchor::ModelCenter(opts) => {
                let base = end
                    .port
                    .and_then(|port| end.view.port_bbox(port))
                    .map(|r| r.center().rotate_around(end.center(), -end.angle()))
                    .unwrap_or_else(|| end.center());
                base.offset(opts.dx, opts.dy)
            }
        }
    }
}

fn bbox_anchor(which: BBoxPoint, opts: &BBoxAnchorOptions, end: &EndContext<'_>) -> Point {
    let bbox = if opts.rotate {
        end.magnet_unrotated_bbox()
    } else {
        end.magnet_bbox()
    };
    let mut anchor = which.of(&bbox);
    if let Some(dx) = opts.dx {
        anchor.x += dx.resolve(bbox.size.width);
    }
    if let Some(dy) = opts.dy {
        anchor.y += dy.resolve(bbox.size.height);
    }
    if opts.rotate {
        anchor.rotate_around(end.center(), -end.angle())
    } else {
        anchor
    }
}

fn perpendicular(opts: &PerpendicularOptions, end: &EndContext<'_>, reference: Point) -> Point {
    let angle = end.angle();
    let bbox = end.magnet_bbox();
    let mut anchor = bbox.center();
    let padding = if opts.padding.is_finite() {
        opts.padding
    } else {
        0.0
    };

    if bbox.min_y() + padding <= reference.y && reference.y <= bbox.max_y() - padding {
        let dy = reference.y - anchor.y;
        if angle != 0.0 && angle != 180.0 {
            anchor.x += dy / angle.to_radians().tan();
        }
        anchor.y += dy;
    } else if bbox.min_x() + padding <= reference.x && reference.x <= bbox.max_x() - padding {
        let dx = reference.x - anchor.x;
        if angle != 90.0 && angle != 270.0 {
            anchor.y += dx * angle.to_radians().tan();
        }
        anchor.x += dx;
    }
    anchor
}

fn mid_side(opts: &MidSideOptions, end: &EndContext<'_>, reference: Point) -> Point {
    let angle = end.angle();
    let center = end.center();
    let mut bbox = if opts.rotate {
        end.magnet_unrotated_bbox()
    } else {
        end.magnet_bbox()
    };
    if let Some(padding) = opts.padding.filter(|p| p.is_finite()) {
        bbox = bbox.inflate(padding, padding);
    }
    let reference = if opts.rotate {
        reference.rotate_around(center, angle)
    } else {
        reference
    };

    let anchor = bbox.side_point(middle_side(&bbox, reference, opts));
    if opts.rotate {
        anchor.rotate_around(center, -angle)
    } else {
        anchor
    }
}

fn middle_side(r: &Rect, p: Point, opts: &MidSideOptions) -> Side {
    let vertical = |p: Point| {
        if p.y < r.center().y {
            Side::Top
        } else {
            Side::Bottom
        }
    };
    let horizontal = |p: Point| {
        if p.x < r.center().x {
            Side::Left
        } else {
            Side::Right
        }
    };
    let threshold = &opts.preference_threshold;
    match opts.mode {
        SideMode::PreferVertical => {
            if p.y > r.min_y() - threshold.top && p.y < r.max_y() + threshold.bottom {
                horizontal(p)
            } else {
                vertical(p)
            }
        }
        SideMode::Vertical => vertical(p),
        SideMode::PreferHorizontal => {
            if p.x > r.min_x() - threshold.left && p.x < r.max_x() + threshold.right {
                vertical(p)
            } else {
                horizontal(p)
            }
        }
        SideMode::Horizontal => horizontal(p),
        SideMode::Auto => r.side_nearest_to_point(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{point, rect};
    use crate::view::ElementGeometry;
    use serde_json::json;

    fn anchor(name: &str, args: serde_json::Value) -> Anchor {
        Anchor::from_spec(&NamedSpec::with_args(name, args)).unwrap()
    }

    #[test]
    fn bbox_anchors_apply_percentage_offsets() {
        let view = ElementGeometry::new(rect(0.0, 0.0, 100.0, 40.0));
        let end = EndContext::new(&view);
        let a = anchor("topLeft", json!({"dx": "50%", "dy": 10}));
        assert_eq!(a.resolve(&end, point(0.0, 0.0)), point(50.0, 10.0));
    }

    #[test]
    fn perpendicular_anchor_follows_reference_within_span() {
        let view = ElementGeometry::new(rect(0.0, 0.0, 100.0, 40.0));
        let end = EndContext::new(&view);
        let a = anchor("perpendicular", json!({}));
        assert_eq!(a.resolve(&end, point(300.0, 30.0)), point(50.0, 30.0));
        assert_eq!(a.resolve(&end, point(20.0, 300.0)), point(20.0, 20.0));
        assert_eq!(a.resolve(&end, point(300.0, 300.0)), point(50.0, 20.0));
    }

    #[test]
    fn mid_side_picks_nearest_side() {
        let view = ElementGeometry::new(rect(0.0, 0.0, 100.0, 40.0));
        let end = EndContext::new(&view);
        let a = anchor("midSide", json!({}));
        assert_eq!(a.resolve(&end, point(95.0, 20.0)), point(100.0, 20.0));
        let a = anchor("midSide", json!({"mode": "vertical"}));
        assert_eq!(a.resolve(&end, point(95.0, 20.0)), point(50.0, 40.0));
    }

    #[test]
    fn unknown_anchor_names_are_rejected() {
        let err = Anchor::from_spec(&NamedSpec::new("nowhere")).unwrap_err();
        assert!(matches!(err, Error::UnknownAnchor { name } if name == "nowhere"));
    }
}
