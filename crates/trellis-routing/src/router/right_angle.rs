//! Right-angle routing: a short orthogonal path picked from the sides both ends leave through.
//!
//! There is no search. Every combination of exit sides has its own layout of one to four
//! points, kept `margin` clear of element ends.

use serde::Deserialize;

use super::{RouteEnd, RouteRequest};
use crate::geom::{Point, Rect, RectExt, Side, point, point_box, rect};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RightAngleDirection {
    /// The side of the end box nearest to the anchor. `anchor-side` and `magnet-side` are the
    /// same thing here since the end box is the magnet box.
    #[default]
    Auto,
    AnchorSide,
    MagnetSide,
    Left,
    Right,
    Top,
    Bottom,
}

impl RightAngleDirection {
    fn side(self) -> Option<Side> {
        match self {
            RightAngleDirection::Left => Some(Side::Left),
            RightAngleDirection::Right => Some(Side::Right),
            RightAngleDirection::Top => Some(Side::Top),
            RightAngleDirection::Bottom => Some(Side::Bottom),
            RightAngleDirection::Auto
            | RightAngleDirection::AnchorSide
            | RightAngleDirection::MagnetSide => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RightAngleOptions {
    pub source_direction: RightAngleDirection,
    pub target_direction: RightAngleDirection,
    /// Clearance kept around element ends.
    pub margin: f64,
    /// Route through the vertices. When off, the vertices are ignored.
    pub use_vertices: bool,
}

impl Default for RightAngleOptions {
    fn default() -> Self {
        Self {
            source_direction: RightAngleDirection::Auto,
            target_direction: RightAngleDirection::Auto,
            margin: 20.0,
            use_vertices: true,
        }
    }
}

/// One stop of the route: an end or a vertex.
#[derive(Debug, Clone, Copy)]
struct Stop {
    point: Point,
    /// Box the route stays out of. Zero-sized for free points and vertices.
    area: Rect,
    element: bool,
    side: Option<Side>,
}

impl Stop {
    fn end(end: &RouteEnd, direction: RightAngleDirection) -> Self {
        let point = end.anchor.unwrap_or_else(|| end.bbox.center());
        let element = end.id.is_some();
        Self {
            point,
            area: if element { end.bbox } else { point_box(point) },
            element,
            side: direction.side(),
        }
    }

    fn vertex(vertex: Point, next: Point) -> Self {
        Self {
            point: vertex,
            area: point_box(vertex),
            element: false,
            side: Some(point_box(next).side_nearest_to_point(vertex)),
        }
    }

    /// The side the route leaves (or enters) through, given the point at the other end.
    fn exit_side(&self, other: Point) -> Side {
        match self.side {
            Some(side) => side,
            None if self.element => self.area.side_nearest_to_point(self.point),
            None => self.area.side_nearest_to_point(other),
        }
    }

    fn margin(&self, margin: f64) -> f64 {
        if self.element { margin } else { 0.0 }
    }
}

pub(crate) fn route(request: &RouteRequest<'_>, opts: &RightAngleOptions) -> Vec<Point> {
    let source = Stop::end(request.source, opts.source_direction);
    let target = Stop::end(request.target, opts.target_direction);
    if !opts.use_vertices || request.vertices.is_empty() {
        return between(&source, &target, opts.margin);
    }

    let mut out = Vec::new();
    let mut from = source;
    for (i, &vertex) in request.vertices.iter().enumerate() {
        let next = request.vertices.get(i + 1).copied().unwrap_or(target.point);
        let mut stop = Stop::vertex(vertex, next);
        out.extend(between(&from, &stop, opts.margin));
        if out.last() != Some(&vertex) {
            out.push(vertex);
        }
        stop.side = stop.side.map(Side::opposite);
        from = stop;
    }
    out.extend(between(&from, &target, opts.margin));
    out
}

/// `p` pushed out to the `side` edge of `margin_box`.
fn outside(p: Point, side: Side, margin_box: &Rect) -> Point {
    match side {
        Side::Left => point(margin_box.min_x(), p.y),
        Side::Right => point(margin_box.max_x(), p.y),
        Side::Top => point(p.x, margin_box.min_y()),
        Side::Bottom => point(p.x, margin_box.max_y()),
    }
}

fn grow(r: &Rect, by: f64) -> Rect {
    rect(r.min_x() - by, r.min_y() - by, r.width() + 2.0 * by, r.height() + 2.0 * by)
}

fn between(source: &Stop, target: &Stop, margin: f64) -> Vec<Point> {
    let p = point;
    let source_margin = source.margin(margin);
    let target_margin = target.margin(margin);
    let (s, t) = (source.area, target.area);
    let (sm, tm) = (grow(&s, source_margin), grow(&t, target_margin));
    let (sx0, sx1, sy0, sy1) = (s.min_x(), s.max_x(), s.min_y(), s.max_y());
    let (tx0, tx1, ty0, ty1) = (t.min_x(), t.max_x(), t.min_y(), t.max_y());
    let (smx0, smx1, smy0, smy1) = (sm.min_x(), sm.max_x(), sm.min_y(), sm.max_y());
    let (tmx0, tmx1, tmy0, tmy1) = (tm.min_x(), tm.max_x(), tm.min_y(), tm.max_y());

    let source_side = source.exit_side(target.point);
    let target_side = target.exit_side(source.point);
    let so = outside(source.point, source_side, &sm);
    let to = outside(target.point, target_side, &tm);
    let (sox, soy, tox, toy) = (so.x, so.y, to.x, to.y);

    let (scx, scy) = (s.center().x, s.center().y);
    let (tcx, tcy) = (t.center().x, t.center().y);
    // Halfway between the facing sides of the two boxes.
    let mid_x = if scx < tcx { (sx1 + tx0) / 2.0 } else { (tx1 + sx0) / 2.0 };
    let mid_y = if scy < tcy { (sy1 + ty0) / 2.0 } else { (ty1 + sy0) / 2.0 };

    // Detour height for opposite horizontal sides whose boxes overlap vertically.
    let detour_y = |y: f64| {
        if ty1 >= smy0 && toy < soy {
            tmy0.min(smy0)
        } else if ty0 <= smy1 && toy >= soy {
            tmy1.max(smy1)
        } else {
            y
        }
    };
    let detour_x = |x: f64| {
        if tx1 >= smx0 && tox < sox {
            tmx0.min(smx0)
        } else if tx0 <= smx1 && tox >= sox {
            tmx1.max(smx1)
        } else {
            x
        }
    };

    match (source_side, target_side) {
        (Side::Left, Side::Right) => {
            if smx0 <= tmx1 {
                let y = if sx1 <= tx0 { detour_y(mid_y) } else { mid_y };
                vec![p(sox, soy), p(sox, y), p(tox, y), p(tox, toy)]
            } else {
                let x = (sox + tox) / 2.0;
                vec![p(x, soy), p(x, toy)]
            }
        }
        (Side::Right, Side::Left) => {
            if smx1 >= tmx0 {
                let y = if sox > tx1 { detour_y(mid_y) } else { mid_y };
                vec![p(sox, soy), p(sox, y), p(tox, y), p(tox, toy)]
            } else {
                let x = (sox + tox) / 2.0;
                vec![p(x, soy), p(x, toy)]
            }
        }
        (Side::Top, Side::Bottom) => {
            if soy < toy {
                let x = if soy < ty0 { detour_x(mid_x) } else { mid_x };
                vec![p(sox, soy), p(x, soy), p(x, toy), p(tox, toy)]
            } else {
                let y = (soy + toy) / 2.0;
                vec![p(sox, y), p(tox, y)]
            }
        }
        (Side::Bottom, Side::Top) => {
            if soy - source_margin > toy {
                let x = if soy > ty1 { detour_x(mid_x) } else { mid_x };
                vec![p(sox, soy), p(x, soy), p(x, toy), p(tox, toy)]
            } else {
                let y = (soy + toy) / 2.0;
                vec![p(sox, y), p(tox, y)]
            }
        }
        (Side::Top, Side::Top) => {
            let top = soy.min(toy);
            let y1 = ((sy1 + ty0) / 2.0).min(toy);
            let y2 = ((sy0 + ty1) / 2.0).min(soy);
            let x = if toy < soy {
                if sox >= tmx1 || sox <= tmx0 {
                    return vec![p(sox, top), p(tox, top)];
                }
                if tox > sox { sox.min(tmx0) } else { sox.max(tmx1) }
            } else {
                if tox >= smx1 || tox <= smx0 {
                    return vec![p(sox, top), p(tox, top)];
                }
                if tox >= sox { tox.max(smx1) } else { tox.min(smx0) }
            };
            vec![p(sox, y2), p(x, y2), p(x, y1), p(tox, y1)]
        }
        (Side::Bottom, Side::Bottom) => {
            if tx0 >= sox + source_margin || tx1 <= sox - source_margin {
                let bottom = soy.max(toy);
                return vec![p(sox, bottom), p(tox, bottom)];
            }
            let (x, mid) = if toy > soy {
                let x = if tox > sox { sox.min(tmx0) } else { sox.max(tmx1) };
                (x, (sy1 + ty0) / 2.0)
            } else {
                let x = if tox > sox { tox.min(smx0) } else { tox.max(smx1) };
                (x, (sy0 + ty1) / 2.0)
            };
            let (y1, y2) = (mid.max(toy), mid.max(soy));
            vec![p(sox, y2), p(x, y2), p(x, y1), p(tox, y1)]
        }
        (Side::Left, Side::Left) | (Side::Right, Side::Right) => {
            let (x1, x2, away) = if source_side == Side::Left {
                (((sx1 + tx0) / 2.0).min(tox), ((sx0 + tx1) / 2.0).min(sox), tox > sox)
            } else {
                (((sx0 + tx1) / 2.0).max(tox), ((sx1 + tx0) / 2.0).max(sox), tox < sox)
            };
            let y = if away {
                if toy <= soy { smy0.min(toy) } else { smy1.max(toy) }
            } else if toy >= soy {
                tmy0.min(soy)
            } else {
                tmy1.max(soy)
            };
            vec![p(x2, soy), p(x2, y), p(x1, y), p(x1, toy)]
        }
        (Side::Top, Side::Right) => {
            if soy > toy {
                if sox < tox {
                    let y = if mid_y > tcy && mid_y < tmy1 && sox < tmx0 { tmy0 } else { mid_y };
                    return vec![p(sox, y), p(tox, y), p(tox, toy)];
                }
                return vec![p(sox, toy)];
            }
            if tox < sox && toy > sy0 && toy < sy1 {
                return vec![p(sox, soy), p(mid_x, soy), p(mid_x, toy)];
            }
            if (mid_x > smx0 && toy > sy0) || tx0 > sx1 {
                let y = smy0.min(tmy0);
                let x = smx1.max(tmx1);
                return vec![p(sox, y), p(x, y), p(x, toy)];
            }
            let x = mid_x.max(tox);
            vec![p(sox, soy), p(x, soy), p(x, toy)]
        }
        (Side::Top, Side::Left) => {
            if soy > toy {
                if sox > tox {
                    let y = if mid_y > tcy && mid_y < tmy1 && sox > tmx1 { tmy0 } else { mid_y };
                    return vec![p(sox, y), p(tox, y), p(tox, toy)];
                }
                return vec![p(sox, toy)];
            }
            if sox < tox && sy1 >= toy {
                return vec![p(sox, soy), p(mid_x, soy), p(mid_x, toy)];
            }
            if mid_x < smx1 && soy < ty1 {
                let y = smy0.min(tmy0);
                let x = smx0.min(tmx0);
                return vec![p(sox, y), p(x, y), p(x, toy)];
            }
            vec![p(sox, soy), p(mid_x, soy), p(mid_x, toy)]
        }
        (Side::Bottom, Side::Right) => {
            if soy < toy {
                if sox < tox {
                    let y = if mid_y < tcy && mid_y > tmy0 && sox < tmx0 { tmy1 } else { mid_y };
                    return vec![p(sox, y), p(tox, y), p(tox, toy)];
                }
                return vec![p(sox, toy)];
            }
            if sx0 < tox {
                let y = smy1.max(tmy1);
                let x = smx1.max(tmx1);
                return vec![p(sox, y), p(x, y), p(x, toy)];
            }
            vec![p(sox, soy), p(mid_x, soy), p(mid_x, toy)]
        }
        (Side::Bottom, Side::Left) => {
            if soy < toy {
                if sox > tox {
                    let y = if mid_y < tcy && mid_y > tmy0 && sox > tmx1 { tmy1 } else { mid_y };
                    return vec![p(sox, y), p(tox, y), p(tox, toy)];
                }
                return vec![p(sox, toy)];
            }
            if sx1 > tox {
                let y = smy1.max(tmy1);
                let x = smx0.min(tmx0);
                return vec![p(sox, y), p(x, y), p(x, toy)];
            }
            vec![p(sox, soy), p(mid_x, soy), p(mid_x, toy)]
        }
        (Side::Left, Side::Bottom) => {
            if sox > tox && soy >= tmy1 {
                return vec![p(tox, soy)];
            }
            if sox >= tx1 && soy < toy {
                return vec![p(mid_x, soy), p(mid_x, toy), p(tox, toy)];
            }
            if tox < sx1 && ty1 <= sy0 {
                return vec![p(sox, soy), p(sox, mid_y), p(tox, mid_y)];
            }
            let x = tmx0.min(sox);
            let y = smy1.max(tmy1);
            vec![p(x, soy), p(x, y), p(tox, y)]
        }
        (Side::Left, Side::Top) => {
            if sox > tox && soy < tmy0 {
                return vec![p(tox, soy)];
            }
            if sox >= tx1 && soy > toy {
                return vec![p(mid_x, soy), p(mid_x, toy), p(tox, toy)];
            }
            if tox <= sx1 && toy > soy {
                return vec![p(sox, soy), p(sox, mid_y), p(tox, mid_y)];
            }
            let x = if toy < soy { smx0.min(tmx0) } else { smx0 };
            let y = smy0.min(tmy0);
            vec![p(x, soy), p(x, y), p(tox, y)]
        }
        (Side::Right, Side::Top) => {
            if sox <= tox && soy < tmy0 {
                return vec![p(tox, soy)];
            }
            if sx1 < tx0 && soy > toy {
                return vec![p(mid_x, soy), p(mid_x, toy), p(tox, toy)];
            }
            if tox < sox && ty0 > sy1 {
                return vec![p(sox, soy), p(sox, mid_y), p(tox, mid_y)];
            }
            let x = smx1.max(tmx1);
            let y = smy0.min(tmy0);
            vec![p(x, soy), p(x, y), p(tox, y)]
        }
        (Side::Right, Side::Bottom) => {
            if sox < tox && soy >= tmy1 {
                return vec![p(tox, soy)];
            }
            if sox <= tmx0 && soy < toy {
                return vec![p(mid_x, soy), p(mid_x, toy), p(tox, toy)];
            }
            if tox > sx0 && ty1 < sy0 {
                return vec![p(sox, soy), p(sox, mid_y), p(tox, mid_y)];
            }
            let x = tmx1.max(sox);
            let y = smy1.max(tmy1);
            vec![p(x, soy), p(x, y), p(tox, y)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertices_face_the_next_stop() {
        let stop = Stop::vertex(point(200.0, 300.0), point(300.0, 150.0));
        assert_eq!(stop.side, Some(Side::Bottom));
        assert_eq!(stop.exit_side(point(0.0, 0.0)), Side::Bottom);
    }

    #[test]
    fn element_ends_grow_by_the_margin() {
        let end = RouteEnd::element("a", rect(0.0, 0.0, 100.0, 100.0))
            .with_anchor(point(100.0, 50.0));
        let stop = Stop::end(&end, RightAngleDirection::Auto);
        assert_eq!(stop.exit_side(point(0.0, 0.0)), Side::Right);
        assert_eq!(stop.margin(20.0), 20.0);
        let free = Stop::end(&RouteEnd::point(point(5.0, 5.0)), RightAngleDirection::Top);
        assert_eq!(free.margin(20.0), 0.0);
    }
}
