//! Orthogonal routing without obstacle avoidance.
//!
//! The link is split into partial routes (source → vertex → ... → target) and each pair of
//! consecutive points is joined by one or two right-angle bends, chosen so that a segment does
//! not reverse the bearing of the previous one.

use std::f64::consts::PI;

use serde::Deserialize;

use super::RouteRequest;
use crate::geom::{Line, Point, PointExt, Rect, RectExt, Sides, from_polar, point, point_box};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrthogonalOptions {
    pub padding: Option<Sides>,
    pub element_padding: Option<Sides>,
}

impl OrthogonalOptions {
    pub fn with_padding(padding: Sides) -> Self {
        Self {
            padding: Some(padding),
            element_padding: None,
        }
    }

    fn padding_box(&self) -> Rect {
        self.padding
            .or(self.element_padding)
            .unwrap_or(Sides::uniform(20.0))
            .as_padding_box()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bearing {
    N,
    S,
    E,
    W,
}

impl Bearing {
    fn opposite(self) -> Bearing {
        match self {
            Bearing::N => Bearing::S,
            Bearing::S => Bearing::N,
            Bearing::E => Bearing::W,
            Bearing::W => Bearing::E,
        }
    }

    fn radians(self) -> f64 {
        match self {
            Bearing::N => -PI / 2.0 * 3.0,
            Bearing::S => -PI / 2.0,
            Bearing::E => 0.0,
            Bearing::W => PI,
        }
    }
}

fn bearing(from: Point, to: Point) -> Option<Bearing> {
    if from.x == to.x {
        Some(if from.y > to.y { Bearing::N } else { Bearing::S })
    } else if from.y == to.y {
        Some(if from.x > to.x { Bearing::W } else { Bearing::E })
    } else {
        None
    }
}

fn bbox_size(bbox: &Rect, bearing: Option<Bearing>) -> f64 {
    match bearing {
        Some(Bearing::W | Bearing::E) => bbox.size.width,
        _ => bbox.size.height,
    }
}

/// A corner `p` joining `p1` and `p2` at a right angle, outside `bbox` when possible.
fn free_join(p1: Point, p2: Point, bbox: &Rect) -> Point {
    let p = point(p1.x, p2.y);
    if bbox.contains_point(p) {
        point(p2.x, p1.y)
    } else {
        p
    }
}

struct Partial {
    points: Vec<Point>,
    direction: Option<Bearing>,
}

fn vertex_vertex(from: Point, to: Point, previous: Option<Bearing>) -> Partial {
    let p1 = point(from.x, to.y);
    let p2 = point(to.x, from.y);
    let d1 = bearing(from, p1);
    let d2 = bearing(from, p2);
    let opposite = previous.map(Bearing::opposite);

    let p = if d1 == previous || (d1 != opposite && (d2 == opposite || d2 != previous)) {
        p1
    } else {
        p2
    };
    Partial {
        points: vec![p],
        direction: bearing(p, to),
    }
}

fn element_vertex(from: Point, to: Point, from_bbox: &Rect) -> Partial {
    let p = free_join(from, to, from_bbox);
    Partial {
        points: vec![p],
        direction: bearing(p, to),
    }
}

fn vertex_element(from: Point, to: Point, to_bbox: &Rect, previous: Option<Bearing>) -> Partial {
    let candidates = [point(from.x, to.y), point(to.x, from.y)];
    let free: Vec<Point> = candidates
        .iter()
        .copied()
        .filter(|p| !to_bbox.contains_point(*p))
        .collect();
    let free_bearing: Vec<Point> = free
        .iter()
        .copied()
        .filter(|p| bearing(*p, from) != previous)
        .collect();

    if let Some(first) = free_bearing.first() {
        // Prefer a point continuing the previous segment's bearing.
        let p = free_bearing
            .iter()
            .rev()
            .find(|p| bearing(from, **p) == previous)
            .copied()
            .unwrap_or(*first);
        return Partial {
            points: vec![p],
            direction: bearing(p, to),
        };
    }

    // Every candidate is inside the element or doubles back. Push the inner one out of the
    // element along the route and join it.
    let inner = candidates
        .iter()
        .copied()
        .find(|p| !free.contains(p))
        .unwrap_or(candidates[0]);
    let p2 = to.move_from(inner, -bbox_size(to_bbox, previous) / 2.0);
    let p1 = free_join(p2, from, to_bbox);
    Partial {
        points: vec![p1, p2],
        direction: bearing(p2, to),
    }
}

fn element_element(from: Point, to: Point, from_bbox: &Rect, to_bbox: &Rect) -> Partial {
    let route = element_vertex(to, from, to_bbox);
    let p1 = route.points[0];
    if !from_bbox.contains_point(p1) {
        return route;
    }

    let route = element_vertex(from, to, from_bbox);
    let p2 = route.points[0];
    if !to_bbox.contains_point(p2) {
        return route;
    }

    let from_border = from.move_from(p2, -bbox_size(from_bbox, bearing(from, p2)) / 2.0);
    let to_border = to.move_from(p1, -bbox_size(to_bbox, bearing(to, p1)) / 2.0);
    let mid = Line::new(from_border, to_border).midpoint();

    let start = element_vertex(from, mid, from_bbox);
    let end = vertex_vertex(mid, to, start.direction);
    Partial {
        points: vec![start.points[0], end.points[0]],
        direction: end.direction,
    }
}

/// Route for one box inside (or touching) the other: leave the outer boundary first, then come
/// back in.
fn inside_element(
    from: Point,
    to: Point,
    from_bbox: &Rect,
    to_bbox: &Rect,
    previous: Option<Bearing>,
) -> Partial {
    let boundary = from_bbox.union_with(to_bbox).inflate(1.0, 1.0);
    let center = boundary.center();
    let reversed = center.distance(to) > center.distance(from);
    let (start, end) = if reversed { (to, from) } else { (from, to) };
    let reach = boundary.size.width + boundary.size.height;

    let p1 = match previous {
        Some(b) => {
            let far = from_polar(reach, b.radians(), start);
            boundary.point_nearest_to_point(far).move_from(far, -1.0)
        }
        None => boundary.point_nearest_to_point(start).move_from(start, 1.0),
    };
    let mut p2 = free_join(p1, end, &boundary);

    let points = if p1.js_round() == p2.js_round() {
        let far = from_polar(reach, p1.theta(start).to_radians() + PI / 2.0, end);
        p2 = boundary
            .point_nearest_to_point(far)
            .move_from(end, 1.0)
            .js_round();
        let p3 = free_join(p1, p2, &boundary);
        if reversed {
            vec![p2, p3, p1]
        } else {
            vec![p1, p3, p2]
        }
    } else if reversed {
        vec![p2, p1]
    } else {
        vec![p1, p2]
    };

    Partial {
        points,
        direction: if reversed {
            bearing(p1, to)
        } else {
            bearing(p2, to)
        },
    }
}

pub(crate) fn route(request: &RouteRequest<'_>, opts: &OrthogonalOptions) -> Vec<Point> {
    let padding = opts.padding_box();

    let source_anchor = request.source.anchor_or_center(&padding);
    let target_anchor = request.target.anchor_or_center(&padding);
    // An anchor outside its box grows the box to include it.
    let source_bbox = request
        .source
        .bbox
        .move_and_expand(&padding)
        .union_with(&point_box(source_anchor));
    let target_bbox = request
        .target
        .bbox
        .move_and_expand(&padding)
        .union_with(&point_box(target_anchor));

    let mut points = Vec::with_capacity(request.vertices.len() + 2);
    points.push(source_anchor);
    points.extend_from_slice(request.vertices);
    points.push(target_anchor);

    let max = points.len() - 1;
    let mut previous: Option<Bearing> = None;
    let mut out = Vec::new();

    for i in 0..max {
        let from = points[i];
        let to = points[i + 1];
        let is_orthogonal = bearing(from, to).is_some();

        let partial = if i == 0 {
            if i + 1 == max {
                // Grow one box by a pixel so touching elements count as overlapping.
                if source_bbox
                    .overlap(&target_bbox.inflate(1.0, 1.0))
                    .is_some()
                {
                    Some(inside_element(from, to, &source_bbox, &target_bbox, None))
                } else if !is_orthogonal {
                    Some(element_element(from, to, &source_bbox, &target_bbox))
                } else {
                    None
                }
            } else if source_bbox.contains_point(to) {
                let to_box = point_box(to).move_and_expand(&padding);
                Some(inside_element(from, to, &source_bbox, &to_box, None))
            } else if !is_orthogonal {
                Some(element_vertex(from, to, &source_bbox))
            } else {
                None
            }
        } else if i + 1 == max {
            let doubles_back = is_orthogonal && bearing(to, from) == previous;
            if target_bbox.contains_point(from) || doubles_back {
                let from_box = point_box(from).move_and_expand(&padding);
                Some(inside_element(from, to, &from_box, &target_bbox, previous))
            } else if !is_orthogonal {
                Some(vertex_element(from, to, &target_bbox, previous))
            } else {
                None
            }
        } else if !is_orthogonal {
            Some(vertex_vertex(from, to, previous))
        } else {
            None
        };

        match partial {
            Some(p) => {
                out.extend(p.points);
                previous = p.direction;
            }
            None => previous = bearing(from, to),
        }

        if i + 1 < max {
            out.push(to);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_vertex_keeps_previous_bearing() {
        let r = vertex_vertex(point(0.0, 0.0), point(10.0, 10.0), Some(Bearing::E));
        assert_eq!(r.points, vec![point(10.0, 0.0)]);
        assert_eq!(r.direction, Some(Bearing::S));
    }

    #[test]
    fn free_join_avoids_the_box() {
        let bbox = crate::geom::rect(0.0, 0.0, 10.0, 10.0);
        assert_eq!(
            free_join(point(5.0, 5.0), point(20.0, 8.0), &bbox),
            point(20.0, 5.0)
        );
    }
}
