//! Catmull-Rom curve through the route, with end tangents picked from the end boxes.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use serde::{Deserialize, Deserializer};

use super::{ConnectorInput, PathData};
use crate::geom::{Point, PointExt, Rect, RectExt, Side, Vector, point, point_box, vector};

/// How end tangents are chosen when no per-end direction is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurveDirection {
    #[default]
    Auto,
    Horizontal,
    Vertical,
    ClosestPoint,
    Outwards,
}

/// A per-end tangent direction. Accepts a name, an angle in degrees or an `{x, y}` vector.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "RawTangent")]
pub enum CurveTangent {
    Up,
    Down,
    Left,
    Right,
    Auto,
    ClosestPoint,
    Outwards,
    Fixed(Vector),
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
enum NamedTangent {
    Up,
    Down,
    Left,
    Right,
    Auto,
    ClosestPoint,
    Outwards,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTangent {
    Named(NamedTangent),
    Angle(f64),
    Vector(Xy),
}

impl From<RawTangent> for CurveTangent {
    fn from(raw: RawTangent) -> Self {
        match raw {
            RawTangent::Named(NamedTangent::Up) => CurveTangent::Up,
            RawTangent::Named(NamedTangent::Down) => CurveTangent::Down,
            RawTangent::Named(NamedTangent::Left) => CurveTangent::Left,
            RawTangent::Named(NamedTangent::Right) => CurveTangent::Right,
            RawTangent::Named(NamedTangent::Auto) => CurveTangent::Auto,
            RawTangent::Named(NamedTangent::ClosestPoint) => CurveTangent::ClosestPoint,
            RawTangent::Named(NamedTangent::Outwards) => CurveTangent::Outwards,
            RawTangent::Angle(degrees) => {
                let p = point(1.0, 0.0).rotate_around(point(0.0, 0.0), degrees);
                CurveTangent::Fixed(p.to_vector())
            }
            RawTangent::Vector(xy) => CurveTangent::Fixed(unit(vector(xy.x, xy.y))),
        }
    }
}

#[derive(Deserialize)]
struct Xy {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

fn optional_vector<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vector>, D::Error> {
    let raw = Option::<Xy>::deserialize(d)?;
    Ok(raw.map(|xy| vector(xy.x, xy.y)))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurveOptions {
    pub direction: CurveDirection,
    pub precision: i32,
    /// Tangent length relative to the distance between neighbouring points.
    pub distance_coefficient: f64,
    /// Extra end tangent length per radian once the tangent turns more than 45 degrees away
    /// from the chord.
    pub angle_tangent_coefficient: f64,
    pub tension: f64,
    /// Overrides the computed source tangent, length included.
    #[serde(deserialize_with = "optional_vector")]
    pub source_tangent: Option<Vector>,
    #[serde(deserialize_with = "optional_vector")]
    pub target_tangent: Option<Vector>,
    pub source_direction: Option<CurveTangent>,
    pub target_direction: Option<CurveTangent>,
}

impl Default for CurveOptions {
    fn default() -> Self {
        Self {
            direction: CurveDirection::Auto,
            precision: 3,
            distance_coefficient: 0.6,
            angle_tangent_coefficient: 80.0,
            tension: 0.5,
            source_tangent: None,
            target_tangent: None,
            source_direction: None,
            target_direction: None,
        }
    }
}

/// One end of the curve as seen by the tangent rules.
struct End {
    point: Point,
    /// The route point right after (source) or before (target) this end.
    neighbour: Point,
    /// The end box, or a zero-sized box at the point for free ends.
    bbox: Rect,
    element: bool,
}

impl End {
    fn new(point: Point, neighbour: Point, bbox: Option<Rect>) -> Self {
        Self {
            point,
            neighbour,
            bbox: bbox.unwrap_or_else(|| point_box(point)),
            element: bbox.is_some(),
        }
    }

    fn direction(&self, tangent: Option<CurveTangent>, mode: CurveDirection) -> Vector {
        let mode = match tangent {
            None => mode,
            Some(CurveTangent::Up) => return Side::Top.unit(),
            Some(CurveTangent::Down) => return Side::Bottom.unit(),
            Some(CurveTangent::Left) => return Side::Left.unit(),
            Some(CurveTangent::Right) => return Side::Right.unit(),
            Some(CurveTangent::Fixed(v)) => return v,
            Some(CurveTangent::Auto) => CurveDirection::Auto,
            Some(CurveTangent::ClosestPoint) => CurveDirection::ClosestPoint,
            Some(CurveTangent::Outwards) => CurveDirection::Outwards,
        };
        match mode {
            CurveDirection::Auto => self.side().unit(),
            CurveDirection::Horizontal => {
                let side = if self.element {
                    self.bbox.side_nearest_to_point(self.point)
                } else if self.bbox.min_x() > self.neighbour.x {
                    Side::Left
                } else {
                    Side::Right
                };
                if side == Side::Left { Side::Left.unit() } else { Side::Right.unit() }
            }
            CurveDirection::Vertical => {
                let side = if self.element {
                    self.bbox.side_nearest_to_point(self.point)
                } else if self.bbox.min_y() > self.neighbour.y {
                    Side::Top
                } else {
                    Side::Bottom
                };
                if side == Side::Top { Side::Top.unit() } else { Side::Bottom.unit() }
            }
            CurveDirection::ClosestPoint => unit(self.neighbour - self.point),
            CurveDirection::Outwards => unit(self.point - self.bbox.center()),
        }
    }

    fn side(&self) -> Side {
        if self.element {
            self.bbox.side_nearest_to_point(self.point)
        } else {
            self.bbox.side_nearest_to_point(self.neighbour)
        }
    }

    /// Tangent pointing away from the curve, stretched when it turns sharply off the chord.
    fn tangent(&self, direction: Vector, opts: &CurveOptions) -> Vector {
        let chord = unit(self.neighbour - self.point);
        let mut length = self.point.distance(self.neighbour) * opts.distance_coefficient;
        let angle = angle_between(direction, chord);
        if angle > FRAC_PI_4 {
            length += (angle - FRAC_PI_4) * opts.angle_tangent_coefficient;
        }
        direction * length
    }
}

pub(super) fn curve(input: &ConnectorInput<'_>, opts: &CurveOptions) -> PathData {
    let mut points = Vec::with_capacity(input.route.len() + 2);
    points.push(input.source);
    points.extend_from_slice(input.route);
    points.push(input.target);
    let n = points.len() - 1;

    let source = End::new(points[0], points[1], input.source_bbox);
    let target = End::new(points[n], points[n - 1], input.target_bbox);
    let source_tangent = opts.source_tangent.unwrap_or_else(|| {
        source.tangent(source.direction(opts.source_direction, opts.direction), opts)
    });
    let target_tangent = opts.target_tangent.unwrap_or_else(|| {
        target.tangent(target.direction(opts.target_direction, opts.direction), opts)
    });

    let tangents = tangents(&points, source_tangent, target_tangent, opts.distance_coefficient);
    let scale = 6.0 * opts.tension * opts.tension;

    let mut path = PathData::default();
    path.move_to(points[0].round_to(opts.precision));
    for i in 0..n {
        // Leaving tangent of the span start and arriving tangent of the span end.
        let leaving = tangents[i].1;
        let arriving = if i == n - 1 { -tangents[n].0 } else { tangents[i + 1].0 };
        let c1 = points[i] + leaving / scale;
        let c2 = points[i + 1] - arriving / scale;
        path.curve_to(
            c1.round_to(opts.precision),
            c2.round_to(opts.precision),
            points[i + 1].round_to(opts.precision),
        );
    }
    path
}

/// Incoming and outgoing tangent of every point. The ends carry the given tangents.
fn tangents(points: &[Point], source: Vector, target: Vector, coeff: f64) -> Vec<(Vector, Vector)> {
    let n = points.len() - 1;
    let mut out = vec![(source, source); n + 1];
    out[n] = (target, target);
    for i in 1..n {
        let prev = if i == 1 { points[0] + source } else { points[i - 1] };
        let next = if i == n - 1 { points[n] + target } else { points[i + 1] };
        let v1 = unit(prev - points[i]);
        let v2 = unit(next - points[i]);
        let v_angle = angle_between(v1, v2);

        let mut rot = (PI - v_angle) / 2.0;
        if v1.cross(v2) < 0.0 {
            rot = -rot;
        }
        let turn = (points[i] - points[i + 1]).cross(points[i] - points[i - 1]);
        if v_angle < FRAC_PI_2 && ((rot < 0.0 && turn < 0.0) || (rot > 0.0 && turn > 0.0)) {
            rot -= PI;
        }
        let (sin, cos) = rot.sin_cos();
        let t = vector(cos * v2.x - sin * v2.y, sin * v2.x + cos * v2.y);
        let before = points[i - 1].distance(points[i]) * coeff;
        let after = points[i].distance(points[i + 1]) * coeff;
        out[i] = (t * before, t * after);
    }
    out
}

/// Zero stays zero.
fn unit(v: Vector) -> Vector {
    let length = v.length();
    if length > 0.0 { v / length } else { v }
}

fn angle_between(a: Vector, b: Vector) -> f64 {
    let lengths = a.length() * b.length();
    if lengths == 0.0 {
        return 0.0;
    }
    (a.dot(b) / lengths).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::rect;

    #[test]
    fn free_ends_face_their_neighbour() {
        let end = End::new(point(0.0, 0.0), point(100.0, 10.0), None);
        assert_eq!(end.direction(None, CurveDirection::Auto), vector(1.0, 0.0));
        assert_eq!(end.direction(None, CurveDirection::Horizontal), vector(1.0, 0.0));
        assert_eq!(end.direction(Some(CurveTangent::Up), CurveDirection::Auto), vector(0.0, -1.0));
    }

    #[test]
    fn element_ends_leave_through_the_nearest_side() {
        let end = End::new(
            point(50.0, 100.0),
            point(300.0, 0.0),
            Some(rect(0.0, 0.0, 100.0, 100.0)),
        );
        assert_eq!(end.direction(None, CurveDirection::Auto), vector(0.0, 1.0));
        assert_eq!(end.direction(None, CurveDirection::Outwards), vector(0.0, 1.0));
    }

    #[test]
    fn sharp_turns_lengthen_the_tangent() {
        let end = End::new(point(0.0, 0.0), point(100.0, 0.0), None);
        let opts = CurveOptions::default();
        assert_eq!(end.tangent(vector(1.0, 0.0), &opts), vector(60.0, 0.0));
        let up = end.tangent(vector(0.0, -1.0), &opts);
        assert!(up.y < -60.0, "{up:?}");
    }
}
