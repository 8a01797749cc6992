//! Connectors turn the final polyline into path data.

use std::fmt::{self, Write as _};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geom::{Point, PointExt, Rect, RectExt, Side, point};
use crate::spec::NamedSpec;

mod curve;

pub use curve::{CurveDirection, CurveOptions, CurveTangent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Move(Point),
    Line(Point),
    Curve(Point, Point, Point),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathData {
    pub segments: Vec<Segment>,
}

impl PathData {
    pub fn move_to(&mut self, p: Point) {
        self.segments.push(Segment::Move(p));
    }

    pub fn line_to(&mut self, p: Point) {
        self.segments.push(Segment::Line(p));
    }

    pub fn curve_to(&mut self, c1: Point, c2: Point, end: Point) {
        self.segments.push(Segment::Curve(c1, c2, end));
    }

    /// SVG `d` attribute, e.g. `M 0 0 L 10 0`.
    pub fn to_svg(&self) -> String {
        self.to_string()
    }
}

struct Num(f64);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Avoid printing `-0`.
        if self.0 == 0.0 {
            return f.write_str("0");
        }
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PathData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for seg in &self.segments {
            if !out.is_empty() {
                out.push(' ');
            }
            match seg {
                Segment::Move(p) => write!(out, "M {} {}", Num(p.x), Num(p.y))?,
                Segment::Line(p) => write!(out, "L {} {}", Num(p.x), Num(p.y))?,
                Segment::Curve(c1, c2, p) => write!(
                    out,
                    "C {} {} {} {} {} {}",
                    Num(c1.x),
                    Num(c1.y),
                    Num(c2.x),
                    Num(c2.y),
                    Num(p.x),
                    Num(p.y)
                )?,
            }
        }
        f.write_str(&out)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CornerType {
    #[default]
    Point,
    Line,
    Cubic,
    Gap,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StraightOptions {
    pub corner_type: CornerType,
    pub corner_radius: f64,
    pub precision: i32,
}

impl Default for StraightOptions {
    fn default() -> Self {
        Self {
            corner_type: CornerType::Point,
            corner_radius: 10.0,
            precision: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoundedOptions {
    pub radius: f64,
}

impl Default for RoundedOptions {
    fn default() -> Self {
        Self { radius: 10.0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothDirection {
    #[default]
    Auto,
    Legacy,
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmoothOptions {
    pub direction: SmoothDirection,
    pub min_offset: f64,
}

impl Default for SmoothOptions {
    fn default() -> Self {
        Self {
            direction: SmoothDirection::Auto,
            min_offset: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Connector {
    #[default]
    Normal,
    Straight(StraightOptions),
    Rounded(RoundedOptions),
    Smooth(SmoothOptions),
    Curve(CurveOptions),
}

/// Everything a connector needs: the clipped end points, the route between them and the end
/// boxes (`None` for free-point ends).
#[derive(Debug, Clone, Copy)]
pub struct ConnectorInput<'a> {
    pub source: Point,
    pub target: Point,
    pub route: &'a [Point],
    pub source_bbox: Option<Rect>,
    pub target_bbox: Option<Rect>,
}

impl Connector {
    pub fn from_spec(spec: &NamedSpec) -> Result<Self> {
        match spec.name.as_str() {
            "normal" => Ok(Connector::Normal),
            "straight" => Ok(Connector::Straight(spec.options()?)),
            "rounded" => Ok(Connector::Rounded(spec.options()?)),
            "smooth" => Ok(Connector::Smooth(spec.options()?)),
            "curve" => Ok(Connector::Curve(spec.options()?)),
            other => Err(Error::UnknownConnector {
                name: other.to_string(),
            }),
        }
    }

    pub fn connect(&self, input: &ConnectorInput<'_>) -> PathData {
        match self {
            Connector::Normal => straight(input, &StraightOptions::default()),
            Connector::Straight(opts) => straight(input, opts),
            Connector::Rounded(opts) => straight(
                input,
                &StraightOptions {
                    corner_type: CornerType::Cubic,
                    corner_radius: opts.radius,
                    precision: 1,
                },
            ),
            Connector::Smooth(opts) => smooth(input, opts),
            Connector::Curve(opts) => curve::curve(input, opts),
        }
    }
}

fn straight(input: &ConnectorInput<'_>, opts: &StraightOptions) -> PathData {
    let mut path = PathData::default();
    path.move_to(input.source);

    if opts.corner_type == CornerType::Point || opts.corner_radius == 0.0 {
        for p in input.route {
            path.line_to(*p);
        }
        path.line_to(input.target);
        return path;
    }

    let mut points = Vec::with_capacity(input.route.len() + 2);
    points.push(input.source);
    points.extend_from_slice(input.route);
    points.push(input.target);

    for w in points.windows(3) {
        let (prev, curr, next) = (w[0], w[1], w[2]);
        let start_move = -(opts.corner_radius.min(curr.distance(prev) / 2.0));
        let end_move = -(opts.corner_radius.min(curr.distance(next) / 2.0));
        let rounded_start = curr.move_from(prev, start_move).round_to(opts.precision);
        let rounded_end = curr.move_from(next, end_move).round_to(opts.precision);

        path.line_to(rounded_start);
        match opts.corner_type {
            CornerType::Gap => path.move_to(rounded_end),
            CornerType::Line => path.line_to(rounded_end),
            CornerType::Cubic => {
                let c1 = point(
                    (rounded_start.x + 2.0 * curr.x) / 3.0,
                    (rounded_start.y + 2.0 * curr.y) / 3.0,
                );
                let c2 = point(
                    (rounded_end.x + 2.0 * curr.x) / 3.0,
                    (rounded_end.y + 2.0 * curr.y) / 3.0,
                );
                path.curve_to(c1, c2, rounded_end);
            }
            CornerType::Point => path.line_to(curr),
        }
    }
    path.line_to(input.target);
    path
}

fn smooth(input: &ConnectorInput<'_>, opts: &SmoothOptions) -> PathData {
    let (s, t) = (input.source, input.target);
    let mut path = PathData::default();
    path.move_to(s);

    if !input.route.is_empty() {
        let mut knots = Vec::with_capacity(input.route.len() + 2);
        knots.push(s);
        knots.extend_from_slice(input.route);
        knots.push(t);
        for (i, (c1, c2)) in curve_control_points(&knots).into_iter().enumerate() {
            path.curve_to(c1, c2, knots[i + 1]);
        }
        return path;
    }

    let source_side = input.source_bbox.map(|b| b.side_nearest_to_point(s));
    let target_side = input.target_bbox.map(|b| b.side_nearest_to_point(t));

    let (c1, c2) = match opts.direction {
        SmoothDirection::Horizontal => {
            let offset = (s.x - (s.x + t.x) / 2.0).abs().max(opts.min_offset);
            let c1x = match source_side {
                Some(Side::Left) => s.x - offset,
                _ => s.x + offset,
            };
            let c2x = match target_side {
                Some(Side::Right) => t.x + offset,
                _ => t.x - offset,
            };
            (point(c1x, s.y), point(c2x, t.y))
        }
        SmoothDirection::Vertical => {
            let offset = (s.y - (s.y + t.y) / 2.0).abs().max(opts.min_offset);
            let c1y = match source_side {
                Some(Side::Top) => s.y - offset,
                _ => s.y + offset,
            };
            let c2y = match target_side {
                Some(Side::Bottom) => t.y + offset,
                _ => t.y - offset,
            };
            (point(s.x, c1y), point(t.x, c2y))
        }
        SmoothDirection::Auto if source_side.is_some() && target_side.is_some() => {
            let mid = point((s.x + t.x) / 2.0, (s.y + t.y) / 2.0);
            let c1 = match source_side {
                Some(Side::Top | Side::Bottom) => point(s.x, mid.y),
                _ => point(mid.x, s.y),
            };
            let c2 = match target_side {
                Some(Side::Top | Side::Bottom) => point(t.x, mid.y),
                _ => point(mid.x, t.y),
            };
            (c1, c2)
        }
        _ => {
            if (s.x - t.x).abs() >= (s.y - t.y).abs() {
                let cx = (s.x + t.x) / 2.0;
                (point(cx, s.y), point(cx, t.y))
            } else {
                let cy = (s.y + t.y) / 2.0;
                (point(s.x, cy), point(t.x, cy))
            }
        }
    };
    path.curve_to(c1, c2, t);
    path
}

/// Control points of the smooth cubic spline through `knots`, one pair per span.
fn curve_control_points(knots: &[Point]) -> Vec<(Point, Point)> {
    let n = knots.len().saturating_sub(1);
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        let c1 = point(
            (2.0 * knots[0].x + knots[1].x) / 3.0,
            (2.0 * knots[0].y + knots[1].y) / 3.0,
        );
        let c2 = point(2.0 * c1.x - knots[0].x, 2.0 * c1.y - knots[0].y);
        return vec![(c1, c2)];
    }

    let rhs = |coord: fn(&Point) -> f64| -> Vec<f64> {
        let mut r = vec![0.0; n];
        for i in 1..n - 1 {
            r[i] = 4.0 * coord(&knots[i]) + 2.0 * coord(&knots[i + 1]);
        }
        r[0] = coord(&knots[0]) + 2.0 * coord(&knots[1]);
        r[n - 1] = (8.0 * coord(&knots[n - 1]) + coord(&knots[n])) / 2.0;
        r
    };
    let xs = first_control_points(&rhs(|p| p.x));
    let ys = first_control_points(&rhs(|p| p.y));

    (0..n)
        .map(|i| {
            let first = point(xs[i], ys[i]);
            let second = if i < n - 1 {
                point(
                    2.0 * knots[i + 1].x - xs[i + 1],
                    2.0 * knots[i + 1].y - ys[i + 1],
                )
            } else {
                point((knots[n].x + xs[n - 1]) / 2.0, (knots[n].y + ys[n - 1]) / 2.0)
            };
            (first, second)
        })
        .collect()
}

/// Tridiagonal solve for one coordinate of the first control points.
fn first_control_points(rhs: &[f64]) -> Vec<f64> {
    let n = rhs.len();
    let mut x = vec![0.0; n];
    let mut tmp = vec![0.0; n];
    let mut b = 2.0;
    x[0] = rhs[0] / b;
    for i in 1..n {
        tmp[i] = 1.0 / b;
        b = if i < n - 1 { 4.0 } else { 3.5 } - tmp[i];
        x[i] = (rhs[i] - x[i - 1]) / b;
    }
    for i in 1..n {
        x[n - i - 1] -= tmp[n - i] * x[n - i];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(route: &[Point]) -> ConnectorInput<'_> {
        ConnectorInput {
            source: point(0.0, 0.0),
            target: point(100.0, 100.0),
            route,
            source_bbox: None,
            target_bbox: None,
        }
    }

    #[test]
    fn normal_connector_joins_points() {
        let route = [point(100.0, 0.0)];
        let d = Connector::Normal.connect(&input(&route)).to_svg();
        assert_eq!(d, "M 0 0 L 100 0 L 100 100");
    }

    #[test]
    fn rounded_connector_cuts_corners() {
        let route = [point(100.0, 0.0)];
        let c = Connector::from_spec(&NamedSpec::with_args("rounded", json!({"radius": 10})))
            .unwrap();
        let d = c.connect(&input(&route)).to_svg();
        assert!(d.starts_with("M 0 0 L 90 0 C "), "{d}");
        assert!(d.ends_with("100 10 L 100 100"), "{d}");
    }

    #[test]
    fn smooth_connector_without_route_uses_midpoint_controls() {
        let d = Connector::Smooth(SmoothOptions::default())
            .connect(&input(&[]))
            .to_svg();
        assert_eq!(d, "M 0 0 C 50 0 50 100 100 100");
    }

    #[test]
    fn straight_line_corners_stay_on_the_polyline() {
        let route = [point(100.0, 0.0)];
        let c = Connector::from_spec(&NamedSpec::with_args(
            "straight",
            json!({"cornerType": "line", "cornerRadius": 20}),
        ))
        .unwrap();
        assert_eq!(
            c.connect(&input(&route)).to_svg(),
            "M 0 0 L 80 0 L 100 20 L 100 100"
        );
    }
}
