use super::{Line, Point, PointExt, Rect, RectExt, point, rect};

/// Outline used by the `boundary` connection point. Coordinates are in model space, before the
/// owning element's rotation is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect(Rect),
    Ellipse { center: Point, rx: f64, ry: f64 },
    Polygon(Vec<Point>),
    Polyline(Vec<Point>),
}

impl Shape {
    pub fn bbox(&self) -> Rect {
        match self {
            Shape::Rect(r) => *r,
            Shape::Ellipse { center, rx, ry } => {
                rect(center.x - rx, center.y - ry, 2.0 * rx, 2.0 * ry)
            }
            Shape::Polygon(points) | Shape::Polyline(points) => points_bbox(points),
        }
    }

    pub fn intersect_line(&self, line: &Line) -> Vec<Point> {
        match self {
            Shape::Rect(r) => line.intersect_rect(r),
            Shape::Ellipse { center, rx, ry } => ellipse_intersections(*center, *rx, *ry, line),
            Shape::Polygon(points) => {
                polyline_intersections(points.iter().chain(points.first()).copied(), line)
            }
            Shape::Polyline(points) => polyline_intersections(points.iter().copied(), line),
        }
    }

    /// Closest outline point to `p`, used when a line misses the shape.
    pub fn nearest_point(&self, p: Point) -> Point {
        match self {
            Shape::Rect(r) => r.point_nearest_to_point(p),
            Shape::Ellipse { center, rx, ry } => ellipse_point_towards(*center, *rx, *ry, p),
            Shape::Polygon(points) => {
                closest_on_segments(points.iter().chain(points.first()).copied(), p)
            }
            Shape::Polyline(points) => closest_on_segments(points.iter().copied(), p),
        }
    }
}

fn points_bbox(points: &[Point]) -> Rect {
    let Some(first) = points.first() else {
        return rect(0.0, 0.0, 0.0, 0.0);
    };
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    rect(x0, y0, x1 - x0, y1 - y0)
}

fn ellipse_intersections(center: Point, rx: f64, ry: f64, line: &Line) -> Vec<Point> {
    let a1 = line.start;
    let dir = (line.end.x - a1.x, line.end.y - a1.y);
    let diff = (a1.x - center.x, a1.y - center.y);
    let m_dir = (dir.0 / (rx * rx), dir.1 / (ry * ry));
    let m_diff = (diff.0 / (rx * rx), diff.1 / (ry * ry));

    let a = dir.0 * m_dir.0 + dir.1 * m_dir.1;
    let b = dir.0 * m_diff.0 + dir.1 * m_diff.1;
    let c = diff.0 * m_diff.0 + diff.1 * m_diff.1 - 1.0;
    let d = b * b - a * c;

    let mut out = Vec::new();
    if a == 0.0 || d < 0.0 {
        return out;
    }
    if d > 0.0 {
        let root = d.sqrt();
        for t in [(-b - root) / a, (-b + root) / a] {
            if (0.0..=1.0).contains(&t) {
                out.push(line.point_at(t));
            }
        }
    } else {
        let t = -b / a;
        if (0.0..=1.0).contains(&t) {
            out.push(line.point_at(t));
        }
    }
    out
}

fn ellipse_point_towards(center: Point, rx: f64, ry: f64, p: Point) -> Point {
    let dx = p.x - center.x;
    let dy = p.y - center.y;
    if dx == 0.0 {
        return rect(center.x - rx, center.y - ry, 2.0 * rx, 2.0 * ry).point_nearest_to_point(p);
    }
    let m = dy / dx;
    let mut x = (1.0 / (1.0 / (rx * rx) + (m * m) / (ry * ry))).sqrt();
    if dx < 0.0 {
        x = -x;
    }
    point(center.x + x, center.y + m * x)
}

fn polyline_intersections(points: impl Iterator<Item = Point>, line: &Line) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::new();
    let mut prev: Option<Point> = None;
    for p in points {
        if let Some(q) = prev {
            if let Some(hit) = line.intersect_line(&Line::new(q, p)) {
                if !out.contains(&hit) {
                    out.push(hit);
                }
            }
        }
        prev = Some(p);
    }
    out
}

fn closest_on_segments(points: impl Iterator<Item = Point>, p: Point) -> Point {
    let mut best: Option<(f64, Point)> = None;
    let mut prev: Option<Point> = None;
    for q in points {
        let candidate = match prev {
            Some(s) => Line::new(s, q).closest_point(p),
            None => q,
        };
        let d = p.squared_distance(candidate);
        if best.is_none_or(|(min, _)| d < min) {
            best = Some((d, candidate));
        }
        prev = Some(q);
    }
    best.map(|(_, c)| c).unwrap_or(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_line_through_circle_hits_both_sides() {
        let circle = Shape::Ellipse {
            center: point(0.0, 0.0),
            rx: 10.0,
            ry: 10.0,
        };
        let hits = circle.intersect_line(&Line::new(point(-20.0, 0.0), point(20.0, 0.0)));
        assert_eq!(hits, vec![point(-10.0, 0.0), point(10.0, 0.0)]);
    }

    #[test]
    fn polygon_outline_is_closed() {
        let triangle = Shape::Polygon(vec![point(0.0, 0.0), point(10.0, 0.0), point(0.0, 10.0)]);
        let hits = triangle.intersect_line(&Line::new(point(-5.0, 2.0), point(1.0, 2.0)));
        assert_eq!(hits, vec![point(0.0, 2.0)]);
    }
}
