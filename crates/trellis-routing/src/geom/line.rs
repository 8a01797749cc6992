use super::{Point, PointExt, Rect, RectExt, point};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: Point,
    pub end: Point,
}

impl Line {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn squared_length(&self) -> f64 {
        self.start.squared_distance(self.end)
    }

    pub fn midpoint(&self) -> Point {
        self.point_at(0.5)
    }

    pub fn point_at(&self, t: f64) -> Point {
        point(
            self.start.x + (self.end.x - self.start.x) * t,
            self.start.y + (self.end.y - self.start.y) * t,
        )
    }

    /// Segment/segment intersection. Collinear segments never intersect.
    pub fn intersect_line(&self, other: &Line) -> Option<Point> {
        let d1x = self.end.x - self.start.x;
        let d1y = self.end.y - self.start.y;
        let d2x = other.end.x - other.start.x;
        let d2y = other.end.y - other.start.y;
        let det = d1x * d2y - d1y * d2x;
        let dx = other.start.x - self.start.x;
        let dy = other.start.y - self.start.y;
        let alpha = dx * d2y - dy * d2x;
        let beta = dx * d1y - dy * d1x;

        if det == 0.0 || alpha * det < 0.0 || beta * det < 0.0 {
            return None;
        }
        if det > 0.0 {
            if alpha > det || beta > det {
                return None;
            }
        } else if alpha < det || beta < det {
            return None;
        }
        Some(point(
            self.start.x + alpha * d1x / det,
            self.start.y + alpha * d1y / det,
        ))
    }

    /// Intersections with the four sides of `r`, deduplicated, in top/right/bottom/left order.
    pub fn intersect_rect(&self, r: &Rect) -> Vec<Point> {
        let sides = [
            Line::new(r.origin, r.top_right()),
            Line::new(r.top_right(), r.corner()),
            Line::new(r.bottom_left(), r.corner()),
            Line::new(r.origin, r.bottom_left()),
        ];
        let mut out: Vec<Point> = Vec::new();
        for side in &sides {
            if let Some(p) = self.intersect_line(side) {
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
        out
    }

    /// Scales the segment about `start` so it has the given length.
    pub fn with_length(&self, length: f64) -> Line {
        let current = self.length();
        if current == 0.0 {
            return *self;
        }
        let f = length / current;
        Line::new(
            self.start,
            point(
                self.start.x + (self.end.x - self.start.x) * f,
                self.start.y + (self.end.y - self.start.y) * f,
            ),
        )
    }

    pub fn rotate_around(&self, origin: Point, angle: f64) -> Line {
        Line::new(
            self.start.rotate_around(origin, angle),
            self.end.rotate_around(origin, angle),
        )
    }

    /// The segment shifted sideways by `distance` (positive to the right of the direction of
    /// travel on screen).
    pub fn parallel(&self, distance: f64) -> Line {
        if self.start == self.end {
            return *self;
        }
        let e_ref = self.start.rotate_around(self.end, 270.0);
        let s_ref = self.end.rotate_around(self.start, 90.0);
        Line::new(
            self.start.move_from(s_ref, distance),
            self.end.move_from(e_ref, distance),
        )
    }

    pub fn closest_point(&self, p: Point) -> Point {
        let len2 = self.squared_length();
        if len2 == 0.0 {
            return self.start;
        }
        let t = ((p.x - self.start.x) * (self.end.x - self.start.x)
            + (p.y - self.start.y) * (self.end.y - self.start.y))
            / len2;
        self.point_at(t.clamp(0.0, 1.0))
    }

    /// `Some(true)` for a horizontal segment, `Some(false)` for a vertical one.
    pub fn is_axis_aligned(&self) -> Option<bool> {
        if self.start.y == self.end.y {
            Some(true)
        } else if self.start.x == self.end.x {
            Some(false)
        } else {
            None
        }
    }
}
