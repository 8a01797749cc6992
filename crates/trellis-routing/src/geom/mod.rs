//! Geometry primitives shared by routers, anchors and connection points.
//!
//! The types are `euclid` aliases. The helpers follow diagram-space conventions: the y axis
//! grows downwards, angles are in degrees and a rectangle contains its own boundary.

mod line;
mod shape;

pub use line::Line;
pub use shape::Shape;

use serde::{Deserialize, Serialize};

pub type Unit = euclid::UnknownUnit;

pub type Point = euclid::Point2D<f64, Unit>;
pub type Vector = euclid::Vector2D<f64, Unit>;
pub type Size = euclid::Size2D<f64, Unit>;
pub type Rect = euclid::Rect<f64, Unit>;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

pub fn vector(x: f64, y: f64) -> Vector {
    euclid::vec2(x, y)
}

pub fn size(width: f64, height: f64) -> Size {
    euclid::size2(width, height)
}

pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
    euclid::rect(x, y, width, height)
}

/// A zero-sized rectangle located at `p`.
pub fn point_box(p: Point) -> Rect {
    rect(p.x, p.y, 0.0, 0.0)
}

/// Rounds half-way cases towards positive infinity (`-2.5` becomes `-2`).
pub fn js_round(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn round_to(value: f64, precision: i32) -> f64 {
    let f = 10f64.powi(precision);
    js_round(value * f) / f
}

pub fn snap_to_grid(value: f64, grid: f64) -> f64 {
    js_round(value / grid) * grid
}

pub fn normalize_angle(angle: f64) -> f64 {
    (angle % 360.0) + if angle < 0.0 { 360.0 } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    /// Unit step pointing away from a box through this side.
    pub fn unit(self) -> Vector {
        match self {
            Side::Top => vector(0.0, -1.0),
            Side::Right => vector(1.0, 0.0),
            Side::Bottom => vector(0.0, 1.0),
            Side::Left => vector(-1.0, 0.0),
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
        }
    }
}

pub trait PointExt {
    /// Angle of the vector `self -> p` in degrees, counter-clockwise from the positive x axis
    /// as seen on screen, in `[0, 360)`.
    fn theta(&self, p: Point) -> f64;
    /// Moves the point along the line from `reference` through `self` by `distance`.
    fn move_from(&self, reference: Point, distance: f64) -> Point;
    /// Rotates around `origin`. Positive angles turn counter-clockwise on screen.
    fn rotate_around(&self, origin: Point, angle: f64) -> Point;
    fn round_to(&self, precision: i32) -> Point;
    fn js_round(&self) -> Point;
    fn offset(&self, dx: f64, dy: f64) -> Point;
    fn manhattan_distance(&self, p: Point) -> f64;
    fn squared_distance(&self, p: Point) -> f64;
    fn distance(&self, p: Point) -> f64;
    fn choose_closest(&self, points: &[Point]) -> Option<Point>;
    fn adhere_to_rect(&self, r: &Rect) -> Point;
}

impl PointExt for Point {
    fn theta(&self, p: Point) -> f64 {
        let y = -(p.y - self.y);
        let x = p.x - self.x;
        let mut rad = y.atan2(x);
        if rad < 0.0 {
            rad += 2.0 * std::f64::consts::PI;
        }
        rad.to_degrees()
    }

    fn move_from(&self, reference: Point, distance: f64) -> Point {
        let theta = reference.theta(*self).to_radians();
        self.offset(theta.cos() * distance, -theta.sin() * distance)
    }

    fn rotate_around(&self, origin: Point, angle: f64) -> Point {
        if angle == 0.0 {
            return *self;
        }
        let angle = normalize_angle(-angle).to_radians();
        let (sin, cos) = angle.sin_cos();
        let dx = self.x - origin.x;
        let dy = self.y - origin.y;
        point(cos * dx - sin * dy + origin.x, sin * dx + cos * dy + origin.y)
    }

    fn round_to(&self, precision: i32) -> Point {
        point(round_to(self.x, precision), round_to(self.y, precision))
    }

    fn js_round(&self) -> Point {
        point(js_round(self.x), js_round(self.y))
    }

    fn offset(&self, dx: f64, dy: f64) -> Point {
        point(self.x + dx, self.y + dy)
    }

    fn manhattan_distance(&self, p: Point) -> f64 {
        (p.x - self.x).abs() + (p.y - self.y).abs()
    }

    fn squared_distance(&self, p: Point) -> f64 {
        let dx = self.x - p.x;
        let dy = self.y - p.y;
        dx * dx + dy * dy
    }

    fn distance(&self, p: Point) -> f64 {
        self.squared_distance(p).sqrt()
    }

    fn choose_closest(&self, points: &[Point]) -> Option<Point> {
        let mut best: Option<(f64, Point)> = None;
        for p in points {
            let d = self.squared_distance(*p);
            if best.is_none_or(|(min, _)| d < min) {
                best = Some((d, *p));
            }
        }
        best.map(|(_, p)| p)
    }

    fn adhere_to_rect(&self, r: &Rect) -> Point {
        if r.contains_point(*self) {
            return *self;
        }
        point(
            self.x.max(r.min_x()).min(r.max_x()),
            self.y.max(r.min_y()).min(r.max_y()),
        )
    }
}

/// Point on the circle of radius `distance` around `origin` at `angle` radians, measured the
/// same way as [`PointExt::theta`].
pub fn from_polar(distance: f64, angle: f64, origin: Point) -> Point {
    let mut x = (distance * angle.cos()).abs();
    let mut y = (distance * angle.sin()).abs();
    let deg = normalize_angle(angle.to_degrees());
    if deg < 90.0 {
        y = -y;
    } else if deg < 180.0 {
        x = -x;
        y = -y;
    } else if deg < 270.0 {
        x = -x;
    }
    point(origin.x + x, origin.y + y)
}

pub trait RectExt {
    /// Inclusive containment (the boundary counts as inside).
    fn contains_point(&self, p: Point) -> bool;
    fn contains_rect_inclusive(&self, r: &Rect) -> bool;
    fn corner(&self) -> Point;
    fn top_middle(&self) -> Point;
    fn bottom_middle(&self) -> Point;
    fn left_middle(&self) -> Point;
    fn right_middle(&self) -> Point;
    fn top_right(&self) -> Point;
    fn bottom_left(&self) -> Point;
    fn move_and_expand(&self, r: &Rect) -> Rect;
    fn union_with(&self, r: &Rect) -> Rect;
    /// Overlap with a positive area, `None` when the rectangles merely touch.
    fn overlap(&self, r: &Rect) -> Option<Rect>;
    fn side_nearest_to_point(&self, p: Point) -> Side;
    fn point_nearest_to_point(&self, p: Point) -> Point;
    /// Bounding box of this rectangle rotated by `angle` degrees around its center.
    fn rotated_bbox(&self, angle: f64) -> Rect;
    fn scale_about(&self, sx: f64, sy: f64, origin: Point) -> Rect;
    fn side_point(&self, side: Side) -> Point;
}

impl RectExt for Rect {
    fn contains_point(&self, p: Point) -> bool {
        p.x >= self.min_x() && p.x <= self.max_x() && p.y >= self.min_y() && p.y <= self.max_y()
    }

    fn contains_rect_inclusive(&self, r: &Rect) -> bool {
        if self.size.width == 0.0
            || self.size.height == 0.0
            || r.size.width == 0.0
            || r.size.height == 0.0
        {
            return false;
        }
        self.min_x() <= r.min_x()
            && r.max_x() <= self.max_x()
            && self.min_y() <= r.min_y()
            && r.max_y() <= self.max_y()
    }

    fn corner(&self) -> Point {
        point(self.max_x(), self.max_y())
    }

    fn top_middle(&self) -> Point {
        point(self.min_x() + self.size.width / 2.0, self.min_y())
    }

    fn bottom_middle(&self) -> Point {
        point(self.min_x() + self.size.width / 2.0, self.max_y())
    }

    fn left_middle(&self) -> Point {
        point(self.min_x(), self.min_y() + self.size.height / 2.0)
    }

    fn right_middle(&self) -> Point {
        point(self.max_x(), self.min_y() + self.size.height / 2.0)
    }

    fn top_right(&self) -> Point {
        point(self.max_x(), self.min_y())
    }

    fn bottom_left(&self) -> Point {
        point(self.min_x(), self.max_y())
    }

    fn move_and_expand(&self, r: &Rect) -> Rect {
        rect(
            self.origin.x + r.origin.x,
            self.origin.y + r.origin.y,
            self.size.width + r.size.width,
            self.size.height + r.size.height,
        )
    }

    fn union_with(&self, r: &Rect) -> Rect {
        let x0 = self.min_x().min(r.min_x());
        let y0 = self.min_y().min(r.min_y());
        let x1 = self.max_x().max(r.max_x());
        let y1 = self.max_y().max(r.max_y());
        rect(x0, y0, x1 - x0, y1 - y0)
    }

    fn overlap(&self, r: &Rect) -> Option<Rect> {
        if r.max_x() <= self.min_x()
            || r.max_y() <= self.min_y()
            || r.min_x() >= self.max_x()
            || r.min_y() >= self.max_y()
        {
            return None;
        }
        let x0 = self.min_x().max(r.min_x());
        let y0 = self.min_y().max(r.min_y());
        let x1 = self.max_x().min(r.max_x());
        let y1 = self.max_y().min(r.max_y());
        Some(rect(x0, y0, x1 - x0, y1 - y0))
    }

    fn side_nearest_to_point(&self, p: Point) -> Side {
        let mut closest = p.x - self.min_x();
        let mut side = Side::Left;
        let to_right = self.max_x() - p.x;
        if to_right < closest {
            closest = to_right;
            side = Side::Right;
        }
        let to_top = p.y - self.min_y();
        if to_top < closest {
            closest = to_top;
            side = Side::Top;
        }
        if self.max_y() - p.y < closest {
            side = Side::Bottom;
        }
        side
    }

    fn point_nearest_to_point(&self, p: Point) -> Point {
        if self.contains_point(p) {
            return match self.side_nearest_to_point(p) {
                Side::Right => point(self.max_x(), p.y),
                Side::Left => point(self.min_x(), p.y),
                Side::Bottom => point(p.x, self.max_y()),
                Side::Top => point(p.x, self.min_y()),
            };
        }
        p.adhere_to_rect(self)
    }

    fn rotated_bbox(&self, angle: f64) -> Rect {
        if angle == 0.0 {
            return *self;
        }
        let theta = angle.to_radians();
        let st = theta.sin().abs();
        let ct = theta.cos().abs();
        let w = self.size.width * ct + self.size.height * st;
        let h = self.size.width * st + self.size.height * ct;
        rect(
            self.origin.x + (self.size.width - w) / 2.0,
            self.origin.y + (self.size.height - h) / 2.0,
            w,
            h,
        )
    }

    fn scale_about(&self, sx: f64, sy: f64, origin: Point) -> Rect {
        let o = scale_point(self.origin, sx, sy, origin);
        rect(o.x, o.y, self.size.width * sx, self.size.height * sy)
    }

    fn side_point(&self, side: Side) -> Point {
        match side {
            Side::Top => self.top_middle(),
            Side::Right => self.right_middle(),
            Side::Bottom => self.bottom_middle(),
            Side::Left => self.left_middle(),
        }
    }
}

pub fn scale_point(p: Point, sx: f64, sy: f64, origin: Point) -> Point {
    point(
        origin.x + sx * (p.x - origin.x),
        origin.y + sy * (p.y - origin.y),
    )
}

/// Per-side amounts, deserialized from a number (all sides) or an object with any of
/// `top/right/bottom/left/horizontal/vertical`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Sides {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Sides {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    pub fn get(&self, side: Side) -> f64 {
        match side {
            Side::Top => self.top,
            Side::Right => self.right,
            Side::Bottom => self.bottom,
            Side::Left => self.left,
        }
    }

    /// Offsets for [`RectExt::move_and_expand`] growing a box by these amounts.
    pub fn as_padding_box(&self) -> Rect {
        rect(
            -self.left,
            -self.top,
            self.left + self.right,
            self.top + self.bottom,
        )
    }
}

impl<'de> Deserialize<'de> for Sides {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Uniform(f64),
            Object {
                top: Option<f64>,
                right: Option<f64>,
                bottom: Option<f64>,
                left: Option<f64>,
                horizontal: Option<f64>,
                vertical: Option<f64>,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Uniform(v) => Sides::uniform(v),
            Raw::Object {
                top,
                right,
                bottom,
                left,
                horizontal,
                vertical,
            } => Sides {
                top: top.or(vertical).unwrap_or(0.0),
                right: right.or(horizontal).unwrap_or(0.0),
                bottom: bottom.or(vertical).unwrap_or(0.0),
                left: left.or(horizontal).unwrap_or(0.0),
            },
        })
    }
}

/// serde adapters for the `{x, y}` / `{width, height}` / `{x, y, width, height}` JSON shapes.
pub mod serde_xy {
    use super::{Point, Rect, Size, point, rect, size};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xy {
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    }

    #[derive(Serialize, Deserialize)]
    struct Wh {
        #[serde(default)]
        width: f64,
        #[serde(default)]
        height: f64,
    }

    #[derive(Serialize, Deserialize)]
    struct Xywh {
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
        #[serde(default)]
        width: f64,
        #[serde(default)]
        height: f64,
    }

    pub fn serialize<S: Serializer>(p: &Point, s: S) -> Result<S::Ok, S::Error> {
        Xy { x: p.x, y: p.y }.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Point, D::Error> {
        let v = Xy::deserialize(d)?;
        Ok(point(v.x, v.y))
    }

    pub mod vec {
        use super::*;

        pub fn serialize<S: Serializer>(points: &[Point], s: S) -> Result<S::Ok, S::Error> {
            let raw: Vec<Xy> = points.iter().map(|p| Xy { x: p.x, y: p.y }).collect();
            raw.serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Point>, D::Error> {
            let raw = Vec::<Xy>::deserialize(d)?;
            Ok(raw.into_iter().map(|v| point(v.x, v.y)).collect())
        }
    }

    pub mod size {
        use super::*;

        pub fn serialize<S: Serializer>(v: &Size, s: S) -> Result<S::Ok, S::Error> {
            Wh {
                width: v.width,
                height: v.height,
            }
            .serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Size, D::Error> {
            let v = Wh::deserialize(d)?;
            Ok(super::size(v.width, v.height))
        }
    }

    pub mod rect {
        use super::*;

        pub fn serialize<S: Serializer>(r: &Rect, s: S) -> Result<S::Ok, S::Error> {
            Xywh {
                x: r.origin.x,
                y: r.origin.y,
                width: r.size.width,
                height: r.size.height,
            }
            .serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Rect, D::Error> {
            let v = Xywh::deserialize(d)?;
            Ok(super::rect(v.x, v.y, v.width, v.height))
        }

        pub mod option {
            use super::*;

            pub fn serialize<S: Serializer>(r: &Option<Rect>, s: S) -> Result<S::Ok, S::Error> {
                r.map(|r| Xywh {
                    x: r.origin.x,
                    y: r.origin.y,
                    width: r.size.width,
                    height: r.size.height,
                })
                .serialize(s)
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Rect>, D::Error> {
                let v = Option::<Xywh>::deserialize(d)?;
                Ok(v.map(|v| super::super::rect(v.x, v.y, v.width, v.height)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_round_rounds_half_up() {
        assert_eq!(js_round(2.5), 3.0);
        assert_eq!(js_round(-2.5), -2.0);
        assert_eq!(round_to(1.25, 1), 1.3);
    }

    #[test]
    fn theta_uses_screen_orientation() {
        let o = point(0.0, 0.0);
        assert_eq!(o.theta(point(10.0, 0.0)), 0.0);
        assert_eq!(o.theta(point(0.0, -10.0)), 90.0);
        assert_eq!(o.theta(point(-10.0, 0.0)), 180.0);
        assert_eq!(o.theta(point(0.0, 10.0)), 270.0);
    }

    #[test]
    fn rect_containment_is_inclusive() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains_point(point(10.0, 10.0)));
        assert!(!r.contains_point(point(10.1, 10.0)));
        assert!(r.overlap(&rect(10.0, 0.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn rotated_bbox_swaps_extent_at_right_angle() {
        let r = rect(0.0, 0.0, 20.0, 10.0).rotated_bbox(90.0);
        assert!((r.origin.x - 5.0).abs() < 1e-9);
        assert!((r.origin.y + 5.0).abs() < 1e-9);
        assert!((r.size.width - 10.0).abs() < 1e-9);
    }

    #[test]
    fn sides_accept_numbers_and_objects() {
        let s: Sides = serde_json::from_value(serde_json::json!(5)).unwrap();
        assert_eq!(s, Sides::uniform(5.0));
        let s: Sides =
            serde_json::from_value(serde_json::json!({"horizontal": 3, "top": 1})).unwrap();
        assert_eq!(s.left, 3.0);
        assert_eq!(s.bottom, 0.0);
        assert_eq!(s.top, 1.0);
    }
}
