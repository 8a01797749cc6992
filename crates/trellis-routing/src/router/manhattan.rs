//! Grid A* routing around element obstacles.
//!
//! The search runs on a grid anchored at the source anchor whose spacing is stretched slightly
//! so the target anchor also lands on a grid node. Partial routes are searched between
//! consecutive vertices and stitched together. When a partial search fails the configured
//! [`FallbackRoute`] takes over.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxBuildHasher;
use serde::Deserialize;

use super::orthogonal::{self, OrthogonalOptions};
use super::RouteRequest;
use crate::geom::{
    Line, Point, PointExt, Rect, RectExt, Side, Sides, from_polar, js_round, normalize_angle,
    point, rect, snap_to_grid,
};

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

/// Size of the buckets obstacles are sorted into.
const MAP_GRID_SIZE: f64 = 100.0;

/// Caller-supplied obstacle test. When set it replaces the obstacle map built from elements.
#[derive(Clone)]
pub struct PointPredicate(Arc<dyn Fn(Point) -> bool + Send + Sync>);

impl PointPredicate {
    pub fn new(f: impl Fn(Point) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn test(&self, p: Point) -> bool {
        (self.0)(p)
    }
}

impl fmt::Debug for PointPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PointPredicate(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndKind {
    Source,
    Target,
}

/// What to do when a partial route cannot be found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackRoute {
    /// Re-route the whole link with the orthogonal router.
    #[default]
    Orthogonal,
    /// A single right-angle bend between the partial route's ends.
    Elbow,
    /// A 45° bend between the partial route's ends, ignoring obstacles.
    Diagonal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManhattanOptions {
    pub step: f64,
    pub maximum_loops: usize,
    pub precision: i32,
    pub max_allowed_direction_change: f64,
    pub perpendicular: bool,
    pub exclude_ends: Vec<EndKind>,
    pub exclude_types: Vec<String>,
    pub start_directions: Vec<Side>,
    pub end_directions: Vec<Side>,
    /// Takes precedence over `padding_box`.
    pub padding: Option<Sides>,
    #[serde(with = "crate::geom::serde_xy::rect::option")]
    pub padding_box: Option<Rect>,
    /// Cost of a diagonal step on the eight-direction grid.
    pub diagonal_cost: Option<f64>,
    pub fallback_route: FallbackRoute,
    #[serde(skip)]
    pub is_point_obstacle: Option<PointPredicate>,
}

impl Default for ManhattanOptions {
    fn default() -> Self {
        Self {
            step: 10.0,
            maximum_loops: 2000,
            precision: 1,
            max_allowed_direction_change: 90.0,
            perpendicular: true,
            exclude_ends: Vec::new(),
            exclude_types: Vec::new(),
            start_directions: Side::ALL.to_vec(),
            end_directions: Side::ALL.to_vec(),
            padding: None,
            padding_box: None,
            diagonal_cost: None,
            fallback_route: FallbackRoute::Orthogonal,
            is_point_obstacle: None,
        }
    }
}

impl ManhattanOptions {
    /// Defaults of the metro router.
    pub fn metro() -> Self {
        Self {
            max_allowed_direction_change: 45.0,
            fallback_route: FallbackRoute::Diagonal,
            ..Self::default()
        }
    }

    pub fn with_point_obstacle(
        mut self,
        f: impl Fn(Point) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_point_obstacle = Some(PointPredicate::new(f));
        self
    }

    fn resolved_padding_box(&self) -> Rect {
        match (self.padding, self.padding_box) {
            (Some(sides), _) => sides.as_padding_box(),
            (None, Some(r)) => r,
            (None, None) => rect(-self.step, -self.step, 2.0 * self.step, 2.0 * self.step),
        }
    }

    fn penalty(&self, direction_change: f64) -> f64 {
        if direction_change == 0.0 {
            0.0
        } else {
            self.step / 2.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Grid {
    /// Four directions.
    Orthogonal,
    /// Eight directions.
    Diagonal,
}

#[derive(Debug, Clone, Copy)]
struct Direction {
    offset_x: f64,
    offset_y: f64,
    cost: f64,
    angle: f64,
    grid_offset_x: f64,
    grid_offset_y: f64,
}

fn directions(kind: Grid, opts: &ManhattanOptions) -> Vec<Direction> {
    let step = opts.step;
    let raw: Vec<(f64, f64, f64)> = match kind {
        Grid::Orthogonal => vec![
            (step, 0.0, step),
            (-step, 0.0, step),
            (0.0, step, step),
            (0.0, -step, step),
        ],
        Grid::Diagonal => {
            let diagonal = opts
                .diagonal_cost
                .unwrap_or_else(|| (2.0 * (step * step).trunc()).sqrt().ceil());
            vec![
                (step, 0.0, step),
                (step, step, diagonal),
                (0.0, step, step),
                (-step, step, diagonal),
                (-step, 0.0, step),
                (-step, -step, diagonal),
                (0.0, -step, step),
                (step, -step, diagonal),
            ]
        }
    };
    raw.into_iter()
        .map(|(offset_x, offset_y, cost)| Direction {
            offset_x,
            offset_y,
            cost,
            angle: normalize_angle(point(0.0, 0.0).theta(point(offset_x, offset_y))),
            grid_offset_x: 0.0,
            grid_offset_y: 0.0,
        })
        .collect()
}

/// Grid anchored at `source` with per-axis spacing.
#[derive(Debug, Clone, Copy)]
struct RouteGrid {
    source: Point,
    x: f64,
    y: f64,
}

impl RouteGrid {
    fn new(step: f64, source: Point, target: Point) -> Self {
        Self {
            source,
            x: grid_dimension(target.x - source.x, step),
            y: grid_dimension(target.y - source.y, step),
        }
    }

    fn snap(&self, p: Point) -> Point {
        point(
            snap_to_grid(p.x - self.source.x, self.x) + self.source.x,
            snap_to_grid(p.y - self.source.y, self.y) + self.source.y,
        )
    }

    fn align(&self, p: Point, precision: i32) -> Point {
        self.snap(p).round_to(precision)
    }
}

/// Step size corrected so that `diff` is a whole number of steps.
fn grid_dimension(diff: f64, step: f64) -> f64 {
    if diff == 0.0 {
        return step;
    }
    let abs = diff.abs();
    let steps = js_round(abs / step);
    if steps == 0.0 {
        return abs;
    }
    let remainder = abs - steps * step;
    step + remainder / steps
}

type Key = (i64, i64);

fn key(p: Point, precision: i32) -> Key {
    let f = 10f64.powi(precision);
    (js_round(p.x * f) as i64, js_round(p.y * f) as i64)
}

fn sign_vector(dx: f64, dy: f64) -> (f64, f64) {
    let s = |v: f64| if v == 0.0 { 0.0 } else { v.signum() };
    (s(dx), s(dy))
}

fn direction_change(a: Option<f64>, b: f64) -> f64 {
    let change = (a.unwrap_or(0.0) - b).abs();
    if change > 180.0 { 360.0 - change } else { change }
}

/// Quantized direction from `start` to `end`, corrected for the grid's stretch.
fn direction_angle(start: Point, end: Point, count: usize, grid: &RouteGrid, step: f64) -> f64 {
    let quadrant = 360.0 / count as f64;
    let fixed = point(
        start.x + (end.x - start.x) / grid.x * step,
        start.y + (end.y - start.y) / grid.y * step,
    );
    let normalized = normalize_angle(start.theta(fixed) + quadrant / 2.0);
    quadrant * (normalized / quadrant).floor()
}

fn estimate_cost(from: Point, targets: &[Point]) -> f64 {
    targets
        .iter()
        .map(|t| from.manhattan_distance(*t))
        .fold(f64::INFINITY, f64::min)
}

/// Bucketed element boxes for fast "is this point inside an obstacle" queries.
struct ObstacleMap {
    buckets: HashMap<Key, Vec<Rect>>,
}

impl ObstacleMap {
    fn build(request: &RouteRequest<'_>, opts: &ManhattanOptions, padding: &Rect) -> Self {
        let excluded_ends: Vec<&str> = opts
            .exclude_ends
            .iter()
            .filter_map(|kind| match kind {
                EndKind::Source => request.source.id.as_deref(),
                EndKind::Target => request.target.id.as_deref(),
            })
            .collect();
        let is_ancestor = |id: &str| {
            request.source.ancestors.iter().any(|a| a == id)
                || request.target.ancestors.iter().any(|a| a == id)
        };

        let mut buckets: HashMap<Key, Vec<Rect>> = HashMap::default();
        for obstacle in request.obstacles {
            if opts.exclude_types.contains(&obstacle.cell_type)
                || excluded_ends.contains(&obstacle.id.as_str())
                || is_ancestor(&obstacle.id)
            {
                continue;
            }
            let bbox = obstacle.bbox.move_and_expand(padding);
            let (x0, y0) = bucket(bbox.origin);
            let (x1, y1) = bucket(bbox.corner());
            for x in x0..=x1 {
                for y in y0..=y1 {
                    buckets.entry((x, y)).or_default().push(bbox);
                }
            }
        }
        Self { buckets }
    }

    fn is_accessible(&self, p: Point) -> bool {
        self.buckets
            .get(&bucket(p))
            .is_none_or(|boxes| boxes.iter().all(|b| !b.contains_point(p)))
    }
}

enum Obstacles<'a> {
    Predicate(&'a PointPredicate),
    Map(ObstacleMap),
}

impl Obstacles<'_> {
    fn contains(&self, p: Point) -> bool {
        match self {
            Obstacles::Predicate(predicate) => predicate.test(p),
            Obstacles::Map(map) => !map.is_accessible(p),
        }
    }
}

fn bucket(p: Point) -> Key {
    (
        js_round(p.x / MAP_GRID_SIZE) as i64,
        js_round(p.y / MAP_GRID_SIZE) as i64,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Closed,
}

/// Open set ordered by estimated total cost. Among equal costs the most recently added item
/// comes first.
#[derive(Default)]
struct SortedSet {
    items: VecDeque<Key>,
    values: HashMap<Key, f64>,
    marks: HashMap<Key, Mark>,
}

impl SortedSet {
    fn add(&mut self, item: Key, value: f64) {
        if self.marks.contains_key(&item) {
            if let Some(pos) = self.items.iter().position(|k| *k == item) {
                self.items.remove(pos);
            }
        } else {
            self.marks.insert(item, Mark::Open);
        }
        self.values.insert(item, value);
        let values = &self.values;
        let index = self
            .items
            .partition_point(|k| values.get(k).copied().unwrap_or(f64::INFINITY) < value);
        self.items.insert(index, item);
    }

    fn is_open(&self, item: &Key) -> bool {
        self.marks.get(item) == Some(&Mark::Open)
    }

    fn is_closed(&self, item: &Key) -> bool {
        self.marks.get(item) == Some(&Mark::Closed)
    }

    fn pop(&mut self) -> Option<Key> {
        let item = self.items.pop_front()?;
        self.marks.insert(item, Mark::Closed);
        Some(item)
    }
}

/// One side of a partial route: an element box (with its anchor) or a vertex.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Box(Rect, Point),
    Point(Point),
}

/// Search state shared by consecutive partial routes.
struct Search<'a> {
    opts: &'a ManhattanOptions,
    directions: Vec<Direction>,
    obstacles: &'a Obstacles<'a>,
    /// Direction the previous partial route arrived with. `None` before the first route,
    /// `Some(None)` when it arrived without a direction.
    previous_angle: Option<Option<f64>>,
}

impl Search<'_> {
    fn rect_points(&self, anchor: Point, bbox: &Rect, sides: &[Side], grid: &RouteGrid) -> Vec<Point> {
        let precision = self.opts.precision;
        let center = bbox.center();
        let (acx, acy) = ((anchor.x - center.x).abs(), (anchor.y - center.y).abs());
        let mut out = Vec::new();

        for side in Side::ALL {
            if !sides.contains(&side) {
                continue;
            }
            let dir = side.unit();
            // Long enough to cross the box even when the anchor lies outside it.
            let far = point(
                anchor.x + dir.x * (acx + bbox.size.width),
                anchor.y + dir.y * (acy + bbox.size.height),
            );
            let hits = Line::new(anchor, far).intersect_rect(bbox);
            let mut farthest: Option<(f64, Point)> = None;
            for hit in hits {
                let d = anchor.squared_distance(hit);
                if farthest.is_none_or(|(max, _)| d > max) {
                    farthest = Some((d, hit));
                }
            }
            if let Some((_, hit)) = farthest {
                let mut p = grid.align(hit, precision);
                if bbox.contains_point(p) {
                    p = grid.align(p.offset(dir.x * grid.x, dir.y * grid.y), precision);
                }
                out.push(p);
            }
        }

        if !bbox.contains_point(anchor) {
            out.push(grid.align(anchor, precision));
        }
        out
    }

    /// A* between two endpoints. `None` asks for the whole-link fallback.
    fn find_route(&mut self, from: Endpoint, to: Endpoint) -> Option<Vec<Point>> {
        let opts = self.opts;
        let precision = opts.precision;
        let start = match from {
            Endpoint::Box(_, anchor) | Endpoint::Point(anchor) => anchor.round_to(precision),
        };
        let end = match to {
            Endpoint::Box(_, anchor) | Endpoint::Point(anchor) => anchor.round_to(precision),
        };
        let grid = RouteGrid::new(opts.step, start, end);

        let start_points: Vec<Point> = match from {
            Endpoint::Box(bbox, _) => self.rect_points(start, &bbox, &opts.start_directions, &grid),
            Endpoint::Point(_) => vec![start],
        }
        .into_iter()
        .filter(|p| !self.obstacles.contains(*p))
        .collect();
        let end_points: Vec<Point> = match to {
            Endpoint::Box(bbox, _) => self.rect_points(end, &bbox, &opts.end_directions, &grid),
            Endpoint::Point(_) => vec![end],
        }
        .into_iter()
        .filter(|p| !self.obstacles.contains(*p))
        .collect();

        if !start_points.is_empty() && !end_points.is_empty() {
            if let Some(route) = self.search(start, end, &start_points, &end_points, &grid) {
                return Some(route);
            }
        }

        match opts.fallback_route {
            FallbackRoute::Orthogonal => None,
            FallbackRoute::Elbow => {
                let horizontal = self
                    .previous_angle
                    .flatten()
                    .is_none_or(|a| a % 180.0 == 0.0);
                Some(vec![if horizontal {
                    point(start.x, end.y)
                } else {
                    point(end.x, start.y)
                }])
            }
            FallbackRoute::Diagonal => Some(diagonal_route(start, end)),
        }
    }

    fn search(
        &mut self,
        start: Point,
        end: Point,
        start_points: &[Point],
        end_points: &[Point],
        grid: &RouteGrid,
    ) -> Option<Vec<Point>> {
        let opts = self.opts;
        let precision = opts.precision;

        let mut open = SortedSet::default();
        let mut points: HashMap<Key, Point> = HashMap::default();
        let mut parents: HashMap<Key, Point> = HashMap::default();
        let mut costs: HashMap<Key, f64> = HashMap::default();

        for p in start_points {
            let k = key(*p, precision);
            open.add(k, estimate_cost(*p, end_points));
            points.insert(k, *p);
            costs.insert(k, 0.0);
        }

        let previous_route_angle = self.previous_angle;
        let is_path_beginning = previous_route_angle.is_none();

        let mut directions = self.directions.clone();
        for d in &mut directions {
            d.grid_offset_x = d.offset_x / opts.step * grid.x;
            d.grid_offset_y = d.offset_y / opts.step * grid.y;
        }
        let count = directions.len();
        let end_keys: Vec<Key> = end_points.iter().map(|p| key(*p, precision)).collect();
        let same_points = start_points == end_points;

        let mut loops_remaining = opts.maximum_loops;
        while loops_remaining > 0 {
            let Some(current_key) = open.pop() else {
                break;
            };
            let Some(current) = points.get(&current_key).copied() else {
                break;
            };
            let parent = parents.get(&current_key).copied();
            let current_cost = costs.get(&current_key).copied().unwrap_or(0.0);

            let is_route_beginning = parent.is_none();
            let is_start = current == start;

            let previous_direction = match (parent, previous_route_angle) {
                (Some(parent), _) => Some(direction_angle(parent, current, count, grid, opts.step)),
                (None, Some(angle)) => angle,
                (None, None) if !is_start => {
                    Some(direction_angle(start, current, count, grid, opts.step))
                }
                (None, None) => None,
            };

            let skip_end_check = is_route_beginning && same_points;
            if !skip_end_check && end_keys.contains(&current_key) {
                self.previous_angle = Some(previous_direction);
                return Some(reconstruct_route(
                    &parents, &points, current, start, end, precision,
                ));
            }

            for dir in &directions {
                let change = direction_change(previous_direction, dir.angle);
                // Any direction is allowed when leaving the source anchor.
                if !(is_path_beginning && is_start) && change > opts.max_allowed_direction_change {
                    continue;
                }

                let neighbor = grid.align(
                    current.offset(dir.grid_offset_x, dir.grid_offset_y),
                    precision,
                );
                let neighbor_key = key(neighbor, precision);
                if open.is_closed(&neighbor_key) || self.obstacles.contains(neighbor) {
                    continue;
                }

                // End points can only be entered at an acceptable angle.
                if end_keys.contains(&neighbor_key) && neighbor != end {
                    let end_angle = direction_angle(neighbor, end, count, grid, opts.step);
                    if direction_change(Some(dir.angle), end_angle)
                        > opts.max_allowed_direction_change
                    {
                        continue;
                    }
                }

                let penalty = if is_start { 0.0 } else { opts.penalty(change) };
                let cost = current_cost + dir.cost + penalty;

                let known = costs.get(&neighbor_key).copied().unwrap_or(f64::INFINITY);
                if !open.is_open(&neighbor_key) || cost < known {
                    points.insert(neighbor_key, neighbor);
                    parents.insert(neighbor_key, current);
                    costs.insert(neighbor_key, cost);
                    open.add(neighbor_key, cost + estimate_cost(neighbor, end_points));
                }
            }

            loops_remaining -= 1;
        }

        tracing::trace!(
            loops = opts.maximum_loops,
            "manhattan search exhausted without reaching an end point"
        );
        None
    }
}

/// Walks the parent chain back from `tail`, keeping only the points where the direction
/// changes.
fn reconstruct_route(
    parents: &HashMap<Key, Point>,
    points: &HashMap<Key, Point>,
    tail: Point,
    from: Point,
    to: Point,
    precision: i32,
) -> Vec<Point> {
    let mut route = Vec::new();
    let mut prev_diff = sign_vector(to.x - tail.x, to.y - tail.y);

    let mut current_key = key(tail, precision);
    while let Some(parent) = parents.get(&current_key).copied() {
        let Some(p) = points.get(&current_key).copied() else {
            break;
        };
        let diff = sign_vector(p.x - parent.x, p.y - parent.y);
        if diff != prev_diff {
            route.push(p);
            prev_diff = diff;
        }
        current_key = key(parent, precision);
    }

    if let Some(lead) = points.get(&current_key).copied() {
        let from_diff = sign_vector(lead.x - from.x, lead.y - from.y);
        if from_diff != prev_diff {
            route.push(lead);
        }
    }

    route.reverse();
    route
}

/// A route that breaks by 45° between `from` and `to`, ignoring obstacles.
fn diagonal_route(from: Point, to: Point) -> Vec<Point> {
    let theta = from.theta(to);

    let mut a = point(to.x, from.y);
    let mut b = point(from.x, to.y);
    if theta % 180.0 > 90.0 {
        std::mem::swap(&mut a, &mut b);
    }
    let p1 = if theta % 90.0 < 45.0 { a } else { b };
    let l1 = Line::new(from, p1);

    let alpha = 90.0 * (theta / 90.0).ceil();
    let p2 = from_polar(l1.squared_length(), (alpha + 135.0).to_radians(), p1);
    let l2 = Line::new(to, p2);

    match l1.intersect_line(&l2) {
        Some(p) => vec![p.js_round(), to],
        None => vec![to],
    }
}

pub(crate) fn route(request: &RouteRequest<'_>, opts: &ManhattanOptions, kind: Grid) -> Vec<Point> {
    let padding = opts.resolved_padding_box();
    let source_bbox = request.source.bbox.move_and_expand(&padding);
    let target_bbox = request.target.bbox.move_and_expand(&padding);
    let source_anchor = request.source.anchor_or_center(&padding);
    let target_anchor = request.target.anchor_or_center(&padding);

    let obstacles = match &opts.is_point_obstacle {
        Some(predicate) => Obstacles::Predicate(predicate),
        None => Obstacles::Map(ObstacleMap::build(request, opts, &padding)),
    };

    let mut search = Search {
        opts,
        directions: directions(kind, opts),
        obstacles: &obstacles,
        previous_angle: None,
    };

    let mut route = Vec::new();
    let mut tail = source_anchor;
    let mut from = Endpoint::Box(source_bbox, source_anchor);

    for i in 0..=request.vertices.len() {
        let to = match request.vertices.get(i) {
            Some(v) => Endpoint::Point(*v),
            None => Endpoint::Box(target_bbox, target_anchor),
        };

        let Some(mut partial) = search.find_route(from, to) else {
            tracing::debug!("manhattan routing failed, falling back to the orthogonal router");
            return orthogonal_fallback(request, opts);
        };

        if partial.first() == Some(&tail) {
            partial.remove(0);
        }
        tail = partial.last().copied().unwrap_or(tail);
        route.extend(partial);
        from = to;
    }
    route
}

fn orthogonal_fallback(request: &RouteRequest<'_>, opts: &ManhattanOptions) -> Vec<Point> {
    let ortho = match opts.padding {
        Some(sides) => OrthogonalOptions::with_padding(sides),
        None => OrthogonalOptions::default(),
    };
    orthogonal::route(request, &ortho)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_dimension_stretches_to_fit() {
        assert_eq!(grid_dimension(0.0, 10.0), 10.0);
        assert_eq!(grid_dimension(4.0, 10.0), 4.0);
        assert_eq!(grid_dimension(600.0, 20.0), 20.0);
        assert_eq!(grid_dimension(105.0, 10.0), 10.5);
    }

    #[test]
    fn sorted_set_puts_new_ties_first() {
        let mut set = SortedSet::default();
        set.add((0, 0), 5.0);
        set.add((1, 0), 5.0);
        set.add((2, 0), 1.0);
        assert_eq!(set.pop(), Some((2, 0)));
        assert_eq!(set.pop(), Some((1, 0)));
        assert!(set.is_closed(&(1, 0)));
        assert!(set.is_open(&(0, 0)));
    }

    #[test]
    fn diagonal_route_breaks_at_forty_five_degrees() {
        let r = diagonal_route(point(80.0, 70.0), point(680.0, 670.0));
        assert_eq!(r, vec![point(81.0, 70.0), point(680.0, 670.0)]);
    }

    #[test]
    fn direction_angles_are_quantized() {
        let grid = RouteGrid::new(10.0, point(0.0, 0.0), point(100.0, 0.0));
        assert_eq!(direction_angle(point(0.0, 0.0), point(10.0, 1.0), 4, &grid, 10.0), 0.0);
        assert_eq!(direction_angle(point(0.0, 0.0), point(0.0, -10.0), 4, &grid, 10.0), 90.0);
        assert_eq!(direction_angle(point(0.0, 0.0), point(10.0, -10.0), 8, &grid, 10.0), 45.0);
    }
}
