//! Link geometry resolution against a graph.
//!
//! A [`Paper`] holds the default strategies and, optionally, richer views of elements (real
//! shapes, port boxes). Elements without a registered view are seen through their model box and
//! rotation.
//!
//! The pipeline per link: source anchor, target anchor, route, connection points, connector.

use serde::{Deserialize, Serialize};
use trellis_routing::geom::{Line, PointExt};
use trellis_routing::{
    Anchor, ConnectionPoint, Connector, ConnectorInput, ElementGeometry, EndContext, EndView,
    NamedSpec, Obstacle, PathData, Point, Rect, RouteEnd, RouteRequest, Router, point, route,
};

use crate::cell::{Cell, CellId};
use crate::error::{Error, Result};
use crate::graph::{Graph, HashMap, HashSet};
use crate::link::LinkEnd;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaperOptions {
    pub default_router: NamedSpec,
    pub default_connector: NamedSpec,
    pub default_anchor: NamedSpec,
    pub default_connection_point: NamedSpec,
}

impl Default for PaperOptions {
    fn default() -> Self {
        Self {
            default_router: NamedSpec::new("normal"),
            default_connector: NamedSpec::new("normal"),
            default_anchor: NamedSpec::new("center"),
            default_connection_point: NamedSpec::new("bbox"),
        }
    }
}

/// Resolved geometry of one link.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPath {
    pub source_anchor: Point,
    pub target_anchor: Point,
    pub source_point: Point,
    pub target_point: Point,
    /// Points between the two connection points.
    pub route: Vec<Point>,
    pub path: PathData,
}

impl LinkPath {
    /// Connection points with the route between them.
    pub fn polyline(&self) -> Vec<Point> {
        let mut points = Vec::with_capacity(self.route.len() + 2);
        points.push(self.source_point);
        points.extend_from_slice(&self.route);
        points.push(self.target_point);
        points
    }

    /// Point at `ratio` (0..=1) of the polyline length.
    pub fn point_at_ratio(&self, ratio: f64) -> Point {
        point_at_ratio(&self.polyline(), ratio)
    }
}

pub struct Paper {
    options: PaperOptions,
    router: Router,
    connector: Connector,
    anchor: Anchor,
    connection_point: ConnectionPoint,
    views: HashMap<CellId, Box<dyn EndView>>,
}

impl std::fmt::Debug for Paper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paper")
            .field("options", &self.options)
            .field("views", &self.views.len())
            .finish()
    }
}

impl Paper {
    /// Fails when a default names an unknown strategy.
    pub fn new(options: PaperOptions) -> Result<Self> {
        Ok(Self {
            router: Router::from_spec(&options.default_router)?,
            connector: Connector::from_spec(&options.default_connector)?,
            anchor: Anchor::from_spec(&options.default_anchor)?,
            connection_point: ConnectionPoint::from_spec(&options.default_connection_point)?,
            options,
            views: HashMap::default(),
        })
    }

    pub fn options(&self) -> &PaperOptions {
        &self.options
    }

    /// Uses `view` instead of the model box for the element `id`.
    pub fn register_view(&mut self, id: impl Into<CellId>, view: impl EndView + 'static) {
        self.views.insert(id.into(), Box::new(view));
    }

    pub fn unregister_view(&mut self, id: &str) -> bool {
        self.views.remove(id).is_some()
    }

    /// Resolves the geometry of the link `id`.
    pub fn resolve_link(&self, graph: &Graph, id: &str) -> Result<LinkPath> {
        let mut visiting = HashSet::default();
        self.resolve(graph, id, &mut visiting)
    }

    /// Geometry of every link in z order.
    pub fn resolve_links(&self, graph: &Graph) -> Result<Vec<(CellId, LinkPath)>> {
        graph
            .get_links()
            .into_iter()
            .map(|link| Ok((link.id().clone(), self.resolve_link(graph, link.id())?)))
            .collect()
    }

    /// `visiting` holds the links being resolved further up, to break link-to-link cycles.
    fn resolve(&self, graph: &Graph, id: &str, visiting: &mut HashSet<CellId>) -> Result<LinkPath> {
        let Some(link) = graph.get_cell(id) else {
            return Err(Error::NotInGraph { id: id.into() });
        };
        let (Some(source), Some(target)) = (link.source(), link.target()) else {
            return Err(Error::NotALink { id: id.into() });
        };
        let router = match link.router()? {
            Some(spec) => Router::from_spec(&spec)?,
            None => self.router.clone(),
        };
        let connector = match link.connector()? {
            Some(spec) => Connector::from_spec(&spec)?,
            None => self.connector.clone(),
        };
        visiting.insert(link.id().clone());
        let source = self.end(graph, source, visiting);
        let target = self.end(graph, target, visiting);
        visiting.remove(link.id());
        let (source, target) = (source?, target?);
        let vertices = link.vertices();

        let perpendicular = router.prefers_perpendicular_anchor();
        let source_ref = vertices
            .first()
            .copied()
            .unwrap_or_else(|| target.reference());
        let source_anchor = self.anchor_point(&source, source_ref, perpendicular)?;
        let target_ref = vertices.last().copied().unwrap_or(source_anchor);
        let target_anchor = self.anchor_point(&target, target_ref, perpendicular)?;

        let obstacles: Vec<Obstacle> = graph
            .get_elements()
            .into_iter()
            .filter_map(|e| {
                Some(Obstacle {
                    id: e.id().to_string(),
                    cell_type: e.cell_type().to_string(),
                    bbox: e.bbox()?,
                })
            })
            .collect();
        let source_route = source.route_end(graph, source_anchor);
        let target_route = target.route_end(graph, target_anchor);
        let points = route(
            &RouteRequest {
                vertices,
                source: &source_route,
                target: &target_route,
                obstacles: &obstacles,
            },
            &router,
        )?;

        let source_point = self.connection_point(
            &source,
            Line::new(points.first().copied().unwrap_or(target_anchor), source_anchor),
        )?;
        let target_point = self.connection_point(
            &target,
            Line::new(points.last().copied().unwrap_or(source_anchor), target_anchor),
        )?;
        let path = connector.connect(&ConnectorInput {
            source: source_point,
            target: target_point,
            route: &points,
            source_bbox: source.magnet_bbox(),
            target_bbox: target.magnet_bbox(),
        });
        tracing::trace!(link = id, points = points.len(), "resolved link path");
        Ok(LinkPath {
            source_anchor,
            target_anchor,
            source_point,
            target_point,
            route: points,
            path,
        })
    }

    fn end<'a>(
        &'a self,
        graph: &'a Graph,
        end: &'a LinkEnd,
        visiting: &mut HashSet<CellId>,
    ) -> Result<ResolvedEnd<'a>> {
        let (id, port) = match end {
            LinkEnd::Point { point, .. } => return Ok(ResolvedEnd::Free(*point)),
            LinkEnd::Cell { id, port, .. } => (id, port.as_deref()),
        };
        let Some(cell) = graph.get_cell(id) else {
            tracing::warn!(%id, "link end references a missing cell");
            return Ok(ResolvedEnd::Free(point(0.0, 0.0)));
        };
        if cell.is_link() {
            if visiting.contains(id) {
                tracing::warn!(%id, "link ends form a cycle");
                return Ok(ResolvedEnd::Free(point(0.0, 0.0)));
            }
            let path = self.resolve(graph, id, visiting)?;
            return Ok(ResolvedEnd::Free(path.point_at_ratio(0.5)));
        }
        let view = match self.views.get(id.as_str()) {
            Some(view) => ViewRef::Registered(view.as_ref()),
            None => ViewRef::Model(model_geometry(cell)),
        };
        Ok(ResolvedEnd::Element(ElementEnd {
            cell,
            end,
            view,
            port,
        }))
    }

    fn anchor_point(&self, end: &ResolvedEnd<'_>, reference: Point, perpendicular: bool) -> Result<Point> {
        let ResolvedEnd::Element(element) = end else {
            return Ok(end.reference());
        };
        let anchor = match element.end.anchor()? {
            Some(named) => Anchor::from_spec(&named)?,
            None if perpendicular => Anchor::from_spec(&NamedSpec::new("perpendicular"))?,
            None => self.anchor.clone(),
        };
        Ok(element.with_context(|ctx| anchor.resolve(ctx, reference)))
    }

    fn connection_point(&self, end: &ResolvedEnd<'_>, line: Line) -> Result<Point> {
        let ResolvedEnd::Element(element) = end else {
            return Ok(end.reference());
        };
        let cp = match element.end.connection_point()? {
            Some(named) => ConnectionPoint::from_spec(&named)?,
            None => self.connection_point.clone(),
        };
        Ok(element.with_context(|ctx| cp.resolve(line, ctx)))
    }
}

enum ViewRef<'a> {
    Registered(&'a dyn EndView),
    Model(ElementGeometry),
}

impl ViewRef<'_> {
    fn as_view(&self) -> &dyn EndView {
        match self {
            ViewRef::Registered(view) => *view,
            ViewRef::Model(geometry) => geometry,
        }
    }
}

struct ElementEnd<'a> {
    cell: &'a Cell,
    end: &'a LinkEnd,
    view: ViewRef<'a>,
    port: Option<&'a str>,
}

impl ElementEnd<'_> {
    fn with_context<R>(&self, f: impl FnOnce(&EndContext<'_>) -> R) -> R {
        let ctx = EndContext::new(self.view.as_view())
            .with_port(self.port)
            .with_selector(self.end.selector());
        f(&ctx)
    }

    fn magnet_bbox(&self) -> Rect {
        self.with_context(|ctx| ctx.magnet_bbox())
    }
}

enum ResolvedEnd<'a> {
    /// Free points, and ends resolved to a point on another link.
    Free(Point),
    Element(ElementEnd<'a>),
}

impl ResolvedEnd<'_> {
    /// The point the other end aims at: the free point, or the magnet center.
    fn reference(&self) -> Point {
        match self {
            ResolvedEnd::Free(p) => *p,
            ResolvedEnd::Element(element) => element.magnet_bbox().center(),
        }
    }

    fn magnet_bbox(&self) -> Option<Rect> {
        match self {
            ResolvedEnd::Free(_) => None,
            ResolvedEnd::Element(element) => Some(element.magnet_bbox()),
        }
    }

    fn route_end(&self, graph: &Graph, anchor: Point) -> RouteEnd {
        match self {
            ResolvedEnd::Free(p) => RouteEnd::point(*p),
            ResolvedEnd::Element(element) => {
                let id = element.cell.id();
                let ancestors = graph
                    .get_ancestors(id)
                    .into_iter()
                    .map(|a| a.id().to_string())
                    .collect();
                RouteEnd::element(id.to_string(), element.magnet_bbox())
                    .with_anchor(anchor)
                    .with_ancestors(ancestors)
            }
        }
    }
}

fn model_geometry(cell: &Cell) -> ElementGeometry {
    let bbox = cell
        .bbox()
        .unwrap_or_else(|| trellis_routing::rect(0.0, 0.0, 0.0, 0.0));
    ElementGeometry::new(bbox).with_angle(cell.angle().unwrap_or(0.0))
}

fn point_at_ratio(points: &[Point], ratio: f64) -> Point {
    let Some(first) = points.first().copied() else {
        return point(0.0, 0.0);
    };
    let total: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    let mut remaining = total * ratio.clamp(0.0, 1.0);
    for w in points.windows(2) {
        let length = w[0].distance(w[1]);
        if remaining <= length && length > 0.0 {
            return Line::new(w[0], w[1]).point_at(remaining / length);
        }
        remaining -= length;
    }
    points.last().copied().unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_walks_the_polyline_by_length() {
        let points = [point(0.0, 0.0), point(10.0, 0.0), point(10.0, 10.0)];
        assert_eq!(point_at_ratio(&points, 0.5), point(10.0, 0.0));
        assert_eq!(point_at_ratio(&points, 0.75), point(10.0, 5.0));
        assert_eq!(point_at_ratio(&points, 1.0), point(10.0, 10.0));
    }
}
