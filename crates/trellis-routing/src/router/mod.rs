pub mod manhattan;
pub mod one_side;
pub mod orthogonal;
pub mod right_angle;

pub use manhattan::{FallbackRoute, ManhattanOptions, PointPredicate};
pub use one_side::OneSideOptions;
pub use orthogonal::OrthogonalOptions;
pub use right_angle::{RightAngleDirection, RightAngleOptions};

use serde_json::json;

use crate::error::{Error, Result};
use crate::geom::{Point, Rect, RectExt};
use crate::spec::NamedSpec;

/// A routing strategy with its resolved options.
#[derive(Debug, Clone, Default)]
pub enum Router {
    /// Passes the vertices through unchanged.
    #[default]
    Normal,
    Orthogonal(OrthogonalOptions),
    Manhattan(ManhattanOptions),
    /// Manhattan search over eight directions with 45° turns.
    Metro(ManhattanOptions),
    OneSide(OneSideOptions),
    RightAngle(RightAngleOptions),
}

impl Router {
    pub fn from_spec(spec: &NamedSpec) -> Result<Self> {
        match spec.name.as_str() {
            "normal" => Ok(Router::Normal),
            "orthogonal" => Ok(Router::Orthogonal(spec.options()?)),
            "manhattan" => Ok(Router::Manhattan(spec.options()?)),
            "metro" => Ok(Router::Metro(spec.options_over(&json!({
                "maxAllowedDirectionChange": 45,
                "fallbackRoute": "diagonal",
            }))?)),
            "oneSide" => Ok(Router::OneSide(spec.options()?)),
            "rightAngle" => Ok(Router::RightAngle(spec.options()?)),
            other => Err(Error::UnknownRouter {
                name: other.to_string(),
            }),
        }
    }

    /// Whether ends without an explicit anchor should use the perpendicular anchor.
    pub fn prefers_perpendicular_anchor(&self) -> bool {
        match self {
            Router::Manhattan(opts) | Router::Metro(opts) => opts.perpendicular,
            _ => false,
        }
    }
}

/// One end of the link being routed.
///
/// For an end attached to an element `bbox` is the magnet box. For a free point it is a
/// zero-sized box at the point.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEnd {
    pub bbox: Rect,
    pub anchor: Option<Point>,
    /// Id of the attached element, `None` for free points.
    pub id: Option<String>,
    /// Ids of the attached element's ancestors, never treated as obstacles.
    pub ancestors: Vec<String>,
}

impl RouteEnd {
    pub fn point(p: Point) -> Self {
        Self {
            bbox: crate::geom::point_box(p),
            anchor: Some(p),
            id: None,
            ancestors: Vec::new(),
        }
    }

    pub fn element(id: impl Into<String>, bbox: Rect) -> Self {
        Self {
            bbox,
            anchor: None,
            id: Some(id.into()),
            ancestors: Vec::new(),
        }
    }

    pub fn with_anchor(mut self, anchor: Point) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_ancestors(mut self, ancestors: Vec<String>) -> Self {
        self.ancestors = ancestors;
        self
    }

    /// Explicit anchor, or the center of `bbox` grown by `padding`.
    pub(crate) fn anchor_or_center(&self, padding: &Rect) -> Point {
        self.anchor
            .unwrap_or_else(|| self.bbox.move_and_expand(padding).center())
    }
}

/// An element the search-based routers must avoid.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub id: String,
    pub cell_type: String,
    /// Unrotated model box.
    pub bbox: Rect,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub vertices: &'a [Point],
    pub source: &'a RouteEnd,
    pub target: &'a RouteEnd,
    pub obstacles: &'a [Obstacle],
}

/// Computes the intermediate route points (excluding the connection points) of a link.
pub fn route(request: &RouteRequest<'_>, router: &Router) -> Result<Vec<Point>> {
    Ok(match router {
        Router::Normal => request.vertices.to_vec(),
        Router::Orthogonal(opts) => orthogonal::route(request, opts),
        Router::Manhattan(opts) => manhattan::route(request, opts, manhattan::Grid::Orthogonal),
        Router::Metro(opts) => manhattan::route(request, opts, manhattan::Grid::Diagonal),
        Router::OneSide(opts) => one_side::route(request, opts),
        Router::RightAngle(opts) => right_angle::route(request, opts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metro_defaults_apply_under_user_args() {
        let r = Router::from_spec(&NamedSpec::with_args("metro", json!({"step": 20}))).unwrap();
        let Router::Metro(opts) = r else {
            panic!("expected metro");
        };
        assert_eq!(opts.step, 20.0);
        assert_eq!(opts.max_allowed_direction_change, 45.0);
        assert_eq!(opts.fallback_route, FallbackRoute::Diagonal);
    }

    #[test]
    fn unknown_router_is_rejected() {
        let err = Router::from_spec(&NamedSpec::new("non-existing")).unwrap_err();
        assert_eq!(err.to_string(), "unknown router: non-existing");
    }
}
