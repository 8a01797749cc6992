#![forbid(unsafe_code)]

//! Link geometry for trellis diagrams.
//!
//! A link is resolved in four steps: each end gets an [`Anchor`], a [`Router`] computes the
//! intermediate points between the anchors, a [`ConnectionPoint`] clips each end against its
//! element, and a [`Connector`] turns the resulting polyline into SVG path data.
//!
//! Element geometry is supplied through the [`EndView`] trait so that a renderer can expose real
//! shapes while headless callers use plain boxes ([`ElementGeometry`]).

pub mod anchor;
pub mod connection_point;
pub mod connector;
pub mod error;
pub mod geom;
pub mod router;
pub mod spec;
pub mod view;

pub use anchor::Anchor;
pub use connection_point::ConnectionPoint;
pub use connector::{
    Connector, ConnectorInput, CurveDirection, CurveOptions, CurveTangent, PathData, Segment,
};
pub use error::{Error, Result};
pub use geom::{Line, Point, Rect, Shape, Side, Sides, point, rect};
pub use router::{
    FallbackRoute, ManhattanOptions, Obstacle, OneSideOptions, OrthogonalOptions,
    RightAngleDirection, RightAngleOptions, RouteEnd, RouteRequest, Router,
};
pub use spec::NamedSpec;
pub use view::{ElementGeometry, EndContext, EndView};

/// Routing entry point.
pub fn route(request: &RouteRequest<'_>, router: &Router) -> Result<Vec<Point>> {
    router::route(request, router)
}
