#![forbid(unsafe_code)]

//! Diagram model for trellis.
//!
//! A [`Graph`] owns [`Cell`]s, which are either elements (boxes with ports) or links (two
//! [`LinkEnd`]s plus routing hints). Attributes are JSON and are addressed with
//! [`PropertyPath`]s; every change is reported both to the cell's observers and as a
//! [`GraphEvent`] to the graph's listeners, grouped by named batches.
//!
//! Geometry of links is resolved by a [`Paper`] through `trellis-routing`.

pub mod batch;
pub mod cell;
pub mod element;
pub mod error;
pub mod event;
pub mod graph;
pub mod json;
pub mod link;
pub mod paper;
pub mod path;
pub mod registry;
mod validation;

pub use batch::BatchGuard;
pub use cell::{
    Cell, CellChange, CellEvent, CellId, CellKind, CellRole, ChangeOptions, ELEMENT_TYPE, GraphId,
    LINK_TYPE, ObserverId,
};
pub use element::{Port, ResizeDirection, ResizeOptions};
pub use error::{Error, Result};
pub use event::{GraphEvent, ListenerId};
pub use graph::{
    AddOptions, CloneMap, ConnectedLinksOptions, Direction, EmbeddedCellsOptions, FitOptions,
    Graph, GraphOptions, NeighborOptions, RemoveOptions, SearchBy, SearchOptions,
    TranslateOptions, Validations, Visit, ZOrderOptions, clone_cells,
};
pub use link::{Label, LinkEnd};
pub use paper::{LinkPath, Paper, PaperOptions};
pub use path::{IntoPropertyPath, PathSegment, PropertyPath};
pub use registry::{CellDefinition, CellRegistry};

pub use trellis_routing::{
    ElementGeometry, EndView, NamedSpec, PathData, Point, Rect, Sides, point, rect,
};
