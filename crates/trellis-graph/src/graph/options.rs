//! Option structs for graph operations.

use serde::{Deserialize, Serialize};
use trellis_routing::Sides;

use crate::cell::ChangeOptions;
use crate::registry::CellRegistry;

/// Link rules checked whenever a link is added or its ends change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Validations {
    /// Reject a second link between the same cells and ports.
    pub multi_links: bool,
    /// Reject links with a free-point end.
    pub link_pinning: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GraphOptions {
    pub registry: CellRegistry,
    pub validations: Validations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddOptions {
    /// Add the cells without binding them to the graph.
    pub dry: bool,
    pub options: ChangeOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveOptions {
    /// Turn the ends of connected links into free points instead of removing the links.
    pub disconnect_links: bool,
    pub options: ChangeOptions,
}

/// Direction filters shared by the adjacency queries. Leaving both unset means both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Direction {
    pub inbound: Option<bool>,
    pub outbound: Option<bool>,
}

impl Direction {
    pub const INBOUND: Direction = Direction {
        inbound: Some(true),
        outbound: None,
    };
    pub const OUTBOUND: Direction = Direction {
        inbound: None,
        outbound: Some(true),
    };

    /// `(inbound, outbound)` after defaulting.
    pub(crate) fn resolve(self) -> (bool, bool) {
        match (self.inbound, self.outbound) {
            (None, None) => (true, true),
            (inbound, outbound) => (inbound.unwrap_or(false), outbound.unwrap_or(false)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectedLinksOptions {
    pub direction: Direction,
    /// Also follow links attached to the found links.
    pub indirect: bool,
    /// Also collect links attached to embedded elements.
    pub deep: bool,
    /// With `deep`, keep links whose both ends are embedded elements.
    pub include_enclosed: bool,
}

impl ConnectedLinksOptions {
    pub fn inbound() -> Self {
        Self {
            direction: Direction::INBOUND,
            ..Self::default()
        }
    }

    pub fn outbound() -> Self {
        Self {
            direction: Direction::OUTBOUND,
            ..Self::default()
        }
    }

    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }
}

pub type NeighborOptions = ConnectedLinksOptions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub breadth_first: bool,
    pub neighbors: NeighborOptions,
}

/// Returned by search callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    /// Do not expand the neighbors of this element.
    Prune,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddedCellsOptions {
    pub deep: bool,
    pub breadth_first: bool,
    /// Order siblings by z.
    pub sort_siblings: bool,
}

impl EmbeddedCellsOptions {
    pub fn deep() -> Self {
        Self {
            deep: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZOrderOptions {
    /// Move the embedded subtree along.
    pub deep: bool,
    pub breadth_first: bool,
    /// Keep descendants above their ancestors instead of preserving their relative z.
    pub foreground_embeds: bool,
    pub options: ChangeOptions,
}

impl Default for ZOrderOptions {
    fn default() -> Self {
        Self {
            deep: false,
            breadth_first: true,
            foreground_embeds: true,
            options: ChangeOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitOptions {
    /// Fit descendants first (`fit_to_children`) or all ancestors (`fit_parent`).
    pub deep: bool,
    pub padding: Sides,
    pub expand_only: bool,
    pub shrink_only: bool,
    /// With `deep`, the last ancestor `fit_parent` resizes.
    pub terminator: Option<crate::cell::CellId>,
    pub options: ChangeOptions,
}

/// Which part of an element is tested by `find_models_under_element`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchBy {
    /// Elements overlapping the rotated box.
    #[default]
    BBox,
    Origin,
    Corner,
    TopLeft,
    TopRight,
    TopMiddle,
    BottomLeft,
    BottomRight,
    BottomMiddle,
    LeftMiddle,
    RightMiddle,
    Center,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslateOptions {
    /// Keeps the element, together with its embedded cells, inside this area.
    pub restricted_area: Option<trellis_routing::Rect>,
    pub options: ChangeOptions,
}
