use serde::Deserialize;

use super::RouteRequest;
use crate::geom::{Point, Side, Sides};

/// Both ends leave through the same side of their elements.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OneSideOptions {
    pub side: Side,
    pub padding: Sides,
}

impl Default for OneSideOptions {
    fn default() -> Self {
        Self {
            side: Side::Bottom,
            padding: Sides::uniform(40.0),
        }
    }
}

pub(crate) fn route(request: &RouteRequest<'_>, opts: &OneSideOptions) -> Vec<Point> {
    let source_bbox = request.source.bbox;
    let target_bbox = request.target.bbox;
    let mut source = source_bbox.center();
    let mut target = target_bbox.center();
    let padding = opts.padding.get(opts.side);

    let (direction, horizontal) = match opts.side {
        Side::Bottom => (1.0, false),
        Side::Top => (-1.0, false),
        Side::Left => (-1.0, true),
        Side::Right => (1.0, true),
    };

    if horizontal {
        source.x += direction * (source_bbox.size.width / 2.0 + padding);
        target.x += direction * (target_bbox.size.width / 2.0 + padding);
        if direction * (source.x - target.x) > 0.0 {
            target.x = source.x;
        } else {
            source.x = target.x;
        }
    } else {
        source.y += direction * (source_bbox.size.height / 2.0 + padding);
        target.y += direction * (target_bbox.size.height / 2.0 + padding);
        if direction * (source.y - target.y) > 0.0 {
            target.y = source.y;
        } else {
            source.y = target.y;
        }
    }

    let mut out = Vec::with_capacity(request.vertices.len() + 2);
    out.push(source);
    out.extend_from_slice(request.vertices);
    out.push(target);
    out
}
