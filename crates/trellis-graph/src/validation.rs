//! Checks run before a cell enters the graph and after every update.

use trellis_routing::{Anchor, ConnectionPoint, Connector, Router};

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::graph::{Graph, HashSet};
use crate::link::LinkEnd;

impl Graph {
    /// `incoming` holds the ids added in the same call, which count as present parents.
    pub(crate) fn validate_cell(&self, cell: &Cell, incoming: &HashSet<&str>) -> Result<()> {
        if let Some(parent) = cell.parent() {
            if !self.contains(parent) && !incoming.contains(parent.as_str()) {
                return Err(Error::NotInGraph { id: parent.clone() });
            }
        }
        validate_named(cell)?;
        validate_ports(cell)?;
        if cell.is_link() {
            self.validate_link(cell)?;
        }
        Ok(())
    }

    pub(crate) fn validate_change(&self, id: &str, before: &Cell) -> Result<()> {
        let Some(cell) = self.get_cell(id) else {
            return Ok(());
        };
        self.validate_updated(cell, before, &HashSet::default())
    }

    /// Checks `cell` as the new state of `before`. Ids in `incoming` count as present parents.
    pub(crate) fn validate_updated(
        &self,
        cell: &Cell,
        before: &Cell,
        incoming: &HashSet<&str>,
    ) -> Result<()> {
        if cell.parent() != before.parent() {
            if let Some(parent) = cell.parent() {
                if !self.contains(parent) && !incoming.contains(parent.as_str()) {
                    return Err(Error::NotInGraph { id: parent.clone() });
                }
            }
        }
        validate_named(cell)?;
        validate_ports(cell)?;
        let ends_changed = cell.source() != before.source() || cell.target() != before.target();
        if cell.is_link() && ends_changed {
            self.validate_link(cell)?;
        }
        Ok(())
    }

    fn validate_link(&self, link: &Cell) -> Result<()> {
        let validations = self.validations();
        let (Some(source), Some(target)) = (link.source(), link.target()) else {
            return Ok(());
        };
        if validations.link_pinning && (source.is_point() || target.is_point()) {
            tracing::debug!(id = %link.id(), "link with a free end rejected");
            return Err(Error::ValidationFailed {
                rule: "link_pinning",
                id: link.id().clone(),
            });
        }
        if validations.multi_links && self.duplicates_link(link, source, target) {
            tracing::debug!(id = %link.id(), "duplicate link rejected");
            return Err(Error::ValidationFailed {
                rule: "multi_links",
                id: link.id().clone(),
            });
        }
        Ok(())
    }

    /// Another link joins the same cells. An existing end without a port matches any port.
    fn duplicates_link(&self, link: &Cell, source: &LinkEnd, target: &LinkEnd) -> bool {
        let (Some(source_id), Some(target_id)) = (source.id(), target.id()) else {
            return false;
        };
        let same = |theirs: Option<&LinkEnd>, id: &str, port: Option<&str>| {
            theirs.is_some_and(|end| {
                end.id().is_some_and(|i| i == id)
                    && end.port_id().is_none_or(|p| Some(p) == port)
            })
        };
        self.get_connected_links(source_id, &crate::graph::ConnectedLinksOptions::outbound())
            .into_iter()
            .filter(|other| other.id() != link.id())
            .any(|other| {
                same(other.source(), source_id, source.port_id())
                    && same(other.target(), target_id, target.port_id())
            })
    }
}

/// Router, connector, anchor and connection point specs must parse and name a known strategy.
fn validate_named(cell: &Cell) -> Result<()> {
    let Some(link) = cell.as_link() else {
        return Ok(());
    };
    if let Some(spec) = link.router()? {
        Router::from_spec(&spec)?;
    }
    if let Some(spec) = link.connector()? {
        Connector::from_spec(&spec)?;
    }
    for end in [&link.source, &link.target] {
        if let Some(spec) = end.anchor()? {
            Anchor::from_spec(&spec)?;
        }
        if let Some(spec) = end.connection_point()? {
            ConnectionPoint::from_spec(&spec)?;
        }
    }
    Ok(())
}

fn validate_ports(cell: &Cell) -> Result<()> {
    let ports = cell.ports();
    for (i, port) in ports.iter().enumerate() {
        if ports[..i].iter().any(|p| p.id() == port.id()) {
            return Err(Error::DuplicatePortId {
                id: cell.id().clone(),
                port: port.id().to_string(),
            });
        }
    }
    Ok(())
}
