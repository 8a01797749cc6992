#![forbid(unsafe_code)]

//! `trellis` is a diagramming core: a graph of elements and links with embedding, change events
//! and batches, link geometry (routers, anchors, connection points, connectors), and a snapshot
//! store that lets a declarative UI layer subscribe to the graph.
//!
//! # Features
//!
//! - `store` (default): enable the snapshot store (`trellis::store`)

pub use trellis_graph::*;

/// Geometry and link routing primitives.
pub mod routing {
    pub use trellis_routing::*;
}

#[cfg(feature = "store")]
pub mod store {
    pub use trellis_store::{
        ElementRecord, Error, FrameScheduler, GraphSnapshot, GraphState, GraphStore, LinkRecord,
        ManualFrames, Result, StoreOptions, Subscription, Topic, Update,
    };

    /// A store over `graph` whose frames are serviced by hand through the returned
    /// [`ManualFrames`].
    pub fn manual(graph: crate::Graph, options: StoreOptions) -> (GraphStore, ManualFrames) {
        let frames = ManualFrames::new();
        let store = GraphStore::new(graph, frames.clone(), options);
        (store, frames)
    }

    /// Flushes `store` if its frame is due. Returns whether a snapshot was published.
    pub fn service(store: &mut GraphStore, frames: &ManualFrames) -> bool {
        frames.take() && store.flush()
    }
}
