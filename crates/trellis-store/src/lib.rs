#![forbid(unsafe_code)]

//! Store bridge between a mutable trellis [`Graph`](trellis_graph::Graph) and a declarative UI
//! layer.
//!
//! The [`GraphStore`] owns the graph, listens to its events and publishes immutable
//! [`GraphSnapshot`]s. Changes are coalesced: nothing is published while a batch is open, and
//! outside batches one frame is requested from the [`FrameScheduler`] for any number of changes.

pub mod error;
pub mod frame;
pub mod snapshot;
pub mod store;

pub use error::{Error, Result};
pub use frame::{FrameScheduler, ManualFrames};
pub use snapshot::{ElementRecord, GraphSnapshot, GraphState, LinkRecord};
pub use store::{GraphStore, StoreOptions, Subscription, Topic, Update};
