//! Frame scheduling.
//!
//! The store never flushes on its own. It asks the host for a frame, and the host calls
//! [`GraphStore::flush`](crate::GraphStore::flush) when that frame comes.

use std::cell::Cell;
use std::rc::Rc;

pub trait FrameScheduler {
    /// Asks for one call to `flush`. The store keeps at most one request outstanding.
    fn request_frame(&mut self);
}

impl<F: FnMut()> FrameScheduler for F {
    fn request_frame(&mut self) {
        self()
    }
}

/// Counts frame requests so the caller can service them by hand.
///
/// Clones share the counter, so one clone can be handed to the store and the other kept.
#[derive(Debug, Clone, Default)]
pub struct ManualFrames {
    requested: Rc<Cell<usize>>,
    pending: Rc<Cell<bool>>,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far.
    pub fn requests(&self) -> usize {
        self.requested.get()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Clears the pending request, returning whether there was one.
    pub fn take(&self) -> bool {
        self.pending.replace(false)
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&mut self) {
        self.requested.set(self.requested.get() + 1);
        self.pending.set(true);
    }
}
