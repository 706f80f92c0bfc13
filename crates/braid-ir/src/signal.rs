//! Signals mark when a released value becomes externally available.

use crate::access::QueueResourceUse;

/// Lifecycle state of a [`Signal`].
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum SignalStatus {
    /// Not yet submitted; the owning splice is still a plain seam.
    #[default]
    Disarmed,
    /// Fired: the spliced values are available and carry their last
    /// recorded synchronization state.
    Armed,
}

/// Synchronization handoff attached to a release/acquire splice.
#[derive(Clone, Debug, Default)]
pub struct Signal {
    pub status: SignalStatus,
    /// Last recorded use of each spliced value, for the acquiring side.
    pub last_use: Vec<QueueResourceUse>,
}

impl Signal {
    /// A fresh, disarmed signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the signal has fired.
    pub fn is_armed(&self) -> bool {
        self.status == SignalStatus::Armed
    }
}
