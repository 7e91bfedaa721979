//! Hardware units beneath one or more disks.

use std::cell::Cell;
use std::rc::Rc;

use crate::UnitState;

/// Shared handle to a [`Unit`].
pub type UnitRef = Rc<Unit>;

/// The hardware grouping (e.g. a USB bridge) beneath one or more disks.
///
/// Device-altering execute stages are serialized per unit, and the eject
/// latch lives here because ejecting expels every disk of the unit at once.
#[derive(Debug)]
pub struct Unit {
    state: Cell<UnitState>,
}

impl Unit {
    /// Create a unit with no flags set.
    pub fn new() -> UnitRef {
        Rc::new(Unit {
            state: Cell::new(UnitState::empty()),
        })
    }

    /// Whether all of `flags` are set.
    pub fn state(&self, flags: UnitState) -> bool {
        self.state.get().contains(flags)
    }

    /// Set or clear `flags`.
    pub fn set_state(&self, flags: UnitState, value: bool) {
        let mut state = self.state.get();
        state.set(flags, value);
        self.state.set(state);
    }
}
