//! Per-unit state flags.

use bitflags::bitflags;

bitflags! {
    /// Flags kept on the hardware unit beneath one or more disks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UnitState: u32 {
        /// A device-altering execute stage is running on some disk of this unit.
        const COMMAND_ACTIVE = 1 << 0;
        /// The media was ejected; cleared when a mount is attempted.
        const EJECTED = 1 << 1;
    }
}
