//! Per-disk state flags.

use bitflags::bitflags;

bitflags! {
    /// Lifecycle and gating flags kept on each disk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DiskState: u32 {
        /// Arrival processing finished; the disk is eligible for dispatch.
        const STAGED_APPEAR = 1 << 0;
        /// The filesystem probe has run since it was last reset.
        const STAGED_PROBE = 1 << 1;
        /// A stage handler is currently advancing a request on this disk.
        const COMMAND_ACTIVE = 1 << 2;
        /// The volume failed its filesystem check and needs repair.
        const REQUIRE_REPAIR = 1 << 3;
        /// The disk is gone for good and awaits removal from the disk table.
        const ZOMBIE = 1 << 4;
        /// An observer asked for the next mount to be read-only.
        const MOUNT_PREFERENCE_NO_WRITE = 1 << 5;
    }
}
